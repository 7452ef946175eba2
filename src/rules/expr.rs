//! Condition language for rule packs.
//!
//! Grammar (lowest precedence first):
//!   expr    := and ("or" and)*
//!   and     := unary ("and" unary)*
//!   unary   := "not" unary | cmp
//!   cmp     := operand (("==" | "!=" | "<=" | ">=" | "<" | ">") operand
//!             | "in" list | "not" "in" list | "not" "null")?
//!   operand := ident | number | string | "null" | "true" | "false" | "(" expr ")"
//!   list    := "[" (operand ("," operand)*)? "]"
//!
//! Identifiers resolve against the pack parameters first, then the record's
//! attributes, so a parameter shadows a column of the same name. An
//! unresolved identifier is an error so typos in rule packs fail loudly
//! instead of silently never matching.

use crate::utils::error::{Result, ScreenError};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    And,
    Or,
    Not,
    In,
    Null,
    True,
    False,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Ident(String),
    Lit(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp(Operand, CmpOp, Operand),
    In(Operand, Vec<Operand>, bool),
    NotNull(Operand),
    Truthy(Operand),
}

/// A parsed rule condition, reusable across records.
#[derive(Debug, Clone)]
pub struct Condition {
    source: String,
    ast: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Condition> {
        let tokens = lex(source).map_err(|message| ScreenError::RuleError {
            expression: source.to_string(),
            message,
        })?;
        let mut parser = Parser { tokens, pos: 0 };
        let ast = parser.parse_expr().map_err(|message| ScreenError::RuleError {
            expression: source.to_string(),
            message,
        })?;
        if parser.pos != parser.tokens.len() {
            return Err(ScreenError::RuleError {
                expression: source.to_string(),
                message: "Trailing tokens after expression".to_string(),
            });
        }
        Ok(Condition {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(
        &self,
        row: &HashMap<String, Value>,
        params: &HashMap<String, Value>,
    ) -> Result<bool> {
        self.eval_expr(&self.ast, row, params)
    }

    fn eval_expr(
        &self,
        expr: &Expr,
        row: &HashMap<String, Value>,
        params: &HashMap<String, Value>,
    ) -> Result<bool> {
        match expr {
            Expr::Or(a, b) => {
                Ok(self.eval_expr(a, row, params)? || self.eval_expr(b, row, params)?)
            }
            Expr::And(a, b) => {
                Ok(self.eval_expr(a, row, params)? && self.eval_expr(b, row, params)?)
            }
            Expr::Not(e) => Ok(!self.eval_expr(e, row, params)?),
            Expr::Cmp(left, op, right) => {
                let lv = self.resolve(left, row, params)?;
                let rv = self.resolve(right, row, params)?;
                self.compare(&lv, *op, &rv)
            }
            Expr::In(operand, items, negated) => {
                let v = self.resolve(operand, row, params)?;
                let mut found = false;
                for item in items {
                    let item_v = self.resolve(item, row, params)?;
                    if values_equal(&v, &item_v) {
                        found = true;
                        break;
                    }
                }
                Ok(found != *negated)
            }
            Expr::NotNull(operand) => {
                Ok(!self.resolve(operand, row, params)?.is_null())
            }
            Expr::Truthy(operand) => Ok(truthy(&self.resolve(operand, row, params)?)),
        }
    }

    fn resolve(
        &self,
        operand: &Operand,
        row: &HashMap<String, Value>,
        params: &HashMap<String, Value>,
    ) -> Result<Value> {
        match operand {
            Operand::Lit(v) => Ok(v.clone()),
            Operand::Ident(name) => params
                .get(name)
                .or_else(|| row.get(name))
                .cloned()
                .ok_or_else(|| ScreenError::RuleError {
                    expression: self.source.clone(),
                    message: format!("Unknown identifier: {}", name),
                }),
        }
    }

    fn compare(&self, left: &Value, op: CmpOp, right: &Value) -> Result<bool> {
        match op {
            CmpOp::Eq => Ok(values_equal(left, right)),
            CmpOp::Ne => Ok(!values_equal(left, right)),
            _ => {
                // Ordering against null never matches (pandas NaN semantics).
                if left.is_null() || right.is_null() {
                    return Ok(false);
                }
                if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
                    return Ok(apply_order(op, a.partial_cmp(&b)));
                }
                if let (Some(a), Some(b)) = (left.as_str(), right.as_str()) {
                    return Ok(apply_order(op, a.partial_cmp(b)));
                }
                Err(ScreenError::RuleError {
                    expression: self.source.clone(),
                    message: format!("Cannot order {} against {}", left, right),
                })
            }
        }
    }
}

fn apply_order(op: CmpOp, ord: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match (op, ord) {
        (CmpOp::Lt, Some(Less)) => true,
        (CmpOp::Le, Some(Less) | Some(Equal)) => true,
        (CmpOp::Gt, Some(Greater)) => true,
        (CmpOp::Ge, Some(Greater) | Some(Equal)) => true,
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn lex(source: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err("Single '=' is not a comparison; use '=='".to_string());
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    return Err("Unexpected '!'".to_string());
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", text))?;
                tokens.push(Token::Number(n));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "null" => Token::Null,
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("Unexpected character: {}", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, token: Token, what: &str) -> std::result::Result<(), String> {
        match self.next() {
            Some(t) if t == token => Ok(()),
            other => Err(format!("Expected {}, found {:?}", what, other)),
        }
    }

    fn parse_expr(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> std::result::Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> std::result::Result<Expr, String> {
        // Parenthesized sub-expression, unless it is a parenthesized operand
        // appearing before a comparison; rule conditions never nest operands
        // that way, so a plain sub-expression is assumed.
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        match self.peek() {
            Some(Token::Eq) => self.finish_cmp(left, CmpOp::Eq),
            Some(Token::Ne) => self.finish_cmp(left, CmpOp::Ne),
            Some(Token::Lt) => self.finish_cmp(left, CmpOp::Lt),
            Some(Token::Le) => self.finish_cmp(left, CmpOp::Le),
            Some(Token::Gt) => self.finish_cmp(left, CmpOp::Gt),
            Some(Token::Ge) => self.finish_cmp(left, CmpOp::Ge),
            Some(Token::In) => {
                self.next();
                let items = self.parse_list()?;
                Ok(Expr::In(left, items, false))
            }
            Some(Token::Not) => {
                self.next();
                match self.next() {
                    Some(Token::Null) => Ok(Expr::NotNull(left)),
                    Some(Token::In) => {
                        let items = self.parse_list()?;
                        Ok(Expr::In(left, items, true))
                    }
                    other => Err(format!("Expected 'null' or 'in' after 'not', found {:?}", other)),
                }
            }
            _ => Ok(Expr::Truthy(left)),
        }
    }

    fn finish_cmp(&mut self, left: Operand, op: CmpOp) -> std::result::Result<Expr, String> {
        self.next();
        let right = self.parse_operand()?;
        Ok(Expr::Cmp(left, op, right))
    }

    fn parse_operand(&mut self) -> std::result::Result<Operand, String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Ident(name)),
            Some(Token::Number(n)) => Ok(Operand::Lit(
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            )),
            Some(Token::Str(s)) => Ok(Operand::Lit(Value::String(s))),
            Some(Token::Null) => Ok(Operand::Lit(Value::Null)),
            Some(Token::True) => Ok(Operand::Lit(Value::Bool(true))),
            Some(Token::False) => Ok(Operand::Lit(Value::Bool(false))),
            other => Err(format!("Expected an operand, found {:?}", other)),
        }
    }

    fn parse_list(&mut self) -> std::result::Result<Vec<Operand>, String> {
        self.expect(Token::LBracket, "'['")?;
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RBracket) {
            self.next();
            return Ok(items);
        }
        loop {
            items.push(self.parse_operand()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => break,
                other => return Err(format!("Expected ',' or ']', found {:?}", other)),
            }
        }
        Ok(items)
    }
}
