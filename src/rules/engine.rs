use crate::domain::model::{Portfolio, RiskCategory};
use crate::rules::expr::Condition;
use crate::utils::error::{Result, ScreenError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const OVERALL_RISK: &str = "overall_risk";
pub const RULEPACK_VERSION: &str = "rulepack_version";
pub const RULEPACK_NAME: &str = "rulepack_name";
pub const RULE_AUDIT: &str = "rule_audit";

/// A rule pack as written in YAML. `logic` maps a dimension name (e.g.
/// `biodiversity`) to an ordered rule list; each entry is either a
/// `when`/`then` pair or a `default` fallback.
#[derive(Debug, Clone, Deserialize)]
pub struct RulePack {
    pub version: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub logic: BTreeMap<String, Vec<RuleSpec>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub then: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

struct CompiledDimension {
    name: String,
    rules: Vec<(Condition, RiskCategory)>,
    fallback: Option<RiskCategory>,
}

impl RulePack {
    pub fn from_yaml_str(content: &str) -> Result<RulePack> {
        let pack: RulePack = serde_yaml::from_str(content)?;
        pack.compile()?; // surface condition errors at load time
        Ok(pack)
    }

    fn compile(&self) -> Result<Vec<CompiledDimension>> {
        let mut dimensions = Vec::new();
        for (name, specs) in &self.logic {
            let mut rules = Vec::new();
            let mut fallback = None;
            for spec in specs {
                match (&spec.when, &spec.then, &spec.default) {
                    (Some(when), Some(then), None) => {
                        let condition = Condition::parse(when)?;
                        rules.push((condition, parse_category(name, then)?));
                    }
                    (None, None, Some(default)) => {
                        // First default wins when a pack lists several.
                        if fallback.is_none() {
                            fallback = Some(parse_category(name, default)?);
                        }
                    }
                    _ => {
                        return Err(ScreenError::RuleError {
                            expression: name.clone(),
                            message: "Each rule needs either when+then or default".to_string(),
                        })
                    }
                }
            }
            dimensions.push(CompiledDimension {
                name: name.clone(),
                rules,
                fallback,
            });
        }
        Ok(dimensions)
    }
}

fn parse_category(dimension: &str, label: &str) -> Result<RiskCategory> {
    RiskCategory::from_str(label).map_err(|message| ScreenError::RuleError {
        expression: dimension.to_string(),
        message,
    })
}

/// Loads rule packs from a directory and evaluates them over a portfolio.
pub struct RulesEngine {
    rules_path: PathBuf,
}

impl RulesEngine {
    pub fn new<P: AsRef<Path>>(rules_path: P) -> Self {
        Self {
            rules_path: rules_path.as_ref().to_path_buf(),
        }
    }

    pub fn load_pack(&self, pack_filename: &str) -> Result<RulePack> {
        let path = self.rules_path.join(pack_filename);
        let content = std::fs::read_to_string(&path)?;
        RulePack::from_yaml_str(&content)
    }

    /// First matching `when` wins per dimension; the `default` applies only
    /// when nothing matched. Fired rules are recorded in the audit trail as
    /// `dimension:condition=>category`. After all dimensions the overall risk
    /// is the worst assigned category across every dimension.
    pub fn evaluate(&self, mut portfolio: Portfolio, pack: &RulePack) -> Result<Portfolio> {
        let dimensions = pack.compile()?;
        let mut audits: Vec<Vec<String>> = vec![Vec::new(); portfolio.len()];
        let mut overall: Vec<Option<RiskCategory>> = vec![None; portfolio.len()];

        for dimension in &dimensions {
            let column = format!("{}_category", dimension.name);
            portfolio.push_column(&column);

            for (i, record) in portfolio.records.iter_mut().enumerate() {
                let mut assigned = None;
                for (condition, category) in &dimension.rules {
                    if condition.evaluate(&record.attrs, &pack.parameters)? {
                        assigned = Some(*category);
                        audits[i].push(format!(
                            "{}:{}=>{}",
                            dimension.name,
                            condition.source(),
                            category
                        ));
                        break;
                    }
                }
                let assigned = assigned.or(dimension.fallback);
                overall[i] = RiskCategory::worst(overall[i], assigned);
                record.set(
                    &column,
                    assigned.map(|c| Value::from(c.as_str())).unwrap_or(Value::Null),
                );
            }
        }

        portfolio.push_column(RULEPACK_VERSION);
        portfolio.push_column(RULEPACK_NAME);
        portfolio.push_column(RULE_AUDIT);
        portfolio.push_column(OVERALL_RISK);

        for (i, record) in portfolio.records.iter_mut().enumerate() {
            record.set(RULEPACK_VERSION, Value::from(pack.version));
            record.set(RULEPACK_NAME, Value::from(pack.name.as_str()));
            record.set(
                RULE_AUDIT,
                Value::Array(audits[i].iter().map(|a| Value::from(a.as_str())).collect()),
            );
            record.set(
                OVERALL_RISK,
                overall[i].map(|c| Value::from(c.as_str())).unwrap_or(Value::Null),
            );
        }

        Ok(portfolio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SiteRecord;
    use serde_json::json;

    const TEST_PACK: &str = r#"
version: 1
name: test_pack
description: Test rules
parameters:
  near_water_m: 1000
logic:
  biodiversity:
    - when: "protected_site_code not null"
      then: High
    - when: "landcover_code in ['311', '312', '313']"
      then: Medium
    - default: Low
  water:
    - when: "wfd_status == 'Poor' and dist_water_m <= near_water_m"
      then: High
    - when: "dist_water_m <= near_water_m"
      then: Medium
    - default: Low
"#;

    fn record(pairs: &[(&str, Value)]) -> SiteRecord {
        let mut r = SiteRecord::new();
        for (k, v) in pairs {
            r.set(k, v.clone());
        }
        r
    }

    fn portfolio(records: Vec<SiteRecord>) -> Portfolio {
        let mut p = Portfolio::new(vec![]);
        p.records = records;
        p
    }

    #[test]
    fn test_pack_eval_assigns_categories() {
        let pack = RulePack::from_yaml_str(TEST_PACK).unwrap();
        let p = portfolio(vec![record(&[
            ("protected_site_code", json!("X1")),
            ("landcover_code", json!("111")),
            ("dist_water_m", json!(500)),
            ("wfd_status", json!("Poor")),
        ])]);

        let engine = RulesEngine::new(".");
        let out = engine.evaluate(p, &pack).unwrap();
        let r = &out.records[0];

        assert_eq!(r.text("biodiversity_category"), Some("High"));
        assert_eq!(r.text("water_category"), Some("High"));
        assert_eq!(r.text(OVERALL_RISK), Some("High"));
        assert_eq!(r.number(RULEPACK_VERSION), Some(1.0));
        assert_eq!(r.text(RULEPACK_NAME), Some("test_pack"));

        let audit = r.get(RULE_AUDIT).unwrap().as_array().unwrap();
        assert_eq!(audit.len(), 2);
        assert!(audit[0].as_str().unwrap().starts_with("biodiversity:"));
    }

    #[test]
    fn test_default_applies_when_nothing_matches() {
        let pack = RulePack::from_yaml_str(TEST_PACK).unwrap();
        let p = portfolio(vec![record(&[
            ("protected_site_code", Value::Null),
            ("landcover_code", json!("999")),
            ("dist_water_m", json!(5000)),
            ("wfd_status", Value::Null),
        ])]);

        let engine = RulesEngine::new(".");
        let out = engine.evaluate(p, &pack).unwrap();
        let r = &out.records[0];

        assert_eq!(r.text("biodiversity_category"), Some("Low"));
        assert_eq!(r.text("water_category"), Some("Low"));
        assert_eq!(r.text(OVERALL_RISK), Some("Low"));
        assert!(r.get(RULE_AUDIT).unwrap().as_array().unwrap().is_empty());
    }

    #[test]
    fn test_first_match_wins() {
        let pack = RulePack::from_yaml_str(TEST_PACK).unwrap();
        // Poor status near water matches the first water rule, not the second.
        let p = portfolio(vec![record(&[
            ("protected_site_code", Value::Null),
            ("landcover_code", Value::Null),
            ("dist_water_m", json!(800)),
            ("wfd_status", json!("Poor")),
        ])]);

        let engine = RulesEngine::new(".");
        let out = engine.evaluate(p, &pack).unwrap();
        assert_eq!(out.records[0].text("water_category"), Some("High"));
    }

    #[test]
    fn test_overall_is_worst_across_dimensions() {
        let pack = RulePack::from_yaml_str(TEST_PACK).unwrap();
        let p = portfolio(vec![record(&[
            ("protected_site_code", Value::Null),
            ("landcover_code", json!("312")), // biodiversity Medium
            ("dist_water_m", json!(5000)),    // water Low
            ("wfd_status", Value::Null),
        ])]);

        let engine = RulesEngine::new(".");
        let out = engine.evaluate(p, &pack).unwrap();
        let r = &out.records[0];
        assert_eq!(r.text("biodiversity_category"), Some("Medium"));
        assert_eq!(r.text("water_category"), Some("Low"));
        assert_eq!(r.text(OVERALL_RISK), Some("Medium"));
    }

    #[test]
    fn test_malformed_rule_rejected_at_load() {
        let bad = r#"
version: 1
name: bad
logic:
  biodiversity:
    - when: "x == 1"
"#;
        assert!(RulePack::from_yaml_str(bad).is_err());

        let bad_cond = r#"
version: 1
name: bad
logic:
  biodiversity:
    - when: "x = 1"
      then: High
"#;
        assert!(RulePack::from_yaml_str(bad_cond).is_err());

        let bad_category = r#"
version: 1
name: bad
logic:
  biodiversity:
    - when: "x == 1"
      then: Extreme
"#;
        assert!(RulePack::from_yaml_str(bad_category).is_err());
    }

    #[test]
    fn test_load_pack_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pack.yaml"), TEST_PACK).unwrap();

        let engine = RulesEngine::new(dir.path());
        let pack = engine.load_pack("pack.yaml").unwrap();
        assert_eq!(pack.name, "test_pack");
        assert_eq!(pack.version, 1);
        assert_eq!(pack.logic.len(), 2);
    }
}
