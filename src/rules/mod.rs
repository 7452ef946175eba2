pub mod engine;
pub mod expr;

pub use engine::{RulePack, RulesEngine};
pub use expr::Condition;
