//! Merchant-defined override rules
//!
//! [`CustomRuleEngine`] evaluates an organization's active rules after
//! scoring; [`RuleService`] is the administrative CRUD surface.

mod engine;
mod evaluator;
mod service;
mod summary;

pub use engine::{rules_cache_key, CustomRuleEngine, MatchedRule, RuleOutcome, DEFAULT_RULE_CACHE_TTL};
pub use evaluator::{evaluate_condition, resolve_field};
pub use service::RuleService;
pub use summary::DetectorSummary;
