//! Merchant-defined override rules
//!
//! A rule pairs a condition tree with an action. Conditions are either a
//! leaf comparison or an AND/OR group of further conditions:
//!
//! ```json
//! {
//!   "operator": "AND",
//!   "conditions": [
//!     { "field": "amount", "operator": ">", "value": 50000 },
//!     { "field": "card_country", "operator": "IN", "value": ["NG", "RU"] }
//!   ]
//! }
//! ```

use crate::decision::Decision;
use crate::error::{CoreError, Result};
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of active rules per organization
pub const MAX_ACTIVE_RULES: usize = 10;

/// Maximum nesting of AND/OR groups
pub const MAX_CONDITION_DEPTH: usize = 5;

/// Fields a leaf condition can inspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Amount,
    Currency,
    CardCountry,
    IpCountry,
    CustomerEmail,
    Velocity,
    TrustScore,
    RiskScore,
}

impl RuleField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleField::Amount => "amount",
            RuleField::Currency => "currency",
            RuleField::CardCountry => "card_country",
            RuleField::IpCountry => "ip_country",
            RuleField::CustomerEmail => "customer_email",
            RuleField::Velocity => "velocity",
            RuleField::TrustScore => "trust_score",
            RuleField::RiskScore => "risk_score",
        }
    }

    /// Code-like fields are compared case-insensitively
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            RuleField::Currency | RuleField::CardCountry | RuleField::IpCountry
        )
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leaf comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "IN", alias = "in")]
    In,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::In => "IN",
        };
        f.write_str(s)
    }
}

/// Group combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// `{field, operator, value}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafCondition {
    pub field: RuleField,
    pub operator: ComparisonOperator,
    pub value: Value,
}

/// `{operator: AND|OR, conditions: [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalCondition {
    pub operator: LogicalOperator,
    pub conditions: Vec<RuleCondition>,
}

/// Recursive condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleCondition {
    Logical(LogicalCondition),
    Leaf(LeafCondition),
}

impl RuleCondition {
    pub fn leaf(field: RuleField, operator: ComparisonOperator, value: impl Into<Value>) -> Self {
        RuleCondition::Leaf(LeafCondition {
            field,
            operator,
            value: value.into(),
        })
    }

    pub fn all(conditions: Vec<RuleCondition>) -> Self {
        RuleCondition::Logical(LogicalCondition {
            operator: LogicalOperator::And,
            conditions,
        })
    }

    pub fn any(conditions: Vec<RuleCondition>) -> Self {
        RuleCondition::Logical(LogicalCondition {
            operator: LogicalOperator::Or,
            conditions,
        })
    }

    /// Nesting depth; a leaf has depth 1
    pub fn depth(&self) -> usize {
        match self {
            RuleCondition::Leaf(_) => 1,
            RuleCondition::Logical(group) => {
                1 + group.conditions.iter().map(|c| c.depth()).max().unwrap_or(0)
            }
        }
    }

    /// Structural checks run before a rule is stored
    pub fn validate(&self) -> Result<()> {
        if self.depth() > MAX_CONDITION_DEPTH {
            return Err(CoreError::InvalidRule(format!(
                "condition nesting exceeds {} levels",
                MAX_CONDITION_DEPTH
            )));
        }
        self.validate_node()
    }

    fn validate_node(&self) -> Result<()> {
        match self {
            RuleCondition::Leaf(leaf) => match (&leaf.operator, &leaf.value) {
                (ComparisonOperator::In, Value::Array(_)) => Ok(()),
                (ComparisonOperator::In, other) => Err(CoreError::InvalidRule(format!(
                    "IN on '{}' requires a list, got {}",
                    leaf.field,
                    other.type_name()
                ))),
                (ComparisonOperator::Gt | ComparisonOperator::Lt, Value::Number(_)) => Ok(()),
                (ComparisonOperator::Gt | ComparisonOperator::Lt, other) => {
                    Err(CoreError::InvalidRule(format!(
                        "'{}' on '{}' requires a number, got {}",
                        leaf.operator,
                        leaf.field,
                        other.type_name()
                    )))
                }
                (_, Value::Null) => Err(CoreError::InvalidRule(format!(
                    "condition on '{}' has no value",
                    leaf.field
                ))),
                _ => Ok(()),
            },
            RuleCondition::Logical(group) => {
                if group.conditions.is_empty() {
                    return Err(CoreError::InvalidRule(
                        "logical group has no conditions".to_string(),
                    ));
                }
                group.conditions.iter().try_for_each(|c| c.validate_node())
            }
        }
    }
}

/// A stored merchant rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRule {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub condition: RuleCondition,
    pub action: Decision,
    /// Lower numbers are evaluated first
    pub priority: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub condition: RuleCondition,
    pub action: Decision,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RuleDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidRule("rule name is empty".to_string()));
        }
        self.condition.validate()
    }
}
