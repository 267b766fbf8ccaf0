//! Condition evaluation

use super::summary::DetectorSummary;
use crate::error::{Result, RuntimeError};
use riskgate_core::rule::{ComparisonOperator, LeafCondition, LogicalOperator};
use riskgate_core::{DetectionContext, RuleCondition, RuleField, Value};

/// Current value of a rule field; `Value::Null` when unknown
pub fn resolve_field(field: RuleField, context: &DetectionContext, summary: &DetectorSummary) -> Value {
    match field {
        RuleField::Amount => Value::Number(context.amount as f64),
        RuleField::Currency => Value::String(context.currency.clone()),
        RuleField::CardCountry => context.card_country.clone().into(),
        RuleField::IpCountry => summary.ip_country.clone().into(),
        RuleField::CustomerEmail => context.customer_email.clone().into(),
        RuleField::Velocity => summary.velocity.into(),
        RuleField::TrustScore => summary.trust_score.into(),
        RuleField::RiskScore => Value::Number(summary.risk_score),
    }
}

/// Evaluate a condition tree. `AND` and `OR` short-circuit.
pub fn evaluate_condition(
    condition: &RuleCondition,
    context: &DetectionContext,
    summary: &DetectorSummary,
) -> Result<bool> {
    match condition {
        RuleCondition::Leaf(leaf) => evaluate_leaf(leaf, context, summary),
        RuleCondition::Logical(group) => match group.operator {
            LogicalOperator::And => {
                for c in &group.conditions {
                    if !evaluate_condition(c, context, summary)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            LogicalOperator::Or => {
                for c in &group.conditions {
                    if evaluate_condition(c, context, summary)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        },
    }
}

fn evaluate_leaf(
    leaf: &LeafCondition,
    context: &DetectionContext,
    summary: &DetectorSummary,
) -> Result<bool> {
    let left = resolve_field(leaf.field, context, summary);

    // Missing data never matches
    if left.is_null() {
        tracing::debug!(field = %leaf.field, "field is null, condition does not match");
        return Ok(false);
    }

    if leaf.field.is_code() {
        compare(&upper(&left), &leaf.operator, &upper(&leaf.value))
    } else {
        compare(&left, &leaf.operator, &leaf.value)
    }
}

fn upper(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_ascii_uppercase()),
        Value::Array(items) => Value::Array(items.iter().map(upper).collect()),
        other => other.clone(),
    }
}

fn compare(left: &Value, op: &ComparisonOperator, right: &Value) -> Result<bool> {
    match (left, op, right) {
        (_, _, Value::Null) => Ok(false),

        (Value::Number(l), ComparisonOperator::Gt, Value::Number(r)) => Ok(l > r),
        (Value::Number(l), ComparisonOperator::Lt, Value::Number(r)) => Ok(l < r),
        (Value::Number(l), ComparisonOperator::Eq, Value::Number(r)) => Ok(l == r),
        (Value::Number(l), ComparisonOperator::Ne, Value::Number(r)) => Ok(l != r),

        (Value::String(l), ComparisonOperator::Eq, Value::String(r)) => Ok(l == r),
        (Value::String(l), ComparisonOperator::Ne, Value::String(r)) => Ok(l != r),

        (Value::Bool(l), ComparisonOperator::Eq, Value::Bool(r)) => Ok(l == r),
        (Value::Bool(l), ComparisonOperator::Ne, Value::Bool(r)) => Ok(l != r),

        (_, ComparisonOperator::In, Value::Array(items)) => Ok(items.iter().any(|item| item == left)),

        _ => Err(RuntimeError::Evaluation(format!(
            "cannot compare {} {} {}",
            left.type_name(),
            op,
            right.type_name()
        ))),
    }
}
