use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Check applied to a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ValidationOperation {
    #[serde(rename = "equals")]
    Equals,
    #[serde(rename = "not equals")]
    NotEquals,
    #[serde(rename = "greater than")]
    GreaterThan,
    #[serde(rename = "greater than or equal to")]
    GreaterThanOrEqualTo,
    #[serde(rename = "less than")]
    LessThan,
    #[serde(rename = "less than or equal to")]
    LessThanOrEqualTo,
    #[serde(rename = "pattern")]
    Pattern,
}

/// Validation rule attached to a question.
///
/// The operand is either the literal `value` (string or number) or the
/// scalar answer of `answer_to_question_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationRule {
    pub operation: ValidationOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_to_question_id: Option<String>,
    pub on_fail_message: String,
}

impl ValidationRule {
    pub fn against_value(
        operation: ValidationOperation,
        value: impl Into<Value>,
        on_fail_message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            value: Some(value.into()),
            answer_to_question_id: None,
            on_fail_message: on_fail_message.into(),
        }
    }

    pub fn against_answer(
        operation: ValidationOperation,
        question_id: impl Into<String>,
        on_fail_message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            value: None,
            answer_to_question_id: Some(question_id.into()),
            on_fail_message: on_fail_message.into(),
        }
    }

    /// The literal operand rendered as text, if one is configured.
    pub fn literal(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
