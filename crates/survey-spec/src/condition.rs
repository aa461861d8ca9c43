use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by a simple condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Operator {
    #[serde(rename = "equals", alias = "eq")]
    Eq,
    #[serde(rename = "not equals", alias = "ne")]
    Ne,
    #[serde(rename = "greater than", alias = "gt")]
    Gt,
    #[serde(rename = "greater than or equal to", alias = "ge")]
    Ge,
    #[serde(rename = "less than", alias = "lt")]
    Lt,
    #[serde(rename = "less than or equal to", alias = "le")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains", alias = "not_contains")]
    NotContains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOperator {
    And,
    Or,
}

/// Skip-logic predicate attached to a question's `show_if`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Simple {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subid: Option<String>,
        operation: Operator,
        value: String,
    },
    Decision {
        operation: DecisionOperator,
        #[serde(default)]
        subconditions: Vec<Condition>,
    },
    Custom {
        ids: BTreeSet<String>,
        #[serde(default)]
        extra: Value,
    },
}

impl Condition {
    pub fn simple(id: impl Into<String>, operation: Operator, value: impl Into<String>) -> Self {
        Condition::Simple {
            id: id.into(),
            subid: None,
            operation,
            value: value.into(),
        }
    }

    pub fn simple_field(
        id: impl Into<String>,
        subid: impl Into<String>,
        operation: Operator,
        value: impl Into<String>,
    ) -> Self {
        Condition::Simple {
            id: id.into(),
            subid: Some(subid.into()),
            operation,
            value: value.into(),
        }
    }

    pub fn and(subconditions: Vec<Condition>) -> Self {
        Condition::Decision {
            operation: DecisionOperator::And,
            subconditions,
        }
    }

    pub fn or(subconditions: Vec<Condition>) -> Self {
        Condition::Decision {
            operation: DecisionOperator::Or,
            subconditions,
        }
    }

    pub fn custom<I, S>(ids: I, extra: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::Custom {
            ids: ids.into_iter().map(Into::into).collect(),
            extra,
        }
    }

    /// Every question id whose answer this condition can read.
    pub fn referenced_ids(&self) -> BTreeSet<&str> {
        let mut ids = BTreeSet::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Simple { id, .. } => {
                ids.insert(id.as_str());
            }
            Condition::Decision { subconditions, .. } => {
                for condition in subconditions {
                    condition.collect_ids(ids);
                }
            }
            Condition::Custom { ids: custom_ids, .. } => {
                ids.extend(custom_ids.iter().map(String::as_str));
            }
        }
    }
}
