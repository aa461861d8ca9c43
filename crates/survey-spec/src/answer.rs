use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SurveyError};

/// A single question's response.
///
/// Serialized untagged so that an answer reads the same way it is exported:
/// a scalar is a JSON string, a list is an array of strings and a composite
/// is an object of nested answers keyed by sub-question id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Scalar(String),
    List(Vec<String>),
    Composite(BTreeMap<String, Answer>),
}

impl Answer {
    pub fn scalar(text: impl Into<String>) -> Self {
        Answer::Scalar(text.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::List(items.into_iter().map(Into::into).collect())
    }

    pub fn composite<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Answer)>,
        K: Into<String>,
    {
        Answer::Composite(
            fields
                .into_iter()
                .map(|(key, answer)| (key.into(), answer))
                .collect(),
        )
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Answer::Scalar(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Answer::List(_))
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Answer::Composite(_))
    }

    /// Label of the populated variant, used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Answer::Scalar(_) => "scalar",
            Answer::List(_) => "list",
            Answer::Composite(_) => "composite",
        }
    }

    pub fn as_scalar(&self) -> Result<&str> {
        match self {
            Answer::Scalar(text) => Ok(text),
            other => Err(mismatch("scalar", other)),
        }
    }

    pub fn as_list(&self) -> Result<&[String]> {
        match self {
            Answer::List(items) => Ok(items),
            other => Err(mismatch("list", other)),
        }
    }

    pub fn as_composite(&self) -> Result<&BTreeMap<String, Answer>> {
        match self {
            Answer::Composite(fields) => Ok(fields),
            other => Err(mismatch("composite", other)),
        }
    }

    /// Looks up a sub-answer; anything but a composite has no fields.
    pub fn field(&self, key: &str) -> Option<&Answer> {
        match self {
            Answer::Composite(fields) => fields.get(key),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Answer::Scalar(text) => Value::String(text.clone()),
            Answer::List(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            Answer::Composite(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, answer)| (key.clone(), answer.to_value()))
                    .collect(),
            ),
        }
    }

    /// Reads an answer back from its exported JSON shape.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

fn mismatch(expected: &'static str, found: &Answer) -> SurveyError {
    SurveyError::AnswerType {
        expected,
        found: found.kind(),
    }
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        Answer::Scalar(text.to_string())
    }
}

impl From<String> for Answer {
    fn from(text: String) -> Self {
        Answer::Scalar(text)
    }
}

impl From<Vec<String>> for Answer {
    fn from(items: Vec<String>) -> Self {
        Answer::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_reject_wrong_variant() {
        let answer = Answer::list(["a", "b"]);
        assert!(answer.is_list());
        assert_eq!(answer.as_list().unwrap(), ["a", "b"]);
        let err = answer.as_scalar().unwrap_err();
        assert!(matches!(
            err,
            SurveyError::AnswerType {
                expected: "scalar",
                found: "list"
            }
        ));
    }

    #[test]
    fn field_lookup_only_applies_to_composites() {
        let answer = Answer::composite([("street", Answer::scalar("Main"))]);
        assert_eq!(answer.field("street"), Some(&Answer::scalar("Main")));
        assert_eq!(answer.field("city"), None);
        assert_eq!(Answer::scalar("Main").field("street"), None);
    }

    #[test]
    fn value_shape_mirrors_variants() {
        let answer = Answer::composite([
            ("name", Answer::scalar("Ada")),
            ("langs", Answer::list(["en", "fr"])),
            (
                "address",
                Answer::composite([("zip", Answer::scalar("02139"))]),
            ),
        ]);
        let value = answer.to_value();
        assert_eq!(
            value,
            json!({
                "name": "Ada",
                "langs": ["en", "fr"],
                "address": { "zip": "02139" }
            })
        );
        assert_eq!(Answer::from_value(value).unwrap(), answer);
    }

    #[test]
    fn from_value_rejects_non_string_leaves() {
        assert!(Answer::from_value(json!(42)).is_err());
        assert!(Answer::from_value(json!([1, 2])).is_err());
    }
}
