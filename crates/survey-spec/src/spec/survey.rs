use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::question::QuestionSpec;

/// Where and how the finished survey is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitSpec {
    pub button_title: String,
    pub url: String,
}

/// Top-level survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub questions: Vec<QuestionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<SubmitSpec>,
}

/// Structural problem found in a survey definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("question id '{0}' is defined more than once")]
    DuplicateQuestion(String),
    #[error("question '{question}' has a condition on unknown question '{referenced}'")]
    UnknownReference { question: String, referenced: String },
}

impl SurveySpec {
    pub fn new(questions: Vec<QuestionSpec>) -> Self {
        Self {
            id: None,
            title: None,
            questions,
            submit: None,
        }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn question(&self, id: &str) -> Option<&QuestionSpec> {
        self.questions.iter().find(|question| question.id == id)
    }

    /// Lists duplicate ids and conditions pointing at questions that do not
    /// exist. An empty result means the definition is usable.
    pub fn check(&self) -> Vec<SpecError> {
        let mut problems = Vec::new();
        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                problems.push(SpecError::DuplicateQuestion(question.id.clone()));
            }
        }

        for question in &self.questions {
            let Some(condition) = &question.show_if else {
                continue;
            };
            for referenced in condition.referenced_ids() {
                if !seen.contains(referenced) {
                    problems.push(SpecError::UnknownReference {
                        question: question.id.clone(),
                        referenced: referenced.to_string(),
                    });
                }
            }
        }
        problems
    }
}
