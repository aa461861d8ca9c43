use std::collections::BTreeMap;

use crate::answer::Answer;
use crate::error::{Result, SurveyError};

pub const QUESTION_ID_KEY: &str = "question_id";
pub const ANSWER_KEY: &str = "answer";

/// Notification produced by every successful mutation of a [`QuestionState`].
///
/// Attribute writes never influence visibility, answers always may, so the
/// listener can tell "ignore" apart from "must re-filter".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionEvent {
    StateChanged,
    Answered,
}

/// Per-question mutable record owned by the survey state.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionState {
    id: String,
    attributes: BTreeMap<String, String>,
    answer: Option<Answer>,
}

impl QuestionState {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
            answer: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<QuestionEvent> {
        let key = key.into();
        let hint = match key.as_str() {
            QUESTION_ID_KEY => Some("the question id cannot be updated"),
            ANSWER_KEY => Some("answers are updated through set_answer"),
            _ => None,
        };
        if let Some(hint) = hint {
            return Err(SurveyError::ReservedKey { key, hint });
        }
        self.attributes.insert(key, value.into());
        Ok(QuestionEvent::StateChanged)
    }

    /// Replaces the stored answer; answers are never merged.
    pub fn set_answer(&mut self, answer: Answer) -> QuestionEvent {
        self.answer = Some(answer);
        QuestionEvent::Answered
    }

    pub(crate) fn restore_answer(&mut self, previous: Option<Answer>) {
        self.answer = previous;
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.answer.as_ref()
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }
}
