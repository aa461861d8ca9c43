use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::answer::Answer;
use crate::condition::Condition;
use crate::spec::validation::ValidationRule;

/// Supported question widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleTextField,
    SingleTextArea,
    MultiTextField,
    SelectOne,
    SelectMultiple,
    YesNo,
    SegmentSelect,
    DatePicker,
    AddTextField,
    TableSelect,
}

/// Variant of [`Answer`] a question type produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    Scalar,
    List,
    Composite,
}

impl AnswerShape {
    pub fn matches(self, answer: &Answer) -> bool {
        match self {
            AnswerShape::Scalar => answer.is_scalar(),
            AnswerShape::List => answer.is_list(),
            AnswerShape::Composite => answer.is_composite(),
        }
    }
}

impl QuestionType {
    pub fn answer_shape(self) -> AnswerShape {
        match self {
            QuestionType::SelectMultiple | QuestionType::AddTextField => AnswerShape::List,
            QuestionType::MultiTextField | QuestionType::TableSelect => AnswerShape::Composite,
            _ => AnswerShape::Scalar,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QuestionType::SingleTextField => "single_text_field",
            QuestionType::SingleTextArea => "single_text_area",
            QuestionType::MultiTextField => "multi_text_field",
            QuestionType::SelectOne => "select_one",
            QuestionType::SelectMultiple => "select_multiple",
            QuestionType::YesNo => "yes_no",
            QuestionType::SegmentSelect => "segment_select",
            QuestionType::DatePicker => "date_picker",
            QuestionType::AddTextField => "add_text_field",
            QuestionType::TableSelect => "table_select",
        }
    }
}

/// Sub-question of a multi-part question; its id keys the composite answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
}

/// A single question of the survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionSpec {
    pub id: String,
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if: Option<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<ValidationRule>,
}

impl QuestionSpec {
    pub fn new(
        id: impl Into<String>,
        question_type: QuestionType,
        question: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            question_type,
            question: question.into(),
            header: None,
            label: None,
            options: Vec::new(),
            fields: Vec::new(),
            show_if: None,
            validations: Vec::new(),
        }
    }

    pub fn with_show_if(mut self, condition: Condition) -> Self {
        self.show_if = Some(condition);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, rule: ValidationRule) -> Self {
        self.validations.push(rule);
        self
    }
}
