pub mod question;
pub mod survey;
pub mod validation;

pub use question::{AnswerShape, FieldSpec, QuestionSpec, QuestionType};
pub use survey::{SpecError, SubmitSpec, SurveySpec};
pub use validation::{ValidationOperation, ValidationRule};

/// JSON schema describing the survey definition format.
pub fn definition_schema() -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(SurveySpec))
}
