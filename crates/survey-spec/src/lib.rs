#![allow(missing_docs)]

pub mod answer;
pub mod condition;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod question_state;
pub mod spec;
pub mod state;
pub mod validate;
pub mod visibility;

pub use answer::Answer;
pub use condition::{Condition, DecisionOperator, Operator};
pub use error::{Result, SurveyError};
pub use evaluator::{AnswerProvider, ConditionEvaluator, CustomConditionHandler};
pub use export::AnswerExport;
pub use question_state::{QuestionEvent, QuestionState};
pub use spec::{
    AnswerShape, FieldSpec, QuestionSpec, QuestionType, SpecError, SubmitSpec, SurveySpec,
    ValidationOperation, ValidationRule, definition_schema,
};
pub use state::{
    AnswerStore, ListenerId, QuestionHandle, SubmitSurveyHandler, SurveyEvent, SurveyState,
    SurveyStateListener,
};
pub use validate::{DefaultValidator, ValidationOutcome, Validator};
pub use visibility::{
    FilteredQuestions, QuestionPosition, RecomputeStrategy, SkipStatusChange, VisibilityMap,
    resolve_visibility,
};
