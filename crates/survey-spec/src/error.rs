use thiserror::Error;

/// Errors raised while mutating or evaluating a survey.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("attribute key '{key}' is reserved; {hint}")]
    ReservedKey { key: String, hint: &'static str },
    #[error("cannot compare '{value}' numerically")]
    NumericFormat {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
    #[error("a custom condition handler must be configured before evaluating custom conditions")]
    MissingHandler,
    #[error("the question filter is not initialized; call init_filter first")]
    NotInitialized,
    #[error("answer is a {found}, expected a {expected}")]
    AnswerType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("no submit handler is configured")]
    MissingSubmitHandler,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
}

pub type Result<T, E = SurveyError> = std::result::Result<T, E>;
