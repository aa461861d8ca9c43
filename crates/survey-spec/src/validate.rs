use std::cmp::Ordering;

use regex::Regex;
use serde::Serialize;

use crate::answer::Answer;
use crate::evaluator::{AnswerProvider, parse_number};
use crate::spec::question::QuestionSpec;
use crate::spec::validation::{ValidationOperation, ValidationRule};

/// Result of checking one answer against its question's rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub failures: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            valid: true,
            failures: Vec::new(),
        }
    }

    fn from_failures(failures: Vec<String>) -> Self {
        Self {
            valid: failures.is_empty(),
            failures,
        }
    }
}

/// Answer validation consulted by hosts before an answer is applied.
/// Condition evaluation never calls it.
pub trait Validator {
    fn validate(
        &self,
        question: &QuestionSpec,
        answer: &Answer,
        answers: &dyn AnswerProvider,
    ) -> ValidationOutcome;
}

/// Applies a question's [`ValidationRule`]s to scalar answers and checks the
/// answer shape against the question type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn validate(
        &self,
        question: &QuestionSpec,
        answer: &Answer,
        answers: &dyn AnswerProvider,
    ) -> ValidationOutcome {
        let shape = question.question_type.answer_shape();
        if !shape.matches(answer) {
            return ValidationOutcome::from_failures(vec![format!(
                "expected a {:?} answer for {}",
                shape,
                question.question_type.label()
            )
            .to_lowercase()]);
        }

        // Rules only constrain single values.
        let Answer::Scalar(text) = answer else {
            return ValidationOutcome::valid();
        };

        let failures = question
            .validations
            .iter()
            .filter(|rule| !rule_passes(rule, text, answers))
            .map(|rule| rule.on_fail_message.clone())
            .collect();
        ValidationOutcome::from_failures(failures)
    }
}

fn rule_passes(rule: &ValidationRule, text: &str, answers: &dyn AnswerProvider) -> bool {
    let operand = match &rule.answer_to_question_id {
        Some(question_id) => answers
            .answer_for(question_id)
            .and_then(|answer| answer.as_scalar().ok())
            .map(str::to_string),
        None => rule.literal(),
    };
    // A rule comparing against an unanswered question has nothing to check.
    let Some(operand) = operand else {
        return rule.answer_to_question_id.is_some();
    };

    match rule.operation {
        ValidationOperation::Equals => text == operand,
        ValidationOperation::NotEquals => text != operand,
        ValidationOperation::Pattern => Regex::new(&operand)
            .map(|regex| regex.is_match(text))
            .unwrap_or(false),
        ValidationOperation::GreaterThan
        | ValidationOperation::GreaterThanOrEqualTo
        | ValidationOperation::LessThan
        | ValidationOperation::LessThanOrEqualTo => {
            let (Ok(actual), Ok(expected)) = (parse_number(text), parse_number(&operand)) else {
                return false;
            };
            let ordering = actual.total_cmp(&expected);
            match rule.operation {
                ValidationOperation::GreaterThan => ordering == Ordering::Greater,
                ValidationOperation::GreaterThanOrEqualTo => ordering != Ordering::Less,
                ValidationOperation::LessThan => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
    }
}
