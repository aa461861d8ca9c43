use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};
use tracing::debug;

use crate::answer::Answer;
use crate::condition::{Condition, DecisionOperator, Operator};
use crate::error::{Result, SurveyError};

/// Read access to the answers of a running survey.
pub trait AnswerProvider {
    fn answer_for(&self, question_id: &str) -> Option<&Answer>;

    /// The `{ "answers": { .. } }` export document.
    fn all_answers_json(&self) -> Result<String>;
}

impl AnswerProvider for BTreeMap<String, Answer> {
    fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.get(question_id)
    }

    fn all_answers_json(&self) -> Result<String> {
        Ok(json!({ "answers": self }).to_string())
    }
}

/// Host-supplied decision for `custom` conditions.
///
/// Receives an entry for every id the condition declares; unanswered
/// questions map to `None`.
pub trait CustomConditionHandler {
    fn is_condition_met(&self, answers: &BTreeMap<String, Option<Answer>>, extra: &Value) -> bool;
}

impl<F> CustomConditionHandler for F
where
    F: Fn(&BTreeMap<String, Option<Answer>>, &Value) -> bool,
{
    fn is_condition_met(&self, answers: &BTreeMap<String, Option<Answer>>, extra: &Value) -> bool {
        self(answers, extra)
    }
}

/// Evaluates `show_if` trees against an [`AnswerProvider`].
#[derive(Default)]
pub struct ConditionEvaluator {
    custom_handler: Option<Box<dyn CustomConditionHandler>>,
}

impl fmt::Debug for ConditionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("custom_handler", &self.custom_handler.is_some())
            .finish()
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom_handler(mut self, handler: impl CustomConditionHandler + 'static) -> Self {
        self.set_custom_handler(handler);
        self
    }

    pub fn set_custom_handler(&mut self, handler: impl CustomConditionHandler + 'static) {
        self.custom_handler = Some(Box::new(handler));
    }

    /// A missing condition means the question is always shown.
    pub fn evaluate(
        &self,
        condition: Option<&Condition>,
        answers: &dyn AnswerProvider,
    ) -> Result<bool> {
        match condition {
            Some(condition) => self.evaluate_condition(condition, answers),
            None => Ok(true),
        }
    }

    pub fn evaluate_condition(
        &self,
        condition: &Condition,
        answers: &dyn AnswerProvider,
    ) -> Result<bool> {
        let result = match condition {
            Condition::Simple {
                id,
                subid,
                operation,
                value,
            } => simple(id, subid.as_deref(), *operation, value, answers)?,
            Condition::Decision {
                operation,
                subconditions,
            } => self.decision(*operation, subconditions, answers)?,
            Condition::Custom { ids, extra } => {
                let handler = self
                    .custom_handler
                    .as_ref()
                    .ok_or(SurveyError::MissingHandler)?;
                let snapshot = ids
                    .iter()
                    .map(|id| (id.clone(), answers.answer_for(id).cloned()))
                    .collect::<BTreeMap<_, _>>();
                handler.is_condition_met(&snapshot, extra)
            }
        };
        debug!(?condition, result, "evaluated condition");
        Ok(result)
    }

    fn decision(
        &self,
        operation: DecisionOperator,
        subconditions: &[Condition],
        answers: &dyn AnswerProvider,
    ) -> Result<bool> {
        for condition in subconditions {
            let met = self.evaluate_condition(condition, answers)?;
            match operation {
                DecisionOperator::Or if met => return Ok(true),
                DecisionOperator::And if !met => return Ok(false),
                _ => {}
            }
        }
        Ok(operation == DecisionOperator::And)
    }
}

fn simple(
    id: &str,
    subid: Option<&str>,
    operation: Operator,
    literal: &str,
    answers: &dyn AnswerProvider,
) -> Result<bool> {
    let mut answer = answers.answer_for(id);
    if let Some(subid) = subid {
        answer = answer.and_then(|answer| answer.field(subid));
    }

    let Some(answer) = answer else {
        return Ok(absent_answer_result(operation));
    };

    let result = match operation {
        Operator::Eq => scalar_equals(answer, literal),
        Operator::Ne => !scalar_equals(answer, literal),
        Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => {
            let expected = parse_number(literal)?;
            let actual = parse_number(answer.as_scalar()?)?;
            let ordering = actual.total_cmp(&expected);
            match operation {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Ge => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
        // Both membership operators require a list; any other answer shape
        // yields false for either of them.
        Operator::Contains => list_membership(answer, literal) == Some(true),
        Operator::NotContains => list_membership(answer, literal) == Some(false),
    };
    Ok(result)
}

/// Outcome of a simple condition whose answer is missing. A string literal
/// never stands for "no answer", so `equals` is false and `not equals` true.
fn absent_answer_result(operation: Operator) -> bool {
    match operation {
        Operator::Eq => false,
        Operator::Ne => true,
        Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => false,
        Operator::Contains => false,
        Operator::NotContains => true,
    }
}

fn scalar_equals(answer: &Answer, literal: &str) -> bool {
    matches!(answer, Answer::Scalar(text) if text == literal)
}

fn list_membership(answer: &Answer, literal: &str) -> Option<bool> {
    match answer {
        Answer::List(items) => Some(items.iter().any(|item| item == literal)),
        _ => None,
    }
}

pub(crate) fn parse_number(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|source| SurveyError::NumericFormat {
            value: text.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn answers(entries: &[(&str, Answer)]) -> BTreeMap<String, Answer> {
        entries
            .iter()
            .map(|(id, answer)| (id.to_string(), answer.clone()))
            .collect()
    }

    fn eval(condition: &Condition, answers: &BTreeMap<String, Answer>) -> Result<bool> {
        ConditionEvaluator::new().evaluate(Some(condition), answers)
    }

    #[test]
    fn missing_condition_is_always_met() {
        let empty = BTreeMap::new();
        assert!(ConditionEvaluator::new().evaluate(None, &empty).unwrap());
    }

    #[test]
    fn equality_on_scalar() {
        let store = answers(&[("q1", Answer::scalar("5"))]);
        assert!(eval(&Condition::simple("q1", Operator::Eq, "5"), &store).unwrap());
        assert!(!eval(&Condition::simple("q1", Operator::Eq, "6"), &store).unwrap());
        assert!(eval(&Condition::simple("q1", Operator::Ne, "6"), &store).unwrap());
    }

    #[test]
    fn absent_answers_follow_default_table() {
        let empty = BTreeMap::new();
        let expectations = [
            (Operator::Eq, false),
            (Operator::Ne, true),
            (Operator::Gt, false),
            (Operator::Ge, false),
            (Operator::Lt, false),
            (Operator::Le, false),
            (Operator::Contains, false),
            (Operator::NotContains, true),
        ];
        for (operation, expected) in expectations {
            let condition = Condition::simple("missing", operation, "not-a-number");
            assert_eq!(eval(&condition, &empty).unwrap(), expected, "{operation:?}");
        }
    }

    #[test]
    fn ordered_comparisons_are_numeric() {
        let store = answers(&[("age", Answer::scalar(" 10 "))]);
        assert!(eval(&Condition::simple("age", Operator::Gt, "9.5"), &store).unwrap());
        assert!(!eval(&Condition::simple("age", Operator::Gt, "10"), &store).unwrap());
        assert!(eval(&Condition::simple("age", Operator::Ge, "10"), &store).unwrap());
        assert!(eval(&Condition::simple("age", Operator::Lt, "100"), &store).unwrap());
        assert!(eval(&Condition::simple("age", Operator::Le, "10.0"), &store).unwrap());
        assert!(!eval(&Condition::simple("age", Operator::Le, "2"), &store).unwrap());
    }

    #[test]
    fn unparseable_numbers_propagate() {
        let store = answers(&[("age", Answer::scalar("ten"))]);
        let err = eval(&Condition::simple("age", Operator::Gt, "3"), &store).unwrap_err();
        assert!(matches!(err, SurveyError::NumericFormat { ref value, .. } if value == "ten"));

        let store = answers(&[("age", Answer::scalar("4"))]);
        let err = eval(&Condition::simple("age", Operator::Lt, "x"), &store).unwrap_err();
        assert!(matches!(err, SurveyError::NumericFormat { ref value, .. } if value == "x"));
    }

    #[test]
    fn ordered_comparison_on_list_is_a_type_error() {
        let store = answers(&[("tags", Answer::list(["1"]))]);
        let err = eval(&Condition::simple("tags", Operator::Gt, "0"), &store).unwrap_err();
        assert!(matches!(err, SurveyError::AnswerType { .. }));
    }

    #[test]
    fn membership_on_lists_and_other_shapes() {
        let store = answers(&[
            ("tags", Answer::list(["a", "b"])),
            ("name", Answer::scalar("b")),
        ]);
        assert!(eval(&Condition::simple("tags", Operator::Contains, "b"), &store).unwrap());
        assert!(!eval(&Condition::simple("tags", Operator::Contains, "c"), &store).unwrap());
        assert!(!eval(&Condition::simple("tags", Operator::NotContains, "b"), &store).unwrap());
        assert!(eval(&Condition::simple("tags", Operator::NotContains, "c"), &store).unwrap());

        assert!(!eval(&Condition::simple("name", Operator::Contains, "b"), &store).unwrap());
        assert!(!eval(&Condition::simple("name", Operator::NotContains, "z"), &store).unwrap());
    }

    #[test]
    fn subid_reads_composite_fields() {
        let store = answers(&[
            (
                "address",
                Answer::composite([("country", Answer::scalar("US"))]),
            ),
            ("plain", Answer::scalar("US")),
        ]);
        let us = Condition::simple_field("address", "country", Operator::Eq, "US");
        assert!(eval(&us, &store).unwrap());
        let missing_field = Condition::simple_field("address", "zip", Operator::NotContains, "1");
        assert!(eval(&missing_field, &store).unwrap());
        let not_composite = Condition::simple_field("plain", "country", Operator::Eq, "US");
        assert!(!eval(&not_composite, &store).unwrap());
    }

    #[test]
    fn empty_decisions_use_identity_elements() {
        let empty = BTreeMap::new();
        assert!(eval(&Condition::and(vec![]), &empty).unwrap());
        assert!(!eval(&Condition::or(vec![]), &empty).unwrap());
    }

    #[test]
    fn decisions_short_circuit() {
        let store = answers(&[("n", Answer::scalar("nope"))]);
        let failing = Condition::simple("n", Operator::Gt, "1");
        let yes = Condition::simple("n", Operator::Eq, "nope");
        let no = Condition::simple("n", Operator::Eq, "other");

        assert!(eval(&Condition::or(vec![yes.clone(), failing.clone()]), &store).unwrap());
        assert!(!eval(&Condition::and(vec![no.clone(), failing.clone()]), &store).unwrap());
        assert!(eval(&Condition::and(vec![yes, failing]), &store).is_err());
        assert!(!eval(&Condition::or(vec![no.clone(), no]), &store).unwrap());
    }

    #[test]
    fn custom_requires_a_handler() {
        let empty = BTreeMap::new();
        let condition = Condition::custom(["q1"], Value::Null);
        let err = eval(&condition, &empty).unwrap_err();
        assert!(matches!(err, SurveyError::MissingHandler));
    }

    #[test]
    fn custom_handler_sees_declared_answers_and_extra() {
        let store = answers(&[("a", Answer::scalar("1")), ("other", Answer::scalar("2"))]);
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let evaluator = ConditionEvaluator::new().with_custom_handler(
            move |snapshot: &BTreeMap<String, Option<Answer>>, extra: &Value| {
                seen.set(seen.get() + 1);
                assert_eq!(snapshot.len(), 2);
                assert_eq!(snapshot["a"], Some(Answer::scalar("1")));
                assert_eq!(snapshot["b"], None);
                extra["pass"].as_bool().unwrap_or(false)
            },
        );
        let pass = Condition::custom(["a", "b"], json!({ "pass": true }));
        let fail = Condition::custom(["a", "b"], json!({ "pass": false }));
        assert!(evaluator.evaluate(Some(&pass), &store).unwrap());
        assert!(!evaluator.evaluate(Some(&fail), &store).unwrap());
        assert_eq!(calls.get(), 2);
    }
}
