use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::Result;
use crate::evaluator::{AnswerProvider, ConditionEvaluator};
use crate::spec::question::QuestionSpec;
use crate::spec::survey::SurveySpec;

pub type VisibilityMap = BTreeMap<String, bool>;

/// Evaluates every question's `show_if` once against the given answers.
pub fn resolve_visibility(
    spec: &SurveySpec,
    evaluator: &ConditionEvaluator,
    answers: &dyn AnswerProvider,
) -> Result<VisibilityMap> {
    let mut map = VisibilityMap::new();
    for question in &spec.questions {
        let visible = evaluator.evaluate(question.show_if.as_ref(), answers)?;
        map.insert(question.id.clone(), visible);
    }
    Ok(map)
}

/// Which questions are re-evaluated after an answer changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecomputeStrategy {
    /// Every question, on every answer.
    #[default]
    Full,
    /// Only questions whose condition references the answered question.
    DependencyIndexed,
}

/// A question together with its adapter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPosition {
    pub question_id: String,
    pub position: usize,
}

/// Visibility flips produced by one recompute.
///
/// Skipped positions refer to the visible ordering before the recompute,
/// shown positions to the ordering after it. Both lists follow question
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipStatusChange {
    pub newly_skipped: Vec<QuestionPosition>,
    pub newly_shown: Vec<QuestionPosition>,
}

impl SkipStatusChange {
    pub fn is_empty(&self) -> bool {
        self.newly_skipped.is_empty() && self.newly_shown.is_empty()
    }
}

/// The visible subset of the survey's questions under the current answers.
#[derive(Debug)]
pub struct FilteredQuestions {
    spec: Arc<SurveySpec>,
    visible: Vec<bool>,
    strategy: RecomputeStrategy,
    dependents: BTreeMap<String, Vec<usize>>,
}

impl FilteredQuestions {
    pub fn new(
        spec: Arc<SurveySpec>,
        strategy: RecomputeStrategy,
        evaluator: &ConditionEvaluator,
        answers: &dyn AnswerProvider,
    ) -> Result<Self> {
        let visible = spec
            .questions
            .iter()
            .map(|question| evaluator.evaluate(question.show_if.as_ref(), answers))
            .collect::<Result<Vec<_>>>()?;

        let mut dependents: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, question) in spec.questions.iter().enumerate() {
            if let Some(condition) = &question.show_if {
                for id in condition.referenced_ids() {
                    dependents.entry(id.to_string()).or_default().push(index);
                }
            }
        }

        Ok(Self {
            spec,
            visible,
            strategy,
            dependents,
        })
    }

    pub fn strategy(&self) -> RecomputeStrategy {
        self.strategy
    }

    /// Re-evaluates visibility after `question_id` was answered.
    ///
    /// All new flags are computed before any are stored, so every reported
    /// position comes from one consistent snapshot and a failed evaluation
    /// leaves the previous visibility in place.
    #[instrument(skip(self, evaluator, answers), fields(strategy = ?self.strategy))]
    pub fn question_answered(
        &mut self,
        question_id: &str,
        evaluator: &ConditionEvaluator,
        answers: &dyn AnswerProvider,
    ) -> Result<SkipStatusChange> {
        let mut next = self.visible.clone();
        match self.strategy {
            RecomputeStrategy::Full => {
                for (slot, question) in next.iter_mut().zip(&self.spec.questions) {
                    *slot = evaluator.evaluate(question.show_if.as_ref(), answers)?;
                }
            }
            RecomputeStrategy::DependencyIndexed => {
                if let Some(indices) = self.dependents.get(question_id) {
                    for &index in indices {
                        let condition = self.spec.questions[index].show_if.as_ref();
                        next[index] = evaluator.evaluate(condition, answers)?;
                    }
                }
            }
        }

        let change = self.diff(&next);
        self.visible = next;
        debug!(
            skipped = change.newly_skipped.len(),
            shown = change.newly_shown.len(),
            visible = self.size(),
            "recomputed visibility"
        );
        Ok(change)
    }

    fn diff(&self, next: &[bool]) -> SkipStatusChange {
        let mut change = SkipStatusChange::default();
        let mut old_position = 0;
        let mut new_position = 0;
        for ((question, &was), &is) in self.spec.questions.iter().zip(&self.visible).zip(next) {
            match (was, is) {
                (true, false) => change.newly_skipped.push(QuestionPosition {
                    question_id: question.id.clone(),
                    position: old_position,
                }),
                (false, true) => change.newly_shown.push(QuestionPosition {
                    question_id: question.id.clone(),
                    position: new_position,
                }),
                _ => {}
            }
            old_position += usize::from(was);
            new_position += usize::from(is);
        }
        change
    }

    /// The question at a visible ordinal; `None` past the end.
    pub fn question_for(&self, position: usize) -> Option<&QuestionSpec> {
        self.visible_questions().nth(position)
    }

    pub fn position_of(&self, question_id: &str) -> Option<usize> {
        self.visible_questions()
            .position(|question| question.id == question_id)
    }

    pub fn is_visible(&self, question_id: &str) -> bool {
        self.position_of(question_id).is_some()
    }

    pub fn size(&self) -> usize {
        self.visible.iter().filter(|visible| **visible).count()
    }

    pub fn visible_ids(&self) -> Vec<&str> {
        self.visible_questions()
            .map(|question| question.id.as_str())
            .collect()
    }

    fn visible_questions(&self) -> impl Iterator<Item = &QuestionSpec> {
        self.spec
            .questions
            .iter()
            .zip(&self.visible)
            .filter(|(_, visible)| **visible)
            .map(|(question, _)| question)
    }
}
