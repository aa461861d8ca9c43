use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::answer::Answer;
use crate::error::{Result, SurveyError};
use crate::evaluator::{AnswerProvider, ConditionEvaluator, CustomConditionHandler};
use crate::export::AnswerExport;
use crate::question_state::{QuestionEvent, QuestionState};
use crate::spec::question::QuestionSpec;
use crate::spec::survey::{SubmitSpec, SurveySpec};
use crate::validate::{DefaultValidator, ValidationOutcome, Validator};
use crate::visibility::{FilteredQuestions, RecomputeStrategy};

/// Change to the rendered question list. Positions index the list as it is
/// at the moment the event is delivered, so events must be applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyEvent {
    QuestionInserted(usize),
    QuestionRemoved(usize),
    QuestionChanged(usize),
    SubmitButtonInserted(usize),
}

/// Observer of rendered list changes.
pub trait SurveyStateListener {
    fn question_inserted(&mut self, _position: usize) {}
    fn question_removed(&mut self, _position: usize) {}
    fn question_changed(&mut self, _position: usize) {}
    fn submit_button_inserted(&mut self, _position: usize) {}
}

impl<F> SurveyStateListener for F
where
    F: FnMut(SurveyEvent),
{
    fn question_inserted(&mut self, position: usize) {
        self(SurveyEvent::QuestionInserted(position));
    }

    fn question_removed(&mut self, position: usize) {
        self(SurveyEvent::QuestionRemoved(position));
    }

    fn question_changed(&mut self, position: usize) {
        self(SurveyEvent::QuestionChanged(position));
    }

    fn submit_button_inserted(&mut self, position: usize) {
        self(SurveyEvent::SubmitButtonInserted(position));
    }
}

impl SurveyEvent {
    fn dispatch(self, listener: &mut dyn SurveyStateListener) {
        match self {
            SurveyEvent::QuestionInserted(position) => listener.question_inserted(position),
            SurveyEvent::QuestionRemoved(position) => listener.question_removed(position),
            SurveyEvent::QuestionChanged(position) => listener.question_changed(position),
            SurveyEvent::SubmitButtonInserted(position) => {
                listener.submit_button_inserted(position)
            }
        }
    }
}

/// Receives the finished survey.
pub trait SubmitSurveyHandler {
    fn submit(&mut self, submit: Option<&SubmitSpec>, answers_json: &str);
}

impl<F> SubmitSurveyHandler for F
where
    F: FnMut(Option<&SubmitSpec>, &str),
{
    fn submit(&mut self, submit: Option<&SubmitSpec>, answers_json: &str) {
        self(submit, answers_json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(usize);

/// Question states of one survey session, keyed by question id.
#[derive(Debug, Default)]
pub struct AnswerStore {
    states: BTreeMap<String, QuestionState>,
}

impl AnswerStore {
    pub fn get(&self, question_id: &str) -> Option<&QuestionState> {
        self.states.get(question_id)
    }

    fn get_or_create(&mut self, question_id: &str) -> &mut QuestionState {
        self.states
            .entry(question_id.to_string())
            .or_insert_with(|| QuestionState::new(question_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionState> {
        self.states.values()
    }

    pub fn export(&self) -> AnswerExport {
        let mut answers = BTreeMap::new();
        for state in self.iter() {
            match state.answer() {
                Some(answer) => {
                    answers.insert(state.id().to_string(), answer.clone());
                }
                None => warn!(question_id = state.id(), "no answer stored; omitted from export"),
            }
        }
        AnswerExport { answers }
    }
}

impl AnswerProvider for AnswerStore {
    fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.states.get(question_id).and_then(QuestionState::answer)
    }

    fn all_answers_json(&self) -> Result<String> {
        self.export().to_json()
    }
}

/// Tracks a running survey: answers, visibility and progressive disclosure.
///
/// Questions are revealed one slot at a time. `visible_question_count` is the
/// number of revealed slots; the slot after the last visible question is the
/// submit button. Only answering the question in the last revealed slot moves
/// it; skip logic changes which questions fill the slots.
pub struct SurveyState {
    spec: Arc<SurveySpec>,
    store: AnswerStore,
    evaluator: ConditionEvaluator,
    strategy: RecomputeStrategy,
    filter: Option<FilteredQuestions>,
    visible_question_count: usize,
    validator: Box<dyn Validator>,
    submit_handler: Option<Box<dyn SubmitSurveyHandler>>,
    listeners: Vec<(ListenerId, Box<dyn SurveyStateListener>)>,
    next_listener_id: usize,
}

impl fmt::Debug for SurveyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurveyState")
            .field("spec", &self.spec.id)
            .field("store", &self.store)
            .field("strategy", &self.strategy)
            .field("filter", &self.filter)
            .field("visible_question_count", &self.visible_question_count)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SurveyState {
    pub fn new(spec: impl Into<Arc<SurveySpec>>) -> Self {
        Self {
            spec: spec.into(),
            store: AnswerStore::default(),
            evaluator: ConditionEvaluator::new(),
            strategy: RecomputeStrategy::default(),
            filter: None,
            visible_question_count: 1,
            validator: Box::new(DefaultValidator),
            submit_handler: None,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn with_custom_condition_handler(
        mut self,
        handler: impl CustomConditionHandler + 'static,
    ) -> Self {
        self.evaluator.set_custom_handler(handler);
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_submit_handler(mut self, handler: impl SubmitSurveyHandler + 'static) -> Self {
        self.submit_handler = Some(Box::new(handler));
        self
    }

    /// Takes effect on the next `init_filter`.
    pub fn with_recompute_strategy(mut self, strategy: RecomputeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn spec(&self) -> &SurveySpec {
        &self.spec
    }

    pub fn evaluator(&self) -> &ConditionEvaluator {
        &self.evaluator
    }

    /// Builds the visibility filter from the answers stored so far.
    pub fn init_filter(&mut self) -> Result<&mut Self> {
        let filter =
            FilteredQuestions::new(self.spec.clone(), self.strategy, &self.evaluator, &self.store)?;
        debug!(visible = filter.size(), strategy = ?self.strategy, "initialized question filter");
        self.filter = Some(filter);
        Ok(self)
    }

    pub fn filter(&self) -> Result<&FilteredQuestions> {
        self.filter.as_ref().ok_or(SurveyError::NotInitialized)
    }

    pub fn visible_question_count(&self) -> usize {
        self.visible_question_count
    }

    /// The question rendered at `position`, or `None` for the submit slot.
    pub fn question_for(&self, position: usize) -> Result<Option<&QuestionSpec>> {
        Ok(self.filter()?.question_for(position))
    }

    pub fn is_submit_position(&self, position: usize) -> Result<bool> {
        Ok(self.filter()?.size() == position)
    }

    /// The question in the last revealed slot, i.e. the one awaiting input.
    /// `None` once the submit button is revealed.
    pub fn current_question(&self) -> Result<Option<&QuestionSpec>> {
        self.question_for(self.visible_question_count - 1)
    }

    /// Gets or lazily creates the state of a question.
    pub fn state_for(&mut self, question_id: &str) -> QuestionHandle<'_> {
        self.store.get_or_create(question_id);
        QuestionHandle {
            survey: self,
            id: question_id.to_string(),
        }
    }

    pub fn state(&self, question_id: &str) -> Option<&QuestionState> {
        self.store.get(question_id)
    }

    pub fn answer_question(
        &mut self,
        question_id: &str,
        answer: Answer,
    ) -> Result<Vec<SurveyEvent>> {
        self.state_for(question_id).set_answer(answer)
    }

    /// Checks an answer with the configured validator. Unknown questions have
    /// no rules and always pass.
    pub fn validate_answer(&self, question_id: &str, answer: &Answer) -> ValidationOutcome {
        match self.spec.question(question_id) {
            Some(question) => self.validator.validate(question, answer, &self.store),
            None => ValidationOutcome::valid(),
        }
    }

    pub fn add_listener(&mut self, listener: impl SurveyStateListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn answer_export(&self) -> AnswerExport {
        self.store.export()
    }

    /// `{ "answers": { .. } }` with composites nested as objects.
    /// Questions without an answer are left out.
    pub fn all_answers(&self) -> Value {
        let answers = self
            .answer_export()
            .answers
            .iter()
            .map(|(id, answer)| (id.clone(), answer.to_value()))
            .collect::<Map<_, _>>();
        let mut top = Map::new();
        top.insert("answers".into(), Value::Object(answers));
        Value::Object(top)
    }

    pub fn submit(&mut self) -> Result<()> {
        let answers_json = self.all_answers_json()?;
        let handler = self
            .submit_handler
            .as_mut()
            .ok_or(SurveyError::MissingSubmitHandler)?;
        handler.submit(self.spec.submit.as_ref(), &answers_json);
        Ok(())
    }

    fn question_state_changed(&mut self, question_id: &str) {
        trace!(question_id, "question state changed");
    }

    fn question_answered(&mut self, question_id: &str) -> Result<Vec<SurveyEvent>> {
        let filter = self.filter.as_mut().ok_or(SurveyError::NotInitialized)?;
        let old_size = filter.size();
        let change = filter.question_answered(question_id, &self.evaluator, &self.store)?;

        // Skipped questions go first, last to first, so that each removal
        // leaves the positions still to be applied untouched. Shown
        // questions then go first to last against the new ordering.
        let mut slots = RenderedSlots::new(self.visible_question_count, old_size);
        for skipped in change.newly_skipped.iter().rev() {
            slots.skip(skipped.position);
        }
        for shown in &change.newly_shown {
            slots.show(shown.position);
        }

        let answered_last_slot = filter
            .question_for(slots.cursor - 1)
            .is_some_and(|question| question.id == question_id);
        if answered_last_slot && slots.cursor <= slots.size {
            slots.reveal_next();
        }
        debug_assert_eq!(slots.len, slots.target());

        self.visible_question_count = slots.cursor;
        let events = slots.events;
        debug!(question_id, cursor = self.visible_question_count, ?events, "question answered");

        for event in &events {
            for (_, listener) in &mut self.listeners {
                event.dispatch(listener.as_mut());
            }
        }
        Ok(events)
    }
}

/// The slots a host list renders: the first `cursor` visible questions,
/// then the submit button once the cursor is past the last question.
///
/// Visibility changes never move the cursor. They only decide which
/// questions occupy the revealed slots, so the list always holds
/// `min(cursor, size + 1)` entries.
struct RenderedSlots {
    cursor: usize,
    size: usize,
    len: usize,
    events: Vec<SurveyEvent>,
}

impl RenderedSlots {
    fn new(cursor: usize, size: usize) -> Self {
        Self {
            cursor,
            size,
            len: cursor.min(size + 1),
            events: Vec::new(),
        }
    }

    fn target(&self) -> usize {
        self.cursor.min(self.size + 1)
    }

    /// `position` indexes the ordering the question is leaving.
    fn skip(&mut self, position: usize) {
        self.size -= 1;
        if position >= self.len {
            return;
        }
        self.events.push(SurveyEvent::QuestionRemoved(position));
        self.len -= 1;
        if self.len < self.target() {
            self.fill_last_slot();
        }
    }

    /// `position` indexes the ordering the question is entering.
    fn show(&mut self, position: usize) {
        self.size += 1;
        if position >= self.len {
            return;
        }
        if self.len < self.target() {
            self.events.push(SurveyEvent::QuestionInserted(position));
            self.len += 1;
        } else if position + 1 == self.len {
            self.events.push(SurveyEvent::QuestionChanged(position));
        } else {
            // The window is full: the last revealed slot drops out.
            self.events.push(SurveyEvent::QuestionInserted(position));
            self.events.push(SurveyEvent::QuestionRemoved(self.len));
        }
    }

    fn reveal_next(&mut self) {
        self.cursor += 1;
        self.fill_last_slot();
    }

    fn fill_last_slot(&mut self) {
        let slot = self.len;
        self.events.push(if slot == self.size {
            SurveyEvent::SubmitButtonInserted(slot)
        } else {
            SurveyEvent::QuestionInserted(slot)
        });
        self.len += 1;
    }
}

impl AnswerProvider for SurveyState {
    fn answer_for(&self, question_id: &str) -> Option<&Answer> {
        self.store.answer_for(question_id)
    }

    fn all_answers_json(&self) -> Result<String> {
        Ok(self.all_answers().to_string())
    }
}

/// Mutable access to one question's state. Every mutation is reported to the
/// owning [`SurveyState`] before the call returns.
pub struct QuestionHandle<'a> {
    survey: &'a mut SurveyState,
    id: String,
}

impl QuestionHandle<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> Option<&QuestionState> {
        self.survey.store.get(&self.id)
    }

    pub fn answer(&self) -> Option<&Answer> {
        self.state().and_then(QuestionState::answer)
    }

    pub fn is_answered(&self) -> bool {
        self.answer().is_some()
    }

    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<()> {
        let event = self.survey.store.get_or_create(&self.id).set_attribute(key, value)?;
        self.notify(event).map(|_| ())
    }

    /// Stores the answer and re-filters the survey. The returned events are
    /// the ones delivered to the survey's listeners.
    ///
    /// When re-filtering fails the previous answer is put back, so the store
    /// never holds an answer that cannot be evaluated.
    pub fn set_answer(&mut self, answer: Answer) -> Result<Vec<SurveyEvent>> {
        if self.survey.filter.is_none() {
            return Err(SurveyError::NotInitialized);
        }
        let state = self.survey.store.get_or_create(&self.id);
        let previous = state.answer().cloned();
        let event = state.set_answer(answer);
        let result = self.notify(event);
        if let Err(err) = &result {
            warn!(
                question_id = %self.id,
                error = %err,
                "answer rejected; previous answer restored"
            );
            self.survey
                .store
                .get_or_create(&self.id)
                .restore_answer(previous);
        }
        result
    }

    fn notify(&mut self, event: QuestionEvent) -> Result<Vec<SurveyEvent>> {
        match event {
            QuestionEvent::StateChanged => {
                self.survey.question_state_changed(&self.id);
                Ok(Vec::new())
            }
            QuestionEvent::Answered => self.survey.question_answered(&self.id),
        }
    }
}
