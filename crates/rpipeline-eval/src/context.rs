//! Per-evaluation mutable state.
//!
//! A fresh [`EvaluationContext`] is created for every (rule, message) pair
//! and exclusively owned by that evaluation. It holds the message being
//! processed, the messages created along the way, the errors recorded so
//! far and the rule's variables.

use std::collections::HashMap;

use crate::error::{EvalError, EvalResult, EvaluationError};
use crate::message::Message;
use crate::value::{MessageHandle, Value};

/// Lifecycle of one evaluation. `Active` moves to either `Dropped` or
/// `Completed` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Active,
    Dropped,
    Completed,
}

/// How the rule's condition turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOutcome {
    /// Not evaluated yet.
    Pending,
    Matched,
    NotMatched,
    /// The condition raised an error; treated as not matched.
    Failed,
}

#[derive(Debug)]
pub struct EvaluationContext {
    current: Message,
    created: Vec<Message>,
    errors: Vec<EvaluationError>,
    variables: HashMap<String, Value>,
    state: EvaluationState,
    outcome: ConditionOutcome,
}

impl EvaluationContext {
    pub fn new(message: Message) -> Self {
        EvaluationContext {
            current: message,
            created: Vec::new(),
            errors: Vec::new(),
            variables: HashMap::new(),
            state: EvaluationState::Active,
            outcome: ConditionOutcome::Pending,
        }
    }

    pub fn current_message(&self) -> &Message {
        &self.current
    }

    /// Resolve `target` to the current message (`None`) or a created one.
    pub fn message(&self, target: Option<MessageHandle>) -> EvalResult<&Message> {
        match target {
            None => Ok(&self.current),
            Some(handle) => self
                .created
                .get(handle.index())
                .ok_or(EvalError::UnknownMessage(handle.index())),
        }
    }

    /// Mutable access to the current message (`None`) or a created one.
    /// Fails once the message has been dropped.
    pub fn message_mut(&mut self, target: Option<MessageHandle>) -> EvalResult<&mut Message> {
        if self.state == EvaluationState::Dropped {
            return Err(EvalError::MessageDropped);
        }
        match target {
            None => Ok(&mut self.current),
            Some(handle) => self
                .created
                .get_mut(handle.index())
                .ok_or(EvalError::UnknownMessage(handle.index())),
        }
    }

    pub fn current_message_mut(&mut self) -> EvalResult<&mut Message> {
        self.message_mut(None)
    }

    /// Record a newly created message and return its handle.
    pub fn create_message(&mut self, message: Message) -> MessageHandle {
        self.created.push(message);
        MessageHandle::new(self.created.len() - 1)
    }

    /// Messages created during this evaluation, in creation order. Never
    /// includes the current message.
    pub fn created_messages(&self) -> &[Message] {
        &self.created
    }

    pub fn add_evaluation_error(&mut self, error: EvaluationError) {
        self.errors.push(error);
    }

    pub fn has_evaluation_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn evaluation_errors(&self) -> &[EvaluationError] {
        &self.errors
    }

    /// Define or overwrite a rule variable.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Mark the current message as dropped. Later statements do not run.
    pub fn drop_message(&mut self) {
        if self.state == EvaluationState::Active {
            self.state = EvaluationState::Dropped;
        }
    }

    pub fn is_dropped(&self) -> bool {
        self.state == EvaluationState::Dropped
    }

    pub fn state(&self) -> EvaluationState {
        self.state
    }

    pub fn condition_outcome(&self) -> ConditionOutcome {
        self.outcome
    }

    /// Whether the rule's condition held.
    pub fn matched(&self) -> bool {
        self.outcome == ConditionOutcome::Matched
    }

    pub(crate) fn set_condition_outcome(&mut self, outcome: ConditionOutcome) {
        self.outcome = outcome;
    }

    pub(crate) fn complete(&mut self) {
        if self.state == EvaluationState::Active {
            self.state = EvaluationState::Completed;
        }
    }

    /// Split into the current message, the created messages and the
    /// recorded errors.
    pub fn into_parts(self) -> (Message, Vec<Message>, Vec<EvaluationError>) {
        (self.current, self.created, self.errors)
    }
}
