//! Status conditions, built fluently and replaced in-place by type.

use chrono::{DateTime, Utc};

pub const ACCEPTED: &str = "Accepted";
pub const PROGRAMMED: &str = "Programmed";
pub const RESOLVED_REFS: &str = "ResolvedRefs";

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(rename = "observedGeneration")]
    pub observed_generation: i64,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl Condition {
    pub fn new(type_: impl ToString) -> Self {
        Self {
            type_: type_.to_string(),
            status: ConditionStatus::Unknown,
            reason: String::new(),
            message: String::new(),
            observed_generation: 0,
            last_transition_time: now(),
        }
    }

    pub fn status(mut self, status: ConditionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn reason(mut self, reason: impl ToString) -> Self {
        self.reason = reason.to_string();
        self
    }

    pub fn message(mut self, message: impl ToString) -> Self {
        self.message = message.to_string();
        self
    }

    pub fn observed_generation(mut self, generation: i64) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Inserts the condition into a set, replacing any existing condition of
    /// the same type.
    pub fn set_in(self, conditions: &mut Vec<Condition>) {
        if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == self.type_) {
            *existing = self;
        } else {
            conditions.push(self);
        }
    }
}

#[cfg(not(test))]
fn now() -> DateTime<Utc> {
    Utc::now()
}

// Deterministic timestamps in tests.
#[cfg(test)]
fn now() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}
