use thiserror::Error;

use crate::model::{LessonStatus, StatusError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ObjectiveError {
    #[error("objective identifier cannot be empty")]
    EmptyId,

    #[error("unrecognised objective status: {0}")]
    Status(#[from] StatusError),
}

/// An objective as content describes it, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectiveDraft {
    pub id: String,
    pub status: String,
    pub score_min: f64,
    pub score_max: f64,
    pub score_raw: f64,
}

/// A validated objective for a `cmi.objectives.N.*` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub id: String,
    pub status: LessonStatus,
    pub score_min: f64,
    pub score_max: f64,
    pub score_raw: f64,
}

impl ObjectiveDraft {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_scores(mut self, min: f64, max: f64, raw: f64) -> Self {
        self.score_min = min;
        self.score_max = max;
        self.score_raw = raw;
        self
    }

    /// # Errors
    ///
    /// Returns `ObjectiveError` for an empty id or a status outside the six
    /// canonical values.
    pub fn validate(self) -> Result<Objective, ObjectiveError> {
        if self.id.trim().is_empty() {
            return Err(ObjectiveError::EmptyId);
        }
        let status = LessonStatus::parse(&self.status)?;
        Ok(Objective {
            id: self.id,
            status,
            score_min: self.score_min,
            score_max: self.score_max,
            score_raw: self.score_raw,
        })
    }
}
