use thiserror::Error;

use crate::model::{InteractionError, ObjectiveError, StatusError};
use crate::time::TimespanError;

/// Any validation failure raised by the CMI domain layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    #[error(transparent)]
    Objective(#[from] ObjectiveError),
    #[error(transparent)]
    Timespan(#[from] TimespanError),
}
