use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cmi_core::model::{Entry, LessonStatus};

use crate::error::AdapterError;

/// The property surface content code uses, whichever protocol sits underneath.
///
/// SCORM reads go straight to the host; AICC reads come from the session state
/// populated by the last HACP exchange. Setters validate before anything is
/// written or transmitted.
#[async_trait]
pub trait LmsAdapter: Send + Sync {
    fn is_connected(&self) -> bool;

    /// `None` until the LMS (or the content) has set a status.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the status cannot be read or is not canonical.
    fn lesson_status(&self) -> Result<Option<LessonStatus>, AdapterError>;

    /// # Errors
    ///
    /// Returns a validation error for anything but the six canonical statuses.
    fn set_lesson_status(&mut self, value: &str) -> Result<LessonStatus, AdapterError>;

    /// Resume point, `"0"` when none was recorded.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn lesson_location(&self) -> Result<String, AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    fn set_lesson_location(&mut self, value: &str) -> Result<(), AdapterError>;

    /// Raw score; absent or non-numeric values read as 0.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn score(&self) -> Result<i64, AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    fn set_score(&mut self, value: i64) -> Result<(), AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn suspend_data(&self) -> Result<String, AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    fn set_suspend_data(&mut self, value: &str) -> Result<(), AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn student_id(&self) -> Result<String, AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn student_name(&self) -> Result<String, AdapterError>;

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read or is unknown.
    fn entry(&self) -> Result<Entry, AdapterError>;

    /// Accumulated time across earlier sessions, as a CMI timespan.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn total_time(&self) -> Result<String, AdapterError>;

    /// Mastery score exactly as the LMS reports it.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    fn mastery_score(&self) -> Result<String, AdapterError>;

    /// Persist everything written so far. Returns whether the LMS accepted it.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the exchange with the LMS fails.
    async fn commit(&mut self) -> Result<bool, AdapterError>;

    /// Final commit and end of session. The adapter is disconnected afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the exchange with the LMS fails.
    async fn finish(&mut self) -> Result<bool, AdapterError>;

    /// When the LMS last accepted a commit.
    fn last_commit(&self) -> Option<DateTime<Utc>>;
}
