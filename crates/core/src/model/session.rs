use chrono::{DateTime, Duration, Utc};

use crate::model::{Entry, LessonStatus, StatusError};

/// Location reported when the LMS has no resume point for the learner.
pub const LOCATION_SENTINEL: &str = "0";

/// In-memory record of one learner's session with the LMS.
///
/// Content reads and writes these fields through the adapters; the identity
/// fields (`student_id`, `student_name`, `mastery_score`, `entry`) are only
/// populated from LMS responses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    lesson_status: Option<LessonStatus>,
    lesson_location: String,
    score: i64,
    score_min: i64,
    score_max: i64,
    suspend_data: String,
    session_time: Duration,
    total_time: Duration,
    student_id: String,
    student_name: String,
    mastery_score: String,
    entry: Entry,
    last_commit: Option<DateTime<Utc>>,
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lesson_status(&self) -> Option<LessonStatus> {
        self.lesson_status
    }

    /// Validate and store a lesson status.
    ///
    /// # Errors
    ///
    /// Returns `StatusError::InvalidLessonStatus` if `value` is not one of the
    /// six canonical statuses; the stored status is left unchanged.
    pub fn set_lesson_status(&mut self, value: &str) -> Result<LessonStatus, StatusError> {
        let status = LessonStatus::parse(value)?;
        self.lesson_status = Some(status);
        Ok(status)
    }

    pub fn set_status(&mut self, status: LessonStatus) {
        self.lesson_status = Some(status);
    }

    #[must_use]
    pub fn lesson_location(&self) -> &str {
        &self.lesson_location
    }

    /// The stored location, or [`LOCATION_SENTINEL`] when none was recorded.
    #[must_use]
    pub fn lesson_location_or_default(&self) -> &str {
        if self.lesson_location.is_empty() {
            LOCATION_SENTINEL
        } else {
            &self.lesson_location
        }
    }

    pub fn set_lesson_location(&mut self, value: impl Into<String>) {
        self.lesson_location = value.into();
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn set_score(&mut self, value: i64) {
        self.score = value;
    }

    #[must_use]
    pub fn score_min(&self) -> i64 {
        self.score_min
    }

    pub fn set_score_min(&mut self, value: i64) {
        self.score_min = value;
    }

    #[must_use]
    pub fn score_max(&self) -> i64 {
        self.score_max
    }

    pub fn set_score_max(&mut self, value: i64) {
        self.score_max = value;
    }

    #[must_use]
    pub fn suspend_data(&self) -> &str {
        &self.suspend_data
    }

    pub fn set_suspend_data(&mut self, value: impl Into<String>) {
        self.suspend_data = value.into();
    }

    #[must_use]
    pub fn session_time(&self) -> Duration {
        self.session_time
    }

    pub fn set_session_time(&mut self, elapsed: Duration) {
        self.session_time = elapsed;
    }

    #[must_use]
    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    #[must_use]
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    #[must_use]
    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    /// Mastery score exactly as the LMS sent it.
    #[must_use]
    pub fn mastery_score(&self) -> &str {
        &self.mastery_score
    }

    #[must_use]
    pub fn entry(&self) -> Entry {
        self.entry
    }

    #[must_use]
    pub fn last_commit(&self) -> Option<DateTime<Utc>> {
        self.last_commit
    }

    pub fn record_commit(&mut self, at: DateTime<Utc>) {
        self.last_commit = Some(at);
    }

    /// Clear everything, as at the end of a session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn set_total_time(&mut self, value: Duration) {
        self.total_time = value;
    }

    pub(crate) fn set_student_id(&mut self, value: impl Into<String>) {
        self.student_id = value.into();
    }

    pub(crate) fn set_student_name(&mut self, value: impl Into<String>) {
        self.student_name = value.into();
    }

    pub(crate) fn set_mastery_score(&mut self, value: impl Into<String>) {
        self.mastery_score = value.into();
    }

    pub(crate) fn set_entry(&mut self, entry: Entry) {
        self.entry = entry;
    }
}

/// Parses the leading integer of `raw`, the way LMS score fields are read.
///
/// `"85.5"` yields `Some(85)`; text without a leading integer yields `None`.
#[must_use]
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Score fields parse to 0 when absent, empty or non-numeric.
#[must_use]
pub fn parse_score(raw: &str) -> i64 {
    parse_leading_int(raw).unwrap_or(0)
}
