use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatusError {
    #[error("invalid lesson status value: {0:?}")]
    InvalidLessonStatus(String),

    #[error("invalid entry value: {0:?}")]
    InvalidEntry(String),
}

//
// ─── LESSON STATUS ─────────────────────────────────────────────────────────────
//

/// The six completion states a SCO may report, shared by objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonStatus {
    Passed,
    Failed,
    Completed,
    Incomplete,
    #[serde(rename = "not attempted", alias = "not-attempted")]
    NotAttempted,
    Browsed,
}

impl LessonStatus {
    pub const ALL: [LessonStatus; 6] = [
        LessonStatus::Passed,
        LessonStatus::Failed,
        LessonStatus::Completed,
        LessonStatus::Incomplete,
        LessonStatus::NotAttempted,
        LessonStatus::Browsed,
    ];

    /// The CMI vocabulary token written to the LMS.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonStatus::Passed => "passed",
            LessonStatus::Failed => "failed",
            LessonStatus::Completed => "completed",
            LessonStatus::Incomplete => "incomplete",
            LessonStatus::NotAttempted => "not attempted",
            LessonStatus::Browsed => "browsed",
        }
    }

    /// Parses a canonical status, ignoring case and surrounding whitespace.
    ///
    /// `not-attempted` is accepted as a spelling of `not attempted`.
    /// Abbreviations (`p`, `c`, ...) are not accepted here; see
    /// [`crate::hacp::unabbreviate_status`].
    ///
    /// # Errors
    ///
    /// Returns `StatusError::InvalidLessonStatus` for any other value.
    pub fn parse(value: &str) -> Result<Self, StatusError> {
        match value.trim().to_lowercase().as_str() {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "completed" => Ok(Self::Completed),
            "incomplete" => Ok(Self::Incomplete),
            "not attempted" | "not-attempted" => Ok(Self::NotAttempted),
            "browsed" => Ok(Self::Browsed),
            _ => Err(StatusError::InvalidLessonStatus(value.to_owned())),
        }
    }

    /// Completed, passed and failed end the attempt; the rest may be resumed.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            LessonStatus::Completed | LessonStatus::Passed | LessonStatus::Failed
        )
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LessonStatus {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// Whether the learner has been in the SCO before (`cmi.core.entry`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Entry {
    /// First time into the SCO.
    AbInitio,
    /// Returning to a suspended attempt.
    Resume,
    /// Neither; typically a review of a completed SCO.
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl Entry {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Entry::AbInitio => "ab-initio",
            Entry::Resume => "resume",
            Entry::Unspecified => "",
        }
    }

    /// # Errors
    ///
    /// Returns `StatusError::InvalidEntry` for values outside the vocabulary.
    pub fn parse(value: &str) -> Result<Self, StatusError> {
        match value.trim().to_lowercase().as_str() {
            "ab-initio" => Ok(Self::AbInitio),
            "resume" => Ok(Self::Resume),
            "" => Ok(Self::Unspecified),
            _ => Err(StatusError::InvalidEntry(value.to_owned())),
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── EXIT ──────────────────────────────────────────────────────────────────────
//

/// How the learner left the SCO (`cmi.core.exit`, write-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    TimeOut,
    Suspend,
    Logout,
    Normal,
}

impl ExitStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExitStatus::TimeOut => "time-out",
            ExitStatus::Suspend => "suspend",
            ExitStatus::Logout => "logout",
            ExitStatus::Normal => "",
        }
    }

    /// Logout once the attempt is finished, otherwise suspend so it can resume.
    #[must_use]
    pub fn for_status(status: Option<LessonStatus>) -> Self {
        match status {
            Some(s) if s.is_finished() => ExitStatus::Logout,
            _ => ExitStatus::Suspend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_canonical_status() {
        for status in LessonStatus::ALL {
            assert_eq!(LessonStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            LessonStatus::parse(" Passed ").unwrap(),
            LessonStatus::Passed
        );
        assert_eq!(
            LessonStatus::parse("not-attempted").unwrap(),
            LessonStatus::NotAttempted
        );
    }

    #[test]
    fn rejects_abbreviations_and_unknown_values() {
        assert_eq!(
            LessonStatus::parse("p"),
            Err(StatusError::InvalidLessonStatus("p".into()))
        );
        assert!("done".parse::<LessonStatus>().is_err());
    }

    #[test]
    fn exit_follows_completion() {
        assert_eq!(
            ExitStatus::for_status(Some(LessonStatus::Passed)),
            ExitStatus::Logout
        );
        assert_eq!(
            ExitStatus::for_status(Some(LessonStatus::Incomplete)),
            ExitStatus::Suspend
        );
        assert_eq!(ExitStatus::for_status(None), ExitStatus::Suspend);
    }

    #[test]
    fn entry_vocabulary() {
        assert_eq!(Entry::parse("RESUME").unwrap(), Entry::Resume);
        assert_eq!(Entry::parse("").unwrap(), Entry::Unspecified);
        assert!(Entry::parse("r").is_err());
    }
}
