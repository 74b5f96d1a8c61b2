//! AICC HACP text codec.
//!
//! HACP bodies are `[SECTION]` headers followed by `key=value` lines. Responses
//! may also carry connection metadata (`error`, `error_text`, ...) above the
//! first header. Parsing is lenient: structurally odd input yields whatever
//! could be read and never an error.

mod parse;
mod serialize;

pub use parse::{HacpResponse, HacpSection, StatusField, TopFields, parse};
pub use serialize::serialize;

/// Expand an HACP lesson-status abbreviation.
///
/// Unknown input is returned lower-cased and trimmed.
#[must_use]
pub fn unabbreviate_status(code: &str) -> String {
    let status = code.trim().to_lowercase();
    match status.as_str() {
        "c" => "completed".to_owned(),
        "i" => "incomplete".to_owned(),
        "n" | "na" => "not attempted".to_owned(),
        "p" => "passed".to_owned(),
        "f" => "failed".to_owned(),
        "b" => "browsed".to_owned(),
        _ => status,
    }
}

/// Expand an HACP entry-flag abbreviation.
///
/// Unknown input is returned lower-cased and trimmed.
#[must_use]
pub fn unabbreviate_entry(code: &str) -> String {
    let entry = code.trim().to_lowercase();
    match entry.as_str() {
        "a" | "ab" => "ab-initio".to_owned(),
        "r" => "resume".to_owned(),
        _ => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonStatus;

    #[test]
    fn every_abbreviation_expands_to_a_canonical_status() {
        let cases = [
            ("p", LessonStatus::Passed),
            ("f", LessonStatus::Failed),
            ("c", LessonStatus::Completed),
            ("i", LessonStatus::Incomplete),
            ("n", LessonStatus::NotAttempted),
            ("na", LessonStatus::NotAttempted),
            ("b", LessonStatus::Browsed),
            (" P ", LessonStatus::Passed),
        ];
        for (code, expected) in cases {
            let expanded = unabbreviate_status(code);
            assert_eq!(LessonStatus::parse(&expanded).unwrap(), expected, "{code}");
        }
    }

    #[test]
    fn unknown_codes_pass_through_normalised() {
        assert_eq!(unabbreviate_status("  Passed "), "passed");
        assert_eq!(unabbreviate_status("X"), "x");
        assert_eq!(unabbreviate_entry("A"), "ab-initio");
        assert_eq!(unabbreviate_entry("ab"), "ab-initio");
        assert_eq!(unabbreviate_entry("r"), "resume");
        assert_eq!(unabbreviate_entry(" Resume"), "resume");
    }
}
