use std::borrow::Cow;

use chrono::Duration;
use tracing::{debug, warn};

use crate::hacp::{unabbreviate_entry, unabbreviate_status};
use crate::model::{Entry, SessionState, parse_leading_int, parse_score};
use crate::time::parse_cmi_timespan;

//
// ─── STATUS FIELD ──────────────────────────────────────────────────────────────
//

/// A decoded `lesson_status` value: `p,r` carries both status and entry flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusField {
    pub status: String,
    pub entry: Option<String>,
}

impl StatusField {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.contains(',') {
            let mut parts = raw.split(',');
            let status = parts.next().unwrap_or_default();
            let entry = parts.next().unwrap_or_default();
            Self {
                status: unabbreviate_status(status),
                entry: Some(unabbreviate_entry(entry)),
            }
        } else {
            Self {
                status: unabbreviate_status(raw),
                entry: None,
            }
        }
    }
}

//
// ─── TOP BLOCK ─────────────────────────────────────────────────────────────────
//

/// Metadata found above the first section header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopFields {
    pub error: Option<String>,
    pub error_text: Option<String>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub lesson_location: Option<String>,
    pub lesson_status: Option<StatusField>,
    pub score: Option<i64>,
    pub time: Option<Duration>,
}

impl TopFields {
    fn from_lines(lines: &[&str]) -> Self {
        let mut top = Self::default();
        for line in lines {
            let parts: Vec<&str> = line.split('=').collect();
            let [key, raw_value] = parts.as_slice() else {
                continue;
            };
            if raw_value.is_empty() {
                continue;
            }
            let value = raw_value.trim();

            match key.trim().to_lowercase().as_str() {
                "error" => top.error = Some(value.to_owned()),
                "error_text" => top.error_text = Some(value.to_owned()),
                "student_id" => top.student_id = Some(value.to_owned()),
                "student_name" => top.student_name = Some(value.to_owned()),
                "lesson_location" => top.lesson_location = Some(value.to_owned()),
                "lesson_status" => top.lesson_status = Some(StatusField::parse(value)),
                "score" => top.score = Some(parse_score(value)),
                "time" => match parse_cmi_timespan(value) {
                    Ok(time) => top.time = Some(time),
                    Err(err) => debug!(%err, "ignoring HACP time field"),
                },
                other => debug!(key = other, "ignoring HACP top-level field"),
            }
        }
        top
    }

    /// Numeric error code; an absent code counts as `0`.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        match &self.error {
            None => Some(0),
            Some(raw) => parse_leading_int(raw),
        }
    }
}

//
// ─── SECTIONS ──────────────────────────────────────────────────────────────────
//

/// One `[NAME]` block. The name is stored lower-cased; lines keep their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HacpSection {
    name: String,
    lines: Vec<String>,
}

impl HacpSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// `key=value` pairs split at the first `=`; lines without one are skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| line.split_once('='))
    }

    /// Case-insensitive lookup; a repeated key resolves to its last occurrence.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs()
            .filter(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
            .last()
    }
}

//
// ─── RESPONSE ──────────────────────────────────────────────────────────────────
//

/// A parsed HACP body.
///
/// Sections are held most-recently-parsed first, the reverse of their order in
/// the text. Updates are applied in that order too.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HacpResponse {
    top: TopFields,
    sections: Vec<HacpSection>,
}

/// Parse an HACP body. Never fails; unreadable parts are skipped.
#[must_use]
pub fn parse(raw: &str) -> HacpResponse {
    let decoded = match urlencoding::decode(raw) {
        Ok(text) => text,
        Err(err) => {
            debug!(%err, "HACP body is not URI-encoded UTF-8, parsing as-is");
            Cow::Borrowed(raw)
        }
    };

    let mut top_lines: Vec<&str> = Vec::new();
    let mut sections: Vec<HacpSection> = Vec::new();
    let mut current: Option<HacpSection> = None;

    for line in decoded.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.starts_with(';') {
            continue;
        }
        if let Some(name) = section_header(line) {
            if let Some(done) = current.replace(HacpSection::new(name)) {
                sections.insert(0, done);
            }
            continue;
        }
        match current.as_mut() {
            Some(section) => {
                if !line.trim().is_empty() {
                    section.lines.push(line.to_owned());
                }
            }
            None => top_lines.push(line),
        }
    }
    if let Some(done) = current {
        sections.insert(0, done);
    }

    if sections.is_empty() {
        debug!("HACP body has no section headers");
    }

    HacpResponse {
        top: TopFields::from_lines(&top_lines),
        sections,
    }
}

fn section_header(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?;
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(name)
    } else {
        None
    }
}

impl HacpResponse {
    #[must_use]
    pub fn top(&self) -> &TopFields {
        &self.top
    }

    #[must_use]
    pub fn sections(&self) -> &[HacpSection] {
        &self.sections
    }

    /// First section with this name in held order, i.e. the last one in the text.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&HacpSection> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// `core.lesson_status` decoded with both abbreviation tables.
    #[must_use]
    pub fn core_lesson_status(&self) -> Option<StatusField> {
        self.section("core")
            .and_then(|s| s.get("lesson_status"))
            .map(StatusField::parse)
    }

    /// The LMS accepted the request: `error_text` is `successful`, or it is
    /// empty and the error code is 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        let text = self.top.error_text.as_deref().unwrap_or_default();
        text.eq_ignore_ascii_case("successful")
            || (text.is_empty() && self.top.error_code() == Some(0))
    }

    /// Copy everything this response carries into `state`.
    ///
    /// The top block is applied first, then the sections in held order. The
    /// entry flag is taken only from a top-level `lesson_status`; inside the
    /// `[CORE]` section only the completion status is used.
    pub fn apply(&self, state: &mut SessionState) {
        let top = &self.top;
        if let Some(id) = &top.student_id {
            state.set_student_id(id.as_str());
        }
        if let Some(name) = &top.student_name {
            state.set_student_name(name.as_str());
        }
        if let Some(location) = &top.lesson_location {
            state.set_lesson_location(location.as_str());
        }
        if let Some(field) = &top.lesson_status {
            apply_status(state, &field.status);
            if let Some(entry) = &field.entry {
                match Entry::parse(entry) {
                    Ok(entry) => state.set_entry(entry),
                    Err(err) => warn!(%err, "ignoring entry flag from LMS"),
                }
            }
        }
        if let Some(score) = top.score {
            state.set_score(score);
        }
        if let Some(time) = top.time {
            state.set_total_time(time);
        }

        for section in &self.sections {
            for (key, value) in section.pairs() {
                let key = key.trim().to_lowercase();
                match (section.name(), key.as_str()) {
                    ("core", "lesson_status") => {
                        let value = value.to_lowercase();
                        let status = value.split(',').next().unwrap_or_default();
                        apply_status(state, &unabbreviate_status(status));
                    }
                    ("core_lesson", "suspend_data") => state.set_suspend_data(value),
                    ("student_data", "mastery_score") => state.set_mastery_score(value),
                    _ => {}
                }
            }
        }
    }
}

fn apply_status(state: &mut SessionState, expanded: &str) {
    if let Err(err) = state.set_lesson_status(expanded) {
        warn!(%err, "ignoring lesson status from LMS");
    }
}
