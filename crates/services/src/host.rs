use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::HostFault;

/// What the host returns from its boolean-ish calls.
///
/// SCORM 1.2 hosts answer with either a real boolean or the string `"true"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostReply {
    Bool(bool),
    Text(String),
}

impl HostReply {
    /// `true`, or any casing of the string `"true"`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self {
            HostReply::Bool(b) => *b,
            HostReply::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

impl From<bool> for HostReply {
    fn from(value: bool) -> Self {
        HostReply::Bool(value)
    }
}

/// The SCORM 1.2 runtime API object exposed by the hosting LMS frame.
///
/// Locating the object is the embedder's job; this layer only calls it.
/// Implementations are not required to be reentrant: the adapters never
/// issue two calls at once.
pub trait HostApi: Send + Sync {
    /// `LMSInitialize("")`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn initialize(&self, arg: &str) -> Result<HostReply, HostFault>;

    /// `LMSGetValue(key)`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn get_value(&self, key: &str) -> Result<String, HostFault>;

    /// `LMSSetValue(key, value)`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn set_value(&self, key: &str, value: &str) -> Result<HostReply, HostFault>;

    /// `LMSCommit("")`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn commit(&self, arg: &str) -> Result<HostReply, HostFault>;

    /// `LMSFinish("")`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn finish(&self, arg: &str) -> Result<HostReply, HostFault>;

    /// `LMSGetLastError()`, a numeric string.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn get_last_error(&self) -> Result<String, HostFault>;

    /// `LMSGetErrorString(code)`.
    ///
    /// # Errors
    ///
    /// Returns `HostFault` if the host call itself fails.
    fn get_error_string(&self, code: &str) -> Result<String, HostFault>;
}

//
// ─── IN-MEMORY HOST ────────────────────────────────────────────────────────────
//

const NOT_IMPLEMENTED: &str = "401";

#[derive(Debug, Default)]
struct HostData {
    values: HashMap<String, String>,
    read_errors: HashMap<String, String>,
    refused_writes: HashSet<String>,
    faulty_keys: HashSet<String>,
    initialize_reply: Option<HostReply>,
    last_error: String,
    writes: Vec<(String, String)>,
    commits: usize,
    finished: bool,
}

impl HostData {
    // Highest slot index written under `prefix`, plus one.
    fn count(&self, prefix: &str) -> usize {
        let needle = format!("{prefix}.");
        self.values
            .keys()
            .filter_map(|key| key.strip_prefix(&needle))
            .filter_map(|rest| rest.split('.').next()?.parse::<usize>().ok())
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Simple in-memory SCORM 1.2 host for testing and prototyping.
///
/// `cmi.interactions._count` and `cmi.objectives._count` are derived from the
/// slots written so far, and only answered when the matching `._children`
/// key is present. Unknown keys answer with error `401`.
#[derive(Clone, Default)]
pub struct InMemoryHost {
    data: Arc<Mutex<HostData>>,
}

impl InMemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A host advertising the full SCORM 1.2 data model.
    #[must_use]
    pub fn scorm_12() -> Self {
        Self::new()
            .with_value(
                "cmi.core._children",
                "student_id,student_name,lesson_location,credit,lesson_status,entry,score,\
                 total_time,lesson_mode,exit,session_time",
            )
            .with_value(
                "cmi.student_data._children",
                "mastery_score,max_time_allowed,time_limit_action",
            )
            .with_value(
                "cmi.interactions._children",
                "id,objectives,time,type,correct_responses,weighting,student_response,result,latency",
            )
            .with_value("cmi.objectives._children", "id,score,status")
            .with_value("cmi.core.lesson_status", "not attempted")
            .with_value("cmi.core.entry", "ab-initio")
    }

    #[must_use]
    pub fn with_value(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.update(|d| {
            d.values.insert(key.into(), value.into());
        });
        self
    }

    /// Reading `key` leaves `code` as the last error.
    #[must_use]
    pub fn with_read_error(self, key: impl Into<String>, code: impl Into<String>) -> Self {
        self.update(|d| {
            d.read_errors.insert(key.into(), code.into());
        });
        self
    }

    /// Writing `key` answers `false`.
    #[must_use]
    pub fn refusing_writes_to(self, key: impl Into<String>) -> Self {
        self.update(|d| {
            d.refused_writes.insert(key.into());
        });
        self
    }

    /// Any call touching `key` fails outright.
    #[must_use]
    pub fn faulting_on(self, key: impl Into<String>) -> Self {
        self.update(|d| {
            d.faulty_keys.insert(key.into());
        });
        self
    }

    #[must_use]
    pub fn with_initialize_reply(self, reply: HostReply) -> Self {
        self.update(|d| d.initialize_reply = Some(reply));
        self
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.data.lock().ok()?.values.get(key).cloned()
    }

    /// Every accepted write, in call order.
    #[must_use]
    pub fn writes(&self) -> Vec<(String, String)> {
        self.data
            .lock()
            .map(|d| d.writes.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn commits(&self) -> usize {
        self.data.lock().map(|d| d.commits).unwrap_or_default()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.data.lock().map(|d| d.finished).unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut HostData)) {
        if let Ok(mut guard) = self.data.lock() {
            f(&mut guard);
        }
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut HostData) -> T) -> Result<T, HostFault> {
        let mut guard = self
            .data
            .lock()
            .map_err(|e| HostFault::new(e.to_string()))?;
        Ok(f(&mut guard))
    }
}

impl HostApi for InMemoryHost {
    fn initialize(&self, _arg: &str) -> Result<HostReply, HostFault> {
        self.with_data(|d| {
            d.last_error = "0".into();
            d.initialize_reply
                .clone()
                .unwrap_or_else(|| HostReply::Text("true".into()))
        })
    }

    fn get_value(&self, key: &str) -> Result<String, HostFault> {
        self.with_data(|d| {
            if d.faulty_keys.contains(key) {
                return Err(HostFault::new(format!("host failed reading {key}")));
            }
            if let Some(code) = d.read_errors.get(key) {
                d.last_error = code.clone();
                return Ok(String::new());
            }
            if let Some(prefix) = key.strip_suffix("._count") {
                if d.values.contains_key(&format!("{prefix}._children")) {
                    d.last_error = "0".into();
                    return Ok(d.count(prefix).to_string());
                }
                d.last_error = NOT_IMPLEMENTED.into();
                return Ok(String::new());
            }
            match d.values.get(key).cloned() {
                Some(value) => {
                    d.last_error = "0".into();
                    Ok(value)
                }
                None => {
                    d.last_error = NOT_IMPLEMENTED.into();
                    Ok(String::new())
                }
            }
        })?
    }

    fn set_value(&self, key: &str, value: &str) -> Result<HostReply, HostFault> {
        self.with_data(|d| {
            if d.faulty_keys.contains(key) {
                return Err(HostFault::new(format!("host failed writing {key}")));
            }
            if d.refused_writes.contains(key) {
                d.last_error = "351".into();
                return Ok(HostReply::Bool(false));
            }
            d.values.insert(key.to_owned(), value.to_owned());
            d.writes.push((key.to_owned(), value.to_owned()));
            d.last_error = "0".into();
            Ok(HostReply::Text("true".into()))
        })?
    }

    fn commit(&self, _arg: &str) -> Result<HostReply, HostFault> {
        self.with_data(|d| {
            d.commits += 1;
            HostReply::Bool(true)
        })
    }

    fn finish(&self, _arg: &str) -> Result<HostReply, HostFault> {
        self.with_data(|d| {
            d.finished = true;
            HostReply::Text("true".into())
        })
    }

    fn get_last_error(&self) -> Result<String, HostFault> {
        self.with_data(|d| d.last_error.clone())
    }

    fn get_error_string(&self, code: &str) -> Result<String, HostFault> {
        let description = match code.trim() {
            "0" => "No error",
            "101" => "General exception",
            "201" => "Invalid argument error",
            "202" => "Element cannot have children",
            "203" => "Element not an array - cannot have count",
            "301" => "Not initialized",
            "351" => "Incorrect data type",
            "401" => "Not implemented error",
            "402" => "Invalid set value, element is a keyword",
            "403" => "Element is read only",
            "404" => "Element is write only",
            "405" => "Incorrect data type",
            _ => "Unknown error",
        };
        Ok(description.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_accepts_bool_and_string_true() {
        assert!(HostReply::Bool(true).is_true());
        assert!(HostReply::Text("TRUE".into()).is_true());
        assert!(!HostReply::Text("false".into()).is_true());
        assert!(!HostReply::Bool(false).is_true());
    }

    #[test]
    fn counts_follow_written_slots() {
        let host = InMemoryHost::scorm_12();
        assert_eq!(host.get_value("cmi.objectives._count").unwrap(), "0");
        host.set_value("cmi.objectives.0.id", "a").unwrap();
        host.set_value("cmi.objectives.1.id", "b").unwrap();
        host.set_value("cmi.objectives.1.status", "passed").unwrap();
        assert_eq!(host.get_value("cmi.objectives._count").unwrap(), "2");
    }

    #[test]
    fn unknown_keys_report_not_implemented() {
        let host = InMemoryHost::new();
        assert_eq!(host.get_value("cmi.interactions._count").unwrap(), "");
        assert_eq!(host.get_last_error().unwrap(), "401");
        assert_eq!(host.get_value("cmi.core.lesson_mode").unwrap(), "");
        assert_eq!(host.get_last_error().unwrap(), "401");
    }
}
