use crate::model::{LessonStatus, SessionState};
use crate::time::cmi_timespan;

const CRLF: &str = "\r\n";

/// Build the `AICC_Data` payload for a PutParam/ExitParam exchange.
///
/// Always emits `[CORE]`, `[CORE_LESSON]` and an empty `[OBJECTIVES_STATUS]`,
/// in that order, with CRLF line endings. Values are written as stored.
#[must_use]
pub fn serialize(state: &SessionState) -> String {
    let status = state.lesson_status().map_or("", LessonStatus::as_str);
    let lines = [
        "[CORE]".to_owned(),
        format!("Lesson_Location={}", state.lesson_location()),
        format!("Lesson_Status={status}"),
        format!("Score={}", state.score()),
        format!("Time={}", cmi_timespan(state.session_time())),
        "[CORE_LESSON]".to_owned(),
        format!("Suspend_Data={}", state.suspend_data()),
        "[OBJECTIVES_STATUS]".to_owned(),
    ];

    lines.iter().map(|line| format!("{line}{CRLF}")).collect()
}
