use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use cmi_core::Clock;
use cmi_core::model::{
    Capabilities, Entry, ExitStatus, LOCATION_SENTINEL, LessonStatus, parse_score,
};
use cmi_core::time::elapsed_timespan;

use crate::accessor::RuntimeAccessor;
use crate::adapter::LmsAdapter;
use crate::error::AdapterError;
use crate::host::HostApi;
use crate::interactions::InteractionRecorder;
use crate::objectives::ObjectiveRecorder;

const LESSON_STATUS: &str = "cmi.core.lesson_status";
const LESSON_LOCATION: &str = "cmi.core.lesson_location";
const SCORE_RAW: &str = "cmi.core.score.raw";
const SCORE_MIN: &str = "cmi.core.score.min";
const SCORE_MAX: &str = "cmi.core.score.max";
const SUSPEND_DATA: &str = "cmi.suspend_data";

/// SCORM 1.2 adapter over an in-process host API object.
pub struct ScormAdapter {
    accessor: Arc<RuntimeAccessor>,
    capabilities: Capabilities,
    clock: Clock,
    session_start: DateTime<Utc>,
    last_commit: Option<DateTime<Utc>>,
}

impl ScormAdapter {
    /// Initialise the host and probe what it supports.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if initialisation is refused or the capability
    /// keys cannot be read.
    pub fn connect(host: Arc<dyn HostApi>, clock: Clock) -> Result<Self, AdapterError> {
        let accessor = Arc::new(RuntimeAccessor::new(host));
        accessor
            .connect()
            .map_err(|e| e.context("unable to connect to SCORM LMS"))?;

        let capabilities = probe_capabilities(&accessor)?;
        info!(
            interactions = capabilities.supports_interactions(),
            objectives = capabilities.supports_objectives(),
            "connected to SCORM LMS"
        );

        Ok(Self {
            accessor,
            capabilities,
            clock,
            session_start: clock.now(),
            last_commit: None,
        })
    }

    /// Like [`ScormAdapter::connect`], for callers whose host lookup may
    /// have found nothing.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::HostUnavailable` when `host` is `None`.
    pub fn connect_to(host: Option<Arc<dyn HostApi>>, clock: Clock) -> Result<Self, AdapterError> {
        let host = host.ok_or(AdapterError::HostUnavailable)?;
        Self::connect(host, clock)
    }

    /// Replace the clock used for session time and commit timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[must_use]
    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    /// Recorder for `cmi.objectives.N.*`, seeded from what the LMS holds.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the existing objectives cannot be read.
    pub fn objectives(&self) -> Result<ObjectiveRecorder, AdapterError> {
        ObjectiveRecorder::load(Arc::clone(&self.accessor), &self.capabilities)
    }

    /// Recorder for `cmi.interactions.N.*` with its companion objectives.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the existing objectives cannot be read.
    pub fn interactions(&self) -> Result<InteractionRecorder, AdapterError> {
        Ok(InteractionRecorder::new(
            Arc::clone(&self.accessor),
            self.objectives()?,
            &self.capabilities,
        ))
    }

    // ─── SCORM-only elements ───

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn lesson_mode(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.core.lesson_mode")
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn credit(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.core.credit")
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn score_min(&self) -> Result<i64, AdapterError> {
        Ok(parse_score(&self.accessor.get(SCORE_MIN)?))
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    pub fn set_score_min(&mut self, value: i64) -> Result<(), AdapterError> {
        self.accessor.set(SCORE_MIN, &value.to_string())
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn score_max(&self) -> Result<i64, AdapterError> {
        Ok(parse_score(&self.accessor.get(SCORE_MAX)?))
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    pub fn set_score_max(&mut self, value: i64) -> Result<(), AdapterError> {
        self.accessor.set(SCORE_MAX, &value.to_string())
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn launch_data(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.launch_data")
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn comments(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.comments")
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    pub fn set_comments(&mut self, value: &str) -> Result<(), AdapterError> {
        self.accessor.set("cmi.comments", value)
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn lms_comments(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.comments_from_lms")
    }

    /// `cmi.core.exit` is write-only.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    pub fn set_exit(&mut self, exit: ExitStatus) -> Result<(), AdapterError> {
        self.accessor.set("cmi.core.exit", exit.as_str())
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn max_time_allowed(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.student_data.max_time_allowed")
    }

    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be read.
    pub fn time_limit_action(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.student_data.time_limit_action")
    }

    /// Write the time elapsed since connecting to `cmi.core.session_time`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the value cannot be written.
    pub fn write_session_time(&mut self) -> Result<String, AdapterError> {
        let span = elapsed_timespan(Some(self.session_start), self.clock.now());
        self.accessor.set("cmi.core.session_time", &span)?;
        Ok(span)
    }

    fn close(&mut self) -> Result<bool, AdapterError> {
        let exit = ExitStatus::for_status(self.lesson_status()?);
        self.set_exit(exit)?;
        let span = self.write_session_time()?;
        let finished = self.accessor.finish()?;
        info!(exit = exit.as_str(), session_time = %span, finished, "finished SCORM session");
        Ok(finished)
    }
}

fn probe_capabilities(accessor: &RuntimeAccessor) -> Result<Capabilities, AdapterError> {
    let children = |key: &str, what: &str| {
        accessor
            .get(key)
            .map(|raw| Capabilities::parse_children(&raw))
            .map_err(|e| e.context(format!("unable to read {what} children from LMS")))
    };
    Ok(Capabilities {
        core: children("cmi.core._children", "core")?,
        student_data: children("cmi.student_data._children", "student data")?,
        interactions: children("cmi.interactions._children", "interaction")?,
        objectives: children("cmi.objectives._children", "objective")?,
    })
}

#[async_trait]
impl LmsAdapter for ScormAdapter {
    fn is_connected(&self) -> bool {
        self.accessor.is_connected()
    }

    fn lesson_status(&self) -> Result<Option<LessonStatus>, AdapterError> {
        let raw = self.accessor.get(LESSON_STATUS)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(LessonStatus::parse(&raw)?))
    }

    fn set_lesson_status(&mut self, value: &str) -> Result<LessonStatus, AdapterError> {
        let status = LessonStatus::parse(value)?;
        self.accessor.set(LESSON_STATUS, status.as_str())?;
        Ok(status)
    }

    fn lesson_location(&self) -> Result<String, AdapterError> {
        let location = self.accessor.get(LESSON_LOCATION)?;
        if location.is_empty() {
            return Ok(LOCATION_SENTINEL.to_owned());
        }
        Ok(location)
    }

    fn set_lesson_location(&mut self, value: &str) -> Result<(), AdapterError> {
        self.accessor.set(LESSON_LOCATION, value)
    }

    fn score(&self) -> Result<i64, AdapterError> {
        Ok(parse_score(&self.accessor.get(SCORE_RAW)?))
    }

    fn set_score(&mut self, value: i64) -> Result<(), AdapterError> {
        self.accessor.set(SCORE_RAW, &value.to_string())
    }

    fn suspend_data(&self) -> Result<String, AdapterError> {
        self.accessor.get(SUSPEND_DATA)
    }

    fn set_suspend_data(&mut self, value: &str) -> Result<(), AdapterError> {
        self.accessor.set(SUSPEND_DATA, value)
    }

    fn student_id(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.core.student_id")
    }

    fn student_name(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.core.student_name")
    }

    fn entry(&self) -> Result<Entry, AdapterError> {
        Ok(Entry::parse(&self.accessor.get("cmi.core.entry")?)?)
    }

    fn total_time(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.core.total_time")
    }

    fn mastery_score(&self) -> Result<String, AdapterError> {
        self.accessor.get("cmi.student_data.mastery_score")
    }

    async fn commit(&mut self) -> Result<bool, AdapterError> {
        let committed = self.accessor.commit()?;
        if committed {
            let at = self.clock.now();
            self.last_commit = Some(at);
            debug!(%at, "SCORM commit accepted");
        } else {
            debug!("SCORM commit not accepted");
        }
        Ok(committed)
    }

    async fn finish(&mut self) -> Result<bool, AdapterError> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.close()
            .map_err(|e| e.context("unable to finish SCORM session"))
    }

    fn last_commit(&self) -> Option<DateTime<Utc>> {
        self.last_commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::{HostReply, InMemoryHost};
    use chrono::Duration;
    use cmi_core::time::fixed_now;

    fn connect(host: &InMemoryHost) -> ScormAdapter {
        ScormAdapter::connect(Arc::new(host.clone()), Clock::fixed(fixed_now())).unwrap()
    }

    #[test]
    fn connect_probes_capabilities() {
        let host = InMemoryHost::scorm_12();
        let adapter = connect(&host);
        assert!(adapter.is_connected());
        assert!(adapter.capabilities().supports_objectives());
        assert!(adapter.capabilities().supports_core("lesson_mode"));
        assert!(adapter.capabilities().supports_student_data("mastery_score"));
    }

    #[test]
    fn missing_host_is_a_connection_failure() {
        let err = ScormAdapter::connect_to(None, Clock::default_clock()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);

        let host = InMemoryHost::new().with_initialize_reply(HostReply::Bool(false));
        let err = ScormAdapter::connect(Arc::new(host), Clock::default_clock()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.to_string(), "unable to connect to SCORM LMS");
    }

    #[test]
    fn reads_map_host_values() {
        let host = InMemoryHost::scorm_12()
            .with_value("cmi.core.score.raw", "85.5")
            .with_value("cmi.core.student_id", "S-42")
            .with_value("cmi.core.student_name", "Doe, Jane")
            .with_value("cmi.suspend_data", "q1=a;q2=b")
            .with_value("cmi.core.entry", "resume");
        let adapter = connect(&host);

        assert_eq!(
            adapter.lesson_status().unwrap(),
            Some(LessonStatus::NotAttempted)
        );
        assert_eq!(adapter.lesson_location().unwrap(), LOCATION_SENTINEL);
        assert_eq!(adapter.score().unwrap(), 85);
        assert_eq!(adapter.score_min().unwrap(), 0);
        assert_eq!(adapter.student_id().unwrap(), "S-42");
        assert_eq!(adapter.student_name().unwrap(), "Doe, Jane");
        assert_eq!(adapter.suspend_data().unwrap(), "q1=a;q2=b");
        assert_eq!(adapter.entry().unwrap(), Entry::Resume);
        assert_eq!(adapter.lesson_mode().unwrap(), "");
    }

    #[test]
    fn invalid_status_is_never_written() {
        let host = InMemoryHost::scorm_12();
        let mut adapter = connect(&host);
        let err = adapter.set_lesson_status("done").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(host.writes().is_empty());

        adapter.set_lesson_status("Passed").unwrap();
        assert_eq!(host.value(LESSON_STATUS).as_deref(), Some("passed"));
    }

    #[tokio::test]
    async fn commit_records_timestamp() {
        let host = InMemoryHost::scorm_12();
        let mut adapter = connect(&host);
        assert_eq!(adapter.last_commit(), None);
        assert!(adapter.commit().await.unwrap());
        assert_eq!(adapter.last_commit(), Some(fixed_now()));
        assert_eq!(host.commits(), 1);
    }

    #[tokio::test]
    async fn finish_writes_exit_then_session_time() {
        let host = InMemoryHost::scorm_12();
        let mut adapter = connect(&host)
            .with_clock(Clock::fixed(fixed_now() + Duration::seconds(95)));
        adapter.set_lesson_status("completed").unwrap();

        assert!(adapter.finish().await.unwrap());
        let writes = host.writes();
        assert_eq!(writes[1], ("cmi.core.exit".into(), "logout".into()));
        assert_eq!(
            writes[2],
            ("cmi.core.session_time".into(), "0000:01:35.00".into())
        );
        assert!(host.is_finished());
        assert!(!adapter.is_connected());
        assert!(!adapter.finish().await.unwrap());
    }

    #[tokio::test]
    async fn unfinished_attempt_exits_with_suspend() {
        let host = InMemoryHost::scorm_12();
        let mut adapter = connect(&host);
        adapter.set_lesson_status("incomplete").unwrap();
        adapter.finish().await.unwrap();
        assert_eq!(host.value("cmi.core.exit").as_deref(), Some("suspend"));
    }
}
