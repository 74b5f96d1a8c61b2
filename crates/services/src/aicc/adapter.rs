use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use cmi_core::Clock;
use cmi_core::hacp::{self, HacpResponse};
use cmi_core::model::{Entry, LessonStatus, SessionState};
use cmi_core::time::cmi_timespan;

use crate::adapter::LmsAdapter;
use crate::aicc::transport::{DEFAULT_HACP_VERSION, HacpCommand, HacpRequest, HacpTransport};
use crate::error::AdapterError;

/// Where and as whom to talk HACP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiccConfig {
    pub url: String,
    pub session_id: String,
    pub version: String,
}

impl AiccConfig {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            version: DEFAULT_HACP_VERSION.to_owned(),
        }
    }
}

/// AICC HACP adapter.
///
/// All reads and writes go to a local [`SessionState`]; the LMS only sees it
/// on commit and finish.
pub struct AiccAdapter {
    config: AiccConfig,
    transport: Arc<dyn HacpTransport>,
    clock: Clock,
    state: SessionState,
    session_start: Option<DateTime<Utc>>,
    connected: bool,
}

impl AiccAdapter {
    /// Send `GetParam` and load the session the LMS returns.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::SessionRefused` when the LMS reports an error, or
    /// a transport error if the exchange fails.
    pub async fn connect(
        config: AiccConfig,
        transport: Arc<dyn HacpTransport>,
        clock: Clock,
    ) -> Result<Self, AdapterError> {
        let mut adapter = Self {
            config,
            transport,
            clock,
            state: SessionState::new(),
            session_start: None,
            connected: false,
        };

        let response = adapter
            .exchange(HacpCommand::GetParam, None)
            .await
            .map_err(|e| e.context("unable to connect to AICC LMS"))?;
        if !response.is_success() {
            let top = response.top();
            return Err(AdapterError::SessionRefused {
                code: top.error.clone().unwrap_or_default(),
                text: top.error_text.clone().unwrap_or_default(),
            });
        }

        response.apply(&mut adapter.state);
        adapter.session_start = Some(adapter.clock.now());
        adapter.connected = true;
        info!(
            session_id = %adapter.config.session_id,
            student_id = adapter.state.student_id(),
            "connected to AICC LMS"
        );
        Ok(adapter)
    }

    /// Replace the clock used for session time and commit timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AiccConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    /// End the session with a fire-and-forget `ExitParam` carrying the
    /// current state, for use while the page unloads.
    ///
    /// Returns whether the request was queued. Delivery is not guaranteed.
    pub fn finish_with_beacon(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        self.refresh_session_time();
        let request = self
            .request(HacpCommand::ExitParam)
            .with_data(hacp::serialize(&self.state));
        let queued = self.transport.send_beacon(&request);
        info!(queued, "sent AICC exit beacon");
        self.close();
        queued
    }

    fn request(&self, command: HacpCommand) -> HacpRequest {
        HacpRequest::new(command, &self.config.version, &self.config.session_id)
    }

    async fn exchange(
        &self,
        command: HacpCommand,
        data: Option<String>,
    ) -> Result<HacpResponse, AdapterError> {
        let mut request = self.request(command);
        request.aicc_data = data;
        let body = self.transport.post(&request).await?;
        Ok(hacp::parse(&body))
    }

    fn refresh_session_time(&mut self) {
        if let Some(start) = self.session_start {
            self.state.set_session_time(self.clock.now() - start);
        }
    }

    async fn put(&mut self) -> Result<bool, AdapterError> {
        self.refresh_session_time();
        let payload = hacp::serialize(&self.state);
        let response = self.exchange(HacpCommand::PutParam, Some(payload)).await?;
        response.apply(&mut self.state);

        if response.is_success() {
            let at = self.clock.now();
            self.state.record_commit(at);
            debug!(%at, "AICC commit accepted");
            Ok(true)
        } else {
            warn!(
                error = response.top().error.as_deref().unwrap_or_default(),
                error_text = response.top().error_text.as_deref().unwrap_or_default(),
                "AICC commit not accepted"
            );
            Ok(false)
        }
    }

    async fn exit(&mut self) -> Result<bool, AdapterError> {
        let committed = self.put().await?;
        let response = self.exchange(HacpCommand::ExitAu, None).await?;
        let exited = response.is_success();
        info!(committed, exited, "finished AICC session");
        Ok(committed && exited)
    }

    fn close(&mut self) {
        self.state.reset();
        self.session_start = None;
        self.connected = false;
    }
}

#[async_trait]
impl LmsAdapter for AiccAdapter {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn lesson_status(&self) -> Result<Option<LessonStatus>, AdapterError> {
        Ok(self.state.lesson_status())
    }

    fn set_lesson_status(&mut self, value: &str) -> Result<LessonStatus, AdapterError> {
        Ok(self.state.set_lesson_status(value)?)
    }

    fn lesson_location(&self) -> Result<String, AdapterError> {
        Ok(self.state.lesson_location_or_default().to_owned())
    }

    fn set_lesson_location(&mut self, value: &str) -> Result<(), AdapterError> {
        self.state.set_lesson_location(value);
        Ok(())
    }

    fn score(&self) -> Result<i64, AdapterError> {
        Ok(self.state.score())
    }

    fn set_score(&mut self, value: i64) -> Result<(), AdapterError> {
        self.state.set_score(value);
        Ok(())
    }

    fn suspend_data(&self) -> Result<String, AdapterError> {
        Ok(self.state.suspend_data().to_owned())
    }

    fn set_suspend_data(&mut self, value: &str) -> Result<(), AdapterError> {
        self.state.set_suspend_data(value);
        Ok(())
    }

    fn student_id(&self) -> Result<String, AdapterError> {
        Ok(self.state.student_id().to_owned())
    }

    fn student_name(&self) -> Result<String, AdapterError> {
        Ok(self.state.student_name().to_owned())
    }

    fn entry(&self) -> Result<Entry, AdapterError> {
        Ok(self.state.entry())
    }

    fn total_time(&self) -> Result<String, AdapterError> {
        Ok(cmi_timespan(self.state.total_time()))
    }

    fn mastery_score(&self) -> Result<String, AdapterError> {
        Ok(self.state.mastery_score().to_owned())
    }

    async fn commit(&mut self) -> Result<bool, AdapterError> {
        if !self.connected {
            return Ok(false);
        }
        self.put()
            .await
            .map_err(|e| e.context("unable to commit to AICC LMS"))
    }

    async fn finish(&mut self) -> Result<bool, AdapterError> {
        if !self.connected {
            return Ok(false);
        }
        let outcome = self
            .exit()
            .await
            .map_err(|e| e.context("unable to finish AICC session"));
        self.close();
        outcome
    }

    fn last_commit(&self) -> Option<DateTime<Utc>> {
        self.state.last_commit()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::Duration;
    use cmi_core::model::LOCATION_SENTINEL;
    use cmi_core::time::fixed_now;

    use super::*;
    use crate::error::{ErrorKind, TransportError};

    const GET_PARAM_OK: &str = "error=0\r\nerror_text=Successful\r\n\
        aicc_data=\r\n[CORE]\r\nStudent_ID=S-9\r\nStudent_Name=Lee, Ana\r\n\
        Lesson_Location=intro\r\nLesson_Status=i\r\nScore=40\r\n\
        [CORE_LESSON]\r\nq1=a\r\n[STUDENT_DATA]\r\nMastery_Score=80\r\n";

    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<String, TransportError>>>,
        sent: Mutex<Vec<HacpRequest>>,
        beacons: Mutex<Vec<HacpRequest>>,
    }

    impl ScriptedTransport {
        fn replying(replies: &[&str]) -> Arc<Self> {
            let transport = Self::default();
            transport
                .replies
                .lock()
                .unwrap()
                .extend(replies.iter().map(|r| Ok((*r).to_owned())));
            Arc::new(transport)
        }

        fn sent(&self) -> Vec<HacpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HacpTransport for ScriptedTransport {
        async fn post(&self, request: &HacpRequest) -> Result<String, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("error=0\r\nerror_text=Successful\r\n".into()))
        }

        fn send_beacon(&self, request: &HacpRequest) -> bool {
            self.beacons.lock().unwrap().push(request.clone());
            true
        }
    }

    async fn connect(transport: &Arc<ScriptedTransport>) -> AiccAdapter {
        AiccAdapter::connect(
            AiccConfig::new("http://lms.test/hacp", "sid-1"),
            Arc::clone(transport) as Arc<dyn HacpTransport>,
            Clock::fixed(fixed_now()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn connect_loads_session_from_get_param() {
        let transport = ScriptedTransport::replying(&[GET_PARAM_OK]);
        let adapter = connect(&transport).await;

        assert!(adapter.is_connected());
        assert_eq!(
            adapter.lesson_status().unwrap(),
            Some(LessonStatus::Incomplete)
        );
        assert_eq!(adapter.mastery_score().unwrap(), "80");
        // only lesson_status is read back from inside [CORE]
        assert_eq!(adapter.lesson_location().unwrap(), LOCATION_SENTINEL);
        assert_eq!(adapter.student_id().unwrap(), "");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].command, HacpCommand::GetParam);
        assert_eq!(sent[0].session_id, "sid-1");
        assert_eq!(sent[0].version, "1.0");
        assert_eq!(sent[0].aicc_data, None);
    }

    #[tokio::test]
    async fn refused_session_reports_lms_error() {
        let transport = ScriptedTransport::replying(&["error=3\r\nerror_text=Invalid Session ID\r\n"]);
        let err = AiccAdapter::connect(
            AiccConfig::new("http://lms.test/hacp", "bad"),
            transport,
            Clock::default_clock(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.to_string().contains("Invalid Session ID"));
    }

    #[tokio::test]
    async fn transport_failure_is_wrapped() {
        let transport = Arc::new(ScriptedTransport::default());
        transport
            .replies
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Rejected("offline".into())));
        let err = AiccAdapter::connect(
            AiccConfig::new("http://lms.test/hacp", "sid-1"),
            transport,
            Clock::default_clock(),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "unable to connect to AICC LMS");
    }

    #[tokio::test]
    async fn commit_puts_serialized_state() {
        let transport = ScriptedTransport::replying(&[GET_PARAM_OK]);
        let mut adapter = connect(&transport)
            .await
            .with_clock(Clock::fixed(fixed_now() + Duration::seconds(61)));
        adapter.set_lesson_status("passed").unwrap();
        adapter.set_score(90).unwrap();
        adapter.set_suspend_data("q1=b").unwrap();

        assert!(adapter.commit().await.unwrap());
        assert_eq!(
            adapter.last_commit(),
            Some(fixed_now() + Duration::seconds(61))
        );

        let put = transport.sent().pop().unwrap();
        assert_eq!(put.command, HacpCommand::PutParam);
        let data = put.aicc_data.unwrap();
        assert!(data.contains("Lesson_Status=passed\r\n"));
        assert!(data.contains("Score=90\r\n"));
        assert!(data.contains("Time=0000:01:01.00\r\n"));
        assert!(data.contains("Suspend_Data=q1=b\r\n"));
    }

    #[tokio::test]
    async fn rejected_commit_returns_false() {
        let transport =
            ScriptedTransport::replying(&[GET_PARAM_OK, "error=1\r\nerror_text=Invalid Command\r\n"]);
        let mut adapter = connect(&transport).await;
        assert!(!adapter.commit().await.unwrap());
        assert_eq!(adapter.last_commit(), None);
    }

    #[tokio::test]
    async fn finish_commits_then_exits_and_resets() {
        let transport = ScriptedTransport::replying(&[GET_PARAM_OK]);
        let mut adapter = connect(&transport).await;
        adapter.set_suspend_data("bookmark=4").unwrap();

        assert!(adapter.finish().await.unwrap());
        let commands: Vec<HacpCommand> = transport.sent().iter().map(|r| r.command).collect();
        assert_eq!(
            commands,
            vec![
                HacpCommand::GetParam,
                HacpCommand::PutParam,
                HacpCommand::ExitAu
            ]
        );
        assert!(!adapter.is_connected());
        assert_eq!(adapter.state(), &SessionState::new());
        assert!(!adapter.commit().await.unwrap());
    }

    #[tokio::test]
    async fn beacon_finish_queues_exit_param() {
        let transport = ScriptedTransport::replying(&[GET_PARAM_OK]);
        let mut adapter = connect(&transport).await;
        adapter.set_lesson_status("completed").unwrap();

        assert!(adapter.finish_with_beacon());
        let beacons = transport.beacons.lock().unwrap().clone();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].command, HacpCommand::ExitParam);
        assert!(
            beacons[0]
                .aicc_data
                .as_deref()
                .unwrap()
                .contains("Lesson_Status=completed")
        );
        assert!(!adapter.is_connected());
        assert!(!adapter.finish_with_beacon());
    }
}
