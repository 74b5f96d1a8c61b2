use std::env;
use std::sync::Arc;

use tracing::{debug, info};

use cmi_core::Clock;
use cmi_core::model::{Entry, LessonStatus};

use crate::adapter::LmsAdapter;
use crate::aicc::{AiccAdapter, AiccConfig, HacpTransport, HttpTransport};
use crate::error::AdapterError;
use crate::host::HostApi;
use crate::scorm::ScormAdapter;

/// The AICC parameters an LMS appends to the content's launch URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub aicc_sid: Option<String>,
    pub aicc_url: Option<String>,
}

impl LaunchParams {
    /// Read `aicc_sid` and `aicc_url` from a query string.
    ///
    /// Names match case-insensitively, a leading `?` is ignored and values are
    /// percent-decoded. Empty values count as absent.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.trim().trim_start_matches('?');
        for pair in query.split('&') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let slot = match name.to_ascii_lowercase().as_str() {
                "aicc_sid" => &mut params.aicc_sid,
                "aicc_url" => &mut params.aicc_url,
                _ => continue,
            };
            let value = match urlencoding::decode(value) {
                Ok(decoded) => decoded.into_owned(),
                Err(err) => {
                    debug!(%err, name, "launch parameter is not valid UTF-8 once decoded");
                    value.to_owned()
                }
            };
            *slot = Some(value).filter(|v| !v.trim().is_empty());
        }
        params
    }

    /// `LMS_AICC_SID` and `LMS_AICC_URL` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            aicc_sid: read("LMS_AICC_SID"),
            aicc_url: read("LMS_AICC_URL"),
        }
    }

    /// AICC configuration, when both the session id and URL are present.
    #[must_use]
    pub fn aicc_config(&self) -> Option<AiccConfig> {
        match (&self.aicc_url, &self.aicc_sid) {
            (Some(url), Some(sid)) => Some(AiccConfig::new(url.as_str(), sid.as_str())),
            _ => None,
        }
    }
}

/// A connected session over whichever protocol the launch selected.
pub enum LmsSession {
    Scorm(ScormAdapter),
    Aicc(AiccAdapter),
}

impl LmsSession {
    #[must_use]
    pub fn protocol(&self) -> &'static str {
        match self {
            LmsSession::Scorm(_) => "scorm",
            LmsSession::Aicc(_) => "aicc",
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &dyn LmsAdapter {
        match self {
            LmsSession::Scorm(adapter) => adapter,
            LmsSession::Aicc(adapter) => adapter,
        }
    }

    pub fn adapter_mut(&mut self) -> &mut dyn LmsAdapter {
        match self {
            LmsSession::Scorm(adapter) => adapter,
            LmsSession::Aicc(adapter) => adapter,
        }
    }
}

/// Connect over AICC when the launch carries both AICC parameters, otherwise
/// over SCORM through `host`, then start the attempt.
///
/// # Errors
///
/// Returns `AdapterError` if no protocol can connect or the initial commit fails.
pub async fn open_session(
    params: &LaunchParams,
    host: Option<Arc<dyn HostApi>>,
    clock: Clock,
) -> Result<LmsSession, AdapterError> {
    open_session_with(params, host, clock, |config| {
        let transport: Arc<dyn HacpTransport> = Arc::new(HttpTransport::new(config.url.as_str()));
        transport
    })
    .await
}

/// [`open_session`] with a caller-supplied AICC transport.
///
/// # Errors
///
/// Returns `AdapterError` if no protocol can connect or the initial commit fails.
pub async fn open_session_with<F>(
    params: &LaunchParams,
    host: Option<Arc<dyn HostApi>>,
    clock: Clock,
    make_transport: F,
) -> Result<LmsSession, AdapterError>
where
    F: FnOnce(&AiccConfig) -> Arc<dyn HacpTransport>,
{
    let mut session = match params.aicc_config() {
        Some(config) => {
            let transport = make_transport(&config);
            LmsSession::Aicc(AiccAdapter::connect(config, transport, clock).await?)
        }
        None => LmsSession::Scorm(ScormAdapter::connect_to(host, clock)?),
    };
    info!(protocol = session.protocol(), "LMS session opened");

    start_attempt(session.adapter_mut()).await?;
    Ok(session)
}

/// Mark a fresh attempt as `incomplete` and commit it, so the LMS records
/// that the learner has started.
///
/// Returns whether the status was promoted.
///
/// # Errors
///
/// Returns `AdapterError` if the state cannot be read, written or committed.
pub async fn start_attempt(adapter: &mut dyn LmsAdapter) -> Result<bool, AdapterError> {
    let fresh = matches!(
        adapter.lesson_status()?,
        None | Some(LessonStatus::NotAttempted)
    ) || adapter.entry()? == Entry::AbInitio;
    if !fresh {
        return Ok(false);
    }

    adapter.set_lesson_status(LessonStatus::Incomplete.as_str())?;
    adapter
        .commit()
        .await
        .map_err(|e| e.context("unable to record the start of the attempt"))?;
    debug!("attempt started as incomplete");
    Ok(true)
}
