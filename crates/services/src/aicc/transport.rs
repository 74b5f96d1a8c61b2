use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::TransportError;

/// HACP protocol version sent when the launch does not name one.
pub const DEFAULT_HACP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HacpCommand {
    GetParam,
    PutParam,
    ExitParam,
    #[serde(rename = "ExitAU")]
    ExitAu,
}

impl HacpCommand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HacpCommand::GetParam => "GetParam",
            HacpCommand::PutParam => "PutParam",
            HacpCommand::ExitParam => "ExitParam",
            HacpCommand::ExitAu => "ExitAU",
        }
    }
}

/// One form-encoded HACP POST body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HacpRequest {
    pub command: HacpCommand,
    pub version: String,
    pub session_id: String,
    #[serde(rename = "AICC_Data", skip_serializing_if = "Option::is_none")]
    pub aicc_data: Option<String>,
}

impl HacpRequest {
    pub fn new(
        command: HacpCommand,
        version: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            command,
            version: version.into(),
            session_id: session_id.into(),
            aicc_data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.aicc_data = Some(data.into());
        self
    }
}

/// Delivery of HACP requests to the LMS.
///
/// `post` is an ordinary exchange whose response body is returned. `send_beacon`
/// is fire-and-forget for when the page is going away: the result only says
/// whether the attempt was queued.
#[async_trait]
pub trait HacpTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns `TransportError` if the request fails or the LMS answers with a
    /// non-success status.
    async fn post(&self, request: &HacpRequest) -> Result<String, TransportError>;

    fn send_beacon(&self, request: &HacpRequest) -> bool;
}

/// reqwest-backed transport posting `application/x-www-form-urlencoded` bodies.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    #[must_use]
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

async fn send(client: &Client, url: &str, request: &HacpRequest) -> Result<String, TransportError> {
    if url.trim().is_empty() {
        return Err(TransportError::Rejected("no AICC URL configured".into()));
    }

    let response = client.post(url).form(request).send().await?;
    if !response.status().is_success() {
        return Err(TransportError::HttpStatus(response.status()));
    }
    Ok(response.text().await?)
}

#[async_trait]
impl HacpTransport for HttpTransport {
    async fn post(&self, request: &HacpRequest) -> Result<String, TransportError> {
        debug!(command = request.command.as_str(), "posting HACP request");
        send(&self.client, &self.url, request).await
    }

    fn send_beacon(&self, request: &HacpRequest) -> bool {
        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime available, HACP beacon dropped");
            return false;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let request = request.clone();
        handle.spawn(async move {
            if let Err(err) = send(&client, &url, &request).await {
                debug!(%err, command = request.command.as_str(), "HACP beacon not delivered");
            }
        });
        true
    }
}
