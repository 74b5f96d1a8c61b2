use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::AdapterError;
use crate::host::HostApi;

const NOT_IMPLEMENTED: i64 = 401;

/// Typed get/set access to the host API.
///
/// Until [`RuntimeAccessor::connect`] succeeds every read returns an empty
/// string and every write is dropped.
pub struct RuntimeAccessor {
    host: Arc<dyn HostApi>,
    connected: AtomicBool,
}

impl RuntimeAccessor {
    #[must_use]
    pub fn new(host: Arc<dyn HostApi>) -> Self {
        Self {
            host,
            connected: AtomicBool::new(false),
        }
    }

    /// Call the host's initialize and mark the accessor connected on success.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::InitializeFailed` when the host answers anything
    /// but true, or wraps the fault if the call fails.
    pub fn connect(&self) -> Result<(), AdapterError> {
        let reply = self
            .host
            .initialize("")
            .map_err(|source| AdapterError::HostCall {
                message: "LMS initialisation failed".into(),
                source,
            })?;
        if !reply.is_true() {
            return Err(AdapterError::InitializeFailed);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Read `key` from the LMS.
    ///
    /// Error code `401` (not implemented) is tolerated and reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Host` for any other non-zero error code, or
    /// `AdapterError::HostCall` if the host call fails.
    pub fn get(&self, key: &str) -> Result<String, AdapterError> {
        if !self.is_connected() {
            return Ok(String::new());
        }

        let value = self
            .host
            .get_value(key)
            .map_err(|source| AdapterError::HostCall {
                message: format!("unable to get value from LMS (key: {key})"),
                source,
            })?;

        let code = self
            .host
            .get_last_error()
            .map_err(|source| AdapterError::HostCall {
                message: format!("unable to read LMS error after getting {key}"),
                source,
            })?;
        let code = code.trim();
        match code.parse::<i64>() {
            Ok(0) => Ok(value),
            _ if code.is_empty() => Ok(value),
            Ok(NOT_IMPLEMENTED) => {
                debug!(key, "LMS does not implement element");
                Ok(String::new())
            }
            _ => {
                let description = self.host.get_error_string(code).map_err(|source| {
                    AdapterError::HostCall {
                        message: format!("unable to describe LMS error {code}"),
                        source,
                    }
                })?;
                Err(AdapterError::Host {
                    key: key.to_owned(),
                    code: code.to_owned(),
                    description,
                })
            }
        }
    }

    /// Write `value` to `key`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::SetRejected` when the host answers false, or
    /// `AdapterError::HostCall` if the host call fails.
    pub fn set(&self, key: &str, value: &str) -> Result<(), AdapterError> {
        if !self.is_connected() {
            return Ok(());
        }

        let reply = self
            .host
            .set_value(key, value)
            .map_err(|source| AdapterError::HostCall {
                message: format!("unexpected error when trying to set value in LMS (key: {key})"),
                source,
            })?;
        if !reply.is_true() {
            return Err(AdapterError::SetRejected {
                key: key.to_owned(),
                value: value.to_owned(),
            });
        }
        Ok(())
    }

    /// Ask the LMS to persist what has been written so far.
    ///
    /// Returns `false` when disconnected or when the host reports failure.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::HostCall` if the host call fails.
    pub fn commit(&self) -> Result<bool, AdapterError> {
        if !self.is_connected() {
            return Ok(false);
        }
        let reply = self
            .host
            .commit("")
            .map_err(|source| AdapterError::HostCall {
                message: "LMS commit failed".into(),
                source,
            })?;
        Ok(reply.is_true())
    }

    /// End the session with the host. The accessor is disconnected afterwards
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::HostCall` if the host call fails.
    pub fn finish(&self) -> Result<bool, AdapterError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let reply = self
            .host
            .finish("")
            .map_err(|source| AdapterError::HostCall {
                message: "LMS finish failed".into(),
                source,
            })?;
        Ok(reply.is_true())
    }
}
