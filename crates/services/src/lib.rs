#![forbid(unsafe_code)]

pub mod accessor;
pub mod adapter;
pub mod aicc;
pub mod error;
pub mod host;
pub mod interactions;
pub mod launch;
pub mod objectives;
pub mod scorm;

pub use cmi_core::Clock;

pub use accessor::RuntimeAccessor;
pub use adapter::LmsAdapter;
pub use aicc::{AiccAdapter, AiccConfig, HacpTransport, HttpTransport};
pub use error::{AdapterError, ErrorKind, HostFault, TransportError};
pub use host::{HostApi, HostReply, InMemoryHost};
pub use interactions::InteractionRecorder;
pub use launch::{LaunchParams, LmsSession, open_session, open_session_with, start_attempt};
pub use objectives::ObjectiveRecorder;
pub use scorm::ScormAdapter;
