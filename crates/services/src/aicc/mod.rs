//! AICC HACP: the session lives locally and travels to the LMS as form posts.

mod adapter;
mod transport;

pub use adapter::{AiccAdapter, AiccConfig};
pub use transport::{
    DEFAULT_HACP_VERSION, HacpCommand, HacpRequest, HacpTransport, HttpTransport,
};
