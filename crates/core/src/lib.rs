#![forbid(unsafe_code)]

//! CMI data model shared by the SCORM 1.2 and AICC HACP adapters.
//!
//! Everything in this crate is pure: vocabularies, the in-memory session
//! record, interaction/objective validation and encoding, and the HACP text
//! codec. Talking to an LMS lives in the `lms-services` crate.

pub mod error;
pub mod hacp;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
