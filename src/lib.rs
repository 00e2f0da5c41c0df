//! SML (Smart Message Language) codec for smart meters.
//!
//! The crate models SML messages as [`SmlValue`] trees, reads them into flat
//! [`Readout`]s keyed by OBIS codes and builds request and response messages.
//! With the `wire` feature the trees are encoded to and decoded from the
//! binary type-length format, including transport v1 framing.

pub mod config;
pub mod obis;
pub mod sml;

// Re-export common types for easier access
pub use config::SmlConfig;
pub use obis::Obis;
pub use sml::{MessageType, Param, ParamMap, Reader, Readout, RequestGenerator, ResponseGenerator, SmlError, SmlValue};
