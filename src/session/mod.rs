//! Dual-device recording sessions.
//!
//! Starts up to two recorders side by side, stops them together, mixes the
//! pair into one track, and reports every step on a status stream.

pub mod controller;
pub mod error;
pub mod status;

pub use controller::{
    SessionController, SessionOutcome, SessionSettings, SessionStartResult, TrackInfo,
};
pub use error::SessionError;
pub use status::{SessionPhase, StatusEvent, StatusLevel, StatusSender};
