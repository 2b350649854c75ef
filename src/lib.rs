//! Dual-device audio recorder.
//!
//! Captures up to two input devices at once, writes each to its own 16-bit
//! WAV file in real time, and overlays the pair into a single mixed file
//! when recording stops.

pub mod audio;
pub mod cli;
pub mod config;
pub mod global;
pub mod session;
