//! Session phases and the one-way status stream sent to the front end.

use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Stopping,
    Mixing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Mixing => "mixing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

/// A human-readable milestone, stamped with local time.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub timestamp: DateTime<Local>,
    pub level: StatusLevel,
    pub phase: SessionPhase,
    pub message: String,
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y/%m/%d %H:%M:%S"),
            self.message
        )
    }
}

/// Sending half of the status stream. Every event is also logged.
///
/// Emitting never fails: events sent after the receiver is gone are only
/// logged.
#[derive(Clone, Default)]
pub struct StatusSender {
    tx: Option<Sender<StatusEvent>>,
}

/// Create a connected status stream.
pub fn channel() -> (StatusSender, Receiver<StatusEvent>) {
    let (tx, rx) = unbounded();
    (StatusSender { tx: Some(tx) }, rx)
}

impl StatusSender {
    /// A sender with no listener; events only go to the log.
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn info(&self, phase: SessionPhase, message: impl Into<String>) {
        self.emit(StatusLevel::Info, phase, message.into());
    }

    pub fn warn(&self, phase: SessionPhase, message: impl Into<String>) {
        self.emit(StatusLevel::Warn, phase, message.into());
    }

    pub fn error(&self, phase: SessionPhase, message: impl Into<String>) {
        self.emit(StatusLevel::Error, phase, message.into());
    }

    fn emit(&self, level: StatusLevel, phase: SessionPhase, message: String) {
        match level {
            StatusLevel::Info => info!(phase = phase.as_str(), "{}", message),
            StatusLevel::Warn => warn!(phase = phase.as_str(), "{}", message),
            StatusLevel::Error => error!(phase = phase.as_str(), "{}", message),
        }

        if let Some(tx) = &self.tx {
            let _ = tx.send(StatusEvent {
                timestamp: Local::now(),
                level,
                phase,
                message,
            });
        }
    }
}
