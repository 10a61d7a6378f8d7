//! Error types and the client error channel.
//!
//! Misuse of the API (writing to a destroyed record, using an unbound
//! anonymous record) fails synchronously with [`RecordError`]. Protocol
//! anomalies have no caller waiting on them and are reported through an
//! [`ErrorChannel`] instead.

use tokio::sync::mpsc;

use crate::protocol::{Event, Topic};

/// Synchronous failures returned from record operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record reached its terminal state
    Destroyed { name: String, action: &'static str },
    /// The anonymous record has not been bound with `set_name` yet
    Uninitialized { action: &'static str },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroyed { name, action } => {
                write!(f, "Can't invoke '{action}'. Record '{name}' is already destroyed")
            }
            Self::Uninitialized { action } => {
                write!(f, "Can't invoke '{action}'. AnonymousRecord not initialised. Call setName first")
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// An asynchronous protocol-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientError {
    pub topic: Topic,
    pub event: Event,
    pub message: String,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{}: {}", self.topic, self.event.marker(), self.message)
    }
}

impl std::error::Error for ClientError {}

/// Process-wide sink for protocol anomalies.
pub trait ErrorChannel: Send + Sync {
    fn report_error(&self, topic: Topic, event: Event, message: &str);
}

/// Writes every error to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrors;

impl ErrorChannel for LogErrors {
    fn report_error(&self, topic: Topic, event: Event, message: &str) {
        log::error!("{:?}/{}: {message}", topic, event.marker());
    }
}

/// Forwards errors to the application over a bounded channel.
#[derive(Debug, Clone)]
pub struct ErrorSender {
    tx: mpsc::Sender<ClientError>,
}

impl ErrorSender {
    /// Create a sender and the receiver the application drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClientError>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ErrorChannel for ErrorSender {
    fn report_error(&self, topic: Topic, event: Event, message: &str) {
        let error = ClientError {
            topic,
            event,
            message: message.to_string(),
        };
        if let Err(e) = self.tx.try_send(error) {
            log::warn!("Dropping client error, channel unavailable: {e}");
        }
    }
}
