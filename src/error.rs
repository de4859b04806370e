//! Error types for playback and resolution operations.

use thiserror::Error;

/// Errors that can occur during playback operations.
///
/// Every variant except [`AudioError::Internal`] is an expected, recoverable
/// condition whose message can be shown to the user verbatim. `Internal`
/// indicates a bug or environment failure; the site that produces it logs the
/// full detail and the message here stays generic.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("the queue is full ({0} songs max), try again after a few songs")]
    QueueFull(usize),

    #[error("{0}")]
    InvalidRange(String),

    #[error("{0}")]
    StateConflict(String),

    #[error("not connected to a voice channel")]
    NotConnected,

    #[error("missing the `{0}` permission in the voice channel")]
    MissingPermission(String),

    #[error("timed out while connecting to the voice channel")]
    ConnectTimeout,

    #[error("failed to connect to the voice channel: {0}")]
    ConnectFailed(String),

    #[error("track resolution failed: {0}")]
    Resolution(String),

    #[error("something went wrong on my end: {0}")]
    Internal(String),
}

/// Result type for playback operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Failure reported by a persistence backend. Opaque on purpose so the
/// store traits are not tied to one database crate.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StoreError(pub String);
