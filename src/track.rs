//! The unit of queueable work: a resolved track descriptor, the single-use
//! playable handle derived from it, and the queue entry pairing a track with
//! its requester.

use crate::error::{AudioError, AudioResult};
use crate::ids::UserId;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An opaque, resolved, replayable reference to a piece of media.
///
/// Immutable once resolved. The binary-encoded form produced by
/// [`TrackDescriptor::encode`] is what the resolution cache persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Canonical URI of the track. Queue deduplication keys on this.
    pub uri: String,
    /// Human-readable title.
    pub title: String,
    /// Total track length.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Name of the source the track was resolved from (e.g. "youtube").
    pub source: String,
}

impl TrackDescriptor {
    /// Encodes the descriptor into the base64 form stored by the cache.
    pub fn encode(&self) -> AudioResult<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| AudioError::Internal(format!("failed to encode track: {e}")))?;
        Ok(BASE64.encode(json))
    }

    /// Decodes a descriptor previously produced by [`TrackDescriptor::encode`].
    pub fn decode(data: &str) -> AudioResult<Self> {
        let bytes = BASE64
            .decode(data)
            .map_err(|e| AudioError::Internal(format!("failed to decode track data: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AudioError::Internal(format!("failed to decode track data: {e}")))
    }

    /// Produces a fresh playable instance of this track.
    ///
    /// A [`PlayableHandle`] is consumed exactly once by the player, so loop
    /// mode must call this again for every replay instead of reusing the
    /// handle it just played.
    pub fn reinstantiate(&self) -> PlayableHandle {
        PlayableHandle {
            descriptor: self.clone(),
        }
    }
}

/// A single-use handle the underlying player consumes to start playback.
/// Deliberately not `Clone`; get a new one from the descriptor.
#[derive(Debug)]
pub struct PlayableHandle {
    descriptor: TrackDescriptor,
}

impl PlayableHandle {
    pub fn descriptor(&self) -> &TrackDescriptor {
        &self.descriptor
    }
}

/// A queued track plus the identity of the user who requested it.
///
/// Equality is defined by the track URI, which is what duplicate removal
/// keys on.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub track: TrackDescriptor,
    pub requested_by: UserId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.track.uri == other.track.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn descriptor(uri: &str) -> TrackDescriptor {
        TrackDescriptor {
            uri: uri.to_string(),
            title: "A Song".to_string(),
            duration: Duration::from_secs(215),
            source: "youtube".to_string(),
        }
    }

    #[test]
    fn encode_then_decode_preserves_descriptor() {
        let track = descriptor("https://example.com/watch?v=abc");
        let decoded = TrackDescriptor::decode(&track.encode().unwrap()).unwrap();
        assert_eq!(decoded, track);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(TrackDescriptor::decode("not base64 at all!!").is_err());
        // valid base64, invalid payload
        assert!(TrackDescriptor::decode(&BASE64.encode(b"{]")).is_err());
    }

    #[test]
    fn queue_entries_compare_by_uri() {
        let a = QueueEntry {
            track: descriptor("uri-1"),
            requested_by: UserId(1),
        };
        let mut b = a.clone();
        b.requested_by = UserId(2);
        b.track.title = "Different Title".to_string();
        assert_eq!(a, b);

        let c = QueueEntry {
            track: descriptor("uri-2"),
            requested_by: UserId(1),
        };
        assert_ne!(a, c);
    }

    #[test]
    fn reinstantiate_yields_fresh_handles_for_the_same_track() {
        let track = descriptor("uri-1");
        let first = track.reinstantiate();
        let second = track.reinstantiate();
        assert_eq!(first.descriptor(), second.descriptor());
        assert_eq!(first.descriptor(), &track);
    }
}
