//! Per-guild audio playback engine.
//!
//! The engine manages one [`session::PlaybackSession`] per Discord guild,
//! each owning a bounded queue, loop/shuffle modes, and a persisted volume.
//! Sessions are created and reaped by a [`registry::SessionRegistry`], and
//! track lookups go through a [`cache::TrackResolutionCache`] backed by
//! SQLite so replayed songs skip the resolver entirely.
//!
//! The transport (voice connections, the actual player) and the resolver
//! live behind traits in [`voice`] and [`provider`]; the host application
//! supplies implementations when constructing the registry.

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod ids;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod session;
pub mod track;
pub mod voice;

pub use cache::TrackResolutionCache;
pub use config::AudioConfig;
pub use database::{CacheEntry, CacheStore, SettingsStore, SqliteStore};
pub use error::{AudioError, AudioResult, StoreError};
pub use ids::{ChannelId, GuildId, UserId};
pub use provider::{ProviderError, TrackProvider};
pub use registry::SessionRegistry;
pub use session::{PlaybackSession, PlaybackState};
pub use track::{PlayableHandle, QueueEntry, TrackDescriptor};
pub use voice::{
    AudioPlayer, ChannelNotifier, ConnectionState, PlayerFactory, TrackEvent, VoiceGateway,
    VoiceMembership,
};
