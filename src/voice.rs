//! Seams to the voice transport: the per-guild player, the connection
//! gateway, voice-channel membership, and the notifier used for
//! user-visible playback notices.

use crate::ids::{ChannelId, GuildId, UserId};
use crate::track::PlayableHandle;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

/// The single underlying player a session drives.
///
/// One player exists per guild; the [`PlayerFactory`] that created it has
/// already attached it as the guild connection's audio sink. All methods are
/// cheap state flips on the transport side; the heavy lifting (decoding,
/// mixing, the wire protocol) happens behind this trait.
pub trait AudioPlayer: Send {
    /// Starts playback of a fresh handle, replacing whatever was playing.
    fn play(&mut self, handle: PlayableHandle);

    /// Stops playback and discards the current track.
    fn stop(&mut self);

    fn set_paused(&mut self, paused: bool);

    fn is_paused(&self) -> bool;

    /// Applies a volume in `[0, 100]`.
    fn set_volume(&mut self, volume: u8);

    /// Moves the playback position of the current track.
    fn seek(&mut self, position: Duration);
}

/// Creates players. Implementations attach the new player to the guild's
/// voice connection before returning it.
pub trait PlayerFactory: Send + Sync {
    fn create(&self, guild: GuildId) -> Box<dyn AudioPlayer>;
}

/// Track-lifecycle events delivered by the player, asynchronously from its
/// own execution context. Routed to the owning session by guild id through
/// [`crate::registry::SessionRegistry::handle_track_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    /// The track finished. `may_start_next` is false when the end was caused
    /// by an error or an explicit stop, in which case the queue must not
    /// advance on its own.
    Ended { may_start_next: bool },

    /// The source stopped delivering audio for longer than the transport's
    /// stuck threshold.
    Stuck { threshold: Duration },

    /// The track failed with a user-presentable message.
    Errored { message: String },
}

/// Observable state of a guild's voice connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Controls voice connections. Connecting is asynchronous on the transport
/// side; callers poll [`VoiceGateway::state`] until it settles.
pub trait VoiceGateway: Send + Sync {
    /// Returns the name of a required voice permission the bot lacks in the
    /// target channel, if any. Checked before any connection attempt.
    fn missing_permission(&self, guild: GuildId, channel: ChannelId) -> Option<String>;

    /// Begins connecting to the channel.
    fn connect(&self, guild: GuildId, channel: ChannelId) -> Result<(), String>;

    fn state(&self, guild: GuildId) -> ConnectionState;

    /// Closes the guild's voice connection, if one exists.
    fn disconnect(&self, guild: GuildId);
}

/// Reports who is listening in the guild's voice channel.
pub trait VoiceMembership: Send + Sync {
    /// The users currently in the channel the bot is connected to, excluding
    /// the bot itself. `None` when there is no voice connection.
    fn listeners(&self, guild: GuildId) -> Option<HashSet<UserId>>;
}

/// Posts user-visible notices (track errors, stuck-track warnings, the
/// inactivity goodbye) to a text channel.
#[async_trait]
pub trait ChannelNotifier: Send + Sync {
    async fn notify(&self, channel: ChannelId, message: &str);
}
