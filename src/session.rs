//! The per-guild playback state machine: one bounded queue, one current
//! track, one underlying player.
//!
//! Sessions are created and owned by the [`crate::registry::SessionRegistry`]
//! and are always wrapped in a `tokio::sync::Mutex` there. Command-driven
//! calls and player-driven event reactions can arrive concurrently for the
//! same guild, and that mutex is what serializes them; nothing in here is
//! safe to call from two tasks at once without it.

use crate::config::AudioConfig;
use crate::database::SettingsStore;
use crate::error::{AudioError, AudioResult};
use crate::ids::{ChannelId, GuildId, UserId};
use crate::track::QueueEntry;
use crate::voice::AudioPlayer;
use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Coarse playback state, for the command layer's status displays.
/// A torn-down (disconnected) session is simply gone from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Per-guild playback state: the song queue, the current track, and the
/// loop/shuffle/volume settings applied to the underlying player.
pub struct PlaybackSession {
    guild_id: GuildId,
    queue: VecDeque<QueueEntry>,
    current: Option<QueueEntry>,
    volume: u8,
    loop_current: bool,
    shuffle: bool,
    last_text_channel: Option<ChannelId>,
    player: Box<dyn AudioPlayer>,
    settings: Arc<dyn SettingsStore>,
    max_queue_len: usize,
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("guild_id", &self.guild_id)
            .field("queue", &self.queue)
            .field("current", &self.current)
            .field("volume", &self.volume)
            .field("loop_current", &self.loop_current)
            .field("shuffle", &self.shuffle)
            .field("last_text_channel", &self.last_text_channel)
            .field("max_queue_len", &self.max_queue_len)
            .finish_non_exhaustive()
    }
}

impl PlaybackSession {
    /// Builds a session for a guild, restoring its persisted volume.
    ///
    /// A guild that has never stored a volume gets the configured default,
    /// which is written back so the row exists from then on. Store failures
    /// here are logged and fall back to the default; a broken database
    /// should not keep a guild from playing music.
    pub fn new(
        guild_id: GuildId,
        player: Box<dyn AudioPlayer>,
        settings: Arc<dyn SettingsStore>,
        config: &AudioConfig,
    ) -> Self {
        let volume = match settings.load_guild_volume(guild_id) {
            Ok(Some(volume)) => volume.min(100),
            Ok(None) => {
                if let Err(e) = settings.save_guild_volume(guild_id, config.default_volume) {
                    warn!(guild = %guild_id, error = %e, "failed to store default volume");
                }
                config.default_volume
            }
            Err(e) => {
                warn!(guild = %guild_id, error = %e, "failed to load volume, using default");
                config.default_volume
            }
        };

        info!(guild = %guild_id, volume, "created playback session");
        Self {
            guild_id,
            queue: VecDeque::new(),
            current: None,
            volume,
            loop_current: false,
            shuffle: false,
            last_text_channel: None,
            player,
            settings,
            max_queue_len: config.max_queue_len,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &VecDeque<QueueEntry> {
        &self.queue
    }

    pub fn current(&self) -> Option<&QueueEntry> {
        self.current.as_ref()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_looping(&self) -> bool {
        self.loop_current
    }

    pub fn is_shuffling(&self) -> bool {
        self.shuffle
    }

    pub fn is_paused(&self) -> bool {
        self.player.is_paused()
    }

    pub fn state(&self) -> PlaybackState {
        if self.current.is_none() {
            PlaybackState::Idle
        } else if self.player.is_paused() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    pub fn last_text_channel(&self) -> Option<ChannelId> {
        self.last_text_channel
    }

    /// Remembers where the last command came from, so player-driven notices
    /// (track errors, stuck warnings, the inactivity goodbye) land somewhere
    /// the user will see them.
    pub fn set_last_text_channel(&mut self, channel: ChannelId) {
        self.last_text_channel = Some(channel);
    }

    /// Appends an entry to the tail of the queue.
    pub fn enqueue(&mut self, entry: QueueEntry) -> AudioResult<()> {
        if self.queue.len() >= self.max_queue_len {
            return Err(AudioError::QueueFull(self.max_queue_len));
        }
        debug!(guild = %self.guild_id, uri = %entry.track.uri, "queued track");
        self.queue.push_back(entry);
        Ok(())
    }

    /// The core scheduling step. Picks the next entry to play, in priority
    /// order: the current track again when looping, a uniformly random
    /// entry when shuffling, the queue head otherwise. With an empty queue
    /// and no loop engaged, playback stops and the session goes idle.
    pub fn play_next(&mut self) {
        let next = if self.loop_current {
            self.current.clone()
        } else {
            None
        };

        match next.or_else(|| self.take_from_queue()) {
            Some(entry) => self.start(entry),
            None => {
                info!(guild = %self.guild_id, "queue exhausted, going idle");
                self.current = None;
                self.player.stop();
            }
        }
    }

    fn take_from_queue(&mut self) -> Option<QueueEntry> {
        if self.shuffle && self.queue.len() > 1 {
            let index = rand::thread_rng().gen_range(0..self.queue.len());
            self.queue.remove(index)
        } else {
            self.queue.pop_front()
        }
    }

    /// Starts an entry on the player. The session volume is re-applied
    /// before every start so it persists across track transitions.
    fn start(&mut self, entry: QueueEntry) {
        info!(guild = %self.guild_id, uri = %entry.track.uri, "starting track");
        let handle = entry.track.reinstantiate();
        self.player.set_volume(self.volume);
        self.player.play(handle);
        self.current = Some(entry);
    }

    pub fn pause(&mut self) -> AudioResult<()> {
        if self.player.is_paused() {
            return Err(AudioError::StateConflict("I'm already paused!".to_string()));
        }
        self.player.set_paused(true);
        Ok(())
    }

    pub fn resume(&mut self) -> AudioResult<()> {
        if !self.player.is_paused() {
            return Err(AudioError::StateConflict(
                "I'm not currently paused!".to_string(),
            ));
        }
        self.player.set_paused(false);
        Ok(())
    }

    /// Updates the session volume, applies it to the player, and persists
    /// it for the guild.
    pub fn set_volume(&mut self, volume: u8) -> AudioResult<()> {
        if volume > 100 {
            return Err(AudioError::InvalidRange(
                "Volume must be between 0-100!".to_string(),
            ));
        }
        self.volume = volume;
        self.player.set_volume(volume);
        if let Err(e) = self.settings.save_guild_volume(self.guild_id, volume) {
            error!(guild = %self.guild_id, error = %e, "failed to persist volume");
            return Err(AudioError::Internal(
                "could not save the volume setting".to_string(),
            ));
        }
        Ok(())
    }

    /// Forces the next track while something is playing.
    pub fn skip(&mut self) -> AudioResult<()> {
        if self.player.is_paused() {
            return Err(AudioError::StateConflict(
                "I can't skip to the next song as I'm currently paused.".to_string(),
            ));
        }
        if self.current.is_none() {
            return Err(AudioError::StateConflict(
                "I'm currently not playing anything!".to_string(),
            ));
        }
        self.play_next();
        Ok(())
    }

    /// Discards every queue entry before `index` and plays the entry at
    /// `index`. Refused while looping, where "skip forward" is ambiguous.
    pub fn skip_to(&mut self, index: usize) -> AudioResult<()> {
        if self.loop_current {
            return Err(AudioError::StateConflict(
                "Looping is enabled, so we can't skip forward to a new song.".to_string(),
            ));
        }
        if index >= self.queue.len() {
            return Err(AudioError::InvalidRange(
                "Please provide a valid song to skip to.".to_string(),
            ));
        }
        self.queue.drain(..index);
        // The requested entry is the head now; start it directly so a
        // shuffled session still lands on the song the user asked for.
        if let Some(entry) = self.queue.pop_front() {
            self.start(entry);
        }
        Ok(())
    }

    /// Moves the playback position of the current track.
    pub fn seek(&mut self, position: Duration) -> AudioResult<()> {
        let current = self.current.as_ref().ok_or_else(|| {
            AudioError::StateConflict("I'm currently not playing anything!".to_string())
        })?;
        if position >= current.track.duration {
            return Err(AudioError::InvalidRange(
                "You can't seek to a position longer than the song".to_string(),
            ));
        }
        self.player.seek(position);
        Ok(())
    }

    /// Restarts the current track from the beginning.
    pub fn restart(&mut self) -> AudioResult<()> {
        if self.current.is_none() {
            return Err(AudioError::StateConflict(
                "I'm currently not playing anything!".to_string(),
            ));
        }
        self.player.seek(Duration::ZERO);
        Ok(())
    }

    /// Empties the queue. The currently playing track is untouched.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Removes an entry by its position in the queue.
    pub fn remove(&mut self, index: usize) -> AudioResult<QueueEntry> {
        self.queue.remove(index).ok_or_else(|| {
            AudioError::InvalidRange(format!("Value {index} does not exist in the queue."))
        })
    }

    /// Keeps only the first entry for each distinct track URI, preserving
    /// order. Returns how many entries were dropped.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.queue.len();
        let mut seen = HashSet::new();
        self.queue.retain(|entry| seen.insert(entry.track.uri.clone()));
        before - self.queue.len()
    }

    /// Drops entries whose requester is no longer in the voice channel.
    /// Returns how many entries were dropped.
    pub fn remove_inactive(&mut self, members: &HashSet<UserId>) -> usize {
        let before = self.queue.len();
        self.queue.retain(|entry| members.contains(&entry.requested_by));
        before - self.queue.len()
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.loop_current = looping;
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    /// Reaction to the player reporting the end of a track. Advances the
    /// queue unless the end reason forbids it (error or explicit stop).
    pub fn on_track_ended(&mut self, may_start_next: bool) {
        debug!(guild = %self.guild_id, may_start_next, "track ended");
        if may_start_next {
            self.play_next();
        }
    }

    /// Final teardown; only the registry calls this, right after removing
    /// the session from its table.
    pub(crate) fn shutdown(&mut self) {
        self.queue.clear();
        self.current = None;
        self.player.stop();
    }
}
