//! Owns every playback session: creation, lookup, teardown, voice-channel
//! joining, the periodic inactivity sweep, and the routing of player events
//! to the session they belong to.

use crate::config::AudioConfig;
use crate::database::SettingsStore;
use crate::error::{AudioError, AudioResult};
use crate::ids::{ChannelId, GuildId};
use crate::session::PlaybackSession;
use crate::voice::{
    ChannelNotifier, ConnectionState, PlayerFactory, TrackEvent, VoiceGateway, VoiceMembership,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ALONE_NOTICE: &str = "Leaving the voice call because I'm the only one here.";
const STUCK_NOTICE: &str = "The music source stopped responding, moving to the next track.";

/// The guildId → session table and the collaborators sessions need.
///
/// This map is the sole place sessions are created and removed; a session
/// never outlives its entry here. Each session sits behind its own mutex,
/// which serializes command-driven calls against player-driven events for
/// that guild while leaving different guilds fully concurrent.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<Mutex<PlaybackSession>>>,
    players: Arc<dyn PlayerFactory>,
    gateway: Arc<dyn VoiceGateway>,
    membership: Arc<dyn VoiceMembership>,
    notifier: Arc<dyn ChannelNotifier>,
    settings: Arc<dyn SettingsStore>,
    config: AudioConfig,
}

impl SessionRegistry {
    pub fn new(
        players: Arc<dyn PlayerFactory>,
        gateway: Arc<dyn VoiceGateway>,
        membership: Arc<dyn VoiceMembership>,
        notifier: Arc<dyn ChannelNotifier>,
        settings: Arc<dyn SettingsStore>,
        config: AudioConfig,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            players,
            gateway,
            membership,
            notifier,
            settings,
            config,
        }
    }

    /// Returns the guild's session, creating it if absent. Creation is
    /// atomic with respect to concurrent callers: two simultaneous commands
    /// for the same guild get the same session.
    pub fn get_or_create_session(&self, guild: GuildId) -> Arc<Mutex<PlaybackSession>> {
        self.sessions
            .entry(guild)
            .or_insert_with(|| {
                // the factory attaches the player to the guild's connection
                let player = self.players.create(guild);
                Arc::new(Mutex::new(PlaybackSession::new(
                    guild,
                    player,
                    Arc::clone(&self.settings),
                    &self.config,
                )))
            })
            .value()
            .clone()
    }

    /// Looks up an existing session without creating one.
    pub fn session(&self, guild: GuildId) -> AudioResult<Arc<Mutex<PlaybackSession>>> {
        self.sessions
            .get(&guild)
            .map(|entry| entry.value().clone())
            .ok_or(AudioError::NotConnected)
    }

    /// Stops the guild's player, closes its voice connection, and removes
    /// the session. Silently a no-op when no session exists.
    pub async fn delete_session(&self, guild: GuildId) {
        let Some((_, session)) = self.sessions.remove(&guild) else {
            return;
        };
        session.lock().await.shutdown();
        self.gateway.disconnect(guild);
        info!(guild = %guild, "deleted playback session");
    }

    /// Connects to a voice channel and waits until the connection settles,
    /// polling at a short interval under an overall deadline. Required
    /// voice permissions are checked before any attempt is made.
    pub async fn join_channel(&self, guild: GuildId, channel: ChannelId) -> AudioResult<()> {
        if let Some(permission) = self.gateway.missing_permission(guild, channel) {
            return Err(AudioError::MissingPermission(permission));
        }

        self.gateway
            .connect(guild, channel)
            .map_err(AudioError::ConnectFailed)?;

        let deadline = tokio::time::Instant::now() + self.config.connect_timeout;
        loop {
            match self.gateway.state(guild) {
                ConnectionState::Connected => {
                    info!(guild = %guild, channel = %channel, "joined voice channel");
                    return Ok(());
                }
                ConnectionState::Disconnected => {
                    return Err(AudioError::ConnectFailed(
                        "the voice connection was refused".to_string(),
                    ));
                }
                ConnectionState::Connecting => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(AudioError::ConnectTimeout);
                    }
                    tokio::time::sleep(self.config.connect_poll).await;
                }
            }
        }
    }

    /// One pass of the inactivity check: tears down every session whose
    /// voice channel has no listeners left (or whose connection is gone),
    /// posting a goodbye to the session's last text channel first.
    ///
    /// The guild set is snapshotted up front; deleting while iterating the
    /// live map is not safe.
    pub async fn sweep_inactive(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for guild in guilds {
            let occupied = self
                .membership
                .listeners(guild)
                .is_some_and(|listeners| !listeners.is_empty());
            if occupied {
                continue;
            }

            let session = match self.sessions.get(&guild) {
                Some(entry) => entry.value().clone(),
                // torn down by someone else since the snapshot
                None => continue,
            };
            info!(guild = %guild, "voice channel empty, tearing down session");
            if let Some(channel) = session.lock().await.last_text_channel() {
                self.notifier.notify(channel, ALONE_NOTICE).await;
            }
            self.delete_session(guild).await;
        }
    }

    /// Spawns the periodic inactivity sweep.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.sweep_interval;
        info!(?interval, "starting inactivity sweeper");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                registry.sweep_inactive().await;
            }
        })
    }

    /// Routes a player-delivered track event to the owning session. Events
    /// race with teardown by design: one arriving for a guild that no
    /// longer has a session is logged and dropped.
    pub async fn handle_track_event(&self, guild: GuildId, event: TrackEvent) {
        let session = match self.sessions.get(&guild) {
            Some(entry) => entry.value().clone(),
            None => {
                debug!(guild = %guild, ?event, "event for torn-down session, ignoring");
                return;
            }
        };

        match event {
            TrackEvent::Ended { may_start_next } => {
                session.lock().await.on_track_ended(may_start_next);
            }
            TrackEvent::Stuck { threshold } => {
                warn!(guild = %guild, ?threshold, "track stuck, forcing next");
                let channel = {
                    let mut session = session.lock().await;
                    session.play_next();
                    session.last_text_channel()
                };
                if let Some(channel) = channel {
                    self.notifier.notify(channel, STUCK_NOTICE).await;
                }
            }
            TrackEvent::Errored { message } => {
                warn!(guild = %guild, %message, "track errored");
                let channel = session.lock().await.last_text_channel();
                if let Some(channel) = channel {
                    self.notifier.notify(channel, &format!("⚠️ {message}")).await;
                }
            }
        }
    }
}
