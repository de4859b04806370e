//! Shared fakes for the engine integration tests: an in-process player,
//! voice gateway, membership roster, notifier, and track provider.

#![allow(dead_code)]

use async_trait::async_trait;
use encore::{
    AudioPlayer, ChannelNotifier, ConnectionState, GuildId, PlayableHandle, PlayerFactory,
    ProviderError, QueueEntry, TrackDescriptor, TrackProvider, UserId, VoiceGateway,
    VoiceMembership,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing once for the whole test binary.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .init();
    });
}

pub fn track(uri: &str, title: &str) -> TrackDescriptor {
    TrackDescriptor {
        uri: uri.to_string(),
        title: title.to_string(),
        duration: Duration::from_secs(200),
        source: "youtube".to_string(),
    }
}

pub fn entry(uri: &str, user: u64) -> QueueEntry {
    QueueEntry {
        track: track(uri, uri),
        requested_by: UserId(user),
    }
}

/// Everything a fake player was asked to do.
#[derive(Default)]
pub struct PlayerLog {
    pub started: Vec<String>,
    pub volume: u8,
    pub paused: bool,
    pub stops: usize,
}

pub struct FakePlayer(Arc<Mutex<PlayerLog>>);

impl AudioPlayer for FakePlayer {
    fn play(&mut self, handle: PlayableHandle) {
        self.0
            .lock()
            .unwrap()
            .started
            .push(handle.descriptor().uri.clone());
    }
    fn stop(&mut self) {
        self.0.lock().unwrap().stops += 1;
    }
    fn set_paused(&mut self, paused: bool) {
        self.0.lock().unwrap().paused = paused;
    }
    fn is_paused(&self) -> bool {
        self.0.lock().unwrap().paused
    }
    fn set_volume(&mut self, volume: u8) {
        self.0.lock().unwrap().volume = volume;
    }
    fn seek(&mut self, _position: Duration) {}
}

/// Creates [`FakePlayer`]s and keeps each guild's log reachable from tests.
#[derive(Default)]
pub struct FakeFactory {
    logs: Mutex<HashMap<GuildId, Arc<Mutex<PlayerLog>>>>,
}

impl FakeFactory {
    pub fn log_for(&self, guild: GuildId) -> Arc<Mutex<PlayerLog>> {
        Arc::clone(self.logs.lock().unwrap().entry(guild).or_default())
    }
}

impl PlayerFactory for FakeFactory {
    fn create(&self, guild: GuildId) -> Box<dyn AudioPlayer> {
        Box::new(FakePlayer(self.log_for(guild)))
    }
}

/// A gateway that connects instantly and records disconnects.
#[derive(Default)]
pub struct FakeGateway {
    pub connected: Mutex<HashSet<GuildId>>,
    pub disconnected: Mutex<Vec<GuildId>>,
}

impl VoiceGateway for FakeGateway {
    fn missing_permission(&self, _guild: GuildId, _channel: encore::ChannelId) -> Option<String> {
        None
    }
    fn connect(&self, guild: GuildId, _channel: encore::ChannelId) -> Result<(), String> {
        self.connected.lock().unwrap().insert(guild);
        Ok(())
    }
    fn state(&self, guild: GuildId) -> ConnectionState {
        if self.connected.lock().unwrap().contains(&guild) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
    fn disconnect(&self, guild: GuildId) {
        self.connected.lock().unwrap().remove(&guild);
        self.disconnected.lock().unwrap().push(guild);
    }
}

#[derive(Default)]
pub struct FakeMembership {
    listeners: Mutex<HashMap<GuildId, HashSet<UserId>>>,
}

impl FakeMembership {
    pub fn set(&self, guild: GuildId, users: &[u64]) {
        self.listeners
            .lock()
            .unwrap()
            .insert(guild, users.iter().map(|&u| UserId(u)).collect());
    }

    pub fn clear(&self, guild: GuildId) {
        self.listeners.lock().unwrap().remove(&guild);
    }
}

impl VoiceMembership for FakeMembership {
    fn listeners(&self, guild: GuildId) -> Option<HashSet<UserId>> {
        self.listeners.lock().unwrap().get(&guild).cloned()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<(encore::ChannelId, String)>>,
}

#[async_trait]
impl ChannelNotifier for RecordingNotifier {
    async fn notify(&self, channel: encore::ChannelId, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((channel, message.to_string()));
    }
}

/// A provider with canned responses, counting how often it is asked.
#[derive(Default)]
pub struct FakeProvider {
    results: Mutex<HashMap<String, Vec<TrackDescriptor>>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_result(self, query: &str, tracks: Vec<TrackDescriptor>) -> Self {
        self.results
            .lock()
            .unwrap()
            .insert(query.to_string(), tracks);
        self
    }
}

#[async_trait]
impl TrackProvider for FakeProvider {
    async fn resolve(
        &self,
        query: &str,
        _guild: Option<GuildId>,
    ) -> Result<Vec<TrackDescriptor>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}
