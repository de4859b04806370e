//! Memoizes provider lookups. A resolved track is persisted in its encoded
//! form with a time-to-live, and a background loop revalidates entries whose
//! TTL has lapsed so replayed playlists keep working months later.

use crate::config::AudioConfig;
use crate::database::{CacheEntry, CacheStore};
use crate::error::{AudioError, AudioResult};
use crate::ids::GuildId;
use crate::provider::{ProviderError, TrackProvider};
use crate::track::TrackDescriptor;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Shared track-resolution cache. One instance serves every guild; the
/// backing store supports the concurrent reads and writes that implies.
pub struct TrackResolutionCache {
    provider: Arc<dyn TrackProvider>,
    store: Arc<dyn CacheStore>,
    ttl: TimeDelta,
    refresh_interval: Duration,
    refresh_pace: Duration,
}

impl TrackResolutionCache {
    pub fn new(
        provider: Arc<dyn TrackProvider>,
        store: Arc<dyn CacheStore>,
        config: &AudioConfig,
    ) -> Self {
        Self {
            provider,
            store,
            ttl: TimeDelta::seconds(config.cache_ttl.as_secs() as i64),
            refresh_interval: config.refresh_interval,
            refresh_pace: config.refresh_pace,
        }
    }

    fn expiry(&self) -> DateTime<Utc> {
        Utc::now() + self.ttl
    }

    /// Resolves a single track, consulting the cache first. A miss queries
    /// the provider and stores the first result with a fresh TTL.
    pub async fn get_track(&self, guild: Option<GuildId>, key: &str) -> AudioResult<TrackDescriptor> {
        match self.store.get(key) {
            Ok(Some(entry)) => {
                debug!(%key, "track cache hit");
                return TrackDescriptor::decode(&entry.data).map_err(|e| {
                    error!(%key, error = %e, "cached track data is corrupt");
                    AudioError::Internal("failed to decode a cached track".to_string())
                });
            }
            Ok(None) => debug!(%key, "track cache miss"),
            Err(e) => {
                error!(%key, error = %e, "track cache read failed");
                return Err(AudioError::Internal(
                    "the track cache is unavailable".to_string(),
                ));
            }
        }

        let mut tracks = self.resolve(key, guild).await?;
        let track = tracks.remove(0);
        self.store_entry(key, &track)?;
        Ok(track)
    }

    /// Resolves a playlist. The playlist URL itself is never cached; each
    /// resulting track is stored under its own canonical URI, and only if it
    /// isn't cached already, so an existing entry's TTL is not reset. The
    /// full resolved list is returned regardless of cache hits.
    pub async fn get_playlist(
        &self,
        guild: Option<GuildId>,
        key: &str,
    ) -> AudioResult<Vec<TrackDescriptor>> {
        let tracks = self.resolve(key, guild).await?;
        for track in &tracks {
            match self.store.get(&track.uri) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    // best effort: a failed write must not sink the playlist
                    if let Err(e) = self.store_entry(&track.uri, track) {
                        error!(uri = %track.uri, error = %e, "failed to cache playlist track");
                    }
                }
                Err(e) => {
                    error!(uri = %track.uri, error = %e, "track cache read failed");
                }
            }
        }
        Ok(tracks)
    }

    /// Runs the query against the provider, normalizing "nothing found"
    /// into a domain error. Always returns a non-empty list on success.
    async fn resolve(
        &self,
        key: &str,
        guild: Option<GuildId>,
    ) -> AudioResult<Vec<TrackDescriptor>> {
        let tracks = match self.provider.resolve(key, guild).await {
            Ok(tracks) => tracks,
            Err(ProviderError::NotFound) => {
                return Err(AudioError::Resolution("URL returned no results!".to_string()));
            }
            Err(ProviderError::Failure(message)) => {
                return Err(AudioError::Resolution(message));
            }
        };
        if tracks.is_empty() {
            return Err(AudioError::Resolution("URL returned no results!".to_string()));
        }
        Ok(tracks)
    }

    fn store_entry(&self, key: &str, track: &TrackDescriptor) -> AudioResult<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            data: track.encode()?,
            expires_at: self.expiry(),
        };
        self.store.insert(&entry).map_err(|e| {
            error!(%key, error = %e, "track cache write failed");
            AudioError::Internal("failed to store the resolved track".to_string())
        })
    }

    /// One revalidation pass over every lapsed entry. Per entry: a changed
    /// resolution replaces the stored descriptor and extends the TTL, an
    /// unchanged one just extends the TTL, a permanently-gone item is
    /// deleted, and any other failure leaves the stale entry for the next
    /// cycle. One bad entry never aborts the rest of the batch.
    pub async fn refresh(&self) {
        let expired = match self.store.expired_before(Utc::now()) {
            Ok(expired) => expired,
            Err(e) => {
                error!(error = %e, "could not list expired cache entries");
                return;
            }
        };
        if expired.is_empty() {
            return;
        }
        info!(count = expired.len(), "refreshing expired track cache entries");

        for entry in expired {
            self.refresh_entry(&entry).await;
            // pace the provider between items
            tokio::time::sleep(self.refresh_pace).await;
        }
    }

    async fn refresh_entry(&self, entry: &CacheEntry) {
        match self.provider.resolve(&entry.key, None).await {
            Ok(tracks) => {
                let Some(track) = tracks.first() else {
                    self.delete_gone(&entry.key);
                    return;
                };
                let data = match track.encode() {
                    Ok(data) => data,
                    Err(e) => {
                        error!(key = %entry.key, error = %e, "failed to re-encode track");
                        return;
                    }
                };
                let result = if data != entry.data {
                    debug!(key = %entry.key, "cached track changed, updating");
                    self.store.update(&entry.key, &data, self.expiry())
                } else {
                    self.store.touch(&entry.key, self.expiry())
                };
                if let Err(e) = result {
                    error!(key = %entry.key, error = %e, "track cache write failed");
                }
            }
            Err(ProviderError::NotFound) => self.delete_gone(&entry.key),
            Err(ProviderError::Failure(message)) => {
                // transient; the stale entry stays and is retried next cycle
                warn!(key = %entry.key, %message, "refresh failed, keeping stale entry");
            }
        }
    }

    fn delete_gone(&self, key: &str) {
        info!(%key, "cached track no longer exists, evicting");
        if let Err(e) = self.store.delete(key) {
            error!(%key, error = %e, "failed to evict cache entry");
        }
    }

    /// Spawns the periodic refresh loop.
    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let interval = cache.refresh_interval;
        info!(?interval, "starting track cache refresher");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                cache.refresh().await;
            }
        })
    }
}
