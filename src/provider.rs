//! The media-source provider seam. Implementations perform the actual
//! network resolution of a query or URL into playable track descriptors.

use crate::ids::GuildId;
use crate::track::TrackDescriptor;
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a provider while resolving a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The query matched nothing, or the item it pointed at no longer
    /// exists. The cache refresher treats this as permanent and evicts.
    #[error("no results found")]
    NotFound,

    /// Anything transient: network trouble, rate limits, provider outages.
    /// Stale cache entries are kept and retried on the next cycle.
    #[error("{0}")]
    Failure(String),
}

/// Resolves a query string or URL into zero or more playable tracks.
///
/// Resolution blocks the caller until the provider responds, so it must be
/// invoked off any latency-sensitive path. `guild` carries the ordering
/// context for providers that serialize lookups per guild; background
/// refreshes pass `None`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackProvider: Send + Sync {
    async fn resolve(
        &self,
        query: &str,
        guild: Option<GuildId>,
    ) -> Result<Vec<TrackDescriptor>, ProviderError>;
}
