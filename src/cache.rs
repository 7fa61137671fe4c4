use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::model::Album;
use crate::source::AlbumSource;
use crate::store::{KvStore, ALBUMS_CACHE_KEY};

/// What one album-list write looks like in the store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheEntry {
    pub data: Vec<Album>,
    /// Milliseconds since the epoch at the time of the write.
    pub timestamp: u64,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Vec<Album>, Arc<AppError>>>>;

/// Result of [`AlbumCache::fetch_albums`].
pub struct AlbumsFetch {
    /// Data available without waiting on the network, for the caller that
    /// wants instant paint. `None` only on a first-ever visit.
    pub instant: Option<Vec<Album>>,
    /// Resolves to the authoritative list: the fresh copy when the network
    /// cooperates, the stale copy when it does not, and an error only when
    /// there was no cached data to fall back on.
    pub resolved: BoxFuture<'static, Result<Vec<Album>, Arc<AppError>>>,
}

/// Stale-while-revalidate cache for the album list.
///
/// Reads never block behind an in-flight revalidation, storage failures are
/// absorbed (caching is an optimization, not a source of truth), and
/// concurrent revalidations collapse into a single request.
pub struct AlbumCache {
    store: Arc<dyn KvStore>,
    source: Arc<dyn AlbumSource>,
    ttl: Duration,
    inflight: Mutex<Option<SharedFetch>>,
}

impl AlbumCache {
    pub fn new(store: Arc<dyn KvStore>, source: Arc<dyn AlbumSource>, ttl: Duration) -> AlbumCache {
        AlbumCache {
            store,
            source,
            ttl,
            inflight: Mutex::new(None),
        }
    }

    /// Never errors: a corrupt or unreadable entry is logged and treated as
    /// absent.
    pub fn read(&self) -> Option<CacheEntry> {
        let raw = match self.store.get(ALBUMS_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Album cache read failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Discarding corrupt album cache entry: {}", e);
                None
            }
        }
    }

    /// Best effort; a full or unavailable store must not break the caller.
    pub fn write(&self, albums: &[Album]) {
        let entry = CacheEntry {
            data: albums.to_vec(),
            timestamp: now_ms(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.store.put(ALBUMS_CACHE_KEY, &raw) {
                    log::warn!("Album cache write failed: {}", e);
                }
            }
            Err(e) => log::warn!("Album cache serialization failed: {}", e),
        }
    }

    /// An entry that has been around for exactly the TTL counts as stale.
    pub fn is_fresh(&self, entry: &CacheEntry, now_ms: u64) -> bool {
        now_ms.saturating_sub(entry.timestamp) < self.ttl.as_millis() as u64
    }

    /// The composed operation. Must be called from within the runtime: a
    /// stale hit spawns the revalidation so it proceeds even when nobody
    /// awaits `resolved`.
    pub fn fetch_albums(self: &Arc<Self>) -> AlbumsFetch {
        let now = now_ms();
        match self.read() {
            Some(entry) if self.is_fresh(&entry, now) => {
                log::debug!("Album cache fresh ({} albums), skipping network", entry.data.len());
                AlbumsFetch {
                    instant: Some(entry.data.clone()),
                    resolved: futures::future::ready(Ok(entry.data)).boxed(),
                }
            }
            Some(entry) => {
                log::debug!("Album cache stale ({} albums), revalidating", entry.data.len());
                let fetch = self.revalidate();
                let stale = entry.data.clone();
                let resolved = async move {
                    match fetch.await {
                        Ok(fresh) => Ok(fresh),
                        Err(e) => {
                            log::warn!("Revalidation failed, keeping stale albums: {}", e);
                            Ok(stale)
                        }
                    }
                }
                .boxed();
                AlbumsFetch {
                    instant: Some(entry.data),
                    resolved,
                }
            }
            None => {
                log::debug!("Album cache empty, fetching");
                AlbumsFetch {
                    instant: None,
                    resolved: self.revalidate().boxed(),
                }
            }
        }
    }

    /// Single-flight: callers landing during an in-flight fetch share it.
    fn revalidate(self: &Arc<Self>) -> SharedFetch {
        let mut guard = lock(&self.inflight);
        if let Some(fetch) = guard.as_ref() {
            log::debug!("Joining in-flight album fetch");
            return fetch.clone();
        }

        let cache = Arc::clone(self);
        let fetch: SharedFetch = async move {
            let result = match cache.source.list_albums().await {
                Ok(albums) => {
                    cache.write(&albums);
                    Ok(albums)
                }
                Err(e) => Err(Arc::new(e)),
            };
            *lock(&cache.inflight) = None;
            result
        }
        .boxed()
        .shared();

        *guard = Some(fetch.clone());
        drop(guard);
        tokio::spawn(fetch.clone().map(|_| ()));
        fetch
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
