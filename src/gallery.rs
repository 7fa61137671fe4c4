use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Deserialize;
use url::Url;

use crate::alt_text::alt_text_for;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::model::{GalleryItem, MediaKind};
use crate::probe::{DimensionProbe, FALLBACK_DIMENSIONS};

/// One album's manifest after filtering and sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedGallery {
    pub folder: String,
    pub items: Vec<GalleryItem>,
}

impl LoadedGallery {
    /// The count shown in the UI reflects the filtered list, not the raw
    /// manifest length.
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Fetches one album's photo manifest. Trait seam so the detail controller
/// can be tested with a scripted loader.
#[async_trait]
pub trait PhotoLoader: Send + Sync {
    async fn load(&self, folder_id: &str) -> Result<LoadedGallery, AppError>;
}

#[derive(Debug, Deserialize)]
struct ManifestResponse {
    #[serde(default)]
    items: Vec<GalleryItem>,
    #[serde(default)]
    folder: String,
    #[serde(default)]
    error: Option<String>,
}

/// Events emitted by the reveal pipeline. Insertion order follows the sort
/// order and is a contract; reveal order follows probe completion and is
/// deliberately not.
#[derive(Debug, Clone, PartialEq)]
pub enum GalleryEvent {
    /// Item placed in the grid, still pending.
    Inserted {
        index: usize,
        name: String,
        kind: MediaKind,
        alt_text: String,
    },
    /// Item became visible.
    Revealed { index: usize },
    /// Intrinsic size learned (or substituted) for lightbox pre-sizing.
    Dimensions {
        index: usize,
        width: u32,
        height: u32,
    },
}

/// Handle on a running reveal pipeline.
pub struct GalleryStream {
    pub events: Receiver<GalleryEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl GalleryStream {
    pub async fn finished(self) -> Receiver<GalleryEvent> {
        let _ = self.task.await;
        self.events
    }
}

pub struct GalleryLoader {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    probe: Arc<dyn DimensionProbe>,
    batch_size: usize,
    batch_pause: Duration,
    eager_count: usize,
    fallback_timeout: Duration,
    generation: AtomicU64,
}

impl GalleryLoader {
    pub fn new(
        config: &AppConfig,
        probe: Arc<dyn DimensionProbe>,
    ) -> Result<GalleryLoader, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(GalleryLoader {
            client,
            endpoint: config.apps_script_url.clone(),
            timeout_secs: config.fetch_timeout_secs,
            probe,
            batch_size: config.probe_batch_size.max(1),
            batch_pause: Duration::from_millis(config.probe_batch_pause_ms),
            eager_count: config.eager_reveal_count,
            fallback_timeout: Duration::from_millis(config.reveal_fallback_timeout_ms),
            generation: AtomicU64::new(0),
        })
    }

    /// Starts revealing a loaded gallery. All items are inserted (pending)
    /// synchronously in sort order; the first visual row is revealed
    /// eagerly; everything else reveals as its probe resolves or times out,
    /// so no item stays pending forever. Starting a new pipeline supersedes
    /// any running one.
    pub fn start_reveal(
        self: &Arc<Self>,
        gallery: &LoadedGallery,
        album_title: &str,
    ) -> GalleryStream {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = unbounded();

        for (index, item) in gallery.items.iter().enumerate() {
            let _ = tx.send(GalleryEvent::Inserted {
                index,
                name: item.name.clone(),
                kind: item.media_kind(),
                alt_text: alt_text_for(item, album_title),
            });
        }
        let eager = self.eager_count.min(gallery.items.len());
        for index in 0..eager {
            let _ = tx.send(GalleryEvent::Revealed { index });
        }

        let loader = Arc::clone(self);
        let items = gallery.items.clone();
        let task = tokio::spawn(async move {
            loader.probe_all(generation, items, eager, tx).await;
        });
        GalleryStream { events: rx, task }
    }

    /// Paced probing: small fixed-size batches with a short pause between
    /// them, decoupled from the gallery becoming interactive.
    async fn probe_all(
        &self,
        generation: u64,
        items: Vec<GalleryItem>,
        eager: usize,
        tx: Sender<GalleryEvent>,
    ) {
        let total = items.len();
        let mut next = 0usize;
        while next < total {
            if self.is_superseded(generation) {
                return;
            }
            let end = (next + self.batch_size).min(total);
            let results = futures::future::join_all(items[next..end].iter().map(|item| async move {
                match tokio::time::timeout(self.fallback_timeout, self.probe.probe(item)).await {
                    Ok(Ok(dims)) => dims,
                    Ok(Err(e)) => {
                        log::warn!("Dimension probe failed for {}: {}", item.name, e);
                        FALLBACK_DIMENSIONS
                    }
                    Err(_) => {
                        log::warn!("Dimension probe timed out for {}", item.name);
                        FALLBACK_DIMENSIONS
                    }
                }
            }))
            .await;
            // A late batch must not clobber a newer gallery's state.
            if self.is_superseded(generation) {
                return;
            }
            for (offset, (width, height)) in results.into_iter().enumerate() {
                let index = next + offset;
                let _ = tx.send(GalleryEvent::Dimensions {
                    index,
                    width,
                    height,
                });
                if index >= eager {
                    let _ = tx.send(GalleryEvent::Revealed { index });
                }
            }
            next = end;
            if next < total {
                tokio::time::sleep(self.batch_pause).await;
            }
        }
    }

    fn is_superseded(&self, generation: u64) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            log::debug!(
                "Gallery pipeline {} superseded by {}, stopping",
                generation,
                current
            );
            return true;
        }
        false
    }
}

#[async_trait]
impl PhotoLoader for GalleryLoader {
    async fn load(&self, folder_id: &str) -> Result<LoadedGallery, AppError> {
        // Cache buster so intermediate caches cannot serve a stale manifest.
        let buster = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
            .to_string();
        let url = Url::parse_with_params(
            &self.endpoint,
            &[("folder", folder_id), ("t", buster.as_str())],
        )?;
        log::debug!("Fetching manifest from {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::Http(e)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_manifest(&body)
    }
}

/// Filters zero-size entries (broken thumbnails/players) and sorts what is
/// left. The endpoint reports failures as `{"error": "..."}`.
pub fn parse_manifest(body: &str) -> Result<LoadedGallery, AppError> {
    let manifest: ManifestResponse = serde_json::from_str(body)?;
    if let Some(message) = manifest.error {
        return Err(AppError::Endpoint(message));
    }
    let raw_len = manifest.items.len();
    let mut items: Vec<GalleryItem> = manifest
        .items
        .into_iter()
        .filter(|item| item.size > 0)
        .collect();
    if items.len() < raw_len {
        log::debug!("Dropped {} zero-size manifest entries", raw_len - items.len());
    }
    sort_items(&mut items);
    Ok(LoadedGallery {
        folder: manifest.folder,
        items,
    })
}

/// Images sort before videos as fixed groups; within a group, names compare
/// case-agnostically. Total, deterministic, and stable.
pub fn sort_items(items: &mut [GalleryItem]) {
    items.sort_by(|a, b| {
        a.media_kind()
            .cmp(&b.media_kind())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}
