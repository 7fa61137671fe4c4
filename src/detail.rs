use std::sync::Arc;

use crate::cache::AlbumCache;
use crate::error::AppError;
use crate::gallery::{LoadedGallery, PhotoLoader};
use crate::model::{title_from_slug, Album};
use crate::store::SessionStore;

/// What the detail surface renders. A gallery failure is carried as a
/// visible error state, never as a failure of the whole view.
#[derive(Debug)]
pub struct DetailView {
    pub album: Album,
    pub gallery: Option<LoadedGallery>,
    pub gallery_error: Option<String>,
}

/// Orchestrates one album's detail view: instant paint from the
/// session-cached album when possible, fresh resolution through the album
/// cache, and the decision whether photos need (re)loading.
pub struct AlbumDetailController {
    cache: Arc<AlbumCache>,
    session: Arc<SessionStore>,
    loader: Arc<dyn PhotoLoader>,
}

impl AlbumDetailController {
    pub fn new(
        cache: Arc<AlbumCache>,
        session: Arc<SessionStore>,
        loader: Arc<dyn PhotoLoader>,
    ) -> AlbumDetailController {
        AlbumDetailController {
            cache,
            session,
            loader,
        }
    }

    pub async fn show(&self, album_id: &str) -> Result<DetailView, AppError> {
        if album_id.trim().is_empty() {
            return Err(AppError::MissingParam("album id"));
        }

        // Kick off the fresh fetch right away so it loads while we paint.
        let fetch = self.cache.fetch_albums();

        let mut photos: Option<tokio::task::JoinHandle<Result<LoadedGallery, AppError>>> = None;
        let mut cached_album: Option<Album> = None;
        if let Some(cached) = self.session.current_album() {
            if cached.id == album_id {
                log::debug!("Painting session-cached album '{}'", cached.title);
                if let Some(folder) = cached.folder_id.clone() {
                    photos = Some(self.spawn_load(folder));
                }
                cached_album = Some(cached);
            }
        }

        let provisional_title = cached_album
            .as_ref()
            .map(|a| a.title.clone())
            .unwrap_or_else(|| title_from_slug(album_id));
        log::info!("Showing album '{}'", provisional_title);

        let albums = fetch.resolved.await?;
        let fresh = albums
            .into_iter()
            .find(|a| a.id == album_id)
            .ok_or_else(|| AppError::NotFound(format!("album '{}'", album_id)))?;

        let previous_folder = cached_album.as_ref().and_then(|a| a.folder_id.clone());
        self.session.set_current_album(&fresh);

        // Reload when there was no usable cached album, the cached album had
        // no folder, or the folder moved. An unchanged folder id must not
        // trigger a second load.
        let should_reload = cached_album.is_none()
            || previous_folder.is_none()
            || previous_folder != fresh.folder_id;
        if should_reload {
            if let Some(superseded) = photos.take() {
                // A late response must not clobber the newer load.
                superseded.abort();
            }
            match fresh.folder_id.clone() {
                Some(folder) => photos = Some(self.spawn_load(folder)),
                None => log::warn!("Skipping photo load, album '{}' has no folder id", fresh.id),
            }
        }

        let (gallery, gallery_error) = match photos {
            Some(task) => match task.await {
                Ok(Ok(gallery)) => (Some(gallery), None),
                Ok(Err(e)) => {
                    log::error!("Failed to load photos for '{}': {}", fresh.id, e);
                    (None, Some(format!("Failed to load photos: {}", e)))
                }
                Err(e) => {
                    log::error!("Photo load task for '{}' died: {}", fresh.id, e);
                    (None, Some("Failed to load photos".to_string()))
                }
            },
            None => (None, None),
        };

        Ok(DetailView {
            album: fresh,
            gallery,
            gallery_error,
        })
    }

    fn spawn_load(&self, folder: String) -> tokio::task::JoinHandle<Result<LoadedGallery, AppError>> {
        let loader = Arc::clone(&self.loader);
        tokio::spawn(async move { loader.load(&folder).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::source::AlbumSource;
    use crate::store::MemoryStore;

    fn album(id: &str, folder: Option<&str>) -> Album {
        Album {
            id: id.into(),
            title: title_from_slug(id),
            date: None,
            description: None,
            lat: Some(48.85),
            lng: Some(2.35),
            folder_id: folder.map(Into::into),
            cover: None,
        }
    }

    struct ScriptedSource {
        albums: Vec<Album>,
    }

    #[async_trait]
    impl AlbumSource for ScriptedSource {
        async fn list_albums(&self) -> Result<Vec<Album>, AppError> {
            Ok(self.albums.clone())
        }
    }

    struct CountingLoader {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl CountingLoader {
        fn new(fail: bool) -> Arc<CountingLoader> {
            Arc::new(CountingLoader {
                calls: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PhotoLoader for CountingLoader {
        async fn load(&self, folder_id: &str) -> Result<LoadedGallery, AppError> {
            self.calls.lock().unwrap().push(folder_id.to_string());
            if self.fail {
                return Err(AppError::Fetch { status: 503 });
            }
            Ok(LoadedGallery {
                folder: folder_id.to_string(),
                items: Vec::new(),
            })
        }
    }

    fn controller(
        fresh: Vec<Album>,
        session_album: Option<Album>,
        loader: Arc<CountingLoader>,
    ) -> AlbumDetailController {
        let cache = Arc::new(AlbumCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedSource { albums: fresh }),
            Duration::from_secs(300),
        ));
        let session = Arc::new(SessionStore::new());
        if let Some(album) = session_album {
            session.set_current_album(&album);
        }
        AlbumDetailController::new(cache, session, loader)
    }

    #[tokio::test]
    async fn missing_album_id_is_fatal_to_the_view() {
        let loader = CountingLoader::new(false);
        let ctl = controller(vec![], None, loader);
        assert!(matches!(
            ctl.show("  ").await,
            Err(AppError::MissingParam(_))
        ));
    }

    #[tokio::test]
    async fn unknown_album_id_is_not_found() {
        let loader = CountingLoader::new(false);
        let ctl = controller(vec![album("rome-2024", Some("F9"))], None, loader);
        assert!(matches!(
            ctl.show("paris-2023").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn folder_id_change_triggers_a_reload_with_the_new_folder() {
        let loader = CountingLoader::new(false);
        let ctl = controller(
            vec![album("paris-2023", Some("F2"))],
            Some(album("paris-2023", Some("F1"))),
            loader.clone(),
        );
        let view = ctl.show("paris-2023").await.unwrap();

        let calls = loader.calls();
        assert_eq!(calls.last().map(String::as_str), Some("F2"));
        assert_eq!(calls.iter().filter(|c| *c == "F2").count(), 1);
        assert_eq!(view.gallery.unwrap().folder, "F2");
    }

    #[tokio::test]
    async fn unchanged_folder_id_loads_photos_exactly_once() {
        let loader = CountingLoader::new(false);
        let ctl = controller(
            vec![album("paris-2023", Some("F1"))],
            Some(album("paris-2023", Some("F1"))),
            loader.clone(),
        );
        let view = ctl.show("paris-2023").await.unwrap();

        assert_eq!(loader.calls(), vec!["F1".to_string()]);
        assert!(view.gallery.is_some());
    }

    #[tokio::test]
    async fn first_visit_loads_the_fresh_folder() {
        let loader = CountingLoader::new(false);
        let ctl = controller(vec![album("paris-2023", Some("F1"))], None, loader.clone());
        ctl.show("paris-2023").await.unwrap();
        assert_eq!(loader.calls(), vec!["F1".to_string()]);
    }

    #[tokio::test]
    async fn gallery_failure_does_not_take_down_the_view() {
        let loader = CountingLoader::new(true);
        let ctl = controller(vec![album("paris-2023", Some("F1"))], None, loader);
        let view = ctl.show("paris-2023").await.unwrap();

        assert_eq!(view.album.id, "paris-2023");
        assert!(view.gallery.is_none());
        assert!(view.gallery_error.unwrap().contains("Failed to load photos"));
    }

    #[tokio::test]
    async fn fresh_album_replaces_the_session_entry() {
        let loader = CountingLoader::new(false);
        let cache = Arc::new(AlbumCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedSource {
                albums: vec![album("paris-2023", Some("F2"))],
            }),
            Duration::from_secs(300),
        ));
        let session = Arc::new(SessionStore::new());
        session.set_current_album(&album("paris-2023", Some("F1")));
        let ctl = AlbumDetailController::new(cache, session.clone(), loader);
        ctl.show("paris-2023").await.unwrap();

        assert_eq!(
            session.current_album().unwrap().folder_id.as_deref(),
            Some("F2")
        );
    }
}
