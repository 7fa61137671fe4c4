use std::fmt;
use std::sync::Arc;

use crate::cache::AlbumCache;
use crate::error::AppError;
use crate::model::Album;
use crate::store::{KvStore, RENDERER_PREF_KEY};

/// Which visualization technology owns the shared map container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    FlatMap,
    SpatialGallery,
}

impl RendererKind {
    /// Most capable first; the probe walks this list and the last entry must
    /// always construct.
    pub const PREFERENCE_ORDER: [RendererKind; 2] =
        [RendererKind::SpatialGallery, RendererKind::FlatMap];

    pub fn as_str(&self) -> &'static str {
        match self {
            RendererKind::FlatMap => "flat-map",
            RendererKind::SpatialGallery => "spatial-gallery",
        }
    }

    pub fn parse(s: &str) -> Option<RendererKind> {
        match s {
            "flat-map" => Some(RendererKind::FlatMap),
            "spatial-gallery" => Some(RendererKind::SpatialGallery),
            _ => None,
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

/// Camera/viewport state carried across a renderer switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: (f64, f64),
    pub zoom: f64,
}

impl Default for ViewState {
    fn default() -> ViewState {
        ViewState {
            center: (32.0, 34.8),
            zoom: 8.0,
        }
    }
}

/// The one shared element renderers mount into. Only the view model may
/// attach or detach content here; attach fails while another renderer still
/// owns it.
#[derive(Debug, Default)]
pub struct MapContainer {
    occupant: Option<RendererKind>,
}

impl MapContainer {
    pub fn attach(&mut self, kind: RendererKind) -> Result<(), AppError> {
        if let Some(existing) = self.occupant {
            return Err(AppError::RenderInit {
                kind: kind.to_string(),
                reason: format!("container still owned by '{}'", existing),
            });
        }
        self.occupant = Some(kind);
        Ok(())
    }

    pub fn detach(&mut self, kind: RendererKind) {
        if self.occupant == Some(kind) {
            self.occupant = None;
        }
    }

    pub fn occupant(&self) -> Option<RendererKind> {
        self.occupant
    }
}

pub trait Renderer: Send {
    fn kind(&self) -> RendererKind;
    fn mount(&mut self, container: &mut MapContainer, albums: &[Album]) -> Result<(), AppError>;
    /// Idempotent, and must not fail even when the renderer never fully
    /// mounted.
    fn unmount(&mut self, container: &mut MapContainer);
    fn render_markers(&mut self, albums: &[Album]);
    /// Layer/style substitution only; overlay markers must end up above the
    /// substituted base layer. Never a rebuild.
    fn apply_theme(&mut self, theme: Theme);
    fn capture_view_state(&self) -> ViewState;
    fn restore_view_state(&mut self, state: ViewState);
}

pub trait RendererFactory: Send + Sync {
    fn create(&self, kind: RendererKind) -> Result<Box<dyn Renderer>, AppError>;
    /// Capability probe: whether this environment can drive `kind` at all.
    fn supports(&self, kind: RendererKind) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewModelState {
    Uninitialized,
    MapActive(RendererKind),
    Switching {
        from: RendererKind,
        to: RendererKind,
    },
}

/// Owns the single notion of "which renderer is mounted", the album list it
/// renders, and the persisted user preference.
pub struct MapViewModel {
    state: ViewModelState,
    renderer: Option<Box<dyn Renderer>>,
    container: MapContainer,
    factory: Box<dyn RendererFactory>,
    prefs: Arc<dyn KvStore>,
    cache: Arc<AlbumCache>,
    albums: Vec<Album>,
    theme: Theme,
    default_kind: RendererKind,
}

impl MapViewModel {
    pub fn new(
        factory: Box<dyn RendererFactory>,
        prefs: Arc<dyn KvStore>,
        cache: Arc<AlbumCache>,
        default_kind: RendererKind,
    ) -> MapViewModel {
        MapViewModel {
            state: ViewModelState::Uninitialized,
            renderer: None,
            container: MapContainer::default(),
            factory,
            prefs,
            cache,
            albums: Vec::new(),
            theme: Theme::Light,
            default_kind,
        }
    }

    pub fn state(&self) -> ViewModelState {
        self.state
    }

    pub fn active_kind(&self) -> Option<RendererKind> {
        match self.state {
            ViewModelState::MapActive(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn albums(&self) -> &[Album] {
        &self.albums
    }

    /// Saved preference, else capability probe, else the safest kind.
    fn initial_kind(&self) -> RendererKind {
        match self.prefs.get(RENDERER_PREF_KEY) {
            Ok(Some(saved)) => {
                if let Some(kind) = RendererKind::parse(&saved) {
                    return kind;
                }
                log::warn!("Ignoring unknown renderer preference '{}'", saved);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read renderer preference: {}", e),
        }
        for kind in RendererKind::PREFERENCE_ORDER {
            if self.factory.supports(kind) {
                return kind;
            }
        }
        self.default_kind
    }

    /// Mounts the chosen renderer, paints cached pins immediately when the
    /// album cache has anything, then re-renders once fresh data arrives.
    pub async fn initialize(&mut self) -> Result<(), AppError> {
        let kind = self.initial_kind();
        self.mount_with_fallback(kind)?;

        let fetch = self.cache.fetch_albums();
        let had_instant = fetch.instant.is_some();
        if let Some(cached) = fetch.instant {
            log::info!("Rendering {} cached albums while revalidating", cached.len());
            self.set_albums(cached);
        }
        match fetch.resolved.await {
            Ok(fresh) => {
                if fresh != self.albums || !had_instant {
                    self.set_albums(fresh);
                }
            }
            // Only reachable on a first-ever visit; with cached data the
            // stale copy stays the displayed truth.
            Err(e) if !had_instant => return Err(e.into()),
            Err(e) => log::warn!("Album refresh failed: {}", e),
        }
        Ok(())
    }

    /// No-op when `new_kind` is already active. On any failure mid-switch
    /// the view model reports it and falls back to the default renderer; it
    /// is never left in `Switching`, even when the fallback mount fails too.
    pub fn switch_to(&mut self, new_kind: RendererKind) -> Result<(), AppError> {
        let current = match self.state {
            ViewModelState::MapActive(kind) => kind,
            _ => {
                return Err(AppError::RenderInit {
                    kind: new_kind.to_string(),
                    reason: "view model not initialized".into(),
                })
            }
        };
        if new_kind == current {
            return Ok(());
        }

        log::info!("Switching renderer: {} -> {}", current, new_kind);
        self.state = ViewModelState::Switching {
            from: current,
            to: new_kind,
        };

        let view_state = self
            .renderer
            .as_ref()
            .map(|r| r.capture_view_state())
            .unwrap_or_default();
        if let Some(mut old) = self.renderer.take() {
            old.unmount(&mut self.container);
        }

        match self.mount(new_kind) {
            Ok(()) => {
                // Persist only what actually mounted, so the next launch
                // does not retry a kind that just failed.
                if let Err(e) = self.prefs.put(RENDERER_PREF_KEY, new_kind.as_str()) {
                    log::warn!("Unable to persist renderer preference: {}", e);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.restore_view_state(view_state);
                }
                Ok(())
            }
            Err(e) => {
                log::error!("Switch to '{}' failed: {}", new_kind, e);
                if let Err(fallback) = self.mount(self.default_kind) {
                    log::error!(
                        "Fallback renderer '{}' also failed: {}",
                        self.default_kind,
                        fallback
                    );
                    self.renderer = None;
                    self.state = ViewModelState::Uninitialized;
                    return Err(fallback);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.restore_view_state(view_state);
                }
                Err(e)
            }
        }
    }

    /// Side operation on the active renderer only; never a rebuild.
    pub fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.apply_theme(theme);
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.unmount(&mut self.container);
        }
        self.state = ViewModelState::Uninitialized;
    }

    fn set_albums(&mut self, albums: Vec<Album>) {
        self.albums = albums;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render_markers(&self.albums);
        }
    }

    fn mount_with_fallback(&mut self, kind: RendererKind) -> Result<(), AppError> {
        match self.mount(kind) {
            Ok(()) => Ok(()),
            Err(e) if kind != self.default_kind => {
                log::error!(
                    "Renderer '{}' failed to initialize, falling back to '{}': {}",
                    kind,
                    self.default_kind,
                    e
                );
                self.mount(self.default_kind)
            }
            Err(e) => Err(e),
        }
    }

    fn mount(&mut self, kind: RendererKind) -> Result<(), AppError> {
        let mut renderer = self.factory.create(kind)?;
        renderer.apply_theme(self.theme);
        if let Err(e) = renderer.mount(&mut self.container, &self.albums) {
            renderer.unmount(&mut self.container);
            return Err(e);
        }
        self.renderer = Some(renderer);
        self.state = ViewModelState::MapActive(kind);
        Ok(())
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
    use crate::store::{KvStore, MemoryStore};

    fn album(id: &str, lat: Option<f64>) -> Album {
        Album {
            id: id.into(),
            title: crate::model::title_from_slug(id),
            date: None,
            description: None,
            lat,
            lng: lat.map(|l| l + 1.0),
            folder_id: Some(format!("folder-{}", id)),
            cover: None,
        }
    }

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<String>>,
    }

    impl EventLog {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn count_prefix(&self, prefix: &str) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.starts_with(prefix))
                .count()
        }
    }

    struct MockRenderer {
        kind: RendererKind,
        log: Arc<EventLog>,
        mounted: bool,
        view: ViewState,
    }

    impl Renderer for MockRenderer {
        fn kind(&self) -> RendererKind {
            self.kind
        }

        fn mount(
            &mut self,
            container: &mut MapContainer,
            albums: &[Album],
        ) -> Result<(), AppError> {
            container.attach(self.kind)?;
            self.mounted = true;
            self.log.push(format!("mount:{}:{}", self.kind, albums.len()));
            Ok(())
        }

        fn unmount(&mut self, container: &mut MapContainer) {
            if !self.mounted {
                return;
            }
            self.mounted = false;
            container.detach(self.kind);
            self.log.push(format!("unmount:{}", self.kind));
        }

        fn render_markers(&mut self, albums: &[Album]) {
            let ids: Vec<&str> = albums.iter().map(|a| a.id.as_str()).collect();
            self.log
                .push(format!("markers:{}:{}", self.kind, ids.join(",")));
        }

        fn apply_theme(&mut self, theme: Theme) {
            self.log.push(format!("theme:{}:{:?}", self.kind, theme));
        }

        fn capture_view_state(&self) -> ViewState {
            self.view
        }

        fn restore_view_state(&mut self, state: ViewState) {
            self.view = state;
            self.log.push(format!(
                "view:{}:{},{}@{}",
                self.kind, state.center.0, state.center.1, state.zoom
            ));
        }
    }

    struct MockFactory {
        log: Arc<EventLog>,
        spatial_supported: bool,
        fail_spatial_create: bool,
    }

    impl RendererFactory for MockFactory {
        fn create(&self, kind: RendererKind) -> Result<Box<dyn Renderer>, AppError> {
            if kind == RendererKind::SpatialGallery && self.fail_spatial_create {
                return Err(AppError::RenderInit {
                    kind: kind.to_string(),
                    reason: "no 3d context".into(),
                });
            }
            self.log.push(format!("create:{}", kind));
            Ok(Box::new(MockRenderer {
                kind,
                log: self.log.clone(),
                mounted: false,
                view: ViewState::default(),
            }))
        }

        fn supports(&self, kind: RendererKind) -> bool {
            kind == RendererKind::FlatMap || self.spatial_supported
        }
    }

    /// First create succeeds, every later one fails, for exercising a
    /// switch where the fallback mount fails as well.
    struct DyingFactory {
        log: Arc<EventLog>,
        creates: Mutex<usize>,
    }

    impl RendererFactory for DyingFactory {
        fn create(&self, kind: RendererKind) -> Result<Box<dyn Renderer>, AppError> {
            let mut creates = self.creates.lock().unwrap();
            if *creates > 0 {
                return Err(AppError::RenderInit {
                    kind: kind.to_string(),
                    reason: "renderer backend gone".into(),
                });
            }
            *creates += 1;
            Ok(Box::new(MockRenderer {
                kind,
                log: self.log.clone(),
                mounted: false,
                view: ViewState::default(),
            }))
        }

        fn supports(&self, _kind: RendererKind) -> bool {
            true
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

    struct Fixture {
        log: Arc<EventLog>,
        prefs: Arc<MemoryStore>,
        vm: MapViewModel,
    }

    fn fixture(
        spatial_supported: bool,
        fail_spatial_create: bool,
        cached: Option<Vec<Album>>,
        fresh: Vec<Album>,
    ) -> Fixture {
        let log = Arc::new(EventLog::default());
        let prefs = Arc::new(MemoryStore::new());
        let cache_store = Arc::new(MemoryStore::new());
        if let Some(cached) = &cached {
            let entry = crate::cache::CacheEntry {
                data: cached.clone(),
                timestamp: 0, // long stale
            };
            cache_store
                .put(
                    crate::store::ALBUMS_CACHE_KEY,
                    &serde_json::to_string(&entry).unwrap(),
                )
                .unwrap();
        }
        let cache = Arc::new(AlbumCache::new(
            cache_store,
            Arc::new(ScriptedSource { albums: fresh }),
            Duration::from_secs(300),
        ));
        let factory = Box::new(MockFactory {
            log: log.clone(),
            spatial_supported,
            fail_spatial_create,
        });
        let vm = MapViewModel::new(factory, prefs.clone(), cache, RendererKind::FlatMap);
        Fixture { log, prefs, vm }
    }

    #[tokio::test]
    async fn initialize_uses_saved_preference() {
        let mut fx = fixture(true, false, None, vec![album("paris-2023", Some(48.0))]);
        fx.prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        fx.vm.initialize().await.unwrap();
        assert_eq!(fx.vm.active_kind(), Some(RendererKind::FlatMap));
    }

    #[tokio::test]
    async fn initialize_probes_capability_without_preference() {
        let mut fx = fixture(true, false, None, vec![]);
        fx.vm.initialize().await.unwrap();
        assert_eq!(fx.vm.active_kind(), Some(RendererKind::SpatialGallery));

        let mut fx = fixture(false, false, None, vec![]);
        fx.vm.initialize().await.unwrap();
        assert_eq!(fx.vm.active_kind(), Some(RendererKind::FlatMap));
    }

    #[tokio::test]
    async fn initialize_renders_cached_pins_then_fresh() {
        let old = vec![album("paris-2023", Some(48.0))];
        let new = vec![
            album("paris-2023", Some(48.0)),
            album("rome-2024", Some(41.0)),
        ];
        let mut fx = fixture(false, false, Some(old), new);
        fx.vm.initialize().await.unwrap();

        let markers: Vec<String> = fx
            .log
            .take()
            .into_iter()
            .filter(|e| e.starts_with("markers:"))
            .collect();
        assert_eq!(
            markers,
            vec![
                "markers:flat-map:paris-2023".to_string(),
                "markers:flat-map:paris-2023,rome-2024".to_string(),
            ]
        );
        assert_eq!(fx.vm.albums().len(), 2);
    }

    #[tokio::test]
    async fn switch_to_same_kind_is_a_noop() {
        let mut fx = fixture(false, false, None, vec![]);
        fx.vm.initialize().await.unwrap();
        let before = fx.log.count_prefix("create:");
        fx.vm.switch_to(RendererKind::FlatMap).unwrap();
        assert_eq!(fx.log.count_prefix("create:"), before);
        assert_eq!(fx.log.count_prefix("unmount:"), 0);
    }

    #[tokio::test]
    async fn every_construct_except_the_active_one_is_torn_down() {
        let mut fx = fixture(true, false, None, vec![album("paris-2023", Some(48.0))]);
        fx.prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        fx.vm.initialize().await.unwrap();
        fx.vm.switch_to(RendererKind::SpatialGallery).unwrap();
        fx.vm.switch_to(RendererKind::FlatMap).unwrap();
        fx.vm.switch_to(RendererKind::SpatialGallery).unwrap();

        let creates = fx.log.count_prefix("create:");
        let unmounts = fx.log.count_prefix("unmount:");
        assert_eq!(creates, 4);
        assert_eq!(unmounts, creates - 1);
        assert_eq!(fx.vm.active_kind(), Some(RendererKind::SpatialGallery));
        assert_eq!(
            fx.vm.container.occupant(),
            Some(RendererKind::SpatialGallery)
        );
    }

    #[tokio::test]
    async fn switch_persists_preference_and_replays_albums() {
        let mut fx = fixture(true, false, None, vec![album("paris-2023", Some(48.0))]);
        fx.prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        fx.vm.initialize().await.unwrap();
        fx.vm.switch_to(RendererKind::SpatialGallery).unwrap();

        assert_eq!(
            fx.prefs.get(RENDERER_PREF_KEY).unwrap().as_deref(),
            Some("spatial-gallery")
        );
        // The new renderer was mounted with the current album list.
        assert!(fx
            .log
            .take()
            .contains(&"mount:spatial-gallery:1".to_string()));
    }

    #[tokio::test]
    async fn failed_switch_falls_back_to_default() {
        let mut fx = fixture(true, true, None, vec![]);
        fx.prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        fx.vm.initialize().await.unwrap();

        let err = fx.vm.switch_to(RendererKind::SpatialGallery).unwrap_err();
        assert!(matches!(err, AppError::RenderInit { .. }));
        // Not left half-initialized: the default renderer is active and owns
        // the container.
        assert_eq!(fx.vm.active_kind(), Some(RendererKind::FlatMap));
        assert_eq!(fx.vm.container.occupant(), Some(RendererKind::FlatMap));
        // The durable preference still names the kind that works, not the
        // one that just failed.
        assert_eq!(
            fx.prefs.get(RENDERER_PREF_KEY).unwrap().as_deref(),
            Some("flat-map")
        );
    }

    #[tokio::test]
    async fn double_mount_failure_resets_instead_of_sticking_mid_switch() {
        let log = Arc::new(EventLog::default());
        let prefs = Arc::new(MemoryStore::new());
        let cache = Arc::new(AlbumCache::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedSource { albums: vec![] }),
            Duration::from_secs(300),
        ));
        let factory = Box::new(DyingFactory {
            log: log.clone(),
            creates: Mutex::new(0),
        });
        let mut vm = MapViewModel::new(factory, prefs.clone(), cache, RendererKind::FlatMap);
        prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        vm.initialize().await.unwrap();

        let err = vm.switch_to(RendererKind::SpatialGallery).unwrap_err();
        assert!(matches!(err, AppError::RenderInit { .. }));
        // Both mounts failed; the view model must land in a clean state
        // rather than staying stuck mid-switch with nothing mounted.
        assert_eq!(vm.state(), ViewModelState::Uninitialized);
        assert!(vm.renderer.is_none());
        assert_eq!(vm.container.occupant(), None);
    }

    #[tokio::test]
    async fn view_state_is_handed_across_a_switch() {
        let mut fx = fixture(true, false, None, vec![]);
        fx.prefs.put(RENDERER_PREF_KEY, "flat-map").unwrap();
        fx.vm.initialize().await.unwrap();
        fx.vm
            .renderer
            .as_mut()
            .unwrap()
            .restore_view_state(ViewState {
                center: (48.85, 2.35),
                zoom: 12.0,
            });
        fx.log.take();

        fx.vm.switch_to(RendererKind::SpatialGallery).unwrap();
        assert!(fx
            .log
            .take()
            .contains(&"view:spatial-gallery:48.85,2.35@12".to_string()));
    }

    #[tokio::test]
    async fn theme_change_never_remounts() {
        let mut fx = fixture(false, false, None, vec![]);
        fx.vm.initialize().await.unwrap();
        let creates = fx.log.count_prefix("create:");
        fx.vm.apply_theme(Theme::Dark);
        assert_eq!(fx.log.count_prefix("create:"), creates);
        assert_eq!(fx.log.count_prefix("theme:flat-map:Dark"), 1);
    }
}
