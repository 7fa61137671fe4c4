use crate::error::AppError;
use crate::model::Album;
use crate::view_model::{MapContainer, Renderer, RendererKind, Theme, ViewState};

/// One floating card in the 3D gallery. Every album gets a card, located or
/// not; location only decides whether the card links back to a map pin.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub album_id: String,
    pub title: String,
    pub cover: Option<String>,
    pub pinned: bool,
}

fn backdrop(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "starfield-day",
        Theme::Dark => "starfield-night",
    }
}

/// 3D card-gallery renderer. Construction is gated on the capability probe
/// in the factory; once constructed it behaves like any other renderer.
pub struct SpatialGalleryRenderer {
    mounted: bool,
    theme: Theme,
    cards: Vec<Card>,
    backdrop: &'static str,
    view: Option<ViewState>,
}

impl SpatialGalleryRenderer {
    pub fn new() -> SpatialGalleryRenderer {
        SpatialGalleryRenderer {
            mounted: false,
            theme: Theme::Light,
            cards: Vec::new(),
            backdrop: backdrop(Theme::Light),
            view: None,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn backdrop_style(&self) -> &'static str {
        self.backdrop
    }
}

impl Renderer for SpatialGalleryRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::SpatialGallery
    }

    fn mount(&mut self, container: &mut MapContainer, albums: &[Album]) -> Result<(), AppError> {
        container.attach(self.kind())?;
        self.mounted = true;
        self.render_markers(albums);
        log::debug!("Spatial gallery mounted with {} cards", self.cards.len());
        Ok(())
    }

    fn unmount(&mut self, container: &mut MapContainer) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.cards.clear();
        container.detach(self.kind());
        log::debug!("Spatial gallery unmounted");
    }

    fn render_markers(&mut self, albums: &[Album]) {
        self.cards = albums
            .iter()
            .map(|a| Card {
                album_id: a.id.clone(),
                title: a.title.clone(),
                cover: a.cover.clone(),
                pinned: a.has_location(),
            })
            .collect();
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.backdrop = backdrop(theme);
    }

    fn capture_view_state(&self) -> ViewState {
        self.view.unwrap_or_default()
    }

    fn restore_view_state(&mut self, state: ViewState) {
        self.view = Some(state);
    }
}
