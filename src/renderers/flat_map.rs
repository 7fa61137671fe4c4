use crate::error::AppError;
use crate::model::Album;
use crate::view_model::{MapContainer, Renderer, RendererKind, Theme, ViewState};

/// One pin on the tile map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub album_id: String,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
}

/// The layer stack, bottom to top. Markers must stay above the base tiles
/// across any base substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Base(&'static str),
    Markers(usize),
}

fn base_style(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "esri_natgeo",
        Theme::Dark => "esri_world_imagery",
    }
}

/// Flat 2D tile map. The safest renderer: construction cannot fail and it
/// needs no special capability.
pub struct FlatMapRenderer {
    mounted: bool,
    theme: Theme,
    markers: Vec<Marker>,
    layers: Vec<Layer>,
    view: Option<ViewState>,
}

impl FlatMapRenderer {
    pub fn new() -> FlatMapRenderer {
        FlatMapRenderer {
            mounted: false,
            theme: Theme::Light,
            markers: Vec::new(),
            layers: Vec::new(),
            view: None,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    fn rebuild_layers(&mut self) {
        self.layers = vec![Layer::Base(base_style(self.theme)), Layer::Markers(self.markers.len())];
    }

    /// Centers on the markers, roughly what a fit-bounds call does. Only
    /// used until the user (or a previous renderer) supplies a view.
    fn fit_bounds(&mut self) {
        if self.markers.is_empty() {
            self.view = None;
            return;
        }
        let (mut lat_min, mut lat_max) = (f64::MAX, f64::MIN);
        let (mut lng_min, mut lng_max) = (f64::MAX, f64::MIN);
        for marker in &self.markers {
            lat_min = lat_min.min(marker.lat);
            lat_max = lat_max.max(marker.lat);
            lng_min = lng_min.min(marker.lng);
            lng_max = lng_max.max(marker.lng);
        }
        let span = (lat_max - lat_min).max(lng_max - lng_min);
        let zoom = if span <= f64::EPSILON {
            10.0
        } else {
            (360.0 / span).log2().clamp(1.0, 16.0)
        };
        self.view = Some(ViewState {
            center: ((lat_min + lat_max) / 2.0, (lng_min + lng_max) / 2.0),
            zoom,
        });
    }
}

impl Renderer for FlatMapRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::FlatMap
    }

    fn mount(&mut self, container: &mut MapContainer, albums: &[Album]) -> Result<(), AppError> {
        container.attach(self.kind())?;
        self.mounted = true;
        self.render_markers(albums);
        log::debug!("Flat map mounted with {} markers", self.markers.len());
        Ok(())
    }

    fn unmount(&mut self, container: &mut MapContainer) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.markers.clear();
        self.layers.clear();
        container.detach(self.kind());
        log::debug!("Flat map unmounted");
    }

    fn render_markers(&mut self, albums: &[Album]) {
        // Albums without coordinates are listed elsewhere but never pinned.
        self.markers = albums
            .iter()
            .filter(|a| a.has_location())
            .map(|a| Marker {
                album_id: a.id.clone(),
                title: a.title.clone(),
                lat: a.lat.unwrap_or_default(),
                lng: a.lng.unwrap_or_default(),
            })
            .collect();
        self.rebuild_layers();
        if self.view.is_none() {
            self.fit_bounds();
        }
    }

    fn apply_theme(&mut self, theme: Theme) {
        self.theme = theme;
        // Base substitution only; the marker layer stays on top.
        self.rebuild_layers();
    }

    fn capture_view_state(&self) -> ViewState {
        self.view.unwrap_or_default()
    }

    fn restore_view_state(&mut self, state: ViewState) {
        self.view = Some(state);
    }
}
