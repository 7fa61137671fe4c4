pub mod flat_map;
pub mod spatial_gallery;

use crate::error::AppError;
use crate::view_model::{Renderer, RendererFactory, RendererKind};

use flat_map::FlatMapRenderer;
use spatial_gallery::SpatialGalleryRenderer;

/// Builds the real renderers. The flat map must always construct; the
/// spatial gallery is gated on the capability probe.
pub struct DefaultRendererFactory {
    spatial_supported: bool,
}

impl DefaultRendererFactory {
    pub fn new(spatial_supported: bool) -> DefaultRendererFactory {
        DefaultRendererFactory { spatial_supported }
    }

    /// Capability probe for the 3D path. Headless environments can opt out
    /// explicitly; there is nothing else to interrogate here.
    pub fn detect() -> DefaultRendererFactory {
        DefaultRendererFactory {
            spatial_supported: std::env::var_os("TRAVEL_MAP_DISABLE_3D").is_none(),
        }
    }
}

impl RendererFactory for DefaultRendererFactory {
    fn create(&self, kind: RendererKind) -> Result<Box<dyn Renderer>, AppError> {
        match kind {
            RendererKind::FlatMap => Ok(Box::new(FlatMapRenderer::new())),
            RendererKind::SpatialGallery => {
                if !self.spatial_supported {
                    return Err(AppError::RenderInit {
                        kind: kind.to_string(),
                        reason: "3D rendering context unavailable".into(),
                    });
                }
                Ok(Box::new(SpatialGalleryRenderer::new()))
            }
        }
    }

    fn supports(&self, kind: RendererKind) -> bool {
        match kind {
            RendererKind::FlatMap => true,
            RendererKind::SpatialGallery => self.spatial_supported,
        }
    }
}
