use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::model::{GalleryItem, MediaKind};

/// Substitute aspect when a probe fails, so the lightbox can still pre-size
/// its slide without layout shift.
pub const FALLBACK_DIMENSIONS: (u32, u32) = (1920, 1080);

/// Learns the intrinsic width/height of one media item. Kept behind a trait
/// so the gallery pipeline can be exercised without network or decoding.
#[async_trait]
pub trait DimensionProbe: Send + Sync {
    async fn probe(&self, item: &GalleryItem) -> Result<(u32, u32), AppError>;
}

/// Fetches the asset and reads its dimensions from the decoded header,
/// without a full decode. Videos are not decodable with this stack and
/// always take the fallback path in the caller.
pub struct HttpDimensionProbe {
    client: reqwest::Client,
}

impl HttpDimensionProbe {
    pub fn new(timeout_secs: u64) -> Result<HttpDimensionProbe, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpDimensionProbe { client })
    }
}

#[async_trait]
impl DimensionProbe for HttpDimensionProbe {
    async fn probe(&self, item: &GalleryItem) -> Result<(u32, u32), AppError> {
        if item.media_kind() == MediaKind::Video {
            return Err(AppError::NotFound(format!(
                "no dimension metadata for video {}",
                item.name
            )));
        }

        let response = self.client.get(&item.src).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        let reader = image::io::Reader::new(Cursor::new(bytes)).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }
}
