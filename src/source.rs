use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::model::Album;

/// Where the album list comes from. Exactly one implementation is selected
/// at startup; callers own any retry behavior they want (there is none).
#[async_trait]
pub trait AlbumSource: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<Album>, AppError>;
}

/// Live Apps Script endpoint, parameterized by the master folder.
pub struct DriveAlbumSource {
    client: reqwest::Client,
    endpoint: String,
    master_folder_id: String,
    timeout_secs: u64,
}

impl DriveAlbumSource {
    pub fn new(config: &AppConfig) -> Result<DriveAlbumSource, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;
        Ok(DriveAlbumSource {
            client,
            endpoint: config.apps_script_url.clone(),
            master_folder_id: config.master_folder_id.clone(),
            timeout_secs: config.fetch_timeout_secs,
        })
    }
}

#[async_trait]
impl AlbumSource for DriveAlbumSource {
    async fn list_albums(&self) -> Result<Vec<Album>, AppError> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[("action", "list"), ("master", self.master_folder_id.as_str())],
        )?;
        log::debug!("Fetching album list from {}", url);

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
        parse_album_list(&body)
    }
}

/// Static `albums.json` fallback with the same shape as the live endpoint.
pub struct StaticAlbumSource {
    path: PathBuf,
}

impl StaticAlbumSource {
    pub fn new(config: &AppConfig) -> StaticAlbumSource {
        StaticAlbumSource {
            path: PathBuf::from(&config.static_albums_path),
        }
    }
}

#[async_trait]
impl AlbumSource for StaticAlbumSource {
    async fn list_albums(&self) -> Result<Vec<Album>, AppError> {
        log::debug!("Reading static album list from {:?}", self.path);
        let body = tokio::fs::read_to_string(&self.path).await?;
        parse_album_list(&body)
    }
}

/// The endpoint reports its own failures as `{"error": "..."}` with a 200
/// status, so an object body is a failure even though it parsed.
fn parse_album_list(body: &str) -> Result<Vec<Album>, AppError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(AppError::Endpoint(message.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}
