use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Web App URL of the deployed Apps Script endpoint.
    pub apps_script_url: String,
    /// Drive folder ID of the master "Family Trips" folder.
    pub master_folder_id: String,
    /// False switches to the static albums file instead of the live endpoint.
    pub use_dynamic_albums: bool,
    /// Path of the static fallback album list.
    pub static_albums_path: String,
    pub cache_directory: String,
    pub album_cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub probe_batch_size: usize,
    pub probe_batch_pause_ms: u64,
    pub eager_reveal_count: usize,
    pub reveal_fallback_timeout_ms: u64,
    pub default_renderer: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        apps_script_url: "https://script.example.com/exec".into(),
        master_folder_id: "master-folder".into(),
        use_dynamic_albums: true,
        static_albums_path: "albums.json".into(),
        cache_directory: std::env::temp_dir()
            .join("travel-map-test")
            .to_string_lossy()
            .into_owned(),
        album_cache_ttl_secs: 300,
        fetch_timeout_secs: 10,
        probe_batch_size: 5,
        probe_batch_pause_ms: 100,
        eager_reveal_count: 4,
        reveal_fallback_timeout_ms: 4000,
        default_renderer: "flat-map".into(),
        log_level: "info".into(),
    }
}
