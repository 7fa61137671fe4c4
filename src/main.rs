use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use travel_map::cache::AlbumCache;
use travel_map::config::AppConfig;
use travel_map::detail::AlbumDetailController;
use travel_map::gallery::{GalleryEvent, GalleryLoader};
use travel_map::model::MediaKind;
use travel_map::probe::HttpDimensionProbe;
use travel_map::renderers::DefaultRendererFactory;
use travel_map::source::{AlbumSource, DriveAlbumSource, StaticAlbumSource};
use travel_map::store::{FileStore, SessionStore};
use travel_map::view_model::{MapViewModel, RendererKind, Theme};

#[derive(Parser)]
#[command(name = "travel-map", about = "Family travel map over Drive-backed albums")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the map page: pins for every located album.
    Map {
        /// Switch to this renderer after initializing.
        #[arg(long)]
        renderer: Option<String>,
        /// Color theme, "light" or "dark".
        #[arg(long)]
        theme: Option<String>,
    },
    /// Open one album's detail page.
    Show {
        album_id: String,
        /// Shared-link mode: no back-navigation affordance.
        #[arg(long)]
        shared: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::new()?;

    // Initialize env_logger based on config.log_level
    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting travel-map");

    let prefs = Arc::new(FileStore::new(&config.cache_directory)?);
    let source: Arc<dyn AlbumSource> = if config.use_dynamic_albums {
        Arc::new(DriveAlbumSource::new(&config)?)
    } else {
        Arc::new(StaticAlbumSource::new(&config))
    };
    let cache = Arc::new(AlbumCache::new(
        prefs.clone(),
        source,
        Duration::from_secs(config.album_cache_ttl_secs),
    ));

    let command = Cli::parse().command.unwrap_or(Command::Map {
        renderer: None,
        theme: None,
    });
    match command {
        Command::Map { renderer, theme } => run_map(&config, cache, prefs, renderer, theme).await?,
        Command::Show { album_id, shared } => run_show(&config, cache, &album_id, shared).await?,
    }

    info!("travel-map finished");
    Ok(())
}

async fn run_map(
    config: &AppConfig,
    cache: Arc<AlbumCache>,
    prefs: Arc<FileStore>,
    renderer_arg: Option<String>,
    theme_arg: Option<String>,
) -> Result<()> {
    let default_kind =
        RendererKind::parse(&config.default_renderer).unwrap_or(RendererKind::FlatMap);
    let factory = Box::new(DefaultRendererFactory::detect());
    let mut vm = MapViewModel::new(factory, prefs, cache, default_kind);
    vm.initialize().await?;

    if let Some(requested) = renderer_arg {
        match RendererKind::parse(&requested) {
            Some(kind) => {
                if let Err(e) = vm.switch_to(kind) {
                    eprintln!("Could not switch renderer: {}", e);
                }
            }
            None => eprintln!("Unknown renderer '{}'", requested),
        }
    }

    match theme_arg.as_deref() {
        Some("dark") => vm.apply_theme(Theme::Dark),
        Some("light") => vm.apply_theme(Theme::Light),
        Some(other) => eprintln!("Unknown theme '{}'", other),
        None => {}
    }
    log::debug!("View model state after setup: {:?}", vm.state());

    let active = vm
        .active_kind()
        .map(|k| k.as_str())
        .unwrap_or("uninitialized");
    println!("{} albums on the {}", vm.albums().len(), active);
    for album in vm.albums() {
        let pin = match (album.lat, album.lng) {
            (Some(lat), Some(lng)) => format!("({:.2}, {:.2})", lat, lng),
            _ => "(not on the map)".to_string(),
        };
        println!("  {:<32} {}", album.title, pin);
    }

    vm.shutdown();
    Ok(())
}

async fn run_show(
    config: &AppConfig,
    cache: Arc<AlbumCache>,
    album_id: &str,
    shared: bool,
) -> Result<()> {
    let probe = Arc::new(HttpDimensionProbe::new(config.fetch_timeout_secs)?);
    let loader = Arc::new(GalleryLoader::new(config, probe)?);
    let session = Arc::new(SessionStore::new());
    let controller = AlbumDetailController::new(cache, session, loader.clone());

    let view = controller.show(album_id).await?;

    println!("{}", view.album.title);
    if let Some(date) = &view.album.date {
        if !date.is_empty() {
            println!("{}", date);
        }
    }
    if let Some(description) = &view.album.description {
        if !description.is_empty() {
            println!("{}", description);
        }
    }

    if let Some(gallery) = &view.gallery {
        println!("{} items in '{}'", gallery.count(), gallery.folder);
        let stream = loader.start_reveal(gallery, &view.album.title);
        let events = stream.finished().await;
        for event in events.try_iter() {
            if let GalleryEvent::Inserted {
                name,
                kind,
                alt_text,
                ..
            } = event
            {
                let tag = match kind {
                    MediaKind::Image => "photo",
                    MediaKind::Video => "video",
                };
                println!("  [{}] {:<36} {}", tag, name, alt_text);
            }
        }
    } else if let Some(message) = &view.gallery_error {
        eprintln!("{}", message);
    }

    if !shared {
        println!("(back: travel-map map)");
    }
    Ok(())
}
