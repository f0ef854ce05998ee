//! tripcache - command-line front-end for the offline layer.
//!
//! Pre-fetches map tiles for a trip, inspects the local store and response
//! caches, and runs one-off cache-first fetches through the controller.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tripcache_core::controller::ResponseSource;
use tripcache_core::tiles::TRIP_PACKAGE_NAMESPACE;
use tripcache_core::{
    CacheStorage, Config, DiskCacheStorage, FileBackend, HttpFetcher, LocalStore, MapBounds,
    NetworkCacheController, ReconnectNotifier, Request, StoreBackend, TileCacheManager, TileProgress,
};

/// Buffer size for tile progress updates.
const PROGRESS_BUFFER_SIZE: usize = 64;

/// Log file name prefix inside `log_dir`.
const LOG_FILE_PREFIX: &str = "tripcache.log";

const USAGE: &str = "\
Usage: tripcache <command> [args]

Commands:
  tiles <group-id> <north> <south> <east> <west> <zoom>
                                  Pre-fetch map tiles for a trip
  packages                        List cached trip packages
  store <namespace> get <key>     Print a stored value
  store <namespace> set <key> <json>
  store <namespace> merge <key> <json-object>
  store <namespace> remove <key>
  store <namespace> keys
  store <namespace> clear
  caches                          List response caches
  fetch <url>                     Cache-first fetch through the controller
  help                            Show this message

Environment:
  RUST_LOG            Log filter (default: warn)
  TRIPCACHE_ORIGIN    Web app origin
  TRIPCACHE_TILE_URL  Tile URL template with {z}/{x}/{y}";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

struct Components {
    config: Config,
    store: Arc<dyn StoreBackend>,
    caches: Arc<dyn CacheStorage>,
    fetcher: Arc<HttpFetcher>,
}

impl Components {
    fn open(config: Config) -> Result<Self> {
        let store = FileBackend::new(config.store_dir()?).context("Failed to open local store")?;
        let caches =
            DiskCacheStorage::new(config.caches_dir()?).context("Failed to open response caches")?;
        let fetcher = HttpFetcher::new(config.origin.as_deref(), config.request_timeout_secs)
            .context("Failed to create HTTP client")?;
        Ok(Self {
            config,
            store: Arc::new(store),
            caches: Arc::new(caches),
            fetcher: Arc::new(fetcher),
        })
    }

    fn tile_manager(&self) -> TileCacheManager {
        TileCacheManager::new(
            &self.config.tile_cache,
            self.config.tile_template(),
            Arc::clone(&self.caches),
            self.fetcher.clone(),
            LocalStore::new(Arc::clone(&self.store), TRIP_PACKAGE_NAMESPACE),
        )
        .with_concurrency(self.config.tile_concurrency())
    }

    fn controller(&self) -> NetworkCacheController {
        let controller = NetworkCacheController::new(
            self.config.cache_names(),
            self.config.controller_options(),
            Arc::clone(&self.caches),
            self.fetcher.clone(),
        );
        let notifier = ReconnectNotifier::new(controller.clients().clone(), &self.config.sync_tag);
        controller.with_notifier(notifier)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };
    config.apply_env_overrides();

    let _guard = init_tracing(&config);
    info!("tripcache starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");
    let rest = args.get(1..).unwrap_or_default();

    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let components = Components::open(config)?;
    match command {
        "tiles" => cache_tiles(&components, rest).await,
        "packages" => list_packages(&components).await,
        "store" => store_command(&components, rest).await,
        "caches" => list_caches(&components).await,
        "fetch" => fetch_url(&components, rest).await,
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = args
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("Missing argument: {}", name))?;
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid {} {:?}: {}", name, raw, e))
}

async fn cache_tiles(components: &Components, args: &[String]) -> Result<()> {
    let group_id: String = parse_arg(args, 0, "group-id")?;
    let bounds = MapBounds {
        north: parse_arg(args, 1, "north")?,
        south: parse_arg(args, 2, "south")?,
        east: parse_arg(args, 3, "east")?,
        west: parse_arg(args, 4, "west")?,
    };
    let zoom: u8 = parse_arg(args, 5, "zoom")?;
    if !bounds.is_finite() {
        bail!("Bounds must be finite numbers");
    }

    let manager = components.tile_manager();
    let (tx, mut rx) = mpsc::channel::<TileProgress>(PROGRESS_BUFFER_SIZE);

    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            eprint!(
                "\rCaching tiles: {:>3}% ({}/{} attempted, {} cached)",
                update.percent, update.attempted, update.total, update.cached
            );
        }
        eprintln!();
    });

    let result = manager.cache_area(&group_id, bounds, zoom, Some(&tx)).await;
    drop(tx);
    if let Err(e) = printer.await {
        warn!(error = %e, "Progress printer task failed");
    }

    let summary = result.context("Tile caching failed")?;
    println!(
        "Cached {} of {} tiles for group {} ({} skipped)",
        summary.package.tile_count, summary.attempted, summary.package.group_id, summary.failed
    );
    Ok(())
}

async fn list_packages(components: &Components) -> Result<()> {
    let packages = components.tile_manager().list_packages().await?;
    if packages.is_empty() {
        println!("No trip packages cached");
        return Ok(());
    }
    for package in packages {
        let b = package.map_bounds;
        println!(
            "{}  zoom {}  {} tiles  N{} S{} E{} W{}  cached {}",
            package.group_id,
            package.zoom,
            package.tile_count,
            b.north,
            b.south,
            b.east,
            b.west,
            package.cached_at.to_rfc3339()
        );
    }
    Ok(())
}

async fn store_command(components: &Components, args: &[String]) -> Result<()> {
    let namespace: String = parse_arg(args, 0, "namespace")?;
    let op: String = parse_arg(args, 1, "operation")?;
    let store = LocalStore::new(Arc::clone(&components.store), namespace);

    match op.as_str() {
        "get" => {
            let key: String = parse_arg(args, 2, "key")?;
            match store.get_value(&key).await {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("null"),
            }
        }
        "set" => {
            let key: String = parse_arg(args, 2, "key")?;
            let raw: String = parse_arg(args, 3, "json")?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("Value is not valid JSON")?;
            store.set(&key, &value).await?;
        }
        "merge" => {
            let key: String = parse_arg(args, 2, "key")?;
            let raw: String = parse_arg(args, 3, "json")?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("Value is not valid JSON")?;
            let partial = match value {
                serde_json::Value::Object(map) => map,
                _ => bail!("merge expects a JSON object"),
            };
            let merged = store.merge(&key, partial).await?;
            println!("{}", serde_json::to_string_pretty(&merged)?);
        }
        "remove" => {
            let key: String = parse_arg(args, 2, "key")?;
            store.remove(&key).await?;
        }
        "keys" => {
            let mut keys = store.list_keys().await?;
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        "clear" => store.clear().await?,
        other => bail!("Unknown store operation: {}", other),
    }
    Ok(())
}

async fn list_caches(components: &Components) -> Result<()> {
    let names = components.config.cache_names();
    for name in components.caches.keys().await? {
        let entries = components.caches.entries(&name).await?.len();
        let marker = if names.is_current(&name) { "" } else { "  (stale)" };
        println!("{}  {} entries{}", name, entries, marker);
    }
    Ok(())
}

async fn fetch_url(components: &Components, args: &[String]) -> Result<()> {
    let raw: String = parse_arg(args, 0, "url")?;
    let url = components.config.resolve(&raw);
    let controller = components.controller();

    // An unreachable app shell leaves the controller redundant; requests then
    // go straight to the network.
    if let Err(e) = controller.install().await {
        warn!(error = %e, "App shell install failed");
    } else {
        let deleted = controller.activate().await?;
        if !deleted.is_empty() {
            info!(?deleted, "Removed stale cache generations");
        }
    }

    let outcome = controller
        .handle_fetch(&Request::get(url.as_str()))
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;

    let source = match outcome.source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
        ResponseSource::OfflineFallback => "offline page",
    };
    println!(
        "{} {} from {} ({} bytes)",
        outcome.response.status,
        url,
        source,
        outcome.response.body.len()
    );
    Ok(())
}
