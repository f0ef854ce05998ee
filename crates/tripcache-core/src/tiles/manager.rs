use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::coords::{tile_count_for_area, tiles_for_area, MapBounds, TileUrlTemplate};
use crate::cache::CacheStorage;
use crate::clock::{Clock, SystemClock};
use crate::error::{OfflineError, Result};
use crate::fetch::Fetcher;
use crate::http::Request;
use crate::store::LocalStore;

/// Store namespace trip packages are conventionally kept under.
pub const TRIP_PACKAGE_NAMESPACE: &str = "trip-packages";

/// Default number of tile fetches in flight.
pub const DEFAULT_TILE_CONCURRENCY: usize = 4;

/// Upper bound on tile fetches in flight, to stay polite to tile servers.
pub const MAX_TILE_CONCURRENCY: usize = 8;

/// One completed offline-map download for a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct TripPackage {
    pub group_id: String,
    pub map_bounds: MapBounds,
    pub zoom: u8,
    pub tile_count: u32,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileProgress {
    pub attempted: usize,
    pub cached: usize,
    pub total: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileRunSummary {
    pub package: TripPackage,
    pub attempted: usize,
    pub failed: usize,
}

/// Share of attempted tiles, rounded. Held below 100 until every tile has
/// been attempted.
pub fn progress_percent(attempted: usize, total: usize) -> u8 {
    if total == 0 || attempted >= total {
        return 100;
    }
    let percent = (attempted as f64 / total as f64 * 100.0).round() as u8;
    percent.min(99)
}

/// Pre-fetches map tiles covering an area into the tile cache and records
/// a `TripPackage` for the group once the run finishes.
///
/// A failed tile is skipped and the run continues; tiles already cached are
/// never rolled back. Dropping the future mid-run stops it, keeping what was
/// already cached, and the next run starts from the beginning.
pub struct TileCacheManager {
    tile_cache: String,
    template: TileUrlTemplate,
    caches: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    packages: LocalStore,
    clock: Arc<dyn Clock>,
    concurrency: usize,
}

impl TileCacheManager {
    /// `packages` is the store trip packages are written to, keyed by
    /// group id.
    pub fn new(
        tile_cache: impl Into<String>,
        template: TileUrlTemplate,
        caches: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        packages: LocalStore,
    ) -> Self {
        Self {
            tile_cache: tile_cache.into(),
            template,
            caches,
            fetcher,
            packages,
            clock: Arc::new(SystemClock),
            concurrency: DEFAULT_TILE_CONCURRENCY,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the fetch window. 1 fetches strictly one tile at a time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_TILE_CONCURRENCY);
        self
    }

    /// Tile URLs a run over `bounds` at centre zoom `zoom` will request, in
    /// request order.
    pub fn plan<'a>(
        &'a self,
        bounds: &MapBounds,
        zoom: u8,
    ) -> impl Iterator<Item = String> + 'a {
        tiles_for_area(bounds, zoom).map(move |tile| self.template.url(&tile))
    }

    pub async fn cache_area(
        &self,
        group_id: &str,
        bounds: MapBounds,
        zoom: u8,
        progress: Option<&mpsc::Sender<TileProgress>>,
    ) -> Result<TileRunSummary> {
        if !bounds.is_finite() {
            return Err(OfflineError::InvalidBounds(format!("{:?}", bounds)));
        }
        let total = usize::try_from(tile_count_for_area(&bounds, zoom))
            .map_err(|_| OfflineError::InvalidBounds(format!("{:?} at zoom {}", bounds, zoom)))?;
        info!(group_id, zoom, total, concurrency = self.concurrency, "Caching map tiles");

        if let Err(e) = self.caches.open(&self.tile_cache).await {
            warn!(cache = %self.tile_cache, error = %e, "Failed to open tile cache");
        }

        let fetcher = &self.fetcher;
        let mut results = stream::iter(self.plan(&bounds, zoom))
            .map(|url| async move {
                let result = fetcher.fetch(&Request::get(url.as_str())).await;
                (url, result)
            })
            .buffered(self.concurrency);

        let mut attempted = 0;
        let mut cached = 0;
        let mut reporting = progress.is_some();

        if total == 0 {
            self.report(progress, &mut reporting, 0, 0, 0).await;
        }

        while let Some((url, result)) = results.next().await {
            match result {
                Ok(response) if response.is_ok() => {
                    match self.caches.put(&self.tile_cache, &url, response).await {
                        Ok(()) => cached += 1,
                        Err(e) => warn!(%url, error = %e, "Failed to store tile"),
                    }
                }
                Ok(response) => debug!(%url, status = response.status, "Skipping tile"),
                Err(e) => debug!(%url, error = %e, "Skipping tile"),
            }
            attempted += 1;
            self.report(progress, &mut reporting, attempted, cached, total).await;
        }

        let package = TripPackage {
            group_id: group_id.to_string(),
            map_bounds: bounds,
            zoom,
            tile_count: cached as u32,
            cached_at: self.clock.now(),
        };
        self.packages.set(group_id, &package).await?;

        let failed = attempted - cached;
        info!(group_id, cached, failed, "Tile caching finished");
        Ok(TileRunSummary {
            package,
            attempted,
            failed,
        })
    }

    async fn report(
        &self,
        progress: Option<&mpsc::Sender<TileProgress>>,
        reporting: &mut bool,
        attempted: usize,
        cached: usize,
        total: usize,
    ) {
        let Some(tx) = progress else { return };
        if !*reporting {
            return;
        }
        let update = TileProgress {
            attempted,
            cached,
            total,
            percent: progress_percent(attempted, total),
        };
        if tx.send(update).await.is_err() {
            debug!("Progress receiver dropped, continuing without updates");
            *reporting = false;
        }
    }

    pub async fn load_package(&self, group_id: &str) -> Option<TripPackage> {
        self.packages.get(group_id, None).await
    }

    pub async fn list_packages(&self) -> Result<Vec<TripPackage>> {
        let mut packages = Vec::new();
        for key in self.packages.list_keys().await? {
            if let Some(package) = self.load_package(&key).await {
                packages.push(package);
            }
        }
        packages.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        Ok(packages)
    }

    /// Forget a group's package record. Cached tiles stay until the tile
    /// cache generation is replaced.
    pub async fn remove_package(&self, group_id: &str) -> Result<()> {
        self.packages.remove(group_id).await
    }
}
