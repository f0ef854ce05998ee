//! Map tile pre-fetching for offline use.
//!
//! Covers a bounding box at a centre zoom plus one level either side,
//! stores every tile that could be fetched in the tile cache, and records
//! a `TripPackage` summary for the group.

pub mod coords;
pub mod manager;

pub use coords::{
    lat_to_tile_y, lng_to_tile_x, tile_count_for_area, tiles_for_area, tiles_for_bounds,
    zoom_levels, MapBounds, TileCoord, TileUrlTemplate, MAX_ZOOM,
};
pub use manager::{
    progress_percent, TileCacheManager, TileProgress, TileRunSummary, TripPackage,
    DEFAULT_TILE_CONCURRENCY, MAX_TILE_CONCURRENCY, TRIP_PACKAGE_NAMESPACE,
};
