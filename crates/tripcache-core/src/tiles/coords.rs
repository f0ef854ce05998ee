//! Slippy-map tile addressing.
//!
//! Tile indices always come from `floor` of the Web-Mercator projection;
//! rounding would address tiles no tile server serves.

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Highest zoom level tile servers publish.
pub const MAX_ZOOM: u8 = 19;

/// Latitude beyond which Web-Mercator is undefined.
pub const MAX_LATITUDE: f64 = 85.051_128_78;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MapBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl MapBounds {
    /// False when any edge is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        [self.north, self.south, self.east, self.west]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

/// Zoom levels covered for a centre zoom: one coarser, the exact, one
/// finer, clamped to `0..=MAX_ZOOM`.
pub fn zoom_levels(center: u8) -> RangeInclusive<u8> {
    let center = center.min(MAX_ZOOM);
    center.saturating_sub(1)..=(center + 1).min(MAX_ZOOM)
}

// Zoom levels past MAX_ZOOM are addressed as MAX_ZOOM.
fn max_index(zoom: u8) -> u32 {
    ((1u64 << zoom) - 1) as u32
}

pub fn lng_to_tile_x(lng: f64, zoom: u8) -> u32 {
    let zoom = zoom.min(MAX_ZOOM);
    let n = (1u64 << zoom) as f64;
    let x = ((lng + 180.0) / 360.0 * n).floor();
    x.clamp(0.0, max_index(zoom) as f64) as u32
}

pub fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let zoom = zoom.min(MAX_ZOOM);
    let n = (1u64 << zoom) as f64;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
    y.clamp(0.0, max_index(zoom) as f64) as u32
}

// Inclusive tile index ranges `(x, y)` covered at `zoom`, or `None` when
// the box is inverted or not finite.
fn tile_span(
    bounds: &MapBounds,
    zoom: u8,
) -> Option<(RangeInclusive<u32>, RangeInclusive<u32>)> {
    if !bounds.is_finite() || bounds.west > bounds.east || bounds.south > bounds.north {
        return None;
    }
    let xs = lng_to_tile_x(bounds.west, zoom)..=lng_to_tile_x(bounds.east, zoom);
    let ys = lat_to_tile_y(bounds.north, zoom)..=lat_to_tile_y(bounds.south, zoom);
    Some((xs, ys))
}

/// Every tile in the rectangle spanned by the north-west and south-east
/// corners, row by row. Empty when the box is inverted or not finite.
pub fn tiles_for_bounds(bounds: &MapBounds, zoom: u8) -> impl Iterator<Item = TileCoord> {
    let zoom = zoom.min(MAX_ZOOM);
    tile_span(bounds, zoom)
        .into_iter()
        .flat_map(move |(xs, ys)| {
            ys.flat_map(move |y| xs.clone().map(move |x| TileCoord { zoom, x, y }))
        })
}

/// Tiles for every zoom level around `center`, coarsest level first.
/// Enumerated lazily; large areas at high zoom never sit in memory at once.
pub fn tiles_for_area(bounds: &MapBounds, center: u8) -> impl Iterator<Item = TileCoord> {
    let bounds = *bounds;
    zoom_levels(center).flat_map(move |zoom| tiles_for_bounds(&bounds, zoom))
}

/// Number of tiles `tiles_for_area` yields, without enumerating them.
pub fn tile_count_for_area(bounds: &MapBounds, center: u8) -> u64 {
    zoom_levels(center)
        .filter_map(|zoom| tile_span(bounds, zoom))
        .map(|(xs, ys)| {
            let width = u64::from(xs.end() - xs.start()) + 1;
            let height = u64::from(ys.end() - ys.start()) + 1;
            width * height
        })
        .sum()
}

/// Tile URL template with `{z}`, `{x}`, `{y}` placeholders and an optional
/// `{s}` subdomain placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    template: String,
    subdomains: Vec<String>,
}

impl TileUrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    }

    pub fn with_subdomains(mut self, subdomains: Vec<String>) -> Self {
        if !subdomains.is_empty() {
            self.subdomains = subdomains;
        }
        self
    }

    pub fn url(&self, tile: &TileCoord) -> String {
        let mut url = self
            .template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string());
        if url.contains("{s}") {
            let index = (tile.x as usize + tile.y as usize) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[index]);
        }
        url
    }
}
