use foundation::time::Duration;
use serde::Deserialize;

/// Lowest zoom at which buildings are drawn by default.
pub const MIN_ZOOM: f64 = 14.5;
/// Highest zoom at which buildings are drawn by default.
pub const MAX_ZOOM: f64 = 20.0;

pub const FEATURES_PER_CHUNK: usize = 90;
pub const DELAY_PER_CHUNK_MS: f64 = 75.0;

/// Zoom limits of the hosting viewer; layer ranges are clamped to them.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: MIN_ZOOM,
            max: MAX_ZOOM,
        }
    }
}

/// Per-dataset configuration, as accepted from a JSON options document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayerOptions {
    /// Identifier forced onto every feature, overriding per-feature ids.
    pub id: Option<String>,
    /// Color forced onto walls and roofs (`#rrggbb` or `#rgb`).
    pub color: Option<String>,
    pub scale: f64,
    /// Clockwise rotation about the origin, in degrees.
    pub rotation: f64,
    /// Vertical offset in meters.
    pub elevation: f64,
    pub fade_in: bool,
    pub min_zoom: Option<f64>,
    pub max_zoom: Option<f64>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            id: None,
            color: None,
            scale: 1.0,
            rotation: 0.0,
            elevation: 0.0,
            fade_in: true,
            min_zoom: None,
            max_zoom: None,
        }
    }
}

impl LayerOptions {
    /// Zoom range clamped to the viewer's limits.
    ///
    /// An inverted range falls back to the default range.
    pub fn zoom_range(&self, limits: ZoomLimits) -> (f64, f64) {
        let min = self.min_zoom.unwrap_or(MIN_ZOOM).max(limits.min);
        let max = self.max_zoom.unwrap_or(MAX_ZOOM).min(limits.max);
        if max < min {
            return (MIN_ZOOM, MAX_ZOOM);
        }
        (min, max)
    }

    /// Scale with `0` treated as unset.
    pub fn effective_scale(&self) -> f64 {
        if self.scale == 0.0 { 1.0 } else { self.scale }
    }
}

/// How much work one build step does and how long it yields afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildPolicy {
    pub features_per_chunk: usize,
    pub delay_per_chunk_ms: f64,
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            features_per_chunk: FEATURES_PER_CHUNK,
            delay_per_chunk_ms: DELAY_PER_CHUNK_MS,
        }
    }
}

impl BuildPolicy {
    pub fn new(features_per_chunk: usize, delay_per_chunk_ms: f64) -> Self {
        Self {
            features_per_chunk,
            delay_per_chunk_ms,
        }
    }

    /// Batch size, never zero.
    pub fn batch_size(&self) -> usize {
        self.features_per_chunk.max(1)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_per_chunk_ms)
    }
}
