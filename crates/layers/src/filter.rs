use crate::build::Item;

/// Delay between the end of a build and the start of its fade-in.
pub const FADE_DELAY_MS: f64 = 250.0;
/// Time from the end of a build to full opacity.
pub const FADE_END_MS: f64 = 750.0;

/// Opacity ramp over a time window, in host milliseconds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FadeFilter {
    pub start_ms: f64,
    pub end_ms: f64,
    pub from_opacity: f32,
    pub to_opacity: f32,
}

impl Default for FadeFilter {
    fn default() -> Self {
        Self::immediate(0.0)
    }
}

impl FadeFilter {
    /// Fully opaque from `at_ms` on.
    pub fn immediate(at_ms: f64) -> Self {
        Self {
            start_ms: at_ms,
            end_ms: at_ms,
            from_opacity: 0.0,
            to_opacity: 1.0,
        }
    }

    /// Layout of one vertex in the filter buffer.
    pub fn to_array(&self) -> [f32; 4] {
        [
            self.start_ms as f32,
            self.end_ms as f32,
            self.from_opacity,
            self.to_opacity,
        ]
    }

    /// Opacity the shader computes at `now_ms`.
    pub fn opacity_at(&self, now_ms: f64) -> f32 {
        if now_ms <= self.start_ms {
            return if now_ms < self.end_ms {
                self.from_opacity
            } else {
                self.to_opacity
            };
        }
        if now_ms >= self.end_ms {
            return self.to_opacity;
        }
        let t = ((now_ms - self.start_ms) / (self.end_ms - self.start_ms)) as f32;
        self.from_opacity + (self.to_opacity - self.from_opacity) * t
    }
}

/// Fade window for items whose buffers are built at `build_start_ms`.
pub fn compute_window(build_start_ms: f64, fade_enabled: bool) -> FadeFilter {
    if !fade_enabled {
        return FadeFilter::immediate(build_start_ms);
    }
    FadeFilter {
        start_ms: build_start_ms + FADE_DELAY_MS,
        end_ms: build_start_ms + FADE_END_MS,
        from_opacity: 0.0,
        to_opacity: 1.0,
    }
}

pub fn assign_window(items: &mut [Item], window: FadeFilter) {
    for item in items {
        item.filter = window;
    }
}

/// Expands a per-item attribute into a flat per-vertex array.
///
/// Each item contributes `vertex_count` copies of `attribute(item)`, in item
/// order, so the output lines up with the vertex buffers.
pub fn expand_per_vertex<const N: usize>(
    items: &[Item],
    attribute: impl Fn(&Item) -> [f32; N],
) -> Vec<f32> {
    let total: usize = items.iter().map(|i| i.vertex_count as usize).sum();
    let mut out = Vec::with_capacity(total * N);
    for item in items {
        let value = attribute(item);
        for _ in 0..item.vertex_count {
            out.extend_from_slice(&value);
        }
    }
    out
}
