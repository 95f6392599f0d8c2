use anyhow::Context;
use eframe::egui::ColorImage;
use image::{imageops::FilterType, RgbaImage};
use std::{
    path::Path,
    time::{Duration, Instant},
};

/// Available regions are never treated as smaller than this many pixels per side.
pub const MIN_ART_EXTENT: f32 = 64.0;
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

// Guards against 399.99997 flooring to 399 when the ratio is exact.
const ROUNDING_SLACK: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Largest size that fits inside both axes of the region.
    Contain,
    /// Longest source side matches the region height.
    Height,
}

/// Target pixel size for a `source` image shown in `available` pixels.
/// Returns `None` for an empty source.
pub fn fit_dimensions(source: [u32; 2], available: [f32; 2], mode: FitMode) -> Option<[u32; 2]> {
    let [width, height] = source;
    if width == 0 || height == 0 {
        return None;
    }

    let region_w = sanitize_extent(available[0]);
    let region_h = sanitize_extent(available[1]);
    let (w, h) = (f64::from(width), f64::from(height));

    let ratio = match mode {
        FitMode::Contain => (region_w / w).min(region_h / h),
        FitMode::Height => region_h / w.max(h),
    };

    let scaled = |side: f64| ((side * ratio + ROUNDING_SLACK).floor() as u32).max(1);
    let mut fitted = [scaled(w), scaled(h)];
    if mode == FitMode::Contain {
        fitted[0] = fitted[0].min(region_w.floor() as u32);
        fitted[1] = fitted[1].min(region_h.floor() as u32);
    }
    Some(fitted)
}

fn sanitize_extent(value: f32) -> f64 {
    if value.is_finite() {
        f64::from(value.max(MIN_ART_EXTENT))
    } else {
        f64::from(MIN_ART_EXTENT)
    }
}

pub fn decode_art(path: &Path) -> anyhow::Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to decode album art: {}", path.display()))?;
    Ok(image.to_rgba8())
}

/// Nearest-neighbour keeps frequent refits cheap on small boards.
pub fn resample(source: &RgbaImage, size: [u32; 2]) -> ColorImage {
    let resized = image::imageops::resize(source, size[0], size[1], FilterType::Nearest);
    ColorImage::from_rgba_unmultiplied(
        [resized.width() as usize, resized.height() as usize],
        resized.as_raw(),
    )
}

/// Collapses a burst of region changes into one refit.
#[derive(Debug)]
pub struct ResizeDebounce {
    delay: Duration,
    pending: Option<([u32; 2], Instant)>,
}

impl ResizeDebounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record a region that differs from the fitted one. Each new value
    /// restarts the delay.
    pub fn observe(&mut self, region: [u32; 2], now: Instant) {
        match self.pending {
            Some((pending, _)) if pending == region => {}
            _ => self.pending = Some((region, now + self.delay)),
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn take_due(&mut self, now: Instant) -> Option<[u32; 2]> {
        match self.pending {
            Some((region, deadline)) if now >= deadline => {
                self.pending = None;
                Some(region)
            }
            _ => None,
        }
    }

    pub fn time_left(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|(_, deadline)| deadline.saturating_duration_since(now))
    }
}

impl Default for ResizeDebounce {
    fn default() -> Self {
        Self::new(RESIZE_DEBOUNCE)
    }
}
