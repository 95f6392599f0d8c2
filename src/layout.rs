use crate::{config::DisplayConfig, display::art::FitMode};

pub const DEFAULT_PLACEMENT: ArtPlacement = ArtPlacement::Left;

/// Where the album art sits relative to the song text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtPlacement {
    Left,
    Right,
    Top,
    Bottom,
}

impl ArtPlacement {
    pub fn id(self) -> &'static str {
        match self {
            ArtPlacement::Left => "art_left",
            ArtPlacement::Right => "art_right",
            ArtPlacement::Top => "art_top",
            ArtPlacement::Bottom => "art_bottom",
        }
    }

    pub fn is_beside(self) -> bool {
        matches!(self, ArtPlacement::Left | ArtPlacement::Right)
    }

    /// Side panels scale art to the panel height; stacked layouts fit the
    /// whole free region.
    pub fn fit_mode(self) -> FitMode {
        if self.is_beside() {
            FitMode::Height
        } else {
            FitMode::Contain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    Fullscreen,
    Windowed,
}

/// Region geometry and window behaviour for the display surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub placement: ArtPlacement,
    pub window: WindowMode,
    pub always_on_top: bool,
    pub hide_cursor: bool,
    pub inner_size: [f32; 2],
    pub spacing: f32,
}

impl Layout {
    pub fn resolve(
        display: &DisplayConfig,
        placement_override: Option<&str>,
        force_windowed: bool,
        warnings: &mut Vec<String>,
    ) -> Self {
        let requested = placement_override.or(display.layout.as_deref());
        let placement = match requested {
            Some(value) => parse_placement(value).unwrap_or_else(|| {
                warnings.push(format!(
                    "Unknown layout '{value}'; falling back to {}",
                    DEFAULT_PLACEMENT.id()
                ));
                DEFAULT_PLACEMENT
            }),
            None => DEFAULT_PLACEMENT,
        };

        let window = if display.fullscreen && !force_windowed {
            WindowMode::Fullscreen
        } else {
            WindowMode::Windowed
        };

        let mut inner_size = [display.width, display.height];
        for (axis, value) in ["width", "height"].iter().zip(inner_size.iter_mut()) {
            if !value.is_finite() || *value < MIN_WINDOW_EXTENT {
                warnings.push(format!(
                    "display.{axis} {value} is too small; using {MIN_WINDOW_EXTENT}"
                ));
                *value = MIN_WINDOW_EXTENT;
            }
        }

        Layout {
            placement,
            window,
            always_on_top: display.always_on_top,
            hide_cursor: display.hide_cursor,
            inner_size,
            spacing: if placement.is_beside() { 30.0 } else { 10.0 },
        }
    }

    pub fn starts_fullscreen(&self) -> bool {
        self.window == WindowMode::Fullscreen
    }
}

const MIN_WINDOW_EXTENT: f32 = 200.0;

pub fn parse_placement(value: &str) -> Option<ArtPlacement> {
    match value.trim().to_ascii_lowercase().as_str() {
        "art_left" | "left" | "side" | "side_by_side" => Some(ArtPlacement::Left),
        "art_right" | "right" => Some(ArtPlacement::Right),
        "art_top" | "top" | "above" => Some(ArtPlacement::Top),
        "art_bottom" | "bottom" | "below" | "kiosk" => Some(ArtPlacement::Bottom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_aliases() {
        assert_eq!(parse_placement("art_left"), Some(ArtPlacement::Left));
        assert_eq!(parse_placement(" Right "), Some(ArtPlacement::Right));
        assert_eq!(parse_placement("above"), Some(ArtPlacement::Top));
        assert_eq!(parse_placement("kiosk"), Some(ArtPlacement::Bottom));
        assert_eq!(parse_placement("diagonal"), None);
    }

    #[test]
    fn beside_layouts_fit_to_height() {
        assert_eq!(ArtPlacement::Left.fit_mode(), FitMode::Height);
        assert_eq!(ArtPlacement::Right.fit_mode(), FitMode::Height);
        assert_eq!(ArtPlacement::Top.fit_mode(), FitMode::Contain);
        assert_eq!(ArtPlacement::Bottom.fit_mode(), FitMode::Contain);
    }

    #[test]
    fn unknown_layout_falls_back_with_warning() {
        let display = DisplayConfig {
            layout: Some("diagonal".into()),
            ..DisplayConfig::default()
        };
        let mut warnings = Vec::new();
        let layout = Layout::resolve(&display, None, false, &mut warnings);
        assert_eq!(layout.placement, DEFAULT_PLACEMENT);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn cli_override_wins_and_windowed_forces_window() {
        let display = DisplayConfig {
            layout: Some("art_top".into()),
            fullscreen: true,
            ..DisplayConfig::default()
        };
        let mut warnings = Vec::new();
        let layout = Layout::resolve(&display, Some("art_bottom"), true, &mut warnings);
        assert_eq!(layout.placement, ArtPlacement::Bottom);
        assert_eq!(layout.window, WindowMode::Windowed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn tiny_window_is_clamped() {
        let display = DisplayConfig {
            width: 10.0,
            ..DisplayConfig::default()
        };
        let mut warnings = Vec::new();
        let layout = Layout::resolve(&display, None, false, &mut warnings);
        assert_eq!(layout.inner_size[0], MIN_WINDOW_EXTENT);
        assert_eq!(warnings.len(), 1);
    }
}
