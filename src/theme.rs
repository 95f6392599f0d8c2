use crate::config::DisplayConfig;
use anyhow::{anyhow, Result};
use eframe::egui::Color32;

pub const DEFAULT_BACKGROUND: &str = "#2a2a2a";
pub const DEFAULT_FOREGROUND: &str = "#f6f2f2";

/// Colours and font sizes for the song text and window backdrop.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub background: Color32,
    pub foreground: Color32,
    pub title_size: f32,
    pub artist_size: f32,
    pub album_size: f32,
}

impl Palette {
    pub fn resolve(display: &DisplayConfig, warnings: &mut Vec<String>) -> Self {
        let opacity = if (0.0..=1.0).contains(&display.opacity) {
            display.opacity
        } else {
            warnings.push(format!(
                "display.opacity {} is outside 0.0..=1.0; clamping",
                display.opacity
            ));
            display.opacity.clamp(0.0, 1.0)
        };

        let background = resolve_color(
            "background",
            &display.background,
            DEFAULT_BACKGROUND,
            warnings,
        );
        let [r, g, b, _] = background.to_array();
        let alpha = (opacity * 255.0).round() as u8;
        let background = Color32::from_rgba_unmultiplied(r, g, b, alpha);
        let foreground = resolve_color(
            "foreground",
            &display.foreground,
            DEFAULT_FOREGROUND,
            warnings,
        );

        Palette {
            background,
            foreground,
            title_size: font_size("title_size", display.title_size, 32.0, warnings),
            artist_size: font_size("artist_size", display.artist_size, 24.0, warnings),
            album_size: font_size("album_size", display.album_size, 18.0, warnings),
        }
    }
}

fn resolve_color(key: &str, value: &str, fallback: &str, warnings: &mut Vec<String>) -> Color32 {
    match parse_color(value) {
        Ok(color) => color,
        Err(err) => {
            warnings.push(format!("display.{key}: {err}; using {fallback}"));
            parse_color(fallback).unwrap_or(Color32::WHITE)
        }
    }
}

fn font_size(key: &str, value: f32, fallback: f32, warnings: &mut Vec<String>) -> f32 {
    if value.is_finite() && value >= 6.0 {
        value
    } else {
        warnings.push(format!("display.{key} {value} is not a usable font size; using {fallback}"));
        fallback
    }
}

/// Accepts `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`, `rgba(r, g, b, a)` and
/// `transparent`. Alpha may be a 0..=1 fraction or a 0..=255 byte.
pub fn parse_color(value: &str) -> Result<Color32> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("transparent") {
        Ok(Color32::TRANSPARENT)
    } else if let Some(digits) = trimmed.strip_prefix('#') {
        hex_color(digits)
    } else if let Some(args) = functional_args(trimmed, "rgba") {
        match args.as_slice() {
            [r, g, b, a] => Ok(Color32::from_rgba_unmultiplied(
                channel(r)?,
                channel(g)?,
                channel(b)?,
                alpha(a)?,
            )),
            _ => Err(anyhow!("rgba() takes four values: {trimmed}")),
        }
    } else if let Some(args) = functional_args(trimmed, "rgb") {
        match args.as_slice() {
            [r, g, b] => Ok(Color32::from_rgb(channel(r)?, channel(g)?, channel(b)?)),
            _ => Err(anyhow!("rgb() takes three values: {trimmed}")),
        }
    } else {
        Err(anyhow!("Unsupported color format: {trimmed}"))
    }
}

fn hex_color(digits: &str) -> Result<Color32> {
    let invalid = || anyhow!("Invalid hex color: #{digits}");
    if !matches!(digits.len(), 6 | 8) || !digits.is_ascii() {
        return Err(invalid());
    }
    let bytes = (0..digits.len())
        .step_by(2)
        .map(|at| u8::from_str_radix(&digits[at..at + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| invalid())?;

    Ok(match bytes[..] {
        [r, g, b] => Color32::from_rgb(r, g, b),
        [r, g, b, a] => Color32::from_rgba_unmultiplied(r, g, b, a),
        _ => return Err(invalid()),
    })
}

fn functional_args<'a>(value: &'a str, name: &str) -> Option<Vec<&'a str>> {
    let inner = value.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.split(',').map(str::trim).collect())
}

fn channel(raw: &str) -> Result<u8> {
    raw.parse::<u8>()
        .map_err(|_| anyhow!("Color channel out of range: {raw}"))
}

fn alpha(raw: &str) -> Result<u8> {
    let value: f32 = raw
        .parse()
        .map_err(|_| anyhow!("Invalid alpha value: {raw}"))?;
    let scaled = if value <= 1.0 { value * 255.0 } else { value };
    Ok(scaled.clamp(0.0, 255.0).round() as u8)
}
