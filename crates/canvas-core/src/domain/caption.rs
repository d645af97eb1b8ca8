//! Caption state painted on top of every composited frame.
//!
//! The caption is a small mutable record (`text`, `color`, `font`, `x`, `y`)
//! edited by the user between frames and read by every draw tick.  Colors and
//! fonts are written the way a CSS author would write them (`"white"`,
//! `"rgba(0,0,0,0.5)"`, `"20pt Calibri"`) and validated when the edit is
//! applied, so a tick never has to deal with a malformed caption.
//!
//! # Atomic edits
//!
//! [`CaptionState::apply`] validates every field of a [`CaptionEdit`] before
//! touching the state.  Either the whole edit lands or nothing changes, which
//! means the next frame never shows a half-applied caption.

use std::fmt;
use std::str::FromStr;

use image::Rgba;
use thiserror::Error;

/// Error type for caption validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionError {
    #[error("invalid color: {0:?}")]
    InvalidColor(String),
    #[error("invalid font (expected e.g. \"20pt Calibri\"): {0:?}")]
    InvalidFont(String),
    #[error("invalid caption coordinate: {0:?}")]
    InvalidCoordinate(String),
}

// ── Color ─────────────────────────────────────────────────────────────────────

/// A CSS color string together with its resolved RGBA value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Color {
    css: String,
    rgba: Rgba<u8>,
}

impl Color {
    /// Parses a CSS color.
    ///
    /// Accepted forms: a small set of named colors, `#rgb`, `#rgba`,
    /// `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and `rgba(r, g, b, a)` with
    /// `a` in `0.0..=1.0`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptionError::InvalidColor`] for anything else.
    pub fn parse(css: &str) -> Result<Self, CaptionError> {
        let normalized = css.trim().to_ascii_lowercase();
        let rgba = if let Some(hex) = normalized.strip_prefix('#') {
            parse_hex(hex)
        } else if let Some(args) = normalized
            .strip_prefix("rgba(")
            .or_else(|| normalized.strip_prefix("rgb("))
        {
            args.strip_suffix(')').and_then(parse_rgb_args)
        } else {
            named_color(&normalized)
        };

        rgba.map(|rgba| Self {
            css: css.trim().to_string(),
            rgba,
        })
        .ok_or_else(|| CaptionError::InvalidColor(css.to_string()))
    }

    /// The resolved RGBA value.
    pub fn rgba(&self) -> Rgba<u8> {
        self.rgba
    }

    /// The color as originally written.
    pub fn as_css(&self) -> &str {
        &self.css
    }
}

impl FromStr for Color {
    type Err = CaptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 | 4 => {
            let mut channels = [255u8; 4];
            for (i, channel) in channels.iter_mut().enumerate().take(hex.len()) {
                // `#abc` expands each digit: a → aa.
                *channel = digit(i)? * 17;
            }
            Some(Rgba(channels))
        }
        6 | 8 => {
            let mut channels = [255u8; 4];
            for (i, channel) in channels.iter_mut().enumerate().take(hex.len() / 2) {
                *channel = pair(i * 2)?;
            }
            Some(Rgba(channels))
        }
        _ => None,
    }
}

fn parse_rgb_args(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let r = parts[0].parse::<u8>().ok()?;
    let g = parts[1].parse::<u8>().ok()?;
    let b = parts[2].parse::<u8>().ok()?;
    let a = match parts.get(3) {
        Some(alpha) => {
            let alpha = alpha.parse::<f32>().ok()?;
            if !(0.0..=1.0).contains(&alpha) {
                return None;
            }
            (alpha * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba([r, g, b, a]))
}

fn named_color(name: &str) -> Option<Rgba<u8>> {
    let rgb = match name {
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "red" => [255, 0, 0],
        "lime" => [0, 255, 0],
        "green" => [0, 128, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" | "aqua" => [0, 255, 255],
        "magenta" | "fuchsia" => [255, 0, 255],
        "gray" | "grey" => [128, 128, 128],
        "silver" => [192, 192, 192],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "transparent" => return Some(Rgba([0, 0, 0, 0])),
        _ => return None,
    };
    Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
}

// ── Font ──────────────────────────────────────────────────────────────────────

/// Length unit of a font size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontUnit {
    Px,
    Pt,
    Em,
}

/// A CSS font shorthand reduced to what the caption needs: size and family.
///
/// Style and weight keywords before the size (`"bold 20pt Calibri"`) are kept
/// in the original string but otherwise ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    css: String,
    pub size: f32,
    pub unit: FontUnit,
    pub family: String,
}

impl FontSpec {
    /// Parses a font shorthand such as `"20pt Calibri"` or `"bold 16px 'Fira Sans'"`.
    ///
    /// # Errors
    ///
    /// Returns [`CaptionError::InvalidFont`] when no positive size token is
    /// present or when no family follows it.
    pub fn parse(css: &str) -> Result<Self, CaptionError> {
        let invalid = || CaptionError::InvalidFont(css.to_string());
        let tokens: Vec<&str> = css.split_whitespace().collect();

        let (index, size, unit) = tokens
            .iter()
            .enumerate()
            .find_map(|(i, token)| parse_size(token).map(|(size, unit)| (i, size, unit)))
            .ok_or_else(invalid)?;

        let family = tokens[index + 1..]
            .join(" ")
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string();
        if family.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            css: css.trim().to_string(),
            size,
            unit,
            family,
        })
    }

    /// The font size converted to CSS pixels (96 px per inch, 16 px per em).
    pub fn size_px(&self) -> f32 {
        match self.unit {
            FontUnit::Px => self.size,
            FontUnit::Pt => self.size * 96.0 / 72.0,
            FontUnit::Em => self.size * 16.0,
        }
    }

    /// The font as originally written.
    pub fn as_css(&self) -> &str {
        &self.css
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

fn parse_size(token: &str) -> Option<(f32, FontUnit)> {
    let (number, unit) = if let Some(n) = token.strip_suffix("px") {
        (n, FontUnit::Px)
    } else if let Some(n) = token.strip_suffix("pt") {
        (n, FontUnit::Pt)
    } else if let Some(n) = token.strip_suffix("em") {
        (n, FontUnit::Em)
    } else {
        return None;
    };
    let size = number.parse::<f32>().ok()?;
    (size.is_finite() && size > 0.0).then_some((size, unit))
}

// ── Caption state ─────────────────────────────────────────────────────────────

/// The caption painted over the bottom band of every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionState {
    pub text: String,
    pub color: Color,
    pub font: FontSpec,
    /// Text anchor (left edge) in surface pixels.
    pub x: i32,
    /// Text anchor (baseline) in surface pixels.
    pub y: i32,
}

impl CaptionState {
    /// Builds a caption from user-facing strings.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptionError`] when `color` or `font` does not parse.
    pub fn new(
        text: impl Into<String>,
        color: &str,
        font: &str,
        x: i32,
        y: i32,
    ) -> Result<Self, CaptionError> {
        Ok(Self {
            text: text.into(),
            color: Color::parse(color)?,
            font: FontSpec::parse(font)?,
            x,
            y,
        })
    }

    /// Applies a user edit.
    ///
    /// Every field of `edit` is validated first; on error the caption is left
    /// exactly as it was.
    pub fn apply(&mut self, edit: CaptionEdit) -> Result<(), CaptionError> {
        let color = edit.color.as_deref().map(Color::parse).transpose()?;
        let font = edit.font.as_deref().map(FontSpec::parse).transpose()?;

        if let Some(text) = edit.text {
            self.text = text;
        }
        if let Some(color) = color {
            self.color = color;
        }
        if let Some(font) = font {
            self.font = font;
        }
        if let Some((x, y)) = edit.position {
            self.x = x;
            self.y = y;
        }
        Ok(())
    }
}

impl Default for CaptionState {
    /// `"Hi there!"` in white 20pt Calibri, anchored at (15, 460).
    fn default() -> Self {
        Self {
            text: "Hi there!".to_string(),
            color: Color {
                css: "white".to_string(),
                rgba: Rgba([255, 255, 255, 255]),
            },
            font: FontSpec {
                css: "20pt Calibri".to_string(),
                size: 20.0,
                unit: FontUnit::Pt,
                family: "Calibri".to_string(),
            },
            x: 15,
            y: 460,
        }
    }
}

/// A partial caption update.  `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionEdit {
    pub text: Option<String>,
    pub color: Option<String>,
    pub font: Option<String>,
    pub position: Option<(i32, i32)>,
}

impl CaptionEdit {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }

    pub fn font(font: impl Into<String>) -> Self {
        Self {
            font: Some(font.into()),
            ..Self::default()
        }
    }

    /// Builds a position edit from the raw text of the two coordinate fields.
    ///
    /// # Errors
    ///
    /// Returns [`CaptionError::InvalidCoordinate`] when either value is not an
    /// integer.
    pub fn position_from_str(x: &str, y: &str) -> Result<Self, CaptionError> {
        let parse = |raw: &str| {
            raw.trim()
                .parse::<i32>()
                .map_err(|_| CaptionError::InvalidCoordinate(raw.to_string()))
        };
        Ok(Self {
            position: Some((parse(x)?, parse(y)?)),
            ..Self::default()
        })
    }
}
