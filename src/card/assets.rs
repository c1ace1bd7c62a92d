//! Font and weather-icon loading.

use anyhow::{Context, Result};
use image::RgbaImage;
use rusttype::Font;
use std::path::Path;

use super::text::Face;
use crate::config::CardConfig;
use crate::lookup::WeatherIcon;

/// The two faces a card is drawn with.
#[derive(Debug)]
pub struct FontSet {
    /// Address and temperature.
    pub bold: Face,
    /// Date/time and coordinates.
    pub regular: Face,
}

impl FontSet {
    /// Both faces are the built-in bitmap font.
    pub fn builtin() -> Self {
        Self {
            bold: Face::Bitmap,
            regular: Face::Bitmap,
        }
    }

    pub fn load(config: &CardConfig) -> Self {
        Self {
            bold: load_face(&config.bold_fonts, "bold"),
            regular: load_face(&config.regular_fonts, "regular"),
        }
    }

    pub fn uses_builtin(&self) -> bool {
        self.bold.is_builtin() || self.regular.is_builtin()
    }
}

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> Result<Font<'static>> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read font {}", path.display()))?;
    Font::try_from_vec(data).with_context(|| format!("Not a usable TrueType font: {}", path.display()))
}

/// First candidate that loads wins; with none, the bitmap font is used.
pub fn load_face(candidates: &[String], variant: &str) -> Face {
    for candidate in candidates {
        match load_font(Path::new(candidate)) {
            Ok(font) => {
                log::debug!("Using {variant} font {candidate}");
                return Face::TrueType(font);
            }
            Err(e) => log::debug!("Skipping {variant} font: {e:#}"),
        }
    }
    log::warn!("No {variant} TrueType font found, using the built-in bitmap font");
    Face::Bitmap
}

/// Load the icon asset for `icon` from `dir`.
pub fn load_icon(dir: &Path, icon: WeatherIcon) -> Result<RgbaImage> {
    let path = dir.join(icon.file_name());
    let data = std::fs::read(&path).with_context(|| format!("Failed to read icon {}", path.display()))?;
    let image = image::load_from_memory(&data).with_context(|| format!("Failed to decode icon {}", path.display()))?;
    Ok(image.to_rgba8())
}
