use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lookup::WeatherIcon;

/// Top-level configuration for the geotag-card library.
///
/// Controls the external lookups (reverse geocoding, weather, static maps),
/// how the card is laid out and styled, and output encoding.
///
/// # Loading
///
/// ```rust,no_run
/// use geotag_card::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.geocoding.enabled = false;
/// config.output.jpeg_quality = 85;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reverse-geocoding lookup (address line on the card).
    pub geocoding: GeocodingConfig,
    /// Current-weather lookup (icon and temperature on the card).
    pub weather: WeatherConfig,
    /// Optional static map download when the caller supplies no map image.
    pub map: MapConfig,
    /// Card layout, fonts, and colors.
    pub card: CardConfig,
    /// Output encoding.
    pub output: OutputConfig,
}

/// Reverse-geocoding service configuration (Nominatim-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub zoom: u8,
    /// Nominatim's usage policy requires an identifying User-Agent.
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Address fields scanned in order; every present field is kept.
    pub field_priority: Vec<String>,
    /// Address used when the lookup fails or yields nothing.
    pub fallback_address: String,
}

/// Current-weather service configuration (Open-Meteo-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Directory holding `<icon>.png` files. Built-in glyphs are drawn when unset.
    pub icon_dir: Option<String>,
    /// Weather-code to icon mapping. Codes not listed here get no icon.
    pub icon_table: Vec<IconRule>,
}

/// One row of the weather-code lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IconRule {
    pub icon: WeatherIcon,
    pub codes: Vec<u16>,
}

/// Static map download settings.
///
/// `static_map_url` is a template; `{lat}`, `{lon}`, `{zoom}`, `{width}` and
/// `{height}` are substituted before the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub static_map_url: Option<String>,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub timeout_secs: u64,
}

/// Fonts, layout proportions, and colors for the rendered card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    /// Candidate TrueType files for the address line. First readable file wins.
    pub bold_fonts: Vec<String>,
    /// Candidate TrueType files for date/time, coordinates, and temperature.
    pub regular_fonts: Vec<String>,
    /// Smallest font size the shrink-to-fit loop may reach.
    pub min_font_px: f32,
    /// Decrement applied on each shrink-to-fit step.
    pub font_step_px: f32,
    pub layout: LayoutConfig,
    pub style: CardStyle,
}

/// Proportions used by the layout planner.
///
/// "Cross" is the overlay's short side (band height in landscape, column
/// width in portrait); region extents along the long side are derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Landscape band height as a fraction of image height.
    pub band_ratio: f32,
    /// Portrait column width as a fraction of image width.
    pub column_width_ratio: f32,
    /// Portrait column height as a fraction of image height.
    pub column_height_ratio: f32,
    /// Padding as a fraction of the cross extent.
    pub padding_ratio: f32,
    /// Width/height ratio of the map thumbnail.
    pub map_aspect: f32,
    pub landscape_weather_ratio: f32,
    pub portrait_weather_ratio: f32,
    /// Minimum text region extent, as a multiple of the inner cross extent.
    pub landscape_center_min_ratio: f32,
    pub portrait_center_min_ratio: f32,
    /// Map/weather regions never shrink below this fraction of the inner cross extent.
    pub side_floor_ratio: f32,
    /// Initial address size = cross / divisor.
    pub landscape_font_divisor: f32,
    pub portrait_font_divisor: f32,
    /// Date/time and coordinate lines relative to the address size.
    pub detail_font_ratio: f32,
}

/// RGBA colors of the card elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardStyle {
    pub background: [u8; 4],
    pub text: [u8; 4],
    pub map_border: [u8; 4],
    pub shadow: [u8; 4],
    pub placeholder: [u8; 4],
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JPEG encoder quality (1-100).
    pub jpeg_quality: u8,
    /// Suffix appended to the input file stem by the CLI.
    pub suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoding: GeocodingConfig {
                enabled: true,
                base_url: "https://nominatim.openstreetmap.org/reverse".to_string(),
                zoom: 18,
                user_agent: concat!("geotag-card/", env!("CARGO_PKG_VERSION")).to_string(),
                timeout_secs: 5,
                field_priority: [
                    "road",
                    "pedestrian",
                    "neighbourhood",
                    "suburb",
                    "village",
                    "town",
                    "city",
                    "state",
                    "country",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                fallback_address: "Unknown Location".to_string(),
            },
            weather: WeatherConfig {
                enabled: true,
                base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
                timeout_secs: 5,
                icon_dir: None,
                icon_table: default_icon_table(),
            },
            map: MapConfig {
                static_map_url: None,
                zoom: 10,
                width: 340,
                height: 180,
                timeout_secs: 5,
            },
            card: CardConfig {
                bold_fonts: vec![
                    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string(),
                    "/Library/Fonts/Arial Bold.ttf".to_string(),
                    "C:\\Windows\\Fonts\\arialbd.ttf".to_string(),
                ],
                regular_fonts: vec![
                    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string(),
                    "/Library/Fonts/Arial.ttf".to_string(),
                    "C:\\Windows\\Fonts\\arial.ttf".to_string(),
                ],
                min_font_px: 10.0,
                font_step_px: 2.0,
                layout: LayoutConfig::default(),
                style: CardStyle::default(),
            },
            output: OutputConfig {
                jpeg_quality: 92,
                suffix: "_geotagged".to_string(),
            },
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            band_ratio: 0.28,
            column_width_ratio: 0.42,
            column_height_ratio: 0.6,
            padding_ratio: 0.06,
            map_aspect: 1.8,
            landscape_weather_ratio: 0.8,
            portrait_weather_ratio: 0.5,
            landscape_center_min_ratio: 1.5,
            portrait_center_min_ratio: 0.6,
            side_floor_ratio: 0.35,
            landscape_font_divisor: 7.0,
            portrait_font_divisor: 11.0,
            detail_font_ratio: 0.8,
        }
    }
}

impl Default for CardStyle {
    fn default() -> Self {
        Self {
            background: [30, 30, 30, 180],
            text: [255, 255, 255, 230],
            map_border: [40, 40, 40, 220],
            shadow: [0, 0, 0, 90],
            placeholder: [200, 200, 200, 255],
        }
    }
}

/// WMO weather interpretation codes grouped by icon.
fn default_icon_table() -> Vec<IconRule> {
    vec![
        IconRule { icon: WeatherIcon::Clear, codes: vec![0] },
        IconRule { icon: WeatherIcon::PartlyCloudy, codes: vec![1, 2] },
        IconRule { icon: WeatherIcon::Cloudy, codes: vec![3] },
        IconRule { icon: WeatherIcon::Fog, codes: vec![45, 48] },
        IconRule { icon: WeatherIcon::Drizzle, codes: vec![51, 53, 55, 56, 57] },
        IconRule { icon: WeatherIcon::Rain, codes: vec![61, 63, 65, 66, 67, 80, 81, 82] },
        IconRule { icon: WeatherIcon::Storm, codes: vec![95, 96, 99] },
    ]
}

impl Config {
    /// Resolve the config file path (same directory as the executable).
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Disable both network lookups; the card falls back to the sentinel
    /// address and "N/A" temperature.
    pub fn offline(mut self) -> Self {
        self.geocoding.enabled = false;
        self.weather.enabled = false;
        self.map.static_map_url = None;
        self
    }

    /// Names of the lookups that will be attempted, for log output.
    pub fn enabled_lookups(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.geocoding.enabled {
            names.push("geocoding");
        }
        if self.weather.enabled {
            names.push("weather");
        }
        if self.map.static_map_url.is_some() {
            names.push("static-map");
        }
        names
    }
}
