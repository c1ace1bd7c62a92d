//! Per-request context lookups: reverse geocoding and current weather.
//!
//! Both lookups are consumed through small async traits so the pipeline can be
//! driven by the bundled HTTP clients ([`NominatimGeocoder`],
//! [`OpenMeteoWeather`]) or by test doubles. Failures never propagate past
//! [`resolve_context`]: a failed or skipped geocoder yields the fallback
//! address, and a failed or skipped weather lookup yields no icon and `"N/A"`.

mod nominatim;
mod open_meteo;

pub use nominatim::{NominatimGeocoder, ReverseResponse, format_address};
pub use open_meteo::{CurrentWeather, ForecastResponse, OpenMeteoWeather};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::IconRule;

/// Temperature shown when no reading is available.
pub const TEMPERATURE_UNAVAILABLE: &str = "N/A";

/// Weather icon categories, each backed by a bundled `<name>.png` asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    Storm,
}

impl WeatherIcon {
    /// File name of the icon asset inside the configured icon directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Clear => "clear.png",
            Self::PartlyCloudy => "partly_cloudy.png",
            Self::Cloudy => "cloudy.png",
            Self::Fog => "fog.png",
            Self::Drizzle => "drizzle.png",
            Self::Rain => "rain.png",
            Self::Storm => "storm.png",
        }
    }

    /// Look a weather code up in the configured table. Unmapped codes have no icon.
    pub fn from_code(code: u16, table: &[IconRule]) -> Option<Self> {
        table
            .iter()
            .find(|rule| rule.codes.contains(&code))
            .map(|rule| rule.icon)
    }
}

/// Weather data as shown on the card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub icon: Option<WeatherIcon>,
    pub temperature_display: String,
}

impl WeatherReport {
    pub fn unavailable() -> Self {
        Self {
            icon: None,
            temperature_display: TEMPERATURE_UNAVAILABLE.to_string(),
        }
    }
}

/// Address and weather resolved for a single request. Never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedContext {
    /// Never empty; falls back to the configured sentinel.
    pub address: String,
    pub weather_icon: Option<WeatherIcon>,
    pub temperature_display: String,
}

impl ResolvedContext {
    /// Context used when no lookup is attempted or every lookup failed.
    pub fn fallback(address: &str) -> Self {
        Self {
            address: address.to_string(),
            weather_icon: None,
            temperature_display: TEMPERATURE_UNAVAILABLE.to_string(),
        }
    }
}

/// Reverse-geocoding backend: coordinates in, display address out.
#[async_trait::async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// The display name of this backend (e.g., "Nominatim").
    fn name(&self) -> &str;
    /// Resolve a human-readable address. Errors are turned into the fallback
    /// address by [`resolve_address`].
    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String>;
}

/// Current-weather backend: coordinates in, icon and temperature out.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// The display name of this backend (e.g., "Open-Meteo").
    fn name(&self) -> &str;
    async fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport>;
}

/// Format a temperature in degrees Celsius with one decimal place.
pub fn format_temperature(celsius: f64) -> String {
    format!("{celsius:.1}°C")
}

/// Resolve the address, substituting `fallback` for a skipped or failed lookup.
pub async fn resolve_address(
    geocoder: Option<&dyn ReverseGeocoder>,
    latitude: f64,
    longitude: f64,
    fallback: &str,
) -> String {
    let Some(geocoder) = geocoder else {
        log::debug!("Geocoding disabled, using fallback address");
        return fallback.to_string();
    };

    match geocoder.reverse(latitude, longitude).await {
        Ok(address) if !address.trim().is_empty() => address,
        Ok(_) => {
            log::warn!("{} returned an empty address", geocoder.name());
            fallback.to_string()
        }
        Err(e) => {
            log::warn!("{} lookup failed: {e:#}", geocoder.name());
            fallback.to_string()
        }
    }
}

/// Resolve the weather, substituting no icon and `"N/A"` for a skipped or failed lookup.
pub async fn resolve_weather(
    provider: Option<&dyn WeatherProvider>,
    latitude: f64,
    longitude: f64,
) -> WeatherReport {
    let Some(provider) = provider else {
        log::debug!("Weather disabled, using N/A");
        return WeatherReport::unavailable();
    };

    match provider.current(latitude, longitude).await {
        Ok(report) => report,
        Err(e) => {
            log::warn!("{} lookup failed: {e:#}", provider.name());
            WeatherReport::unavailable()
        }
    }
}

/// Run both lookups concurrently and merge them into a [`ResolvedContext`].
pub async fn resolve_context(
    geocoder: Option<&dyn ReverseGeocoder>,
    weather: Option<&dyn WeatherProvider>,
    latitude: f64,
    longitude: f64,
    fallback_address: &str,
) -> ResolvedContext {
    let (address, report) = tokio::join!(
        resolve_address(geocoder, latitude, longitude, fallback_address),
        resolve_weather(weather, latitude, longitude),
    );

    ResolvedContext {
        address,
        weather_icon: report.icon,
        temperature_display: report.temperature_display,
    }
}
