use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{WeatherIcon, WeatherProvider, WeatherReport, format_temperature};
use crate::config::{IconRule, WeatherConfig};

/// Current-weather lookup backed by the Open-Meteo forecast API.
pub struct OpenMeteoWeather {
    base_url: String,
    icon_table: Vec<IconRule>,
    client: Client,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub weathercode: u16,
}

impl OpenMeteoWeather {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build weather HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            icon_table: config.icon_table.clone(),
            client,
        })
    }

    fn request_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?latitude={latitude}&longitude={longitude}&current_weather=true",
            self.base_url
        )
    }

    /// Convert a parsed reading into what the card displays.
    pub fn report(&self, current: &CurrentWeather) -> WeatherReport {
        WeatherReport {
            icon: WeatherIcon::from_code(current.weathercode, &self.icon_table),
            temperature_display: format_temperature(current.temperature),
        }
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenMeteoWeather {
    fn name(&self) -> &str {
        "Open-Meteo"
    }

    async fn current(&self, latitude: f64, longitude: f64) -> Result<WeatherReport> {
        let resp = self
            .client
            .get(self.request_url(latitude, longitude))
            .send()
            .await
            .context("Open-Meteo request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read Open-Meteo response")?;

        if !status.is_success() {
            anyhow::bail!("Open-Meteo error ({}): {}", status, text);
        }

        let parsed: ForecastResponse =
            serde_json::from_str(&text).context("Failed to parse Open-Meteo response JSON")?;
        let current = parsed
            .current_weather
            .context("No current_weather in Open-Meteo response")?;

        let report = self.report(&current);
        log::debug!(
            "Weather code {} -> {:?}, {}",
            current.weathercode,
            report.icon,
            report.temperature_display
        );
        Ok(report)
    }
}
