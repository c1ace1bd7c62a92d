use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::ReverseGeocoder;
use crate::config::GeocodingConfig;

/// Reverse geocoder backed by a Nominatim `/reverse` endpoint.
pub struct NominatimGeocoder {
    base_url: String,
    zoom: u8,
    field_priority: Vec<String>,
    client: Client,
}

/// The subset of a Nominatim `jsonv2` reverse response used for the address line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseResponse {
    /// Structured address; values are strings but are kept as JSON to tolerate
    /// unexpected shapes.
    pub address: Option<serde_json::Map<String, serde_json::Value>>,
    pub display_name: Option<String>,
    pub name: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build geocoding HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            zoom: config.zoom,
            field_priority: config.field_priority.clone(),
            client,
        })
    }

    fn request_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}?format=jsonv2&lat={latitude}&lon={longitude}&zoom={}&addressdetails=1",
            self.base_url, self.zoom
        )
    }
}

#[async_trait::async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "Nominatim"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String> {
        let resp = self
            .client
            .get(self.request_url(latitude, longitude))
            .send()
            .await
            .context("Nominatim request failed")?;

        let status = resp.status();
        let text = resp.text().await.context("Failed to read Nominatim response")?;

        if !status.is_success() {
            anyhow::bail!("Nominatim error ({}): {}", status, text);
        }

        let parsed: ReverseResponse =
            serde_json::from_str(&text).context("Failed to parse Nominatim response JSON")?;

        format_address(&parsed, &self.field_priority).context("No address in Nominatim response")
    }
}

/// Build the card's address line from a reverse-geocoding response.
///
/// Every field named in `priority` that is present and non-blank is kept, in
/// priority order, and joined with `", "`. A value identical to the one kept
/// just before it is dropped (city-states report the same name twice). Without
/// any structured field the free-text `display_name` is used, then `name`.
pub fn format_address(resp: &ReverseResponse, priority: &[String]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(ref address) = resp.address {
        for field in priority {
            let Some(value) = address.get(field).and_then(|v| v.as_str()) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() || parts.last() == Some(&value) {
                continue;
            }
            parts.push(value);
        }
    }

    if !parts.is_empty() {
        return Some(parts.join(", "));
    }

    [resp.display_name.as_deref(), resp.name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn priority() -> Vec<String> {
        Config::default().geocoding.field_priority
    }

    fn parse(json: &str) -> ReverseResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn concatenates_every_present_field_in_priority_order() {
        let resp = parse(
            r#"{"address": {"country": "France", "city": "Paris", "road": "Rue de Rivoli",
                "state": "Île-de-France", "postcode": "75001"}}"#,
        );
        assert_eq!(
            format_address(&resp, &priority()).as_deref(),
            Some("Rue de Rivoli, Paris, Île-de-France, France")
        );
    }

    #[test]
    fn drops_repeated_adjacent_values() {
        let resp = parse(r#"{"address": {"city": "Berlin", "state": "Berlin", "country": "Deutschland"}}"#);
        assert_eq!(
            format_address(&resp, &priority()).as_deref(),
            Some("Berlin, Deutschland")
        );
    }

    #[test]
    fn skips_blank_and_non_string_fields() {
        let resp = parse(r#"{"address": {"road": "  ", "town": 42, "country": "Chile"}}"#);
        assert_eq!(format_address(&resp, &priority()).as_deref(), Some("Chile"));
    }

    #[test]
    fn falls_back_to_display_name_then_name() {
        let resp = parse(r#"{"address": {"postcode": "1000"}, "display_name": "Somewhere, Earth", "name": "Spot"}"#);
        assert_eq!(format_address(&resp, &priority()).as_deref(), Some("Somewhere, Earth"));

        let resp = parse(r#"{"name": "Lonely Rock"}"#);
        assert_eq!(format_address(&resp, &priority()).as_deref(), Some("Lonely Rock"));
    }

    #[test]
    fn nothing_usable_yields_none() {
        let resp = parse(r#"{"error": "Unable to geocode"}"#);
        assert_eq!(format_address(&resp, &priority()), None);
    }

    #[test]
    fn priority_list_is_configurable() {
        let resp = parse(r#"{"address": {"road": "Via Roma", "city": "Torino"}}"#);
        let custom = vec!["city".to_string(), "road".to_string()];
        assert_eq!(format_address(&resp, &custom).as_deref(), Some("Torino, Via Roma"));
    }

    #[test]
    fn request_url_carries_zoom_and_detail_flag() {
        let geocoder = NominatimGeocoder::new(&Config::default().geocoding).unwrap();
        let url = geocoder.request_url(12.5, -3.25);
        assert!(url.starts_with("https://nominatim.openstreetmap.org/reverse?"));
        assert!(url.contains("lat=12.5"));
        assert!(url.contains("lon=-3.25"));
        assert!(url.contains("zoom=18"));
        assert!(url.contains("addressdetails=1"));
    }
}
