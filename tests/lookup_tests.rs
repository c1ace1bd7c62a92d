//! HTTP lookups against a local one-shot server.

use geotag_card::config::Config;
use geotag_card::lookup::{
    NominatimGeocoder, OpenMeteoWeather, ResolvedContext, ReverseGeocoder, WeatherIcon, WeatherProvider,
    resolve_context,
};
use geotag_card::pipeline::fetch_static_map;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve a single HTTP response and return the server's base URL.
async fn serve_once(status: &str, content_type: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 8192];
        let _ = socket.read(&mut request).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}")
}

async fn serve_json(status: &str, body: &str) -> String {
    serve_once(status, "application/json", body.as_bytes().to_vec()).await
}

/// A port nothing listens on.
const CLOSED: &str = "http://127.0.0.1:9";

fn geocoder(base: &str) -> NominatimGeocoder {
    let mut config = Config::default().geocoding;
    config.base_url = format!("{base}/reverse");
    config.timeout_secs = 2;
    NominatimGeocoder::new(&config).unwrap()
}

fn weather(base: &str) -> OpenMeteoWeather {
    let mut config = Config::default().weather;
    config.base_url = format!("{base}/v1/forecast");
    config.timeout_secs = 2;
    OpenMeteoWeather::new(&config).unwrap()
}

async fn resolve(geocoder: &NominatimGeocoder, weather: &OpenMeteoWeather, lat: f64, lon: f64) -> ResolvedContext {
    let geocoder: &dyn ReverseGeocoder = geocoder;
    let weather: &dyn WeatherProvider = weather;
    resolve_context(Some(geocoder), Some(weather), lat, lon, "Unknown Location").await
}

// ── Nominatim ────────────────────────────────────────────────────────

#[tokio::test]
async fn nominatim_address_is_built_from_fields() {
    let base = serve_json(
        "200 OK",
        r#"{
            "display_name": "10, Rue de Rivoli, Paris, Île-de-France, France",
            "address": {
                "house_number": "10",
                "road": "Rue de Rivoli",
                "suburb": "Paris 4e Arrondissement",
                "city": "Paris",
                "state": "Île-de-France",
                "country": "France",
                "country_code": "fr"
            }
        }"#,
    )
    .await;

    let address = geocoder(&base).reverse(48.8556, 2.3603).await.unwrap();
    assert_eq!(
        address,
        "Rue de Rivoli, Paris 4e Arrondissement, Paris, Île-de-France, France"
    );
}

#[tokio::test]
async fn nominatim_display_name_is_the_fallback() {
    let base = serve_json("200 OK", r#"{"display_name": "Somewhere at sea"}"#).await;
    let address = geocoder(&base).reverse(0.0, -30.0).await.unwrap();
    assert_eq!(address, "Somewhere at sea");
}

#[tokio::test]
async fn nominatim_error_response_is_an_error() {
    let base = serve_json("500 Internal Server Error", r#"{"error": "boom"}"#).await;
    let err = geocoder(&base).reverse(1.0, 1.0).await.unwrap_err();
    assert!(err.to_string().contains("Nominatim error"));
}

#[tokio::test]
async fn nominatim_without_address_is_an_error() {
    let base = serve_json("200 OK", r#"{"error": "Unable to geocode"}"#).await;
    assert!(geocoder(&base).reverse(1.0, 1.0).await.is_err());
}

// ── Open-Meteo ───────────────────────────────────────────────────────

#[tokio::test]
async fn open_meteo_reading_is_mapped() {
    let base = serve_json(
        "200 OK",
        r#"{"latitude": 52.5, "current_weather": {"temperature": 21.3, "windspeed": 9.4, "weathercode": 61}}"#,
    )
    .await;

    let report = weather(&base).current(52.52, 13.41).await.unwrap();
    assert_eq!(report.icon, Some(WeatherIcon::Rain));
    assert_eq!(report.temperature_display, "21.3°C");
}

#[tokio::test]
async fn open_meteo_unmapped_code_has_no_icon() {
    let base = serve_json("200 OK", r#"{"current_weather": {"temperature": -3.0, "weathercode": 71}}"#).await;
    let report = weather(&base).current(60.0, 25.0).await.unwrap();
    assert_eq!(report.icon, None);
    assert_eq!(report.temperature_display, "-3.0°C");
}

#[tokio::test]
async fn open_meteo_error_response_is_an_error() {
    let base = serve_json("429 Too Many Requests", r#"{"reason": "rate limited"}"#).await;
    assert!(weather(&base).current(0.0, 0.0).await.is_err());
}

// ── resolve_context ──────────────────────────────────────────────────

#[tokio::test]
async fn context_combines_both_lookups() {
    let geo = serve_json("200 OK", r#"{"address": {"city": "Berlin", "state": "Berlin", "country": "Germany"}}"#).await;
    let wx = serve_json("200 OK", r#"{"current_weather": {"temperature": 18.0, "weathercode": 0}}"#).await;

    let geocoder = geocoder(&geo);
    let weather = weather(&wx);
    let context = resolve(&geocoder, &weather, 52.52, 13.405).await;

    assert_eq!(
        context,
        ResolvedContext {
            address: "Berlin, Germany".to_string(),
            weather_icon: Some(WeatherIcon::Clear),
            temperature_display: "18.0°C".to_string(),
        }
    );
}

#[tokio::test]
async fn unreachable_services_yield_fallbacks() {
    let geocoder = geocoder(CLOSED);
    let weather = weather(CLOSED);
    let context = resolve(&geocoder, &weather, 12.34, 56.78).await;
    assert_eq!(context, ResolvedContext::fallback("Unknown Location"));
}

#[tokio::test]
async fn malformed_json_yields_fallbacks() {
    let geo = serve_json("200 OK", "<html>not json</html>").await;
    let wx = serve_json("200 OK", "{\"current_weather\": 5}").await;

    let geocoder = geocoder(&geo);
    let weather = weather(&wx);
    let context = resolve(&geocoder, &weather, 1.0, 2.0).await;
    assert_eq!(context, ResolvedContext::fallback("Unknown Location"));
}

// ── static map ───────────────────────────────────────────────────────

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([170, 210, 170, 255]));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn static_map_gets_a_pin() {
    let base = serve_once("200 OK", "image/png", png(120, 80)).await;
    let config = Config::default().map;
    let client = reqwest::Client::new();

    let template = format!("{base}/static?center={{lat}},{{lon}}&zoom={{zoom}}");
    let map = fetch_static_map(&client, &template, &config, 10.0, 20.0).await.unwrap();

    assert_eq!(map.dimensions(), (120, 80));
    assert!(map.pixels().any(|p| *p == Rgba([220, 40, 40, 255])));
}

#[tokio::test]
async fn static_map_error_status_is_an_error() {
    let base = serve_once("404 Not Found", "text/plain", b"no tiles".to_vec()).await;
    let config = Config::default().map;
    let client = reqwest::Client::new();
    let template = format!("{base}/static");
    assert!(fetch_static_map(&client, &template, &config, 0.0, 0.0).await.is_err());
}

#[tokio::test]
async fn static_map_garbage_is_an_error() {
    let base = serve_once("200 OK", "image/png", b"not an image".to_vec()).await;
    let config = Config::default().map;
    let client = reqwest::Client::new();
    let err = fetch_static_map(&client, &format!("{base}/static"), &config, 0.0, 0.0)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("decode"));
}
