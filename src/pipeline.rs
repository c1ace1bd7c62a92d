use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use reqwest::Client;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::card::{self, CardContent, MapImage, RenderReport};
use crate::compose::composite;
use crate::config::{Config, MapConfig};
use crate::exif::{EmbedReport, GeoStamp, embed_exif};
use crate::lookup::{self, NominatimGeocoder, OpenMeteoWeather, ResolvedContext, ReverseGeocoder, WeatherProvider};

/// Container formats that can be decoded, re-encoded, and carry EXIF.
///
/// The output is always written in the same container as the input.
///
/// # Example
///
/// ```rust
/// use geotag_card::pipeline::ImageKind;
/// use std::path::Path;
///
/// assert_eq!(ImageKind::from_path(Path::new("photo.JPG")), Some(ImageKind::Jpeg));
/// assert_eq!(ImageKind::from_path(Path::new("photo.heic")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// JPEG: EXIF in APP1, ICC in APP2
    Jpeg,
    /// PNG: EXIF in an `eXIf` chunk
    Png,
    /// WebP: EXIF in the RIFF `EXIF` chunk
    WebP,
    /// TIFF: EXIF in IFD0
    Tiff,
}

impl ImageKind {
    /// Determine the image kind from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Map a decoded format to a kind. Formats without metadata support yield `None`.
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    /// Canonical file extension, used when naming output files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Tiff => "tif",
        }
    }
}

/// One photo plus the location and time to stamp onto it.
#[derive(Debug, Clone, Copy)]
pub struct GeoRequest<'a> {
    /// Encoded source image.
    pub image: &'a [u8],
    /// Encoded map screenshot. Without one, a static map may be fetched
    /// (when configured) or a placeholder is drawn.
    pub map_image: Option<&'a [u8]>,
    pub latitude: f64,
    pub longitude: f64,
    /// `YYYY-MM-DD`
    pub date: &'a str,
    /// `HH:MM`
    pub time: &'a str,
}

impl GeoRequest<'_> {
    /// Reject coordinates that are non-finite or out of range.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            anyhow::bail!("Latitude {} is outside [-90, 90]", self.latitude);
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            anyhow::bail!("Longitude {} is outside [-180, 180]", self.longitude);
        }
        if self.image.is_empty() {
            anyhow::bail!("Input image is empty");
        }
        Ok(())
    }
}

/// The result of running one [`GeoRequest`] through the pipeline.
///
/// `bytes` holds the finished image; the other fields describe how it was
/// produced and serialize to the CLI's `--json` report.
#[derive(Debug, Clone, Serialize)]
pub struct GeoOutput {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub context: ResolvedContext,
    pub render: RenderReport,
    pub embed: EmbedReport,
}

/// Geotagging pipeline: lookups → card → composite → encode → EXIF.
///
/// Holds the configured lookup backends; each [`run`](Pipeline::run) is
/// otherwise independent and shares no state with other runs.
///
/// # Example
///
/// ```rust,no_run
/// use geotag_card::config::Config;
/// use geotag_card::pipeline::{GeoRequest, Pipeline};
///
/// # async fn example() -> anyhow::Result<()> {
/// let pipeline = Pipeline::from_config(Config::default())?;
/// let photo = std::fs::read("photo.jpg")?;
///
/// let output = pipeline
///     .run(&GeoRequest {
///         image: &photo,
///         map_image: None,
///         latitude: 48.8566,
///         longitude: 2.3522,
///         date: "2024-06-01",
///         time: "18:30",
///     })
///     .await?;
/// std::fs::write("photo_geotagged.jpg", &output.bytes)?;
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    config: Config,
    geocoder: Option<Box<dyn ReverseGeocoder>>,
    weather: Option<Box<dyn WeatherProvider>>,
    map_client: Option<Client>,
}

impl Pipeline {
    /// Build the pipeline with the HTTP lookups enabled in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let geocoder: Option<Box<dyn ReverseGeocoder>> = if config.geocoding.enabled {
            Some(Box::new(NominatimGeocoder::new(&config.geocoding)?))
        } else {
            None
        };
        let weather: Option<Box<dyn WeatherProvider>> = if config.weather.enabled {
            Some(Box::new(OpenMeteoWeather::new(&config.weather)?))
        } else {
            None
        };
        let map_client = match config.map.static_map_url {
            Some(_) => Some(
                Client::builder()
                    .timeout(Duration::from_secs(config.map.timeout_secs))
                    .build()
                    .context("Failed to build static map HTTP client")?,
            ),
            None => None,
        };

        log::debug!("Enabled lookups: {:?}", config.enabled_lookups());
        Ok(Self {
            config,
            geocoder,
            weather,
            map_client,
        })
    }

    /// Build the pipeline with caller-supplied lookup backends and no static map fetch.
    pub fn with_lookups(
        config: Config,
        geocoder: Option<Box<dyn ReverseGeocoder>>,
        weather: Option<Box<dyn WeatherProvider>>,
    ) -> Self {
        Self {
            config,
            geocoder,
            weather,
            map_client: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process one request.
    ///
    /// Lookup, asset, and date/time problems are absorbed (see
    /// [`GeoOutput::render`] and [`GeoOutput::embed`]). Invalid coordinates,
    /// an undecodable or unsupported source image, and encode or metadata
    /// write failures are returned as errors; no partial output is produced.
    pub async fn run(&self, request: &GeoRequest<'_>) -> Result<GeoOutput> {
        request.validate()?;

        let format = image::guess_format(request.image).context("Unrecognized image format")?;
        let kind = ImageKind::from_format(format)
            .with_context(|| format!("Unsupported image format {format:?}: only JPEG, PNG, WebP and TIFF carry EXIF"))?;
        let source = image::load_from_memory_with_format(request.image, format)
            .context("Failed to decode source image")?;
        let (width, height) = (source.width(), source.height());
        log::info!("Decoded {kind:?} {width}x{height}");

        let context = lookup::resolve_context(
            self.geocoder.as_deref(),
            self.weather.as_deref(),
            request.latitude,
            request.longitude,
            &self.config.geocoding.fallback_address,
        )
        .await;
        log::info!("Address: {} | Weather: {}", context.address, context.temperature_display);

        let fetched = match request.map_image {
            Some(_) => None,
            None => self.fetch_map(request.latitude, request.longitude).await,
        };
        let map = match (request.map_image, fetched.as_ref()) {
            (Some(bytes), _) => Some(MapImage::Encoded(bytes)),
            (None, Some(image)) => Some(MapImage::Decoded(image)),
            (None, None) => None,
        };

        let content = CardContent {
            latitude: request.latitude,
            longitude: request.longitude,
            date: request.date,
            time: request.time,
            context: &context,
            map,
        };
        let icon_dir = self.config.weather.icon_dir.as_deref().map(Path::new);
        let card = card::render_card(width, height, &content, &self.config.card, icon_dir);

        let flattened = composite(&source, &card.overlay, card.anchor);
        let encoded = encode_image(&flattened, kind, self.config.output.jpeg_quality)?;

        let stamp = GeoStamp {
            latitude: request.latitude,
            longitude: request.longitude,
            date: request.date,
            time: request.time,
        };
        let (bytes, embed) = embed_exif(encoded, kind, request.image, &stamp)?;
        log::info!("Wrote {} bytes ({} tags carried over)", bytes.len(), embed.preserved_tags);

        Ok(GeoOutput {
            bytes,
            kind,
            width,
            height,
            context,
            render: card.report,
            embed,
        })
    }

    /// Download the configured static map. Any failure is logged and yields `None`.
    async fn fetch_map(&self, latitude: f64, longitude: f64) -> Option<RgbaImage> {
        let (Some(client), Some(template)) = (&self.map_client, &self.config.map.static_map_url) else {
            return None;
        };
        match fetch_static_map(client, template, &self.config.map, latitude, longitude).await {
            Ok(map) => Some(map),
            Err(e) => {
                log::warn!("Static map unavailable: {e:#}");
                None
            }
        }
    }
}

/// Fill the `{lat}`, `{lon}`, `{zoom}`, `{width}` and `{height}` placeholders of a map URL template.
pub fn static_map_url(template: &str, config: &MapConfig, latitude: f64, longitude: f64) -> String {
    template
        .replace("{lat}", &latitude.to_string())
        .replace("{lon}", &longitude.to_string())
        .replace("{zoom}", &config.zoom.to_string())
        .replace("{width}", &config.width.to_string())
        .replace("{height}", &config.height.to_string())
}

/// Fetch a static map image and mark the requested location at its center.
pub async fn fetch_static_map(
    client: &Client,
    template: &str,
    config: &MapConfig,
    latitude: f64,
    longitude: f64,
) -> Result<RgbaImage> {
    let url = static_map_url(template, config, latitude, longitude);
    let resp = client.get(&url).send().await.context("Static map request failed")?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("Static map error ({status})");
    }
    let body = resp.bytes().await.context("Failed to read static map response")?;

    let mut map = image::load_from_memory(&body)
        .context("Failed to decode static map")?
        .to_rgba8();
    let (w, h) = map.dimensions();
    let size = (w.min(h) as f32 * 0.1).max(6.0);
    card::shapes::draw_pin(&mut map, w as f32 / 2.0, h as f32 / 2.0, size);
    Ok(map)
}

/// Encode `image` in the container for `kind`.
///
/// JPEG and WebP are written as 8-bit RGB; PNG and TIFF keep the image's depth.
pub fn encode_image(image: &DynamicImage, kind: ImageKind, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match kind {
        ImageKind::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
            image
                .to_rgb8()
                .write_with_encoder(encoder)
                .context("Failed to encode JPEG")?;
        }
        ImageKind::WebP => {
            image
                .to_rgb8()
                .write_to(&mut buf, ImageFormat::WebP)
                .context("Failed to encode WebP")?;
        }
        ImageKind::Png | ImageKind::Tiff => {
            image
                .write_to(&mut buf, kind.image_format())
                .with_context(|| format!("Failed to encode {kind:?}"))?;
        }
    }
    Ok(buf.into_inner())
}

/// Stamp a photo in one call: card overlay plus EXIF GPS and timestamp tags.
///
/// Builds a [`Pipeline`] from `config` and returns only the output bytes.
pub async fn embed_metadata(
    input_image: &[u8],
    latitude: f64,
    longitude: f64,
    date: &str,
    time: &str,
    map_image: Option<&[u8]>,
    config: &Config,
) -> Result<Vec<u8>> {
    let pipeline = Pipeline::from_config(config.clone())?;
    let output = pipeline
        .run(&GeoRequest {
            image: input_image,
            map_image,
            latitude,
            longitude,
            date,
            time,
        })
        .await?;
    Ok(output.bytes)
}
