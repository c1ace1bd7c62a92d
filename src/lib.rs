//! # geotag-card
//!
//! Stamp a photo with a location: a "geotag card" (map thumbnail, address,
//! date/time, coordinates, current weather) is burned into the pixels, and
//! matching EXIF GPS and date tags are embedded in the output.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is through the pipeline module, which
//! handles the full lookup → render → composite → EXIF flow:
//!
//! ```rust,no_run
//! use geotag_card::config::Config;
//! use geotag_card::pipeline::{GeoRequest, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load config from file (lookup endpoints, fonts, layout, etc.)
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let pipeline = Pipeline::from_config(config)?;
//!
//!     let photo = std::fs::read("photo.jpg")?;
//!     let map = std::fs::read("map.png")?;
//!
//!     let output = pipeline
//!         .run(&GeoRequest {
//!             image: &photo,
//!             map_image: Some(&map),
//!             latitude: 35.6586,
//!             longitude: 139.7454,
//!             date: "2024-04-06",
//!             time: "14:05",
//!         })
//!         .await?;
//!
//!     println!("Address: {}", output.context.address);
//!     println!("Map: {:?}", output.render.map);
//!     std::fs::write("photo_geotagged.jpg", &output.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! Each stage can be driven on its own:
//!
//! ```rust,no_run
//! use geotag_card::card::{CardContent, render_card};
//! use geotag_card::compose::composite;
//! use geotag_card::config::Config;
//! use geotag_card::exif::{GeoStamp, embed_exif};
//! use geotag_card::lookup::ResolvedContext;
//! use geotag_card::pipeline::{ImageKind, encode_image};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let source_bytes = std::fs::read("photo.png")?;
//!     let source = image::load_from_memory(&source_bytes)?;
//!
//!     // 1. Render the card for the photo's dimensions
//!     let context = ResolvedContext::fallback("Shibuya, Tokyo, Japan");
//!     let content = CardContent {
//!         latitude: 35.6595,
//!         longitude: 139.7005,
//!         date: "2024-04-06",
//!         time: "14:05",
//!         context: &context,
//!         map: None,
//!     };
//!     let card = render_card(source.width(), source.height(), &content, &config.card, None);
//!
//!     // 2. Composite and re-encode
//!     let flattened = composite(&source, &card.overlay, card.anchor);
//!     let encoded = encode_image(&flattened, ImageKind::Png, config.output.jpeg_quality)?;
//!
//!     // 3. Embed GPS and timestamps
//!     let stamp = GeoStamp { latitude: 35.6595, longitude: 139.7005, date: "2024-04-06", time: "14:05" };
//!     let (bytes, report) = embed_exif(encoded, ImageKind::Png, &source_bytes, &stamp)?;
//!     println!("Timestamp written: {:?}", report.timestamp);
//!     std::fs::write("photo_geotagged.png", bytes)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Metadata Written |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF (APP1), ICC profile kept |
//! | PNG (`.png`) | EXIF in eXIf chunk, ICC profile kept |
//! | WebP (`.webp`) | EXIF in RIFF |
//! | TIFF (`.tif`, `.tiff`) | EXIF |
//!
//! ## Modules
//!
//! - [`card`]: layout planning and card rendering
//! - [`compose`]: alpha compositing of the card onto the photo
//! - [`config`]: configuration types and loading/saving
//! - [`exif`]: EXIF GPS/timestamp writing and read-back
//! - [`lookup`]: reverse geocoding and weather lookups with fallbacks
//! - [`pipeline`]: the end-to-end request pipeline and format handling

pub mod card;
pub mod compose;
pub mod config;
pub mod exif;
pub mod lookup;
pub mod pipeline;
