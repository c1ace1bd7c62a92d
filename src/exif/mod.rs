//! EXIF GPS and timestamp embedding, plus read-back.
//!
//! - [`embed_exif`] writes GPS latitude/longitude with hemisphere
//!   references and, when the date and time parse, the three timestamp tags
//!   into an encoded image, carrying over the source's other tags.
//! - [`read_geotag`] reads those fields back from a file.
//!
//! Coordinates are stored as degrees, minutes and seconds rationals (see
//! [`decimal_to_dms`]); the sign lives only in the `N`/`S` and `E`/`W`
//! reference tags.

mod reader;
mod writer;

pub use reader::{GeoTagData, read_geotag};
pub use writer::{
    Dms, EXIF_TIMESTAMP_FORMAT, EmbedReport, GeoStamp, INPUT_TIMESTAMP_FORMAT, decimal_to_dms, dms_to_decimal,
    embed_exif, geo_tags, has_exif, hemisphere_refs, load_existing_metadata, parse_timestamp, source_icc_profile,
};
