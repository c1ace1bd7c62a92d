use anyhow::{Context, Result};
use nom_exif::*;
use serde::Serialize;
use std::path::Path;

/// Geotag-related EXIF fields read back from an image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoTagData {
    pub has_gps: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude_ref: Option<char>,
    pub longitude_ref: Option<char>,
    pub date_time_original: Option<String>,
    pub modify_date: Option<String>,
    pub create_date: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
}

/// Read GPS, timestamp and camera fields from an image file.
///
/// Files without EXIF, or in containers the parser does not handle, yield
/// an empty [`GeoTagData`].
pub fn read_geotag(path: &Path) -> Result<GeoTagData> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(GeoTagData::default());
        }
    };

    // Parse GPS info before converting to Exif (consumes the iterator)
    let gps_info = iter.parse_gps_info().ok().flatten();
    let exif: Exif = iter.into();

    let mut data = GeoTagData {
        date_time_original: exif.get(ExifTag::DateTimeOriginal).and_then(entry_to_string),
        modify_date: exif.get(ExifTag::ModifyDate).and_then(entry_to_string),
        create_date: exif.get(ExifTag::CreateDate).and_then(entry_to_string),
        make: exif.get(ExifTag::Make).and_then(entry_to_string),
        model: exif.get(ExifTag::Model).and_then(entry_to_string),
        ..GeoTagData::default()
    };

    if let Some(gps) = gps_info {
        data.has_gps = true;
        data.latitude_ref = Some(gps.latitude_ref);
        data.longitude_ref = Some(gps.longitude_ref);
        data.latitude = Some(latlng_to_decimal(&gps.latitude, gps.latitude_ref));
        data.longitude = Some(latlng_to_decimal(&gps.longitude, gps.longitude_ref));
    }

    Ok(data)
}

fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = val.to_string();
    let s = s.trim().trim_matches('"').trim_end_matches('\0').to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let part = |r: &URational| if r.1 == 0 { 0.0 } else { r.0 as f64 / r.1 as f64 };
    let coord = part(&latlng.0) + part(&latlng.1) / 60.0 + part(&latlng.2) / 3600.0;

    if reference == 'S' || reference == 'W' { -coord } else { coord }
}
