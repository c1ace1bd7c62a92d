use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use img_parts::{Bytes, DynImage, ImageEXIF, ImageICC};
use little_exif::exif_tag::ExifTag;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use crate::pipeline::ImageKind;

/// Input date and time layout, e.g. `2024-01-01 12:34`.
pub const INPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";
/// EXIF date/time layout, e.g. `2024:01:01 12:34:00`.
pub const EXIF_TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

// Tags describing the old file's layout; carrying them over would point
// into the wrong bytes of the re-encoded image.
const STRUCTURAL_TAGS: &[u16] = &[
    0x0100, // ImageWidth
    0x0101, // ImageHeight
    0x0102, // BitsPerSample
    0x0103, // Compression
    0x0106, // PhotometricInterpretation
    0x0111, // StripOffsets
    0x0115, // SamplesPerPixel
    0x0116, // RowsPerStrip
    0x0117, // StripByteCounts
    0x011C, // PlanarConfiguration
    0x0140, // ColorMap
    0x0144, // TileOffsets
    0x0145, // TileByteCounts
    0x0201, // ThumbnailOffset
    0x0202, // ThumbnailLength
    0x8769, // ExifOffset
    0x8825, // GPSInfo
    0xA005, // InteropOffset
];

// Tag IDs of the GPS IFD. The interop IFD reuses 0x0001 and 0x0002, which
// goes with the dropped InteropOffset anyway.
const GPS_TAG_IDS: RangeInclusive<u16> = 0x0000..=0x001F;

// Serializes the panic hook swap in `guarded`.
static HOOK_LOCK: Mutex<()> = Mutex::new(());

// Always rewritten from the request, or left out when it does not parse.
const TIMESTAMP_TAGS: &[u16] = &[
    0x0132, // ModifyDate
    0x9003, // DateTimeOriginal
    0x9004, // CreateDate
];

/// A coordinate in whole degrees, whole minutes and hundredths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dms {
    pub degrees: u32,
    pub minutes: u32,
    pub centiseconds: u32,
}

impl Dms {
    /// The EXIF rational triple `deg/1, min/1, centisec/100`.
    pub fn to_rationals(self) -> Vec<uR64> {
        vec![
            uR64 { nominator: self.degrees, denominator: 1 },
            uR64 { nominator: self.minutes, denominator: 1 },
            uR64 { nominator: self.centiseconds, denominator: 100 },
        ]
    }

    /// Unsigned decimal degrees.
    pub fn to_decimal(self) -> f64 {
        self.degrees as f64 + self.minutes as f64 / 60.0 + self.centiseconds as f64 / 360_000.0
    }
}

/// Convert decimal degrees to degrees/minutes/seconds of the absolute value.
///
/// Degrees and minutes truncate toward zero; seconds keep two decimals,
/// also truncated. The sign is carried by the hemisphere reference instead.
pub fn decimal_to_dms(value: f64) -> Dms {
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes = ((abs - degrees) * 60.0).trunc();
    let seconds = (abs - degrees) * 3600.0 - minutes * 60.0;
    // Nudge past representation error (23.999999 is really 24.00).
    let centiseconds = (seconds * 100.0 + 1e-6).trunc().max(0.0);

    Dms {
        degrees: degrees as u32,
        minutes: minutes as u32,
        centiseconds: centiseconds as u32,
    }
}

/// Signed decimal degrees from a triple and its hemisphere reference.
pub fn dms_to_decimal(dms: Dms, reference: &str) -> f64 {
    match reference.trim_end_matches('\0').trim() {
        "S" | "W" => -dms.to_decimal(),
        _ => dms.to_decimal(),
    }
}

/// `("N" | "S", "E" | "W")` by sign; zero counts as north and east.
pub fn hemisphere_refs(latitude: f64, longitude: f64) -> (&'static str, &'static str) {
    (
        if latitude >= 0.0 { "N" } else { "S" },
        if longitude >= 0.0 { "E" } else { "W" },
    )
}

/// Parse `date` (`YYYY-MM-DD`) and `time` (`HH:MM`) into the EXIF timestamp
/// `YYYY:MM:DD HH:MM:00`. Returns `None` for anything that does not parse.
pub fn parse_timestamp(date: &str, time: &str) -> Option<String> {
    let combined = format!("{} {}", date.trim(), time.trim());
    match NaiveDateTime::parse_from_str(&combined, INPUT_TIMESTAMP_FORMAT) {
        Ok(dt) => Some(dt.format(EXIF_TIMESTAMP_FORMAT).to_string()),
        Err(e) => {
            log::debug!("Timestamp {combined:?} rejected: {e}");
            None
        }
    }
}

/// Location and time to stamp into an image.
#[derive(Debug, Clone, Copy)]
pub struct GeoStamp<'a> {
    pub latitude: f64,
    pub longitude: f64,
    pub date: &'a str,
    pub time: &'a str,
}

/// What [`embed_exif`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbedReport {
    pub latitude_ref: String,
    pub longitude_ref: String,
    /// The EXIF timestamp written to all three date tags, if the input parsed.
    pub timestamp: Option<String>,
    /// Tags carried over from the source image.
    pub preserved_tags: usize,
    pub icc_profile: bool,
}

/// The little_exif container type for an image kind.
fn file_extension(kind: ImageKind) -> FileExtension {
    match kind {
        ImageKind::Jpeg => FileExtension::JPEG,
        ImageKind::Png => FileExtension::PNG { as_zTXt_chunk: false },
        ImageKind::WebP => FileExtension::WEBP,
        ImageKind::Tiff => FileExtension::TIFF,
    }
}

/// Run a little_exif call with panics turned into `None` and the panic
/// message suppressed.
///
/// The hook is process-global, so concurrent callers take turns; otherwise
/// one caller could restore the silent hook another one installed.
fn guarded<T>(f: impl FnOnce() -> T) -> Option<T> {
    let _lock = HOOK_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = catch_unwind(AssertUnwindSafe(f));
    std::panic::set_hook(prev_hook);
    result.ok()
}

/// Load the EXIF block of `source`. Returns `None` when there is none or it
/// cannot be parsed.
pub fn load_existing_metadata(source: &[u8], kind: ImageKind) -> Option<Metadata> {
    let buffer = source.to_vec();
    match guarded(|| Metadata::new_from_vec(&buffer, file_extension(kind))) {
        Some(Ok(m)) => {
            let count = (&m).into_iter().count();
            if count == 0 {
                log::debug!("Source has no EXIF tags");
                None
            } else {
                log::debug!("Loaded {count} existing EXIF tags");
                Some(m)
            }
        }
        Some(Err(e)) => {
            log::debug!("No readable EXIF in source: {e}");
            None
        }
        None => {
            log::debug!("little_exif panicked parsing source EXIF");
            None
        }
    }
}

/// Copy the tags worth keeping from `existing` into `target`. Returns how
/// many were copied.
///
/// Layout tags, the old timestamps and the old GPS block are dropped;
/// everything else carries over unchanged.
fn carry_over(target: &mut Metadata, existing: Option<&Metadata>) -> usize {
    let mut carried = 0;
    if let Some(existing) = existing {
        for tag in existing {
            let id = tag.as_u16();
            if STRUCTURAL_TAGS.contains(&id)
                || TIMESTAMP_TAGS.contains(&id)
                || GPS_TAG_IDS.contains(&id)
            {
                continue;
            }
            target.set_tag(tag.clone());
            carried += 1;
        }
    }
    carried
}

/// Build the tags written for `stamp`: GPS position, and the three
/// timestamps when the date and time parse.
pub fn geo_tags(stamp: &GeoStamp<'_>) -> (Vec<ExifTag>, Option<String>) {
    let (lat_ref, lon_ref) = hemisphere_refs(stamp.latitude, stamp.longitude);
    let mut tags = vec![
        ExifTag::GPSLatitudeRef(lat_ref.to_string()),
        ExifTag::GPSLatitude(decimal_to_dms(stamp.latitude).to_rationals()),
        ExifTag::GPSLongitudeRef(lon_ref.to_string()),
        ExifTag::GPSLongitude(decimal_to_dms(stamp.longitude).to_rationals()),
    ];

    let timestamp = parse_timestamp(stamp.date, stamp.time);
    if let Some(ref ts) = timestamp {
        tags.push(ExifTag::ModifyDate(ts.clone()));
        tags.push(ExifTag::DateTimeOriginal(ts.clone()));
        tags.push(ExifTag::CreateDate(ts.clone()));
    } else {
        log::warn!(
            "Date/time {:?} {:?} does not match YYYY-MM-DD HH:MM, timestamp tags skipped",
            stamp.date,
            stamp.time
        );
    }
    (tags, timestamp)
}

/// ICC profile embedded in `source`, if its container carries one.
pub fn source_icc_profile(source: &[u8]) -> Option<Bytes> {
    match DynImage::from_bytes(Bytes::copy_from_slice(source)) {
        Ok(Some(image)) => image.icc_profile(),
        _ => None,
    }
}

/// True when `bytes` already carries an EXIF block.
pub fn has_exif(bytes: &[u8]) -> bool {
    matches!(
        DynImage::from_bytes(Bytes::copy_from_slice(bytes)),
        Ok(Some(image)) if image.exif().is_some_and(|e| !e.is_empty())
    )
}

/// Attach `icc` to an encoded JPEG or PNG.
fn attach_icc_profile(encoded: Vec<u8>, icc: Bytes) -> Result<Vec<u8>> {
    let mut image = DynImage::from_bytes(Bytes::from(encoded))
        .map_err(|e| anyhow::anyhow!("Failed to parse encoded image: {e}"))?
        .context("Encoded image container not recognized")?;
    image.set_icc_profile(Some(icc));
    Ok(image.encoder().bytes().to_vec())
}

/// Write GPS and timestamp tags into `encoded`, an image of type `kind`.
///
/// Tags already present in `source` (the caller's original file) are carried
/// over, except the old GPS and timestamp tags. The source's ICC profile is
/// copied for JPEG and PNG. A malformed date or time only drops the
/// timestamp tags; the GPS tags are always written.
pub fn embed_exif(encoded: Vec<u8>, kind: ImageKind, source: &[u8], stamp: &GeoStamp<'_>) -> Result<(Vec<u8>, EmbedReport)> {
    let mut output = encoded;

    let mut icc_profile = false;
    if matches!(kind, ImageKind::Jpeg | ImageKind::Png) {
        if let Some(icc) = source_icc_profile(source) {
            output = attach_icc_profile(output, icc).context("Failed to attach ICC profile")?;
            icc_profile = true;
        }
    }

    // A TIFF's own IFD0 holds its strip layout, so it is the starting point.
    let mut metadata = match kind {
        ImageKind::Tiff => load_existing_metadata(&output, kind).unwrap_or_else(Metadata::new),
        _ => Metadata::new(),
    };
    let existing = load_existing_metadata(source, kind);
    let preserved_tags = carry_over(&mut metadata, existing.as_ref());
    let (tags, timestamp) = geo_tags(stamp);
    for tag in tags {
        metadata.set_tag(tag);
    }

    let extension = file_extension(kind);
    let written = guarded(|| metadata.write_to_vec(&mut output, extension))
        .context("little_exif panicked writing EXIF")?;
    written.context("Failed to write EXIF metadata")?;

    let (lat_ref, lon_ref) = hemisphere_refs(stamp.latitude, stamp.longitude);
    log::debug!(
        "Embedded GPS {lat_ref}/{lon_ref}, timestamp {:?}, {preserved_tags} preserved tags",
        timestamp
    );

    Ok((
        output,
        EmbedReport {
            latitude_ref: lat_ref.to_string(),
            longitude_ref: lon_ref.to_string(),
            timestamp,
            preserved_tags,
            icc_profile,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn stamp<'a>(latitude: f64, longitude: f64, date: &'a str, time: &'a str) -> GeoStamp<'a> {
        GeoStamp { latitude, longitude, date, time }
    }

    // ── decimal_to_dms ───────────────────────────────────────────────

    #[test]
    fn converts_positive_coordinates() {
        assert_eq!(
            decimal_to_dms(12.34),
            Dms { degrees: 12, minutes: 20, centiseconds: 2400 }
        );
        assert_eq!(
            decimal_to_dms(56.78),
            Dms { degrees: 56, minutes: 46, centiseconds: 4800 }
        );
    }

    #[test]
    fn negative_coordinates_use_absolute_value() {
        assert_eq!(decimal_to_dms(-33.8688), decimal_to_dms(33.8688));
        assert_eq!(decimal_to_dms(-0.5), Dms { degrees: 0, minutes: 30, centiseconds: 0 });
    }

    #[test]
    fn seconds_are_truncated_to_hundredths() {
        // 0.001° = 3.6", 0.0001234° = 0.44424"
        let dms = decimal_to_dms(10.0001234);
        assert_eq!((dms.degrees, dms.minutes, dms.centiseconds), (10, 0, 44));
    }

    #[test]
    fn extremes_convert() {
        assert_eq!(decimal_to_dms(90.0), Dms { degrees: 90, minutes: 0, centiseconds: 0 });
        assert_eq!(decimal_to_dms(-180.0), Dms { degrees: 180, minutes: 0, centiseconds: 0 });
    }

    #[test]
    fn round_trip_within_a_hundredth_of_a_second() {
        let tolerance = 1.0 / 360_000.0 + 1e-9;
        let mut value = -180.0;
        while value <= 180.0 {
            let dms = decimal_to_dms(value);
            let (_, reference) = hemisphere_refs(0.0, value);
            let back = dms_to_decimal(dms, reference);
            assert!((back - value).abs() <= tolerance, "{value} -> {dms:?} -> {back}");
            value += 0.123457;
        }
    }

    #[test]
    fn rationals_have_fixed_denominators() {
        let r = decimal_to_dms(48.8566).to_rationals();
        assert_eq!(r.len(), 3);
        assert_eq!((r[0].nominator, r[0].denominator), (48, 1));
        assert_eq!((r[1].nominator, r[1].denominator), (51, 1));
        assert_eq!(r[2].denominator, 100);
    }

    // ── hemisphere_refs ──────────────────────────────────────────────

    #[test]
    fn refs_follow_sign() {
        assert_eq!(hemisphere_refs(12.34, 56.78), ("N", "E"));
        assert_eq!(hemisphere_refs(-12.34, -56.78), ("S", "W"));
        assert_eq!(hemisphere_refs(0.0, 0.0), ("N", "E"));
        assert_eq!(hemisphere_refs(-0.0001, 0.0001), ("S", "E"));
    }

    #[test]
    fn reference_with_nul_terminator_is_understood() {
        let dms = Dms { degrees: 1, minutes: 30, centiseconds: 0 };
        assert_eq!(dms_to_decimal(dms, "W\0"), -1.5);
        assert_eq!(dms_to_decimal(dms, "N"), 1.5);
    }

    // ── parse_timestamp ──────────────────────────────────────────────

    #[test]
    fn valid_timestamp_gets_zero_seconds() {
        assert_eq!(parse_timestamp("2024-01-01", "12:34").as_deref(), Some("2024:01:01 12:34:00"));
        assert_eq!(parse_timestamp("1999-12-31", "23:59").as_deref(), Some("1999:12:31 23:59:00"));
    }

    #[test]
    fn invalid_timestamps_are_rejected() {
        assert_eq!(parse_timestamp("2024-13-40", "12:34"), None);
        assert_eq!(parse_timestamp("2024-01-01", "25:99"), None);
        assert_eq!(parse_timestamp("01/02/2024", "12:34"), None);
        assert_eq!(parse_timestamp("2024-02-30", "10:00"), None);
        assert_eq!(parse_timestamp("", ""), None);
        assert_eq!(parse_timestamp("2024-01-01", "12:34:56"), None);
    }

    // ── geo_tags ─────────────────────────────────────────────────────

    #[test]
    fn bad_date_still_produces_gps_tags() {
        let (tags, timestamp) = geo_tags(&stamp(1.0, 2.0, "2024-13-40", "25:99"));
        assert_eq!(timestamp, None);
        assert_eq!(tags.len(), 4);
        assert!(tags.iter().any(|t| matches!(t, ExifTag::GPSLatitude(_))));
        assert!(!tags.iter().any(|t| matches!(t, ExifTag::DateTimeOriginal(_))));
    }

    #[test]
    fn good_date_adds_three_timestamps() {
        let (tags, timestamp) = geo_tags(&stamp(1.0, 2.0, "2024-01-01", "12:34"));
        assert_eq!(timestamp.as_deref(), Some("2024:01:01 12:34:00"));
        assert_eq!(tags.len(), 7);
        for tag in &tags[4..] {
            match tag {
                ExifTag::ModifyDate(s) | ExifTag::DateTimeOriginal(s) | ExifTag::CreateDate(s) => {
                    assert_eq!(s, "2024:01:01 12:34:00")
                }
                other => panic!("unexpected tag {other:?}"),
            }
        }
    }

    #[test]
    fn garbage_source_has_no_metadata() {
        assert!(load_existing_metadata(b"not an image", ImageKind::Jpeg).is_none());
        assert!(source_icc_profile(b"not an image").is_none());
        assert!(!has_exif(b"not an image"));
    }

    // ── carry_over ───────────────────────────────────────────────────

    #[test]
    fn carry_over_drops_gps_and_timestamps() {
        let mut existing = Metadata::new();
        existing.set_tag(ExifTag::Make("TestCam".to_string()));
        existing.set_tag(ExifTag::GPSLatitudeRef("S".to_string()));
        existing.set_tag(ExifTag::GPSLatitude(decimal_to_dms(10.0).to_rationals()));
        existing.set_tag(ExifTag::DateTimeOriginal("2020:05:05 05:05:05".to_string()));

        let mut target = Metadata::new();
        assert_eq!(carry_over(&mut target, Some(&existing)), 1);
        let ids: Vec<u16> = (&target).into_iter().map(|t| t.as_u16()).collect();
        assert_eq!(ids, vec![0x010F]);
    }

    #[test]
    fn carry_over_without_source_copies_nothing() {
        let mut target = Metadata::new();
        assert_eq!(carry_over(&mut target, None), 0);
    }

    // ── guarded ──────────────────────────────────────────────────────

    static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn concurrent_guards_restore_the_panic_hook() {
        let prev = {
            let _lock = HOOK_LOCK.lock().unwrap_or_else(|p| p.into_inner());
            let prev = std::panic::take_hook();
            std::panic::set_hook(Box::new(|_| {
                HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
            }));
            prev
        };

        let workers: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    for i in 0..25 {
                        if i % 2 == 0 {
                            assert!(guarded(|| -> u8 { panic!("malformed block") }).is_none());
                        } else {
                            assert_eq!(guarded(|| i), Some(i));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let _lock = HOOK_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        let before = HOOK_CALLS.load(Ordering::SeqCst);
        let _ = catch_unwind(|| -> u8 { panic!("outside guarded") });
        let after = HOOK_CALLS.load(Ordering::SeqCst);
        std::panic::set_hook(prev);
        assert!(after > before, "the installed hook was not restored");
    }
}
