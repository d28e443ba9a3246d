//! Metadata extraction: derive the display-facing summary — GPS position,
//! device identity, camera settings, timestamps, and the privacy-risk score
//! — from a decoded tag directory.
//!
//! Extraction is read-only and best-effort: it never mutates the directory
//! the remover operates on, and unreadable metadata always yields the empty
//! summary rather than an error, so display can never block removal.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::exif::codec;
use crate::exif::reader;
use crate::exif::tags::{tag, TagDirectory};

/// GPS position derived from the location group. Present only when both
/// latitude and longitude were extracted.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GpsInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// e.g. `"37.774900° N, 122.419400° W"`
    pub formatted_coordinates: String,
    /// OpenStreetMap link for the coordinate.
    pub map_link: String,
}

impl GpsInfo {
    pub(crate) fn new(latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        let ns = if latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if longitude >= 0.0 { 'E' } else { 'W' };
        Self {
            latitude,
            longitude,
            altitude,
            formatted_coordinates: format!(
                "{:.6}° {}, {:.6}° {}",
                latitude.abs(),
                ns,
                longitude.abs(),
                ew
            ),
            map_link: format!(
                "https://www.openstreetmap.org/?mlat={latitude}&mlon={longitude}&zoom=15"
            ),
        }
    }
}

/// Device identity. Present only when make or model exists.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub lens: Option<String>,
}

/// Camera exposure settings. Present only when at least one of exposure
/// time, f-number, or ISO is set.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    /// e.g. `"1/250"` or `"2s"`
    pub exposure_time: Option<String>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
    /// e.g. `"8.67mm"`
    pub focal_length: Option<String>,
    /// e.g. `"No Flash"` / `"Flash Fired"`
    pub flash: Option<String>,
}

/// Capture and modification timestamps. Present only when at least one
/// exists.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimestampInfo {
    pub captured: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
}

/// The externally visible extraction result. Immutable once produced; a
/// fresh one is derived from each decode.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSummary {
    pub has_exif: bool,
    pub has_gps: bool,
    pub has_timestamps: bool,
    pub gps: Option<GpsInfo>,
    pub device: Option<DeviceInfo>,
    pub camera: Option<CameraSettings>,
    pub timestamps: Option<TimestampInfo>,
    /// Additive heuristic in `[0, 10]` — see [`risk_score`].
    pub privacy_risk_score: u8,
}

/// Read-only companion call: extract a summary from raw file bytes without
/// touching the removal path. Never fails — anything unreadable comes back
/// as the empty summary.
///
/// JPEG inputs go through the crate's own codec; every other container
/// (HEIC/HEIF, PNG, WebP, TIFF, and video tracks) is read with the
/// general-purpose parser.
pub fn read_summary(bytes: &[u8], declared_mime: &str) -> MetadataSummary {
    if declared_mime == "image/jpeg" {
        match codec::decode(bytes) {
            Ok(dir) => return extract(&dir),
            Err(e) => {
                log::debug!("Tag codec could not read JPEG metadata: {e}");
                // Fall through: the general parser may still find something.
            }
        }
    }
    reader::read_summary_any(bytes)
}

/// Derive the summary from a decoded tag directory.
pub fn extract(dir: &TagDirectory) -> MetadataSummary {
    let gps = extract_gps(dir);
    let device = extract_device(dir);
    let camera = extract_camera(dir);
    let timestamps = extract_timestamps(dir);
    let privacy_risk_score = risk_score(gps.as_ref(), device.as_ref(), timestamps.as_ref());

    MetadataSummary {
        has_exif: !dir.is_empty(),
        has_gps: gps.is_some(),
        has_timestamps: timestamps.is_some(),
        gps,
        device,
        camera,
        timestamps,
        privacy_risk_score,
    }
}

/// Privacy-risk heuristic: GPS contributes 5, device make-or-model 2,
/// device software 1, a capture timestamp 2; capped at 10. This is a
/// ranking, not a probability — the weights are a policy choice kept in one
/// place.
pub(crate) fn risk_score(
    gps: Option<&GpsInfo>,
    device: Option<&DeviceInfo>,
    timestamps: Option<&TimestampInfo>,
) -> u8 {
    let mut score: u8 = 0;
    if gps.is_some() {
        score += 5;
    }
    if let Some(device) = device {
        if device.make.is_some() || device.model.is_some() {
            score += 2;
        }
        if device.software.is_some() {
            score += 1;
        }
    }
    if timestamps.is_some_and(|t| t.captured.is_some()) {
        score += 2;
    }
    score.min(10)
}

fn extract_gps(dir: &TagDirectory) -> Option<GpsInfo> {
    let endian = dir.endian;

    let latitude = signed_coordinate(dir, tag::GPS_LATITUDE, tag::GPS_LATITUDE_REF, "S")?;
    let longitude = signed_coordinate(dir, tag::GPS_LONGITUDE, tag::GPS_LONGITUDE_REF, "W")?;

    let altitude = dir
        .gps
        .get(tag::GPS_ALTITUDE)
        .and_then(|e| e.as_rational(endian))
        .and_then(ratio_to_f64)
        .map(|alt| {
            let below_sea_level = dir
                .gps
                .get(tag::GPS_ALTITUDE_REF)
                .and_then(|e| e.as_u32(endian))
                == Some(1);
            if below_sea_level { -alt } else { alt }
        });

    Some(GpsInfo::new(latitude, longitude, altitude))
}

/// Degree/minute/second rationals plus hemisphere reference, combined into
/// a signed decimal coordinate.
fn signed_coordinate(
    dir: &TagDirectory,
    value_tag: u16,
    ref_tag: u16,
    negative_ref: &str,
) -> Option<f64> {
    let rationals = dir.gps.get(value_tag)?.as_rationals(dir.endian);
    let decimal = dms_to_decimal(&rationals)?;
    let reference = dir.gps.get(ref_tag).and_then(|e| e.as_ascii());
    if reference.as_deref() == Some(negative_ref) {
        Some(-decimal)
    } else {
        Some(decimal)
    }
}

fn dms_to_decimal(rationals: &[(u32, u32)]) -> Option<f64> {
    let degrees = ratio_to_f64(*rationals.first()?)?;
    let minutes = rationals.get(1).copied().and_then(ratio_to_f64).unwrap_or(0.0);
    let seconds = rationals.get(2).copied().and_then(ratio_to_f64).unwrap_or(0.0);
    Some(degrees + minutes / 60.0 + seconds / 3600.0)
}

fn ratio_to_f64((num, den): (u32, u32)) -> Option<f64> {
    if den == 0 {
        return None;
    }
    Some(f64::from(num) / f64::from(den))
}

fn extract_device(dir: &TagDirectory) -> Option<DeviceInfo> {
    let ascii = |seg: &crate::exif::tags::IfdSegment, t: u16| seg.get(t).and_then(|e| e.as_ascii());
    let make = ascii(&dir.primary, tag::MAKE);
    let model = ascii(&dir.primary, tag::MODEL);

    if make.is_none() && model.is_none() {
        return None;
    }

    Some(DeviceInfo {
        make,
        model,
        software: ascii(&dir.primary, tag::SOFTWARE),
        lens: ascii(&dir.exposure, tag::LENS_MODEL),
    })
}

fn extract_camera(dir: &TagDirectory) -> Option<CameraSettings> {
    let endian = dir.endian;

    let exposure_secs = dir
        .exposure
        .get(tag::EXPOSURE_TIME)
        .and_then(|e| e.as_rational(endian))
        .and_then(ratio_to_f64);
    let f_number = dir
        .exposure
        .get(tag::F_NUMBER)
        .and_then(|e| e.as_rational(endian))
        .and_then(ratio_to_f64);
    let iso = dir
        .exposure
        .get(tag::ISO_SPEED)
        .and_then(|e| e.as_u32(endian));

    if exposure_secs.is_none() && f_number.is_none() && iso.is_none() {
        return None;
    }

    let focal_length = dir
        .exposure
        .get(tag::FOCAL_LENGTH)
        .and_then(|e| e.as_rational(endian))
        .and_then(ratio_to_f64)
        .map(|mm| format!("{mm}mm"));

    let flash = dir
        .exposure
        .get(tag::FLASH)
        .and_then(|e| e.as_u32(endian))
        .map(flash_label);

    Some(CameraSettings {
        exposure_time: exposure_secs.map(format_exposure_time),
        f_number,
        iso,
        focal_length,
        flash,
    })
}

fn extract_timestamps(dir: &TagDirectory) -> Option<TimestampInfo> {
    let ascii = |seg: &crate::exif::tags::IfdSegment, t: u16| seg.get(t).and_then(|e| e.as_ascii());

    // Prefer the capture tag; fall back to the generic digitization tag.
    let captured = ascii(&dir.exposure, tag::DATE_TIME_ORIGINAL)
        .or_else(|| ascii(&dir.exposure, tag::DATE_TIME_DIGITIZED))
        .and_then(|s| parse_datetime(&s));
    let modified = ascii(&dir.primary, tag::DATE_TIME).and_then(|s| parse_datetime(&s));

    if captured.is_none() && modified.is_none() {
        return None;
    }

    Some(TimestampInfo { captured, modified })
}

/// Exposure time formatted for display: `"2s"` at or above one second,
/// `"1/250"` below it.
pub(crate) fn format_exposure_time(secs: f64) -> String {
    if secs >= 1.0 {
        format!("{secs}s")
    } else if secs > 0.0 {
        format!("1/{}", (1.0 / secs).round() as i64)
    } else {
        "0s".to_string()
    }
}

/// Human label for a raw numeric flash code.
pub(crate) fn flash_label(code: u32) -> String {
    if code == 0 {
        "No Flash".to_string()
    } else {
        "Flash Fired".to_string()
    }
}

/// Tolerant date-time parsing covering the tag-native form
/// (`2024:06:01 10:30:00`) and the ISO forms other containers report.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    // Offset-bearing forms like `2023-07-09T20:36:33+08:00`: keep the local
    // wall-clock reading, as the tag it came from does.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    None
}
