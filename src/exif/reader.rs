//! General-purpose metadata reading for containers the tag codec does not
//! own: HEIC/HEIF, PNG, WebP, TIFF, and video tracks (MP4/MOV). Backed by
//! `nom-exif`, which handles all of these behind one parser.
//!
//! This path is display-only. Every failure is absorbed into the empty
//! summary — metadata preview must never block the removal workflow.

use chrono::NaiveDateTime;
use nom_exif::{EntryValue, ExifIter, LatLng, MediaParser, MediaSource, TrackInfo, TrackInfoTag};
use std::io::Cursor;

use crate::exif::tags::tag;
use crate::summary::{
    flash_label, format_exposure_time, parse_datetime, risk_score, CameraSettings, DeviceInfo,
    GpsInfo, MetadataSummary, TimestampInfo,
};

/// Extract a summary from any supported container. Never fails.
pub(crate) fn read_summary_any(bytes: &[u8]) -> MetadataSummary {
    match try_read(bytes) {
        Ok(summary) => summary,
        Err(e) => {
            log::debug!("No parseable metadata: {e}");
            MetadataSummary::default()
        }
    }
}

fn try_read(bytes: &[u8]) -> Result<MetadataSummary, nom_exif::Error> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::seekable(Cursor::new(bytes.to_vec()))?;

    if ms.has_track() {
        let info: TrackInfo = parser.parse(ms)?;
        return Ok(summary_from_track(&info));
    }

    let iter: ExifIter = parser.parse(ms)?;

    // GPS comes from the built-in parser, which handles the rational
    // alignment quirks; the plain tag sweep covers everything else.
    let gps = iter.parse_gps_info().ok().flatten().map(|g| {
        let latitude = latlng_to_decimal(&g.latitude, g.latitude_ref);
        let longitude = latlng_to_decimal(&g.longitude, g.longitude_ref);
        let altitude = iso6709_altitude(&g.format_iso6709());
        GpsInfo::new(latitude, longitude, altitude)
    });

    let mut fields = RawFields::default();
    for mut entry in iter {
        let code = entry.tag_code();
        let Some(value) = entry.take_value() else {
            continue;
        };
        fields.note(code, value);
    }

    Ok(fields.into_summary(gps))
}

/// Fields collected from the tag sweep, keyed by the same numeric tag ids
/// the codec uses.
#[derive(Default)]
struct RawFields {
    make: Option<String>,
    model: Option<String>,
    software: Option<String>,
    lens: Option<String>,
    exposure_secs: Option<f64>,
    f_number: Option<f64>,
    iso: Option<u32>,
    focal_mm: Option<f64>,
    flash: Option<String>,
    captured: Option<NaiveDateTime>,
    digitized: Option<NaiveDateTime>,
    modified: Option<NaiveDateTime>,
    saw_any: bool,
}

impl RawFields {
    fn note(&mut self, code: u16, value: EntryValue) {
        self.saw_any = true;
        match code {
            tag::MAKE => self.make = clean_text(&value),
            tag::MODEL => self.model = clean_text(&value),
            tag::SOFTWARE => self.software = clean_text(&value),
            tag::LENS_MODEL => self.lens = clean_text(&value),
            tag::EXPOSURE_TIME => self.exposure_secs = numeric(&value),
            tag::F_NUMBER => self.f_number = numeric(&value),
            tag::ISO_SPEED => self.iso = numeric(&value).map(|v| v as u32),
            tag::FOCAL_LENGTH => self.focal_mm = numeric(&value),
            tag::FLASH => self.flash = Some(flash_text(&value)),
            tag::DATE_TIME_ORIGINAL => {
                self.captured = self.captured.take().or_else(|| datetime(&value));
            }
            tag::DATE_TIME_DIGITIZED => {
                self.digitized = self.digitized.take().or_else(|| datetime(&value));
            }
            tag::DATE_TIME => {
                self.modified = self.modified.take().or_else(|| datetime(&value));
            }
            _ => {}
        }
    }

    fn into_summary(self, gps: Option<GpsInfo>) -> MetadataSummary {
        let device = if self.make.is_some() || self.model.is_some() {
            Some(DeviceInfo {
                make: self.make,
                model: self.model,
                software: self.software,
                lens: self.lens,
            })
        } else {
            None
        };

        let camera =
            if self.exposure_secs.is_some() || self.f_number.is_some() || self.iso.is_some() {
                Some(CameraSettings {
                    exposure_time: self.exposure_secs.map(format_exposure_time),
                    f_number: self.f_number,
                    iso: self.iso,
                    focal_length: self.focal_mm.map(|mm| format!("{mm}mm")),
                    flash: self.flash,
                })
            } else {
                None
            };

        let captured = self.captured.or(self.digitized);
        let timestamps = if captured.is_some() || self.modified.is_some() {
            Some(TimestampInfo {
                captured,
                modified: self.modified,
            })
        } else {
            None
        };

        let privacy_risk_score = risk_score(gps.as_ref(), device.as_ref(), timestamps.as_ref());
        MetadataSummary {
            has_exif: self.saw_any || gps.is_some(),
            has_gps: gps.is_some(),
            has_timestamps: timestamps.is_some(),
            gps,
            device,
            camera,
            timestamps,
            privacy_risk_score,
        }
    }
}

/// Video containers carry much less: device identity, a creation date, and
/// an ISO 6709 location string.
fn summary_from_track(info: &TrackInfo) -> MetadataSummary {
    let make = info.get(TrackInfoTag::Make).and_then(clean_text);
    let model = info.get(TrackInfoTag::Model).and_then(clean_text);
    let captured = info.get(TrackInfoTag::CreateDate).and_then(datetime);
    let gps = info
        .get(TrackInfoTag::GpsIso6709)
        .and_then(clean_text)
        .and_then(|s| parse_iso6709(&s))
        .map(|(lat, lon, alt)| GpsInfo::new(lat, lon, alt));

    let device = if make.is_some() || model.is_some() {
        Some(DeviceInfo {
            make,
            model,
            software: None,
            lens: None,
        })
    } else {
        None
    };
    let timestamps = captured.map(|captured| TimestampInfo {
        captured: Some(captured),
        modified: None,
    });

    let privacy_risk_score = risk_score(gps.as_ref(), device.as_ref(), timestamps.as_ref());
    MetadataSummary {
        has_exif: device.is_some() || timestamps.is_some() || gps.is_some(),
        has_gps: gps.is_some(),
        has_timestamps: timestamps.is_some(),
        gps,
        device,
        camera: None,
        timestamps,
        privacy_risk_score,
    }
}

/// Convert a (degrees, minutes, seconds) rational triple plus hemisphere
/// reference to signed decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let degrees = latlng.0 .0 as f64 / latlng.0 .1 as f64;
    let minutes = latlng.1 .0 as f64 / latlng.1 .1 as f64;
    let seconds = latlng.2 .0 as f64 / latlng.2 .1 as f64;

    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;
    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }
    coord
}

fn clean_text(value: &EntryValue) -> Option<String> {
    let s = value.to_string();
    let s = s.trim().trim_matches('"').to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn datetime(value: &EntryValue) -> Option<NaiveDateTime> {
    parse_datetime(&value.to_string())
}

/// Leading fraction or decimal of a rendered value: `"9997/1000000"`,
/// `"9997/1000000 (0.0100)"`, and `"454"` all resolve.
fn numeric(value: &EntryValue) -> Option<f64> {
    let rendered = value.to_string();
    let token = rendered.split_whitespace().next()?;
    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        token.parse().ok()
    }
}

/// Flash may arrive as a raw code or as an already resolved label.
fn flash_text(value: &EntryValue) -> String {
    let rendered = value.to_string();
    match rendered.trim().parse::<u32>() {
        Ok(code) => flash_label(code),
        Err(_) => rendered.trim().trim_matches('"').to_string(),
    }
}

/// Parse an ISO 6709 location string, e.g. `"+27.1281+100.2508+000.000/"`
/// (altitude optional).
fn parse_iso6709(s: &str) -> Option<(f64, f64, Option<f64>)> {
    let s = s.trim().trim_end_matches('/');
    if s.is_empty() {
        return None;
    }

    let mut signs: Vec<usize> = vec![0];
    for (i, c) in s.char_indices().skip(1) {
        if c == '+' || c == '-' {
            signs.push(i);
        }
    }
    if signs.len() < 2 {
        return None;
    }

    let latitude: f64 = s[signs[0]..signs[1]].parse().ok()?;
    let longitude_end = if signs.len() > 2 { signs[2] } else { s.len() };
    let longitude: f64 = s[signs[1]..longitude_end].parse().ok()?;
    let altitude = if signs.len() > 2 {
        s[signs[2]..].parse().ok()
    } else {
        None
    };

    Some((latitude, longitude, altitude))
}

fn iso6709_altitude(s: &str) -> Option<f64> {
    parse_iso6709(s).and_then(|(_, _, alt)| alt)
}
