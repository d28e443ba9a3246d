//! Selective tag removal over a decoded [`TagDirectory`].
//!
//! Each removal category is independently togglable. Device/camera removal
//! is an allowlist filter: anything in the primary or exposure group that is
//! not structurally required for correct display is dropped. GPS removal
//! deletes the whole location group. Timestamp removal deletes the three
//! date-time tags wherever they appear.

use crate::config::RemovalRequest;

use super::tags::{tag, TagDirectory};

/// Tags kept in the primary group when device/camera data is removed:
/// orientation and print resolution only.
const PRIMARY_KEEP: &[u16] = &[
    tag::ORIENTATION,
    tag::X_RESOLUTION,
    tag::Y_RESOLUTION,
    tag::RESOLUTION_UNIT,
];

/// Tags kept in the exposure group when device/camera data is removed:
/// pixel dimensions and color space only.
const EXPOSURE_KEEP: &[u16] = &[
    tag::PIXEL_X_DIMENSION,
    tag::PIXEL_Y_DIMENSION,
    tag::COLOR_SPACE,
];

const TIMESTAMP_TAGS: &[u16] = &[
    tag::DATE_TIME,
    tag::DATE_TIME_ORIGINAL,
    tag::DATE_TIME_DIGITIZED,
];

/// Apply the requested removal categories to the directory in place.
///
/// Returns `true` if anything was (or would be) rewritten. When this is
/// `false` the caller must hand back the original bytes verbatim instead of
/// re-serializing an untouched file.
pub fn remove(dir: &mut TagDirectory, request: &RemovalRequest) -> bool {
    let mut modified = false;

    if request.remove_device {
        // The groups are rewritten whenever they exist, even if every tag
        // they hold happens to be allowlisted.
        if !dir.primary.is_empty() || !dir.exposure.is_empty() {
            modified = true;
        }
        // Timestamp tags are governed by their own toggle: they survive this
        // filter so the categories stay independent.
        dir.primary
            .retain(|t| PRIMARY_KEEP.contains(&t) || TIMESTAMP_TAGS.contains(&t));
        dir.exposure
            .retain(|t| EXPOSURE_KEEP.contains(&t) || TIMESTAMP_TAGS.contains(&t));
    }

    if request.remove_gps && !dir.gps.is_empty() {
        dir.gps.clear();
        modified = true;
    }

    if request.remove_timestamps {
        for &t in TIMESTAMP_TAGS {
            if dir.primary.remove(t).is_some() {
                modified = true;
            }
            if dir.exposure.remove(t).is_some() {
                modified = true;
            }
        }
    }

    modified
}
