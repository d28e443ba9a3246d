//! The processing pipeline: classify an input by its declared type, route it
//! to the matching removal strategy, and hand back the processed bytes.
//!
//! The caller supplies raw bytes, a declared MIME type, a file name, and the
//! removal toggles; everything else (UI, delivery, persistence) lives
//! outside this crate.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ImagePolicy, ProcessingConfig, RemovalRequest};
use crate::error::{Error, Result};
use crate::exif::{codec, remover};
use crate::video::engine::{EngineHandle, EngineJob};
use crate::video::{self, VideoOutcome};

/// File extensions the pipeline accepts when fed from a filesystem walk.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "heic", "heif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];

/// The removal strategy for one input, chosen by [`classify`]. A closed set:
/// adding a format means adding a variant and handling it everywhere the
/// compiler points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// JPEG — tag segments are edited in place, per category.
    SelectiveEdit,
    /// HEIC/HEIF — converted to JPEG first, then selectively edited.
    TranscodeThenEdit,
    /// PNG/WebP/GIF — decoded to pixels and re-encoded; all-or-nothing.
    Reencode(RasterTarget),
    /// MP4/MOV/AVI/WebM — stripped by the external media engine.
    VideoStrip,
}

/// Output format for the re-encode strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterTarget {
    Png,
    WebP,
    Gif,
}

/// A strategy plus the human-readable reason for it, which carries caveats
/// the caller should surface (most notably the GIF animation loss).
#[derive(Debug, Clone, Copy)]
pub struct Classification {
    pub strategy: Strategy,
    pub reason: &'static str,
}

/// Classify an input by declared MIME type, falling back to the file name
/// for `.mov` files whose platform left the type blank.
pub fn classify(declared_mime: &str, file_name: &str) -> Result<Classification> {
    match declared_mime {
        "image/jpeg" => Ok(Classification {
            strategy: Strategy::SelectiveEdit,
            reason: "JPEG tag segments support selective, per-category removal",
        }),
        "image/heic" | "image/heif" => Ok(Classification {
            strategy: Strategy::TranscodeThenEdit,
            reason: "legacy camera container: converted to JPEG, then selectively edited",
        }),
        "image/png" => Ok(Classification {
            strategy: Strategy::Reencode(RasterTarget::Png),
            reason: "re-encoding drops all metadata; categories cannot be removed selectively",
        }),
        "image/webp" => Ok(Classification {
            strategy: Strategy::Reencode(RasterTarget::WebP),
            reason: "re-encoding drops all metadata; categories cannot be removed selectively",
        }),
        "image/gif" => Ok(Classification {
            strategy: Strategy::Reencode(RasterTarget::Gif),
            reason: "re-encoding drops all metadata; only the first frame of an animation survives",
        }),
        other if other.starts_with("image/") => Err(Error::UnsupportedFormat {
            mime: other.to_string(),
        }),
        other if video::is_supported_container(other, file_name) => Ok(Classification {
            strategy: Strategy::VideoStrip,
            reason: "container-level metadata is stripped whole; video has no per-category removal",
        }),
        other => Err(Error::UnsupportedFormat {
            mime: if other.is_empty() {
                format!("unknown type for {file_name}")
            } else {
                other.to_string()
            },
        }),
    }
}

/// One file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub bytes: Vec<u8>,
    pub declared_mime: String,
    pub file_name: String,
    pub request: RemovalRequest,
}

impl MediaInput {
    /// Build an input by reading a file, inferring the MIME type from its
    /// extension.
    pub async fn from_path(path: &Path, request: RemovalRequest) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let declared_mime = mime_for_path(path).unwrap_or_default().to_string();
        Ok(Self {
            bytes,
            declared_mime,
            file_name,
            request,
        })
    }
}

/// Result of processing one image.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub bytes: Vec<u8>,
    /// `false` means the bytes are the original input, returned verbatim.
    pub was_modified: bool,
}

/// Result of processing one input, by media kind.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    Image(ImageOutcome),
    Video(VideoOutcome),
}

/// Process a single file through the full removal pipeline.
///
/// This is the main entry point for the library. The input is classified
/// (see [`classify`]), then routed:
///
/// 1. **JPEG** — decode the tag container, filter the requested categories,
///    splice the result back. Internal failures degrade to returning the
///    original bytes unmodified.
/// 2. **HEIC/HEIF** — convert to JPEG on the shared engine, then run the
///    JPEG path on the result.
/// 3. **PNG/WebP/GIF** — decode to pixels and re-encode, which drops every
///    tag at once.
/// 4. **Video** — strip container metadata on the shared engine
///    (see [`video::strip`]).
///
/// # Example
///
/// ```rust,no_run
/// use metastrip::config::{ProcessingConfig, RemovalRequest};
/// use metastrip::pipeline::{process_media, MediaInput, ProcessOutcome};
/// use metastrip::video::engine::EngineHandle;
///
/// # async fn example() -> metastrip::Result<()> {
/// let engine = EngineHandle::new();
/// let config = ProcessingConfig::default();
///
/// let input = MediaInput {
///     bytes: std::fs::read("photo.jpg")?,
///     declared_mime: "image/jpeg".to_string(),
///     file_name: "photo.jpg".to_string(),
///     request: RemovalRequest::all(),
/// };
///
/// match process_media(input, &engine, &config).await? {
///     ProcessOutcome::Image(image) => {
///         println!("modified: {}", image.was_modified);
///         std::fs::write("photo.clean.jpg", &image.bytes)?;
///     }
///     ProcessOutcome::Video(video) => {
///         std::fs::write(&video.output_name, &video.bytes)?;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn process_media(
    input: MediaInput,
    engine: &EngineHandle,
    config: &ProcessingConfig,
) -> Result<ProcessOutcome> {
    let classification = classify(&input.declared_mime, &input.file_name)?;
    log::debug!("{}: {}", input.file_name, classification.reason);

    // An empty request on an image is a no-op: hand the original back
    // rather than re-encoding or re-serializing untouched bytes. Video
    // still remuxes (the output container may legitimately change).
    if classification.strategy != Strategy::VideoStrip && !input.request.requests_any() {
        return Ok(ProcessOutcome::Image(ImageOutcome {
            bytes: input.bytes,
            was_modified: false,
        }));
    }

    match classification.strategy {
        Strategy::SelectiveEdit => Ok(ProcessOutcome::Image(selective_edit(
            input.bytes,
            &input.request,
        ))),
        Strategy::TranscodeThenEdit => {
            let jpeg = transcode_heic(engine, &input.bytes, &config.image).await?;
            let edited = selective_edit(jpeg, &input.request);
            // The output container differs from the input regardless of
            // whether the tag filter then touched anything.
            Ok(ProcessOutcome::Image(ImageOutcome {
                bytes: edited.bytes,
                was_modified: true,
            }))
        }
        Strategy::Reencode(target) => {
            let bytes = reencode(input.bytes, target).await?;
            Ok(ProcessOutcome::Image(ImageOutcome {
                bytes,
                was_modified: true,
            }))
        }
        Strategy::VideoStrip => {
            let outcome = video::strip(
                engine,
                &input.bytes,
                &input.declared_mime,
                &input.file_name,
                &input.request,
                &config.video,
            )
            .await?;
            Ok(ProcessOutcome::Video(outcome))
        }
    }
}

/// The JPEG selective-edit path. Infallible by design: any internal failure
/// (no tag segment, malformed segment, reserialization error) degrades to
/// returning the original bytes with `was_modified = false`.
fn selective_edit(bytes: Vec<u8>, request: &RemovalRequest) -> ImageOutcome {
    let mut dir = match codec::decode(&bytes) {
        Ok(dir) => dir,
        Err(e) => {
            log::debug!("No editable tag segment: {e}");
            return ImageOutcome {
                bytes,
                was_modified: false,
            };
        }
    };

    if !remover::remove(&mut dir, request) {
        return ImageOutcome {
            bytes,
            was_modified: false,
        };
    }

    let respliced = if dir.is_empty() {
        // Nothing left at all: take the segment out instead of writing an
        // empty placeholder.
        codec::splice(None, &bytes)
    } else {
        codec::encode(&dir).and_then(|tiff| codec::splice(Some(&tiff), &bytes))
    };

    match respliced {
        Ok(out) => ImageOutcome {
            bytes: out,
            was_modified: true,
        },
        Err(e) => {
            // Data safety over strict error surfacing: an unmodified
            // original beats a potentially corrupt rewrite.
            log::warn!("Tag reserialization failed, returning original bytes: {e}");
            ImageOutcome {
                bytes,
                was_modified: false,
            }
        }
    }
}

/// Decode to pixels and re-encode into the same format, dropping the whole
/// tag container along the way. Runs on the blocking pool — full-size
/// decodes are CPU-bound.
async fn reencode(bytes: Vec<u8>, target: RasterTarget) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || reencode_blocking(&bytes, target))
        .await
        .map_err(|e| Error::Processing(format!("re-encode task failed: {e}")))?
}

fn reencode_blocking(bytes: &[u8], target: RasterTarget) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::Processing(format!("image decode failed: {e}")))?;
    // Normalize depth: the encoders below take 8-bit buffers.
    let decoded = image::DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Cursor::new(Vec::new());
    let format = match target {
        RasterTarget::Png => image::ImageFormat::Png,
        RasterTarget::WebP => image::ImageFormat::WebP,
        RasterTarget::Gif => image::ImageFormat::Gif,
    };
    decoded.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// Convert a HEIC/HEIF container to JPEG on the shared media engine.
///
/// The conversion itself drops most container-native tags, but the result
/// still goes through the selective remover so removal semantics are
/// identical across every image path.
async fn transcode_heic(
    handle: &EngineHandle,
    bytes: &[u8],
    policy: &ImagePolicy,
) -> Result<Vec<u8>> {
    let engine = handle.engine().await?;
    let args = vec![
        "-frames:v".to_string(),
        "1".to_string(),
        "-q:v".to_string(),
        jpeg_qscale(policy.reencode_quality).to_string(),
    ];

    engine
        .run(EngineJob {
            input_name: "input.heic",
            input: bytes,
            args,
            output_name: "output.jpg",
        })
        .await
        .map_err(|e| match e {
            Error::Processing(msg) => Error::Processing(format!("HEIC conversion failed: {msg}")),
            other => other,
        })
}

/// Map a 0–100 JPEG quality to the engine's 2 (best) – 31 (worst) qscale.
fn jpeg_qscale(quality: u8) -> u32 {
    let quality = u32::from(quality.min(100));
    (100 - quality) * 29 / 100 + 2
}

/// Generate a JPEG preview thumbnail for display, preserving aspect ratio
/// within `thumbnail_max_dim`.
pub fn image_thumbnail(bytes: &[u8], policy: &ImagePolicy) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| Error::Processing(format!("image decode failed: {e}")))?;
    let thumb = decoded.thumbnail(policy.thumbnail_max_dim, policy.thumbnail_max_dim);
    let thumb = image::DynamicImage::ImageRgb8(thumb.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
        &mut out,
        policy.thumbnail_quality,
    );
    thumb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Infer a MIME type from a file extension, for callers feeding the
/// pipeline from a filesystem instead of an upload.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

/// Collect supported media files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks); only files with supported image or
/// video extensions are included.
pub fn collect_media(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut media = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_media(path) {
                media.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_media(p) {
                    media.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    media
}

/// Check if a file has a supported image or video extension.
fn is_supported_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::tags::{tag, Endian, TagDirectory, TagEntry};
    use crate::summary::read_summary;
    use crate::video::engine::MediaEngine;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    // ── classify ─────────────────────────────────────────────────────

    #[test]
    fn classify_jpeg_is_selective() {
        let c = classify("image/jpeg", "a.jpg").unwrap();
        assert_eq!(c.strategy, Strategy::SelectiveEdit);
    }

    #[test]
    fn classify_heic_is_transcode() {
        assert_eq!(
            classify("image/heic", "a.heic").unwrap().strategy,
            Strategy::TranscodeThenEdit
        );
        assert_eq!(
            classify("image/heif", "a.heif").unwrap().strategy,
            Strategy::TranscodeThenEdit
        );
    }

    #[test]
    fn classify_lossy_rasters_reencode() {
        assert_eq!(
            classify("image/png", "a.png").unwrap().strategy,
            Strategy::Reencode(RasterTarget::Png)
        );
        assert_eq!(
            classify("image/webp", "a.webp").unwrap().strategy,
            Strategy::Reencode(RasterTarget::WebP)
        );
        assert_eq!(
            classify("image/gif", "a.gif").unwrap().strategy,
            Strategy::Reencode(RasterTarget::Gif)
        );
    }

    #[test]
    fn classify_gif_reason_warns_about_animation() {
        let c = classify("image/gif", "a.gif").unwrap();
        assert!(c.reason.contains("first frame"));
    }

    #[test]
    fn classify_video_types() {
        for mime in ["video/mp4", "video/quicktime", "video/x-msvideo", "video/webm"] {
            assert_eq!(
                classify(mime, "clip.bin").unwrap().strategy,
                Strategy::VideoStrip,
                "{mime}"
            );
        }
    }

    #[test]
    fn classify_mov_by_file_name_without_mime() {
        let c = classify("", "clip.mov").unwrap();
        assert_eq!(c.strategy, Strategy::VideoStrip);
    }

    #[test]
    fn classify_rejects_other_image_types() {
        assert!(matches!(
            classify("image/tiff", "scan.tiff"),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            classify("image/bmp", "old.bmp"),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn classify_rejects_non_media() {
        assert!(matches!(
            classify("application/pdf", "doc.pdf"),
            Err(Error::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            classify("", "mystery"),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    // ── fixtures ─────────────────────────────────────────────────────

    /// A structurally valid JPEG carrying the given tag directory in its
    /// APP1 segment, with a stub scan.
    fn jpeg_with_tags(dir: &TagDirectory) -> Vec<u8> {
        let tiff = codec::encode(dir).unwrap();
        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);

        let mut out = vec![0xFF, 0xD8]; // SOI
        out.extend_from_slice(&[0xFF, 0xE1]); // APP1
        out.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]); // SOS, empty header
        out.extend_from_slice(&[0xFF, 0xD9]); // EOI
        out
    }

    fn full_tag_directory() -> TagDirectory {
        let endian = Endian::Little;
        let mut dir = TagDirectory::new(endian);
        dir.primary.insert(tag::MAKE, TagEntry::ascii("Apple"));
        dir.primary.insert(tag::MODEL, TagEntry::ascii("iPhone 15"));
        dir.primary
            .insert(tag::SOFTWARE, TagEntry::ascii("iOS 17.4"));
        dir.primary.insert(tag::ORIENTATION, TagEntry::short(endian, 1));
        dir.primary
            .insert(tag::DATE_TIME, TagEntry::ascii("2024:06:01 11:00:00"));
        dir.exposure
            .insert(tag::EXPOSURE_TIME, TagEntry::rational(endian, 1, 250));
        dir.exposure
            .insert(tag::ISO_SPEED, TagEntry::short(endian, 200));
        dir.exposure.insert(
            tag::DATE_TIME_ORIGINAL,
            TagEntry::ascii("2024:06:01 10:30:00"),
        );
        dir.gps.insert(tag::GPS_LATITUDE_REF, TagEntry::ascii("N"));
        dir.gps.insert(
            tag::GPS_LATITUDE,
            TagEntry::rationals(endian, &[(37, 1), (46, 1), (2982, 100)]),
        );
        dir.gps.insert(tag::GPS_LONGITUDE_REF, TagEntry::ascii("W"));
        dir.gps.insert(
            tag::GPS_LONGITUDE,
            TagEntry::rationals(endian, &[(122, 1), (25, 1), (999, 100)]),
        );
        dir
    }

    /// Handle whose loader always fails — used where the engine must never
    /// be touched.
    fn unreachable_engine() -> EngineHandle {
        EngineHandle::with_loader(|| async {
            Err(Error::EngineLoad(
                "engine must not be used in this test".to_string(),
            ))
        })
    }

    #[derive(Default)]
    struct CaptureEngine {
        calls: Mutex<Vec<Vec<String>>>,
        response: Vec<u8>,
    }

    #[async_trait]
    impl MediaEngine for CaptureEngine {
        async fn run(&self, job: EngineJob<'_>) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(job.args.clone());
            Ok(self.response.clone())
        }
    }

    fn capture_handle(response: Vec<u8>) -> (Arc<CaptureEngine>, EngineHandle) {
        let capture = Arc::new(CaptureEngine {
            calls: Mutex::new(Vec::new()),
            response,
        });
        let for_loader = capture.clone();
        let handle = EngineHandle::with_loader(move || {
            let engine = for_loader.clone();
            async move { Ok(engine as Arc<dyn MediaEngine>) }
        });
        (capture, handle)
    }

    // ── selective path ───────────────────────────────────────────────

    #[tokio::test]
    async fn empty_request_returns_byte_identical_input() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let jpeg = jpeg_with_tags(&full_tag_directory());

        // Every supported image format short-circuits on an empty request.
        for mime in ["image/jpeg", "image/png", "image/webp", "image/gif", "image/heic"] {
            let input = MediaInput {
                bytes: jpeg.clone(),
                declared_mime: mime.to_string(),
                file_name: "a".to_string(),
                request: RemovalRequest::default(),
            };
            let ProcessOutcome::Image(outcome) =
                process_media(input, &engine, &config).await.unwrap()
            else {
                panic!("expected image outcome");
            };
            assert!(!outcome.was_modified, "{mime}");
            assert_eq!(outcome.bytes, jpeg, "{mime}");
        }
    }

    #[tokio::test]
    async fn gps_removal_keeps_device_and_timestamps() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let jpeg = jpeg_with_tags(&full_tag_directory());

        let before = read_summary(&jpeg, "image/jpeg");
        assert!(before.has_gps);
        assert!(before.device.is_some());
        assert!(before.has_timestamps);

        let input = MediaInput {
            bytes: jpeg,
            declared_mime: "image/jpeg".to_string(),
            file_name: "a.jpg".to_string(),
            request: RemovalRequest {
                remove_gps: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };
        assert!(outcome.was_modified);

        let after = read_summary(&outcome.bytes, "image/jpeg");
        assert!(!after.has_gps);
        assert_eq!(after.device, before.device);
        assert_eq!(after.timestamps, before.timestamps);
    }

    #[tokio::test]
    async fn timestamp_removal_keeps_gps_and_device() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let jpeg = jpeg_with_tags(&full_tag_directory());
        let before = read_summary(&jpeg, "image/jpeg");

        let input = MediaInput {
            bytes: jpeg,
            declared_mime: "image/jpeg".to_string(),
            file_name: "a.jpg".to_string(),
            request: RemovalRequest {
                remove_timestamps: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };

        let after = read_summary(&outcome.bytes, "image/jpeg");
        assert!(!after.has_timestamps);
        assert_eq!(after.gps, before.gps);
        assert_eq!(after.device, before.device);
    }

    #[tokio::test]
    async fn device_removal_keeps_gps_and_timestamps() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let jpeg = jpeg_with_tags(&full_tag_directory());
        let before = read_summary(&jpeg, "image/jpeg");

        let input = MediaInput {
            bytes: jpeg,
            declared_mime: "image/jpeg".to_string(),
            file_name: "a.jpg".to_string(),
            request: RemovalRequest {
                remove_device: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };

        let after = read_summary(&outcome.bytes, "image/jpeg");
        assert!(after.device.is_none());
        assert!(after.camera.is_none());
        assert_eq!(after.gps, before.gps);
        assert_eq!(after.timestamps, before.timestamps);
    }

    #[tokio::test]
    async fn all_categories_scrub_everything_identifying() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let jpeg = jpeg_with_tags(&full_tag_directory());

        let input = MediaInput {
            bytes: jpeg,
            declared_mime: "image/jpeg".to_string(),
            file_name: "a.jpg".to_string(),
            request: RemovalRequest::all(),
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };

        let after = read_summary(&outcome.bytes, "image/jpeg");
        assert!(!after.has_gps);
        assert!(!after.has_timestamps);
        assert!(after.device.is_none());
        assert_eq!(after.privacy_risk_score, 0);
    }

    #[test]
    fn round_trip_without_mutation_preserves_extracted_values() {
        let jpeg = jpeg_with_tags(&full_tag_directory());
        let before = read_summary(&jpeg, "image/jpeg");

        // decode → encode → splice with zero mutations in between
        let dir = codec::decode(&jpeg).unwrap();
        let tiff = codec::encode(&dir).unwrap();
        let respliced = codec::splice(Some(&tiff), &jpeg).unwrap();

        let after = read_summary(&respliced, "image/jpeg");
        assert_eq!(after.gps, before.gps);
        assert_eq!(after.device, before.device);
        assert_eq!(after.camera, before.camera);
        assert_eq!(after.timestamps, before.timestamps);
        assert_eq!(after.privacy_risk_score, before.privacy_risk_score);
    }

    #[tokio::test]
    async fn jpeg_without_metadata_comes_back_untouched() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        // SOI + stub scan + EOI, no APP1 at all.
        let bare = vec![0xFF, 0xD8, 0xFF, 0xDA, 0x00, 0x02, 0xFF, 0xD9];

        let input = MediaInput {
            bytes: bare.clone(),
            declared_mime: "image/jpeg".to_string(),
            file_name: "bare.jpg".to_string(),
            request: RemovalRequest::all(),
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };
        assert!(!outcome.was_modified);
        assert_eq!(outcome.bytes, bare);
    }

    #[tokio::test]
    async fn corrupt_jpeg_degrades_to_original_bytes() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let garbage = b"not a jpeg".to_vec();

        let input = MediaInput {
            bytes: garbage.clone(),
            declared_mime: "image/jpeg".to_string(),
            file_name: "broken.jpg".to_string(),
            request: RemovalRequest::all(),
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };
        assert!(!outcome.was_modified);
        assert_eq!(outcome.bytes, garbage);
    }

    // ── re-encode path ───────────────────────────────────────────────

    fn small_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 200, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn png_reencode_keeps_dimensions() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();

        let input = MediaInput {
            bytes: small_png(),
            declared_mime: "image/png".to_string(),
            file_name: "pix.png".to_string(),
            request: RemovalRequest {
                remove_gps: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };
        assert!(outcome.was_modified);

        let decoded = image::load_from_memory(&outcome.bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(
            image::guess_format(&outcome.bytes).unwrap(),
            image::ImageFormat::Png
        );
    }

    #[tokio::test]
    async fn undecodable_pixels_raise_processing_error() {
        let config = ProcessingConfig::default();
        let engine = unreachable_engine();

        let input = MediaInput {
            bytes: b"not pixel data".to_vec(),
            declared_mime: "image/png".to_string(),
            file_name: "broken.png".to_string(),
            request: RemovalRequest::all(),
        };
        let result = process_media(input, &engine, &config).await;
        assert!(matches!(result, Err(Error::Processing(_))));
    }

    #[tokio::test]
    async fn gif_reencode_keeps_only_first_frame() {
        use image::codecs::gif::{GifDecoder, GifEncoder};
        use image::AnimationDecoder;

        // Two-frame animation.
        let mut animated = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut animated);
            for shade in [50u8, 200u8] {
                let frame = image::Frame::new(image::RgbaImage::from_pixel(
                    3,
                    3,
                    image::Rgba([shade, shade, shade, 255]),
                ));
                encoder.encode_frame(frame).unwrap();
            }
        }

        let config = ProcessingConfig::default();
        let engine = unreachable_engine();
        let input = MediaInput {
            bytes: animated,
            declared_mime: "image/gif".to_string(),
            file_name: "anim.gif".to_string(),
            request: RemovalRequest::all(),
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &engine, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };

        let frames = GifDecoder::new(Cursor::new(outcome.bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 1);
    }

    // ── HEIC path ────────────────────────────────────────────────────

    #[tokio::test]
    async fn heic_transcodes_on_engine_then_edits() {
        let config = ProcessingConfig::default();
        // The engine returns a JPEG with tags; the selective pass then
        // strips the requested category from it.
        let converted = jpeg_with_tags(&full_tag_directory());
        let (capture, handle) = capture_handle(converted);

        let input = MediaInput {
            bytes: b"heic-container-bytes".to_vec(),
            declared_mime: "image/heic".to_string(),
            file_name: "photo.heic".to_string(),
            request: RemovalRequest {
                remove_gps: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Image(outcome) = process_media(input, &handle, &config).await.unwrap()
        else {
            panic!("expected image outcome");
        };
        assert!(outcome.was_modified);

        // Single-frame, high-quality JPEG extract.
        let calls = capture.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let joined = calls[0].join(" ");
        assert!(joined.contains("-frames:v 1"));
        assert!(joined.contains("-q:v"));

        // And the converted image went through the selective remover.
        let after = read_summary(&outcome.bytes, "image/jpeg");
        assert!(!after.has_gps);
        assert!(after.device.is_some());
    }

    #[tokio::test]
    async fn heic_engine_failure_propagates() {
        let config = ProcessingConfig::default();
        let handle = EngineHandle::with_loader(|| async {
            Err(Error::EngineLoad("no engine here".to_string()))
        });

        let input = MediaInput {
            bytes: b"heic".to_vec(),
            declared_mime: "image/heic".to_string(),
            file_name: "photo.heic".to_string(),
            request: RemovalRequest::all(),
        };
        let result = process_media(input, &handle, &config).await;
        assert!(matches!(result, Err(Error::EngineLoad(_))));
    }

    // ── video routing ────────────────────────────────────────────────

    #[tokio::test]
    async fn video_routes_to_stripper() {
        let config = ProcessingConfig::default();
        let (_capture, handle) = capture_handle(b"clean-video".to_vec());

        let input = MediaInput {
            bytes: b"mp4-bytes".to_vec(),
            declared_mime: "video/mp4".to_string(),
            file_name: "clip.mp4".to_string(),
            request: RemovalRequest {
                remove_timestamps: true,
                ..Default::default()
            },
        };
        let ProcessOutcome::Video(outcome) = process_media(input, &handle, &config).await.unwrap()
        else {
            panic!("expected video outcome");
        };
        assert_eq!(outcome.extension, ".mp4");
        assert_eq!(outcome.output_name, "clip.mp4");
        assert_eq!(outcome.bytes, b"clean-video");
    }

    // ── helpers / collection ─────────────────────────────────────────

    #[test]
    fn qscale_mapping() {
        assert_eq!(jpeg_qscale(100), 2);
        assert_eq!(jpeg_qscale(95), 3);
        assert_eq!(jpeg_qscale(0), 31);
    }

    #[test]
    fn thumbnail_fits_within_max_dimension() {
        let img = image::RgbaImage::from_pixel(400, 100, image::Rgba([5, 5, 5, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();

        let policy = ImagePolicy::default();
        let thumb = image_thumbnail(&buf.into_inner(), &policy).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), 200);
        assert_eq!(decoded.height(), 50);
        assert_eq!(
            image::guess_format(&thumb).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn mime_inference() {
        assert_eq!(mime_for_path(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("a.heic")), Some("image/heic"));
        assert_eq!(mime_for_path(Path::new("a.mov")), Some("video/quicktime"));
        assert_eq!(mime_for_path(Path::new("a.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn collect_media_single_file() {
        let dir = TempDir::new().unwrap();
        let jpg = dir.path().join("test.jpg");
        fs::write(&jpg, b"fake").unwrap();

        let media = collect_media(&[jpg.clone()]);
        assert_eq!(media, vec![jpg]);
    }

    #[test]
    fn collect_media_skips_unsupported() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("readme.txt");
        fs::write(&txt, b"hello").unwrap();

        assert!(collect_media(&[txt]).is_empty());
    }

    #[test]
    fn collect_media_directory_recursive_with_videos() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"fake").unwrap();
        fs::write(sub.join("b.mp4"), b"fake").unwrap();
        fs::write(sub.join("c.txt"), b"fake").unwrap();

        let media = collect_media(&[dir.path().to_path_buf()]);
        assert_eq!(media.len(), 2);
    }

    #[test]
    fn collect_media_nonexistent_path() {
        assert!(collect_media(&[PathBuf::from("/nonexistent/path")]).is_empty());
    }
}
