//! Video metadata stripping through the external media engine.
//!
//! Removal granularity for video is coarse: container-level tags cannot be
//! edited per category the way image tags can, so if *any* removal category
//! is requested every container tag is stripped. This asymmetry with the
//! image path is a real capability gap in the engine's metadata model, not
//! something to paper over.

pub mod engine;

use crate::config::{RemovalRequest, VideoPolicy};
use crate::error::{Error, Result};

use self::engine::{EngineHandle, EngineJob};

/// Containers accepted for stripping. Anything else (or a file the engine
/// cannot read) is rejected up front.
pub const SUPPORTED_CONTAINERS: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/webm",
];

/// The result of stripping one video. Output is always an MP4 with the moov
/// atom relocated to the file head for progressive playback.
#[derive(Debug, Clone)]
pub struct VideoOutcome {
    pub bytes: Vec<u8>,
    /// Always `".mp4"`.
    pub extension: &'static str,
    /// Input file name with its extension replaced, e.g. `clip.mov` →
    /// `clip.mp4`.
    pub output_name: String,
}

/// True if the declared container type (or a `.mov` file name, for callers
/// whose platform leaves QuickTime MIME types blank) is supported.
pub fn is_supported_container(mime: &str, file_name: &str) -> bool {
    SUPPORTED_CONTAINERS.contains(&mime) || file_name.to_lowercase().ends_with(".mov")
}

/// Strip container metadata from a video.
///
/// MP4 input is stream-copied (no re-encode); every other supported
/// container is transcoded to MP4, because stream copy cannot change the
/// container format. There is no "return original" fallback here — a
/// partially written transcode is not recoverable as "unmodified", so any
/// engine failure propagates as [`Error::Processing`].
pub async fn strip(
    handle: &EngineHandle,
    bytes: &[u8],
    mime: &str,
    file_name: &str,
    request: &RemovalRequest,
    policy: &VideoPolicy,
) -> Result<VideoOutcome> {
    let size = bytes.len() as u64;
    if size > policy.max_input_bytes {
        return Err(Error::FileTooLarge {
            size,
            max: policy.max_input_bytes,
        });
    }
    if !is_supported_container(mime, file_name) {
        return Err(Error::UnsupportedFormat {
            mime: mime.to_string(),
        });
    }

    let engine = handle.engine().await?;
    let input_name = format!("input{}", extension_of(file_name));
    let args = build_args(mime, request, policy);
    log::debug!("Stripping {file_name} with args {args:?}");

    let output = engine
        .run(EngineJob {
            input_name: &input_name,
            input: bytes,
            args,
            output_name: "output.mp4",
        })
        .await?;

    log::info!(
        "Stripped video {file_name}: {} -> {} bytes",
        bytes.len(),
        output.len()
    );

    Ok(VideoOutcome {
        bytes: output,
        extension: ".mp4",
        output_name: replace_extension_with_mp4(file_name),
    })
}

/// Engine arguments between the input and output paths.
fn build_args(mime: &str, request: &RemovalRequest, policy: &VideoPolicy) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    // No per-category control at the container level: any request wipes the
    // whole global metadata map.
    if request.requests_any() {
        args.push("-map_metadata".into());
        args.push("-1".into());
    }

    if mime == "video/mp4" {
        // Same container in and out: stream copy, no re-encode.
        args.push("-c".into());
        args.push("copy".into());
    } else {
        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            policy.preset.clone(),
            "-crf".into(),
            policy.crf.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            policy.audio_bitrate.clone(),
        ]);
    }

    args.push("-movflags".into());
    args.push("+faststart".into());

    args
}

fn extension_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!(".{}", ext.to_lowercase())
        }
        _ => ".mp4".to_string(),
    }
}

fn replace_extension_with_mp4(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.mp4"),
        _ => format!("{file_name}.mp4"),
    }
}
