//! # metastrip
//!
//! Selective metadata removal for images and videos. Strips the identifying
//! parts of embedded metadata — GPS position, device and camera identity,
//! timestamps — on the caller's machine, without re-encoding pixels unless
//! the format forces it.
//!
//! ## Quick Start
//!
//! The simplest way to use the library is through the pipeline module,
//! which classifies each file and routes it to the right removal strategy:
//!
//! ```rust,no_run
//! use metastrip::config::{ProcessingConfig, RemovalRequest};
//! use metastrip::pipeline::{collect_media, process_media, MediaInput, ProcessOutcome};
//! use metastrip::video::engine::EngineHandle;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> metastrip::Result<()> {
//!     // One engine handle for the whole process; the external media
//!     // engine loads lazily on first video or HEIC job.
//!     let engine = EngineHandle::new();
//!     let config = ProcessingConfig::default();
//!
//!     let files = collect_media(&[PathBuf::from("./camera-roll")]);
//!     for path in &files {
//!         let input = MediaInput::from_path(path, RemovalRequest::all()).await?;
//!         match process_media(input, &engine, &config).await {
//!             Ok(ProcessOutcome::Image(image)) => {
//!                 println!("{}: modified = {}", path.display(), image.was_modified);
//!             }
//!             Ok(ProcessOutcome::Video(video)) => {
//!                 println!("{} -> {}", path.display(), video.output_name);
//!             }
//!             Err(e) => eprintln!("{}: {e}", path.display()),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The extraction and removal layers are independently callable:
//!
//! ```rust,no_run
//! use metastrip::config::RemovalRequest;
//! use metastrip::exif::{codec, remover};
//! use metastrip::summary::read_summary;
//!
//! fn main() -> metastrip::Result<()> {
//!     let bytes = std::fs::read("photo.jpg")?;
//!
//!     // 1. Inspect what the file exposes (display-only, never fails).
//!     let summary = read_summary(&bytes, "image/jpeg");
//!     println!("risk {}/10, GPS: {}", summary.privacy_risk_score, summary.has_gps);
//!
//!     // 2. Edit the tag container directly.
//!     let mut dir = codec::decode(&bytes).expect("no tag segment");
//!     let request = RemovalRequest { remove_gps: true, ..Default::default() };
//!     if remover::remove(&mut dir, &request) {
//!         let tiff = codec::encode(&dir).expect("reserialize");
//!         let clean = codec::splice(Some(&tiff), &bytes).expect("splice");
//!         std::fs::write("photo.clean.jpg", clean)?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Removal Strategy |
//! |--------|-----------------|
//! | JPEG (`.jpg`, `.jpeg`) | Selective — per-category tag editing in place |
//! | HEIC/HEIF (`.heic`, `.heif`) | Transcode to JPEG, then selective editing |
//! | PNG (`.png`) | Re-encode — all-or-nothing |
//! | WebP (`.webp`) | Re-encode — all-or-nothing |
//! | GIF (`.gif`) | Re-encode — all-or-nothing, first frame only |
//! | MP4 (`.mp4`) | Engine strip, stream copy (no re-encode) |
//! | MOV/AVI/WebM | Engine strip, transcode to MP4 |
//!
//! Image removal honors each category independently. Video removal is
//! all-or-nothing: if any category is requested, every container-level tag
//! is stripped — the engine has no per-category control.
//!
//! ## Modules
//!
//! - [`config`] — processing policies and the removal request type
//! - [`error`] — the error taxonomy surfaced to callers
//! - [`exif`] — tag container codec, selective remover, and read paths
//! - [`pipeline`] — classification and the end-to-end processing entry point
//! - [`summary`] — extraction: GPS/device/camera/timestamps and risk score
//! - [`video`] — video stripping and the shared media engine

pub mod config;
pub mod error;
pub mod exif;
pub mod pipeline;
pub mod summary;
pub mod video;

pub use error::{Error, Result};
