//! The external media-transcoding engine and its process-wide handle.
//!
//! [`MediaEngine`] abstracts one engine invocation: write the input into a
//! scratch workspace, execute with the given arguments, read the output
//! back, and clean the workspace up whatever happened. [`FfmpegEngine`] is
//! the production implementation over the `ffmpeg` binary.
//!
//! [`EngineHandle`] owns the lazily-initialized shared instance. It is the
//! explicit, injectable resource the composition root passes into the
//! pipeline: initialization is memoized, concurrent first requests coalesce
//! into a single load, and a failed load leaves the handle unset so a later
//! call can retry.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

/// One engine invocation. `args` are the options between the input and
/// output paths, which the engine supplies from its own workspace.
pub struct EngineJob<'a> {
    /// Workspace-relative input file name; the extension tells the engine
    /// how to probe the container.
    pub input_name: &'a str,
    pub input: &'a [u8],
    pub args: Vec<String>,
    /// Workspace-relative output file name; the extension selects the
    /// output muxer.
    pub output_name: &'a str,
}

/// An external media engine. Implementations must clean up any scratch
/// state on success and on failure.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn run(&self, job: EngineJob<'_>) -> Result<Vec<u8>>;
}

/// Production engine: the `ffmpeg` binary invoked with a per-job temporary
/// workspace.
pub struct FfmpegEngine;

impl FfmpegEngine {
    /// Probe the `ffmpeg` binary and return a ready engine.
    pub async fn load() -> Result<Arc<dyn MediaEngine>> {
        let output = Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                Error::EngineLoad(format!(
                    "ffmpeg not found (is it installed and in PATH?): {e}"
                ))
            })?;
        if !output.status.success() {
            return Err(Error::EngineLoad(format!(
                "ffmpeg -version exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().next() {
            log::info!("Media engine ready: {first_line}");
        }
        Ok(Arc::new(FfmpegEngine))
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn run(&self, job: EngineJob<'_>) -> Result<Vec<u8>> {
        // The workspace directory is removed when this guard drops, on the
        // success and failure paths alike; removal errors are swallowed.
        let workspace = tempfile::tempdir()
            .map_err(|e| Error::Processing(format!("failed to create engine workspace: {e}")))?;

        let input_path = workspace.path().join(job.input_name);
        let output_path = workspace.path().join(job.output_name);
        tokio::fs::write(&input_path, job.input)
            .await
            .map_err(|e| Error::Processing(format!("failed to stage engine input: {e}")))?;

        let output = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-y")
            .arg("-i")
            .arg(&input_path)
            .args(&job.args)
            .arg(&output_path)
            .output()
            .await
            .map_err(|e| Error::Processing(format!("failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Processing(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        tokio::fs::read(&output_path)
            .await
            .map_err(|e| Error::Processing(format!("engine produced no readable output: {e}")))
    }
}

/// Last few lines of an engine stderr dump — the part that actually names
/// the failure.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(4);
    lines[start..].join(" | ")
}

type EngineLoader =
    Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<Arc<dyn MediaEngine>>> + Send>> + Send + Sync>;

/// Memoized handle to the shared media engine.
///
/// ```rust,no_run
/// use metastrip::video::engine::EngineHandle;
///
/// # async fn example() -> metastrip::Result<()> {
/// let handle = EngineHandle::new(); // loads ffmpeg on first use
/// let engine = handle.engine().await?;
/// # let _ = engine;
/// # Ok(())
/// # }
/// ```
pub struct EngineHandle {
    cell: OnceCell<Arc<dyn MediaEngine>>,
    loader: EngineLoader,
}

impl EngineHandle {
    /// A handle backed by [`FfmpegEngine`].
    pub fn new() -> Self {
        Self::with_loader(FfmpegEngine::load)
    }

    /// A handle with a custom loader — used by tests and by hosts that
    /// supply their own engine.
    pub fn with_loader<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn MediaEngine>>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Box::new(move || Box::pin(loader())),
        }
    }

    /// The shared engine, loading it on first use. Concurrent first calls
    /// coalesce into one load; a failed load leaves the handle unset, so
    /// the next call retries a fresh initialization.
    pub async fn engine(&self) -> Result<Arc<dyn MediaEngine>> {
        self.cell.get_or_try_init(|| (self.loader)()).await.cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}
