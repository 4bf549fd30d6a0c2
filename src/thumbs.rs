//! On-demand thumbnail extraction with an mtime-invalidated cache.
//!
//! Thumbnails live under a cache root mirroring the media tree's relative
//! structure, one `.jpg` per source file. Freshness is recomputed from the
//! filesystem on every access: a cached image is valid iff it exists and its
//! mtime is at least the source's mtime. Generation shells out to ffmpeg for
//! a single frame, writes into a temporary file next to the destination and
//! atomically renames it into place, so a partially written image is never
//! visible under its final name. Concurrent requests for the same missing
//! thumbnail may each generate independently; the rename is the only point
//! of visibility and the last writer wins.

use crate::error::AppError;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct Thumbnailer {
    cache_root: PathBuf,
    ffmpeg: Option<PathBuf>,
    seek_seconds: f64,
    width: u32,
}

impl Thumbnailer {
    /// Uses `ffmpeg_path` when it points at an existing file, otherwise
    /// searches PATH. A missing extractor is not fatal here; every thumbnail
    /// request will simply answer 404 until one appears.
    pub fn new(
        cache_root: PathBuf,
        ffmpeg_path: Option<PathBuf>,
        seek_seconds: f64,
        width: u32,
    ) -> Self {
        let ffmpeg = match ffmpeg_path {
            Some(p) if p.is_file() => Some(p),
            Some(p) => {
                warn!(
                    "Configured ffmpeg path '{}' does not exist, falling back to PATH",
                    p.display()
                );
                which::which("ffmpeg").ok()
            }
            None => which::which("ffmpeg").ok(),
        };
        match &ffmpeg {
            Some(p) => info!("Thumbnail extractor: {}", p.display()),
            None => warn!("ffmpeg not found; thumbnail requests will return 404"),
        }
        Thumbnailer {
            cache_root,
            ffmpeg,
            seek_seconds,
            width,
        }
    }

    /// Cache location for a source file's already-validated relative path:
    /// the same path under the cache root with the extension fixed to `jpg`.
    pub fn cache_path(&self, relative: &str) -> PathBuf {
        let mut path = self.cache_root.clone();
        for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
            path.push(segment);
        }
        path.set_extension("jpg");
        path
    }

    /// Returns a fresh thumbnail for `source`, generating one when it is
    /// absent or older than the source. The freshness check is best-effort,
    /// not transactional: a source modified between check and generation is
    /// caught on the next request.
    pub fn ensure(&self, source: &Path, relative: &str) -> Result<PathBuf, AppError> {
        let source_meta = fs::metadata(source).map_err(AppError::from_fs)?;
        if !source_meta.is_file() {
            return Err(AppError::NotFound);
        }
        let source_mtime = source_meta.modified().map_err(AppError::from_fs)?;

        let thumb = self.cache_path(relative);
        if let Ok(thumb_meta) = fs::metadata(&thumb) {
            if thumb_meta.modified().is_ok_and(|t| t >= source_mtime) {
                debug!("Thumbnail cache hit for '{relative}'");
                return Ok(thumb);
            }
            debug!("Thumbnail for '{relative}' is stale, regenerating");
        }

        self.generate(source, &thumb)?;
        Ok(thumb)
    }

    fn generate(&self, source: &Path, thumb: &Path) -> Result<(), AppError> {
        let Some(ffmpeg) = &self.ffmpeg else {
            warn!(
                "No thumbnail for '{}': ffmpeg is not available",
                source.display()
            );
            return Err(AppError::ThumbnailUnavailable);
        };

        let parent = thumb.parent().unwrap_or(&self.cache_root);
        fs::create_dir_all(parent).map_err(AppError::from_fs)?;

        // The temp file lives in the destination directory so the final
        // rename stays on one filesystem and therefore atomic. Dropping it
        // on any failure path below removes it.
        let temp = tempfile::Builder::new()
            .prefix(".thumb-")
            .suffix(".jpg")
            .tempfile_in(parent)
            .map_err(AppError::from_fs)?;

        let output = Command::new(ffmpeg)
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.3}", self.seek_seconds))
            .arg("-i")
            .arg(source)
            .arg("-frames:v")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={}:-2", self.width))
            .arg("-f")
            .arg("image2")
            .arg(temp.path())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Failed to launch ffmpeg for '{}': {e}",
                    source.display()
                );
                return Err(AppError::ThumbnailUnavailable);
            }
        };

        if !output.status.success() {
            warn!(
                "ffmpeg exited with {} for '{}': {}",
                output.status,
                source.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(AppError::ThumbnailUnavailable);
        }

        // ffmpeg can exit 0 with an empty output when the seek offset lies
        // past the end of a very short clip.
        if temp.as_file().metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            warn!(
                "ffmpeg produced an empty thumbnail for '{}'",
                source.display()
            );
            return Err(AppError::ThumbnailUnavailable);
        }

        temp.persist(thumb).map_err(|e| {
            warn!(
                "Failed to install thumbnail '{}': {}",
                thumb.display(),
                e.error
            );
            AppError::from_fs(e.error)
        })?;

        info!(
            "Generated thumbnail '{}' from '{}'",
            thumb.display(),
            source.display()
        );
        Ok(())
    }
}
