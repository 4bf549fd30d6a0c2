use crate::error::AppError;
use std::path::{Path, PathBuf};

/// Maps a percent-decoded, slash-separated request path onto a location under
/// `root`.
///
/// The input is untrusted. Validation happens segment by segment *before* the
/// join: a leading slash (absolute path) or any `..` segment is rejected
/// outright, while `.` segments and redundant slashes are dropped. The
/// surviving segments are pushed onto `root` one at a time, so no OS-level
/// normalization ever runs over the combined string. Symlinks inside the root
/// are deliberately left alone; only the lexical request path is constrained.
///
/// The returned path is not required to exist. Existence and file-type checks
/// belong to the caller, where they turn into 404s.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf, AppError> {
    if relative.starts_with('/') {
        return Err(AppError::PathRejected);
    }

    let mut resolved = root.to_path_buf();
    for segment in relative.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(AppError::PathRejected),
            _ => resolved.push(segment),
        }
    }

    Ok(resolved)
}

/// Slash-joined relative path of `name` under `base`, for building hrefs.
pub fn join_relative(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
