use crate::error::AppError;
use crate::resolve::join_relative;
use crate::templates::{html_escape, TemplateEngine};
use crate::utils::percent_encode_path;
use chrono::{DateTime, Local};
use glob::Pattern;
use humansize::{format_size, BINARY};
use log::debug;
use std::fs::{self, Metadata};
use std::path::Path;

/// Whether a file name matches one of the configured media patterns.
pub fn is_media(name: &str, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches(name))
}

/// Directory listing page for `dir`, reached via the relative request path
/// `rel_path`. Hidden entries are skipped, directories come before files,
/// and only media-pattern files are shown.
pub fn generate_directory_listing(
    dir: &Path,
    rel_path: &str,
    patterns: &[Pattern],
) -> Result<String, AppError> {
    debug!("Generating directory listing for: '{}'", dir.display());

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(AppError::from_fs)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        if !metadata.is_dir() && !is_media(&file_name, patterns) {
            continue;
        }
        entries.push((file_name, metadata));
    }

    // Directories first, then case-insensitive by name.
    entries.sort_by(|a, b| {
        match (a.1.is_dir(), b.1.is_dir()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.0.to_lowercase().cmp(&b.0.to_lowercase()),
        }
    });

    let entry_count = entries.len();
    let mut rows = String::new();
    for (name, metadata) in &entries {
        rows.push_str(&directory_row(rel_path, name, metadata));
    }

    let display_path = if rel_path.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", rel_path.trim_matches('/'))
    };

    let parent_href = parent_browse_href(rel_path);
    TemplateEngine::new().render_browse_page(
        &display_path,
        parent_href.as_deref(),
        &rows,
        entry_count,
    )
}

fn directory_row(rel_path: &str, name: &str, metadata: &Metadata) -> String {
    let rel = join_relative(rel_path, name);
    let encoded = percent_encode_path(&rel);

    let modified = metadata
        .modified()
        .ok()
        .map(|time| {
            let datetime: DateTime<Local> = time.into();
            datetime.format("%d-%m-%Y %H:%M").to_string()
        })
        .unwrap_or_else(|| "-".to_string());

    if metadata.is_dir() {
        format!(
            r#"<tr>
                <td class="thumb-cell"></td>
                <td><a href="/browse/{encoded}" class="entry-link directory">{name}/</a></td>
                <td class="size">-</td>
                <td class="date">{modified}</td>
            </tr>"#,
            name = html_escape(name),
        )
    } else {
        let size = format_size(metadata.len(), BINARY);
        format!(
            r#"<tr>
                <td class="thumb-cell"><a href="/watch/{encoded}"><img src="/thumb/{encoded}" alt="" loading="lazy"></a></td>
                <td><a href="/watch/{encoded}" class="entry-link">{name}</a></td>
                <td class="size">{size}</td>
                <td class="date">{modified}</td>
            </tr>"#,
            name = html_escape(name),
        )
    }
}

fn parent_browse_href(rel_path: &str) -> Option<String> {
    let trimmed = rel_path.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let parent = match trimmed.rsplit_once('/') {
        Some((parent, _)) => parent,
        None => "",
    };
    Some(format!("/browse/{}", percent_encode_path(parent)))
}
