use crate::error::AppError;
use crate::templates::TemplateEngine;
use log::{debug, error};
use std::io::prelude::*;
use std::net::TcpStream;
use std::path::Path;

pub const SERVER_ID: &str = concat!("vid_sv/", env!("CARGO_PKG_VERSION"));

/// Native MIME type detection for the file types the server deals in.
pub fn get_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("vtt") => "text/vtt",
        Some("srt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// HTTP response builder for page-sized bodies (listings, player pages,
/// error pages). Streamed file bodies bypass this and use [`write_head`].
pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![
                ("Server".to_string(), SERVER_ID.to_string()),
                ("Connection".to_string(), "close".to_string()),
                ("Cache-Control".to_string(), "no-cache".to_string()),
            ],
            body: Vec::new(),
        }
    }

    pub fn with_html_body(mut self, body: String) -> Self {
        self.headers.push((
            "Content-Type".to_string(),
            "text/html; charset=utf-8".to_string(),
        ));
        self.body = body.into_bytes();
        self
    }

    pub fn add_header(mut self, name: String, value: String) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn send(self, stream: &mut TcpStream, log_prefix: &str) -> Result<(), AppError> {
        debug!(
            "{} Sending response - Status: {}, Body Length: {}",
            log_prefix,
            self.status_code,
            self.body.len()
        );

        let mut response = format!("HTTP/1.1 {} {}\r\n", self.status_code, self.status_text);
        response.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        for (name, value) in &self.headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str("\r\n");

        stream.write_all(response.as_bytes()).map_err(|e| {
            error!("{log_prefix} Failed to write response headers: {e}");
            AppError::Io(e)
        })?;

        if !self.body.is_empty() {
            stream.write_all(&self.body).map_err(|e| {
                error!("{log_prefix} Failed to write response body: {e}");
                AppError::Io(e)
            })?;
        }

        stream.flush().map_err(|e| {
            error!("{log_prefix} Failed to flush response: {e}");
            AppError::Io(e)
        })?;

        Ok(())
    }
}

/// Writes a status line plus headers and the terminating blank line, leaving
/// the stream positioned for a hand-written body (or none, for HEAD/304).
pub fn write_head(
    stream: &mut TcpStream,
    status: (u16, &str),
    headers: &[(String, String)],
) -> std::io::Result<()> {
    let (code, text) = status;
    let mut head = format!("HTTP/1.1 {code} {text}\r\n");
    head.push_str(&format!("Server: {SERVER_ID}\r\n"));
    head.push_str("Connection: close\r\n");
    for (name, value) in headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes())
}

/// 302 redirect.
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::new(302, "Found").add_header("Location".to_string(), location.to_string())
}

/// Maps an [`AppError`] onto a complete response.
///
/// A 416 carries `Content-Range: bytes */{size}` and no body, so the headers
/// stay correct even on the error path. Everything else renders the embedded
/// error page.
pub fn create_error_response(err: &AppError) -> HttpResponse {
    let (status_code, status_text) = err.status();

    if let AppError::RangeUnsatisfiable(size) = err {
        return HttpResponse::new(status_code, status_text)
            .add_header("Content-Range".to_string(), format!("bytes */{size}"))
            .add_header("Accept-Ranges".to_string(), "bytes".to_string());
    }

    let page = TemplateEngine::new()
        .render_error_page(status_code, status_text)
        .unwrap_or_else(|_| format!("<html><body><h1>{status_code} {status_text}</h1></body></html>"));
    HttpResponse::new(status_code, status_text).with_html_body(page)
}
