use crate::error::AppError;
use crate::fs::{generate_directory_listing, is_media};
use crate::range::{self, RangeOutcome};
use crate::resolve::resolve;
use crate::response::{create_error_response, get_mime_type, redirect, write_head, HttpResponse};
use crate::server::ServerContext;
use crate::stream::{copy_chunks, StreamDescriptor};
use crate::templates::TemplateEngine;
use crate::utils::{decode_path, not_modified_since, parse_request_line, percent_encode_path};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::TcpStream;
use std::path::Path;

/// Handles a single client connection: reads one request, routes it, and
/// converts any [`AppError`] into a well-formed error response.
pub fn handle_client(mut stream: TcpStream, ctx: &ServerContext, log_prefix: &str) {
    let request = match read_request(&stream) {
        Ok(request) => request,
        Err(AppError::Io(e)) => {
            debug!("{log_prefix} Failed to read request: {e}");
            return;
        }
        Err(err) => {
            respond_with_error(&mut stream, &err, log_prefix);
            return;
        }
    };

    debug!(
        "{} {} {}",
        log_prefix, request.method, request.path
    );

    if let Err(err) = route(&mut stream, ctx, &request, log_prefix) {
        match &err {
            AppError::Io(e) => warn!("{log_prefix} IO error handling request: {e}"),
            AppError::InternalServerError(msg) => warn!("{log_prefix} {msg}"),
            _ => debug!("{log_prefix} Request rejected: {err}"),
        }
        respond_with_error(&mut stream, &err, log_prefix);
    }
}

struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

/// Reads the request line and headers. Header names are lowercased so
/// lookups are case-insensitive.
fn read_request(stream: &TcpStream) -> Result<Request, AppError> {
    let reader = BufReader::new(stream);
    let mut lines = reader.lines();

    let request_line = match lines.next() {
        Some(Ok(line)) => line,
        Some(Err(e)) => return Err(AppError::Io(e)),
        None => return Err(AppError::BadRequest),
    };
    let parsed = parse_request_line(&request_line).ok_or(AppError::BadRequest)?;
    let method = parsed.method.to_string();
    let path = decode_path(parsed.target).ok_or(AppError::BadRequest)?;

    let mut headers = HashMap::new();
    for line in lines {
        let line = line?;
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    Ok(Request {
        method,
        path,
        headers,
    })
}

fn route(
    stream: &mut TcpStream,
    ctx: &ServerContext,
    request: &Request,
    log_prefix: &str,
) -> Result<(), AppError> {
    if request.method != "GET" && request.method != "HEAD" {
        return Err(AppError::MethodNotAllowed);
    }
    let head_only = request.method == "HEAD";

    let path = request.path.as_str();
    if path == "/" {
        return redirect("/browse/").send(stream, log_prefix);
    }

    if let Some(rel) = strip_route(path, "/video") {
        return serve_video(stream, ctx, rel, &request.headers, head_only, log_prefix);
    }
    if let Some(rel) = strip_route(path, "/thumb").or_else(|| strip_route(path, "/thumbnail")) {
        if head_only {
            return Err(AppError::MethodNotAllowed);
        }
        return serve_thumbnail(stream, ctx, rel, &request.headers, log_prefix);
    }
    if head_only {
        return Err(AppError::MethodNotAllowed);
    }
    if let Some(rel) = strip_route(path, "/browse") {
        return serve_browse(stream, ctx, rel, log_prefix);
    }
    if let Some(rel) = strip_route(path, "/watch") {
        return serve_watch(stream, ctx, rel, log_prefix);
    }

    Err(AppError::NotFound)
}

/// Splits `/video/a/b.mp4` into the relative remainder `a/b.mp4` for the
/// given route prefix. `/video` alone and `/video/` both map to the empty
/// relative path.
fn strip_route<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix('/')
    }
}

/// Streams a file, honoring a single-range `Range` header. HEAD answers with
/// the exact headers a GET would carry and never opens the file body.
fn serve_video(
    stream: &mut TcpStream,
    ctx: &ServerContext,
    rel: &str,
    headers: &HashMap<String, String>,
    head_only: bool,
    log_prefix: &str,
) -> Result<(), AppError> {
    let path = resolve(&ctx.media_root, rel)?;
    let metadata = fs::metadata(&path).map_err(AppError::from_fs)?;
    if !metadata.is_file() {
        return Err(AppError::NotFound);
    }
    let size = metadata.len();

    let byte_range = match headers.get("range") {
        Some(header) => match range::parse(header, size, ctx.overshoot) {
            RangeOutcome::Satisfiable(r) => Some(r),
            RangeOutcome::Unsatisfiable => return Err(AppError::RangeUnsatisfiable(size)),
            RangeOutcome::Ignored => None,
        },
        None => None,
    };

    let content_type = get_mime_type(&path);
    let descriptor = StreamDescriptor::new(path, &metadata, content_type, byte_range);
    let response_headers = descriptor.headers("private, max-age=3600");

    if head_only {
        write_head(stream, descriptor.status(), &response_headers)?;
        return Ok(());
    }

    // Open before committing to the status line, in case the file vanished
    // since the metadata call.
    let reader = descriptor.open(ctx.chunk_size).map_err(AppError::from_fs)?;
    write_head(stream, descriptor.status(), &response_headers)?;

    match copy_chunks(reader, stream) {
        Ok(written) => {
            info!(
                "{} Streamed {written} of {} planned bytes from '{}'",
                log_prefix,
                descriptor.planned_length(),
                descriptor.path.display()
            );
            Ok(())
        }
        Err(e) if is_disconnect(&e) => {
            debug!("{log_prefix} Peer disconnected mid-stream: {e}");
            Ok(())
        }
        // The status line is already on the wire; the most we can do is
        // stop and release the handle.
        Err(e) => {
            warn!("{log_prefix} Stream aborted: {e}");
            Ok(())
        }
    }
}

fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

/// Serves the cached thumbnail for a media file, generating it on demand.
fn serve_thumbnail(
    stream: &mut TcpStream,
    ctx: &ServerContext,
    rel: &str,
    headers: &HashMap<String, String>,
    log_prefix: &str,
) -> Result<(), AppError> {
    let source = resolve(&ctx.media_root, rel)?;
    if !file_name_is_media(&source, ctx) {
        return Err(AppError::NotFound);
    }

    let thumb = ctx.thumbnailer.ensure(&source, rel)?;
    let metadata = fs::metadata(&thumb).map_err(AppError::from_fs)?;

    let descriptor = StreamDescriptor::new(thumb, &metadata, "image/jpeg", None);
    let response_headers = descriptor.headers("public, max-age=604800");

    if let (Some(modified), Some(since)) = (descriptor.modified, headers.get("if-modified-since")) {
        if not_modified_since(modified, since) {
            debug!("{log_prefix} Thumbnail not modified since '{since}'");
            write_head(stream, (304, "Not Modified"), &[])?;
            return Ok(());
        }
    }

    let reader = descriptor.open(ctx.chunk_size).map_err(AppError::from_fs)?;
    write_head(stream, descriptor.status(), &response_headers)?;
    match copy_chunks(reader, stream) {
        Ok(_) => Ok(()),
        Err(e) if is_disconnect(&e) => {
            debug!("{log_prefix} Peer disconnected mid-thumbnail: {e}");
            Ok(())
        }
        Err(e) => {
            warn!("{log_prefix} Thumbnail stream aborted: {e}");
            Ok(())
        }
    }
}

fn file_name_is_media(path: &Path, ctx: &ServerContext) -> bool {
    path.file_name()
        .map(|name| is_media(&name.to_string_lossy(), &ctx.media_patterns))
        .unwrap_or(false)
}

/// Directory listing page.
fn serve_browse(
    stream: &mut TcpStream,
    ctx: &ServerContext,
    rel: &str,
    log_prefix: &str,
) -> Result<(), AppError> {
    let dir = resolve(&ctx.media_root, rel)?;
    let metadata = fs::metadata(&dir).map_err(AppError::from_fs)?;
    if !metadata.is_dir() {
        return Err(AppError::NotFound);
    }

    let html = generate_directory_listing(&dir, rel, &ctx.media_patterns)?;
    HttpResponse::new(200, "OK")
        .with_html_body(html)
        .send(stream, log_prefix)
}

/// Player page for a single media file.
fn serve_watch(
    stream: &mut TcpStream,
    ctx: &ServerContext,
    rel: &str,
    log_prefix: &str,
) -> Result<(), AppError> {
    let path = resolve(&ctx.media_root, rel)?;
    let metadata = fs::metadata(&path).map_err(AppError::from_fs)?;
    if !metadata.is_file() {
        return Err(AppError::NotFound);
    }
    if !file_name_is_media(&path, ctx) {
        return Err(AppError::UnsupportedMediaType);
    }

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let encoded = percent_encode_path(rel);
    let html = TemplateEngine::new().render_watch_page(
        &format!("/video/{encoded}"),
        &format!("/thumb/{encoded}"),
        &filename,
        get_mime_type(&path),
    )?;
    HttpResponse::new(200, "OK")
        .with_html_body(html)
        .send(stream, log_prefix)
}

fn respond_with_error(stream: &mut TcpStream, err: &AppError, log_prefix: &str) {
    if let Err(e) = create_error_response(err).send(stream, log_prefix) {
        debug!("{log_prefix} Failed to deliver error response: {e}");
    }
}
