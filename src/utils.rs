use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use std::time::SystemTime;

/// First line of an HTTP request, split into method and raw target path.
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
}

/// Parses `"GET /video/a.mp4 HTTP/1.1"` into its method and target. Returns
/// `None` for anything that does not look like a request line.
pub fn parse_request_line(line: &str) -> Option<RequestLine<'_>> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if !target.starts_with('/') {
        return None;
    }
    Some(RequestLine { method, target })
}

/// Percent-decodes a request path, dropping any query string first. Returns
/// `None` when the decoded bytes are not valid UTF-8.
pub fn decode_path(target: &str) -> Option<String> {
    let path = target.split(['?', '#']).next().unwrap_or(target);
    percent_decode_str(path)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

// Helper to percent-encode path segments for hrefs.
pub fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn encode_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '"' => "%22".to_string(),
            '#' => "%23".to_string(),
            '%' => "%25".to_string(),
            '&' => "%26".to_string(),
            '?' => "%3F".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Formats a timestamp as an IMF-fixdate for `Last-Modified` headers.
pub fn http_date(time: SystemTime) -> String {
    let datetime: DateTime<Utc> = time.into();
    datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parses an `If-Modified-Since` style date. The RFC 2822 parser accepts the
/// IMF-fixdate form including the obsolete `GMT` zone name.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

/// Whether a cached artifact at `modified` is still current against an
/// `If-Modified-Since` header, at whole-second granularity (HTTP dates carry
/// no sub-second precision).
pub fn not_modified_since(modified: SystemTime, header: &str) -> bool {
    let Some(since) = parse_http_date(header) else {
        return false;
    };
    match (
        modified.duration_since(SystemTime::UNIX_EPOCH),
        since.duration_since(SystemTime::UNIX_EPOCH),
    ) {
        (Ok(modified), Ok(since)) => modified.as_secs() <= since.as_secs(),
        _ => false,
    }
}
