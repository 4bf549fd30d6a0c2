//! Parsing of HTTP `Range` request headers against a known file size.

/// Inclusive byte interval into a file. Invariant: `start <= end < size` of
/// the file it was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// What to do when the end offset of `bytes=start-end` overshoots the file.
/// Players conventionally expect the permissive clamp, but deployments can
/// opt into strict rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvershootPolicy {
    Clamp,
    Strict,
}

/// Outcome of parsing a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// A valid single range; respond 206.
    Satisfiable(ByteRange),
    /// Syntactically a bytes-range but impossible against this file;
    /// respond 416 with `Content-Range: bytes */{size}`.
    Unsatisfiable,
    /// Not a range request we recognize (foreign unit, multiple ranges).
    /// Ignore the header and respond with a full 200 transfer.
    Ignored,
}

/// Parses the three single-range forms `bytes=start-end`, `bytes=start-` and
/// `bytes=-suffix`. Anything not starting with the `bytes=` unit token, or
/// carrying a comma (multi-range), is [`RangeOutcome::Ignored`] per the HTTP
/// convention that unrecognized Range headers fall back to a full transfer.
pub fn parse(header: &str, file_size: u64, policy: OvershootPolicy) -> RangeOutcome {
    let ranges = match strip_unit(header.trim()) {
        Some(rest) => rest.trim(),
        None => return RangeOutcome::Ignored,
    };
    if ranges.contains(',') {
        return RangeOutcome::Ignored;
    }

    let (start_str, end_str) = match ranges.split_once('-') {
        Some(parts) => parts,
        None => return RangeOutcome::Unsatisfiable,
    };

    if start_str.is_empty() {
        // bytes=-suffix: the last `suffix` bytes of the file.
        return match end_str.parse::<u64>() {
            Ok(suffix) if suffix > 0 && file_size > 0 => RangeOutcome::Satisfiable(ByteRange {
                start: file_size.saturating_sub(suffix),
                end: file_size - 1,
            }),
            _ => RangeOutcome::Unsatisfiable,
        };
    }

    let start = match start_str.parse::<u64>() {
        Ok(n) => n,
        Err(_) => return RangeOutcome::Unsatisfiable,
    };
    if start >= file_size {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if end_str.is_empty() {
        file_size - 1
    } else {
        match end_str.parse::<u64>() {
            Ok(n) => n,
            Err(_) => return RangeOutcome::Unsatisfiable,
        }
    };
    if end < start {
        return RangeOutcome::Unsatisfiable;
    }
    if end >= file_size && policy == OvershootPolicy::Strict {
        return RangeOutcome::Unsatisfiable;
    }

    RangeOutcome::Satisfiable(ByteRange {
        start,
        end: end.min(file_size - 1),
    })
}

fn strip_unit(header: &str) -> Option<&str> {
    let unit = header.get(..6)?;
    if unit.eq_ignore_ascii_case("bytes=") {
        header.get(6..)
    } else {
        None
    }
}
