//! Range-aware file body streaming.
//!
//! A [`StreamDescriptor`] is the fully validated plan for one response: which
//! file, how big, which slice of it, which content type. It is produced once
//! per request and never mutated; the response headers are a pure function of
//! it, and the body (when one is wanted at all) comes from a [`ChunkReader`]
//! built from the same plan. HEAD requests use the descriptor alone, so no
//! file handle is opened for them.

use crate::range::ByteRange;
use crate::utils::http_date;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Validated plan for a single streamed response.
pub struct StreamDescriptor {
    pub path: PathBuf,
    pub total_size: u64,
    pub content_type: &'static str,
    pub range: Option<ByteRange>,
    pub modified: Option<SystemTime>,
}

impl StreamDescriptor {
    /// Builds a descriptor from metadata the caller already fetched, without
    /// opening the file. `range` must already be validated against this
    /// file's size.
    pub fn new(
        path: PathBuf,
        metadata: &std::fs::Metadata,
        content_type: &'static str,
        range: Option<ByteRange>,
    ) -> Self {
        StreamDescriptor {
            path,
            total_size: metadata.len(),
            content_type,
            range,
            modified: metadata.modified().ok(),
        }
    }

    pub fn status(&self) -> (u16, &'static str) {
        match self.range {
            Some(_) => (206, "Partial Content"),
            None => (200, "OK"),
        }
    }

    /// Exact number of body bytes this response promises.
    pub fn planned_length(&self) -> u64 {
        match self.range {
            Some(range) => range.length(),
            None => self.total_size,
        }
    }

    /// Response headers, derived purely from the plan. `Content-Range` only
    /// appears on ranged (206) responses. `Last-Modified` lets clients
    /// revalidate after the same name starts pointing at different bytes.
    pub fn headers(&self, cache_control: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), self.content_type.to_string()),
            (
                "Content-Length".to_string(),
                self.planned_length().to_string(),
            ),
            ("Accept-Ranges".to_string(), "bytes".to_string()),
            ("Cache-Control".to_string(), cache_control.to_string()),
        ];
        if let Some(range) = self.range {
            headers.push((
                "Content-Range".to_string(),
                format!("bytes {}-{}/{}", range.start, range.end, self.total_size),
            ));
        }
        if let Some(modified) = self.modified {
            headers.push(("Last-Modified".to_string(), http_date(modified)));
        }
        headers
    }

    /// Opens the body stream for this plan.
    pub fn open(&self, chunk_size: usize) -> io::Result<ChunkReader> {
        let (start, length) = match self.range {
            Some(range) => (range.start, range.length()),
            None => (0, self.total_size),
        };
        ChunkReader::open(&self.path, start, length, chunk_size)
    }
}

/// Finite, forward-only sequence of byte chunks read from one file.
///
/// Emits at most `chunk_size` bytes per item until exactly `length` bytes
/// have been produced, or the file runs dry early (a concurrently truncated
/// file ends the stream short instead of erroring). The handle is released
/// when the reader is dropped, on every exit path including an abandoned
/// iteration.
pub struct ChunkReader {
    file: File,
    remaining: u64,
    chunk_size: usize,
}

impl ChunkReader {
    pub fn open(path: &Path, start: u64, length: u64, chunk_size: usize) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(ChunkReader {
            file,
            remaining: length,
            chunk_size: chunk_size.max(1),
        })
    }
}

impl Iterator for ChunkReader {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let to_read = self.remaining.min(self.chunk_size as u64) as usize;
        let mut buffer = vec![0; to_read];
        match self.file.read(&mut buffer) {
            Ok(0) => {
                // Short file; end the stream rather than erroring.
                self.remaining = 0;
                None
            }
            Ok(n) => {
                buffer.truncate(n);
                self.remaining -= n as u64;
                Some(Ok(buffer))
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.next(),
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Pumps the planned bytes into `writer`, returning the count actually
/// written. A write failure (the peer hung up mid-stream) stops the loop
/// immediately so the file handle is released instead of reading on into a
/// dead connection.
pub fn copy_chunks<W: Write>(reader: ChunkReader, writer: &mut W) -> io::Result<u64> {
    let mut written = 0u64;
    for chunk in reader {
        let chunk = chunk?;
        writer.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    writer.flush()?;
    Ok(written)
}
