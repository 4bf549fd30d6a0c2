use clap::Parser;
use std::path::PathBuf;

/// Command-line interface for the media streaming server.
#[derive(Parser, Clone)]
#[command(
    version,
    long_about = "Serves a directory tree of media files over HTTP with byte-range support for seeking.\n\
Directories are browsable, individual files are streamed through /video/ with single-range\n\
(bytes=) partial-content handling, and /thumb/ returns a cached still frame extracted with\n\
ffmpeg. Thumbnails are regenerated whenever the source file is newer than the cached image.",
    about = "A media streaming server with range requests and cached thumbnails."
)]
pub struct Cli {
    /// Media root directory to serve, mandatory.
    #[arg(short, long, required = true)]
    pub directory: PathBuf,

    /// Host address to listen on (e.g., "127.0.0.1", "0.0.0.0").
    #[arg(short, long, default_value = "127.0.0.1")]
    pub listen: String,

    /// Port number to listen on.
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// File patterns treated as playable media (comma-separated, supports wildcards).
    #[arg(
        short,
        long,
        default_value = "*.mp4,*.m4v,*.mkv,*.webm,*.mov,*.avi,*.wmv"
    )]
    pub media_extensions: String,

    /// Number of threads in the thread pool.
    #[arg(short, long, default_value_t = 8)]
    pub threads: usize,

    /// Chunk size for streaming file bodies (in bytes).
    #[arg(short, long, default_value_t = 1024 * 1024)]
    pub chunk_size: usize,

    /// Directory for generated thumbnails. Defaults to ".thumbnails" under the media root.
    #[arg(long)]
    pub thumbnail_dir: Option<PathBuf>,

    /// Seek offset (seconds) into the source for the thumbnail frame.
    #[arg(long, default_value_t = 1.5)]
    pub seek_seconds: f64,

    /// Target pixel width of generated thumbnails.
    #[arg(long, default_value_t = 480)]
    pub thumbnail_width: u32,

    /// Path to the ffmpeg binary. Searched on PATH when not given.
    #[arg(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Reject Range requests whose end overshoots the file instead of clamping.
    #[arg(long, default_value_t = false)]
    pub strict_ranges: bool,

    /// Enable verbose logging for debugging (log level: debug).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Enable more detailed logging (log level: info if verbose=false, debug if verbose=true).
    #[arg(long, default_value_t = false)]
    pub detailed_logging: bool,
}
