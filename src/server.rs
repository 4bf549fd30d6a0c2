use crate::cli::Cli;
use crate::error::AppError;
use crate::http::handle_client;
use crate::range::OvershootPolicy;
use crate::thumbs::Thumbnailer;
use glob::Pattern;
use log::{debug, error, info};
use rand::Rng;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use threadpool::ThreadPool;

/// Immutable per-process state shared by every request worker. The only
/// mutable shared resource is the filesystem itself.
pub struct ServerContext {
    pub media_root: PathBuf,
    pub media_patterns: Vec<Pattern>,
    pub chunk_size: usize,
    pub overshoot: OvershootPolicy,
    pub thumbnailer: Thumbnailer,
}

pub fn run_server(
    cli: Cli,
    shutdown_rx: Option<mpsc::Receiver<()>>,
    addr_tx: Option<mpsc::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    let media_root = cli
        .directory
        .canonicalize()
        .map_err(|_| AppError::DirectoryNotFound(cli.directory.to_string_lossy().into_owned()))?;
    if !media_root.is_dir() {
        return Err(AppError::DirectoryNotFound(
            cli.directory.to_string_lossy().into_owned(),
        ));
    }

    let media_patterns = cli
        .media_extensions
        .split(',')
        .map(|ext| Pattern::new(ext.trim()))
        .collect::<Result<Vec<Pattern>, _>>()?;

    let thumbnail_dir = cli
        .thumbnail_dir
        .clone()
        .unwrap_or_else(|| media_root.join(".thumbnails"));
    let thumbnailer = Thumbnailer::new(
        thumbnail_dir,
        cli.ffmpeg_path.clone(),
        cli.seek_seconds,
        cli.thumbnail_width,
    );

    let overshoot = if cli.strict_ranges {
        OvershootPolicy::Strict
    } else {
        OvershootPolicy::Clamp
    };

    let bind_address = format!("{}:{}", cli.listen, cli.port);
    let listener = TcpListener::bind(&bind_address)?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    if let Some(tx) = addr_tx {
        if tx.send(local_addr).is_err() {
            return Err(AppError::InternalServerError(
                "Failed to send server address to test thread".to_string(),
            ));
        }
    }

    info!(
        "Server listening on {} for media root '{}' (media patterns: {:?})",
        local_addr,
        media_root.display(),
        media_patterns
    );

    let pool = ThreadPool::new(cli.threads);
    let ctx = Arc::new(ServerContext {
        media_root,
        media_patterns,
        chunk_size: cli.chunk_size,
        overshoot,
        thumbnailer,
    });

    'server_loop: loop {
        if let Some(ref rx) = shutdown_rx {
            if rx.try_recv().is_ok() {
                info!("Shutdown signal received. Shutting down gracefully.");
                break 'server_loop;
            }
        }

        match listener.accept() {
            Ok((stream, _)) => {
                let ctx = Arc::clone(&ctx);

                let peer_addr = stream
                    .peer_addr()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                let request_id = generate_request_id();
                let log_prefix = format!("[ReqID: {request_id}][Peer: {peer_addr}]");

                pool.execute(move || {
                    debug!("{log_prefix} Handling client connection");
                    handle_client(stream, &ctx, &log_prefix);
                    debug!("{log_prefix} Client handled");
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
            Err(e) => {
                error!("Error accepting connection: {e}");
            }
        }
    }

    info!("Server shutting down gracefully.");
    Ok(())
}

fn generate_request_id() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}
