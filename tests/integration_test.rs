use std::fs::{self, File};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tempfile::tempdir;
use vid_sv::cli::Cli;
use vid_sv::server::run_server;

struct TestServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
    _temp_dir: tempfile::TempDir,
}

fn test_cli(directory: PathBuf) -> Cli {
    Cli {
        directory,
        listen: "127.0.0.1".to_string(),
        port: 0, // Use port 0 to let the OS pick a free port
        media_extensions: "*.mp4,*.mkv,*.webm".to_string(),
        threads: 2,
        chunk_size: 4,
        thumbnail_dir: None,
        seek_seconds: 1.5,
        thumbnail_width: 480,
        ffmpeg_path: None,
        strict_ranges: false,
        verbose: true,
        detailed_logging: true,
    }
}

fn setup_test_server(configure: impl FnOnce(&mut Cli, &Path)) -> TestServer {
    let dir = tempdir().unwrap();

    let mut movie = File::create(dir.path().join("movie.mp4")).unwrap();
    movie.write_all(b"abcdef").unwrap();

    fs::create_dir(dir.path().join("shows")).unwrap();
    let mut nested = File::create(dir.path().join("shows").join("pilot.mkv")).unwrap();
    nested.write_all(b"0123456789").unwrap();

    let mut notes = File::create(dir.path().join("notes.txt")).unwrap();
    writeln!(notes, "not a video").unwrap();

    File::create(dir.path().join(".hidden.mp4")).unwrap();

    let mut cli = test_cli(dir.path().to_path_buf());
    configure(&mut cli, dir.path());

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let (addr_tx, addr_rx) = mpsc::channel();

    let server_handle = thread::spawn(move || {
        if let Err(e) = run_server(cli, Some(shutdown_rx), Some(addr_tx)) {
            eprintln!("Server thread failed: {e}");
        }
    });

    let server_addr = addr_rx.recv().unwrap();

    TestServer {
        addr: server_addr,
        shutdown_tx,
        handle: Some(server_handle),
        _temp_dir: dir,
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown_tx.send(()).ok();
            handle.join().unwrap();
        }
    }
}

#[test]
fn test_video_range_request() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/video/movie.mp4", server.addr))
        .header(reqwest::header::RANGE, "bytes=2-4")
        .send()
        .unwrap();
    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-range"], "bytes 2-4/6");
    assert_eq!(res.headers()["content-length"], "3");
    assert_eq!(res.text().unwrap(), "cde");
}

#[test]
fn test_video_full_transfer() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/video/movie.mp4", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-length"], "6");
    assert_eq!(res.headers()["accept-ranges"], "bytes");
    assert_eq!(res.headers()["content-type"], "video/mp4");
    assert!(res.headers().contains_key("last-modified"));
    assert_eq!(res.text().unwrap(), "abcdef");
}

#[test]
fn test_video_head_request() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .head(format!("http://{}/video/movie.mp4", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-length"], "6");
    assert_eq!(res.headers()["accept-ranges"], "bytes");
    assert_eq!(res.text().unwrap(), "");
}

#[test]
fn test_video_suffix_and_open_ended_ranges() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();
    let url = format!("http://{}/video/movie.mp4", server.addr);

    let res = client
        .get(&url)
        .header(reqwest::header::RANGE, "bytes=-2")
        .send()
        .unwrap();
    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-range"], "bytes 4-5/6");
    assert_eq!(res.text().unwrap(), "ef");

    let res = client
        .get(&url)
        .header(reqwest::header::RANGE, "bytes=2-")
        .send()
        .unwrap();
    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-range"], "bytes 2-5/6");
    assert_eq!(res.text().unwrap(), "cdef");
}

#[test]
fn test_video_overshooting_end_is_clamped() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/video/movie.mp4", server.addr))
        .header(reqwest::header::RANGE, "bytes=4-100")
        .send()
        .unwrap();
    assert_eq!(res.status(), 206);
    assert_eq!(res.headers()["content-range"], "bytes 4-5/6");
    assert_eq!(res.text().unwrap(), "ef");
}

#[test]
fn test_video_nested_path() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/video/shows/pilot.mkv", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().unwrap(), "0123456789");
}

#[test]
fn test_video_not_found() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/video/ghost.mp4", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[test]
fn test_root_redirects_to_browse() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.url().path().starts_with("/browse"));
}

#[test]
fn test_browse_lists_media_and_directories_only() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/browse/", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    let body = res.text().unwrap();
    assert!(body.contains("movie.mp4"));
    assert!(body.contains("shows/"));
    assert!(!body.contains("notes.txt"));
    assert!(!body.contains(".hidden.mp4"));
}

#[test]
fn test_browse_missing_directory() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/browse/no-such-dir", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[test]
fn test_watch_page_embeds_player() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/watch/movie.mp4", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 200);
    let body = res.text().unwrap();
    assert!(body.contains("<video"));
    assert!(body.contains("/video/movie.mp4"));
    assert!(body.contains("video/mp4"));
}

#[test]
fn test_watch_non_media_file_is_unsupported() {
    let server = setup_test_server(|_, _| {});
    let client = reqwest::blocking::Client::new();

    let res = client
        .get(format!("http://{}/watch/notes.txt", server.addr))
        .send()
        .unwrap();
    assert_eq!(res.status(), 415);
}

#[cfg(unix)]
mod thumbnails {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn install_fake_extractor(dir: &Path) -> (PathBuf, PathBuf) {
        let counter = dir.join("extractor-runs.log");
        let script_path = dir.join("fake-ffmpeg");
        let script = format!(
            "#!/bin/sh\necho run >> \"{}\"\nfor last; do :; done\nprintf 'JPEGDATA' > \"$last\"\n",
            counter.display()
        );
        fs::write(&script_path, script).unwrap();
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).unwrap();
        (script_path, counter)
    }

    #[test]
    fn test_thumbnail_generated_once_and_cached() {
        let mut counter_path = PathBuf::new();
        let server = setup_test_server(|cli, dir| {
            let (script, counter) = install_fake_extractor(dir);
            cli.ffmpeg_path = Some(script);
            counter_path = counter;
        });
        let client = reqwest::blocking::Client::new();
        let url = format!("http://{}/thumb/movie.mp4", server.addr);

        let res = client.get(&url).send().unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "image/jpeg");
        assert!(res.headers().contains_key("last-modified"));
        assert_eq!(res.text().unwrap(), "JPEGDATA");

        // Second request hits the cache, the extractor does not run again.
        let res = client.get(&url).send().unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().unwrap(), "JPEGDATA");
        let runs = fs::read_to_string(&counter_path).unwrap().lines().count();
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_thumbnail_alias_route() {
        let server = setup_test_server(|cli, dir| {
            let (script, _) = install_fake_extractor(dir);
            cli.ffmpeg_path = Some(script);
        });
        let client = reqwest::blocking::Client::new();

        let res = client
            .get(format!("http://{}/thumbnail/movie.mp4", server.addr))
            .send()
            .unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "image/jpeg");
    }

    #[test]
    fn test_thumbnail_conditional_revalidation() {
        let server = setup_test_server(|cli, dir| {
            let (script, _) = install_fake_extractor(dir);
            cli.ffmpeg_path = Some(script);
        });
        let client = reqwest::blocking::Client::new();
        let url = format!("http://{}/thumb/movie.mp4", server.addr);

        let res = client.get(&url).send().unwrap();
        assert_eq!(res.status(), 200);
        let last_modified = res.headers()["last-modified"].to_str().unwrap().to_string();

        let res = client
            .get(&url)
            .header(reqwest::header::IF_MODIFIED_SINCE, last_modified)
            .send()
            .unwrap();
        assert_eq!(res.status(), 304);
        assert_eq!(res.text().unwrap(), "");
    }

    #[test]
    fn test_thumbnail_unavailable_extractor_returns_404() {
        let server = setup_test_server(|cli, dir| {
            // Present on disk but not executable, so generation always fails.
            let stub = dir.join("ffmpeg-stub");
            fs::write(&stub, "not a binary").unwrap();
            fs::set_permissions(&stub, fs::Permissions::from_mode(0o644)).unwrap();
            cli.ffmpeg_path = Some(stub);
            cli.thumbnail_dir = Some(dir.join("thumb-cache"));
        });
        let client = reqwest::blocking::Client::new();

        let res = client
            .get(format!("http://{}/thumb/movie.mp4", server.addr))
            .send()
            .unwrap();
        assert_eq!(res.status(), 404);

        // No partially written files in the cache directory.
        let cache = server._temp_dir.path().join("thumb-cache");
        let leftovers: Vec<_> = fs::read_dir(&cache)
            .map(|entries| entries.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "leftover files: {leftovers:?}");
    }

    #[test]
    fn test_thumbnail_of_non_media_file_returns_404() {
        let server = setup_test_server(|cli, dir| {
            let (script, _) = install_fake_extractor(dir);
            cli.ffmpeg_path = Some(script);
        });
        let client = reqwest::blocking::Client::new();

        let res = client
            .get(format!("http://{}/thumb/notes.txt", server.addr))
            .send()
            .unwrap();
        assert_eq!(res.status(), 404);
    }
}
