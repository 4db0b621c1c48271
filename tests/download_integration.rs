//! Integration tests for the download module.
//!
//! These tests verify the full download flow with mock HTTP servers.

use std::io::Write;
use std::sync::{Arc, Mutex};

use dirdl_core::download::{DownloadError, HttpClient, Progress, ProgressCallback};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

fn counting_callback() -> (ProgressCallback, Arc<Mutex<Vec<Progress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |p: &Progress| {
        sink.lock().expect("progress lock").push(p.clone());
    });
    (callback, seen)
}

#[tokio::test]
async fn test_download_full_flow_preserves_content() {
    let content = b"This is the complete file content for testing.\nLine 2.\nLine 3.";
    let mock_server = setup_mock_file("/files/SNES/notes.txt", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let client = HttpClient::new();
    let url = format!("{}/files/SNES/notes.txt", mock_server.uri());
    let result = client.download_file(&url, temp_dir.path(), None).await;

    assert!(
        result.is_ok(),
        "Download should succeed: {:?}",
        result.err()
    );
    let file_path = result.unwrap();
    let downloaded_content = std::fs::read(&file_path).expect("should read file");
    assert_eq!(
        downloaded_content, content,
        "Downloaded content should match original"
    );
}

#[tokio::test]
async fn test_download_large_file_streams_in_chunks() {
    let content: Vec<u8> = (0..2 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let mock_server = setup_mock_file("/big.bin", &content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let (callback, seen) = counting_callback();

    let client = HttpClient::new();
    let file_path = client
        .download_file(
            &format!("{}/big.bin", mock_server.uri()),
            temp_dir.path(),
            Some(&callback),
        )
        .await
        .expect("download should succeed");

    assert_eq!(std::fs::metadata(&file_path).unwrap().len(), content.len() as u64);
    let seen = seen.lock().unwrap();
    assert!(seen.len() >= 2, "Expected chunk and final snapshots, got {}", seen.len());
    assert_eq!(seen.iter().filter(|p| p.is_done).count(), 1);
    assert!(seen.last().unwrap().is_done);
}

#[tokio::test]
async fn test_second_download_is_idempotent_skip() {
    let content = b"game data";
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/N64/Game.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();
    let url = format!("{}/files/N64/Game.bin", mock_server.uri());

    client
        .download_file(&url, temp_dir.path(), None)
        .await
        .expect("first download should succeed");

    let (callback, seen) = counting_callback();
    client
        .download_file(&url, temp_dir.path(), Some(&callback))
        .await
        .expect("second call should succeed");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].bytes_done, content.len() as u64);
    assert_eq!(seen[0].bytes_total, content.len() as u64);
    assert!(seen[0].is_done);
}

#[tokio::test]
async fn test_retry_recovers_after_server_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.bin"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"finally".to_vec()))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();
    let file_path = client
        .download_file_with_retry(
            &format!("{}/flaky.bin", mock_server.uri()),
            temp_dir.path(),
            None,
            3,
        )
        .await
        .expect("third attempt should succeed");

    assert_eq!(std::fs::read(file_path).unwrap(), b"finally");
}

#[tokio::test]
async fn test_retry_exhaustion_returns_http_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.zip"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();
    let result = client
        .download_file_with_retry(
            &format!("{}/gone.zip", mock_server.uri()),
            temp_dir.path(),
            None,
            2,
        )
        .await;

    match result {
        Err(DownloadError::HttpStatus { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/gone.zip"));
        }
        other => panic!("Expected HttpStatus error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();

    // Port 9 (discard) is closed on test machines
    let result = client
        .download_file("http://127.0.0.1:9/file.bin", temp_dir.path(), None)
        .await;

    assert!(
        matches!(
            result,
            Err(DownloadError::Network { .. } | DownloadError::Timeout { .. })
        ),
        "Expected network error, got: {result:?}"
    );
}

/// Serves one response announcing `declared` bytes but sending only `body`.
async fn spawn_truncating_server(declared: usize, body: &'static [u8]) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let address = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {declared}\r\nContent-Type: application/octet-stream\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.expect("write head");
        socket.write_all(body).await.expect("write body");
        socket.flush().await.expect("flush");
    });

    format!("http://{address}")
}

#[tokio::test]
async fn test_aborted_transfer_leaves_partial_file() {
    let base = spawn_truncating_server(100, b"0123456789").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let client = HttpClient::new();
    let url = format!("{base}/roms/partial.bin");

    let (callback, seen) = counting_callback();
    let result = client
        .download_file(&url, temp_dir.path(), Some(&callback))
        .await;

    assert!(
        matches!(result, Err(DownloadError::Network { .. })),
        "Expected network error, got: {result:?}"
    );
    let partial = temp_dir.path().join("partial.bin");
    assert_eq!(
        std::fs::read(&partial).expect("partial file kept"),
        b"0123456789"
    );

    let seen = seen.lock().expect("progress lock");
    let last = seen.last().expect("at least one snapshot");
    assert!(!last.is_done);
    assert!(last.error.is_some());
    assert_eq!(last.bytes_total, 100);
    drop(seen);

    // The partial file now counts as present
    let again = client
        .download_file(&url, temp_dir.path(), None)
        .await
        .expect("existing file is skipped");
    assert_eq!(again, partial);
}

#[tokio::test]
async fn test_archive_slip_entry_not_written_outside_target() {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default();
        writer.start_file("safe/inside.txt", options).unwrap();
        writer.write_all(b"inside").unwrap();
        writer.start_file("../escape.txt", options).unwrap();
        writer.write_all(b"escape").unwrap();
        writer.finish().unwrap();
    }
    let mock_server = setup_mock_file("/pack.zip", &cursor.into_inner()).await;

    let root = TempDir::new().expect("failed to create temp dir");
    let target = root.path().join("target");
    let client = HttpClient::new();
    client
        .download_file(&format!("{}/pack.zip", mock_server.uri()), &target, None)
        .await
        .expect("download and extraction should succeed");

    assert!(target.join("safe/inside.txt").exists());
    assert!(!root.path().join("escape.txt").exists());
    assert!(!target.join("pack.zip").exists());
}
