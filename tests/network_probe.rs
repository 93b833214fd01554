//! Probing and source loading against local servers

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use m3u_merge::config::{ProbeConfig, SourcesConfig, StaticTables};
use m3u_merge::models::StreamHeaders;
use m3u_merge::services::{HttpTransport, ReqwestTransport, StreamProber};
use m3u_merge::sources::SourceLoader;

const PLAYLIST: &str = "#EXTM3U\n#EXTINF:-1,Local\nhttp://127.0.0.1/stream.ts\n";

/// Minimal HTTP/1.1 server; returns its base URL and the raw requests it saw
async fn serve() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                seen.lock().unwrap().push(request);

                let (status, extra, body): (&str, &str, &str) = match path.as_str() {
                    "/live.m3u8" => (
                        "200 OK",
                        "Content-Type: application/vnd.apple.mpegurl\r\n",
                        "#EXTM3U\n#EXT-X-VERSION:3\n",
                    ),
                    "/fake.m3u8" => ("200 OK", "Content-Type: text/html\r\n", "<html>not a playlist</html>"),
                    "/stream.ts" => ("200 OK", "Content-Type: video/mp2t\r\n", "GGGGGGGG"),
                    "/page" => ("200 OK", "Content-Type: text/html\r\n", "<html></html>"),
                    "/playlist.m3u" => ("200 OK", "Content-Type: audio/x-mpegurl\r\n", PLAYLIST),
                    // redirect to a dead target, no content type
                    "/moved" => ("302 Found", "Location: /gone\r\n", ""),
                    _ => ("404 Not Found", "Content-Type: text/plain\r\n", "missing"),
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\n{extra}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (base, requests)
}

fn probe_config() -> ProbeConfig {
    let mut config = ProbeConfig {
        max_attempts: 2,
        attempt_timeout: Duration::from_secs(2),
        ..ProbeConfig::default()
    };
    config.fallback.enabled = false;
    config
}

fn prober() -> StreamProber {
    let config = probe_config();
    let transport = Arc::new(ReqwestTransport::new(&config).unwrap());
    StreamProber::with_transport(&config, &StaticTables::empty(), transport, None)
}

#[tokio::test]
async fn test_http_probe_verdicts() {
    let (base, _) = serve().await;
    let prober = prober();
    let none = StreamHeaders::default();

    assert!(prober.probe(&format!("{base}/live.m3u8"), &none, 2).await);
    assert!(prober.probe(&format!("{base}/stream.ts"), &none, 2).await);
    // manifest URL whose body is not a playlist
    assert!(!prober.probe(&format!("{base}/fake.m3u8"), &none, 2).await);
    assert!(!prober.probe(&format!("{base}/page"), &none, 2).await);
    assert!(!prober.probe(&format!("{base}/missing"), &none, 2).await);
}

#[tokio::test]
async fn test_redirect_status_is_judged_without_following() {
    let (base, requests) = serve().await;
    let prober = prober();

    assert!(prober.probe(&format!("{base}/moved"), &StreamHeaders::default(), 1).await);
    // the redirect target was never requested
    let seen = requests.lock().unwrap().join("\n");
    assert!(seen.contains("GET /moved "));
    assert!(!seen.contains("GET /gone "));
}

#[tokio::test]
async fn test_header_overrides_are_sent() {
    let (base, requests) = serve().await;
    let config = probe_config();
    let transport = ReqwestTransport::new(&config).unwrap();
    let headers = StreamHeaders {
        user_agent: Some("SportPlayer/2.0".to_string()),
        referrer: Some("https://site.example/".to_string()),
        origin: None,
    };

    let response = transport
        .open(&format!("{base}/stream.ts"), &headers)
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = requests.lock().unwrap().join("\n").to_ascii_lowercase();
    assert!(seen.contains("user-agent: sportplayer/2.0"));
    assert!(seen.contains("referer: https://site.example/"));
    assert!(!seen.contains("origin:"));
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let prober = prober();
    let none = StreamHeaders::default();

    assert!(!prober.probe(&format!("http://127.0.0.1:{port}/live.m3u8"), &none, 2).await);
    assert!(!prober.probe(&format!("rtmp://127.0.0.1:{port}/live/key"), &none, 2).await);
}

#[tokio::test]
async fn test_push_media_stream_is_reachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    assert!(
        prober()
            .probe(&format!("rtmp://127.0.0.1:{port}/live/key"), &StreamHeaders::default(), 1)
            .await
    );
}

#[tokio::test]
async fn test_push_media_stream_on_ipv6_literal() {
    // hosts without IPv6 loopback have nothing to connect to
    let Ok(listener) = TcpListener::bind("[::1]:0").await else {
        return;
    };
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });

    assert!(
        prober()
            .probe(&format!("rtmp://[::1]:{port}/live/key"), &StreamHeaders::default(), 1)
            .await
    );
}

#[tokio::test]
async fn test_source_loader_fetches_over_http() {
    let (base, _) = serve().await;
    let config = SourcesConfig {
        fetch_attempts: 2,
        retry_delay: Duration::from_millis(10),
        ..SourcesConfig::default()
    };
    let loader = SourceLoader::from_config(&config, "m3u-merge-test").unwrap();

    let load = loader
        .load_all(
            &[format!("{base}/playlist.m3u"), format!("{base}/gone.m3u")],
            &[],
        )
        .await
        .unwrap();

    assert_eq!(load.sources.len(), 1);
    assert_eq!(load.sources[0].text, PLAYLIST);
    assert_eq!(load.reports.len(), 2);
    assert!(load.reports[0].is_loaded());
    assert!(!load.reports[1].is_loaded());
    assert_eq!(load.reports[1].attempts, 2);
}
