//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use streaming_proxy::config::ProxyConfig;
use streaming_proxy::net::StreamTracker;
use streaming_proxy::{HttpServer, Shutdown};

/// Serve a stub Invocation Service on an ephemeral port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A running proxy.
pub struct Proxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub streams: StreamTracker,
}

impl Proxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy against `backend`, with `tweak` applied to its config.
pub async fn start_proxy_with(backend: SocketAddr, tweak: impl FnOnce(&mut ProxyConfig)) -> Proxy {
    let mut config = ProxyConfig::default();
    config.invoker.api_host = format!("http://{backend}");
    config.stream.bind_host = "127.0.0.1".into();
    config.stream.idle_ms = 20;
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, &shutdown).unwrap();
    let streams = server.streams().clone();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    Proxy {
        addr,
        shutdown,
        streams,
    }
}

pub async fn start_proxy(backend: SocketAddr) -> Proxy {
    start_proxy_with(backend, |_| {}).await
}

/// Client that never pools connections, so a dropped response really closes.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Rendezvous coordinates from an enriched invocation body.
pub fn rendezvous_addr(body: &Value) -> String {
    let host = body["STREAM_HOST"].as_str().expect("STREAM_HOST missing");
    let port = body["STREAM_PORT"].as_str().expect("STREAM_PORT missing");
    format!("{host}:{port}")
}

/// Act as the workload: connect back and write `chunks`, pausing between them.
pub async fn write_chunks(addr: &str, chunks: &[&str], pause: Duration) -> std::io::Result<()> {
    let mut conn = TcpStream::connect(addr).await?;
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        conn.write_all(chunk.as_bytes()).await?;
    }
    conn.shutdown().await
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
