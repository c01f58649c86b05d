//! Test helpers for relay integration tests.
//!
//! Provides TestClient and a helper that runs a relay on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use chatrelay::config::ServerConfig;
use chatrelay::{ChatEvent, ConnectionRegistry, FrameDecoder, RelayServer};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Server configuration bound to an ephemeral local port.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    }
}

/// Start a relay in the background.
pub async fn start_relay(config: ServerConfig) -> (SocketAddr, Arc<ConnectionRegistry>) {
    let server = RelayServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    tokio::spawn(server.run());
    (addr, registry)
}

/// Wait until `name` is registered (or gone, when `present` is false).
pub async fn wait_for(registry: &ConnectionRegistry, name: &str, present: bool) {
    timeout(DEFAULT_TIMEOUT, async {
        while registry.contains(name).await != present {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name} (present = {present})"));
}

/// A raw participant connection.
pub struct TestClient {
    stream: TcpStream,
    decoder: FrameDecoder,
    events: Vec<ChatEvent>,
}

impl TestClient {
    /// Connect without sending a name.
    pub async fn connect_raw(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            decoder: FrameDecoder::new(),
            events: Vec::new(),
        }
    }

    /// Connect, send `name` and wait until the relay has registered it.
    pub async fn join(addr: SocketAddr, registry: &ConnectionRegistry, name: &str) -> Self {
        let mut client = Self::connect_raw(addr).await;
        client.send_raw(name.as_bytes()).await;
        wait_for(registry, name, true).await;
        client
    }

    /// Write raw bytes.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Receive the next event, failing after the default timeout.
    pub async fn recv(&mut self) -> ChatEvent {
        timeout(DEFAULT_TIMEOUT, self.next_event())
            .await
            .expect("timed out waiting for an event")
            .expect("connection closed")
    }

    /// Assert that no event arrives within `wait`.
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(event) = timeout(wait, self.next_event()).await {
            panic!("unexpected event: {event:?}");
        }
    }

    /// Check whether the relay closes this connection within the default timeout.
    pub async fn closed_by_relay(&mut self) -> bool {
        let mut buf = [0u8; 256];
        matches!(
            timeout(DEFAULT_TIMEOUT, self.stream.read(&mut buf)).await,
            Ok(Ok(0)) | Ok(Err(_))
        )
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        let mut buf = [0u8; 1024];
        loop {
            if !self.events.is_empty() {
                return Some(self.events.remove(0));
            }
            let n = self.stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            self.events.extend(self.decoder.feed(&buf[..n]));
        }
    }

    /// Mutable access to the underlying stream.
    pub fn stream(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}
