//! Accept loop for the relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use super::connection::handle_connection;
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::{RelayError, Result};

/// A bound relay: listener, connection slots and the shared registry.
pub struct RelayServer {
    listener: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
    registry: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
}

/// Holds one connection slot until dropped.
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}

impl RelayServer {
    /// Bind to `config.host:config.port`.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!("Relay server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            registry: Arc::new(ConnectionRegistry::new()),
            config: Arc::new(config.clone()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared participant registry.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Number of connection slots in use.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Wait for a free slot, then accept the next connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| RelayError::Protocol("connection slots closed".to_string()))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);
        Ok((stream, addr, ConnectionPermit { _slot: slot }))
    }

    /// Serve connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Serve connections until `shutdown` completes.
    ///
    /// Each connection gets its own task; a failed accept is logged and the
    /// loop continues.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.accept() => match accepted {
                    Ok((stream, addr, permit)) => {
                        let registry = Arc::clone(&self.registry);
                        let config = Arc::clone(&self.config);
                        tokio::spawn(async move {
                            handle_connection(stream, addr, registry, config).await;
                            drop(permit);
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!(
                        "Relay shutting down with {} participant(s) connected",
                        self.registry.participant_count().await
                    );
                    return;
                }
            }
        }
    }
}
