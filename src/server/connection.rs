//! Per-connection handling for the relay.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::registry::{outbound_channel, ConnectionRegistry, Delivery, Frame, Participant};
use crate::chat::LineAssembler;
use crate::config::{InboundFraming, ServerConfig};

/// Relay a participant's message and announce anyone dropped on the way.
pub async fn relay_message(registry: &ConnectionRegistry, sender: &str, body: &str) {
    info!("{}: {}", sender, body);
    let delivery = registry.broadcast(sender, body).await;
    announce_departures(registry, delivery).await;
}

/// Announce the departure of every participant removed during a fan-out.
///
/// Announcing can itself drop further participants, which are announced in turn.
pub async fn announce_departures(registry: &ConnectionRegistry, delivery: Delivery) {
    let mut pending = delivery.dropped;
    while let Some(name) = pending.pop() {
        info!("{} disconnected", name);
        let delivery = registry.announce_leave(&name).await;
        pending.extend(delivery.dropped);
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut frames: mpsc::Receiver<Frame>) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            warn!("Write failed: {}", e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// Serve one accepted connection until the peer leaves.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
) {
    let (mut reader, writer) = stream.into_split();
    let mut buf = vec![0u8; config.read_buffer_size];

    // The first read is the participant's name, taken verbatim.
    let name = match tokio::time::timeout(config.handshake_timeout(), reader.read(&mut buf)).await
    {
        Ok(Ok(0)) => {
            debug!("{} closed before sending a name", peer_addr);
            return;
        }
        Ok(Ok(n)) => String::from_utf8_lossy(&buf[..n]).into_owned(),
        Ok(Err(e)) => {
            warn!("Handshake read from {} failed: {}", peer_addr, e);
            return;
        }
        Err(_) => {
            info!(
                "{} sent no name within {}s, closing",
                peer_addr, config.handshake_timeout_secs
            );
            return;
        }
    };

    let (tx, rx) = outbound_channel();
    let participant = Participant::new(name.clone(), tx);
    let evicted = participant.evicted();
    let connection_id = participant.connection_id;
    let connected_at = participant.connected_at;
    if registry.add(participant).await.is_some() {
        info!("{} reconnected, replacing the previous connection", name);
    }
    info!("{} connected from {}", name, peer_addr);

    let mut writer_task = tokio::spawn(write_loop(writer, rx));
    let delivery = registry.announce_join(&name).await;
    announce_departures(&registry, delivery).await;

    let mut lines = match config.inbound_framing {
        InboundFraming::Read => None,
        InboundFraming::Line => Some(LineAssembler::new()),
    };

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("{} closed the connection", name);
                    break;
                }
                Ok(n) => match lines.as_mut() {
                    None => {
                        let message = String::from_utf8_lossy(&buf[..n]).into_owned();
                        relay_message(&registry, &name, &message).await;
                    }
                    Some(assembler) => {
                        for line in assembler.push(&buf[..n]) {
                            if !line.trim().is_empty() {
                                relay_message(&registry, &name, &line).await;
                            }
                        }
                    }
                },
                Err(e) => {
                    warn!("Read from {} failed: {}", name, e);
                    break;
                }
            },
            _ = &mut writer_task => {
                debug!("Outbound stream to {} closed", name);
                break;
            }
            _ = evicted.notified() => {
                debug!("{} was removed from the registry, closing", name);
                break;
            }
        }
    }

    writer_task.abort();
    if registry.remove_connection(&name, connection_id).await {
        let duration = Utc::now().signed_duration_since(connected_at);
        info!("{} disconnected after {}s", name, duration.num_seconds());
        let delivery = registry.announce_leave(&name).await;
        announce_departures(&registry, delivery).await;
    }
}
