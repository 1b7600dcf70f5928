use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RoomManagerHandle;
use super::messages::ClientMessage;
use super::types::{ConnectionId, OutboundMessage};
use crate::config::ServerConfig;

pub const DEFAULT_SIGNALING_PORT: u16 = 3480;

/// How long the writer gets to flush the closing handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    ping_interval: Duration,
    pong_timeout: Duration,
    outbound_buffer: usize,
}

pub struct SignalingServer {
    listener: TcpListener,
    handle: RoomManagerHandle,
    settings: ConnectionSettings,
}

impl SignalingServer {
    /// Bind the listener and start the room manager
    pub async fn bind(config: &ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle: RoomManagerHandle::spawn(config.command_buffer),
            settings: ConnectionSettings {
                ping_interval: config.ping_interval,
                pong_timeout: config.pong_timeout,
                outbound_buffer: config.outbound_buffer,
            },
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let settings = self.settings;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, settings).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
    settings: ConnectionSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(settings.outbound_buffer);
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    // On a duplicate id only this socket is dropped.
    let id = ConnectionId::generate();
    handle.connect(id.clone(), tx).await?;
    info!("WebSocket connection {} from {}", id, addr);

    let mut ping_interval = tokio::time::interval(settings.ping_interval);
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    // Ends when the reader hangs up (ctrl channel closed) or the room manager
    // drops this connection (outbound channel closed).
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                ctrl_msg = ctrl_rx.recv() => {
                    let Some(ctrl_msg) = ctrl_msg else { break };
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    if ws_tx.send(Message::Text(msg.into_inner())).await.is_err() {
                        break;
                    }
                }
            }
        }
        // Flushes the reply to a peer's Close, or starts the handshake ourselves.
        let _ = ws_tx.close().await;
    });
    let mut writer_finished = false;

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    warn!("No Pong received, disconnecting {}", id);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + settings.pong_timeout);
                debug!("Ping sent to {}", id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", id);
                break;
            }

            _ = &mut send_task, if !writer_finished => {
                writer_finished = true;
                debug!("Writer for {} finished", id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => handle_text_message(&text, &id, &handle).await,
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    drop(ctrl_tx);
    if !writer_finished && tokio::time::timeout(CLOSE_TIMEOUT, &mut send_task).await.is_err() {
        debug!("Close to {} timed out", id);
        send_task.abort();
    }

    handle.disconnect(id.clone()).await;
    info!("WebSocket disconnected: {} ({})", id, addr);

    Ok(())
}

async fn handle_text_message(text: &str, id: &ConnectionId, handle: &RoomManagerHandle) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => handle.dispatch(id.clone(), message).await,
        Err(e) => warn!("Dropping invalid message from {}: {}", id, e),
    }
}
