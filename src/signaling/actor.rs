use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::coordinator::Coordinator;
use super::messages::ClientMessage;
use super::registry::Registry;
use super::types::{ConnectionHandle, ConnectionId, SignalingError};

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Connect {
        id: ConnectionId,
        handle: ConnectionHandle,
        reply: oneshot::Sender<Result<(), SignalingError>>,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    Disconnect {
        id: ConnectionId,
    },
}

/// Owns the coordinator; one command is handled at a time, which makes every
/// registry read-then-mutate sequence atomic.
pub(crate) async fn room_manager_actor(
    mut coordinator: Coordinator,
    mut rx: mpsc::Receiver<RoomCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Connect { id, handle, reply } => {
                let _ = reply.send(coordinator.connect(id, handle));
            }

            RoomCommand::Message { id, message } => {
                coordinator.dispatch(&id, message);
            }

            RoomCommand::Disconnect { id } => {
                coordinator.disconnect(&id);
            }
        }
    }
    info!("Room manager stopped");
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn the actor on the current runtime with an empty registry
    pub fn spawn(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(buffer);
        tokio::spawn(room_manager_actor(Coordinator::new(Registry::new()), rx));
        Self { tx }
    }

    /// Register a connection; it receives the room list once registered
    pub async fn connect(
        &self,
        id: ConnectionId,
        handle: ConnectionHandle,
    ) -> Result<(), SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RoomCommand::Connect {
                id,
                handle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?
    }

    /// Hand a client message to the coordinator
    pub async fn dispatch(&self, id: ConnectionId, message: ClientMessage) {
        let _ = self.tx.send(RoomCommand::Message { id, message }).await;
    }

    /// Leave every room and forget the connection
    pub async fn disconnect(&self, id: ConnectionId) {
        let _ = self.tx.send(RoomCommand::Disconnect { id }).await;
    }
}
