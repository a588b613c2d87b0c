//! Per-connection plumbing between a room WebSocket and its room controller.
//!
//! Each accepted socket gets a dedicated writer task draining an outbound
//! queue, so the controller never awaits a slow client, and a read loop that
//! decodes client frames and forwards them as mailbox messages. The link
//! never mutates room state itself.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ClientCommand, ServerCommand},
    state::{
        SharedState,
        room::{CloseReason, LinkHandle, Outbound, RoomMessage},
    },
};

/// Handle the full lifecycle of one room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, room_id: String, session: String) {
    let (mut sender, mut receiver) = socket.split();
    let (link, mut outbound_rx) = LinkHandle::channel();
    let link_id = link.id;

    // Dedicated writer task keeps outbound traffic flowing even while we
    // await inbound frames. A song transfer is one queue item, so the
    // announcement and its binary payload always go out back to back.
    let writer_task: JoinHandle<()> = tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            match item {
                Outbound::Command(command) => {
                    let Some(payload) = encode(&command) else {
                        continue;
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Song { round, audio } => {
                    let header = ServerCommand::SongData {
                        round,
                        size_bytes: audio.len() as u64,
                    };
                    let Some(payload) = encode(&header) else {
                        continue;
                    };
                    if sender.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                    if sender.send(Message::Binary(audio)).await.is_err() {
                        break;
                    }
                }
                Outbound::Pong(payload) => {
                    if sender.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(reason) => {
                    let frame = CloseFrame {
                        code: reason.code(),
                        reason: reason.message().into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            }
        }
    });

    // Attach to the room; the controller answers with an optional rejection.
    let room = state.rooms().get_or_create(&room_id);
    let (reply_tx, reply_rx) = oneshot::channel();
    let delivered = room
        .send(RoomMessage::Connect {
            session: session.clone(),
            link: link.clone(),
            reply: reply_tx,
        })
        .is_ok();

    if !delivered {
        // The room terminated between lookup and attach.
        info!(room = %room_id, session = %session, "room is gone");
        let _ = link.send(Outbound::Close(CloseReason::NotAccepting));
        finalize(writer_task, link).await;
        return;
    }

    match reply_rx.await {
        Ok(None) => {}
        Ok(Some(reason)) => {
            let _ = link.send(Outbound::Close(reason));
            finalize(writer_task, link).await;
            return;
        }
        Err(_) => {
            finalize(writer_task, link).await;
            return;
        }
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => {
                    if room
                        .send(RoomMessage::Command {
                            session: session.clone(),
                            command,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    debug!(room = %room_id, session = %session, error = %err, "discarding malformed client frame");
                }
            },
            Ok(Message::Binary(_)) => {
                // Clients send only text frames; binary is a protocol
                // violation but not worth tearing the socket down for.
                debug!(room = %room_id, session = %session, "discarding binary frame from client");
            }
            Ok(Message::Ping(payload)) => {
                let _ = link.send(Outbound::Pong(payload));
            }
            Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(room = %room_id, session = %session, "player closed socket");
                break;
            }
            Err(err) => {
                warn!(room = %room_id, session = %session, error = %err, "websocket error");
                break;
            }
        }
    }

    let _ = room.send(RoomMessage::Disconnect {
        session: session.clone(),
        link: link_id,
    });

    finalize(writer_task, link).await;
}

/// Serialize a server command, logging instead of failing: a serialization
/// error is a bug, not a transport problem.
fn encode(command: &ServerCommand) -> Option<String> {
    match serde_json::to_string(command) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "failed to serialize server command `{command:?}`");
            None
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
///
/// The controller may still hold a clone of the link; the writer exits once
/// the last sender is dropped, which happens when the controller processes
/// the disconnect (or terminates).
async fn finalize(writer_task: JoinHandle<()>, link: LinkHandle) {
    drop(link);
    let _ = writer_task.await;
}
