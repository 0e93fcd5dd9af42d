//! Per-connection WebSocket handling
//!
//! Each socket gets a writer task that drains its hub queue, while the
//! connection task reads client events in arrival order.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::state::AppState;
use crate::hub::{InboundEvent, OutboundEvent, SubscriberId};
use crate::rooms::GatewayError;

/// Serve one upgraded connection until either side closes it
pub async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let (id, mut queue) = match state.hub.connect().await {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!(error = %e, "Socket rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if sink.send(Message::Text(frame.as_str().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_event(&state, id, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, error = %e, "Socket read failed");
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    state.hub.disconnect(id).await;
    writer.abort();
}

async fn handle_event(state: &AppState, id: SubscriberId, text: &str) {
    let event = match serde_json::from_str::<InboundEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(subscriber = %id, error = %e, "Ignoring unrecognized socket event");
            return;
        }
    };

    match event {
        InboundEvent::JoinRoom(room) => match state.gateway.join_room(id, &room).await {
            Ok(_) => {
                if let Err(e) = state
                    .hub
                    .send_to(id, &OutboundEvent::RoomJoined { room: &room })
                    .await
                {
                    tracing::debug!(subscriber = %id, error = %e, "Join confirmation not queued");
                }
            }
            Err(e) => {
                tracing::debug!(subscriber = %id, room = %room, error = %e, "Join refused");
                reply_error(state, id, &e).await;
            }
        },
        InboundEvent::ChatMessage(chat) => {
            if let Err(e) = state.gateway.relay_chat(id, chat).await {
                reply_error(state, id, &e).await;
            }
        }
    }
}

/// Tell the sender why its event had no effect
async fn reply_error(state: &AppState, id: SubscriberId, error: &GatewayError) {
    let reply = OutboundEvent::ChatError {
        message: error.to_string(),
    };
    if let Err(e) = state.hub.send_to(id, &reply).await {
        tracing::debug!(subscriber = %id, error = %e, "Chat error not queued");
    }
}
