//! WebSocket sessions for publishing and subscribing

use super::protocol::{PublishAction, PublishRequest, ServerMessage};
use super::AppState;
use crate::subscriber::ChannelSubscriber;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

/// `GET /topic/:topic/publish`
pub async fn publish_upgrade(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| publish_session(socket, state, name))
}

/// `GET /topic/:topic/subscribe`
pub async fn subscribe_upgrade(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| subscribe_session(socket, state, name))
}

/// Read publish frames until the client closes or sends garbage
async fn publish_session(mut socket: WebSocket, state: AppState, name: String) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let Some(topic) = state.registry().get_or_create(&name, true) else {
        return;
    };
    let publisher = topic.new_publisher();
    tracing::info!(
        session = %session_id,
        topic = %name,
        publisher = %publisher.id(),
        "Publisher connected"
    );

    while let Some(msg) = socket.recv().await {
        let frame = match msg {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "WebSocket read failed");
                break;
            }
        };

        match PublishRequest::parse(&frame) {
            Ok(PublishAction::Send(data)) => {
                publisher.send(data);
            }
            Ok(PublishAction::Close) => break,
            Ok(PublishAction::Ignore) => {}
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "Invalid publish frame");
                break;
            }
        }
    }

    publisher.close();
    tracing::info!(session = %session_id, topic = %name, "Publisher disconnected");
}

/// Forward delivered events until eviction, write failure, or client close
async fn subscribe_session(socket: WebSocket, state: AppState, name: String) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let Some(topic) = state.registry().get_or_create(&name, true) else {
        return;
    };

    // The topic holds the only strong reference, so eviction closes `rx`.
    let (subscriber, mut rx) = ChannelSubscriber::bounded(state.config().subscriber_capacity);
    let handle = Arc::downgrade(&subscriber);
    topic.subscribe(subscriber);
    tracing::info!(session = %session_id, topic = %name, "Subscriber connected");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    tracing::info!(session = %session_id, topic = %name, "Subscriber evicted");
                    break;
                };
                let json = match serde_json::to_string(&ServerMessage::from(event.as_ref())) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(session = %session_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(session = %session_id, error = %e, "WebSocket write failed");
                    break;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::warn!(session = %session_id, error = %e, "WebSocket read failed");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    if let Some(subscriber) = handle.upgrade() {
        topic.unsubscribe(&subscriber);
    }
    tracing::info!(session = %session_id, topic = %name, "Subscriber disconnected");
}
