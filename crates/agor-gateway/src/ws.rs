// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! WebSocket bridge — generalizes a prior bridge between browser WebSocket
//! connections and a single-agent `ControlCommand`/`ControlEvent` channel
//! into one between a client and the multi-topic `agor-events::EventBus`.
//!
//! # Handshake
//!
//! A plain `WebSocket` upgrade carries no custom headers from a browser, so
//! unlike `/rpc` this endpoint authenticates from the first frame rather
//! than the `Authorization` header: the client must send a JSON
//! `SubscribeFrame{topics, token}` as its first message. Further
//! `SubscribeFrame`s widen the subscription to additional topics; there is
//! no way to narrow one once granted, matching the read-only, fan-out
//! nature of this channel.
//!
//! # Wire format
//!
//! JSON text frames carrying `agor_proto::Event`, one per message. Binary
//! frames are never sent or accepted.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use agor_proto::{Event, SubscribeFrame, Topic};

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let (events_tx, mut events_rx) = mpsc::channel::<Event>(256);
    let mut forwarders: Vec<tokio::task::JoinHandle<()>> = Vec::new();

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SubscribeFrame>(&text) {
                            Ok(frame) => {
                                if crate::auth::verify(&state, &frame.token).is_err() {
                                    let _ = socket.send(Message::Close(None)).await;
                                    break;
                                }
                                for topic in frame.topics {
                                    forwarders.push(spawn_forwarder(&state, topic, events_tx.clone()));
                                }
                            }
                            Err(e) => {
                                debug!("invalid subscribe frame: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket recv error: {e}");
                        break;
                    }
                }
            }
            Some(event) = events_rx.recv() => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    for handle in forwarders {
        handle.abort();
    }
    debug!("WebSocket connection closed");
}

/// One task per subscribed topic, forwarding events into the connection's
/// shared mpsc channel until the subscription lags or the bus shuts down.
fn spawn_forwarder(state: &Arc<AppState>, topic: Topic, tx: mpsc::Sender<Event>) -> tokio::task::JoinHandle<()> {
    let events = state.events.clone();
    tokio::spawn(async move {
        let mut sub = events.subscribe(topic);
        while let Some(event) = sub.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
        warn!(?topic, "event subscription ended");
    })
}
