use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State as AxumState;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::app::AppState;
use crate::http::platform_auth_error;
use crate::protocol::{parse_amount, InboundMessage, OutboundEvent, OutboundResponse};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<AppState>,
    headers: HeaderMap,
) -> Response {
    if let Some(status) = platform_auth_error(state.platform_token(), &headers) {
        return status.into_response();
    }
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let mut broadcast_rx = state.subscribe();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    // Late joiners start from the current round of every table.
    for snapshot in state.snapshots() {
        send_json(&tx, &OutboundEvent::State(snapshot));
    }

    let broadcast_task = {
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) => send_json(&tx, &event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagging; skipped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<InboundMessage>(&text) {
                Ok(inbound) => {
                    let response = handle_inbound(inbound, &state);
                    send_json(&tx, &response);
                }
                Err(err) => {
                    warn!(?err, "invalid inbound message");
                    send_json(
                        &tx,
                        &OutboundResponse::Error {
                            request_id: String::new(),
                            code: "INVALID_MESSAGE".to_string(),
                            message: err.to_string(),
                        },
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!("websocket client disconnected");
    write_task.abort();
    broadcast_task.abort();
}

pub(crate) fn handle_inbound(inbound: InboundMessage, state: &AppState) -> OutboundResponse {
    match inbound {
        InboundMessage::Join {
            request_id,
            currency,
            user_id,
        } => match state.join(&currency, &user_id) {
            Ok(balance) => OutboundResponse::Ack {
                request_id,
                balance,
                stake: None,
            },
            Err(err) => OutboundResponse::error(request_id, &err),
        },
        InboundMessage::Bet {
            request_id,
            currency,
            user_id,
            amount,
            color_label,
        } => {
            let result = state
                .table(&currency)
                .map(|table| table.config().min_bet)
                .and_then(|min| parse_amount(&amount, min))
                .and_then(|amount| {
                    state.place_bet(&currency, &user_id, amount, color_label.as_deref())
                });
            match result {
                Ok((stake, balance)) => OutboundResponse::Ack {
                    request_id,
                    balance,
                    stake: Some(stake),
                },
                Err(err) => OutboundResponse::error(request_id, &err),
            }
        }
    }
}

fn send_json<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, payload: &T) {
    if let Ok(payload) = serde_json::to_string(payload) {
        let _ = tx.send(Message::Text(payload));
    }
}
