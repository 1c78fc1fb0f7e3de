use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::{Error, UnauthorizedType},
    realtime::{ClientMessage, NotificationHub, ServerEvent},
};

use super::{
    auth::{UserAccess, UserCollection, UserModel},
    token::JwtState,
};

#[derive(Deserialize, Debug, Default)]
pub struct ConnectQuery {
    pub token: Option<String>,
}

/// `GET /ws?token=<access token>`. The token and the account behind it are
/// checked before the upgrade.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(jwt_state): State<JwtState>,
    State(users): State<UserCollection>,
    State(hub): State<NotificationHub>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, Error> {
    let token = query
        .token
        .ok_or(Error::Unauthorized(UnauthorizedType::InvalidAccessToken))?;
    let user = UserModel::from_token(&jwt_state, &users, &token).await?.access();

    Ok(ws.on_upgrade(move |socket| session(socket, hub, user)))
}

type Room = Option<broadcast::Receiver<ServerEvent>>;

/// Applies one text frame from the client and returns the reply, if any.
pub fn handle_client_text(
    hub: &NotificationHub,
    user: &UserAccess,
    room: &mut Room,
    text: &str,
) -> Option<ServerEvent> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(user = %user.id, "unreadable socket message: {err}");
            return Some(ServerEvent::Error {
                message: "unrecognised message".to_string(),
            });
        }
    };

    match message {
        ClientMessage::Join { user_id } if user_id == user.id => {
            if room.is_none() {
                *room = Some(hub.join(user.id));
            }
            Some(ServerEvent::Joined { room: user_id })
        }
        ClientMessage::Join { user_id } => {
            tracing::debug!(user = %user.id, target = %*user_id, "refused joining another room");
            Some(ServerEvent::Error {
                message: "cannot join another user's room".to_string(),
            })
        }
        ClientMessage::Leave => {
            drop(room.take());
            hub.prune(user.id);
            None
        }
        ClientMessage::Ping => Some(ServerEvent::Pong),
    }
}

async fn next_event(room: &mut Room) -> Result<ServerEvent, RecvError> {
    match room {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(text)).await
}

#[tracing::instrument(skip_all, fields(user = %user.id))]
async fn session(socket: WebSocket, hub: NotificationHub, user: UserAccess) {
    tracing::debug!("socket connected");

    let (mut sender, mut receiver) = socket.split();
    let mut room: Room = None;

    loop {
        tokio::select! {
            message = receiver.next() => {
                let reply = match message {
                    Some(Ok(Message::Text(text))) => handle_client_text(&hub, &user, &mut room, &text),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        tracing::debug!("socket read failed: {err}");
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if send(&mut sender, &reply).await.is_err() {
                        break;
                    }
                }
            }

            event = next_event(&mut room) => {
                match event {
                    Ok(event) => {
                        if send(&mut sender, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "socket fell behind, events dropped");
                    }
                    Err(RecvError::Closed) => room = None,
                }
            }
        }
    }

    drop(room);
    hub.prune(user.id);

    tracing::debug!("socket disconnected");
}
