use std::time::Duration;

use anyhow::anyhow;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tracing::{debug, warn};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    middlewares::auth::decode_token,
    models::{
        auth::AuthUser,
        websocket::{ClientMessage, ServerEvent},
    },
    websocket::manager::{EventReceiver, EventSender},
};

/// Keeps idle connections alive through proxies.
pub const PING_INTERVAL: Duration = Duration::from_secs(54);
/// How long a fresh socket may stay silent before authenticating.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let user = match tokio::time::timeout(AUTH_TIMEOUT, authenticate(&mut stream, &state)).await {
        Ok(Ok(user)) => user,
        Ok(Err(e)) => {
            debug!(error = %e, "websocket authentication failed");
            reject(&mut sink, e.to_string()).await;
            return;
        }
        Err(_) => {
            debug!("websocket authentication timed out");
            reject(&mut sink, "Authentication timed out".to_string()).await;
            return;
        }
    };

    let (tx, rx) = state.hub.channel();
    let connection_id = state.hub.register(&user.username, tx.clone());
    let _ = tx.try_send(ServerEvent::Authenticated);
    debug!(user_id = %user.user_id, %connection_id, "websocket authenticated");

    let outgoing_task = tokio::spawn(write_pump(sink, rx));

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text_message(&tx, &user, text.as_str()),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(username = %user.username, error = %e, "websocket receive error");
                break;
            }
            _ => {}
        }
    }

    // Only removes the entry if it still belongs to this session.
    state.hub.unregister(&user.username, connection_id);
    drop(tx);
    outgoing_task.abort();
    debug!(username = %user.username, %connection_id, "websocket session closed");
}

/// Waits for the first text frame, which must be an `authenticate` message.
async fn authenticate(stream: &mut SplitStream<WebSocket>, state: &AppState) -> AppResult<AuthUser> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let user = authenticate_frame(&state.config.jwt_secret, text.as_str())?;
                state.users.ensure_user(&user).await?;
                return Ok(user);
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
    Err(AppError::Unauthorized(anyhow!("Connection closed before authentication")))
}

fn authenticate_frame(secret: &str, text: &str) -> AppResult<AuthUser> {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate { token }) => Ok(decode_token(secret, &token)?.into()),
        Ok(_) => Err(AppError::Unauthorized(anyhow!("Authenticate first"))),
        Err(_) => Err(AppError::BadRequest(anyhow!("Invalid message format"))),
    }
}

async fn reject(sink: &mut SplitSink<WebSocket, Message>, message: String) {
    if let Some(json) = encode_event(&ServerEvent::Error { message }) {
        let _ = sink.send(Message::Text(json.into())).await;
    }
    let _ = sink.send(Message::Close(None)).await;
}

/// Answers on the session's own sender so replies never reach a newer
/// connection for the same user.
fn handle_text_message(tx: &EventSender, user: &AuthUser, text: &str) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Ping) => ServerEvent::Pong,
        Ok(ClientMessage::Authenticate { .. }) => ServerEvent::Error {
            message: "Already authenticated".to_string(),
        },
        Err(_) => ServerEvent::Error {
            message: "Unknown or malformed message".to_string(),
        },
    };
    if tx.try_send(reply).is_err() {
        warn!(username = %user.username, "outbound buffer full, reply dropped");
    }
}

async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut rx: EventReceiver) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let Some(json) = encode_event(&event) else { continue };
                if sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

fn encode_event(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(event = event.event_type(), error = %e, "failed to encode event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Claims;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn signed(secret: &str) -> (Uuid, String) {
        let claims = Claims {
            sub: Uuid::new_v4(),
            username: "alice".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (claims.sub, token)
    }

    #[test]
    fn authenticate_frame_accepts_valid_token() {
        let (user_id, token) = signed("secret");
        let frame = serde_json::json!({"type": "authenticate", "token": token}).to_string();
        let user = authenticate_frame("secret", &frame).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn authenticate_frame_rejects_everything_else() {
        let (_, token) = signed("other");
        let frame = serde_json::json!({"type": "authenticate", "token": token}).to_string();
        assert!(matches!(
            authenticate_frame("secret", &frame),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate_frame("secret", r#"{"type":"ping"}"#),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate_frame("secret", "hello"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn ping_gets_pong_and_garbage_gets_error() {
        let (tx, mut rx) = mpsc::channel(4);
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
        };
        handle_text_message(&tx, &user, r#"{"type":"ping"}"#);
        handle_text_message(&tx, &user, r#"{"type":"dance"}"#);

        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Pong)));
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Error { .. })));
    }

    #[test]
    fn events_encode_with_type_tag() {
        let json = encode_event(&ServerEvent::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
