//! Session Gateway (§4.3): the WebSocket front door. Upgrades a connection,
//! resolves the target Room, and shuttles binary frames between the socket
//! and the Room Engine until either side hangs up.

use crate::config::PING_INTERVAL_MS;
use crate::engine::Engine;
use crate::errors::EngineError;
use crate::store::is_valid_id;
use futures_util::{SinkExt, StreamExt};
use rocket::{get, State};
use rocket_ws::frame::{CloseCode, CloseFrame};
use rocket_ws::{Channel, Message, WebSocket};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::time::{interval, Duration};

fn close(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    }))
}

/// `/connect/<room_id>?<sessionId>`: upgrades to a WebSocket and attaches a
/// new Session to the named Room. `sessionId` (spec.md §4.3/§6's wire name)
/// lets a reconnecting client keep its identity; omitted, the Gateway
/// synthesizes one.
#[allow(non_snake_case)]
#[get("/connect/<room_id>?<sessionId>")]
pub fn connect(
    ws: WebSocket,
    engine: &State<Arc<Engine>>,
    room_id: &str,
    sessionId: Option<&str>,
) -> Channel<'static> {
    let engine = engine.inner().clone();
    let room_id = room_id.to_string();
    let session_id = sessionId
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    ws.channel(move |mut stream| {
        Box::pin(async move {
            if !is_valid_id(&room_id) {
                println!("gateway: closing connection for invalid roomId {room_id:?} (session {session_id})");
                let _ = stream.send(close(CloseCode::Policy, "invalid roomId")).await;
                return Ok(());
            }

            let room = engine.obtain_room(&room_id);
            let mut outbox = match room.attach_session(session_id.clone()).await {
                Ok(outbox) => outbox,
                Err(EngineError::RoomClosed) => {
                    println!(
                        "gateway: room {room_id} closed before session {session_id} could attach, closing 1011"
                    );
                    let _ = stream
                        .send(close(CloseCode::Error, "room unavailable"))
                        .await;
                    return Ok(());
                }
                Err(_) => {
                    println!(
                        "gateway: internal error attaching session {session_id} to room {room_id}, closing 1011"
                    );
                    let _ = stream
                        .send(close(CloseCode::Error, "internal error"))
                        .await;
                    return Ok(());
                }
            };

            let mut ping_timer = interval(Duration::from_millis(PING_INTERVAL_MS));
            ping_timer.tick().await; // the first tick fires immediately

            // Each exit path records (code, reason) so the single log line
            // after the loop carries (roomId, sessionId, code, reason) per
            // spec.md §4.3's socket error/close logging requirement.
            let exit: (&str, &str) = loop {
                tokio::select! {
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(Message::Binary(bytes))) => {
                                if room.handle_message(&session_id, bytes).await.is_err() {
                                    let _ = stream.send(close(CloseCode::Protocol, "malformed change")).await;
                                    break ("1003", "malformed change");
                                }
                            }
                            Some(Ok(Message::Close(_))) => break ("1000", "client closed"),
                            None => break ("1006", "stream ended"),
                            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_))) => {
                                // Non-binary frames carry no collaboration payload; ignored.
                            }
                            Some(Err(_)) => break ("1006", "socket error"),
                        }
                    }
                    outbound = outbox.recv() => {
                        match outbound {
                            Some(bytes) => {
                                if stream.send(Message::Binary(bytes)).await.is_err() {
                                    break ("1006", "write error");
                                }
                            }
                            None => break ("1011", "session removed"),
                        }
                    }
                    _ = ping_timer.tick() => {
                        if stream.send(Message::Ping(Vec::new())).await.is_err() {
                            break ("1006", "ping write error");
                        }
                    }
                }
            };

            println!(
                "gateway: connection closed (room={room_id}, session={session_id}, code={}, reason={})",
                exit.0, exit.1
            );
            room.remove_session(&session_id).await;
            Ok(())
        })
    })
}
