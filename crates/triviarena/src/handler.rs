//! Per-connection handler: hello handshake, then the event loop.
//!
//! The flow per connection:
//!   1. First frame must be `hello {token}` → authenticate → welcome.
//!   2. Upsert the user profile, register with the connectivity tracker
//!      (displacing any previous connection for the same uid).
//!   3. Loop: decode inbound frames, route them to the room service,
//!      reply with exactly one ack per frame; concurrently pump the
//!      outbound channel (acks + room broadcasts) onto the socket.
//!   4. On drop: notify every room the connection was in.
//!
//! Nothing escapes: malformed frames get an error ack, handler errors
//! close the connection, and all cleanup runs on the way out.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use triviarena_engine::{EngineError, QuestionSource};
use triviarena_protocol::{
    Ack, ClientEvent, ClientFrame, Codec, RoomCode, ServerEvent, ServerFrame,
    MAX_CHAT_LEN,
};
use triviarena_room::RoomError;
use triviarena_session::{upsert_profile, AuthIdentity, Authenticator};
use triviarena_store::DocumentStore;
use triviarena_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::TriviarenaError;

/// How long a connection gets to present its hello frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn handle_connection<S, Q, A>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, Q, A>>,
) -> Result<(), TriviarenaError>
where
    S: DocumentStore,
    Q: QuestionSource,
    A: Authenticator,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: hello / welcome ---
    let identity = match perform_handshake(&conn, &state).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let uid = identity.uid.clone();
    tracing::info!(%conn_id, %uid, "connection authenticated");

    upsert_profile(state.store.as_ref(), &identity).await?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerFrame>();
    {
        let mut tracker = state.tracker.lock().await;
        if let Some(displaced) = tracker.connect(uid.clone(), conn_id, out_tx.clone())
        {
            let _ = displaced.sender.send(ServerFrame::Event(ServerEvent::Notice {
                message: "signed in from another connection".into(),
            }));
        }
    }

    send_frame(
        &conn,
        &state.codec,
        &ServerFrame::Event(ServerEvent::Welcome {
            uid: uid.clone(),
            name: identity.name.clone(),
        }),
    )
    .await?;

    // --- Step 2: event loop ---
    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                match outbound {
                    Some(frame) => {
                        if send_frame(&conn, &state.codec, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = conn.recv() => {
                match inbound {
                    Ok(Some(data)) => {
                        let ack = process_frame(&state, &identity, &out_tx, &data).await;
                        let _ = out_tx.send(ServerFrame::Ack(ack));
                    }
                    Ok(None) => {
                        tracing::info!(%uid, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%uid, error = %e, "recv error");
                        break;
                    }
                }
            }
        }
    }

    // --- Step 3: disconnect reconciliation ---
    let departed = state.tracker.lock().await.disconnect(conn_id);
    if let Some((uid, rooms)) = departed {
        for room_id in rooms {
            if let Some(handle) = state.service.handle(room_id).await {
                handle.disconnected(uid.clone()).await;
            }
        }
    }

    Ok(())
}

/// Receives and validates the hello frame, authenticates the token.
async fn perform_handshake<S, Q, A>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<S, Q, A>>,
) -> Result<AuthIdentity, TriviarenaError>
where
    S: DocumentStore,
    Q: QuestionSource,
    A: Authenticator,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(TriviarenaError::Protocol(
                triviarena_protocol::ProtocolError::InvalidFrame(
                    "connection closed before hello".into(),
                ),
            ));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(TriviarenaError::Protocol(
                triviarena_protocol::ProtocolError::InvalidFrame(
                    "hello timed out".into(),
                ),
            ));
        }
    };

    let frame: ClientFrame = state.codec.decode(&data)?;
    let ClientEvent::Hello { token } = frame.event else {
        send_frame(
            conn,
            &state.codec,
            &ServerFrame::Ack(Ack::error(frame.seq, "first frame must be hello")),
        )
        .await?;
        return Err(TriviarenaError::Protocol(
            triviarena_protocol::ProtocolError::InvalidFrame(
                "first frame must be hello".into(),
            ),
        ));
    };

    match state.auth.authenticate(&token).await {
        Ok(identity) => Ok(identity),
        Err(e) => {
            send_frame(
                conn,
                &state.codec,
                &ServerFrame::Ack(Ack::error(frame.seq, "unauthorized")),
            )
            .await?;
            Err(e.into())
        }
    }
}

/// Decodes and routes one inbound frame, producing its ack.
async fn process_frame<S, Q, A>(
    state: &Arc<ServerState<S, Q, A>>,
    identity: &AuthIdentity,
    out_tx: &mpsc::UnboundedSender<ServerFrame>,
    data: &[u8],
) -> Ack
where
    S: DocumentStore,
    Q: QuestionSource,
    A: Authenticator,
{
    let frame: ClientFrame = match state.codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(uid = %identity.uid, error = %e, "malformed frame");
            return Ack::error(0, "malformed frame");
        }
    };
    let seq = frame.seq;

    match dispatch_event(state, identity, out_tx, frame.event).await {
        Ok(DispatchResult { data, no_action }) => {
            if no_action {
                Ack::no_action(seq)
            } else if data.is_null() {
                Ack::ok_empty(seq)
            } else {
                Ack::ok(seq, data)
            }
        }
        Err(e) => Ack::error(seq, ack_message(&e, state.config.production)),
    }
}

struct DispatchResult {
    data: serde_json::Value,
    no_action: bool,
}

impl DispatchResult {
    fn ok(data: serde_json::Value) -> Self {
        Self {
            data,
            no_action: false,
        }
    }
}

impl From<triviarena_engine::CmdReply> for DispatchResult {
    fn from(reply: triviarena_engine::CmdReply) -> Self {
        Self {
            data: reply.data,
            no_action: reply.no_action,
        }
    }
}

/// The closed event switch: one arm per inbound event.
async fn dispatch_event<S, Q, A>(
    state: &Arc<ServerState<S, Q, A>>,
    identity: &AuthIdentity,
    out_tx: &mpsc::UnboundedSender<ServerFrame>,
    event: ClientEvent,
) -> Result<DispatchResult, EngineError>
where
    S: DocumentStore,
    Q: QuestionSource,
    A: Authenticator,
{
    let uid = identity.uid.clone();
    match event {
        ClientEvent::Hello { .. } => Err(EngineError::InvalidState(
            "already authenticated".into(),
        )),

        ClientEvent::CreateRoom { player_name } => {
            let name = display_name(identity, player_name);
            let (room_id, room_code) = state
                .service
                .create_room(uid.clone(), name, identity.picture.clone(), out_tx.clone())
                .await?;
            state.tracker.lock().await.enter_room(&uid, room_id);
            Ok(DispatchResult::ok(serde_json::json!({
                "roomId": room_id,
                "roomCode": room_code,
            })))
        }

        ClientEvent::JoinRoom {
            room_code,
            player_name,
        } => {
            let code = RoomCode::parse(&room_code)
                .map_err(|_| EngineError::Room(RoomError::NotFound))?;
            let handle = state
                .service
                .lookup_code(&code)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let name = display_name(identity, player_name);
            let reply = handle
                .join(uid.clone(), name, identity.picture.clone(), out_tx.clone())
                .await?;
            state
                .tracker
                .lock()
                .await
                .enter_room(&uid, handle.room_id());
            Ok(reply.into())
        }

        ClientEvent::LeaveRoom { room_id } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.leave(uid.clone()).await?;
            state.tracker.lock().await.exit_room(&uid, room_id);
            Ok(reply.into())
        }

        ClientEvent::UpdateSettings {
            room_id,
            settings_to_update,
        } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.update_settings(uid, settings_to_update).await?;
            Ok(reply.into())
        }

        ClientEvent::StartGame { room_id, settings } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.start_game(uid, settings).await?;
            Ok(reply.into())
        }

        ClientEvent::SubmitAnswer {
            room_id,
            question_id,
            answer_index,
        } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.submit_answer(uid, question_id, answer_index).await?;
            Ok(reply.into())
        }

        ClientEvent::SubmitSteal {
            room_id,
            question_id,
            answer_index,
        } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.submit_steal(uid, question_id, answer_index).await?;
            Ok(reply.into())
        }

        ClientEvent::PlayAgainRequest { room_id } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.play_again(uid).await?;
            Ok(reply.into())
        }

        ClientEvent::Rejoin { room_id } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            match handle.rejoin(uid.clone(), out_tx.clone()).await {
                Ok(reply) => {
                    state.tracker.lock().await.enter_room(&uid, room_id);
                    Ok(reply.into())
                }
                Err(e) => {
                    let _ = out_tx.send(ServerFrame::Event(ServerEvent::RejoinError {
                        message: e.to_string(),
                    }));
                    Err(e)
                }
            }
        }

        ClientEvent::LobbyMessage { room_id, message } => {
            let handle = state
                .service
                .handle(room_id)
                .await
                .ok_or(EngineError::Room(RoomError::NotFound))?;
            let reply = handle.lobby_message(uid, message).await?;
            Ok(reply.into())
        }

        ClientEvent::PrivateMessage {
            room_id: _,
            to_uid,
            message,
        } => {
            if message.chars().count() > MAX_CHAT_LEN {
                return Err(EngineError::InvalidState(format!(
                    "message exceeds {MAX_CHAT_LEN} characters"
                )));
            }
            let sender = state
                .tracker
                .lock()
                .await
                .sender_for(&to_uid)
                .ok_or_else(|| {
                    EngineError::InvalidState(format!("{to_uid} is offline"))
                })?;
            let _ = sender.send(ServerFrame::Event(ServerEvent::PrivateMessage {
                from_uid: uid,
                message,
            }));
            Ok(DispatchResult::ok(serde_json::Value::Null))
        }
    }
}

/// Preferred display name: the explicit one from the payload, then the
/// identity provider's, then a uid-derived fallback.
fn display_name(identity: &AuthIdentity, explicit: Option<String>) -> String {
    explicit
        .filter(|n| !n.trim().is_empty())
        .or_else(|| identity.name.clone())
        .unwrap_or_else(|| {
            let short: String = identity.uid.as_str().chars().take(6).collect();
            format!("Player-{short}")
        })
}

/// Shapes an error for the ack. Internal faults are masked in
/// production; client errors pass through verbatim.
fn ack_message(e: &EngineError, production: bool) -> String {
    let internal = matches!(
        e,
        EngineError::Store(_)
            | EngineError::Source(_)
            | EngineError::Room(RoomError::Store(_) | RoomError::Corrupt(_))
    );
    if internal && production {
        "internal server error".into()
    } else {
        e.to_string()
    }
}

async fn send_frame(
    conn: &WebSocketConnection,
    codec: &triviarena_protocol::JsonCodec,
    frame: &ServerFrame,
) -> Result<(), TriviarenaError> {
    let bytes = codec.encode(frame)?;
    let text = String::from_utf8(bytes).map_err(|_| {
        TriviarenaError::Protocol(triviarena_protocol::ProtocolError::InvalidFrame(
            "frame is not valid UTF-8".into(),
        ))
    })?;
    conn.send(&text).await.map_err(Into::into)
}
