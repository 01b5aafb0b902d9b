//! Per-connection handler: name claim, request routing, event delivery.
//!
//! Each accepted connection gets its own task running this handler:
//!   1. Receive `InitialMessage` → claim the name
//!   2. Loop: answer requests and forward the agent's arena events
//!   3. On exit, leave the arena and release the name

use std::sync::Arc;
use std::sync::atomic::Ordering;

use riichi_arena::{AgentReceiver, ArenaError, outbound_queue};
use riichi_protocol::{AgentId, ArenaMessage, Codec, ProtocolError, ServerMessage};
use riichi_transport::{Connection, WebSocketConnection};
use tokio::time::Instant;

use crate::RiichiError;
use crate::server::ServerState;

/// Drop guard that takes the agent out of its arena and frees its name.
///
/// `Drop` is synchronous, so the async cleanup runs on a spawned task.
struct AgentGuard<C: Codec> {
    agent: AgentId,
    name: String,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for AgentGuard<C> {
    fn drop(&mut self) {
        let agent = self.agent;
        let name = std::mem::take(&mut self.name);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match state.registry.leave(agent).await {
                Ok(()) | Err(ArenaError::NotInArena(_)) => {}
                Err(e) => tracing::debug!(%agent, error = %e, "leave on disconnect failed"),
            }
            state.names.lock().await.remove(&name);
        });
    }
}

/// One client's view of its own connection.
struct Session {
    agent: AgentId,
    name: String,
    /// Present while the agent sits in an arena.
    outbox: Option<AgentReceiver>,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RiichiError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let name = match perform_handshake(&conn, &state).await {
        Ok(name) => name,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let agent = AgentId(state.next_agent.fetch_add(1, Ordering::Relaxed));
    let _guard = AgentGuard {
        agent,
        name: name.clone(),
        state: Arc::clone(&state),
    };
    send(&conn, &state.codec, &ServerMessage::ok()).await?;
    tracing::info!(%conn_id, %agent, %name, "agent connected");

    let mut session = Session { agent, name, outbox: None };
    let mut last_inbound = Instant::now();

    loop {
        tokio::select! {
            inbound = tokio::time::timeout_at(last_inbound + state.config.idle_timeout, conn.recv()) => {
                let data = match inbound {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%agent, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%agent, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%agent, "connection idle, closing");
                        break;
                    }
                };
                last_inbound = Instant::now();
                let reply = handle_frame(&state, &mut session, &data).await;
                send(&conn, &state.codec, &reply).await?;
            }
            outbound = next_outbound(&mut session.outbox) => {
                let Some(arena_message) = outbound else {
                    // The arena dropped our queue: it fell behind.
                    tracing::warn!(%agent, "removed from arena, closing");
                    break;
                };
                send(&conn, &state.codec, &ServerMessage::ArenaEvent { arena_message }).await?;
            }
        }
    }

    let _ = conn.close().await;
    Ok(())
    // _guard drops here → leave and name release fire.
}

/// Receives the handshake and claims the name. Failures are answered with
/// a `GenericResponse` before the error is returned.
async fn perform_handshake<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
) -> Result<String, RiichiError> {
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before handshake".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let name = match state.codec.decode::<ServerMessage>(&data) {
        Ok(ServerMessage::InitialMessage { name }) => name.trim().to_string(),
        Ok(_) => {
            let reason = "first message must be InitialMessage";
            send(conn, &state.codec, &ServerMessage::fail(format!("malformed message: {reason}"))).await?;
            return Err(ProtocolError::InvalidMessage(reason.into()).into());
        }
        Err(e) => {
            send(conn, &state.codec, &ServerMessage::fail(format!("malformed message: {e}"))).await?;
            return Err(e.into());
        }
    };

    if name.is_empty() {
        send(conn, &state.codec, &ServerMessage::fail("rejected: name must not be empty")).await?;
        return Err(ProtocolError::InvalidMessage("empty name".into()).into());
    }
    let claimed = state.names.lock().await.insert(name.clone());
    if !claimed {
        send(conn, &state.codec, &ServerMessage::fail(format!("rejected: name {name:?} is taken"))).await?;
        return Err(ProtocolError::InvalidMessage(format!("name {name:?} is taken")).into());
    }
    Ok(name)
}

/// Decodes and answers one request. Every request gets exactly one reply.
async fn handle_frame<C: Codec>(
    state: &Arc<ServerState<C>>,
    session: &mut Session,
    data: &[u8],
) -> ServerMessage {
    let msg: ServerMessage = match state.codec.decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(agent = %session.agent, error = %e, "failed to decode request");
            return ServerMessage::fail(format!("malformed message: {e}"));
        }
    };

    match msg {
        ServerMessage::CreateArena { arena_name } => {
            let created = state.registry.lock().await.create(&arena_name);
            reply(created.map(|_| ()))
        }

        ServerMessage::ListArenas => {
            let arenas = state.registry.list().await;
            ServerMessage::ListArenasResponse { arenas }
        }

        ServerMessage::ArenaInfo { arena_name } => {
            let handle = state.registry.lock().await.get(&arena_name);
            match handle {
                Some(handle) => {
                    let snapshot = handle.snapshot().await;
                    ServerMessage::ArenaInfoResponse {
                        name: snapshot.name,
                        agents: snapshot.agents,
                        game_started: snapshot.game_started,
                    }
                }
                None => rejection(&ArenaError::NotFound(arena_name)),
            }
        }

        ServerMessage::JoinArena { arena_name } => {
            let (tx, rx) = outbound_queue(state.config.arena.outbound_capacity);
            let joined = state
                .registry
                .join(session.agent, &session.name, &arena_name, tx)
                .await;
            if let Ok(role) = &joined {
                tracing::info!(agent = %session.agent, arena = %arena_name, ?role, "joined arena");
                session.outbox = Some(rx);
            }
            reply(joined.map(|_| ()))
        }

        ServerMessage::LeaveArena
        | ServerMessage::ArenaAction { arena_message: ArenaMessage::PlayerQuitAction } => {
            reply(leave_arena(state, session).await)
        }

        ServerMessage::ArenaAction { arena_message } => {
            let handle = state.registry.lock().await.arena_of(session.agent);
            let result = match handle {
                Some(handle) => handle.handle_message(session.agent, arena_message).await,
                None => Err(ArenaError::NotInArena(session.agent)),
            };
            reply(result)
        }

        ServerMessage::InitialMessage { .. } => {
            ServerMessage::fail(format!("rejected: already connected as {:?}", session.name))
        }

        other @ (ServerMessage::ArenaEvent { .. }
        | ServerMessage::GenericResponse { .. }
        | ServerMessage::ListArenasResponse { .. }
        | ServerMessage::ArenaInfoResponse { .. }) => {
            tracing::debug!(agent = %session.agent, ?other, "client sent a server-only message");
            ServerMessage::fail("malformed message: server-to-client message")
        }
    }
}

async fn leave_arena<C: Codec>(
    state: &Arc<ServerState<C>>,
    session: &mut Session,
) -> Result<(), ArenaError> {
    session.outbox = None;
    state.registry.leave(session.agent).await
}

fn reply(result: Result<(), ArenaError>) -> ServerMessage {
    match result {
        Ok(()) => ServerMessage::ok(),
        Err(e) => rejection(&e),
    }
}

/// Rule violations read "illegal action", anything else "rejected".
fn rejection(err: &ArenaError) -> ServerMessage {
    if err.is_rule_violation() {
        ServerMessage::fail(format!("illegal action: {err}"))
    } else {
        ServerMessage::fail(format!("rejected: {err}"))
    }
}

async fn next_outbound(outbox: &mut Option<AgentReceiver>) -> Option<ArenaMessage> {
    match outbox {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    msg: &ServerMessage,
) -> Result<(), RiichiError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}
