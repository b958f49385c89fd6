use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use inviterole_models::gateway::{
    GatewayEvent, GatewayMessage, Hello, EVENT_GUILD_MEMBER_ADD, EVENT_INVITE_CREATE,
    EVENT_INVITE_DELETE, EVENT_READY, OP_DISPATCH, OP_HEARTBEAT, OP_HEARTBEAT_ACK, OP_HELLO,
    OP_INVALID_SESSION, OP_RECONNECT,
};
use inviterole_models::member::GuildMemberAdd;
use tokio::sync::{mpsc, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::listener::GatewayConfig;
use crate::GatewayError;

const HELLO_TIMEOUT: Duration = Duration::from_secs(30);

/// Close codes after which reconnecting with the same settings is pointless.
const FATAL_CLOSE_CODES: &[u16] = &[4004, 4010, 4011, 4012, 4013, 4014];

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    Reconnect,
    Shutdown,
    ReceiverClosed,
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub last_sequence: Option<u64>,
    pub awaiting_ack: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FrameAction {
    Nothing,
    Heartbeat,
    Forward(GatewayEvent),
    Reconnect,
}

pub(crate) fn handle_frame(state: &mut SessionState, msg: GatewayMessage) -> FrameAction {
    if let Some(seq) = msg.s {
        state.last_sequence = Some(seq);
    }
    match msg.op {
        OP_DISPATCH => handle_dispatch(msg.t.as_deref(), msg.d),
        OP_HEARTBEAT => FrameAction::Heartbeat,
        OP_HEARTBEAT_ACK => {
            state.awaiting_ack = false;
            FrameAction::Nothing
        }
        OP_RECONNECT => FrameAction::Reconnect,
        OP_INVALID_SESSION => {
            tracing::warn!("gateway invalidated the session");
            FrameAction::Reconnect
        }
        op => {
            tracing::debug!(op, "ignoring gateway opcode");
            FrameAction::Nothing
        }
    }
}

fn handle_dispatch(event: Option<&str>, data: Option<serde_json::Value>) -> FrameAction {
    match event {
        Some(EVENT_GUILD_MEMBER_ADD) => {
            let Some(data) = data else {
                return FrameAction::Nothing;
            };
            match serde_json::from_value::<GuildMemberAdd>(data) {
                Ok(add) => FrameAction::Forward(GatewayEvent::MemberJoined(add.into())),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed GUILD_MEMBER_ADD payload");
                    FrameAction::Nothing
                }
            }
        }
        Some(EVENT_READY) => {
            let user = data
                .as_ref()
                .and_then(|d| d.pointer("/user/username"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            tracing::info!(user, "gateway session ready");
            FrameAction::Forward(GatewayEvent::Ready)
        }
        Some(name @ (EVENT_INVITE_CREATE | EVENT_INVITE_DELETE)) => {
            let code = data
                .as_ref()
                .and_then(|d| d.get("code"))
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            tracing::debug!(event = name, code, "invite changed");
            FrameAction::Nothing
        }
        _ => FrameAction::Nothing,
    }
}

async fn send<S>(sink: &mut S, msg: &GatewayMessage) -> Result<(), GatewayError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|e| GatewayError::Protocol(e.to_string()))?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn read_hello<S>(stream: &mut S) -> Result<Hello, GatewayError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        if let Message::Text(text) = frame? {
            let msg: GatewayMessage = serde_json::from_str(text.as_str())
                .map_err(|e| GatewayError::Protocol(e.to_string()))?;
            if msg.op == OP_HELLO {
                let data = msg
                    .d
                    .ok_or_else(|| GatewayError::Protocol("HELLO without data".into()))?;
                return serde_json::from_value::<Hello>(data)
                    .map_err(|e| GatewayError::Protocol(e.to_string()));
            }
        }
    }
    Err(GatewayError::Protocol("connection closed before HELLO".into()))
}

async fn wait_for_hello<S>(stream: &mut S) -> Result<Hello, GatewayError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    tokio::time::timeout(HELLO_TIMEOUT, read_hello(stream))
        .await
        .map_err(|_| GatewayError::Protocol("timed out waiting for HELLO".into()))?
}

/// One connection: identify, heartbeat, forward joins until the socket ends.
pub(crate) async fn run(
    config: &GatewayConfig,
    sender: &mpsc::Sender<GatewayEvent>,
    shutdown: &Arc<Notify>,
) -> Result<SessionEnd, GatewayError> {
    let (socket, _) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    let hello = wait_for_hello(&mut stream).await?;
    let period = Duration::from_millis(hello.heartbeat_interval);
    send(&mut sink, &GatewayMessage::identify(&config.token, config.intents)).await?;
    tracing::debug!(heartbeat_ms = hello.heartbeat_interval, "identified with gateway");

    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut state = SessionState::default();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            _ = heartbeat.tick() => {
                if state.awaiting_ack {
                    tracing::warn!("no heartbeat ack from gateway, reconnecting");
                    return Ok(SessionEnd::Reconnect);
                }
                state.awaiting_ack = true;
                send(&mut sink, &GatewayMessage::heartbeat(state.last_sequence)).await?;
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let msg: GatewayMessage = serde_json::from_str(text.as_str())
                        .map_err(|e| GatewayError::Protocol(e.to_string()))?;
                    match handle_frame(&mut state, msg) {
                        FrameAction::Nothing => {}
                        FrameAction::Heartbeat => {
                            send(&mut sink, &GatewayMessage::heartbeat(state.last_sequence)).await?;
                        }
                        FrameAction::Forward(event) => {
                            if sender.send(event).await.is_err() {
                                return Ok(SessionEnd::ReceiverClosed);
                            }
                        }
                        FrameAction::Reconnect => return Ok(SessionEnd::Reconnect),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        let code = u16::from(frame.code);
                        tracing::info!(code, reason = frame.reason.as_str(), "gateway closed the connection");
                        if FATAL_CLOSE_CODES.contains(&code) {
                            return Err(GatewayError::Fatal {
                                code,
                                reason: frame.reason.as_str().to_string(),
                            });
                        }
                    }
                    return Ok(SessionEnd::Reconnect);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Reconnect),
            },
        }
    }
}
