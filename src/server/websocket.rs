use crate::agent::ChatAgent;
use crate::error::ChatError;
use crate::llm::chat::{ Chunk, ChunkStream };
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::{ ChatSession, Turn, TurnOutcome };

use std::error::Error;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

use chrono::Utc;
use log::{ info, warn, error, debug };
use futures::{ Sink, SinkExt, StreamExt };
use uuid::Uuid;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

pub async fn start_ws_server(
    addr: &str,
    agent: ChatAgent
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", listener.local_addr()?);
    serve(listener, agent).await
}

pub async fn serve(
    listener: TcpListener,
    agent: ChatAgent
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);
        let agent_clone = agent.clone();

        tokio::spawn(async move {
            if let Err(e) = process_connection(peer, stream, agent_clone).await {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: ChatAgent
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    match accept_async(stream).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

enum Event {
    Chunk(Option<Result<Chunk, ChatError>>),
    Incoming(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

async fn next_chunk(stream: &mut Option<ChunkStream>) -> Option<Result<Chunk, ChatError>> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn send_server_message<T>(tx: &mut T, peer: SocketAddr, msg: &ServerMessage) -> bool
    where T: Sink<Message> + Unpin, T::Error: std::fmt::Display
{
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize message for {}: {}", peer, e);
            return true;
        }
    };
    match tx.send(Message::Text(json)).await {
        Ok(()) => true,
        Err(e) => {
            error!("Error sending message to {}: {}", peer, e);
            false
        }
    }
}

fn outcome_message(outcome: TurnOutcome) -> Option<ServerMessage> {
    match outcome {
        TurnOutcome::Rejected => None,
        TurnOutcome::Completed { id, .. } => Some(ServerMessage::Done { id, timestamp: Utc::now() }),
        TurnOutcome::Failed { id, message } => Some(ServerMessage::Error { id: Some(id), message }),
    }
}

/// One connection is one chat session. Chunks of the running turn and
/// incoming client messages are polled together, so a chat sent while a turn
/// is streaming is answered with `busy` and never reaches the conversation.
pub async fn handle_connection<S>(peer: SocketAddr, websocket: WebSocketStream<S>, agent: ChatAgent)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let session_id = Uuid::new_v4().to_string();
    info!("Assigned chat session {} to {}", session_id, peer);

    let mut session = ChatSession::new();
    let mut turn: Option<Turn> = None;
    let mut stream: Option<ChunkStream> = None;

    let snapshot = ServerMessage::Snapshot {
        messages: session.conversation().messages().to_vec(),
        loading: session.is_loading(),
    };
    if !send_server_message(&mut tx, peer, &snapshot).await {
        return;
    }

    loop {
        let event =
            tokio::select! {
            item = next_chunk(&mut stream), if stream.is_some() => Event::Chunk(item),
            msg = rx.next() => Event::Incoming(msg),
        };

        match event {
            Event::Chunk(Some(Ok(chunk))) => {
                let Some(active) = turn.as_mut() else {
                    continue;
                };
                if !session.apply_chunk(active, &chunk.text) {
                    continue;
                }
                if session.conversation().get(&active.placeholder_id).is_none() {
                    debug!("Session {} was cleared; dropping chunk", session_id);
                    continue;
                }
                let partial = ServerMessage::Partial {
                    id: active.placeholder_id.clone(),
                    content: active.accumulated().to_string(),
                    delta: chunk.text,
                };
                if !send_server_message(&mut tx, peer, &partial).await {
                    break;
                }
            }
            Event::Chunk(Some(Err(e))) => {
                stream = None;
                if let Some(active) = turn.take() {
                    let outcome = session.fail_turn(active, &e);
                    if let Some(msg) = outcome_message(outcome) {
                        if !send_server_message(&mut tx, peer, &msg).await {
                            break;
                        }
                    }
                }
            }
            Event::Chunk(None) => {
                stream = None;
                if let Some(active) = turn.take() {
                    let outcome = session.finish_turn(active);
                    if let Some(msg) = outcome_message(outcome) {
                        if !send_server_message(&mut tx, peer, &msg).await {
                            break;
                        }
                    }
                }
            }
            Event::Incoming(None) => {
                break;
            }
            Event::Incoming(Some(Ok(message))) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::Error {
                        id: None,
                        message: "Message too large".to_string(),
                    };
                    send_server_message(&mut tx, peer, &error_msg).await;
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Chat { content }) => {
                                if session.is_loading() {
                                    if !send_server_message(&mut tx, peer, &ServerMessage::Busy).await {
                                        break;
                                    }
                                    continue;
                                }
                                let Some(new_turn) = session.begin_turn(&content) else {
                                    continue;
                                };

                                let messages = session.conversation().messages();
                                let appended: Vec<ServerMessage> = messages[messages.len() - 2..]
                                    .iter()
                                    .cloned()
                                    .map(|message| ServerMessage::Appended { message })
                                    .collect();
                                let mut sent = true;
                                for msg in &appended {
                                    sent = sent && send_server_message(&mut tx, peer, msg).await;
                                }
                                if !sent {
                                    break;
                                }

                                match agent.open_stream(&new_turn).await {
                                    Ok(opened) => {
                                        session.stream_opened();
                                        stream = Some(opened);
                                        turn = Some(new_turn);
                                    }
                                    Err(e) => {
                                        let outcome = session.fail_turn(new_turn, &e);
                                        if let Some(msg) = outcome_message(outcome) {
                                            if !send_server_message(&mut tx, peer, &msg).await {
                                                break;
                                            }
                                        }
                                    }
                                }
                            }
                            Ok(ClientMessage::Clear { confirm }) => {
                                if !confirm {
                                    debug!("Ignoring unconfirmed clear from {}", peer);
                                    continue;
                                }
                                session.reset();
                                info!("Session {} cleared by {}", session_id, peer);
                                let cleared = ServerMessage::Cleared {
                                    messages: session.conversation().messages().to_vec(),
                                    loading: session.is_loading(),
                                };
                                if !send_server_message(&mut tx, peer, &cleared).await {
                                    break;
                                }
                            }
                            Ok(ClientMessage::History) => {
                                let snapshot = ServerMessage::Snapshot {
                                    messages: session.conversation().messages().to_vec(),
                                    loading: session.is_loading(),
                                };
                                if !send_server_message(&mut tx, peer, &snapshot).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let invalid = ServerMessage::Invalid {
                                    message: format!("Failed to parse message: {}", e),
                                };
                                if !send_server_message(&mut tx, peer, &invalid).await {
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Event::Incoming(Some(Err(e))) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }

    if turn.is_some() {
        warn!("Session {} closed with a reply still streaming", session_id);
    }
    info!("WebSocket connection closed for {} (Session ID: {})", peer, session_id);
}
