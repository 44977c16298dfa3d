use crate::codec::Message;
use crate::engine::ClientRegistry;
use crate::entity::ActuatorRegistration;
use crate::event::Event;
use crate::request::Request;
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shared handles a connection task needs: the engine table and the two
/// intake queues feeding the dispatch loop.
#[derive(Clone)]
pub struct RouterContext {
    pub registry: Arc<ClientRegistry>,
    pub request_tx: mpsc::UnboundedSender<Request>,
    pub event_tx: mpsc::UnboundedSender<Event>,
}

/// Drive one inbound connection until it closes.
///
/// The first decoded line classifies the peer: a request binds this
/// connection as the client's response channel, an actuator registration
/// opens the reverse command connection, an event marks a plain device
/// feed. Malformed lines are logged and skipped; they never tear the
/// connection down.
pub async fn handle_connection(stream: TcpStream, ctx: RouterContext) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    debug!(peer = %peer, "Connection accepted");

    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let (response_tx, response_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_lines(write_half, response_rx));

    let mut first_line = true;
    let mut bound_clients = std::collections::HashSet::new();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Read failed, closing connection");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match Message::decode(&line) {
            Ok(Message::Request(request)) => {
                if request.client_id == Request::UNATTRIBUTED {
                    warn!(peer = %peer, "Dropping request without a client id");
                } else {
                    // Every request line binds its client's responses to
                    // this connection; a connection may carry several ids.
                    let engine = ctx.registry.get_or_create(request.client_id);
                    engine.bind_response_sink(response_tx.clone());
                    if bound_clients.insert(request.client_id) {
                        info!(peer = %peer, client_id = request.client_id, "Client connection bound");
                    }
                    let _ = ctx.request_tx.send(request);
                }
            }
            Ok(Message::Event(event)) => {
                ctx.registry.get_or_create(event.client_id());
                let _ = ctx.event_tx.send(event);
            }
            Ok(Message::Registration(registration)) => {
                if !first_line {
                    warn!(peer = %peer, actuator_id = registration.id, "Ignoring repeated actuator registration");
                } else if let Err(e) = register_actuator(&ctx, &registration).await {
                    warn!(peer = %peer, actuator_id = registration.id, error = %e, "Actuator registration failed");
                }
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, line = %line, "Dropping malformed line");
            }
        }
        first_line = false;
    }

    debug!(peer = %peer, "Connection closed");
}

/// Open the reverse command connection declared in the registration and
/// hand the engine a sender for it.
async fn register_actuator(ctx: &RouterContext, registration: &ActuatorRegistration) -> anyhow::Result<()> {
    let addr = registration.command_addr();
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to actuator command endpoint {addr}"))?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_lines(stream, command_rx));

    let engine = ctx.registry.get_or_create(registration.client_id);
    engine.register_actuator(registration, command_tx);
    Ok(())
}

/// Copy queued lines onto a socket, one message per line. Ends when the
/// sending side drops the channel or the socket dies.
async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(error = %e, "Write failed, dropping outbound channel");
            break;
        }
        if let Err(e) = writer.write_all(b"\n").await {
            warn!(error = %e, "Write failed, dropping outbound channel");
            break;
        }
    }
}
