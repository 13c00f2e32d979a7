// crates/arena-server/src/client.rs

use std::net::SocketAddr;
use std::sync::Arc;

use arena_protocol::{ConnectRequest, SessionFrame};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::arena::Arena;
use crate::proxy::ClientHandle;
use crate::types::{OutboundRx, OutboundTx};

/// Run the I/O loop for a single client connection.
///
/// The first line must be a `connect` frame; a connection that opens
/// with anything else is dropped without a reply.
pub async fn run_client(stream: TcpStream, peer: SocketAddr, arena: Arc<Arena>) -> anyhow::Result<()> {
    stream.set_nodelay(true)?;

    // Split stream
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let Some(first) = lines.next_line().await? else {
        debug!(%peer, "connection closed before handshake");
        return Ok(());
    };
    let request = match ConnectRequest::parse(&first) {
        Ok(request) => request,
        Err(e) => {
            warn!(%peer, error = %e, "rejecting connection: bad connect frame");
            return Ok(());
        }
    };

    // Writer task: drain queued frames onto the socket
    let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = oneshot::channel();
    let writer = tokio::spawn(write_frames(peer, write_half, out_rx, stop_rx));

    let client = arena.register_client(request, out_tx).await;
    info!(
        client = client.name(),
        %peer,
        max_games = client.max_games(),
        supported_games = ?client.supported_games(),
        "client connected"
    );

    let result = read_frames(&client, &mut lines).await;

    // Leave the directory first so no new session can pick the client,
    // then every engine it played with hears about the departure
    arena.unregister_client(&client).await;
    client.disconnect();
    let _ = stop_tx.send(());
    let _ = writer.await;

    match &result {
        Ok(()) => info!(client = client.name(), "client disconnected"),
        Err(e) => warn!(client = client.name(), error = %e, "client connection failed"),
    }
    result
}

async fn read_frames(
    client: &ClientHandle,
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
) -> anyhow::Result<()> {
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let frame = match SessionFrame::parse(&line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(client = client.name(), error = %e, "protocol error, dropping client");
                return Ok(());
            }
        };

        match frame.game_id {
            Some(session) => {
                if !client.route_to_session(session, frame.body_line()) {
                    debug!(client = client.name(), %session, "frame for unknown session dropped");
                }
            }
            None if frame.is_close() => {
                debug!(client = client.name(), "client closed its connection");
                return Ok(());
            }
            None => debug!(client = client.name(), "frame without game_id dropped"),
        }
    }
    Ok(())
}

async fn write_frames(
    peer: SocketAddr,
    mut socket: OwnedWriteHalf,
    mut out_rx: OutboundRx,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let frame = tokio::select! {
            frame = out_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = &mut stop => {
                // flush what is already queued, then hang up
                while let Ok(frame) = out_rx.try_recv() {
                    if write_line(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
                break;
            }
        };

        if let Err(e) = write_line(&mut socket, &frame).await {
            debug!(%peer, error = %e, "client write failed");
            break;
        }
    }
    let _ = socket.shutdown().await;
}

async fn write_line(socket: &mut OwnedWriteHalf, frame: &str) -> std::io::Result<()> {
    let data = format!("{frame}\n");
    socket.write_all(data.as_bytes()).await?;
    socket.flush().await
}
