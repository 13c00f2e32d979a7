//! Endpoints: duplex, newline-delimited channels between the server and
//! one execution unit.
//!
//! [`Backend::open`] returns the server's [`Endpoint`] together with a
//! [`RemoteEnd`]. The remote end's [`RemoteDescriptor`] is what the
//! execution unit receives on its command line to attach to the other
//! side.
//!
//! - `pipe`: two anonymous pipes. The unit inherits the remote fds.
//! - `socket`: a loopback TCP listener on an ephemeral port that accepts
//!   exactly one connection, then stops listening.
//!
//! With the socket backend the peer may connect long after the endpoint
//! is handed out. Reads and writes issued before that wait for the
//! connection; if the unit exits (or the remote end is dropped) without
//! connecting, they resolve as closed.

use std::io;
use std::net::Ipv4Addr;
use std::str::FromStr;

use arena_protocol::RemoteDescriptor;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;

/// Transport used for endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Pipe,
    Socket,
}

impl Backend {
    /// Pipes where the platform can hand them to a child process,
    /// loopback sockets elsewhere.
    pub fn detect() -> Backend {
        if cfg!(unix) {
            Backend::Pipe
        } else {
            Backend::Socket
        }
    }

    /// Mint a fresh endpoint. Must be called from within a tokio runtime.
    pub fn open(self) -> io::Result<(Endpoint, RemoteEnd)> {
        match self {
            Backend::Pipe => open_pipe(),
            Backend::Socket => open_socket(),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown ipc backend {0:?} (expected auto, pipe or socket)")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::detect()),
            "pipe" if cfg!(unix) => Ok(Backend::Pipe),
            "socket" | "tcp" => Ok(Backend::Socket),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// The server's side of an endpoint.
pub struct Endpoint {
    reader: FrameReader,
    writer: FrameWriter,
}

impl Endpoint {
    fn new(reader: FrameReader, writer: FrameWriter) -> Self {
        Endpoint { reader, writer }
    }

    /// Separate the halves so they can be driven by different tasks.
    pub fn split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }

    pub async fn read_frame(&mut self) -> io::Result<Option<String>> {
        self.reader.read_frame().await
    }

    pub async fn write_frame(&mut self, frame: &str) {
        self.writer.write_frame(frame).await
    }

    /// Release the underlying transport. Idempotent.
    pub async fn close(&mut self) {
        self.writer.close().await;
        self.reader.close();
    }
}

enum ReadState {
    Connecting(oneshot::Receiver<BoxedRead>),
    Open(BufReader<BoxedRead>),
    Closed,
}

/// Receiving half of an [`Endpoint`].
pub struct FrameReader {
    state: ReadState,
}

impl FrameReader {
    fn open(reader: BoxedRead) -> Self {
        FrameReader {
            state: ReadState::Open(BufReader::new(reader)),
        }
    }

    fn connecting(rx: oneshot::Receiver<BoxedRead>) -> Self {
        FrameReader {
            state: ReadState::Connecting(rx),
        }
    }

    /// Next non-empty frame, without its newline.
    ///
    /// `Ok(None)` once the peer has closed its side, the endpoint was
    /// closed locally, or the peer never connected.
    pub async fn read_frame(&mut self) -> io::Result<Option<String>> {
        loop {
            match &mut self.state {
                ReadState::Connecting(rx) => {
                    let next = match rx.await {
                        Ok(reader) => ReadState::Open(BufReader::new(reader)),
                        Err(_) => ReadState::Closed,
                    };
                    self.state = next;
                }
                ReadState::Open(reader) => {
                    let mut line = String::new();
                    let read = reader.read_line(&mut line).await;
                    match read {
                        Ok(0) => {
                            self.state = ReadState::Closed;
                            return Ok(None);
                        }
                        Ok(_) => {
                            let frame = line.trim();
                            if !frame.is_empty() {
                                return Ok(Some(frame.to_string()));
                            }
                        }
                        Err(e) => {
                            self.state = ReadState::Closed;
                            return Err(e);
                        }
                    }
                }
                ReadState::Closed => return Ok(None),
            }
        }
    }

    pub fn close(&mut self) {
        self.state = ReadState::Closed;
    }
}

enum WriteState {
    Connecting(oneshot::Receiver<BoxedWrite>),
    Open(BoxedWrite),
    Closed,
}

/// Sending half of an [`Endpoint`].
pub struct FrameWriter {
    state: WriteState,
}

impl FrameWriter {
    fn open(writer: BoxedWrite) -> Self {
        FrameWriter {
            state: WriteState::Open(writer),
        }
    }

    fn connecting(rx: oneshot::Receiver<BoxedWrite>) -> Self {
        FrameWriter {
            state: WriteState::Connecting(rx),
        }
    }

    async fn ready(&mut self) -> Option<&mut BoxedWrite> {
        if let WriteState::Connecting(rx) = &mut self.state {
            let next = match rx.await {
                Ok(writer) => WriteState::Open(writer),
                Err(_) => WriteState::Closed,
            };
            self.state = next;
        }
        match &mut self.state {
            WriteState::Open(writer) => Some(writer),
            _ => None,
        }
    }

    /// Send one frame, appending the newline.
    ///
    /// Writing to a closed endpoint is a no-op. A failed write closes
    /// the writer; later frames are dropped.
    pub async fn write_frame(&mut self, frame: &str) {
        let Some(writer) = self.ready().await else {
            return;
        };
        let result = write_line(writer, frame).await;
        if let Err(e) = result {
            debug!(error = %e, "endpoint write failed, closing writer");
            self.state = WriteState::Closed;
        }
    }

    pub async fn close(&mut self) {
        if let WriteState::Open(writer) = &mut self.state {
            let _ = writer.shutdown().await;
        }
        self.state = WriteState::Closed;
    }
}

async fn write_line(writer: &mut BoxedWrite, frame: &str) -> io::Result<()> {
    let mut line = String::with_capacity(frame.len() + 1);
    line.push_str(frame);
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

/// The execution unit's side of an endpoint, until the unit is launched.
///
/// Dropping it without [`RemoteEnd::release`] abandons the endpoint:
/// the server's side then reads end of stream.
#[derive(Debug)]
pub struct RemoteEnd {
    descriptor: RemoteDescriptor,
    kind: RemoteKind,
}

#[derive(Debug)]
enum RemoteKind {
    #[cfg(unix)]
    Pipe {
        fds: Vec<std::os::fd::OwnedFd>,
    },
    Socket {
        launch: oneshot::Sender<watch::Receiver<bool>>,
    },
}

impl RemoteEnd {
    pub fn descriptor(&self) -> RemoteDescriptor {
        self.descriptor
    }

    /// Raw fds the execution unit must inherit.
    pub fn inheritable_fds(&self) -> Vec<i32> {
        match &self.kind {
            #[cfg(unix)]
            RemoteKind::Pipe { fds } => {
                use std::os::fd::AsRawFd;
                fds.iter().map(AsRawFd::as_raw_fd).collect()
            }
            RemoteKind::Socket { .. } => Vec::new(),
        }
    }

    /// The execution unit has been launched with this end.
    ///
    /// Our copies of inherited fds are closed. A socket endpoint starts
    /// waiting for its peer and gives up once `exited` turns true.
    pub fn release(self, exited: watch::Receiver<bool>) {
        match self.kind {
            #[cfg(unix)]
            RemoteKind::Pipe { fds } => drop(fds),
            RemoteKind::Socket { launch } => {
                let _ = launch.send(exited);
            }
        }
    }
}

#[cfg(unix)]
fn open_pipe() -> io::Result<(Endpoint, RemoteEnd)> {
    use std::fs::File;
    use std::os::fd::{AsRawFd, OwnedFd};
    use tokio::net::unix::pipe;

    // server -> unit
    let (unit_reads, server_writes) = io::pipe()?;
    // unit -> server
    let (server_reads, unit_writes) = io::pipe()?;

    let reader = pipe::Receiver::from_file(File::from(OwnedFd::from(server_reads)))?;
    let writer = pipe::Sender::from_file(File::from(OwnedFd::from(server_writes)))?;

    let unit_reads = OwnedFd::from(unit_reads);
    let unit_writes = OwnedFd::from(unit_writes);
    let descriptor = RemoteDescriptor::Pipe {
        read_fd: unit_reads.as_raw_fd(),
        write_fd: unit_writes.as_raw_fd(),
    };

    let endpoint = Endpoint::new(
        FrameReader::open(Box::new(reader)),
        FrameWriter::open(Box::new(writer)),
    );
    let remote = RemoteEnd {
        descriptor,
        kind: RemoteKind::Pipe {
            fds: vec![unit_reads, unit_writes],
        },
    };
    Ok((endpoint, remote))
}

#[cfg(not(unix))]
fn open_pipe() -> io::Result<(Endpoint, RemoteEnd)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pipe endpoints need a unix host",
    ))
}

fn open_socket() -> io::Result<(Endpoint, RemoteEnd)> {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    listener.set_nonblocking(true)?;
    let port = listener.local_addr()?.port();
    let listener = TcpListener::from_std(listener)?;

    let (read_tx, read_rx) = oneshot::channel();
    let (write_tx, write_rx) = oneshot::channel();
    let (launch_tx, launch_rx) = oneshot::channel();
    tokio::spawn(accept_one(listener, port, launch_rx, read_tx, write_tx));

    let endpoint = Endpoint::new(
        FrameReader::connecting(read_rx),
        FrameWriter::connecting(write_rx),
    );
    let remote = RemoteEnd {
        descriptor: RemoteDescriptor::Socket { port },
        kind: RemoteKind::Socket { launch: launch_tx },
    };
    Ok((endpoint, remote))
}

/// Accept the single peer of a socket endpoint and hand its halves over.
async fn accept_one(
    listener: TcpListener,
    port: u16,
    launch: oneshot::Receiver<watch::Receiver<bool>>,
    read_tx: oneshot::Sender<BoxedRead>,
    write_tx: oneshot::Sender<BoxedWrite>,
) {
    let Ok(mut exited) = launch.await else {
        debug!(port, "socket endpoint abandoned before launch");
        return;
    };

    let accepted = tokio::select! {
        accepted = listener.accept() => accepted,
        _ = exited.wait_for(|gone| *gone) => {
            warn!(port, "execution unit exited before connecting");
            return;
        }
    };
    drop(listener);

    match accepted {
        Ok((stream, peer)) => {
            debug!(port, %peer, "socket endpoint connected");
            let _ = stream.set_nodelay(true);
            let (read_half, write_half) = stream.into_split();
            let _ = read_tx.send(Box::new(read_half));
            let _ = write_tx.send(Box::new(write_half));
        }
        Err(e) => warn!(port, error = %e, "socket endpoint accept failed"),
    }
}
