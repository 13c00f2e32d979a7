//! Child side of an endpoint.
//!
//! An execution unit blocks on its channels: a read waits for the next
//! complete line, a write goes straight to the OS buffer.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, TcpStream};

use arena_protocol::{EngineFrame, RemoteDescriptor};
use tracing::{debug, trace};

type BoxedRead = Box<dyn Read + Send>;
type BoxedWrite = Box<dyn Write + Send>;

/// A duplex, line-delimited JSON channel.
pub struct Channel {
    reader: Option<BufReader<BoxedRead>>,
    writer: Option<BoxedWrite>,
}

impl Channel {
    /// Attach to the remote side described by `descriptor`.
    ///
    /// For pipes the descriptors must have been inherited from the
    /// parent and must not be used by anything else in this process.
    pub fn connect(descriptor: &RemoteDescriptor) -> io::Result<Channel> {
        match *descriptor {
            RemoteDescriptor::Pipe { read_fd, write_fd } => open_pipes(read_fd, write_fd),
            RemoteDescriptor::Socket { port } => {
                let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port))?;
                stream.set_nodelay(true)?;
                let reader = stream.try_clone()?;
                debug!(port, "connected to endpoint listener");
                Ok(Channel::from_io(reader, stream))
            }
        }
    }

    /// Build a channel over arbitrary blocking I/O.
    pub fn from_io<R, W>(reader: R, writer: W) -> Channel
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Channel {
            reader: Some(BufReader::new(Box::new(reader))),
            writer: Some(Box::new(writer)),
        }
    }

    /// Write one frame. Writing to a closed channel does nothing, and a
    /// peer that went away just closes the write side.
    pub fn send(&mut self, frame: &EngineFrame) -> io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let mut line = frame.to_line();
        line.push('\n');
        let result = writer.write_all(line.as_bytes()).and_then(|_| writer.flush());

        match result {
            Ok(()) => Ok(()),
            Err(e) if peer_gone(&e) => {
                debug!("peer closed, dropping writes");
                self.writer = None;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Block until the next frame arrives.
    ///
    /// End of stream reads as [`EngineFrame::Close`]: a vanished peer is
    /// indistinguishable from one that said goodbye.
    pub fn receive(&mut self) -> Result<EngineFrame, crate::EngineError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(EngineFrame::Close);
        };

        let mut line = String::new();
        loop {
            line.clear();
            let n = match reader.read_line(&mut line) {
                Ok(n) => n,
                Err(e) if peer_gone(&e) => 0,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                self.reader = None;
                return Ok(EngineFrame::Close);
            }
            if line.trim().is_empty() {
                continue;
            }
            trace!(frame = line.trim(), "received");
            return Ok(EngineFrame::parse(&line)?);
        }
    }

    /// Close both directions, optionally announcing it with a `close`
    /// frame first.
    pub fn close(&mut self, announce: bool) {
        if announce {
            let _ = self.send(&EngineFrame::Close);
        }
        self.writer = None;
        self.reader = None;
    }
}

fn peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(unix)]
fn open_pipes(read_fd: i32, write_fd: i32) -> io::Result<Channel> {
    use std::fs::File;
    use std::os::fd::{FromRawFd, OwnedFd};

    if read_fd == write_fd {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "pipe descriptors must differ",
        ));
    }

    // SAFETY: the launcher hands each execution unit a fresh pair of pipe
    // descriptors that nothing else in this process owns; taking ownership
    // here is the only use of these numbers.
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(read_fd), OwnedFd::from_raw_fd(write_fd)) };
    Ok(Channel::from_io(File::from(read), File::from(write)))
}

#[cfg(not(unix))]
fn open_pipes(_read_fd: i32, _write_fd: i32) -> io::Result<Channel> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pipe endpoints need a unix host",
    ))
}
