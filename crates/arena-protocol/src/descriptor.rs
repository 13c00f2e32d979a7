//! How an execution unit reaches the remote side of an endpoint.
//!
//! The descriptor travels as a command-line argument, so it has a
//! compact textual form:
//!
//! - `pipe:<read_fd>,<write_fd>` : two inherited pipe descriptors
//! - `tcp:<port>` : a loopback listener accepting exactly one peer

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteDescriptor {
    /// File descriptors inherited by the child: it reads `read_fd` and
    /// writes `write_fd`.
    Pipe { read_fd: i32, write_fd: i32 },

    /// Port of a listener bound on 127.0.0.1.
    Socket { port: u16 },
}

impl fmt::Display for RemoteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteDescriptor::Pipe { read_fd, write_fd } => write!(f, "pipe:{read_fd},{write_fd}"),
            RemoteDescriptor::Socket { port } => write!(f, "tcp:{port}"),
        }
    }
}

impl FromStr for RemoteDescriptor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidDescriptor(s.to_owned());

        let (scheme, rest) = s.split_once(':').ok_or_else(invalid)?;
        match scheme {
            "pipe" => {
                let (r, w) = rest.split_once(',').ok_or_else(invalid)?;
                let read_fd = r.trim().parse::<i32>().map_err(|_| invalid())?;
                let write_fd = w.trim().parse::<i32>().map_err(|_| invalid())?;
                if read_fd < 0 || write_fd < 0 {
                    return Err(invalid());
                }
                Ok(RemoteDescriptor::Pipe { read_fd, write_fd })
            }
            "tcp" => {
                let port = rest.trim().parse::<u16>().map_err(|_| invalid())?;
                if port == 0 {
                    return Err(invalid());
                }
                Ok(RemoteDescriptor::Socket { port })
            }
            _ => Err(invalid()),
        }
    }
}
