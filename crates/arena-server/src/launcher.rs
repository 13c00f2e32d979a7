//! Launching execution units.
//!
//! An execution unit is a separate OS process running one session's
//! game loop. It receives everything it needs on its command line:
//!
//! ```text
//! <program> engine --session <id> --game <kind> --view <desc> --player <desc>...
//! ```
//!
//! where each `<desc>` is a [`RemoteDescriptor`](arena_protocol::RemoteDescriptor)
//! string. Pipe descriptors refer to fds the child inherits.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use arena_protocol::SessionId;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::endpoint::RemoteEnd;

#[derive(Debug, Clone)]
pub struct UnitLauncher {
    program: PathBuf,
    args: Vec<OsString>,
}

impl UnitLauncher {
    /// Run `program` with `args` in front of the per-session arguments.
    pub fn new<I, S>(program: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        UnitLauncher {
            program: program.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-execute the running binary with its `engine` subcommand.
    pub fn current_exe() -> io::Result<Self> {
        Ok(UnitLauncher::new(std::env::current_exe()?, ["engine"]))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Start the execution unit for one session.
    ///
    /// The child does not own a terminal: stdin and stdout are null and
    /// stderr is shared with the server so its logs land in one place.
    pub fn spawn(
        &self,
        session: SessionId,
        kind: &str,
        players: &[RemoteEnd],
        view: &RemoteEnd,
    ) -> io::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--session")
            .arg(session.to_string())
            .arg("--game")
            .arg(kind)
            .arg("--view")
            .arg(view.descriptor().to_string());
        for player in players {
            cmd.arg("--player").arg(player.descriptor().to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        #[cfg(unix)]
        {
            let fds: Vec<i32> = players
                .iter()
                .chain(std::iter::once(view))
                .flat_map(RemoteEnd::inheritable_fds)
                .collect();
            if !fds.is_empty() {
                inherit_fds(&mut cmd, fds);
            }
        }

        let child = cmd.spawn()?;
        debug!(%session, kind, pid = ?child.id(), "execution unit spawned");
        Ok(child)
    }
}

/// Keep `fds` open across exec in the child.
#[cfg(unix)]
fn inherit_fds(cmd: &mut Command, fds: Vec<i32>) {
    // SAFETY: the hook runs in the forked child before exec and only
    // calls fcntl, which is async-signal-safe. It allocates nothing.
    unsafe {
        cmd.pre_exec(move || {
            for &fd in &fds {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    return Err(io::Error::last_os_error());
                }
            }
            Ok(())
        });
    }
}
