//! Configuration for the arena server.
//!
//! Defaults can be overridden through environment variables (and the
//! `serve` command-line flags on top of those):
//!
//! - `ARENA_BIND_ADDR`      (default: "0.0.0.0")
//! - `ARENA_PORT`           (default: "8889")
//! - `ARENA_MAX_CLIENTS`    (default: "1024")
//! - `ARENA_IPC_BACKEND`    (default: "auto"; "pipe" or "socket")
//! - `ARENA_ENGINE_PROGRAM` (default: this executable)

use std::env;
use std::fmt::Display;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use crate::endpoint::Backend;
use crate::error::ConfigError;
use crate::launcher::UnitLauncher;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. 0 picks a free one.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// How endpoints between the server and execution units are built.
    pub backend: Backend,

    /// Program run as the execution unit. It is invoked with the
    /// `engine` subcommand; `None` re-executes the current binary.
    pub engine_program: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 8889,
            max_clients: 1024,
            backend: Backend::detect(),
            engine_program: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let bind_addr = env::var("ARENA_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("ARENA_PORT", defaults.port)?;
        let max_clients = read_env_or_default("ARENA_MAX_CLIENTS", defaults.max_clients)?;
        let backend = read_env_or_default("ARENA_IPC_BACKEND", defaults.backend)?;
        let engine_program = env::var_os("ARENA_ENGINE_PROGRAM").map(PathBuf::from);

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            backend,
            engine_program,
        })
    }

    /// `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn launcher(&self) -> io::Result<UnitLauncher> {
        match &self.engine_program {
            Some(program) => Ok(UnitLauncher::new(program, ["engine"])),
            None => UnitLauncher::current_exe(),
        }
    }
}

fn read_env_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse::<T>().map_err(|e| ConfigError {
            key,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
