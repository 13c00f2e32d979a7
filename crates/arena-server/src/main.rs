//! Game arena server.
//!
//! `arena-server serve` (the default) accepts player connections and
//! hosts sessions. `arena-server engine ...` is the execution unit the
//! server spawns for each session; it is not meant to be run by hand.

use anyhow::{Context, Result};
use arena_engine::{run_unit, GameCatalog};
use arena_protocol::RemoteDescriptor;
use arena_server::config::Config;
use arena_server::console;
use arena_server::endpoint::Backend;
use arena_server::server::Server;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, info_span};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arena-server")]
#[command(about = "Hosts turn-based game sessions for remote player programs")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Accept player connections and host game sessions
    Serve(ServeArgs),

    /// Run one session's game loop
    #[command(hide = true)]
    Engine(EngineArgs),
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Interface to bind (overrides ARENA_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides ARENA_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Endpoint transport: auto, pipe or socket (overrides ARENA_IPC_BACKEND)
    #[arg(long)]
    backend: Option<Backend>,

    /// Read operator commands from stdin
    #[arg(long)]
    console: bool,
}

#[derive(Args)]
struct EngineArgs {
    /// Game kind to run
    #[arg(long)]
    game: String,

    /// Session id, for logging
    #[arg(long)]
    session: u64,

    /// Where to write state snapshots for spectators
    #[arg(long)]
    view: RemoteDescriptor,

    /// One per seat, in player order
    #[arg(long = "player")]
    players: Vec<RemoteDescriptor>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(args),
        Command::Engine(args) => engine(args),
    }
}

/// Logs go to stderr; the server shares it with its execution units.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;

    runtime.block_on(async move {
        let server = Server::bind(&config).await?;

        if args.console {
            let arena = server.arena();
            tokio::spawn(async move {
                if let Err(e) = console::run(arena).await {
                    error!(error = %e, "console stopped");
                }
            });
        }

        tokio::select! {
            result = server.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                Ok(())
            }
        }
    })
}

fn engine(args: EngineArgs) -> Result<()> {
    let span = info_span!("unit", session = args.session, game = %args.game);
    let _entered = span.enter();

    let catalog = GameCatalog::builtin();
    let outcome = run_unit(&catalog, &args.game, &args.players, &args.view)
        .with_context(|| format!("session {} failed", args.session))?;
    info!(?outcome, "execution unit done");
    Ok(())
}
