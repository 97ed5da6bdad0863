use std::{
    net::SocketAddr,
    path::PathBuf,
    process::ExitCode,
    sync::{Arc, atomic::AtomicBool},
};

use clap::Parser;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    flag as signal_flag,
};
use stash_server::{DEFAULT_PORT, POLL_TIMEOUT, Server};
use stash_store::DEFAULT_MAX_LEVEL;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stash-server", about = "In-memory key/value service")]
struct Args {
    /// Port to listen on, bound on all interfaces.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Directory for the log file. Logs go to stderr when unset.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Maximum skip-list level of the sorted set.
    #[arg(long, default_value_t = DEFAULT_MAX_LEVEL)]
    max_level: usize,
}

/// Install the log sink. With a log directory this is the asynchronous
/// file sink: a dedicated worker thread fed through a queue, so logging
/// never sits on the reply path. The returned guard drains the queue when
/// `main` unwinds.
fn init_logging(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, "stash.log"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_logging(args.log_dir.as_ref());

    let stop = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_flag::register(sig, Arc::clone(&stop)).expect("register signal handler");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let mut server = match Server::bind(addr, args.max_level) {
        Ok(server) => server,
        Err(err) => {
            error!(?err, %addr, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "listening");

    if let Err(err) = server.run(&stop, POLL_TIMEOUT) {
        error!(?err, "event loop failed");
        return ExitCode::FAILURE;
    }
    info!("shutting down");
    ExitCode::SUCCESS
}
