mod bgb;
mod logger;
mod parse_args;
mod session;
mod socket;
mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parse_args::{parse_args, AppArgs};
use pkmn_link_protocol::{TradeBlock, TradeEngine};
use session::{LinkSession, SessionEnd};
use socket::{LinkConnection, LinkListener};
use tracing::{error, info, warn};

/// Wait before dialing a listening emulator again
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn main() {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logger::init(args.verbosity, args.log_file.as_deref()) {
        eprintln!("Failed to set up logging: {}", e);
        std::process::exit(1);
    }
    if let Some(path) = &args.log_file {
        eprintln!("Logging to: {}", path);
    }

    let block = match TradeBlock::single(&args.trainer, args.species, &args.payload, &args.nickname)
    {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Invalid party member: {}", e);
            std::process::exit(1);
        }
    };

    let mut engine = TradeEngine::new(block);
    let shutdown = Arc::new(AtomicBool::new(false));
    let reporter = status::spawn_reporter(engine.view(), shutdown.clone());

    let result = match &args.connect_addr {
        Some(addr) => run_connecting(addr, &args, &mut engine),
        None => run_listening(&args, &mut engine),
    };

    shutdown.store(true, Ordering::Relaxed);
    let _ = reporter.join();

    if let Err(e) = result {
        eprintln!("Link error: {}", e);
        std::process::exit(1);
    }

    info!("Leaving with {:?}", engine.into_local_block());
}

/// Accept emulators one after another until `--once` is satisfied.
fn run_listening(args: &AppArgs, engine: &mut TradeEngine) -> std::io::Result<()> {
    let listener = LinkListener::bind(&args.listen_addr)?;
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let conn = match listener.accept() {
            Ok(c) => c,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        if serve(conn, args, engine) {
            return Ok(());
        }
        info!("Waiting for the next connection...");
    }
}

/// Dial a listening emulator, reconnecting after every session.
fn run_connecting(addr: &str, args: &AppArgs, engine: &mut TradeEngine) -> std::io::Result<()> {
    loop {
        info!("Connecting to {}...", addr);
        match LinkConnection::connect(addr) {
            Ok(conn) => {
                if serve(conn, args, engine) {
                    return Ok(());
                }
            }
            Err(e) => warn!("Connect failed: {}", e),
        }
        std::thread::sleep(RECONNECT_DELAY);
    }
}

/// Run one session; returns true when the program should exit.
fn serve(conn: LinkConnection, args: &AppArgs, engine: &mut TradeEngine) -> bool {
    let mut session = LinkSession::new(conn, engine, args.once);
    let result = session.run();
    info!(trades = session.trades(), "session over");

    match result {
        Ok(SessionEnd::Traded) => true,
        Ok(SessionEnd::Disconnected) => {
            info!("Emulator disconnected");
            false
        }
        Err(e) => {
            error!("Session failed: {}", e);
            false
        }
    }
}
