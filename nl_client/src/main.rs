//! An interactive NetLib test client.
//!
//! The client connects to a NetLib server, reads packets typed as
//! `<type> <byte> <byte> ...` from stdin and prints every packet the
//! server sends.

use std::{
    io::{self, BufReader},
    time::Duration,
};

use anyhow::{Context, Error};
use ctrlc::set_handler;
use log::{debug, info};
use netlib::{ConnectionError, ConnectionLoop, OutboundQueue};
use nl_client::{
    config::{ClientConfig, Overrides},
    input::InputProducer,
};
use pico_args::Arguments;

const HELP: &str = "\
Connect to a NetLib server and exchange packets interactively

USAGE:
  nl_client [OPTIONS]

OPTIONS:
  --server             IP:PORT  Server address  [default: env NETLIB_SERVER or 127.0.0.1:6460]
  --transport          MODE     datagram (UDP) or stream (TCP)  [default: datagram]
  --poll-interval      MS       Longest readiness wait per cycle  [default: 10]
  --handshake-timeout  SECS     Give up connecting after SECS  [default: wait forever]
  --version            N        Version stamped on typed packets  [default: 1]

FLAGS:
  -h, --help                    Print help information

INPUT:
  One packet per line: a packet type id followed by payload bytes,
  e.g. `5 1 2 3`. All values are integers in [0, 255].

ENVIRONMENT:
  NETLIB_SERVER, NETLIB_TRANSPORT, NETLIB_POLL_INTERVAL_MS,
  NETLIB_HANDSHAKE_TIMEOUT_SECS, NETLIB_VERSION
  RUST_LOG                      Log filter [default: info]
";

/// How long to wait for the input thread after the connection ends.
const INPUT_SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        server: pargs.opt_value_from_str("--server")?,
        variant: pargs.opt_value_from_str("--transport")?,
        poll_interval_ms: pargs.opt_value_from_str("--poll-interval")?,
        handshake_timeout_secs: pargs.opt_value_from_str("--handshake-timeout")?,
        version: pargs.opt_value_from_str("--version")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unrecognized arguments: {remaining:?}");
    }

    let config = ClientConfig::from_env(overrides)?;
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let queue = OutboundQueue::new();
    let mut connection = ConnectionLoop::open(config.connection_config(), queue.clone())
        .with_context(|| {
            format!(
                "Failed to open {} transport to {}",
                config.variant, config.server
            )
        })?;

    // Catching signals for exit.
    let stop = connection.stop_handle();
    set_handler(move || stop.stop())?;

    let assignment = match connection.handshake() {
        Ok(assignment) => assignment,
        Err(ConnectionError::Disconnected) => {
            info!("Disconnected before the server assigned a slot");
            return Ok(());
        }
        Err(error) => return Err(error).context("Failed to connect"),
    };
    match assignment.player {
        Some(player) => println!(
            "Connected as player {player} (recipients {:032b})",
            assignment.recipients()
        ),
        None => println!("Connected, no player slot assigned"),
    }

    let producer = InputProducer::spawn(
        BufReader::new(io::stdin()),
        io::stdout(),
        queue,
        config.version,
    )
    .context("Failed to start input thread")?;

    let result = connection.run(|packet| println!("\n{packet}"));

    if !producer.shutdown(INPUT_SHUTDOWN_GRACE) {
        debug!("Input thread left blocked on stdin");
    }
    result.context("Connection loop failed")?;

    info!("Disconnected from {}", config.server);
    Ok(())
}
