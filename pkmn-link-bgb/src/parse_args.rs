use pkmn_link_protocol::MEMBER_PAYLOAD_SIZE;

use crate::socket::DEFAULT_LISTEN_ADDR;

const HELP: &str = "\
pkmn-link-bgb - Gen I trade partner over the BGB link cable protocol

Waits for a Game Boy emulator to link up and trades the configured
party member with whatever the player offers.

USAGE:
  pkmn-link-bgb [OPTIONS]

OPTIONS:
  -h, --help            Prints help information
  --listen <addr>       Listen for the emulator (default: 127.0.0.1:8765)
  --connect <addr>      Connect to a listening emulator instead
  --species <id>        Species index offered in slot 0, hex (0x..) or decimal (default: 0x15)
  --payload <hex>       44 byte slot 0 payload as hex (default: all zero)
  --nickname <name>     Slot 0 nickname (default: MEW)
  --trainer <name>      Trainer and OT name (default: Flipper)
  --once                Exit after the first completed trade
  -v, --verbose         Show link status changes
  -vv, --trace          Show trade exchange states
  -vvv, --trace-link    Show every link byte (very verbose)
  --log <file>          Write log output to file instead of stderr
";

/// Verbosity level for debug output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Connections and completed trades
    #[default]
    Quiet = 0,
    /// Link status changes
    Verbose = 1,
    /// Trade exchange states and BGB packets
    Trace = 2,
    /// Individual link bytes
    TraceLink = 3,
}

#[derive(Debug)]
pub struct AppArgs {
    pub listen_addr: String,
    pub connect_addr: Option<String>,
    pub species: u8,
    pub payload: [u8; MEMBER_PAYLOAD_SIZE],
    pub nickname: String,
    pub trainer: String,
    pub once: bool,
    pub verbosity: Verbosity,
    pub log_file: Option<String>,
}

pub fn parse_args() -> Result<AppArgs, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();

    if pargs.contains(["-h", "--help"]) {
        print!("{}", HELP);
        std::process::exit(0);
    }

    // Count -v flags for verbosity level
    let verbosity = if pargs.contains("--trace-link") || pargs.contains("-vvv") {
        Verbosity::TraceLink
    } else if pargs.contains("--trace") || pargs.contains("-vv") {
        Verbosity::Trace
    } else if pargs.contains(["-v", "--verbose"]) {
        Verbosity::Verbose
    } else {
        Verbosity::Quiet
    };

    let args = AppArgs {
        listen_addr: pargs
            .opt_value_from_str("--listen")?
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
        connect_addr: pargs.opt_value_from_str("--connect")?,
        species: pargs
            .opt_value_from_fn("--species", parse_species)?
            .unwrap_or(0x15),
        payload: pargs
            .opt_value_from_fn("--payload", parse_payload)?
            .unwrap_or([0; MEMBER_PAYLOAD_SIZE]),
        nickname: pargs
            .opt_value_from_str("--nickname")?
            .unwrap_or_else(|| "MEW".to_string()),
        trainer: pargs
            .opt_value_from_str("--trainer")?
            .unwrap_or_else(|| "Flipper".to_string()),
        once: pargs.contains("--once"),
        verbosity,
        log_file: pargs.opt_value_from_str("--log")?,
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }

    Ok(args)
}

fn parse_species(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

fn parse_payload(s: &str) -> Result<[u8; MEMBER_PAYLOAD_SIZE], String> {
    let digits: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != MEMBER_PAYLOAD_SIZE * 2 {
        return Err(format!(
            "expected {} hex digits, got {}",
            MEMBER_PAYLOAD_SIZE * 2,
            digits.len()
        ));
    }

    let mut payload = [0u8; MEMBER_PAYLOAD_SIZE];
    for (byte, pair) in payload.iter_mut().zip(digits.chunks(2)) {
        let pair: String = pair.iter().collect();
        *byte = u8::from_str_radix(&pair, 16).map_err(|e| format!("'{}': {}", pair, e))?;
    }
    Ok(payload)
}
