use std::time::Duration;

use clap::{Args, Subcommand};
use dglab_client::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_RECONNECT_DELAY, DEFAULT_WS_URL,
};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod codes;
pub mod info;
pub mod session;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect, print the pairing QR content, bind and send commands.
    Session(SessionArgs),
    /// Connect once and print the assigned client id and pairing data.
    Info(InfoArgs),
    /// Print the server status code table.
    Codes(CodesArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Session(args) => session::run(args, format).await,
        Command::Info(args) => info::run(args, format).await,
        Command::Codes(args) => codes::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Relay server address.
    #[arg(env = "DGLAB_WS_URL", default_value = DEFAULT_WS_URL)]
    pub url: String,
    /// Device id to bind to. Without it, wait for the app to scan the QR code.
    #[arg(long, short = 't')]
    pub target: Option<String>,
    /// Strength change to send once bound, as CHANNEL:MODE:VALUE (repeatable).
    #[arg(long, value_name = "CH:MODE:VALUE")]
    pub strength: Vec<String>,
    /// Waveform frames to queue once bound, as CHANNEL:HEX,HEX,... (repeatable).
    #[arg(long, value_name = "A|B:FRAMES")]
    pub pulse: Vec<String>,
    /// Channel queue to clear once bound (repeatable).
    #[arg(long, value_name = "CH")]
    pub clear: Vec<u8>,
    /// Connection attempts before giving up.
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,
    /// Exit after printing N inbound messages.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub timing: TimingArgs,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Relay server address.
    #[arg(env = "DGLAB_WS_URL", default_value = DEFAULT_WS_URL)]
    pub url: String,
    /// Handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

/// Connection timing knobs shared by commands that hold a session open.
#[derive(Args, Debug)]
pub struct TimingArgs {
    /// Interval between heartbeats (e.g. 60s).
    #[arg(long, env = "DGLAB_HEARTBEAT_INTERVAL")]
    pub heartbeat_interval: Option<String>,
    /// Wait between connection attempts (e.g. 5s).
    #[arg(long, env = "DGLAB_RECONNECT_DELAY")]
    pub reconnect_delay: Option<String>,
    /// Bound on the wait for the assigned client id (e.g. 10s).
    #[arg(long, env = "DGLAB_HANDSHAKE_TIMEOUT")]
    pub handshake_timeout: Option<String>,
}

impl TimingArgs {
    pub fn heartbeat_interval(&self) -> CliResult<Duration> {
        parse_or(self.heartbeat_interval.as_deref(), DEFAULT_HEARTBEAT_INTERVAL)
    }

    pub fn reconnect_delay(&self) -> CliResult<Duration> {
        parse_or(self.reconnect_delay.as_deref(), DEFAULT_RECONNECT_DELAY)
    }

    pub fn handshake_timeout(&self) -> CliResult<Duration> {
        parse_or(self.handshake_timeout.as_deref(), DEFAULT_HANDSHAKE_TIMEOUT)
    }
}

#[derive(Args, Debug, Default)]
pub struct CodesArgs {}

fn parse_or(input: Option<&str>, default: Duration) -> CliResult<Duration> {
    input.map_or(Ok(default), parse_duration)
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
