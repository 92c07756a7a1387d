use dglab_client::{Client, ClientConfig, Envelope, MessageType, StatusCode};
use dglab_codec::{clear_payload, pulse_payload, status, strength_payload, PulseChannel};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cmd::SessionArgs;
use crate::exit::{
    client_error, codec_error, CliError, CliResult, FAILURE, SUCCESS, TRANSPORT_ERROR, USAGE,
};
use crate::output::{print_envelope, print_ready, OutputFormat};

/// A command to send once the device is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Strength { channel: u8, mode: u8, value: u16 },
    Pulse { channel: char, frames: Vec<String> },
    Clear(u8),
}

enum SessionEvent {
    Bound { client_id: String, target_id: String },
    Rejected(StatusCode),
    Message(Envelope),
}

pub async fn run(args: SessionArgs, format: OutputFormat) -> CliResult<i32> {
    let actions = parse_actions(&args)?;
    let config = ClientConfig::default()
        .with_ws_url(args.url.clone())
        .with_heartbeat_interval(args.timing.heartbeat_interval()?)
        .with_reconnect_delay(args.timing.reconnect_delay()?)
        .with_handshake_timeout(args.timing.handshake_timeout()?);

    let client = Client::new(config);
    let (tx, mut events) = mpsc::unbounded_channel();
    forward_events(&client, tx);

    connect_with_retry(&client, args.attempts).await?;
    if let (Some(client_id), Some(token), Some(qr)) =
        (client.client_id(), client.pairing_token(), client.qr_content())
    {
        print_ready(&client_id, &token, &qr, format);
    }

    if let Some(target) = &args.target {
        if !client.bind_target(target).await {
            client.close().await;
            return Err(CliError::new(FAILURE, "bind request could not be sent"));
        }
    }

    let outcome = pump(&client, &mut events, &args, actions, format).await;
    client.close().await;
    outcome
}

async fn pump(
    client: &Client,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    args: &SessionArgs,
    actions: Vec<Action>,
    format: OutputFormat,
) -> CliResult<i32> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let disconnected = client.disconnected();
    tokio::pin!(disconnected);

    let mut pending = Some(actions);
    let mut printed = 0usize;

    loop {
        // Queued events (a `break` included) are handled before the loss.
        let event = tokio::select! {
            biased;
            _ = &mut ctrl_c => {
                info!("interrupted");
                return Ok(SUCCESS);
            }
            event = events.recv() => event,
            _ = &mut disconnected => {
                warn!("connection lost");
                return Err(CliError::new(TRANSPORT_ERROR, "connection closed by server"));
            }
        };

        match event {
            Some(SessionEvent::Bound {
                client_id,
                target_id,
            }) => {
                info!(%client_id, %target_id, "paired");
                if let Some(actions) = pending.take() {
                    if !run_actions(client, &actions).await {
                        return Err(CliError::new(FAILURE, "command could not be sent"));
                    }
                }
            }
            Some(SessionEvent::Rejected(code)) => {
                if args.target.is_some() && !client.state().is_bound() {
                    return Err(CliError::new(
                        FAILURE,
                        format!("bind failed: {code} {}", status::describe(code)),
                    ));
                }
            }
            Some(SessionEvent::Message(envelope)) => {
                print_envelope(&envelope, format);
                printed = printed.saturating_add(1);

                if envelope.msg_type == MessageType::Break {
                    info!("peer ended the session");
                    return Ok(SUCCESS);
                }
                if args.count.is_some_and(|count| printed >= count) {
                    return Ok(SUCCESS);
                }
            }
            None => return Ok(SUCCESS),
        }
    }
}

fn forward_events(client: &Client, tx: mpsc::UnboundedSender<SessionEvent>) {
    let bound = tx.clone();
    client.set_on_bind(move |client_id, target_id| {
        let _ = bound.send(SessionEvent::Bound {
            client_id: client_id.to_string(),
            target_id: target_id.to_string(),
        });
    });
    let rejected = tx.clone();
    client.set_on_error(move |code, _| {
        let _ = rejected.send(SessionEvent::Rejected(code));
    });
    client.set_on_message(move |envelope| {
        let _ = tx.send(SessionEvent::Message(envelope.clone()));
    });
}

async fn connect_with_retry(client: &Client, attempts: u32) -> CliResult<()> {
    let delay = client.config().reconnect_delay;
    for attempt in 1..=attempts {
        match client.connect().await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < attempts => {
                warn!(%err, attempt, ?delay, "connect failed; retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(client_error("connect failed", err)),
        }
    }
    Err(CliError::new(USAGE, "--attempts must be at least 1"))
}

async fn run_actions(client: &Client, actions: &[Action]) -> bool {
    for action in actions {
        let sent = match action {
            Action::Strength {
                channel,
                mode,
                value,
            } => client.send_strength(*channel, *mode, *value).await,
            Action::Pulse { channel, frames } => {
                client.send_pulse(*channel, frames.as_slice()).await
            }
            Action::Clear(channel) => client.send_clear_queue(*channel).await,
        };
        if !sent {
            return false;
        }
        info!(?action, "sent");
    }
    true
}

fn parse_actions(args: &SessionArgs) -> CliResult<Vec<Action>> {
    let mut actions = Vec::new();
    for raw in &args.strength {
        actions.push(parse_strength(raw)?);
    }
    for raw in &args.pulse {
        actions.push(parse_pulse(raw)?);
    }
    for &channel in &args.clear {
        clear_payload(channel).map_err(|err| codec_error("invalid --clear", err))?;
        actions.push(Action::Clear(channel));
    }
    Ok(actions)
}

/// `CHANNEL:MODE:VALUE`, e.g. `1:2:35`.
fn parse_strength(raw: &str) -> CliResult<Action> {
    let usage = || {
        CliError::new(
            USAGE,
            format!("invalid --strength {raw:?}: expected CH:MODE:VALUE"),
        )
    };
    let mut parts = raw.split(':');
    let (Some(channel), Some(mode), Some(value), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(usage());
    };

    let channel: u8 = channel.trim().parse().map_err(|_| usage())?;
    let mode: u8 = mode.trim().parse().map_err(|_| usage())?;
    let value: u16 = value.trim().parse().map_err(|_| usage())?;
    strength_payload(channel, mode, value).map_err(|err| codec_error("invalid --strength", err))?;

    Ok(Action::Strength {
        channel,
        mode,
        value,
    })
}

/// `CHANNEL:HEX,HEX,...`, e.g. `A:0A0A0A0A,14141414`.
fn parse_pulse(raw: &str) -> CliResult<Action> {
    let (channel, frames) = raw.split_once(':').ok_or_else(|| {
        CliError::new(USAGE, format!("invalid --pulse {raw:?}: expected A|B:FRAMES"))
    })?;

    let channel: PulseChannel = channel
        .trim()
        .parse()
        .map_err(|err| codec_error("invalid --pulse", err))?;
    let frames: Vec<String> = frames
        .split(',')
        .map(str::trim)
        .filter(|frame| !frame.is_empty())
        .map(str::to_string)
        .collect();
    pulse_payload(channel, &frames).map_err(|err| codec_error("invalid --pulse", err))?;

    Ok(Action::Pulse {
        channel: channel.as_char(),
        frames,
    })
}
