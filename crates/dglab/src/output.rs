use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dglab_codec::status::{self, StatusCode};
use dglab_codec::{Envelope, MessageType};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EnvelopeOutput<'a> {
    event: &'static str,
    #[serde(rename = "type")]
    msg_type: &'static str,
    client_id: &'a str,
    target_id: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'static str>,
    timestamp: String,
}

#[derive(Serialize)]
struct ReadyOutput<'a> {
    event: &'static str,
    client_id: &'a str,
    pairing_token: &'a str,
    qr_content: &'a str,
}

pub fn print_envelope(envelope: &Envelope, format: OutputFormat) {
    let status = status_of(envelope);
    let description = status.map(status::describe);

    match format {
        OutputFormat::Json => {
            let out = EnvelopeOutput {
                event: "message",
                msg_type: envelope.msg_type.as_str(),
                client_id: &envelope.client_id,
                target_id: &envelope.target_id,
                message: &envelope.message,
                status,
                description,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CLIENT", "TARGET", "MESSAGE"])
                .add_row(vec![
                    envelope.msg_type.to_string(),
                    envelope.client_id.clone(),
                    envelope.target_id.clone(),
                    with_description(&envelope.message, description),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} client={} target={} message={}",
                envelope.msg_type,
                envelope.client_id,
                envelope.target_id,
                with_description(&envelope.message, description)
            );
        }
        OutputFormat::Raw => print_raw(&envelope.message),
    }
}

pub fn print_ready(client_id: &str, pairing_token: &str, qr_content: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ReadyOutput {
                event: "ready",
                client_id,
                pairing_token,
                qr_content,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Connected as {client_id}");
            println!("  Pairing token: {pairing_token}");
            println!("  QR content:    {qr_content}");
        }
        OutputFormat::Raw => print_raw(qr_content),
    }
}

pub fn print_raw(line: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

/// Status code carried by a bind result or server error, if any.
fn status_of(envelope: &Envelope) -> Option<StatusCode> {
    match envelope.msg_type {
        MessageType::Bind if envelope.is_identity_assignment() => None,
        MessageType::Bind => Some(status::parse_code(
            &envelope.message,
            status::UNPARSED_BIND_FAILURE,
        )),
        MessageType::Error => Some(status::parse_code(&envelope.message, status::SERVER_ERROR)),
        _ => None,
    }
}

fn with_description(message: &str, description: Option<&str>) -> String {
    match description {
        Some(description) => format!("{message} ({description})"),
        None => message.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
