use std::time::Instant;

use dglab_client::{Client, ClientConfig};
use serde::Serialize;

use crate::cmd::{parse_duration, InfoArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct InfoOutput {
    server: String,
    client_id: String,
    handshake_ms: f64,
    pairing_token: String,
    qr_content: String,
    connected: bool,
}

pub async fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let client = Client::new(
        ClientConfig::default()
            .with_ws_url(args.url.clone())
            .with_handshake_timeout(timeout),
    );

    let start = Instant::now();
    client
        .connect()
        .await
        .map_err(|err| client_error("connect failed", err))?;
    let handshake_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = match (client.client_id(), client.pairing_token(), client.qr_content()) {
        (Some(client_id), Some(pairing_token), Some(qr_content)) => InfoOutput {
            server: args.url,
            client_id,
            handshake_ms,
            pairing_token,
            qr_content,
            connected: client.is_connected(),
        },
        _ => {
            client.close().await;
            return Err(CliError::new(INTERNAL, "connected without a client id"));
        }
    };
    client.close().await;

    print_info(&out, format);
    Ok(SUCCESS)
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Connection Info:");
            println!("  Server:         {}", out.server);
            println!("  Client ID:      {}", out.client_id);
            println!("  Handshake:      {:.2}ms", out.handshake_ms);
            println!("  Pairing token:  {}", out.pairing_token);
            println!("  QR content:     {}", out.qr_content);
        }
        OutputFormat::Raw => {
            println!("{}", out.client_id);
        }
    }
}
