//! Blocking controller: connect, print the QR content, wait for the app to
//! bind, then ramp channel A up and clear its waveform queue.
//!
//! Run with:
//!   cargo run --example blocking-controller -- ws://localhost:9999

use std::sync::mpsc;
use std::time::Duration;

use dglab::client::{BlockingClient, ClientConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| dglab::client::DEFAULT_WS_URL.to_string());

    let client = BlockingClient::new(ClientConfig::default().with_ws_url(url))?;
    let (bound_tx, bound_rx) = mpsc::channel();
    client.set_on_bind(move |client_id, target_id| {
        let _ = bound_tx.send((client_id.to_string(), target_id.to_string()));
    });
    client.set_on_error(|code, message| eprintln!("server error {code}: {message}"));

    client.connect()?;
    println!("{}", client.qr_content().unwrap_or_default());

    let (client_id, target_id) = bound_rx.recv_timeout(Duration::from_secs(120))?;
    eprintln!("{client_id} bound to {target_id}");

    for value in (0..=30).step_by(10) {
        client.send_strength(1, 2, value);
        std::thread::sleep(Duration::from_millis(500));
    }
    client.send_pulse('A', &["0A0A0A0A", "14141414", "1E1E1E1E"]);
    client.send_clear_queue(1);

    client.close();
    Ok(())
}
