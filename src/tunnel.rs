//! Simulated secure-download tunnel.
//!
//! Nothing here opens a connection. [`establish`] emits a fixed sequence of
//! timed log lines and returns a pseudo-URL for the item; the caller persists
//! it with the item's secure link flag in one write.
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::time::Duration;

use crate::storage::SoftwareItem;

pub const TUNNEL_DOMAIN: &str = "ngrok-free.app";

const HASH_LEN: usize = 6;
const HASH_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Pauses between the connection-setup steps, in order.
pub const STEP_DELAYS: [Duration; 3] = [
    Duration::from_millis(600),
    Duration::from_millis(800),
    Duration::from_millis(600),
];

/// `https://<hash>.ngrok-free.app/dl/<item_id>`
pub fn secure_link_url(hash: &str, item_id: &str) -> String {
    format!("https://{}.{}/dl/{}", hash, TUNNEL_DOMAIN, item_id)
}

/// Six lowercase base-36 characters.
fn random_hash() -> String {
    let mut rng = rand::rng();
    (0..HASH_LEN)
        .map(|_| HASH_ALPHABET[rng.random_range(0..HASH_ALPHABET.len())] as char)
        .collect()
}

fn random_client_id() -> String {
    format!("{:x}", rand::rng().random::<u64>())
}

fn log_line(msg: &str, fields: &str) -> String {
    let t = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    if fields.is_empty() {
        format!("t={} msg=\"{}\"", t, msg)
    } else {
        format!("t={} msg=\"{}\" {}", t, msg, fields)
    }
}

/// Run the setup sequence for `item`, handing each log line to `on_log` as it
/// is produced. Returns the generated secure link URL.
pub async fn establish(item: &SoftwareItem, on_log: impl FnMut(String)) -> String {
    establish_with(item, STEP_DELAYS, on_log).await
}

/// [`establish`] with explicit pauses between the setup steps.
pub async fn establish_with(
    item: &SoftwareItem,
    delays: [Duration; 3],
    mut on_log: impl FnMut(String),
) -> String {
    let label = item.file_name.as_deref().unwrap_or(&item.title);
    tracing::debug!(id = %item.id, "Starting simulated tunnel");

    on_log(log_line("starting tunnel", &format!("item=\"{}\"", label)));
    tokio::time::sleep(delays[0]).await;

    on_log(log_line("connecting to ngrok region", "region=us"));
    tokio::time::sleep(delays[1]).await;

    on_log(log_line(
        "authenticated",
        &format!("clientid={}", random_client_id()),
    ));
    tokio::time::sleep(delays[2]).await;

    let url = secure_link_url(&random_hash(), &item.id);
    on_log(log_line("tunnel established", &format!("url={}", url)));
    on_log(log_line("forwarding", "addr=http://localhost:80"));

    tracing::info!(id = %item.id, url = %url, "Simulated tunnel established");
    url
}

/// Check that `url` has the shape produced by [`establish`] for `item_id`.
pub fn is_secure_link_for(url: &str, item_id: &str) -> bool {
    let Some(rest) = url.strip_prefix("https://") else {
        return false;
    };
    let Some((hash, path)) = rest.split_once('.') else {
        return false;
    };
    hash.len() == HASH_LEN
        && hash.bytes().all(|b| HASH_ALPHABET.contains(&b))
        && path == format!("{}/dl/{}", TUNNEL_DOMAIN, item_id)
}
