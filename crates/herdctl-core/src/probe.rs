//! Status prober: one bounded health request, classified into a snapshot.
//!
//! [`probe`] never returns an error. Connection failures, timeouts, HTTP
//! errors and unreadable bodies all become a [`ServerStatus`], so every
//! caller can render "daemon is down" without special handling.

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use tracing::debug;

use crate::BoxFuture;
use crate::client::{DaemonClient, TagsResponse};
use crate::status::ServerStatus;

const INVENTORY_PATH: &str = "/api/tags";

/// Anything that can produce a fresh status snapshot.
///
/// The monitor loop and the front-ends depend on this rather than on
/// [`Prober`] directly so tests can script the daemon's behavior.
pub trait StatusSource: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, ServerStatus>;
}

/// Probe the daemon behind `client`, giving up after `timeout`.
pub async fn probe(client: &DaemonClient, timeout: Duration) -> ServerStatus {
    let started = Instant::now();
    let resp = match client
        .request(Method::GET, INVENTORY_PATH, timeout)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return classify_transport_error(&e),
    };
    let elapsed = started.elapsed().as_secs_f64();

    let status = resp.status();
    if !status.is_success() {
        debug!(status = status.as_u16(), "probe got non-success status");
        return ServerStatus::http_error(status.as_u16(), elapsed);
    }

    let body = match resp.bytes().await {
        Ok(body) => body,
        Err(e) => return classify_transport_error(&e),
    };

    match serde_json::from_slice::<TagsResponse>(&body) {
        Ok(tags) => ServerStatus::running(tags.into_summaries(), elapsed),
        Err(e) => ServerStatus::error(format!("invalid inventory response: {e}")),
    }
}

fn classify_transport_error(err: &reqwest::Error) -> ServerStatus {
    let status = if err.is_timeout() || io_error_kind(err) == Some(io::ErrorKind::TimedOut) {
        ServerStatus::timed_out("Request timed out")
    } else if err.is_connect() && !is_name_resolution_failure(err) {
        ServerStatus::stopped("Connection refused")
    } else {
        ServerStatus::error(describe(err))
    };
    debug!(state = %status.state(), error = %err, "probe failed");
    status
}

fn error_chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    error_chain(err)
        .find_map(|e| e.downcast_ref::<io::Error>())
        .map(io::Error::kind)
}

fn is_name_resolution_failure(err: &reqwest::Error) -> bool {
    error_chain(err).any(|e| {
        let msg = e.to_string();
        msg.contains("dns error") || msg.contains("failed to lookup address")
    })
}

/// Flatten an error and its sources into one line, skipping repeats.
fn describe(err: &reqwest::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    for e in error_chain(err) {
        let msg = e.to_string();
        if !parts.iter().any(|p| p.contains(&msg)) {
            parts.push(msg);
        }
    }
    parts.join(": ")
}

/// A [`StatusSource`] backed by a shared [`DaemonClient`].
#[derive(Debug, Clone)]
pub struct Prober {
    client: Arc<DaemonClient>,
    timeout: Duration,
}

impl Prober {
    pub fn new(client: Arc<DaemonClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn client(&self) -> &Arc<DaemonClient> {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl StatusSource for Prober {
    fn probe(&self) -> BoxFuture<'_, ServerStatus> {
        Box::pin(probe(&self.client, self.timeout))
    }
}
