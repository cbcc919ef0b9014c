//! HTTP notification sink — ships registry notifications to a collector.
//!
//! [`HttpSink::publish`] only stamps and enqueues; it never waits on the
//! network, so the registry caller returns promptly.
//! A background task drains the queue and POSTs each envelope.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the collector is unreachable,
//!   rate-limits, or answers with a server error, up to [`MAX_BACKOFF_SECS`].
//! * Other client errors are not retried; the envelope is dropped.
//! * After `max_attempts` failed attempts the envelope is dropped and logged.
//!
//! Envelopes carry a random session id, fixed when the sink is spawned, and
//! a sequence number counting from 1 within that session. The collector
//! ignores duplicates from a retried POST, while a restarted registry, with
//! its fresh session, is never mistaken for a retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use card_registry::{Notification, NotificationSink, SinkError};
use reqwest::{Client, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SinkConfig;
use crate::events::NotificationEnvelope;

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

pub struct HttpSink {
    source: String,
    session: Uuid,
    sequence: AtomicU64,
    tx: mpsc::UnboundedSender<NotificationEnvelope>,
}

impl HttpSink {
    /// Create the sink and spawn its delivery task on the current tokio runtime.
    pub fn spawn(config: SinkConfig, client: Client) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(deliver(rx, client, config.ingest_url(), config.max_attempts));
        let session = Uuid::new_v4();
        info!(source = %config.source, %session, "notification sink started");
        let sink = HttpSink {
            source: config.source,
            session,
            sequence: AtomicU64::new(0),
            tx,
        };
        (sink, handle)
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Sequence number stamped on the most recently published notification.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl NotificationSink for HttpSink {
    fn publish(&self, notification: &Notification) -> Result<(), SinkError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let envelope = NotificationEnvelope {
            source: self.source.clone(),
            session: self.session,
            sequence,
            emitted_at: chrono::Utc::now().timestamp(),
            notification: notification.clone(),
        };
        self.tx.send(envelope).map_err(|_| SinkError::Closed)
    }
}

/// Delivery loop; runs until every [`HttpSink`] handle is dropped.
async fn deliver(
    mut rx: mpsc::UnboundedReceiver<NotificationEnvelope>,
    client: Client,
    url: String,
    max_attempts: u32,
) {
    while let Some(envelope) = rx.recv().await {
        if let Err(reason) = post_with_backoff(&client, &url, &envelope, max_attempts).await {
            error!(
                source = %envelope.source,
                session = %envelope.session,
                sequence = envelope.sequence,
                kind = envelope.notification.kind(),
                "dropping notification: {reason}"
            );
        }
    }
    debug!("notification sink closed, delivery task exiting");
}

async fn post_with_backoff(
    client: &Client,
    url: &str,
    envelope: &NotificationEnvelope,
    max_attempts: u32,
) -> Result<(), String> {
    let mut backoff = INITIAL_BACKOFF_SECS;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let retry_reason = match client.post(url).json(envelope).send().await {
            Err(e) => format!("request failed: {e}"),
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    debug!(sequence = envelope.sequence, "notification delivered");
                    return Ok(());
                }
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    format!("collector answered {status}")
                } else {
                    return Err(format!("collector rejected notification with {status}"));
                }
            }
        };

        if attempt >= max_attempts {
            return Err(format!("{retry_reason} (gave up after {attempt} attempts)"));
        }
        warn!("{retry_reason} (will retry in {backoff}s)");
        tokio::time::sleep(Duration::from_secs(backoff)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
    }
}
