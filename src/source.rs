//! Realtime database client for the monitor's telemetry path.
//!
//! Reads go through the database's REST surface (`{base}/{path}.json`). A
//! subscription is a background polling task that hands every changed
//! snapshot to a callback until it is unsubscribed.

use std::{future::Future, time::Duration};

use reqwest::StatusCode;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::models::{records_from_snapshot, SensorRecord};

// ---

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("realtime database request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("realtime database answered {status} for {path}")]
    Status { status: StatusCode, path: String },
}

/// What a subscription delivers to its callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// The full current collection, in insertion order.
    Snapshot(Vec<SensorRecord>),
    /// A poll failed; the subscription keeps running.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RealtimeSource {
    client: reqwest::Client,
    base_url: String,
}

impl RealtimeSource {
    // ---
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    /// One-shot read of the collection at `path`.
    pub async fn fetch(
        &self,
        path: &str,
        id_token: Option<&str>,
    ) -> Result<Vec<SensorRecord>, SourceError> {
        // ---
        let url = self.url_for(path);
        tracing::debug!("Fetching snapshot from: {}", url);

        let mut request = self.client.get(&url);
        if let Some(token) = id_token {
            request = request.query(&[("auth", token)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                status: response.status(),
                path: path.to_string(),
            });
        }

        let snapshot: serde_json::Value = response.json().await?;
        let records = records_from_snapshot(snapshot);
        tracing::debug!("Snapshot at {} holds {} records", path, records.len());
        Ok(records)
    }

    /// Poll `path` every `interval` and hand changes to `on_event`.
    ///
    /// The first poll runs one `interval` after subscribing. A snapshot is
    /// delivered when it differs from the previous one, or when it is the first
    /// success after a failure. `last_seen` is the snapshot the caller already
    /// holds; without it the first successful poll is always delivered.
    pub fn subscribe<F, Fut>(
        &self,
        path: &str,
        id_token: Option<String>,
        interval: Duration,
        last_seen: Option<Vec<SensorRecord>>,
        mut on_event: F,
    ) -> Subscription
    where
        F: FnMut(SourceEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // ---
        let source = self.clone();
        let path = path.to_string();
        let task_path = path.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = last_seen;
            let mut failing = false;

            loop {
                ticker.tick().await;
                match source.fetch(&task_path, id_token.as_deref()).await {
                    Ok(records) => {
                        if failing || last.as_ref() != Some(&records) {
                            failing = false;
                            last = Some(records.clone());
                            on_event(SourceEvent::Snapshot(records)).await;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(path = %task_path, error = %e, "Telemetry poll failed");
                        failing = true;
                        on_event(SourceEvent::Failed(e.to_string())).await;
                    }
                }
            }
        });

        tracing::info!(path = %path, interval_secs = interval.as_secs(), "Subscribed to telemetry");
        Subscription { path, task }
    }
}

/// Live subscription; delivery stops on [`Subscription::unsubscribe`] or drop.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery. Once this returns the callback will not run again.
    pub async fn unsubscribe(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!(path = %self.path, "Unsubscribed from telemetry");
    }
}
