// src/run/webhook.rs

//! Completion webhook: POST a small JSON payload when a run finalizes.
//!
//! Delivery is fire-and-forget. A failed POST is logged and otherwise
//! ignored; run state never depends on whether anyone is listening.

use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::store::RunId;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Field names match what existing receivers expect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionPayload<'a> {
    run_id: &'a str,
    success: bool,
    /// Delivery time, RFC 3339 in UTC.
    timestamp: String,
}

pub struct CompletionWebhook {
    client: reqwest::Client,
    url: String,
}

impl CompletionWebhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Post the completion notification. Never fails the caller.
    pub async fn notify(&self, run_id: &RunId, success: bool) {
        let payload = CompletionPayload {
            run_id: run_id.as_str(),
            success,
            timestamp: rfc3339_now(),
        };
        debug!(run_id = %run_id, url = %self.url, "posting completion webhook");

        let sent = self
            .client
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&payload)
            .send()
            .await;
        match sent {
            Ok(response) if response.status().is_success() => {
                debug!(run_id = %run_id, "webhook delivered");
            }
            Ok(response) => {
                warn!(run_id = %run_id, status = %response.status(), "webhook rejected");
            }
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "webhook delivery failed");
            }
        }
    }
}

fn rfc3339_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
