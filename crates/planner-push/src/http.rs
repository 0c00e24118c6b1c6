//! Push backends: the real HTTPS dispatcher and a log-only stand-in.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::json;
use tracing::{debug, info};

use crate::dispatcher::{PushDispatcher, BATCH_SIZE};
use crate::error::{PushError, Result};
use crate::message::PushMessage;

/// FCM-style HTTPS dispatcher: one POST per chunk of up to [`BATCH_SIZE`]
/// messages, authorized with a bearer server key.
pub struct HttpPushDispatcher {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl HttpPushDispatcher {
    pub fn new(endpoint: String, server_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            server_key,
        }
    }

    async fn post_chunk(&self, chunk: &[PushMessage]) -> Result<()> {
        let body = json!({
            "messages": chunk
                .iter()
                .map(|m| json!({ "token": m.token, "data": m.data }))
                .collect::<Vec<_>>(),
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.server_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PushError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(count = chunk.len(), "push chunk delivered");
        Ok(())
    }
}

#[async_trait]
impl PushDispatcher for HttpPushDispatcher {
    async fn send(&self, message: &PushMessage) -> Result<()> {
        self.post_chunk(std::slice::from_ref(message)).await
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        try_join_all(messages.chunks(BATCH_SIZE).map(|c| self.post_chunk(c))).await?;
        Ok(())
    }
}

/// Log-only dispatcher used when no push endpoint is configured.
///
/// Keeps dev deployments working end-to-end: the notifier pipeline runs,
/// messages are visible in the logs, nothing leaves the machine.
#[derive(Debug, Default)]
pub struct LogPushDispatcher;

#[async_trait]
impl PushDispatcher for LogPushDispatcher {
    async fn send(&self, message: &PushMessage) -> Result<()> {
        info!(token = %message.token, data = ?message.data, "push (log only)");
        Ok(())
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<()> {
        info!(count = messages.len(), "push batch (log only)");
        for m in messages {
            debug!(token = %m.token, data = ?m.data, "push message (log only)");
        }
        Ok(())
    }
}
