//! Default [`ReconfigNotifier`]: POSTs the freshly-published snapshot to a
//! configured list of webhook URLs.
//!
//! Mirrors the upstream watcher's `notifyReconfigWebhooks`: failures against
//! one URL are logged and don't block the others, and a notifier failure
//! never propagates back into the aggregation loop (see
//! `meshwatch_contracts::notifier` docs).

use async_trait::async_trait;
use meshwatch_contracts::ReconfigNotifier;
use meshwatch_core::SharedSnapshot;

pub struct WebhookNotifier {
    client: reqwest::Client,
    urls: Vec<String>,
    published: SharedSnapshot,
}

impl WebhookNotifier {
    pub fn new(urls: Vec<String>, published: SharedSnapshot) -> Self {
        Self { client: reqwest::Client::new(), urls, published }
    }
}

#[async_trait]
impl ReconfigNotifier for WebhookNotifier {
    async fn notify(&self) {
        if self.urls.is_empty() {
            return;
        }

        let body = self.published.read().await.clone();
        for url in &self.urls {
            let response = self.client.post(url).header("content-type", "application/json").body(body.clone()).send().await;
            match response {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::warn!(url, status = %resp.status(), "reconfig webhook returned a non-success status");
                }
                Ok(_) => tracing::debug!(url, "notified reconfig webhook"),
                Err(err) => tracing::warn!(url, %err, "failed to reach reconfig webhook"),
            }
        }
    }
}
