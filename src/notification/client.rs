use crate::model::EventNotification;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Delivers traffic influence events to an AF
#[async_trait]
pub trait AfNotifier: Send + Sync {
    async fn notify(&self, destination: &str, notification: &EventNotification) -> Result<()>;
}

/// Posts notifications as JSON to the AF's notification destination
pub struct HttpAfNotifier {
    client: Client,
}

impl HttpAfNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl AfNotifier for HttpAfNotifier {
    async fn notify(&self, destination: &str, notification: &EventNotification) -> Result<()> {
        let response = self
            .client
            .post(destination)
            .json(notification)
            .send()
            .await
            .with_context(|| format!("Failed to send notification to AF at {}", destination))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("AF answered notification with {}: {}", status, body);
        }
        Ok(())
    }
}
