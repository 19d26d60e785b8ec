use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use hrflow_core::config::{NotifierConfig, NotifierKind};
use hrflow_core::notify::{LogNotifier, Notifier, NotifyError, StatusNotification};

/// Posts each status notification as JSON to a configured endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| NotifyError::Transport(error.to_string()))?;
        Ok(Self { client, url: url.into(), token })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: StatusNotification) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.url).json(&notification);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| NotifyError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected { status: response.status().as_u16() });
        }

        info!(
            event_name = "notify.webhook.delivered",
            request_id = %notification.request_id.0,
            status = notification.outcome.status_label(),
            "status notification delivered"
        );
        Ok(())
    }
}

pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Webhook => {
            let url = config.webhook_url.clone().ok_or_else(|| {
                NotifyError::Transport("notifier.webhook_url is not configured".to_string())
            })?;
            let notifier = WebhookNotifier::new(
                url,
                config.webhook_token.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(notifier))
        }
    }
}
