use async_trait::async_trait;
use base64::Engine as _;
use serde::Serialize;
use tracing::info;

use super::{Notifier, NotifyError};
use crate::task::FileRef;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Email delivery through the Resend HTTP API.
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    filename: String,
    content: String,
}

impl ResendNotifier {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        artifacts: &[FileRef],
    ) -> Result<(), NotifyError> {
        let mut attachments = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let bytes = tokio::fs::read(&artifact.path).await.map_err(|e| {
                NotifyError::Io(format!("failed to read attachment {}: {}", artifact.name, e))
            })?;
            attachments.push(Attachment {
                filename: artifact.name.clone(),
                content: base64::engine::general_purpose::STANDARD.encode(&bytes),
            });
        }

        let payload = EmailPayload {
            from: &self.from,
            to: [to],
            subject,
            text: body,
            attachments,
        };

        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api(format!("{}: {}", status, detail)));
        }

        info!("Sent conversion result to {}", to);
        Ok(())
    }
}
