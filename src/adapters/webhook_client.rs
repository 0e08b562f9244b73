use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use reqwest::{Client, header};

use crate::{
    core::signature::SIGNATURE_HEADER,
    ports::webhook::{WebhookClient, WebhookError, WebhookResult},
};

/// Webhook client adapter using reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestWebhookClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestWebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("provisio/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl WebhookClient for ReqwestWebhookClient {
    async fn post_signed(
        &self,
        url: &str,
        body: Vec<u8>,
        signature: &str,
    ) -> WebhookResult<u16> {
        let parsed = url::Url::parse(url).map_err(|_| WebhookError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(WebhookError::InvalidUrl(url.to_string()));
        }

        let response = self
            .client
            .post(parsed)
            .header(header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WebhookError::Timeout(self.timeout)
                } else {
                    WebhookError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(WebhookError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
