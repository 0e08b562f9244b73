use std::{sync::Arc, time::Duration};

use crate::{
    config::models::WebhookConfig,
    core::{error::ProvisionError, models::ProvisioningOutcome, signature::Signer},
    metrics,
    ports::webhook::{WebhookClient, WebhookError},
};

/// Result of a delivery, for logging and tests. Never surfaced to the HTTP caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered { attempts: u32, status: u16 },
    Failed { attempts: u32, error: String },
    Skipped { reason: String },
}

/// Signs outcomes and hands them to the caller's webhook. Best effort.
pub struct OutcomeNotifier {
    client: Arc<dyn WebhookClient>,
    signer: Signer,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl OutcomeNotifier {
    pub fn new(config: &WebhookConfig, signer: Signer, client: Arc<dyn WebhookClient>) -> Self {
        Self {
            client,
            signer,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
        }
    }

    /// Deliver `outcome` to `webhook_url`. Delivery problems are logged and swallowed.
    pub async fn notify(&self, outcome: &ProvisioningOutcome, webhook_url: &str) -> DeliveryReport {
        if webhook_url.trim().is_empty() {
            tracing::warn!(domain = %outcome.domain, "No webhook URL supplied, skipping notification");
            metrics::increment_webhook_deliveries("skipped");
            return DeliveryReport::Skipped {
                reason: "no webhook URL".to_string(),
            };
        }

        let body = match serde_json::to_vec(outcome) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(domain = %outcome.domain, error = %e, "Failed to serialize outcome");
                metrics::increment_webhook_deliveries("failed");
                return DeliveryReport::Failed {
                    attempts: 0,
                    error: e.to_string(),
                };
            }
        };
        let signature = self.signer.sign(&body);

        let mut backoff = self.retry_backoff;
        let mut attempt = 1;
        loop {
            match self
                .client
                .post_signed(webhook_url.trim(), body.clone(), &signature)
                .await
            {
                Ok(status) => {
                    tracing::info!(domain = %outcome.domain, status, attempt, "Webhook delivered");
                    metrics::increment_webhook_deliveries("delivered");
                    return DeliveryReport::Delivered {
                        attempts: attempt,
                        status,
                    };
                }
                Err(e) => {
                    let retryable = !matches!(e, WebhookError::InvalidUrl(_));
                    if !retryable || attempt >= self.max_attempts {
                        let error = ProvisionError::from(e);
                        tracing::warn!(
                            domain = %outcome.domain,
                            attempt,
                            error = %error,
                            "Webhook delivery failed"
                        );
                        metrics::increment_webhook_deliveries("failed");
                        return DeliveryReport::Failed {
                            attempts: attempt,
                            error: error.to_string(),
                        };
                    }
                    tracing::debug!(domain = %outcome.domain, attempt, error = %e, ?backoff, "Retrying webhook");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}
