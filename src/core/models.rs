use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `POST /api/custom-domains/setup`.
///
/// Absent fields become empty strings so that they surface as validation errors rather
/// than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub domain: String,
    pub user_id: String,
    pub webhook_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Active,
    Failed,
}

/// What the webhook receiver is told about a finished run.
///
/// Serialized as `{userId, domain, status:"active", message}` on success and
/// `{userId, domain, status:"failed", error}` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningOutcome {
    pub user_id: String,
    pub domain: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl ProvisioningOutcome {
    pub fn active(user_id: &str, domain: &str, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            domain: domain.to_string(),
            status: OutcomeStatus::Active,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(user_id: &str, domain: &str, error: impl Into<String>) -> Self {
        Self {
            user_id: user_id.to_string(),
            domain: domain.to_string(),
            status: OutcomeStatus::Failed,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Steps of a provisioning run, in the order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProvisioningState {
    Authenticating,
    Validating,
    ConfigGenerated,
    SiteActivated,
    CertificateReady,
    ProxyReloaded,
    Notified,
    Responded,
    AuthFailed,
    ValidationFailed,
    ProvisioningFailed,
}

impl ProvisioningState {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::ValidationFailed | Self::ProvisioningFailed
        )
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authenticating => "authenticating",
            Self::Validating => "validating",
            Self::ConfigGenerated => "config_generated",
            Self::SiteActivated => "site_activated",
            Self::CertificateReady => "certificate_ready",
            Self::ProxyReloaded => "proxy_reloaded",
            Self::Notified => "notified",
            Self::Responded => "responded",
            Self::AuthFailed => "auth_failed",
            Self::ValidationFailed => "validation_failed",
            Self::ProvisioningFailed => "provisioning_failed",
        };
        f.write_str(name)
    }
}
