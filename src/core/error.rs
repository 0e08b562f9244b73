use thiserror::Error;

use crate::ports::{FileSystemError, ProcessError, WebhookError};

/// Everything that can end a provisioning request early.
///
/// Authentication and validation errors stop a request before any file or process is
/// touched. Provisioning errors abort the remaining pipeline steps. Notification errors
/// are recorded and swallowed by the notifier and never reach the HTTP caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProvisionError {
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningFailure),

    #[error("webhook delivery failed: {0}")]
    Notification(#[from] WebhookError),
}

impl ProvisionError {
    pub fn invalid_signature() -> Self {
        Self::Authentication("Invalid signature".to_string())
    }
}

/// A failed pipeline step, after authentication and validation succeeded.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProvisioningFailure {
    #[error("failed to write proxy config: {0}")]
    ConfigWrite(#[source] FileSystemError),

    #[error("invalid proxy config: {0}")]
    InvalidConfig(String),

    #[error("certificate issuance failed: {0}")]
    CertificateIssuance(String),

    #[error("reload failed: {0}")]
    Reload(String),

    /// The pipeline task ended without producing a result (it panicked).
    #[error("provisioning interrupted: {0}")]
    Interrupted(String),
}

impl From<ProcessError> for ProvisioningFailure {
    /// A syntax-check command that could not run counts as a failed check.
    fn from(err: ProcessError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
