//! Request coordinator: authenticates, validates and drives one provisioning run.
//!
//! A run moves through [`ProvisioningState`]s in a fixed order and records every state it
//! enters. Authentication and validation failures stop the run before any file or process
//! is touched and do not notify. Once a request is validated, the notifier is called
//! exactly once with the outcome, whichever step failed.
//!
//! The pipeline is spawned onto its own task so that a caller disconnecting (which drops
//! the HTTP handler future) never cancels provisioning half way through.
use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use eyre::{Result, WrapErr};
use tracing::Instrument;

use crate::{
    config::models::ServerConfig,
    core::{
        certificate::{CertificateBundle, CertificateProvisioner},
        domain_lock::DomainLocks,
        domain_policy::DomainPolicy,
        error::{ProvisionError, ProvisioningFailure},
        models::{ProvisioningOutcome, ProvisioningRequest, ProvisioningState},
        notifier::{DeliveryReport, OutcomeNotifier},
        proxy_config::ProxyConfigGenerator,
        reloader::ProxyReloader,
        signature::Signer,
        site_activator::SiteActivator,
    },
    metrics::{ActiveProvisionGuard, RequestTimer},
    ports::{CommandRunner, FileSystem, WebhookClient},
    tracing_setup,
};

/// The outside world as seen by the coordinator.
#[derive(Clone)]
pub struct Ports {
    pub runner: Arc<dyn CommandRunner>,
    pub webhook: Arc<dyn WebhookClient>,
    pub file_system: Arc<dyn FileSystem>,
}

#[derive(Debug, Clone)]
pub struct ProvisionSuccess {
    pub domain: String,
    pub message: String,
    pub certificate: CertificateBundle,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub domain: Option<String>,
    pub user_id: Option<String>,
    pub trail: Vec<ProvisioningState>,
    pub delivery: Option<DeliveryReport>,
    pub result: std::result::Result<ProvisionSuccess, ProvisionError>,
}

impl PipelineReport {
    /// The last state entered before responding.
    pub fn final_state(&self) -> Option<ProvisioningState> {
        self.trail
            .iter()
            .rev()
            .find(|state| **state != ProvisioningState::Responded)
            .copied()
    }
}

/// Accumulates the state trail and logs each transition.
#[derive(Debug, Default)]
struct Trail(Vec<ProvisioningState>);

impl Trail {
    fn enter(&mut self, state: ProvisioningState) {
        if state.is_failure() {
            tracing::warn!(state = %state, "Provisioning state changed");
        } else {
            tracing::info!(state = %state, "Provisioning state changed");
        }
        self.0.push(state);
    }
}

pub struct Coordinator {
    signer: Signer,
    policy: DomainPolicy,
    backend_origin: String,
    generator: ProxyConfigGenerator,
    activator: SiteActivator,
    certificates: CertificateProvisioner,
    reloader: ProxyReloader,
    notifier: OutcomeNotifier,
    locks: DomainLocks,
}

impl Coordinator {
    pub fn new(config: &ServerConfig, ports: Ports) -> Result<Self> {
        let signer = Signer::new(config.webhook_secret.as_bytes())
            .wrap_err("webhook_secret is required to authenticate requests")?;

        Ok(Self {
            notifier: OutcomeNotifier::new(&config.webhook, signer.clone(), ports.webhook),
            signer,
            policy: DomainPolicy::new(&config.policy),
            backend_origin: config.backend_origin.clone(),
            generator: ProxyConfigGenerator::new(config.proxy.client_max_body_size.clone()),
            activator: SiteActivator::new(
                &config.proxy,
                ports.file_system.clone(),
                ports.runner.clone(),
            ),
            certificates: CertificateProvisioner::new(
                &config.certificates,
                ports.file_system,
                ports.runner.clone(),
            ),
            reloader: ProxyReloader::new(&config.proxy, ports.runner),
            locks: DomainLocks::new(),
        })
    }

    pub fn locks(&self) -> &DomainLocks {
        &self.locks
    }

    /// Run one request to completion on a task of its own.
    ///
    /// # Arguments
    /// * `request_id` - Correlation id attached to every log line of the run
    /// * `body` - The exact bytes the caller signed
    /// * `signature` - Value of the signature header, if present
    pub async fn handle(
        self: &Arc<Self>,
        request_id: &str,
        body: Bytes,
        signature: Option<String>,
    ) -> PipelineReport {
        let span = tracing_setup::create_provisioning_span(request_id);
        let this = Arc::clone(self);
        let task = tokio::spawn(async move { this.run(&body, signature.as_deref()).await }.instrument(span));

        match task.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(request.id = request_id, error = %e, "Provisioning task did not complete");
                PipelineReport {
                    domain: None,
                    user_id: None,
                    trail: vec![ProvisioningState::ProvisioningFailed, ProvisioningState::Responded],
                    delivery: None,
                    result: Err(ProvisioningFailure::Interrupted(e.to_string()).into()),
                }
            }
        }
    }

    async fn run(&self, body: &[u8], signature: Option<&str>) -> PipelineReport {
        let mut timer = RequestTimer::new();
        let mut trail = Trail::default();

        trail.enter(ProvisioningState::Authenticating);
        let request = match self.authenticate(body, signature) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected unauthenticated request");
                trail.enter(ProvisioningState::AuthFailed);
                trail.enter(ProvisioningState::Responded);
                timer.set_status("unauthorized");
                return PipelineReport {
                    domain: None,
                    user_id: None,
                    trail: trail.0,
                    delivery: None,
                    result: Err(e),
                };
            }
        };
        tracing::Span::current().record("user.id", request.user_id.as_str());

        trail.enter(ProvisioningState::Validating);
        let domain = match self.validate(&request) {
            Ok(domain) => domain,
            Err(e) => {
                tracing::warn!(error = %e, raw_domain = %request.domain, "Rejected invalid request");
                trail.enter(ProvisioningState::ValidationFailed);
                trail.enter(ProvisioningState::Responded);
                timer.set_status("invalid");
                return PipelineReport {
                    domain: None,
                    user_id: Some(request.user_id),
                    trail: trail.0,
                    delivery: None,
                    result: Err(e),
                };
            }
        };
        tracing::Span::current().record("domain", domain.as_str());

        // Held through notification so shutdown can wait for the webhook as well
        let _active = ActiveProvisionGuard::new();
        let result = {
            let _guard = self.locks.acquire(&domain).await;
            self.provision(&domain, &mut trail).await
        };
        self.locks.prune().await;

        let outcome = match &result {
            Ok(success) => ProvisioningOutcome::active(&request.user_id, &domain, &success.message),
            Err(failure) => {
                tracing::error!(error = %failure, "Provisioning failed");
                trail.enter(ProvisioningState::ProvisioningFailed);
                ProvisioningOutcome::failed(&request.user_id, &domain, failure.to_string())
            }
        };

        let delivery = self.notifier.notify(&outcome, &request.webhook_url).await;
        trail.enter(ProvisioningState::Notified);
        trail.enter(ProvisioningState::Responded);

        timer.set_status(if result.is_ok() { "ok" } else { "failed" });
        PipelineReport {
            domain: Some(domain),
            user_id: Some(request.user_id),
            trail: trail.0,
            delivery: Some(delivery),
            result: result.map_err(ProvisionError::from),
        }
    }

    fn authenticate(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> std::result::Result<ProvisioningRequest, ProvisionError> {
        let signature = signature
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(ProvisionError::invalid_signature)?;
        if !self.signer.verify(body, signature) {
            return Err(ProvisionError::invalid_signature());
        }
        serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Signed body is not a provisioning request");
            ProvisionError::Authentication("Malformed request body".to_string())
        })
    }

    /// Returns the normalized domain.
    fn validate(&self, request: &ProvisioningRequest) -> std::result::Result<String, ProvisionError> {
        let domain = self
            .policy
            .admit(&request.domain)
            .map_err(|e| ProvisionError::Validation(e.to_string()))?;

        if request.user_id.trim().is_empty() {
            return Err(ProvisionError::Validation("userId is required".to_string()));
        }

        let webhook_url = request.webhook_url.trim();
        if webhook_url.is_empty() {
            return Err(ProvisionError::Validation("webhookUrl is required".to_string()));
        }
        match url::Url::parse(webhook_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            _ => {
                return Err(ProvisionError::Validation(format!(
                    "webhookUrl '{webhook_url}' is not an http(s) URL"
                )));
            }
        }

        Ok(domain)
    }

    /// Steps that run under the domain lock.
    async fn provision(
        &self,
        domain: &str,
        trail: &mut Trail,
    ) -> std::result::Result<ProvisionSuccess, ProvisioningFailure> {
        let (certificate_path, key_path) = self.certificates.planned_paths(domain).await;
        let site = self.generator.render(
            domain,
            &self.backend_origin,
            certificate_path,
            key_path,
            Utc::now(),
        );
        trail.enter(ProvisioningState::ConfigGenerated);

        self.activator.activate(&site).await?;
        trail.enter(ProvisioningState::SiteActivated);

        let certificate = self.certificates.provision(domain).await?;
        trail.enter(ProvisioningState::CertificateReady);

        if certificate.certificate_path != site.tls_cert_path || certificate.key_path != site.tls_key_path {
            tracing::info!(
                certificate = %certificate.certificate_path.display(),
                "Certificate landed elsewhere, re-activating site"
            );
            let site = self.generator.render(
                domain,
                &self.backend_origin,
                certificate.certificate_path.clone(),
                certificate.key_path.clone(),
                Utc::now(),
            );
            self.activator.activate(&site).await?;
        }

        self.reloader.reload().await?;
        trail.enter(ProvisioningState::ProxyReloaded);

        let message = if certificate.is_degraded() {
            format!(
                "Custom domain {domain} is active with a temporary self-signed certificate; \
                 a trusted certificate will replace it once DNS validation completes"
            )
        } else {
            format!("Custom domain {domain} is active")
        };

        Ok(ProvisionSuccess {
            domain: domain.to_string(),
            message,
            certificate,
        })
    }
}
