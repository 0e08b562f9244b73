pub mod certificate;
pub mod coordinator;
pub mod domain_lock;
pub mod domain_policy;
pub mod error;
pub mod models;
pub mod notifier;
pub mod proxy_config;
pub mod reloader;
pub mod signature;
pub mod site_activator;

pub use certificate::{CertificateBundle, CertificateProvisioner, Issuer};
pub use coordinator::{Coordinator, PipelineReport, Ports, ProvisionSuccess};
pub use domain_lock::DomainLocks;
pub use domain_policy::{DomainPolicy, PolicyViolation, normalize};
pub use error::{ProvisionError, ProvisioningFailure};
pub use models::{OutcomeStatus, ProvisioningOutcome, ProvisioningRequest, ProvisioningState};
pub use signature::Signer;
