//! Certificate issuance: a bounded ACME attempt with a self-signed fallback.
//!
//! The ACME client runs in manual DNS-challenge mode, which normally needs an operator to
//! publish a TXT record. The attempt is therefore capped by a short timeout, and anything
//! other than a clean exit with loadable files on disk switches to a locally generated
//! certificate so the site can serve TLS immediately.
//!
//! Fallback certificates live in their own store. A still-valid certificate already in
//! the ACME store is reused instead, so a repeated request never downgrades a working
//! domain or replaces the ACME client's lineage files.
use std::{
    fmt,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use rcgen::{CertificateParams, DnType, KeyPair};
use serde::Serialize;

use crate::{
    config::models::CertificateConfig,
    core::error::ProvisioningFailure,
    metrics,
    ports::{
        file_system::FileSystem,
        process::{CommandRunner, CommandSpec},
    },
};

pub const CERTIFICATE_FILE: &str = "fullchain.pem";
pub const KEY_FILE: &str = "privkey.pem";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Issuer {
    Acme,
    SelfSigned,
}

impl Issuer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acme => "acme",
            Self::SelfSigned => "self-signed",
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateBundle {
    pub domain: String,
    pub certificate_path: PathBuf,
    pub key_path: PathBuf,
    pub issued_by: Issuer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CertificateBundle {
    /// Self-signed bundles keep a site reachable but browsers will warn.
    pub fn is_degraded(&self) -> bool {
        self.issued_by == Issuer::SelfSigned
    }

    /// Read both files back and make sure they parse.
    pub async fn check_loadable(&self, file_system: &dyn FileSystem) -> Result<(), String> {
        let certificate = file_system
            .read(&self.certificate_path)
            .await
            .map_err(|e| e.to_string())?;
        let key = file_system
            .read(&self.key_path)
            .await
            .map_err(|e| e.to_string())?;
        check_pem_pair(&certificate, &key)
    }
}

/// A PEM chain with at least one certificate and a PEM private key.
pub fn check_pem_pair(certificate: &[u8], key: &[u8]) -> Result<(), String> {
    let chain = rustls_pemfile::certs(&mut &certificate[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("unreadable certificate chain: {e}"))?;
    if chain.is_empty() {
        return Err("no certificate in chain".to_string());
    }
    match rustls_pemfile::private_key(&mut &key[..]) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err("no private key found".to_string()),
        Err(e) => Err(format!("unreadable private key: {e}")),
    }
}

/// Expiry of the leaf (first) certificate in a PEM chain.
pub fn certificate_not_after(certificate: &[u8]) -> Result<DateTime<Utc>, String> {
    let chain = rustls_pemfile::certs(&mut &certificate[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("unreadable certificate chain: {e}"))?;
    let leaf = chain
        .first()
        .ok_or_else(|| "no certificate in chain".to_string())?;
    let (_, parsed) = x509_parser::parse_x509_certificate(leaf.as_ref())
        .map_err(|e| format!("unparsable certificate: {e}"))?;
    let timestamp = parsed.validity().not_after.timestamp();
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| format!("certificate expiry {timestamp} is out of range"))
}

/// Layout of the certificate store: `<store_dir>/<domain>/{fullchain,privkey}.pem`.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: PathBuf,
}

impl CertificateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join(domain)
    }

    pub fn certificate_path(&self, domain: &str) -> PathBuf {
        self.domain_dir(domain).join(CERTIFICATE_FILE)
    }

    pub fn key_path(&self, domain: &str) -> PathBuf {
        self.domain_dir(domain).join(KEY_FILE)
    }

    fn bundle(&self, domain: &str, issued_by: Issuer, expires_at: Option<DateTime<Utc>>) -> CertificateBundle {
        CertificateBundle {
            domain: domain.to_string(),
            certificate_path: self.certificate_path(domain),
            key_path: self.key_path(domain),
            issued_by,
            expires_at,
        }
    }
}

pub struct CertificateProvisioner {
    /// Written by the ACME client only
    store: CertificateStore,
    self_signed_store: CertificateStore,
    file_system: Arc<dyn FileSystem>,
    runner: Arc<dyn CommandRunner>,
    acme_enabled: bool,
    acme_command: Vec<String>,
    acme_email: Option<String>,
    acme_timeout: Duration,
    validity_days: u32,
}

impl CertificateProvisioner {
    pub fn new(
        config: &CertificateConfig,
        file_system: Arc<dyn FileSystem>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            store: CertificateStore::new(&config.store_dir),
            self_signed_store: CertificateStore::new(&config.self_signed_dir),
            file_system,
            runner,
            acme_enabled: config.acme_enabled,
            acme_command: config.acme_command.clone(),
            acme_email: config.acme_email.clone(),
            acme_timeout: config.acme_timeout,
            validity_days: config.self_signed_validity_days,
        }
    }

    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    pub fn self_signed_store(&self) -> &CertificateStore {
        &self.self_signed_store
    }

    /// A loadable, unexpired certificate already in the ACME store.
    pub async fn existing(&self, domain: &str) -> Option<CertificateBundle> {
        let bundle = self.store.bundle(domain, Issuer::Acme, None);
        if !self.file_system.exists(&bundle.certificate_path).await {
            return None;
        }
        if let Err(reason) = bundle.check_loadable(self.file_system.as_ref()).await {
            tracing::warn!(domain, reason = %reason, "Ignoring unloadable certificate in ACME store");
            return None;
        }

        let pem = self.file_system.read(&bundle.certificate_path).await.ok()?;
        match certificate_not_after(&pem) {
            Ok(not_after) if not_after > Utc::now() => Some(CertificateBundle {
                expires_at: Some(not_after),
                ..bundle
            }),
            Ok(not_after) => {
                tracing::info!(domain, expired_at = %not_after, "Certificate in ACME store has expired");
                None
            }
            Err(reason) => {
                tracing::warn!(domain, reason = %reason, "Ignoring certificate with unreadable expiry");
                None
            }
        }
    }

    /// Certificate and key paths a site should reference before issuance runs: the
    /// existing ACME lineage when it is usable, the self-signed store otherwise.
    pub async fn planned_paths(&self, domain: &str) -> (PathBuf, PathBuf) {
        match self.existing(domain).await {
            Some(bundle) => (bundle.certificate_path, bundle.key_path),
            None => (
                self.self_signed_store.certificate_path(domain),
                self.self_signed_store.key_path(domain),
            ),
        }
    }

    /// Obtain a certificate for `domain` and `*.domain`.
    ///
    /// Fails only when the ACME attempt and the self-signed fallback both fail.
    pub async fn provision(&self, domain: &str) -> Result<CertificateBundle, ProvisioningFailure> {
        let acme_error = if self.acme_enabled {
            match self.try_acme(domain).await {
                Ok(bundle) => {
                    metrics::increment_certificates_issued(Issuer::Acme.as_str());
                    tracing::info!(domain, "ACME certificate issued");
                    return Ok(bundle);
                }
                Err(reason) => {
                    tracing::warn!(
                        domain,
                        reason = %reason,
                        "ACME issuance unavailable, falling back to self-signed certificate"
                    );
                    reason
                }
            }
        } else {
            "ACME disabled".to_string()
        };

        if let Some(bundle) = self.existing(domain).await {
            tracing::info!(
                domain,
                expires_at = ?bundle.expires_at,
                "Keeping existing certificate from ACME store"
            );
            return Ok(bundle);
        }

        match self.self_signed(domain).await {
            Ok(bundle) => {
                metrics::increment_certificates_issued(Issuer::SelfSigned.as_str());
                tracing::info!(
                    domain,
                    expires_at = ?bundle.expires_at,
                    "Self-signed certificate installed"
                );
                Ok(bundle)
            }
            Err(fallback_error) => {
                tracing::error!(domain, acme = %acme_error, fallback = %fallback_error, "Certificate issuance failed");
                Err(ProvisioningFailure::CertificateIssuance(format!(
                    "acme: {acme_error}; self-signed: {fallback_error}"
                )))
            }
        }
    }

    fn acme_spec(&self, domain: &str) -> Result<CommandSpec, String> {
        let spec = CommandSpec::from_argv(&self.acme_command, self.acme_timeout)
            .map_err(|e| e.to_string())?
            .args(["--cert-name", domain, "-d", domain, "-d"])
            .arg(format!("*.{domain}"));
        Ok(match &self.acme_email {
            Some(email) if !email.trim().is_empty() => spec.args(["--email", email.trim()]),
            _ => spec.arg("--register-unsafely-without-email"),
        })
    }

    async fn try_acme(&self, domain: &str) -> Result<CertificateBundle, String> {
        let spec = self.acme_spec(domain)?;
        let output = self.runner.run(&spec).await.map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.summary());
        }

        let bundle = self.store.bundle(domain, Issuer::Acme, None);
        bundle
            .check_loadable(self.file_system.as_ref())
            .await
            .map_err(|e| format!("ACME client succeeded but {e}"))?;
        Ok(bundle)
    }

    async fn self_signed(&self, domain: &str) -> Result<CertificateBundle, String> {
        let now = Utc::now();
        let expires_at = chrono::Duration::try_days(i64::from(self.validity_days))
            .and_then(|validity| now.checked_add_signed(validity))
            .ok_or_else(|| format!("validity of {} days is out of range", self.validity_days))?
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let generated = generate_self_signed(domain, now, expires_at)?;

        let bundle = self
            .self_signed_store
            .bundle(domain, Issuer::SelfSigned, Some(expires_at));
        self.file_system
            .create_dir_all(&self.self_signed_store.domain_dir(domain))
            .await
            .map_err(|e| e.to_string())?;
        self.file_system
            .write_private(&bundle.key_path, generated.key_pem.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        self.file_system
            .write_atomic(&bundle.certificate_path, generated.certificate_pem.as_bytes())
            .await
            .map_err(|e| e.to_string())?;

        bundle.check_loadable(self.file_system.as_ref()).await?;
        Ok(bundle)
    }
}

pub(crate) struct GeneratedPair {
    pub(crate) certificate_pem: String,
    pub(crate) key_pem: String,
}

pub(crate) fn generate_self_signed(
    domain: &str,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> Result<GeneratedPair, String> {
    let to_asn1 = |at: DateTime<Utc>| -> Result<_, String> {
        // X.509 times stop at year 9999
        if !(1..=9999).contains(&at.year()) {
            return Err(format!("certificate date {at} is outside years 1-9999"));
        }
        let month = u8::try_from(at.month()).map_err(|e| e.to_string())?;
        let day = u8::try_from(at.day()).map_err(|e| e.to_string())?;
        Ok(rcgen::date_time_ymd(at.year(), month, day))
    };

    let mut params = CertificateParams::new(vec![domain.to_string(), format!("*.{domain}")])
        .map_err(|e| format!("invalid certificate subject: {e}"))?;
    params.distinguished_name.push(DnType::CommonName, domain);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "provisio self-signed");
    params.not_before = to_asn1(not_before)?;
    params.not_after = to_asn1(not_after)?;

    let key_pair = KeyPair::generate().map_err(|e| format!("key generation failed: {e}"))?;
    let certificate = params
        .self_signed(&key_pair)
        .map_err(|e| format!("signing failed: {e}"))?;

    Ok(GeneratedPair {
        certificate_pem: certificate.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}
