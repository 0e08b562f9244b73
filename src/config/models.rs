//! Configuration data structures for Provisio.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and to
//! `PROVISIO__*` environment variables. Every section carries defaults so that the
//! only value an operator must supply is the shared webhook secret.
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind the HTTP listener on
    pub host: String,
    /// Port to bind the HTTP listener on
    pub port: u16,
    /// Shared secret for inbound request verification and outbound webhook signing
    pub webhook_secret: String,
    /// Canonical upstream every provisioned domain proxies to
    pub backend_origin: String,
    /// How long shutdown waits for in-flight provisioning runs to finish
    #[serde(with = "humantime_duration")]
    pub shutdown_timeout: Duration,
    pub policy: DomainPolicyConfig,
    pub proxy: ProxyConfig,
    pub certificates: CertificateConfig,
    pub webhook: WebhookConfig,
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            webhook_secret: String::new(),
            backend_origin: "http://127.0.0.1:3000".to_string(),
            shutdown_timeout: Duration::from_secs(30),
            policy: DomainPolicyConfig::default(),
            proxy: ProxyConfig::default(),
            certificates: CertificateConfig::default(),
            webhook: WebhookConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Socket address string the listener binds to (`host:port`, IPv6 hosts bracketed).
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Domains tenants may never claim.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DomainPolicyConfig {
    /// The service's own root domains. Any requested domain containing one of these is rejected.
    pub reserved_domains: Vec<String>,
    /// Individual hosts rejected on exact match.
    pub blocked_hosts: Vec<String>,
}

impl Default for DomainPolicyConfig {
    fn default() -> Self {
        Self {
            reserved_domains: vec!["pholio.link".to_string()],
            blocked_hosts: Vec::new(),
        }
    }
}

/// Reverse-proxy site store and the commands used to check and reload it.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    pub sites_available_dir: PathBuf,
    pub sites_enabled_dir: PathBuf,
    /// Configuration syntax check, as an argument vector
    pub test_command: Vec<String>,
    /// Graceful reload of the running proxy, as an argument vector
    pub reload_command: Vec<String>,
    /// Upper bound for the syntax check and reload commands
    #[serde(with = "humantime_duration")]
    pub command_timeout: Duration,
    /// Remove the site file and its enabled link when the syntax check fails
    pub rollback_on_invalid: bool,
    /// Value for nginx `client_max_body_size`
    pub client_max_body_size: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            sites_available_dir: PathBuf::from("/etc/nginx/sites-available"),
            sites_enabled_dir: PathBuf::from("/etc/nginx/sites-enabled"),
            test_command: vec!["nginx".to_string(), "-t".to_string()],
            reload_command: vec![
                "systemctl".to_string(),
                "reload".to_string(),
                "nginx".to_string(),
            ],
            command_timeout: Duration::from_secs(30),
            rollback_on_invalid: true,
            client_max_body_size: "100M".to_string(),
        }
    }
}

/// Certificate store layout, ACME client invocation and self-signed fallback.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CertificateConfig {
    /// One sub-directory per domain holding `fullchain.pem` and `privkey.pem`
    pub store_dir: PathBuf,
    /// Where self-signed fallbacks are written, laid out like `store_dir`. Kept apart so
    /// the ACME client's own lineage is never overwritten.
    pub self_signed_dir: PathBuf,
    pub acme_enabled: bool,
    /// Base ACME command; domain arguments are appended per request
    pub acme_command: Vec<String>,
    pub acme_email: Option<String>,
    /// Bound on the ACME attempt before falling back to a self-signed certificate
    #[serde(with = "humantime_duration")]
    pub acme_timeout: Duration,
    pub self_signed_validity_days: u32,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("/etc/letsencrypt/live"),
            self_signed_dir: PathBuf::from("/etc/ssl/provisio"),
            acme_enabled: true,
            acme_command: [
                "certbot",
                "certonly",
                "--manual",
                "--preferred-challenges",
                "dns",
                "--agree-tos",
                "--non-interactive",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            acme_email: None,
            acme_timeout: Duration::from_secs(5),
            self_signed_validity_days: 90,
        }
    }
}

/// Outbound webhook delivery.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WebhookConfig {
    #[serde(with = "humantime_duration")]
    pub timeout: Duration,
    /// Total delivery attempts; 1 means fire-and-forget
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each further attempt
    #[serde(with = "humantime_duration")]
    pub retry_backoff: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 1,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Serde adapter for humantime strings such as `"5s"` or `"1m 30s"`.
mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_usable() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:3001");
        assert_eq!(config.certificates.self_signed_validity_days, 90);
        assert_eq!(config.webhook.max_attempts, 1);
        assert_eq!(config.proxy.test_command, vec!["nginx", "-t"]);
    }

    #[test]
    fn test_ipv6_listen_addr_is_bracketed() {
        let config = ServerConfig {
            host: "::1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.listen_addr(), "[::1]:8080");
    }

    #[test]
    fn test_duration_round_trip_through_json() {
        let json = r#"{ "timeout": "2s", "max_attempts": 3, "retry_backoff": "250ms" }"#;
        let webhook: WebhookConfig = serde_json::from_str(json).unwrap();
        assert_eq!(webhook.timeout, Duration::from_secs(2));
        assert_eq!(webhook.retry_backoff, Duration::from_millis(250));

        let back = serde_json::to_value(&webhook).unwrap();
        assert_eq!(back["timeout"], "2s");
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let json = r#"{ "timeout": "soon" }"#;
        assert!(serde_json::from_str::<WebhookConfig>(json).is_err());
    }
}
