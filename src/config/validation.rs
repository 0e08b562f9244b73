use std::net::SocketAddr;

use crate::config::models::{CertificateConfig, ProxyConfig, ServerConfig, WebhookConfig};

/// Ten years; anything longer is a typo rather than a policy.
pub const MAX_SELF_SIGNED_VALIDITY_DAYS: u32 = 3650;

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Validate the entire server configuration, reporting every problem at once.
    pub fn validate(config: &ServerConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr()) {
            errors.push(e);
        }

        if config.webhook_secret.trim().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "webhook_secret".to_string(),
            });
        }

        if let Err(e) = Self::validate_url(&config.backend_origin, "backend_origin") {
            errors.push(e);
        }

        for (i, entry) in config.policy.reserved_domains.iter().enumerate() {
            if entry.trim().is_empty() {
                errors.push(ValidationError::InvalidField {
                    field: format!("policy.reserved_domains[{i}]"),
                    message: "Reserved domain entries must not be empty".to_string(),
                });
            }
        }

        errors.extend(Self::validate_proxy(&config.proxy));
        errors.extend(Self::validate_certificates(&config.certificates));
        errors.extend(Self::validate_webhook(&config.webhook));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format: an IP address or host name, and a port.
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_ok() {
            return Ok(());
        }

        let invalid = |reason: &str| ValidationError::InvalidListenAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        port.parse::<u16>()
            .map_err(|_| invalid("port must be a number between 0 and 65535"))?;

        let host_ok = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && matches!(url::Host::parse(host), Ok(url::Host::Domain(_)));
        if !host_ok {
            return Err(invalid(
                "host must be an IP address or a host name (e.g. '0.0.0.0' or 'localhost')",
            ));
        }
        Ok(())
    }

    fn validate_proxy(proxy: &ProxyConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if proxy.sites_available_dir.as_os_str().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "proxy.sites_available_dir".to_string(),
            });
        }
        if proxy.sites_enabled_dir.as_os_str().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "proxy.sites_enabled_dir".to_string(),
            });
        }
        if let Err(e) = Self::validate_command(&proxy.test_command, "proxy.test_command") {
            errors.push(e);
        }
        if let Err(e) = Self::validate_command(&proxy.reload_command, "proxy.reload_command") {
            errors.push(e);
        }
        if proxy.command_timeout.is_zero() {
            errors.push(ValidationError::InvalidField {
                field: "proxy.command_timeout".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            });
        }
        let body_size_ok = !proxy.client_max_body_size.is_empty()
            && proxy
                .client_max_body_size
                .chars()
                .all(|c| c.is_ascii_alphanumeric());
        if !body_size_ok {
            errors.push(ValidationError::InvalidField {
                field: "proxy.client_max_body_size".to_string(),
                message: format!(
                    "'{}' is not an nginx size (e.g. '100M')",
                    proxy.client_max_body_size
                ),
            });
        }

        errors
    }

    fn validate_certificates(certificates: &CertificateConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if certificates.store_dir.as_os_str().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "certificates.store_dir".to_string(),
            });
        }
        if certificates.acme_enabled {
            if let Err(e) =
                Self::validate_command(&certificates.acme_command, "certificates.acme_command")
            {
                errors.push(e);
            }
            if certificates.acme_timeout.is_zero() {
                errors.push(ValidationError::InvalidField {
                    field: "certificates.acme_timeout".to_string(),
                    message: "Timeout must be greater than 0".to_string(),
                });
            }
        }
        if certificates.self_signed_dir.as_os_str().is_empty() {
            errors.push(ValidationError::MissingField {
                field: "certificates.self_signed_dir".to_string(),
            });
        }
        if certificates.self_signed_validity_days == 0 {
            errors.push(ValidationError::InvalidField {
                field: "certificates.self_signed_validity_days".to_string(),
                message: "Validity must be at least one day".to_string(),
            });
        } else if certificates.self_signed_validity_days > MAX_SELF_SIGNED_VALIDITY_DAYS {
            errors.push(ValidationError::InvalidField {
                field: "certificates.self_signed_validity_days".to_string(),
                message: format!(
                    "Validity must be at most {MAX_SELF_SIGNED_VALIDITY_DAYS} days, got {}",
                    certificates.self_signed_validity_days
                ),
            });
        }

        errors
    }

    fn validate_webhook(webhook: &WebhookConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if webhook.max_attempts == 0 {
            errors.push(ValidationError::InvalidField {
                field: "webhook.max_attempts".to_string(),
                message: "At least one delivery attempt is required".to_string(),
            });
        }
        if webhook.timeout.is_zero() {
            errors.push(ValidationError::InvalidField {
                field: "webhook.timeout".to_string(),
                message: "Timeout must be greater than 0".to_string(),
            });
        }

        errors
    }

    fn validate_command(argv: &[String], field: &str) -> ValidationResult<()> {
        match argv.first() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::InvalidField {
                field: field.to_string(),
                message: "Command must name a program".to_string(),
            }),
        }
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("  {}. {e}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
