//! Domain normalization and admission rules.
//!
//! A domain that passes [`DomainPolicy::check`] is made of lowercase ASCII letters,
//! digits, hyphens and dots only, so it is safe to use as a file name, a path segment
//! and a command argument.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::models::DomainPolicyConfig;

const MAX_DOMAIN_LEN: usize = 253;

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("label pattern is valid")
});

/// Canonical form of a user-supplied domain: surrounding whitespace removed, ASCII
/// lowercased. Idempotent.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Why a domain was refused. The display text is returned to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("Domain is required")]
    Empty,

    #[error("Domain '{domain}' is not a valid host name: {reason}")]
    Malformed { domain: String, reason: String },

    #[error("Domain '{domain}' is reserved and cannot be used")]
    Reserved { domain: String },

    #[error("Domain '{domain}' is not allowed")]
    Blocked { domain: String },
}

#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
    reserved: Vec<String>,
    blocked: Vec<String>,
}

impl DomainPolicy {
    pub fn new(config: &DomainPolicyConfig) -> Self {
        let clean = |entries: &[String]| {
            entries
                .iter()
                .map(|entry| normalize(entry))
                .filter(|entry| !entry.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            reserved: clean(&config.reserved_domains),
            blocked: clean(&config.blocked_hosts),
        }
    }

    /// Check an already normalized domain.
    pub fn check(&self, domain: &str) -> Result<(), PolicyViolation> {
        if domain.is_empty() {
            return Err(PolicyViolation::Empty);
        }

        check_syntax(domain).map_err(|reason| PolicyViolation::Malformed {
            domain: domain.to_string(),
            reason: reason.to_string(),
        })?;

        if self.reserved.iter().any(|entry| domain.contains(entry.as_str())) {
            return Err(PolicyViolation::Reserved {
                domain: domain.to_string(),
            });
        }
        if self.blocked.iter().any(|entry| entry == domain) {
            return Err(PolicyViolation::Blocked {
                domain: domain.to_string(),
            });
        }

        Ok(())
    }

    /// Normalize and check in one step, returning the canonical domain.
    pub fn admit(&self, raw: &str) -> Result<String, PolicyViolation> {
        let domain = normalize(raw);
        self.check(&domain)?;
        Ok(domain)
    }
}

fn check_syntax(domain: &str) -> Result<(), &'static str> {
    if domain.len() > MAX_DOMAIN_LEN {
        return Err("longer than 253 characters");
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err("at least two labels are required");
    }
    for label in labels {
        if label.is_empty() {
            return Err("empty label");
        }
        if label.len() > 63 {
            return Err("label longer than 63 characters");
        }
        if !LABEL_RE.is_match(label) {
            return Err("labels may only contain a-z, 0-9 and inner hyphens");
        }
    }
    Ok(())
}
