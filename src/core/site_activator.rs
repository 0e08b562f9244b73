use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    config::models::ProxyConfig,
    core::{error::ProvisioningFailure, proxy_config::ProxySiteConfig},
    ports::{
        file_system::FileSystem,
        process::{CommandRunner, CommandSpec},
    },
};

/// Where an activated site lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedSite {
    pub domain: String,
    pub available_path: PathBuf,
    pub enabled_path: PathBuf,
}

/// Writes, enables and syntax-checks a site definition as one unit.
pub struct SiteActivator {
    file_system: Arc<dyn FileSystem>,
    runner: Arc<dyn CommandRunner>,
    sites_available_dir: PathBuf,
    sites_enabled_dir: PathBuf,
    test_command: Vec<String>,
    command_timeout: Duration,
    rollback_on_invalid: bool,
}

impl SiteActivator {
    pub fn new(
        config: &ProxyConfig,
        file_system: Arc<dyn FileSystem>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            file_system,
            runner,
            sites_available_dir: config.sites_available_dir.clone(),
            sites_enabled_dir: config.sites_enabled_dir.clone(),
            test_command: config.test_command.clone(),
            command_timeout: config.command_timeout,
            rollback_on_invalid: config.rollback_on_invalid,
        }
    }

    pub fn available_path(&self, domain: &str) -> PathBuf {
        self.sites_available_dir.join(domain)
    }

    pub fn enabled_path(&self, domain: &str) -> PathBuf {
        self.sites_enabled_dir.join(domain)
    }

    pub async fn activate(&self, site: &ProxySiteConfig) -> Result<ActivatedSite, ProvisioningFailure> {
        let activated = ActivatedSite {
            domain: site.domain.clone(),
            available_path: self.available_path(&site.domain),
            enabled_path: self.enabled_path(&site.domain),
        };

        self.file_system
            .write_atomic(&activated.available_path, site.rendered.as_bytes())
            .await
            .map_err(ProvisioningFailure::ConfigWrite)?;
        self.file_system
            .link(&activated.available_path, &activated.enabled_path)
            .await
            .map_err(ProvisioningFailure::ConfigWrite)?;

        tracing::debug!(
            domain = %site.domain,
            path = %activated.available_path.display(),
            "Site definition written and enabled"
        );

        if let Err(failure) = self.check_syntax().await {
            tracing::error!(domain = %site.domain, error = %failure, "Proxy rejected site definition");
            if self.rollback_on_invalid {
                self.roll_back(&activated).await;
            }
            return Err(failure);
        }

        Ok(activated)
    }

    async fn check_syntax(&self) -> Result<(), ProvisioningFailure> {
        let spec = CommandSpec::from_argv(&self.test_command, self.command_timeout)?;
        let output = self.runner.run(&spec).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ProvisioningFailure::InvalidConfig(output.summary()))
        }
    }

    async fn roll_back(&self, site: &ActivatedSite) {
        for path in [&site.enabled_path, &site.available_path] {
            if let Err(e) = self.file_system.remove(path).await {
                tracing::warn!(
                    domain = %site.domain,
                    path = %path.display(),
                    error = %e,
                    "Failed to roll back site definition"
                );
            }
        }
        tracing::info!(domain = %site.domain, "Rolled back rejected site definition");
    }
}
