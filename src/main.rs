use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use provisio::{
    adapters::{HttpHandler, system_ports},
    config::{ServerConfigValidator, load_config, models::ServerConfig},
    core::Coordinator,
    metrics, tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "provisio.toml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration (file plus PROVISIO__* environment)
    Validate {
        #[clap(short, long, default_value = "provisio.toml")]
        config: String,
    },
    /// Write a starter configuration file
    Init {
        #[clap(short, long, default_value = "provisio.toml")]
        config: String,
    },
    /// Start the provisioning server (default)
    Serve {
        #[clap(short, long, default_value = "provisio.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => validate_config_command(&config).await,
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve(&config).await,
        None => serve(&args.config).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    ServerConfigValidator::validate(&config)
        .map_err(|e| eyre!("Invalid configuration:\n{e}"))?;

    tracing_setup::init_tracing_with_config(&config.logging.level, config.logging.json)?;
    metrics::init_metrics();

    tracing::info!(
        config = config_path,
        listen = %config.listen_addr(),
        backend = %config.backend_origin,
        acme = config.certificates.acme_enabled,
        "Starting provisio"
    );

    let ports = system_ports(&config).context("Failed to create system adapters")?;
    let coordinator = Arc::new(Coordinator::new(&config, ports)?);
    let app = HttpHandler::new(coordinator).router();

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    let graceful_shutdown = Arc::new(GracefulShutdown::with_timeout(config.shutdown_timeout));
    let signal_handler = {
        let shutdown = graceful_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown.run_signal_handler().await {
                tracing::error!(error = %e, "Signal handler failed");
            }
        })
    };

    let shutdown = graceful_shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = shutdown.wait_for_shutdown_signal().await;
            tracing::info!(reason = ?reason, "No longer accepting requests");
        })
        .await
        .context("HTTP server error")?;

    let unfinished = graceful_shutdown.drain().await;
    signal_handler.abort();
    tracing::info!(unfinished, "Provisio stopped");
    Ok(())
}

/// Validate the configuration the server would start with
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration: {config_path}");

    if !Path::new(config_path).exists() {
        println!("ℹ️  '{config_path}' not found, checking defaults and PROVISIO__* environment only");
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            print_summary(&config);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Set PROVISIO__WEBHOOK_SECRET or webhook_secret in the file");
            println!("   • Ensure backend_origin starts with http:// or https://");
            println!("   • Use humantime durations such as \"5s\" or \"1m\"");
            std::process::exit(1);
        }
    }
}

fn print_summary(config: &ServerConfig) {
    println!("📋 Configuration Summary:");
    println!("   • Listen Address: {}", config.listen_addr());
    println!("   • Backend Origin: {}", config.backend_origin);
    println!(
        "   • Reserved Domains: {}",
        config.policy.reserved_domains.join(", ")
    );
    println!(
        "   • Sites: {} -> {}",
        config.proxy.sites_available_dir.display(),
        config.proxy.sites_enabled_dir.display()
    );
    println!(
        "   • Certificate Store: {}",
        config.certificates.store_dir.display()
    );
    println!("   • ACME Enabled: {}", config.certificates.acme_enabled);
    println!("   • Webhook Attempts: {}", config.webhook.max_attempts);
}

/// Write a starter configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Provisio configuration
# Every key can be overridden with PROVISIO__<KEY>, e.g. PROVISIO__WEBHOOK__MAX_ATTEMPTS=3

host = "0.0.0.0"
port = 3001

# Shared HMAC-SHA256 secret; prefer PROVISIO__WEBHOOK_SECRET over writing it here
webhook_secret = ""

# Every provisioned domain proxies here
backend_origin = "http://127.0.0.1:3000"

shutdown_timeout = "30s"

[policy]
reserved_domains = ["pholio.link"]
blocked_hosts = []

[proxy]
sites_available_dir = "/etc/nginx/sites-available"
sites_enabled_dir = "/etc/nginx/sites-enabled"
test_command = ["nginx", "-t"]
reload_command = ["systemctl", "reload", "nginx"]
command_timeout = "30s"
rollback_on_invalid = true
client_max_body_size = "100M"

[certificates]
store_dir = "/etc/letsencrypt/live"
self_signed_dir = "/etc/ssl/provisio"
acme_enabled = true
acme_command = ["certbot", "certonly", "--manual", "--preferred-challenges", "dns", "--agree-tos", "--non-interactive"]
# acme_email = "ops@example.com"
acme_timeout = "5s"
self_signed_validity_days = 90

[webhook]
timeout = "10s"
max_attempts = 1
retry_backoff = "1s"

[logging]
level = "info"
json = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Set webhook_secret, then run 'provisio serve --config {config_path}'");
    Ok(())
}
