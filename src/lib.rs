//! Provisio - custom-domain provisioning for a multi-tenant web platform.
//!
//! A tenant points their own hostname at the platform; the platform's backend sends a signed
//! request to Provisio, which then:
//! - authenticates the request (HMAC-SHA256 over the raw body, constant-time compare)
//! - validates and normalizes the domain against reserved and blocked names
//! - writes an nginx site for the domain and enables it, checking syntax before going live
//! - obtains a certificate through an ACME client, falling back to a self-signed one
//! - reloads the proxy and reports the outcome to a signed callback webhook
//!
//! Requests for the same domain are serialized; distinct domains run in parallel.
//!
//! # Architecture
//! The crate separates **ports** (traits for processes, files and outbound webhooks) from
//! **adapters** (tokio, the local disk, reqwest, axum) while the pipeline itself lives in
//! `core`. Tests swap the adapters for scripted fakes through [`core::Ports`].
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use provisio::{Coordinator, HttpHandler, adapters::system_ports, config::load_config};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = load_config("provisio.toml").await?;
//! let coordinator = Arc::new(Coordinator::new(&config, system_ports(&config)?)?);
//! let app = HttpHandler::new(coordinator).router();
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Pipeline steps return typed errors ([`core::ProvisionError`] and the port errors).
//! Startup and configuration use `eyre::Result` with `WrapErr` context.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{FileSystemAdapter, HttpHandler, ReqwestWebhookClient, TokioCommandRunner},
    core::{Coordinator, Ports, ProvisionError, Signer},
    utils::GracefulShutdown,
};
