use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging.
///
/// `level` is an `EnvFilter` directive (`"info"`, `"provisio=debug,tower_http=info"`).
/// `RUST_LOG`, when set, wins over the configured level.
pub fn init_tracing_with_config(level: &str, json_format: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json_format {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.json().with_current_span(true).with_span_list(false))
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
            .wrap_err("Failed to install tracing subscriber")?;
    }

    tracing::info!(level, json = json_format, "Provisio logging initialized");
    Ok(())
}

/// Span covering one provisioning run. `domain` and `user.id` are recorded once known.
pub fn create_provisioning_span(request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "provisioning",
        request.id = request_id,
        domain = tracing::field::Empty,
        user.id = tracing::field::Empty,
    )
}

/// Span covering one HTTP exchange.
pub fn create_request_span(method: &str, path: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "request",
        http.method = method,
        http.path = path,
        request.id = request_id,
    )
}
