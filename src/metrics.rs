//! Metrics helpers for Provisio.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is embedded; install any
//! compatible recorder in the embedding application to collect them.
//!
//! Provided metrics:
//! * `provisio_requests_total` (counter, label `status`)
//! * `provisio_request_duration_seconds` (histogram, label `status`)
//! * `provisio_certificates_issued_total` (counter, label `issuer`)
//! * `provisio_webhook_deliveries_total` (counter, label `result`)
//! * `provisio_active_provisions` (gauge)
use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{Duration, Instant},
};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::Lazy;

pub const PROVISIO_REQUESTS_TOTAL: &str = "provisio_requests_total";
pub const PROVISIO_REQUEST_DURATION_SECONDS: &str = "provisio_request_duration_seconds";
pub const PROVISIO_CERTIFICATES_ISSUED_TOTAL: &str = "provisio_certificates_issued_total";
pub const PROVISIO_WEBHOOK_DELIVERIES_TOTAL: &str = "provisio_webhook_deliveries_total";
pub const PROVISIO_ACTIVE_PROVISIONS: &str = "provisio_active_provisions";

static ACTIVE_PROVISIONS: Lazy<AtomicI64> = Lazy::new(|| {
    describe_counter!(
        PROVISIO_REQUESTS_TOTAL,
        Unit::Count,
        "Provisioning requests by final status (ok, unauthorized, invalid, failed)."
    );
    describe_histogram!(
        PROVISIO_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Wall time of provisioning requests, including lock waits."
    );
    describe_counter!(
        PROVISIO_CERTIFICATES_ISSUED_TOTAL,
        Unit::Count,
        "Certificates installed, by issuer (acme, self-signed)."
    );
    describe_counter!(
        PROVISIO_WEBHOOK_DELIVERIES_TOTAL,
        Unit::Count,
        "Outcome webhook deliveries by result (delivered, failed, skipped)."
    );
    describe_gauge!(
        PROVISIO_ACTIVE_PROVISIONS,
        "Provisioning pipelines currently running."
    );
    AtomicI64::new(0)
});

/// Initialize metric descriptions (idempotent).
pub fn init_metrics() {
    Lazy::force(&ACTIVE_PROVISIONS);
    tracing::debug!("Provisio metric descriptions registered");
}

pub fn increment_request_total(status: &'static str) {
    counter!(PROVISIO_REQUESTS_TOTAL, "status" => status).increment(1);
}

pub fn record_request_duration(status: &'static str, duration: Duration) {
    histogram!(PROVISIO_REQUEST_DURATION_SECONDS, "status" => status)
        .record(duration.as_secs_f64());
}

pub fn increment_certificates_issued(issuer: &'static str) {
    counter!(PROVISIO_CERTIFICATES_ISSUED_TOTAL, "issuer" => issuer).increment(1);
}

pub fn increment_webhook_deliveries(result: &'static str) {
    counter!(PROVISIO_WEBHOOK_DELIVERIES_TOTAL, "result" => result).increment(1);
}

/// Current number of running pipelines as tracked by [`ActiveProvisionGuard`].
pub fn active_provisions() -> i64 {
    ACTIVE_PROVISIONS.load(Ordering::Relaxed)
}

/// RAII helper counting a running pipeline; the gauge drops back when it goes away.
pub struct ActiveProvisionGuard(());

impl ActiveProvisionGuard {
    pub fn new() -> Self {
        let now = ACTIVE_PROVISIONS.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!(PROVISIO_ACTIVE_PROVISIONS).set(now as f64);
        Self(())
    }
}

impl Default for ActiveProvisionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActiveProvisionGuard {
    fn drop(&mut self) {
        let now = ACTIVE_PROVISIONS.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!(PROVISIO_ACTIVE_PROVISIONS).set(now as f64);
    }
}

/// RAII helper measuring request duration; the status label is set once known.
pub struct RequestTimer {
    start: Instant,
    status: &'static str,
}

impl RequestTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            status: "failed",
        }
    }

    pub fn set_status(&mut self, status: &'static str) {
        self.status = status;
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        increment_request_total(self.status);
        record_request_duration(self.status, self.start.elapsed());
    }
}
