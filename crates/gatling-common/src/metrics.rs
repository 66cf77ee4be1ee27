//! OpenTelemetry metrics for the Gatling controller
//!
//! Instruments are created lazily against the global meter, so recording is a
//! no-op until telemetry installs a meter provider.

use once_cell::sync::Lazy;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};

/// Global meter for Gatling operator metrics
static METER: Lazy<Meter> = Lazy::new(|| global::meter("gatling-operator"));

/// Counter of reconcile passes
///
/// Labels:
/// - `phase`: runner, reporter, notification, cleanup, failed
/// - `result`: success, error
pub static RECONCILES_TOTAL: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gatling_reconciles_total")
        .with_description("Total number of Gatling reconcile passes")
        .with_unit("{reconciles}")
        .build()
});

/// Histogram of reconcile pass duration
///
/// Labels:
/// - `phase`: runner, reporter, notification, cleanup, failed
pub static RECONCILE_DURATION: Lazy<Histogram<f64>> = Lazy::new(|| {
    METER
        .f64_histogram("gatling_reconcile_duration_seconds")
        .with_description("Duration of Gatling reconcile passes in seconds")
        .with_unit("s")
        .build()
});

/// Counter of jobs that exceeded their creation or run budget
///
/// Labels:
/// - `job`: runner, reporter
/// - `stage`: creating, running
pub static JOB_TIMEOUTS_TOTAL: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gatling_job_timeouts_total")
        .with_description("Total number of runner or reporter jobs that ran out of time")
        .with_unit("{jobs}")
        .build()
});

/// Counter of failed notification attempts
///
/// Labels:
/// - `provider`: notification provider name
pub static NOTIFICATION_FAILURES_TOTAL: Lazy<Counter<u64>> = Lazy::new(|| {
    METER
        .u64_counter("gatling_notification_failures_total")
        .with_description("Total number of failed notification attempts")
        .with_unit("{notifications}")
        .build()
});

/// Record the outcome and duration of one reconcile pass
pub fn record_reconcile(phase: &str, success: bool, seconds: f64) {
    let result = if success { "success" } else { "error" };
    RECONCILES_TOTAL.add(
        1,
        &[
            KeyValue::new("phase", phase.to_string()),
            KeyValue::new("result", result),
        ],
    );
    RECONCILE_DURATION.record(seconds, &[KeyValue::new("phase", phase.to_string())]);
}

/// Record a job that ran out of time
pub fn record_job_timeout(job: &str, stage: &str) {
    JOB_TIMEOUTS_TOTAL.add(
        1,
        &[
            KeyValue::new("job", job.to_string()),
            KeyValue::new("stage", stage.to_string()),
        ],
    );
}

/// Record a failed notification attempt
pub fn record_notification_failure(provider: &str) {
    NOTIFICATION_FAILURES_TOTAL.add(1, &[KeyValue::new("provider", provider.to_string())]);
}
