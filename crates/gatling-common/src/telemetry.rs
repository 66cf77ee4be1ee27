//! Logging, tracing and metrics setup for the operator process
//!
//! Logs go to stdout, JSON by default and plain text when
//! `GATLING_LOG_FORMAT=text`. When `OTEL_EXPORTER_OTLP_ENDPOINT` is set,
//! spans and metrics are also pushed over OTLP/gRPC with W3C trace context.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, SERVICE_VERSION};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter applied when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,gatling=debug,kube=info,tower=warn,hyper=warn";

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "GATLING_LOG_FORMAT";

/// Errors raised while installing telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An OTLP exporter could not be built
    #[error("failed to build OTLP {signal} exporter: {message}")]
    Exporter {
        /// "traces" or "metrics"
        signal: &'static str,
        /// Exporter error text
        message: String,
    },

    /// A global subscriber was already installed
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// How log lines are rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line with the current span
    #[default]
    Json,
    /// Human readable lines for local runs
    Text,
}

impl LogFormat {
    /// Parse a format name; anything other than `text` means JSON
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Settings for [`init_telemetry`]
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `service.name` reported with spans and metrics
    pub service_name: String,

    /// OTLP collector endpoint, e.g. `http://otel-collector:4317`
    pub otlp_endpoint: Option<String>,

    /// Log line rendering
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "gatling-operator".to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|e| !e.is_empty()),
            log_format: std::env::var(LOG_FORMAT_ENV)
                .map(|f| LogFormat::from_name(&f))
                .unwrap_or_default(),
        }
    }
}

/// Keeps the OTLP pipelines alive; flushes them when dropped
///
/// Hold it for the life of the process so buffered spans and the last
/// metric export are not lost on shutdown.
#[must_use = "dropping the guard shuts the exporters down"]
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<TracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush traces: {e}");
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to flush metrics: {e}");
            }
        }
    }
}

/// Install the global subscriber, propagator and optional OTLP pipelines
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let mut guard = TelemetryGuard::default();
    let otel_layer = match &config.otlp_endpoint {
        Some(endpoint) => {
            let resource = operator_resource(&config.service_name);
            let meters = otlp_meter_provider(endpoint, resource.clone())?;
            global::set_meter_provider(meters.clone());
            guard.meter_provider = Some(meters);

            let tracers = otlp_tracer_provider(endpoint, resource)?;
            global::set_tracer_provider(tracers.clone());
            let tracer = tracers.tracer(config.service_name.clone());
            guard.tracer_provider = Some(tracers);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    Ok(guard)
}

/// `service.*` attributes plus the pod identity from the downward API
fn operator_resource(service_name: &str) -> Resource {
    let mut attributes = vec![
        KeyValue::new(SERVICE_NAME, service_name.to_string()),
        KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
    ];
    for (var, key) in [
        ("POD_NAME", "k8s.pod.name"),
        ("POD_NAMESPACE", "k8s.namespace.name"),
    ] {
        if let Ok(value) = std::env::var(var) {
            attributes.push(KeyValue::new(key, value));
        }
    }
    Resource::new(attributes)
}

fn otlp_tracer_provider(endpoint: &str, resource: Resource) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "traces",
            message: e.to_string(),
        })?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build())
}

fn otlp_meter_provider(endpoint: &str, resource: Resource) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "metrics",
            message: e.to_string(),
        })?;

    Ok(SdkMeterProvider::builder()
        .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
        .with_resource(resource)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_service_name() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "gatling-operator");
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn only_text_selects_plain_logs() {
        assert_eq!(LogFormat::from_name("text"), LogFormat::Text);
        assert_eq!(LogFormat::from_name("TEXT"), LogFormat::Text);
        assert_eq!(LogFormat::from_name("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Json);
    }

    #[test]
    fn resource_carries_service_identity() {
        let resource = operator_resource("gatling-operator");
        let name = resource.get(opentelemetry::Key::from_static_str(SERVICE_NAME));
        assert_eq!(name.map(|v| v.to_string()).as_deref(), Some("gatling-operator"));
    }

    #[test]
    fn exporter_errors_name_the_signal() {
        let err = TelemetryError::Exporter {
            signal: "metrics",
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("metrics"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn empty_guard_drops_quietly() {
        drop(TelemetryGuard::default());
    }
}
