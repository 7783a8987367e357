//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use flowline_observe::ObserveConfig;
//!
//! // Structured logging only
//! flowline_observe::init_tracing(&ObserveConfig::default()).unwrap();
//!
//! // JSON logs plus OpenTelemetry export to stdout (local development)
//! let config = ObserveConfig {
//!     json_output: true,
//!     enable_otel: true,
//!     ..ObserveConfig::default()
//! };
//! flowline_observe::init_tracing(&config).unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct ObserveConfig {
    /// Tracer name reported to OpenTelemetry.
    pub service_name: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_output: bool,
    /// Bridge tracing spans to OpenTelemetry (stdout exporter; swap for
    /// OTLP in production).
    pub enable_otel: bool,
}

impl Default for ObserveConfig {
    fn default() -> Self {
        Self {
            service_name: "flowline".to_string(),
            json_output: false,
            enable_otel: false,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Always installs a structured `fmt` layer with target visibility and span
/// close timing; respects `RUST_LOG` via `EnvFilter::from_default_env()`.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_tracing(config: &ObserveConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env();

    let tracer = if config.enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer(config.service_name.clone());

        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracer)
    } else {
        None
    };

    if config.json_output {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE);
        let otel_layer = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Call before process exit; a no-op when OTel was not enabled.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
