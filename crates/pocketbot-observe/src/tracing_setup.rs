//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! use pocketbot_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! // Human-readable logs at warn level unless RUST_LOG says otherwise
//! init_tracing(&TracingOptions::default()).unwrap();
//! ```
//!
//! ```no_run
//! use pocketbot_observe::tracing_setup::{init_tracing, TracingOptions};
//!
//! // JSON lines plus OpenTelemetry export to stdout
//! init_tracing(&TracingOptions {
//!     default_filter: "info,pocketbot=debug".to_string(),
//!     json: true,
//!     otel: true,
//! })
//! .unwrap();
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// How the global subscriber is built.
#[derive(Debug, Clone)]
pub struct TracingOptions {
    /// Filter directives used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit one JSON object per event instead of the compact text format.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            default_filter: "warn".to_string(),
            json: false,
            otel: false,
        }
    }
}

impl TracingOptions {
    /// Map CLI verbosity flags to a default filter.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let default_filter = match verbose {
            0 if quiet => "error",
            0 => "warn",
            1 => "info,pocketbot=debug",
            _ => "trace",
        };
        Self {
            default_filter: default_filter.to_string(),
            ..Self::default()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Initialize the global tracing subscriber.
///
/// - Events go to stderr so command output on stdout stays machine-readable.
/// - `RUST_LOG` overrides `options.default_filter`.
/// - When `options.otel` is true, spans are additionally exported through
///   OpenTelemetry using a stdout exporter (suitable for local development).
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(options: &TracingOptions) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(options.env_filter())
        .with(fmt_layer);

    if options.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("pocketbot");
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        registry.with(otel_layer).try_init()?;
    } else {
        registry.try_init()?;
    }

    Ok(())
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
