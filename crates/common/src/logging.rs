//! Logging and trace export for UB515 binaries.
//!
//! Builds a `tracing-subscriber` registry from [`LoggingSettings`]: an
//! `EnvFilter` (base level, noisy-crate overrides, configured per-target
//! levels, then `RUST_LOG`), a compact or JSON console layer, and, with the
//! `telemetry` feature, an OTLP/gRPC span exporter.

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingSettings};

#[cfg(feature = "telemetry")]
use {
    opentelemetry::trace::TracerProvider, opentelemetry::KeyValue,
    opentelemetry_otlp::WithExportConfig,
    opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider, opentelemetry_sdk::Resource,
    tracing_opentelemetry::OpenTelemetryLayer,
};

const NOISY_TARGETS: &[(&str, &str)] = &[
    ("tokio_postgres", "warn"),
    ("deadpool", "warn"),
    ("rusqlite", "warn"),
    ("h2", "warn"),
    ("tonic", "warn"),
];

/// Filter directives in increasing precedence; `RUST_LOG` is appended last.
pub fn filter_directives(settings: &LoggingSettings) -> Vec<String> {
    let mut directives = vec![settings.level.clone()];
    for (target, lvl) in NOISY_TARGETS {
        directives.push(format!("{}={}", target, lvl));
    }

    let mut targets: Vec<_> = settings.targets.iter().collect();
    targets.sort();
    for (target, lvl) in targets {
        directives.push(format!("{}={}", target, lvl));
    }

    if let Ok(env) = std::env::var(EnvFilter::DEFAULT_ENV) {
        directives.extend(
            env.split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        );
    }
    directives
}

fn build_env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    let filter_str = filter_directives(settings).join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global subscriber. Logs go to stderr so that machine-readable
/// command output on stdout stays clean.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let console_layer = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(build_env_filter(settings)?)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(build_env_filter(settings)?)
            .boxed(),
    };

    let otel_layer = match &settings.otlp_endpoint {
        Some(endpoint) => otlp_layer(&settings.service_name, endpoint)?,
        None => Box::new(tracing_subscriber::layer::Identity::new()),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!(
        level = %settings.level,
        format = ?settings.format,
        "Logging initialized"
    );
    Ok(())
}

/// OTLP span export layer; an identity layer without the `telemetry` feature.
pub fn otlp_layer<S>(service_name: &str, endpoint: &str) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span> + Send + Sync,
{
    #[cfg(feature = "telemetry")]
    {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()?;

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
            .with_resource(Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]))
            .build();

        let tracer = provider.tracer(service_name.to_string());
        opentelemetry::global::set_tracer_provider(provider);

        Ok(Box::new(OpenTelemetryLayer::new(tracer)))
    }
    #[cfg(not(feature = "telemetry"))]
    {
        tracing::debug!(
            service_name,
            endpoint,
            "OTLP endpoint configured but the telemetry feature is disabled"
        );
        Ok(Box::new(tracing_subscriber::layer::Identity::new()))
    }
}

/// Flush pending spans before exit.
pub fn shutdown_logging() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
