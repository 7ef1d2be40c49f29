//! Subscriber setup for the pgbind CLI
//!
//! Console output goes to stderr so `pgbind dsn` keeps stdout clean. With
//! `--otel` (and the `telemetry` feature) the same spans are exported over
//! OTLP, including the `connect` span carrying host, port and dbname.
//! `OTEL_EXPORTER_OTLP_ENDPOINT` overrides the default collector address.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the span exporter alive; pending spans are flushed on drop.
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    provider: Option<opentelemetry_sdk::trace::TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        if let Some(provider) = self.provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to flush spans: {err}");
            }
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `debug`.
pub fn init(debug: bool, otel: bool) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    let console = tracing_subscriber::fmt::layer()
        .with_target(debug)
        .with_writer(std::io::stderr)
        .compact();

    let registry = tracing_subscriber::registry().with(filter).with(console);

    #[cfg(feature = "telemetry")]
    {
        let provider = if otel { Some(otlp_provider()?) } else { None };
        registry
            .with(provider.as_ref().map(otlp_layer))
            .try_init()
            .map_err(|err| anyhow!(err))?;
        Ok(TelemetryGuard { provider })
    }

    #[cfg(not(feature = "telemetry"))]
    {
        registry.try_init().map_err(|err| anyhow!(err))?;
        if otel {
            tracing::warn!("--otel ignored: built without the telemetry feature");
        }
        Ok(TelemetryGuard::default())
    }
}

#[cfg(feature = "telemetry")]
fn otlp_provider() -> Result<opentelemetry_sdk::trace::TracerProvider> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, Resource};

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|err| anyhow!("OTLP exporter: {err}"))?;

    Ok(opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new([
            KeyValue::new("service.name", "pgbind"),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build())
}

#[cfg(feature = "telemetry")]
fn otlp_layer<S>(
    provider: &opentelemetry_sdk::trace::TracerProvider,
) -> tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider as _;

    tracing_opentelemetry::layer().with_tracer(provider.tracer("pgbind"))
}
