//! Logging and trace export.
//!
//! Logs go to stderr so stdout only carries command results. Spans are also
//! exported over OTLP when an exporter endpoint is configured in the
//! environment.

use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::ValueEnum;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{trace::SdkTracerProvider, Resource};
use tracing::Level;
use tracing_subscriber::{
	layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

const SERVICE_NAME: &str = "kclone";

/// Not exported by opentelemetry_sdk.
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
	/// Pretty on a terminal, JSON otherwise.
	#[default]
	Auto,
	Pretty,
	Json,
}

impl LogFormat {
	fn is_pretty(self) -> bool {
		match self {
			LogFormat::Auto => std::io::stderr().is_terminal(),
			LogFormat::Pretty => true,
			LogFormat::Json => false,
		}
	}
}

/// Keeps the trace exporter alive. Pending spans are flushed on drop.
#[must_use = "dropping the guard stops trace export"]
pub struct TelemetryGuard {
	tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
	fn drop(&mut self) {
		if let Some(provider) = self.tracer_provider.take() {
			if let Err(e) = provider.shutdown() {
				eprintln!("Failed to shutdown tracer provider: {e}");
			}
		}
	}
}

fn otlp_configured() -> bool {
	[
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_ENDPOINT,
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
	]
	.iter()
	.any(|var| std::env::var_os(var).is_some())
}

/// `level` wins over `RUST_LOG`, which wins over `info`.
fn filter(level: Option<Level>) -> EnvFilter {
	match level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::INFO.into())
			.from_env_lossy(),
	}
}

fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
	S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
	let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
	if format.is_pretty() {
		layer.pretty().boxed()
	} else {
		layer.json().boxed()
	}
}

/// Install the global subscriber.
pub fn init(level: Option<Level>, format: LogFormat) -> Result<TelemetryGuard> {
	let tracer_provider = if otlp_configured() {
		Some(tracer_provider().context("configuring OTLP trace export")?)
	} else {
		None
	};

	let otel_layer = tracer_provider.as_ref().map(|provider| {
		tracing_opentelemetry::layer()
			.with_error_records_to_exceptions(true)
			.with_tracer(provider.tracer(SERVICE_NAME))
	});

	tracing_subscriber::registry()
		.with(filter(level))
		.with(fmt_layer(format))
		.with(otel_layer)
		.try_init()
		.context("installing the tracing subscriber")?;

	Ok(TelemetryGuard { tracer_provider })
}

fn tracer_provider() -> Result<SdkTracerProvider> {
	// Resource::builder() picks up OTEL_SERVICE_NAME and OTEL_RESOURCE_ATTRIBUTES.
	let mut resource = Resource::builder();
	if std::env::var_os(OTEL_SERVICE_NAME).is_none() {
		resource = resource.with_service_name(SERVICE_NAME);
	}

	let protocol = std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL)
		.unwrap_or_else(|_| opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL_DEFAULT.to_string());
	let exporter = if protocol == "grpc" {
		opentelemetry_otlp::SpanExporter::builder()
			.with_tonic()
			.build()?
	} else {
		opentelemetry_otlp::SpanExporter::builder()
			.with_http()
			.build()?
	};

	let provider = SdkTracerProvider::builder()
		.with_resource(resource.build())
		.with_batch_exporter(exporter)
		.build();
	opentelemetry::global::set_tracer_provider(provider.clone());
	Ok(provider)
}
