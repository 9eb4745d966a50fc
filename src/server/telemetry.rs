use super::ServerError;
use crate::config::RelayConfig;
use opentelemetry::sdk::propagation::TraceContextPropagator;
use opentelemetry::sdk::{
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use opentelemetry::{global, KeyValue};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const SERVICE_NAME: &str = "konnekt-relay";
const DEFAULT_FILTER: &str = "konnekt_relay=debug,tower_http=debug,axum::rejection=trace,warn";

/// Install the global subscriber: JSON logs, plus Jaeger export when
/// telemetry is enabled.
pub fn init_telemetry(config: &RelayConfig) -> Result<(), ServerError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .json();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if config.enable_telemetry {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let tracer = opentelemetry_jaeger::new_collector_pipeline()
            .with_service_name(SERVICE_NAME)
            .with_endpoint(&config.jaeger_endpoint)
            .with_isahc()
            .with_trace_config(
                trace::config()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_id_generator(RandomIdGenerator::default())
                    .with_max_events_per_span(64)
                    .with_max_attributes_per_span(16)
                    .with_resource(Resource::new(vec![
                        KeyValue::new("service.name", SERVICE_NAME),
                        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    ])),
            )
            .with_timeout(std::time::Duration::from_secs(2))
            .install_batch(opentelemetry::runtime::Tokio)
            .map_err(|e| ServerError::Telemetry(e.to_string()))?;

        let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .with(telemetry)
            .try_init()
            .map_err(|e| ServerError::Telemetry(e.to_string()))?;

        tracing::info!(endpoint = %config.jaeger_endpoint, "Telemetry initialized");
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ServerError::Telemetry(e.to_string()))?;

        tracing::info!("Telemetry disabled");
    }

    Ok(())
}

pub fn shutdown_telemetry(config: &RelayConfig) {
    if config.enable_telemetry {
        opentelemetry::global::shutdown_tracer_provider();
    }
}
