use crate::conf::{ExecutionEnvironment, TelemetryConfig, ENVIRONMENT};
use anyhow::Context;
use std::sync::Once;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, Layer};

static INIT_TEST_LOG: Once = Once::new();

fn env_filter(settings: &TelemetryConfig) -> EnvFilter {
    match *ENVIRONMENT {
        ExecutionEnvironment::Integration | ExecutionEnvironment::Local => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!(
                    "{},hyper=warn,reqwest=warn,rustls=warn",
                    settings.log_filter()
                ))
            })
        }
        _ => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(settings.log_filter())),
    }
}

/// Installs the global tracing subscriber for this process.
///
/// Fails if a global subscriber was already installed.
pub fn init_tracing(settings: &TelemetryConfig) -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::NONE);

    // json and plain layers have different types, box them to share one registry
    let fmt_layer = if settings.json_logs() {
        fmt_layer.json().with_current_span(true).boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter(settings))
        .try_init()
        .context("Failed to initialize tracing")?;

    info!(
        service = settings.service_name(),
        environment = %*ENVIRONMENT,
        "Tracing initialized"
    );
    Ok(())
}

/// Idempotent logging setup for tests: writes through the test harness
/// writer so output is captured per test.
pub fn init_testing() {
    INIT_TEST_LOG.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .try_init();
    });
}
