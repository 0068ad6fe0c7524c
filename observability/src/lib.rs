pub mod conf;
pub mod metrics;
pub mod metrics_names;
pub mod telemetry;
