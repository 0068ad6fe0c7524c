use crate::metrics_names::{TAG_ERROR, TAG_OPERATION};
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::{global, KeyValue};
use std::borrow::Cow;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error types for metrics operations
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
}

/// Type-safe wrapper for metric tags
#[derive(Debug, Clone)]
pub struct MetricTag {
    key: &'static str,
    value: String,
}

impl MetricTag {
    pub fn new(key: &'static str, value: impl Into<String>) -> Result<Self, MetricError> {
        let value = value.into();
        if key.is_empty() {
            return Err(MetricError::InvalidTag("Tag key cannot be empty".into()));
        }
        if value.is_empty() {
            return Err(MetricError::InvalidTag("Tag value cannot be empty".into()));
        }
        Ok(Self { key, value })
    }

    fn into_key_value(self) -> KeyValue {
        KeyValue::new(self.key, self.value)
    }
}

/// Tagged metric wrapper that automatically handles labels
#[derive(Debug, Clone)]
pub struct TaggedMetric<T> {
    metric: T,
    default_tags: Vec<MetricTag>,
}

impl<T> TaggedMetric<T> {
    fn new(metric: T, name: &'static str) -> Self {
        Self {
            metric,
            default_tags: vec![MetricTag {
                key: "name",
                value: name.to_string(),
            }],
        }
    }

    fn with_tags(&self, tags: &[MetricTag]) -> Vec<KeyValue> {
        self.default_tags
            .iter()
            .cloned()
            .chain(tags.iter().cloned())
            .map(|tag| tag.into_key_value())
            .collect()
    }
}

/// Metrics for the FHE client operations
#[derive(Debug, Clone)]
pub struct ClientMetrics {
    request_counter: TaggedMetric<Counter<u64>>,
    error_counter: TaggedMetric<Counter<u64>>,
    retry_counter: TaggedMetric<Counter<u64>>,
    duration_histogram: TaggedMetric<Histogram<f64>>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        let meter = global::meter("neural_sync");

        let operations: Cow<'static, str> = format!("{}_operations", config.prefix).into();
        let operation_errors: Cow<'static, str> =
            format!("{}_operation_errors", config.prefix).into();
        let operation_retries: Cow<'static, str> =
            format!("{}_operation_retries", config.prefix).into();
        let duration_metric: Cow<'static, str> =
            format!("{}_operation_duration_ms", config.prefix).into();

        let request_counter = meter
            .u64_counter(operations)
            .with_description("Total number of client operations started")
            .with_unit("operations")
            .build();
        //Increment by 0 just to make sure the counter is exported
        request_counter.add(0, &[]);

        let error_counter = meter
            .u64_counter(operation_errors)
            .with_description("Total number of client operation errors")
            .with_unit("errors")
            .build();
        error_counter.add(0, &[]);

        let retry_counter = meter
            .u64_counter(operation_retries)
            .with_description("Total number of retried remote calls")
            .with_unit("retries")
            .build();
        retry_counter.add(0, &[]);

        let duration_histogram = meter
            .f64_histogram(duration_metric)
            .with_description("Duration of client operations")
            .with_unit("milliseconds")
            .build();
        //Record 0 just to make sure the histogram is exported
        duration_histogram.record(0.0, &[]);

        Self {
            request_counter: TaggedMetric::new(request_counter, "operations"),
            error_counter: TaggedMetric::new(error_counter, "errors"),
            retry_counter: TaggedMetric::new(retry_counter, "retries"),
            duration_histogram: TaggedMetric::new(duration_histogram, "duration"),
        }
    }

    fn create_operation_tag(operation: impl Into<String>) -> Result<MetricTag, MetricError> {
        MetricTag::new(TAG_OPERATION, operation)
    }

    pub fn increment_request_counter(
        &self,
        operation: impl Into<String>,
    ) -> Result<(), MetricError> {
        let tags = vec![Self::create_operation_tag(operation)?];
        self.request_counter
            .metric
            .add(1, &self.request_counter.with_tags(&tags));
        Ok(())
    }

    pub fn increment_error_counter(
        &self,
        operation: impl Into<String>,
        error: impl Into<String>,
    ) -> Result<(), MetricError> {
        let mut tags = vec![Self::create_operation_tag(operation)?];
        tags.push(MetricTag::new(TAG_ERROR, error)?);
        self.error_counter
            .metric
            .add(1, &self.error_counter.with_tags(&tags));
        Ok(())
    }

    pub fn increment_retry_counter(
        &self,
        operation: impl Into<String>,
    ) -> Result<(), MetricError> {
        let tags = vec![Self::create_operation_tag(operation)?];
        self.retry_counter
            .metric
            .add(1, &self.retry_counter.with_tags(&tags));
        Ok(())
    }

    fn record_duration_with_tags(
        &self,
        operation: impl AsRef<str>,
        duration: Duration,
        extra_tags: &[(&'static str, String)],
    ) -> Result<(), MetricError> {
        let mut tags = vec![Self::create_operation_tag(operation.as_ref())?];
        for (key, value) in extra_tags {
            tags.push(MetricTag::new(key, value)?);
        }

        self.duration_histogram.metric.record(
            duration.as_millis() as f64,
            &self.duration_histogram.with_tags(&tags),
        );
        Ok(())
    }

    /// Start timing an operation, the duration is recorded when the guard drops
    pub fn time_operation(&self, operation: impl Into<String>) -> DurationGuard<'_> {
        DurationGuard {
            metrics: self,
            operation: operation.into(),
            tags: Vec::new(),
            start: Instant::now(),
            record_on_drop: true,
        }
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that records operation duration when dropped
#[derive(Debug)]
pub struct DurationGuard<'a> {
    metrics: &'a ClientMetrics,
    operation: String,
    tags: Vec<(&'static str, String)>,
    start: Instant,
    record_on_drop: bool,
}

impl DurationGuard<'_> {
    /// Force recording of the current duration and consume the guard
    pub fn record_now(mut self) -> Duration {
        let duration = self.start.elapsed();
        self.record(duration);
        self.record_on_drop = false;
        duration
    }

    /// Add a single tag
    pub fn tag(&mut self, key: &'static str, value: impl Into<String>) -> Result<(), MetricError> {
        let value = value.into();
        MetricTag::new(key, value.clone())?;
        self.tags.push((key, value));
        Ok(())
    }

    fn record(&self, duration: Duration) {
        if let Err(e) = self
            .metrics
            .record_duration_with_tags(&self.operation, duration, &self.tags)
        {
            tracing::warn!("Failed to record duration for {}: {e}", self.operation);
        }
    }
}

impl Drop for DurationGuard<'_> {
    fn drop(&mut self) {
        if self.record_on_drop {
            self.record(self.start.elapsed());
        }
    }
}

// Global metrics instance
lazy_static::lazy_static! {
    pub static ref METRICS: ClientMetrics = ClientMetrics::new();
}

/// Configuration for metrics initialization
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: "neural_sync".to_string(),
        }
    }
}
