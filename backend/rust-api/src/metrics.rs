use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::QuizError;

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Model Metrics (Gemini)
    pub static ref MODEL_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "model_requests_total",
        "Total number of language model requests",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref MODEL_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "model_request_duration_seconds",
        "Language model request duration in seconds",
        &["operation"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Total number of quiz sessions",
        &["status"]
    )
    .unwrap();

    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of quiz sessions currently held in memory"
    )
    .unwrap();

    pub static ref QUESTIONS_GENERATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "questions_generated_total",
        "Total number of generated tests",
        &["question_type"]
    )
    .unwrap();

    pub static ref STALE_RESULTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "stale_results_total",
        "Model results discarded because the session moved on",
        &["operation"]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a language model call with metrics
pub async fn track_model_call<F, T>(operation: &str, future: F) -> Result<T, QuizError>
where
    F: std::future::Future<Output = Result<T, QuizError>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = match &result {
        Ok(_) => "success",
        Err(QuizError::Configuration(_)) => "unconfigured",
        Err(_) => "error",
    };

    MODEL_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    MODEL_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Just verify that all metrics are properly registered
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
    }

    #[tokio::test]
    async fn test_track_model_call_labels_outcome() {
        let before = MODEL_REQUESTS_TOTAL
            .with_label_values(&["unit", "unconfigured"])
            .get();
        let result: Result<(), QuizError> =
            track_model_call("unit", async { Err(QuizError::configuration("no key")) }).await;
        assert!(result.is_err());
        assert_eq!(
            MODEL_REQUESTS_TOTAL
                .with_label_values(&["unit", "unconfigured"])
                .get(),
            before + 1
        );
    }
}
