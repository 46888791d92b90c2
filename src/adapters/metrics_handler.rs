use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::agents::core::{DispatchStatus, TurnReport};

/// Function label for calls to names that are not registered
pub const UNKNOWN_FUNCTION_LABEL: &str = "unknown";

pub struct MetricsCollector {
    registry: Registry,

    // Turn metrics
    pub turns_total: CounterVec,
    pub turn_duration: HistogramVec,
    pub turn_iterations: HistogramVec,
    pub turns_in_flight: Gauge,

    // Tool call metrics
    pub tool_calls_total: CounterVec,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let turns_total = CounterVec::new(
            Opts::new("hestia_turns_total", "Total number of conversation turns"),
            &["outcome"],
        )?;
        registry.register(Box::new(turns_total.clone()))?;

        let turn_duration = HistogramVec::new(
            HistogramOpts::new("hestia_turn_duration_seconds", "Turn duration in seconds")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(turn_duration.clone()))?;

        let turn_iterations = HistogramVec::new(
            HistogramOpts::new("hestia_turn_iterations", "Run state-machine steps per turn")
                .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(turn_iterations.clone()))?;

        let turns_in_flight = Gauge::new(
            "hestia_turns_in_flight",
            "Number of turns currently being processed",
        )?;
        registry.register(Box::new(turns_in_flight.clone()))?;

        let tool_calls_total = CounterVec::new(
            Opts::new("hestia_tool_calls_total", "Total tool calls requested by the assistant"),
            &["function", "status"],
        )?;
        registry.register(Box::new(tool_calls_total.clone()))?;

        Ok(Self {
            registry,
            turns_total,
            turn_duration,
            turn_iterations,
            turns_in_flight,
            tool_calls_total,
        })
    }

    /// Count a turn as in flight until the returned guard is dropped
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.turns_in_flight.inc();
        InFlightGuard(self.turns_in_flight.clone())
    }

    /// Record a finished turn
    pub fn record_turn(&self, report: &TurnReport, elapsed: Duration) {
        let outcome = report.outcome.label();
        self.turns_total.with_label_values(&[outcome]).inc();
        self.turn_duration
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());
        self.turn_iterations
            .with_label_values(&[outcome])
            .observe(f64::from(report.iterations));

        for dispatch in &report.dispatches {
            // The assistant may invent names; keep them out of the label set
            let function = match dispatch.status {
                DispatchStatus::NotFound => UNKNOWN_FUNCTION_LABEL,
                _ => dispatch.function.as_str(),
            };
            self.tool_calls_total
                .with_label_values(&[function, dispatch.status.label()])
                .inc();
        }
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Decrements the in-flight gauge on drop
pub struct InFlightGuard(Gauge);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn metrics(&self) -> String {
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::core::{DispatchRecord, DispatchStatus, TurnOutcome};

    fn report(outcome: TurnOutcome) -> TurnReport {
        let mut report = TurnReport::new(uuid::Uuid::new_v4(), "main");
        report.outcome = outcome;
        report.iterations = 2;
        report.dispatches = vec![
            DispatchRecord {
                call_id: "call_1".into(),
                function: "control_lights".into(),
                iteration: 1,
                status: DispatchStatus::Dispatched,
            },
            DispatchRecord {
                call_id: "call_2".into(),
                function: "delete_universe".into(),
                iteration: 1,
                status: DispatchStatus::NotFound,
            },
        ];
        report
    }

    #[test]
    fn test_metrics_collector_creation() {
        assert!(MetricsCollector::new().is_ok());
    }

    #[test]
    fn test_record_turn() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_turn(&report(TurnOutcome::Answered("Done.".into())), Duration::from_millis(1200));

        assert_eq!(collector.turns_total.with_label_values(&["answered"]).get(), 1.0);
        assert_eq!(
            collector
                .tool_calls_total
                .with_label_values(&["unknown", "not_found"])
                .get(),
            1.0
        );
        assert_eq!(
            collector
                .tool_calls_total
                .with_label_values(&["control_lights", "dispatched"])
                .get(),
            1.0
        );

        let text = collector.encode().unwrap();
        assert!(!text.contains("delete_universe"));
        assert!(text.contains("hestia_turns_total"));
        assert!(text.contains("hestia_turn_iterations"));
    }

    #[test]
    fn test_in_flight_guard_decrements_on_drop() {
        let collector = MetricsCollector::new().unwrap();
        let first = collector.track_in_flight();
        let second = collector.track_in_flight();
        assert_eq!(collector.turns_in_flight.get(), 2.0);

        drop(first);
        assert_eq!(collector.turns_in_flight.get(), 1.0);
        drop(second);
        assert_eq!(collector.turns_in_flight.get(), 0.0);
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let handler = MetricsHandler::new(collector.clone());

        collector.record_turn(&report(TurnOutcome::Exhausted { iterations: 20 }), Duration::from_secs(3));

        let metrics = handler.metrics().await;
        assert!(metrics.contains("outcome=\"exhausted\""));
    }
}
