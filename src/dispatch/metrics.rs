use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

use crate::domain::CapabilityKind;

/// How an invocation ended, as recorded in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success,
    /// The client answered with an is_error result
    ErrorResult,
    Timeout,
    TransportError,
}

impl InvocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationOutcome::Success => "success",
            InvocationOutcome::ErrorResult => "error_result",
            InvocationOutcome::Timeout => "timeout",
            InvocationOutcome::TransportError => "transport_error",
        }
    }
}

pub struct DispatchMetrics {
    registry: Registry,

    pub invocations_total: CounterVec,
    pub invocation_duration: HistogramVec,
}

impl DispatchMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let invocations_total = CounterVec::new(
            Opts::new(
                "switchyard_invocations_total",
                "Total number of capability invocations",
            ),
            &["kind", "client", "outcome"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let invocation_duration = HistogramVec::new(
            HistogramOpts::new(
                "switchyard_invocation_duration_seconds",
                "Capability invocation duration in seconds",
            ),
            &["kind", "client"],
        )?;
        registry.register(Box::new(invocation_duration.clone()))?;

        Ok(Self {
            registry,
            invocations_total,
            invocation_duration,
        })
    }

    pub fn observe(
        &self,
        kind: CapabilityKind,
        client: &str,
        outcome: InvocationOutcome,
        elapsed: Duration,
    ) {
        self.invocations_total
            .with_label_values(&[kind.as_str(), client, outcome.as_str()])
            .inc();
        self.invocation_duration
            .with_label_values(&[kind.as_str(), client])
            .observe(elapsed.as_secs_f64());
    }

    /// Invocation count for one label set.
    pub fn invocation_count(&self, kind: CapabilityKind, client: &str, outcome: InvocationOutcome) -> u64 {
        self.invocations_total
            .with_label_values(&[kind.as_str(), client, outcome.as_str()])
            .get() as u64
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        assert!(DispatchMetrics::new().is_ok());
    }

    #[test]
    fn test_metrics_encoding() {
        let metrics = DispatchMetrics::new().unwrap();
        metrics.observe(
            CapabilityKind::Tool,
            "planning",
            InvocationOutcome::Success,
            Duration::from_millis(12),
        );

        let text = metrics.encode().unwrap();
        assert!(text.contains("switchyard_invocations_total"));
        assert!(text.contains("outcome=\"success\""));
        assert!(text.contains("switchyard_invocation_duration_seconds"));
        assert_eq!(
            metrics.invocation_count(CapabilityKind::Tool, "planning", InvocationOutcome::Success),
            1
        );
    }

    #[test]
    fn test_separate_instances_do_not_share_state() {
        let a = DispatchMetrics::new().unwrap();
        let b = DispatchMetrics::new().unwrap();
        a.observe(
            CapabilityKind::Prompt,
            "c",
            InvocationOutcome::Timeout,
            Duration::from_millis(1),
        );
        assert_eq!(
            b.invocation_count(CapabilityKind::Prompt, "c", InvocationOutcome::Timeout),
            0
        );
    }
}
