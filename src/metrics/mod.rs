//! Per-agent operational metrics
//!
//! Counters and O(1) running averages updated from every terminal outcome.
//! Averages use `new = (old * (n - 1) + sample) / n` with `n` the
//! post-increment success count, so no per-request history is retained and
//! memory stays flat under sustained traffic. Failures bump only the
//! failure counters; admission rejections bump only their dedicated
//! rejection counters, keeping `total_requests == succeeded + failed` over
//! executed requests.
//!
//! Each update also feeds the ambient `metrics` facade so an embedding
//! process can attach whatever recorder it already runs.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::errors::Result;

/// Running counters and averages for one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Executed requests (succeeded + failed); rejections excluded
    pub total_requests: u64,

    /// Requests that produced a response
    pub succeeded: u64,

    /// Requests that failed during execution (timeout or executor error)
    pub failed: u64,

    /// Running average execution time over successful requests (ms)
    pub average_duration_ms: f64,

    /// Running average confidence over successful requests
    pub average_confidence: f64,

    /// Accumulated resource units (e.g. tokens) over successful requests
    pub total_resource_units: u64,

    /// Hard rejections from the sliding-window rate limit
    pub rate_limit_rejections: u64,

    /// Rejections from the concurrency cap with queuing disabled
    pub concurrency_rejections: u64,
}

impl AgentMetrics {
    /// Record a successful execution
    pub(crate) fn record_success(
        &mut self,
        agent_id: &str,
        duration_ms: u64,
        confidence: f64,
        resource_units: Option<u64>,
    ) {
        self.total_requests += 1;
        self.succeeded += 1;

        let n = self.succeeded as f64;
        self.average_duration_ms =
            (self.average_duration_ms * (n - 1.0) + duration_ms as f64) / n;
        self.average_confidence = (self.average_confidence * (n - 1.0) + confidence) / n;
        self.total_resource_units += resource_units.unwrap_or(0);

        counter!(
            "agent_dispatch_requests_total",
            "agent" => agent_id.to_owned(),
            "outcome" => "success"
        )
        .increment(1);
        histogram!("agent_dispatch_duration_ms", "agent" => agent_id.to_owned())
            .record(duration_ms as f64);
    }

    /// Record a failed execution (timeout or executor error)
    pub(crate) fn record_failure(&mut self, agent_id: &str, kind: &'static str) {
        self.total_requests += 1;
        self.failed += 1;

        counter!(
            "agent_dispatch_requests_total",
            "agent" => agent_id.to_owned(),
            "outcome" => kind
        )
        .increment(1);
    }

    /// Record a hard rate-limit rejection
    pub(crate) fn record_rate_limit_rejection(&mut self, agent_id: &str) {
        self.rate_limit_rejections += 1;

        counter!(
            "agent_dispatch_rejections_total",
            "agent" => agent_id.to_owned(),
            "reason" => "rate_limit"
        )
        .increment(1);
    }

    /// Record a concurrency rejection (queuing disabled by the caller)
    pub(crate) fn record_concurrency_rejection(&mut self, agent_id: &str) {
        self.concurrency_rejections += 1;

        counter!(
            "agent_dispatch_rejections_total",
            "agent" => agent_id.to_owned(),
            "reason" => "concurrency"
        )
        .increment(1);
    }
}

/// Output format for metrics snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

const CSV_HEADER: &str = "agent_id,total_requests,succeeded,failed,average_duration_ms,\
average_confidence,total_resource_units,rate_limit_rejections,concurrency_rejections";

/// Serialize a metrics snapshot; pure formatting, no scheduling state
pub fn export_snapshot(
    snapshot: &BTreeMap<String, AgentMetrics>,
    format: ExportFormat,
) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(snapshot)?),
        ExportFormat::Csv => {
            let mut out = String::from(CSV_HEADER);
            out.push('\n');
            for (agent_id, m) in snapshot {
                out.push_str(&format!(
                    "{},{},{},{},{:.3},{:.3},{},{},{}\n",
                    agent_id,
                    m.total_requests,
                    m.succeeded,
                    m.failed,
                    m.average_duration_ms,
                    m.average_confidence,
                    m.total_resource_units,
                    m.rate_limit_rejections,
                    m.concurrency_rejections,
                ));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_running_averages() {
        let mut m = AgentMetrics::default();
        m.record_success("a1", 100, 0.8, Some(10));
        m.record_success("a1", 200, 0.6, Some(20));
        m.record_success("a1", 300, 1.0, None);

        assert_eq!(m.succeeded, 3);
        assert_eq!(m.total_requests, 3);
        assert!((m.average_duration_ms - 200.0).abs() < 1e-9);
        assert!((m.average_confidence - 0.8).abs() < 1e-9);
        assert_eq!(m.total_resource_units, 30);
    }

    #[test]
    fn test_failures_do_not_perturb_averages() {
        let mut m = AgentMetrics::default();
        m.record_success("a1", 100, 0.9, None);
        m.record_failure("a1", "timeout");
        m.record_failure("a1", "executor_error");

        assert_eq!(m.total_requests, 3);
        assert_eq!(m.succeeded, 1);
        assert_eq!(m.failed, 2);
        assert!((m.average_duration_ms - 100.0).abs() < 1e-9);
        assert!((m.average_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rejections_stay_out_of_totals() {
        let mut m = AgentMetrics::default();
        m.record_success("a1", 50, 0.9, None);
        m.record_rate_limit_rejection("a1");
        m.record_concurrency_rejection("a1");

        assert_eq!(m.total_requests, 1);
        assert_eq!(m.rate_limit_rejections, 1);
        assert_eq!(m.concurrency_rejections, 1);
        assert_eq!(m.total_requests, m.succeeded + m.failed);
    }

    #[test]
    fn test_export_json() {
        let mut snapshot = BTreeMap::new();
        let mut m = AgentMetrics::default();
        m.record_success("a1", 100, 0.9, Some(5));
        snapshot.insert("a1".to_string(), m);

        let json = export_snapshot(&snapshot, ExportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["a1"]["succeeded"], 1);
        assert_eq!(parsed["a1"]["total_resource_units"], 5);
    }

    #[test]
    fn test_export_csv() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("a1".to_string(), AgentMetrics::default());
        snapshot.insert("a2".to_string(), AgentMetrics::default());

        let csv = export_snapshot(&snapshot, ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("agent_id,total_requests"));
        assert!(lines[1].starts_with("a1,"));
        assert!(lines[2].starts_with("a2,"));
    }

    proptest! {
        /// The running average matches the arithmetic mean of all samples
        /// regardless of interleaved failures.
        #[test]
        fn prop_running_average_matches_mean(samples in proptest::collection::vec((1u64..10_000, 0.0f64..1.0), 1..50)) {
            let mut m = AgentMetrics::default();
            for (i, (duration, confidence)) in samples.iter().enumerate() {
                if i % 3 == 2 {
                    m.record_failure("a1", "timeout");
                }
                m.record_success("a1", *duration, *confidence, None);
            }

            let n = samples.len() as f64;
            let mean_duration: f64 = samples.iter().map(|(d, _)| *d as f64).sum::<f64>() / n;
            let mean_confidence: f64 = samples.iter().map(|(_, c)| *c).sum::<f64>() / n;

            prop_assert!((m.average_duration_ms - mean_duration).abs() < 1e-6 * mean_duration.max(1.0));
            prop_assert!((m.average_confidence - mean_confidence).abs() < 1e-9 + 1e-6 * mean_confidence);
            prop_assert_eq!(m.succeeded, samples.len() as u64);
            prop_assert_eq!(m.total_requests, m.succeeded + m.failed);
        }
    }
}
