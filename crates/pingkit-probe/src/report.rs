//! Per-probe records and per-destination summaries for console and JSON output.

use std::fmt;

use serde::Serialize;

use crate::result::ProbeResult;

/// One probe, flattened for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    pub destination: String,
    /// 1-based position in the series.
    pub seq: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<f64>,
}

impl ProbeRecord {
    pub fn new(destination: &str, seq: usize, result: &ProbeResult) -> Self {
        let status = match result {
            ProbeResult::Delay(_) => "reply",
            ProbeResult::Timeout => "timeout",
            ProbeResult::ResolutionFailure => "unresolved",
        };
        Self {
            destination: destination.to_string(),
            seq,
            status,
            delay_ms: result.delay().map(|d| round_ms(d.as_secs_f64() * 1000.0)),
        }
    }
}

/// Round-trip statistics over a series of probes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeSummary {
    /// Probes that actually went out (unresolved ones never did).
    pub sent: usize,
    pub received: usize,
    pub timeouts: usize,
    pub unresolved: usize,
    pub loss_percent: f64,
    pub min_ms: Option<f64>,
    pub avg_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl ProbeSummary {
    pub fn from_results(results: &[ProbeResult]) -> Self {
        let delays: Vec<f64> = results
            .iter()
            .filter_map(ProbeResult::delay)
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        let timeouts = results.iter().filter(|r| r.is_timeout()).count();
        let unresolved = results
            .iter()
            .filter(|r| matches!(r, ProbeResult::ResolutionFailure))
            .count();

        let received = delays.len();
        let sent = received + timeouts;
        let loss_percent = if sent == 0 {
            0.0
        } else {
            round_ms(timeouts as f64 * 100.0 / sent as f64)
        };

        let (min_ms, avg_ms, max_ms) = if delays.is_empty() {
            (None, None, None)
        } else {
            let min = delays.iter().copied().fold(f64::INFINITY, f64::min);
            let max = delays.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = delays.iter().sum::<f64>() / received as f64;
            (Some(round_ms(min)), Some(round_ms(avg)), Some(round_ms(max)))
        };

        Self {
            sent,
            received,
            timeouts,
            unresolved,
            loss_percent,
            min_ms,
            avg_ms,
            max_ms,
        }
    }
}

impl fmt::Display for ProbeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent, {} received, {}% loss",
            self.sent, self.received, self.loss_percent
        )?;
        if self.unresolved > 0 {
            write!(f, ", {} unresolved", self.unresolved)?;
        }
        if let (Some(min), Some(avg), Some(max)) = (self.min_ms, self.avg_ms, self.max_ms) {
            write!(f, "\nrtt min/avg/max = {min}/{avg}/{max} ms")?;
        }
        Ok(())
    }
}

/// Four decimal places, matching the console output.
fn round_ms(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
