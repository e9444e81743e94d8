//! Structured probe records.

use crate::duration::{format_timestamp, Interval};
use crate::probe::Probe;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fields emitted for one probe, in log-line order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub host_id: String,
    pub run_id: String,
    pub probe_id: String,
    /// Thread that began the probe.
    pub thread_id: u64,
    pub thread_name: String,
    pub marker: String,
    /// `yyyyMMddHHmmss,SSS`
    pub begin_time: String,
    /// Empty while the probe is open.
    pub end_time: String,
    pub elapsed: i64,
    pub elapsed_since_outer: i64,
    pub elapsed_since_root: i64,
    /// Tab-joined ids from the root probe down.
    pub composite_probe_id: String,
}

impl ProbeRecord {
    /// Snapshot `probe`, expressing elapsed values in milliseconds of `unit_base`.
    pub fn capture(probe: &Probe, unit_base: i64) -> Self {
        let millis = |raw: i64| Interval::with_unit_base(raw, unit_base).in_millis();
        let begin = probe.begin_bracket();
        Self {
            host_id: probe.host_id().to_string(),
            run_id: probe.run_id().to_string(),
            probe_id: probe.id().to_string(),
            thread_id: begin.thread_id,
            thread_name: begin.thread_name.clone(),
            marker: probe.marker().to_string(),
            begin_time: format_timestamp(begin.timestamp),
            end_time: probe
                .end_bracket()
                .map(|end| format_timestamp(end.timestamp))
                .unwrap_or_default(),
            elapsed: millis(probe.elapsed()),
            elapsed_since_outer: millis(probe.elapsed_since_outer()),
            elapsed_since_root: millis(probe.elapsed_since_root()),
            composite_probe_id: probe.composite_id().to_string(),
        }
    }

    /// The tab-separated log line, `Probe={...}`.
    pub fn to_log_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProbeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Probe={{{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}}}",
            self.host_id,
            self.run_id,
            self.probe_id,
            self.thread_id,
            self.thread_name,
            self.marker,
            self.begin_time,
            self.end_time,
            self.elapsed,
            self.elapsed_since_outer,
            self.elapsed_since_root,
            self.composite_probe_id,
        )
    }
}
