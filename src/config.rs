//! Configuration for probe identity and reporting.

use crate::duration::{DEFAULT_UNIT_BASE, MAX_UNIT_BASE};
use log::Level;
use std::str::FromStr;

/// Configuration for probes and the default log reporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Host identifier to report instead of the resolved host name.
    pub host_id: Option<String>,
    /// Run identifier to report instead of a generated one.
    pub run_id: Option<String>,
    /// Stored units per millisecond for reported elapsed values.
    pub unit_base: i64,
    /// Level of emitted probe lines.
    pub level: Level,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host_id: None,
            run_id: None,
            unit_base: DEFAULT_UNIT_BASE,
            level: Level::Info,
        }
    }
}

impl ProbeConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config from environment variables.
    ///
    /// Supported variables:
    /// - `PROBE_HOST_ID`: host identifier override
    /// - `PROBE_RUN_ID`: run identifier override
    /// - `PROBE_UNIT_BASE`: stored units per millisecond (default: 1, at most `MAX_UNIT_BASE`)
    /// - `PROBE_LOG_LEVEL`: level of probe lines (default: info)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("PROBE_HOST_ID").filter(|v| !v.trim().is_empty()) {
            cfg.host_id = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("PROBE_RUN_ID").filter(|v| !v.trim().is_empty()) {
            cfg.run_id = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("PROBE_UNIT_BASE") {
            if let Ok(n) = v.trim().parse::<i64>() {
                if (1..=MAX_UNIT_BASE).contains(&n) {
                    cfg.unit_base = n;
                }
            }
        }
        if let Some(v) = lookup("PROBE_LOG_LEVEL") {
            if let Ok(level) = Level::from_str(v.trim()) {
                cfg.level = level;
            }
        }

        cfg
    }

    /// Set the host identifier.
    pub fn host_id(mut self, id: impl Into<String>) -> Self {
        self.host_id = Some(id.into());
        self
    }

    /// Set the run identifier.
    pub fn run_id(mut self, id: impl Into<String>) -> Self {
        self.run_id = Some(id.into());
        self
    }

    /// Set the unit base. Values outside `1..=MAX_UNIT_BASE` are ignored.
    pub fn unit_base(mut self, base: i64) -> Self {
        if (1..=MAX_UNIT_BASE).contains(&base) {
            self.unit_base = base;
        }
        self
    }

    /// Set the level of emitted probe lines.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}
