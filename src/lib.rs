//! # threadprobe
//!
//! Lightweight per-thread timing probes.
//!
//! A probe measures one named interval. Probes nest: each thread keeps its own
//! stack of open probes, and every probe remembers the probe it was nested in.
//! When a probe ends it reports elapsed time relative to itself, its parent and
//! the root of its chain, and can emit one structured log line.
//!
//! ## Quick Start
//!
//! ```rust
//! use threadprobe::{begin_probe, nest_probe, probe_count};
//!
//! let request = begin_probe("handle_request")?;
//!
//! let lookup = nest_probe("db_lookup")?;
//! // ... work ...
//! lookup.end()?.report_log();
//!
//! request.end()?.report_log();
//! assert_eq!(probe_count(), 0);
//! # Ok::<(), threadprobe::ProbeError>(())
//! ```
//!
//! Ending an outer probe also removes any inner probes that were never ended,
//! so an early return or panic between `nest_probe` and `end` does not leave
//! the stack corrupted. Scoped guards end probes on every exit path:
//!
//! ```rust
//! use threadprobe::{measure, probed, scoped};
//!
//! #[probed]
//! fn parse(input: &str) -> usize {
//!     input.len()
//! }
//!
//! let _outer = scoped("batch")?;
//! let n = measure("parse_all", || parse("abc"))?;
//! assert_eq!(n, 3);
//! # Ok::<(), threadprobe::ProbeError>(())
//! ```
//!
//! ## Configuration
//!
//! Host id, run id, unit base and log level come from [`ProbeConfig`], read from
//! `PROBE_*` environment variables on first use or installed with [`init`].

mod config;
mod duration;
mod error;
mod identity;
mod probe;
mod record;
mod report;
mod stack;

pub use config::ProbeConfig;
pub use duration::{
    format_timestamp, format_timestamp_in, Breakdown, Interval, MAX_UNIT_BASE, TIMESTAMP_FORMAT,
};
pub use error::{ProbeError, Result};
pub use identity::{init, settings, ProcessIdentity, Settings, FALLBACK_HOST_ID};
pub use probe::{current_thread_id, Bracket, Probe, COMPOSITE_ID_SEPARATOR};
pub use record::ProbeRecord;
pub use report::{JsonLinesReporter, LogReporter, MultiReporter, Reporter, LOG_TARGET};
pub use stack::{
    begin_probe, begin_scoped, find_probe, measure, nest_probe, probe_count, scoped, top_probe,
    ProbeGuard, ProbeStack,
};

pub use threadprobe_macros::probed;

// Used by code generated from `#[probed]`.
#[doc(hidden)]
pub mod __private {
    use crate::stack::{begin_scoped, scoped, ProbeGuard};

    pub fn enter(marker: &'static str, begin: bool) -> Option<ProbeGuard> {
        let guard = if begin {
            begin_scoped(marker)
        } else {
            scoped(marker)
        };
        match guard {
            Ok(g) => Some(g),
            Err(e) => {
                log::warn!("failed to start probe '{}': {}", marker, e);
                None
            }
        }
    }
}
