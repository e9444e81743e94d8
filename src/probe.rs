//! Timed intervals with ancestry.
//!
//! A [`Probe`] captures a begin [`Bracket`] when it is created and an end
//! bracket when it is ended. Elapsed time can be read relative to the probe
//! itself, its immediate parent, or the root of its chain:
//!
//! ```rust
//! use threadprobe::Probe;
//!
//! let outer = Probe::new(None, "load")?;
//! let inner = Probe::new(Some(outer.clone()), "parse")?;
//! inner.end()?;
//! outer.end()?;
//!
//! assert!(inner.elapsed_since_root() >= inner.elapsed());
//! assert!(inner.composite_id().starts_with(outer.composite_id()));
//! # Ok::<(), threadprobe::ProbeError>(())
//! ```

use crate::error::{ProbeError, Result};
use crate::identity::{settings, ProcessIdentity};
use crate::record::ProbeRecord;
use crate::report::{LogReporter, Reporter};
use crate::stack::StackInner;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Separator between ids in a composite probe id.
pub const COMPOSITE_ID_SEPARATOR: char = '\t';

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique number of the calling thread.
///
/// Returns 0 once the thread's locals are being torn down.
pub fn current_thread_id() -> u64 {
    THREAD_ID.try_with(|id| *id).unwrap_or(0)
}

/// Reject empty markers.
pub(crate) fn validate_marker(marker: &str) -> Result<()> {
    if marker.is_empty() {
        return Err(ProbeError::InvalidMarker);
    }
    Ok(())
}

/// Point-in-time snapshot taken when a probe begins or ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bracket {
    /// Wall clock milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub thread_id: u64,
    pub thread_name: String,
}

impl Bracket {
    /// Snapshot of the current time and thread.
    pub fn capture() -> Self {
        let thread = std::thread::current();
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            thread_id: current_thread_id(),
            thread_name: thread.name().unwrap_or("<unnamed>").to_string(),
        }
    }
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{timeStamp={},threadId={},threadName={}}}",
            self.timestamp, self.thread_id, self.thread_name
        )
    }
}

struct ProbeInner {
    id: String,
    marker: String,
    parent: Option<Probe>,
    composite_id: OnceLock<String>,
    begin: Bracket,
    end: OnceLock<Bracket>,
    home: Option<Weak<StackInner>>,
    identity: Arc<ProcessIdentity>,
}

/// One measured interval, nestable within another.
///
/// `Probe` is a cheap handle; clones refer to the same interval and compare
/// equal. Probes may be read from any thread, but `end()` must only be called
/// on the thread whose stack the probe was pushed onto. Ending from another
/// thread is unsupported: the probe still closes, but its home stack is
/// unwound from the wrong thread.
#[derive(Clone)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

impl Probe {
    /// Create a probe that is not tracked by any thread stack.
    pub fn new(parent: Option<Probe>, marker: impl Into<String>) -> Result<Self> {
        Self::create(parent, marker.into(), None, settings().identity.clone())
    }

    pub(crate) fn create(
        parent: Option<Probe>,
        marker: String,
        home: Option<Weak<StackInner>>,
        identity: Arc<ProcessIdentity>,
    ) -> Result<Self> {
        validate_marker(&marker)?;
        Ok(Self {
            inner: Arc::new(ProbeInner {
                id: uuid::Uuid::new_v4().to_string(),
                marker,
                parent,
                composite_id: OnceLock::new(),
                begin: Bracket::capture(),
                end: OnceLock::new(),
                home,
                identity,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn marker(&self) -> &str {
        &self.inner.marker
    }

    pub fn parent(&self) -> Option<&Probe> {
        self.inner.parent.as_ref()
    }

    pub fn host_id(&self) -> &str {
        self.inner.identity.host_id()
    }

    pub fn run_id(&self) -> &str {
        self.inner.identity.run_id()
    }

    /// Ids from the root of the chain down to this probe, tab separated.
    ///
    /// Computed on first access and cached.
    pub fn composite_id(&self) -> &str {
        self.inner.composite_id.get_or_init(|| match &self.inner.parent {
            Some(parent) => {
                let mut id = String::from(parent.composite_id());
                id.push(COMPOSITE_ID_SEPARATOR);
                id.push_str(&self.inner.id);
                id
            }
            None => self.inner.id.clone(),
        })
    }

    /// `true` until the probe is ended.
    pub fn is_open(&self) -> bool {
        self.inner.end.get().is_none()
    }

    pub fn begin_bracket(&self) -> &Bracket {
        &self.inner.begin
    }

    pub fn end_bracket(&self) -> Option<&Bracket> {
        self.inner.end.get()
    }

    /// The outermost ancestor, or this probe when it has no parent.
    pub fn root(&self) -> &Probe {
        let mut next = self;
        while let Some(parent) = next.parent() {
            next = parent;
        }
        next
    }

    /// Close the probe and remove it from its home stack.
    ///
    /// Entries above this probe on the home stack are discarded with it; they
    /// belong to descendants whose own `end()` was skipped. A probe that is no
    /// longer on its stack is closed without touching the stack.
    pub fn end(&self) -> Result<&Self> {
        self.finish(Bracket::capture)
    }

    /// Close the probe with a zero duration.
    ///
    /// The end bracket records the current thread but reuses the begin
    /// timestamp, so only the elapsed-since-outer/root values carry time.
    pub fn checkpoint(&self) -> Result<&Self> {
        let timestamp = self.inner.begin.timestamp;
        self.finish(|| Bracket {
            timestamp,
            ..Bracket::capture()
        })
    }

    fn finish<F>(&self, snapshot: F) -> Result<&Self>
    where
        F: FnOnce() -> Bracket,
    {
        if !self.is_open() {
            return Err(self.already_ended());
        }
        if let Some(stack) = self.inner.home.as_ref().and_then(Weak::upgrade) {
            stack.remove_through(self);
        }
        self.inner
            .end
            .set(snapshot())
            .map_err(|_| self.already_ended())?;
        Ok(self)
    }

    fn already_ended(&self) -> ProbeError {
        ProbeError::AlreadyEnded {
            marker: self.inner.marker.clone(),
        }
    }

    fn end_timestamp(&self) -> Option<i64> {
        self.inner.end.get().map(|b| b.timestamp)
    }

    /// End minus begin, or 0 while open.
    pub fn elapsed(&self) -> i64 {
        self.end_timestamp()
            .map(|end| end - self.inner.begin.timestamp)
            .unwrap_or(0)
    }

    /// End minus the parent's begin, or 0 while open or without a parent.
    pub fn elapsed_since_outer(&self) -> i64 {
        match (self.end_timestamp(), self.parent()) {
            (Some(end), Some(parent)) => end - parent.inner.begin.timestamp,
            _ => 0,
        }
    }

    /// End minus the root's begin, or 0 while open.
    pub fn elapsed_since_root(&self) -> i64 {
        self.end_timestamp()
            .map(|end| end - self.root().inner.begin.timestamp)
            .unwrap_or(0)
    }

    /// Snapshot of this probe as a structured record.
    pub fn record(&self, unit_base: i64) -> ProbeRecord {
        ProbeRecord::capture(self, unit_base)
    }

    /// Emit this probe through the process-wide log reporter.
    pub fn report_log(&self) -> &Self {
        let config = &settings().config;
        LogReporter::new(config.level).report(&self.record(config.unit_base));
        self
    }

    /// Emit this probe through `reporter`.
    pub fn report_to(&self, reporter: &dyn Reporter) -> &Self {
        reporter.report(&self.record(settings().config.unit_base));
        self
    }
}

impl PartialEq for Probe {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Probe {}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("id", &self.inner.id)
            .field("marker", &self.inner.marker)
            .field("parent", &self.parent().map(Probe::id))
            .field("begin", &self.inner.begin)
            .field("end", &self.inner.end.get())
            .finish()
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Probe={{hostId={},runId={},probeId={},parentId={},stackId={},marker={},begin={},end=",
            self.host_id(),
            self.run_id(),
            self.id(),
            self.parent().map(Probe::id).unwrap_or("null"),
            self.composite_id(),
            self.marker(),
            self.inner.begin,
        )?;
        match self.inner.end.get() {
            Some(end) => write!(f, "{}}}", end),
            None => write!(f, "null}}"),
        }
    }
}
