//! Per-thread stacks of open probes.
//!
//! Every thread lazily gets its own [`ProbeStack`]. The free functions in this
//! module ([`begin_probe`], [`nest_probe`], [`top_probe`], [`find_probe`],
//! [`probe_count`]) operate on the calling thread's stack; an explicit
//! `ProbeStack` can be created for callers that manage their own context.
//!
//! ```rust
//! use threadprobe::{begin_probe, nest_probe, probe_count, top_probe};
//!
//! let request = begin_probe("request")?;
//! let query = nest_probe("query")?;
//! assert_eq!(top_probe().as_ref(), Some(&query));
//!
//! query.end()?.report_log();
//! request.end()?.report_log();
//! assert_eq!(probe_count(), 0);
//! # Ok::<(), threadprobe::ProbeError>(())
//! ```

use crate::error::Result;
use crate::identity::{settings, ProcessIdentity};
use crate::probe::{validate_marker, Probe};
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between a stack handle and the probes pushed onto it.
pub(crate) struct StackInner {
    /// Open probes, innermost last.
    probes: Mutex<Vec<Probe>>,
    identity: Arc<ProcessIdentity>,
}

impl StackInner {
    fn probes(&self) -> MutexGuard<'_, Vec<Probe>> {
        self.probes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pop entries until `probe` has been popped or the stack is empty.
    pub(crate) fn remove_through(&self, probe: &Probe) {
        let mut probes = self.probes();
        while let Some(top) = probes.pop() {
            if top == *probe {
                return;
            }
            log::debug!(
                "discarding probe '{}' while unwinding to '{}'",
                top.marker(),
                probe.marker()
            );
        }
    }
}

/// An ordered stack of open probes.
///
/// Cloning yields another handle to the same stack.
#[derive(Clone)]
pub struct ProbeStack {
    inner: Arc<StackInner>,
}

impl ProbeStack {
    /// Empty stack stamping probes with the process-wide identity.
    pub fn new() -> Self {
        Self::with_identity(settings().identity.clone())
    }

    /// Empty stack stamping probes with `identity`.
    pub fn with_identity(identity: Arc<ProcessIdentity>) -> Self {
        Self {
            inner: Arc::new(StackInner {
                probes: Mutex::new(Vec::new()),
                identity,
            }),
        }
    }

    /// Run `f` with the calling thread's stack.
    pub fn with_current<F, R>(f: F) -> R
    where
        F: FnOnce(&ProbeStack) -> R,
    {
        THREAD_STACK.with(f)
    }

    /// Drop every probe on the stack without ending them, then nest a new one.
    pub fn begin(&self, marker: impl Into<String>) -> Result<Probe> {
        let marker = marker.into();
        validate_marker(&marker)?;
        let dropped = {
            let mut probes = self.inner.probes();
            std::mem::take(&mut *probes)
        };
        if !dropped.is_empty() {
            log::debug!(
                "beginning '{}' discards {} open probe(s)",
                marker,
                dropped.len()
            );
        }
        self.nest(marker)
    }

    /// Push a new probe whose parent is the current top.
    pub fn nest(&self, marker: impl Into<String>) -> Result<Probe> {
        let mut probes = self.inner.probes();
        let parent = probes.last().cloned();
        let probe = Probe::create(
            parent,
            marker.into(),
            Some(Arc::downgrade(&self.inner)),
            self.inner.identity.clone(),
        )?;
        probes.push(probe.clone());
        Ok(probe)
    }

    /// The innermost open probe.
    pub fn top(&self) -> Option<Probe> {
        self.inner.probes().last().cloned()
    }

    /// The innermost probe carrying `marker`.
    pub fn find(&self, marker: &str) -> Option<Probe> {
        self.inner
            .probes()
            .iter()
            .rev()
            .find(|p| p.marker() == marker)
            .cloned()
    }

    /// Number of probes on the stack.
    pub fn len(&self) -> usize {
        self.inner.probes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Markers from innermost to outermost.
    pub fn markers(&self) -> Vec<String> {
        self.inner
            .probes()
            .iter()
            .rev()
            .map(|p| p.marker().to_string())
            .collect()
    }

    /// Like [`ProbeStack::nest`], ending the probe when the guard drops.
    pub fn nest_scoped(&self, marker: impl Into<String>) -> Result<ProbeGuard> {
        self.nest(marker).map(ProbeGuard::new)
    }

    /// Like [`ProbeStack::begin`], ending the probe when the guard drops.
    pub fn begin_scoped(&self, marker: impl Into<String>) -> Result<ProbeGuard> {
        self.begin(marker).map(ProbeGuard::new)
    }
}

impl Default for ProbeStack {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static THREAD_STACK: ProbeStack = ProbeStack::new();
}

/// Clear the calling thread's stack and start a new root probe.
///
/// Probes left on the stack are dropped, not ended. Handles held elsewhere
/// stay usable but are no longer found by [`top_probe`] or [`find_probe`].
pub fn begin_probe(marker: impl Into<String>) -> Result<Probe> {
    ProbeStack::with_current(|s| s.begin(marker))
}

/// Start a probe nested in the calling thread's current top probe.
pub fn nest_probe(marker: impl Into<String>) -> Result<Probe> {
    ProbeStack::with_current(|s| s.nest(marker))
}

/// The calling thread's innermost open probe.
pub fn top_probe() -> Option<Probe> {
    ProbeStack::with_current(ProbeStack::top)
}

/// The innermost probe on the calling thread with the given marker.
pub fn find_probe(marker: &str) -> Option<Probe> {
    ProbeStack::with_current(|s| s.find(marker))
}

/// Depth of the calling thread's stack.
pub fn probe_count() -> usize {
    ProbeStack::with_current(ProbeStack::len)
}

/// Nest a probe on the calling thread, ending it when the guard drops.
pub fn scoped(marker: impl Into<String>) -> Result<ProbeGuard> {
    ProbeStack::with_current(|s| s.nest_scoped(marker))
}

/// Begin a fresh stack on the calling thread, ending the root when the guard drops.
pub fn begin_scoped(marker: impl Into<String>) -> Result<ProbeGuard> {
    ProbeStack::with_current(|s| s.begin_scoped(marker))
}

/// Time `f` inside a nested probe on the calling thread.
///
/// The probe is ended and reported even if `f` panics.
pub fn measure<F, R>(marker: impl Into<String>, f: F) -> Result<R>
where
    F: FnOnce() -> R,
{
    let _guard = scoped(marker)?;
    Ok(f())
}

/// Ends its probe on drop unless it was ended explicitly.
///
/// By default the probe is reported through the process-wide log reporter
/// when the guard ends it.
#[must_use = "the probe ends as soon as the guard is dropped"]
pub struct ProbeGuard {
    probe: Probe,
    report: bool,
}

impl ProbeGuard {
    fn new(probe: Probe) -> Self {
        Self {
            probe,
            report: true,
        }
    }

    /// Do not report the probe when the guard ends it.
    pub fn silent(mut self) -> Self {
        self.report = false;
        self
    }

    pub fn probe(&self) -> &Probe {
        &self.probe
    }
}

impl Deref for ProbeGuard {
    type Target = Probe;

    fn deref(&self) -> &Probe {
        &self.probe
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if !self.probe.is_open() {
            return;
        }
        match self.probe.end() {
            Ok(probe) => {
                if self.report {
                    probe.report_log();
                }
            }
            Err(e) => log::warn!("probe guard failed to end probe: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use std::thread;

    fn stack() -> ProbeStack {
        ProbeStack::with_identity(Arc::new(ProcessIdentity::new("host", "run")))
    }

    #[test]
    fn should_count_nests_minus_ends() {
        let s = stack();
        let a = s.nest("a").unwrap();
        let b = s.nest("b").unwrap();
        s.nest("c").unwrap();
        assert_eq!(s.len(), 3);

        b.end().unwrap();
        assert_eq!(s.len(), 1);
        a.end().unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn should_leave_single_probe_when_beginning() {
        let s = stack();
        s.begin("root").unwrap();
        s.nest("level1").unwrap();
        s.nest("level2").unwrap();
        assert_eq!(s.len(), 3);

        let fresh = s.begin("new root").unwrap();
        assert_eq!(s.len(), 1);
        assert!(fresh.parent().is_none());
        assert_eq!(s.top(), Some(fresh));
    }

    #[test]
    fn should_keep_stack_when_begin_marker_empty() {
        let s = stack();
        s.nest("a").unwrap();
        s.nest("b").unwrap();
        let c = s.nest("c").unwrap();

        assert_eq!(s.begin("").unwrap_err(), ProbeError::InvalidMarker);
        assert_eq!(s.len(), 3);
        assert_eq!(s.top(), Some(c));
    }

    #[test]
    fn should_keep_dropped_probes_usable_when_begin_discards_them() {
        let s = stack();
        let old = s.begin("old").unwrap();
        s.begin("new").unwrap();

        assert!(old.is_open());
        assert_eq!(s.find("old"), None);
        old.end().unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s.top().unwrap().marker(), "new");
    }

    #[test]
    fn should_drain_stack_when_ended_in_reverse_order() {
        let s = stack();
        let a = s.nest("a").unwrap();
        let b = s.nest("b").unwrap();
        let c = s.nest("c").unwrap();
        c.end().unwrap();
        b.end().unwrap();
        a.end().unwrap();
        assert_eq!(s.len(), 0);
        assert_eq!(s.top(), None);
    }

    #[test]
    fn should_unwind_skipped_probes_when_ancestor_ends() {
        let s = stack();
        let a = s.nest("a").unwrap();
        let b = s.nest("b").unwrap();
        let c = s.nest("c").unwrap();
        c.end().unwrap();
        a.end().unwrap();

        assert_eq!(s.len(), 0);
        assert_eq!(s.find("b"), None);
        assert!(b.is_open());
        b.end().unwrap();
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn should_keep_outer_probes_when_middle_probe_ends() {
        let s = stack();
        s.begin("root").unwrap();
        let l1 = s.nest("level1").unwrap();
        s.nest("level2").unwrap();
        s.nest("level3").unwrap().end().unwrap();
        l1.end().unwrap();

        assert_eq!(s.len(), 1);
        assert_eq!(s.top().unwrap().marker(), "root");
    }

    #[test]
    fn should_link_parent_to_previous_top_when_nesting() {
        let s = stack();
        let a = s.begin("root").unwrap();
        let b = s.nest("level1").unwrap();
        assert_eq!(b.parent(), Some(&a));
        assert_eq!(b.host_id(), "host");
        assert_eq!(b.run_id(), "run");
    }

    #[test]
    fn should_find_innermost_probe_when_markers_repeat() {
        let s = stack();
        s.nest("dup").unwrap();
        s.nest("other").unwrap();
        let inner = s.nest("dup").unwrap();

        assert_eq!(s.find("dup"), Some(inner));
        assert_eq!(s.find("missing"), None);
        assert_eq!(s.markers(), vec!["dup", "other", "dup"]);
    }

    #[test]
    fn should_not_push_probe_when_marker_empty() {
        let s = stack();
        s.nest("a").unwrap();
        assert_eq!(s.nest("").unwrap_err(), ProbeError::InvalidMarker);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn should_tolerate_probe_missing_from_stack_when_ending() {
        let s = stack();
        let detached = Probe::new(None, "loose").unwrap();
        s.nest("kept").unwrap();
        detached.end().unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn should_end_probe_when_guard_dropped() {
        let s = stack();
        let outer = s.nest("outer").unwrap();
        let held = {
            let guard = s.nest_scoped("inner").unwrap().silent();
            assert_eq!(s.len(), 2);
            guard.probe().clone()
        };
        assert!(!held.is_open());
        assert_eq!(s.top(), Some(outer));
    }

    #[test]
    fn should_skip_end_when_guarded_probe_already_ended() {
        let s = stack();
        let guard = s.nest_scoped("x").unwrap().silent();
        guard.end().unwrap();
        let ended_at = guard.end_bracket().cloned();
        drop(guard);
        assert!(ended_at.is_some());
        assert!(s.is_empty());
    }

    #[test]
    fn should_end_guarded_probe_when_unwinding_from_panic() {
        let s = stack();
        let root = s.nest("root").unwrap();
        let s2 = s.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = s2.nest_scoped("failing").unwrap().silent();
            s2.nest("never ended").unwrap();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(s.len(), 1);
        assert_eq!(s.top(), Some(root));
    }

    #[test]
    fn should_isolate_stacks_per_thread() {
        begin_probe("main").unwrap();
        nest_probe("main-child").unwrap();

        let seen = thread::spawn(|| {
            let before = probe_count();
            begin_probe("worker").unwrap();
            (before, probe_count(), find_probe("main").is_none())
        })
        .join()
        .unwrap();

        assert_eq!(seen, (0, 1, true));
        assert_eq!(probe_count(), 2);
        assert_eq!(top_probe().unwrap().marker(), "main-child");
    }

    #[test]
    fn should_use_thread_stack_for_free_functions() {
        let root = begin_probe("root").unwrap();
        nest_probe("level1").unwrap();
        nest_probe("level2").unwrap();
        nest_probe("level3").unwrap().end().unwrap();
        top_probe().unwrap().end().unwrap();
        top_probe().unwrap().end().unwrap();
        assert_eq!(top_probe(), Some(root));
        top_probe().unwrap().end().unwrap();
        assert_eq!(probe_count(), 0);
    }

    #[test]
    fn should_return_closure_value_when_measuring() {
        begin_probe("outer").unwrap();
        let v = measure("work", || 40 + 2).unwrap();
        assert_eq!(v, 42);
        assert_eq!(probe_count(), 1);
        assert!(measure("", || ()).is_err());
    }
}
