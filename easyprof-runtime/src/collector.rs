//! Thread-local scope stack, collectors, and RAII scope guards.
//!
//! Each instrumented function calls `enter(site)` which pushes a `StackEntry`
//! onto a thread-local stack and returns an RAII `Guard`. When the guard
//! drops (on any exit path, unwinding included), it pops the entry, adds the
//! entry's total time to the caller's subprocedure time, and merges the
//! invocation into the collector that is current on this thread, if any.
//!
//! Thread-locality: every thread has its own stack and its own "current
//! collector" slot. A `Collector` is a shared handle, so the same collector
//! may be current on several threads, in which case their results interleave
//! into one map.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::callsite::CallSiteId;
use crate::clock::{Clock, Seconds, Stopwatch};
use crate::results::{CallResult, Results, SortBy};

/// Entry on the thread-local scope stack.
struct StackEntry {
    site: CallSiteId,
    clock: Clock,
    /// Total time of direct children that have already returned.
    subprocedure: Seconds,
}

/// Aggregated state owned by a collector.
#[derive(Default)]
struct CollectorState {
    /// Index into `entries` per call site. `entries` keeps first-seen order.
    slots: HashMap<CallSiteId, usize>,
    entries: Vec<CallResult>,
    overhead: Stopwatch,
}

impl CollectorState {
    fn merge(&mut self, site: CallSiteId, total: Seconds, subprocedure: Seconds) {
        let index = match self.slots.get(&site) {
            Some(&index) => index,
            None => {
                let index = self.entries.len();
                self.entries.push(CallResult::new(site.site()));
                self.slots.insert(site, index);
                index
            }
        };
        self.entries[index].record(total, subprocedure);
    }
}

type SharedState = Arc<Mutex<CollectorState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, CollectorState> {
    // A panic inside a profiled function must not disable profiling.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    static STACK: RefCell<Vec<StackEntry>> = const { RefCell::new(Vec::new()) };
    static CURRENT: RefCell<Option<SharedState>> = const { RefCell::new(None) };
}

/// Current collector for this thread. `None` during thread-local teardown.
fn current_state() -> Option<SharedState> {
    CURRENT.try_with(|slot| slot.borrow().clone()).ok().flatten()
}

/// Profiling session that aggregates per-call-site results.
///
/// Cloning produces another handle to the same session.
#[derive(Clone, Default)]
pub struct Collector {
    state: SharedState,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this collector is the current one on the calling thread.
    pub fn is_current(&self) -> bool {
        CURRENT
            .try_with(|slot| {
                slot.borrow()
                    .as_ref()
                    .is_some_and(|state| Arc::ptr_eq(state, &self.state))
            })
            .unwrap_or(false)
    }

    /// Snapshot of everything recorded so far, in first-seen order.
    ///
    /// Must not be called while this collector is current on the calling
    /// thread (checked in debug builds). Other threads are not checked.
    pub fn results(&self) -> Results {
        debug_assert!(
            !self.is_current(),
            "easyprof: results() called while the collector is running on this thread"
        );
        let state = lock(&self.state);
        let mut results = Results::new(state.overhead.elapsed());
        for entry in &state.entries {
            results.add(entry.clone());
        }
        results
    }

    /// `results()` sorted by one of the built-in keys.
    pub fn results_sorted(&self, by: SortBy) -> Results {
        let mut results = self.results();
        results.sort(by);
        results
    }

    /// Drop all recorded results and zero the overhead estimate.
    ///
    /// Same precondition as `results()`.
    pub fn reset(&self) {
        debug_assert!(
            !self.is_current(),
            "easyprof: reset() called while the collector is running on this thread"
        );
        let mut state = lock(&self.state);
        state.slots.clear();
        state.entries.clear();
        state.overhead.reset();
        log::trace!("easyprof: collector reset");
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Collector")
            .field("sites", &state.entries.len())
            .field("overhead", &state.overhead.elapsed())
            .finish()
    }
}

/// Make `collector` current on this thread, replacing any collector that
/// was current before. Collectors do not stack.
pub fn start(collector: &Collector) {
    CURRENT.with(|slot| {
        if slot.borrow_mut().replace(Arc::clone(&collector.state)).is_some() {
            log::trace!("easyprof: start() superseded the running collector");
        }
    });
    log::trace!("easyprof: collector started on {:?}", std::thread::current().id());
}

/// Leave this thread without a current collector.
pub fn stop() {
    let _ = CURRENT.try_with(|slot| slot.borrow_mut().take());
    log::trace!("easyprof: collector stopped on {:?}", std::thread::current().id());
}

/// The collector current on this thread, if any.
pub fn current() -> Option<Collector> {
    current_state().map(|state| Collector { state })
}

/// Number of open scopes on this thread.
pub fn depth() -> usize {
    STACK.try_with(|stack| stack.borrow().len()).unwrap_or(0)
}

/// RAII scope guard. Pops its stack entry and records the invocation on drop.
///
/// Not `Send`: a scope belongs to the stack of the thread that opened it.
#[must_use = "dropping the guard immediately records ~0s; bind it with `let _guard = ...`"]
pub struct Guard {
    /// Position of this guard's entry on the stack. `None` if the stack was
    /// already torn down when the scope opened.
    depth: Option<usize>,
    _not_send: PhantomData<*const ()>,
}

impl Guard {
    /// A guard that owns no stack entry and records nothing.
    #[doc(hidden)]
    pub fn inert() -> Self {
        Self {
            depth: None,
            _not_send: PhantomData,
        }
    }

    pub fn depth(&self) -> Option<usize> {
        self.depth
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("depth", &self.depth).finish()
    }
}

/// Open a scope for `site`. The returned guard closes it when dropped.
///
/// The push is bracketed by the current collector's overhead stopwatch, and
/// the scope's own clock starts only after the push.
pub fn enter(site: CallSiteId) -> Guard {
    let collector = current_state();
    let mut state = collector.as_ref().map(lock);
    if let Some(state) = state.as_mut() {
        state.overhead.start();
    }

    let depth = STACK
        .try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            stack.push(StackEntry {
                site,
                clock: Clock::new(),
                subprocedure: 0.0,
            });
            stack[depth].clock.reset();
            depth
        })
        .ok();

    if let Some(state) = state.as_mut() {
        state.overhead.stop();
    }
    Guard {
        depth,
        _not_send: PhantomData,
    }
}

/// Pop the entry at `depth` and hand back `(site, total, subprocedure)`.
fn pop(depth: usize) -> Option<(CallSiteId, Seconds, Seconds)> {
    STACK
        .try_with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                depth + 1,
                "easyprof: scope closed while it was not the top of the stack"
            );
            // Entries above ours belong to guards that were leaked instead
            // of dropped; they can never close, so discard them.
            while stack.len() > depth + 1 {
                stack.pop();
                log::warn!("easyprof: discarded a scope whose guard was never dropped");
            }
            let Some(entry) = stack.pop() else {
                log::warn!("easyprof: guard dropped without matching stack entry");
                return None;
            };
            let total = entry.clock.elapsed();
            if let Some(caller) = stack.last_mut() {
                caller.subprocedure += total;
            }
            Some((entry.site, total, entry.subprocedure))
        })
        .ok()
        .flatten()
}

impl Drop for Guard {
    fn drop(&mut self) {
        let Some(depth) = self.depth else {
            return;
        };
        let collector = current_state();
        let mut state = collector.as_ref().map(lock);
        if let Some(state) = state.as_mut() {
            state.overhead.start();
        }

        let closed = pop(depth);

        if let Some(state) = state.as_mut() {
            if let Some((site, total, subprocedure)) = closed {
                state.merge(site, total, subprocedure);
            }
            state.overhead.stop();
        }
    }
}

/// CPU-bound workload for testing: hash a buffer `iterations` times.
#[cfg(test)]
pub(crate) fn burn_cpu(iterations: u64) {
    let mut buf = [0x42u8; 4096];
    for i in 0..iterations {
        for b in &mut buf {
            *b = b.wrapping_add(i as u8).wrapping_mul(31);
        }
    }
    std::hint::black_box(&buf);
}
