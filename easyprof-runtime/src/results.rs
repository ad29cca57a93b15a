//! Per-call-site statistics and the snapshot container handed to callers.

use std::cmp::Ordering;
use std::ops::Index;

use crate::callsite::CallSite;
use crate::clock::Seconds;

/// Accumulated timing for one call site.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// Line of the instrumentation point, not of the function signature.
    pub line: u32,
    pub file: &'static str,
    pub function: &'static str,
    pub calls: u64,
    /// Sum of self time across calls, excluding profiled callees.
    pub internal: Seconds,
    /// Sum of total time across calls, including profiled callees.
    pub cumulative: Seconds,
}

impl CallResult {
    /// A result with no calls recorded yet.
    pub fn new(site: CallSite) -> Self {
        Self {
            line: site.line,
            file: site.file,
            function: site.function,
            calls: 0,
            internal: 0.0,
            cumulative: 0.0,
        }
    }

    /// Fold one finished invocation into the totals.
    pub(crate) fn record(&mut self, total: Seconds, subprocedure: Seconds) {
        self.calls += 1;
        // Sub-nanosecond float drift can push children past the parent.
        self.internal += (total - subprocedure).max(0.0);
        self.cumulative += total;
    }

    pub fn site(&self) -> CallSite {
        CallSite {
            line: self.line,
            file: self.file,
            function: self.function,
        }
    }

    /// Mean self time, or `None` if the site was never called.
    pub fn internal_per_call(&self) -> Option<Seconds> {
        (self.calls > 0).then(|| self.internal / self.calls as f64)
    }

    /// Mean total time, or `None` if the site was never called.
    pub fn cumulative_per_call(&self) -> Option<Seconds> {
        (self.calls > 0).then(|| self.cumulative / self.calls as f64)
    }
}

/// Built-in orderings. All sort descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Internal,
    Cumulative,
    Calls,
}

impl SortBy {
    /// Comparator placing larger keys first.
    pub fn compare(self, a: &CallResult, b: &CallResult) -> Ordering {
        self.compare_keys(
            (a.calls, a.internal, a.cumulative),
            (b.calls, b.internal, b.cumulative),
        )
    }

    /// Same ordering over bare `(calls, internal, cumulative)` triples, for
    /// callers that keep the numbers in their own types.
    pub fn compare_keys(
        self,
        a: (u64, Seconds, Seconds),
        b: (u64, Seconds, Seconds),
    ) -> Ordering {
        match self {
            SortBy::Internal => b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal),
            SortBy::Cumulative => b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal),
            SortBy::Calls => b.0.cmp(&a.0),
        }
    }
}

/// Snapshot of a collector: per-site results plus the measured overhead of
/// the profiler itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    entries: Vec<CallResult>,
    total_calls: u64,
    overhead: Seconds,
}

impl Results {
    pub fn new(overhead: Seconds) -> Self {
        Self {
            entries: Vec::new(),
            total_calls: 0,
            overhead,
        }
    }

    pub fn add(&mut self, result: CallResult) {
        self.total_calls += result.calls;
        self.entries.push(result);
    }

    /// Reorder in place by a built-in key. Stable, so equal keys keep their
    /// relative order.
    pub fn sort(&mut self, by: SortBy) {
        self.entries.sort_by(|a, b| by.compare(a, b));
    }

    /// Reorder in place with a custom comparator.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&CallResult, &CallResult) -> Ordering,
    {
        self.entries.sort_by(compare);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CallResult> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&CallResult> {
        self.entries.get(index)
    }

    /// First result recorded for `function`.
    pub fn find(&self, function: &str) -> Option<&CallResult> {
        self.entries.iter().find(|r| r.function == function)
    }

    pub fn as_slice(&self) -> &[CallResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls
    }

    /// Time the profiling machinery spent on its own bookkeeping.
    pub fn overhead(&self) -> Seconds {
        self.overhead
    }
}

impl Index<usize> for Results {
    type Output = CallResult;

    fn index(&self, index: usize) -> &CallResult {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a Results {
    type Item = &'a CallResult;
    type IntoIter = std::slice::Iter<'a, CallResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Results {
    type Item = CallResult;
    type IntoIter = std::vec::IntoIter<CallResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(function: &'static str, calls: u64, internal: f64, cumulative: f64) -> CallResult {
        CallResult {
            line: 1,
            file: "src/lib.rs",
            function,
            calls,
            internal,
            cumulative,
        }
    }

    fn sample() -> Results {
        let mut results = Results::new(0.25);
        results.add(result("walk", 3, 2.0, 9.0));
        results.add(result("parse", 100, 5.0, 6.0));
        results.add(result("emit", 10, 0.5, 12.0));
        results
    }

    #[test]
    fn add_folds_total_calls() {
        let results = sample();
        assert_eq!(results.len(), 3);
        assert_eq!(results.total_calls(), 113);
        assert_eq!(results.overhead(), 0.25);
    }

    #[test]
    fn empty_results() {
        let results = Results::new(0.0);
        assert!(results.is_empty());
        assert_eq!(results.total_calls(), 0);
        assert!(results.get(0).is_none());
    }

    #[test]
    fn sort_by_internal_descending() {
        let mut results = sample();
        results.sort(SortBy::Internal);
        let names: Vec<_> = results.iter().map(|r| r.function).collect();
        assert_eq!(names, ["parse", "walk", "emit"]);
    }

    #[test]
    fn sort_by_cumulative_descending() {
        let mut results = sample();
        results.sort(SortBy::Cumulative);
        let names: Vec<_> = results.iter().map(|r| r.function).collect();
        assert_eq!(names, ["emit", "walk", "parse"]);
    }

    #[test]
    fn sort_by_calls_descending() {
        let mut results = sample();
        results.sort(SortBy::Calls);
        let names: Vec<_> = results.iter().map(|r| r.function).collect();
        assert_eq!(names, ["parse", "emit", "walk"]);
    }

    #[test]
    fn sorting_twice_keeps_order() {
        let mut results = sample();
        results.add(result("tie_a", 10, 1.0, 1.0));
        results.add(result("tie_b", 10, 1.0, 1.0));
        for by in [SortBy::Internal, SortBy::Cumulative, SortBy::Calls] {
            results.sort(by);
            let once = results.clone();
            results.sort(by);
            assert_eq!(results, once, "re-sorting by {by:?} changed the order");
        }
    }

    #[test]
    fn custom_comparator() {
        let mut results = sample();
        results.sort_by(|a, b| a.function.cmp(b.function));
        assert_eq!(results[0].function, "emit");
        assert_eq!(results[2].function, "walk");
    }

    #[test]
    fn key_comparator_matches_result_comparator() {
        let heavy = result("heavy", 2, 5.0, 6.0);
        let busy = result("busy", 90, 1.0, 9.0);
        let key = |r: &CallResult| (r.calls, r.internal, r.cumulative);
        for by in [SortBy::Internal, SortBy::Cumulative, SortBy::Calls] {
            assert_eq!(
                by.compare_keys(key(&heavy), key(&busy)),
                by.compare(&heavy, &busy),
                "{by:?}"
            );
        }
        assert_eq!(SortBy::Internal.compare(&heavy, &busy), Ordering::Less);
        assert_eq!(SortBy::Calls.compare(&heavy, &busy), Ordering::Greater);
        let nan = (1, f64::NAN, f64::NAN);
        assert_eq!(SortBy::Internal.compare_keys(nan, key(&busy)), Ordering::Equal);
    }

    #[test]
    fn per_call_means() {
        let r = result("walk", 4, 2.0, 10.0);
        assert_eq!(r.internal_per_call(), Some(0.5));
        assert_eq!(r.cumulative_per_call(), Some(2.5));
    }

    #[test]
    fn per_call_undefined_without_calls() {
        let r = result("never", 0, 0.0, 0.0);
        assert_eq!(r.internal_per_call(), None);
        assert_eq!(r.cumulative_per_call(), None);
    }

    #[test]
    fn record_clamps_negative_self_time() {
        let mut r = result("drifted", 0, 0.0, 0.0);
        r.record(10.0, 10.001);
        assert_eq!(r.calls, 1);
        assert_eq!(r.internal, 0.0, "negative self-time should be clamped to zero");
        assert_eq!(r.cumulative, 10.0);
    }

    #[test]
    fn find_and_index() {
        let results = sample();
        assert_eq!(results.find("parse").map(|r| r.calls), Some(100));
        assert!(results.find("missing").is_none());
        assert_eq!(results[1].function, "parse");
        assert_eq!(results.get(2).map(|r| r.function), Some("emit"));
    }
}
