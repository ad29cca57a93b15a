//! Call-tree accounting: self/total separation, repetition, and recursion.
#![cfg(not(feature = "disable"))]

use std::time::{Duration, Instant};

use easyprof_runtime::{
    profile, profile_scope, start, stop, CallResult, Collector, Results, SortBy,
};

/// Spin for `target` and return the measured duration.
fn busy_wait(target: Duration) -> Duration {
    let start = Instant::now();
    while start.elapsed() < target {}
    start.elapsed()
}

fn find<'a>(results: &'a Results, suffix: &str) -> &'a CallResult {
    results
        .iter()
        .find(|r| r.function.ends_with(suffix))
        .unwrap_or_else(|| panic!("{suffix} not in results"))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9
}

fn leaf() {
    profile!();
    busy_wait(Duration::from_micros(200));
}

fn parent_of_one() {
    profile!();
    busy_wait(Duration::from_micros(100));
    leaf();
}

fn parent_of_many() {
    profile!();
    for _ in 0..5 {
        leaf();
    }
}

fn countdown(n: u32) -> u32 {
    profile!();
    busy_wait(Duration::from_micros(20));
    if n == 0 { 0 } else { 1 + countdown(n - 1) }
}

fn sibling_a() {
    profile!();
    busy_wait(Duration::from_millis(2));
}

fn sibling_b() {
    profile!();
    busy_wait(Duration::from_micros(200));
}

fn two_siblings() {
    profile!();
    sibling_a();
    sibling_b();
}

#[test]
fn leaf_internal_equals_cumulative() {
    let collector = Collector::new();
    start(&collector);
    let outer = Instant::now();
    leaf();
    let wall = outer.elapsed().as_secs_f64();
    stop();

    let results = collector.results();
    let leaf = find(&results, "::leaf");
    assert_eq!(leaf.calls, 1);
    assert!(close(leaf.internal, leaf.cumulative));
    assert!(leaf.cumulative >= 0.000_2, "measured {}", leaf.cumulative);
    assert!(leaf.cumulative <= wall, "scope time {} exceeds wall {wall}", leaf.cumulative);
}

#[test]
fn parent_total_is_self_plus_child_total() {
    let collector = Collector::new();
    start(&collector);
    parent_of_one();
    stop();

    let results = collector.results();
    let parent = find(&results, "::parent_of_one");
    let child = find(&results, "::leaf");
    assert!(close(parent.cumulative, parent.internal + child.cumulative));
    assert!(parent.internal >= 0.000_1);
    assert!(parent.internal < parent.cumulative);
}

#[test]
fn child_time_summed_over_every_call_from_parent_body() {
    let collector = Collector::new();
    start(&collector);
    parent_of_many();
    stop();

    let results = collector.results();
    let parent = find(&results, "::parent_of_many");
    let child = find(&results, "::leaf");
    assert_eq!(child.calls, 5);
    assert!(close(parent.cumulative, parent.internal + child.cumulative));
}

#[test]
fn repeated_calls_accumulate_and_average() {
    let collector = Collector::new();
    start(&collector);
    for _ in 0..8 {
        leaf();
    }
    stop();

    let results = collector.results();
    let leaf = find(&results, "::leaf");
    assert_eq!(leaf.calls, 8);
    let mean = leaf.cumulative_per_call().unwrap();
    assert!(close(mean * 8.0, leaf.cumulative));
    assert!(mean >= 0.000_2);
    assert!(close(leaf.internal_per_call().unwrap(), mean));
}

#[test]
fn recursion_folds_into_one_call_site() {
    let collector = Collector::new();
    start(&collector);
    let outer = Instant::now();
    assert_eq!(countdown(9), 9);
    let wall = outer.elapsed().as_secs_f64();
    stop();

    let results = collector.results();
    assert_eq!(results.len(), 1);
    let r = &results[0];
    // countdown(9) down to countdown(0), base case included.
    assert_eq!(r.calls, 10);
    assert!(r.internal >= 0.0);
    // Self times of every depth add up to the outermost call's total.
    assert!(r.internal <= wall);
    assert!(r.internal >= 10.0 * 0.000_02);
    // Each depth's total covers all deeper levels, so the sum exceeds the
    // internal sum whenever there is more than one level.
    assert!(r.cumulative > r.internal);
}

#[test]
fn recursive_self_times_sum_to_outermost_total() {
    let collector = Collector::new();
    start(&collector);
    {
        let _wrapper = profile_scope!("recursion wrapper");
        assert_eq!(countdown(9), 9);
    }
    stop();

    let results = collector.results();
    let wrapper = results.find("recursion wrapper").unwrap();
    let cd = find(&results, "::countdown");
    // The wrapper's only child is the outermost countdown call.
    let outermost_total = wrapper.cumulative - wrapper.internal;
    assert!(
        close(cd.internal, outermost_total),
        "internal {} != outermost total {outermost_total}",
        cd.internal
    );
    // Cumulative adds every depth's total, so nested levels count again.
    assert!(cd.cumulative > outermost_total * 2.0);
}

#[test]
fn time_does_not_leak_between_siblings() {
    let collector = Collector::new();
    start(&collector);
    two_siblings();
    stop();

    let results = collector.results();
    let a = find(&results, "::sibling_a");
    let b = find(&results, "::sibling_b");
    let parent = find(&results, "::two_siblings");
    assert!(a.cumulative >= 0.002);
    assert!(b.cumulative < 0.002, "sibling_b picked up sibling_a's time: {}", b.cumulative);
    assert!(close(parent.cumulative, parent.internal + a.cumulative + b.cumulative));
}

#[test]
fn sorting_orders_by_key_and_is_stable() {
    let collector = Collector::new();
    start(&collector);
    two_siblings();
    parent_of_many();
    stop();

    for by in [SortBy::Internal, SortBy::Cumulative, SortBy::Calls] {
        let mut results = collector.results_sorted(by);
        let keys: Vec<f64> = results
            .iter()
            .map(|r| match by {
                SortBy::Internal => r.internal,
                SortBy::Cumulative => r.cumulative,
                SortBy::Calls => r.calls as f64,
            })
            .collect();
        assert!(
            keys.windows(2).all(|w| w[0] >= w[1]),
            "{by:?} not descending: {keys:?}"
        );
        let before = results.clone();
        results.sort(by);
        assert_eq!(results, before);
    }
}

#[test]
fn fresh_and_reset_collectors_are_empty() {
    let collector = Collector::new();
    let results = collector.results();
    assert!(results.is_empty());
    assert_eq!(results.total_calls(), 0);

    start(&collector);
    leaf();
    stop();
    assert_eq!(collector.results().total_calls(), 1);

    collector.reset();
    let results = collector.results();
    assert!(results.is_empty());
    assert_eq!(results.total_calls(), 0);
}

#[test]
fn collector_resumes_after_stop() {
    let collector = Collector::new();
    start(&collector);
    leaf();
    stop();
    leaf();
    start(&collector);
    leaf();
    stop();

    assert_eq!(find(&collector.results(), "::leaf").calls, 2);
}

fn shared_name_first() {
    profile!("shared name");
}

fn shared_name_second() {
    profile!("shared name");
}

#[test]
fn same_name_at_different_sites_stays_separate() {
    let collector = Collector::new();
    start(&collector);
    shared_name_first();
    shared_name_second();
    shared_name_second();
    stop();

    let results = collector.results();
    let shared: Vec<_> = results.iter().filter(|r| r.function == "shared name").collect();
    assert_eq!(shared.len(), 2);
    assert_ne!(shared[0].line, shared[1].line);
    assert_eq!(shared[0].calls + shared[1].calls, 3);
}
