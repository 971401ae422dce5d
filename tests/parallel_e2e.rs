//! Parallel operator end-to-end suite: the necessity/optional split,
//! the three time options, index preservation, and panic attribution.

mod common;

use common::{capture, delivered, fail, init_test, panics};
use quartet::time::delay;
use quartet::{parallel, Evidence, Outcome, ParallelConfig, Scheduler, Time, TimeOption};
use std::time::Duration;

#[test]
fn skip_optionals_finishes_with_the_necessities() {
    init_test("skip_optionals_finishes_with_the_necessities");
    let scheduler = Scheduler::new();
    let necessities = vec![
        delay(&scheduler, Duration::from_millis(50), 50_u64),
        delay(&scheduler, Duration::from_millis(100), 100),
    ];
    let config = ParallelConfig::new()
        .with_optionals(vec![delay(&scheduler, Duration::from_millis(1000), 1000)])
        .with_time_option(TimeOption::SkipOptionalsIfTimeRemains);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 100);
    let results = outcome.success().expect("success");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().and_then(|o| o.value()), Some(&50));
    assert_eq!(results[1].as_ref().and_then(|o| o.value()), Some(&100));
    assert!(results[2].is_none(), "cancelled optional leaves an empty slot");
    // The optional's 1000ms timer was disarmed; time stopped at 100ms.
    assert_eq!(scheduler.now(), Time::from_millis(100));
}

#[test]
fn skip_optionals_fails_when_the_limit_beats_the_necessities() {
    init_test("skip_optionals_fails_when_the_limit_beats_the_necessities");
    let scheduler = Scheduler::new();
    let necessities = vec![delay(&scheduler, Duration::from_millis(200), 200_u64)];
    let config = ParallelConfig::new()
        .with_optionals(vec![delay(&scheduler, Duration::from_millis(20), 20)])
        .with_time_limit(Duration::from_millis(100));
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 100);
    let reason = outcome.reason().expect("failure");
    assert!(reason.is_timeout());
    assert_eq!(
        reason.evidence(),
        Some(Evidence::TimeLimit(Duration::from_millis(100)))
    );
}

#[test]
fn try_optionals_succeeds_at_the_limit_with_partial_results() {
    init_test("try_optionals_succeeds_at_the_limit_with_partial_results");
    let scheduler = Scheduler::new();
    let necessities = vec![delay(&scheduler, Duration::from_millis(30), 30_u64)];
    let config = ParallelConfig::new()
        .with_optionals(vec![
            delay(&scheduler, Duration::from_millis(60), 60),
            delay(&scheduler, Duration::from_millis(500), 500),
        ])
        .with_time_limit(Duration::from_millis(100))
        .with_time_option(TimeOption::TryOptionalsIfTimeRemains);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 100, "optionals get the whole limit");
    let results = outcome.success().expect("success");
    assert_eq!(results[0].as_ref().and_then(|o| o.value()), Some(&30));
    assert_eq!(results[1].as_ref().and_then(|o| o.value()), Some(&60));
    assert!(results[2].is_none(), "the slow optional was cut off");
}

#[test]
fn try_optionals_fails_at_the_limit_when_a_necessity_is_pending() {
    init_test("try_optionals_fails_at_the_limit_when_a_necessity_is_pending");
    let scheduler = Scheduler::new();
    let necessities = vec![delay(&scheduler, Duration::from_millis(300), 300_u64)];
    let config = ParallelConfig::new()
        .with_optionals(vec![delay(&scheduler, Duration::from_millis(10), 10)])
        .with_time_limit(Duration::from_millis(100))
        .with_time_option(TimeOption::TryOptionalsIfTimeRemains);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 100);
    assert!(outcome.reason().expect("failure").is_timeout());
}

#[test]
fn require_necessities_lets_necessities_outlive_the_limit() {
    init_test("require_necessities_lets_necessities_outlive_the_limit");
    let scheduler = Scheduler::new();
    let necessities = vec![delay(&scheduler, Duration::from_millis(200), 200_u64)];
    let config = ParallelConfig::new()
        .with_optionals(vec![
            delay(&scheduler, Duration::from_millis(75), 75),
            delay(&scheduler, Duration::from_millis(500), 500),
        ])
        .with_time_limit(Duration::from_millis(100))
        .with_time_option(TimeOption::RequireNecessities);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 200, "the necessity ran past the limit and finished");
    let results = outcome.success().expect("success");
    assert_eq!(results[0].as_ref().and_then(|o| o.value()), Some(&200));
    assert_eq!(
        results[1].as_ref().and_then(|o| o.value()),
        Some(&75),
        "the optional that beat the limit is kept"
    );
    assert!(results[2].is_none(), "the optional that missed the limit is not");
}

#[test]
fn require_necessities_succeeds_at_the_limit_if_necessities_are_done() {
    init_test("require_necessities_succeeds_at_the_limit_if_necessities_are_done");
    let scheduler = Scheduler::new();
    let necessities = vec![delay(&scheduler, Duration::from_millis(50), 50_u64)];
    let config = ParallelConfig::new()
        .with_optionals(vec![delay(&scheduler, Duration::from_millis(500), 500)])
        .with_time_limit(Duration::from_millis(100))
        .with_time_option(TimeOption::RequireNecessities);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(
        at, 100,
        "necessities were done, so the timer closes the composite"
    );
    let results = outcome.success().expect("success");
    assert_eq!(results[0].as_ref().and_then(|o| o.value()), Some(&50));
    assert!(results[1].is_none());
}

#[test]
fn only_optionals_get_the_whole_limit() {
    init_test("only_optionals_get_the_whole_limit");
    let scheduler = Scheduler::new();
    // No necessities: the operator forces try-optionals, whatever was
    // asked for.
    let config = ParallelConfig::new()
        .with_optionals(vec![
            delay(&scheduler, Duration::from_millis(40), 40_u64),
            fail("flaky optional"),
        ])
        .with_time_limit(Duration::from_millis(100))
        .with_time_option(TimeOption::SkipOptionalsIfTimeRemains);
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, Vec::new(), config).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 40, "all optionals settled before the limit");
    let results = outcome.success().expect("an optional failure is tolerated");
    assert!(results[0].as_ref().is_some_and(Outcome::is_success));
    assert!(results[1].as_ref().is_some_and(Outcome::is_failure));
}

#[test]
fn panicking_necessity_fails_the_composite_with_attribution() {
    init_test("panicking_necessity_fails_the_composite_with_attribution");
    let scheduler = Scheduler::new();
    let necessities = vec![
        panics("requestor zero exploded"),
        delay(&scheduler, Duration::from_millis(20), 20_u64),
    ];
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, ParallelConfig::new()).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, at) = delivered(&slot);
    assert_eq!(at, 0, "the panic fails the composite immediately");
    let reason = outcome.reason().expect("failure");
    assert!(reason.is_child_panic());
    assert_eq!(reason.evidence(), Some(Evidence::ChildIndex(0)));
    assert!(reason
        .cause()
        .expect("cause is the caught panic")
        .to_string()
        .contains("requestor zero exploded"));
    // The delay never fired: its timer was cancelled with the engine.
    assert_eq!(scheduler.now(), Time::ZERO);
}

#[test]
fn throttled_parallel_still_preserves_index_order() {
    init_test("throttled_parallel_still_preserves_index_order");
    let scheduler = Scheduler::new();
    let necessities = (0..6)
        .map(|i| delay(&scheduler, Duration::from_millis(10 * (6 - i)), i))
        .collect();
    let (receiver, slot) = capture(&scheduler);
    parallel(
        &scheduler,
        necessities,
        ParallelConfig::new().with_throttle(2),
    )
    .start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, _) = delivered(&slot);
    let results = outcome.success().expect("success");
    let values: Vec<u64> = results
        .iter()
        .map(|slot| *slot.as_ref().and_then(|o| o.value()).expect("completed"))
        .collect();
    assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn composite_failure_reason_is_the_necessitys_own() {
    init_test("composite_failure_reason_is_the_necessitys_own");
    let scheduler = Scheduler::new();
    let necessities = vec![fail("database unreachable")];
    let (receiver, slot) = capture(&scheduler);
    parallel(&scheduler, necessities, ParallelConfig::new()).start(receiver, 0);
    scheduler.run_until_idle();

    let (outcome, _) = delivered(&slot);
    let reason = outcome.reason().expect("failure");
    assert_eq!(reason.excuse(), "database unreachable");
    assert_eq!(reason.factory(), None, "child reasons pass through untagged");
}
