//! End-to-end properties of the variation engine: matrix expansion,
//! conditional reachability, pruning, replay, and naming.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use kaleido::{
    run_scenario, Asserter, FindingKind, RunOrder, RunStatus, Scenario, Variation,
};

fn variation_suffixes(reports: &[kaleido::VariationReport]) -> HashSet<String> {
    reports
        .iter()
        .map(|r| r.name.rsplit('/').next().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn independent_points_multiply() {
    let invocations = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&invocations);
    let scenario = Scenario::new("multiply", move |v: &mut Variation| {
        *counter.lock().expect("counter") += 1;
        let _verb = v.pick(vec!["Copy", "Sync"]);
        let _location = v.pick(vec!["Local", "Blob", "Files"]);
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 6, "2 x 3 independent options");
    assert!(reports.iter().all(|r| r.status == RunStatus::Pass));

    let names: HashSet<_> = reports.iter().map(|r| r.name.clone()).collect();
    assert_eq!(names.len(), 6, "every variation gets a distinct name");

    // Each combination maps once (exploratory) and runs once (real).
    assert_eq!(*invocations.lock().expect("counter"), 12);
}

#[test]
fn conditionally_unreachable_points_do_not_multiply() {
    let scenario = Scenario::new("conditional", |v: &mut Variation| {
        let first = v.pick(vec!["A", "B"]);
        if first == "A" {
            let _ = v.pick(vec!["X", "Y", "Z"]);
        }
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 4, "1 for B + 3 for A with X/Y/Z");
    assert_eq!(
        variation_suffixes(&reports),
        ["AX", "AY", "AZ", "B"]
            .into_iter()
            .map(str::to_string)
            .collect::<HashSet<_>>()
    );
}

#[test]
fn invalidated_runs_stop_spawning() {
    let invocations = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&invocations);
    let scenario = Scenario::new("pruned", move |v: &mut Variation| {
        *counter.lock().expect("counter") += 1;
        let n = v.pick(vec![1, 2]);
        if n == 2 {
            v.invalidate();
            // Downstream points on an invalid run answer but spawn nothing.
            let _ = v.pick(vec![10, 20, 30]);
        }
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 1, "only the n=1 path survives");
    assert_eq!(reports[0].status, RunStatus::Pass);

    // Mapping for both branches plus one real run; nothing spawned past the
    // invalidation, or the count would be 5 and up.
    assert_eq!(*invocations.lock().expect("counter"), 3);
}

#[test]
fn loop_iterations_are_distinct_variation_points() {
    let scenario = Scenario::new("looped", |v: &mut Variation| {
        let mut total = 0;
        for _ in 0..2 {
            total += v.pick(vec![0, 1]);
        }
        v.log(&format!("total={total}"));
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 4, "same source line twice still branches independently");
    assert_eq!(
        variation_suffixes(&reports),
        ["00", "01", "10", "11"]
            .into_iter()
            .map(str::to_string)
            .collect::<HashSet<_>>()
    );
}

#[test]
fn named_resolution_contributes_labels_and_values() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let scenario = Scenario::new("named", move |v: &mut Variation| {
        let value = v.pick_named(vec![("foo", 1), ("bar", 2)]);
        if !v.is_exploratory() {
            sink.lock().expect("sink").push((v.variation_name(), value));
        }
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().any(|r| r.name.ends_with("/bar")));

    let observed = observed.lock().expect("sink");
    assert!(observed.contains(&("foo".to_string(), 1)));
    assert!(observed.contains(&("bar".to_string(), 2)));
}

#[test]
fn replay_answers_are_idempotent() {
    fn recording_scenario(sink: Arc<Mutex<BTreeMap<String, Vec<String>>>>) -> Scenario {
        Scenario::new("replayed", move |v: &mut Variation| {
            let a = v.pick(vec!["A1", "A2"]);
            let b = v.pick(vec!["B1", "B2"]);
            if !v.is_exploratory() {
                sink.lock()
                    .expect("sink")
                    .insert(v.test_name(), vec![a.to_string(), b.to_string()]);
            }
        })
    }

    let first = Arc::new(Mutex::new(BTreeMap::new()));
    run_scenario("Matrix", &recording_scenario(Arc::clone(&first)), RunOrder::Fifo, 0);

    let second = Arc::new(Mutex::new(BTreeMap::new()));
    run_scenario("Matrix", &recording_scenario(Arc::clone(&second)), RunOrder::Fifo, 0);

    let first = first.lock().expect("first");
    let second = second.lock().expect("second");
    assert_eq!(first.len(), 4);
    assert_eq!(*first, *second, "fixed code replays to identical answers");
}

#[test]
fn shuffled_dispatch_reaches_the_same_variations() {
    fn conditional() -> Scenario {
        Scenario::new("conditional", |v: &mut Variation| {
            let first = v.pick(vec!["A", "B"]);
            if first == "A" {
                let _ = v.pick(vec!["X", "Y", "Z"]);
            }
        })
    }

    let fifo = run_scenario("Matrix", &conditional(), RunOrder::Fifo, 0);
    let shuffled = run_scenario("Matrix", &conditional(), RunOrder::Shuffled, 7);
    assert_eq!(variation_suffixes(&fifo), variation_suffixes(&shuffled));
}

#[test]
fn skip_is_not_a_failure() {
    let scenario = Scenario::new("skipping", |v: &mut Variation| {
        let n = v.pick(vec![1, 2]);
        if n == 2 {
            v.skip("unsupported combination");
        }
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 2);
    let statuses: Vec<_> = reports.iter().map(|r| r.status).collect();
    assert!(statuses.contains(&RunStatus::Pass));
    assert!(statuses.contains(&RunStatus::Skip));
}

#[test]
fn soft_failures_report_every_problem() {
    let scenario = Scenario::new("multi_fail", |v: &mut Variation| {
        v.assert("first check", false);
        v.assert("second check", false);
    });

    let reports = run_scenario("Matrix", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, RunStatus::Fail);
    assert_eq!(reports[0].findings.len(), 2, "soft failures accumulate");
}

#[test]
fn unguarded_cleanup_registration_fails_the_variation() {
    let scenario = Scenario::new("bad_cleanup", |v: &mut Variation| {
        v.defer_cleanup(|_a| {});
    });

    let reports = run_scenario("Contract", &scenario, RunOrder::Fifo, 0);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, RunStatus::Fail);
    assert!(matches!(reports[0].findings[0].kind, FindingKind::Usage));
}
