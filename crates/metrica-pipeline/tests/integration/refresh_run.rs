//! Integration tests for a single orchestrated run.

use metrica_core::{Dataset, LocationCode, MonthOutcome, RefreshDecision, RefreshPlanner};

// Re-use the test harness
use crate::common::{FixtureSources, TestHarness, key, reference_fixture, spring_windows};

#[tokio::test]
async fn test_fresh_run_computes_every_month() {
    let harness = TestHarness::with_sources(
        FixtureSources::new().with_month("2024-06", reference_fixture()),
    );
    let orchestrator = harness.orchestrator(RefreshPlanner::default());

    let report = orchestrator.run(&Dataset::empty(), &spring_windows()).await;

    assert_eq!(report.summary().computed, 4);
    assert_eq!(
        report.dataset.months,
        vec![key("2024-03"), key("2024-04"), key("2024-05"), key("2024-06")]
    );
    assert_eq!(
        report.dataset.locations,
        vec![LocationCode::from("A"), LocationCode::from("B")]
    );

    let june = &report.dataset.data[&key("2024-06")];
    let a = &june[&LocationCode::from("A")];
    assert_eq!(a.cac, Some(20.0));
    assert_eq!(a.corp_cac, Some(30.0));
    assert_eq!(a.avg_revenue_per_member, Some(100.0));
    assert_eq!(a.ltv, Some(1200.0));
    assert_eq!(a.spend_to_revenue, Some(0.1));
    assert!(june[&LocationCode::from("B")].is_all_undefined());

    let totals = &report.dataset.totals[&key("2024-06")];
    assert_eq!(totals.cac, Some(20.0));
    assert_eq!(totals.corp_cac, Some(30.0));
}

#[tokio::test]
async fn test_all_five_pulls_made_per_recomputed_month() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(RefreshPlanner::default());

    orchestrator.run(&Dataset::empty(), &spring_windows()[3..]).await;

    let mut pulls: Vec<&str> = harness.sources.calls().into_iter().map(|(_, p)| p).collect();
    pulls.sort_unstable();
    assert_eq!(pulls, vec!["leads", "members", "new_members", "revenue", "spend"]);
}

#[tokio::test]
async fn test_second_run_reuses_settled_months() {
    let first = TestHarness::with_sources(
        FixtureSources::new().with_month("2024-03", reference_fixture()),
    );
    let baseline = first
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows())
        .await
        .dataset;

    // Upstream numbers for March changed, but March is settled and reused.
    let second = TestHarness::new();
    let report = second
        .orchestrator(RefreshPlanner::default())
        .run(&baseline, &spring_windows())
        .await;

    let decisions: Vec<_> = report.months.iter().map(|m| m.decision).collect();
    assert_eq!(
        decisions,
        vec![
            RefreshDecision::Reuse,
            RefreshDecision::Reuse,
            RefreshDecision::Recompute,
            RefreshDecision::Recompute,
        ]
    );
    assert_eq!(report.outcome(key("2024-03")), Some(&MonthOutcome::Reused));
    assert_eq!(
        report.dataset.data[&key("2024-03")],
        baseline.data[&key("2024-03")]
    );
    assert_eq!(
        second.sources.months_pulled().into_iter().collect::<Vec<_>>(),
        vec![key("2024-05"), key("2024-06")]
    );
}

#[tokio::test]
async fn test_full_refresh_recomputes_everything() {
    let baseline = TestHarness::new()
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows())
        .await
        .dataset;

    let harness = TestHarness::new();
    let report = harness
        .orchestrator(RefreshPlanner::default().with_full_refresh(true))
        .run(&baseline, &spring_windows())
        .await;

    assert_eq!(report.summary().computed, 4);
    assert_eq!(harness.sources.months_pulled().len(), 4);
}

#[tokio::test]
async fn test_failed_month_keeps_stale_record() {
    let baseline = TestHarness::with_sources(
        FixtureSources::new().with_month("2024-06", reference_fixture()),
    )
    .orchestrator(RefreshPlanner::default())
    .run(&Dataset::empty(), &spring_windows())
    .await
    .dataset;

    let harness = TestHarness::with_sources(FixtureSources::new().failing("2024-06"));
    let report = harness
        .orchestrator(RefreshPlanner::default())
        .run(&baseline, &spring_windows())
        .await;

    match report.outcome(key("2024-06")) {
        Some(MonthOutcome::StaleFallback { error }) => assert!(error.contains("503")),
        other => unreachable!("expected stale fallback, got {other:?}"),
    }
    assert_eq!(report.outcome(key("2024-05")), Some(&MonthOutcome::Computed));
    assert_eq!(
        report.dataset.data[&key("2024-06")],
        baseline.data[&key("2024-06")]
    );
    assert_eq!(report.dataset.totals[&key("2024-06")].cac, Some(20.0));
    assert!(report.has_failures());
}

#[tokio::test]
async fn test_failed_month_without_baseline_is_dropped() {
    let harness = TestHarness::with_sources(FixtureSources::new().failing("2024-04"));
    let report = harness
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows())
        .await;

    assert!(matches!(
        report.outcome(key("2024-04")),
        Some(MonthOutcome::Dropped { .. })
    ));
    assert_eq!(report.summary().computed, 3);
    assert_eq!(
        report.dataset.months,
        vec![key("2024-03"), key("2024-05"), key("2024-06")]
    );
    assert!(!report.dataset.totals.contains_key(&key("2024-04")));
}

#[tokio::test]
async fn test_months_outside_window_are_not_carried_over() {
    let old = TestHarness::new()
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows()[..1])
        .await
        .dataset;
    assert_eq!(old.months, vec![key("2024-03")]);

    let report = TestHarness::new()
        .orchestrator(RefreshPlanner::default())
        .run(&old, &spring_windows()[1..])
        .await;

    assert!(!report.dataset.contains_month(&key("2024-03")));
    assert_eq!(report.dataset.months.len(), 3);
}

#[tokio::test]
async fn test_rerun_on_identical_inputs_is_stable() {
    let sources = || FixtureSources::new().with_month("2024-06", reference_fixture());
    let a = TestHarness::with_sources(sources())
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows())
        .await;
    let b = TestHarness::with_sources(sources())
        .orchestrator(RefreshPlanner::default())
        .run(&Dataset::empty(), &spring_windows())
        .await;

    assert_eq!(
        serde_json::to_string(&a.dataset.data).unwrap(),
        serde_json::to_string(&b.dataset.data).unwrap()
    );
}
