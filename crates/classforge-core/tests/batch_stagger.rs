//! Batch fan-out: stagger timing and per-entity independence.

mod support;

use std::time::Duration;

use tokio::time::Instant;

use classforge_core::provision::{BatchRunner, RepairFacet};
use classforge_core::schedule::StaggerSchedule;

use support::{Harness, group, project};

const UNIT: Duration = Duration::from_secs(5);

fn runner(h: &Harness) -> BatchRunner {
    BatchRunner::new(h.provisioner.clone(), h.targets.clone()).with_schedules(
        StaggerSchedule::new(UNIT),
        StaggerSchedule::new(Duration::from_secs(1)),
    )
}

#[tokio::test(start_paused = true)]
async fn workflow_starts_are_staggered_by_index() {
    let h = Harness::new();
    let descriptions = vec![
        group(0, "team0", &["a0"]),
        group(1, "team1", &["a1"]),
        group(2, "team2", &["a2"]),
        group(3, "team3", &["a3"]),
    ];

    let start = Instant::now();
    let outcomes = runner(&h).provision_groups(descriptions).await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    for i in 0..4u32 {
        let first = h
            .api
            .first_call("create_repo", &format!("p_team{i}"))
            .expect("repository requested");
        assert!(
            first.duration_since(start) >= UNIT * i,
            "team{i} started after {:?}",
            first.duration_since(start)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn repair_batches_use_the_lighter_unit() {
    let h = Harness::new();
    let descriptions = vec![project(0, "s0", "amy"), project(1, "s1", "ben")];
    let runner = runner(&h);
    runner.provision_projects(descriptions.clone()).await;

    let earlier_calls = h.api.calls().len();
    let start = Instant::now();
    let outcomes = runner
        .repair_projects(descriptions, Some(vec![RepairFacet::Collaborator]))
        .await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    let calls: Vec<_> = h
        .api
        .calls()
        .into_iter()
        .skip(earlier_calls)
        .filter(|call| call.op == "add_collaborator")
        .collect();
    assert_eq!(calls.len(), 2);
    let second = calls.iter().find(|call| call.target == "d0_ben:ben").unwrap();
    assert!(second.at.duration_since(start) >= Duration::from_secs(1));
    assert!(second.at.duration_since(start) < UNIT);
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_stop_siblings() {
    let h = Harness::new();
    // The second entity's repository name is already taken.
    h.api.seed_repo("p_team1");
    let descriptions = vec![
        group(0, "team0", &["a"]),
        group(1, "team1", &["b"]),
        group(2, "team2", &["c"]),
    ];

    let outcomes = runner(&h).provision_groups(descriptions).await;

    let ok: Vec<bool> = outcomes.iter().map(|o| o.is_success()).collect();
    assert_eq!(ok, vec![true, false, true]);
    assert_eq!(outcomes[1].entity.id, "team1");
    assert!(h.state(&outcomes[1].entity).has_error());
    assert!(h.state(&outcomes[2].entity).is_provisioned());
}

#[tokio::test(start_paused = true)]
async fn outcomes_keep_input_order_and_report_refusals() {
    let h = Harness::new();
    let mut assigned = group(1, "team1", &["b"]);
    assigned.assigned_repo_url = Some("https://github.test/cs310/legacy".to_string());
    let descriptions = vec![group(0, "team0", &["a"]), assigned];

    let outcomes = runner(&h).provision_groups(descriptions).await;

    assert_eq!(outcomes[0].entity.id, "team0");
    assert_eq!(outcomes[1].entity.id, "team1");
    let summary = outcomes[1].summary();
    assert_eq!(summary.status, "already-provisioned");
    assert_eq!(
        summary.repo_url.as_deref(),
        Some("https://github.test/cs310/legacy")
    );
}

#[tokio::test(start_paused = true)]
async fn empty_batch_returns_no_outcomes() {
    let h = Harness::new();
    let outcomes = runner(&h).repair_groups(Vec::new(), None).await;
    assert!(outcomes.is_empty());
}
