//! Integration tests for the run execution and aggregation engine, driven
//! through the public store and service APIs.

use chrono::Utc;
use uuid::Uuid;

use testdeck_lib::models::{
    Project, ResultPatch, ResultStatus, TestCase, TestRun, TestSuite,
};
use testdeck_lib::services::{composer, ledger, ordering, stats};
use testdeck_lib::store::{EntityStore, MemoryStore};

fn make_case(project_id: Uuid, suite_id: Uuid, title: &str, order: i32) -> TestCase {
    let now = Utc::now();
    TestCase {
        id: Uuid::now_v7(),
        project_id,
        suite_id,
        title: title.to_string(),
        description: String::new(),
        preconditions: String::new(),
        test_steps: String::new(),
        expected_result: String::new(),
        order: Some(order),
        created_at: now,
        updated_at: now,
    }
}

/// Seed a project with one suite of the given case titles and return
/// (project, suite, cases).
async fn seed_suite(
    store: &MemoryStore,
    titles: &[&str],
) -> (Project, TestSuite, Vec<TestCase>) {
    let project = Project::new("QA".to_string(), String::new());
    store.insert_project(project.clone()).await.unwrap();

    let suite = TestSuite::new(project.id, "Login".to_string(), String::new());
    store.insert_suite(suite.clone()).await.unwrap();

    let mut cases = Vec::new();
    for (i, title) in titles.iter().enumerate() {
        let case = make_case(project.id, suite.id, title, i as i32);
        store.insert_case(case.clone()).await.unwrap();
        cases.push(case);
    }

    (project, suite, cases)
}

#[tokio::test]
async fn upsert_is_idempotent_for_any_sequence_of_statuses() {
    let store = MemoryStore::new();
    let run_id = Uuid::now_v7();
    let case_id = Uuid::now_v7();

    let sequence = [
        ResultStatus::Pass,
        ResultStatus::Fail,
        ResultStatus::Skip,
        ResultStatus::Blocked,
        ResultStatus::Pass,
    ];
    for status in sequence {
        ledger::upsert(
            &store,
            run_id,
            case_id,
            ResultPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let results = ledger::list_by_run(&store, run_id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ResultStatus::Pass);
}

#[tokio::test]
async fn compose_scope_is_deterministic() {
    let store = MemoryStore::new();
    let (project, suite, _) = seed_suite(&store, &["A", "B", "C"]).await;

    let run = TestRun::new(
        project.id,
        "Nightly".to_string(),
        String::new(),
        vec![suite.id],
        "admin".to_string(),
    );
    store.insert_run(run.clone()).await.unwrap();

    let first = composer::compose_scope(&store, &run).await.unwrap();
    let second = composer::compose_scope(&store, &run).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn aggregate_conserves_totals() {
    let store = MemoryStore::new();
    let (project, suite, cases) = seed_suite(&store, &["A", "B", "C"]).await;

    let run = TestRun::new(
        project.id,
        "Release".to_string(),
        String::new(),
        vec![suite.id],
        "admin".to_string(),
    );
    store.insert_run(run.clone()).await.unwrap();

    ledger::upsert(
        &store,
        run.id,
        cases[0].id,
        ResultPatch {
            status: Some(ResultStatus::Pass),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    ledger::upsert(
        &store,
        run.id,
        cases[1].id,
        ResultPatch {
            status: Some(ResultStatus::Fail),
            bug_id: Some("BUG-1".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let scope = composer::compose_scope(&store, &run).await.unwrap();
    let results = ledger::list_by_run(&store, run.id).await.unwrap();
    let agg = stats::aggregate(&scope, &results);

    assert_eq!(agg.total, scope.len());
    assert_eq!(
        agg.pass + agg.fail + agg.skip + agg.blocked + agg.not_run,
        agg.total
    );
    assert_eq!(agg.executed, 2);
    assert_eq!(agg.not_run, 1);
    assert!((agg.execution_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((agg.pass_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn reorder_is_reflected_by_load_ordered() {
    let store = MemoryStore::new();
    let (_, suite, cases) = seed_suite(&store, &["A", "B", "C"]).await;

    // Swap B and C.
    let permutation = vec![cases[0].id, cases[2].id, cases[1].id];
    ordering::reorder(&store, suite.id, &permutation).await.unwrap();

    let titles: Vec<String> = ordering::load_ordered(&store, suite.id)
        .await
        .unwrap()
        .into_iter()
        .map(|case| case.title)
        .collect();
    assert_eq!(titles, vec!["A", "C", "B"]);
}

#[tokio::test]
async fn re_marking_a_case_never_grows_the_ledger() {
    let store = MemoryStore::new();
    let run_id = Uuid::now_v7();
    let (case_a, case_b) = (Uuid::now_v7(), Uuid::now_v7());

    for (case_id, status) in [
        (case_a, ResultStatus::Pass),
        (case_b, ResultStatus::Fail),
        (case_a, ResultStatus::Blocked),
    ] {
        ledger::upsert(
            &store,
            run_id,
            case_id,
            ResultPatch {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let results = ledger::list_by_run(&store, run_id).await.unwrap();
    assert_eq!(results.len(), 2);

    let map = ledger::result_map(results);
    assert_eq!(map[&case_a].status, ResultStatus::Blocked);
}

#[tokio::test]
async fn run_snapshot_ignores_suites_added_later() {
    let store = MemoryStore::new();
    let (project, suite, _) = seed_suite(&store, &["A", "B"]).await;

    let run = TestRun::new(
        project.id,
        "Frozen".to_string(),
        String::new(),
        vec![suite.id],
        "admin".to_string(),
    );
    store.insert_run(run.clone()).await.unwrap();

    // A suite created after the run does not enter the scope.
    let late_suite = TestSuite::new(project.id, "Late".to_string(), String::new());
    store.insert_suite(late_suite.clone()).await.unwrap();
    store
        .insert_case(make_case(project.id, late_suite.id, "L1", 0))
        .await
        .unwrap();

    let scope = composer::compose_scope(&store, &run).await.unwrap();
    assert_eq!(scope.len(), 2);
    assert!(scope.iter().all(|case| case.suite_id == suite.id));
}

#[tokio::test]
async fn membership_within_a_snapshot_suite_stays_live() {
    let store = MemoryStore::new();
    let (project, suite, _) = seed_suite(&store, &["A", "B"]).await;

    let run = TestRun::new(
        project.id,
        "Live".to_string(),
        String::new(),
        vec![suite.id],
        "admin".to_string(),
    );
    store.insert_run(run.clone()).await.unwrap();

    // A case added to the snapshot suite after run creation does show up.
    store
        .insert_case(make_case(project.id, suite.id, "C", 2))
        .await
        .unwrap();

    let scope = composer::compose_scope(&store, &run).await.unwrap();
    assert_eq!(scope.len(), 3);
    assert_eq!(scope[2].title, "C");
}
