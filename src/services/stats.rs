//! Run aggregator: derived statistics over a scope and its ledger.
//!
//! Not-run policy, applied uniformly across execution, dashboard, and report
//! views: a scope member counts as executed only when it has a ledger record
//! with a status other than `not_run`. An explicit `not_run` record is
//! equivalent to no record at all, so `not_run = total - executed` and the
//! per-status counts always sum to `total`.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{ResultStatus, RunStats, SuiteStats, TestCase, TestRunResult, TestSuite};

/// Aggregate counts and rates for a scope.
///
/// Ledger records whose test case is no longer in scope are ignored, so
/// conservation (`pass + fail + skip + blocked + not_run == total`) holds
/// even after a suite was edited under a live run.
pub fn aggregate(scope: &[TestCase], results: &[TestRunResult]) -> RunStats {
    let member_ids: HashSet<Uuid> = scope.iter().map(|case| case.id).collect();

    let mut stats = RunStats::empty();
    stats.total = scope.len();

    for result in results {
        if !member_ids.contains(&result.test_case_id) {
            continue;
        }
        match result.status {
            ResultStatus::Pass => stats.pass += 1,
            ResultStatus::Fail => stats.fail += 1,
            ResultStatus::Skip => stats.skip += 1,
            ResultStatus::Blocked => stats.blocked += 1,
            ResultStatus::NotRun => {}
        }
    }

    stats.executed = stats.pass + stats.fail + stats.skip + stats.blocked;
    stats.not_run = stats.total - stats.executed;
    stats.execution_rate = ratio(stats.executed, stats.total);
    stats.pass_rate = ratio(stats.pass, stats.executed);
    stats
}

/// Stats restricted to each suite in the scope.
///
/// Results are joined back to suites through scope membership: each ledger
/// record's test case id maps to its owning suite via the scope list, never
/// through a separate join table.
pub fn suite_breakdown(
    scope: &[TestCase],
    results: &[TestRunResult],
    suites: &[TestSuite],
) -> Vec<SuiteStats> {
    let names: HashMap<Uuid, &str> = suites
        .iter()
        .map(|suite| (suite.id, suite.name.as_str()))
        .collect();

    // Preserve first-appearance order of suites within the scope.
    let mut suite_order: Vec<Uuid> = Vec::new();
    let mut by_suite: HashMap<Uuid, Vec<TestCase>> = HashMap::new();
    for case in scope {
        if !by_suite.contains_key(&case.suite_id) {
            suite_order.push(case.suite_id);
        }
        by_suite.entry(case.suite_id).or_default().push(case.clone());
    }

    suite_order
        .into_iter()
        .map(|suite_id| {
            let subset = &by_suite[&suite_id];
            SuiteStats {
                suite_id,
                suite_name: names.get(&suite_id).unwrap_or(&"").to_string(),
                stats: aggregate(subset, results),
            }
        })
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
