//! In-memory backend: evaluates bound queries over per-run result maps held in
//! process.

use crate::concrete::ConcreteQuery;
use crate::cost::check_budget;
use crate::plan::{BindError, Binder, Plan};
use crate::run::{RunId, TestRun};
use crate::status::TestStatus;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Results of one run, keyed by test name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResults {
    tests: BTreeMap<String, TestStatus>,
}

impl RunResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, test: impl Into<String>, status: TestStatus) {
        self.tests.insert(test.into(), status);
    }

    pub fn get(&self, test: &str) -> Option<TestStatus> {
        self.tests.get(test).copied()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn test_names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, TestStatus)> for RunResults {
    fn from_iter<I: IntoIterator<Item = (S, TestStatus)>>(iter: I) -> Self {
        Self {
            tests: iter.into_iter().map(|(name, status)| (name.into(), status)).collect(),
        }
    }
}

/// One matching test and its status in each queried run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub test: String,
    /// `statuses[i]` is the status in the i-th run passed to `execute`
    pub statuses: Vec<Option<TestStatus>>,
}

/// Shared store of loaded runs. Safe to load, evict and bind concurrently.
#[derive(Debug)]
pub struct MemoryStore {
    runs: RwLock<HashMap<RunId, Arc<RunResults>>>,
    max_query_size: usize,
}

impl MemoryStore {
    pub fn new(max_query_size: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            max_query_size,
        }
    }

    pub fn load_run(&self, run: RunId, results: RunResults) -> Result<(), BindError> {
        let mut runs = self
            .runs
            .write()
            .map_err(|_| BindError::Backend("run store lock poisoned".to_string()))?;
        debug!(run, tests = results.len(), "loading run into memory store");
        runs.insert(run, Arc::new(results));
        Ok(())
    }

    pub fn evict_run(&self, run: RunId) -> Result<bool, BindError> {
        let mut runs = self
            .runs
            .write()
            .map_err(|_| BindError::Backend("run store lock poisoned".to_string()))?;
        Ok(runs.remove(&run).is_some())
    }

    pub fn contains(&self, run: RunId) -> Result<bool, BindError> {
        let runs = self
            .runs
            .read()
            .map_err(|_| BindError::Backend("run store lock poisoned".to_string()))?;
        Ok(runs.contains_key(&run))
    }
}

impl Binder for MemoryStore {
    type Plan = MemoryPlan;

    fn bind(&self, runs: &[TestRun], query: &ConcreteQuery) -> Result<MemoryPlan, BindError> {
        if runs.is_empty() {
            return Err(BindError::NoRuns);
        }
        let size = check_budget(query, self.max_query_size)?;

        let loaded = self
            .runs
            .read()
            .map_err(|_| BindError::Backend("run store lock poisoned".to_string()))?;
        let mut snapshot = HashMap::with_capacity(runs.len());
        for run in runs {
            match loaded.get(&run.id) {
                Some(results) => {
                    snapshot.insert(run.id, Arc::clone(results));
                }
                None => {
                    warn!(run = run.id, "bind rejected: run not loaded");
                    return Err(BindError::RunNotLoaded(run.id));
                }
            }
        }
        debug!(size, runs = runs.len(), "bound query to memory store");

        // 非 Exists 根节点视为单个备选条件
        let alternatives = match query {
            ConcreteQuery::Exists(exists) => exists.args.clone(),
            other => vec![other.clone()],
        };

        Ok(MemoryPlan {
            alternatives,
            snapshot,
        })
    }
}

/// A bound query plus the run data it was bound against
#[derive(Debug, Clone)]
pub struct MemoryPlan {
    alternatives: Vec<ConcreteQuery>,
    snapshot: HashMap<RunId, Arc<RunResults>>,
}

impl MemoryPlan {
    fn status(&self, run: RunId, test: &str) -> Option<TestStatus> {
        self.snapshot.get(&run).and_then(|results| results.get(test))
    }

    /// Evaluates `query` for one test. Status atoms hold when at least one of
    /// their runs has a result for the test that satisfies them.
    fn eval(&self, query: &ConcreteQuery, test: &str, lower_test: &str) -> bool {
        match query {
            ConcreteQuery::Exists(exists) => exists.args.iter().any(|q| self.eval(q, test, lower_test)),
            ConcreteQuery::TestNamePattern { pattern } => lower_test.contains(&pattern.to_lowercase()),
            ConcreteQuery::RunTestStatusEq { runs, status, .. } => runs
                .iter()
                .any(|run| self.status(*run, test) == Some(*status)),
            ConcreteQuery::RunTestStatusNeq { runs, status, .. } => runs
                .iter()
                .any(|run| matches!(self.status(*run, test), Some(s) if s != *status)),
            ConcreteQuery::Not(arg) => !self.eval(arg, test, lower_test),
            ConcreteQuery::Or(args) => args.iter().any(|q| self.eval(q, test, lower_test)),
            ConcreteQuery::And(args) => args.iter().all(|q| self.eval(q, test, lower_test)),
            ConcreteQuery::True => true,
            ConcreteQuery::False => false,
        }
    }
}

impl Plan for MemoryPlan {
    type Output = Vec<SearchResult>;

    fn execute(&self, runs: &[TestRun]) -> Vec<SearchResult> {
        let tests: BTreeSet<&str> = self
            .snapshot
            .values()
            .flat_map(|results| results.test_names())
            .collect();

        tests
            .into_iter()
            .filter(|test| {
                let lower = test.to_lowercase();
                self.alternatives.iter().any(|q| self.eval(q, test, &lower))
            })
            .map(|test| SearchResult {
                test: test.to_string(),
                statuses: runs.iter().map(|run| self.status(run.id, test)).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ItemQuery, RunQuery};
    use crate::concrete::tests::run;
    use crate::parser::QueryParser;
    use std::thread;

    fn store() -> MemoryStore {
        let store = MemoryStore::new(100);
        store
            .load_run(
                1,
                [
                    ("/dom/a.html", TestStatus::Pass),
                    ("/dom/b.html", TestStatus::Fail),
                    ("/css/c.html", TestStatus::Pass),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        store
            .load_run(
                2,
                [
                    ("/dom/a.html", TestStatus::Fail),
                    ("/dom/b.html", TestStatus::Fail),
                    ("/css/c.html", TestStatus::Pass),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        store
            .load_run(3, [("/dom/a.html", TestStatus::Timeout)].into_iter().collect())
            .unwrap();
        store
    }

    fn runs() -> Vec<TestRun> {
        vec![run(1, "chrome"), run(2, "chrome"), run(3, "firefox")]
    }

    fn search(query: &str) -> Vec<String> {
        let rq = QueryParser::default().parse_str(query).unwrap();
        let runs = runs();
        let bound = rq.bind_to_runs(&runs).unwrap();
        let plan = store().bind(&runs, &bound).unwrap();
        plan.execute(&runs).into_iter().map(|r| r.test).collect()
    }

    #[test]
    fn test_flaky_across_runs() {
        let found = search(
            r#"{"run_ids":[1,2,3],"query":{"and":[{"browser_name":"chrome","status":"PASS"},{"browser_name":"chrome","status":"FAIL"}]}}"#,
        );
        assert_eq!(found, vec!["/dom/a.html"]);
    }

    #[test]
    fn test_pattern_is_case_insensitive_substring() {
        let found = search(r#"{"run_ids":[1,2,3],"query":{"pattern":"/DOM/"}}"#);
        assert_eq!(found, vec!["/dom/a.html", "/dom/b.html"]);
    }

    #[test]
    fn test_neq_requires_a_result() {
        // run 3 只有 a.html 的结果
        let found = search(r#"{"run_ids":[1,2,3],"query":{"browser_name":"firefox","status":{"not":"PASS"}}}"#);
        assert_eq!(found, vec!["/dom/a.html"]);
    }

    #[test]
    fn test_not_and_or() {
        let found = search(
            r#"{"run_ids":[1,2,3],"query":{"not":{"or":[{"pattern":"css"},{"browser_name":"firefox","status":"TIMEOUT"}]}}}"#,
        );
        assert_eq!(found, vec!["/dom/b.html"]);
    }

    #[test]
    fn test_alternatives_are_a_disjunction() {
        let found = search(
            r#"{"run_ids":[1,2,3],"query":[{"pattern":"css"},{"browser_name":"firefox","status":"TIMEOUT"}]}"#,
        );
        assert_eq!(found, vec!["/css/c.html", "/dom/a.html"]);
    }

    #[test]
    fn test_browser_without_runs_matches_nothing() {
        let found = search(r#"{"run_ids":[1,2,3],"query":{"browser_name":"safari","status":"PASS"}}"#);
        assert!(found.is_empty());
    }

    #[test]
    fn test_statuses_follow_execute_runs() {
        let runs = runs();
        let rq = RunQuery { run_ids: vec![1, 2, 3], exists: vec![ItemQuery::pattern("b.html")] };
        let plan = store().bind(&runs, &rq.bind_to_runs(&runs).unwrap()).unwrap();
        let results = plan.execute(&runs);
        assert_eq!(
            results,
            vec![SearchResult {
                test: "/dom/b.html".to_string(),
                statuses: vec![Some(TestStatus::Fail), Some(TestStatus::Fail), None],
            }]
        );
    }

    #[test]
    fn test_constants() {
        let runs = runs();
        let store = store();
        let all = store.bind(&runs, &ConcreteQuery::True).unwrap().execute(&runs);
        assert_eq!(all.len(), 3);
        let none = store.bind(&runs, &ConcreteQuery::False).unwrap().execute(&runs);
        assert!(none.is_empty());
    }

    #[test]
    fn test_unknown_run_is_rejected() {
        let runs = vec![run(1, "chrome"), run(9, "edge")];
        let err = store().bind(&runs, &ConcreteQuery::True).unwrap_err();
        assert_eq!(err, BindError::RunNotLoaded(9));
    }

    #[test]
    fn test_budget_is_enforced() {
        let runs = runs();
        let store = MemoryStore::new(1);
        store.load_run(1, RunResults::new()).unwrap();
        let query = ItemQuery::And(vec![ItemQuery::pattern("a"), ItemQuery::pattern("b")]).bind(&runs);
        assert_eq!(
            store.bind(&runs, &query).unwrap_err(),
            BindError::QueryTooLarge { size: 2, limit: 1 }
        );
    }

    #[test]
    fn test_empty_runs_rejected() {
        assert_eq!(store().bind(&[], &ConcreteQuery::True).unwrap_err(), BindError::NoRuns);
    }

    #[test]
    fn test_plan_keeps_snapshot_after_evict() {
        let runs = vec![run(1, "chrome")];
        let store = store();
        let plan = store.bind(&runs, &ConcreteQuery::True).unwrap();
        assert!(store.evict_run(1).unwrap());
        assert!(!store.contains(1).unwrap());
        assert_eq!(plan.execute(&runs).len(), 3);
    }

    #[test]
    fn test_concurrent_bind() {
        let store = Arc::new(store());
        let runs = runs();
        let query = RunQuery {
            run_ids: vec![1, 2, 3],
            exists: vec![ItemQuery::status_eq("chrome", TestStatus::Fail)],
        }
        .bind_to_runs(&runs)
        .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                let runs = runs.clone();
                let query = query.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        store.load_run(100 + i, RunResults::new()).unwrap();
                    }
                    let plan = store.bind(&runs, &query).unwrap();
                    plan.execute(&runs).len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 2);
        }
    }
}
