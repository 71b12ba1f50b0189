//! Binding: rewrites an abstract query into a [`ConcreteQuery`] against a
//! resolved set of runs.

use crate::ast::{ItemQuery, RunQuery};
use crate::run::{RunId, TestRun};
use crate::plan::BindError;
use crate::status::TestStatus;
use tracing::debug;

/// Constrains results to tests for which at least one of `args` holds over
/// the bound `runs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exists {
    pub runs: Vec<TestRun>,
    pub args: Vec<ConcreteQuery>,
}

/// A query bound to specific test runs. Same shape as [`ItemQuery`], with
/// browser names already resolved to run identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcreteQuery {
    Exists(Exists),
    TestNamePattern {
        pattern: String,
    },
    /// Holds when one of `runs` has `status` for the test
    RunTestStatusEq {
        browser_name: String,
        runs: Vec<RunId>,
        status: TestStatus,
    },
    /// Holds when one of `runs` has a result other than `status` for the test
    RunTestStatusNeq {
        browser_name: String,
        runs: Vec<RunId>,
        status: TestStatus,
    },
    Not(Box<ConcreteQuery>),
    Or(Vec<ConcreteQuery>),
    And(Vec<ConcreteQuery>),
    True,
    False,
}

fn runs_for_browser(runs: &[TestRun], browser_name: &str) -> Vec<RunId> {
    runs.iter()
        .filter(|run| run.is_browser(browser_name))
        .map(|run| run.id)
        .collect()
}

impl ItemQuery {
    /// Specializes status atoms to the runs of their browser. A browser with
    /// no run in `runs` yields an atom with no runs, which never holds.
    pub fn bind(&self, runs: &[TestRun]) -> ConcreteQuery {
        match self {
            ItemQuery::TestNamePattern { pattern } => ConcreteQuery::TestNamePattern {
                pattern: pattern.clone(),
            },
            ItemQuery::StatusEq { browser_name, status } => ConcreteQuery::RunTestStatusEq {
                browser_name: browser_name.clone(),
                runs: runs_for_browser(runs, browser_name),
                status: *status,
            },
            ItemQuery::StatusNeq { browser_name, status } => ConcreteQuery::RunTestStatusNeq {
                browser_name: browser_name.clone(),
                runs: runs_for_browser(runs, browser_name),
                status: *status,
            },
            ItemQuery::Not(arg) => ConcreteQuery::Not(Box::new(arg.bind(runs))),
            ItemQuery::Or(args) => ConcreteQuery::Or(args.iter().map(|q| q.bind(runs)).collect()),
            ItemQuery::And(args) => ConcreteQuery::And(args.iter().map(|q| q.bind(runs)).collect()),
            ItemQuery::True => ConcreteQuery::True,
            ItemQuery::False => ConcreteQuery::False,
        }
    }
}

impl RunQuery {
    /// Produces an [`Exists`] over `runs`. Binding to no runs is an error.
    pub fn bind_to_runs(&self, runs: &[TestRun]) -> Result<ConcreteQuery, BindError> {
        if runs.is_empty() {
            return Err(BindError::NoRuns);
        }
        debug!(runs = runs.len(), alternatives = self.exists.len(), "binding run query");
        Ok(ConcreteQuery::Exists(Exists {
            runs: runs.to_vec(),
            args: self.exists.iter().map(|q| q.bind(runs)).collect(),
        }))
    }
}

impl ConcreteQuery {
    /// Identifiers of every run referenced by a status atom, in first-seen order.
    pub fn referenced_runs(&self) -> Vec<RunId> {
        let mut out = Vec::new();
        self.collect_runs(&mut out);
        out
    }

    fn collect_runs(&self, out: &mut Vec<RunId>) {
        match self {
            ConcreteQuery::Exists(exists) => exists.args.iter().for_each(|q| q.collect_runs(out)),
            ConcreteQuery::RunTestStatusEq { runs, .. } | ConcreteQuery::RunTestStatusNeq { runs, .. } => {
                for id in runs {
                    if !out.contains(id) {
                        out.push(*id);
                    }
                }
            }
            ConcreteQuery::Not(arg) => arg.collect_runs(out),
            ConcreteQuery::Or(args) | ConcreteQuery::And(args) => {
                args.iter().for_each(|q| q.collect_runs(out))
            }
            ConcreteQuery::TestNamePattern { .. } | ConcreteQuery::True | ConcreteQuery::False => {}
        }
    }
}
