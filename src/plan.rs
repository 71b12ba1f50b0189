//! The seam between the query language and the backends that evaluate it.
//!
//! A backend implements [`Binder`] to accept a bound query and [`Plan`] to run
//! it. The two traits share no state: whatever a backend needs to execute
//! (index snapshots, compiled statements) lives in its `Plan` value.

use crate::concrete::ConcreteQuery;
use crate::run::{RunId, TestRun};
use thiserror::Error;

/// Rejections reported while binding a query, either to runs or to a backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("cannot bind a query to an empty run set")]
    NoRuns,

    #[error("run {0} is not available to this backend")]
    RunNotLoaded(RunId),

    #[error("query size {size} exceeds the limit of {limit}")]
    QueryTooLarge { size: usize, limit: usize },

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Binds a concrete query to a particular query service mechanism.
///
/// An in-memory cache may verify that the given runs are loaded and snapshot
/// the data that pertains to them; a SQL backend may compile the query into a
/// statement. Implementations may be called from several threads at once and
/// must guard any state they share across calls.
pub trait Binder {
    type Plan: Plan;

    fn bind(&self, runs: &[TestRun], query: &ConcreteQuery) -> Result<Self::Plan, BindError>;
}

/// An executable query plan. The result type belongs to the backend.
pub trait Plan {
    type Output;

    /// Runs the plan. Deterministic for a fixed plan and fixed `runs`.
    fn execute(&self, runs: &[TestRun]) -> Self::Output;
}
