//! SQL backend that compiles bound queries into grouped SQL queries using sea-query.
//!
//! Results are assumed to live in a single table of `(run_id, test_name, status)`
//! rows. A bound query becomes a `HAVING` clause over rows grouped by test name,
//! where every status atom counts the matching rows among its runs:
//!
//! ```text
//! SELECT "test_name" FROM "test_results"
//! WHERE "run_id" IN (1, 2)
//! GROUP BY "test_name"
//! HAVING SUM(CASE WHEN "run_id" IN (1, 2) AND "status" = 1 THEN 1 ELSE 0 END) > 0
//!    AND SUM(CASE WHEN "run_id" IN (1, 2) AND "status" = 6 THEN 1 ELSE 0 END) > 0
//! ```

use crate::concrete::ConcreteQuery;
use crate::config::SqlConfig;
use crate::cost::check_budget;
use crate::plan::{BindError, Binder, Plan};
use crate::run::{RunId, TestRun};
use crate::status::TestStatus;
use sea_query::{Expr, Func, Iden, LikeExpr, PostgresQueryBuilder, SelectStatement, SimpleExpr};
use tracing::debug;

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Columns of the results table
#[derive(Debug, Clone, Copy)]
pub enum ColumnName {
    RunId,
    TestName,
    Status,
}

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            ColumnName::RunId => "run_id",
            ColumnName::TestName => "test_name",
            ColumnName::Status => "status",
        };
        write!(s, "{}", name).unwrap();
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    /// A disjunction of status equalities over the same runs became one `IN`
    OrToIn { browser_name: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// Binder that compiles bound queries to SQL
#[derive(Debug, Clone)]
pub struct SqlBinder {
    config: SqlConfig,
    max_query_size: usize,
}

impl SqlBinder {
    pub fn new(config: SqlConfig, max_query_size: usize) -> Self {
        Self { config, max_query_size }
    }

    /// Compile a single condition with optimizations
    fn compile_condition(&self, query: &ConcreteQuery, optimizations: &mut Vec<Optimization>) -> SimpleExpr {
        match query {
            ConcreteQuery::Exists(exists) => {
                let args = exists
                    .args
                    .iter()
                    .map(|q| self.compile_condition(q, optimizations))
                    .collect();
                combine_with_or(args)
            }
            ConcreteQuery::TestNamePattern { pattern } => {
                let like = format!("%{}%", escape_like(&pattern.to_lowercase()));
                Expr::expr(Func::lower(Expr::col(ColumnName::TestName))).like(LikeExpr::new(like).escape('\\'))
            }
            ConcreteQuery::RunTestStatusEq { runs, status, .. } => {
                count_matches(runs, Expr::col(ColumnName::Status).eq(status.code()))
            }
            ConcreteQuery::RunTestStatusNeq { runs, status, .. } => {
                count_matches(runs, Expr::col(ColumnName::Status).ne(status.code()))
            }
            ConcreteQuery::Not(arg) => self.compile_condition(arg, optimizations).not(),
            ConcreteQuery::Or(args) => {
                if let Some((expr, opt)) = self.try_optimize_or_to_in(args) {
                    optimizations.push(opt);
                    expr
                } else {
                    let args = args.iter().map(|q| self.compile_condition(q, optimizations)).collect();
                    combine_with_or(args)
                }
            }
            ConcreteQuery::And(args) => {
                let args = args.iter().map(|q| self.compile_condition(q, optimizations)).collect();
                combine_with_and(args)
            }
            ConcreteQuery::True => Expr::val(true).into(),
            ConcreteQuery::False => Expr::val(false).into(),
        }
    }

    /// Try to merge a disjunction of status equalities on the same runs into
    /// a single `status IN (...)` count
    fn try_optimize_or_to_in(&self, args: &[ConcreteQuery]) -> Option<(SimpleExpr, Optimization)> {
        if args.len() < self.config.max_or_conditions_for_in {
            return None;
        }
        let (browser_name, runs) = match args.first()? {
            ConcreteQuery::RunTestStatusEq { browser_name, runs, .. } => (browser_name, runs),
            _ => return None,
        };

        let mut statuses: Vec<TestStatus> = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                ConcreteQuery::RunTestStatusEq { runs: other, status, .. } if other == runs => {
                    statuses.push(*status)
                }
                _ => return None,
            }
        }

        let expr = count_matches(
            runs,
            Expr::col(ColumnName::Status).is_in(statuses.iter().map(|s| s.code())),
        );
        let optimization = Optimization::OrToIn {
            browser_name: browser_name.clone(),
            value_count: statuses.len(),
        };
        Some((expr, optimization))
    }
}

/// `SUM(CASE WHEN run_id IN (runs) AND <status_cond> THEN 1 ELSE 0 END) > 0`
fn count_matches(runs: &[RunId], status_cond: SimpleExpr) -> SimpleExpr {
    if runs.is_empty() {
        return Expr::val(false).into();
    }
    let hit = Expr::case(
        Expr::col(ColumnName::RunId)
            .is_in(runs.iter().copied())
            .and(status_cond),
        1,
    )
    .finally(0);
    Expr::expr(Func::sum(hit)).gt(0)
}

fn escape_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Combine multiple conditions with AND
fn combine_with_and(conditions: Vec<SimpleExpr>) -> SimpleExpr {
    conditions
        .into_iter()
        .reduce(|acc, expr| acc.and(expr))
        .unwrap_or_else(|| Expr::val(true).into())
}

/// Combine multiple conditions with OR
fn combine_with_or(conditions: Vec<SimpleExpr>) -> SimpleExpr {
    conditions
        .into_iter()
        .reduce(|acc, expr| acc.or(expr))
        .unwrap_or_else(|| Expr::val(false).into())
}

impl Binder for SqlBinder {
    type Plan = SqlPlan;

    fn bind(&self, runs: &[TestRun], query: &ConcreteQuery) -> Result<SqlPlan, BindError> {
        if runs.is_empty() {
            return Err(BindError::NoRuns);
        }
        if runs.len() > self.config.max_in_values {
            return Err(BindError::Unsupported(format!(
                "{} runs exceed the IN list limit of {}",
                runs.len(),
                self.config.max_in_values
            )));
        }
        let size = check_budget(query, self.max_query_size)?;

        let mut optimizations = Vec::new();
        let condition = self.compile_condition(query, &mut optimizations);
        debug!(size, optimizations = optimizations.len(), "compiled query to SQL condition");

        Ok(SqlPlan {
            table: self.config.table.clone(),
            condition,
            optimizations,
        })
    }
}

/// A compiled `HAVING` condition, rendered against the runs given to `execute`
#[derive(Debug, Clone)]
pub struct SqlPlan {
    table: String,
    condition: SimpleExpr,
    optimizations: Vec<Optimization>,
}

impl SqlPlan {
    pub fn statement(&self, runs: &[TestRun]) -> SelectStatement {
        let mut select = SelectStatement::new();
        select
            .column(ColumnName::TestName)
            .from(TableName(self.table.clone()))
            .and_where(Expr::col(ColumnName::RunId).is_in(runs.iter().map(|run| run.id)))
            .group_by_col(ColumnName::TestName)
            .and_having(self.condition.clone());
        select
    }
}

impl Plan for SqlPlan {
    type Output = CompileResult;

    fn execute(&self, runs: &[TestRun]) -> CompileResult {
        CompileResult {
            sql: self.statement(runs).to_string(PostgresQueryBuilder),
            optimizations: self.optimizations.clone(),
        }
    }
}
