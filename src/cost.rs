//! Query cost estimation.
//!
//! The size of a query approximates the work per test needed to evaluate it:
//! each atom is one lookup or match, `Not` adds one unit on top of its
//! argument, combinators sum their arguments and constants are free.

use crate::ast::{ItemQuery, RunQuery};
use crate::concrete::{ConcreteQuery, Exists};
use crate::plan::BindError;

pub trait Size {
    fn size(&self) -> usize;
}

impl<T: Size> Size for [T] {
    fn size(&self) -> usize {
        self.iter().map(Size::size).sum()
    }
}

impl<T: Size> Size for Vec<T> {
    fn size(&self) -> usize {
        self.as_slice().size()
    }
}

impl Size for ItemQuery {
    fn size(&self) -> usize {
        match self {
            ItemQuery::TestNamePattern { .. }
            | ItemQuery::StatusEq { .. }
            | ItemQuery::StatusNeq { .. } => 1,
            ItemQuery::Not(arg) => 1 + arg.size(),
            ItemQuery::Or(args) | ItemQuery::And(args) => args.size(),
            ItemQuery::True | ItemQuery::False => 0,
        }
    }
}

impl Size for RunQuery {
    fn size(&self) -> usize {
        self.exists.size()
    }
}

impl Size for Exists {
    fn size(&self) -> usize {
        self.args.size()
    }
}

impl Size for ConcreteQuery {
    fn size(&self) -> usize {
        match self {
            ConcreteQuery::Exists(exists) => exists.size(),
            ConcreteQuery::TestNamePattern { .. }
            | ConcreteQuery::RunTestStatusEq { .. }
            | ConcreteQuery::RunTestStatusNeq { .. } => 1,
            ConcreteQuery::Not(arg) => 1 + arg.size(),
            ConcreteQuery::Or(args) | ConcreteQuery::And(args) => args.size(),
            ConcreteQuery::True | ConcreteQuery::False => 0,
        }
    }
}

/// Rejects queries whose size exceeds `limit`; returns the size otherwise.
pub fn check_budget<Q: Size + ?Sized>(query: &Q, limit: usize) -> Result<usize, BindError> {
    let size = query.size();
    if size > limit {
        return Err(BindError::QueryTooLarge { size, limit });
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TestStatus;

    fn eq(browser: &str) -> ItemQuery {
        ItemQuery::status_eq(browser, TestStatus::Pass)
    }

    #[test]
    fn test_atoms_cost_one() {
        assert_eq!(ItemQuery::pattern("a").size(), 1);
        assert_eq!(eq("chrome").size(), 1);
        assert_eq!(ItemQuery::status_neq("chrome", TestStatus::Fail).size(), 1);
    }

    #[test]
    fn test_constants_are_free() {
        assert_eq!(ItemQuery::True.size(), 0);
        assert_eq!(ItemQuery::False.size(), 0);
        assert_eq!(ConcreteQuery::True.size(), 0);
        assert_eq!(ConcreteQuery::False.size(), 0);
    }

    #[test]
    fn test_combinators() {
        let a = ItemQuery::And(vec![eq("chrome"), ItemQuery::pattern("x")]);
        let b = ItemQuery::negate(ItemQuery::Or(vec![eq("firefox"), eq("safari"), ItemQuery::True]));
        assert_eq!(a.size(), 2);
        assert_eq!(b.size(), 3);
        assert_eq!(ItemQuery::And(vec![a.clone(), b.clone()]).size(), a.size() + b.size());
        assert_eq!(ItemQuery::negate(ItemQuery::negate(a)).size(), 4);
    }

    #[test]
    fn test_run_query_sums_alternatives() {
        let rq = RunQuery {
            run_ids: vec![1],
            exists: vec![eq("chrome"), ItemQuery::negate(eq("edge"))],
        };
        assert_eq!(rq.size(), 3);
    }

    #[test]
    fn test_check_budget() {
        let q = ItemQuery::Or(vec![eq("chrome"), eq("edge"), eq("firefox")]);
        assert_eq!(check_budget(&q, 3), Ok(3));
        assert_eq!(
            check_budget(&q, 2),
            Err(BindError::QueryTooLarge { size: 3, limit: 2 })
        );
    }
}
