//! The backend-neutral intermediate representation produced by the criteria query compiler.
//!
//! A compiled query is a [`QueryExpressions`]: a filter [`Expr`], grouping, ordering and
//! projection [`Value`]s, fetch hints, parameter types and a [`ResultShape`] describing how flat
//! result rows are assembled into the query's results. The execution engine consumes this
//! structure; nothing in it refers back to the builder-level node graph.

use std::collections::BTreeSet;

use criteria_metamodel::JavaType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod expr;
mod literal;
mod shape;
mod value;

pub use crate::expr::{CompareOp, Expr};
pub use crate::literal::Literal;
pub use crate::shape::{FillStrategy, ResultShape};
pub use crate::value::{
    AggregateFunction, ArithmeticOp, ParameterKey, Path, PathOrigin, PathStep, SubqueryValue,
    Temporal, TrimSpec, UnaryFunction, Value, Variable,
};

/// One projected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub value: Value,
    pub alias: String,
    /// The text the projection is known by in result metadata
    pub clause: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub value: Value,
    pub alias: String,
    pub ascending: bool,
}

/// One level (top-level query or subquery) of a compiled criteria query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryExpressions {
    /// The type of the query's candidate, ie its first root
    pub candidate: JavaType,
    pub filter: Expr,
    pub grouping: Vec<Value>,
    /// `None` when the query neither groups nor has a having clause
    pub having: Option<Expr>,
    /// Empty when the query projects its candidate
    pub projections: Vec<Projection>,
    pub ordering: Vec<Ordering>,
    /// Eager fetch paths through inner fetch joins, as `DeclaringType.attribute`
    pub fetch_inner_paths: Vec<String>,
    /// Eager fetch paths through every fetch join
    pub fetch_paths: Vec<String>,
    pub distinct: bool,
    pub result_class: JavaType,
    /// The declared type of each parameter, in first-seen order
    pub parameter_types: IndexMap<ParameterKey, JavaType>,
    /// Names of the managed types the query touches
    pub access_path: BTreeSet<String>,
    /// Variables declared at this level, by alias
    pub variables: IndexMap<String, JavaType>,
    /// Only computed for top-level queries
    pub result_shape: Option<ResultShape>,
}

impl QueryExpressions {
    pub fn new(candidate: JavaType, result_class: JavaType) -> Self {
        Self {
            candidate,
            filter: Expr::True,
            grouping: vec![],
            having: None,
            projections: vec![],
            ordering: vec![],
            fetch_inner_paths: vec![],
            fetch_paths: vec![],
            distinct: false,
            result_class,
            parameter_types: IndexMap::new(),
            access_path: BTreeSet::new(),
            variables: IndexMap::new(),
            result_shape: None,
        }
    }

    pub fn is_default_projection(&self) -> bool {
        self.projections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_queries_filter_nothing_out() {
        let exprs = QueryExpressions::new(JavaType::managed("Employee"), JavaType::Object);
        assert!(exprs.filter.is_true());
        assert!(exprs.having.is_none());
        assert!(exprs.is_default_projection());
    }
}
