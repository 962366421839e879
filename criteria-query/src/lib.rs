//! Typed criteria queries and their compiler.
//!
//! A query is built as a graph of nodes: roots ranging over entity types, paths navigating from
//! them, expressions, predicates and selections. [`CriteriaBuilder`] creates queries and the
//! nodes they are made of; [`CriteriaQuery::compile`] walks the graph and produces the
//! backend-neutral [`QueryExpressions`](criteria_kernel::QueryExpressions) the execution engine
//! consumes.
//!
//! Compilation is deterministic: aliases are generated in a fixed order and kept on the query,
//! so compiling the same query twice gives the same result.

mod alias;
mod builder;
mod case;
mod compiler;
mod compound;
mod expression;
mod fmt;
mod lower;
mod node;
mod options;
mod params;
mod path;
mod predicate;
mod query;
mod render;
mod shape;
mod subquery;

pub use crate::builder::CriteriaBuilder;
pub use crate::case::{Case, SimpleCase};
pub use crate::compound::CompoundSelection;
pub use crate::expression::{Expression, Order, Selectable, Selection};
pub use crate::node::{NodeId, Quantifier};
pub use crate::options::{CompilerOptions, DEFAULT_ALIAS_PREFIX};
pub use crate::path::{Fetch, JoinType, Path};
pub use crate::predicate::{BooleanOperator, Predicate};
pub use crate::query::CriteriaQuery;
pub use crate::subquery::Subquery;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use criteria_metamodel::Metamodel;

    pub(crate) fn company() -> Arc<Metamodel> {
        Arc::new(Metamodel::from_json(include_str!("../tests/fixtures/company.json")).unwrap())
    }
}
