//! Lowering of query nodes to kernel values and expressions.
//!
//! Every function here takes the [`AliasContext`] of the compilation in progress: aliases are
//! assigned, variables bound, and correlated references resolved through it.

use std::sync::Arc;

use criteria_errors::{invalid_argument, CriteriaResult};
use criteria_kernel::{Expr, Literal, Value};

use crate::alias::AliasContext;
use crate::node::{Node, NodeKind};

mod expr;
pub(crate) mod path;
mod predicate;
pub(crate) mod subquery;

/// Lower `node` to a kernel value
pub(crate) fn value(cx: &mut AliasContext<'_>, node: &Arc<Node>) -> CriteriaResult<Value> {
    match &node.kind {
        NodeKind::Path(def) => path::value(cx, node, def),
        NodeKind::Predicate(def) => Ok(Value::Condition(Box::new(predicate::lower(cx, def)?))),
        NodeKind::Subquery(def) => subquery::value(cx, node, def),
        NodeKind::Quantified {
            quantifier,
            subquery,
        } => subquery::quantified(cx, *quantifier, subquery),
        NodeKind::Compound(_) => {
            invalid_argument!("compound selections can only be used as projections")
        }
        _ => expr::value(cx, node),
    }
}

/// Lower `node` to a kernel boolean expression. Boolean expressions that are not predicates are
/// tested for being `true`.
pub(crate) fn condition(cx: &mut AliasContext<'_>, node: &Arc<Node>) -> CriteriaResult<Expr> {
    match &node.kind {
        NodeKind::Predicate(def) => predicate::lower(cx, def),
        _ if node.java_type().is_boolean() => Ok(Expr::equal(
            value(cx, node)?,
            Value::literal(Literal::Boolean(true)),
        )),
        _ => invalid_argument!(
            "{} of type {} cannot be used as a condition",
            node.describe(),
            node.java_type()
        ),
    }
}
