use std::sync::Arc;

use criteria_errors::{internal, CriteriaResult};
use criteria_kernel::{SubqueryValue, Value};
use tracing::trace;

use crate::alias::{AliasContext, ScopeFrame};
use crate::compiler;
use crate::node::{Node, Quantifier};
use crate::subquery::SubqueryDef;

/// Compile the subquery `node` in a scope nested in the current one
fn compile(
    cx: &mut AliasContext<'_>,
    node: &Arc<Node>,
    sub: &SubqueryDef,
) -> CriteriaResult<SubqueryValue> {
    let alias = cx.alias(node);
    let def = sub.delegate.lock().clone();
    let correlated_joins = sub.correlated.read().clone();
    def.assert_root()?;

    let frame = ScopeFrame::new(&def.roots);
    let (expressions, refers_to_outer) = cx.with_frame(frame, |cx| {
        let expressions = compiler::compile_level(cx, &def, &correlated_joins)?;
        Ok((expressions, cx.frame()?.refers_to_outer()))
    })?;

    let correlated = refers_to_outer
        || !correlated_joins.is_empty()
        || def.roots.iter().any(|root| {
            root.as_path()
                .is_some_and(|path| path.correlated_target().is_some())
        });
    trace!(%alias, correlated, filter = %expressions.filter, "compiled subquery");
    Ok(SubqueryValue {
        alias,
        ty: node.java_type().clone(),
        correlated,
        expressions,
    })
}

pub(super) fn value(
    cx: &mut AliasContext<'_>,
    node: &Arc<Node>,
    sub: &Arc<SubqueryDef>,
) -> CriteriaResult<Value> {
    Ok(Value::Subquery(Box::new(compile(cx, node, sub)?)))
}

/// `ALL (subquery)` or `ANY (subquery)`
pub(super) fn quantified(
    cx: &mut AliasContext<'_>,
    quantifier: Quantifier,
    subquery: &Arc<Node>,
) -> CriteriaResult<Value> {
    let Some(sub) = subquery.as_subquery() else {
        internal!("{} quantified as a subquery", subquery.describe());
    };
    let compiled = Box::new(compile(cx, subquery, sub)?);
    Ok(match quantifier {
        Quantifier::All => Value::All(compiled),
        Quantifier::Any => Value::Any(compiled),
    })
}
