//! The compiler driver: assembles the [`QueryExpressions`] of one query level from its clauses.
//!
//! The passes run in a fixed order, since later passes depend on the variables bound and the
//! values lowered by earlier ones:
//!
//! 1. access path
//! 2. distinct
//! 3. fetch paths
//! 4. cross-joined roots
//! 5. filter
//! 6. grouping and having
//! 7. ordering
//! 8. projections

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use criteria_errors::CriteriaResult;
use criteria_kernel::{Expr, Ordering, Projection, QueryExpressions, Value, Variable};
use tracing::{debug, trace};

use crate::alias::{AliasContext, ScopeFrame};
use crate::lower::{condition, path, value as lower_value};
use crate::node::{Node, NodeId, NodeKind};
use crate::path::{path_def, JoinType};
use crate::query::QueryDef;
use crate::shape;

/// Compile a top-level query, including the shape of its results
pub(crate) fn compile(cx: &mut AliasContext<'_>, def: &QueryDef) -> CriteriaResult<QueryExpressions> {
    let frame = ScopeFrame::new(&def.roots);
    cx.with_frame(frame, |cx| {
        let mut exprs = compile_level(cx, def, &[])?;
        exprs.result_shape = Some(shape::result_shape(cx, def)?);
        debug!(
            result_shape = %exprs.result_shape.as_ref().map(ToString::to_string).unwrap_or_default(),
            "compiled criteria query"
        );
        Ok(exprs)
    })
}

/// Compile one query level in the scope frame already pushed for it. `correlated` are the joins
/// of enclosing queries a subquery is correlated with.
pub(crate) fn compile_level(
    cx: &mut AliasContext<'_>,
    def: &QueryDef,
    correlated: &[Arc<Node>],
) -> CriteriaResult<QueryExpressions> {
    let candidate = def
        .roots
        .first()
        .map(|root| root.java_type().clone())
        .unwrap_or_else(|| def.result_type.clone());
    let mut exprs = QueryExpressions::new(candidate, def.result_type.clone());

    exprs.access_path = access_path(def, correlated);
    exprs.distinct = def.distinct;
    for root in &def.roots {
        fetch_paths(
            root,
            &mut exprs.fetch_inner_paths,
            &mut exprs.fetch_paths,
        )?;
    }

    if def.roots.len() > 1 && correlated.is_empty() {
        for root in &def.roots[1..] {
            if path_def(root)?.correlated_target().is_some() {
                continue;
            }
            let alias = cx.alias(root);
            trace!(%alias, "declaring cross-joined root");
            cx.register_root(root, Variable::unbound(alias, root.java_type().clone()))?;
        }
    }

    exprs.filter = filter(cx, def, correlated)?;
    trace!(filter = %exprs.filter, "lowered filter");

    exprs.grouping = def
        .grouping
        .iter()
        .map(|g| lower_value(cx, g))
        .collect::<CriteriaResult<_>>()?;
    exprs.having = match &def.having {
        Some(having) => Some(condition(cx, having)?),
        None if !exprs.grouping.is_empty() => Some(Expr::True),
        None => None,
    };

    let mut lowered: HashMap<NodeId, Value> = HashMap::new();
    for order in &def.ordering {
        let node = &order.expression().0;
        let value = lower_value(cx, node)?;
        lowered.insert(node.id(), value.clone());
        let alias = cx.alias(node);
        trace!(%alias, %value, ascending = order.is_ascending(), "lowered ordering");
        exprs.ordering.push(Ordering {
            value,
            alias,
            ascending: order.is_ascending(),
        });
    }

    if let Some(selection) = def.selection.as_ref().filter(|_| !def.is_default_projection()) {
        projections(cx, selection, &lowered, &mut exprs.projections)?;
    }

    exprs.variables = cx.frame()?.schema().clone();
    debug!(
        candidate = %exprs.candidate,
        projections = exprs.projections.len(),
        ordering = exprs.ordering.len(),
        variables = exprs.variables.len(),
        "compiled query level"
    );
    Ok(exprs)
}

/// The managed types reached by the roots, joins and fetches of a query level
fn access_path(def: &QueryDef, correlated: &[Arc<Node>]) -> BTreeSet<String> {
    fn visit(node: &Arc<Node>, out: &mut BTreeSet<String>) {
        if let Some(name) = node.java_type().managed_name() {
            out.insert(name.to_owned());
        }
        if let Some(def) = node.as_path() {
            for child in def
                .joins()
                .into_iter()
                .chain(def.key_join())
                .chain(def.fetches())
            {
                visit(&child, out);
            }
        }
    }

    let mut out = BTreeSet::new();
    for node in def.roots.iter().chain(correlated) {
        visit(node, &mut out);
    }
    out
}

/// Collect the eager fetch paths below `from`, through its joins and fetches
fn fetch_paths(
    from: &Arc<Node>,
    inner: &mut Vec<String>,
    all: &mut Vec<String>,
) -> CriteriaResult<()> {
    let def = path_def(from)?;
    for fetch in def.fetches() {
        let fetch_def = path_def(&fetch)?;
        if let Some(attribute) = &fetch_def.attribute {
            let name = attribute.full_name();
            if fetch_def.join_type() == Some(JoinType::Inner) {
                inner.push(name.clone());
            }
            all.push(name);
        }
        fetch_paths(&fetch, inner, all)?;
    }
    for join in def.joins() {
        fetch_paths(&join, inner, all)?;
    }
    Ok(())
}

/// The conjunction of the join filters of every root and correlated join, and the restriction
fn filter(
    cx: &mut AliasContext<'_>,
    def: &QueryDef,
    correlated: &[Arc<Node>],
) -> CriteriaResult<Expr> {
    let mut filters = vec![];
    for (i, root) in def.roots.iter().enumerate() {
        filters.extend(path::root_filter(cx, root, i == 0)?);
    }
    for join in correlated {
        filters.extend(path::join_filter(cx, join)?);
    }
    if let Some(restriction) = &def.restriction {
        filters.push(condition(cx, restriction)?);
    }
    Ok(Expr::conjoin(filters).unwrap_or(Expr::True))
}

/// Flatten `selection` into projections, depth first through compound selections. Values already
/// lowered for the ordering are reused.
fn projections(
    cx: &mut AliasContext<'_>,
    selection: &Arc<Node>,
    lowered: &HashMap<NodeId, Value>,
    out: &mut Vec<Projection>,
) -> CriteriaResult<()> {
    if let NodeKind::Compound(def) = &selection.kind {
        for item in &def.items {
            projections(cx, item, lowered, out)?;
        }
        return Ok(());
    }

    let mut value = match lowered.get(&selection.id()) {
        Some(value) => value.clone(),
        None => lower_value(cx, selection)?,
    };
    let alias = cx.alias(selection);
    value.set_alias(&alias);
    trace!(%alias, %value, "lowered projection");
    out.push(Projection {
        value,
        clause: alias.clone(),
        alias,
    });
    Ok(())
}
