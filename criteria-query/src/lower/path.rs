//! Lowering of roots, joins and attribute paths, and the variable bindings joins introduce.

use std::sync::Arc;

use criteria_errors::{internal, invalid_argument, unsupported, CriteriaResult};
use criteria_kernel::{Expr, Path as KernelPath, PathStep, Value, Variable};
use criteria_metamodel::Attribute;
use tracing::trace;

use super::value as lower;
use crate::alias::AliasContext;
use crate::node::Node;
use crate::path::{path_def, JoinType, PathDef, PathKind};

fn variable_path(var: &Variable, outer: bool) -> KernelPath {
    let mut path = KernelPath::from_variable(var);
    path.outer = outer;
    path
}

fn mark_outer(mut value: Value, outer: bool) -> Value {
    if let Value::Path(path) = &mut value {
        path.outer |= outer;
    }
    value
}

fn conjoin(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
    Expr::conjoin(left.into_iter().chain(right))
}

pub(super) fn value(
    cx: &mut AliasContext<'_>,
    node: &Arc<Node>,
    def: &PathDef,
) -> CriteriaResult<Value> {
    if let Some(target) = def.correlated_target() {
        return lower(cx, target);
    }

    match &def.kind {
        PathKind::Root { .. } => root_value(cx, node),
        PathKind::Attribute => navigate(cx, node, def),
        PathKind::Join { .. } => {
            if !def.is_plural_join() {
                if let Some((value, outer)) = cx.registered_value(node.id()) {
                    return Ok(mark_outer(value, outer));
                }
            }
            match cx.registered_variable(node.id()) {
                Some((var, outer)) => Ok(Value::Path(variable_path(&var, outer))),
                None => navigate(cx, node, def),
            }
        }
        PathKind::KeyJoin { .. } => match cx.registered_variable(node.id()) {
            Some((var, outer)) => Ok(Value::Path(variable_path(&var, outer))),
            None => map_key(cx, node, def),
        },
        PathKind::MapKey => map_key(cx, node, def),
        PathKind::Fetch { .. } => invalid_argument!("fetch joins cannot be used as values"),
    }
}

fn root_value(cx: &mut AliasContext<'_>, node: &Arc<Node>) -> CriteriaResult<Value> {
    if let Some((var, outer)) = cx.registered_root_variable(node.id()) {
        return Ok(Value::Path(variable_path(&var, outer)));
    }
    let Some(outer) = cx.root_scope(node.id()) else {
        invalid_argument!(
            "root {} belongs to neither this query nor an enclosing one",
            node.java_type()
        );
    };
    let alias = cx.alias(node);
    let mut path = KernelPath::candidate(node.java_type().clone(), alias.clone());
    path.alias = Some(alias);
    path.outer = outer;
    Ok(Value::Path(path))
}

fn map_key(cx: &mut AliasContext<'_>, node: &Arc<Node>, def: &PathDef) -> CriteriaResult<Value> {
    let Some(map) = def.parent() else {
        internal!("{} has no map join", def.kind.describe());
    };
    Ok(Value::MapKey {
        map: Box::new(lower(cx, &map)?),
        ty: node.java_type().clone(),
    })
}

/// The name of the embedded field a path stands for, eg `Employee.address`
fn field_name(node: &Node) -> Option<String> {
    let def = node.as_path()?;
    let attribute = def.attribute.as_ref()?;
    match def.parent() {
        Some(parent) if is_embedded(&parent) => {
            Some(format!("{}.{}", field_name(&parent)?, attribute.name))
        }
        _ => Some(attribute.full_name()),
    }
}

fn is_embedded(node: &Node) -> bool {
    node.as_path()
        .and_then(|def| def.attribute.as_ref())
        .is_some_and(|a| a.is_embedded())
}

fn declaring_type(parent: &Node, attribute: &Attribute) -> String {
    if is_embedded(parent) {
        if let Some(name) = field_name(parent) {
            return name;
        }
    }
    attribute.declaring_type.clone()
}

/// Extend the path of `node`'s parent by `node`'s attribute. Parents bound to a variable are
/// navigated from that variable.
pub(crate) fn navigate(
    cx: &mut AliasContext<'_>,
    node: &Arc<Node>,
    def: &PathDef,
) -> CriteriaResult<Value> {
    let (Some(parent), Some(attribute)) = (def.parent(), def.attribute.as_ref()) else {
        internal!("{} has nothing to navigate from", def.kind.describe());
    };

    let base = match cx.registered_variable(parent.id()) {
        Some((var, outer)) => variable_path(&var, outer),
        None => match lower(cx, &parent)? {
            Value::Path(path) => path,
            other => unsupported!("cannot navigate to '{}' from {other}", attribute.name),
        },
    };
    let step = PathStep {
        field: attribute.name.clone(),
        declaring_type: declaring_type(&parent, attribute),
        allow_null: def.join_type().is_some_and(JoinType::is_outer),
    };
    let mut path = base.get(step, node.java_type().clone());
    path.alias = None;
    Ok(Value::Path(path))
}

/// The filters binding the joins below `def`, in join order
fn children_filter(cx: &mut AliasContext<'_>, def: &PathDef) -> CriteriaResult<Option<Expr>> {
    let mut filters = vec![];
    for join in def.joins() {
        filters.extend(join_filter(cx, &join)?);
    }
    Ok(Expr::conjoin(filters))
}

/// Bind a variable for `join`, then for each join below it.
///
/// Joins that stand for a join of an enclosing query bind nothing themselves. A map join whose
/// keys are joined binds through its key join.
pub(crate) fn join_filter(cx: &mut AliasContext<'_>, join: &Arc<Node>) -> CriteriaResult<Option<Expr>> {
    let def = path_def(join)?;
    if def.correlated_target().is_some() {
        return children_filter(cx, def);
    }
    if let Some(key_join) = def.key_join() {
        let key = join_filter(cx, &key_join)?;
        return Ok(conjoin(key, children_filter(cx, def)?));
    }

    let bind = if cx.is_registered(join.id()) {
        None
    } else {
        let mut path = match def.kind {
            PathKind::KeyJoin { .. } => map_key(cx, join, def)?,
            _ => navigate(cx, join, def)?,
        };
        let alias = cx.alias(join);
        path.set_alias(&alias);
        let mut var = Variable::bound(alias.clone(), join.java_type().clone());
        var.alias = Some(alias.clone());
        trace!(%alias, %path, "binding join variable");
        cx.register_variable(join, Value::Variable(var.clone()), path.clone())?;
        Some(Expr::BindVariable {
            variable: var,
            path,
        })
    };
    Ok(conjoin(bind, children_filter(cx, def)?))
}

/// The filter contributed by the root `root`: the joins below it, preceded, for a root standing
/// for a root of an enclosing query, by an equality with that root
pub(crate) fn root_filter(
    cx: &mut AliasContext<'_>,
    root: &Arc<Node>,
    is_candidate: bool,
) -> CriteriaResult<Option<Expr>> {
    let def = path_def(root)?;
    let correlation = match def.correlated_target() {
        Some(target) if is_candidate => {
            let alias = cx.alias(root);
            let mut candidate = KernelPath::candidate(root.java_type().clone(), alias.clone());
            candidate.alias = Some(alias);
            let outer = lower(cx, target)?;
            Some(Expr::equal(Value::Path(candidate), outer))
        }
        _ => None,
    };
    Ok(conjoin(correlation, children_filter(cx, def)?))
}

#[cfg(test)]
mod tests {
    use criteria_kernel::PathOrigin;
    use criteria_metamodel::JavaType;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::alias::{AliasRegistry, ScopeFrame};
    use crate::expression::Selectable;
    use crate::options::CompilerOptions;
    use crate::params::ParameterMap;
    use crate::path::Path;
    use crate::testing::company;

    fn with_root<T>(
        root: &Path,
        f: impl FnOnce(&mut AliasContext<'_>) -> CriteriaResult<T>,
    ) -> CriteriaResult<T> {
        let model = company();
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);
        cx.with_frame(ScopeFrame::new(&[Arc::clone(&root.0)]), f)
    }

    #[test]
    fn embedded_fields_are_declared_by_their_field() {
        let e = Path::root(&company(), "Employee").unwrap();
        e.set_alias("e").unwrap();
        let city = e.get("address").unwrap().get("city").unwrap();
        let value = with_root(&e, |cx| lower(cx, city.node())).unwrap();
        let path = value.as_path().unwrap();
        assert_eq!(path.origin, PathOrigin::Candidate);
        assert_eq!(path.to_string(), "e.address.city");
        assert_eq!(path.last().unwrap().full_name(), "Employee.address.city");
        assert_eq!(path.ty, JavaType::String);
    }

    #[test]
    fn joins_bind_variables_over_their_parent() {
        let e = Path::root(&company(), "Employee").unwrap();
        e.set_alias("e").unwrap();
        let phones = e.join_with("phones", JoinType::Left).unwrap();
        phones.set_alias("p").unwrap();
        let number = phones.get("number").unwrap();

        let (filter, value) = with_root(&e, |cx| {
            let filter = root_filter(cx, &e.0, true)?;
            Ok((filter, lower(cx, number.node())?))
        })
        .unwrap();

        match filter.unwrap() {
            Expr::BindVariable { variable, path } => {
                assert_eq!(variable.name, "p");
                assert_eq!(path.to_string(), "e.phones");
                assert!(path.as_path().unwrap().last().unwrap().allow_null);
            }
            other => panic!("unexpected filter {other}"),
        }
        assert_eq!(value.as_path().unwrap().variable_name(), Some("p"));
        assert_eq!(value.to_string(), "p.number");
    }

    #[test]
    fn map_key_joins_bind_over_the_keys() {
        let e = Path::root(&company(), "Employee").unwrap();
        e.set_alias("e").unwrap();
        let contacts = e.join("contacts").unwrap();
        let key = contacts.join_key(JoinType::Inner).unwrap();
        key.set_alias("k").unwrap();

        let filter = with_root(&e, |cx| root_filter(cx, &e.0, true)).unwrap();
        assert_eq!(filter.unwrap().to_string(), "bind(k in key(e.contacts))");
    }

    #[test]
    fn foreign_roots_are_rejected() {
        let e = Path::root(&company(), "Employee").unwrap();
        let d = Path::root(&company(), "Department").unwrap();
        let err = with_root(&e, |cx| lower(cx, d.node())).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
