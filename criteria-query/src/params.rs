use std::collections::HashMap;
use std::sync::Arc;

use criteria_errors::{invalid_argument, CriteriaResult};
use criteria_kernel::ParameterKey;
use criteria_metamodel::JavaType;
use indexmap::IndexMap;

use crate::node::{Node, NodeId, NodeKind};
use crate::query::QueryDef;

/// The parameters of a query, in the order they were first seen
#[derive(Debug, Default)]
pub(crate) struct ParameterMap {
    types: IndexMap<ParameterKey, JavaType>,
    by_node: HashMap<NodeId, ParameterKey>,
    positional: usize,
}

impl ParameterMap {
    /// Collect the parameters of `def`: those of the where clause, then those of the having
    /// clause, then those of every subquery, depth first.
    pub(crate) fn collect(def: &QueryDef) -> CriteriaResult<Self> {
        let mut params = Self::default();
        params.collect_level(def)?;
        Ok(params)
    }

    fn collect_level(&mut self, def: &QueryDef) -> CriteriaResult<()> {
        for clause in [&def.restriction, &def.having].into_iter().flatten() {
            walk(clause, &mut |node| {
                if node.is_parameter() {
                    self.register(node)?;
                }
                Ok(node.as_subquery().is_none())
            })?;
        }
        for subquery in &def.subqueries {
            if let Some(sub) = subquery.as_subquery() {
                let delegate = sub.delegate.lock().clone();
                self.collect_level(&delegate)?;
            }
        }
        Ok(())
    }

    /// Register the parameter `node`, returning its key and its position in the map
    pub(crate) fn register(&mut self, node: &Node) -> CriteriaResult<(ParameterKey, usize)> {
        if let Some(key) = self.by_node.get(&node.id()) {
            if let Some(index) = self.types.get_index_of(key) {
                return Ok((key.clone(), index));
            }
        }

        let key = match &node.kind {
            NodeKind::Parameter {
                name: Some(name), ..
            } => ParameterKey::Named(name.clone()),
            NodeKind::Parameter { name: None, .. } => {
                let key = ParameterKey::Positional(self.positional);
                self.positional += 1;
                key
            }
            _ => invalid_argument!("{} is not a parameter", node.describe()),
        };

        let ty = node.java_type();
        if let Some(existing) = self.types.get(&key) {
            if existing != ty {
                invalid_argument!("parameter {key} is declared as both {existing} and {ty}");
            }
        }
        let (index, _) = self.types.insert_full(key.clone(), ty.clone());
        self.by_node.insert(node.id(), key.clone());
        Ok((key, index))
    }

    pub(crate) fn types(&self) -> &IndexMap<ParameterKey, JavaType> {
        &self.types
    }
}

/// Visit `node` and its descendants depth first. `f` returns whether to descend into the
/// children of the node it was called with.
pub(crate) fn walk<F>(node: &Arc<Node>, f: &mut F) -> CriteriaResult<()>
where
    F: FnMut(&Arc<Node>) -> CriteriaResult<bool>,
{
    if f(node)? {
        for child in node.children() {
            walk(&child, f)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameter(name: Option<&str>, ty: JavaType) -> Arc<Node> {
        Node::new(
            NodeKind::Parameter {
                name: name.map(Into::into),
                value: None,
            },
            ty,
        )
    }

    #[test]
    fn keys_in_first_seen_order() {
        let mut params = ParameterMap::default();
        let a = parameter(Some("a"), JavaType::Integer);
        let p = parameter(None, JavaType::String);
        let q = parameter(None, JavaType::Long);

        assert_eq!(
            params.register(&a).unwrap(),
            (ParameterKey::Named("a".into()), 0)
        );
        assert_eq!(
            params.register(&p).unwrap(),
            (ParameterKey::Positional(0), 1)
        );
        assert_eq!(
            params.register(&q).unwrap(),
            (ParameterKey::Positional(1), 2)
        );
        assert_eq!(
            params.register(&p).unwrap(),
            (ParameterKey::Positional(0), 1)
        );
        assert_eq!(params.types().len(), 3);
    }

    #[test]
    fn same_name_is_the_same_parameter() {
        let mut params = ParameterMap::default();
        let a = parameter(Some("a"), JavaType::Integer);
        let b = parameter(Some("a"), JavaType::Integer);
        params.register(&a).unwrap();
        assert_eq!(params.register(&b).unwrap().1, 0);

        let c = parameter(Some("a"), JavaType::String);
        assert!(params.register(&c).is_err());
    }
}
