use std::sync::Arc;

use criteria_errors::{invalid_argument, CriteriaResult};
use criteria_metamodel::{JavaType, Metamodel};
use parking_lot::{Mutex, RwLock};

use crate::expression::{Expression, Order, Selection};
use crate::node::{Node, NodeKind};
use crate::path::{Path, PathKind};
use crate::predicate::Predicate;
use crate::query::QueryDef;

/// The clauses of a subquery, and the joins of enclosing queries it is correlated with
#[derive(Debug)]
pub(crate) struct SubqueryDef {
    pub delegate: Mutex<QueryDef>,
    pub correlated: RwLock<Vec<Arc<Node>>>,
}

/// A query nested in another query, usable wherever an expression is.
///
/// A subquery can refer to the roots and joins of the queries enclosing it, either directly or
/// through the correlated copies made by [`correlate_root`](Subquery::correlate_root) and
/// [`correlate_join`](Subquery::correlate_join).
#[derive(Debug, Clone)]
pub struct Subquery {
    pub(crate) node: Arc<Node>,
    pub(crate) def: Arc<SubqueryDef>,
}

impl Subquery {
    pub(crate) fn new(model: Arc<Metamodel>, ty: JavaType) -> Self {
        let def = Arc::new(SubqueryDef {
            delegate: Mutex::new(QueryDef::new(model, ty.clone())),
            correlated: RwLock::new(vec![]),
        });
        let node = Node::new(NodeKind::Subquery(Arc::clone(&def)), ty);
        Self { node, def }
    }

    pub fn from(&self, entity: &str) -> CriteriaResult<Path> {
        self.def.delegate.lock().from(entity)
    }

    pub fn select(&self, selection: impl Into<Expression>) -> &Self {
        self.def.delegate.lock().select(selection.into().0);
        self
    }

    pub fn where_(&self, restriction: impl Into<Expression>) -> CriteriaResult<&Self> {
        self.def
            .delegate
            .lock()
            .set_restriction(restriction.into().0)?;
        Ok(self)
    }

    pub fn where_all(&self, predicates: Vec<Predicate>) -> &Self {
        self.def.delegate.lock().set_restrictions(predicates);
        self
    }

    pub fn order_by<I>(&self, orders: I) -> &Self
    where
        I: IntoIterator<Item = Order>,
    {
        self.def.delegate.lock().ordering = orders.into_iter().collect();
        self
    }

    pub fn group_by<I>(&self, grouping: I) -> &Self
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        self.def.delegate.lock().grouping = grouping.into_iter().map(|g| g.into().0).collect();
        self
    }

    pub fn having(&self, having: impl Into<Expression>) -> CriteriaResult<&Self> {
        self.def.delegate.lock().set_having(having.into().0)?;
        Ok(self)
    }

    pub fn having_all(&self, predicates: Vec<Predicate>) -> &Self {
        self.def.delegate.lock().set_havings(predicates);
        self
    }

    pub fn distinct(&self, distinct: bool) -> &Self {
        self.def.delegate.lock().distinct = distinct;
        self
    }

    /// Create a subquery nested in this one
    pub fn subquery(&self, ty: JavaType) -> Subquery {
        self.def.delegate.lock().subquery(ty)
    }

    /// Add a root to this subquery standing for the root `root` of an enclosing query
    pub fn correlate_root(&self, root: &Path) -> CriteriaResult<Path> {
        if !matches!(root.def()?.kind, PathKind::Root { .. }) {
            invalid_argument!("only roots can be correlated as roots");
        }
        let clone = Path::correlated_clone(root)?;
        self.def.delegate.lock().roots.push(Arc::clone(&clone.0));
        Ok(clone)
    }

    /// Make the join `join` of an enclosing query available to this subquery. Joins made from
    /// the returned path range over the enclosing query's join variable.
    pub fn correlate_join(&self, join: &Path) -> CriteriaResult<Path> {
        if !matches!(join.def()?.kind, PathKind::Join { .. }) {
            invalid_argument!("only joins can be correlated as joins");
        }
        let clone = Path::correlated_clone(join)?;
        self.def.correlated.write().push(Arc::clone(&clone.0));
        Ok(clone)
    }

    pub fn correlated_joins(&self) -> Vec<Path> {
        self.def.correlated.read().iter().cloned().map(Path).collect()
    }

    pub fn roots(&self) -> Vec<Path> {
        self.def
            .delegate
            .lock()
            .roots
            .iter()
            .cloned()
            .map(Path)
            .collect()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.def.delegate.lock().selection.clone().map(Selection)
    }

    pub fn as_expression(&self) -> Expression {
        Expression(Arc::clone(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::company;

    #[test]
    fn correlation_checks_the_kind_of_path() {
        let e = Path::root(&company(), "Employee").unwrap();
        let phones = e.join("phones").unwrap();
        let sub = Subquery::new(company(), JavaType::Long);

        assert!(sub.correlate_root(&phones).is_err());
        assert!(sub.correlate_join(&e).is_err());

        let clone = sub.correlate_root(&e).unwrap();
        assert_eq!(sub.roots()[0].0.id(), clone.0.id());
        let join = sub.correlate_join(&phones).unwrap();
        assert_eq!(sub.correlated_joins()[0].0.id(), join.0.id());
        assert!(join.is_correlated());
    }

    #[test]
    fn subqueries_are_expressions_of_their_type() {
        let sub = Subquery::new(company(), JavaType::Double);
        assert_eq!(*sub.as_expression().0.java_type(), JavaType::Double);
        assert!(sub.selection().is_none());
    }
}
