use std::fmt;
use std::sync::Arc;

use criteria_errors::{invalid_argument, invalid_state, CriteriaResult};
use criteria_kernel::{ParameterKey, QueryExpressions};
use criteria_metamodel::{JavaType, Metamodel};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::alias::{AliasContext, AliasRegistry};
use crate::compiler;
use crate::compound::{collect_items, CompoundKind, CompoundSelection};
use crate::expression::{Expression, Order, Selectable, Selection};
use crate::node::{Node, NodeKind};
use crate::options::CompilerOptions;
use crate::params::{walk, ParameterMap};
use crate::path::Path;
use crate::predicate::{BooleanOperator, Predicate};
use crate::render::{CqlDisplay, RenderContext};
use crate::subquery::Subquery;

/// The clauses of one query level, shared by top-level queries and subqueries
#[derive(Debug, Clone)]
pub(crate) struct QueryDef {
    pub model: Arc<Metamodel>,
    pub result_type: JavaType,
    pub roots: Vec<Arc<Node>>,
    pub selection: Option<Arc<Node>>,
    pub restriction: Option<Arc<Node>>,
    pub ordering: Vec<Order>,
    pub grouping: Vec<Arc<Node>>,
    pub having: Option<Arc<Node>>,
    pub distinct: bool,
    pub subqueries: Vec<Arc<Node>>,
}

fn boolean(node: Arc<Node>, clause: &str) -> CriteriaResult<Arc<Node>> {
    if !node.java_type().is_boolean() {
        invalid_argument!(
            "{clause} clause must be boolean, not {} of type {}",
            node.describe(),
            node.java_type()
        );
    }
    Ok(node)
}

fn conjunction(predicates: Vec<Predicate>) -> Option<Arc<Node>> {
    if predicates.is_empty() {
        return None;
    }
    let terms = predicates.into_iter().map(|p| p.0).collect();
    Some(Predicate::junction(BooleanOperator::And, terms).0)
}

impl QueryDef {
    pub(crate) fn new(model: Arc<Metamodel>, result_type: JavaType) -> Self {
        Self {
            model,
            result_type,
            roots: vec![],
            selection: None,
            restriction: None,
            ordering: vec![],
            grouping: vec![],
            having: None,
            distinct: false,
            subqueries: vec![],
        }
    }

    pub(crate) fn from(&mut self, entity: &str) -> CriteriaResult<Path> {
        let root = Path::root(&self.model, entity)?;
        self.roots.push(Arc::clone(&root.0));
        Ok(root)
    }

    pub(crate) fn select(&mut self, selection: Arc<Node>) {
        self.selection = Some(selection);
    }

    /// Select several terms, shaped by the result type. A single compound term is selected as is.
    pub(crate) fn multiselect(&mut self, items: Vec<Arc<Node>>) {
        self.selection = match items.as_slice() {
            [] => None,
            [only] if only.is_compound() => Some(Arc::clone(only)),
            _ => Some(
                CompoundSelection::new(CompoundKind::Multi, items, self.result_type.clone()).0,
            ),
        };
    }

    pub(crate) fn set_restriction(&mut self, restriction: Arc<Node>) -> CriteriaResult<()> {
        self.restriction = Some(boolean(restriction, "where")?);
        Ok(())
    }

    pub(crate) fn set_restrictions(&mut self, predicates: Vec<Predicate>) {
        self.restriction = conjunction(predicates);
    }

    pub(crate) fn set_having(&mut self, having: Arc<Node>) -> CriteriaResult<()> {
        self.having = Some(boolean(having, "having")?);
        Ok(())
    }

    pub(crate) fn set_havings(&mut self, predicates: Vec<Predicate>) {
        self.having = conjunction(predicates);
    }

    pub(crate) fn subquery(&mut self, ty: JavaType) -> Subquery {
        let subquery = Subquery::new(Arc::clone(&self.model), ty);
        self.subqueries.push(Arc::clone(&subquery.node));
        subquery
    }

    pub(crate) fn assert_root(&self) -> CriteriaResult<()> {
        if self.roots.is_empty() {
            invalid_state!("query has no root, call from() first");
        }
        Ok(())
    }

    pub(crate) fn assert_selection(&self) -> CriteriaResult<()> {
        if self.selection.is_none() && !self.is_default_projection() {
            invalid_state!(
                "query of {} over {} roots selects nothing",
                self.result_type,
                self.roots.len()
            );
        }
        Ok(())
    }

    /// The terms of the selection, looking through a multiselect
    pub(crate) fn selections(&self) -> Vec<Arc<Node>> {
        match self.selection.as_ref().map(|s| (s, &s.kind)) {
            None => vec![],
            Some((_, NodeKind::Compound(def))) if def.kind == CompoundKind::Multi => {
                def.items.clone()
            }
            Some((selection, _)) => vec![Arc::clone(selection)],
        }
    }

    /// Whether the query projects its only root, so that no projection needs to be compiled
    pub(crate) fn is_default_projection(&self) -> bool {
        if self.selection.is_none() {
            return match self.roots.as_slice() {
                [root] => {
                    *root.java_type() == self.result_type || self.result_type == JavaType::Object
                }
                _ => false,
            };
        }
        match self.selections().as_slice() {
            [only] => {
                self.roots.first().is_some_and(|r| r.id() == only.id())
                    || only
                        .as_path()
                        .is_some_and(|def| def.correlated_target().is_some())
            }
            _ => false,
        }
    }

    /// Record the aliases set by the caller on every node of this level and of its subqueries
    pub(crate) fn seed_aliases(&self, registry: &mut AliasRegistry) -> CriteriaResult<()> {
        fn seed_from(node: &Arc<Node>, registry: &mut AliasRegistry) -> CriteriaResult<()> {
            registry.seed(node)?;
            if let Some(def) = node.as_path() {
                for child in def
                    .joins()
                    .into_iter()
                    .chain(def.fetches())
                    .chain(def.key_join())
                {
                    seed_from(&child, registry)?;
                }
            }
            Ok(())
        }

        for root in &self.roots {
            seed_from(root, registry)?;
        }
        let clauses = self
            .selection
            .iter()
            .chain(&self.restriction)
            .chain(&self.grouping)
            .chain(&self.having)
            .cloned()
            .chain(self.ordering.iter().map(|o| Arc::clone(&o.expression().0)));
        for clause in clauses {
            walk(&clause, &mut |node| {
                registry.seed(node)?;
                Ok(true)
            })?;
        }
        for subquery in &self.subqueries {
            let Some(sub) = subquery.as_subquery() else {
                continue;
            };
            for join in sub.correlated.read().iter() {
                seed_from(join, registry)?;
            }
            let delegate = sub.delegate.lock().clone();
            delegate.seed_aliases(registry)?;
        }
        Ok(())
    }
}

/// A top-level criteria query.
///
/// Built through [`CriteriaBuilder::create_query`](crate::CriteriaBuilder::create_query), then
/// compiled into [`QueryExpressions`] by [`compile`](CriteriaQuery::compile). Aliases generated
/// while compiling are kept for the lifetime of the query, so compiling twice, or asking for the
/// alias of a selection between compilations, yields the same aliases.
#[derive(Debug)]
pub struct CriteriaQuery {
    def: QueryDef,
    options: CompilerOptions,
    aliases: Mutex<AliasRegistry>,
}

impl CriteriaQuery {
    pub(crate) fn new(model: Arc<Metamodel>, result_type: JavaType, options: CompilerOptions) -> Self {
        let aliases = Mutex::new(AliasRegistry::new(options.alias_prefix.clone()));
        Self {
            def: QueryDef::new(model, result_type),
            options,
            aliases,
        }
    }

    /// Add a root ranging over the entity type `entity`
    pub fn from(&mut self, entity: &str) -> CriteriaResult<Path> {
        self.def.from(entity)
    }

    pub fn select(&mut self, selection: impl Into<Selection>) -> &mut Self {
        self.def.select(selection.into().0);
        self
    }

    /// Select several terms. How they are combined into a result depends on the result type:
    /// a tuple for `Tuple`, an array for `Object` or array types, a constructor call otherwise.
    pub fn multiselect<I>(&mut self, items: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        self.def.multiselect(collect_items(items));
        self
    }

    pub fn where_(&mut self, restriction: impl Into<Expression>) -> CriteriaResult<&mut Self> {
        self.def.set_restriction(restriction.into().0)?;
        Ok(self)
    }

    /// Restrict the query to the conjunction of `predicates`. No predicates removes the
    /// restriction.
    pub fn where_all(&mut self, predicates: Vec<Predicate>) -> &mut Self {
        self.def.set_restrictions(predicates);
        self
    }

    pub fn order_by<I>(&mut self, orders: I) -> &mut Self
    where
        I: IntoIterator<Item = Order>,
    {
        self.def.ordering = orders.into_iter().collect();
        self
    }

    pub fn group_by<I>(&mut self, grouping: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        self.def.grouping = grouping.into_iter().map(|g| g.into().0).collect();
        self
    }

    pub fn having(&mut self, having: impl Into<Expression>) -> CriteriaResult<&mut Self> {
        self.def.set_having(having.into().0)?;
        Ok(self)
    }

    pub fn having_all(&mut self, predicates: Vec<Predicate>) -> &mut Self {
        self.def.set_havings(predicates);
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.def.distinct = distinct;
        self
    }

    /// Create a subquery of this query, producing values of type `ty`
    pub fn subquery(&mut self, ty: JavaType) -> Subquery {
        self.def.subquery(ty)
    }

    pub fn roots(&self) -> Vec<Path> {
        self.def.roots.iter().cloned().map(Path).collect()
    }

    /// The first root, which is the candidate of the query
    pub fn root(&self) -> Option<Path> {
        self.def.roots.first().cloned().map(Path)
    }

    pub fn selection(&self) -> Option<Selection> {
        self.def.selection.clone().map(Selection)
    }

    pub fn restriction(&self) -> Option<Expression> {
        self.def.restriction.clone().map(Expression)
    }

    pub fn order_list(&self) -> &[Order] {
        &self.def.ordering
    }

    pub fn group_list(&self) -> Vec<Expression> {
        self.def.grouping.iter().cloned().map(Expression).collect()
    }

    pub fn is_distinct(&self) -> bool {
        self.def.distinct
    }

    pub fn result_type(&self) -> &JavaType {
        &self.def.result_type
    }

    /// The declared types of the parameters of the where and having clauses of this query and
    /// its subqueries, in first-seen order
    pub fn parameter_types(&self) -> CriteriaResult<IndexMap<ParameterKey, JavaType>> {
        Ok(ParameterMap::collect(&self.def)?.types().clone())
    }

    /// The alias of `selection` within this query, generating one if it has none
    pub fn alias_of(&self, selection: &impl Selectable) -> CriteriaResult<String> {
        let mut registry = self.aliases.lock();
        self.def.seed_aliases(&mut *registry)?;
        Ok(registry.get_alias(selection.node()))
    }

    /// Check the query and compile it.
    ///
    /// Fails with [`InvalidState`](criteria_errors::CriteriaError::InvalidState) if the query has
    /// no root, or selects nothing while having more than one root or a result type other than
    /// its root's.
    pub fn compile(&self) -> CriteriaResult<QueryExpressions> {
        self.def.assert_root()?;
        self.def.assert_selection()?;

        let mut registry = self.aliases.lock();
        self.def.seed_aliases(&mut *registry)?;
        let mut params = ParameterMap::collect(&self.def)?;
        debug!(
            result_type = %self.def.result_type,
            parameters = params.types().len(),
            "compiling criteria query"
        );

        let mut exprs = {
            let mut cx =
                AliasContext::new(&mut *registry, &mut params, &self.options, &self.def.model);
            compiler::compile(&mut cx, &self.def)?
        };
        exprs.parameter_types = params.types().clone();
        Ok(exprs)
    }

    /// A JPQL-like rendering of the query, for diagnostics
    pub fn to_cql(&self) -> String {
        let cx = RenderContext::new(&self.aliases, &self.def);
        let cql = self.def.cql(&cx).to_string();
        cql.trim().to_owned()
    }
}

impl fmt::Display for CriteriaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cql())
    }
}

#[cfg(test)]
mod tests {
    use criteria_kernel::CompareOp;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::predicate::PredicateKind;
    use crate::testing::company;

    fn query(ty: JavaType) -> CriteriaQuery {
        CriteriaQuery::new(company(), ty, CompilerOptions::default())
    }

    #[test]
    fn compiling_without_a_root_fails() {
        let q = query(JavaType::Object);
        assert!(q.compile().unwrap_err().is_invalid_state());
    }

    #[test]
    fn selecting_the_only_root_is_the_default_projection() {
        let mut q = query(JavaType::managed("Employee"));
        q.from("Employee").unwrap();
        assert!(q.def.is_default_projection());
        let e = q.root().unwrap();
        q.select(&e);
        assert!(q.def.is_default_projection());

        q.select(e.get("name").unwrap());
        assert!(!q.def.is_default_projection());
    }

    #[test]
    fn several_roots_need_a_selection() {
        let mut q = query(JavaType::Object);
        q.from("Employee").unwrap();
        q.from("Department").unwrap();
        assert!(q.compile().unwrap_err().is_invalid_state());
    }

    #[test]
    fn where_clauses_must_be_boolean() {
        let mut q = query(JavaType::Object);
        let e = q.from("Employee").unwrap();
        assert!(q.where_(e.get("name").unwrap()).is_err());
        q.where_(e.get("active").unwrap()).unwrap();
        assert!(q.restriction().is_some());
        q.where_all(vec![]);
        assert!(q.restriction().is_none());
    }

    #[test]
    fn multiselect_of_one_compound_selects_it() {
        let mut q = query(JavaType::Object);
        let e = q.from("Employee").unwrap();
        let tuple = CompoundSelection::new(
            CompoundKind::Tuple,
            vec![Arc::clone(&e.get("name").unwrap().0)],
            JavaType::Tuple,
        );
        q.multiselect([&tuple]);
        assert_eq!(q.selection().unwrap().0.id(), tuple.0.id());
    }

    #[test]
    fn parameters_of_subqueries_are_collected_after_the_outer_ones() {
        let mut q = query(JavaType::Object);
        let e = q.from("Employee").unwrap();
        let sub = q.subquery(JavaType::Long);
        let d = sub.from("Department").unwrap();
        let budget = Node::new(
            NodeKind::Parameter {
                name: Some("budget".into()),
                value: None,
            },
            JavaType::Double,
        );
        let min_age = Node::new(
            NodeKind::Parameter {
                name: Some("age".into()),
                value: None,
            },
            JavaType::Integer,
        );
        sub.where_all(vec![Predicate::new(PredicateKind::Comparison {
            op: CompareOp::GreaterThan,
            left: Arc::clone(&d.get("budget").unwrap().0),
            right: budget,
        })]);
        q.where_all(vec![Predicate::new(PredicateKind::Comparison {
            op: CompareOp::GreaterThan,
            left: Arc::clone(&e.get("age").unwrap().0),
            right: min_age,
        })]);

        let keys: Vec<_> = q.parameter_types().unwrap().into_keys().collect();
        assert_eq!(
            keys,
            vec![
                ParameterKey::Named("age".into()),
                ParameterKey::Named("budget".into())
            ]
        );
    }
}
