//! Alias assignment and lexical scoping of bound variables.
//!
//! An [`AliasRegistry`] lives as long as the top-level query it belongs to and is shared, by
//! threading it through an [`AliasContext`], with every subquery compiled under that query. The
//! context additionally keeps one [`ScopeFrame`] per query level currently being compiled, so that
//! a subquery can resolve the variables its enclosing queries have bound.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use criteria_errors::{internal, invalid_alias_err, invariant, invariant_eq, CriteriaResult};
use criteria_kernel::{Value, Variable};
use criteria_metamodel::{JavaType, Metamodel};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use tracing::trace;

use crate::node::{Node, NodeId};
use crate::options::CompilerOptions;
use crate::params::ParameterMap;

lazy_static! {
    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "ABS", "ALL", "AND", "ANY", "AS", "ASC", "AVG", "BETWEEN", "BIT_LENGTH", "BOTH", "BY",
        "CASE", "CHAR_LENGTH", "CHARACTER_LENGTH", "CLASS", "COALESCE", "CONCAT", "COUNT",
        "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DELETE", "DESC", "DISTINCT", "ELSE",
        "EMPTY", "END", "ENTRY", "ESCAPE", "EXISTS", "FALSE", "FETCH", "FROM", "GROUP", "HAVING",
        "IN", "INDEX", "INNER", "IS", "JOIN", "KEY", "LEADING", "LEFT", "LENGTH", "LIKE", "LOCATE",
        "LOWER", "MAX", "MEMBER", "MIN", "MOD", "NEW", "NOT", "NULL", "NULLIF", "OBJECT", "OF",
        "OR", "ORDER", "OUTER", "POSITION", "SELECT", "SET", "SIZE", "SOME", "SQRT", "SUBSTRING",
        "SUM", "THEN", "TRAILING", "TRIM", "TRUE", "TYPE", "UNKNOWN", "UPDATE", "UPPER", "VALUE",
        "WHEN", "WHERE",
    ]
    .into_iter()
    .collect();
}

/// Check that `alias` can be used as an identifier in a query
pub(crate) fn validate_alias(alias: &str) -> CriteriaResult<()> {
    let mut chars = alias.chars();
    let Some(first) = chars.next() else {
        return Err(invalid_alias_err(alias, "alias is empty"));
    };
    if !(first.is_alphabetic() || first == '_' || first == '$') {
        return Err(invalid_alias_err(
            alias,
            format!("alias cannot start with '{first}'"),
        ));
    }
    if let Some(c) = chars.find(|c| !(c.is_alphanumeric() || *c == '_' || *c == '$')) {
        return Err(invalid_alias_err(
            alias,
            format!("alias cannot contain '{c}'"),
        ));
    }
    if RESERVED_WORDS.contains(alias.to_ascii_uppercase().as_str()) {
        return Err(invalid_alias_err(alias, "alias is a reserved word"));
    }
    Ok(())
}

/// Every alias issued within one top-level query and its subqueries
#[derive(Debug)]
pub(crate) struct AliasRegistry {
    prefix: String,
    counter: usize,
    by_node: HashMap<NodeId, String>,
    owners: HashMap<String, NodeId>,
}

impl AliasRegistry {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 0,
            by_node: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Record the alias a caller explicitly set on `node`, so that generated aliases avoid it
    pub(crate) fn seed(&mut self, node: &Node) -> CriteriaResult<()> {
        let slot = node.alias_slot();
        let Some(alias) = slot.alias.filter(|_| !slot.automatic) else {
            return Ok(());
        };
        match self.owners.get(&alias) {
            Some(owner) if *owner != node.id() => Err(invalid_alias_err(
                alias,
                format!("alias is used by more than one {}", node.describe()),
            )),
            _ => {
                self.record(node.id(), alias);
                Ok(())
            }
        }
    }

    /// The alias of `node`, generating and recording one if it has none yet
    pub(crate) fn get_alias(&mut self, node: &Node) -> String {
        if let Some(alias) = self.by_node.get(&node.id()) {
            return alias.clone();
        }

        let slot = node.alias_slot();
        if let Some(alias) = slot.alias {
            if !slot.automatic || !self.owners.contains_key(&alias) {
                self.record(node.id(), alias.clone());
                return alias;
            }
            trace!(%alias, "generated alias is taken in this query, generating another");
        }

        let alias = loop {
            self.counter += 1;
            let candidate = format!("{}{}", self.prefix, self.counter);
            if !self.owners.contains_key(&candidate) {
                break candidate;
            }
            trace!(%candidate, "generated alias collides with an existing alias");
        };
        node.set_generated_alias(alias.clone());
        self.record(node.id(), alias.clone());
        alias
    }

    fn record(&mut self, id: NodeId, alias: String) {
        self.owners.entry(alias.clone()).or_insert(id);
        self.by_node.insert(id, alias);
    }
}

/// The variables bound and the roots declared by one query level
#[derive(Debug, Default)]
pub(crate) struct ScopeFrame {
    roots: HashSet<NodeId>,
    variables: HashMap<NodeId, Variable>,
    values: HashMap<NodeId, Value>,
    root_variables: HashMap<NodeId, Variable>,
    schema: IndexMap<String, JavaType>,
    outer_refs: bool,
}

impl ScopeFrame {
    pub(crate) fn new(roots: &[Arc<Node>]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.id()).collect(),
            ..Default::default()
        }
    }

    /// Variables declared at this level, by alias
    pub(crate) fn schema(&self) -> &IndexMap<String, JavaType> {
        &self.schema
    }

    /// Whether anything lowered at this level resolved through an enclosing level
    pub(crate) fn refers_to_outer(&self) -> bool {
        self.outer_refs
    }
}

/// State threaded through every lowering call of one compilation
pub(crate) struct AliasContext<'a> {
    registry: &'a mut AliasRegistry,
    pub(crate) params: &'a mut ParameterMap,
    pub(crate) options: &'a CompilerOptions,
    pub(crate) model: &'a Metamodel,
    frames: Vec<ScopeFrame>,
}

impl<'a> AliasContext<'a> {
    pub(crate) fn new(
        registry: &'a mut AliasRegistry,
        params: &'a mut ParameterMap,
        options: &'a CompilerOptions,
        model: &'a Metamodel,
    ) -> Self {
        Self {
            registry,
            params,
            options,
            model,
            frames: vec![],
        }
    }

    pub(crate) fn alias(&mut self, node: &Node) -> String {
        self.registry.get_alias(node)
    }

    /// Run `f` with `frame` pushed as the innermost scope. The frame is popped when `f` returns,
    /// whether or not it succeeded.
    pub(crate) fn with_frame<T, F>(&mut self, frame: ScopeFrame, f: F) -> CriteriaResult<T>
    where
        F: FnOnce(&mut Self) -> CriteriaResult<T>,
    {
        self.frames.push(frame);
        let depth = self.frames.len();
        let res = f(self);
        invariant!(
            self.frames.len() == depth,
            "scope frames left {} deep, expected {depth}",
            self.frames.len()
        );
        self.frames.pop();
        res
    }

    pub(crate) fn frame(&self) -> CriteriaResult<&ScopeFrame> {
        match self.frames.last() {
            Some(frame) => Ok(frame),
            None => internal!("no scope is active"),
        }
    }

    fn frame_mut(&mut self) -> CriteriaResult<&mut ScopeFrame> {
        match self.frames.last_mut() {
            Some(frame) => Ok(frame),
            None => internal!("no scope is active"),
        }
    }

    /// Find a registration, innermost scope first. The flag is `true` when it was found in an
    /// enclosing scope.
    fn lookup<T, F>(&mut self, get: F) -> Option<(T, bool)>
    where
        T: Clone,
        F: Fn(&ScopeFrame) -> Option<&T>,
    {
        let innermost = self.frames.len().checked_sub(1)?;
        let (depth, found) = self
            .frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, frame)| get(frame).map(|t| (i, t.clone())))?;
        let outer = depth != innermost;
        if outer {
            self.frames[innermost].outer_refs = true;
        }
        Some((found, outer))
    }

    pub(crate) fn is_registered(&self, id: NodeId) -> bool {
        self.frames.iter().any(|f| f.variables.contains_key(&id))
    }

    pub(crate) fn registered_variable(&mut self, id: NodeId) -> Option<(Variable, bool)> {
        self.lookup(|f| f.variables.get(&id))
    }

    pub(crate) fn registered_value(&mut self, id: NodeId) -> Option<(Value, bool)> {
        self.lookup(|f| f.values.get(&id))
    }

    pub(crate) fn registered_root_variable(&mut self, id: NodeId) -> Option<(Variable, bool)> {
        self.lookup(|f| f.root_variables.get(&id))
    }

    /// If `id` is a root of a level being compiled, whether that level is an enclosing one
    pub(crate) fn root_scope(&mut self, id: NodeId) -> Option<bool> {
        self.lookup(|f| f.roots.get(&id)).map(|(_, outer)| outer)
    }

    /// Bind `node` to `var`, ranging over `path`, in the innermost scope.
    ///
    /// Registering an already registered node is a no-op. Registering anything but a variable,
    /// or a variable or path aliased differently from `node`, is an internal error.
    pub(crate) fn register_variable(
        &mut self,
        node: &Node,
        var: Value,
        mut path: Value,
    ) -> CriteriaResult<()> {
        if self.is_registered(node.id()) {
            return Ok(());
        }
        let mut variable = match var {
            Value::Variable(variable) => variable,
            other => internal!("cannot bind {} to non-variable {other}", node.describe()),
        };

        let alias = self.alias(node);
        if let Some(var_alias) = &variable.alias {
            invariant_eq!(
                *var_alias,
                alias,
                "variable {} must be aliased like its {}",
                variable.name,
                node.describe()
            );
        }
        if let Some(path_alias) = path.alias() {
            invariant_eq!(
                path_alias,
                alias.as_str(),
                "path {path} must be aliased like its {}",
                node.describe()
            );
        }
        variable.alias = Some(alias.clone());
        path.set_alias(&alias);

        trace!(%alias, variable = %variable.name, %path, "registered variable");
        let frame = self.frame_mut()?;
        frame.schema.insert(alias, variable.ty.clone());
        frame.variables.insert(node.id(), variable);
        frame.values.insert(node.id(), path);
        Ok(())
    }

    /// Declare an extra root of the innermost scope as an unbound variable
    pub(crate) fn register_root(&mut self, node: &Node, mut variable: Variable) -> CriteriaResult<()> {
        let alias = self.alias(node);
        variable.alias = Some(alias.clone());
        let frame = self.frame_mut()?;
        frame.schema.insert(alias, variable.ty.clone());
        frame.root_variables.insert(node.id(), variable);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use criteria_kernel::{Literal, Path as KernelPath};

    use super::*;
    use crate::node::NodeKind;

    fn node() -> Arc<Node> {
        Node::new(NodeKind::Constant(Literal::Null), JavaType::Object)
    }

    #[test]
    fn validates_aliases() {
        validate_alias("e").unwrap();
        validate_alias("_dept$1").unwrap();
        for bad in ["", "1e", "a-b", "select", "Order", "e.name"] {
            let err = validate_alias(bad).unwrap_err();
            assert!(err.is_invalid_alias(), "{bad} was accepted");
        }
    }

    #[test]
    fn generated_aliases_skip_taken_ones() {
        let explicit = node();
        explicit.set_alias("autoAlias1").unwrap();
        let mut registry = AliasRegistry::new("autoAlias");
        registry.seed(&explicit).unwrap();

        let a = node();
        let b = node();
        assert_eq!(registry.get_alias(&a), "autoAlias2");
        assert_eq!(registry.get_alias(&b), "autoAlias3");
        assert_eq!(registry.get_alias(&a), "autoAlias2");
        assert_eq!(registry.get_alias(&explicit), "autoAlias1");
        assert_eq!(a.alias().as_deref(), Some("autoAlias2"));
    }

    #[test]
    fn duplicate_explicit_aliases_are_rejected() {
        let a = node();
        let b = node();
        a.set_alias("x").unwrap();
        b.set_alias("x").unwrap();
        let mut registry = AliasRegistry::new("autoAlias");
        registry.seed(&a).unwrap();
        registry.seed(&a).unwrap();
        assert!(registry.seed(&b).unwrap_err().is_invalid_alias());
    }

    #[test]
    fn stale_generated_aliases_are_replaced_on_collision() {
        let mut first = AliasRegistry::new("autoAlias");
        let shared = node();
        assert_eq!(first.get_alias(&shared), "autoAlias1");

        let mut second = AliasRegistry::new("autoAlias");
        let other = node();
        assert_eq!(second.get_alias(&other), "autoAlias1");
        assert_eq!(second.get_alias(&shared), "autoAlias2");

        // The node keeps the alias it was first given
        assert_eq!(shared.alias().as_deref(), Some("autoAlias1"));
        assert_eq!(first.get_alias(&shared), "autoAlias1");
        assert_eq!(second.get_alias(&shared), "autoAlias2");
    }

    #[test]
    fn lookups_fall_back_to_enclosing_scopes() {
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let model = Metamodel::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);

        let join = node();
        join.set_alias("p").unwrap();
        let ty = JavaType::managed("Phone");
        cx.with_frame(ScopeFrame::default(), |cx| {
            let var = Variable::bound("p", ty.clone());
            let path = Value::Path(KernelPath::candidate(ty.clone(), "e"));
            cx.register_variable(&join, Value::Variable(var), path)?;
            assert!(!cx.registered_variable(join.id()).unwrap().1);

            cx.with_frame(ScopeFrame::default(), |cx| {
                let (var, outer) = cx.registered_variable(join.id()).unwrap();
                assert!(outer);
                assert_eq!(var.alias.as_deref(), Some("p"));
                assert!(cx.frame()?.refers_to_outer());
                Ok(())
            })?;
            assert!(!cx.frame()?.refers_to_outer());
            assert_eq!(cx.frame()?.schema().get("p"), Some(&ty));
            Ok(())
        })
        .unwrap();
        assert!(cx.frame().is_err());
    }

    #[test]
    fn registering_a_value_is_an_internal_error() {
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let model = Metamodel::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);

        let join = node();
        let err = cx
            .with_frame(ScopeFrame::default(), |cx| {
                cx.register_variable(&join, Value::null(), Value::null())
            })
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn mismatched_variable_alias_is_an_internal_error() {
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let model = Metamodel::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);

        let join = node();
        join.set_alias("p").unwrap();
        let mut var = Variable::bound("q", JavaType::Object);
        var.alias = Some("q".into());
        let err = cx
            .with_frame(ScopeFrame::default(), |cx| {
                cx.register_variable(&join, Value::Variable(var), Value::null())
            })
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn mismatched_path_alias_is_an_internal_error() {
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let model = Metamodel::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);

        let join = node();
        join.set_alias("p").unwrap();
        let ty = JavaType::managed("Phone");
        let var = Variable::bound("p", ty.clone());
        let mut path = Value::Path(KernelPath::candidate(ty, "e"));
        path.set_alias("q");
        let err = cx
            .with_frame(ScopeFrame::default(), |cx| {
                cx.register_variable(&join, Value::Variable(var), path)
            })
            .unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("left = \"q\""), "{err}");
    }
}
