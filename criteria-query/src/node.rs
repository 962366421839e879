use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criteria_errors::{invalid_alias_err, CriteriaResult};
use criteria_kernel::{AggregateFunction, ArithmeticOp, Literal, Temporal, TrimSpec, UnaryFunction};
use criteria_metamodel::JavaType;
use parking_lot::Mutex;

use crate::alias::validate_alias;
use crate::compound::CompoundDef;
use crate::path::PathDef;
use crate::predicate::PredicateDef;
use crate::subquery::SubqueryDef;

/// Identity of a node in a query graph. Lowered values, bound variables and aliases are keyed by
/// node identity, never by structural equality.
pub type NodeId = u64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default, Clone)]
pub(crate) struct AliasSlot {
    pub alias: Option<String>,
    /// The alias was generated rather than set by the caller
    pub automatic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    Any,
}

/// One node of a query graph: a selection, expression, predicate, path, or subquery.
///
/// Nodes are created by [`CriteriaBuilder`](crate::CriteriaBuilder) and the navigation methods
/// of [`Path`](crate::Path) and handed out wrapped in typed handles. Apart from their alias,
/// the children of junction and IN predicates, and the joins of roots and joins, nodes are
/// immutable once built.
pub struct Node {
    id: NodeId,
    java_type: JavaType,
    alias: Mutex<AliasSlot>,
    pub(crate) kind: NodeKind,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Constant(Literal),
    Parameter {
        name: Option<String>,
        /// A value bound when the parameter was created
        value: Option<Literal>,
    },
    Path(PathDef),
    Unary {
        func: UnaryFunction,
        arg: Arc<Node>,
    },
    Aggregate {
        func: AggregateFunction,
        distinct: bool,
        arg: Arc<Node>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Arc<Node>,
        right: Arc<Node>,
    },
    Concat {
        left: Arc<Node>,
        right: Arc<Node>,
    },
    Substring {
        value: Arc<Node>,
        from: Arc<Node>,
        len: Option<Arc<Node>>,
    },
    Locate {
        value: Arc<Node>,
        pattern: Arc<Node>,
        from: Option<Arc<Node>>,
    },
    Trim {
        value: Arc<Node>,
        trim_char: Option<Arc<Node>>,
        spec: TrimSpec,
    },
    /// Converts `value` to the node's own java type
    Cast {
        value: Arc<Node>,
    },
    Function {
        name: String,
        args: Vec<Arc<Node>>,
    },
    Current(Temporal),
    Case {
        whens: Vec<(Arc<Node>, Arc<Node>)>,
        otherwise: Option<Arc<Node>>,
    },
    SimpleCase {
        operand: Arc<Node>,
        whens: Vec<(Arc<Node>, Arc<Node>)>,
        otherwise: Option<Arc<Node>>,
    },
    Coalesce(Vec<Arc<Node>>),
    NullIf {
        left: Arc<Node>,
        right: Arc<Node>,
    },
    /// `ENTRY(map join)`
    MapEntry(Arc<Node>),
    Subquery(Arc<SubqueryDef>),
    Quantified {
        quantifier: Quantifier,
        subquery: Arc<Node>,
    },
    Predicate(PredicateDef),
    Compound(CompoundDef),
}

impl Node {
    pub(crate) fn new(kind: NodeKind, java_type: JavaType) -> Arc<Node> {
        Arc::new(Node {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            java_type,
            alias: Mutex::new(AliasSlot::default()),
            kind,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn java_type(&self) -> &JavaType {
        &self.java_type
    }

    /// The alias of this node, whether set by the caller or generated during compilation
    pub fn alias(&self) -> Option<String> {
        self.alias.lock().alias.clone()
    }

    pub(crate) fn alias_slot(&self) -> AliasSlot {
        self.alias.lock().clone()
    }

    /// Set the alias of this node. A node can only be aliased once.
    pub fn set_alias(&self, alias: &str) -> CriteriaResult<()> {
        validate_alias(alias)?;
        let mut slot = self.alias.lock();
        if let Some(existing) = &slot.alias {
            return Err(invalid_alias_err(
                alias,
                format!("selection is already aliased as '{existing}'"),
            ));
        }
        slot.alias = Some(alias.to_owned());
        slot.automatic = false;
        Ok(())
    }

    /// Record a generated alias on this node. The first alias a node gets is the one it keeps,
    /// even if a later query has to give it another one.
    pub(crate) fn set_generated_alias(&self, alias: String) {
        let mut slot = self.alias.lock();
        if slot.alias.is_none() {
            slot.alias = Some(alias);
            slot.automatic = true;
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.kind, NodeKind::Compound(_))
    }

    pub(crate) fn as_path(&self) -> Option<&PathDef> {
        match &self.kind {
            NodeKind::Path(def) => Some(def),
            _ => None,
        }
    }

    pub(crate) fn as_predicate(&self) -> Option<&PredicateDef> {
        match &self.kind {
            NodeKind::Predicate(def) => Some(def),
            _ => None,
        }
    }

    pub(crate) fn as_subquery(&self) -> Option<&Arc<SubqueryDef>> {
        match &self.kind {
            NodeKind::Subquery(def) => Some(def),
            _ => None,
        }
    }

    pub(crate) fn is_parameter(&self) -> bool {
        matches!(self.kind, NodeKind::Parameter { .. })
    }

    /// The nodes this node is computed from. Subquery bodies are not included, and neither are
    /// the joins of a root or join.
    pub(crate) fn children(&self) -> Vec<Arc<Node>> {
        use NodeKind::*;

        match &self.kind {
            Constant(_) | Parameter { .. } | Current(_) | Subquery(_) => vec![],
            Path(def) => def.navigation_parent().into_iter().collect(),
            Unary { arg, .. } | Aggregate { arg, .. } => vec![Arc::clone(arg)],
            Arithmetic { left, right, .. } | Concat { left, right } | NullIf { left, right } => {
                vec![Arc::clone(left), Arc::clone(right)]
            }
            Substring { value, from, len } => [Some(value), Some(from), len.as_ref()]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            Locate {
                value,
                pattern,
                from,
            } => [Some(value), Some(pattern), from.as_ref()]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            Trim {
                value, trim_char, ..
            } => [Some(value), trim_char.as_ref()]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            Cast { value } => vec![Arc::clone(value)],
            Function { args, .. } | Coalesce(args) => args.clone(),
            Case { whens, otherwise } => whens
                .iter()
                .flat_map(|(w, t)| [Arc::clone(w), Arc::clone(t)])
                .chain(otherwise.clone())
                .collect(),
            SimpleCase {
                operand,
                whens,
                otherwise,
            } => std::iter::once(Arc::clone(operand))
                .chain(whens.iter().flat_map(|(w, t)| [Arc::clone(w), Arc::clone(t)]))
                .chain(otherwise.clone())
                .collect(),
            MapEntry(map) => vec![Arc::clone(map)],
            Quantified { subquery, .. } => vec![Arc::clone(subquery)],
            Predicate(def) => def.children(),
            Compound(def) => def.items.clone(),
        }
    }

    /// A short name of the kind of node, for diagnostics
    pub(crate) fn describe(&self) -> &'static str {
        use NodeKind::*;

        match &self.kind {
            Constant(_) => "literal",
            Parameter { .. } => "parameter",
            Path(def) => def.kind.describe(),
            Unary { .. } | Aggregate { .. } | Function { .. } | Current(_) => "function",
            Arithmetic { .. } => "arithmetic expression",
            Concat { .. } | Substring { .. } | Locate { .. } | Trim { .. } => "string expression",
            Cast { .. } => "cast",
            Case { .. } | SimpleCase { .. } | Coalesce(_) | NullIf { .. } => "conditional",
            MapEntry(_) => "map entry",
            Subquery(_) => "subquery",
            Quantified { .. } => "quantified subquery",
            Predicate(_) => "predicate",
            Compound(_) => "compound selection",
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("java_type", &self.java_type)
            .field("alias", &self.alias.lock().alias)
            .field("kind", &self.kind)
            .finish()
    }
}
