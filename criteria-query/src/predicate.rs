use std::sync::Arc;

use criteria_errors::{invalid_argument, CriteriaResult};
use criteria_kernel::{CompareOp, Literal};
use criteria_metamodel::JavaType;
use parking_lot::RwLock;

use crate::expression::Expression;
use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

#[derive(Debug)]
pub(crate) struct PredicateDef {
    pub negated: bool,
    pub kind: PredicateKind,
}

#[derive(Debug)]
pub(crate) enum PredicateKind {
    Junction {
        op: BooleanOperator,
        terms: RwLock<Vec<Arc<Node>>>,
    },
    Comparison {
        op: CompareOp,
        left: Arc<Node>,
        right: Arc<Node>,
    },
    Between {
        value: Arc<Node>,
        lower: Arc<Node>,
        upper: Arc<Node>,
    },
    Like {
        value: Arc<Node>,
        pattern: Arc<Node>,
        escape: Option<Arc<Node>>,
    },
    NullCheck {
        value: Arc<Node>,
        not_null: bool,
    },
    Empty {
        collection: Arc<Node>,
        not_empty: bool,
    },
    Member {
        element: Arc<Node>,
        collection: Arc<Node>,
    },
    In {
        value: Arc<Node>,
        values: RwLock<Vec<Arc<Node>>>,
    },
    Exists(Arc<Node>),
    Constant(bool),
}

impl PredicateDef {
    pub(crate) fn children(&self) -> Vec<Arc<Node>> {
        use PredicateKind::*;

        match &self.kind {
            Junction { terms, .. } => terms.read().clone(),
            Comparison { left, right, .. } => vec![Arc::clone(left), Arc::clone(right)],
            Between {
                value,
                lower,
                upper,
            } => vec![Arc::clone(value), Arc::clone(lower), Arc::clone(upper)],
            Like {
                value,
                pattern,
                escape,
            } => [Some(value), Some(pattern), escape.as_ref()]
                .into_iter()
                .flatten()
                .cloned()
                .collect(),
            NullCheck { value, .. } => vec![Arc::clone(value)],
            Empty { collection, .. } => vec![Arc::clone(collection)],
            Member {
                element,
                collection,
            } => vec![Arc::clone(element), Arc::clone(collection)],
            In { value, values } => std::iter::once(Arc::clone(value))
                .chain(values.read().iter().cloned())
                .collect(),
            Exists(subquery) => vec![Arc::clone(subquery)],
            Constant(_) => vec![],
        }
    }
}

/// A boolean-valued expression
#[derive(Debug, Clone)]
pub struct Predicate(pub(crate) Arc<Node>);

impl Predicate {
    pub(crate) fn new(kind: PredicateKind) -> Self {
        Self::with_negation(kind, false)
    }

    fn with_negation(kind: PredicateKind, negated: bool) -> Self {
        Self(Node::new(
            NodeKind::Predicate(PredicateDef { negated, kind }),
            JavaType::Boolean,
        ))
    }

    pub(crate) fn junction(op: BooleanOperator, terms: Vec<Arc<Node>>) -> Self {
        Self::new(PredicateKind::Junction {
            op,
            terms: RwLock::new(terms),
        })
    }

    pub(crate) fn constant(value: bool) -> Self {
        Self::new(PredicateKind::Constant(value))
    }

    /// `expr = value`, for boolean expressions that are not predicates themselves
    pub(crate) fn boolean_test(expr: Arc<Node>, value: bool) -> Self {
        let literal = Node::new(NodeKind::Constant(Literal::Boolean(value)), JavaType::Boolean);
        Self::new(PredicateKind::Comparison {
            op: CompareOp::Equal,
            left: expr,
            right: literal,
        })
    }

    pub(crate) fn def(&self) -> Option<&PredicateDef> {
        self.0.as_predicate()
    }

    pub fn is_negated(&self) -> bool {
        self.def().is_some_and(|d| d.negated)
    }

    /// The boolean operator of a conjunction or disjunction
    pub fn operator(&self) -> Option<BooleanOperator> {
        match self.def().map(|d| &d.kind) {
            Some(PredicateKind::Junction { op, .. }) => Some(*op),
            _ => None,
        }
    }

    /// The terms of a conjunction or disjunction
    pub fn expressions(&self) -> Vec<Predicate> {
        match self.def().map(|d| &d.kind) {
            Some(PredicateKind::Junction { terms, .. }) => {
                terms.read().iter().cloned().map(Predicate).collect()
            }
            _ => vec![],
        }
    }

    /// Add a term to a conjunction or disjunction
    pub fn add(&self, term: Predicate) -> CriteriaResult<&Self> {
        match self.def().map(|d| &d.kind) {
            Some(PredicateKind::Junction { terms, .. }) => {
                terms.write().push(term.0);
                Ok(self)
            }
            _ => invalid_argument!("terms can only be added to conjunctions and disjunctions"),
        }
    }

    /// Add a value to the list an IN predicate tests against
    pub fn value(&self, value: impl Into<Expression>) -> CriteriaResult<&Self> {
        match self.def().map(|d| &d.kind) {
            Some(PredicateKind::In { values, .. }) => {
                values.write().push(value.into().0);
                Ok(self)
            }
            _ => invalid_argument!("values can only be added to IN predicates"),
        }
    }

    /// The negation of this predicate.
    ///
    /// Comparisons and null or emptiness checks are replaced by their inverse rather than
    /// wrapped, and a junction of a single term negates that term.
    #[allow(clippy::should_implement_trait)]
    pub fn not(&self) -> Predicate {
        use PredicateKind::*;

        let Some(def) = self.def() else {
            return Predicate::boolean_test(Arc::clone(&self.0), false);
        };
        let negated = !def.negated;
        let kind = match &def.kind {
            Junction { op, terms } => {
                let terms = terms.read().clone();
                if let [term] = terms.as_slice() {
                    let term = Predicate(Arc::clone(term));
                    return if def.negated { term } else { term.not() };
                }
                Junction {
                    op: *op,
                    terms: RwLock::new(terms),
                }
            }
            Comparison { op, left, right } => Comparison {
                op: op.inverse(),
                left: Arc::clone(left),
                right: Arc::clone(right),
            },
            Between {
                value,
                lower,
                upper,
            } => Between {
                value: Arc::clone(value),
                lower: Arc::clone(lower),
                upper: Arc::clone(upper),
            },
            Like {
                value,
                pattern,
                escape,
            } => Like {
                value: Arc::clone(value),
                pattern: Arc::clone(pattern),
                escape: escape.clone(),
            },
            NullCheck { value, not_null } => NullCheck {
                value: Arc::clone(value),
                not_null: !not_null,
            },
            Empty {
                collection,
                not_empty,
            } => Empty {
                collection: Arc::clone(collection),
                not_empty: !not_empty,
            },
            Member {
                element,
                collection,
            } => Member {
                element: Arc::clone(element),
                collection: Arc::clone(collection),
            },
            In { value, values } => In {
                value: Arc::clone(value),
                values: RwLock::new(values.read().clone()),
            },
            Exists(subquery) => Exists(Arc::clone(subquery)),
            Constant(value) => Constant(!value),
        };
        Predicate::with_negation(kind, negated)
    }
}
