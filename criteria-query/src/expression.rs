use std::sync::Arc;

use criteria_errors::CriteriaResult;
use criteria_kernel::Literal;
use criteria_metamodel::JavaType;
use parking_lot::RwLock;

use crate::compound::CompoundSelection;
use crate::node::{Node, NodeKind};
use crate::path::Path;
use crate::predicate::{Predicate, PredicateKind};
use crate::subquery::Subquery;

/// Common behavior of every handle to a query node
pub trait Selectable {
    fn node(&self) -> &Arc<Node>;

    fn java_type(&self) -> JavaType {
        self.node().java_type().clone()
    }

    fn alias(&self) -> Option<String> {
        self.node().alias()
    }

    /// Set the alias of the selection. Fails if the alias is not a valid identifier, is a
    /// reserved word, or if the selection is already aliased.
    fn set_alias(&self, alias: &str) -> CriteriaResult<()> {
        self.node().set_alias(alias)
    }

    /// Like [`set_alias`](Selectable::set_alias), returning the handle for chaining
    fn aliased(self, alias: &str) -> CriteriaResult<Self>
    where
        Self: Sized,
    {
        self.set_alias(alias)?;
        Ok(self)
    }

    fn is_compound(&self) -> bool {
        self.node().is_compound()
    }
}

/// Any term that can appear in the selection list of a query
#[derive(Debug, Clone)]
pub struct Selection(pub(crate) Arc<Node>);

/// A selection that computes a value
#[derive(Debug, Clone)]
pub struct Expression(pub(crate) Arc<Node>);

impl Expression {
    pub(crate) fn new(kind: NodeKind, java_type: JavaType) -> Self {
        Self(Node::new(kind, java_type))
    }

    pub(crate) fn literal(lit: Literal, java_type: JavaType) -> Self {
        Self::new(NodeKind::Constant(lit), java_type)
    }

    pub fn is_null(&self) -> Predicate {
        Predicate::new(PredicateKind::NullCheck {
            value: Arc::clone(&self.0),
            not_null: false,
        })
    }

    pub fn is_not_null(&self) -> Predicate {
        Predicate::new(PredicateKind::NullCheck {
            value: Arc::clone(&self.0),
            not_null: true,
        })
    }

    /// `self IN (values...)`
    pub fn in_<I>(&self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        Predicate::new(PredicateKind::In {
            value: Arc::clone(&self.0),
            values: RwLock::new(values.into_iter().map(|v| v.into().0).collect()),
        })
    }

    /// Reinterpret the value of this expression as `ty`
    pub fn as_type(&self, ty: JavaType) -> Expression {
        if *self.0.java_type() == ty {
            return self.clone();
        }
        Expression::new(
            NodeKind::Cast {
                value: Arc::clone(&self.0),
            },
            ty,
        )
    }

    /// The predicate this expression is, if it is one
    pub fn as_predicate(&self) -> Option<Predicate> {
        self.0.as_predicate().map(|_| Predicate(Arc::clone(&self.0)))
    }
}

/// An ordering term of a query
#[derive(Debug, Clone)]
pub struct Order {
    expression: Expression,
    ascending: bool,
}

impl Order {
    pub(crate) fn new(expression: Expression, ascending: bool) -> Self {
        Self {
            expression,
            ascending,
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    /// The same ordering in the opposite direction
    #[must_use]
    pub fn reverse(&self) -> Order {
        Order::new(self.expression.clone(), !self.ascending)
    }
}

macro_rules! impl_selectable {
    ($($handle:ident),+) => {
        $(
            impl Selectable for $handle {
                fn node(&self) -> &Arc<Node> {
                    &self.0
                }
            }

            impl From<$handle> for Selection {
                fn from(handle: $handle) -> Self {
                    Selection(handle.0)
                }
            }

            impl From<&$handle> for Selection {
                fn from(handle: &$handle) -> Self {
                    Selection(Arc::clone(&handle.0))
                }
            }
        )+
    };
}

impl_selectable!(Expression, Predicate, Path, CompoundSelection);

impl Selectable for Selection {
    fn node(&self) -> &Arc<Node> {
        &self.0
    }
}

impl Selectable for Subquery {
    fn node(&self) -> &Arc<Node> {
        &self.node
    }
}

impl From<Subquery> for Selection {
    fn from(subquery: Subquery) -> Self {
        Selection(subquery.node)
    }
}

impl From<&Subquery> for Selection {
    fn from(subquery: &Subquery) -> Self {
        Selection(Arc::clone(&subquery.node))
    }
}

macro_rules! impl_into_expression {
    ($($handle:ident),+) => {
        $(
            impl From<$handle> for Expression {
                fn from(handle: $handle) -> Self {
                    Expression(handle.0)
                }
            }

            impl From<&$handle> for Expression {
                fn from(handle: &$handle) -> Self {
                    Expression(Arc::clone(&handle.0))
                }
            }
        )+
    };
}

impl_into_expression!(Predicate, Path);

impl From<&Expression> for Expression {
    fn from(expr: &Expression) -> Self {
        expr.clone()
    }
}

impl From<Subquery> for Expression {
    fn from(subquery: Subquery) -> Self {
        Expression(subquery.node)
    }
}

impl From<&Subquery> for Expression {
    fn from(subquery: &Subquery) -> Self {
        Expression(Arc::clone(&subquery.node))
    }
}
