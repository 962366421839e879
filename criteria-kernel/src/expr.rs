use std::fmt;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Literal, Value, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum CompareOp {
    #[display("=")]
    Equal,
    #[display("<>")]
    NotEqual,
    #[display(">")]
    GreaterThan,
    #[display(">=")]
    GreaterOrEqual,
    #[display("<")]
    LessThan,
    #[display("<=")]
    LessOrEqual,
}

impl CompareOp {
    /// The operator that holds exactly when this one does not
    pub fn inverse(self) -> Self {
        use CompareOp::*;
        match self {
            Equal => NotEqual,
            NotEqual => Equal,
            GreaterThan => LessOrEqual,
            LessOrEqual => GreaterThan,
            GreaterOrEqual => LessThan,
            LessThan => GreaterOrEqual,
        }
    }
}

/// A boolean expression in the filter or having clause of a compiled query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    True,
    False,
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        op: CompareOp,
        left: Value,
        right: Value,
    },
    Matches {
        value: Value,
        pattern: Value,
        /// Single-character wildcard
        single: char,
        /// Multi-character wildcard
        multi: char,
        escape: Option<Value>,
    },
    /// `element MEMBER OF collection`, and IN tests against a collection value
    Contains {
        collection: Value,
        element: Value,
    },
    IsEmpty(Value),
    IsNotEmpty(Value),
    /// Introduces `variable` ranging over the elements reached by `path`
    BindVariable {
        variable: Variable,
        path: Value,
    },
}

impl Expr {
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn compare(op: CompareOp, left: Value, right: Value) -> Expr {
        Expr::Compare { op, left, right }
    }

    pub fn equal(left: Value, right: Value) -> Expr {
        Expr::compare(CompareOp::Equal, left, right)
    }

    pub fn is_null(value: Value) -> Expr {
        Expr::equal(value, Value::literal(Literal::Null))
    }

    pub fn is_not_null(value: Value) -> Expr {
        Expr::compare(CompareOp::NotEqual, value, Value::literal(Literal::Null))
    }

    /// Conjoin `exprs` left to right, or return `None` if there are none
    pub fn conjoin<I>(exprs: I) -> Option<Expr>
    where
        I: IntoIterator<Item = Expr>,
    {
        exprs.into_iter().reduce(Expr::and)
    }

    /// Disjoin `exprs` left to right, or return `None` if there are none
    pub fn disjoin<I>(exprs: I) -> Option<Expr>
    where
        I: IntoIterator<Item = Expr>,
    {
        exprs.into_iter().reduce(Expr::or)
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Expr::True)
    }

    /// Every variable bound anywhere inside this expression, in binding order
    pub fn bound_variables(&self) -> Vec<&Variable> {
        let mut out = vec![];
        self.collect_bound(&mut out);
        out
    }

    fn collect_bound<'a>(&'a self, out: &mut Vec<&'a Variable>) {
        match self {
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_bound(out);
                r.collect_bound(out);
            }
            Expr::Not(e) => e.collect_bound(out),
            Expr::BindVariable { variable, .. } => out.push(variable),
            _ => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Expr::*;

        match self {
            True => write!(f, "true"),
            False => write!(f, "false"),
            And(l, r) => write!(f, "({l} and {r})"),
            Or(l, r) => write!(f, "({l} or {r})"),
            Not(e) => write!(f, "not({e})"),
            Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Matches {
                value,
                pattern,
                escape,
                ..
            } => {
                write!(f, "{value} matches {pattern}")?;
                if let Some(escape) = escape {
                    write!(f, " escape {escape}")?;
                }
                Ok(())
            }
            Contains {
                collection,
                element,
            } => write!(f, "{collection} contains {element}"),
            IsEmpty(v) => write!(f, "{v} is empty"),
            IsNotEmpty(v) => write!(f, "{v} is not empty"),
            BindVariable { variable, path } => write!(f, "bind({} in {path})", variable.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use criteria_metamodel::JavaType;

    use super::*;

    #[test]
    fn inverse_is_involutive() {
        use CompareOp::*;
        for op in [
            Equal,
            NotEqual,
            GreaterThan,
            GreaterOrEqual,
            LessThan,
            LessOrEqual,
        ] {
            assert_ne!(op.inverse(), op);
            assert_eq!(op.inverse().inverse(), op);
        }
        assert_eq!(GreaterThan.inverse(), LessOrEqual);
    }

    #[test]
    fn conjoin_folds_left() {
        let a = Expr::is_null(Value::literal(1.into()));
        let b = Expr::True;
        let c = Expr::False;
        assert_eq!(
            Expr::conjoin([a.clone(), b.clone(), c.clone()]),
            Some(a.and(b).and(c))
        );
        assert_eq!(Expr::conjoin([]), None);
    }

    #[test]
    fn collects_bound_variables() {
        let var = Variable::bound("p", JavaType::managed("Phone"));
        let bind = Expr::BindVariable {
            variable: var.clone(),
            path: Value::null(),
        };
        let expr = Expr::True.and(bind).not();
        assert_eq!(expr.bound_variables(), vec![&var]);
    }
}
