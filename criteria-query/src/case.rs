use std::sync::Arc;

use criteria_metamodel::JavaType;

use crate::expression::Expression;
use crate::node::{Node, NodeKind};

/// Builds a general `CASE WHEN condition THEN result ... ELSE otherwise END` expression.
/// Created by [`CriteriaBuilder::select_case`](crate::CriteriaBuilder::select_case).
#[derive(Debug, Default)]
pub struct Case {
    whens: Vec<(Arc<Node>, Arc<Node>)>,
}

impl Case {
    pub fn when(mut self, condition: impl Into<Expression>, result: impl Into<Expression>) -> Self {
        self.whens.push((condition.into().0, result.into().0));
        self
    }

    pub fn otherwise(self, result: impl Into<Expression>) -> Expression {
        self.finish(Some(result.into().0))
    }

    /// Finish the case expression, evaluating to NULL when no condition holds
    pub fn end(self) -> Expression {
        self.finish(None)
    }

    fn finish(self, otherwise: Option<Arc<Node>>) -> Expression {
        let ty = result_type(&self.whens, otherwise.as_ref());
        Expression::new(
            NodeKind::Case {
                whens: self.whens,
                otherwise,
            },
            ty,
        )
    }
}

/// Builds `CASE operand WHEN value THEN result ... ELSE otherwise END`.
/// Created by [`CriteriaBuilder::select_simple_case`](crate::CriteriaBuilder::select_simple_case).
#[derive(Debug)]
pub struct SimpleCase {
    operand: Arc<Node>,
    whens: Vec<(Arc<Node>, Arc<Node>)>,
}

impl SimpleCase {
    pub(crate) fn new(operand: Arc<Node>) -> Self {
        Self {
            operand,
            whens: vec![],
        }
    }

    pub fn when(mut self, value: impl Into<Expression>, result: impl Into<Expression>) -> Self {
        self.whens.push((value.into().0, result.into().0));
        self
    }

    pub fn otherwise(self, result: impl Into<Expression>) -> Expression {
        self.finish(Some(result.into().0))
    }

    pub fn end(self) -> Expression {
        self.finish(None)
    }

    fn finish(self, otherwise: Option<Arc<Node>>) -> Expression {
        let ty = result_type(&self.whens, otherwise.as_ref());
        Expression::new(
            NodeKind::SimpleCase {
                operand: self.operand,
                whens: self.whens,
                otherwise,
            },
            ty,
        )
    }
}

/// The type of the first result, or `Object` if there is none
fn result_type(whens: &[(Arc<Node>, Arc<Node>)], otherwise: Option<&Arc<Node>>) -> JavaType {
    whens
        .iter()
        .map(|(_, result)| result)
        .chain(otherwise)
        .map(|n| n.java_type().clone())
        .find(|ty| *ty != JavaType::Object)
        .unwrap_or(JavaType::Object)
}
