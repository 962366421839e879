use std::sync::Arc;

use criteria_errors::{internal, CriteriaResult};
use criteria_kernel::{Literal, UnaryFunction, Value};
use criteria_metamodel::JavaType;
use tracing::trace;

use super::{condition, value as lower};
use crate::alias::AliasContext;
use crate::node::{Node, NodeKind};

fn boxed(cx: &mut AliasContext<'_>, node: &Arc<Node>) -> CriteriaResult<Box<Value>> {
    lower(cx, node).map(Box::new)
}

fn optional(
    cx: &mut AliasContext<'_>,
    node: Option<&Arc<Node>>,
) -> CriteriaResult<Option<Box<Value>>> {
    node.map(|n| boxed(cx, n)).transpose()
}

fn all(cx: &mut AliasContext<'_>, nodes: &[Arc<Node>]) -> CriteriaResult<Vec<Value>> {
    nodes.iter().map(|n| lower(cx, n)).collect()
}

/// Lower the nodes that compute values: literals, parameters, functions and conditionals
pub(super) fn value(cx: &mut AliasContext<'_>, node: &Arc<Node>) -> CriteriaResult<Value> {
    let ty = node.java_type().clone();
    Ok(match &node.kind {
        NodeKind::Constant(val) => Value::Literal {
            val: val.clone(),
            ty,
        },
        NodeKind::Parameter { .. } => {
            let (key, index) = cx.params.register(node)?;
            Value::Parameter { key, index, ty }
        }
        NodeKind::Unary {
            func: UnaryFunction::Size,
            arg,
        } if matches!(&arg.kind, NodeKind::Constant(lit) if lit.elements().is_some()) => {
            let NodeKind::Constant(lit) = &arg.kind else {
                internal!();
            };
            let len = lit.elements().map(<[Literal]>::len).unwrap_or_default();
            trace!(len, "folded SIZE of a literal collection");
            Value::Literal {
                val: Literal::Integer(len as i64),
                ty: JavaType::Integer,
            }
        }
        NodeKind::Unary { func, arg } => Value::Unary {
            func: *func,
            arg: boxed(cx, arg)?,
            ty,
        },
        NodeKind::Aggregate {
            func,
            distinct,
            arg,
        } => Value::Aggregate {
            func: *func,
            distinct: *distinct,
            arg: boxed(cx, arg)?,
            ty,
        },
        NodeKind::Arithmetic { op, left, right } => Value::Arithmetic {
            op: *op,
            left: boxed(cx, left)?,
            right: boxed(cx, right)?,
            ty,
        },
        NodeKind::Concat { left, right } => Value::Concat {
            left: boxed(cx, left)?,
            right: boxed(cx, right)?,
        },
        NodeKind::Substring { value, from, len } => Value::Substring {
            value: boxed(cx, value)?,
            from: boxed(cx, from)?,
            len: optional(cx, len.as_ref())?,
        },
        NodeKind::Locate {
            value,
            pattern,
            from,
        } => Value::Locate {
            value: boxed(cx, value)?,
            pattern: boxed(cx, pattern)?,
            from: optional(cx, from.as_ref())?,
        },
        NodeKind::Trim {
            value,
            trim_char,
            spec,
        } => Value::Trim {
            value: boxed(cx, value)?,
            trim_char: optional(cx, trim_char.as_ref())?,
            spec: *spec,
        },
        NodeKind::Cast { value } => Value::Cast {
            value: boxed(cx, value)?,
            ty,
        },
        NodeKind::Function { name, args } => Value::Function {
            name: name.clone(),
            args: all(cx, args)?,
            ty,
        },
        NodeKind::Current(temporal) => Value::Current(*temporal),
        NodeKind::Case { whens, otherwise } => {
            let whens = whens
                .iter()
                .map(|(when, then)| Ok((condition(cx, when)?, lower(cx, then)?)))
                .collect::<CriteriaResult<Vec<_>>>()?;
            let otherwise = match otherwise {
                Some(otherwise) => lower(cx, otherwise)?,
                None => Value::null(),
            };
            Value::GeneralCase {
                whens,
                otherwise: Box::new(otherwise),
                ty,
            }
        }
        NodeKind::SimpleCase {
            operand,
            whens,
            otherwise,
        } => {
            let operand = boxed(cx, operand)?;
            let whens = whens
                .iter()
                .map(|(when, then)| Ok((lower(cx, when)?, lower(cx, then)?)))
                .collect::<CriteriaResult<Vec<_>>>()?;
            let otherwise = match otherwise {
                Some(otherwise) => lower(cx, otherwise)?,
                None => Value::null(),
            };
            Value::SimpleCase {
                operand,
                whens,
                otherwise: Box::new(otherwise),
                ty,
            }
        }
        NodeKind::Coalesce(values) => Value::Coalesce {
            values: all(cx, values)?,
            ty,
        },
        NodeKind::NullIf { left, right } => Value::NullIf {
            left: boxed(cx, left)?,
            right: boxed(cx, right)?,
            ty,
        },
        NodeKind::MapEntry(map) => Value::MapEntry {
            map: boxed(cx, map)?,
            ty,
        },
        NodeKind::Path(_)
        | NodeKind::Predicate(_)
        | NodeKind::Subquery(_)
        | NodeKind::Quantified { .. }
        | NodeKind::Compound(_) => {
            internal!("{} reached the lowering of plain values", node.describe())
        }
    })
}

#[cfg(test)]
mod tests {
    use criteria_kernel::{AggregateFunction, ParameterKey};
    use criteria_metamodel::Metamodel;

    use super::*;
    use crate::alias::{AliasRegistry, ScopeFrame};
    use crate::options::CompilerOptions;
    use crate::params::ParameterMap;

    fn lower_alone(node: &Arc<Node>) -> CriteriaResult<Value> {
        let mut registry = AliasRegistry::new("autoAlias");
        let mut params = ParameterMap::default();
        let options = CompilerOptions::default();
        let model = Metamodel::default();
        let mut cx = AliasContext::new(&mut registry, &mut params, &options, &model);
        cx.with_frame(ScopeFrame::default(), |cx| lower(cx, node))
    }

    fn literal(lit: impl Into<Literal>) -> Arc<Node> {
        let lit = lit.into();
        let ty = lit.java_type();
        Node::new(NodeKind::Constant(lit), ty)
    }

    #[test]
    fn size_of_literal_collection_folds() {
        let size = Node::new(
            NodeKind::Unary {
                func: UnaryFunction::Size,
                arg: literal(vec![1, 2, 3]),
            },
            JavaType::Integer,
        );
        assert_eq!(
            lower_alone(&size).unwrap(),
            Value::Literal {
                val: Literal::Integer(3),
                ty: JavaType::Integer
            }
        );
    }

    #[test]
    fn aggregates_keep_their_type() {
        let count = Node::new(
            NodeKind::Aggregate {
                func: AggregateFunction::Count,
                distinct: false,
                arg: literal(1),
            },
            JavaType::Long,
        );
        let value = lower_alone(&count).unwrap();
        assert_eq!(value.ty(), JavaType::Long);
        assert_eq!(value.to_string(), "count(1)");
    }

    #[test]
    fn parameters_are_registered() {
        let param = Node::new(
            NodeKind::Parameter {
                name: Some("min".into()),
                value: None,
            },
            JavaType::Integer,
        );
        assert_eq!(
            lower_alone(&param).unwrap(),
            Value::Parameter {
                key: ParameterKey::Named("min".into()),
                index: 0,
                ty: JavaType::Integer
            }
        );
    }

    #[test]
    fn case_without_otherwise_yields_null() {
        let node = Node::new(
            NodeKind::Case {
                whens: vec![(literal(true), literal("yes"))],
                otherwise: None,
            },
            JavaType::String,
        );
        match lower_alone(&node).unwrap() {
            Value::GeneralCase { otherwise, .. } => {
                assert_eq!(otherwise.as_literal(), Some(&Literal::Null))
            }
            other => panic!("unexpected {other}"),
        }
    }
}
