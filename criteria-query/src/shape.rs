//! Computes the [`ResultShape`] describing how a query's flat result rows are assembled into its
//! results.

use std::sync::Arc;

use criteria_errors::{internal, CriteriaError, CriteriaResult};
use criteria_kernel::{FillStrategy, ResultShape};
use criteria_metamodel::JavaType;
use tracing::trace;

use crate::alias::AliasContext;
use crate::compound::{CompoundDef, CompoundKind};
use crate::node::{Node, NodeKind};
use crate::query::QueryDef;

pub(crate) fn result_shape(cx: &mut AliasContext<'_>, def: &QueryDef) -> CriteriaResult<ResultShape> {
    let selection = match &def.selection {
        Some(selection) => Arc::clone(selection),
        None => match def.roots.first() {
            Some(root) => Arc::clone(root),
            None => internal!("query without roots reached result shaping"),
        },
    };

    let shape = match &selection.kind {
        NodeKind::Compound(compound) => compound_shape(cx, &selection, compound)?,
        _ if def.result_type == JavaType::Tuple => ResultShape::compound(
            JavaType::Tuple,
            FillStrategy::Tuple {
                aliases: vec![cx.alias(&selection)],
            },
            vec![ResultShape::leaf(selection.java_type().clone())],
        ),
        _ => ResultShape::leaf(selection.java_type().clone()),
    };
    trace!(%shape, "computed result shape");
    Ok(shape)
}

fn child_shape(cx: &mut AliasContext<'_>, item: &Arc<Node>) -> CriteriaResult<ResultShape> {
    match &item.kind {
        NodeKind::Compound(compound) => compound_shape(cx, item, compound),
        _ => Ok(ResultShape::leaf(item.java_type().clone())),
    }
}

/// The shape of the compound selection `node`. Nested compound selections are shaped by their own
/// kind and type.
fn compound_shape(
    cx: &mut AliasContext<'_>,
    node: &Arc<Node>,
    compound: &CompoundDef,
) -> CriteriaResult<ResultShape> {
    let mut children = compound
        .items
        .iter()
        .map(|item| child_shape(cx, item))
        .collect::<CriteriaResult<Vec<_>>>()?;

    let ty = node.java_type().clone();
    match &compound.kind {
        CompoundKind::Tuple => Ok(tuple(cx, compound, children)),
        CompoundKind::Array => Ok(array(JavaType::Object, children)),
        CompoundKind::Construct(class) => construct(cx, class, compound, children),
        CompoundKind::Multi => match &ty {
            JavaType::Tuple => Ok(tuple(cx, compound, children)),
            JavaType::Array(component) => Ok(array((**component).clone(), children)),
            _ if children.len() == 1
                && cx.model.is_assignable(&ty, compound.items[0].java_type()) =>
            {
                Ok(children.remove(0))
            }
            JavaType::Object => Ok(array(JavaType::Object, children)),
            JavaType::Named(class) | JavaType::Managed(class) => {
                construct(cx, class, compound, children)
            }
            other => Err(unconstructible(&other.to_string(), compound)),
        },
    }
}

fn tuple(cx: &mut AliasContext<'_>, compound: &CompoundDef, children: Vec<ResultShape>) -> ResultShape {
    let aliases = compound.items.iter().map(|item| cx.alias(item)).collect();
    ResultShape::compound(JavaType::Tuple, FillStrategy::Tuple { aliases }, children)
}

fn array(component: JavaType, children: Vec<ResultShape>) -> ResultShape {
    let len = children.len();
    ResultShape::compound(
        JavaType::array_of(component.clone()),
        FillStrategy::Array { component, len },
        children,
    )
}

fn unconstructible(class: &str, compound: &CompoundDef) -> CriteriaError {
    CriteriaError::UnconstructibleType {
        class: class.to_owned(),
        arguments: compound
            .items
            .iter()
            .map(|item| item.java_type().to_string())
            .collect(),
    }
}

/// Resolve the constructor of `class` whose parameters accept the types of the selected items,
/// in order
fn construct(
    cx: &AliasContext<'_>,
    class: &str,
    compound: &CompoundDef,
    children: Vec<ResultShape>,
) -> CriteriaResult<ResultShape> {
    let arguments: Vec<&JavaType> = compound.items.iter().map(|i| i.java_type()).collect();
    let constructor = cx.model.result_class(class).and_then(|rc| {
        rc.constructors.iter().find(|parameters| {
            parameters.len() == arguments.len()
                && parameters
                    .iter()
                    .zip(&arguments)
                    .all(|(param, arg)| cx.model.is_assignable(param, arg))
        })
    });
    let Some(parameters) = constructor else {
        return Err(unconstructible(class, compound));
    };
    Ok(ResultShape::compound(
        JavaType::named(class),
        FillStrategy::NewInstance {
            class: class.to_owned(),
            parameters: parameters.clone(),
        },
        children,
    ))
}
