use std::sync::Arc;

use criteria_errors::CriteriaResult;
use criteria_kernel::{CompareOp, Expr, Literal, Value};
use criteria_metamodel::JavaType;
use tracing::warn;

use super::{condition, value as lower_value};
use crate::alias::AliasContext;
use crate::node::{Node, NodeKind};
use crate::predicate::{BooleanOperator, PredicateDef, PredicateKind};

fn negate_if(expr: Expr, negated: bool) -> Expr {
    if negated {
        expr.not()
    } else {
        expr
    }
}

pub(super) fn lower(cx: &mut AliasContext<'_>, def: &PredicateDef) -> CriteriaResult<Expr> {
    use PredicateKind::*;

    let negated = def.negated;
    Ok(match &def.kind {
        Junction { op, terms } => {
            let terms = terms.read().clone();
            junction(cx, *op, &terms, negated)?
        }
        // Negation of a comparison has already been folded into its operator
        Comparison { op, left, right } => {
            Expr::compare(*op, lower_value(cx, left)?, lower_value(cx, right)?)
        }
        Between {
            value,
            lower: lo,
            upper: hi,
        } => {
            let value = lower_value(cx, value)?;
            let lo = lower_value(cx, lo)?;
            let hi = lower_value(cx, hi)?;
            if negated {
                Expr::compare(CompareOp::LessThan, value.clone(), lo)
                    .or(Expr::compare(CompareOp::GreaterThan, value, hi))
            } else {
                Expr::compare(CompareOp::GreaterOrEqual, value.clone(), lo)
                    .and(Expr::compare(CompareOp::LessOrEqual, value, hi))
            }
        }
        Like {
            value,
            pattern,
            escape,
        } => {
            let matches = Expr::Matches {
                value: lower_value(cx, value)?,
                pattern: lower_value(cx, pattern)?,
                single: '_',
                multi: '%',
                escape: escape.as_ref().map(|e| lower_value(cx, e)).transpose()?,
            };
            negate_if(matches, negated)
        }
        NullCheck { value, not_null } => {
            let value = lower_value(cx, value)?;
            if *not_null {
                Expr::is_not_null(value)
            } else {
                Expr::is_null(value)
            }
        }
        Empty {
            collection,
            not_empty,
        } => {
            let collection = lower_value(cx, collection)?;
            if *not_empty {
                Expr::IsNotEmpty(collection)
            } else {
                Expr::IsEmpty(collection)
            }
        }
        Member {
            element,
            collection,
        } => {
            let contains = Expr::Contains {
                collection: lower_value(cx, collection)?,
                element: lower_value(cx, element)?,
            };
            negate_if(contains, negated)
        }
        In { value, values } => {
            let values = values.read().clone();
            in_(cx, value, &values, negated)?
        }
        Exists(subquery) => {
            let subquery = lower_value(cx, subquery)?;
            if negated {
                Expr::IsEmpty(subquery)
            } else {
                Expr::IsNotEmpty(subquery)
            }
        }
        Constant(true) => Expr::True,
        Constant(false) => Expr::False,
    })
}

fn junction(
    cx: &mut AliasContext<'_>,
    op: BooleanOperator,
    terms: &[Arc<Node>],
    negated: bool,
) -> CriteriaResult<Expr> {
    if let [term] = terms {
        return Ok(negate_if(condition(cx, term)?, negated));
    }
    let terms = terms
        .iter()
        .map(|term| condition(cx, term))
        .collect::<CriteriaResult<Vec<_>>>()?;
    let folded = match op {
        BooleanOperator::And => Expr::conjoin(terms),
        BooleanOperator::Or => Expr::disjoin(terms),
    };
    Ok(match (folded, op, negated) {
        (Some(expr), _, negated) => negate_if(expr, negated),
        (None, BooleanOperator::And, false) | (None, BooleanOperator::Or, true) => Expr::True,
        (None, BooleanOperator::And, true) | (None, BooleanOperator::Or, false) => Expr::False,
    })
}

/// Whether values of type `element` can be compared for equality with values of type `value`
fn comparable(cx: &AliasContext<'_>, value: &JavaType, element: &JavaType) -> bool {
    value == element
        || *value == JavaType::Object
        || *element == JavaType::Object
        || (value.is_numeric() && element.is_numeric())
        || cx.model.is_assignable(value, element)
}

/// The equalities an IN against the elements of a literal expands to, or `None` if the elements
/// cannot be compared with the tested value
fn expand(cx: &AliasContext<'_>, tested: &Value, elements: &[Literal]) -> Option<Expr> {
    let tested_ty = tested.ty();
    let mismatch = elements
        .iter()
        .filter(|e| !e.is_null())
        .map(Literal::java_type)
        .find(|ty| !comparable(cx, &tested_ty, ty));
    if let Some(ty) = mismatch {
        warn!(
            %tested,
            element_type = %ty,
            "IN elements do not match the type of the tested value, testing containment instead"
        );
        return None;
    }
    Some(
        Expr::disjoin(
            elements
                .iter()
                .map(|e| Expr::equal(tested.clone(), Value::literal(e.clone()))),
        )
        .unwrap_or(Expr::False),
    )
}

/// `tested IN (values...)`, guarded by `tested IS NOT NULL`
fn in_(
    cx: &mut AliasContext<'_>,
    tested: &Arc<Node>,
    values: &[Arc<Node>],
    negated: bool,
) -> CriteriaResult<Expr> {
    let e = lower_value(cx, tested)?;
    let body = match values {
        [single] => in_single(cx, &e, single)?,
        _ => {
            let equalities = values
                .iter()
                .map(|v| Ok(Expr::equal(e.clone(), lower_value(cx, v)?)))
                .collect::<CriteriaResult<Vec<_>>>()?;
            Expr::disjoin(equalities).unwrap_or(Expr::False)
        }
    };
    Ok(negate_if(body, negated).and(Expr::is_not_null(e)))
}

fn in_single(cx: &mut AliasContext<'_>, e: &Value, single: &Arc<Node>) -> CriteriaResult<Expr> {
    let ty = single.java_type();
    match &single.kind {
        NodeKind::Parameter {
            value: Some(bound), ..
        } if cx.options.expand_bound_in_parameters
            && (ty.is_array() || ty.is_collection())
            && ty
                .element_type()
                .is_some_and(|element| comparable(&*cx, &e.ty(), element)) =>
        {
            if let Some(expanded) = bound.elements().and_then(|els| expand(&*cx, e, els)) {
                return Ok(expanded);
            }
        }
        NodeKind::Constant(lit) => {
            if let Some(elements) = lit.elements() {
                if let Some(expanded) = expand(&*cx, e, elements) {
                    return Ok(expanded);
                }
            } else {
                return Ok(Expr::equal(e.clone(), lower_value(cx, single)?));
            }
        }
        _ => {}
    }

    // Anything but a scalar literal is tested for containment
    Ok(Expr::Contains {
        collection: lower_value(cx, single)?,
        element: e.clone(),
    })
}
