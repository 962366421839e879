//! Factory for criteria queries and the expressions, predicates and selections they are built
//! from.

use std::sync::Arc;

use criteria_errors::CriteriaResult;
use criteria_kernel::{
    AggregateFunction, ArithmeticOp, CompareOp, Literal, Temporal, TrimSpec, UnaryFunction,
};
use criteria_metamodel::{JavaType, Metamodel};
use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::case::{Case, SimpleCase};
use crate::compound::{collect_items, CompoundKind, CompoundSelection};
use crate::expression::{Expression, Order, Selection};
use crate::node::{Node, NodeKind, Quantifier};
use crate::options::CompilerOptions;
use crate::predicate::{BooleanOperator, Predicate, PredicateKind};
use crate::query::CriteriaQuery;
use crate::subquery::Subquery;

/// Numeric types, narrowest first
const NUMERIC_RANKS: [JavaType; 8] = [
    JavaType::Byte,
    JavaType::Short,
    JavaType::Integer,
    JavaType::Long,
    JavaType::BigInteger,
    JavaType::Float,
    JavaType::Double,
    JavaType::BigDecimal,
];

/// The type of an arithmetic operation on values of types `left` and `right`
fn widest(left: &JavaType, right: &JavaType) -> JavaType {
    let rank = |ty: &JavaType| NUMERIC_RANKS.iter().position(|r| r == ty);
    match (rank(left), rank(right)) {
        (Some(l), Some(r)) if r > l => right.clone(),
        (Some(_), _) => left.clone(),
        (None, Some(_)) => right.clone(),
        (None, None) => left.clone(),
    }
}

fn expr(e: impl Into<Expression>) -> Arc<Node> {
    e.into().0
}

fn is_null_literal(node: &Node) -> bool {
    matches!(&node.kind, NodeKind::Constant(Literal::Null))
}

/// Creates criteria queries, and the expressions and predicates used in them.
///
/// ```ignore
/// let cb = CriteriaBuilder::new(model);
/// let mut q = cb.create_query(JavaType::managed("Employee"));
/// let e = q.from("Employee")?;
/// q.where_(cb.greater_than(e.get("age")?, cb.literal(30)))?;
/// let compiled = q.compile()?;
/// ```
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    model: Arc<Metamodel>,
    options: CompilerOptions,
}

impl CriteriaBuilder {
    pub fn new(model: Arc<Metamodel>) -> Self {
        Self {
            model,
            options: CompilerOptions::default(),
        }
    }

    pub fn with_options(model: Arc<Metamodel>, options: CompilerOptions) -> CriteriaResult<Self> {
        options.validate()?;
        Ok(Self { model, options })
    }

    pub fn metamodel(&self) -> &Arc<Metamodel> {
        &self.model
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn create_query(&self, result_type: JavaType) -> CriteriaQuery {
        CriteriaQuery::new(Arc::clone(&self.model), result_type, self.options.clone())
    }

    pub fn create_tuple_query(&self) -> CriteriaQuery {
        self.create_query(JavaType::Tuple)
    }

    // Literals and parameters

    /// A constant. Boolean constants are the always true and always false predicates.
    pub fn literal(&self, value: impl Into<Literal>) -> Expression {
        match value.into() {
            Literal::Boolean(b) => Predicate::constant(b).into(),
            lit => {
                let ty = lit.java_type();
                Expression::literal(lit, ty)
            }
        }
    }

    pub fn null_literal(&self, ty: JavaType) -> Expression {
        Expression::literal(Literal::Null, ty)
    }

    /// A positional parameter
    pub fn parameter(&self, ty: JavaType) -> Expression {
        Expression::new(
            NodeKind::Parameter {
                name: None,
                value: None,
            },
            ty,
        )
    }

    pub fn named_parameter(&self, ty: JavaType, name: &str) -> Expression {
        Expression::new(
            NodeKind::Parameter {
                name: Some(name.to_owned()),
                value: None,
            },
            ty,
        )
    }

    /// A named parameter whose value is already known, eg the collection an IN tests against
    pub fn bound_parameter(
        &self,
        ty: JavaType,
        name: &str,
        value: impl Into<Literal>,
    ) -> Expression {
        Expression::new(
            NodeKind::Parameter {
                name: Some(name.to_owned()),
                value: Some(value.into()),
            },
            ty,
        )
    }

    // Arithmetic

    fn arithmetic(
        &self,
        op: ArithmeticOp,
        left: impl Into<Expression>,
        right: impl Into<Expression>,
    ) -> Expression {
        let (left, right) = (expr(left), expr(right));
        let ty = match op {
            ArithmeticOp::Mod => JavaType::Integer,
            _ => widest(left.java_type(), right.java_type()),
        };
        Expression::new(NodeKind::Arithmetic { op, left, right }, ty)
    }

    pub fn sum(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Add, left, right)
    }

    pub fn diff(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Subtract, left, right)
    }

    pub fn prod(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Multiply, left, right)
    }

    pub fn quot(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Divide, left, right)
    }

    pub fn modulo(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        self.arithmetic(ArithmeticOp::Mod, left, right)
    }

    /// `0 - x`
    pub fn neg(&self, x: impl Into<Expression>) -> Expression {
        self.diff(self.literal(0), x)
    }

    fn unary(&self, func: UnaryFunction, arg: impl Into<Expression>, ty: JavaType) -> Expression {
        Expression::new(NodeKind::Unary { func, arg: expr(arg) }, ty)
    }

    pub fn abs(&self, x: impl Into<Expression>) -> Expression {
        let x = expr(x);
        let ty = x.java_type().clone();
        Expression::new(
            NodeKind::Unary {
                func: UnaryFunction::Abs,
                arg: x,
            },
            ty,
        )
    }

    pub fn sqrt(&self, x: impl Into<Expression>) -> Expression {
        self.unary(UnaryFunction::Sqrt, x, JavaType::Double)
    }

    // Aggregates

    fn aggregate(
        &self,
        func: AggregateFunction,
        distinct: bool,
        arg: impl Into<Expression>,
    ) -> Expression {
        let arg = expr(arg);
        let ty = match func {
            AggregateFunction::Count => JavaType::Long,
            AggregateFunction::Avg => JavaType::Double,
            AggregateFunction::Sum => match arg.java_type() {
                JavaType::Byte | JavaType::Short | JavaType::Integer => JavaType::Long,
                JavaType::Float => JavaType::Double,
                other => other.clone(),
            },
            AggregateFunction::Max | AggregateFunction::Min => arg.java_type().clone(),
        };
        Expression::new(
            NodeKind::Aggregate {
                func,
                distinct,
                arg,
            },
            ty,
        )
    }

    pub fn count(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Count, false, x)
    }

    pub fn count_distinct(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Count, true, x)
    }

    /// `SUM(x)`
    pub fn sum_of(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Sum, false, x)
    }

    /// `SUM(x)` of an integer expression, as a Long
    pub fn sum_as_long(&self, x: impl Into<Expression>) -> Expression {
        self.sum_of(x).as_type(JavaType::Long)
    }

    /// `SUM(x)` of a floating point expression, as a Double
    pub fn sum_as_double(&self, x: impl Into<Expression>) -> Expression {
        self.sum_of(x).as_type(JavaType::Double)
    }

    pub fn avg(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Avg, false, x)
    }

    pub fn max(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Max, false, x)
    }

    pub fn min(&self, x: impl Into<Expression>) -> Expression {
        self.aggregate(AggregateFunction::Min, false, x)
    }

    pub fn greatest(&self, x: impl Into<Expression>) -> Expression {
        self.max(x)
    }

    pub fn least(&self, x: impl Into<Expression>) -> Expression {
        self.min(x)
    }

    // Strings

    pub fn concat(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        Expression::new(
            NodeKind::Concat {
                left: expr(left),
                right: expr(right),
            },
            JavaType::String,
        )
    }

    /// `SUBSTRING(x, from)`, `from` being one-based
    pub fn substring(&self, x: impl Into<Expression>, from: impl Into<Expression>) -> Expression {
        Expression::new(
            NodeKind::Substring {
                value: expr(x),
                from: expr(from),
                len: None,
            },
            JavaType::String,
        )
    }

    /// `SUBSTRING(x, from, len)`
    pub fn substring_for(
        &self,
        x: impl Into<Expression>,
        from: impl Into<Expression>,
        len: impl Into<Expression>,
    ) -> Expression {
        Expression::new(
            NodeKind::Substring {
                value: expr(x),
                from: expr(from),
                len: Some(expr(len)),
            },
            JavaType::String,
        )
    }

    /// `TRIM(spec FROM x)`, trimming blanks
    pub fn trim(&self, spec: TrimSpec, x: impl Into<Expression>) -> Expression {
        Expression::new(
            NodeKind::Trim {
                value: expr(x),
                trim_char: None,
                spec,
            },
            JavaType::String,
        )
    }

    /// `TRIM(spec c FROM x)`
    pub fn trim_char(
        &self,
        spec: TrimSpec,
        c: impl Into<Expression>,
        x: impl Into<Expression>,
    ) -> Expression {
        Expression::new(
            NodeKind::Trim {
                value: expr(x),
                trim_char: Some(expr(c)),
                spec,
            },
            JavaType::String,
        )
    }

    pub fn lower(&self, x: impl Into<Expression>) -> Expression {
        self.unary(UnaryFunction::Lower, x, JavaType::String)
    }

    pub fn upper(&self, x: impl Into<Expression>) -> Expression {
        self.unary(UnaryFunction::Upper, x, JavaType::String)
    }

    pub fn length(&self, x: impl Into<Expression>) -> Expression {
        self.unary(UnaryFunction::Length, x, JavaType::Integer)
    }

    /// The one-based position of `pattern` in `x`, or 0
    pub fn locate(&self, x: impl Into<Expression>, pattern: impl Into<Expression>) -> Expression {
        Expression::new(
            NodeKind::Locate {
                value: expr(x),
                pattern: expr(pattern),
                from: None,
            },
            JavaType::Integer,
        )
    }

    pub fn locate_from(
        &self,
        x: impl Into<Expression>,
        pattern: impl Into<Expression>,
        from: impl Into<Expression>,
    ) -> Expression {
        Expression::new(
            NodeKind::Locate {
                value: expr(x),
                pattern: expr(pattern),
                from: Some(expr(from)),
            },
            JavaType::Integer,
        )
    }

    // Date and time

    pub fn current_date(&self) -> Expression {
        self.current(Temporal::CurrentDate)
    }

    pub fn current_time(&self) -> Expression {
        self.current(Temporal::CurrentTime)
    }

    pub fn current_timestamp(&self) -> Expression {
        self.current(Temporal::CurrentTimestamp)
    }

    fn current(&self, temporal: Temporal) -> Expression {
        Expression::new(NodeKind::Current(temporal), temporal.java_type())
    }

    // Conversions

    pub fn to_long(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::Long)
    }

    pub fn to_integer(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::Integer)
    }

    pub fn to_float(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::Float)
    }

    pub fn to_double(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::Double)
    }

    pub fn to_big_decimal(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::BigDecimal)
    }

    pub fn to_big_integer(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::BigInteger)
    }

    pub fn to_string(&self, x: impl Into<Expression>) -> Expression {
        x.into().as_type(JavaType::String)
    }

    // Conditionals

    pub fn select_case(&self) -> Case {
        Case::default()
    }

    pub fn select_simple_case(&self, operand: impl Into<Expression>) -> SimpleCase {
        SimpleCase::new(expr(operand))
    }

    /// The first of `values` that is not NULL
    pub fn coalesce<I>(&self, values: I) -> Expression
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        let values: Vec<_> = values.into_iter().map(expr).collect();
        let ty = values
            .iter()
            .map(|v| v.java_type())
            .find(|ty| **ty != JavaType::Object)
            .cloned()
            .unwrap_or(JavaType::Object);
        Expression::new(NodeKind::Coalesce(values), ty)
    }

    /// NULL if `left` equals `right`, otherwise `left`
    pub fn nullif(&self, left: impl Into<Expression>, right: impl Into<Expression>) -> Expression {
        let left = expr(left);
        let ty = left.java_type().clone();
        Expression::new(
            NodeKind::NullIf {
                left,
                right: expr(right),
            },
            ty,
        )
    }

    // Collections

    /// A constant holding the keys of `map`
    pub fn keys<K, V>(&self, map: &IndexMap<K, V>) -> Expression
    where
        K: Clone + Into<Literal>,
    {
        self.literal(Literal::Collection(
            map.keys().cloned().map(Into::into).collect(),
        ))
    }

    /// A constant holding the values of `map`
    pub fn values<K, V>(&self, map: &IndexMap<K, V>) -> Expression
    where
        V: Clone + Into<Literal>,
    {
        self.literal(Literal::Collection(
            map.values().cloned().map(Into::into).collect(),
        ))
    }

    pub fn size(&self, collection: impl Into<Expression>) -> Expression {
        self.unary(UnaryFunction::Size, collection, JavaType::Integer)
    }

    pub fn is_empty(&self, collection: impl Into<Expression>) -> Predicate {
        Predicate::new(PredicateKind::Empty {
            collection: expr(collection),
            not_empty: false,
        })
    }

    pub fn is_not_empty(&self, collection: impl Into<Expression>) -> Predicate {
        Predicate::new(PredicateKind::Empty {
            collection: expr(collection),
            not_empty: true,
        })
    }

    pub fn is_member(
        &self,
        element: impl Into<Expression>,
        collection: impl Into<Expression>,
    ) -> Predicate {
        Predicate::new(PredicateKind::Member {
            element: expr(element),
            collection: expr(collection),
        })
    }

    pub fn is_not_member(
        &self,
        element: impl Into<Expression>,
        collection: impl Into<Expression>,
    ) -> Predicate {
        self.is_member(element, collection).not()
    }

    /// A call to the database function `name`, returning values of type `ty`
    pub fn function<I>(&self, name: &str, ty: JavaType, args: I) -> Expression
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        Expression::new(
            NodeKind::Function {
                name: name.to_owned(),
                args: args.into_iter().map(expr).collect(),
            },
            ty,
        )
    }

    // Subqueries

    pub fn exists(&self, subquery: &Subquery) -> Predicate {
        Predicate::new(PredicateKind::Exists(Arc::clone(&subquery.node)))
    }

    fn quantified(&self, quantifier: Quantifier, subquery: &Subquery) -> Expression {
        Expression::new(
            NodeKind::Quantified {
                quantifier,
                subquery: Arc::clone(&subquery.node),
            },
            subquery.node.java_type().clone(),
        )
    }

    pub fn all(&self, subquery: &Subquery) -> Expression {
        self.quantified(Quantifier::All, subquery)
    }

    pub fn any(&self, subquery: &Subquery) -> Expression {
        self.quantified(Quantifier::Any, subquery)
    }

    pub fn some(&self, subquery: &Subquery) -> Expression {
        self.any(subquery)
    }

    // Compound selections

    /// Select `items` as the arguments of a constructor of the result class `class`
    pub fn construct<I>(&self, class: &str, items: I) -> CompoundSelection
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        CompoundSelection::new(
            CompoundKind::Construct(class.to_owned()),
            collect_items(items),
            JavaType::named(class),
        )
    }

    pub fn tuple<I>(&self, items: I) -> CompoundSelection
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        CompoundSelection::new(CompoundKind::Tuple, collect_items(items), JavaType::Tuple)
    }

    pub fn array<I>(&self, items: I) -> CompoundSelection
    where
        I: IntoIterator,
        I::Item: Into<Selection>,
    {
        CompoundSelection::new(
            CompoundKind::Array,
            collect_items(items),
            JavaType::array_of(JavaType::Object),
        )
    }

    // Ordering

    pub fn asc(&self, x: impl Into<Expression>) -> Order {
        Order::new(x.into(), true)
    }

    pub fn desc(&self, x: impl Into<Expression>) -> Order {
        Order::new(x.into(), false)
    }

    // Predicates

    fn junction<I>(&self, op: BooleanOperator, terms: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        Predicate::junction(op, terms.into_iter().map(expr).collect())
    }

    /// The conjunction of `terms`. No terms is always true.
    pub fn and<I>(&self, terms: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        self.junction(BooleanOperator::And, terms)
    }

    /// The disjunction of `terms`. No terms is always false.
    pub fn or<I>(&self, terms: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: Into<Expression>,
    {
        self.junction(BooleanOperator::Or, terms)
    }

    /// An empty conjunction, to add terms to
    pub fn conjunction(&self) -> Predicate {
        Predicate::junction(BooleanOperator::And, vec![])
    }

    /// An empty disjunction, to add terms to
    pub fn disjunction(&self) -> Predicate {
        Predicate::junction(BooleanOperator::Or, vec![])
    }

    pub fn not(&self, x: impl Into<Expression>) -> Predicate {
        let x = x.into();
        match x.as_predicate() {
            Some(predicate) => predicate.not(),
            None => Predicate::boolean_test(x.0, false),
        }
    }

    pub fn is_true(&self, x: impl Into<Expression>) -> Predicate {
        let x = x.into();
        if let Some(predicate) = x.as_predicate() {
            if let (Some(op), true) = (predicate.operator(), predicate.expressions().is_empty()) {
                let holds = (op == BooleanOperator::And) != predicate.is_negated();
                return Predicate::constant(holds);
            }
        }
        Predicate::boolean_test(x.0, true)
    }

    pub fn is_false(&self, x: impl Into<Expression>) -> Predicate {
        Predicate::boolean_test(expr(x), false)
    }

    pub fn is_null(&self, x: impl Into<Expression>) -> Predicate {
        x.into().is_null()
    }

    pub fn is_not_null(&self, x: impl Into<Expression>) -> Predicate {
        x.into().is_not_null()
    }

    fn compare(
        &self,
        op: CompareOp,
        left: impl Into<Expression>,
        right: impl Into<Expression>,
    ) -> Predicate {
        Predicate::new(PredicateKind::Comparison {
            op,
            left: expr(left),
            right: expr(right),
        })
    }

    /// `x = y`. Equality with a NULL literal is an IS NULL test.
    pub fn equal(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        let (x, y) = (x.into(), y.into());
        if is_null_literal(&y.0) {
            return x.is_null();
        }
        if is_null_literal(&x.0) {
            return y.is_null();
        }
        self.compare(CompareOp::Equal, x, y)
    }

    /// `x <> y`. Inequality with a NULL literal is an IS NOT NULL test.
    pub fn not_equal(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        let (x, y) = (x.into(), y.into());
        if is_null_literal(&y.0) {
            return x.is_not_null();
        }
        if is_null_literal(&x.0) {
            return y.is_not_null();
        }
        self.compare(CompareOp::NotEqual, x, y)
    }

    pub fn greater_than(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::GreaterThan, x, y)
    }

    pub fn greater_than_or_equal_to(
        &self,
        x: impl Into<Expression>,
        y: impl Into<Expression>,
    ) -> Predicate {
        self.compare(CompareOp::GreaterOrEqual, x, y)
    }

    pub fn less_than(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.compare(CompareOp::LessThan, x, y)
    }

    pub fn less_than_or_equal_to(
        &self,
        x: impl Into<Expression>,
        y: impl Into<Expression>,
    ) -> Predicate {
        self.compare(CompareOp::LessOrEqual, x, y)
    }

    pub fn gt(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.greater_than(x, y)
    }

    pub fn ge(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.greater_than_or_equal_to(x, y)
    }

    pub fn lt(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.less_than(x, y)
    }

    pub fn le(&self, x: impl Into<Expression>, y: impl Into<Expression>) -> Predicate {
        self.less_than_or_equal_to(x, y)
    }

    /// `x BETWEEN lower AND upper`, bounds included
    pub fn between(
        &self,
        x: impl Into<Expression>,
        lower: impl Into<Expression>,
        upper: impl Into<Expression>,
    ) -> Predicate {
        Predicate::new(PredicateKind::Between {
            value: expr(x),
            lower: expr(lower),
            upper: expr(upper),
        })
    }

    pub fn like(&self, x: impl Into<Expression>, pattern: impl Into<Expression>) -> Predicate {
        Predicate::new(PredicateKind::Like {
            value: expr(x),
            pattern: expr(pattern),
            escape: None,
        })
    }

    pub fn like_escape(
        &self,
        x: impl Into<Expression>,
        pattern: impl Into<Expression>,
        escape: impl Into<Expression>,
    ) -> Predicate {
        Predicate::new(PredicateKind::Like {
            value: expr(x),
            pattern: expr(pattern),
            escape: Some(expr(escape)),
        })
    }

    pub fn not_like(&self, x: impl Into<Expression>, pattern: impl Into<Expression>) -> Predicate {
        self.like(x, pattern).not()
    }

    /// `x IN (...)`, the values being added to the returned predicate with
    /// [`Predicate::value`]
    pub fn in_(&self, x: impl Into<Expression>) -> Predicate {
        Predicate::new(PredicateKind::In {
            value: expr(x),
            values: RwLock::new(vec![]),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expression::Selectable;
    use crate::testing::company;

    fn cb() -> CriteriaBuilder {
        CriteriaBuilder::new(company())
    }

    #[test]
    fn arithmetic_widens() {
        let cb = cb();
        assert_eq!(
            cb.sum(cb.literal(1), cb.literal(2.5)).java_type(),
            JavaType::Double
        );
        assert_eq!(
            cb.modulo(cb.literal(7), cb.literal(2)).java_type(),
            JavaType::Integer
        );
        assert_eq!(cb.sum_of(cb.literal(1)).java_type(), JavaType::Long);
        assert_eq!(cb.avg(cb.literal(1)).java_type(), JavaType::Double);
    }

    #[test]
    fn boolean_literals_are_predicates() {
        let cb = cb();
        let t = cb.literal(true);
        assert!(t.as_predicate().is_some());
        assert_eq!(t.java_type(), JavaType::Boolean);
    }

    #[test]
    fn equality_with_null_is_a_null_check() {
        let cb = cb();
        let x = cb.literal(1);
        let p = cb.equal(&x, cb.null_literal(JavaType::Integer));
        assert!(matches!(
            &p.def().unwrap().kind,
            PredicateKind::NullCheck {
                not_null: false,
                ..
            }
        ));
        let p = cb.not_equal(cb.null_literal(JavaType::Integer), &x);
        assert!(matches!(
            &p.def().unwrap().kind,
            PredicateKind::NullCheck { not_null: true, .. }
        ));
    }

    #[test]
    fn is_true_of_empty_junctions_is_constant() {
        let cb = cb();
        let t = cb.is_true(cb.conjunction());
        assert!(matches!(t.def().unwrap().kind, PredicateKind::Constant(true)));
        let f = cb.is_true(cb.disjunction());
        assert!(matches!(f.def().unwrap().kind, PredicateKind::Constant(false)));
        let negated = cb.is_true(cb.conjunction().not());
        assert!(matches!(negated.def().unwrap().kind, PredicateKind::Constant(false)));
    }

    #[test]
    fn not_like_is_negated_like() {
        let cb = cb();
        let p = cb.not_like(cb.literal("abc"), cb.literal("a%"));
        assert!(p.is_negated());
        assert!(matches!(p.def().unwrap().kind, PredicateKind::Like { .. }));
    }

    #[test]
    fn in_collects_values() {
        let cb = cb();
        let p = cb.in_(cb.literal(1));
        p.value(cb.literal(2)).unwrap().value(cb.literal(3)).unwrap();
        match &p.def().unwrap().kind {
            PredicateKind::In { values, .. } => assert_eq!(values.read().len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sums_cast_to_the_requested_type() {
        let cb = cb();
        let mut q = cb.create_query(JavaType::Double);
        let e = q.from("Employee").unwrap();

        let as_long = cb.sum_as_long(e.get("age").unwrap());
        assert_eq!(as_long.java_type(), JavaType::Long);
        let as_double = cb.sum_as_double(cb.literal(1.5).as_type(JavaType::Float));
        assert_eq!(as_double.java_type(), JavaType::Double);

        q.select(&as_double);
        assert_eq!(
            q.compile().unwrap().projections[0].value.ty(),
            JavaType::Double
        );
    }

    #[test]
    fn map_keys_and_values_are_constants() {
        let cb = cb();
        let map: IndexMap<&str, i64> = [("a", 1), ("b", 2)].into_iter().collect();

        let keys = cb.keys(&map);
        assert_eq!(keys.java_type(), JavaType::collection_of(JavaType::String));
        assert!(matches!(
            &keys.0.kind,
            NodeKind::Constant(Literal::Collection(k)) if *k == vec![Literal::from("a"), Literal::from("b")]
        ));

        let values = cb.values(&map);
        assert_eq!(values.java_type(), JavaType::collection_of(JavaType::Integer));
        let empty: IndexMap<String, i64> = IndexMap::new();
        assert_eq!(
            cb.values(&empty).java_type(),
            JavaType::collection_of(JavaType::Object)
        );
        assert_eq!(cb.size(cb.keys(&map)).java_type(), JavaType::Integer);
    }

    #[test]
    fn with_options_validates() {
        let options = CompilerOptions {
            alias_prefix: "select".into(),
            ..Default::default()
        };
        assert!(CriteriaBuilder::with_options(company(), options).is_err());
    }
}
