use std::fmt;

use criteria_metamodel::JavaType;
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{Expr, Literal, QueryExpressions};

/// Identifies a query parameter, either by name or by its position among the query's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParameterKey {
    Named(String),
    Positional(usize),
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::Named(name) => write!(f, ":{name}"),
            ParameterKey::Positional(pos) => write!(f, "?{}", pos + 1),
        }
    }
}

/// One navigation step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub field: String,
    /// The type (or, below an embedded attribute, the embedded field) the field is declared by
    pub declaring_type: String,
    /// Whether the step tolerates a missing target, ie it navigates through an outer join
    pub allow_null: bool,
}

impl PathStep {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.field)
    }
}

/// Where a [`Path`] starts navigating from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathOrigin {
    /// The candidate instance of the query level that owns the path
    Candidate,
    /// A variable bound by a join, or declared by a cross join
    Variable(String),
}

/// A navigation from a candidate or a variable through zero or more fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub origin: PathOrigin,
    pub steps: Vec<PathStep>,
    /// The type reached by the last step, or the type of the origin
    pub ty: JavaType,
    /// Alias of the query node the path starts at
    pub schema_alias: Option<String>,
    pub alias: Option<String>,
    /// The origin is declared by an enclosing query rather than the query evaluating the path
    pub outer: bool,
}

impl Path {
    pub fn candidate(ty: JavaType, schema_alias: impl Into<String>) -> Self {
        Self {
            origin: PathOrigin::Candidate,
            steps: vec![],
            ty,
            schema_alias: Some(schema_alias.into()),
            alias: None,
            outer: false,
        }
    }

    pub fn from_variable(var: &Variable) -> Self {
        Self {
            origin: PathOrigin::Variable(var.name.clone()),
            steps: vec![],
            ty: var.ty.clone(),
            schema_alias: Some(var.name.clone()),
            alias: None,
            outer: false,
        }
    }

    /// Extend the path by one navigation step
    #[must_use]
    pub fn get(mut self, step: PathStep, ty: JavaType) -> Self {
        self.steps.push(step);
        self.ty = ty;
        self
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.steps.last()
    }

    /// The name of the variable the path starts at, if it starts at one
    pub fn variable_name(&self) -> Option<&str> {
        match &self.origin {
            PathOrigin::Variable(name) => Some(name),
            PathOrigin::Candidate => None,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outer {
            write!(f, "^")?;
        }
        match &self.origin {
            PathOrigin::Candidate => write!(f, "{}", self.schema_alias.as_deref().unwrap_or("this"))?,
            PathOrigin::Variable(name) => write!(f, "{name}")?,
        }
        for step in &self.steps {
            write!(f, ".{}", step.field)?;
        }
        Ok(())
    }
}

/// A named variable introduced by binding a join, or declared by a cross-joined root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: JavaType,
    pub alias: Option<String>,
    /// `true` for variables bound over a path, `false` for unbound (cross join) variables
    pub bound: bool,
}

impl Variable {
    pub fn bound(name: impl Into<String>, ty: JavaType) -> Self {
        Self {
            name: name.into(),
            ty,
            alias: None,
            bound: true,
        }
    }

    pub fn unbound(name: impl Into<String>, ty: JavaType) -> Self {
        Self {
            name: name.into(),
            ty,
            alias: None,
            bound: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum UnaryFunction {
    #[display("abs")]
    Abs,
    #[display("sqrt")]
    Sqrt,
    #[display("lower")]
    Lower,
    #[display("upper")]
    Upper,
    #[display("length")]
    Length,
    #[display("size")]
    Size,
    #[display("index")]
    Index,
    #[display("type")]
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum AggregateFunction {
    #[display("count")]
    Count,
    #[display("sum")]
    Sum,
    #[display("avg")]
    Avg,
    #[display("max")]
    Max,
    #[display("min")]
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ArithmeticOp {
    #[display("+")]
    Add,
    #[display("-")]
    Subtract,
    #[display("*")]
    Multiply,
    #[display("/")]
    Divide,
    #[display("%")]
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TrimSpec {
    #[display("LEADING")]
    Leading,
    #[display("TRAILING")]
    Trailing,
    #[display("BOTH")]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Temporal {
    #[display("CURRENT_DATE")]
    CurrentDate,
    #[display("CURRENT_TIME")]
    CurrentTime,
    #[display("CURRENT_TIMESTAMP")]
    CurrentTimestamp,
}

impl Temporal {
    pub fn java_type(self) -> JavaType {
        match self {
            Temporal::CurrentDate => JavaType::Date,
            Temporal::CurrentTime => JavaType::Time,
            Temporal::CurrentTimestamp => JavaType::Timestamp,
        }
    }
}

/// A compiled subquery used as a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubqueryValue {
    pub alias: String,
    pub ty: JavaType,
    /// The subquery refers to roots or joins of an enclosing query
    pub correlated: bool,
    pub expressions: QueryExpressions,
}

/// A value computed while evaluating a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Literal {
        val: Literal,
        ty: JavaType,
    },
    Parameter {
        key: ParameterKey,
        /// Position of the parameter in the query's ordered parameter map
        index: usize,
        ty: JavaType,
    },
    Path(Path),
    Variable(Variable),
    Unary {
        func: UnaryFunction,
        arg: Box<Value>,
        ty: JavaType,
    },
    Aggregate {
        func: AggregateFunction,
        distinct: bool,
        arg: Box<Value>,
        ty: JavaType,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Value>,
        right: Box<Value>,
        ty: JavaType,
    },
    Concat {
        left: Box<Value>,
        right: Box<Value>,
    },
    Substring {
        value: Box<Value>,
        from: Box<Value>,
        len: Option<Box<Value>>,
    },
    /// Position of `pattern` within `value`, starting the search at `from`
    Locate {
        value: Box<Value>,
        pattern: Box<Value>,
        from: Option<Box<Value>>,
    },
    Trim {
        value: Box<Value>,
        trim_char: Option<Box<Value>>,
        spec: TrimSpec,
    },
    Cast {
        value: Box<Value>,
        ty: JavaType,
    },
    /// A database function called by name
    Function {
        name: String,
        args: Vec<Value>,
        ty: JavaType,
    },
    Current(Temporal),
    GeneralCase {
        whens: Vec<(Expr, Value)>,
        otherwise: Box<Value>,
        ty: JavaType,
    },
    SimpleCase {
        operand: Box<Value>,
        whens: Vec<(Value, Value)>,
        otherwise: Box<Value>,
        ty: JavaType,
    },
    Coalesce {
        values: Vec<Value>,
        ty: JavaType,
    },
    NullIf {
        left: Box<Value>,
        right: Box<Value>,
        ty: JavaType,
    },
    MapKey {
        map: Box<Value>,
        ty: JavaType,
    },
    MapEntry {
        map: Box<Value>,
        ty: JavaType,
    },
    /// A boolean condition used in value position
    Condition(Box<Expr>),
    Subquery(Box<SubqueryValue>),
    All(Box<SubqueryValue>),
    Any(Box<SubqueryValue>),
}

impl Value {
    pub fn literal(val: Literal) -> Self {
        let ty = val.java_type();
        Value::Literal { val, ty }
    }

    pub fn null() -> Self {
        Value::Literal {
            val: Literal::Null,
            ty: JavaType::Object,
        }
    }

    pub fn ty(&self) -> JavaType {
        match self {
            Value::Literal { ty, .. }
            | Value::Parameter { ty, .. }
            | Value::Unary { ty, .. }
            | Value::Aggregate { ty, .. }
            | Value::Arithmetic { ty, .. }
            | Value::Cast { ty, .. }
            | Value::Function { ty, .. }
            | Value::GeneralCase { ty, .. }
            | Value::SimpleCase { ty, .. }
            | Value::Coalesce { ty, .. }
            | Value::NullIf { ty, .. }
            | Value::MapKey { ty, .. }
            | Value::MapEntry { ty, .. } => ty.clone(),
            Value::Path(path) => path.ty.clone(),
            Value::Variable(var) => var.ty.clone(),
            Value::Concat { .. } | Value::Substring { .. } | Value::Trim { .. } => JavaType::String,
            Value::Locate { .. } => JavaType::Integer,
            Value::Current(temporal) => temporal.java_type(),
            Value::Condition(_) => JavaType::Boolean,
            Value::Subquery(sub) | Value::All(sub) | Value::Any(sub) => sub.ty.clone(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Value::Path(path) => path.alias.as_deref(),
            Value::Variable(var) => var.alias.as_deref(),
            _ => None,
        }
    }

    /// Set the alias of a path or variable. Other values carry their alias in the enclosing
    /// projection or ordering.
    pub fn set_alias(&mut self, alias: &str) {
        match self {
            Value::Path(path) => path.alias = Some(alias.to_owned()),
            Value::Variable(var) => var.alias = Some(alias.to_owned()),
            _ => {}
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Value::Variable(_))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal { val, .. } => Some(val),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Value::*;

        match self {
            Literal { val, .. } => write!(f, "{val}"),
            Parameter { key, .. } => write!(f, "{key}"),
            Path(path) => write!(f, "{path}"),
            Variable(var) => write!(f, "{}", var.name),
            Unary { func, arg, .. } => write!(f, "{func}({arg})"),
            Aggregate {
                func,
                distinct,
                arg,
                ..
            } => {
                if *distinct {
                    write!(f, "{func}(distinct {arg})")
                } else {
                    write!(f, "{func}({arg})")
                }
            }
            Arithmetic {
                op, left, right, ..
            } => write!(f, "({left} {op} {right})"),
            Concat { left, right } => write!(f, "concat({left}, {right})"),
            Substring { value, from, len } => match len {
                Some(len) => write!(f, "substring({value}, {from}, {len})"),
                None => write!(f, "substring({value}, {from})"),
            },
            Locate {
                value,
                pattern,
                from,
            } => match from {
                Some(from) => write!(f, "locate({pattern}, {value}, {from})"),
                None => write!(f, "locate({pattern}, {value})"),
            },
            Trim {
                value,
                trim_char,
                spec,
            } => match trim_char {
                Some(c) => write!(f, "trim({spec} {c} from {value})"),
                None => write!(f, "trim({spec} from {value})"),
            },
            Cast { value, ty } => write!(f, "cast({value} as {ty})"),
            Function { name, args, .. } => write!(f, "{name}({})", args.iter().join(", ")),
            Current(temporal) => write!(f, "{temporal}"),
            GeneralCase {
                whens, otherwise, ..
            } => {
                write!(f, "case")?;
                for (cond, then) in whens {
                    write!(f, " when {cond} then {then}")?;
                }
                write!(f, " else {otherwise} end")
            }
            SimpleCase {
                operand,
                whens,
                otherwise,
                ..
            } => {
                write!(f, "case {operand}")?;
                for (when, then) in whens {
                    write!(f, " when {when} then {then}")?;
                }
                write!(f, " else {otherwise} end")
            }
            Coalesce { values, .. } => write!(f, "coalesce({})", values.iter().join(", ")),
            NullIf { left, right, .. } => write!(f, "nullif({left}, {right})"),
            MapKey { map, .. } => write!(f, "key({map})"),
            MapEntry { map, .. } => write!(f, "entry({map})"),
            Condition(expr) => write!(f, "{expr}"),
            Subquery(sub) => write!(f, "subquery({})", sub.alias),
            All(sub) => write!(f, "all(subquery({}))", sub.alias),
            Any(sub) => write!(f, "any(subquery({}))", sub.alias),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(field: &str, declaring_type: &str) -> PathStep {
        PathStep {
            field: field.into(),
            declaring_type: declaring_type.into(),
            allow_null: false,
        }
    }

    #[test]
    fn paths_extend_from_variables() {
        let var = Variable::bound("d", JavaType::managed("Department"));
        let path = Path::from_variable(&var).get(step("name", "Department"), JavaType::String);
        assert_eq!(path.variable_name(), Some("d"));
        assert_eq!(path.ty, JavaType::String);
        assert_eq!(path.last().unwrap().full_name(), "Department.name");
        assert_eq!(path.to_string(), "d.name");
    }

    #[test]
    fn outer_paths_are_marked() {
        let mut path = Path::candidate(JavaType::managed("Employee"), "e")
            .get(step("age", "Employee"), JavaType::Integer);
        path.outer = true;
        assert_eq!(path.to_string(), "^e.age");
    }

    #[test]
    fn value_types() {
        let count = Value::Aggregate {
            func: AggregateFunction::Count,
            distinct: true,
            arg: Box::new(Value::literal(1.into())),
            ty: JavaType::Long,
        };
        assert_eq!(count.ty(), JavaType::Long);
        assert_eq!(count.to_string(), "count(distinct 1)");
        assert_eq!(
            Value::Current(Temporal::CurrentDate).ty(),
            JavaType::Date
        );
    }

    #[test]
    fn aliases_only_stick_to_paths_and_variables() {
        let mut lit = Value::literal("x".into());
        lit.set_alias("a");
        assert_eq!(lit.alias(), None);

        let mut var = Value::Variable(Variable::bound("p", JavaType::managed("Phone")));
        var.set_alias("p");
        assert_eq!(var.alias(), Some("p"));
        assert!(var.is_variable());
    }

    #[test]
    fn positional_parameters_display_one_based() {
        assert_eq!(ParameterKey::Positional(0).to_string(), "?1");
        assert_eq!(ParameterKey::Named("age".into()).to_string(), ":age");
    }
}
