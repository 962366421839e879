use std::fmt;

use criteria_metamodel::JavaType;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A constant value embedded in a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Character(char),
    /// A constant of a java enum type
    Enum { ty: String, constant: String },
    /// A class literal, eg the right hand side of `TYPE(e) = Manager`
    Type(String),
    Collection(Vec<Literal>),
    Array(Vec<Literal>),
}

impl Literal {
    /// The java type a literal takes when no type is declared for it
    pub fn java_type(&self) -> JavaType {
        fn element_type(elements: &[Literal]) -> JavaType {
            elements
                .iter()
                .find(|e| !e.is_null())
                .map(Literal::java_type)
                .unwrap_or(JavaType::Object)
        }

        match self {
            Literal::Null => JavaType::Object,
            Literal::Boolean(_) => JavaType::Boolean,
            Literal::Integer(_) => JavaType::Integer,
            Literal::Double(_) => JavaType::Double,
            Literal::String(_) => JavaType::String,
            Literal::Character(_) => JavaType::Character,
            Literal::Enum { ty, .. } => JavaType::Enum(ty.clone()),
            Literal::Type(_) => JavaType::Class,
            Literal::Collection(elements) => JavaType::collection_of(element_type(elements)),
            Literal::Array(elements) => JavaType::array_of(element_type(elements)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// The elements of a collection or array literal
    pub fn elements(&self) -> Option<&[Literal]> {
        match self {
            Literal::Collection(elements) | Literal::Array(elements) => Some(elements),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Double(d) => write!(f, "{d}"),
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Character(c) => write!(f, "'{c}'"),
            Literal::Enum { ty, constant } => write!(f, "{ty}.{constant}"),
            Literal::Type(name) => write!(f, "{name}"),
            Literal::Collection(elements) | Literal::Array(elements) => {
                write!(f, "[{}]", elements.iter().join(", "))
            }
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Integer(i.into())
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(d: f64) -> Self {
        Literal::Double(d)
    }
}

impl From<char> for Literal {
    fn from(c: char) -> Self {
        Literal::Character(c)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(elements: Vec<T>) -> Self {
        Literal::Collection(elements.into_iter().map(Into::into).collect())
    }
}
