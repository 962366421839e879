use std::fmt;

use criteria_metamodel::JavaType;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// How the values of one result row are assembled into the value of a shape node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStrategy {
    /// The single projected value is the result
    Assign,
    /// Values are put into an array of `len` elements of `component` type
    Array { component: JavaType, len: usize },
    /// Values are passed positionally to the constructor of `class` taking `parameters`
    NewInstance {
        class: String,
        parameters: Vec<JavaType>,
    },
    /// Values are put into a tuple, positionally, under the aliases of the selections
    Tuple { aliases: Vec<String> },
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillStrategy::Assign => write!(f, "assign"),
            FillStrategy::Array { component, len } => write!(f, "array({component}[{len}])"),
            FillStrategy::NewInstance { class, parameters } => {
                write!(f, "new {class}({})", parameters.iter().join(", "))
            }
            FillStrategy::Tuple { aliases } => write!(f, "tuple({})", aliases.iter().join(", ")),
        }
    }
}

/// A node of the tree describing how flat result rows are turned into query results.
///
/// Leaves consume one projected value each, in projection order. Compound nodes consume the
/// values of their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultShape {
    pub ty: JavaType,
    pub strategy: FillStrategy,
    pub children: Vec<ResultShape>,
}

impl ResultShape {
    pub fn leaf(ty: JavaType) -> Self {
        Self {
            ty,
            strategy: FillStrategy::Assign,
            children: vec![],
        }
    }

    pub fn compound(ty: JavaType, strategy: FillStrategy, children: Vec<ResultShape>) -> Self {
        Self {
            ty,
            strategy,
            children,
        }
    }

    pub fn is_compound(&self) -> bool {
        !self.children.is_empty()
    }

    /// The number of projected values this shape consumes
    pub fn arity(&self) -> usize {
        if self.is_compound() {
            self.children.iter().map(ResultShape::arity).sum()
        } else {
            1
        }
    }
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.ty, self.strategy)?;
        if self.is_compound() {
            write!(f, " [{}]", self.children.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn arity_counts_leaves() {
        let inner = ResultShape::compound(
            JavaType::array_of(JavaType::Object),
            FillStrategy::Array {
                component: JavaType::Object,
                len: 2,
            },
            vec![
                ResultShape::leaf(JavaType::String),
                ResultShape::leaf(JavaType::Integer),
            ],
        );
        let outer = ResultShape::compound(
            JavaType::Tuple,
            FillStrategy::Tuple {
                aliases: vec!["a".into(), "b".into()],
            },
            vec![inner, ResultShape::leaf(JavaType::Long)],
        );
        assert_eq!(outer.arity(), 3);
        assert!(!ResultShape::leaf(JavaType::Long).is_compound());
    }

    #[test]
    fn display() {
        let shape = ResultShape::compound(
            JavaType::named("Card"),
            FillStrategy::NewInstance {
                class: "Card".into(),
                parameters: vec![JavaType::String, JavaType::Integer],
            },
            vec![
                ResultShape::leaf(JavaType::String),
                ResultShape::leaf(JavaType::Integer),
            ],
        );
        assert_eq!(
            shape.to_string(),
            "Card <new Card(String, Integer)> [String <assign>, Integer <assign>]"
        );
    }
}
