use std::sync::Arc;

use criteria_metamodel::JavaType;

use crate::expression::Selection;
use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompoundKind {
    /// The selection list of a multiselect query, shaped by the query's result type
    Multi,
    /// Arguments of a constructor of the named result class
    Construct(String),
    Tuple,
    Array,
}

#[derive(Debug)]
pub(crate) struct CompoundDef {
    pub kind: CompoundKind,
    pub items: Vec<Arc<Node>>,
}

/// A selection made of other selections
#[derive(Debug, Clone)]
pub struct CompoundSelection(pub(crate) Arc<Node>);

impl CompoundSelection {
    pub(crate) fn new(kind: CompoundKind, items: Vec<Arc<Node>>, java_type: JavaType) -> Self {
        Self(Node::new(
            NodeKind::Compound(CompoundDef { kind, items }),
            java_type,
        ))
    }

    pub fn items(&self) -> Vec<Selection> {
        match &self.0.kind {
            NodeKind::Compound(def) => def.items.iter().cloned().map(Selection).collect(),
            _ => vec![],
        }
    }
}

pub(crate) fn collect_items<I>(items: I) -> Vec<Arc<Node>>
where
    I: IntoIterator,
    I::Item: Into<Selection>,
{
    items.into_iter().map(|item| item.into().0).collect()
}
