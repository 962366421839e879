use std::fmt;
use std::sync::{Arc, Weak};

use criteria_errors::{illegal_navigation_err, internal, invalid_argument, CriteriaResult};
use criteria_kernel::UnaryFunction;
use criteria_metamodel::{Attribute, CollectionKind, JavaType, Metamodel};
use derive_more::Display;
use parking_lot::{Mutex, RwLock};

use crate::expression::Expression;
use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum JoinType {
    #[display("INNER")]
    Inner,
    #[display("LEFT")]
    Left,
    #[display("RIGHT")]
    Right,
}

impl JoinType {
    /// Outer joins keep rows whose navigation has no target
    pub fn is_outer(self) -> bool {
        !matches!(self, JoinType::Inner)
    }
}

pub(crate) enum Parent {
    /// The parent holds this path in its joins, fetches, or key join
    Owner(Weak<Node>),
    Navigation(Arc<Node>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathKind {
    Root { entity: String },
    Attribute,
    Join { join_type: JoinType },
    /// A join over the keys of a map join
    KeyJoin { join_type: JoinType },
    Fetch { join_type: JoinType },
    /// `KEY(map join)`
    MapKey,
}

impl PathKind {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            PathKind::Root { .. } => "root",
            PathKind::Attribute => "attribute path",
            PathKind::Join { .. } => "join",
            PathKind::KeyJoin { .. } => "key join",
            PathKind::Fetch { .. } => "fetch",
            PathKind::MapKey => "map key",
        }
    }
}

/// The joins and fetches of a root or join
#[derive(Debug, Default)]
pub(crate) struct FromState {
    pub joins: RwLock<Vec<Arc<Node>>>,
    pub fetches: RwLock<Vec<Arc<Node>>>,
    /// For roots and joins of a subquery that stand for a root or join of an enclosing query,
    /// the node they stand for
    pub correlated: Option<Arc<Node>>,
    pub key_join: Mutex<Option<Arc<Node>>>,
}

pub(crate) struct PathDef {
    pub model: Arc<Metamodel>,
    pub parent: Option<Parent>,
    pub attribute: Option<Arc<Attribute>>,
    pub kind: PathKind,
    /// Present for roots, joins, key joins and fetches
    pub from: Option<FromState>,
}

impl PathDef {
    pub(crate) fn parent(&self) -> Option<Arc<Node>> {
        match self.parent.as_ref()? {
            Parent::Owner(owner) => owner.upgrade(),
            Parent::Navigation(parent) => Some(Arc::clone(parent)),
        }
    }

    pub(crate) fn navigation_parent(&self) -> Option<Arc<Node>> {
        match &self.parent {
            Some(Parent::Navigation(parent)) => Some(Arc::clone(parent)),
            _ => None,
        }
    }

    pub(crate) fn joins(&self) -> Vec<Arc<Node>> {
        self.from
            .as_ref()
            .map(|f| f.joins.read().clone())
            .unwrap_or_default()
    }

    pub(crate) fn fetches(&self) -> Vec<Arc<Node>> {
        self.from
            .as_ref()
            .map(|f| f.fetches.read().clone())
            .unwrap_or_default()
    }

    pub(crate) fn key_join(&self) -> Option<Arc<Node>> {
        self.from.as_ref().and_then(|f| f.key_join.lock().clone())
    }

    pub(crate) fn correlated_target(&self) -> Option<&Arc<Node>> {
        self.from.as_ref().and_then(|f| f.correlated.as_ref())
    }

    pub(crate) fn join_type(&self) -> Option<JoinType> {
        match self.kind {
            PathKind::Join { join_type }
            | PathKind::KeyJoin { join_type }
            | PathKind::Fetch { join_type } => Some(join_type),
            _ => None,
        }
    }

    pub(crate) fn is_join(&self) -> bool {
        matches!(self.kind, PathKind::Join { .. } | PathKind::KeyJoin { .. })
    }

    /// A join over a collection, list, set, or map valued attribute
    pub(crate) fn is_plural_join(&self) -> bool {
        self.is_join() && self.attribute.as_ref().is_some_and(|a| a.is_collection())
    }

    fn is_join_over(&self, kind: CollectionKind) -> bool {
        matches!(self.kind, PathKind::Join { .. })
            && self
                .attribute
                .as_ref()
                .is_some_and(|a| a.collection == Some(kind))
    }
}

impl fmt::Debug for PathDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathDef")
            .field("kind", &self.kind)
            .field("attribute", &self.attribute.as_ref().map(|a| a.full_name()))
            .field("parent", &self.parent().map(|p| p.id()))
            .field("joins", &self.joins().len())
            .field(
                "correlated",
                &self.correlated_target().map(|target| target.id()),
            )
            .finish()
    }
}

/// A navigable reference to an entity or attribute: a root, join, or attribute path
#[derive(Debug, Clone)]
pub struct Path(pub(crate) Arc<Node>);

/// An eager-loading hint for an association
#[derive(Debug, Clone)]
pub struct Fetch(pub(crate) Arc<Node>);

pub(crate) fn path_def(node: &Node) -> CriteriaResult<&PathDef> {
    match node.as_path() {
        Some(def) => Ok(def),
        None => internal!("{} is not a path", node.describe()),
    }
}

/// The managed type `node` navigates from, and its attribute named `name`
fn navigable_attribute(node: &Node, def: &PathDef, name: &str) -> CriteriaResult<Arc<Attribute>> {
    match node.java_type() {
        JavaType::Managed(owner) => def.model.attribute(owner, name),
        other if other.is_collection() => Err(illegal_navigation_err(
            other.to_string(),
            name,
            "collection valued paths must be joined to navigate through them",
        )),
        other => Err(illegal_navigation_err(
            other.to_string(),
            name,
            format!("{} of basic type cannot be navigated", def.kind.describe()),
        )),
    }
}

fn add_child(
    node: &Arc<Node>,
    name: &str,
    kind: PathKind,
    fetch: bool,
) -> CriteriaResult<Arc<Node>> {
    let def = path_def(node)?;
    let Some(from) = &def.from else {
        invalid_argument!(
            "only roots and joins can be joined or fetched, not a {}",
            def.kind.describe()
        );
    };
    let attribute = navigable_attribute(node, def, name)?;
    if !attribute.is_navigable() {
        return Err(illegal_navigation_err(
            &attribute.declaring_type,
            name,
            if fetch {
                "basic attributes cannot be fetched"
            } else {
                "basic attributes cannot be joined"
            },
        ));
    }

    let ty = attribute.bindable_type().clone();
    let child = Node::new(
        NodeKind::Path(PathDef {
            model: Arc::clone(&def.model),
            parent: Some(Parent::Owner(Arc::downgrade(node))),
            attribute: Some(attribute),
            kind,
            from: Some(FromState::default()),
        }),
        ty,
    );
    if fetch {
        from.fetches.write().push(Arc::clone(&child));
    } else {
        from.joins.write().push(Arc::clone(&child));
    }
    Ok(child)
}

impl Path {
    pub(crate) fn root(model: &Arc<Metamodel>, entity: &str) -> CriteriaResult<Path> {
        let ty = model.entity(entity)?.java_type();
        Ok(Path(Node::new(
            NodeKind::Path(PathDef {
                model: Arc::clone(model),
                parent: None,
                attribute: None,
                kind: PathKind::Root {
                    entity: entity.to_owned(),
                },
                from: Some(FromState::default()),
            }),
            ty,
        )))
    }

    /// A copy of the root or join `target` that resolves through `target` instead of binding
    /// a variable of its own
    pub(crate) fn correlated_clone(target: &Path) -> CriteriaResult<Path> {
        let def = target.def()?;
        if def.from.is_none() || matches!(def.kind, PathKind::Fetch { .. }) {
            invalid_argument!("only roots and joins can be correlated");
        }
        let parent = match def.kind {
            PathKind::Root { .. } => None,
            _ => def.parent().map(Parent::Navigation),
        };
        Ok(Path(Node::new(
            NodeKind::Path(PathDef {
                model: Arc::clone(&def.model),
                parent,
                attribute: def.attribute.clone(),
                kind: def.kind.clone(),
                from: Some(FromState {
                    correlated: Some(Arc::clone(&target.0)),
                    ..Default::default()
                }),
            }),
            target.0.java_type().clone(),
        )))
    }

    pub(crate) fn def(&self) -> CriteriaResult<&PathDef> {
        path_def(&self.0)
    }

    /// Navigate to the attribute `name` of the type this path references
    pub fn get(&self, name: &str) -> CriteriaResult<Path> {
        let def = self.def()?;
        let attribute = navigable_attribute(&self.0, def, name)?;
        let ty = attribute.java_type();
        Ok(Path(Node::new(
            NodeKind::Path(PathDef {
                model: Arc::clone(&def.model),
                parent: Some(Parent::Navigation(Arc::clone(&self.0))),
                attribute: Some(attribute),
                kind: PathKind::Attribute,
                from: None,
            }),
            ty,
        )))
    }

    pub fn join(&self, name: &str) -> CriteriaResult<Path> {
        self.join_with(name, JoinType::Inner)
    }

    pub fn join_with(&self, name: &str, join_type: JoinType) -> CriteriaResult<Path> {
        add_child(&self.0, name, PathKind::Join { join_type }, false).map(Path)
    }

    pub fn fetch(&self, name: &str) -> CriteriaResult<Fetch> {
        self.fetch_with(name, JoinType::Inner)
    }

    pub fn fetch_with(&self, name: &str, join_type: JoinType) -> CriteriaResult<Fetch> {
        add_child(&self.0, name, PathKind::Fetch { join_type }, true).map(Fetch)
    }

    /// `INDEX(self)` of a list join
    pub fn index(&self) -> CriteriaResult<Expression> {
        if !self.def()?.is_join_over(CollectionKind::List) {
            invalid_argument!("INDEX applies to joins over lists only");
        }
        Ok(Expression::new(
            NodeKind::Unary {
                func: UnaryFunction::Index,
                arg: Arc::clone(&self.0),
            },
            JavaType::Integer,
        ))
    }

    fn map_attribute(&self) -> CriteriaResult<Arc<Attribute>> {
        let def = self.def()?;
        match &def.attribute {
            Some(attribute) if def.is_join_over(CollectionKind::Map) => Ok(Arc::clone(attribute)),
            _ => invalid_argument!("{} is not a join over a map", def.kind.describe()),
        }
    }

    /// `KEY(self)` of a map join
    pub fn key(&self) -> CriteriaResult<Path> {
        let attribute = self.map_attribute()?;
        let Some(key) = attribute.key_attribute() else {
            internal!("map attribute {} declares no key type", attribute.full_name());
        };
        let ty = key.element_type.clone();
        Ok(Path(Node::new(
            NodeKind::Path(PathDef {
                model: Arc::clone(&self.def()?.model),
                parent: Some(Parent::Navigation(Arc::clone(&self.0))),
                attribute: Some(Arc::new(key)),
                kind: PathKind::MapKey,
                from: None,
            }),
            ty,
        )))
    }

    /// `VALUE(self)` of a map join, which is the join itself
    pub fn value(&self) -> CriteriaResult<Path> {
        self.map_attribute()?;
        Ok(self.clone())
    }

    /// `ENTRY(self)` of a map join
    pub fn entry(&self) -> CriteriaResult<Expression> {
        let attribute = self.map_attribute()?;
        let key = attribute.key_type.clone().unwrap_or(JavaType::Object);
        Ok(Expression::new(
            NodeKind::MapEntry(Arc::clone(&self.0)),
            JavaType::MapEntry(Box::new(key), Box::new(attribute.element_type.clone())),
        ))
    }

    /// Join the keys of a map join. The map join then binds through its key join.
    pub fn join_key(&self, join_type: JoinType) -> CriteriaResult<Path> {
        let attribute = self.map_attribute()?;
        let def = self.def()?;
        let Some(from) = &def.from else {
            internal!("map join has no join state");
        };
        let Some(key) = attribute.key_attribute() else {
            internal!("map attribute {} declares no key type", attribute.full_name());
        };

        let mut slot = from.key_join.lock();
        if slot.is_some() {
            invalid_argument!("the keys of {} are already joined", attribute.full_name());
        }
        let ty = key.element_type.clone();
        let node = Node::new(
            NodeKind::Path(PathDef {
                model: Arc::clone(&def.model),
                parent: Some(Parent::Owner(Arc::downgrade(&self.0))),
                attribute: Some(Arc::new(key)),
                kind: PathKind::KeyJoin { join_type },
                from: Some(FromState::default()),
            }),
            ty,
        );
        *slot = Some(Arc::clone(&node));
        Ok(Path(node))
    }

    /// `TYPE(self)`
    pub fn type_(&self) -> Expression {
        Expression::new(
            NodeKind::Unary {
                func: UnaryFunction::Type,
                arg: Arc::clone(&self.0),
            },
            JavaType::Class,
        )
    }

    pub fn parent(&self) -> Option<Path> {
        self.def().ok()?.parent().map(Path)
    }

    pub fn joins(&self) -> Vec<Path> {
        self.def()
            .map(|d| d.joins().into_iter().map(Path).collect())
            .unwrap_or_default()
    }

    pub fn fetches(&self) -> Vec<Fetch> {
        self.def()
            .map(|d| d.fetches().into_iter().map(Fetch).collect())
            .unwrap_or_default()
    }

    /// Whether this root or join of a subquery stands for one of an enclosing query
    pub fn is_correlated(&self) -> bool {
        self.correlation_parent().is_some()
    }

    pub fn correlation_parent(&self) -> Option<Path> {
        self.def()
            .ok()?
            .correlated_target()
            .map(|target| Path(Arc::clone(target)))
    }

    pub fn attribute(&self) -> Option<Arc<Attribute>> {
        self.def().ok()?.attribute.clone()
    }

    pub fn join_type(&self) -> Option<JoinType> {
        self.def().ok()?.join_type()
    }
}

impl Fetch {
    pub fn fetch(&self, name: &str) -> CriteriaResult<Fetch> {
        self.fetch_with(name, JoinType::Inner)
    }

    pub fn fetch_with(&self, name: &str, join_type: JoinType) -> CriteriaResult<Fetch> {
        add_child(&self.0, name, PathKind::Fetch { join_type }, true).map(Fetch)
    }

    pub fn fetches(&self) -> Vec<Fetch> {
        path_def(&self.0)
            .map(|d| d.fetches().into_iter().map(Fetch).collect())
            .unwrap_or_default()
    }

    pub fn attribute(&self) -> Option<Arc<Attribute>> {
        path_def(&self.0).ok()?.attribute.clone()
    }

    pub fn join_type(&self) -> Option<JoinType> {
        path_def(&self.0).ok()?.join_type()
    }
}
