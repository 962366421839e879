//! The persistent-entity metamodel consumed by the criteria query compiler.
//!
//! The compiler treats the metamodel as an external collaborator: it only asks for attribute
//! declarations (name, java type, persistence-type classification, singular/plural kind and
//! declaring type) to validate navigation, and for the declared constructors of result classes to
//! resolve constructor-style projections. This crate provides a small in-memory implementation
//! that can be built programmatically with [`MetamodelBuilder`] or loaded from JSON with
//! [`Metamodel::from_json`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use criteria_errors::{invalid_argument, CriteriaError, CriteriaResult};
use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// The java-level type of a selection, attribute, or literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JavaType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Character,
    String,
    Date,
    Time,
    Timestamp,
    Object,
    /// The type of `TYPE(..)` expressions and class literals
    Class,
    Tuple,
    Enum(String),
    /// An entity, embeddable, or mapped superclass declared in the metamodel
    Managed(String),
    /// A class the metamodel knows nothing about beyond its name, eg a constructor result class
    Named(String),
    Collection(Box<JavaType>),
    List(Box<JavaType>),
    Set(Box<JavaType>),
    Map(Box<JavaType>, Box<JavaType>),
    MapEntry(Box<JavaType>, Box<JavaType>),
    Array(Box<JavaType>),
}

impl JavaType {
    pub fn managed<S: Into<String>>(name: S) -> Self {
        Self::Managed(name.into())
    }

    pub fn named<S: Into<String>>(name: S) -> Self {
        Self::Named(name.into())
    }

    pub fn array_of(component: JavaType) -> Self {
        Self::Array(Box::new(component))
    }

    pub fn list_of(element: JavaType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn collection_of(element: JavaType) -> Self {
        Self::Collection(Box::new(element))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::Short
                | Self::Integer
                | Self::Long
                | Self::Float
                | Self::Double
                | Self::BigInteger
                | Self::BigDecimal
        )
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean)
    }

    /// Returns `true` for collection and map types (not arrays)
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::Collection(_) | Self::List(_) | Self::Set(_) | Self::Map(..)
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// The element type of a collection or array, or the value type of a map
    pub fn element_type(&self) -> Option<&JavaType> {
        match self {
            Self::Collection(e) | Self::List(e) | Self::Set(e) | Self::Array(e) => Some(e),
            Self::Map(_, v) => Some(v),
            _ => None,
        }
    }

    /// The name of the managed type, if this is one
    pub fn managed_name(&self) -> Option<&str> {
        match self {
            Self::Managed(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "Boolean"),
            Self::Byte => write!(f, "Byte"),
            Self::Short => write!(f, "Short"),
            Self::Integer => write!(f, "Integer"),
            Self::Long => write!(f, "Long"),
            Self::Float => write!(f, "Float"),
            Self::Double => write!(f, "Double"),
            Self::BigInteger => write!(f, "BigInteger"),
            Self::BigDecimal => write!(f, "BigDecimal"),
            Self::Character => write!(f, "Character"),
            Self::String => write!(f, "String"),
            Self::Date => write!(f, "Date"),
            Self::Time => write!(f, "Time"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::Object => write!(f, "Object"),
            Self::Class => write!(f, "Class"),
            Self::Tuple => write!(f, "Tuple"),
            Self::Enum(name) | Self::Managed(name) | Self::Named(name) => write!(f, "{name}"),
            Self::Collection(e) => write!(f, "Collection<{e}>"),
            Self::List(e) => write!(f, "List<{e}>"),
            Self::Set(e) => write!(f, "Set<{e}>"),
            Self::Map(k, v) => write!(f, "Map<{k}, {v}>"),
            Self::MapEntry(k, v) => write!(f, "Map.Entry<{k}, {v}>"),
            Self::Array(c) => write!(f, "{c}[]"),
        }
    }
}

/// Classification of a managed (or unmanaged) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum PersistenceType {
    Entity,
    Embeddable,
    MappedSuperclass,
    Basic,
}

/// How an attribute is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum PersistentAttributeType {
    Basic,
    Embedded,
    ManyToOne,
    OneToOne,
    OneToMany,
    ManyToMany,
    ElementCollection,
}

impl PersistentAttributeType {
    pub fn is_association(self) -> bool {
        matches!(
            self,
            Self::ManyToOne | Self::OneToOne | Self::OneToMany | Self::ManyToMany
        )
    }
}

/// The container kind of a plural attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum CollectionKind {
    Collection,
    List,
    Set,
    Map,
}

/// A persistent attribute declared by a managed type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Filled in from the enclosing [`ManagedType`] when the metamodel is built or loaded.
    #[serde(default)]
    pub declaring_type: String,
    pub attribute_type: PersistentAttributeType,
    /// The declared type of singular attributes, or the element (map value) type of plural ones.
    pub element_type: JavaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<CollectionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_type: Option<JavaType>,
}

impl Attribute {
    /// The declared java type of the attribute, eg `List<Phone>` for a list-valued attribute
    pub fn java_type(&self) -> JavaType {
        let element = Box::new(self.element_type.clone());
        match self.collection {
            None => self.element_type.clone(),
            Some(CollectionKind::Collection) => JavaType::Collection(element),
            Some(CollectionKind::List) => JavaType::List(element),
            Some(CollectionKind::Set) => JavaType::Set(element),
            Some(CollectionKind::Map) => JavaType::Map(
                Box::new(self.key_type.clone().unwrap_or(JavaType::Object)),
                element,
            ),
        }
    }

    /// The type a join over this attribute ranges over
    pub fn bindable_type(&self) -> &JavaType {
        &self.element_type
    }

    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    pub fn is_map(&self) -> bool {
        self.collection == Some(CollectionKind::Map)
    }

    pub fn is_association(&self) -> bool {
        self.attribute_type.is_association()
    }

    pub fn is_embedded(&self) -> bool {
        self.attribute_type == PersistentAttributeType::Embedded
    }

    pub fn is_element_collection(&self) -> bool {
        self.attribute_type == PersistentAttributeType::ElementCollection
    }

    /// Basic attributes hold state inline and cannot be joined or fetched through
    pub fn is_navigable(&self) -> bool {
        self.attribute_type != PersistentAttributeType::Basic
    }

    /// `DeclaringType.name`, as used in fetch paths
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// The pseudo attribute a map key join ranges over: the map itself is treated as a managed
    /// type whose single attribute is its key.
    pub fn key_attribute(&self) -> Option<Attribute> {
        let key_type = self.key_type.clone()?;
        if !self.is_map() {
            return None;
        }
        let attribute_type = if key_type.managed_name().is_some() {
            self.attribute_type
        } else {
            PersistentAttributeType::ElementCollection
        };
        Some(Attribute {
            name: self.name.clone(),
            declaring_type: self.java_type().to_string(),
            attribute_type,
            element_type: key_type,
            collection: Some(CollectionKind::Set),
            key_type: None,
        })
    }
}

/// An entity, embeddable, or mapped superclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedType {
    pub name: String,
    pub persistence_type: PersistenceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supertype: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Arc<Attribute>>,
}

impl ManagedType {
    pub fn declared_attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn java_type(&self) -> JavaType {
        JavaType::Managed(self.name.clone())
    }

    pub fn is_entity(&self) -> bool {
        self.persistence_type == PersistenceType::Entity
    }
}

/// A class that query results can be constructed into, with its declared constructors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultClass {
    pub name: String,
    /// Parameter types of each declared constructor, in declaration order
    pub constructors: Vec<Vec<JavaType>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metamodel {
    #[serde(default)]
    types: Vec<ManagedType>,
    #[serde(default)]
    result_classes: Vec<ResultClass>,
}

impl Metamodel {
    pub fn builder() -> MetamodelBuilder {
        MetamodelBuilder::default()
    }

    /// Load a metamodel from its JSON representation. Attribute declaring types may be omitted;
    /// they are filled in from the enclosing type.
    pub fn from_json(json: &str) -> CriteriaResult<Self> {
        let mut model: Metamodel =
            serde_json::from_str(json).map_err(|e| CriteriaError::Serialization(e.to_string()))?;
        for ty in &mut model.types {
            for attr in &mut ty.attributes {
                if attr.declaring_type.is_empty() {
                    Arc::make_mut(attr).declaring_type = ty.name.clone();
                }
            }
        }
        model.validate()?;
        Ok(model)
    }

    pub fn to_json(&self) -> CriteriaResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CriteriaError::Serialization(e.to_string()))
    }

    pub fn managed_types(&self) -> impl Iterator<Item = &ManagedType> {
        self.types.iter()
    }

    pub fn managed_type(&self, name: &str) -> Option<&ManagedType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Look up an entity type, for use as a query root
    pub fn entity(&self, name: &str) -> CriteriaResult<&ManagedType> {
        match self.managed_type(name) {
            Some(ty) if ty.is_entity() => Ok(ty),
            _ => Err(CriteriaError::NotAnEntity(name.to_owned())),
        }
    }

    /// Look up an attribute declared by `owner` or any of its supertypes
    pub fn attribute(&self, owner: &str, name: &str) -> CriteriaResult<Arc<Attribute>> {
        let mut current = self.managed_type(owner);
        while let Some(ty) = current {
            if let Some(attr) = ty.declared_attribute(name) {
                return Ok(Arc::clone(attr));
            }
            current = ty.supertype.as_deref().and_then(|s| self.managed_type(s));
        }
        Err(CriteriaError::UnknownAttribute {
            owner: owner.to_owned(),
            attribute: name.to_owned(),
        })
    }

    pub fn persistence_type(&self, ty: &JavaType) -> PersistenceType {
        ty.managed_name()
            .and_then(|name| self.managed_type(name))
            .map(|t| t.persistence_type)
            .unwrap_or(PersistenceType::Basic)
    }

    /// Returns `true` if `sub` is `sup` or transitively extends it
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        let mut current = Some(sub);
        while let Some(name) = current {
            if name == sup {
                return true;
            }
            current = self
                .managed_type(name)
                .and_then(|t| t.supertype.as_deref());
        }
        false
    }

    /// Returns `true` if a value of type `value` can be passed where `target` is declared
    pub fn is_assignable(&self, target: &JavaType, value: &JavaType) -> bool {
        match (target, value) {
            (JavaType::Object, _) => true,
            (JavaType::Managed(t), JavaType::Managed(v)) => self.is_subtype(v, t),
            _ => target == value,
        }
    }

    pub fn result_class(&self, name: &str) -> Option<&ResultClass> {
        self.result_classes.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> CriteriaResult<()> {
        let mut names = HashSet::new();
        for ty in &self.types {
            if !names.insert(ty.name.as_str()) {
                invalid_argument!("type {} is declared more than once", ty.name);
            }
        }

        for ty in &self.types {
            // Supertype chains must end, and end in declared types
            let mut seen = HashSet::new();
            let mut current = Some(ty);
            while let Some(t) = current {
                if !seen.insert(t.name.as_str()) {
                    invalid_argument!("supertype chain of {} is cyclic", ty.name);
                }
                current = match t.supertype.as_deref() {
                    Some(sup) => match self.managed_type(sup) {
                        Some(s) => Some(s),
                        None => invalid_argument!("{} extends unknown type {}", t.name, sup),
                    },
                    None => None,
                };
            }

            for attr in &ty.attributes {
                let targets = [Some(&attr.element_type), attr.key_type.as_ref()];
                for target in targets.into_iter().flatten() {
                    if let Some(name) = target.managed_name() {
                        if self.managed_type(name).is_none() {
                            invalid_argument!(
                                "{} refers to unknown type {}",
                                attr.full_name(),
                                name
                            );
                        }
                    }
                }
            }
        }

        trace!(
            types = %self.types.iter().map(|t| &t.name).join(", "),
            "validated metamodel"
        );
        Ok(())
    }
}

/// Programmatic construction of a [`Metamodel`].
#[derive(Debug, Default)]
pub struct MetamodelBuilder {
    model: Metamodel,
}

impl MetamodelBuilder {
    pub fn entity<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(TypeBuilder) -> TypeBuilder,
    {
        self.managed(name, PersistenceType::Entity, f)
    }

    pub fn embeddable<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(TypeBuilder) -> TypeBuilder,
    {
        self.managed(name, PersistenceType::Embeddable, f)
    }

    pub fn mapped_superclass<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(TypeBuilder) -> TypeBuilder,
    {
        self.managed(name, PersistenceType::MappedSuperclass, f)
    }

    fn managed<F>(mut self, name: &str, persistence_type: PersistenceType, f: F) -> Self
    where
        F: FnOnce(TypeBuilder) -> TypeBuilder,
    {
        let builder = TypeBuilder {
            ty: ManagedType {
                name: name.to_owned(),
                persistence_type,
                supertype: None,
                attributes: vec![],
            },
        };
        self.model.types.push(f(builder).ty);
        self
    }

    pub fn result_class(mut self, name: &str, constructors: Vec<Vec<JavaType>>) -> Self {
        self.model.result_classes.push(ResultClass {
            name: name.to_owned(),
            constructors,
        });
        self
    }

    pub fn build(self) -> CriteriaResult<Metamodel> {
        self.model.validate()?;
        Ok(self.model)
    }
}

/// Builds the attributes of one managed type. See [`MetamodelBuilder::entity`].
#[derive(Debug)]
pub struct TypeBuilder {
    ty: ManagedType,
}

impl TypeBuilder {
    pub fn extends(mut self, supertype: &str) -> Self {
        self.ty.supertype = Some(supertype.to_owned());
        self
    }

    pub fn basic(self, name: &str, ty: JavaType) -> Self {
        self.attribute(name, PersistentAttributeType::Basic, ty, None, None)
    }

    pub fn embedded(self, name: &str, embeddable: &str) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::Embedded,
            JavaType::managed(embeddable),
            None,
            None,
        )
    }

    pub fn many_to_one(self, name: &str, target: &str) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::ManyToOne,
            JavaType::managed(target),
            None,
            None,
        )
    }

    pub fn one_to_one(self, name: &str, target: &str) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::OneToOne,
            JavaType::managed(target),
            None,
            None,
        )
    }

    pub fn one_to_many(self, name: &str, kind: CollectionKind, target: &str) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::OneToMany,
            JavaType::managed(target),
            Some(kind),
            None,
        )
    }

    pub fn many_to_many(self, name: &str, kind: CollectionKind, target: &str) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::ManyToMany,
            JavaType::managed(target),
            Some(kind),
            None,
        )
    }

    pub fn element_collection(self, name: &str, kind: CollectionKind, element: JavaType) -> Self {
        self.attribute(
            name,
            PersistentAttributeType::ElementCollection,
            element,
            Some(kind),
            None,
        )
    }

    pub fn map(
        self,
        name: &str,
        attribute_type: PersistentAttributeType,
        key: JavaType,
        value: JavaType,
    ) -> Self {
        self.attribute(
            name,
            attribute_type,
            value,
            Some(CollectionKind::Map),
            Some(key),
        )
    }

    fn attribute(
        mut self,
        name: &str,
        attribute_type: PersistentAttributeType,
        element_type: JavaType,
        collection: Option<CollectionKind>,
        key_type: Option<JavaType>,
    ) -> Self {
        self.ty.attributes.push(Arc::new(Attribute {
            name: name.to_owned(),
            declaring_type: self.ty.name.clone(),
            attribute_type,
            element_type,
            collection,
            key_type,
        }));
        self
    }
}
