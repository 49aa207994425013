//! Mapping context: which types are persistent entities, and how to read their identifier.
//!
//! Repository queries only need identity from the mapping layer. Everything else about
//! how a row becomes an entity stays with the row mapper.

use super::conversion::is_null;
use sea_query::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a loaded entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier(Value);

impl Identifier {
    /// Wrap `value`, or `None` when it is a SQL NULL.
    pub fn of(value: Value) -> Option<Self> {
        if is_null(&value) {
            None
        } else {
            Some(Identifier(value))
        }
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Metadata of one persistent entity type.
pub trait PersistentEntity: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier of `entity`, `None` when unset or when `entity` is not of this type.
    fn identifier(&self, entity: &dyn Any) -> Option<Identifier>;
}

/// Lookup of persistent entity metadata by Rust type.
pub trait MappingContext: Send + Sync {
    fn persistent_entity(&self, type_id: TypeId) -> Option<&dyn PersistentEntity>;

    fn is_persistent(&self, type_id: TypeId) -> bool {
        self.persistent_entity(type_id).is_some()
    }
}

type IdentifierFn<T> = Box<dyn Fn(&T) -> Option<Value> + Send + Sync>;

struct RegisteredEntity<T> {
    name: String,
    identifier: IdentifierFn<T>,
}

impl<T: 'static> PersistentEntity for RegisteredEntity<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self, entity: &dyn Any) -> Option<Identifier> {
        let entity = entity.downcast_ref::<T>()?;
        (self.identifier)(entity).and_then(Identifier::of)
    }
}

/// Registry-backed [`MappingContext`].
///
/// ```
/// use lifeguard_repository::{MappingContext, RelationalMappingContext};
/// use std::any::TypeId;
///
/// struct User {
///     id: Option<i64>,
/// }
///
/// let context = RelationalMappingContext::new().with_entity::<User, _>("User", |u| u.id.map(Into::into));
///
/// let entity = context.persistent_entity(TypeId::of::<User>()).unwrap();
/// assert_eq!(entity.name(), "User");
/// assert!(entity.identifier(&User { id: Some(7) }).is_some());
/// assert!(entity.identifier(&User { id: None }).is_none());
/// ```
#[derive(Default)]
pub struct RelationalMappingContext {
    entities: HashMap<TypeId, Box<dyn PersistentEntity>>,
}

impl RelationalMappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as a persistent entity. Re-registering a type replaces it.
    pub fn register<T, F>(&mut self, name: impl Into<String>, identifier: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.entities.insert(
            TypeId::of::<T>(),
            Box::new(RegisteredEntity {
                name: name.into(),
                identifier: Box::new(identifier),
            }),
        );
    }

    pub fn with_entity<T, F>(mut self, name: impl Into<String>, identifier: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.register(name, identifier);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MappingContext for RelationalMappingContext {
    fn persistent_entity(&self, type_id: TypeId) -> Option<&dyn PersistentEntity> {
        self.entities.get(&type_id).map(|e| e.as_ref())
    }
}

impl fmt::Debug for RelationalMappingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationalMappingContext")
            .field("entities", &self.entities.values().map(|e| e.name()).collect::<Vec<_>>())
            .finish()
    }
}
