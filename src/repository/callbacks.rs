//! Entity callbacks: typed hooks that may replace an entity during its lifecycle.

use crate::executor::LifeError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle point a callback is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// After an entity was mapped from a query result.
    AfterLoad,
}

type Callback<T> = Box<dyn Fn(T) -> Result<T, LifeError> + Send + Sync>;

/// Registry of entity callbacks keyed by lifecycle point and entity type.
///
/// Callbacks for the same key run in registration order, each receiving the entity the
/// previous one returned.
///
/// ```
/// use lifeguard_repository::{CallbackKind, EntityCallbacks};
///
/// let callbacks = EntityCallbacks::new()
///     .with_after_load(|name: String| Ok(name.trim().to_string()))
///     .with_after_load(|name: String| Ok(name.to_uppercase()));
///
/// let name = callbacks.callback(CallbackKind::AfterLoad, "  ada ".to_string()).unwrap();
/// assert_eq!(name, "ADA");
/// ```
#[derive(Default)]
pub struct EntityCallbacks {
    callbacks: HashMap<(CallbackKind, TypeId), Vec<Box<dyn Any + Send + Sync>>>,
}

impl EntityCallbacks {
    /// An empty registry; every callback chain is the identity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T, F>(&mut self, kind: CallbackKind, callback: F)
    where
        T: 'static,
        F: Fn(T) -> Result<T, LifeError> + Send + Sync + 'static,
    {
        let callback: Callback<T> = Box::new(callback);
        self.callbacks
            .entry((kind, TypeId::of::<T>()))
            .or_default()
            .push(Box::new(callback));
    }

    pub fn register_after_load<T, F>(&mut self, callback: F)
    where
        T: 'static,
        F: Fn(T) -> Result<T, LifeError> + Send + Sync + 'static,
    {
        self.register(CallbackKind::AfterLoad, callback);
    }

    pub fn with_after_load<T, F>(mut self, callback: F) -> Self
    where
        T: 'static,
        F: Fn(T) -> Result<T, LifeError> + Send + Sync + 'static,
    {
        self.register_after_load(callback);
        self
    }

    pub fn has_callbacks<T: 'static>(&self, kind: CallbackKind) -> bool {
        self.callbacks
            .get(&(kind, TypeId::of::<T>()))
            .is_some_and(|c| !c.is_empty())
    }

    /// Run the `kind` callbacks registered for `T` and return the resulting entity.
    ///
    /// # Errors
    ///
    /// The first callback error stops the chain and is returned.
    pub fn callback<T: 'static>(&self, kind: CallbackKind, entity: T) -> Result<T, LifeError> {
        let Some(chain) = self.callbacks.get(&(kind, TypeId::of::<T>())) else {
            return Ok(entity);
        };

        chain.iter().try_fold(entity, |entity, callback| {
            let callback = callback.downcast_ref::<Callback<T>>().ok_or_else(|| {
                LifeError::Other(format!(
                    "{kind:?} callback registered for {} has the wrong type",
                    std::any::type_name::<T>()
                ))
            })?;
            callback(entity)
        })
    }
}

impl fmt::Debug for EntityCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: usize = self.callbacks.values().map(Vec::len).sum();
        f.debug_struct("EntityCallbacks").field("registered", &registered).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pet {
        name: String,
        visits: u32,
    }

    #[test]
    fn test_no_callbacks_returns_entity_unchanged() {
        let pet = Pet {
            name: "Rex".to_string(),
            visits: 0,
        };
        let result = EntityCallbacks::new().callback(CallbackKind::AfterLoad, pet.clone()).unwrap();
        assert_eq!(result, pet);
    }

    #[test]
    fn test_callbacks_chain_in_registration_order() {
        let callbacks = EntityCallbacks::new()
            .with_after_load(|mut pet: Pet| {
                pet.visits += 1;
                Ok(pet)
            })
            .with_after_load(|mut pet: Pet| {
                pet.name = format!("{} ({})", pet.name, pet.visits);
                Ok(pet)
            });

        let pet = callbacks
            .callback(
                CallbackKind::AfterLoad,
                Pet {
                    name: "Rex".to_string(),
                    visits: 1,
                },
            )
            .unwrap();

        assert_eq!(pet.name, "Rex (2)");
        assert!(callbacks.has_callbacks::<Pet>(CallbackKind::AfterLoad));
        assert!(!callbacks.has_callbacks::<String>(CallbackKind::AfterLoad));
    }

    #[test]
    fn test_callbacks_are_keyed_by_type() {
        let callbacks = EntityCallbacks::new().with_after_load(|n: i32| Ok(n * 2));
        assert_eq!(callbacks.callback(CallbackKind::AfterLoad, 21i32).unwrap(), 42);
        assert_eq!(callbacks.callback(CallbackKind::AfterLoad, 21i64).unwrap(), 21);
    }

    #[test]
    fn test_callback_error_stops_chain() {
        let mut callbacks = EntityCallbacks::new();
        callbacks.register_after_load(|_: String| -> Result<String, LifeError> {
            Err(LifeError::Other("rejected".to_string()))
        });
        callbacks.register_after_load(|_: String| -> Result<String, LifeError> {
            panic!("second callback must not run")
        });

        let err = callbacks.callback(CallbackKind::AfterLoad, "x".to_string()).unwrap_err();
        assert!(err.to_string().contains("rejected"));
    }
}
