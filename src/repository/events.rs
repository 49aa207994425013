//! After-load events and their publishers.

use super::mapping::Identifier;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Published once per loaded entity that has an identifier.
pub struct AfterLoadEvent<'a> {
    identifier: Identifier,
    entity: &'a dyn Any,
    entity_name: &'a str,
}

impl<'a> AfterLoadEvent<'a> {
    pub fn new(identifier: Identifier, entity: &'a dyn Any, entity_name: &'a str) -> Self {
        Self {
            identifier,
            entity,
            entity_name,
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn entity(&self) -> &'a dyn Any {
        self.entity
    }

    pub fn entity_name(&self) -> &'a str {
        self.entity_name
    }

    /// The loaded entity as `T`, if it is one.
    pub fn entity_as<T: 'static>(&self) -> Option<&'a T> {
        self.entity.downcast_ref::<T>()
    }
}

impl fmt::Debug for AfterLoadEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterLoadEvent")
            .field("identifier", &self.identifier)
            .field("entity_name", &self.entity_name)
            .finish_non_exhaustive()
    }
}

/// Receives after-load events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &AfterLoadEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

impl EventPublisher for NoopEventPublisher {
    fn publish(&self, _event: &AfterLoadEvent<'_>) {}
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventPublisher;

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &AfterLoadEvent<'_>) {
        log::debug!(
            "after load: {} with id {:?}",
            event.entity_name(),
            event.identifier().value()
        );
    }
}

/// Multicasts events to registered listeners, in registration order.
#[derive(Default)]
pub struct EventListeners {
    listeners: RwLock<Vec<Arc<dyn EventPublisher>>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(self, listener: Arc<dyn EventPublisher>) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn EventPublisher>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EventPublisher>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.read().map(|l| l.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventPublisher for EventListeners {
    fn publish(&self, event: &AfterLoadEvent<'_>) {
        // listeners may register further listeners, so call them outside the lock
        let listeners = self
            .listeners
            .read()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
        for listener in listeners {
            listener.publish(event);
        }
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners").field("listeners", &self.len()).finish()
    }
}
