//! Post-load notification of entities returned by repository queries.

use super::callbacks::{CallbackKind, EntityCallbacks};
use super::events::{AfterLoadEvent, EventPublisher, NoopEventPublisher};
use super::mapping::{MappingContext, RelationalMappingContext};
use crate::executor::LifeError;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Publishes [`AfterLoadEvent`]s and runs after-load callbacks for loaded entities.
///
/// Values whose type the mapping context does not know pass through untouched. For a
/// mapped entity an event is published only when it has an identifier; callbacks run
/// either way, and the entity they return replaces the loaded one.
#[derive(Clone)]
pub struct AfterLoadNotifier {
    context: Arc<dyn MappingContext>,
    publisher: Arc<dyn EventPublisher>,
    callbacks: Arc<EntityCallbacks>,
}

impl AfterLoadNotifier {
    pub fn new(
        context: Arc<dyn MappingContext>,
        publisher: Arc<dyn EventPublisher>,
        callbacks: Arc<EntityCallbacks>,
    ) -> Self {
        Self {
            context,
            publisher,
            callbacks,
        }
    }

    /// A notifier that knows no entities, so it never publishes or calls back.
    pub fn disabled() -> Self {
        Self::new(
            Arc::new(RelationalMappingContext::new()),
            Arc::new(NoopEventPublisher),
            Arc::new(EntityCallbacks::new()),
        )
    }

    pub fn context(&self) -> &Arc<dyn MappingContext> {
        &self.context
    }

    pub fn publisher(&self) -> &Arc<dyn EventPublisher> {
        &self.publisher
    }

    pub fn callbacks(&self) -> &Arc<EntityCallbacks> {
        &self.callbacks
    }

    /// Same notifier with a different event publisher.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Notify for one loaded value and return the value callbacks produced.
    pub fn notify<T: Any>(&self, entity: T) -> Result<T, LifeError> {
        let Some(persistent) = self.context.persistent_entity(TypeId::of::<T>()) else {
            return Ok(entity);
        };

        if let Some(identifier) = persistent.identifier(&entity) {
            self.publisher
                .publish(&AfterLoadEvent::new(identifier, &entity, persistent.name()));
            #[cfg(feature = "metrics")]
            METRICS.record_after_load_event();
        }

        self.callbacks.callback(CallbackKind::AfterLoad, entity)
    }

    /// Notify for every element, in order.
    pub fn notify_all<T: Any>(&self, entities: Vec<T>) -> Result<Vec<T>, LifeError> {
        if !self.context.is_persistent(TypeId::of::<T>()) {
            return Ok(entities);
        }
        entities.into_iter().map(|entity| self.notify(entity)).collect()
    }
}

impl Default for AfterLoadNotifier {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Debug for AfterLoadNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AfterLoadNotifier")
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
