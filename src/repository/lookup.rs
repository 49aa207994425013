//! Creating repository queries from shared repository infrastructure.

use super::callbacks::EntityCallbacks;
use super::conversion::{DefaultValueConverter, ValueConverter};
use super::events::{EventPublisher, NoopEventPublisher};
use super::mapper::SharedRowMapper;
use super::mapping::MappingContext;
use super::named_queries::{NamedQueries, PropertiesNamedQueries};
use super::notifier::AfterLoadNotifier;
use super::operations::NamedParameterOperations;
use super::query::RepositoryQuery;
use super::query_method::QueryMethod;
use crate::config::RepositoryConfig;
use crate::executor::LifeError;
use config::ConfigError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Builds [`RepositoryQuery`] instances that share one converter, mapping context,
/// event publisher, callback registry and named query registry.
#[derive(Clone)]
pub struct RepositoryQueryFactory {
    converter: Arc<dyn ValueConverter>,
    context: Arc<dyn MappingContext>,
    publisher: Arc<dyn EventPublisher>,
    callbacks: Arc<EntityCallbacks>,
    named_queries: Arc<dyn NamedQueries>,
    publish_events: bool,
}

impl RepositoryQueryFactory {
    pub fn new(context: Arc<dyn MappingContext>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            converter: Arc::new(DefaultValueConverter),
            context,
            publisher,
            callbacks: Arc::new(EntityCallbacks::new()),
            named_queries: Arc::new(PropertiesNamedQueries::empty()),
            publish_events: true,
        }
    }

    /// Factory configured from `config`: named queries are loaded from
    /// `named_queries_location` and `publish_events` decides whether events reach
    /// `publisher`.
    pub fn from_config(
        config: &RepositoryConfig,
        context: Arc<dyn MappingContext>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, ConfigError> {
        let named_queries = PropertiesNamedQueries::load(&config.named_queries_location)?;
        log::info!(
            "repository queries: {} named queries, events {}",
            named_queries.len(),
            if config.publish_events { "enabled" } else { "disabled" }
        );

        Ok(Self::new(context, publisher)
            .with_named_queries(Arc::new(named_queries))
            .with_publish_events(config.publish_events))
    }

    pub fn with_converter(mut self, converter: Arc<dyn ValueConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Arc<EntityCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_named_queries(mut self, named_queries: Arc<dyn NamedQueries>) -> Self {
        self.named_queries = named_queries;
        self
    }

    pub fn with_publish_events(mut self, publish_events: bool) -> Self {
        self.publish_events = publish_events;
        self
    }

    pub fn named_queries(&self) -> &Arc<dyn NamedQueries> {
        &self.named_queries
    }

    pub fn publishes_events(&self) -> bool {
        self.publish_events
    }

    /// Notifier handed to every query this factory creates.
    pub fn notifier(&self) -> AfterLoadNotifier {
        let publisher: Arc<dyn EventPublisher> = if self.publish_events {
            Arc::clone(&self.publisher)
        } else {
            Arc::new(NoopEventPublisher)
        };
        AfterLoadNotifier::new(Arc::clone(&self.context), publisher, Arc::clone(&self.callbacks))
    }

    /// Build the query for `method`. Named queries resolve through the method's own
    /// registry when it has one, otherwise through this factory's.
    pub fn create<O, T>(
        &self,
        method: QueryMethod<O::Row, T>,
        operations: Arc<O>,
        default_row_mapper: Option<SharedRowMapper<O::Row, T>>,
    ) -> Result<RepositoryQuery<O, T>, LifeError>
    where
        O: NamedParameterOperations,
        T: Any,
    {
        RepositoryQuery::new(
            method.or_named_queries(Arc::clone(&self.named_queries)),
            operations,
            default_row_mapper,
            Arc::clone(&self.converter),
            self.notifier(),
        )
    }
}

impl fmt::Debug for RepositoryQueryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryQueryFactory")
            .field("callbacks", &self.callbacks)
            .field("publish_events", &self.publish_events)
            .finish_non_exhaustive()
    }
}
