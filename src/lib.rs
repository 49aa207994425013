//! # Lifeguard Repository
//!
//! Coroutine-friendly repository query execution for PostgreSQL on the `may` runtime.
//!
//! A repository method is described once as a [`QueryMethod`]: where its SQL comes from,
//! which parameters it binds, what it returns and how rows become objects. A
//! [`RepositoryQuery`] built from it binds arguments, executes exactly one statement
//! through a [`NamedParameterOperations`] facade and publishes after-load notifications
//! for every entity it returns.
//!
//! See [README on GitHub](https://github.com/microscaler/lifeguard) for the data-access
//! platform this crate belongs to.

pub mod config;
pub mod executor;
#[cfg(any(feature = "metrics", feature = "tracing"))]
pub mod metrics;
pub mod repository;
pub mod test_helpers;

pub use config::RepositoryConfig;
pub use executor::{LifeError, LifeExecutor, MayPostgresExecutor};
pub use repository::{
    AfterLoadEvent, AfterLoadNotifier, CallbackKind, ColumnTypes, DatabaseValue, DefaultValueConverter,
    EntityCallbacks, EventListeners, EventPublisher, ExecutorOperations, ExtractorFactory, Identifier,
    LoggingEventPublisher, MappingContext, NamedParameterOperations, NamedParameters, NamedQueries,
    NoopEventPublisher, Parameter, ParameterBinder, ParameterType, PersistentEntity, PgParam,
    PropertiesNamedQueries, Query, QueryExecution, QueryMethod, QueryOutcome, RelationalMappingContext,
    RepositoryQuery, RepositoryQueryFactory, ResultExtractor, ResultExtractorSource, ReturnType, RowMapper,
    RowMapperSource, SharedRowMapper, ValueConverter,
};
