//! Execution strategies for repository queries.
//!
//! A [`QueryExecution`] is chosen once from a query method's shape and reused for every
//! call: modifying statements return counts, reading statements go through either the
//! row mapper or a result extractor, and every loaded entity passes through the
//! [`AfterLoadNotifier`] before it is returned.

use super::mapper::{BoxedResultExtractor, ResultExtractorSource, SharedRowMapper};
use super::notifier::AfterLoadNotifier;
use super::operations::NamedParameterOperations;
use super::parameters::NamedParameters;
use super::query_method::{QueryMethod, ReturnType};
use crate::executor::LifeError;
use std::any::Any;
use std::fmt;

pub const NULL_COLLECTION_RESULT: &str = "A collection valued result must never be null.";

/// Result of executing a repository query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// Scalar read; `None` when no row matched.
    Single(Option<T>),
    Collection(Vec<T>),
    /// Modifying statement on a method returning a count.
    UpdateCount(u64),
    /// Modifying statement on a method returning `bool`: whether any row was affected.
    Modified(bool),
}

impl<T> QueryOutcome<T> {
    pub fn into_single(self) -> Option<T> {
        match self {
            QueryOutcome::Single(value) => value,
            _ => None,
        }
    }

    pub fn into_collection(self) -> Option<Vec<T>> {
        match self {
            QueryOutcome::Collection(values) => Some(values),
            _ => None,
        }
    }

    pub fn update_count(&self) -> Option<u64> {
        match self {
            QueryOutcome::UpdateCount(count) => Some(*count),
            _ => None,
        }
    }

    pub fn modified(&self) -> Option<bool> {
        match self {
            QueryOutcome::Modified(modified) => Some(*modified),
            _ => None,
        }
    }
}

/// How one query method is executed.
pub enum QueryExecution<R, T> {
    Modifying {
        sql: String,
        returns_boolean: bool,
    },
    ScalarRowMapped {
        sql: String,
        mapper: SharedRowMapper<R, T>,
    },
    ScalarExtracted {
        sql: String,
        extractor: BoxedResultExtractor<R, T>,
    },
    CollectionRowMapped {
        sql: String,
        mapper: SharedRowMapper<R, T>,
    },
    CollectionExtracted {
        sql: String,
        extractor: BoxedResultExtractor<R, Vec<T>>,
    },
}

impl<R, T: Any> QueryExecution<R, T> {
    /// Choose the execution for `method`.
    ///
    /// A custom row mapper configured on the method wins over `default_row_mapper`. A
    /// result extractor, when configured, replaces row mapping; extractors built with a
    /// row mapper receive the custom one, or `None` when the default is in use.
    ///
    /// # Errors
    ///
    /// `LifeError::Configuration` when no query text resolves, when a reading method has
    /// no row mapper, or when the extractor's output does not fit the return type.
    pub fn build(
        method: &QueryMethod<R, T>,
        default_row_mapper: Option<SharedRowMapper<R, T>>,
    ) -> Result<Self, LifeError> {
        let sql = method.resolve_query_text()?;

        if method.is_modifying_query() {
            return Ok(QueryExecution::Modifying {
                sql,
                returns_boolean: method.return_type() == ReturnType::Boolean,
            });
        }

        let custom_mapper = method.row_mapper_factory().map(|factory| factory());
        let mapper = custom_mapper
            .clone()
            .or(default_row_mapper)
            .ok_or_else(|| {
                LifeError::Configuration(format!("No row mapper available for reading query {}", method.name()))
            })?;
        let collection = method.is_collection_query() || method.is_stream_query();

        match (method.result_extractor_source(), collection) {
            (ResultExtractorSource::Unconfigured, false) => Ok(QueryExecution::ScalarRowMapped { sql, mapper }),
            (ResultExtractorSource::Unconfigured, true) => Ok(QueryExecution::CollectionRowMapped { sql, mapper }),
            (ResultExtractorSource::Single(factory), false) => Ok(QueryExecution::ScalarExtracted {
                sql,
                extractor: factory.instantiate(custom_mapper),
            }),
            (ResultExtractorSource::Collection(factory), true) => Ok(QueryExecution::CollectionExtracted {
                sql,
                extractor: factory.instantiate(custom_mapper),
            }),
            (ResultExtractorSource::Single(_), true) => Err(LifeError::Configuration(format!(
                "Query method {} returns a collection but its result extractor produces a single value",
                method.name()
            ))),
            (ResultExtractorSource::Collection(_), false) => Err(LifeError::Configuration(format!(
                "Query method {} returns a single value but its result extractor produces a collection",
                method.name()
            ))),
        }
    }

    pub fn sql(&self) -> &str {
        match self {
            QueryExecution::Modifying { sql, .. }
            | QueryExecution::ScalarRowMapped { sql, .. }
            | QueryExecution::ScalarExtracted { sql, .. }
            | QueryExecution::CollectionRowMapped { sql, .. }
            | QueryExecution::CollectionExtracted { sql, .. } => sql,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            QueryExecution::Modifying { .. } => "modifying",
            QueryExecution::ScalarRowMapped { .. } => "scalar_row_mapped",
            QueryExecution::ScalarExtracted { .. } => "scalar_extracted",
            QueryExecution::CollectionRowMapped { .. } => "collection_row_mapped",
            QueryExecution::CollectionExtracted { .. } => "collection_extracted",
        }
    }

    /// Run the statement once against `operations`.
    pub fn execute<O>(
        &self,
        operations: &O,
        params: &NamedParameters,
        notifier: &AfterLoadNotifier,
    ) -> Result<QueryOutcome<T>, LifeError>
    where
        O: NamedParameterOperations<Row = R> + ?Sized,
    {
        match self {
            QueryExecution::Modifying { sql, returns_boolean } => {
                let count = operations.update(sql, params)?;
                Ok(if *returns_boolean {
                    QueryOutcome::Modified(count != 0)
                } else {
                    QueryOutcome::UpdateCount(count)
                })
            }
            QueryExecution::ScalarRowMapped { sql, mapper } => {
                match operations.query_for_object(sql, params, mapper.as_ref()) {
                    Ok(entity) => Ok(QueryOutcome::Single(Some(notifier.notify(entity)?))),
                    Err(LifeError::EmptyResult { .. }) => Ok(QueryOutcome::Single(None)),
                    Err(e) => Err(e),
                }
            }
            QueryExecution::ScalarExtracted { sql, extractor } => {
                match operations.query_extracted(sql, params, extractor.as_ref()) {
                    Ok(Some(entity)) => Ok(QueryOutcome::Single(Some(notifier.notify(entity)?))),
                    Ok(None) => Ok(QueryOutcome::Single(None)),
                    Err(e) => Err(e),
                }
            }
            QueryExecution::CollectionRowMapped { sql, mapper } => {
                let entities = operations.query_mapped(sql, params, mapper.as_ref())?;
                Ok(QueryOutcome::Collection(notifier.notify_all(entities)?))
            }
            QueryExecution::CollectionExtracted { sql, extractor } => {
                let entities = operations
                    .query_extracted(sql, params, extractor.as_ref())?
                    .ok_or_else(|| LifeError::InvalidResult(NULL_COLLECTION_RESULT.to_string()))?;
                Ok(QueryOutcome::Collection(notifier.notify_all(entities)?))
            }
        }
    }
}

impl<R, T> fmt::Debug for QueryExecution<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, sql) = match self {
            QueryExecution::Modifying { sql, .. } => ("Modifying", sql),
            QueryExecution::ScalarRowMapped { sql, .. } => ("ScalarRowMapped", sql),
            QueryExecution::ScalarExtracted { sql, .. } => ("ScalarExtracted", sql),
            QueryExecution::CollectionRowMapped { sql, .. } => ("CollectionRowMapped", sql),
            QueryExecution::CollectionExtracted { sql, .. } => ("CollectionExtracted", sql),
        };
        f.debug_struct(kind).field("sql", sql).finish_non_exhaustive()
    }
}
