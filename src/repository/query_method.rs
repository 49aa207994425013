//! Query method metadata.
//!
//! A [`QueryMethod`] describes one repository method: where its SQL comes from, what it
//! returns, which parameters it binds and how rows become objects.

use super::mapper::{ResultExtractorSource, RowMapperFactory, RowMapperSource};
use super::named_queries::NamedQueries;
use super::parameters::Parameter;
use crate::executor::LifeError;
use std::fmt;
use std::sync::Arc;

/// Shape of a query method's declared return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// At most one object.
    Single,
    Collection,
    Stream,
    /// `bool`; for modifying queries, whether any row was affected.
    Boolean,
    /// An affected-row count.
    Count,
    Unit,
}

impl ReturnType {
    pub fn is_collection_like(self) -> bool {
        matches!(self, ReturnType::Collection | ReturnType::Stream)
    }
}

/// Query configuration declared on a method.
pub struct Query<R, T> {
    value: Option<String>,
    name: Option<String>,
    row_mapper: RowMapperSource<R, T>,
    result_extractor: ResultExtractorSource<R, T>,
}

impl<R, T> Query<R, T> {
    /// An inline SQL query.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            value: Some(sql.into()),
            ..Self::default()
        }
    }

    /// A query looked up by `name` among the named queries.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn value(mut self, sql: impl Into<String>) -> Self {
        self.value = Some(sql.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn row_mapper(mut self, row_mapper: RowMapperSource<R, T>) -> Self {
        self.row_mapper = row_mapper;
        self
    }

    pub fn result_extractor(mut self, result_extractor: ResultExtractorSource<R, T>) -> Self {
        self.result_extractor = result_extractor;
        self
    }
}

impl<R, T> Default for Query<R, T> {
    fn default() -> Self {
        Self {
            value: None,
            name: None,
            row_mapper: RowMapperSource::Default,
            result_extractor: ResultExtractorSource::Unconfigured,
        }
    }
}

impl<R, T> Clone for Query<R, T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            name: self.name.clone(),
            row_mapper: self.row_mapper.clone(),
            result_extractor: self.result_extractor.clone(),
        }
    }
}

impl<R, T> fmt::Debug for Query<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("value", &self.value)
            .field("name", &self.name)
            .field("row_mapper", &self.row_mapper)
            .field("result_extractor", &self.result_extractor)
            .finish()
    }
}

/// Metadata of one repository query method.
///
/// ```
/// use lifeguard_repository::{Parameter, ParameterType, Query, QueryMethod, ReturnType};
/// use lifeguard_repository::test_helpers::MockRow;
///
/// let method: QueryMethod<MockRow, String> = QueryMethod::new("find_name_by_id", "User", ReturnType::Single)
///     .with_query(Query::new("SELECT name FROM users WHERE id = :id"))
///     .with_parameter(Parameter::named(0, "id", ParameterType::BigInt));
///
/// assert_eq!(method.resolve_query_text().unwrap(), "SELECT name FROM users WHERE id = :id");
/// ```
pub struct QueryMethod<R, T> {
    name: String,
    domain_type: String,
    return_type: ReturnType,
    modifying: bool,
    query: Query<R, T>,
    parameters: Vec<Parameter>,
    named_queries: Option<Arc<dyn NamedQueries>>,
}

impl<R, T> QueryMethod<R, T> {
    /// A method called `name` on a repository of `domain_type` objects.
    pub fn new(name: impl Into<String>, domain_type: impl Into<String>, return_type: ReturnType) -> Self {
        Self {
            name: name.into(),
            domain_type: domain_type.into(),
            return_type,
            modifying: false,
            query: Query::default(),
            parameters: Vec::new(),
            named_queries: None,
        }
    }

    pub fn with_query(mut self, query: Query<R, T>) -> Self {
        self.query = query;
        self
    }

    /// Mark the method as an `INSERT`/`UPDATE`/`DELETE` returning an affected-row count.
    pub fn modifying(mut self) -> Self {
        self.modifying = true;
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_named_queries(mut self, named_queries: Arc<dyn NamedQueries>) -> Self {
        self.named_queries = Some(named_queries);
        self
    }

    /// Use `named_queries` unless the method already has its own registry.
    pub fn or_named_queries(mut self, named_queries: Arc<dyn NamedQueries>) -> Self {
        self.named_queries.get_or_insert(named_queries);
        self
    }

    pub fn has_named_queries(&self) -> bool {
        self.named_queries.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain_type(&self) -> &str {
        &self.domain_type
    }

    pub fn return_type(&self) -> ReturnType {
        self.return_type
    }

    pub fn is_modifying_query(&self) -> bool {
        self.modifying
    }

    pub fn is_collection_query(&self) -> bool {
        self.return_type == ReturnType::Collection
    }

    pub fn is_stream_query(&self) -> bool {
        self.return_type == ReturnType::Stream
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Name under which an implicitly named query is registered: `<Domain>.<method>`.
    pub fn named_query_name(&self) -> String {
        format!("{}.{}", self.domain_type, self.name)
    }

    /// The SQL for this method, if any resolves.
    ///
    /// Inline SQL wins. Otherwise the explicit query name is looked up, or the implicit
    /// name when no explicit one is given. An unregistered explicit name does not fall
    /// back to the implicit name.
    pub fn declared_query(&self) -> Option<String> {
        if let Some(sql) = self.query.value.as_deref() {
            if !sql.is_empty() {
                return Some(sql.to_string());
            }
        }

        let name = match self.query.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.named_query_name(),
        };

        self.named_queries
            .as_ref()
            .filter(|queries| queries.has_query(&name))
            .and_then(|queries| queries.get_query(&name).ok())
    }

    /// Like [`declared_query`](Self::declared_query), failing when nothing resolves.
    pub fn resolve_query_text(&self) -> Result<String, LifeError> {
        self.declared_query()
            .ok_or_else(|| LifeError::Configuration(format!("No query specified on {}", self.name)))
    }

    /// Factory of the custom row mapper, `None` when the default row mapper applies.
    pub fn row_mapper_factory(&self) -> Option<&RowMapperFactory<R, T>> {
        self.query.row_mapper.configured()
    }

    pub fn result_extractor_source(&self) -> &ResultExtractorSource<R, T> {
        &self.query.result_extractor
    }
}

impl<R, T> fmt::Debug for QueryMethod<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryMethod")
            .field("name", &self.name)
            .field("domain_type", &self.domain_type)
            .field("return_type", &self.return_type)
            .field("modifying", &self.modifying)
            .field("query", &self.query)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}
