//! Executable repository query.

use super::conversion::ValueConverter;
use super::execution::{QueryExecution, QueryOutcome};
use super::mapper::SharedRowMapper;
use super::notifier::AfterLoadNotifier;
use super::operations::NamedParameterOperations;
use super::parameters::ParameterBinder;
use super::query_method::QueryMethod;
use crate::executor::LifeError;
use sea_query::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// One repository method bound to a database.
///
/// Construction resolves the SQL and picks the execution strategy, so configuration
/// mistakes surface here rather than on first use. [`execute`](Self::execute) binds the
/// arguments, runs exactly one statement and notifies for loaded entities. Nothing is
/// written during execution, so one instance can serve many coroutines at once.
///
/// ```
/// use lifeguard_repository::test_helpers::{MockRow, StubOperations};
/// use lifeguard_repository::{
///     AfterLoadNotifier, DefaultValueConverter, Parameter, ParameterType, Query, QueryMethod, QueryOutcome,
///     RepositoryQuery, ReturnType,
/// };
/// use std::sync::Arc;
///
/// let method: QueryMethod<MockRow, String> = QueryMethod::new("find_name_by_id", "Person", ReturnType::Single)
///     .with_query(Query::new("SELECT name FROM people WHERE id = :id"))
///     .with_parameter(Parameter::named(0, "id", ParameterType::BigInt));
///
/// let operations = Arc::new(StubOperations::new().returning_rows(vec![MockRow::new().with("name", "Ada")]));
/// let query = RepositoryQuery::new(
///     method,
///     operations,
///     Some(Arc::new(|row: &MockRow, _: usize| row.get_string("name"))),
///     Arc::new(DefaultValueConverter),
///     AfterLoadNotifier::disabled(),
/// )
/// .unwrap();
///
/// let outcome = query.execute(&[1i64.into()]).unwrap();
/// assert_eq!(outcome, QueryOutcome::Single(Some("Ada".to_string())));
/// ```
pub struct RepositoryQuery<O: NamedParameterOperations, T> {
    method: QueryMethod<O::Row, T>,
    operations: Arc<O>,
    binder: ParameterBinder,
    execution: QueryExecution<O::Row, T>,
    notifier: AfterLoadNotifier,
}

impl<O, T> RepositoryQuery<O, T>
where
    O: NamedParameterOperations,
    T: Any,
{
    /// Build the query for `method`.
    ///
    /// `default_row_mapper` may be `None` only for modifying methods or methods that
    /// configure their own row mapper.
    ///
    /// # Errors
    ///
    /// `LifeError::Configuration` when no SQL resolves for the method, when a reading
    /// method ends up without a row mapper, or when its result extractor does not fit
    /// the return type.
    pub fn new(
        method: QueryMethod<O::Row, T>,
        operations: Arc<O>,
        default_row_mapper: Option<SharedRowMapper<O::Row, T>>,
        converter: Arc<dyn ValueConverter>,
        notifier: AfterLoadNotifier,
    ) -> Result<Self, LifeError> {
        let execution = QueryExecution::build(&method, default_row_mapper)?;
        let binder = ParameterBinder::new(method.parameters().to_vec(), converter);

        log::debug!(
            "prepared {} repository query {}.{}",
            execution.kind(),
            method.domain_type(),
            method.name()
        );

        Ok(Self {
            method,
            operations,
            binder,
            execution,
            notifier,
        })
    }

    pub fn query_method(&self) -> &QueryMethod<O::Row, T> {
        &self.method
    }

    pub fn execution(&self) -> &QueryExecution<O::Row, T> {
        &self.execution
    }

    pub fn operations(&self) -> &Arc<O> {
        &self.operations
    }

    /// Execute with `arguments` indexed by parameter position.
    ///
    /// # Errors
    ///
    /// Binding and conversion errors surface before anything is executed; database,
    /// result-size and callback errors surface as they happen. No partial results.
    pub fn execute(&self, arguments: &[Value]) -> Result<QueryOutcome<T>, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::repository_query_span(self.method.name()).entered();

        let params = self.binder.bind(arguments)?;

        log::debug!(
            "executing {} query {}: {}",
            self.execution.kind(),
            self.method.name(),
            self.execution.sql()
        );
        #[cfg(feature = "metrics")]
        METRICS.record_repository_query();

        self.execution
            .execute(self.operations.as_ref(), &params, &self.notifier)
    }
}

impl<O: NamedParameterOperations, T> fmt::Debug for RepositoryQuery<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryQuery")
            .field("method", &self.method)
            .field("execution", &self.execution)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::callbacks::EntityCallbacks;
    use crate::repository::conversion::{DefaultValueConverter, ParameterType};
    use crate::repository::events::{AfterLoadEvent, EventPublisher};
    use crate::repository::mapping::RelationalMappingContext;
    use crate::repository::named_queries::PropertiesNamedQueries;
    use crate::repository::parameters::Parameter;
    use crate::repository::query_method::{Query, ReturnType};
    use crate::test_helpers::{MockRow, StubCall, StubOperations};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: Option<i64>,
        name: String,
    }

    #[derive(Default)]
    struct Recording {
        ids: Mutex<Vec<Value>>,
    }

    impl EventPublisher for Recording {
        fn publish(&self, event: &AfterLoadEvent<'_>) {
            self.ids.lock().unwrap().push(event.identifier().value().clone());
        }
    }

    fn person_mapper() -> SharedRowMapper<MockRow, Person> {
        Arc::new(|row: &MockRow, _: usize| -> Result<Person, LifeError> {
            let id = match row.get("id") {
                Some(Value::BigInt(id)) => *id,
                _ => None,
            };
            Ok(Person {
                id,
                name: row.get_string("name")?,
            })
        })
    }

    fn person_row(id: Option<i64>, name: &str) -> MockRow {
        MockRow::new().with("id", Value::BigInt(id)).with("name", name)
    }

    fn notifier(publisher: Arc<Recording>, callbacks: EntityCallbacks) -> AfterLoadNotifier {
        let context = RelationalMappingContext::new().with_entity::<Person, _>("Person", |p| p.id.map(Value::from));
        AfterLoadNotifier::new(Arc::new(context), publisher, Arc::new(callbacks))
    }

    fn repository_query(
        method: QueryMethod<MockRow, Person>,
        operations: StubOperations,
        notifier: AfterLoadNotifier,
    ) -> Result<RepositoryQuery<StubOperations, Person>, LifeError> {
        RepositoryQuery::new(
            method,
            Arc::new(operations),
            Some(person_mapper()),
            Arc::new(DefaultValueConverter),
            notifier,
        )
    }

    #[test]
    fn test_execute_binds_named_parameters() {
        let method = QueryMethod::new("find_by_name", "Person", ReturnType::Collection)
            .with_query(Query::new("SELECT * FROM people WHERE name = :name AND age > :age"))
            .with_parameters([
                Parameter::named(0, "name", ParameterType::String),
                Parameter::named(1, "age", ParameterType::TinyUnsigned),
            ]);
        let query = repository_query(method, StubOperations::new(), AfterLoadNotifier::disabled()).unwrap();

        query.execute(&[Value::from("Ada"), Value::TinyUnsigned(Some(30))]).unwrap();

        let calls = query.operations().calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            StubCall::Query { sql, params } => {
                assert_eq!(sql, "SELECT * FROM people WHERE name = :name AND age > :age");
                assert_eq!(params.value("name"), Some(&Value::String(Some("Ada".to_string()))));
                assert_eq!(params.value("age"), Some(&Value::SmallInt(Some(30))));
            }
            other => panic!("expected a query call, got {other:?}"),
        }
    }

    #[test]
    fn test_unnamed_parameter_fails_per_call() {
        let method = QueryMethod::new("find_by_name", "Person", ReturnType::Collection)
            .with_query(Query::new("SELECT * FROM people WHERE name = :name"))
            .with_parameter(Parameter::unnamed(0, ParameterType::String));

        let query = repository_query(method, StubOperations::new(), AfterLoadNotifier::disabled()).unwrap();
        let err = query.execute(&[Value::from("Ada")]).unwrap_err();

        assert!(matches!(err, LifeError::Configuration(_)));
        assert!(query.operations().calls().is_empty());
    }

    #[test]
    fn test_named_query_resolves_at_construction() {
        let queries = PropertiesNamedQueries::new().with_query("Person.delete_archived", "DELETE FROM people WHERE archived");
        let method = QueryMethod::new("delete_archived", "Person", ReturnType::Count)
            .modifying()
            .with_named_queries(Arc::new(queries));

        let query = repository_query(method, StubOperations::new().returning_update_count(2), AfterLoadNotifier::disabled())
            .unwrap();
        assert_eq!(query.execution().sql(), "DELETE FROM people WHERE archived");
        assert_eq!(query.execute(&[]).unwrap(), QueryOutcome::UpdateCount(2));
    }

    #[test]
    fn test_missing_query_fails_at_construction() {
        let method = QueryMethod::new("find_all", "Person", ReturnType::Collection);
        let err = repository_query(method, StubOperations::new(), AfterLoadNotifier::disabled()).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: No query specified on find_all");
    }

    #[test]
    fn test_scalar_result_is_notified_and_replaced_by_callbacks() {
        let publisher = Arc::new(Recording::default());
        let callbacks = EntityCallbacks::new().with_after_load(|mut p: Person| {
            p.name = p.name.to_uppercase();
            Ok(p)
        });
        let method = QueryMethod::new("find_by_id", "Person", ReturnType::Single)
            .with_query(Query::new("SELECT * FROM people WHERE id = :id"))
            .with_parameter(Parameter::named(0, "id", ParameterType::BigInt));
        let operations = StubOperations::new().returning_rows(vec![person_row(Some(9), "grace")]);

        let query = repository_query(method, operations, notifier(publisher.clone(), callbacks)).unwrap();
        let person = query.execute(&[Value::BigInt(Some(9))]).unwrap().into_single().unwrap();

        assert_eq!(person.name, "GRACE");
        assert_eq!(*publisher.ids.lock().unwrap(), vec![Value::BigInt(Some(9))]);
    }

    #[test]
    fn test_empty_scalar_result_is_not_notified() {
        let publisher = Arc::new(Recording::default());
        let method = QueryMethod::new("find_by_id", "Person", ReturnType::Single)
            .with_query(Query::new("SELECT * FROM people WHERE id = 1"));

        let query = repository_query(method, StubOperations::new(), notifier(publisher.clone(), EntityCallbacks::new()))
            .unwrap();

        assert_eq!(query.execute(&[]).unwrap(), QueryOutcome::Single(None));
        assert!(publisher.ids.lock().unwrap().is_empty());
    }

    #[test]
    fn test_collection_notifies_identified_entities_in_order() {
        let publisher = Arc::new(Recording::default());
        let visited = Arc::new(Mutex::new(Vec::new()));
        let seen = visited.clone();
        let callbacks = EntityCallbacks::new().with_after_load(move |p: Person| {
            seen.lock().unwrap().push(p.name.clone());
            Ok(p)
        });
        let method = QueryMethod::new("find_all", "Person", ReturnType::Collection)
            .with_query(Query::new("SELECT * FROM people ORDER BY name"));
        let operations = StubOperations::new().returning_rows(vec![
            person_row(Some(1), "a"),
            person_row(None, "b"),
            person_row(Some(3), "c"),
        ]);

        let query = repository_query(method, operations, notifier(publisher.clone(), callbacks)).unwrap();
        let people = query.execute(&[]).unwrap().into_collection().unwrap();

        assert_eq!(people.len(), 3);
        assert_eq!(
            *publisher.ids.lock().unwrap(),
            vec![Value::BigInt(Some(1)), Value::BigInt(Some(3))]
        );
        assert_eq!(*visited.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_repeated_execution_is_independent() {
        let method = QueryMethod::new("find_by_id", "Person", ReturnType::Single)
            .with_query(Query::new("SELECT * FROM people WHERE id = :id"))
            .with_parameter(Parameter::named(0, "id", ParameterType::BigInt));
        let operations = StubOperations::new().returning_rows(vec![person_row(Some(1), "a")]);
        let query = repository_query(method, operations, AfterLoadNotifier::disabled()).unwrap();

        query.execute(&[Value::BigInt(Some(1))]).unwrap();
        query.execute(&[Value::BigInt(Some(2))]).unwrap();

        let calls = query.operations().calls();
        let ids: Vec<_> = calls
            .iter()
            .map(|c| c.params().value("id").cloned())
            .collect();
        assert_eq!(ids, vec![Some(Value::BigInt(Some(1))), Some(Value::BigInt(Some(2)))]);
    }
}
