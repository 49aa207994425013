//! End-to-end tests for repository queries against in-memory operations
//!
//! Covers query resolution, binding, execution shapes and after-load notification as a
//! repository built on `RepositoryQueryFactory` sees them.

use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use lifeguard_repository::test_helpers::{MockRow, StubCall, StubOperations};
use lifeguard_repository::{
    AfterLoadEvent, EntityCallbacks, EventListeners, EventPublisher, ExtractorFactory, LifeError, Parameter,
    ParameterType, PropertiesNamedQueries, Query, QueryMethod, QueryOutcome, RelationalMappingContext,
    RepositoryQuery, RepositoryQueryFactory, ResultExtractorSource, ReturnType, RowMapper, SharedRowMapper,
};
use sea_query::Value;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
struct Customer {
    id: Option<i64>,
    name: String,
    email: String,
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<(String, Value)>>,
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &AfterLoadEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.entity_name().to_string(), event.identifier().value().clone()));
    }
}

fn customer_mapper() -> SharedRowMapper<MockRow, Customer> {
    Arc::new(|row: &MockRow, _: usize| -> Result<Customer, LifeError> {
        Ok(Customer {
            id: row.get_i64("id").ok(),
            name: row.get_string("name")?,
            email: row.get_string("email")?,
        })
    })
}

fn customer_row(id: Option<i64>) -> MockRow {
    let name: String = Name().fake();
    let email: String = SafeEmail().fake();
    MockRow::new()
        .with("id", Value::BigInt(id))
        .with("name", name)
        .with("email", email)
}

fn factory(publisher: Arc<RecordingPublisher>, callbacks: EntityCallbacks) -> RepositoryQueryFactory {
    let context =
        RelationalMappingContext::new().with_entity::<Customer, _>("Customer", |c| c.id.map(Value::from));
    let named_queries = PropertiesNamedQueries::from_toml(
        r#"
        [named_queries.Customer]
        find_all = "SELECT id, name, email FROM customers ORDER BY id"
        find_by_email = "SELECT id, name, email FROM customers WHERE email = :email"
        deactivate = "UPDATE customers SET active = false WHERE id = :id"
        "#,
    )
    .unwrap();

    let listeners = EventListeners::new().with_listener(publisher);
    RepositoryQueryFactory::new(Arc::new(context), Arc::new(listeners))
        .with_named_queries(Arc::new(named_queries))
        .with_callbacks(Arc::new(callbacks))
}

fn create(
    factory: &RepositoryQueryFactory,
    method: QueryMethod<MockRow, Customer>,
    operations: StubOperations,
) -> RepositoryQuery<StubOperations, Customer> {
    factory
        .create(method, Arc::new(operations), Some(customer_mapper()))
        .unwrap()
}

#[test]
fn test_implicitly_named_collection_query() {
    let publisher = Arc::new(RecordingPublisher::default());
    let factory = factory(publisher.clone(), EntityCallbacks::new());
    let rows: Vec<MockRow> = (1..=5).map(|id| customer_row(Some(id))).collect();

    let query = create(
        &factory,
        QueryMethod::new("find_all", "Customer", ReturnType::Collection),
        StubOperations::new().returning_rows(rows.clone()),
    );
    let customers = query.execute(&[]).unwrap().into_collection().unwrap();

    assert_eq!(customers.len(), 5);
    for (customer, row) in customers.iter().zip(&rows) {
        assert_eq!(customer.name, row.get_string("name").unwrap());
    }

    let events = publisher.events.lock().unwrap();
    assert_eq!(events.len(), 5);
    assert!(events.iter().all(|(name, _)| name == "Customer"));
    assert_eq!(
        events.iter().map(|(_, id)| id.clone()).collect::<Vec<_>>(),
        (1..=5).map(|id| Value::BigInt(Some(id))).collect::<Vec<_>>()
    );
}

#[test]
fn test_inline_query_wins_over_named_query() {
    let factory = factory(Arc::new(RecordingPublisher::default()), EntityCallbacks::new());
    let query = create(
        &factory,
        QueryMethod::new("find_all", "Customer", ReturnType::Collection)
            .with_query(Query::new("SELECT id, name, email FROM customers WHERE vip")),
        StubOperations::new(),
    );

    query.execute(&[]).unwrap();

    assert_eq!(
        query.operations().calls()[0].sql(),
        "SELECT id, name, email FROM customers WHERE vip"
    );
}

#[test]
fn test_single_result_by_bound_email() {
    let publisher = Arc::new(RecordingPublisher::default());
    let factory = factory(publisher.clone(), EntityCallbacks::new());
    let row = customer_row(Some(42));
    let email = row.get_string("email").unwrap();

    let query = create(
        &factory,
        QueryMethod::new("find_by_email", "Customer", ReturnType::Single)
            .with_parameter(Parameter::named(0, "email", ParameterType::String)),
        StubOperations::new().returning_rows(vec![row]),
    );
    let customer = query.execute(&[Value::from(email.clone())]).unwrap().into_single().unwrap();

    assert_eq!(customer.id, Some(42));
    assert_eq!(customer.email, email);
    match &query.operations().calls()[0] {
        StubCall::Query { params, .. } => assert_eq!(params.value("email"), Some(&Value::from(email))),
        other => panic!("expected query, got {other:?}"),
    }
    assert_eq!(publisher.events.lock().unwrap().len(), 1);
}

#[test]
fn test_single_result_without_match_is_none() {
    let publisher = Arc::new(RecordingPublisher::default());
    let factory = factory(publisher.clone(), EntityCallbacks::new());
    let query = create(
        &factory,
        QueryMethod::new("find_by_email", "Customer", ReturnType::Single)
            .with_parameter(Parameter::named(0, "email", ParameterType::String)),
        StubOperations::new(),
    );

    assert_eq!(query.execute(&[Value::from("nobody@example.com")]).unwrap(), QueryOutcome::Single(None));
    assert!(publisher.events.lock().unwrap().is_empty());
}

#[test]
fn test_single_result_with_many_rows_fails() {
    let factory = factory(Arc::new(RecordingPublisher::default()), EntityCallbacks::new());
    let query = create(
        &factory,
        QueryMethod::new("find_by_email", "Customer", ReturnType::Single)
            .with_parameter(Parameter::named(0, "email", ParameterType::String)),
        StubOperations::new().returning_rows(vec![customer_row(Some(1)), customer_row(Some(2))]),
    );

    let err = query.execute(&[Value::from("dup@example.com")]).unwrap_err();
    assert!(matches!(err, LifeError::IncorrectResultSize { expected: 1, actual: 2 }));
}

#[test]
fn test_modifying_query_returns_boolean() {
    let factory = factory(Arc::new(RecordingPublisher::default()), EntityCallbacks::new());
    let method = || {
        QueryMethod::new("deactivate", "Customer", ReturnType::Boolean)
            .modifying()
            .with_parameter(Parameter::named(0, "id", ParameterType::Unsigned))
    };

    let hit = create(&factory, method(), StubOperations::new().returning_update_count(1));
    assert_eq!(hit.execute(&[Value::Unsigned(Some(7))]).unwrap(), QueryOutcome::Modified(true));
    match &hit.operations().calls()[0] {
        StubCall::Update { params, .. } => assert_eq!(params.value("id"), Some(&Value::BigInt(Some(7)))),
        other => panic!("expected update, got {other:?}"),
    }

    let miss = create(&factory, method(), StubOperations::new().returning_update_count(0));
    assert_eq!(miss.execute(&[Value::Unsigned(Some(8))]).unwrap(), QueryOutcome::Modified(false));
}

#[test]
fn test_unidentified_entities_run_callbacks_without_events() {
    let publisher = Arc::new(RecordingPublisher::default());
    let callbacks = EntityCallbacks::new().with_after_load(|mut c: Customer| {
        c.email = c.email.to_lowercase();
        Ok(c)
    });
    let factory = factory(publisher.clone(), callbacks);
    let row = MockRow::new()
        .with("id", Value::BigInt(None))
        .with("name", "Draft")
        .with("email", "DRAFT@EXAMPLE.COM");

    let query = create(
        &factory,
        QueryMethod::new("find_all", "Customer", ReturnType::Stream),
        StubOperations::new().returning_rows(vec![row]),
    );
    let customers = query.execute(&[]).unwrap().into_collection().unwrap();

    assert_eq!(customers[0].email, "draft@example.com");
    assert!(publisher.events.lock().unwrap().is_empty());
}

#[test]
fn test_collection_extractor_groups_rows() {
    let factory = factory(Arc::new(RecordingPublisher::default()), EntityCallbacks::new());
    let query = Query::named("Customer.find_all").result_extractor(ResultExtractorSource::Collection(
        ExtractorFactory::with_row_mapper(|mapper: Option<SharedRowMapper<MockRow, Customer>>| {
            move |rows: Vec<MockRow>| -> Result<Option<Vec<Customer>>, LifeError> {
                let mapper = mapper.clone().unwrap_or_else(customer_mapper);
                let mut customers = Vec::with_capacity(rows.len());
                for (n, row) in rows.iter().enumerate().rev() {
                    customers.push(mapper.map_row(row, n)?);
                }
                Ok(Some(customers))
            }
        }),
    ));

    let repository_query = create(
        &factory,
        QueryMethod::new("find_all_reversed", "Customer", ReturnType::Collection).with_query(query),
        StubOperations::new().returning_rows(vec![customer_row(Some(1)), customer_row(Some(2))]),
    );
    let customers = repository_query.execute(&[]).unwrap().into_collection().unwrap();

    assert_eq!(customers.iter().map(|c| c.id).collect::<Vec<_>>(), vec![Some(2), Some(1)]);
}

#[test]
fn test_query_shared_across_coroutines() {
    let publisher = Arc::new(RecordingPublisher::default());
    let factory = factory(publisher.clone(), EntityCallbacks::new());
    let rows: Vec<MockRow> = (1..=3).map(|id| customer_row(Some(id))).collect();
    let query = Arc::new(create(
        &factory,
        QueryMethod::new("find_by_email", "Customer", ReturnType::Collection)
            .with_parameter(Parameter::named(0, "email", ParameterType::String)),
        StubOperations::new().returning_rows(rows),
    ));

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let query = Arc::clone(&query);
            may::go!(move || {
                let email = format!("user{i}@example.com");
                query
                    .execute(&[Value::from(email)])
                    .map(|outcome| outcome.into_collection().map_or(0, |c| c.len()))
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 3);
    }

    let calls = query.operations().calls();
    assert_eq!(calls.len(), 32);
    let mut emails: Vec<String> = calls
        .iter()
        .filter_map(|c| match c.params().value("email") {
            Some(Value::String(Some(email))) => Some(email.clone()),
            _ => None,
        })
        .collect();
    emails.sort();
    emails.dedup();
    assert_eq!(emails.len(), 32);
    assert_eq!(publisher.events.lock().unwrap().len(), 96);
}
