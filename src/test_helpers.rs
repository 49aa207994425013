//! Test utilities for repository code
//!
//! `StubOperations` is an in-memory [`NamedParameterOperations`] that records every call
//! and answers with canned rows, an update count or an error. `MockRow` is the row type it
//! returns: a list of named `sea_query::Value`s.

use crate::executor::LifeError;
use crate::repository::{NamedParameterOperations, NamedParameters};
use sea_query::Value;
use std::sync::Mutex;

/// An in-memory result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockRow {
    columns: Vec<(String, Value)>,
}

impl MockRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. Lookups return the first column of a given name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get_string(&self, name: &str) -> Result<String, LifeError> {
        match self.get(name) {
            Some(Value::String(Some(s))) => Ok(s.clone()),
            Some(other) => Err(LifeError::ParseError(format!(
                "column {name} is not a non-null string: {other:?}"
            ))),
            None => Err(LifeError::ParseError(format!("no column named {name}"))),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<i64, LifeError> {
        match self.get(name) {
            Some(Value::BigInt(Some(v))) => Ok(*v),
            Some(Value::Int(Some(v))) => Ok(i64::from(*v)),
            Some(Value::SmallInt(Some(v))) => Ok(i64::from(*v)),
            Some(other) => Err(LifeError::ParseError(format!(
                "column {name} is not a non-null integer: {other:?}"
            ))),
            None => Err(LifeError::ParseError(format!("no column named {name}"))),
        }
    }
}

/// One call recorded by [`StubOperations`].
#[derive(Debug, Clone, PartialEq)]
pub enum StubCall {
    Update { sql: String, params: NamedParameters },
    Query { sql: String, params: NamedParameters },
}

impl StubCall {
    pub fn sql(&self) -> &str {
        match self {
            StubCall::Update { sql, .. } | StubCall::Query { sql, .. } => sql,
        }
    }

    pub fn params(&self) -> &NamedParameters {
        match self {
            StubCall::Update { params, .. } | StubCall::Query { params, .. } => params,
        }
    }
}

/// Canned [`NamedParameterOperations`] for tests.
///
/// Every query returns the configured rows and every update the configured count, unless
/// a failure message is set, in which case both fail with `LifeError::QueryError`.
#[derive(Debug, Default)]
pub struct StubOperations {
    rows: Vec<MockRow>,
    update_count: u64,
    failure: Option<String>,
    calls: Mutex<Vec<StubCall>>,
}

impl StubOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning_rows(mut self, rows: Vec<MockRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn returning_update_count(mut self, count: u64) -> Self {
        self.update_count = count;
        self
    }

    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<StubCall> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<StubCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: StubCall) -> Result<(), LifeError> {
        self.lock_calls().push(call);
        match &self.failure {
            Some(message) => Err(LifeError::QueryError(message.clone())),
            None => Ok(()),
        }
    }
}

impl NamedParameterOperations for StubOperations {
    type Row = MockRow;

    fn update(&self, sql: &str, params: &NamedParameters) -> Result<u64, LifeError> {
        self.record(StubCall::Update {
            sql: sql.to_string(),
            params: params.clone(),
        })?;
        Ok(self.update_count)
    }

    fn query(&self, sql: &str, params: &NamedParameters) -> Result<Vec<MockRow>, LifeError> {
        self.record(StubCall::Query {
            sql: sql.to_string(),
            params: params.clone(),
        })?;
        Ok(self.rows.clone())
    }
}
