//! Domain to database value conversion for bound parameters.
//!
//! Arguments arrive as `sea_query::Value`. Before binding, each declared parameter type is
//! normalized to the kind PostgreSQL actually stores ([`ColumnTypes::resolve_primitive_type`]),
//! mapped to a suggested SQL type ([`sql_type_for`]), and handed to a [`ValueConverter`].

use crate::executor::LifeError;
use may_postgres::types::Type;
use sea_query::Value;

/// Declared type of a query method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    TinyUnsigned,
    SmallUnsigned,
    Unsigned,
    BigUnsigned,
    Float,
    Double,
    String,
    Char,
    Bytes,
    Json,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Decimal,
    /// Anything the converter passes through untouched.
    Other,
}

impl ParameterType {
    /// The parameter type a value would have been declared with.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ParameterType::Bool,
            Value::TinyInt(_) => ParameterType::TinyInt,
            Value::SmallInt(_) => ParameterType::SmallInt,
            Value::Int(_) => ParameterType::Int,
            Value::BigInt(_) => ParameterType::BigInt,
            Value::TinyUnsigned(_) => ParameterType::TinyUnsigned,
            Value::SmallUnsigned(_) => ParameterType::SmallUnsigned,
            Value::Unsigned(_) => ParameterType::Unsigned,
            Value::BigUnsigned(_) => ParameterType::BigUnsigned,
            Value::Float(_) => ParameterType::Float,
            Value::Double(_) => ParameterType::Double,
            Value::String(_) => ParameterType::String,
            Value::Char(_) => ParameterType::Char,
            Value::Bytes(_) => ParameterType::Bytes,
            Value::Json(_) => ParameterType::Json,
            Value::Uuid(_) => ParameterType::Uuid,
            Value::ChronoDate(_) => ParameterType::Date,
            Value::ChronoTime(_) => ParameterType::Time,
            Value::ChronoDateTime(_) => ParameterType::DateTime,
            Value::ChronoDateTimeUtc(_) => ParameterType::DateTimeUtc,
            Value::Decimal(_) => ParameterType::Decimal,
            _ => ParameterType::Other,
        }
    }
}

/// Column type normalization.
pub struct ColumnTypes;

impl ColumnTypes {
    /// Map a declared type to the kind PostgreSQL stores it as.
    ///
    /// PostgreSQL has no unsigned or one-byte integers, so those widen to the next signed
    /// kind that holds every value; `Char` binds as text.
    pub fn resolve_primitive_type(declared: ParameterType) -> ParameterType {
        match declared {
            ParameterType::TinyInt | ParameterType::TinyUnsigned => ParameterType::SmallInt,
            ParameterType::SmallUnsigned => ParameterType::Int,
            ParameterType::Unsigned | ParameterType::BigUnsigned => ParameterType::BigInt,
            ParameterType::Char => ParameterType::String,
            other => other,
        }
    }
}

/// Suggested PostgreSQL type for an already normalized parameter type.
pub fn sql_type_for(ty: ParameterType) -> Option<Type> {
    match ty {
        ParameterType::Bool => Some(Type::BOOL),
        ParameterType::SmallInt => Some(Type::INT2),
        ParameterType::Int => Some(Type::INT4),
        ParameterType::BigInt => Some(Type::INT8),
        ParameterType::Float => Some(Type::FLOAT4),
        ParameterType::Double => Some(Type::FLOAT8),
        ParameterType::String => Some(Type::TEXT),
        ParameterType::Bytes => Some(Type::BYTEA),
        ParameterType::Json => Some(Type::JSONB),
        ParameterType::Uuid => Some(Type::UUID),
        ParameterType::Date => Some(Type::DATE),
        ParameterType::Time => Some(Type::TIME),
        ParameterType::DateTime => Some(Type::TIMESTAMP),
        ParameterType::DateTimeUtc => Some(Type::TIMESTAMPTZ),
        ParameterType::Decimal => Some(Type::NUMERIC),
        ParameterType::TinyInt
        | ParameterType::TinyUnsigned
        | ParameterType::SmallUnsigned
        | ParameterType::Unsigned
        | ParameterType::BigUnsigned
        | ParameterType::Char
        | ParameterType::Other => None,
    }
}

/// A converted parameter value and the SQL type it should be bound as, if known.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseValue {
    pub value: Value,
    pub sql_type: Option<Type>,
}

impl DatabaseValue {
    pub fn new(value: Value, sql_type: Option<Type>) -> Self {
        Self { value, sql_type }
    }

    pub fn untyped(value: Value) -> Self {
        Self { value, sql_type: None }
    }
}

/// Knows how domain values become database values.
pub trait ValueConverter: Send + Sync {
    /// Convert `value` to `target`, optionally choosing a SQL type other than `suggested`.
    fn to_database_value(
        &self,
        value: Value,
        target: ParameterType,
        suggested: Option<Type>,
    ) -> Result<DatabaseValue, LifeError>;
}

/// Widens integers, binds characters as text and rejects lossy conversions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueConverter;

impl ValueConverter for DefaultValueConverter {
    fn to_database_value(
        &self,
        value: Value,
        target: ParameterType,
        suggested: Option<Type>,
    ) -> Result<DatabaseValue, LifeError> {
        let converted = match target {
            ParameterType::SmallInt => to_small_int(value),
            ParameterType::Int => to_int(value),
            ParameterType::BigInt => to_big_int(value)?,
            ParameterType::Double => match value {
                Value::Float(f) => Value::Double(f.map(f64::from)),
                other => other,
            },
            ParameterType::String => match value {
                Value::Char(c) => Value::String(c.map(|c| c.to_string())),
                other => other,
            },
            _ => value,
        };

        // A value of a different kind than declared keeps its own type
        let actual = ColumnTypes::resolve_primitive_type(ParameterType::of(&converted));
        let sql_type = if actual == target { suggested } else { sql_type_for(actual) };

        Ok(DatabaseValue::new(converted, sql_type))
    }
}

fn to_small_int(value: Value) -> Value {
    match value {
        Value::TinyInt(v) => Value::SmallInt(v.map(i16::from)),
        Value::TinyUnsigned(v) => Value::SmallInt(v.map(i16::from)),
        other => other,
    }
}

fn to_int(value: Value) -> Value {
    match value {
        Value::TinyInt(v) => Value::Int(v.map(i32::from)),
        Value::SmallInt(v) => Value::Int(v.map(i32::from)),
        Value::TinyUnsigned(v) => Value::Int(v.map(i32::from)),
        Value::SmallUnsigned(v) => Value::Int(v.map(i32::from)),
        other => other,
    }
}

fn to_big_int(value: Value) -> Result<Value, LifeError> {
    Ok(match value {
        Value::TinyInt(v) => Value::BigInt(v.map(i64::from)),
        Value::SmallInt(v) => Value::BigInt(v.map(i64::from)),
        Value::Int(v) => Value::BigInt(v.map(i64::from)),
        Value::TinyUnsigned(v) => Value::BigInt(v.map(i64::from)),
        Value::SmallUnsigned(v) => Value::BigInt(v.map(i64::from)),
        Value::Unsigned(v) => Value::BigInt(v.map(i64::from)),
        Value::BigUnsigned(Some(u)) => {
            let signed = i64::try_from(u).map_err(|_| {
                LifeError::Conversion(format!(
                    "BigUnsigned value {u} exceeds i64::MAX ({}), cannot be safely cast to i64",
                    i64::MAX
                ))
            })?;
            Value::BigInt(Some(signed))
        }
        Value::BigUnsigned(None) => Value::BigInt(None),
        other => other,
    })
}

/// True for any variant holding `None`.
pub(crate) fn is_null(value: &Value) -> bool {
    match value {
        Value::Bool(v) => v.is_none(),
        Value::TinyInt(v) => v.is_none(),
        Value::SmallInt(v) => v.is_none(),
        Value::Int(v) => v.is_none(),
        Value::BigInt(v) => v.is_none(),
        Value::TinyUnsigned(v) => v.is_none(),
        Value::SmallUnsigned(v) => v.is_none(),
        Value::Unsigned(v) => v.is_none(),
        Value::BigUnsigned(v) => v.is_none(),
        Value::Float(v) => v.is_none(),
        Value::Double(v) => v.is_none(),
        Value::String(v) => v.is_none(),
        Value::Char(v) => v.is_none(),
        Value::Bytes(v) => v.is_none(),
        Value::Json(v) => v.is_none(),
        Value::Uuid(v) => v.is_none(),
        Value::ChronoDate(v) => v.is_none(),
        Value::ChronoTime(v) => v.is_none(),
        Value::ChronoDateTime(v) => v.is_none(),
        Value::ChronoDateTimeUtc(v) => v.is_none(),
        Value::Decimal(v) => v.is_none(),
        _ => false,
    }
}
