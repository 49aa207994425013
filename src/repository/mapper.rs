//! Row mappers, result extractors and their factories.
//!
//! A [`RowMapper`] turns one row into one value; a [`ResultExtractor`] turns a whole
//! result set into one value. Query methods reference them through factories rather
//! than instances, so each [`RepositoryQuery`](super::RepositoryQuery) builds its own.

use crate::executor::LifeError;
use std::fmt;
use std::sync::Arc;

/// Converts one database row into one object.
///
/// Closures of the shape `Fn(&R, usize) -> Result<T, LifeError>` are row mappers, so most
/// call sites never implement this trait by hand:
///
/// ```
/// use lifeguard_repository::test_helpers::MockRow;
/// use lifeguard_repository::{LifeError, RowMapper};
///
/// let mapper = |row: &MockRow, _row_num: usize| -> Result<String, LifeError> { row.get_string("name") };
/// let row = MockRow::new().with("name", "Ada");
/// assert_eq!(mapper.map_row(&row, 0).unwrap(), "Ada");
/// ```
pub trait RowMapper<R, T>: Send + Sync {
    /// Map `row`, the `row_num`-th row (zero based) of the result set.
    fn map_row(&self, row: &R, row_num: usize) -> Result<T, LifeError>;
}

impl<R, T, F> RowMapper<R, T> for F
where
    F: Fn(&R, usize) -> Result<T, LifeError> + Send + Sync,
{
    fn map_row(&self, row: &R, row_num: usize) -> Result<T, LifeError> {
        self(row, row_num)
    }
}

/// Converts an entire result set into one object, bypassing per-row mapping.
///
/// Returning `Ok(None)` means "no result". For a collection-returning method that is a
/// contract violation and is reported as [`LifeError::InvalidResult`].
pub trait ResultExtractor<R, O>: Send + Sync {
    fn extract_data(&self, rows: Vec<R>) -> Result<Option<O>, LifeError>;
}

impl<R, O, F> ResultExtractor<R, O> for F
where
    F: Fn(Vec<R>) -> Result<Option<O>, LifeError> + Send + Sync,
{
    fn extract_data(&self, rows: Vec<R>) -> Result<Option<O>, LifeError> {
        self(rows)
    }
}

pub type SharedRowMapper<R, T> = Arc<dyn RowMapper<R, T>>;
pub type BoxedResultExtractor<R, O> = Box<dyn ResultExtractor<R, O>>;

/// Builds a fresh row mapper for a query method.
pub type RowMapperFactory<R, T> = Arc<dyn Fn() -> SharedRowMapper<R, T> + Send + Sync>;

/// Row mapper configured on a query method.
pub enum RowMapperSource<R, T> {
    /// Use the repository-wide default row mapper. Selecting this explicitly is the
    /// same as not configuring a row mapper at all.
    Default,
    Factory(RowMapperFactory<R, T>),
}

impl<R, T> RowMapperSource<R, T> {
    /// Configure a row mapper built by `factory` for every repository query.
    pub fn factory<F, M>(factory: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
        M: RowMapper<R, T> + 'static,
    {
        RowMapperSource::Factory(Arc::new(move || Arc::new(factory()) as SharedRowMapper<R, T>))
    }

    /// The configured factory, `None` when the default row mapper applies.
    pub fn configured(&self) -> Option<&RowMapperFactory<R, T>> {
        match self {
            RowMapperSource::Default => None,
            RowMapperSource::Factory(factory) => Some(factory),
        }
    }
}

impl<R, T> Default for RowMapperSource<R, T> {
    fn default() -> Self {
        RowMapperSource::Default
    }
}

impl<R, T> Clone for RowMapperSource<R, T> {
    fn clone(&self) -> Self {
        match self {
            RowMapperSource::Default => RowMapperSource::Default,
            RowMapperSource::Factory(factory) => RowMapperSource::Factory(Arc::clone(factory)),
        }
    }
}

impl<R, T> fmt::Debug for RowMapperSource<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowMapperSource::Default => f.write_str("Default"),
            RowMapperSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// How a result extractor is constructed.
///
/// `WithRowMapper` receives the query method's custom row mapper, or `None` when the
/// method relies on the repository-wide default.
pub enum ExtractorFactory<R, T, O> {
    Plain(Arc<dyn Fn() -> BoxedResultExtractor<R, O> + Send + Sync>),
    WithRowMapper(Arc<dyn Fn(Option<SharedRowMapper<R, T>>) -> BoxedResultExtractor<R, O> + Send + Sync>),
}

impl<R, T, O> ExtractorFactory<R, T, O> {
    pub fn plain<F, X>(factory: F) -> Self
    where
        F: Fn() -> X + Send + Sync + 'static,
        X: ResultExtractor<R, O> + 'static,
    {
        ExtractorFactory::Plain(Arc::new(move || Box::new(factory()) as BoxedResultExtractor<R, O>))
    }

    pub fn with_row_mapper<F, X>(factory: F) -> Self
    where
        F: Fn(Option<SharedRowMapper<R, T>>) -> X + Send + Sync + 'static,
        X: ResultExtractor<R, O> + 'static,
    {
        ExtractorFactory::WithRowMapper(Arc::new(move |mapper| {
            Box::new(factory(mapper)) as BoxedResultExtractor<R, O>
        }))
    }

    pub(crate) fn instantiate(&self, custom_mapper: Option<SharedRowMapper<R, T>>) -> BoxedResultExtractor<R, O> {
        match self {
            ExtractorFactory::Plain(factory) => factory(),
            ExtractorFactory::WithRowMapper(factory) => factory(custom_mapper),
        }
    }
}

impl<R, T, O> Clone for ExtractorFactory<R, T, O> {
    fn clone(&self) -> Self {
        match self {
            ExtractorFactory::Plain(f) => ExtractorFactory::Plain(Arc::clone(f)),
            ExtractorFactory::WithRowMapper(f) => ExtractorFactory::WithRowMapper(Arc::clone(f)),
        }
    }
}

/// Result extractor configured on a query method.
///
/// The variant fixes the extractor's output: `Single` yields one `T` for scalar methods,
/// `Collection` yields `Vec<T>` for collection and stream methods.
pub enum ResultExtractorSource<R, T> {
    Unconfigured,
    Single(ExtractorFactory<R, T, T>),
    Collection(ExtractorFactory<R, T, Vec<T>>),
}

impl<R, T> ResultExtractorSource<R, T> {
    pub fn is_configured(&self) -> bool {
        !matches!(self, ResultExtractorSource::Unconfigured)
    }
}

impl<R, T> Default for ResultExtractorSource<R, T> {
    fn default() -> Self {
        ResultExtractorSource::Unconfigured
    }
}

impl<R, T> Clone for ResultExtractorSource<R, T> {
    fn clone(&self) -> Self {
        match self {
            ResultExtractorSource::Unconfigured => ResultExtractorSource::Unconfigured,
            ResultExtractorSource::Single(f) => ResultExtractorSource::Single(f.clone()),
            ResultExtractorSource::Collection(f) => ResultExtractorSource::Collection(f.clone()),
        }
    }
}

impl<R, T> fmt::Debug for ResultExtractorSource<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultExtractorSource::Unconfigured => f.write_str("Unconfigured"),
            ResultExtractorSource::Single(_) => f.write_str("Single(..)"),
            ResultExtractorSource::Collection(_) => f.write_str("Collection(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl RowMapper<String, String> for Upper {
        fn map_row(&self, row: &String, _row_num: usize) -> Result<String, LifeError> {
            Ok(row.to_uppercase())
        }
    }

    struct Joining {
        mapper: Option<SharedRowMapper<String, String>>,
    }

    impl ResultExtractor<String, String> for Joining {
        fn extract_data(&self, rows: Vec<String>) -> Result<Option<String>, LifeError> {
            let mut parts = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                match &self.mapper {
                    Some(mapper) => parts.push(mapper.map_row(row, i)?),
                    None => parts.push(row.clone()),
                }
            }
            Ok(Some(parts.join(",")))
        }
    }

    #[test]
    fn test_default_source_is_unconfigured() {
        let source: RowMapperSource<String, String> = RowMapperSource::default();
        assert!(source.configured().is_none());
    }

    #[test]
    fn test_factory_source_builds_mapper() {
        let source: RowMapperSource<String, String> = RowMapperSource::factory(|| Upper);
        let factory = source.configured().unwrap();
        let mapper = factory();
        assert_eq!(mapper.map_row(&"abc".to_string(), 0).unwrap(), "ABC");
    }

    #[test]
    fn test_closure_row_mapper_receives_row_number() {
        let mapper = |row: &String, n: usize| -> Result<String, LifeError> { Ok(format!("{n}:{row}")) };
        assert_eq!(mapper.map_row(&"x".to_string(), 4).unwrap(), "4:x");
    }

    #[test]
    fn test_extractor_with_row_mapper_receives_custom_mapper() {
        let factory: ExtractorFactory<String, String, String> =
            ExtractorFactory::with_row_mapper(|mapper| Joining { mapper });

        let custom: SharedRowMapper<String, String> = Arc::new(Upper);
        let extractor = factory.instantiate(Some(custom));
        let out = extractor
            .extract_data(vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(out.as_deref(), Some("A,B"));

        let extractor = factory.instantiate(None);
        let out = extractor
            .extract_data(vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(out.as_deref(), Some("a,b"));
    }

    #[test]
    fn test_plain_extractor_ignores_mapper() {
        let factory: ExtractorFactory<String, String, String> =
            ExtractorFactory::plain(|| Joining { mapper: None });
        let custom: SharedRowMapper<String, String> = Arc::new(Upper);
        let out = factory
            .instantiate(Some(custom))
            .extract_data(vec!["q".to_string()])
            .unwrap();
        assert_eq!(out.as_deref(), Some("q"));
    }

    #[test]
    fn test_extractor_source_configured_flag() {
        let source: ResultExtractorSource<String, String> = ResultExtractorSource::default();
        assert!(!source.is_configured());
        let source: ResultExtractorSource<String, String> =
            ResultExtractorSource::Collection(ExtractorFactory::plain(|| {
                |rows: Vec<String>| -> Result<Option<Vec<String>>, LifeError> { Ok(Some(rows)) }
            }));
        assert!(source.is_configured());
    }
}
