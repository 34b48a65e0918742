//! Query builder for fluent Cypher query construction.

use std::time::Duration;

use crate::error::MemoryError;
use crate::graph::traits::CypherExecutor;
use crate::graph::value::{Params, Row, Value};

/// A builder for constructing and executing Cypher queries.
///
/// `Query` provides a fluent API for adding parameters and executing
/// queries against any [`CypherExecutor`].
///
/// # Example
///
/// ```ignore
/// let rows = db
///     .query("MATCH (c:Component) WHERE c.id = $id RETURN c")
///     .param("id", guid)
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Params,
    timeout: Option<Duration>,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Params::new(),
            timeout: None,
        }
    }

    /// Adds a parameter to the query.
    ///
    /// Parameters are referenced in Cypher using `$name` syntax and are
    /// always bound, never interpolated.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Overrides the executor's default timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Executes the query and collects all rows.
    pub async fn fetch_all(self) -> Result<Vec<Row>, MemoryError> {
        self.executor
            .execute_cypher(&self.cypher, self.params, self.timeout)
            .await
    }

    /// Executes the query and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, MemoryError> {
        let mut rows = self.fetch_all().await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.swap_remove(0)))
        }
    }

    /// Executes the query without returning results.
    ///
    /// Use this for mutations (CREATE, MERGE, DELETE, SET).
    pub async fn run(self) -> Result<(), MemoryError> {
        self.executor
            .run_cypher(&self.cypher, self.params, self.timeout)
            .await
    }
}

// Param value conversions for ergonomic call sites.

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int64(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float64(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(d: chrono::NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Timestamp(dt.timestamp_nanos_opt().unwrap_or_default())
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::String).collect())
    }
}

impl From<&[String]> for Value {
    fn from(items: &[String]) -> Self {
        Value::List(items.iter().map(|s| Value::String(s.clone())).collect())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Extension trait providing a convenient `query()` method.
///
/// Automatically implemented for all [`CypherExecutor`] types, allowing
/// `executor.query("...")` instead of `Query::new(&executor, "...")`.
pub trait QueryExt: CypherExecutor {
    fn query(&self, cypher: &str) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, cypher)
    }
}

// Blanket implementation for all CypherExecutor types
impl<E: CypherExecutor> QueryExt for E {}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // Mock executor for testing
    struct MockExecutor {
        expected_cypher: String,
        expected_params: Params,
    }

    #[async_trait]
    impl CypherExecutor for MockExecutor {
        async fn execute_cypher(
            &self,
            cypher: &str,
            params: Params,
            _timeout: Option<Duration>,
        ) -> Result<Vec<Row>, MemoryError> {
            assert_eq!(cypher, self.expected_cypher);
            assert_eq!(params, self.expected_params);
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_query_no_params() {
        let executor = MockExecutor {
            expected_cypher: "MATCH (n) RETURN n".to_string(),
            expected_params: Params::new(),
        };

        let result = executor.query("MATCH (n) RETURN n").fetch_all().await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_with_params() {
        let mut expected_params = Params::new();
        expected_params.insert("id".to_string(), Value::String("test-id".into()));
        expected_params.insert("count".to_string(), Value::Int64(42));

        let executor = MockExecutor {
            expected_cypher: "MATCH (n) WHERE n.id = $id RETURN n LIMIT $count".to_string(),
            expected_params,
        };

        let result = executor
            .query("MATCH (n) WHERE n.id = $id RETURN n LIMIT $count")
            .param("id", "test-id")
            .param("count", 42i64)
            .fetch_all()
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_query_run() {
        let mut expected_params = Params::new();
        expected_params.insert("id".to_string(), Value::String("new-id".into()));

        let executor = MockExecutor {
            expected_cypher: "CREATE (n:Node {id: $id})".to_string(),
            expected_params,
        };

        let result = executor
            .query("CREATE (n:Node {id: $id})")
            .param("id", "new-id")
            .run()
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_option_param_binds_null() {
        let mut expected_params = Params::new();
        expected_params.insert("note".to_string(), Value::Null);

        let executor = MockExecutor {
            expected_cypher: "CREATE (n:Node {note: $note})".to_string(),
            expected_params,
        };

        let note: Option<String> = None;
        executor
            .query("CREATE (n:Node {note: $note})")
            .param("note", note)
            .run()
            .await
            .unwrap();
    }
}
