//! Macro for convenient Cypher query construction.

/// Macro for inline Cypher queries with optional parameters.
///
/// # Usage
///
/// ```ignore
/// use kuzumem::cypher;
///
/// // Query without parameters
/// let query = cypher!(db, "MATCH (n) RETURN n");
///
/// // Query with parameters
/// let query = cypher!(db, "MATCH (n) WHERE n.id = $id RETURN n", id = guid);
///
/// // Execute the query
/// let rows = query.fetch_all().await?;
/// ```
#[macro_export]
macro_rules! cypher {
    // Query without parameters
    ($db:expr, $query:expr) => {
        $db.query($query)
    };
    // Query with parameters
    ($db:expr, $query:expr, $($name:ident = $value:expr),+ $(,)?) => {
        $db.query($query)$(.param(stringify!($name), $value))+
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::error::MemoryError;
    use crate::graph::query::QueryExt;
    use crate::graph::traits::CypherExecutor;
    use crate::graph::value::{Params, Row};

    struct TestExecutor;

    #[async_trait::async_trait]
    impl CypherExecutor for TestExecutor {
        async fn execute_cypher(
            &self,
            _cypher: &str,
            _params: Params,
            _timeout: Option<Duration>,
        ) -> Result<Vec<Row>, MemoryError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_cypher_macro_no_params() {
        let executor = TestExecutor;
        let _query = cypher!(executor, "MATCH (n) RETURN n");
        // Just verify it compiles
    }

    #[test]
    fn test_cypher_macro_with_params() {
        let executor = TestExecutor;
        let id = "test-id";
        let count = 42i64;
        let _query = cypher!(
            executor,
            "MATCH (n) WHERE n.id = $id RETURN n LIMIT $count",
            id = id,
            count = count
        );
        // Just verify it compiles
    }
}
