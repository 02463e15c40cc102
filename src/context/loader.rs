//! Table loaders: the functions that re-read a table from its source.

use crate::error::ServerError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Full replacement contents of a context table.
pub type TableData = HashMap<String, Value>;

/// Produces the complete key/value contents of one context table.
///
/// Every call returns the whole table; the registry swaps it in as a new
/// snapshot. Returning an error leaves the previous snapshot in place.
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Load the full table contents.
    async fn load(&self) -> Result<TableData, ServerError>;

    /// Short label used in logs.
    fn describe(&self) -> &str {
        "loader"
    }
}

/// Adapts an async closure into a [`TableLoader`].
pub struct FnLoader<F> {
    label: String,
    load_fn: F,
}

impl<F> FnLoader<F> {
    /// Wrap `load_fn` under the given log label.
    pub fn new(label: impl Into<String>, load_fn: F) -> Self {
        Self {
            label: label.into(),
            load_fn,
        }
    }
}

#[async_trait]
impl<F, Fut> TableLoader for FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TableData, ServerError>> + Send + 'static,
{
    async fn load(&self) -> Result<TableData, ServerError> {
        (self.load_fn)().await
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

/// Build a shared loader from an async closure.
pub fn loader_fn<F, Fut>(label: impl Into<String>, load_fn: F) -> Arc<dyn TableLoader>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TableData, ServerError>> + Send + 'static,
{
    Arc::new(FnLoader::new(label, load_fn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fn_loader_calls_closure_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader = loader_fn("counting", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let mut data = TableData::new();
                data.insert("calls".to_string(), json!(n + 1));
                Ok(data)
            }
        });

        assert_eq!(loader.describe(), "counting");
        assert_eq!(loader.load().await.unwrap()["calls"], json!(1));
        assert_eq!(loader.load().await.unwrap()["calls"], json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fn_loader_propagates_errors() {
        let loader = loader_fn("failing", || async {
            Err::<TableData, _>(ServerError::connection("store unavailable"))
        });

        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, ServerError::Connection { .. }));
    }
}
