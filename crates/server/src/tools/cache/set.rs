//! cache_set tool implementation.
//!
//! Writes a JSON value into a partition of the keyed store.

use crate::tools::json_result;
use depot_core::{DurableStore, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSetParams {
    /// Key to write.
    pub key: String,

    /// Any JSON value.
    pub value: serde_json::Value,

    /// Target partition (default partition when omitted). Unknown partitions
    /// are redirected to the default one.
    #[serde(default)]
    pub partition: Option<String>,
}

/// Output from the cache_set tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSetOutput {
    pub key: String,
    /// Whether the value was persisted.
    pub stored: bool,
    /// Partition the value actually landed in.
    pub partition: Option<String>,
}

/// Implementation of the cache_set tool.
///
/// A storage failure is logged and reported as `stored: false`.
pub async fn set_impl(store: &DurableStore, params: CacheSetParams) -> Result<CallToolResult, McpError> {
    if params.key.is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let partition = match store.write(&params.key, &params.value, params.partition.as_deref()).await {
        Ok(partition) => Some(partition),
        Err(e) => {
            tracing::warn!(key = %params.key, error = %e, "keyed store write failed");
            None
        }
    };

    json_result(&CacheSetOutput { key: params.key, stored: partition.is_some(), partition })
}
