//! cache_get tool implementation.
//!
//! Reads one key from the keyed store, honoring the freshness horizon.

use crate::tools::json_result;
use depot_core::{DurableStore, Error, ReadOutcome};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Key to read, e.g. `load:42`.
    pub key: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    /// The stored value; absent unless the outcome is `fresh`.
    pub value: Option<serde_json::Value>,
    /// `fresh`, `expired`, `missing`, `inconsistent` or `unavailable`.
    pub outcome: String,
}

/// Implementation of the cache_get tool.
///
/// Every read answers: a storage failure is reported as an `unavailable`
/// miss, never as a tool error.
pub async fn get_impl(store: &DurableStore, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.key.is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let (value, outcome) = match store.read::<serde_json::Value>(&params.key).await {
        Ok(ReadOutcome::Fresh(value)) => (Some(value), "fresh"),
        Ok(ReadOutcome::Expired) => (None, "expired"),
        Ok(ReadOutcome::Missing) => (None, "missing"),
        Ok(ReadOutcome::Inconsistent) => (None, "inconsistent"),
        Err(e) => {
            tracing::warn!(key = %params.key, error = %e, "keyed store read failed; reporting miss");
            (None, "unavailable")
        }
    };

    json_result(&CacheGetOutput { key: params.key, value, outcome: outcome.to_string() })
}
