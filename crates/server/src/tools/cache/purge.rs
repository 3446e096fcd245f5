//! cache_clear and cache_sweep tool implementations.

use crate::tools::json_result;
use depot_core::DurableStore;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output from the cache_clear and cache_sweep tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of rows deleted.
    pub deleted: u64,
    /// False when the store could not be reached; nothing was deleted.
    pub ok: bool,
}

/// Empty every partition and the metadata partition.
pub async fn clear_impl(store: &DurableStore) -> Result<CallToolResult, McpError> {
    let output = match store.clear().await {
        Ok(deleted) => {
            tracing::info!(deleted, "keyed store cleared");
            CachePurgeOutput { deleted, ok: true }
        }
        Err(e) => {
            tracing::warn!(error = %e, "keyed store clear failed");
            CachePurgeOutput { deleted: 0, ok: false }
        }
    };
    json_result(&output)
}

/// Delete entries past the freshness horizon.
pub async fn sweep_impl(store: &DurableStore) -> Result<CallToolResult, McpError> {
    let output = match store.sweep_expired().await {
        Ok(deleted) => {
            tracing::debug!(deleted, "keyed store swept");
            CachePurgeOutput { deleted, ok: true }
        }
        Err(e) => {
            tracing::warn!(error = %e, "keyed store sweep failed");
            CachePurgeOutput { deleted: 0, ok: false }
        }
    };
    json_result(&output)
}
