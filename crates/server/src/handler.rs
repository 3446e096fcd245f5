//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{CacheGetParams, CacheSetParams, clear_impl, get_impl, set_impl, sweep_impl};
use crate::tools::controller::{
    ControllerClientsParams, ControllerInstallParams, ControllerMessageParams, clients_impl, install_impl,
    message_impl, status_impl,
};
use crate::tools::fetch::{OfflineFetchParams, fetch_impl};
use depot_client::{ControllerConfig, Registration};
use depot_core::DurableStore;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// Everything the tools operate on.
#[derive(Debug)]
pub struct AppState {
    pub registration: Registration,
    pub store: DurableStore,
    /// Template for new controller versions; its origin scopes offline_fetch.
    pub controller_config: ControllerConfig,
}

/// The main MCP server handler for depot.
#[derive(Clone)]
pub struct DepotServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl DepotServer {
    /// Create a new server handler.
    pub fn new(state: AppState) -> Self {
        Self { tool_router: Self::tool_router(), state: Arc::new(state) }
    }

    #[tool(
        description = "Fetch a URL through the active cache controller. Reports which tier answered (network, shell, dynamic, fallback)."
    )]
    async fn offline_fetch(&self, params: Parameters<OfflineFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state.registration, &self.state.controller_config.origin, params.0).await
    }

    #[tool(description = "Post a control message to the registration, e.g. {\"type\": \"SKIP_WAITING\"}.")]
    async fn controller_message(
        &self, params: Parameters<ControllerMessageParams>,
    ) -> Result<CallToolResult, McpError> {
        message_impl(&self.state.registration, params.0).await
    }

    #[tool(
        description = "Install a controller version. It activates at once when no clients are open, otherwise it waits."
    )]
    async fn controller_install(
        &self, params: Parameters<ControllerInstallParams>,
    ) -> Result<CallToolResult, McpError> {
        install_impl(&self.state.registration, &self.state.controller_config, params.0).await
    }

    #[tool(description = "Record a client opening or closing. Closing the last client activates a waiting controller.")]
    async fn controller_clients(
        &self, params: Parameters<ControllerClientsParams>,
    ) -> Result<CallToolResult, McpError> {
        clients_impl(&self.state.registration, params.0).await
    }

    #[tool(description = "Report active and waiting controllers, their states, namespace sizes and open clients.")]
    async fn controller_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.state.registration).await
    }

    #[tool(description = "Read a key from the keyed store. Entries older than the freshness horizon are misses.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state.store, params.0).await
    }

    #[tool(description = "Write a JSON value into a keyed store partition. Unknown partitions fall back to the default.")]
    async fn cache_set(&self, params: Parameters<CacheSetParams>) -> Result<CallToolResult, McpError> {
        set_impl(&self.state.store, params.0).await
    }

    #[tool(description = "Empty every keyed store partition and the metadata partition.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        clear_impl(&self.state.store).await
    }

    #[tool(description = "Delete keyed store entries past the freshness horizon.")]
    async fn cache_sweep(&self) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.state.store).await
    }
}

impl ServerHandler for DepotServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "depot".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{ORIGIN, StubNetwork};
    use depot_core::CacheDb;
    use depot_core::store::StoreHandle;
    use url::Url;

    #[tokio::test]
    async fn test_all_tools_listed() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let state = AppState {
            registration: Registration::new(db.clone(), Arc::new(StubNetwork::default())),
            store: DurableStore::new(Arc::new(StoreHandle::from_db(db))),
            controller_config: ControllerConfig {
                version: "v1".into(),
                origin: Url::parse(ORIGIN).unwrap(),
                precache_manifest: vec!["/".into()],
                root_document: "/".into(),
                max_dynamic_entries: 10,
                max_image_entries: 10,
            },
        };
        let server = DepotServer::new(state);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "cache_clear",
                "cache_get",
                "cache_set",
                "cache_sweep",
                "controller_clients",
                "controller_install",
                "controller_message",
                "controller_status",
                "offline_fetch",
            ]
        );
    }
}
