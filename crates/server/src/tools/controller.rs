//! Controller tools: installing versions, control messages, client
//! accounting and status.

use super::json_result;
use crate::error::ToolError;
use depot_client::{ControlMessage, ControllerConfig, ControllerState, Registration};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the controller_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerMessageParams {
    /// Message type. Only `SKIP_WAITING` is understood.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerMessageOutput {
    /// Whether a waiting controller was activated.
    pub activated: bool,
    pub active_version: Option<String>,
}

/// Parameters for the controller_install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ControllerInstallParams {
    /// Version tag for the new controller (default: the configured one).
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerInstallOutput {
    pub version: String,
    /// `installed` while waiting, `activated` when it took over at once.
    pub state: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Open,
    Close,
}

/// Parameters for the controller_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerClientsParams {
    /// `open` when a client page starts, `close` when it goes away.
    pub action: ClientAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControllerClientsOutput {
    pub clients: usize,
    pub active_version: Option<String>,
}

/// Implementation of the controller_message tool.
pub async fn message_impl(
    registration: &Registration, params: ControllerMessageParams,
) -> Result<CallToolResult, McpError> {
    let message: ControlMessage = serde_json::from_value(serde_json::json!({ "type": params.kind }))
        .map_err(|_| ToolError::InvalidInput(format!("unknown message type: {}", params.kind)))?;

    let activated = registration.post_message(message).await?;
    json_result(&ControllerMessageOutput { activated, active_version: active_version(registration).await })
}

/// Implementation of the controller_install tool.
pub async fn install_impl(
    registration: &Registration, template: &ControllerConfig, params: ControllerInstallParams,
) -> Result<CallToolResult, McpError> {
    let mut config = template.clone();
    if let Some(version) = params.version {
        if version.trim().is_empty() || version.contains(char::is_whitespace) {
            return Err(ToolError::InvalidInput(format!("invalid version tag: {version:?}")).into());
        }
        config.version = version;
    }

    let controller = registration.register(config).await?;
    let state = match controller.state().await {
        ControllerState::Activated => "activated",
        ControllerState::Installed => "installed",
        other => {
            tracing::warn!(state = ?other, "controller_install finished in an unexpected state");
            "unknown"
        }
    };

    json_result(&ControllerInstallOutput { version: controller.version().to_string(), state: state.to_string() })
}

/// Implementation of the controller_clients tool.
pub async fn clients_impl(
    registration: &Registration, params: ControllerClientsParams,
) -> Result<CallToolResult, McpError> {
    let clients = match params.action {
        ClientAction::Open => registration.client_opened().await,
        ClientAction::Close => registration.client_closed().await?,
    };
    json_result(&ControllerClientsOutput { clients, active_version: active_version(registration).await })
}

/// Implementation of the controller_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let status = registration.status().await?;
    json_result(&status)
}

async fn active_version(registration: &Registration) -> Option<String> {
    registration.active().await.map(|c| c.version().to_string())
}
