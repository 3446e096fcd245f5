//! Inbound control messages.

use serde::{Deserialize, Serialize};

/// Messages the hosting application can post to a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting controller now, even if clients are still open.
    SkipWaiting,
}
