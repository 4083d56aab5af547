//! Roles and the configuration exchanged in the open handshake.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a context is. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Application,
    Reality,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Application => "application",
            Role::Reality => "reality",
            Role::Manager => "manager",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional behaviours a session asks its peer for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Receive `ar.context.update` pushes from the manager.
    #[serde(default)]
    pub entity_updates: bool,
}

/// Sent once on `ar.session.open`; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,

    /// Protocol names this side speaks, e.g. `ar.vuforia`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,

    #[serde(default)]
    pub capabilities: Capabilities,
}

impl SessionConfiguration {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            user_data: None,
            protocols: Vec::new(),
            capabilities: Capabilities::default(),
        }
    }

    /// An application that wants entity updates pushed to it.
    pub fn application() -> Self {
        Self::new(Role::Application).with_entity_updates(true)
    }

    pub fn reality() -> Self {
        Self::new(Role::Reality)
    }

    pub fn manager() -> Self {
        Self::new(Role::Manager)
    }

    pub fn with_user_data(mut self, data: Value) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    pub fn with_entity_updates(mut self, enabled: bool) -> Self {
        self.capabilities.entity_updates = enabled;
        self
    }

    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }
}
