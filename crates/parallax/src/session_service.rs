//! Session registry
//!
//! On the manager, every peer connects through a managed [`SessionPort`];
//! once its configuration arrives the port is registered by [`SessionId`]
//! and the connect event fires. Services hook the connect event to install
//! their per-session topic handlers before any further frame is dispatched.
//!
//! On applications and realities, [`SessionService::manager`] is the single
//! port to the manager.

use std::sync::Arc;

use dashmap::DashMap;
use plxproto::{
    topic, Event, MessagePort, Role, SessionConfiguration, SessionId, SessionPort,
};
use tracing::{debug, info, warn};

use crate::error::{ParallaxError, Result};

struct Inner {
    configuration: SessionConfiguration,
    manager: SessionPort,
    managed: DashMap<SessionId, SessionPort>,
    connect_event: Event<SessionPort>,
    disconnect_event: Event<SessionPort>,
}

#[derive(Clone)]
pub struct SessionService {
    inner: Arc<Inner>,
}

impl SessionService {
    pub fn new(configuration: SessionConfiguration) -> Self {
        Self {
            inner: Arc::new(Inner {
                configuration,
                manager: SessionPort::new(),
                managed: DashMap::new(),
                connect_event: Event::new(),
                disconnect_event: Event::new(),
            }),
        }
    }

    /// This context's own configuration.
    pub fn configuration(&self) -> &SessionConfiguration {
        &self.inner.configuration
    }

    pub fn role(&self) -> Role {
        self.inner.configuration.role
    }

    /// Port to the manager. Unused on the manager itself.
    pub fn manager(&self) -> &SessionPort {
        &self.inner.manager
    }

    /// Raised on the manager when a peer session has opened.
    pub fn connect_event(&self) -> &Event<SessionPort> {
        &self.inner.connect_event
    }

    /// Raised on the manager when a registered session closes.
    pub fn disconnect_event(&self) -> &Event<SessionPort> {
        &self.inner.disconnect_event
    }

    pub fn is_manager(&self) -> bool {
        self.role() == Role::Manager
    }

    pub fn is_application(&self) -> bool {
        self.role() == Role::Application
    }

    pub fn is_reality(&self) -> bool {
        self.role() == Role::Reality
    }

    fn ensure_role(&self, expected: Role) -> Result<()> {
        let actual = self.role();
        if actual == expected {
            Ok(())
        } else {
            Err(ParallaxError::Role { expected, actual })
        }
    }

    pub fn ensure_is_manager(&self) -> Result<()> {
        self.ensure_role(Role::Manager)
    }

    pub fn ensure_is_application(&self) -> Result<()> {
        self.ensure_role(Role::Application)
    }

    pub fn ensure_is_reality(&self) -> Result<()> {
        self.ensure_role(Role::Reality)
    }

    /// Open the port to the manager.
    pub fn connect(&self, port: MessagePort) -> Result<()> {
        if self.is_manager() {
            return Err(ParallaxError::Role {
                expected: Role::Application,
                actual: Role::Manager,
            });
        }
        info!(role = %self.role(), "Connecting to manager");
        self.inner
            .manager
            .open(port, self.inner.configuration.clone())?;
        Ok(())
    }

    /// Create a port for a peer that will connect to this manager. The port
    /// is registered once the peer's configuration arrives.
    pub fn add_managed_session_port(&self) -> Result<SessionPort> {
        self.ensure_is_manager()?;

        let port = SessionPort::new();

        let service = self.clone();
        let opened = port.clone();
        port.open_event().add_listener(move |remote: &SessionConfiguration| {
            if remote.role == Role::Manager {
                warn!(session_id = %opened.id(), "Rejecting peer claiming the manager role");
                let _ = opened.send(
                    topic::ERROR,
                    serde_json::json!({ "message": "a manager cannot connect to another manager" }),
                );
                opened.close();
                return;
            }
            info!(session_id = %opened.id(), role = %remote.role, "Session connected");
            service.inner.managed.insert(opened.id(), opened.clone());
            service.inner.connect_event.raise(&opened);
        });

        let service = self.clone();
        let closed = port.clone();
        port.close_event().add_listener(move |_| {
            if service.inner.managed.remove(&closed.id()).is_some() {
                debug!(session_id = %closed.id(), "Session disconnected");
                service.inner.disconnect_event.raise(&closed);
            }
        });

        Ok(port)
    }

    /// Create a managed port and open it over `port`.
    pub fn open_managed(&self, port: MessagePort) -> Result<SessionPort> {
        let session = self.add_managed_session_port()?;
        session.open(port, self.inner.configuration.clone())?;
        Ok(session)
    }

    pub fn get(&self, id: SessionId) -> Option<SessionPort> {
        self.inner.managed.get(&id).map(|entry| entry.value().clone())
    }

    /// Connected sessions, optionally filtered by the peer's role.
    pub fn managed_sessions(&self, role: Option<Role>) -> Vec<SessionPort> {
        self.inner
            .managed
            .iter()
            .filter(|entry| role.is_none() || entry.value().remote_role() == role)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn managed_count(&self) -> usize {
        self.inner.managed.len()
    }

    /// Close every managed session and the manager port.
    pub fn close_all(&self) {
        let sessions: Vec<SessionPort> = self.managed_sessions(None);
        for session in sessions {
            session.close();
        }
        self.inner.manager.close();
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("role", &self.role())
            .field("managed", &self.inner.managed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_checks() {
        let app = SessionService::new(SessionConfiguration::application());
        assert!(app.ensure_is_application().is_ok());
        assert!(matches!(
            app.ensure_is_manager(),
            Err(ParallaxError::Role {
                expected: Role::Manager,
                actual: Role::Application
            })
        ));
        assert!(app.add_managed_session_port().is_err());
    }
}
