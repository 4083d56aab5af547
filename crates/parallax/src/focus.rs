//! View/input focus
//!
//! The manager decides which application holds focus and tells the old and
//! new holders over `ar.focus.state`. Applications mirror that into
//! [`FocusService::has_focus`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use plxproto::{topic, Event, FocusState, SessionId, SessionPort};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::Result;
use crate::session_service::SessionService;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FocusError {
    #[error("session {0} is not connected")]
    NotConnected(SessionId),
}

/// Raised on the manager whenever the focused session changes.
#[derive(Debug, Clone)]
pub struct FocusChange {
    pub previous: Option<SessionPort>,
    pub current: Option<SessionPort>,
}

struct Inner {
    sessions: SessionService,
    focused: Mutex<Option<SessionPort>>,
    has_focus: AtomicBool,
    focus_change: Event<FocusChange>,
    focus_event: Event<()>,
    blur_event: Event<()>,
}

#[derive(Clone)]
pub struct FocusService {
    inner: Arc<Inner>,
}

impl FocusService {
    pub fn new(sessions: SessionService) -> Self {
        let service = Self {
            inner: Arc::new(Inner {
                sessions: sessions.clone(),
                focused: Mutex::new(None),
                has_focus: AtomicBool::new(false),
                focus_change: Event::new(),
                focus_event: Event::new(),
                blur_event: Event::new(),
            }),
        };

        if sessions.is_manager() {
            let focus = service.clone();
            sessions.disconnect_event().add_listener(move |session| {
                focus.release(session);
            });
        } else {
            let focus = service.clone();
            // Registered before the manager port opens, so cannot collide.
            let _ = sessions
                .manager()
                .on_event(topic::FOCUS_STATE, move |state: FocusState| {
                    focus.apply_remote(state.state);
                });
        }

        service
    }

    fn focused(&self) -> std::sync::MutexGuard<'_, Option<SessionPort>> {
        self.inner.focused.lock().expect("focus mutex poisoned")
    }

    /// Manager: the session holding focus.
    pub fn session(&self) -> Option<SessionPort> {
        self.focused().clone()
    }

    pub fn is_focused(&self, session: &SessionPort) -> bool {
        self.focused().as_ref() == Some(session)
    }

    /// Manager: raised with the previous and current focus holders.
    pub fn focus_change_event(&self) -> &Event<FocusChange> {
        &self.inner.focus_change
    }

    /// Client: whether this context holds focus.
    pub fn has_focus(&self) -> bool {
        self.inner.has_focus.load(Ordering::SeqCst)
    }

    /// Client: raised when focus is gained.
    pub fn focus_event(&self) -> &Event<()> {
        &self.inner.focus_event
    }

    /// Client: raised when focus is lost.
    pub fn blur_event(&self) -> &Event<()> {
        &self.inner.blur_event
    }

    /// Manager: give focus to `session`. No-op if it already has it.
    pub fn set_focus(&self, session: &SessionPort) -> Result<()> {
        self.inner.sessions.ensure_is_manager()?;

        if !session.is_connected() || self.inner.sessions.get(session.id()).is_none() {
            return Err(FocusError::NotConnected(session.id()).into());
        }

        let previous = {
            let mut focused = self.focused();
            if focused.as_ref() == Some(session) {
                return Ok(());
            }
            focused.replace(session.clone())
        };

        info!(
            previous = ?previous.as_ref().map(|s| s.id()),
            current = %session.id(),
            "Focus changed"
        );

        if let Some(previous) = &previous {
            let _ = previous.send(topic::FOCUS_STATE, FocusState { state: false });
        }
        let _ = session.send(topic::FOCUS_STATE, FocusState { state: true });

        self.inner.focus_change.raise(&FocusChange {
            previous,
            current: Some(session.clone()),
        });
        Ok(())
    }

    /// Manager: take focus away from whoever holds it.
    pub fn clear_focus(&self) -> Result<()> {
        self.inner.sessions.ensure_is_manager()?;
        let previous = self.focused().take();
        if let Some(previous) = previous {
            let _ = previous.send(topic::FOCUS_STATE, FocusState { state: false });
            self.inner.focus_change.raise(&FocusChange {
                previous: Some(previous),
                current: None,
            });
        }
        Ok(())
    }

    /// A closing session loses focus.
    fn release(&self, session: &SessionPort) {
        let released = {
            let mut focused = self.focused();
            if focused.as_ref() == Some(session) {
                focused.take()
            } else {
                None
            }
        };
        if let Some(previous) = released {
            debug!(session_id = %previous.id(), "Focused session closed");
            self.inner.focus_change.raise(&FocusChange {
                previous: Some(previous),
                current: None,
            });
        }
    }

    fn apply_remote(&self, state: bool) {
        let was = self.inner.has_focus.swap(state, Ordering::SeqCst);
        if was == state {
            return;
        }
        if state {
            debug!("Gained focus");
            self.inner.focus_event.raise(&());
        } else {
            debug!("Lost focus");
            self.inner.blur_event.raise(&());
        }
    }
}

impl std::fmt::Debug for FocusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusService")
            .field("focused", &self.session().map(|s| s.id()))
            .field("has_focus", &self.has_focus())
            .finish()
    }
}
