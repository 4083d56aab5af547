//! Sequential command queue for a single-owner resource
//!
//! Commands run one at a time in push order. Each carries an owner tag that
//! is bookkeeping only: it names whose command is running and who a failure
//! belongs to, and never affects ordering.
//!
//! ```ignore
//! let queue: CommandQueue<SessionId, VuforiaError> = CommandQueue::new();
//! let done = queue.push(session.id(), move || async move { delegate.init(&opts).await });
//! done.await?;
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use plxproto::Event;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Why a pushed command did not produce a value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandQueueError<E> {
    #[error("command was cleared before it ran")]
    Cleared,
    #[error("{0}")]
    Failed(E),
}

type Thunk<E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), E>> + Send>;

struct Item<O, E> {
    owner: O,
    thunk: Thunk<E>,
}

struct QueueState<O, E> {
    items: VecDeque<Item<O, E>>,
    paused: bool,
    running: bool,
    current_owner: Option<O>,
}

struct Shared<O, E> {
    state: Mutex<QueueState<O, E>>,
    error_event: Event<(O, E)>,
}

/// FIFO of deferred async commands. Clones share the same queue.
pub struct CommandQueue<O, E> {
    shared: Arc<Shared<O, E>>,
}

impl<O, E> Clone for CommandQueue<O, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<O, E> CommandQueue<O, E>
where
    O: Clone + std::fmt::Debug + Send + Sync + 'static,
    E: Clone + std::fmt::Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    paused: false,
                    running: false,
                    current_owner: None,
                }),
                error_event: Event::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState<O, E>> {
        self.shared.state.lock().expect("command queue mutex poisoned")
    }

    /// Raised with `(owner, error)` whenever a command fails.
    pub fn error_event(&self) -> &Event<(O, E)> {
        &self.shared.error_event
    }

    /// Append a command. It is queued immediately; the returned future only
    /// reports its outcome and need not be polled for the command to run.
    pub fn push<T, F, Fut>(
        &self,
        owner: O,
        command: F,
    ) -> impl Future<Output = Result<T, CommandQueueError<E>>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let thunk: Thunk<E> = Box::new(move || {
            async move {
                let result = command().await;
                let status = match &result {
                    Ok(_) => Ok(()),
                    Err(e) => Err(e.clone()),
                };
                let _ = tx.send(result);
                status
            }
            .boxed()
        });

        {
            let mut state = self.state();
            trace!(owner = ?owner, queued = state.items.len(), "Command pushed");
            state.items.push_back(Item { owner, thunk });
        }
        self.pump();

        async move {
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(CommandQueueError::Failed(e)),
                Err(_) => Err(CommandQueueError::Cleared),
            }
        }
    }

    /// Drop every command that has not started. A running command finishes.
    pub fn clear(&self) {
        let dropped = {
            let mut state = self.state();
            let count = state.items.len();
            state.items.clear();
            count
        };
        if dropped > 0 {
            debug!(dropped, "Command queue cleared");
        }
    }

    /// Stop starting new commands. The running one, if any, finishes.
    pub fn pause(&self) {
        self.state().paused = true;
    }

    /// Resume after [`CommandQueue::pause`].
    pub fn execute(&self) {
        self.state().paused = false;
        self.pump();
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owner of the command currently running.
    pub fn current_owner(&self) -> Option<O> {
        self.state().current_owner.clone()
    }

    fn pump(&self) {
        {
            let mut state = self.state();
            if state.running || state.paused || state.items.is_empty() {
                return;
            }
            state.running = true;
        }

        let queue = self.clone();
        tokio::spawn(async move {
            queue.drain().await;
        });
    }

    async fn drain(&self) {
        loop {
            let item = {
                let mut state = self.state();
                let next = if state.paused {
                    None
                } else {
                    state.items.pop_front()
                };
                match next {
                    Some(item) => {
                        state.current_owner = Some(item.owner.clone());
                        item
                    }
                    None => {
                        state.running = false;
                        state.current_owner = None;
                        return;
                    }
                }
            };

            let Item { owner, thunk } = item;
            trace!(owner = ?owner, "Command started");
            if let Err(e) = thunk().await {
                debug!(owner = ?owner, error = %e, "Command failed");
                let event = (owner, e);
                if self.shared.error_event.raise(&event) == 0 {
                    error!(owner = ?event.0, error = %event.1, "Unobserved command queue error");
                }
            }
        }
    }
}

impl<O, E> Default for CommandQueue<O, E>
where
    O: Clone + std::fmt::Debug + Send + Sync + 'static,
    E: Clone + std::fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<O, E> std::fmt::Debug for CommandQueue<O, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue").finish_non_exhaustive()
    }
}
