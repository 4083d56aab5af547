//! Synchronous multi-listener events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`Event::add_listener`].
pub type ListenerId = u64;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A list of callbacks invoked in registration order.
///
/// Listeners are snapshotted before a raise, so a listener may add or
/// remove listeners (including itself) without deadlocking.
pub struct Event<T> {
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("event listeners mutex poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().expect("event listeners mutex poisoned");
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .expect("event listeners mutex poisoned")
            .len()
    }

    /// Invoke every listener. Returns how many were called, so callers can
    /// surface events nobody observed.
    pub fn raise(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .expect("event listeners mutex poisoned")
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in &snapshot {
            listener(value);
        }
        snapshot.len()
    }

    pub fn clear(&self) {
        self.listeners
            .lock()
            .expect("event listeners mutex poisoned")
            .clear();
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_raise_calls_listeners_in_order() {
        let event = Event::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        event.add_listener(move |v| s1.lock().unwrap().push(("a", *v)));
        let s2 = seen.clone();
        event.add_listener(move |v| s2.lock().unwrap().push(("b", *v)));

        assert_eq!(event.raise(&7), 2);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_remove_listener() {
        let event = Event::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let id = event.add_listener(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(event.remove_listener(id));
        assert!(!event.remove_listener(id));
        assert_eq!(event.raise(&()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_may_register_during_raise() {
        let event = Arc::new(Event::<()>::new());
        let inner = event.clone();
        event.add_listener(move |_| {
            inner.add_listener(|_| {});
        });

        assert_eq!(event.raise(&()), 1);
        assert_eq!(event.listener_count(), 2);
    }
}
