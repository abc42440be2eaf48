// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-key entry state shared between the originator and its waiters.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle of a single computation attempt for a key.
///
/// An entry starts out `Pending` and moves to exactly one terminal state.
#[derive(Clone, Debug)]
pub(crate) enum EntryState<T> {
    Pending,
    Ready(T),
    Abandoned,
}

impl<T> EntryState<T> {
    const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A published computation attempt.
///
/// The state lives in a `watch` channel so the terminal transition is broadcast: every waiter
/// subscribed before or after the transition observes it, and none of them can miss the wakeup.
pub(crate) struct Entry<T> {
    state: watch::Sender<EntryState<T>>,
}

impl<T> Entry<T> {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(EntryState::Pending);
        Self { state }
    }

    /// Publishes the computed value. Returns `false` if the entry was already terminal.
    pub(crate) fn complete(&self, value: T) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = EntryState::Ready(value);
                true
            } else {
                false
            }
        })
    }

    /// Marks the entry as abandoned, waking every waiter so it can retry.
    ///
    /// Returns `false` if the entry was already terminal.
    pub(crate) fn abandon(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = EntryState::Abandoned;
                true
            } else {
                false
            }
        })
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }
}

impl<T: Clone> Entry<T> {
    /// Returns the value if the entry already completed.
    pub(crate) fn ready_value(&self) -> Option<T> {
        match &*self.state.borrow() {
            EntryState::Ready(value) => Some(value.clone()),
            EntryState::Pending | EntryState::Abandoned => None,
        }
    }

    /// Waits for the entry to leave the pending state.
    ///
    /// Returns `Some` with a clone of the value on completion and `None` if the entry was
    /// abandoned.
    pub(crate) async fn wait(&self) -> Option<T> {
        let mut receiver = self.state.subscribe();

        // The sender lives as long as `self`, so the channel cannot close while we wait.
        let Ok(state) = receiver.wait_for(|state| !state.is_pending()).await else {
            return None;
        };

        match &*state {
            EntryState::Ready(value) => Some(value.clone()),
            EntryState::Pending | EntryState::Abandoned => None,
        }
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.borrow() {
            EntryState::Pending => "Pending",
            EntryState::Ready(_) => "Ready",
            EntryState::Abandoned => "Abandoned",
        };
        f.debug_struct("Entry").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn new_entry_is_pending() {
        let entry = Entry::<u32>::new();
        assert!(entry.is_pending());
        assert_eq!(entry.ready_value(), None);
    }

    #[test]
    fn complete_fires_once() {
        let entry = Entry::new();
        assert!(entry.complete(1));
        assert!(!entry.complete(2));
        assert!(!entry.abandon());
        assert_eq!(entry.ready_value(), Some(1));
    }

    #[test]
    fn abandon_blocks_completion() {
        let entry = Entry::new();
        assert!(entry.abandon());
        assert!(!entry.complete(7));
        assert!(!entry.is_pending());
        assert_eq!(entry.ready_value(), None);
    }

    #[tokio::test]
    async fn wait_returns_value_published_before_subscribe() {
        let entry = Entry::new();
        entry.complete("done".to_string());
        assert_eq!(entry.wait().await.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn wait_wakes_every_waiter_on_abandon() {
        let entry = Arc::new(Entry::<String>::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let entry = Arc::clone(&entry);
                tokio::spawn(async move { entry.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(entry.abandon());

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), None);
        }
    }

    #[test]
    fn debug_shows_state_without_value() {
        let entry = Entry::new();
        entry.complete(vec![1, 2, 3]);
        assert_eq!(format!("{entry:?}"), "Entry { state: \"Ready\" }");
    }
}
