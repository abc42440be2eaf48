// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The memoizing cache and its lookup protocol.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::builder::MemoBuilder;
use crate::call_id::CallId;
use crate::entry::Entry;
use crate::policy::{CancelPolicy, RetryPolicy};
use crate::telemetry::{MemoEvent, Telemetry};
use crate::{Error, Result};

/// The user computation, type-erased so the cache can share it with background tasks.
pub(crate) type ComputeFn<T> = dyn Fn(String) -> BoxFuture<'static, T> + Send + Sync;

pub(crate) fn boxed_compute<T, F, Fut>(compute: F) -> Box<ComputeFn<T>>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    Box::new(move |key| compute(key).boxed())
}

/// A published entry together with the call that created it.
struct Slot<T> {
    entry: Arc<Entry<T>>,
    originator: CallId,
}

/// What a lookup found under the lock.
enum Lookup<T> {
    Hit(T),
    Wait(Arc<Entry<T>>),
    Originate(Arc<Entry<T>>),
    Cancelled,
}

struct Inner<T> {
    compute: Box<ComputeFn<T>>,
    entries: Mutex<HashMap<String, Slot<T>>>,
    retry: RetryPolicy,
    cancel_policy: CancelPolicy,
    telemetry: Telemetry,
}

/// A concurrent memoizing cache with single-flight computation and cancellable lookups.
///
/// For every key the computation runs at most once at a time. The first caller for a key (the
/// originator) runs it, and every concurrent caller (a waiter) shares that single result.
/// Completed results are cached for the lifetime of the `Memo`, including results that
/// represent failures: if the computation returns `Result<V, E>`, an `Err` is cached and handed
/// out just like an `Ok`.
///
/// `Memo` is a cheap handle. Clones share the same entries.
///
/// # Examples
///
/// ```
/// use memo::Memo;
///
/// # async fn example() -> memo::Result<()> {
/// let memo = Memo::new(|url: String| async move {
///     // An expensive fetch would go here.
///     Ok::<_, String>(url.len())
/// });
///
/// assert_eq!(memo.get("https://example.com").await?, Ok(19));
/// # Ok(())
/// # }
/// ```
pub struct Memo<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("name", &self.inner.telemetry.name())
            .field("entries", &self.len())
            .field("retry", &self.inner.retry)
            .field("cancel_policy", &self.inner.cancel_policy)
            .finish_non_exhaustive()
    }
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cache around `compute` with default settings.
    pub fn new<F, Fut>(compute: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self::builder(compute).build()
    }

    /// Starts configuring a cache around `compute`.
    pub fn builder<F, Fut>(compute: F) -> MemoBuilder<T>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        MemoBuilder::new(boxed_compute(compute))
    }

    pub(crate) fn from_parts(compute: Box<ComputeFn<T>>, retry: RetryPolicy, cancel_policy: CancelPolicy, telemetry: Telemetry) -> Self {
        Self {
            inner: Arc::new(Inner {
                compute,
                entries: Mutex::new(HashMap::new()),
                retry,
                cancel_policy,
                telemetry,
            }),
        }
    }

    /// Returns the memoized value for `key`, computing it if nothing is cached or in flight.
    ///
    /// If another call is already computing the value, this waits for it instead of starting a
    /// second computation. If that computation is abandoned by a cancellation, this call starts
    /// over according to the [`RetryPolicy`] and may end up computing the value itself.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RetriesExhausted`](crate::ErrorKind::RetriesExhausted) when the
    /// entry was abandoned more often than the retry policy allows.
    pub async fn get(&self, key: &str) -> Result<T> {
        let value = self.inner.get(key, CallId::new(), None).await?;
        Ok(value.unwrap_or_else(|| unreachable!("a lookup without a cancellation flag is never cancelled")))
    }

    /// Like [`get`](Self::get), but gives up as soon as `cancel` completes.
    ///
    /// `cancel` is any future. Its completion means "stop waiting", which makes timers,
    /// cancellation tokens and shutdown signals all usable here. Returns `Ok(None)` when the call
    /// is cancelled, whether or not anything was in flight.
    ///
    /// The lookup runs on a background task. When this call started the computation and is
    /// cancelled, the pending entry is abandoned: it is removed from the cache and every waiter
    /// retries. The computation itself keeps running to completion and its result is discarded.
    /// Whether a cancelled waiter also abandons the entry depends on the [`CancelPolicy`].
    /// Once cancelled, the background lookup never starts a computation of its own.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::TaskFailed`](crate::ErrorKind::TaskFailed) if the background task
    /// panicked (for example because the computation panicked), and the errors of
    /// [`get`](Self::get) otherwise.
    pub async fn cancellable_get<C>(&self, key: &str, cancel: C) -> Result<Option<T>>
    where
        C: Future,
    {
        let call_id = CallId::new();
        let cancelled = Arc::new(AtomicBool::new(false));
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_owned();
        let task_cancelled = Arc::clone(&cancelled);
        let mut task = tokio::spawn(async move { inner.get(&owned_key, call_id, Some(&*task_cancelled)).await });

        tokio::select! {
            biased;
            joined = &mut task => match joined {
                Ok(result) => result,
                Err(join_error) => Err(Error::task_failed(key, join_error)),
            },
            _ = cancel => {
                self.inner.cancel(key, call_id, &cancelled);
                Ok(None)
            }
        }
    }
}

impl<T> Memo<T> {
    /// Returns the number of keys with a pending or completed entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if no key has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Returns `true` if `key` has a pending or completed entry.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    /// Returns the name used in log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.telemetry.name()
    }

    #[cfg(test)]
    fn entry(&self, key: &str) -> Option<Arc<Entry<T>>> {
        self.inner.entries.lock().get(key).map(|slot| Arc::clone(&slot.entry))
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Runs the lookup protocol for one call.
    ///
    /// Returns `Ok(None)` only when `cancelled` was set before the call got a value or published
    /// an entry of its own.
    async fn get(&self, key: &str, call_id: CallId, cancelled: Option<&AtomicBool>) -> Result<Option<T>> {
        let mut retries = 0_u32;

        loop {
            match self.lookup(key, call_id, cancelled) {
                Lookup::Hit(value) => {
                    self.telemetry.record(key, MemoEvent::Hit, call_id);
                    return Ok(Some(value));
                }
                Lookup::Originate(entry) => return Ok(Some(self.originate(key, call_id, entry).await)),
                Lookup::Wait(entry) => {
                    self.telemetry.record(key, MemoEvent::Joined, call_id);
                    if let Some(value) = entry.wait().await {
                        return Ok(Some(value));
                    }
                }
                Lookup::Cancelled => {
                    self.telemetry.record(key, MemoEvent::Withdrawn, call_id);
                    return Ok(None);
                }
            }

            retries = retries.saturating_add(1);
            if !self.retry.allows(retries) {
                self.telemetry.record(key, MemoEvent::RetriesExhausted, call_id);
                return Err(Error::retries_exhausted(key, retries));
            }

            self.telemetry.record(key, MemoEvent::Retrying, call_id);
            let backoff = self.retry.backoff(retries);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
        }
    }

    /// Finds the entry for `key`, publishing a new one if there is none.
    ///
    /// A cancelled call never publishes: the flag is read under the same lock `cancel` sets it
    /// under, so a call is either cancelled before this point or its entry is visible to `cancel`.
    fn lookup(&self, key: &str, call_id: CallId, cancelled: Option<&AtomicBool>) -> Lookup<T> {
        let mut entries = self.entries.lock();

        if cancelled.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Lookup::Cancelled;
        }

        if let Some(slot) = entries.get(key) {
            if let Some(value) = slot.entry.ready_value() {
                return Lookup::Hit(value);
            }
            if slot.entry.is_pending() {
                return Lookup::Wait(Arc::clone(&slot.entry));
            }
        }

        let entry = Arc::new(Entry::new());
        entries.insert(
            key.to_owned(),
            Slot {
                entry: Arc::clone(&entry),
                originator: call_id,
            },
        );
        Lookup::Originate(entry)
    }

    async fn originate(&self, key: &str, call_id: CallId, entry: Arc<Entry<T>>) -> T {
        let guard = OriginGuard {
            inner: self,
            key,
            call_id,
            entry: &entry,
            armed: true,
        };

        self.telemetry.record(key, MemoEvent::Computing, call_id);
        let value = (self.compute)(key.to_owned()).await;
        guard.disarm();

        if entry.complete(value.clone()) {
            self.telemetry.record(key, MemoEvent::Completed, call_id);
        } else {
            self.telemetry.record(key, MemoEvent::Discarded, call_id);
        }
        value
    }

    /// Handles cancellation of the call `call_id` waiting on `key`.
    ///
    /// Sets `cancelled` first so the call's background lookup can no longer publish an entry.
    fn cancel(&self, key: &str, call_id: CallId, cancelled: &AtomicBool) {
        let event = {
            let mut entries = self.entries.lock();
            // The map lock orders this store with the load in `lookup`.
            cancelled.store(true, Ordering::Relaxed);

            let permitted = entries
                .get(key)
                .filter(|slot| slot.entry.is_pending())
                .map(|slot| match self.cancel_policy {
                    CancelPolicy::OriginatorOnly => slot.originator == call_id,
                    CancelPolicy::AnyCaller => true,
                });

            match permitted {
                None => MemoEvent::CancelIgnored,
                Some(false) => MemoEvent::CancelDetached,
                Some(true) => {
                    if let Some(slot) = entries.remove(key) {
                        slot.entry.abandon();
                    }
                    MemoEvent::Abandoned
                }
            }
        };

        self.telemetry.record(key, event, call_id);
    }
}

impl<T> Inner<T> {
    /// Abandons `entry` and unpublishes it if it still occupies the slot for `key`.
    ///
    /// Both happen under the map lock so no caller can join the entry in between.
    fn abandon(&self, key: &str, entry: &Arc<Entry<T>>, call_id: CallId) {
        {
            let mut entries = self.entries.lock();

            if !entry.abandon() {
                return;
            }
            if entries.get(key).is_some_and(|slot| Arc::ptr_eq(&slot.entry, entry)) {
                entries.remove(key);
            }
        }

        self.telemetry.record(key, MemoEvent::Abandoned, call_id);
    }
}

/// Abandons the originator's entry if the originator goes away before publishing a value.
///
/// This covers a dropped `get` future and a panicking computation. Without it the waiters would
/// wait on an entry that can never complete.
struct OriginGuard<'a, T> {
    inner: &'a Inner<T>,
    key: &'a str,
    call_id: CallId,
    entry: &'a Arc<Entry<T>>,
    armed: bool,
}

impl<T> OriginGuard<'_, T> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for OriginGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon(self.key, self.entry, self.call_id);
        }
    }
}
