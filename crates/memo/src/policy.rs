// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry and cancellation policies.

use std::time::Duration;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Controls how a waiter reacts when the entry it waits on is abandoned.
///
/// A waiter whose entry is abandoned goes back to the start of the lookup, where it either joins
/// a newer attempt or becomes the originator of one. Consecutive retries back off exponentially,
/// starting at the initial backoff and doubling up to the maximum.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memo::RetryPolicy;
///
/// let policy = RetryPolicy::default()
///     .with_max_retries(5)
///     .with_backoff(Duration::from_millis(10), Duration::from_secs(1));
///
/// assert_eq!(policy.max_retries(), Some(5));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: Option<u32>,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Retries without limit and without waiting between attempts.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            max_retries: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Caps the number of retries after abandonment. Once exceeded, the lookup fails with
    /// [`ErrorKind::RetriesExhausted`](crate::ErrorKind::RetriesExhausted).
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the delay before the first retry and the upper bound for later ones.
    #[must_use]
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Returns the retry cap, or `None` when retries are unbounded.
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Whether the `retry`-th retry (1-based) may proceed.
    pub(crate) fn allows(&self, retry: u32) -> bool {
        self.max_retries.is_none_or(|max| retry <= max)
    }

    /// Delay before the `retry`-th retry (1-based).
    pub(crate) fn backoff(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Decides which cancelled calls may abandon a shared computation.
///
/// Abandoning drops the pending entry for the key and wakes every waiter so it retries from
/// scratch. The computation itself keeps running and its result is discarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum CancelPolicy {
    /// Only the call that started the computation can abandon it. A cancelled waiter simply stops
    /// waiting and leaves the computation to the others.
    #[default]
    OriginatorOnly,

    /// Any cancelled call abandons whatever computation is pending for its key, even one it only
    /// waited on.
    AnyCaller,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), None);
        assert!(policy.allows(u32::MAX));
    }

    #[test]
    fn max_retries_is_inclusive() {
        let policy = RetryPolicy::immediate().with_max_retries(2);
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let policy = RetryPolicy::default().with_backoff(Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(40));
        assert_eq!(policy.backoff(4), Duration::from_millis(50));
        assert_eq!(policy.backoff(200), Duration::from_millis(50));
    }

    #[test]
    fn max_backoff_never_below_initial() {
        let policy = RetryPolicy::default().with_backoff(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
    }

    #[test]
    fn immediate_never_waits() {
        let policy = RetryPolicy::immediate();
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(40), Duration::ZERO);
    }

    #[test]
    fn cancel_policy_defaults_to_originator_only() {
        assert_eq!(CancelPolicy::default(), CancelPolicy::OriginatorOnly);
    }
}
