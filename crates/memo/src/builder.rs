// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring a [`Memo`].

use std::fmt;

use crate::Memo;
use crate::memo::ComputeFn;
use crate::policy::{CancelPolicy, RetryPolicy};
use crate::telemetry::Telemetry;

const DEFAULT_NAME: &str = "memo";

/// Builder for constructing a [`Memo`].
///
/// Created by calling [`Memo::builder()`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use memo::{CancelPolicy, Memo, RetryPolicy};
///
/// let memo = Memo::builder(|key: String| async move { key.to_uppercase() })
///     .name("shouting")
///     .retry_policy(RetryPolicy::default().with_max_retries(10))
///     .cancel_policy(CancelPolicy::AnyCaller)
///     .build();
///
/// assert_eq!(memo.name(), "shouting");
/// ```
pub struct MemoBuilder<T> {
    compute: Box<ComputeFn<T>>,
    name: &'static str,
    retry: RetryPolicy,
    cancel_policy: CancelPolicy,
    logging: bool,
}

impl<T> fmt::Debug for MemoBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoBuilder")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("cancel_policy", &self.cancel_policy)
            .field("logging", &self.logging)
            .finish_non_exhaustive()
    }
}

impl<T> MemoBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(compute: Box<ComputeFn<T>>) -> Self {
        Self {
            compute,
            name: DEFAULT_NAME,
            retry: RetryPolicy::default(),
            cancel_policy: CancelPolicy::default(),
            logging: true,
        }
    }

    /// Sets the name reported in log events. Defaults to `"memo"`.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Sets how waiters retry after their entry is abandoned.
    #[must_use]
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets which cancelled calls may abandon a shared computation.
    #[must_use]
    pub fn cancel_policy(mut self, cancel_policy: CancelPolicy) -> Self {
        self.cancel_policy = cancel_policy;
        self
    }

    /// Enables or disables `tracing` events. Enabled by default.
    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Builds the cache.
    #[must_use]
    pub fn build(self) -> Memo<T> {
        Memo::from_parts(
            self.compute,
            self.retry,
            self.cancel_policy,
            Telemetry::new(self.name, self.logging),
        )
    }
}
