// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Errors raised by the cache itself.

use std::fmt;

/// The reason a lookup failed inside the cache.
///
/// Failures of the computation are never reported through this type. They are part of the
/// computed value and are handed to every caller as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The entry for the key was abandoned more times than the retry policy allows.
    RetriesExhausted,

    /// The background task driving a cancellable lookup panicked or was shut down.
    TaskFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RetriesExhausted => "retries exhausted",
            Self::TaskFailed => "background task failed",
        })
    }
}

/// An error from a cache lookup.
///
/// # Example
///
/// ```
/// use memo::{ErrorKind, Memo};
///
/// # async fn example(memo: Memo<String>) {
/// match memo.get("key").await {
///     Ok(value) => println!("{value}"),
///     Err(e) if e.kind() == ErrorKind::RetriesExhausted => eprintln!("gave up on {}", e.key()),
///     Err(e) => eprintln!("{e}"),
/// }
/// # }
/// ```
#[ohno::error]
#[display("lookup of key '{key}' failed: {kind}")]
pub struct Error {
    kind: ErrorKind,
    key: String,
}

impl Error {
    /// Returns what went wrong.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the key that was being looked up.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn retries_exhausted(key: &str, retries: u32) -> Self {
        Self::caused_by(ErrorKind::RetriesExhausted, key, format!("entry abandoned {retries} times"))
    }

    pub(crate) fn task_failed(key: &str, cause: tokio::task::JoinError) -> Self {
        Self::caused_by(ErrorKind::TaskFailed, key, cause)
    }
}

/// A specialized [`Result`] type for cache lookups.
pub type Result<T> = std::result::Result<T, Error>;
