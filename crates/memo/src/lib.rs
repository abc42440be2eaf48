// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Concurrent memoization with single-flight computation and cancellable lookups.
//!
//! [`Memo`] wraps an expensive, possibly I/O-bound computation keyed by a string. For any key the
//! computation runs at most once at a time: the first caller (the "originator") runs it, and
//! every concurrent caller for the same key (a "waiter") shares that one result. Results are
//! cached for the lifetime of the `Memo`.
//!
//! # Example
//!
//! ```
//! use memo::Memo;
//!
//! # async fn example() -> memo::Result<()> {
//! let memo = Memo::new(|url: String| async move {
//!     // Fetch `url`...
//!     Ok::<_, String>(format!("body of {url}"))
//! });
//!
//! // Concurrent calls for the same key share a single fetch.
//! let (a, b) = tokio::join!(memo.get("https://example.com"), memo.get("https://example.com"));
//! assert_eq!(a?, b?);
//! # Ok(())
//! # }
//! ```
//!
//! # Cancellation
//!
//! [`Memo::cancellable_get`] races the lookup against any future acting as a cancellation signal:
//!
//! ```
//! use std::time::Duration;
//! use memo::Memo;
//!
//! # async fn example(memo: Memo<String>) -> memo::Result<()> {
//! match memo.cancellable_get("slow", tokio::time::sleep(Duration::from_secs(1))).await? {
//!     Some(value) => println!("got {value}"),
//!     None => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! When the cancelled call is the one that started the computation, the pending entry is
//! abandoned: it is removed from the cache and every waiter retries from scratch, one of them
//! becoming the new originator. The abandoned computation is not interrupted; it runs to
//! completion in the background and its result is discarded. The [`CancelPolicy`] decides
//! whether cancelled waiters may abandon the entry as well, and the [`RetryPolicy`] decides how
//! waiters retry.
//!
//! # Errors
//!
//! Failures of the computation are values like any other: compute a `Result<V, E>` and the cache
//! stores and returns it unchanged, `Err` included, without retrying. The cache's own
//! [`Error`] only reports exhausted retries and failed background tasks.
//!
//! # Thread Safety
//!
//! [`Memo`] is `Send`, `Sync` and cheaply cloneable. The entry map is guarded by a lock that is
//! never held while waiting or computing.

mod builder;
mod call_id;
mod entry;
mod error;
mod memo;
mod policy;
mod telemetry;
#[cfg(test)]
mod testing;

#[doc(inline)]
pub use builder::MemoBuilder;
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use memo::Memo;
#[doc(inline)]
pub use policy::{CancelPolicy, RetryPolicy};
