// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use uuid::Uuid;

/// Opaque token identifying one logical call into the cache.
///
/// The entry map records the token of the call that originated each computation, which lets a
/// cancelling call tell whether it owns the work or merely waits on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CallId(Uuid);

impl CallId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.simple(), f)
    }
}
