// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for the entry lifecycle.

use crate::call_id::CallId;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Severity {
    Debug,
    Info,
}

/// Something that happened to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MemoEvent {
    /// The value was already cached.
    Hit,
    /// The call found a pending computation and waited on it.
    Joined,
    /// The call became the originator and started the computation.
    Computing,
    /// The originator published its value.
    Completed,
    /// The computation finished after its entry was abandoned, so its value was dropped.
    Discarded,
    /// The pending entry was torn down and its waiters told to retry.
    Abandoned,
    /// A waiter saw its entry abandoned and is starting over.
    Retrying,
    /// A waiter saw its entry abandoned too many times.
    RetriesExhausted,
    /// A call was cancelled while nothing was pending for its key.
    CancelIgnored,
    /// A waiter was cancelled and left the shared computation running.
    CancelDetached,
    /// The background lookup of a cancelled call stopped without computing.
    Withdrawn,
}

impl MemoEvent {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Joined => "joined",
            Self::Computing => "computing",
            Self::Completed => "completed",
            Self::Discarded => "discarded",
            Self::Abandoned => "abandoned",
            Self::Retrying => "retrying",
            Self::RetriesExhausted => "retries_exhausted",
            Self::CancelIgnored => "cancel_ignored",
            Self::CancelDetached => "cancel_detached",
            Self::Withdrawn => "withdrawn",
        }
    }

    const fn severity(self) -> Severity {
        match self {
            Self::Abandoned | Self::Discarded | Self::RetriesExhausted => Severity::Info,
            Self::Hit
            | Self::Joined
            | Self::Computing
            | Self::Completed
            | Self::Retrying
            | Self::CancelIgnored
            | Self::CancelDetached
            | Self::Withdrawn => Severity::Debug,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Telemetry {
    name: &'static str,
    enabled: bool,
}

impl Telemetry {
    pub(crate) const fn new(name: &'static str, enabled: bool) -> Self {
        Self { name, enabled }
    }

    pub(crate) const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn record(&self, key: &str, event: MemoEvent, call_id: CallId) {
        if self.enabled {
            Self::emit(self.name, key, event, call_id);
        }
    }

    fn emit(name: &'static str, key: &str, event: MemoEvent, call_id: CallId) {
        let ev = event.as_str();

        // Tracing levels are part of the callsite metadata, so each level needs its own callsite.
        // Field names must match the constants in `fields`.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    memo.name = name,
                    memo.key = key,
                    memo.event = ev,
                    memo.call_id = %call_id,
                    "memo.event"
                )
            };
        }

        match event.severity() {
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}
