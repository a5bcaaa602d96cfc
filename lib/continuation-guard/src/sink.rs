// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic events and the sinks that receive them.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::descriptor::GuardDescriptor;

const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Discriminant of a [`GuardEvent`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum GuardEventKind {
    MultipleInvocations,
    PotentialLeak,
    TimedOut,
}

/// Diagnostic emitted by a guard.
#[derive(Clone, Debug)]
pub enum GuardEvent {
    /// `resume` was called after the guard had already completed.
    MultipleInvocations(Arc<GuardDescriptor>),
    /// The guard is still alive `elapsed` after it completed.
    PotentialLeak {
        guard: Arc<GuardDescriptor>,
        elapsed: Duration,
    },
    /// The timeout fired and the continuation was failed.
    TimedOut(Arc<GuardDescriptor>),
}

impl GuardEvent {
    pub fn kind(&self) -> GuardEventKind {
        match self {
            Self::MultipleInvocations(_) => GuardEventKind::MultipleInvocations,
            Self::PotentialLeak { .. } => GuardEventKind::PotentialLeak,
            Self::TimedOut(_) => GuardEventKind::TimedOut,
        }
    }

    pub fn descriptor(&self) -> &Arc<GuardDescriptor> {
        match self {
            Self::MultipleInvocations(guard)
            | Self::PotentialLeak { guard, .. }
            | Self::TimedOut(guard) => guard,
        }
    }
}

impl Display for GuardEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleInvocations(guard) => write!(f, "MultipleInvocations: {}", guard),
            Self::PotentialLeak { guard, elapsed } => {
                write!(f, "PotentialLeak after {:?}: {}", elapsed, guard)
            }
            Self::TimedOut(guard) => write!(f, "TimedOut: {}", guard),
        }
    }
}

/// Fire-and-forget receiver of guard diagnostics.
///
/// `emit` is called outside the guard lock but may run on a timer task, so
/// it must not block.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: GuardEvent);
}

impl<F> DiagnosticSink for F
where
    F: Fn(GuardEvent) + Send + Sync,
{
    fn emit(&self, event: GuardEvent) {
        self(event)
    }
}

/// Default sink: writes every event to the `tracing` stream at `warn` level.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: GuardEvent) {
        match &event {
            GuardEvent::MultipleInvocations(guard) => {
                tracing::warn!(guard = %guard, "continuation resumed more than once");
            }
            GuardEvent::PotentialLeak { guard, elapsed } => {
                tracing::warn!(
                    guard = %guard,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "continuation guard still alive after completion; potential leak"
                );
            }
            GuardEvent::TimedOut(guard) => {
                tracing::warn!(guard = %guard, "continuation timed out");
            }
        }
    }
}

/// Sink that fans events out to any number of subscribers.
///
/// Events emitted while nobody is subscribed are dropped. Slow subscribers
/// observe `RecvError::Lagged` once the channel capacity is exceeded.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    tx: broadcast::Sender<GuardEvent>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GuardEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for BroadcastSink {
    fn emit(&self, event: GuardEvent) {
        // no subscribers is not an error
        let _ = self.tx.send(event);
    }
}

pub(crate) fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}
