// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Timeout monitor: fails a guard that is not resumed within its interval.
//!
//! At most one monitor per guard is armed at a time. Every arm bumps the
//! guard's timer generation under the guard lock; a monitor that wakes up
//! with a stale generation, or after its token was cancelled, does nothing.

use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::continuation::Continuation;
use crate::guard::GuardShared;

/// Deadlines that overflow `Instant` are clamped to roughly thirty years out.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + interval`, saturating at a far-future instant.
pub(crate) fn deadline_after(start: Instant, interval: Duration) -> Instant {
    start
        .checked_add(interval)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Generation counter distinguishing successive timeout monitors of one guard.
pub(crate) type TimerGeneration = u64;

/// Owner-side handle to an armed timeout monitor.
pub(crate) struct TimeoutTimer {
    generation: TimerGeneration,
    cancel: CancellationToken,
}

impl TimeoutTimer {
    /// Spawn a monitor that calls [`GuardShared::expire`] once `interval`
    /// has elapsed, counted from now.
    ///
    /// The task only holds a weak reference and never keeps the guard alive.
    pub(crate) fn arm<C: Continuation>(
        runtime: &Handle,
        guard: Weak<GuardShared<C>>,
        generation: TimerGeneration,
        interval: Duration,
    ) -> Self {
        let deadline = deadline_after(Instant::now(), interval);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => {}
            }
            if token.is_cancelled() {
                return;
            }
            if let Some(guard) = guard.upgrade() {
                guard.expire(generation);
            }
        });

        Self { generation, cancel }
    }

    pub(crate) fn generation(&self) -> TimerGeneration {
        self.generation
    }

    /// Best-effort: a monitor already past its cancellation check is
    /// rejected by the generation check instead.
    pub(crate) fn cancel(self) {
        self.cancel.cancel();
    }
}
