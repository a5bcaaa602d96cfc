// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Leak detector: reports guards that stay alive after completing.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::descriptor::GuardDescriptor;
use crate::error::GuardError;
use crate::fatal::{FatalHandler, escalate};
use crate::policy::FatalityPolicy;
use crate::sink::{DiagnosticSink, GuardEvent};
use crate::timeout::deadline_after;

/// Recurring probe started once a guard completes.
///
/// The probe holds no reference to the guard. It observes the guard's
/// liveness token, which the guard cancels when it is dropped.
pub(crate) struct LeakProbe {
    pub(crate) guard: Arc<GuardDescriptor>,
    pub(crate) interval: Duration,
    pub(crate) liveness: CancellationToken,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
    pub(crate) policy: FatalityPolicy,
    pub(crate) fatal_handler: FatalHandler,
}

impl LeakProbe {
    pub(crate) fn spawn(self, runtime: &Handle) {
        if self.liveness.is_cancelled() {
            return;
        }
        runtime.spawn(self.run());
    }

    async fn run(self) {
        let started = Instant::now();
        let mut iteration: u32 = 1;

        loop {
            let elapsed = self.interval.saturating_mul(iteration);
            tokio::select! {
                biased;
                _ = self.liveness.cancelled() => {
                    tracing::trace!(guard = %self.guard, iteration, "guard released; leak probe stopped");
                    return;
                }
                _ = tokio::time::sleep_until(deadline_after(started, elapsed)) => {}
            }
            if self.liveness.is_cancelled() {
                return;
            }

            self.report(elapsed);
            iteration = iteration.saturating_add(1);
        }
    }

    fn report(&self, elapsed: Duration) {
        self.sink.emit(GuardEvent::PotentialLeak {
            guard: Arc::clone(&self.guard),
            elapsed,
        });

        if self.policy.on_unreleased_after_completion() {
            let violation = GuardError::CompletedButUnreleased {
                context: self.guard.context().clone(),
                elapsed,
            };
            escalate(&self.fatal_handler, &self.guard, &violation);
        }
    }
}
