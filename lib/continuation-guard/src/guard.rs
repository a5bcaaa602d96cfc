// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! RAII guard that delivers exactly one result to a continuation.

use parking_lot::Mutex as ParkingMutex;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::config::GuardOptions;
use crate::context::DiagnosticContext;
use crate::continuation::Continuation;
use crate::descriptor::{GuardDescriptor, GuardId};
use crate::error::{ConfigError, GuardError};
use crate::fatal::{FatalHandler, escalate};
use crate::leak::LeakProbe;
use crate::policy::FatalityPolicy;
use crate::sink::{DiagnosticSink, GuardEvent};
use crate::timeout::{TimeoutTimer, TimerGeneration};

type DestructionHook = Box<dyn FnOnce() + Send>;

/// Wraps a [`Continuation`] so that it receives exactly one result.
///
/// - The first `resume` wins and is forwarded; later calls are rejected with
///   [`GuardError::AlreadyCompleted`] and reported as
///   [`GuardEvent::MultipleInvocations`].
/// - Dropping a guard that was never resumed delivers
///   [`GuardError::NeverCompleted`].
/// - With a timeout, a guard that is not resumed in time delivers
///   [`GuardError::TimedOut`]. [`keep_alive`](Self::keep_alive) restarts the
///   deadline.
/// - After completion, a leak probe reports [`GuardEvent::PotentialLeak`]
///   every leak-check interval until the guard is dropped.
///
/// The guard is `Send + Sync`; share it behind an `Arc` to resume it from
/// several threads. Destruction hooks must not capture such an `Arc`, or the
/// guard can never be dropped.
pub struct CompletionGuard<C: Continuation> {
    shared: Arc<GuardShared<C>>,
}

pub(crate) struct GuardShared<C: Continuation> {
    descriptor: Arc<GuardDescriptor>,
    policy: FatalityPolicy,
    timeout: Option<Duration>,
    leak_check_interval: Option<Duration>,
    sink: Arc<dyn DiagnosticSink>,
    fatal_handler: FatalHandler,
    runtime: Option<Handle>,
    // cancelled when the guard is dropped; observed by the leak probe
    liveness: CancellationToken,
    state: ParkingMutex<GuardState<C>>,
}

struct GuardState<C> {
    continuation: Option<C>,
    completed: bool,
    timer: Option<TimeoutTimer>,
    timer_generation: TimerGeneration,
    hooks: Vec<DestructionHook>,
}

impl<C: Continuation> CompletionGuard<C> {
    /// Guard `continuation` with [`GuardOptions::default`].
    ///
    /// Leak probing runs on the current tokio runtime, if any.
    pub fn new(continuation: C, context: DiagnosticContext) -> Self {
        let runtime = Handle::try_current().ok();
        Self::assemble(continuation, context, GuardOptions::default(), runtime)
    }

    /// Guard `continuation` with explicit options.
    ///
    /// A timeout needs a runtime, taken from `options.runtime` or the current
    /// tokio runtime. Without one, the continuation is failed with
    /// [`GuardError::NeverCompleted`] and [`ConfigError::NoRuntime`] is returned.
    pub fn with_options(
        continuation: C,
        context: DiagnosticContext,
        mut options: GuardOptions,
    ) -> Result<Self, ConfigError> {
        let runtime = options
            .runtime
            .take()
            .or_else(|| Handle::try_current().ok());

        if options.timeout.is_some() && runtime.is_none() {
            continuation.resume(Err(GuardError::NeverCompleted { context }.into()));
            return Err(ConfigError::NoRuntime);
        }

        Ok(Self::assemble(continuation, context, options, runtime))
    }

    fn assemble(
        continuation: C,
        context: DiagnosticContext,
        options: GuardOptions,
        runtime: Option<Handle>,
    ) -> Self {
        let descriptor = Arc::new(GuardDescriptor::new(std::any::type_name::<C>(), context));

        let leak_check_interval = match (options.leak_check_interval, &runtime) {
            (Some(_), None) => {
                tracing::debug!(guard = %descriptor, "no tokio runtime; leak probing disabled");
                None
            }
            (interval, _) => interval,
        };

        let shared = Arc::new(GuardShared {
            descriptor,
            policy: options.policy,
            timeout: options.timeout,
            leak_check_interval,
            sink: options.sink,
            fatal_handler: options.fatal_handler,
            runtime,
            liveness: CancellationToken::new(),
            state: ParkingMutex::new(GuardState {
                continuation: Some(continuation),
                completed: false,
                timer: None,
                timer_generation: 0,
                hooks: Vec::new(),
            }),
        });

        {
            let mut state = shared.state.lock();
            shared.arm_timeout(&mut state);
        }

        tracing::trace!(
            guard = %shared.descriptor,
            policy = %shared.policy,
            timeout = ?shared.timeout,
            leak_check_interval = ?shared.leak_check_interval,
            "continuation guard created"
        );

        Self { shared }
    }

    /// Deliver a success value.
    pub fn resume_ok(&self, value: C::Output) -> Result<(), GuardError> {
        self.resume(Ok(value))
    }

    /// Deliver a failure.
    pub fn resume_err(&self, error: C::Error) -> Result<(), GuardError> {
        self.resume(Err(error))
    }

    /// Deliver `result` if the guard has not completed yet.
    ///
    /// Returns [`GuardError::AlreadyCompleted`] without touching the
    /// continuation when another `resume`, the timeout, or nothing at all
    /// got there first.
    pub fn resume(&self, result: Result<C::Output, C::Error>) -> Result<(), GuardError> {
        let Some(continuation) = self.shared.claim() else {
            return Err(self.shared.reject_resume());
        };

        tracing::trace!(guard = %self.shared.descriptor, "continuation resumed");
        continuation.resume(result);
        self.shared.start_leak_probe();
        Ok(())
    }

    /// Restart the timeout, counting the full interval from now.
    ///
    /// No-op without a timeout or once the guard has completed.
    pub fn keep_alive(&self) {
        if self.shared.timeout.is_none() {
            return;
        }
        let mut state = self.shared.state.lock();
        if state.completed {
            return;
        }
        self.shared.arm_timeout(&mut state);
        tracing::trace!(
            guard = %self.shared.descriptor,
            generation = state.timer_generation,
            "continuation guard kept alive"
        );
    }

    /// Run `hook` when the guard is dropped, after any synthetic failure
    /// has been delivered. Hooks run once, in registration order.
    pub fn on_destruction(&self, hook: impl FnOnce() + Send + 'static) {
        self.shared.state.lock().hooks.push(Box::new(hook));
    }

    pub fn is_completed(&self) -> bool {
        self.shared.state.lock().completed
    }

    pub fn id(&self) -> GuardId {
        self.shared.descriptor.id()
    }

    pub fn descriptor(&self) -> &Arc<GuardDescriptor> {
        &self.shared.descriptor
    }

    pub fn context(&self) -> &DiagnosticContext {
        self.shared.descriptor.context()
    }

    pub fn policy(&self) -> FatalityPolicy {
        self.shared.policy
    }
}

impl<C: Continuation> GuardShared<C> {
    /// Complete the guard, returning the continuation to the single winner.
    fn claim(&self) -> Option<C> {
        let mut state = self.state.lock();
        if state.completed {
            return None;
        }
        state.completed = true;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        state.continuation.take()
    }

    fn reject_resume(&self) -> GuardError {
        let violation = GuardError::AlreadyCompleted {
            context: self.descriptor.context().clone(),
        };
        self.sink
            .emit(GuardEvent::MultipleInvocations(Arc::clone(&self.descriptor)));
        if self.policy.on_double_resume() {
            escalate(&self.fatal_handler, &self.descriptor, &violation);
        }
        violation
    }

    /// Replace the armed timeout monitor, if a timeout is configured.
    ///
    /// Runs under the state lock so that at most one monitor holds the
    /// current generation.
    fn arm_timeout(self: &Arc<Self>, state: &mut GuardState<C>) {
        let (Some(interval), Some(runtime)) = (self.timeout, &self.runtime) else {
            return;
        };
        if let Some(previous) = state.timer.take() {
            previous.cancel();
        }
        state.timer_generation += 1;
        state.timer = Some(TimeoutTimer::arm(
            runtime,
            Arc::downgrade(self),
            state.timer_generation,
            interval,
        ));
    }

    /// Called by the timeout monitor of `generation` once its deadline passed.
    pub(crate) fn expire(&self, generation: TimerGeneration) {
        let continuation = {
            let mut state = self.state.lock();
            let current = state.timer.as_ref().map(TimeoutTimer::generation);
            if state.completed || current != Some(generation) {
                return;
            }
            state.completed = true;
            state.timer = None;
            state.continuation.take()
        };

        let violation = GuardError::TimedOut {
            context: self.descriptor.context().clone(),
        };
        if let Some(continuation) = continuation {
            continuation.resume(Err(violation.clone().into()));
        }
        self.sink
            .emit(GuardEvent::TimedOut(Arc::clone(&self.descriptor)));
        self.start_leak_probe();

        if self.policy.on_timeout() {
            escalate(&self.fatal_handler, &self.descriptor, &violation);
        }
    }

    fn start_leak_probe(&self) {
        let (Some(interval), Some(runtime)) = (self.leak_check_interval, &self.runtime) else {
            return;
        };
        LeakProbe {
            guard: Arc::clone(&self.descriptor),
            interval,
            liveness: self.liveness.clone(),
            sink: Arc::clone(&self.sink),
            policy: self.policy,
            fatal_handler: Arc::clone(&self.fatal_handler),
        }
        .spawn(runtime);
    }

    /// Runs exactly once, from the guard's `Drop`.
    fn finalize(&self) {
        let (continuation, hooks) = {
            let mut state = self.state.lock();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            let continuation = if state.completed {
                None
            } else {
                state.completed = true;
                state.continuation.take()
            };
            (continuation, std::mem::take(&mut state.hooks))
        };
        self.liveness.cancel();

        if let Some(continuation) = continuation {
            let violation = GuardError::NeverCompleted {
                context: self.descriptor.context().clone(),
            };
            tracing::warn!(
                guard = %self.descriptor,
                "continuation guard dropped without being resumed; delivering failure"
            );
            continuation.resume(Err(violation.clone().into()));
            if self.policy.on_never_completed() {
                escalate(&self.fatal_handler, &self.descriptor, &violation);
            }
        }

        for hook in hooks {
            hook();
        }
        tracing::trace!(guard = %self.descriptor, "continuation guard finalized");
    }
}

impl<C: Continuation> Drop for CompletionGuard<C> {
    fn drop(&mut self) {
        self.shared.finalize();
    }
}

impl<C: Continuation> Display for CompletionGuard<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.shared.descriptor, f)
    }
}

impl<C: Continuation> Debug for CompletionGuard<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionGuard")
            .field("descriptor", &self.shared.descriptor)
            .field("policy", &self.shared.policy)
            .field("completed", &self.is_completed())
            .finish()
    }
}
