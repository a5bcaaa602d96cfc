// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Await the result of a callback-style operation through a guard.

use tokio::sync::oneshot;

use crate::config::GuardOptions;
use crate::context::DiagnosticContext;
use crate::error::{ConfigError, GuardError};
use crate::guard::CompletionGuard;

/// Guard type handed to the body of [`with_guarded_continuation`].
pub type GuardedSender<T, E> = CompletionGuard<oneshot::Sender<Result<T, E>>>;

/// Run `body` with a fresh guard and wait for the single result it delivers.
///
/// `body` typically hands the guard to a callback-based API and returns
/// immediately. The future resolves with whatever the guard delivers first:
/// the value passed to `resume`, a `TimedOut` failure, or a
/// `NeverCompleted` failure if the guard is dropped unresumed.
///
/// ```rust
/// # use dynamo_continuation_guard::{diagnostic_context, with_guarded_continuation, GuardOptions};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> anyhow::Result<()> {
/// let value = with_guarded_continuation::<u32, anyhow::Error, _>(
///     diagnostic_context!(),
///     GuardOptions::default(),
///     |guard| {
///         std::thread::spawn(move || {
///             let _ = guard.resume_ok(42);
///         });
///     },
/// )
/// .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_guarded_continuation<T, E, F>(
    context: DiagnosticContext,
    options: GuardOptions,
    body: F,
) -> Result<T, E>
where
    T: Send + 'static,
    E: From<GuardError> + From<ConfigError> + Send + 'static,
    F: FnOnce(GuardedSender<T, E>),
{
    let (tx, rx) = oneshot::channel();
    let guard = CompletionGuard::with_options(tx, context.clone(), options)?;
    body(guard);

    match rx.await {
        Ok(result) => result,
        // the guard always delivers before it is dropped
        Err(_) => Err(GuardError::NeverCompleted { context }.into()),
    }
}
