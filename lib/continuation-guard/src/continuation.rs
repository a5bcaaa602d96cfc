// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! The one-shot primitive wrapped by a guard.

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use tokio::sync::oneshot;

use crate::error::GuardError;

/// A one-shot handle that delivers a single result to a waiter.
///
/// `resume` consumes the handle, so a single instance can never be resumed
/// twice. The guard relies on that and additionally ensures that the handle
/// is resumed at all, with a synthetic [`GuardError`] when nobody else did.
pub trait Continuation: Send + 'static {
    /// Success value delivered to the waiter.
    type Output: Send + 'static;

    /// Failure value delivered to the waiter. Must be able to carry the
    /// synthetic failures produced by the guard.
    type Error: From<GuardError> + Send + 'static;

    /// Deliver `result` to the waiter.
    fn resume(self, result: Result<Self::Output, Self::Error>);
}

impl<T, E> Continuation for oneshot::Sender<Result<T, E>>
where
    T: Send + 'static,
    E: From<GuardError> + Send + 'static,
{
    type Output = T;
    type Error = E;

    fn resume(self, result: Result<T, E>) {
        if self.send(result).is_err() {
            tracing::debug!("continuation receiver dropped before the result was delivered");
        }
    }
}

/// Adapts a callback into a [`Continuation`].
///
/// Created with [`callback`].
pub struct Callback<F, T, E> {
    f: F,
    _result: PhantomData<fn(Result<T, E>)>,
}

/// Wrap `f` so it can be guarded; `f` runs exactly once with the result.
pub fn callback<F, T, E>(f: F) -> Callback<F, T, E>
where
    F: FnOnce(Result<T, E>) + Send + 'static,
{
    Callback {
        f,
        _result: PhantomData,
    }
}

impl<F, T, E> Continuation for Callback<F, T, E>
where
    F: FnOnce(Result<T, E>) + Send + 'static,
    T: Send + 'static,
    E: From<GuardError> + Send + 'static,
{
    type Output = T;
    type Error = E;

    fn resume(self, result: Result<T, E>) {
        (self.f)(result)
    }
}

impl<F, T, E> Debug for Callback<F, T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}
