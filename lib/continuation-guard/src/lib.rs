// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Misuse-hardened one-shot continuations.
//!
//! A [`CompletionGuard`] owns a [`Continuation`] (for example a
//! `tokio::sync::oneshot::Sender`) and guarantees that the waiter on the
//! other side receives exactly one result:
//!
//! - concurrent `resume` calls are serialized; only the first is forwarded,
//!   the rest are reported as [`GuardEvent::MultipleInvocations`];
//! - dropping an unresumed guard delivers [`GuardError::NeverCompleted`];
//! - an optional timeout delivers [`GuardError::TimedOut`] unless the guard
//!   is resumed or kept alive in time;
//! - after completion, a leak probe reports [`GuardEvent::PotentialLeak`]
//!   until the guard is dropped.
//!
//! Each violation can be escalated to a process abort through the
//! [`FatalityPolicy`]. Diagnostics go to an injected [`DiagnosticSink`];
//! the default [`TracingSink`] writes them to `tracing`.
//!
//! ```rust
//! use dynamo_continuation_guard::{CompletionGuard, GuardError, diagnostic_context};
//! use tokio::sync::oneshot;
//!
//! let (tx, mut rx) = oneshot::channel::<Result<u32, GuardError>>();
//! let guard = CompletionGuard::new(tx, diagnostic_context!());
//!
//! guard.resume_ok(1).unwrap();
//! assert!(guard.resume_ok(2).unwrap_err().is_already_completed());
//! assert_eq!(rx.try_recv().unwrap().unwrap(), 1);
//! ```

mod bridge;
pub mod config;
pub mod context;
pub mod continuation;
mod descriptor;
mod error;
mod fatal;
mod guard;
mod leak;
mod policy;
mod sink;
mod timeout;

// ── Re-exports ───────────────────────────────────────────────────────

pub use bridge::{GuardedSender, with_guarded_continuation};
pub use config::{
    DEFAULT_LEAK_CHECK_INTERVAL, FatalSettings, GuardOptions, GuardOptionsBuilder,
    GuardOptionsBuilderError, GuardSettings,
};
pub use context::{CorrelationToken, DiagnosticContext};
pub use continuation::{Callback, Continuation, callback};
pub use descriptor::{GuardDescriptor, GuardId};
pub use error::{ConfigError, GuardError, Result};
pub use fatal::{FatalHandler, abort_on_violation};
pub use guard::CompletionGuard;
pub use policy::FatalityPolicy;
pub use sink::{BroadcastSink, DiagnosticSink, GuardEvent, GuardEventKind, TracingSink};
