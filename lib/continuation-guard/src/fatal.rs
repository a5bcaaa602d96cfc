// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Escalation of violations selected by the [`FatalityPolicy`](crate::FatalityPolicy).

use std::backtrace::Backtrace;
use std::sync::Arc;

use crate::descriptor::GuardDescriptor;
use crate::error::GuardError;

/// Invoked for every violation whose policy flag is set.
///
/// The default handler aborts the process. A custom handler that returns
/// lets the guard carry on as if the violation had only been reported.
pub type FatalHandler = Arc<dyn Fn(&GuardError) + Send + Sync>;

/// Log the violation with a backtrace and abort the process.
///
/// Aborts rather than panics so the guarantee holds under both
/// `panic = "abort"` and `panic = "unwind"`, and so it is safe to reach from
/// `Drop`.
pub fn abort_on_violation(violation: &GuardError) {
    eprintln!("fatal continuation guard violation: {violation}");
    eprintln!("backtrace:\n{}", Backtrace::force_capture());
    std::process::abort();
}

pub(crate) fn default_fatal_handler() -> FatalHandler {
    Arc::new(abort_on_violation)
}

pub(crate) fn escalate(handler: &FatalHandler, guard: &GuardDescriptor, violation: &GuardError) {
    tracing::error!(guard = %guard, error = %violation, "escalating continuation guard violation");
    handler(violation);
}
