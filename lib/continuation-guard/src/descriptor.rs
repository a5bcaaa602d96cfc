// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Guard identity shared with diagnostic events.

use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::DiagnosticContext;

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a guard.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuardId(u64);

impl GuardId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for GuardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Everything a diagnostic consumer needs to identify the emitting guard.
///
/// Descriptors outlive their guard: events and leak probes hold them after
/// the guard itself has been dropped.
#[derive(Clone, Debug)]
pub struct GuardDescriptor {
    id: GuardId,
    wrapped_type: &'static str,
    context: DiagnosticContext,
}

impl GuardDescriptor {
    pub(crate) fn new(wrapped_type: &'static str, context: DiagnosticContext) -> Self {
        Self {
            id: GuardId::next(),
            wrapped_type,
            context,
        }
    }

    pub fn id(&self) -> GuardId {
        self.id
    }

    /// Type name of the wrapped continuation.
    pub fn wrapped_type(&self) -> &'static str {
        self.wrapped_type
    }

    pub fn context(&self) -> &DiagnosticContext {
        &self.context
    }
}

impl Display for GuardDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Guard({}) ({}): {}",
            self.id, self.wrapped_type, self.context
        )
    }
}
