// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use thiserror::Error;
use validator::ValidationErrors;

use crate::config::GuardOptionsBuilderError;
use crate::context::DiagnosticContext;

/// Misuse detected by a [`CompletionGuard`](crate::CompletionGuard).
///
/// `NeverCompleted` and `TimedOut` are delivered to the wrapped continuation
/// as synthetic failures. `AlreadyCompleted` is returned to the caller of a
/// rejected `resume`, and `CompletedButUnreleased` only reaches the fatal
/// handler.
#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error("continuation already completed ({context})")]
    AlreadyCompleted { context: DiagnosticContext },

    #[error("continuation dropped without being resumed ({context})")]
    NeverCompleted { context: DiagnosticContext },

    #[error("continuation still referenced {elapsed:?} after completion ({context})")]
    CompletedButUnreleased {
        context: DiagnosticContext,
        elapsed: Duration,
    },

    #[error("continuation timed out before being resumed ({context})")]
    TimedOut { context: DiagnosticContext },
}

impl GuardError {
    pub fn context(&self) -> &DiagnosticContext {
        match self {
            Self::AlreadyCompleted { context }
            | Self::NeverCompleted { context }
            | Self::CompletedButUnreleased { context, .. }
            | Self::TimedOut { context } => context,
        }
    }

    pub fn is_already_completed(&self) -> bool {
        matches!(self, Self::AlreadyCompleted { .. })
    }

    pub fn is_never_completed(&self) -> bool {
        matches!(self, Self::NeverCompleted { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Errors raised while building guard options or loading guard settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid guard options: {0}")]
    Builder(#[from] GuardOptionsBuilderError),

    #[error("A timeout requires a tokio runtime; none was provided or running")]
    NoRuntime,
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
