// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-violation escalation flags.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::{BitOr, BitOrAssign};

/// Selects which guard violations abort the process instead of being reported.
///
/// Every flag is independent. The default, [`FatalityPolicy::NONE`], reports
/// all violations and continues.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FatalityPolicy(u8);

impl FatalityPolicy {
    /// The guard was dropped without ever being resumed.
    pub const ON_NEVER_COMPLETED: Self = Self(1 << 0);
    /// `resume` was called on an already completed guard.
    pub const ON_DOUBLE_RESUME: Self = Self(1 << 1);
    /// The guard stayed alive for at least one leak-check interval after completion.
    pub const ON_UNRELEASED_AFTER_COMPLETION: Self = Self(1 << 2);
    /// The timeout fired before the guard was resumed.
    pub const ON_TIMEOUT: Self = Self(1 << 3);

    /// No violation is fatal.
    pub const NONE: Self = Self(0);
    /// Every violation is fatal.
    pub const ALL: Self = Self(
        Self::ON_NEVER_COMPLETED.0
            | Self::ON_DOUBLE_RESUME.0
            | Self::ON_UNRELEASED_AFTER_COMPLETION.0
            | Self::ON_TIMEOUT.0,
    );

    /// All-or-nothing shorthand: `true` is [`ALL`](Self::ALL), `false` is [`NONE`](Self::NONE).
    pub const fn from_bool(fatal: bool) -> Self {
        if fatal { Self::ALL } else { Self::NONE }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build a policy from raw bits, dropping unknown bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Set or clear `flag` depending on `enabled`.
    pub fn set(&mut self, flag: Self, enabled: bool) {
        if enabled {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }

    pub const fn on_never_completed(self) -> bool {
        self.contains(Self::ON_NEVER_COMPLETED)
    }

    pub const fn on_double_resume(self) -> bool {
        self.contains(Self::ON_DOUBLE_RESUME)
    }

    pub const fn on_unreleased_after_completion(self) -> bool {
        self.contains(Self::ON_UNRELEASED_AFTER_COMPLETION)
    }

    pub const fn on_timeout(self) -> bool {
        self.contains(Self::ON_TIMEOUT)
    }
}

impl BitOr for FatalityPolicy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for FatalityPolicy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl Display for FatalityPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        const NAMES: [(FatalityPolicy, &str); 4] = [
            (FatalityPolicy::ON_NEVER_COMPLETED, "never_completed"),
            (FatalityPolicy::ON_DOUBLE_RESUME, "double_resume"),
            (
                FatalityPolicy::ON_UNRELEASED_AFTER_COMPLETION,
                "unreleased_after_completion",
            ),
            (FatalityPolicy::ON_TIMEOUT, "timeout"),
        ];

        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
