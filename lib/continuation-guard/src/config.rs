// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Guard configuration.
//!
//! [`GuardOptions`] is what a guard is built with. It is assembled with
//! [`GuardOptionsBuilder`], either directly in code or from
//! [`GuardSettings`], which are loaded from (lowest to highest priority):
//! 1. Code defaults.
//! 2. A TOML file named by `CONTINUATION_GUARD_CONFIG_PATH`.
//! 3. `CONTINUATION_GUARD_TIMEOUT_MS` and `CONTINUATION_GUARD_LEAK_CHECK_INTERVAL_MS`.
//! 4. `CONTINUATION_GUARD_FATAL_*` flags (`ALL`, `ON_NEVER_COMPLETED`,
//!    `ON_DOUBLE_RESUME`, `ON_UNRELEASED_AFTER_COMPLETION`, `ON_TIMEOUT`).
//!
//! Example:
//! ```toml
//! timeout_ms = 30000
//! leak_check_interval_ms = 3000
//!
//! [fatal]
//! on_double_resume = true
//! ```

use derive_builder::Builder;
use figment::{
    Figment, Provider,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use validator::Validate;

use crate::error::{ConfigError, Result};
use crate::fatal::{FatalHandler, default_fatal_handler};
use crate::policy::FatalityPolicy;
use crate::sink::{DiagnosticSink, default_sink};

/// Interval between leak probes when none is configured.
pub const DEFAULT_LEAK_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// ENV naming an optional TOML settings file
const CONFIG_PATH_ENV: &str = "CONTINUATION_GUARD_CONFIG_PATH";

const ENV_PREFIX: &str = "CONTINUATION_GUARD_";
const FATAL_ENV_PREFIX: &str = "CONTINUATION_GUARD_FATAL_";

/// Upper bound for any configured interval (one day).
const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Options a [`CompletionGuard`](crate::CompletionGuard) is constructed with.
#[derive(Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct GuardOptions {
    /// Violations escalated to a process abort.
    #[builder(default)]
    pub policy: FatalityPolicy,

    /// Fail the continuation with `TimedOut` if it is not resumed in time.
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,

    /// Interval between leak probes once the guard has completed.
    /// `None` disables leak probing.
    #[builder(default = "Some(DEFAULT_LEAK_CHECK_INTERVAL)")]
    pub leak_check_interval: Option<Duration>,

    #[builder(default = "default_sink()")]
    pub sink: Arc<dyn DiagnosticSink>,

    #[builder(default = "default_fatal_handler()")]
    pub fatal_handler: FatalHandler,

    /// Runtime the timeout monitor and leak detector are spawned on.
    /// Defaults to the runtime current at guard construction.
    #[builder(default, setter(strip_option))]
    pub runtime: Option<Handle>,
}

impl GuardOptions {
    pub fn builder() -> GuardOptionsBuilder {
        GuardOptionsBuilder::default()
    }

    /// Build options from [`GuardSettings::from_env`].
    pub fn from_env() -> Result<Self> {
        Ok(GuardSettings::from_env()?.options_builder().build()?)
    }
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            policy: FatalityPolicy::NONE,
            timeout: None,
            leak_check_interval: Some(DEFAULT_LEAK_CHECK_INTERVAL),
            sink: default_sink(),
            fatal_handler: default_fatal_handler(),
            runtime: None,
        }
    }
}

impl GuardOptionsBuilder {
    /// All-or-nothing shorthand for [`policy`](Self::policy).
    pub fn fatal(self, fatal: bool) -> Self {
        self.policy(FatalityPolicy::from_bool(fatal))
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if matches!(self.timeout, Some(Some(timeout)) if timeout.is_zero()) {
            return Err("timeout must be greater than 0".into());
        }
        if matches!(self.leak_check_interval, Some(Some(interval)) if interval.is_zero()) {
            return Err("leak_check_interval must be greater than 0; use None to disable".into());
        }
        Ok(())
    }
}

/// Serializable fatality flags. `all` sets every flag at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatalSettings {
    pub all: bool,
    pub on_never_completed: bool,
    pub on_double_resume: bool,
    pub on_unreleased_after_completion: bool,
    pub on_timeout: bool,
}

impl FatalSettings {
    pub fn policy(&self) -> FatalityPolicy {
        let mut policy = FatalityPolicy::from_bool(self.all);
        policy.set(
            FatalityPolicy::ON_NEVER_COMPLETED,
            self.all || self.on_never_completed,
        );
        policy.set(
            FatalityPolicy::ON_DOUBLE_RESUME,
            self.all || self.on_double_resume,
        );
        policy.set(
            FatalityPolicy::ON_UNRELEASED_AFTER_COMPLETION,
            self.all || self.on_unreleased_after_completion,
        );
        policy.set(FatalityPolicy::ON_TIMEOUT, self.all || self.on_timeout);
        policy
    }
}

/// File/env representation of [`GuardOptions`]. A value of `0` ms disables
/// the corresponding timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GuardSettings {
    #[validate(range(max = MAX_INTERVAL_MS))]
    pub timeout_ms: u64,

    #[validate(range(max = MAX_INTERVAL_MS))]
    pub leak_check_interval_ms: u64,

    pub fatal: FatalSettings,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            leak_check_interval_ms: DEFAULT_LEAK_CHECK_INTERVAL.as_millis() as u64,
            fatal: FatalSettings::default(),
        }
    }
}

impl GuardSettings {
    /// Figment with every settings source merged.
    pub fn figment() -> Figment {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(GuardSettings::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed(ENV_PREFIX).only(&["timeout_ms", "leak_check_interval_ms"]))
            .merge(
                Env::prefixed(FATAL_ENV_PREFIX)
                    .map(|k| format!("fatal.{}", k.as_str().to_lowercase()).into()),
            )
    }

    /// Load settings from the default figment (env and files).
    pub fn from_env() -> Result<Self> {
        Self::extract_from(Self::figment())
    }

    /// Extract and validate settings from any provider.
    pub fn extract_from<T: Provider>(provider: T) -> Result<Self> {
        let settings: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Start a [`GuardOptionsBuilder`] from these settings; sink, fatal
    /// handler and runtime can still be set on the returned builder.
    pub fn options_builder(&self) -> GuardOptionsBuilder {
        let mut builder = GuardOptions::builder()
            .policy(self.fatal.policy())
            .leak_check_interval(millis(self.leak_check_interval_ms));
        if let Some(timeout) = millis(self.timeout_ms) {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}
