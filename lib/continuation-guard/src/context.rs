// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Call-site and correlation data attached to every guard.

use std::fmt::{self, Debug, Display, Formatter};
use std::panic::Location;
use std::sync::Arc;

/// Function name recorded when the call site cannot name its enclosing function.
const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Opaque caller-supplied token used to correlate several guards.
pub type CorrelationToken = Arc<dyn Debug + Send + Sync>;

/// Immutable description of where a guard was created.
///
/// Prefer the [`diagnostic_context!`](crate::diagnostic_context) macro, which
/// also records the enclosing function. [`DiagnosticContext::caller`] only
/// knows the file and line.
#[derive(Clone)]
pub struct DiagnosticContext {
    file: &'static str,
    line: u32,
    function: &'static str,
    token: Option<CorrelationToken>,
}

impl DiagnosticContext {
    pub fn new(file: &'static str, line: u32, function: &'static str) -> Self {
        Self {
            file,
            line,
            function,
            token: None,
        }
    }

    /// Capture the file and line of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line(), UNKNOWN_FUNCTION)
    }

    /// Attach a correlation token, replacing any previous one.
    pub fn with_token(mut self, token: impl Debug + Send + Sync + 'static) -> Self {
        self.token = Some(Arc::new(token));
        self
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn function(&self) -> &'static str {
        self.function
    }

    pub fn token(&self) -> Option<&CorrelationToken> {
        self.token.as_ref()
    }

    fn write_token(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(f, "{:?}", token),
            None => f.write_str("none"),
        }
    }
}

impl Display for DiagnosticContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file:'{}' line:'{}' function:'{}' context:'",
            self.file, self.line, self.function
        )?;
        self.write_token(f)?;
        f.write_str("'")
    }
}

impl Debug for DiagnosticContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticContext")
            .field("file", &self.file)
            .field("line", &self.line)
            .field("function", &self.function)
            .field("token", &self.token)
            .finish()
    }
}

/// Strip the helper item and any closure frames from a `type_name` path.
#[doc(hidden)]
pub fn __enclosing_function(path: &'static str) -> &'static str {
    let mut name = path.strip_suffix("::__here").unwrap_or(path);
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    name
}

/// Build a [`DiagnosticContext`] for the current call site.
///
/// ```rust
/// use dynamo_continuation_guard::diagnostic_context;
///
/// let context = diagnostic_context!("request-42");
/// assert!(context.function().ends_with("main"));
/// ```
#[macro_export]
macro_rules! diagnostic_context {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::DiagnosticContext::new(
            file!(),
            line!(),
            $crate::context::__enclosing_function(__type_name_of(__here)),
        )
    }};
    ($token:expr) => {
        $crate::diagnostic_context!().with_token($token)
    };
}
