// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for continuation guard integration tests.

#![allow(dead_code)]

use dynamo_continuation_guard::{
    DiagnosticSink, GuardError, GuardEvent, GuardEventKind, GuardOptions, GuardOptionsBuilder,
};
use parking_lot::Mutex;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::FmtSubscriber;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter("dynamo_continuation_guard=trace")
            .with_test_writer()
            .try_init();
    });
}

/// Result type delivered by the test continuations.
pub type Delivery = Result<u32, GuardError>;

/// One recorded diagnostic event.
#[derive(Clone, Debug)]
pub struct Recorded {
    pub kind: GuardEventKind,
    pub at: Instant,
    pub elapsed: Option<Duration>,
}

/// Captures sink events and fatal escalations without aborting the process.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Recorded>>,
    violations: Mutex<Vec<GuardError>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        init_tracing();
        Arc::new(Self::default())
    }

    /// Options routed to this recorder, with leak probing disabled.
    pub fn options(self: &Arc<Self>) -> GuardOptionsBuilder {
        let sink: Arc<dyn DiagnosticSink> = Arc::new(RecorderSink(Arc::clone(self)));
        let fatal = Arc::clone(self);
        GuardOptions::builder()
            .sink(sink)
            .fatal_handler(Arc::new(move |violation: &GuardError| {
                fatal.violations.lock().push(violation.clone())
            }))
            .leak_check_interval(None)
    }

    pub fn kinds(&self) -> Vec<GuardEventKind> {
        self.events.lock().iter().map(|event| event.kind).collect()
    }

    pub fn events_of(&self, kind: GuardEventKind) -> Vec<Recorded> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }

    pub fn violations(&self) -> Vec<GuardError> {
        self.violations.lock().clone()
    }
}

struct RecorderSink(Arc<Recorder>);

impl DiagnosticSink for RecorderSink {
    fn emit(&self, event: GuardEvent) {
        let elapsed = match &event {
            GuardEvent::PotentialLeak { elapsed, .. } => Some(*elapsed),
            _ => None,
        };
        self.0.events.lock().push(Recorded {
            kind: event.kind(),
            at: Instant::now(),
            elapsed,
        });
    }
}
