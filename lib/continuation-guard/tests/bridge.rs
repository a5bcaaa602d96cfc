// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Awaiting guarded results through `with_guarded_continuation`.

mod common;

use anyhow::Result;
use common::Recorder;
use dynamo_continuation_guard::{
    ConfigError, GuardError, GuardOptions, diagnostic_context, with_guarded_continuation,
};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Payload {
    name: String,
    values: Vec<u64>,
}

#[tokio::test]
async fn bridge_returns_resumed_value_unmodified() -> Result<()> {
    let recorder = Recorder::new();
    let sent = Payload {
        name: "prefill".into(),
        values: vec![1, 2, 3],
    };
    let expected = sent.clone();

    let received = with_guarded_continuation::<_, anyhow::Error, _>(
        diagnostic_context!(),
        recorder.options().build()?,
        move |guard| {
            tokio::spawn(async move {
                let _ = guard.resume_ok(sent);
            });
        },
    )
    .await?;

    assert_eq!(received, expected);
    assert!(recorder.kinds().is_empty());
    Ok(())
}

#[tokio::test]
async fn bridge_forwards_resumed_error() -> Result<()> {
    let outcome = with_guarded_continuation::<u32, anyhow::Error, _>(
        diagnostic_context!(),
        Recorder::new().options().build()?,
        |guard| {
            let _ = guard.resume_err(anyhow::anyhow!("backend unavailable"));
        },
    )
    .await;

    let err = outcome.unwrap_err();
    assert_eq!(err.to_string(), "backend unavailable");
    assert!(err.downcast_ref::<GuardError>().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn bridge_surfaces_timeout() -> Result<()> {
    let outcome = with_guarded_continuation::<u32, anyhow::Error, _>(
        diagnostic_context!("request-42"),
        Recorder::new()
            .options()
            .timeout(Duration::from_millis(250))
            .build()?,
        |guard| {
            // keep the guard alive without ever resuming it
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(guard);
            });
        },
    )
    .await;

    let err = outcome.unwrap_err();
    let violation = err
        .downcast_ref::<GuardError>()
        .expect("timeout should surface as a guard error");
    assert!(violation.is_timed_out());
    assert_eq!(
        format!("{:?}", violation.context().token().expect("token")),
        "\"request-42\""
    );
    Ok(())
}

#[tokio::test]
async fn bridge_surfaces_dropped_guard() -> Result<()> {
    let outcome = with_guarded_continuation::<u32, anyhow::Error, _>(
        diagnostic_context!(),
        Recorder::new().options().build()?,
        drop,
    )
    .await;

    let err = outcome.unwrap_err();
    assert!(err.downcast_ref::<GuardError>().is_some_and(GuardError::is_never_completed));
    Ok(())
}

#[test]
fn bridge_without_runtime_for_timeout_reports_config_error() -> Result<()> {
    let options = GuardOptions::builder()
        .timeout(Duration::from_millis(10))
        .leak_check_interval(None)
        .build()?;

    // no tokio runtime is current on this thread
    let outcome = futures::executor::block_on(with_guarded_continuation::<u32, anyhow::Error, _>(
        diagnostic_context!(),
        options,
        |_guard| unreachable!("body must not run without a runtime"),
    ));

    let err = outcome.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::NoRuntime)
    ));
    Ok(())
}
