// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Racing resumes, timeouts, and destruction across threads.

mod common;

use anyhow::Result;
use common::{Delivery, Recorder};
use dynamo_continuation_guard::{
    CompletionGuard, FatalityPolicy, GuardError, GuardEventKind, callback, diagnostic_context,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

const RESUMERS: usize = 16;

#[test]
fn concurrent_resumes_deliver_once() -> Result<()> {
    let recorder = Recorder::new();
    let (tx, mut rx) = oneshot::channel::<Delivery>();
    let guard = Arc::new(CompletionGuard::with_options(
        tx,
        diagnostic_context!(),
        recorder.options().build()?,
    )?);
    let barrier = Arc::new(Barrier::new(RESUMERS));

    let handles: Vec<_> = (0..RESUMERS as u32)
        .map(|value| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                guard.resume_ok(value).map(|()| value)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("resumer panicked"))
        .collect();

    let winners: Vec<u32> = outcomes.iter().filter_map(|o| o.as_ref().ok()).copied().collect();
    assert_eq!(winners.len(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .all(GuardError::is_already_completed)
    );
    assert_eq!(rx.try_recv()?.unwrap(), winners[0]);
    assert_eq!(
        recorder.events_of(GuardEventKind::MultipleInvocations).len(),
        RESUMERS - 1
    );

    drop(guard);
    assert!(recorder.violations().is_empty());
    Ok(())
}

#[test]
fn concurrent_resumes_escalate_every_loser() -> Result<()> {
    let recorder = Recorder::new();
    let (tx, _rx) = oneshot::channel::<Delivery>();
    let guard = Arc::new(CompletionGuard::with_options(
        tx,
        diagnostic_context!(),
        recorder
            .options()
            .policy(FatalityPolicy::ON_DOUBLE_RESUME)
            .build()?,
    )?);
    let barrier = Arc::new(Barrier::new(RESUMERS));

    let handles: Vec<_> = (0..RESUMERS as u32)
        .map(|value| {
            let guard = Arc::clone(&guard);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let _ = guard.resume_ok(value);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("resumer panicked");
    }

    let violations = recorder.violations();
    assert_eq!(violations.len(), RESUMERS - 1);
    assert!(violations.iter().all(GuardError::is_already_completed));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_and_resume_race_delivers_once() -> Result<()> {
    let recorder = Recorder::new();

    for round in 0..64u32 {
        let deliveries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&deliveries);
        let (done_tx, done_rx) = oneshot::channel();

        let guard = CompletionGuard::with_options(
            callback(move |result: Result<u32, GuardError>| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(result.is_ok());
            }),
            diagnostic_context!(),
            recorder.options().timeout(Duration::from_millis(1)).build()?,
        )?;

        let resumer = thread::spawn(move || {
            thread::sleep(Duration::from_micros(u64::from(round % 8) * 150));
            let outcome = guard.resume_ok(round);
            drop(guard);
            outcome
        });

        let resumed_first = done_rx.await?;
        let outcome = resumer.join().expect("resumer panicked");
        assert_eq!(outcome.is_ok(), resumed_first, "round {round}");
        assert_eq!(deliveries.load(Ordering::SeqCst), 1, "round {round}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn keep_alive_from_many_threads() -> Result<()> {
    let recorder = Recorder::new();
    let (tx, rx) = oneshot::channel::<Delivery>();
    let guard = Arc::new(CompletionGuard::with_options(
        tx,
        diagnostic_context!(),
        recorder.options().timeout(Duration::from_secs(30)).build()?,
    )?);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let guard = Arc::clone(&guard);
            thread::spawn(move || {
                for _ in 0..100 {
                    guard.keep_alive();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("keep-alive thread panicked");
    }

    guard.resume_ok(5)?;
    assert_eq!(rx.await??, 5);
    assert!(recorder.kinds().is_empty());
    Ok(())
}

#[test]
fn hooks_run_after_never_completed_delivery() -> Result<()> {
    let recorder = Recorder::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let delivered = Arc::clone(&log);
    let guard = CompletionGuard::with_options(
        callback(move |result: Result<u32, GuardError>| {
            let label = match result {
                Err(err) if err.is_never_completed() => "never_completed",
                _ => "unexpected",
            };
            delivered.lock().push(label);
        }),
        diagnostic_context!(),
        recorder.options().build()?,
    )?;

    for label in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        guard.on_destruction(move || log.lock().push(label));
    }
    drop(guard);

    assert_eq!(
        *log.lock(),
        vec!["never_completed", "first", "second", "third"]
    );
    Ok(())
}

#[test]
fn guard_dropped_on_another_thread() -> Result<()> {
    let recorder = Recorder::new();
    let (tx, mut rx) = oneshot::channel::<Delivery>();
    let guard = CompletionGuard::with_options(tx, diagnostic_context!(), recorder.options().build()?)?;

    thread::spawn(move || drop(guard))
        .join()
        .expect("dropping thread panicked");

    assert!(rx.try_recv()?.unwrap_err().is_never_completed());
    Ok(())
}
