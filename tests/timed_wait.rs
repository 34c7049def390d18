// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Timed and contended waits, using threads within one process.
//!
//! Each thread opens its own instance of the name, the same way separate
//! processes would.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use namesake::{NamedSemaphore, Timeout};

fn unique(tag: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    format!("namesake-timed-{}-{tag}", std::process::id())
}

#[test]
fn timeout_expires_without_acquiring() {
    let name = unique("expires");
    let mut owner = NamedSemaphore::create(&name, 1, false).unwrap();
    owner.wait().unwrap();

    let mut waiter = NamedSemaphore::open(&name).unwrap();
    let start = Instant::now();
    let acquired = waiter.wait_timeout(Timeout::from_secs(1)).unwrap();
    let elapsed = start.elapsed();

    assert!(!acquired);
    assert!(!waiter.is_acquired());
    // The realtime clock has microsecond-or-better resolution on every
    // supported platform; leave a little room anyway.
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");

    // A timed out waiter can try again.
    owner.post().unwrap();
    assert!(waiter.wait_timeout(Timeout::new(0, 1)).unwrap());
    waiter.post().unwrap();
}

#[test]
fn sub_millisecond_timeout_expires() {
    let name = unique("sub-ms");
    let mut owner = NamedSemaphore::create(&name, 1, false).unwrap();
    owner.wait().unwrap();

    let mut waiter = NamedSemaphore::open(&name).unwrap();
    let start = Instant::now();
    assert!(!waiter.wait_timeout(Timeout::new(0, 999_999)).unwrap());
    assert!(start.elapsed() < Duration::from_secs(2));
    owner.post().unwrap();
}

#[test]
fn timed_wait_acquires_after_post() {
    let name = unique("handoff");
    let mut owner = NamedSemaphore::create(&name, 1, false).unwrap();
    owner.wait().unwrap();

    let waiter = thread::spawn({
        let name = name.clone();
        move || {
            let mut waiter = NamedSemaphore::open(&name).unwrap();
            let acquired = waiter.wait_timeout(Timeout::from_secs(10)).unwrap();
            assert!(acquired);
            assert!(waiter.is_acquired());
            waiter.post().unwrap();
        }
    });

    thread::sleep(Duration::from_millis(100));
    owner.post().unwrap();
    waiter.join().unwrap();

    assert!(owner.try_wait().unwrap());
    owner.post().unwrap();
}

#[test]
fn blocking_wait_acquires_after_post() {
    let name = unique("blocking");
    let mut owner = NamedSemaphore::create(&name, 1, false).unwrap();
    owner.wait().unwrap();

    let waiter = thread::spawn({
        let name = name.clone();
        move || {
            let mut waiter = NamedSemaphore::open(&name).unwrap();
            waiter.wait().unwrap();
            waiter.post().unwrap();
        }
    });

    thread::sleep(Duration::from_millis(50));
    owner.post().unwrap();
    waiter.join().unwrap();
}

#[test]
fn count_bounds_concurrent_holders() {
    const WORKERS: usize = 8;
    const PERMITS: u32 = 3;
    const ROUNDS: usize = 50;

    let name = unique("bounded");
    let _owner = NamedSemaphore::create(&name, PERMITS, false).unwrap();

    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..WORKERS)
        .map(|_| {
            let name = name.clone();
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let mut sema = NamedSemaphore::open(&name).unwrap();
                for _ in 0..ROUNDS {
                    sema.wait().unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    sema.post().unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(inside.load(Ordering::SeqCst), 0);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= PERMITS as usize, "{peak}");
}

#[test]
fn instance_moves_across_threads() {
    let name = unique("moves");
    let mut sema = NamedSemaphore::create(&name, 1, false).unwrap();
    sema.wait().unwrap();

    let sema = thread::spawn(move || {
        let mut sema = sema;
        assert!(sema.is_acquired());
        sema.post().unwrap();
        sema
    })
    .join()
    .unwrap();

    assert!(!sema.is_acquired());
    assert_eq!(sema.value().unwrap(), 1);
}
