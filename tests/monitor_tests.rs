//! Integration tests for the monitor primitive.
//!
//! These verify the monitor in the shapes the scheduler relies on:
//! producer/consumer signaling, the millisecond timeout convention, and
//! several monitors coordinating on one mutex.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use threadmill::monitor::Monitor;
use threadmill::mutex::Mutex;

#[test]
fn test_producer_consumer_queue() {
    const NUM_ITEMS: usize = 100;

    let queue = Arc::new((Mutex::new(Vec::<usize>::new()), Monitor::new()));
    let queue_producer = Arc::clone(&queue);

    let producer = thread::spawn(move || {
        for i in 0..NUM_ITEMS {
            let (lock, monitor) = &*queue_producer;
            lock.lock().push(i);
            monitor.notify_one();
        }
    });

    let (lock, monitor) = &*queue;
    let mut received = Vec::new();
    while received.len() < NUM_ITEMS {
        let mut queue = lock.lock();
        while queue.is_empty() {
            monitor.wait(&mut queue);
        }
        received.append(&mut queue);
    }

    producer.join().unwrap();
    received.sort_unstable();
    for (i, &val) in received.iter().enumerate() {
        assert_eq!(val, i);
    }
}

#[test]
fn test_timed_wait_expires_without_signal() {
    let lock = Mutex::new(());
    let monitor = Monitor::new();

    let mut guard = lock.lock();
    let start = Instant::now();
    assert!(monitor.wait_ms(&mut guard, 40).timed_out());
    assert!(start.elapsed() >= Duration::from_millis(40));
}

#[test]
fn test_timed_wait_sees_signal() {
    let shared = Arc::new((Mutex::new(false), Monitor::new()));
    let signaller = Arc::clone(&shared);

    let handle = thread::spawn(move || {
        let (lock, monitor) = &*signaller;
        thread::sleep(Duration::from_millis(20));
        *lock.lock() = true;
        monitor.notify_one();
    });

    let (lock, monitor) = &*shared;
    let mut ready = lock.lock();
    while !*ready {
        assert!(!monitor.wait_ms(&mut ready, 5000).timed_out());
    }
    drop(ready);
    handle.join().unwrap();
}

#[test]
fn test_barrier_pattern_with_notify_all() {
    const NUM_THREADS: usize = 5;

    let shared = Arc::new((Mutex::new(false), Monitor::new()));
    let mut handles = vec![];

    for _ in 0..NUM_THREADS {
        let shared = Arc::clone(&shared);
        handles.push(thread::spawn(move || {
            let (lock, monitor) = &*shared;
            let mut go = lock.lock();
            while !*go {
                monitor.wait(&mut go);
            }
        }));
    }

    thread::sleep(Duration::from_millis(10));
    {
        let (lock, monitor) = &*shared;
        *lock.lock() = true;
        monitor.notify_all();
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_three_monitors_share_one_mutex() {
    // The scheduler's shape: one mutex, a monitor per condition. Waking one
    // condition's waiter must not depend on the others.
    struct State {
        queue_ready: bool,
        slot_ready: bool,
        count_ready: bool,
    }

    let shared = Arc::new((
        Mutex::new(State {
            queue_ready: false,
            slot_ready: false,
            count_ready: false,
        }),
        Monitor::new(),
        Monitor::new(),
        Monitor::new(),
    ));

    let mut handles = vec![];
    for which in 0..3 {
        let shared = Arc::clone(&shared);
        handles.push(thread::spawn(move || {
            let (lock, queue_monitor, slot_monitor, count_monitor) = &*shared;
            let mut state = lock.lock();
            match which {
                0 => {
                    while !state.queue_ready {
                        queue_monitor.wait(&mut state);
                    }
                }
                1 => {
                    while !state.slot_ready {
                        slot_monitor.wait(&mut state);
                    }
                }
                _ => {
                    while !state.count_ready {
                        count_monitor.wait(&mut state);
                    }
                }
            }
        }));
    }

    thread::sleep(Duration::from_millis(10));
    let (lock, queue_monitor, slot_monitor, count_monitor) = &*shared;

    lock.lock().queue_ready = true;
    queue_monitor.notify_one();

    lock.lock().slot_ready = true;
    slot_monitor.notify_one();

    lock.lock().count_ready = true;
    count_monitor.notify_one();

    for handle in handles {
        handle.join().unwrap();
    }
}
