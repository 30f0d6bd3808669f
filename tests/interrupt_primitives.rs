/*!
 * Interrupt Primitive Integration Tests
 *
 * Work blocked in the abortable primitives and in system calls
 */

use hard_timeout::interrupt::{self, Aborted, Condvar, Mutex};
use hard_timeout::{GuardConfig, TimeoutGuard};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_condvar_notified_before_deadline() {
    let state = Arc::new((Mutex::new(None), Condvar::new()));
    let producer_state = Arc::clone(&state);

    let producer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let (lock, ready) = &*producer_state;
        *lock.lock().unwrap() = Some("payload");
        ready.notify_all();
    });

    let guard = TimeoutGuard::default();
    let value = guard
        .run(5.0, || {
            let (lock, ready) = &*state;
            let slot = ready.wait_while(lock.lock()?, |slot| slot.is_none())?;
            Ok::<_, Aborted>(slot.unwrap_or_default())
        })
        .unwrap();

    producer.join().unwrap();
    assert_eq!(value, "payload");
}

#[test]
fn test_condvar_wait_aborted_at_deadline() {
    let lock = Mutex::new(0u32);
    let ready = Condvar::new();
    let guard = TimeoutGuard::default();

    let err = guard
        .run(0.03, || {
            let count = ready.wait_while(lock.lock()?, |count| *count == 0)?;
            Ok::<_, Aborted>(*count)
        })
        .unwrap_err();

    assert!(err.is_timeout());
    // The aborted waiter left the mutex free.
    *lock.lock().unwrap() += 1;
    assert_eq!(*lock.lock().unwrap(), 1);
}

#[test]
fn test_mutex_wait_aborted_at_deadline() {
    let lock = Mutex::new(());
    let held = lock.lock().unwrap();
    let guard = TimeoutGuard::default();
    let start = Instant::now();

    let err = guard
        .run(0.03, || {
            let _inner = lock.lock()?;
            Ok::<_, Aborted>(())
        })
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(2));
    drop(held);
    assert!(lock.try_lock().is_some());
}

#[test]
fn test_condvar_wait_timeout_inside_guard() {
    let lock = Mutex::new(());
    let ready = Condvar::new();
    let guard = TimeoutGuard::default();

    let timed_out = guard
        .run(5.0, || {
            let (_guard, result) = ready.wait_timeout(lock.lock()?, Duration::from_millis(10))?;
            Ok::<_, Aborted>(result.timed_out())
        })
        .unwrap();

    assert!(timed_out);
}

#[test]
fn test_notification_forwarded_when_aborted_while_relocking() {
    let lock = Mutex::new(false);
    let ready = Condvar::new();
    let guard = TimeoutGuard::default();

    let (first, second) = thread::scope(|scope| {
        // Parks first, so `notify_one` picks it; its deadline passes while the
        // notifier still holds the lock.
        let first = scope.spawn(|| {
            guard.run(0.15, || {
                let _state = ready.wait_while(lock.lock()?, |set| !*set)?;
                Ok::<_, Aborted>(())
            })
        });
        thread::sleep(Duration::from_millis(40));

        let second = scope.spawn(|| {
            let start = Instant::now();
            let (state, result) = ready
                .wait_timeout(lock.lock().unwrap(), Duration::from_millis(1500))
                .unwrap();
            (*state, result.timed_out(), start.elapsed())
        });
        thread::sleep(Duration::from_millis(40));

        let mut state = lock.lock().unwrap();
        *state = true;
        ready.notify_one();
        thread::sleep(Duration::from_millis(250));
        drop(state);

        (first.join().unwrap(), second.join().unwrap())
    });

    assert!(first.unwrap_err().is_timeout());
    let (state, timed_out, waited) = second;
    assert!(state);
    assert!(!timed_out, "second waiter missed the notification");
    assert!(waited < Duration::from_millis(1200), "waited {waited:?}");
}

#[cfg(target_os = "linux")]
#[test]
fn test_blocking_read_interrupted_by_signal() {
    use std::io::{ErrorKind, Read};
    use std::os::unix::net::UnixStream;

    let guard = TimeoutGuard::new(GuardConfig::new().with_syscall_interrupts());
    let (mut reader, _writer) = UnixStream::pair().unwrap();
    let start = Instant::now();

    let err = guard
        .run(0.05, move || -> anyhow::Result<usize> {
            let mut buf = [0u8; 16];
            loop {
                match reader.read(&mut buf) {
                    Ok(read) => return Ok(read),
                    Err(err) if err.kind() == ErrorKind::Interrupted => interrupt::checkpoint()?,
                    Err(err) => return Err(err.into()),
                }
            }
        })
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(guard.stats().snapshot().syscall_interrupts >= 1);
}
