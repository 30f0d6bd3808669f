/*!
 * System Call Interruption
 *
 * A worker blocked in `read`, `accept` or similar cannot be unparked. On Linux
 * the watcher can instead direct a signal at the worker thread: the handler
 * does nothing and is installed without `SA_RESTART`, so the blocking call
 * fails with `EINTR` and the work sees `ErrorKind::Interrupted`.
 */

#[cfg(target_os = "linux")]
pub(crate) use linux::{deliver, install, resolve};

#[cfg(target_os = "linux")]
mod linux {
    use nix::libc::c_int;
    use nix::sys::pthread::{pthread_kill, Pthread};
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use parking_lot::Mutex;
    use tracing::{debug, trace, warn};

    /// Signals whose wake-only handler is in place
    static INSTALLED: Mutex<Vec<Signal>> = parking_lot::const_mutex(Vec::new());

    extern "C" fn wake_only(_signal: c_int) {}

    /// Validate a raw signal number for syscall interruption
    pub(crate) fn resolve(raw: i32) -> Option<Signal> {
        match Signal::try_from(raw) {
            Ok(Signal::SIGKILL | Signal::SIGSTOP) => {
                warn!(signal = raw, "signal cannot be caught, syscall interrupts disabled");
                None
            }
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!(signal = raw, error = %err, "invalid signal number, syscall interrupts disabled");
                None
            }
        }
    }

    /// Install the wake-only handler for `signal`, once per process
    ///
    /// The handler replaces any previous disposition of `signal`.
    pub(crate) fn install(signal: Signal) -> bool {
        let mut installed = INSTALLED.lock();
        if installed.contains(&signal) {
            return true;
        }

        let action = SigAction::new(SigHandler::Handler(wake_only), SaFlags::empty(), SigSet::empty());
        // SAFETY: the handler is async-signal-safe (it does nothing).
        match unsafe { sigaction(signal, &action) } {
            Ok(_) => {
                debug!(signal = %signal, "installed syscall interrupt handler");
                installed.push(signal);
                true
            }
            Err(err) => {
                warn!(signal = %signal, error = %err, "failed to install syscall interrupt handler");
                false
            }
        }
    }

    /// Direct `signal` at `thread`
    pub(crate) fn deliver(thread: Pthread, signal: Signal) -> bool {
        match pthread_kill(thread, signal) {
            Ok(()) => true,
            Err(err) => {
                // The worker may already have exited.
                trace!(signal = %signal, error = %err, "syscall interrupt not delivered");
                false
            }
        }
    }

}
