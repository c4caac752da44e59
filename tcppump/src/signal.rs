use std::sync::atomic::AtomicBool;

/// Single process-wide cancellation flag, set by the `SIGINT` handler and
/// polled by the scheduler's emission loop (§5: "a single process-wide
/// atomic 'sigint' flag"). A plain `static` rather than an `Arc` because the
/// signal handler can only safely touch `'static` memory.
static SIGINT_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: libc::c_int) {
    SIGINT_RECEIVED.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Installs the `SIGINT` handler and returns a reference to the flag it
/// sets. Call once at startup, before the scheduler runs.
pub fn install() -> &'static AtomicBool {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_sigint as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
    }
    &SIGINT_RECEIVED
}
