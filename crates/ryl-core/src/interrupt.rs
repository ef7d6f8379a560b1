//! Process-wide interrupt handling.
//!
//! Ctrl+C only sets a flag; what it means (cancel the running evaluation,
//! or quit when idle) is decided by whoever polls it. A second Ctrl+C
//! while the flag is still set runs the restore hook and force-exits 130.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static TERMINATE: AtomicBool = AtomicBool::new(false);
static RESTORE_HOOK: OnceLock<Box<dyn Fn() + Send + Sync>> = OnceLock::new();

/// Raised out of the interactive run loop when the session quits on an
/// interrupt, so the process can exit 130.
#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Installs the Ctrl+C handler plus SIGTERM/SIGHUP terminate handlers.
///
/// # Panics
/// Panics if a handler cannot be registered.
pub fn init() {
    ctrlc::set_handler(trigger_ctrl_c).expect("Error setting Ctrl+C handler");

    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGHUP, SIGTERM};

        // SAFETY: the closures only store into an AtomicBool, which is
        // async-signal-safe.
        unsafe {
            signal_hook::low_level::register(SIGTERM, || {
                TERMINATE.store(true, Ordering::SeqCst);
            })
            .expect("Error registering SIGTERM handler");
            signal_hook::low_level::register(SIGHUP, || {
                TERMINATE.store(true, Ordering::SeqCst);
            })
            .expect("Error registering SIGHUP handler");
        }
    }
}

/// First call raises the interrupt flag; a second call while it is still
/// raised restores the terminal and exits 130.
pub fn trigger_ctrl_c() {
    if INTERRUPTED.swap(true, Ordering::SeqCst) {
        // process::exit bypasses Drop, so the terminal must be restored here.
        if let Some(hook) = RESTORE_HOOK.get() {
            hook();
        }
        std::process::exit(130);
    }
}

pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// SIGTERM/SIGHUP always mean "quit now", regardless of session state.
pub fn should_terminate() -> bool {
    TERMINATE.load(Ordering::SeqCst)
}

/// Clears the interrupt flag once it has been acted on.
pub fn reset() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Registers the hook run before a forced exit, typically terminal
/// restoration.
pub fn set_restore_hook<F>(hook: F)
where
    F: Fn() + Send + Sync + 'static,
{
    let _ = RESTORE_HOOK.set(Box::new(hook));
}
