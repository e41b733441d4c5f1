use parking_lot::RwLock;
use std::sync::Arc;

/// Process-wide handler for invariant violations and API misuse.
///
/// Arguments are the diagnostic message and the source location that
/// raised it. The core never throws or returns errors across its public
/// surface; everything funnels through the installed hook, and the
/// misused operation becomes a no-op. The default hook logs the message
/// and panics.
pub type ErrorHook = Arc<dyn Fn(&str, &'static str, u32) + Send + Sync>;

static HOOK: RwLock<Option<ErrorHook>> = RwLock::new(None);

/// Install a replacement hook, returning the previous one (if any).
///
/// Tests typically install a recording hook so misuse can be asserted on
/// instead of aborting the process.
pub fn install(hook: ErrorHook) -> Option<ErrorHook> {
    HOOK.write().replace(hook)
}

/// Remove any installed hook, restoring the default panic behaviour.
pub fn reset() -> Option<ErrorHook> {
    HOOK.write().take()
}

/// Route a violation to the installed hook, or log-and-panic by default.
pub fn raise(message: &str, file: &'static str, line: u32) {
    let hook = HOOK.read().clone();
    match hook {
        Some(hook) => hook(message, file, line),
        None => {
            tracing::error!("{message} ({file}:{line})");
            panic!("{message} ({file}:{line})");
        }
    }
}

/// Report an invariant violation with the caller's source location.
macro_rules! signal_error {
    ($($arg:tt)*) => {
        $crate::hook::raise(&format!($($arg)*), file!(), line!())
    };
}

pub(crate) use signal_error;
