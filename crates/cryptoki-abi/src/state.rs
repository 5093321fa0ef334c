//! The single process-wide [`LibraryContext`], guarded for ABI callers.

use cryptoki_core::config::SingleSlotConfig;
use cryptoki_core::library::LibraryContext;
use parking_lot::Mutex;
use std::sync::OnceLock;

fn global() -> &'static Mutex<LibraryContext> {
    static LIB: OnceLock<Mutex<LibraryContext>> = OnceLock::new();
    LIB.get_or_init(|| Mutex::new(LibraryContext::new()))
}

/// Runs `f` with exclusive access to the library context. ABI entrypoints
/// never hold this guard across a C call boundary; it is acquired and
/// released within a single `extern "C" fn`.
pub fn with_library<R>(f: impl FnOnce(&mut LibraryContext) -> R) -> R {
    let mut guard = global().lock();
    f(&mut guard)
}

/// The harness's single-slot default configuration. A production embedder
/// would supply its own `ConfigSource` reading a real config file.
#[must_use]
pub fn default_config() -> SingleSlotConfig {
    SingleSlotConfig {
        label: "token0".into(),
        interface_path: "/dev/i2c-1".into(),
    }
}
