// All extern "C" ABI exports accept raw pointers from C callers; the core
// validates lengths internally, so per-function safety docs would be
// redundant boilerplate.
#![allow(clippy::missing_safety_doc)]
//! ABI-compatible extern "C" boundary layer for the Cryptoki token runtime.
//!
//! This crate produces a `cdylib` exposing the Cryptoki C entrypoints. Each
//! function passes caller pointers through [`state::with_library`], which
//! holds the real implementation (`cryptoki-core::LibraryContext`) behind
//! the process-wide lock.
//!
//! # Architecture
//!
//! ```text
//! C caller -> ABI entry (this crate) -> LibraryContext -> core state machines -> CK_RV
//! ```

#[macro_use]
mod macros;

mod state;
mod util;

pub mod general_abi;
pub mod object_abi;
pub mod rv;
pub mod session_abi;
pub mod crypto_abi;
pub mod keygen_abi;
pub mod token_abi;
pub mod types;

pub use rv::CkRv;
pub use types::*;
