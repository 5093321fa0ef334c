//! `C_Initialize` / `C_Finalize` / `C_GetSlotList` — library and slot
//! lifecycle entrypoints.

use crate::rv::{self, CkRv, CKR_ARGUMENTS_BAD, CKR_OK};
use crate::state::{default_config, with_library};
use crate::types::{CkSlotId, CkUlong};
use std::ffi::c_void;

abi_fn! {
    /// Initializes the library with the harness's default single-slot
    /// configuration. `_reserved` mirrors `CK_C_INITIALIZE_ARGS`'s pointer
    /// but no caller-supplied mutex callbacks are wired through yet.
    fn C_Initialize(_reserved: *mut c_void) -> CkRv {
        with_library(|lib| {
            match lib.initialize(&default_config()) {
                Ok(()) => CKR_OK,
                Err(e) => rv::from_core(e),
            }
        })
    }
}

abi_fn! {
    fn C_Finalize(_reserved: *mut c_void) -> CkRv {
        with_library(|lib| match lib.finalize() {
            Ok(()) => CKR_OK,
            Err(e) => rv::from_core(e),
        })
    }
}

abi_fn! {
    /// Writes up to `*pul_count` slot ids into `p_slot_list` (when non-null)
    /// and always writes the true count back into `*pul_count` — the
    /// length-probe convention every variable-output Cryptoki call follows.
    fn C_GetSlotList(_token_present: u8, p_slot_list: *mut CkSlotId, pul_count: *mut CkUlong) -> CkRv {
        if pul_count.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            if lib.require_initialized().is_err() {
                return rv::from_core(cryptoki_core::error::Rv::CryptokiNotInitialized);
            }
            let ids = lib.slots.list_ids();
            let requested = unsafe { *pul_count } as usize;
            unsafe { *pul_count = ids.len() as CkUlong };
            if p_slot_list.is_null() {
                return CKR_OK;
            }
            if requested < ids.len() {
                return crate::rv::CKR_BUFFER_TOO_SMALL;
            }
            for (i, id) in ids.iter().enumerate() {
                unsafe { *p_slot_list.add(i) = *id };
            }
            CKR_OK
        })
    }
}
