//! `C_OpenSession` / `C_CloseSession` / `C_Login` / `C_Logout`.

use crate::rv::{self, CkRv, CKR_ARGUMENTS_BAD, CKR_OK};
use crate::state::with_library;
use crate::types::{CkFlags, CkSessionHandle, CkSlotId, CkUlong, CkUserType, CKF_RW_SESSION, CKU_SO};
use cryptoki_core::session::UserType;
use std::ffi::{c_char, c_void};

abi_fn! {
    fn C_OpenSession(
        slot_id: CkSlotId,
        flags: CkFlags,
        _application: *mut c_void,
        _notify: *mut c_void,
        ph_session: *mut CkSessionHandle
    ) -> CkRv {
        if ph_session.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let is_rw = flags & CKF_RW_SESSION != 0;
        with_library(|lib| match lib.open_session(slot_id, is_rw) {
            Ok(handle) => {
                unsafe { *ph_session = handle };
                CKR_OK
            }
            Err(e) => rv::from_core(e),
        })
    }
}

abi_fn! {
    fn C_CloseAllSessions(slot_id: CkSlotId) -> CkRv {
        with_library(|lib| {
            if lib.slots.get(slot_id).is_none() {
                return rv::from_core(cryptoki_core::error::Rv::SlotIdInvalid);
            }
            lib.sessions.close_all(slot_id, &mut lib.slots, &lib.arbiter);
            CKR_OK
        })
    }
}

abi_fn! {
    fn C_GetSessionInfo(h_session: CkSessionHandle, p_info: *mut crate::types::CkSessionInfo) -> CkRv {
        if p_info.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| match lib.sessions.get(h_session) {
            Some(session) => {
                let (state, flags) = crate::types::session_state_to_abi(session.state);
                unsafe {
                    (*p_info).slot_id = session.slot_id;
                    (*p_info).state = state;
                    (*p_info).flags = flags;
                    (*p_info).device_error = 0;
                }
                CKR_OK
            }
            None => rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid),
        })
    }
}

abi_fn! {
    fn C_CloseSession(h_session: CkSessionHandle) -> CkRv {
        with_library(|lib| match lib.close_session(h_session) {
            Ok(()) => CKR_OK,
            Err(e) => rv::from_core(e),
        })
    }
}

abi_fn! {
    /// `pPin` is a non-NUL-terminated byte buffer of length `ulPinLen`, per
    /// the Cryptoki calling convention (not a C string).
    fn C_Login(
        h_session: CkSessionHandle,
        user_type: CkUserType,
        p_pin: *mut c_char,
        ul_pin_len: CkUlong
    ) -> CkRv {
        if p_pin.is_null() || ul_pin_len == 0 {
            return CKR_ARGUMENTS_BAD;
        }
        let pin = unsafe { std::slice::from_raw_parts(p_pin as *const u8, ul_pin_len as usize) };
        let user_type = if user_type == CKU_SO { UserType::So } else { UserType::User };
        with_library(|lib| {
            let slot_id = match lib.sessions.get(h_session) {
                Some(s) => s.slot_id,
                None => return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid),
            };
            let label = lib
                .slots
                .get(slot_id)
                .map(|s| s.descriptor.label.clone())
                .unwrap_or_default();
            match lib.sessions.login(h_session, user_type, pin, label.as_bytes(), false, &mut lib.slots, &lib.arbiter) {
                Ok(()) => CKR_OK,
                Err(e) => rv::from_core(e),
            }
        })
    }
}

abi_fn! {
    fn C_Logout(h_session: CkSessionHandle) -> CkRv {
        with_library(|lib| {
            match lib.sessions.logout(h_session, &mut lib.slots, &lib.arbiter) {
                Ok(()) => CKR_OK,
                Err(e) => rv::from_core(e),
            }
        })
    }
}
