//! `C_GetSlotInfo` / `C_GetTokenInfo` / `C_InitToken` / `C_SetPIN`.

use crate::rv::{self, CkRv, CKR_ARGUMENTS_BAD, CKR_OK};
use crate::state::with_library;
use crate::types::{
    CkSlotId, CkSlotInfo, CkTokenInfo, CkUlong, CKF_LOGIN_REQUIRED, CKF_TOKEN_PRESENT, CKF_USER_PIN_INITIALIZED,
};
use std::ffi::c_char;

abi_fn! {
    fn C_GetSlotInfo(slot_id: CkSlotId, p_info: *mut CkSlotInfo) -> CkRv {
        if p_info.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| match lib.slots.get(slot_id) {
            Some(slot) => {
                unsafe {
                    crate::types::write_padded_field(&mut (*p_info).slot_description, &slot.descriptor.interface_path);
                    (*p_info).flags = CKF_TOKEN_PRESENT;
                }
                CKR_OK
            }
            None => rv::from_core(cryptoki_core::error::Rv::SlotIdInvalid),
        })
    }
}

abi_fn! {
    fn C_GetTokenInfo(slot_id: CkSlotId, p_info: *mut CkTokenInfo) -> CkRv {
        if p_info.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| match lib.slots.get(slot_id) {
            Some(slot) => {
                let mut flags = CKF_LOGIN_REQUIRED;
                if slot.user_pin_initialized {
                    flags |= CKF_USER_PIN_INITIALIZED;
                }
                unsafe {
                    crate::types::write_padded_field(&mut (*p_info).label, &slot.descriptor.label);
                    (*p_info).flags = flags;
                }
                CKR_OK
            }
            None => rv::from_core(cryptoki_core::error::Rv::SlotIdInvalid),
        })
    }
}

abi_fn! {
    /// `pPin` is a non-NUL-terminated byte buffer, matching `C_Login`'s
    /// calling convention. `pLabel` is ignored: this token's label is fixed
    /// at slot-configuration time rather than settable per `C_InitToken`.
    fn C_InitToken(slot_id: CkSlotId, p_pin: *mut c_char, ul_pin_len: CkUlong, _p_label: *mut u8) -> CkRv {
        if p_pin.is_null() || ul_pin_len == 0 {
            return CKR_ARGUMENTS_BAD;
        }
        let pin = unsafe { std::slice::from_raw_parts(p_pin as *const u8, ul_pin_len as usize) };
        with_library(|lib| match lib.init_token(slot_id, pin) {
            Ok(()) => CKR_OK,
            Err(e) => rv::from_core(e),
        })
    }
}

abi_fn! {
    fn C_SetPIN(
        h_session: crate::types::CkSessionHandle,
        p_old_pin: *mut c_char,
        ul_old_len: CkUlong,
        p_new_pin: *mut c_char,
        ul_new_len: CkUlong
    ) -> CkRv {
        if p_old_pin.is_null() || p_new_pin.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let old_pin = unsafe { std::slice::from_raw_parts(p_old_pin as *const u8, ul_old_len as usize) };
        let new_pin = unsafe { std::slice::from_raw_parts(p_new_pin as *const u8, ul_new_len as usize) };
        with_library(|lib| match lib.sessions.set_pin(h_session, old_pin, new_pin, &mut lib.slots) {
            Ok(()) => CKR_OK,
            Err(e) => rv::from_core(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::general_abi::{C_Finalize, C_Initialize};
    use crate::rv::CKR_OK;
    use crate::session_abi::{C_CloseSession, C_Login, C_OpenSession};
    use crate::types::{CkSessionHandle, CKU_SO};

    #[test]
    fn get_slot_info_and_token_info_round_trip() {
        unsafe {
            assert_eq!(C_Initialize(std::ptr::null_mut()), CKR_OK);
            let mut slot_info = CkSlotInfo { slot_description: [0u8; 64], flags: 0 };
            assert_eq!(C_GetSlotInfo(0, &mut slot_info), CKR_OK);
            assert_eq!(slot_info.flags, CKF_TOKEN_PRESENT);

            let mut token_info = CkTokenInfo { label: [0u8; 32], flags: 0 };
            assert_eq!(C_GetTokenInfo(0, &mut token_info), CKR_OK);
            assert_eq!(token_info.flags & CKF_LOGIN_REQUIRED, CKF_LOGIN_REQUIRED);
            assert_eq!(token_info.flags & CKF_USER_PIN_INITIALIZED, 0);
            assert_eq!(C_Finalize(std::ptr::null_mut()), CKR_OK);
        }
    }

    #[test]
    fn init_token_then_so_login_then_set_pin() {
        unsafe {
            assert_eq!(C_Initialize(std::ptr::null_mut()), CKR_OK);
            let mut pin = b"initial-so-pin".to_vec();
            assert_eq!(
                C_InitToken(0, pin.as_mut_ptr() as *mut c_char, pin.len() as CkUlong, std::ptr::null_mut()),
                CKR_OK
            );

            let mut handle: CkSessionHandle = 0;
            assert_eq!(
                C_OpenSession(0, crate::types::CKF_RW_SESSION, std::ptr::null_mut(), std::ptr::null_mut(), &mut handle),
                CKR_OK
            );
            assert_eq!(
                C_Login(handle, CKU_SO, pin.as_mut_ptr() as *mut c_char, pin.len() as CkUlong),
                CKR_OK
            );

            let mut old_pin = b"initial-so-pin".to_vec();
            let mut new_pin = b"rotated-so-pin".to_vec();
            assert_eq!(
                C_SetPIN(
                    handle,
                    old_pin.as_mut_ptr() as *mut c_char,
                    old_pin.len() as CkUlong,
                    new_pin.as_mut_ptr() as *mut c_char,
                    new_pin.len() as CkUlong
                ),
                CKR_OK
            );
            C_CloseSession(handle);
            C_Finalize(std::ptr::null_mut());
        }
    }
}
