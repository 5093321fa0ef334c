//! Digest, encrypt, decrypt, sign, and verify entrypoints:
//! `C_DigestInit`/`C_DigestUpdate`/`C_DigestFinal`,
//! `C_EncryptInit`/`C_EncryptUpdate`/`C_EncryptFinal`,
//! `C_DecryptInit`/`C_DecryptUpdate`/`C_DecryptFinal`,
//! `C_SignInit`/`C_SignUpdate`/`C_SignFinal`,
//! `C_VerifyInit`/`C_VerifyUpdate`/`C_VerifyFinal`.
//!
//! The mechanism parameter is reduced to a single fixed family per call
//! (AES-128-CBC with PKCS7 padding for Encrypt/Decrypt, ECDSA P-256 for
//! Sign/Verify) rather than decoding a `CK_MECHANISM` tag; callers that want
//! AES-GCM/AES-ECB streaming, RSA sign/encrypt, or ECDH go through the
//! lower-level `cryptoki_core::mechanism::MechState` API directly.

use crate::rv::{self, CkRv, CKR_ARGUMENTS_BAD, CKR_OK};
use crate::state::with_library;
use crate::types::{CkSessionHandle, CkUlong};
use std::ffi::c_void;

fn session_rv<T>(h_session: CkSessionHandle, result: Option<Result<T, cryptoki_core::error::Rv>>) -> (CkRv, Option<T>) {
    match result {
        None => (rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid), None),
        Some(Ok(v)) => {
            let _ = h_session;
            (CKR_OK, Some(v))
        }
        Some(Err(e)) => (rv::from_core(e), None),
    }
}

abi_fn! {
    fn C_DigestInit(h_session: CkSessionHandle, _p_mechanism: *mut c_void) -> CkRv {
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.digest_init());
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_DigestUpdate(h_session: CkSessionHandle, p_part: *mut u8, ul_part_len: CkUlong) -> CkRv {
        if p_part.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let data = unsafe { std::slice::from_raw_parts(p_part, ul_part_len as usize) };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.digest_update(data));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_DigestFinal(h_session: CkSessionHandle, p_digest: *mut u8, pul_digest_len: *mut CkUlong) -> CkRv {
        if pul_digest_len.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.digest_final());
            let (code, digest) = session_rv(h_session, result);
            if code != CKR_OK {
                return code;
            }
            let digest = digest.unwrap();
            let requested = unsafe { *pul_digest_len } as usize;
            unsafe { *pul_digest_len = digest.len() as CkUlong };
            if p_digest.is_null() {
                return CKR_OK;
            }
            if requested < digest.len() {
                return crate::rv::CKR_BUFFER_TOO_SMALL;
            }
            unsafe { std::ptr::copy_nonoverlapping(digest.as_ptr(), p_digest, digest.len()) };
            CKR_OK
        })
    }
}

/// Parameter block for the fixed AES-128-CBC mechanism: a 16-byte key
/// followed by a 16-byte IV, exactly 32 bytes.
fn read_key_iv(p_mechanism_param: *const u8, ul_param_len: CkUlong) -> Option<([u8; 16], [u8; 16])> {
    if p_mechanism_param.is_null() || ul_param_len != 32 {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(p_mechanism_param, 32) };
    let mut key = [0u8; 16];
    let mut iv = [0u8; 16];
    key.copy_from_slice(&bytes[..16]);
    iv.copy_from_slice(&bytes[16..]);
    Some((key, iv))
}

abi_fn! {
    fn C_EncryptInit(h_session: CkSessionHandle, p_key_iv: *const u8, ul_key_iv_len: CkUlong) -> CkRv {
        let Some((key, iv)) = read_key_iv(p_key_iv, ul_key_iv_len) else {
            return CKR_ARGUMENTS_BAD;
        };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.aes_cbc_encrypt_init(key, iv));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_EncryptUpdate(
        h_session: CkSessionHandle,
        p_part: *mut u8,
        ul_part_len: CkUlong,
        _p_encrypted_part: *mut u8,
        pul_encrypted_part_len: *mut CkUlong
    ) -> CkRv {
        if p_part.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let data = unsafe { std::slice::from_raw_parts(p_part, ul_part_len as usize) };
        let code = with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.encrypt_update(data));
            session_rv(h_session, result).0
        });
        if !pul_encrypted_part_len.is_null() {
            unsafe { *pul_encrypted_part_len = 0 };
        }
        code
    }
}

abi_fn! {
    fn C_EncryptFinal(h_session: CkSessionHandle, p_last_part: *mut u8, pul_last_part_len: *mut CkUlong) -> CkRv {
        if pul_last_part_len.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.encrypt_final());
            let (code, ct) = session_rv(h_session, result);
            if code != CKR_OK {
                return code;
            }
            let ct = ct.unwrap();
            let requested = unsafe { *pul_last_part_len } as usize;
            unsafe { *pul_last_part_len = ct.len() as CkUlong };
            if p_last_part.is_null() {
                return CKR_OK;
            }
            if requested < ct.len() {
                return crate::rv::CKR_BUFFER_TOO_SMALL;
            }
            unsafe { std::ptr::copy_nonoverlapping(ct.as_ptr(), p_last_part, ct.len()) };
            CKR_OK
        })
    }
}

abi_fn! {
    fn C_DecryptInit(h_session: CkSessionHandle, p_key_iv: *const u8, ul_key_iv_len: CkUlong) -> CkRv {
        let Some((key, iv)) = read_key_iv(p_key_iv, ul_key_iv_len) else {
            return CKR_ARGUMENTS_BAD;
        };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.aes_cbc_decrypt_init(key, iv));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_DecryptUpdate(
        h_session: CkSessionHandle,
        p_part: *mut u8,
        ul_part_len: CkUlong,
        _p_decrypted_part: *mut u8,
        pul_decrypted_part_len: *mut CkUlong
    ) -> CkRv {
        if p_part.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let data = unsafe { std::slice::from_raw_parts(p_part, ul_part_len as usize) };
        let code = with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.decrypt_update(data));
            session_rv(h_session, result).0
        });
        if !pul_decrypted_part_len.is_null() {
            unsafe { *pul_decrypted_part_len = 0 };
        }
        code
    }
}

abi_fn! {
    fn C_DecryptFinal(h_session: CkSessionHandle, p_last_part: *mut u8, pul_last_part_len: *mut CkUlong) -> CkRv {
        if pul_last_part_len.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.decrypt_final());
            let (code, pt) = session_rv(h_session, result);
            if code != CKR_OK {
                return code;
            }
            let pt = pt.unwrap();
            let requested = unsafe { *pul_last_part_len } as usize;
            unsafe { *pul_last_part_len = pt.len() as CkUlong };
            if p_last_part.is_null() {
                return CKR_OK;
            }
            if requested < pt.len() {
                return crate::rv::CKR_BUFFER_TOO_SMALL;
            }
            unsafe { std::ptr::copy_nonoverlapping(pt.as_ptr(), p_last_part, pt.len()) };
            CKR_OK
        })
    }
}

/// ECDSA P-256 private-key parameter block: exactly the 32-byte scalar.
fn read_ecdsa_scalar(p_mechanism_param: *const u8, ul_param_len: CkUlong) -> Option<[u8; 32]> {
    if p_mechanism_param.is_null() || ul_param_len != 32 {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(p_mechanism_param, 32) };
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(bytes);
    Some(scalar)
}

abi_fn! {
    fn C_SignInit(h_session: CkSessionHandle, p_key: *const u8, ul_key_len: CkUlong) -> CkRv {
        let Some(scalar) = read_ecdsa_scalar(p_key, ul_key_len) else {
            return CKR_ARGUMENTS_BAD;
        };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_sign_init(scalar));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_SignUpdate(h_session: CkSessionHandle, p_part: *mut u8, ul_part_len: CkUlong) -> CkRv {
        if p_part.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let data = unsafe { std::slice::from_raw_parts(p_part, ul_part_len as usize) };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_sign_update(data));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_SignFinal(h_session: CkSessionHandle, p_signature: *mut u8, pul_signature_len: *mut CkUlong) -> CkRv {
        if pul_signature_len.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_sign_final());
            let (code, sig) = session_rv(h_session, result);
            if code != CKR_OK {
                return code;
            }
            let sig = sig.unwrap();
            let requested = unsafe { *pul_signature_len } as usize;
            unsafe { *pul_signature_len = sig.len() as CkUlong };
            if p_signature.is_null() {
                return CKR_OK;
            }
            if requested < sig.len() {
                return crate::rv::CKR_BUFFER_TOO_SMALL;
            }
            unsafe { std::ptr::copy_nonoverlapping(sig.as_ptr(), p_signature, sig.len()) };
            CKR_OK
        })
    }
}

abi_fn! {
    fn C_VerifyInit(h_session: CkSessionHandle, p_key: *const u8, ul_key_len: CkUlong) -> CkRv {
        if p_key.is_null() || ul_key_len == 0 {
            return CKR_ARGUMENTS_BAD;
        }
        let point = unsafe { std::slice::from_raw_parts(p_key, ul_key_len as usize) }.to_vec();
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_verify_init(point));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_VerifyUpdate(h_session: CkSessionHandle, p_part: *mut u8, ul_part_len: CkUlong) -> CkRv {
        if p_part.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let data = unsafe { std::slice::from_raw_parts(p_part, ul_part_len as usize) };
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_verify_update(data));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    fn C_VerifyFinal(h_session: CkSessionHandle, p_signature: *mut u8, ul_signature_len: CkUlong) -> CkRv {
        if p_signature.is_null() || ul_signature_len != 64 {
            return CKR_ARGUMENTS_BAD;
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(unsafe { std::slice::from_raw_parts(p_signature, 64) });
        with_library(|lib| {
            let result = lib.mech_state_mut(h_session).map(|m| m.ecdsa_verify_final(&signature));
            session_rv(h_session, result).0
        })
    }
}

abi_fn! {
    /// Fills `p_random_data` with `ul_random_len` cryptographically secure
    /// random bytes, falling back to the software RNG (no hardware RNG is
    /// modeled by this runtime).
    fn C_GenerateRandom(_h_session: CkSessionHandle, p_random_data: *mut u8, ul_random_len: CkUlong) -> CkRv {
        if p_random_data.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let out = unsafe { std::slice::from_raw_parts_mut(p_random_data, ul_random_len as usize) };
        cryptoki_membrane::crypto::generate_random(out);
        CKR_OK
    }
}
