//! `C_GenerateKey` / `C_GenerateKeyPair` / `C_DeriveKey`.
//!
//! Mirrors the fixed-mechanism-per-call convention used throughout this
//! crate: `C_GenerateKey` always produces an AES-128 secret key, and
//! `C_GenerateKeyPair` always produces an ECDSA P-256 key pair.
//! `C_DeriveKey` always performs ECDH against the caller's stored private
//! key and a peer public point supplied as the mechanism parameter.

use crate::rv::{self, CkRv, CKR_ARGUMENTS_BAD, CKR_OK};
use crate::state::with_library;
use crate::types::{CkObjectHandle, CkSessionHandle, CkUlong};
use cryptoki_core::object::{ObjectClass, ObjectDescriptor};
use p256::ecdsa::SigningKey;
use rand_core::OsRng;

fn session_slot_index(lib: &cryptoki_core::library::LibraryContext, h_session: CkSessionHandle) -> Option<u16> {
    let slot_id = lib.sessions.get(h_session)?.slot_id;
    lib.slots.slot_index(slot_id).ok()
}

abi_fn! {
    /// Generates a 16-byte AES key and stores it as a `SecretKey` object.
    fn C_GenerateKey(h_session: CkSessionHandle, ph_key: *mut CkObjectHandle) -> CkRv {
        if ph_key.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let Some(slot_idx) = session_slot_index(lib, h_session) else {
                return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid);
            };
            let mut key = [0u8; 16];
            cryptoki_membrane::crypto::generate_random(&mut key);
            let mut obj = ObjectDescriptor::new(ObjectClass::SecretKey, "", slot_idx);
            obj.data = key.to_vec();
            match lib.objects.insert(obj) {
                Ok(handle) => {
                    unsafe { *ph_key = handle };
                    CKR_OK
                }
                Err(e) => rv::from_core(e),
            }
        })
    }
}

abi_fn! {
    /// Generates an ECDSA P-256 key pair. The private key's 32-byte scalar
    /// and the public key's uncompressed SEC1 point are each stored as a
    /// separate object; `C_SignInit`/`C_VerifyInit`/`C_DeriveKey` read those
    /// bytes back out via `CKA_VALUE`.
    fn C_GenerateKeyPair(
        h_session: CkSessionHandle,
        ph_public_key: *mut CkObjectHandle,
        ph_private_key: *mut CkObjectHandle
    ) -> CkRv {
        if ph_public_key.is_null() || ph_private_key.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let Some(slot_idx) = session_slot_index(lib, h_session) else {
                return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid);
            };
            let signing_key = SigningKey::random(&mut OsRng);
            let scalar: [u8; 32] = signing_key.to_bytes().into();
            let point = signing_key.verifying_key().to_encoded_point(false);

            let mut pub_obj = ObjectDescriptor::new(ObjectClass::PublicKey, "", slot_idx);
            pub_obj.data = point.as_bytes().to_vec();
            let mut priv_obj = ObjectDescriptor::new(ObjectClass::PrivateKey, "", slot_idx);
            priv_obj.data = scalar.to_vec();

            let pub_handle = match lib.objects.insert(pub_obj) {
                Ok(h) => h,
                Err(e) => return rv::from_core(e),
            };
            let priv_handle = match lib.objects.insert(priv_obj) {
                Ok(h) => h,
                Err(e) => return rv::from_core(e),
            };
            unsafe {
                *ph_public_key = pub_handle;
                *ph_private_key = priv_handle;
            }
            CKR_OK
        })
    }
}

abi_fn! {
    /// ECDH key derivation: `h_base_key` must name a `PrivateKey` object
    /// holding a 32-byte scalar; `p_peer_point`/`ul_peer_point_len` carries
    /// the peer's uncompressed SEC1 public point. The 32-byte shared secret
    /// is stored as a new `SecretKey` object.
    fn C_DeriveKey(
        h_session: CkSessionHandle,
        h_base_key: CkObjectHandle,
        p_peer_point: *const u8,
        ul_peer_point_len: CkUlong,
        ph_key: *mut CkObjectHandle
    ) -> CkRv {
        if p_peer_point.is_null() || ph_key.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let peer_point = unsafe { std::slice::from_raw_parts(p_peer_point, ul_peer_point_len as usize) }.to_vec();
        with_library(|lib| {
            let Some(slot_idx) = session_slot_index(lib, h_session) else {
                return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid);
            };
            let scalar = match lib.objects.get(h_base_key) {
                Some(obj) if obj.class == ObjectClass::PrivateKey && obj.data.len() == 32 => {
                    let mut s = [0u8; 32];
                    s.copy_from_slice(&obj.data);
                    s
                }
                Some(_) => return rv::from_core(cryptoki_core::error::Rv::KeyHandleInvalid),
                None => return rv::from_core(cryptoki_core::error::Rv::ObjectHandleInvalid),
            };
            let mech = lib.mech_state_mut(h_session);
            let Some(mech) = mech else {
                return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid);
            };
            let shared = match mech.ecdh_oneshot(scalar, &peer_point) {
                Ok(s) => s,
                Err(e) => return rv::from_core(e),
            };
            let mut obj = ObjectDescriptor::new(ObjectClass::SecretKey, "", slot_idx);
            obj.data = shared.to_vec();
            match lib.objects.insert(obj) {
                Ok(handle) => {
                    unsafe { *ph_key = handle };
                    CKR_OK
                }
                Err(e) => rv::from_core(e),
            }
        })
    }
}
