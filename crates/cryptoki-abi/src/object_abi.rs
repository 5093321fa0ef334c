//! `C_FindObjectsInit` / `C_FindObjects` / `C_FindObjectsFinal`.
//!
//! The find cursor lives on the session context in the original; this ABI
//! layer keeps it in a small side table keyed by session handle, since
//! `cryptoki-core::session::SessionContext` only tracks the single
//! `active_object` the mechanism state machines need.

use crate::rv::{self, CKR_ARGUMENTS_BAD, CKR_ATTRIBUTE_TYPE_INVALID, CKR_OK, CKR_OPERATION_ACTIVE, CkRv};
use crate::state::with_library;
use crate::types::{
    object_class_from_ck, CkAttribute, CkAttributeType, CkObjectClass, CkObjectHandle, CkSessionHandle, CkUlong,
    CKA_CLASS, CKA_LABEL, CKA_VALUE, CKO_PRIVATE_KEY,
};
use cryptoki_core::object::{ObjectClass, ObjectDescriptor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn object_class_to_ck(class: ObjectClass) -> CkObjectClass {
    match class {
        ObjectClass::Data => crate::types::CKO_DATA,
        ObjectClass::Certificate => crate::types::CKO_CERTIFICATE,
        ObjectClass::PublicKey => crate::types::CKO_PUBLIC_KEY,
        ObjectClass::PrivateKey => CKO_PRIVATE_KEY,
        ObjectClass::SecretKey => crate::types::CKO_SECRET_KEY,
    }
}

fn cursors() -> &'static Mutex<HashMap<CkSessionHandle, Vec<CkObjectHandle>>> {
    static CURSORS: OnceLock<Mutex<HashMap<CkSessionHandle, Vec<CkObjectHandle>>>> = OnceLock::new();
    CURSORS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Decodes `CKA_CLASS`/`CKA_LABEL` out of a caller-supplied search template.
/// Unrecognized attribute types are ignored, matching a PKCS#11 library's
/// typical "search on what you understand" tolerance.
unsafe fn decode_template(
    p_template: *mut CkAttribute,
    ul_count: CkUlong,
) -> (Option<cryptoki_core::object::ObjectClass>, Option<String>) {
    if p_template.is_null() || ul_count == 0 {
        return (None, None);
    }
    let mut class = None;
    let mut label = None;
    for i in 0..ul_count as usize {
        let attr = unsafe { &*p_template.add(i) };
        if attr.p_value.is_null() {
            continue;
        }
        match attr.attr_type {
            CKA_CLASS => {
                if attr.ul_value_len as usize == std::mem::size_of::<u64>() {
                    let raw = unsafe { (attr.p_value as *const u64).read_unaligned() };
                    class = object_class_from_ck(raw);
                }
            }
            CKA_LABEL => {
                let bytes = unsafe {
                    std::slice::from_raw_parts(attr.p_value as *const u8, attr.ul_value_len as usize)
                };
                label = std::str::from_utf8(bytes).ok().map(str::to_owned);
            }
            _ => {}
        }
    }
    (class, label)
}

abi_fn! {
    fn C_FindObjectsInit(h_session: CkSessionHandle, p_template: *mut CkAttribute, ul_count: CkUlong) -> CkRv {
        let mut guard = cursors().lock();
        if guard.contains_key(&h_session) {
            return CKR_OPERATION_ACTIVE;
        }
        let (class, label) = unsafe { decode_template(p_template, ul_count) };
        let matches = with_library(|lib| {
            let slot_id = match lib.sessions.get(h_session) {
                Some(s) => s.slot_id,
                None => return Vec::new(),
            };
            let slot_idx = lib.slots.slot_index(slot_id).unwrap_or(0);
            lib.objects.find_all(slot_idx, class, label.as_deref())
        });
        guard.insert(h_session, matches);
        CKR_OK
    }
}

abi_fn! {
    fn C_FindObjects(
        h_session: CkSessionHandle,
        ph_object: *mut CkObjectHandle,
        ul_max_object_count: CkUlong,
        pul_object_count: *mut CkUlong
    ) -> CkRv {
        if ph_object.is_null() || pul_object_count.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let mut guard = cursors().lock();
        let Some(remaining) = guard.get_mut(&h_session) else {
            return crate::rv::CKR_OPERATION_NOT_INITIALIZED;
        };
        let n = remaining.len().min(ul_max_object_count as usize);
        for (i, handle) in remaining.drain(..n).enumerate() {
            unsafe { *ph_object.add(i) = handle };
        }
        unsafe { *pul_object_count = n as CkUlong };
        CKR_OK
    }
}

abi_fn! {
    fn C_FindObjectsFinal(h_session: CkSessionHandle) -> CkRv {
        cursors().lock().remove(&h_session);
        CKR_OK
    }
}

abi_fn! {
    /// Decodes `CKA_CLASS`/`CKA_LABEL`/`CKA_VALUE` from the template and
    /// inserts a new object in the session's slot.
    fn C_CreateObject(
        h_session: CkSessionHandle,
        p_template: *mut CkAttribute,
        ul_count: CkUlong,
        ph_object: *mut CkObjectHandle
    ) -> CkRv {
        if ph_object.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        let (class, label) = unsafe { decode_template(p_template, ul_count) };
        let value = unsafe { decode_value(p_template, ul_count) };
        with_library(|lib| {
            let slot_id = match lib.sessions.get(h_session) {
                Some(s) => s.slot_id,
                None => return rv::from_core(cryptoki_core::error::Rv::SessionHandleInvalid),
            };
            let slot_idx = lib.slots.slot_index(slot_id).unwrap_or(0);
            let mut obj = ObjectDescriptor::new(class.unwrap_or_default(), label.unwrap_or_default(), slot_idx);
            obj.data = value.unwrap_or_default();
            match lib.objects.insert(obj) {
                Ok(handle) => {
                    unsafe { *ph_object = handle };
                    CKR_OK
                }
                Err(e) => rv::from_core(e),
            }
        })
    }
}

abi_fn! {
    fn C_DestroyObject(_h_session: CkSessionHandle, h_object: CkObjectHandle) -> CkRv {
        with_library(|lib| match lib.objects.remove(h_object) {
            Ok(()) => CKR_OK,
            Err(e) => rv::from_core(e),
        })
    }
}

abi_fn! {
    fn C_GetObjectSize(_h_session: CkSessionHandle, h_object: CkObjectHandle, pul_size: *mut CkUlong) -> CkRv {
        if pul_size.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| match lib.objects.get(h_object) {
            Some(obj) => {
                unsafe { *pul_size = obj.data.len() as CkUlong };
                CKR_OK
            }
            None => rv::from_core(cryptoki_core::error::Rv::ObjectHandleInvalid),
        })
    }
}

/// Fills `p_value`/`ul_value_len` for each requested attribute, following
/// the length-probe convention (`p_value == NULL` reports the size only).
/// An attribute type this token does not track gets `ul_value_len` set to
/// `u64::MAX` and the overall return code downgraded to
/// `CKR_ATTRIBUTE_TYPE_INVALID`, matching `C_GetAttributeValue`'s documented
/// per-attribute failure behavior.
abi_fn! {
    fn C_GetAttributeValue(
        _h_session: CkSessionHandle,
        h_object: CkObjectHandle,
        p_template: *mut CkAttribute,
        ul_count: CkUlong
    ) -> CkRv {
        if p_template.is_null() {
            return CKR_ARGUMENTS_BAD;
        }
        with_library(|lib| {
            let Some(obj) = lib.objects.get(h_object) else {
                return rv::from_core(cryptoki_core::error::Rv::ObjectHandleInvalid);
            };
            let mut overall = CKR_OK;
            for i in 0..ul_count as usize {
                let attr = unsafe { &mut *p_template.add(i) };
                let bytes: Option<Vec<u8>> = match attr.attr_type {
                    CKA_CLASS => Some(object_class_to_ck(obj.class).to_le_bytes().to_vec()),
                    CKA_LABEL => Some(obj.label.as_bytes().to_vec()),
                    CKA_VALUE => Some(obj.data.clone()),
                    _ => None,
                };
                match bytes {
                    Some(bytes) => {
                        if attr.p_value.is_null() {
                            attr.ul_value_len = bytes.len() as CkUlong;
                        } else if (attr.ul_value_len as usize) < bytes.len() {
                            attr.ul_value_len = bytes.len() as CkUlong;
                            overall = crate::rv::CKR_BUFFER_TOO_SMALL;
                        } else {
                            unsafe {
                                std::ptr::copy_nonoverlapping(bytes.as_ptr(), attr.p_value as *mut u8, bytes.len());
                            }
                            attr.ul_value_len = bytes.len() as CkUlong;
                        }
                    }
                    None => {
                        attr.ul_value_len = CkUlong::MAX;
                        overall = CKR_ATTRIBUTE_TYPE_INVALID;
                    }
                }
            }
            overall
        })
    }
}

/// Decodes `CKA_VALUE` out of a caller-supplied creation template.
unsafe fn decode_value(p_template: *mut CkAttribute, ul_count: CkUlong) -> Option<Vec<u8>> {
    if p_template.is_null() || ul_count == 0 {
        return None;
    }
    for i in 0..ul_count as usize {
        let attr = unsafe { &*p_template.add(i) };
        if attr.attr_type == CKA_VALUE && !attr.p_value.is_null() {
            let bytes = unsafe {
                std::slice::from_raw_parts(attr.p_value as *const u8, attr.ul_value_len as usize)
            };
            return Some(bytes.to_vec());
        }
    }
    None
}
