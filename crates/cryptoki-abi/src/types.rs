//! C-ABI scalar type aliases, matching the Cryptoki header's widths.

pub type CkSlotId = u64;
pub type CkSessionHandle = u64;
pub type CkObjectHandle = u64;
pub type CkUserType = u64;
pub type CkFlags = u64;
pub type CkUlong = u64;
pub type CkByte = u8;

pub const CKU_SO: CkUserType = 0;
pub const CKU_USER: CkUserType = 1;

pub const CKF_RW_SESSION: CkFlags = 0x0000_0002;
pub const CKF_SERIAL_SESSION: CkFlags = 0x0000_0004;

pub const CKS_RO_PUBLIC_SESSION: CkUlong = 0;
pub const CKS_RO_USER_FUNCTIONS: CkUlong = 1;
pub const CKS_RW_PUBLIC_SESSION: CkUlong = 2;
pub const CKS_RW_USER_FUNCTIONS: CkUlong = 3;
pub const CKS_RW_SO_FUNCTIONS: CkUlong = 4;

pub type CkAttributeType = u64;
pub type CkObjectClass = u64;

pub const CKA_CLASS: CkAttributeType = 0x0000_0000;
pub const CKA_LABEL: CkAttributeType = 0x0000_0003;
pub const CKA_VALUE: CkAttributeType = 0x0000_0011;

pub const CKO_DATA: CkObjectClass = 0x0000_0000;
pub const CKO_CERTIFICATE: CkObjectClass = 0x0000_0001;
pub const CKO_PUBLIC_KEY: CkObjectClass = 0x0000_0002;
pub const CKO_PRIVATE_KEY: CkObjectClass = 0x0000_0003;
pub const CKO_SECRET_KEY: CkObjectClass = 0x0000_0004;

/// Mirrors the Cryptoki `CK_ATTRIBUTE` triple: a type tag plus a
/// caller-owned `(pValue, ulValueLen)` pair.
#[repr(C)]
pub struct CkAttribute {
    pub attr_type: CkAttributeType,
    pub p_value: *mut core::ffi::c_void,
    pub ul_value_len: CkUlong,
}

#[must_use]
pub fn object_class_from_ck(class: CkObjectClass) -> Option<cryptoki_core::object::ObjectClass> {
    use cryptoki_core::object::ObjectClass;
    match class {
        CKO_DATA => Some(ObjectClass::Data),
        CKO_CERTIFICATE => Some(ObjectClass::Certificate),
        CKO_PUBLIC_KEY => Some(ObjectClass::PublicKey),
        CKO_PRIVATE_KEY => Some(ObjectClass::PrivateKey),
        CKO_SECRET_KEY => Some(ObjectClass::SecretKey),
        _ => None,
    }
}

pub const CKF_TOKEN_PRESENT: CkFlags = 0x0000_0001;
pub const CKF_RNG: CkFlags = 0x0000_0001;
pub const CKF_LOGIN_REQUIRED: CkFlags = 0x0000_0004;
pub const CKF_USER_PIN_INITIALIZED: CkFlags = 0x0000_0008;

pub const MAX_SLOT_DESCRIPTION: usize = 64;
pub const MAX_TOKEN_LABEL: usize = 32;

/// Mirrors the fixed-width string fields of `CK_SLOT_INFO`, truncated or
/// space-padded to fit.
#[repr(C)]
pub struct CkSlotInfo {
    pub slot_description: [u8; MAX_SLOT_DESCRIPTION],
    pub flags: CkFlags,
}

/// Mirrors the fixed-width string fields of `CK_TOKEN_INFO` relevant to this
/// token: label plus the login/init flags.
#[repr(C)]
pub struct CkTokenInfo {
    pub label: [u8; MAX_TOKEN_LABEL],
    pub flags: CkFlags,
}

/// Copies `src` into a fixed-size, space-padded field the way PKCS#11's
/// string-array struct members are conventionally filled.
pub fn write_padded_field(dst: &mut [u8], src: &str) {
    dst.fill(b' ');
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src.as_bytes()[..n]);
}

#[repr(C)]
pub struct CkSessionInfo {
    pub slot_id: CkSlotId,
    pub state: CkUlong,
    pub flags: CkFlags,
    pub device_error: CkUlong,
}

/// Maps a core `SessionState` to its `(CKS_* state, CKF_* flags)` ABI pair.
#[must_use]
pub fn session_state_to_abi(state: cryptoki_core::session::SessionState) -> (CkUlong, CkFlags) {
    use cryptoki_core::session::SessionState;
    let ck_state = match state {
        SessionState::RoPublic => CKS_RO_PUBLIC_SESSION,
        SessionState::RoUser => CKS_RO_USER_FUNCTIONS,
        SessionState::RwPublic => CKS_RW_PUBLIC_SESSION,
        SessionState::RwUser => CKS_RW_USER_FUNCTIONS,
        SessionState::RwSo => CKS_RW_SO_FUNCTIONS,
    };
    let flags = if state.is_rw() {
        CKF_SERIAL_SESSION | CKF_RW_SESSION
    } else {
        CKF_SERIAL_SESSION
    };
    (ck_state, flags)
}
