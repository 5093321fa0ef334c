//! `CK_RV` — the C-ABI status code, and its mapping from the core's [`Rv`].

use cryptoki_core::error::Rv;

pub type CkRv = u64;

pub const CKR_OK: CkRv = 0x0000_0000;
pub const CKR_HOST_MEMORY: CkRv = 0x0000_0002;
pub const CKR_GENERAL_ERROR: CkRv = 0x0000_0005;
pub const CKR_FUNCTION_FAILED: CkRv = 0x0000_0006;
pub const CKR_ARGUMENTS_BAD: CkRv = 0x0000_0007;
pub const CKR_ATTRIBUTE_READ_ONLY: CkRv = 0x0000_0010;
pub const CKR_ATTRIBUTE_TYPE_INVALID: CkRv = 0x0000_0012;
pub const CKR_ATTRIBUTE_VALUE_INVALID: CkRv = 0x0000_0013;
pub const CKR_BUFFER_TOO_SMALL: CkRv = 0x0000_0150;
pub const CKR_CRYPTOKI_NOT_INITIALIZED: CkRv = 0x0000_0190;
pub const CKR_CRYPTOKI_ALREADY_INITIALIZED: CkRv = 0x0000_0191;
pub const CKR_DEVICE_ERROR: CkRv = 0x0000_0030;
pub const CKR_DEVICE_MEMORY: CkRv = 0x0000_0031;
pub const CKR_FUNCTION_NOT_SUPPORTED: CkRv = 0x0000_0054;
pub const CKR_KEY_HANDLE_INVALID: CkRv = 0x0000_0060;
pub const CKR_KEY_SIZE_RANGE: CkRv = 0x0000_0062;
pub const CKR_MECHANISM_INVALID: CkRv = 0x0000_0070;
pub const CKR_MECHANISM_PARAM_INVALID: CkRv = 0x0000_0071;
pub const CKR_OBJECT_HANDLE_INVALID: CkRv = 0x0000_0082;
pub const CKR_OPERATION_ACTIVE: CkRv = 0x0000_0090;
pub const CKR_OPERATION_NOT_INITIALIZED: CkRv = 0x0000_0091;
pub const CKR_PIN_INCORRECT: CkRv = 0x0000_00A0;
pub const CKR_PIN_LEN_RANGE: CkRv = 0x0000_00A2;
pub const CKR_SESSION_EXISTS: CkRv = 0x0000_00B1;
pub const CKR_SESSION_HANDLE_INVALID: CkRv = 0x0000_00B3;
pub const CKR_SESSION_READ_ONLY: CkRv = 0x0000_00B7;
pub const CKR_SIGNATURE_INVALID: CkRv = 0x0000_00C0;
pub const CKR_SIGNATURE_LEN_RANGE: CkRv = 0x0000_00C1;
pub const CKR_SLOT_ID_INVALID: CkRv = 0x0000_0003;
pub const CKR_TEMPLATE_INCOMPLETE: CkRv = 0x0000_00D0;
pub const CKR_TEMPLATE_INCONSISTENT: CkRv = 0x0000_00D1;
pub const CKR_TOKEN_NOT_PRESENT: CkRv = 0x0000_00E0;
pub const CKR_TOKEN_NOT_RECOGNIZED: CkRv = 0x0000_00E1;
pub const CKR_USER_ALREADY_LOGGED_IN: CkRv = 0x0000_0100;
pub const CKR_USER_NOT_LOGGED_IN: CkRv = 0x0000_0101;
pub const CKR_USER_PIN_NOT_INITIALIZED: CkRv = 0x0000_0102;
pub const CKR_USER_TYPE_INVALID: CkRv = 0x0000_0103;
pub const CKR_DATA_INVALID: CkRv = 0x0000_0020;
pub const CKR_DATA_LEN_RANGE: CkRv = 0x0000_0021;
pub const CKR_CANT_LOCK: CkRv = 0x0000_000A;
pub const CKR_SESSION_CLOSED: CkRv = 0x0000_00B0;
pub const CKR_SESSION_PARALLEL_NOT_SUPPORTED: CkRv = 0x0000_00B4;
pub const CKR_ENCRYPTED_DATA_INVALID: CkRv = 0x0000_0040;
pub const CKR_ATTRIBUTE_SENSITIVE: CkRv = 0x0000_0011;
pub const CKR_UNAVAILABLE_INFORMATION: CkRv = 0x0000_0004;
pub const CKR_ACTION_PROHIBITED: CkRv = 0x0000_001B;
// Vendor-defined range (spec.md §7): cert-format decode failures have no
// standard CK_RV equivalent.
pub const CKR_VENDOR_BAD_CERT: CkRv = 0x8000_0001;
pub const CKR_VENDOR_WRONG_CERT_DEF: CkRv = 0x8000_0002;
pub const CKR_VENDOR_UNEXPECTED_ELEM_SIZE: CkRv = 0x8000_0003;
pub const CKR_VENDOR_ELEM_OUT_OF_BOUNDS: CkRv = 0x8000_0004;
pub const CKR_VENDOR_DECODING_ERROR: CkRv = 0x8000_0005;

#[must_use]
pub fn from_core(rv: Rv) -> CkRv {
    match rv {
        Rv::Ok => CKR_OK,
        Rv::HostMemory => CKR_HOST_MEMORY,
        Rv::GeneralError => CKR_GENERAL_ERROR,
        Rv::FunctionFailed => CKR_FUNCTION_FAILED,
        Rv::ArgumentsBad => CKR_ARGUMENTS_BAD,
        Rv::AttributeReadOnly => CKR_ATTRIBUTE_READ_ONLY,
        Rv::AttributeTypeInvalid => CKR_ATTRIBUTE_TYPE_INVALID,
        Rv::AttributeValueInvalid => CKR_ATTRIBUTE_VALUE_INVALID,
        Rv::BufferTooSmall => CKR_BUFFER_TOO_SMALL,
        Rv::CryptokiNotInitialized => CKR_CRYPTOKI_NOT_INITIALIZED,
        Rv::CryptokiAlreadyInitialized => CKR_CRYPTOKI_ALREADY_INITIALIZED,
        Rv::DeviceError => CKR_DEVICE_ERROR,
        Rv::DeviceMemory => CKR_DEVICE_MEMORY,
        Rv::FunctionNotSupported => CKR_FUNCTION_NOT_SUPPORTED,
        Rv::KeyHandleInvalid => CKR_KEY_HANDLE_INVALID,
        Rv::KeySizeRange => CKR_KEY_SIZE_RANGE,
        Rv::MechanismInvalid => CKR_MECHANISM_INVALID,
        Rv::MechanismParamInvalid => CKR_MECHANISM_PARAM_INVALID,
        Rv::ObjectHandleInvalid => CKR_OBJECT_HANDLE_INVALID,
        Rv::OperationActive => CKR_OPERATION_ACTIVE,
        Rv::OperationNotInitialized => CKR_OPERATION_NOT_INITIALIZED,
        Rv::PinIncorrect => CKR_PIN_INCORRECT,
        Rv::PinLenRange => CKR_PIN_LEN_RANGE,
        Rv::SessionExists => CKR_SESSION_EXISTS,
        Rv::SessionHandleInvalid => CKR_SESSION_HANDLE_INVALID,
        Rv::SessionReadOnly => CKR_SESSION_READ_ONLY,
        Rv::SignatureInvalid => CKR_SIGNATURE_INVALID,
        Rv::SignatureLenRange => CKR_SIGNATURE_LEN_RANGE,
        Rv::SlotIdInvalid => CKR_SLOT_ID_INVALID,
        Rv::TemplateIncomplete => CKR_TEMPLATE_INCOMPLETE,
        Rv::TemplateInconsistent => CKR_TEMPLATE_INCONSISTENT,
        Rv::TokenNotPresent => CKR_TOKEN_NOT_PRESENT,
        Rv::TokenNotRecognized => CKR_TOKEN_NOT_RECOGNIZED,
        Rv::UserAlreadyLoggedIn => CKR_USER_ALREADY_LOGGED_IN,
        Rv::UserNotLoggedIn => CKR_USER_NOT_LOGGED_IN,
        Rv::UserPinNotInitialized => CKR_USER_PIN_NOT_INITIALIZED,
        Rv::UserTypeInvalid => CKR_USER_TYPE_INVALID,
        Rv::DataInvalid => CKR_DATA_INVALID,
        Rv::DataLenRange => CKR_DATA_LEN_RANGE,
        Rv::CantLock => CKR_CANT_LOCK,
        Rv::SessionClosed => CKR_SESSION_CLOSED,
        Rv::SessionParallelNotSupported => CKR_SESSION_PARALLEL_NOT_SUPPORTED,
        Rv::EncryptedDataInvalid => CKR_ENCRYPTED_DATA_INVALID,
        Rv::AttributeSensitive => CKR_ATTRIBUTE_SENSITIVE,
        Rv::UnavailableInformation => CKR_UNAVAILABLE_INFORMATION,
        Rv::ActionProhibited => CKR_ACTION_PROHIBITED,
        Rv::BadCert => CKR_VENDOR_BAD_CERT,
        Rv::WrongCertDef => CKR_VENDOR_WRONG_CERT_DEF,
        Rv::UnexpectedElemSize => CKR_VENDOR_UNEXPECTED_ELEM_SIZE,
        Rv::ElemOutOfBounds => CKR_VENDOR_ELEM_OUT_OF_BOUNDS,
        Rv::DecodingError => CKR_VENDOR_DECODING_ERROR,
    }
}
