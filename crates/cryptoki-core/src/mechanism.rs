//! Mechanism state machine: digest, encrypt, decrypt, and sign contexts.
//!
//! A session may have at most one mechanism active at a time. `MechCtx::None`
//! is the sentinel "no active mechanism" state; `init_*` fails with
//! `OperationActive` unless the session is in that state, and every terminal
//! call (`*_final`, or the one-shot form) resets it back to `None`.

use crate::error::{CkResult, Rv};
use crate::pkcs7;
use cryptoki_membrane::crypto;

/// Which device family a session's active mechanism is bound to. Legacy
/// devices stream AES-GCM through `Update`; handle-family devices only
/// support the single-shot `OneShot` form (`Update` is `FunctionNotSupported`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Legacy,
    HandleFamily,
}

/// Supported mechanism families. `AesEcb`/`AesCbc`/`AesGcm` take a key
/// inline since the software fallback path has no device-resident key
/// handles; `HmacSha256` and `DigestSha256` do not. ECDSA/ECDH/RSA carry
/// their key material inline for the same reason.
pub enum MechCtx {
    None,
    DigestSha256(crypto::Sha256Ctx),
    AesEcbEncrypt { key: [u8; 16] },
    AesEcbDecrypt { key: [u8; 16] },
    AesCbcEncrypt { key: [u8; 16], iv: [u8; 16], buffered: Vec<u8> },
    AesCbcDecrypt { key: [u8; 16], iv: [u8; 16], buffered: Vec<u8> },
    AesGcm { key: [u8; 16], iv: Vec<u8>, aad: Vec<u8>, buffered: Vec<u8>, family: DeviceFamily },
    EcdsaSign { private_key_scalar: [u8; 32], buffered: Vec<u8> },
    EcdsaVerify { public_key_point: Vec<u8>, buffered: Vec<u8> },
    Ecdh { private_key_scalar: [u8; 32] },
    RsaOaepEncrypt { public_key: Box<rsa::RsaPublicKey> },
    RsaOaepDecrypt { private_key: Box<rsa::RsaPrivateKey> },
    RsaPkcs1v15Sign { private_key: Box<rsa::RsaPrivateKey> },
    RsaPkcs1v15Verify { public_key: Box<rsa::RsaPublicKey> },
    RsaPssSign { private_key: Box<rsa::RsaPrivateKey> },
    RsaPssVerify { public_key: Box<rsa::RsaPublicKey> },
}

impl MechCtx {
    fn is_none(&self) -> bool {
        matches!(self, MechCtx::None)
    }
}

/// Per-session mechanism state, keyed by the session that owns it (callers
/// are expected to store one `MechState` per `SessionContext`).
#[derive(Default)]
pub struct MechState {
    active: MechStateInner,
}

#[derive(Default)]
enum MechStateInner {
    #[default]
    Idle,
    Active(MechCtx),
}

impl MechState {
    #[must_use]
    pub fn new() -> Self {
        MechState::default()
    }

    fn require_idle(&self) -> CkResult<()> {
        match &self.active {
            MechStateInner::Idle => Ok(()),
            MechStateInner::Active(ctx) if ctx.is_none() => Ok(()),
            MechStateInner::Active(_) => Err(Rv::OperationActive),
        }
    }

    fn take_active(&mut self) -> CkResult<MechCtx> {
        match std::mem::take(&mut self.active) {
            MechStateInner::Active(ctx) if !ctx.is_none() => Ok(ctx),
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    fn peek_active_mut(&mut self) -> CkResult<&mut MechCtx> {
        match &mut self.active {
            MechStateInner::Active(ctx) if !ctx.is_none() => Ok(ctx),
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn digest_init(&mut self) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::DigestSha256(crypto::Sha256Ctx::new()));
        Ok(())
    }

    pub fn digest_update(&mut self, data: &[u8]) -> CkResult<()> {
        match self.peek_active_mut()? {
            MechCtx::DigestSha256(ctx) => {
                ctx.update(data);
                Ok(())
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    /// Finalizes the digest, resetting the state back to idle.
    pub fn digest_final(&mut self) -> CkResult<[u8; 32]> {
        match self.take_active()? {
            MechCtx::DigestSha256(ctx) => Ok(ctx.finish()),
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    /// One-shot digest: init, update, final in a single call, resetting
    /// state immediately.
    pub fn digest_oneshot(&mut self, data: &[u8]) -> CkResult<[u8; 32]> {
        self.require_idle()?;
        let mut ctx = crypto::Sha256Ctx::new();
        ctx.update(data);
        Ok(ctx.finish())
    }

    /// HMAC-SHA-256 only supports the one-shot `Sign`/`Verify` form: there is
    /// no device-side incremental HMAC context to mirror.
    pub fn hmac_sha256_oneshot(&mut self, key: &[u8], data: &[u8]) -> CkResult<[u8; 32]> {
        self.require_idle()?;
        Ok(crypto::hmac_sha256(key, data))
    }

    pub fn aes_cbc_encrypt_init(&mut self, key: [u8; 16], iv: [u8; 16]) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::AesCbcEncrypt { key, iv, buffered: Vec::new() });
        Ok(())
    }

    pub fn aes_cbc_decrypt_init(&mut self, key: [u8; 16], iv: [u8; 16]) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::AesCbcDecrypt { key, iv, buffered: Vec::new() });
        Ok(())
    }

    pub fn encrypt_update(&mut self, data: &[u8]) -> CkResult<Vec<u8>> {
        match self.peek_active_mut()? {
            MechCtx::AesCbcEncrypt { buffered, .. } => {
                buffered.extend_from_slice(data);
                Ok(Vec::new())
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    /// Applies PKCS7 padding, encrypts, and resets to idle.
    pub fn encrypt_final(&mut self) -> CkResult<Vec<u8>> {
        match self.take_active()? {
            MechCtx::AesCbcEncrypt { key, iv, mut buffered } => {
                pkcs7::pad(&mut buffered, 16)?;
                crypto::aes128_cbc_encrypt(&key, &iv, &mut buffered).map_err(|_| Rv::FunctionFailed)?;
                Ok(buffered)
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn decrypt_update(&mut self, data: &[u8]) -> CkResult<Vec<u8>> {
        match self.peek_active_mut()? {
            MechCtx::AesCbcDecrypt { buffered, .. } => {
                buffered.extend_from_slice(data);
                Ok(Vec::new())
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    /// Decrypts and strips PKCS7 padding, resetting to idle.
    pub fn decrypt_final(&mut self) -> CkResult<Vec<u8>> {
        match self.take_active()? {
            MechCtx::AesCbcDecrypt { key, iv, mut buffered } => {
                crypto::aes128_cbc_decrypt(&key, &iv, &mut buffered).map_err(|_| Rv::FunctionFailed)?;
                pkcs7::unpad(&mut buffered, 16)?;
                Ok(buffered)
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn aes_gcm_init(&mut self, key: [u8; 16], iv: Vec<u8>, aad: Vec<u8>, family: DeviceFamily) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::AesGcm { key, iv, aad, buffered: Vec::new(), family });
        Ok(())
    }

    /// Legacy devices stream through `Update`; handle-family devices only
    /// support the single-shot form (§5).
    pub fn gcm_update(&mut self, data: &[u8]) -> CkResult<()> {
        match self.peek_active_mut()? {
            MechCtx::AesGcm { buffered, family: DeviceFamily::Legacy, .. } => {
                buffered.extend_from_slice(data);
                Ok(())
            }
            MechCtx::AesGcm { family: DeviceFamily::HandleFamily, .. } => Err(Rv::FunctionNotSupported),
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn gcm_encrypt_final(&mut self) -> CkResult<Vec<u8>> {
        match self.take_active()? {
            MechCtx::AesGcm { key, iv, aad, buffered, .. } => {
                Ok(crypto::aes128_gcm_encrypt(&key, &iv, &aad, &buffered))
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn gcm_decrypt_final(&mut self) -> CkResult<Vec<u8>> {
        match self.take_active()? {
            MechCtx::AesGcm { key, iv, aad, buffered, .. } => {
                crypto::aes128_gcm_decrypt(&key, &iv, &aad, &buffered).map_err(|_| Rv::EncryptedDataInvalid)
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn aes_ecb_encrypt_oneshot(&mut self, key: [u8; 16], block: &[u8; 16]) -> CkResult<[u8; 16]> {
        self.require_idle()?;
        let mut out = *block;
        crypto::aes128_ecb_encrypt_block(&key, &mut out).map_err(|_| Rv::FunctionFailed)?;
        Ok(out)
    }

    pub fn aes_ecb_decrypt_oneshot(&mut self, key: [u8; 16], block: &[u8; 16]) -> CkResult<[u8; 16]> {
        self.require_idle()?;
        let mut out = *block;
        crypto::aes128_ecb_decrypt_block(&key, &mut out).map_err(|_| Rv::FunctionFailed)?;
        Ok(out)
    }

    /// Single-call convenience: no `Init`/`Update`/`Final` session state involved.
    pub fn ecdsa_sign_oneshot(&mut self, private_key_scalar: [u8; 32], data: &[u8]) -> CkResult<[u8; 64]> {
        self.require_idle()?;
        crypto::ecdsa_p256_sign(&private_key_scalar, data).map_err(|_| Rv::FunctionFailed)
    }

    pub fn ecdsa_sign_init(&mut self, private_key_scalar: [u8; 32]) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::EcdsaSign { private_key_scalar, buffered: Vec::new() });
        Ok(())
    }

    pub fn ecdsa_sign_update(&mut self, data: &[u8]) -> CkResult<()> {
        match self.peek_active_mut()? {
            MechCtx::EcdsaSign { buffered, .. } => {
                buffered.extend_from_slice(data);
                Ok(())
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn ecdsa_sign_final(&mut self) -> CkResult<[u8; 64]> {
        match self.take_active()? {
            MechCtx::EcdsaSign { private_key_scalar, buffered } => {
                crypto::ecdsa_p256_sign(&private_key_scalar, &buffered).map_err(|_| Rv::FunctionFailed)
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn ecdsa_verify_init(&mut self, public_key_point: Vec<u8>) -> CkResult<()> {
        self.require_idle()?;
        self.active = MechStateInner::Active(MechCtx::EcdsaVerify { public_key_point, buffered: Vec::new() });
        Ok(())
    }

    pub fn ecdsa_verify_update(&mut self, data: &[u8]) -> CkResult<()> {
        match self.peek_active_mut()? {
            MechCtx::EcdsaVerify { buffered, .. } => {
                buffered.extend_from_slice(data);
                Ok(())
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn ecdsa_verify_final(&mut self, signature: &[u8; 64]) -> CkResult<()> {
        match self.take_active()? {
            MechCtx::EcdsaVerify { public_key_point, buffered } => {
                crypto::ecdsa_p256_verify(&public_key_point, &buffered, signature).map_err(|_| Rv::SignatureInvalid)
            }
            _ => Err(Rv::OperationNotInitialized),
        }
    }

    pub fn ecdsa_verify_oneshot(&mut self, public_key_point: &[u8], data: &[u8], signature: &[u8; 64]) -> CkResult<()> {
        self.require_idle()?;
        crypto::ecdsa_p256_verify(public_key_point, data, signature).map_err(|_| Rv::SignatureInvalid)
    }

    pub fn ecdh_oneshot(&mut self, private_key_scalar: [u8; 32], peer_public_point: &[u8]) -> CkResult<[u8; 32]> {
        self.require_idle()?;
        crypto::ecdh_p256(&private_key_scalar, peer_public_point).map_err(|_| Rv::FunctionFailed)
    }

    pub fn rsa_oaep_encrypt_oneshot(&mut self, public_key: &rsa::RsaPublicKey, data: &[u8]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_oaep_encrypt(public_key, data).map_err(|_| Rv::FunctionFailed)
    }

    pub fn rsa_oaep_decrypt_oneshot(&mut self, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_oaep_decrypt(private_key, data).map_err(|_| Rv::EncryptedDataInvalid)
    }

    pub fn rsa_pkcs1v15_encrypt_oneshot(&mut self, public_key: &rsa::RsaPublicKey, data: &[u8]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_pkcs1v15_encrypt(public_key, data).map_err(|_| Rv::FunctionFailed)
    }

    pub fn rsa_pkcs1v15_decrypt_oneshot(&mut self, private_key: &rsa::RsaPrivateKey, data: &[u8]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_pkcs1v15_decrypt(private_key, data).map_err(|_| Rv::EncryptedDataInvalid)
    }

    pub fn rsa_pkcs1v15_sign_oneshot(&mut self, private_key: &rsa::RsaPrivateKey, digest: &[u8; 32]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_pkcs1v15_sign(private_key, digest).map_err(|_| Rv::FunctionFailed)
    }

    pub fn rsa_pkcs1v15_verify_oneshot(&mut self, public_key: &rsa::RsaPublicKey, digest: &[u8; 32], signature: &[u8]) -> CkResult<()> {
        self.require_idle()?;
        crypto::rsa_pkcs1v15_verify(public_key, digest, signature).map_err(|_| Rv::SignatureInvalid)
    }

    pub fn rsa_pss_sign_oneshot(&mut self, private_key: &rsa::RsaPrivateKey, digest: &[u8; 32]) -> CkResult<Vec<u8>> {
        self.require_idle()?;
        crypto::rsa_pss_sign(private_key, digest).map_err(|_| Rv::FunctionFailed)
    }

    pub fn rsa_pss_verify_oneshot(&mut self, public_key: &rsa::RsaPublicKey, digest: &[u8; 32], signature: &[u8]) -> CkResult<()> {
        self.require_idle()?;
        crypto::rsa_pss_verify(public_key, digest, signature).map_err(|_| Rv::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_update_without_init_fails() {
        let mut st = MechState::new();
        assert_eq!(st.digest_update(b"x").unwrap_err(), Rv::OperationNotInitialized);
    }

    #[test]
    fn digest_init_twice_fails_operation_active() {
        let mut st = MechState::new();
        st.digest_init().unwrap();
        assert_eq!(st.digest_init().unwrap_err(), Rv::OperationActive);
    }

    #[test]
    fn digest_streaming_matches_oneshot() {
        let mut st = MechState::new();
        st.digest_init().unwrap();
        st.digest_update(b"ab").unwrap();
        st.digest_update(b"c").unwrap();
        let streamed = st.digest_final().unwrap();
        let oneshot = st.digest_oneshot(b"abc").unwrap();
        assert_eq!(streamed, oneshot);
    }

    #[test]
    fn digest_final_resets_to_idle() {
        let mut st = MechState::new();
        st.digest_init().unwrap();
        st.digest_final().unwrap();
        st.digest_init().unwrap();
    }

    #[test]
    fn aes_cbc_roundtrip_through_state_machine() {
        let mut st = MechState::new();
        let key = [0x42u8; 16];
        let iv = [0x01u8; 16];
        st.aes_cbc_encrypt_init(key, iv).unwrap();
        st.encrypt_update(b"hello world").unwrap();
        let ct = st.encrypt_final().unwrap();

        st.aes_cbc_decrypt_init(key, iv).unwrap();
        st.decrypt_update(&ct).unwrap();
        let pt = st.decrypt_final().unwrap();
        assert_eq!(pt, b"hello world");
    }

    #[test]
    fn gcm_roundtrip_through_state_machine() {
        let mut st = MechState::new();
        let key = [0x11u8; 16];
        let iv = vec![0x02u8; 12];
        st.aes_gcm_init(key, iv.clone(), b"aad".to_vec(), DeviceFamily::Legacy).unwrap();
        st.gcm_update(b"secret").unwrap();
        let ct = st.gcm_encrypt_final().unwrap();

        st.aes_gcm_init(key, iv, b"aad".to_vec(), DeviceFamily::Legacy).unwrap();
        st.gcm_update(&ct).unwrap();
        let pt = st.gcm_decrypt_final().unwrap();
        assert_eq!(pt, b"secret");
    }

    #[test]
    fn gcm_update_on_handle_family_session_is_unsupported() {
        let mut st = MechState::new();
        let key = [0x11u8; 16];
        let iv = vec![0x02u8; 12];
        st.aes_gcm_init(key, iv, b"aad".to_vec(), DeviceFamily::HandleFamily).unwrap();
        assert_eq!(st.gcm_update(b"secret").unwrap_err(), Rv::FunctionNotSupported);
    }

    #[test]
    fn aes_ecb_roundtrip_through_state_machine() {
        let mut st = MechState::new();
        let key = [0x33u8; 16];
        let block = [0xAAu8; 16];
        let ct = st.aes_ecb_encrypt_oneshot(key, &block).unwrap();
        let pt = st.aes_ecb_decrypt_oneshot(key, &ct).unwrap();
        assert_eq!(pt, block);
    }

    #[test]
    fn ecdsa_sign_then_verify_through_state_machine() {
        use p256::ecdsa::SigningKey;
        use rand_core::OsRng;
        let signing_key = SigningKey::random(&mut OsRng);
        let scalar: [u8; 32] = signing_key.to_bytes().into();
        let verifying_key = signing_key.verifying_key();
        let point = verifying_key.to_encoded_point(false);

        let mut st = MechState::new();
        let sig = st.ecdsa_sign_oneshot(scalar, b"message").unwrap();
        st.ecdsa_verify_oneshot(point.as_bytes(), b"message", &sig).unwrap();
    }

    #[test]
    fn ecdsa_streaming_sign_then_streaming_verify_roundtrips() {
        use p256::ecdsa::SigningKey;
        use rand_core::OsRng;
        let signing_key = SigningKey::random(&mut OsRng);
        let scalar: [u8; 32] = signing_key.to_bytes().into();
        let verifying_key = signing_key.verifying_key();
        let point = verifying_key.to_encoded_point(false).as_bytes().to_vec();

        let mut st = MechState::new();
        st.ecdsa_sign_init(scalar).unwrap();
        st.ecdsa_sign_update(b"hello ").unwrap();
        st.ecdsa_sign_update(b"world").unwrap();
        let sig = st.ecdsa_sign_final().unwrap();

        st.ecdsa_verify_init(point).unwrap();
        st.ecdsa_verify_update(b"hello ").unwrap();
        st.ecdsa_verify_update(b"world").unwrap();
        st.ecdsa_verify_final(&sig).unwrap();
    }

    #[test]
    fn ecdsa_streaming_verify_rejects_tampered_data() {
        use p256::ecdsa::SigningKey;
        use rand_core::OsRng;
        let signing_key = SigningKey::random(&mut OsRng);
        let scalar: [u8; 32] = signing_key.to_bytes().into();
        let point = signing_key.verifying_key().to_encoded_point(false).as_bytes().to_vec();

        let mut st = MechState::new();
        let sig = st.ecdsa_sign_oneshot(scalar, b"hello world").unwrap();

        st.ecdsa_verify_init(point).unwrap();
        st.ecdsa_verify_update(b"hello world!").unwrap();
        assert_eq!(st.ecdsa_verify_final(&sig).unwrap_err(), Rv::SignatureInvalid);
    }

    #[test]
    fn ecdh_agrees_through_state_machine() {
        use p256::elliptic_curve::sec1::ToEncodedPoint;
        use p256::SecretKey;
        use rand_core::OsRng;
        let alice = SecretKey::random(&mut OsRng);
        let bob = SecretKey::random(&mut OsRng);
        let alice_scalar: [u8; 32] = alice.to_bytes().into();
        let bob_scalar: [u8; 32] = bob.to_bytes().into();
        let alice_point = alice.public_key().to_encoded_point(false);
        let bob_point = bob.public_key().to_encoded_point(false);

        let mut st = MechState::new();
        let shared_a = st.ecdh_oneshot(alice_scalar, bob_point.as_bytes()).unwrap();
        let shared_b = st.ecdh_oneshot(bob_scalar, alice_point.as_bytes()).unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn rsa_oaep_roundtrip_through_state_machine() {
        let (private_key, public_key) = crypto::rsa_generate_keypair(1024).unwrap();
        let mut st = MechState::new();
        let ct = st.rsa_oaep_encrypt_oneshot(&public_key, b"hello").unwrap();
        let pt = st.rsa_oaep_decrypt_oneshot(&private_key, &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn rsa_pkcs1v15_encrypt_roundtrip_through_state_machine() {
        let (private_key, public_key) = crypto::rsa_generate_keypair(1024).unwrap();
        let mut st = MechState::new();
        let ct = st.rsa_pkcs1v15_encrypt_oneshot(&public_key, b"hello").unwrap();
        let pt = st.rsa_pkcs1v15_decrypt_oneshot(&private_key, &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn rsa_pkcs1v15_sign_then_verify_through_state_machine() {
        let (private_key, public_key) = crypto::rsa_generate_keypair(1024).unwrap();
        let digest = crypto::sha256(b"hello");
        let mut st = MechState::new();
        let sig = st.rsa_pkcs1v15_sign_oneshot(&private_key, &digest).unwrap();
        st.rsa_pkcs1v15_verify_oneshot(&public_key, &digest, &sig).unwrap();
    }

    #[test]
    fn rsa_pss_sign_then_verify_through_state_machine() {
        let (private_key, public_key) = crypto::rsa_generate_keypair(1024).unwrap();
        let digest = crypto::sha256(b"hello");
        let mut st = MechState::new();
        let sig = st.rsa_pss_sign_oneshot(&private_key, &digest).unwrap();
        st.rsa_pss_verify_oneshot(&public_key, &digest, &sig).unwrap();
    }
}
