//! Top-level library context: the single entry point that owns every slot,
//! session, and object, plus the locking and arbitration substrate.

use crate::config::ConfigSource;
use crate::error::{CkResult, Rv};
use crate::mechanism::MechState;
use crate::object::ObjectStore;
use crate::session::SessionMgr;
use crate::slot::SlotMgr;
use cryptoki_membrane::arbiter::Arbiter;
use cryptoki_membrane::locks::Locks;
use std::collections::HashMap;

/// Default bound on the number of cached objects across all slots.
pub const DEFAULT_OBJECT_CACHE_CAPACITY: usize = 64;

pub struct LibraryContext {
    pub locks: Locks,
    pub arbiter: Arbiter,
    pub slots: SlotMgr,
    pub sessions: SessionMgr,
    pub objects: ObjectStore,
    mech_states: HashMap<u64, MechState>,
    initialized: bool,
}

impl LibraryContext {
    #[must_use]
    pub fn new() -> Self {
        LibraryContext {
            locks: Locks::os_native(),
            arbiter: Arbiter::new(),
            slots: SlotMgr::new(),
            sessions: SessionMgr::new(),
            objects: ObjectStore::new(DEFAULT_OBJECT_CACHE_CAPACITY),
            mech_states: HashMap::new(),
            initialized: false,
        }
    }

    /// `C_Initialize` equivalent: loads slot configuration and marks the
    /// library ready. Calling twice without an intervening `finalize` fails.
    pub fn initialize(&mut self, config: &dyn ConfigSource) -> CkResult<()> {
        if self.initialized {
            return Err(Rv::CryptokiAlreadyInitialized);
        }
        for descriptor in config.slots() {
            self.slots.add_slot(descriptor)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// `C_Finalize` equivalent: tears down sessions and objects. Library
    /// state can be reinitialized afterward.
    pub fn finalize(&mut self) -> CkResult<()> {
        self.require_initialized()?;
        self.sessions = SessionMgr::new();
        self.objects = ObjectStore::new(DEFAULT_OBJECT_CACHE_CAPACITY);
        self.mech_states.clear();
        self.slots = SlotMgr::new();
        self.initialized = false;
        Ok(())
    }

    pub fn require_initialized(&self) -> CkResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Rv::CryptokiNotInitialized)
        }
    }

    pub fn open_session(&mut self, slot_id: u64, is_rw: bool) -> CkResult<u64> {
        self.require_initialized()?;
        self.slots.get(slot_id).ok_or(Rv::SlotIdInvalid)?;
        let handle = self.sessions.open(slot_id, is_rw);
        self.mech_states.insert(handle, MechState::new());
        Ok(handle)
    }

    pub fn close_session(&mut self, handle: u64) -> CkResult<()> {
        self.require_initialized()?;
        self.sessions.close(handle, &mut self.slots, &self.arbiter)?;
        self.mech_states.remove(&handle);
        Ok(())
    }

    #[must_use]
    pub fn mech_state_mut(&mut self, handle: u64) -> Option<&mut MechState> {
        self.mech_states.get_mut(&handle)
    }

    /// `C_InitToken`: (re)sets the SO PIN for a slot. Rejected while any
    /// session is open against that slot, matching the real entrypoint's
    /// "exclusive access" requirement.
    pub fn init_token(&mut self, slot_id: u64, so_pin: &[u8]) -> CkResult<()> {
        self.require_initialized()?;
        if so_pin.is_empty() {
            return Err(Rv::ArgumentsBad);
        }
        if self.sessions.any_open_for_slot(slot_id) {
            return Err(Rv::SessionExists);
        }
        let slot_ctx = self.slots.get_mut(slot_id).ok_or(Rv::SlotIdInvalid)?;
        slot_ctx.so_pin = Some(so_pin.to_vec());
        slot_ctx.user_pin_initialized = false;
        Ok(())
    }
}

impl Default for LibraryContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SingleSlotConfig;

    fn cfg() -> SingleSlotConfig {
        SingleSlotConfig {
            label: "token0".into(),
            interface_path: "test".into(),
        }
    }

    #[test]
    fn double_initialize_is_rejected() {
        let mut lib = LibraryContext::new();
        lib.initialize(&cfg()).unwrap();
        assert_eq!(lib.initialize(&cfg()).unwrap_err(), Rv::CryptokiAlreadyInitialized);
    }

    #[test]
    fn operations_before_initialize_are_rejected() {
        let mut lib = LibraryContext::new();
        assert_eq!(lib.open_session(0, false).unwrap_err(), Rv::CryptokiNotInitialized);
    }

    #[test]
    fn open_then_close_session_round_trips() {
        let mut lib = LibraryContext::new();
        lib.initialize(&cfg()).unwrap();
        let handle = lib.open_session(0, false).unwrap();
        assert!(lib.mech_state_mut(handle).is_some());
        lib.close_session(handle).unwrap();
        assert!(lib.mech_state_mut(handle).is_none());
    }

    #[test]
    fn finalize_then_reinitialize_succeeds() {
        let mut lib = LibraryContext::new();
        lib.initialize(&cfg()).unwrap();
        lib.open_session(0, false).unwrap();
        lib.finalize().unwrap();
        lib.initialize(&cfg()).unwrap();
        assert!(lib.open_session(0, false).is_ok());
    }

    #[test]
    fn lock_library_then_device_in_nesting_order() {
        let lib = LibraryContext::new();
        let g = lib.locks.lock_library();
        let _device = lib.locks.lock_device(&g);
    }

    #[test]
    fn init_token_sets_so_pin_and_resets_user_pin_initialized() {
        let mut lib = LibraryContext::new();
        lib.initialize(&cfg()).unwrap();
        lib.slots.get_mut(0).unwrap().user_pin_initialized = true;
        lib.init_token(0, b"sopin").unwrap();
        assert_eq!(lib.slots.get(0).unwrap().so_pin, Some(b"sopin".to_vec()));
        assert!(!lib.slots.get(0).unwrap().user_pin_initialized);
    }

    #[test]
    fn init_token_rejected_while_a_session_is_open() {
        let mut lib = LibraryContext::new();
        lib.initialize(&cfg()).unwrap();
        lib.open_session(0, false).unwrap();
        assert_eq!(lib.init_token(0, b"sopin").unwrap_err(), Rv::SessionExists);
    }
}
