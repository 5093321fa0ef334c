//! Slot configuration and runtime state.

use crate::error::{CkResult, Rv};

pub const MAX_LABEL_SIZE: usize = 32;

/// Lifecycle of a slot's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Uninitialized,
    Configured,
    Ready,
}

/// Static, user-supplied description of one slot (one physical or virtual
/// token), independent of runtime login state.
#[derive(Debug, Clone)]
pub struct SlotDescriptor {
    pub slot_id: u64,
    pub label: String,
    pub interface_path: String,
}

impl SlotDescriptor {
    pub fn new(slot_id: u64, label: impl Into<String>, interface_path: impl Into<String>) -> CkResult<Self> {
        let label = label.into();
        if label.len() > MAX_LABEL_SIZE {
            return Err(Rv::ArgumentsBad);
        }
        Ok(SlotDescriptor {
            slot_id,
            label,
            interface_path: interface_path.into(),
        })
    }
}

/// Runtime state for one slot: configuration plus the login/PIN-derived key
/// material that only exists once a session has logged in.
pub struct SlotContext {
    pub descriptor: SlotDescriptor,
    pub state: SlotState,
    pub logged_in: bool,
    pub so_logged_in: bool,
    pub read_key: [u8; 32],
    pub so_pin: Option<Vec<u8>>,
    pub user_pin_initialized: bool,
}

impl SlotContext {
    #[must_use]
    pub fn new(descriptor: SlotDescriptor) -> Self {
        SlotContext {
            descriptor,
            state: SlotState::Configured,
            logged_in: false,
            so_logged_in: false,
            read_key: [0u8; 32],
            so_pin: None,
            user_pin_initialized: false,
        }
    }

    pub fn set_read_key(&mut self, key: &[u8]) {
        self.read_key = [0u8; 32];
        let n = key.len().min(32);
        self.read_key[..n].copy_from_slice(&key[..n]);
    }

    pub fn wipe_read_key(&mut self) {
        self.read_key = [0u8; 32];
    }
}

/// Owns every configured slot, keyed by slot id.
#[derive(Default)]
pub struct SlotMgr {
    slots: Vec<SlotContext>,
}

impl SlotMgr {
    #[must_use]
    pub fn new() -> Self {
        SlotMgr::default()
    }

    pub fn add_slot(&mut self, descriptor: SlotDescriptor) -> CkResult<()> {
        if self.slots.iter().any(|s| s.descriptor.slot_id == descriptor.slot_id) {
            return Err(Rv::ArgumentsBad);
        }
        self.slots.push(SlotContext::new(descriptor));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, slot_id: u64) -> Option<&SlotContext> {
        self.slots.iter().find(|s| s.descriptor.slot_id == slot_id)
    }

    #[must_use]
    pub fn get_mut(&mut self, slot_id: u64) -> Option<&mut SlotContext> {
        self.slots.iter_mut().find(|s| s.descriptor.slot_id == slot_id)
    }

    #[must_use]
    pub fn list_ids(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.descriptor.slot_id).collect()
    }

    pub fn slot_index(&self, slot_id: u64) -> CkResult<u16> {
        self.slots
            .iter()
            .position(|s| s.descriptor.slot_id == slot_id)
            .map(|i| i as u16)
            .ok_or(Rv::SlotIdInvalid)
    }
}
