//! Static slot configuration sourced from outside the library (a config file
//! or the application's `CK_C_INITIALIZE_ARGS` in a real deployment).

use crate::slot::SlotDescriptor;

/// External collaborator boundary: something that can produce the set of
/// slots to configure at `C_Initialize` time. The default implementation
/// reads a fixed single-slot layout; embedders supply their own.
pub trait ConfigSource {
    fn slots(&self) -> Vec<SlotDescriptor>;
}

/// A single hardcoded slot, useful for tests and as the harness default.
pub struct SingleSlotConfig {
    pub label: String,
    pub interface_path: String,
}

impl ConfigSource for SingleSlotConfig {
    fn slots(&self) -> Vec<SlotDescriptor> {
        vec![SlotDescriptor::new(0, self.label.clone(), self.interface_path.clone())
            .expect("harness-default label fits within the slot label bound")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_slot_config_yields_one_descriptor() {
        let cfg = SingleSlotConfig {
            label: "token0".into(),
            interface_path: "/dev/i2c-1".into(),
        };
        let slots = cfg.slots();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].slot_id, 0);
    }
}
