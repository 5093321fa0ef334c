//! Object descriptors and the bounded, per-slot object cache.

use crate::error::{CkResult, Rv};

/// A minimal hand-rolled bitflags expansion: this module's flag set is small
/// and fixed, so a const-fn newtype keeps the dependency list honest.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            #[must_use]
            pub const fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }

            #[must_use]
            pub const fn union(self, other: $name) -> $name {
                $name(self.0 | other.0)
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                self.union(rhs)
            }
        }
    };
}
bitflags_like! {
    /// Bitmask flags carried on every cached object.
    pub struct ObjectFlags: u8 {
        const DESTROYABLE = 0x01;
        const MODIFIABLE  = 0x02;
        const DYNAMIC     = 0x04;
        const SENSITIVE   = 0x08;
        const TA_TYPE     = 0x10;
        const TRUST_TYPE  = 0x20;
        const CERT_CACHE  = 0x40;
        const KEY_CACHE   = 0x80;
    }
}

/// PKCS#11 object classes relevant to the token's supported mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectClass {
    #[default]
    PrivateKey,
    PublicKey,
    SecretKey,
    Certificate,
    Data,
}

/// A cached object: the attribute surface the find/get-attribute entrypoints
/// scan over.
#[derive(Debug, Clone)]
pub struct ObjectDescriptor {
    pub class: ObjectClass,
    pub label: String,
    pub slot: u16,
    pub flags: ObjectFlags,
    pub handle_info: u32,
    pub data: Vec<u8>,
}

impl ObjectDescriptor {
    #[must_use]
    pub fn new(class: ObjectClass, label: impl Into<String>, slot: u16) -> Self {
        ObjectDescriptor {
            class,
            label: label.into(),
            slot,
            flags: ObjectFlags::default(),
            handle_info: 0,
            data: Vec::new(),
        }
    }
}

/// A bounded, linearly-scanned per-process cache of objects across all slots.
/// Handles are monotonically increasing (`0` is never a valid handle) and
/// are never reused after removal, matching the never-recycled-handle
/// invariant every PKCS#11 session relies on.
pub struct ObjectStore {
    entries: std::collections::HashMap<u64, ObjectDescriptor>,
    next_handle: u64,
    capacity: usize,
}

impl ObjectStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        ObjectStore {
            entries: std::collections::HashMap::with_capacity(capacity),
            next_handle: 1,
            capacity,
        }
    }

    /// Inserts an object, returning its handle. Fails with `DeviceMemory` if
    /// the cache is at capacity, or with `DeviceError` if the monotonic
    /// handle counter is exhausted.
    pub fn insert(&mut self, obj: ObjectDescriptor) -> CkResult<u64> {
        if self.entries.len() >= self.capacity {
            return Err(Rv::DeviceMemory);
        }
        let handle = self.next_handle;
        self.next_handle = self.next_handle.checked_add(1).ok_or(Rv::DeviceError)?;
        self.entries.insert(handle, obj);
        Ok(handle)
    }

    #[must_use]
    pub fn get(&self, handle: u64) -> Option<&ObjectDescriptor> {
        self.entries.get(&handle)
    }

    #[must_use]
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut ObjectDescriptor> {
        self.entries.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: u64) -> CkResult<()> {
        self.entries.remove(&handle).ok_or(Rv::ObjectHandleInvalid)?;
        Ok(())
    }

    /// Linear scan matching slot, class (default `PrivateKey`), and label
    /// (when given), returning the lowest handle found.
    #[must_use]
    pub fn find(&self, slot: u16, class: Option<ObjectClass>, label: Option<&str>) -> Option<u64> {
        let want_class = class.unwrap_or_default();
        let mut matches: Vec<u64> = self
            .entries
            .iter()
            .filter_map(|(&handle, obj)| {
                if obj.slot != slot || obj.class != want_class {
                    return None;
                }
                if let Some(label) = label {
                    if obj.label != label {
                        return None;
                    }
                }
                Some(handle)
            })
            .collect();
        matches.sort_unstable();
        matches.into_iter().next()
    }

    /// All handles matching slot, class (default `PrivateKey`), and label
    /// (when given), in ascending order. Backs `C_FindObjectsInit` when the
    /// caller wants every match rather than the first.
    #[must_use]
    pub fn find_all(&self, slot: u16, class: Option<ObjectClass>, label: Option<&str>) -> Vec<u64> {
        let want_class = class.unwrap_or_default();
        let mut matches: Vec<u64> = self
            .entries
            .iter()
            .filter_map(|(&handle, obj)| {
                if obj.slot != slot || obj.class != want_class {
                    return None;
                }
                if let Some(label) = label {
                    if obj.label != label {
                        return None;
                    }
                }
                Some(handle)
            })
            .collect();
        matches.sort_unstable();
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get_roundtrips() {
        let mut store = ObjectStore::new(4);
        let handle = store
            .insert(ObjectDescriptor::new(ObjectClass::PrivateKey, "device", 0))
            .unwrap();
        assert_eq!(store.get(handle).unwrap().label, "device");
    }

    #[test]
    fn find_defaults_to_private_key_class() {
        let mut store = ObjectStore::new(4);
        store
            .insert(ObjectDescriptor::new(ObjectClass::PrivateKey, "device", 0))
            .unwrap();
        store
            .insert(ObjectDescriptor::new(ObjectClass::Certificate, "device", 0))
            .unwrap();
        let handle = store.find(0, None, Some("device")).unwrap();
        assert_eq!(store.get(handle).unwrap().class, ObjectClass::PrivateKey);
    }

    #[test]
    fn find_respects_slot_boundary() {
        let mut store = ObjectStore::new(4);
        store
            .insert(ObjectDescriptor::new(ObjectClass::PrivateKey, "device", 1))
            .unwrap();
        assert!(store.find(0, None, Some("device")).is_none());
        assert!(store.find(1, None, Some("device")).is_some());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut store = ObjectStore::new(1);
        store
            .insert(ObjectDescriptor::new(ObjectClass::Data, "a", 0))
            .unwrap();
        assert_eq!(
            store
                .insert(ObjectDescriptor::new(ObjectClass::Data, "b", 0))
                .unwrap_err(),
            Rv::DeviceMemory
        );
    }

    #[test]
    fn remove_does_not_recycle_the_handle() {
        let mut store = ObjectStore::new(2);
        let handle = store
            .insert(ObjectDescriptor::new(ObjectClass::Data, "a", 0))
            .unwrap();
        store.remove(handle).unwrap();
        let next = store
            .insert(ObjectDescriptor::new(ObjectClass::Data, "b", 0))
            .unwrap();
        assert_ne!(next, handle);
        assert!(next > handle);
    }

    #[test]
    fn handles_are_monotonically_increasing_across_inserts() {
        let mut store = ObjectStore::new(4);
        let a = store.insert(ObjectDescriptor::new(ObjectClass::Data, "a", 0)).unwrap();
        let b = store.insert(ObjectDescriptor::new(ObjectClass::Data, "b", 0)).unwrap();
        store.remove(a).unwrap();
        let c = store.insert(ObjectDescriptor::new(ObjectClass::Data, "c", 0)).unwrap();
        assert!(b > a);
        assert!(c > b);
    }

    #[test]
    fn flags_union_and_contains() {
        let f = ObjectFlags::DESTROYABLE | ObjectFlags::SENSITIVE;
        assert!(f.contains(ObjectFlags::SENSITIVE));
        assert!(!f.contains(ObjectFlags::KEY_CACHE));
    }
}
