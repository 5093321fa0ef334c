//! Device-location merge/rounding planner (§4.2.1).
//!
//! A [`DeviceLocation`] names one byte range a certificate reconstruction
//! needs read from a device zone. The planner folds the scattered regions
//! a [`super::build::CertificateDefinition`] touches into the minimum set
//! of disjoint, block-aligned reads the caller actually has to issue.

use crate::error::{CkResult, Rv};

/// Which physical storage region a location lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    None,
    Config,
    Otp,
    Data,
    DedicatedData,
}

/// One device byte range. `count == 0` encodes "absent" (nothing to read).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLocation {
    pub zone: Zone,
    pub slot: u8,
    pub is_genkey: bool,
    pub offset: usize,
    pub count: usize,
}

impl DeviceLocation {
    #[must_use]
    pub const fn absent() -> Self {
        DeviceLocation { zone: Zone::None, slot: 0, is_genkey: false, offset: 0, count: 0 }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.count
    }

    /// Same zone (and, for `Data`, same slot/is_genkey) as `other`.
    #[must_use]
    pub fn same_region(&self, other: &DeviceLocation) -> bool {
        if self.zone != other.zone {
            return false;
        }
        if self.zone == Zone::Data {
            return self.slot == other.slot && self.is_genkey == other.is_genkey;
        }
        true
    }

    /// Does `self` wholly contain `inner` (the encompassment test used by
    /// the build protocol's Process phase)?
    #[must_use]
    pub fn encompasses(&self, inner: &DeviceLocation) -> bool {
        self.same_region(inner) && inner.offset >= self.offset && inner.end() <= self.end()
    }
}

/// Read block size for a zone; handle-family devices never round (the
/// caller passes their own per-zone dynamic size and planning skips
/// rounding entirely for that device family).
#[must_use]
pub fn block_size(zone: Zone) -> usize {
    match zone {
        Zone::Data | Zone::DedicatedData => 32,
        Zone::Config => 4,
        Zone::Otp | Zone::None => 1,
    }
}

fn round_down(value: usize, block: usize) -> usize {
    if block <= 1 {
        value
    } else {
        (value / block) * block
    }
}

fn round_up(value: usize, block: usize) -> usize {
    if block <= 1 {
        value
    } else {
        value.div_ceil(block) * block
    }
}

/// Rounds `loc` to its zone's block boundary (step 2 of §4.2.1). Legacy
/// devices round; handle-family devices are passed through unchanged.
#[must_use]
pub fn round_to_block(loc: DeviceLocation, is_handle_family: bool) -> DeviceLocation {
    if is_handle_family || loc.is_absent() {
        return loc;
    }
    let block = block_size(loc.zone);
    let new_offset = round_down(loc.offset, block);
    let new_end = round_up(loc.end(), block);
    DeviceLocation { offset: new_offset, count: new_end - new_offset, ..loc }
}

/// Folds `inputs` (already rounded) into the minimum set of disjoint
/// device reads, merging contiguous/overlapping same-region entries
/// (steps 3-4 of §4.2.1). `zone_capacity` bounds the merged end for
/// handle-family devices; `max_entries` bounds the plan's size.
pub fn plan_device_reads(
    inputs: &[DeviceLocation],
    is_handle_family: bool,
    zone_capacity: impl Fn(Zone) -> Option<usize>,
    max_entries: usize,
) -> CkResult<Vec<DeviceLocation>> {
    let mut plan: Vec<DeviceLocation> = Vec::new();
    for &raw in inputs {
        if raw.is_absent() {
            continue;
        }
        let loc = round_to_block(raw, is_handle_family);
        let mut merged = false;
        for entry in &mut plan {
            if !entry.same_region(&loc) {
                continue;
            }
            let touches = loc.offset <= entry.end() && entry.offset <= loc.end();
            if !touches {
                continue;
            }
            let new_offset = entry.offset.min(loc.offset);
            let new_end = entry.end().max(loc.end());
            if is_handle_family {
                if let Some(cap) = zone_capacity(entry.zone) {
                    if new_end > cap {
                        return Err(Rv::ElemOutOfBounds);
                    }
                }
            }
            entry.offset = new_offset;
            entry.count = new_end - new_offset;
            merged = true;
            break;
        }
        if !merged {
            if plan.len() >= max_entries {
                return Err(Rv::BufferTooSmall);
            }
            plan.push(loc);
        }
    }
    Ok(plan)
}
