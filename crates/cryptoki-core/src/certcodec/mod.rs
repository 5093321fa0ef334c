//! Compressed-certificate codec: the 72-byte record format, serial-number
//! generation policies, DER length re-adjustment, the device-location
//! merge/rounding planner, and the three-phase Start/Process/Finish build
//! protocol used to reconstruct a full X.509 certificate from a template
//! plus live device reads.

pub mod build;
pub mod compress;
pub mod der;
pub mod device_loc;
pub mod serial;
