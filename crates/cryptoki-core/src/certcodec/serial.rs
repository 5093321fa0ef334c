//! Serial number generation policies for the compressed-certificate codec.

use cryptoki_membrane::crypto;

/// Where a certificate's serial number is sourced from (spec §3 `sn_source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnSource {
    /// Stored verbatim in the template; nothing to generate.
    Stored,
    /// Stored in the template, but the installed length may differ from the
    /// template's recorded length (triggers DER-length resizing, §4.2.3).
    StoredDynamic,
    /// `sn = 0x40 ‖ device_sn[0..9]` (10 bytes).
    DeviceSN,
    /// `sn = 0x40 ‖ comp_cert[67..69]` (3 bytes).
    SignerID,
    /// `SHA-256(subject public key ‖ dates)`, truncated, with no bit massaging.
    PubKeyHashRaw,
    /// Same hash as `PubKeyHashRaw`, first byte forced positive (bit 7 clear).
    PubKeyHashPos,
    /// Same as `PubKeyHashPos`, additionally bit 6 set (non-trimmable).
    PubKeyHash,
    /// Same construction as `PubKeyHashRaw`, but hashing the device serial
    /// number instead of the subject public key.
    DeviceSNHashRaw,
    /// Same as `DeviceSNHashRaw`, first byte forced positive.
    DeviceSNHashPos,
    /// Same as `DeviceSNHashPos`, additionally bit 6 set.
    DeviceSNHash,
}

impl SnSource {
    /// True when the serial number must be computed rather than copied
    /// verbatim from the template (§4.2.2 Finish).
    #[must_use]
    pub const fn is_generated(self) -> bool {
        !matches!(self, Self::Stored | Self::StoredDynamic)
    }
}

/// Builds the hash input message for the `*Hash`/`*HashPos` sources: the
/// format-version byte (bits 0-3 of `comp_cert[70]`), optionally a second
/// format byte (bits 4-7 of `comp_cert[71]`) for formats 1/2, followed by
/// the source bytes (public key or device serial number).
#[must_use]
pub fn build_hash_message(comp_cert: &[u8; 72], source_bytes: &[u8]) -> Vec<u8> {
    let format_version = comp_cert[70] & 0x0F;
    let mut message = vec![format_version];
    if format_version == 1 || format_version == 2 {
        message.push(comp_cert[71] & 0xF0);
    }
    message.extend_from_slice(source_bytes);
    message
}

/// Generates a serial number for `source`, writing exactly `out.len()`
/// bytes (the codec always uses a fixed-width serial, typically 16 or 20).
///
/// `source_bytes` is the hash input for the `*Hash*` sources (the subject
/// public key for `PubKeyHash*`, the device serial number for
/// `DeviceSNHash*`); `device_sn` is the raw 9-byte device serial used by
/// `DeviceSN` directly.
pub fn generate_sn(source: SnSource, comp_cert: &[u8; 72], source_bytes: &[u8], device_sn: &[u8; 9], out: &mut [u8]) {
    match source {
        SnSource::Stored | SnSource::StoredDynamic => {}
        SnSource::DeviceSN => {
            if out.is_empty() {
                return;
            }
            out[0] = 0x40;
            let n = (out.len() - 1).min(device_sn.len());
            out[1..1 + n].copy_from_slice(&device_sn[..n]);
        }
        SnSource::SignerID => {
            if out.is_empty() {
                return;
            }
            out[0] = 0x40;
            let n = (out.len() - 1).min(2);
            out[1..1 + n].copy_from_slice(&comp_cert[67..67 + n]);
        }
        SnSource::PubKeyHashRaw | SnSource::PubKeyHashPos | SnSource::PubKeyHash => {
            let message = build_hash_message(comp_cert, source_bytes);
            let digest = crypto::sha256(&message);
            let n = out.len().min(digest.len());
            out[..n].copy_from_slice(&digest[..n]);
            apply_bit_policy(source, out);
        }
        SnSource::DeviceSNHashRaw | SnSource::DeviceSNHashPos | SnSource::DeviceSNHash => {
            let message = build_hash_message(comp_cert, source_bytes);
            let digest = crypto::sha256(&message);
            let n = out.len().min(digest.len());
            out[..n].copy_from_slice(&digest[..n]);
            apply_bit_policy(source, out);
        }
    }
}

/// Applies the positivity/non-trimmable bit policy for the hash-derived
/// sources: `*Raw` leaves the digest untouched, `*Pos` forces bit 7 clear,
/// the plain `PubKeyHash`/`DeviceSNHash` additionally set bit 6.
fn apply_bit_policy(source: SnSource, out: &mut [u8]) {
    if out.is_empty() {
        return;
    }
    match source {
        SnSource::PubKeyHashRaw | SnSource::DeviceSNHashRaw => {}
        SnSource::PubKeyHashPos | SnSource::DeviceSNHashPos => {
            out[0] &= 0x7F;
        }
        SnSource::PubKeyHash | SnSource::DeviceSNHash => {
            out[0] &= 0x7F;
            out[0] |= 0x40;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp_cert_with_format(format: u8) -> [u8; 72] {
        let mut c = [0u8; 72];
        c[70] = format;
        c[71] = 0xA0;
        c
    }

    #[test]
    fn hash_message_format_0_has_no_second_byte() {
        let cc = comp_cert_with_format(0);
        let msg = build_hash_message(&cc, b"abc");
        assert_eq!(msg, vec![0u8, b'a', b'b', b'c']);
    }

    #[test]
    fn hash_message_format_1_includes_second_byte() {
        let cc = comp_cert_with_format(1);
        let msg = build_hash_message(&cc, b"abc");
        assert_eq!(msg, vec![1u8, 0xA0, b'a', b'b', b'c']);
    }

    #[test]
    fn pubkeyhash_sets_bit6_and_clears_bit7() {
        let cc = comp_cert_with_format(0);
        let dev_sn = [0u8; 9];
        let mut sn = [0u8; 16];
        generate_sn(SnSource::PubKeyHash, &cc, b"pubkey-bytes", &dev_sn, &mut sn);
        assert_eq!(sn[0] & 0x80, 0);
        assert_eq!(sn[0] & 0x40, 0x40);
    }

    #[test]
    fn pubkeyhashpos_clears_bit7_only() {
        let cc = comp_cert_with_format(0);
        let dev_sn = [0u8; 9];
        let mut sn_a = [0xFFu8; 16];
        generate_sn(SnSource::PubKeyHashPos, &cc, b"pubkey-bytes", &dev_sn, &mut sn_a);
        assert_eq!(sn_a[0] & 0x80, 0);
    }

    #[test]
    fn pubkeyhashraw_leaves_digest_untouched() {
        let cc = comp_cert_with_format(0);
        let dev_sn = [0u8; 9];
        let mut raw = [0u8; 32];
        let message = build_hash_message(&cc, b"pubkey-bytes");
        let expected = crypto::sha256(&message);
        generate_sn(SnSource::PubKeyHashRaw, &cc, b"pubkey-bytes", &dev_sn, &mut raw);
        assert_eq!(raw, expected.as_slice());
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let cc = comp_cert_with_format(2);
        let dev_sn = [0u8; 9];
        let mut a = [0u8; 20];
        let mut b = [0u8; 20];
        generate_sn(SnSource::DeviceSNHash, &cc, b"serial-1234", &dev_sn, &mut a);
        generate_sn(SnSource::DeviceSNHash, &cc, b"serial-1234", &dev_sn, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn device_sn_source_prefixes_with_0x40() {
        let cc = comp_cert_with_format(0);
        let dev_sn = [0x11u8; 9];
        let mut sn = [0u8; 10];
        generate_sn(SnSource::DeviceSN, &cc, b"", &dev_sn, &mut sn);
        assert_eq!(sn[0], 0x40);
        assert_eq!(&sn[1..], &dev_sn[..]);
    }

    #[test]
    fn signer_id_source_reads_comp_cert_bytes_67_68() {
        let mut cc = comp_cert_with_format(0);
        cc[67] = 0xAB;
        cc[68] = 0xCD;
        let dev_sn = [0u8; 9];
        let mut sn = [0u8; 3];
        generate_sn(SnSource::SignerID, &cc, b"", &dev_sn, &mut sn);
        assert_eq!(sn, [0x40, 0xAB, 0xCD]);
    }

    #[test]
    fn stored_and_stored_dynamic_leave_out_untouched() {
        let cc = comp_cert_with_format(0);
        let dev_sn = [0u8; 9];
        let mut sn = [0xEEu8; 8];
        generate_sn(SnSource::Stored, &cc, b"", &dev_sn, &mut sn);
        generate_sn(SnSource::StoredDynamic, &cc, b"", &dev_sn, &mut sn);
        assert_eq!(sn, [0xEEu8; 8]);
    }
}
