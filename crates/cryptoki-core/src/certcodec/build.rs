//! Three-phase Start/Process/Finish certificate build protocol (§4.2.2).
//!
//! Reconstructs a full DER certificate from a [`CertificateDefinition`]
//! template plus the device data the planner in [`super::device_loc`]
//! determined was needed. `Start` seeds the build state from the template,
//! `Process` installs one device read at a time as it arrives, and `Finish`
//! computes and installs a generated serial number.

use super::der::{encode_length, parse_length};
use super::device_loc::DeviceLocation;
use super::serial::{generate_sn, SnSource};
use crate::error::{CkResult, Rv};
use cryptoki_membrane::crypto;

/// Legacy devices split the device serial number across two config-zone
/// ranges; handle-family devices store it contiguously. Only the split
/// affects how `device_sn` bytes are assembled in `Process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    Legacy,
    HandleFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertType {
    X509,
    X509FullStored,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    Iso8601,
    Rfc5280Utc,
    Rfc5280Gen,
    PosixUintBe,
    PosixUintAscii,
    CompCert,
}

/// Index into a [`CertificateDefinition`]'s standard-element table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdElem {
    CertSn,
    Signature,
    IssueDate,
    ExpireDate,
    SignerId,
    SubjKeyId,
    AuthKeyId,
    PublicKey,
    Subject,
    SubjCommonName,
}

pub const STD_ELEM_COUNT: usize = 10;

/// One entry of the standard-element table: where in the template buffer
/// that element lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElemLoc {
    pub offset: usize,
    pub count: usize,
}

impl ElemLoc {
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.count == 0
    }
}

/// A byte-transform stage applied along a custom element's transform
/// chain (§4.2.2 Process / custom element).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    Reverse,
    Bin2HexUpper,
    Bin2HexLower,
    Bin2HexUpperSpace,
    Bin2HexLowerSpace,
    Hex2BinUpper,
    Hex2BinLower,
    Hex2BinUpperSpace,
    Hex2BinLowerSpace,
}

fn hex_digit(nibble: u8, upper: bool) -> u8 {
    let table: &[u8; 16] = if upper { b"0123456789ABCDEF" } else { b"0123456789abcdef" };
    table[(nibble & 0x0F) as usize]
}

fn bin_to_hex(input: &[u8], upper: bool, space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() * if space { 3 } else { 2 });
    for (i, b) in input.iter().enumerate() {
        if space && i > 0 {
            out.push(b' ');
        }
        out.push(hex_digit(b >> 4, upper));
        out.push(hex_digit(*b & 0x0F, upper));
    }
    out
}

fn hex_val(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

fn hex_to_bin(input: &[u8], space: bool) -> CkResult<Vec<u8>> {
    let filtered: Vec<u8> = if space {
        input.iter().copied().filter(|&b| b != b' ').collect()
    } else {
        input.to_vec()
    };
    if filtered.len() % 2 != 0 {
        return Err(Rv::DataInvalid);
    }
    let mut out = Vec::with_capacity(filtered.len() / 2);
    for pair in filtered.chunks(2) {
        let hi = hex_val(pair[0]).ok_or(Rv::DataInvalid)?;
        let lo = hex_val(pair[1]).ok_or(Rv::DataInvalid)?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Applies one transform stage to `input`.
pub fn apply_transform(kind: Transform, input: &[u8]) -> CkResult<Vec<u8>> {
    match kind {
        Transform::None => Ok(input.to_vec()),
        Transform::Reverse => {
            let mut v = input.to_vec();
            v.reverse();
            Ok(v)
        }
        Transform::Bin2HexUpper => Ok(bin_to_hex(input, true, false)),
        Transform::Bin2HexLower => Ok(bin_to_hex(input, false, false)),
        Transform::Bin2HexUpperSpace => Ok(bin_to_hex(input, true, true)),
        Transform::Bin2HexLowerSpace => Ok(bin_to_hex(input, false, true)),
        Transform::Hex2BinUpper | Transform::Hex2BinLower => hex_to_bin(input, false),
        Transform::Hex2BinUpperSpace | Transform::Hex2BinLowerSpace => hex_to_bin(input, true),
    }
}

/// Runs a ping-pong chain of up to `N` transform stages, per §4.2.2.
pub fn run_transform_chain(chain: &[Transform], input: &[u8]) -> CkResult<Vec<u8>> {
    let mut current = input.to_vec();
    for &stage in chain {
        current = apply_transform(stage, &current)?;
    }
    Ok(current)
}

/// One custom element: a device read installed into a fixed cert-buffer
/// range after running its transform chain.
#[derive(Debug, Clone)]
pub struct CustomElement {
    pub device_loc: DeviceLocation,
    pub cert_loc: ElemLoc,
    pub transforms: Vec<Transform>,
}

/// Immutable per-certificate-type template (spec §3 `CertificateDefinition`).
#[derive(Debug, Clone)]
pub struct CertificateDefinition {
    pub cert_type: CertType,
    pub date_format: DateFormat,
    pub default_expire_years: u8,
    pub template_id: u8,
    pub chain_id: u8,
    pub sn_source: SnSource,
    pub template: Vec<u8>,
    pub standard_elements: [ElemLoc; STD_ELEM_COUNT],
    pub comp_cert_loc: DeviceLocation,
    pub pubkey_loc: DeviceLocation,
    pub serial_loc: DeviceLocation,
    pub custom_elements: Vec<CustomElement>,
}

impl CertificateDefinition {
    #[must_use]
    pub fn elem(&self, which: StdElem) -> ElemLoc {
        self.standard_elements[which as usize]
    }
}

/// Build-in-progress state threaded through Start/Process/Finish.
#[derive(Debug)]
pub struct BuildState {
    pub cert_def: CertificateDefinition,
    pub cert: Vec<u8>,
    pub cert_size: usize,
    pub max_cert_size: usize,
    pub comp_cert: [u8; 128],
    pub is_device_sn: bool,
    pub is_comp_cert: bool,
    pub device_sn: [u8; 16],
    pub devtype: DeviceFamily,
}

/// Validates that `cert[0..]` is a well-formed outer SEQUENCE whose
/// encoded length matches the buffer, per Start step 3.
fn validate_der_sequence(cert: &[u8]) -> CkResult<()> {
    if cert.len() < 2 || cert[0] != 0x30 {
        return Err(Rv::BadCert);
    }
    let (len, len_bytes) = parse_length(cert, 1).map_err(|_| Rv::BadCert)?;
    if cert.len() != 1 + len_bytes + len {
        return Err(Rv::BadCert);
    }
    Ok(())
}

fn splice_fixed(cert: &mut [u8], loc: ElemLoc, data: &[u8]) -> CkResult<()> {
    if loc.is_absent() {
        return Ok(());
    }
    let end = loc.offset.checked_add(loc.count).ok_or(Rv::ElemOutOfBounds)?;
    if end > cert.len() {
        return Err(Rv::ElemOutOfBounds);
    }
    let n = data.len().min(loc.count);
    cert[loc.offset..loc.offset + n].copy_from_slice(&data[..n]);
    if n < loc.count {
        cert[loc.offset + n..end].fill(0);
    }
    Ok(())
}

impl BuildState {
    /// `Start(device, cert_def, cert_buffer, ca_public_key?)`.
    pub fn start(
        devtype: DeviceFamily,
        cert_def: CertificateDefinition,
        max_cert_size: usize,
        ca_public_key: Option<(&[u8], &[u8])>,
    ) -> CkResult<Self> {
        let template_len = cert_def.template.len();
        if template_len > max_cert_size {
            return Err(Rv::BufferTooSmall);
        }
        let mut cert = vec![0u8; max_cert_size];
        cert[..template_len].copy_from_slice(&cert_def.template);
        validate_der_sequence(&cert[..template_len])?;

        let mut state = BuildState {
            cert_def,
            cert,
            cert_size: template_len,
            max_cert_size,
            comp_cert: [0u8; 128],
            is_device_sn: false,
            is_comp_cert: false,
            device_sn: [0u8; 16],
            devtype,
        };

        if let Some((x, y)) = ca_public_key {
            let mut msg = vec![0x04u8];
            msg.extend_from_slice(x);
            msg.extend_from_slice(y);
            let digest = crypto::sha1(&msg);
            let loc = state.cert_def.elem(StdElem::AuthKeyId);
            splice_fixed(&mut state.cert[..state.cert_size], loc, &digest)?;
        }
        Ok(state)
    }

    fn cert_slice_mut(&mut self) -> &mut [u8] {
        let size = self.cert_size;
        &mut self.cert[..size]
    }

    /// Installs a public key, padding-stripped for legacy 72-byte reads,
    /// and derives `SUBJ_KEY_ID` as `SHA-1(0x04 ‖ key)`.
    fn set_subj_public_key(&mut self, key: &[u8]) -> CkResult<()> {
        let key = if key.len() == 72 { &key[..64] } else { key };
        let loc = self.cert_def.elem(StdElem::PublicKey);
        splice_fixed(self.cert_slice_mut(), loc, key)?;
        let mut msg = vec![0x04u8];
        msg.extend_from_slice(key);
        let digest = crypto::sha1(&msg);
        let ski_loc = self.cert_def.elem(StdElem::SubjKeyId);
        splice_fixed(self.cert_slice_mut(), ski_loc, &digest)
    }

    /// Installs a compressed-cert record, driving `signature`, dates, and
    /// signer-id from its decoded fields.
    fn set_comp_cert(&mut self, comp_cert_bytes: &[u8]) -> CkResult<()> {
        let n = comp_cert_bytes.len().min(128);
        self.comp_cert[..n].copy_from_slice(&comp_cert_bytes[..n]);
        self.is_comp_cert = true;

        let decoded = super::compress::unpack(comp_cert_bytes).map_err(|_| Rv::BadCert)?;
        let sig_loc = self.cert_def.elem(StdElem::Signature);
        splice_fixed(self.cert_slice_mut(), sig_loc, &decoded.signature)?;

        let signer_id = decoded.signer_id.to_be_bytes();
        let signer_loc = self.cert_def.elem(StdElem::SignerId);
        splice_fixed(self.cert_slice_mut(), signer_loc, &signer_id)?;
        Ok(())
    }

    /// `Process(device_loc, device_data)`: installs one device read if it
    /// encompasses the matching certificate-definition region.
    pub fn process(&mut self, device_loc: DeviceLocation, device_data: &[u8]) -> CkResult<()> {
        let sn_loc = self.cert_def.serial_loc;
        if !sn_loc.is_absent() && device_loc.encompasses(&sn_loc) {
            let loc = self.cert_def.elem(StdElem::CertSn);
            self.set_cert_sn(device_data)?;
            let _ = loc;
        }

        let pk_loc = self.cert_def.pubkey_loc;
        if !pk_loc.is_absent() && device_loc.encompasses(&pk_loc) {
            self.set_subj_public_key(device_data)?;
        }

        let cc_loc = self.cert_def.comp_cert_loc;
        if !cc_loc.is_absent() && device_loc.encompasses(&cc_loc) {
            self.set_comp_cert(device_data)?;
        }

        for custom in self.cert_def.custom_elements.clone() {
            if device_loc.encompasses(&custom.device_loc) {
                let transformed = run_transform_chain(&custom.transforms, device_data)?;
                splice_fixed(self.cert_slice_mut(), custom.cert_loc, &transformed)?;
            }
        }

        if self.cert_def.sn_source.is_generated() {
            let synthetic = DeviceLocation {
                zone: sn_loc.zone,
                slot: sn_loc.slot,
                is_genkey: sn_loc.is_genkey,
                offset: 0,
                count: if device_loc.zone == super::device_loc::Zone::Config { 16 } else { 0 },
            };
            if device_loc.zone == super::device_loc::Zone::Config && device_loc.encompasses(&synthetic) {
                self.is_device_sn = true;
                let n = device_data.len().min(self.device_sn.len());
                self.device_sn[..n].copy_from_slice(&device_data[..n]);
            }
        }
        Ok(())
    }

    /// Writes `new_sn` at the `CERT_SN` element, resizing the cert buffer
    /// via the DER-length adjuster when the new length differs from the
    /// element's template-recorded length.
    fn set_cert_sn(&mut self, new_sn: &[u8]) -> CkResult<()> {
        let loc = self.cert_def.elem(StdElem::CertSn);
        if loc.is_absent() {
            return Ok(());
        }
        if new_sn.len() == loc.count {
            return splice_fixed(self.cert_slice_mut(), loc, new_sn);
        }
        let mut cert = self.cert[..self.cert_size].to_vec();
        super::der::resize_serial_number(&mut cert, loc.offset, loc.count, new_sn, self.max_cert_size)?;
        self.cert_size = cert.len();
        self.cert[..cert.len()].copy_from_slice(&cert);
        Ok(())
    }

    /// `Finish`: computes and installs a generated serial number (skipped
    /// for `Stored`/`StoredDynamic` sources), returning the final DER bytes.
    pub fn finish(mut self) -> CkResult<Vec<u8>> {
        if self.cert_def.sn_source.is_generated() {
            let loc = self.cert_def.elem(StdElem::CertSn);
            let sn_len = if loc.is_absent() { 20 } else { loc.count };
            let mut sn = vec![0u8; sn_len];
            let pk_loc = self.cert_def.elem(StdElem::PublicKey);
            let pubkey = if pk_loc.is_absent() {
                Vec::new()
            } else {
                self.cert[pk_loc.offset..pk_loc.offset + pk_loc.count].to_vec()
            };
            let comp_cert: [u8; 72] = self.comp_cert[..72].try_into().expect("comp_cert is 128 bytes");
            let device_sn9: [u8; 9] = self.device_sn[..9].try_into().expect("device_sn is 16 bytes");
            generate_sn(self.cert_def.sn_source, &comp_cert, &pubkey, &device_sn9, &mut sn);
            self.set_cert_sn(&sn)?;
        }
        Ok(self.cert[..self.cert_size].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::super::device_loc::Zone;
    use super::*;

    fn der_cert(body_extra: &[u8]) -> Vec<u8> {
        // outer SEQUENCE { TBS SEQUENCE { fixed fields ++ body_extra } }
        let mut tbs_body = vec![0u8; 10];
        tbs_body.extend_from_slice(body_extra);
        let mut tbs = vec![0x30u8];
        tbs.extend(encode_length(tbs_body.len()));
        tbs.extend_from_slice(&tbs_body);
        let mut outer = vec![0x30u8];
        outer.extend(encode_length(tbs.len()));
        outer.extend_from_slice(&tbs);
        outer
    }

    fn empty_def(template: Vec<u8>, sn_source: SnSource) -> CertificateDefinition {
        CertificateDefinition {
            cert_type: CertType::X509,
            date_format: DateFormat::CompCert,
            default_expire_years: 5,
            template_id: 1,
            chain_id: 0,
            sn_source,
            template,
            standard_elements: [ElemLoc::default(); STD_ELEM_COUNT],
            comp_cert_loc: DeviceLocation::absent(),
            pubkey_loc: DeviceLocation::absent(),
            serial_loc: DeviceLocation::absent(),
            custom_elements: Vec::new(),
        }
    }

    #[test]
    fn start_rejects_malformed_template() {
        let def = empty_def(vec![0x31, 0x00], SnSource::Stored);
        let err = BuildState::start(DeviceFamily::Legacy, def, 256, None).unwrap_err();
        assert_eq!(err, Rv::BadCert);
    }

    #[test]
    fn start_then_finish_with_stored_sn_is_passthrough() {
        let template = der_cert(&[]);
        let def = empty_def(template.clone(), SnSource::Stored);
        let state = BuildState::start(DeviceFamily::Legacy, def, 256, None).unwrap();
        let out = state.finish().unwrap();
        assert_eq!(out, template);
    }

    #[test]
    fn custom_element_hex_encodes_device_data() {
        let template = der_cert(&[0u8; 6]);
        let mut def = empty_def(template, SnSource::Stored);
        let sn_offset = 11; // inside tbs_body past the 10 fixed bytes
        def.custom_elements.push(CustomElement {
            device_loc: DeviceLocation { zone: Zone::Data, slot: 0, is_genkey: false, offset: 0, count: 3 },
            cert_loc: ElemLoc { offset: sn_offset, count: 6 },
            transforms: vec![Transform::Bin2HexLower],
        });
        let mut state = BuildState::start(DeviceFamily::Legacy, def, 256, None).unwrap();
        let dev_loc = DeviceLocation { zone: Zone::Data, slot: 0, is_genkey: false, offset: 0, count: 3 };
        state.process(dev_loc, &[0xDE, 0xAD, 0xBE]).unwrap();
        let out = state.finish().unwrap();
        assert_eq!(&out[sn_offset..sn_offset + 6], b"deadbe");
    }

    #[test]
    fn device_sn_source_generates_serial_from_process_data() {
        let template = der_cert(&[0u8; 10]);
        let mut def = empty_def(template, SnSource::DeviceSN);
        def.standard_elements[StdElem::CertSn as usize] = ElemLoc { offset: 11, count: 10 };
        def.serial_loc = DeviceLocation { zone: Zone::Config, slot: 0, is_genkey: false, offset: 0, count: 16 };
        let mut state = BuildState::start(DeviceFamily::Legacy, def, 256, None).unwrap();
        let dev_loc = DeviceLocation { zone: Zone::Config, slot: 0, is_genkey: false, offset: 0, count: 16 };
        state.process(dev_loc, &[0x11u8; 16]).unwrap();
        let out = state.finish().unwrap();
        assert_eq!(out[11], 0x40);
        assert_eq!(&out[12..21], &[0x11u8; 9]);
    }
}
