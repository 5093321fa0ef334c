//! PKCS#7 block padding.
//!
//! Rounds data up to a whole number of `blocksize` blocks, always appending at
//! least one padding byte (so a buffer that already lands on a block boundary
//! gets a full extra block of padding, never zero).

use crate::error::Rv;

/// Returns the padded length for `datalen` bytes at the given block size.
#[must_use]
pub fn padded_len(datalen: usize, blocksize: u8) -> usize {
    let blocksize = blocksize as usize;
    if datalen < blocksize {
        blocksize
    } else {
        (datalen / blocksize) * blocksize + blocksize
    }
}

/// Appends PKCS#7 padding to `data` in place, growing it to a block multiple.
pub fn pad(data: &mut Vec<u8>, blocksize: u8) -> Result<(), Rv> {
    if blocksize == 0 {
        return Err(Rv::ArgumentsBad);
    }
    let datalen = data.len();
    let outlen = padded_len(datalen, blocksize);
    let padsym = (outlen - datalen) as u8;
    data.resize(outlen, padsym);
    Ok(())
}

/// Validates and strips PKCS#7 padding from `data` in place.
///
/// The padding byte must be in `1..=blocksize` and every one of the trailing
/// `padsym` bytes must equal it; any deviation is rejected without mutating
/// `data`.
pub fn unpad(data: &mut Vec<u8>, blocksize: u8) -> Result<(), Rv> {
    let Some(&padsym) = data.last() else {
        return Err(Rv::ArgumentsBad);
    };
    if padsym == 0 || padsym > blocksize {
        return Err(Rv::GeneralError);
    }
    let padsym = padsym as usize;
    if padsym > data.len() {
        return Err(Rv::GeneralError);
    }
    let outlen = data.len() - padsym;
    if !data[outlen..].iter().all(|&b| b as usize == padsym) {
        return Err(Rv::GeneralError);
    }
    data.truncate(outlen);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_short_input_fills_one_block() {
        let mut data = vec![1, 2, 3];
        pad(&mut data, 8).unwrap();
        assert_eq!(data, vec![1, 2, 3, 5, 5, 5, 5, 5]);
    }

    #[test]
    fn pad_exact_block_adds_full_block() {
        let mut data = vec![0u8; 8];
        pad(&mut data, 8).unwrap();
        assert_eq!(data.len(), 16);
        assert!(data[8..].iter().all(|&b| b == 8));
    }

    #[test]
    fn unpad_reverses_pad() {
        let original = vec![1, 2, 3, 4, 5];
        let mut data = original.clone();
        pad(&mut data, 16).unwrap();
        unpad(&mut data, 16).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn unpad_rejects_zero_pad_symbol() {
        let mut data = vec![1, 2, 0];
        assert_eq!(unpad(&mut data, 8), Err(Rv::GeneralError));
    }

    #[test]
    fn unpad_rejects_inconsistent_padding() {
        let mut data = vec![1, 2, 3, 3, 4];
        assert_eq!(unpad(&mut data, 8), Err(Rv::GeneralError));
    }

    #[test]
    fn unpad_rejects_pad_symbol_over_blocksize() {
        let mut data = vec![1, 2, 9];
        assert_eq!(unpad(&mut data, 8), Err(Rv::GeneralError));
    }

    // NIST-style vector: 5-byte message, 8-byte block -> pad symbol 0x03.
    #[test]
    fn known_vector_five_byte_message_eight_byte_block() {
        let mut data = b"\x01\x02\x03\x04\x05".to_vec();
        pad(&mut data, 8).unwrap();
        assert_eq!(data, b"\x01\x02\x03\x04\x05\x03\x03\x03");
    }
}
