#![no_main]
use cryptoki_core::buffer::Buffer;
use libfuzzer_sys::fuzz_target;

// Drives Buffer's write/read/copy/set surface with arbitrary offsets and
// lengths drawn from the fuzz input; every call is expected to either
// succeed or return a bounds error, never panic.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let len = (data[0] as usize % 256) + 1;
    let mut buf = Buffer::owned(len);

    for chunk in data[1..].chunks(4) {
        if chunk.len() < 4 {
            break;
        }
        let op = chunk[0] % 4;
        let offset = chunk[1] as usize;
        let value = chunk[2];
        let n = chunk[3] as usize;

        match op {
            0 => {
                let src = vec![value; n.min(64)];
                let _ = buf.write_bytes(offset, &src);
            }
            1 => {
                let mut dest = vec![0u8; n.min(64)];
                let _ = buf.read_bytes(offset, &mut dest);
            }
            2 => {
                let _ = buf.set(offset, value, n.min(64));
            }
            _ => {
                let _ = buf.set_used(offset);
            }
        }
    }
});
