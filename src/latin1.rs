//! Shared encoding utilities: Latin-1 byte encoding and the length-keyed
//! string encryption used throughout the bytecode writer (§4.3's
//! "encrypted string" format). Distinct from the source rewriter's
//! key-table XOR scheme in `keytable.rs` — this one derives its one-byte
//! key from the payload's own length.

use crate::error::ShroudError;
use byteorder::{LittleEndian, WriteBytesExt};

/// Encode a Rust string as ISO-8859-1 / Latin-1 bytes.
pub fn encode(s: &str) -> Result<Vec<u8>, ShroudError> {
    let mut out = Vec::with_capacity(s.len());
    for (pos, ch) in s.char_indices() {
        let code = ch as u32;
        if code > 0xFF {
            return Err(ShroudError::NonLatin1Char { pos });
        }
        out.push(code as u8);
    }
    Ok(out)
}

/// Write the §4.3 "encrypted string" wire format: `Int(L+1)`, then the `L`
/// XOR'd payload bytes, then the single trailing key byte.
///
/// The key is `L mod 256`; every payload byte is XOR'd with it, and the key
/// itself is appended unencrypted as a self-describing terminator.
pub fn write_encrypted_string(out: &mut Vec<u8>, payload: &[u8]) {
    let len = payload.len();
    let key = (len % 256) as u8;
    out.write_i32::<LittleEndian>(len as i32 + 1)
        .expect("writing to a Vec<u8> cannot fail");
    for &b in payload {
        out.push(b ^ key);
    }
    out.push(key);
}
