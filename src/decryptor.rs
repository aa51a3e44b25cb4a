//! Emission of the self-contained Lua decryptor expression that replaces an
//! encrypted literal in place.
//!
//! The `xor_op` body is the standard Lua 5.1 bitwise-XOR-over-arithmetic
//! idiom: Lua 5.1 has no `bit` library, so XOR is built from repeated
//! division-by-two and digit comparison.

use crate::keytable::KeyTable;

/// Render `bytes` as a sequence of three-digit decimal Lua escapes, e.g.
/// `b"hi"` becomes `"\104\105"`.
fn decimal_escapes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 4);
    for &b in bytes {
        s.push_str(&format!("\\{:03}", b));
    }
    s
}

/// Build the inline decryptor expression for `ciphertext` under `key`.
///
/// `id` is a unique, human-readable label embedded as a leading Lua
/// comment; it has no runtime meaning and consumers must not depend on it.
pub fn emit(id: usize, key: &KeyTable, ciphertext: &[u8]) -> String {
    let key_str = decimal_escapes(key.as_bytes());
    let cipher_str = decimal_escapes(ciphertext);
    format!(
        "--[[shroud:dec{id}]]\
((function(data) \
local function xor_op(a,b) \
local p,c=1,0; \
while a>0 or b>0 do \
local ra,rb=a%2,b%2; \
if ra~=rb then c=c+p end; \
a,b,p=(a-ra)/2,(b-rb)/2,p*2; \
end; \
return c; \
end; \
local key_str=\"{key_str}\"; \
local key_len={key_len}; \
local res={{}}; \
local byte=string.byte; \
local char=string.char; \
local len=#data; \
for i=1,len do \
res[i]=char(xor_op(byte(data,i), byte(key_str,(i-1)%key_len+1))); \
end; \
return table.concat(res); \
end)(\"{cipher_str}\"))",
        id = id,
        key_str = key_str,
        key_len = key.len(),
        cipher_str = cipher_str,
    )
}
