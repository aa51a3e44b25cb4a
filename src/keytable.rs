//! Key-table generation and XOR encryption for the source rewriter's
//! inline decryptors. Unrelated to the length-derived single-byte key used
//! by the bytecode writer's own string encoding (`latin1.rs`).

use crate::rng::ShroudRng;

/// A random byte table embedded in one decryptor, sized to the literal(s)
/// it protects (bounded by the configured ceiling). Never reused across
/// independently generated decryptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyTable {
    bytes: Vec<u8>,
}

impl KeyTable {
    /// Generate a table sized `min(requested_len, ceiling)`, clamped to at
    /// least 1, filled from `rng`.
    pub fn generate(rng: &mut dyn ShroudRng, requested_len: usize, ceiling: usize) -> Self {
        let len = requested_len.min(ceiling).max(1);
        let mut bytes = vec![0u8; len];
        rng.fill(&mut bytes);
        KeyTable { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// XOR-encrypt `payload` against `key`, cycling the key table as needed.
pub fn xor_encrypt(payload: &[u8], key: &KeyTable) -> Vec<u8> {
    let table = key.as_bytes();
    payload.iter().enumerate().map(|(i, &b)| b ^ table[i % table.len()]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    #[test]
    fn generated_length_respects_ceiling_and_floor() {
        let mut rng = seeded_rng(0);
        assert_eq!(KeyTable::generate(&mut *rng, 100, 32).len(), 32);
        assert_eq!(KeyTable::generate(&mut *rng, 5, 32).len(), 5);
        assert_eq!(KeyTable::generate(&mut *rng, 0, 32).len(), 1);
    }

    #[test]
    fn xor_round_trips() {
        let mut rng = seeded_rng(1);
        let key = KeyTable::generate(&mut *rng, 4, 32);
        let payload = b"protected payload bytes";
        let cipher = xor_encrypt(payload, &key);
        let plain = xor_encrypt(&cipher, &key);
        assert_eq!(plain, payload);
    }
}
