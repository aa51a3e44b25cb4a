//! The chunk serializer: walks a `Chunk` tree depth-first and emits the
//! deliberately non-standard binary described in the wire format notes
//! below. No standard Lua VM can load this output without the
//! out-of-band opcode permutation and field-layout knowledge held by the
//! paired runtime.

use byteorder::{LittleEndian, WriteBytesExt};
use log::trace;

use crate::chunk::Chunk;
use crate::constant::Constant;
use crate::error::Result;
use crate::latin1::write_encrypted_string;
use crate::opcode::OpcodePermutation;
use crate::rng::{self, ShroudRng};

const MAGIC: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
const VERSION_BYTE: u8 = 0x80;
const FORMAT_BYTE: u8 = 0x00;
const ENDIAN_MARKER: u8 = 0xAA;
const INT_SIZE: u8 = 0x04;
const SIZE_T_SIZE: u8 = 0x04;
const INSTRUCTION_SIZE: u8 = 0x04;
const NUMBER_SIZE: u8 = 0x08;
const NUMBER_FORMAT: u8 = 0x00;

const CONST_TAG_NIL: u8 = 0x00;
const CONST_TAG_BOOLEAN: u8 = 0x01;
const CONST_TAG_NUMBER: u8 = 0xCA;
const CONST_TAG_STRING: u8 = 0xAB;
const CONST_TAG_UNKNOWN: u8 = 0xCC;

const JUNK_DEBUG_WORD: i32 = 0xDEAD_BEEFu32 as i32;

/// Serializes `Chunk` trees into the obfuscated binary format. Each
/// instance owns a single, freshly drawn opcode permutation (§4.1); reuse
/// one instance across a whole module so that every emitted chunk in a
/// single file shares the same (unrecoverable without the runtime's
/// out-of-band table) opcode scramble.
pub struct ChunkSerializer {
    permutation: OpcodePermutation,
}

impl ChunkSerializer {
    /// Build a serializer with a fresh, non-deterministic opcode
    /// permutation.
    pub fn new() -> Self {
        let mut rng = rng::default_rng();
        Self::with_rng(&mut *rng)
    }

    /// Build a serializer from an explicit randomness source; used by tests
    /// that need a reproducible permutation.
    pub fn with_rng(rng: &mut dyn ShroudRng) -> Self {
        ChunkSerializer { permutation: OpcodePermutation::generate(rng) }
    }

    /// Serialize `chunk` (and its descendants) to a byte buffer, including
    /// the stream header.
    pub fn write_chunk(&self, chunk: &mut Chunk) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_header(&mut out);
        self.write_body(&mut out, chunk)?;
        Ok(out)
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&MAGIC);
        out.push(VERSION_BYTE);
        out.push(FORMAT_BYTE);
        out.push(ENDIAN_MARKER);
        out.push(INT_SIZE);
        out.push(SIZE_T_SIZE);
        out.push(INSTRUCTION_SIZE);
        out.push(NUMBER_SIZE);
        out.push(NUMBER_FORMAT);
    }

    fn write_body(&self, out: &mut Vec<u8>, chunk: &mut Chunk) -> Result<()> {
        match chunk.source_name.as_ref().filter(|s| !s.is_empty()) {
            Some(name) => write_encrypted_string(out, name),
            None => out.write_i32::<LittleEndian>(0).expect("Vec write cannot fail"),
        }

        out.write_i32::<LittleEndian>(chunk.first_line).expect("Vec write cannot fail");
        out.write_i32::<LittleEndian>(chunk.last_line).expect("Vec write cannot fail");

        out.push(chunk.num_upvalues);
        out.push(chunk.num_params);
        out.push(chunk.is_vararg);
        out.push(chunk.max_stack_size);

        chunk.recompute_derived_state();

        out.write_i32::<LittleEndian>(chunk.instructions.len() as i32)
            .expect("Vec write cannot fail");
        for inst in &chunk.instructions {
            let word = inst.encode(&self.permutation)?;
            out.write_u32::<LittleEndian>(word).expect("Vec write cannot fail");
        }

        out.write_i32::<LittleEndian>(chunk.constants.len() as i32)
            .expect("Vec write cannot fail");
        for constant in &chunk.constants {
            self.write_constant(out, constant);
        }

        out.write_i32::<LittleEndian>(chunk.children.len() as i32)
            .expect("Vec write cannot fail");
        for child in &mut chunk.children {
            self.write_body(out, child)?;
        }

        for _ in 0..3 {
            out.write_i32::<LittleEndian>(JUNK_DEBUG_WORD).expect("Vec write cannot fail");
        }

        Ok(())
    }

    fn write_constant(&self, out: &mut Vec<u8>, constant: &Constant) {
        match constant {
            Constant::Nil => out.push(CONST_TAG_NIL),
            Constant::Boolean(b) => {
                out.push(CONST_TAG_BOOLEAN);
                out.push(if *b { 1 } else { 0 });
            }
            Constant::Number(n) => {
                out.push(CONST_TAG_NUMBER);
                out.write_f64::<LittleEndian>(*n).expect("Vec write cannot fail");
            }
            Constant::String(bytes) => {
                out.push(CONST_TAG_STRING);
                write_encrypted_string(out, bytes);
            }
            #[allow(unreachable_patterns)]
            _ => {
                trace!("emitting defensive 0xCC tag for unrecognized constant variant");
                out.push(CONST_TAG_UNKNOWN);
            }
        }
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::instruction::Instruction;
    use crate::opcode::Opcode;
    use crate::rng::seeded_rng;

    #[test]
    fn header_only_chunk_matches_worked_example() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        let out = serializer.write_chunk(&mut chunk).unwrap();
        assert_eq!(
            &out[0..12],
            &[0xDE, 0xAD, 0xBE, 0xEF, 0x80, 0x00, 0xAA, 0x04, 0x04, 0x04, 0x08, 0x00]
        );
        assert_eq!(&out[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn zero_counts_and_junk_trailer_are_present() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        let out = serializer.write_chunk(&mut chunk).unwrap();
        // header(12) + name(4) + lines(8) + 4 bytes + inst count(4) + const
        // count(4) + child count(4) = 40, then 12 bytes of junk trailer.
        assert_eq!(out.len(), 40 + 12);
        let trailer = &out[out.len() - 12..];
        for chunk4 in trailer.chunks(4) {
            assert_eq!(chunk4, &[0xEF, 0xBE, 0xAD, 0xDE]);
        }
    }

    #[test]
    fn string_constant_matches_worked_example() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        chunk.constants.push(Constant::String(b"abc".to_vec()));
        let out = serializer.write_chunk(&mut chunk).unwrap();
        // Locate the tag byte: header(12) + name(4) + lines(8) + 4 bytes +
        // inst count(4) = 32, then constant count(4) = 36, then tag.
        let tag_pos = 36;
        assert_eq!(out[tag_pos], CONST_TAG_STRING);
        assert_eq!(&out[tag_pos + 1..tag_pos + 5], &[4, 0, 0, 0]);
        assert_eq!(out[tag_pos + 5], b'a' ^ 3);
        assert_eq!(out[tag_pos + 6], b'b' ^ 3);
        assert_eq!(out[tag_pos + 7], b'c' ^ 3);
        assert_eq!(out[tag_pos + 8], 3);
    }

    #[test]
    fn number_constant_round_trips_as_le_f64() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        chunk.constants.push(Constant::Number(3.5));
        let out = serializer.write_chunk(&mut chunk).unwrap();
        let tag_pos = 36;
        assert_eq!(out[tag_pos], CONST_TAG_NUMBER);
        let bytes: [u8; 8] = out[tag_pos + 1..tag_pos + 9].try_into().unwrap();
        assert_eq!(f64::from_le_bytes(bytes), 3.5);
    }

    #[test]
    fn boolean_constant_emits_tag_and_byte() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        chunk.constants.push(Constant::Boolean(true));
        chunk.constants.push(Constant::Nil);
        let out = serializer.write_chunk(&mut chunk).unwrap();
        let tag_pos = 36;
        assert_eq!(out[tag_pos], CONST_TAG_BOOLEAN);
        assert_eq!(out[tag_pos + 1], 1);
        assert_eq!(out[tag_pos + 2], CONST_TAG_NIL);
    }

    #[test]
    fn move_instruction_word_matches_permutation() {
        let mut rng = seeded_rng(5);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        chunk.instructions.push(Instruction::abc(Opcode::Move, 1, 2, 0));
        let out = serializer.write_chunk(&mut chunk).unwrap();
        let inst_count_pos = 12 + 4 + 8 + 4;
        assert_eq!(&out[inst_count_pos..inst_count_pos + 4], &[1, 0, 0, 0]);
        let word_pos = inst_count_pos + 4;
        let word = u32::from_le_bytes(out[word_pos..word_pos + 4].try_into().unwrap());
        let expected = Instruction::abc(Opcode::Move, 1, 2, 0).encode(&serializer.permutation).unwrap();
        assert_eq!(word, expected);
    }

    #[test]
    fn nested_child_chunk_shares_permutation_and_emits_own_trailer() {
        let mut rng = seeded_rng(11);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut child = Chunk::empty();
        child.instructions.push(Instruction::abc(Opcode::Add, 2, 1, 1));
        let mut parent = Chunk::empty();
        parent.children.push(child);
        let out = serializer.write_chunk(&mut parent).unwrap();

        // parent child-count field: header(12)+name(4)+lines(8)+4+instcount(4)+constcount(4) = 36
        let child_count_pos = 36;
        assert_eq!(&out[child_count_pos..child_count_pos + 4], &[1, 0, 0, 0]);

        // The child's own instruction word must use the same permutation the
        // parent's instructions would, since one serializer instance owns a
        // single permutation for the whole tree.
        let expected = Instruction::abc(Opcode::Add, 2, 1, 1).encode(&serializer.permutation).unwrap();
        let word_bytes = expected.to_le_bytes();
        assert!(out.windows(4).any(|w| w == word_bytes));

        // Three trailer DEADBEEF words for the parent, three more for the
        // child: 24 bytes of trailer total across the whole buffer.
        let trailer_words = out
            .windows(4)
            .filter(|w| *w == [0xEF, 0xBE, 0xAD, 0xDE])
            .count();
        assert!(trailer_words >= 6);
    }

    #[test]
    fn oversized_operand_aborts_emission() {
        let mut rng = seeded_rng(0);
        let serializer = ChunkSerializer::with_rng(&mut *rng);
        let mut chunk = Chunk::empty();
        chunk.instructions.push(Instruction::abc(Opcode::Add, 999, 0, 0));
        assert!(serializer.write_chunk(&mut chunk).is_err());
    }
}
