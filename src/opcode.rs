//! The 40 opcodes recognized by this tool and the randomized permutation
//! used to scramble their on-disk indices.
//!
//! Lua 5.1 itself defines 38 VM opcodes (`OP_MOVE` through `OP_VARARG`).
//! This tool reserves two additional slots (`ExtFlag0`, `ExtFlag1`) beyond
//! stock Lua so the permutation's domain is a round 40 and so a disassembler
//! that hardcodes Lua's 38-opcode table cannot even index consistently into
//! ours. They carry no VM semantics; the paired runtime never emits them.

use crate::error::ShroudError;
use crate::rng::ShroudRng;

/// The canonical (unobfuscated) Lua opcode set, in Lua 5.1 source order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Move = 0,
    LoadK,
    LoadBool,
    LoadNil,
    GetUpval,
    GetGlobal,
    GetTable,
    SetGlobal,
    SetUpval,
    SetTable,
    NewTable,
    SelfOp,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForLoop,
    SetList,
    Close,
    Closure,
    Vararg,
    ExtFlag0,
    ExtFlag1,
}

/// Total count of recognized opcodes; the permutation's domain and range.
pub const OPCODE_COUNT: usize = 40;

impl Opcode {
    /// This opcode's canonical (pre-permutation) index.
    pub fn canonical_index(self) -> u8 {
        self as u8
    }
}

/// A random bijection from canonical opcode index to on-disk 6-bit index.
///
/// Built once per serializer instance; the inverse is never emitted, by
/// design (see spec notes on out-of-band consumer state).
#[derive(Clone, Debug)]
pub struct OpcodePermutation {
    forward: [u8; OPCODE_COUNT],
}

impl OpcodePermutation {
    /// Draw a fresh random permutation using the given randomness source.
    pub fn generate(rng: &mut dyn ShroudRng) -> Self {
        let mut indices: [u8; OPCODE_COUNT] = [0; OPCODE_COUNT];
        for (i, slot) in indices.iter_mut().enumerate() {
            *slot = i as u8;
        }
        // Fisher-Yates shuffle.
        for i in (1..OPCODE_COUNT).rev() {
            let j = rng.below(i + 1);
            indices.swap(i, j);
        }
        OpcodePermutation { forward: indices }
    }

    /// The obfuscated 6-bit index for a canonical opcode.
    pub fn encode(&self, op: Opcode) -> u8 {
        self.forward[op.canonical_index() as usize]
    }

    /// Validate the permutation is a bijection on `[0, OPCODE_COUNT)`.
    /// Intended for tests; production construction via `generate` always
    /// upholds this by construction.
    pub fn is_bijection(&self) -> bool {
        let mut seen = [false; OPCODE_COUNT];
        for &v in self.forward.iter() {
            let v = v as usize;
            if v >= OPCODE_COUNT || seen[v] {
                return false;
            }
            seen[v] = true;
        }
        true
    }
}

pub fn opcode_from_canonical(index: u8) -> Result<Opcode, ShroudError> {
    use Opcode::*;
    const TABLE: [Opcode; OPCODE_COUNT] = [
        Move, LoadK, LoadBool, LoadNil, GetUpval, GetGlobal, GetTable, SetGlobal, SetUpval,
        SetTable, NewTable, SelfOp, Add, Sub, Mul, Div, Mod, Pow, Unm, Not, Len, Concat, Jmp, Eq,
        Lt, Le, Test, TestSet, Call, TailCall, Return, ForLoop, ForPrep, TForLoop, SetList, Close,
        Closure, Vararg, ExtFlag0, ExtFlag1,
    ];
    TABLE
        .get(index as usize)
        .copied()
        .ok_or(ShroudError::UnknownOpcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded_rng;

    #[test]
    fn permutation_is_bijection_across_many_seeds() {
        for seed in 0..64u64 {
            let mut rng = seeded_rng(seed);
            let perm = OpcodePermutation::generate(&mut *rng);
            assert!(perm.is_bijection(), "seed {} produced a non-bijection", seed);
        }
    }

    #[test]
    fn deterministic_seed_is_reproducible() {
        let mut rng_a = seeded_rng(42);
        let mut rng_b = seeded_rng(42);
        let perm_a = OpcodePermutation::generate(&mut *rng_a);
        let perm_b = OpcodePermutation::generate(&mut *rng_b);
        assert_eq!(perm_a.forward, perm_b.forward);
    }

    #[test]
    fn opcode_from_canonical_round_trips() {
        for i in 0..OPCODE_COUNT as u8 {
            let op = opcode_from_canonical(i).unwrap();
            assert_eq!(op.canonical_index(), i);
        }
        assert!(opcode_from_canonical(OPCODE_COUNT as u8).is_err());
    }
}
