//! Instruction operand layouts and the 32-bit word encoder.
//!
//! The field layout deliberately diverges from standard Lua: in the `ABC`
//! layout, `C` occupies the *lower* of the two high fields and `B` the
//! *upper* one, the reverse of stock Lua's bytecode. This is required for
//! consumer compatibility and must not be "fixed" to match upstream Lua.

use crate::error::ShroudError;
use crate::opcode::{Opcode, OpcodePermutation};

/// Which of the three Lua instruction operand layouts an instruction uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    /// Opcode, A, B, C all present.
    ABC,
    /// Opcode, A, and an unsigned 18-bit B (`Bx`).
    ABx,
    /// Opcode, A, and a signed 18-bit B (`sBx`), stored biased.
    AsBx,
}

/// A single bytecode instruction in intermediate form, prior to encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub opcode: Opcode,
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

const A_MAX: i32 = 255;
const BC_MAX: i32 = 511;
const BX_MAX: i32 = 262_143;
const SBX_MIN: i32 = -131_071;
const SBX_MAX: i32 = 131_071;
const SBX_BIAS: i32 = 131_071;

impl Instruction {
    pub fn abc(opcode: Opcode, a: i32, b: i32, c: i32) -> Self {
        Instruction { kind: InstructionKind::ABC, opcode, a, b, c }
    }

    pub fn abx(opcode: Opcode, a: i32, b: i32) -> Self {
        Instruction { kind: InstructionKind::ABx, opcode, a, b, c: 0 }
    }

    pub fn as_bx(opcode: Opcode, a: i32, b: i32) -> Self {
        Instruction { kind: InstructionKind::AsBx, opcode, a, b, c: 0 }
    }

    /// Part of the IR's recompute-derived-state contract (§6); a no-op for
    /// this crate's own `Instruction`, which never carries derived fields.
    pub fn recompute_derived_state(&mut self) {}

    fn check(&self) -> Result<(), ShroudError> {
        if !(0..=A_MAX).contains(&self.a) {
            return Err(ShroudError::OperandOverflow { field: "A", value: self.a as i64 });
        }
        match self.kind {
            InstructionKind::ABC => {
                if !(0..=BC_MAX).contains(&self.b) {
                    return Err(ShroudError::OperandOverflow { field: "B", value: self.b as i64 });
                }
                if !(0..=BC_MAX).contains(&self.c) {
                    return Err(ShroudError::OperandOverflow { field: "C", value: self.c as i64 });
                }
            }
            InstructionKind::ABx => {
                if !(0..=BX_MAX).contains(&self.b) {
                    return Err(ShroudError::OperandOverflow { field: "Bx", value: self.b as i64 });
                }
            }
            InstructionKind::AsBx => {
                if !(SBX_MIN..=SBX_MAX).contains(&self.b) {
                    return Err(ShroudError::OperandOverflow { field: "sBx", value: self.b as i64 });
                }
            }
        }
        Ok(())
    }

    /// Pack this instruction into its whitened 32-bit word, using `perm` to
    /// translate the canonical opcode into its on-disk index.
    pub fn encode(&self, perm: &OpcodePermutation) -> Result<u32, ShroudError> {
        self.check()?;
        let op = perm.encode(self.opcode) as u32;
        let a = self.a as u32;
        let raw: u32 = match self.kind {
            InstructionKind::ABC => {
                let b = self.b as u32;
                let c = self.c as u32;
                op | (a << 6) | (c << 14) | (b << 23)
            }
            InstructionKind::ABx => {
                let b = self.b as u32;
                op | (a << 6) | (b << 14)
            }
            InstructionKind::AsBx => {
                let b = (self.b + SBX_BIAS) as u32;
                op | (a << 6) | (b << 14)
            }
        };
        let whiten = (a).wrapping_mul(0x0765_4321);
        Ok(raw ^ whiten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::OpcodePermutation;
    use crate::rng::seeded_rng;

    #[test]
    fn move_instruction_matches_worked_example() {
        let mut rng = seeded_rng(1);
        let perm = OpcodePermutation::generate(&mut *rng);
        let k = perm.encode(Opcode::Move) as u32;
        let inst = Instruction::abc(Opcode::Move, 1, 2, 0);
        let word = inst.encode(&perm).unwrap();
        let expected = (k | (1 << 6) | (0 << 14) | (2 << 23)) ^ (1u32.wrapping_mul(0x0765_4321));
        assert_eq!(word, expected);
    }

    #[test]
    fn whitening_is_invertible_given_a() {
        let mut rng = seeded_rng(7);
        let perm = OpcodePermutation::generate(&mut *rng);
        let inst = Instruction::abc(Opcode::Add, 9, 3, 4);
        let word = inst.encode(&perm).unwrap();
        let unwhitened = word ^ (9u32.wrapping_mul(0x0765_4321));
        assert_eq!(unwhitened & 0x3f, perm.encode(Opcode::Add) as u32);
        assert_eq!((unwhitened >> 6) & 0xff, 9);
    }

    #[test]
    fn asbx_boundaries_encode_to_expected_field_values() {
        let mut rng = seeded_rng(2);
        let perm = OpcodePermutation::generate(&mut *rng);
        let low = Instruction::as_bx(Opcode::Jmp, 0, SBX_MIN);
        let high = Instruction::as_bx(Opcode::Jmp, 0, SBX_MAX);
        let low_word = low.encode(&perm).unwrap() ^ 0; // A == 0, whitening is a no-op
        let high_word = high.encode(&perm).unwrap();
        assert_eq!((low_word >> 14) & 0x3ffff, 0);
        assert_eq!((high_word >> 14) & 0x3ffff, 262_142);
    }

    #[test]
    fn operand_overflow_is_rejected() {
        let mut rng = seeded_rng(3);
        let perm = OpcodePermutation::generate(&mut *rng);
        let bad = Instruction::abc(Opcode::Add, 256, 0, 0);
        assert!(bad.encode(&perm).is_err());
        let bad_bx = Instruction::abx(Opcode::LoadK, 0, BX_MAX + 1);
        assert!(bad_bx.encode(&perm).is_err());
    }
}
