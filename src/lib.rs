//! Core of an obfuscating Lua 5.1 bytecode emitter and companion
//! source-level string-encryption pass, as used by a script protection
//! tool.
//!
//! Two independently testable subsystems compose sequentially in a full
//! pipeline:
//!
//! - [`serialize::ChunkSerializer`] walks an already-parsed [`chunk::Chunk`]
//!   tree and emits a byte-exact, deliberately non-standard bytecode binary
//!   (bit-packed instruction words, a randomized opcode permutation, a
//!   custom header, and per-string XOR).
//! - [`rewriter::SourceRewriter`] scans Lua source text for string
//!   literals and replaces selected ones with a self-contained Lua
//!   decryptor expression, per [`config::ShroudConfig`].
//!
//! Neither subsystem performs I/O; callers supply bytes/text in and take
//! bytes/text out. Both draw randomness through the [`rng::ShroudRng`]
//! seam, which defaults to a CSPRNG and accepts a deterministic seed for
//! tests.

pub mod chunk;
pub mod config;
pub mod constant;
mod decryptor;
pub mod error;
pub mod instruction;
pub mod keytable;
pub mod latin1;
pub mod opcode;
pub mod rewriter;
pub mod rng;
pub mod scanner;
pub mod serialize;

pub use chunk::Chunk;
pub use config::ShroudConfig;
pub use constant::Constant;
pub use error::{Result, ShroudError};
pub use instruction::{Instruction, InstructionKind};
pub use opcode::{Opcode, OpcodePermutation};
pub use rewriter::SourceRewriter;
pub use scanner::{scan as scan_literals, unescape_lua_string, LiteralMatch};
pub use serialize::ChunkSerializer;
