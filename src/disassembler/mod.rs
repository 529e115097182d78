//! CIL (Common Intermediate Language) instruction decoding engine.
//!
//! This module decodes the code bytes of .NET method bodies into typed instructions, and
//! encodes them back.
//!
//! # Key Types
//! - [`Instruction`] - A decoded CIL instruction
//! - [`OpCode`] - Static opcode description from the [`INSTRUCTIONS`] tables
//! - [`Operand`] - Instruction operands (immediates, variables, tokens, targets)
//! - [`Resolution`] - Outcome of resolving a token operand
//! - [`FlowType`] - How instructions affect control flow
//! - [`InstructionDecoder`] - Lazy, resumable decoder over a method body
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode a complete method body
//! - [`decode_methods`] - Decode many method bodies in parallel
//! - [`encode_instruction`] - Encode an instruction back into bytes
//!
//! # Example
//! ```rust
//! use cilstream::disassembler::decode_instruction;
//! use cilstream::Parser;
//! let bytecode = &[0x00, 0x2A]; // nop, ret
//! let mut parser = Parser::new(bytecode);
//! let instruction = decode_instruction(&mut parser)?;
//! println!("Mnemonic: {}", instruction.mnemonic());
//! # Ok::<(), cilstream::Error>(())
//! ```

mod config;
mod decoder;
mod encoder;
mod instruction;
mod instructions;
mod operand;

pub use config::DecoderConfig;
pub use decoder::{
    decode_instruction, decode_methods, decode_stream, DecoderState, InstructionDecoder,
    ResolverScope,
};
pub use encoder::{encode_instruction, InstructionEncoder};
pub use instruction::{
    FlowType, Immediate, Instruction, OpCode, Operand, OperandKind, Resolution,
};
pub use instructions::*;
pub use operand::decode_operand;
