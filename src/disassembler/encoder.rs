//! CIL instruction encoding.
//!
//! The reverse of the decoder: turns opcodes and operands back into bytes, using the same
//! [`crate::disassembler::INSTRUCTIONS`] tables. Re-encoding a decoded stream reproduces the
//! original bytes exactly, which makes decode, patch and re-encode workflows (e.g. token
//! remapping) straightforward.
//!
//! # Usage Examples
//!
//! ```rust
//! use cilstream::disassembler::{InstructionEncoder, Immediate, Operand};
//!
//! let mut encoder = InstructionEncoder::new();
//! encoder.emit_instruction("ldarg.0", None)?;
//! encoder.emit_instruction("ldc.i4.s", Some(Operand::Immediate(Immediate::Int8(5))))?;
//! encoder.emit_instruction("add", None)?;
//! encoder.emit_instruction("ret", None)?;
//!
//! assert_eq!(encoder.finalize(), [0x02, 0x1F, 0x05, 0x58, 0x2A]);
//! # Ok::<(), cilstream::Error>(())
//! ```

use crate::{
    disassembler::{opcode_by_mnemonic, Immediate, Instruction, OpCode, Operand, OperandKind},
    file::io::write_le,
    Error, Result,
};

/// Appends the encoding of `instruction` to `buffer`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the operand does not fit the opcode's operand kind.
/// Nothing is appended in that case.
pub fn encode_instruction(instruction: &Instruction, buffer: &mut Vec<u8>) -> Result<()> {
    encode(instruction.opcode, &instruction.operand, buffer)
}

fn encode(opcode: &OpCode, operand: &Operand, buffer: &mut Vec<u8>) -> Result<()> {
    let start = buffer.len();
    if opcode.prefix != 0 {
        buffer.push(opcode.prefix);
    }
    buffer.push(opcode.value);

    if let Err(error) = encode_operand(opcode, operand, buffer) {
        buffer.truncate(start);
        return Err(error);
    }

    Ok(())
}

fn encode_operand(opcode: &OpCode, operand: &Operand, buffer: &mut Vec<u8>) -> Result<()> {
    match (opcode.operand_kind, operand) {
        (OperandKind::InlineNone, Operand::None) => {}
        (OperandKind::ShortInlineI, Operand::Immediate(Immediate::Int8(value))) => {
            write_le(buffer, *value);
        }
        (OperandKind::ShortInlineVar, Operand::Variable(index)) => {
            let Ok(index) = u8::try_from(*index) else {
                return Err(malformed_error!(
                    "{} cannot address variable {}",
                    opcode.mnemonic,
                    index
                ));
            };
            write_le(buffer, index);
        }
        (OperandKind::ShortInlineBrTarget, Operand::BranchTarget(delta)) => {
            let Ok(delta) = i8::try_from(*delta) else {
                return Err(malformed_error!(
                    "{} cannot branch by {}",
                    opcode.mnemonic,
                    delta
                ));
            };
            write_le(buffer, delta);
        }
        (OperandKind::InlineVar, Operand::Variable(index)) => write_le(buffer, *index),
        (OperandKind::InlineI, Operand::Immediate(Immediate::Int32(value))) => {
            write_le(buffer, *value);
        }
        (OperandKind::InlineBrTarget, Operand::BranchTarget(delta)) => write_le(buffer, *delta),
        (kind, Operand::Token(token)) if kind.is_token() => write_le(buffer, token.value()),
        (OperandKind::ShortInlineR, Operand::Immediate(Immediate::Float32(value))) => {
            write_le(buffer, *value);
        }
        (OperandKind::InlineI8, Operand::Immediate(Immediate::Int64(value))) => {
            write_le(buffer, *value);
        }
        (OperandKind::InlineR, Operand::Immediate(Immediate::Float64(value))) => {
            write_le(buffer, *value);
        }
        (OperandKind::InlineSwitch, Operand::Switch(deltas)) => {
            let Ok(count) = u32::try_from(deltas.len()) else {
                return Err(malformed_error!("switch has too many targets"));
            };
            write_le(buffer, count);
            for delta in deltas {
                write_le(buffer, *delta);
            }
        }
        (kind, operand) => {
            return Err(malformed_error!(
                "operand {:?} does not match {} ({:?})",
                operand,
                opcode.mnemonic,
                kind
            ));
        }
    }

    Ok(())
}

/// Builds a CIL byte stream instruction by instruction.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    bytecode: Vec<u8>,
}

impl InstructionEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset at which the next instruction will be written.
    #[must_use]
    pub fn position(&self) -> usize {
        self.bytecode.len()
    }

    /// Appends the instruction named `mnemonic`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMnemonic`] for unknown mnemonics and [`Error::Malformed`] if the
    /// operand does not match the opcode.
    pub fn emit_instruction(&mut self, mnemonic: &str, operand: Option<Operand>) -> Result<()> {
        let opcode = opcode_by_mnemonic(mnemonic)?;
        encode(opcode, &operand.unwrap_or(Operand::None), &mut self.bytecode)
    }

    /// Appends a previously decoded instruction unchanged.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the operand was modified so that it no longer matches the
    /// opcode.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilstream::disassembler::{decode_stream, InstructionEncoder};
    ///
    /// let il_bytes = [0x00, 0x2B, 0xFD, 0x2A]; // nop, br.s -3, ret
    /// let instructions = decode_stream(&il_bytes, None)?;
    ///
    /// let mut encoder = InstructionEncoder::new();
    /// for instruction in &instructions {
    ///     encoder.emit_instruction_decoded(instruction)?;
    /// }
    /// assert_eq!(encoder.finalize(), il_bytes);
    /// # Ok::<(), cilstream::Error>(())
    /// ```
    pub fn emit_instruction_decoded(&mut self, instruction: &Instruction) -> Result<()> {
        encode_instruction(instruction, &mut self.bytecode)
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn finalize(self) -> Vec<u8> {
        self.bytecode
    }
}
