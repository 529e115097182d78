//! Operand decoding.

use crate::{
    disassembler::{Immediate, Operand, OperandKind},
    file::parser::Parser,
    metadata::Token,
    Error, Result,
};

/// Decodes the operand of kind `kind` at the parser's position and advances past it.
///
/// Token kinds always yield the raw [`Token`]; resolving it is left to the caller. For
/// [`OperandKind::InlineSwitch`] the target count is validated against the remaining bytes
/// before anything is allocated, so a hostile count cannot trigger a huge allocation.
///
/// Errors carry the offset at which the failing read started; the instruction decoder
/// re-anchors them to the opcode.
///
/// # Errors
/// - [`Error::TruncatedStream`] if the operand runs past the end of the data
/// - [`Error::UnsupportedOperandKind`] for [`OperandKind::InlinePhi`]
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::{decode_operand, Operand, OperandKind}, Parser};
///
/// let mut parser = Parser::new(&[0x02, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0xF6, 0xFF, 0xFF, 0xFF]);
/// let operand = decode_operand(OperandKind::InlineSwitch, &mut parser)?;
/// assert_eq!(operand, Operand::Switch(vec![5, -10]));
/// assert_eq!(parser.pos(), 12);
/// # Ok::<(), cilstream::Error>(())
/// ```
pub fn decode_operand(kind: OperandKind, parser: &mut Parser) -> Result<Operand> {
    let operand = match kind {
        OperandKind::InlineNone => Operand::None,
        OperandKind::ShortInlineI => Operand::Immediate(Immediate::Int8(parser.read_le::<i8>()?)),
        OperandKind::ShortInlineVar => Operand::Variable(u16::from(parser.read_le::<u8>()?)),
        OperandKind::ShortInlineBrTarget => {
            Operand::BranchTarget(i32::from(parser.read_le::<i8>()?))
        }
        OperandKind::InlineVar => Operand::Variable(parser.read_le::<u16>()?),
        OperandKind::InlineI => Operand::Immediate(Immediate::Int32(parser.read_le::<i32>()?)),
        OperandKind::InlineBrTarget => Operand::BranchTarget(parser.read_le::<i32>()?),
        OperandKind::InlineMethod
        | OperandKind::InlineField
        | OperandKind::InlineType
        | OperandKind::InlineString
        | OperandKind::InlineSig
        | OperandKind::InlineTok => Operand::Token(Token::new(parser.read_le::<u32>()?)),
        OperandKind::ShortInlineR => {
            Operand::Immediate(Immediate::Float32(parser.read_le::<f32>()?))
        }
        OperandKind::InlineI8 => Operand::Immediate(Immediate::Int64(parser.read_le::<i64>()?)),
        OperandKind::InlineR => Operand::Immediate(Immediate::Float64(parser.read_le::<f64>()?)),
        OperandKind::InlineSwitch => Operand::Switch(decode_switch(parser)?),
        OperandKind::InlinePhi => {
            return Err(Error::UnsupportedOperandKind {
                offset: parser.pos(),
                kind,
            })
        }
    };

    Ok(operand)
}

fn decode_switch(parser: &mut Parser) -> Result<Vec<i32>> {
    let start = parser.pos();
    let count = parser.read_le::<u32>()? as usize;

    let needed = count.saturating_mul(4);
    if let Err(Error::TruncatedStream { available, .. }) = parser.ensure(needed) {
        return Err(Error::TruncatedStream {
            offset: start,
            needed: needed.saturating_add(4),
            available: available + 4,
        });
    }

    let mut targets = Vec::with_capacity(count);
    for _ in 0..count {
        targets.push(parser.read_le::<i32>()?);
    }

    Ok(targets)
}
