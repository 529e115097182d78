//! The CIL opcode tables (ECMA-335, Partition III).
//!
//! Opcodes live in two 256-entry spaces. [`INSTRUCTIONS`] is indexed by the first byte of an
//! instruction; the byte [`ESCAPE_PREFIX`] (`0xFE`) selects [`INSTRUCTIONS_FE`], indexed by the
//! byte that follows. Slots without an opcode hold an entry whose mnemonic is empty.
//!
//! The tables are built at compile time and never change.
//!
//! # Examples
//!
//! ```rust
//! use cilstream::disassembler::{lookup, lookup_escaped, opcode_by_mnemonic, Lookup, OperandKind};
//!
//! let Lookup::OpCode(call) = lookup(0x28)? else { unreachable!() };
//! assert_eq!(call.mnemonic, "call");
//! assert_eq!(call.operand_kind, OperandKind::InlineMethod);
//!
//! assert_eq!(lookup(0xFE)?, Lookup::Escape);
//! assert_eq!(lookup_escaped(0x1E)?.mnemonic, "readonly.");
//! assert_eq!(opcode_by_mnemonic("ldc.i4.s")?.value, 0x1F);
//! # Ok::<(), cilstream::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use crate::{
    disassembler::{FlowType, OpCode, OperandKind},
    Error, Result,
};

/// First byte of every two-byte opcode.
pub const ESCAPE_PREFIX: u8 = 0xFE;

/// Opcodes indexed by their single byte.
pub static INSTRUCTIONS: [OpCode; 256] = single_byte_table();

/// Opcodes indexed by the byte following [`ESCAPE_PREFIX`].
pub static INSTRUCTIONS_FE: [OpCode; 256] = escaped_table();

macro_rules! opcodes {
    ($table:ident, $prefix:expr; $($value:literal => $mnemonic:literal, $kind:ident, $flow:ident;)*) => {
        $(
            $table[$value] = OpCode::new(
                $mnemonic,
                $prefix,
                $value,
                OperandKind::$kind,
                FlowType::$flow,
            );
        )*
    };
}

const fn undefined_table(prefix: u8) -> [OpCode; 256] {
    let mut table = [OpCode::UNDEFINED; 256];
    let mut value = 0;
    while value < 256 {
        table[value].prefix = prefix;
        table[value].value = value as u8;
        value += 1;
    }
    table
}

const fn single_byte_table() -> [OpCode; 256] {
    let mut table = undefined_table(0);
    opcodes! { table, 0;
        0x00 => "nop", InlineNone, Sequential;
        0x01 => "break", InlineNone, Sequential;
        0x02 => "ldarg.0", InlineNone, Sequential;
        0x03 => "ldarg.1", InlineNone, Sequential;
        0x04 => "ldarg.2", InlineNone, Sequential;
        0x05 => "ldarg.3", InlineNone, Sequential;
        0x06 => "ldloc.0", InlineNone, Sequential;
        0x07 => "ldloc.1", InlineNone, Sequential;
        0x08 => "ldloc.2", InlineNone, Sequential;
        0x09 => "ldloc.3", InlineNone, Sequential;
        0x0A => "stloc.0", InlineNone, Sequential;
        0x0B => "stloc.1", InlineNone, Sequential;
        0x0C => "stloc.2", InlineNone, Sequential;
        0x0D => "stloc.3", InlineNone, Sequential;
        0x0E => "ldarg.s", ShortInlineVar, Sequential;
        0x0F => "ldarga.s", ShortInlineVar, Sequential;
        0x10 => "starg.s", ShortInlineVar, Sequential;
        0x11 => "ldloc.s", ShortInlineVar, Sequential;
        0x12 => "ldloca.s", ShortInlineVar, Sequential;
        0x13 => "stloc.s", ShortInlineVar, Sequential;
        0x14 => "ldnull", InlineNone, Sequential;
        0x15 => "ldc.i4.m1", InlineNone, Sequential;
        0x16 => "ldc.i4.0", InlineNone, Sequential;
        0x17 => "ldc.i4.1", InlineNone, Sequential;
        0x18 => "ldc.i4.2", InlineNone, Sequential;
        0x19 => "ldc.i4.3", InlineNone, Sequential;
        0x1A => "ldc.i4.4", InlineNone, Sequential;
        0x1B => "ldc.i4.5", InlineNone, Sequential;
        0x1C => "ldc.i4.6", InlineNone, Sequential;
        0x1D => "ldc.i4.7", InlineNone, Sequential;
        0x1E => "ldc.i4.8", InlineNone, Sequential;
        0x1F => "ldc.i4.s", ShortInlineI, Sequential;
        0x20 => "ldc.i4", InlineI, Sequential;
        0x21 => "ldc.i8", InlineI8, Sequential;
        0x22 => "ldc.r4", ShortInlineR, Sequential;
        0x23 => "ldc.r8", InlineR, Sequential;
        0x25 => "dup", InlineNone, Sequential;
        0x26 => "pop", InlineNone, Sequential;
        0x27 => "jmp", InlineMethod, Return;
        0x28 => "call", InlineMethod, Call;
        0x29 => "calli", InlineSig, Call;
        0x2A => "ret", InlineNone, Return;
        0x2B => "br.s", ShortInlineBrTarget, UnconditionalBranch;
        0x2C => "brfalse.s", ShortInlineBrTarget, ConditionalBranch;
        0x2D => "brtrue.s", ShortInlineBrTarget, ConditionalBranch;
        0x2E => "beq.s", ShortInlineBrTarget, ConditionalBranch;
        0x2F => "bge.s", ShortInlineBrTarget, ConditionalBranch;
        0x30 => "bgt.s", ShortInlineBrTarget, ConditionalBranch;
        0x31 => "ble.s", ShortInlineBrTarget, ConditionalBranch;
        0x32 => "blt.s", ShortInlineBrTarget, ConditionalBranch;
        0x33 => "bne.un.s", ShortInlineBrTarget, ConditionalBranch;
        0x34 => "bge.un.s", ShortInlineBrTarget, ConditionalBranch;
        0x35 => "bgt.un.s", ShortInlineBrTarget, ConditionalBranch;
        0x36 => "ble.un.s", ShortInlineBrTarget, ConditionalBranch;
        0x37 => "blt.un.s", ShortInlineBrTarget, ConditionalBranch;
        0x38 => "br", InlineBrTarget, UnconditionalBranch;
        0x39 => "brfalse", InlineBrTarget, ConditionalBranch;
        0x3A => "brtrue", InlineBrTarget, ConditionalBranch;
        0x3B => "beq", InlineBrTarget, ConditionalBranch;
        0x3C => "bge", InlineBrTarget, ConditionalBranch;
        0x3D => "bgt", InlineBrTarget, ConditionalBranch;
        0x3E => "ble", InlineBrTarget, ConditionalBranch;
        0x3F => "blt", InlineBrTarget, ConditionalBranch;
        0x40 => "bne.un", InlineBrTarget, ConditionalBranch;
        0x41 => "bge.un", InlineBrTarget, ConditionalBranch;
        0x42 => "bgt.un", InlineBrTarget, ConditionalBranch;
        0x43 => "ble.un", InlineBrTarget, ConditionalBranch;
        0x44 => "blt.un", InlineBrTarget, ConditionalBranch;
        0x45 => "switch", InlineSwitch, Switch;
        0x46 => "ldind.i1", InlineNone, Sequential;
        0x47 => "ldind.u1", InlineNone, Sequential;
        0x48 => "ldind.i2", InlineNone, Sequential;
        0x49 => "ldind.u2", InlineNone, Sequential;
        0x4A => "ldind.i4", InlineNone, Sequential;
        0x4B => "ldind.u4", InlineNone, Sequential;
        0x4C => "ldind.i8", InlineNone, Sequential;
        0x4D => "ldind.i", InlineNone, Sequential;
        0x4E => "ldind.r4", InlineNone, Sequential;
        0x4F => "ldind.r8", InlineNone, Sequential;
        0x50 => "ldind.ref", InlineNone, Sequential;
        0x51 => "stind.ref", InlineNone, Sequential;
        0x52 => "stind.i1", InlineNone, Sequential;
        0x53 => "stind.i2", InlineNone, Sequential;
        0x54 => "stind.i4", InlineNone, Sequential;
        0x55 => "stind.i8", InlineNone, Sequential;
        0x56 => "stind.r4", InlineNone, Sequential;
        0x57 => "stind.r8", InlineNone, Sequential;
        0x58 => "add", InlineNone, Sequential;
        0x59 => "sub", InlineNone, Sequential;
        0x5A => "mul", InlineNone, Sequential;
        0x5B => "div", InlineNone, Sequential;
        0x5C => "div.un", InlineNone, Sequential;
        0x5D => "rem", InlineNone, Sequential;
        0x5E => "rem.un", InlineNone, Sequential;
        0x5F => "and", InlineNone, Sequential;
        0x60 => "or", InlineNone, Sequential;
        0x61 => "xor", InlineNone, Sequential;
        0x62 => "shl", InlineNone, Sequential;
        0x63 => "shr", InlineNone, Sequential;
        0x64 => "shr.un", InlineNone, Sequential;
        0x65 => "neg", InlineNone, Sequential;
        0x66 => "not", InlineNone, Sequential;
        0x67 => "conv.i1", InlineNone, Sequential;
        0x68 => "conv.i2", InlineNone, Sequential;
        0x69 => "conv.i4", InlineNone, Sequential;
        0x6A => "conv.i8", InlineNone, Sequential;
        0x6B => "conv.r4", InlineNone, Sequential;
        0x6C => "conv.r8", InlineNone, Sequential;
        0x6D => "conv.u4", InlineNone, Sequential;
        0x6E => "conv.u8", InlineNone, Sequential;
        0x6F => "callvirt", InlineMethod, Call;
        0x70 => "cpobj", InlineType, Sequential;
        0x71 => "ldobj", InlineType, Sequential;
        0x72 => "ldstr", InlineString, Sequential;
        0x73 => "newobj", InlineMethod, Call;
        0x74 => "castclass", InlineType, Sequential;
        0x75 => "isinst", InlineType, Sequential;
        0x76 => "conv.r.un", InlineNone, Sequential;
        0x79 => "unbox", InlineType, Sequential;
        0x7A => "throw", InlineNone, Throw;
        0x7B => "ldfld", InlineField, Sequential;
        0x7C => "ldflda", InlineField, Sequential;
        0x7D => "stfld", InlineField, Sequential;
        0x7E => "ldsfld", InlineField, Sequential;
        0x7F => "ldsflda", InlineField, Sequential;
        0x80 => "stsfld", InlineField, Sequential;
        0x81 => "stobj", InlineType, Sequential;
        0x82 => "conv.ovf.i1.un", InlineNone, Sequential;
        0x83 => "conv.ovf.i2.un", InlineNone, Sequential;
        0x84 => "conv.ovf.i4.un", InlineNone, Sequential;
        0x85 => "conv.ovf.i8.un", InlineNone, Sequential;
        0x86 => "conv.ovf.u1.un", InlineNone, Sequential;
        0x87 => "conv.ovf.u2.un", InlineNone, Sequential;
        0x88 => "conv.ovf.u4.un", InlineNone, Sequential;
        0x89 => "conv.ovf.u8.un", InlineNone, Sequential;
        0x8A => "conv.ovf.i.un", InlineNone, Sequential;
        0x8B => "conv.ovf.u.un", InlineNone, Sequential;
        0x8C => "box", InlineType, Sequential;
        0x8D => "newarr", InlineType, Sequential;
        0x8E => "ldlen", InlineNone, Sequential;
        0x8F => "ldelema", InlineType, Sequential;
        0x90 => "ldelem.i1", InlineNone, Sequential;
        0x91 => "ldelem.u1", InlineNone, Sequential;
        0x92 => "ldelem.i2", InlineNone, Sequential;
        0x93 => "ldelem.u2", InlineNone, Sequential;
        0x94 => "ldelem.i4", InlineNone, Sequential;
        0x95 => "ldelem.u4", InlineNone, Sequential;
        0x96 => "ldelem.i8", InlineNone, Sequential;
        0x97 => "ldelem.i", InlineNone, Sequential;
        0x98 => "ldelem.r4", InlineNone, Sequential;
        0x99 => "ldelem.r8", InlineNone, Sequential;
        0x9A => "ldelem.ref", InlineNone, Sequential;
        0x9B => "stelem.i", InlineNone, Sequential;
        0x9C => "stelem.i1", InlineNone, Sequential;
        0x9D => "stelem.i2", InlineNone, Sequential;
        0x9E => "stelem.i4", InlineNone, Sequential;
        0x9F => "stelem.i8", InlineNone, Sequential;
        0xA0 => "stelem.r4", InlineNone, Sequential;
        0xA1 => "stelem.r8", InlineNone, Sequential;
        0xA2 => "stelem.ref", InlineNone, Sequential;
        0xA3 => "ldelem", InlineType, Sequential;
        0xA4 => "stelem", InlineType, Sequential;
        0xA5 => "unbox.any", InlineType, Sequential;
        0xB3 => "conv.ovf.i1", InlineNone, Sequential;
        0xB4 => "conv.ovf.u1", InlineNone, Sequential;
        0xB5 => "conv.ovf.i2", InlineNone, Sequential;
        0xB6 => "conv.ovf.u2", InlineNone, Sequential;
        0xB7 => "conv.ovf.i4", InlineNone, Sequential;
        0xB8 => "conv.ovf.u4", InlineNone, Sequential;
        0xB9 => "conv.ovf.i8", InlineNone, Sequential;
        0xBA => "conv.ovf.u8", InlineNone, Sequential;
        0xC2 => "refanyval", InlineType, Sequential;
        0xC3 => "ckfinite", InlineNone, Sequential;
        0xC6 => "mkrefany", InlineType, Sequential;
        0xD0 => "ldtoken", InlineTok, Sequential;
        0xD1 => "conv.u2", InlineNone, Sequential;
        0xD2 => "conv.u1", InlineNone, Sequential;
        0xD3 => "conv.i", InlineNone, Sequential;
        0xD4 => "conv.ovf.i", InlineNone, Sequential;
        0xD5 => "conv.ovf.u", InlineNone, Sequential;
        0xD6 => "add.ovf", InlineNone, Sequential;
        0xD7 => "add.ovf.un", InlineNone, Sequential;
        0xD8 => "mul.ovf", InlineNone, Sequential;
        0xD9 => "mul.ovf.un", InlineNone, Sequential;
        0xDA => "sub.ovf", InlineNone, Sequential;
        0xDB => "sub.ovf.un", InlineNone, Sequential;
        0xDC => "endfinally", InlineNone, EndFinally;
        0xDD => "leave", InlineBrTarget, Leave;
        0xDE => "leave.s", ShortInlineBrTarget, Leave;
        0xDF => "stind.i", InlineNone, Sequential;
        0xE0 => "conv.u", InlineNone, Sequential;
    }
    table
}

const fn escaped_table() -> [OpCode; 256] {
    let mut table = undefined_table(ESCAPE_PREFIX);
    opcodes! { table, ESCAPE_PREFIX;
        0x00 => "arglist", InlineNone, Sequential;
        0x01 => "ceq", InlineNone, Sequential;
        0x02 => "cgt", InlineNone, Sequential;
        0x03 => "cgt.un", InlineNone, Sequential;
        0x04 => "clt", InlineNone, Sequential;
        0x05 => "clt.un", InlineNone, Sequential;
        0x06 => "ldftn", InlineMethod, Sequential;
        0x07 => "ldvirtftn", InlineMethod, Sequential;
        0x09 => "ldarg", InlineVar, Sequential;
        0x0A => "ldarga", InlineVar, Sequential;
        0x0B => "starg", InlineVar, Sequential;
        0x0C => "ldloc", InlineVar, Sequential;
        0x0D => "ldloca", InlineVar, Sequential;
        0x0E => "stloc", InlineVar, Sequential;
        0x0F => "localloc", InlineNone, Sequential;
        0x11 => "endfilter", InlineNone, Return;
        0x12 => "unaligned.", ShortInlineI, Sequential;
        0x13 => "volatile.", InlineNone, Sequential;
        0x14 => "tail.", InlineNone, Sequential;
        0x15 => "initobj", InlineType, Sequential;
        0x16 => "constrained.", InlineType, Sequential;
        0x17 => "cpblk", InlineNone, Sequential;
        0x18 => "initblk", InlineNone, Sequential;
        0x19 => "no.", ShortInlineI, Sequential;
        0x1A => "rethrow", InlineNone, Throw;
        0x1C => "sizeof", InlineType, Sequential;
        0x1D => "refanytype", InlineNone, Sequential;
        0x1E => "readonly.", InlineNone, Sequential;
    }
    table
}

/// Result of looking up the first byte of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A complete single-byte opcode
    OpCode(&'static OpCode),
    /// The escape byte; the opcode continues in [`INSTRUCTIONS_FE`]
    Escape,
}

/// Looks up the first byte of an instruction.
///
/// # Errors
/// Returns [`Error::UnknownOpcode`] (with offset 0) for undefined bytes, including `0xFF`.
pub fn lookup(byte: u8) -> Result<Lookup> {
    if byte == ESCAPE_PREFIX {
        return Ok(Lookup::Escape);
    }

    let opcode = &INSTRUCTIONS[usize::from(byte)];
    if !opcode.is_defined() {
        return Err(Error::UnknownOpcode {
            offset: 0,
            prefix: 0,
            value: byte,
        });
    }

    Ok(Lookup::OpCode(opcode))
}

/// Looks up the byte following [`ESCAPE_PREFIX`].
///
/// # Errors
/// Returns [`Error::UnknownOpcode`] (with offset 0) for undefined bytes.
pub fn lookup_escaped(byte: u8) -> Result<&'static OpCode> {
    let opcode = &INSTRUCTIONS_FE[usize::from(byte)];
    if !opcode.is_defined() {
        return Err(Error::UnknownOpcode {
            offset: 0,
            prefix: ESCAPE_PREFIX,
            value: byte,
        });
    }

    Ok(opcode)
}

/// Iterates over every defined opcode, single-byte opcodes first.
pub fn opcodes() -> impl Iterator<Item = &'static OpCode> {
    INSTRUCTIONS
        .iter()
        .chain(INSTRUCTIONS_FE.iter())
        .filter(|opcode| opcode.is_defined())
}

static MNEMONICS: OnceLock<HashMap<&'static str, &'static OpCode>> = OnceLock::new();

/// Finds an opcode by its mnemonic, e.g. `"ldc.i4.s"` or `"readonly."`.
///
/// # Errors
/// Returns [`Error::InvalidMnemonic`] if no opcode has this name.
pub fn opcode_by_mnemonic(mnemonic: &str) -> Result<&'static OpCode> {
    MNEMONICS
        .get_or_init(|| opcodes().map(|opcode| (opcode.mnemonic, opcode)).collect())
        .get(mnemonic)
        .copied()
        .ok_or_else(|| Error::InvalidMnemonic(mnemonic.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_opcode_counts() {
        assert_eq!(INSTRUCTIONS.iter().filter(|o| o.is_defined()).count(), 191);
        assert_eq!(INSTRUCTIONS_FE.iter().filter(|o| o.is_defined()).count(), 28);
        assert_eq!(opcodes().count(), 219);
    }

    #[test]
    fn table_entries_match_their_slot() {
        for (index, opcode) in INSTRUCTIONS.iter().enumerate() {
            assert_eq!(usize::from(opcode.value), index);
            assert_eq!(opcode.prefix, 0);
        }
        for (index, opcode) in INSTRUCTIONS_FE.iter().enumerate() {
            assert_eq!(usize::from(opcode.value), index);
            assert_eq!(opcode.prefix, ESCAPE_PREFIX);
        }
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for opcode in opcodes() {
            assert!(seen.insert(opcode.mnemonic), "duplicate {}", opcode.mnemonic);
        }
    }

    #[test]
    fn undefined_slots() {
        for byte in [0x24, 0x77, 0x78, 0xA6, 0xB2, 0xBB, 0xC1, 0xC4, 0xC5, 0xC7, 0xCF, 0xE1, 0xFF] {
            assert_eq!(
                lookup(byte),
                Err(Error::UnknownOpcode {
                    offset: 0,
                    prefix: 0,
                    value: byte
                })
            );
        }
        for byte in [0x08, 0x10, 0x1B, 0x1F, 0xFE, 0xFF] {
            assert!(matches!(
                lookup_escaped(byte),
                Err(Error::UnknownOpcode { prefix: 0xFE, .. })
            ));
        }
    }

    #[test]
    fn escape_only_in_single_byte_space() {
        assert_eq!(lookup(0xFE), Ok(Lookup::Escape));
        assert!(!INSTRUCTIONS[0xFE].is_defined());
        assert!(lookup_escaped(0xFE).is_err());
    }

    #[test]
    fn operand_kinds() {
        let expect = |mnemonic: &str, kind: OperandKind| {
            assert_eq!(opcode_by_mnemonic(mnemonic).unwrap().operand_kind, kind, "{mnemonic}");
        };
        expect("ldarg.s", OperandKind::ShortInlineVar);
        expect("ldc.i4.s", OperandKind::ShortInlineI);
        expect("ldc.r4", OperandKind::ShortInlineR);
        expect("ldc.i8", OperandKind::InlineI8);
        expect("calli", OperandKind::InlineSig);
        expect("ldstr", OperandKind::InlineString);
        expect("ldtoken", OperandKind::InlineTok);
        expect("switch", OperandKind::InlineSwitch);
        expect("leave.s", OperandKind::ShortInlineBrTarget);
        expect("ldloc", OperandKind::InlineVar);
        expect("unaligned.", OperandKind::ShortInlineI);
        expect("constrained.", OperandKind::InlineType);
        expect("readonly.", OperandKind::InlineNone);
    }

    #[test]
    fn method_terminators() {
        let flow = |mnemonic: &str| opcode_by_mnemonic(mnemonic).unwrap().flow;
        assert_eq!(flow("ret"), FlowType::Return);
        assert_eq!(flow("jmp"), FlowType::Return);
        assert_eq!(flow("throw"), FlowType::Throw);
        assert_eq!(flow("rethrow"), FlowType::Throw);
        assert_eq!(flow("endfinally"), FlowType::EndFinally);
        assert_eq!(flow("call"), FlowType::Call);
        assert_eq!(flow("calli"), FlowType::Call);
    }

    #[test]
    fn reverse_lookup() {
        let readonly = opcode_by_mnemonic("readonly.").unwrap();
        assert_eq!(readonly.code(), 0xFE1E);
        assert!(std::ptr::eq(readonly, &INSTRUCTIONS_FE[0x1E]));

        assert_eq!(
            opcode_by_mnemonic("ldarg.4"),
            Err(Error::InvalidMnemonic("ldarg.4".into()))
        );
        assert!(opcode_by_mnemonic("").is_err());
    }
}
