//! Types describing decoded CIL instructions.
//!
//! An [`Instruction`] couples a static [`OpCode`] entry with the [`Operand`] read from the
//! stream and, for metadata-token operands, the outcome of symbol [`Resolution`].

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::metadata::{Symbol, Token};

/// How an operand is encoded after its opcode.
///
/// The kind fully determines how many bytes follow the opcode and how they are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum OperandKind {
    /// No operand
    InlineNone,
    /// Signed 8-bit immediate
    ShortInlineI,
    /// Unsigned 8-bit argument or local index
    ShortInlineVar,
    /// Signed 8-bit branch delta
    ShortInlineBrTarget,
    /// Unsigned 16-bit argument or local index
    InlineVar,
    /// Signed 32-bit immediate
    InlineI,
    /// Signed 32-bit branch delta
    InlineBrTarget,
    /// Method token (`MethodDef`, `MemberRef`, `MethodSpec`)
    InlineMethod,
    /// Field token (`Field`, `MemberRef`)
    InlineField,
    /// Type token (`TypeDef`, `TypeRef`, `TypeSpec`)
    InlineType,
    /// User-string token
    InlineString,
    /// Stand-alone signature token
    InlineSig,
    /// Any type, method or field token (`ldtoken`)
    InlineTok,
    /// 32-bit IEEE-754 immediate
    ShortInlineR,
    /// Signed 64-bit immediate
    InlineI8,
    /// 64-bit IEEE-754 immediate
    InlineR,
    /// Jump table: an unsigned 32-bit count followed by that many signed 32-bit deltas
    InlineSwitch,
    /// SSA phi node; never appears in emitted code and is not decoded
    InlinePhi,
}

impl OperandKind {
    /// Width of the operand in bytes, or `None` for variable-length kinds.
    #[must_use]
    pub fn size(self) -> Option<usize> {
        match self {
            OperandKind::InlineNone => Some(0),
            OperandKind::ShortInlineI
            | OperandKind::ShortInlineVar
            | OperandKind::ShortInlineBrTarget => Some(1),
            OperandKind::InlineVar => Some(2),
            OperandKind::InlineI
            | OperandKind::InlineBrTarget
            | OperandKind::InlineMethod
            | OperandKind::InlineField
            | OperandKind::InlineType
            | OperandKind::InlineString
            | OperandKind::InlineSig
            | OperandKind::InlineTok
            | OperandKind::ShortInlineR => Some(4),
            OperandKind::InlineI8 | OperandKind::InlineR => Some(8),
            OperandKind::InlineSwitch | OperandKind::InlinePhi => None,
        }
    }

    /// Returns `true` for the kinds whose operand is a metadata token.
    #[must_use]
    pub fn is_token(self) -> bool {
        matches!(
            self,
            OperandKind::InlineMethod
                | OperandKind::InlineField
                | OperandKind::InlineType
                | OperandKind::InlineString
                | OperandKind::InlineSig
                | OperandKind::InlineTok
        )
    }

    /// Returns `true` for the kinds whose operand is a relative branch delta.
    #[must_use]
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            OperandKind::ShortInlineBrTarget | OperandKind::InlineBrTarget
        )
    }
}

/// How an instruction transfers control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Either branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch through a jump table
    Switch,
    /// Calls another method and continues
    Call,
    /// Leaves the method or filter (`ret`, `endfilter`, `jmp`)
    Return,
    /// Raises an exception
    Throw,
    /// Leaves a protected region
    Leave,
    /// Ends a `finally` or `fault` handler
    EndFinally,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpCode {
    /// Textual name, empty for undefined table slots
    pub mnemonic: &'static str,
    /// `0xFE` for escaped opcodes, `0` otherwise
    pub prefix: u8,
    /// The opcode byte (the second byte for escaped opcodes)
    pub value: u8,
    /// Encoding of the operand that follows
    pub operand_kind: OperandKind,
    /// Control flow behaviour
    pub flow: FlowType,
}

impl OpCode {
    /// Placeholder stored in undefined table slots.
    pub const UNDEFINED: OpCode = OpCode {
        mnemonic: "",
        prefix: 0,
        value: 0,
        operand_kind: OperandKind::InlineNone,
        flow: FlowType::Sequential,
    };

    pub(crate) const fn new(
        mnemonic: &'static str,
        prefix: u8,
        value: u8,
        operand_kind: OperandKind,
        flow: FlowType,
    ) -> Self {
        OpCode {
            mnemonic,
            prefix,
            value,
            operand_kind,
            flow,
        }
    }

    /// Number of bytes the opcode itself occupies (1 or 2).
    #[must_use]
    pub fn size(&self) -> usize {
        if self.prefix == 0 {
            1
        } else {
            2
        }
    }

    /// The opcode as a single number, e.g. `0xFE1E` for `readonly.`
    #[must_use]
    pub fn code(&self) -> u16 {
        (u16::from(self.prefix) << 8) | u16::from(self.value)
    }

    /// Returns `false` for reserved or undefined table slots.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.mnemonic.is_empty()
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic)
    }
}

/// Immediate constant embedded in the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// `ldc.i4.s`, `unaligned.`, `no.`
    Int8(i8),
    /// `ldc.i4`
    Int32(i32),
    /// `ldc.i8`
    Int64(i64),
    /// `ldc.r4`
    Float32(f32),
    /// `ldc.r8`
    Float64(f64),
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value}"),
            Immediate::Int32(value) => write!(f, "{value}"),
            Immediate::Int64(value) => write!(f, "{value}"),
            Immediate::Float32(value) => write!(f, "{value:?}"),
            Immediate::Float64(value) => write!(f, "{value:?}"),
        }
    }
}

/// Decoded operand of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Numeric constant
    Immediate(Immediate),
    /// Argument or local variable index
    Variable(u16),
    /// Branch delta relative to the start of the next instruction
    BranchTarget(i32),
    /// Metadata token
    Token(Token),
    /// Jump table deltas, each relative to the start of the next instruction
    Switch(Vec<i32>),
}

impl Operand {
    /// The metadata token, if this operand carries one.
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            Operand::Token(token) => Some(*token),
            _ => None,
        }
    }
}

/// Outcome of resolving a token operand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Resolution {
    /// No resolution was attempted: the operand is not a token, or no resolver was supplied
    #[default]
    NotAttempted,
    /// A resolver was asked and could not produce a symbol
    Unresolved,
    /// The resolver produced a symbol
    Resolved(Symbol),
}

impl Resolution {
    /// The resolved symbol, if any.
    #[must_use]
    pub fn symbol(&self) -> Option<&Symbol> {
        match self {
            Resolution::Resolved(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Returns `true` if a symbol was produced.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// A single decoded instruction.
///
/// Instructions are immutable values; the decoder keeps no reference to them once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Offset of the first opcode byte within the method body
    pub offset: usize,
    /// Total encoded size (opcode and operand bytes)
    pub size: usize,
    /// Static opcode description
    pub opcode: &'static OpCode,
    /// Decoded operand
    pub operand: Operand,
    /// Resolution of the token operand
    pub resolution: Resolution,
    /// Absolute offsets of the branch or switch targets
    pub branch_targets: Vec<usize>,
}

impl Instruction {
    /// Textual name of the opcode.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.mnemonic
    }

    /// Encoding of the operand.
    #[must_use]
    pub fn operand_kind(&self) -> OperandKind {
        self.opcode.operand_kind
    }

    /// Control flow behaviour of the opcode.
    #[must_use]
    pub fn flow(&self) -> FlowType {
        self.opcode.flow
    }

    /// Offset of the instruction that follows this one.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }

    /// Resolves every relative delta carried by `operand` against the end of the instruction.
    ///
    /// Targets that would fall before offset 0 are dropped.
    pub(crate) fn compute_branch_targets(&mut self) {
        let next = self.next_offset();
        self.branch_targets = match &self.operand {
            Operand::BranchTarget(delta) => relative_target(next, *delta).into_iter().collect(),
            Operand::Switch(deltas) => deltas
                .iter()
                .filter_map(|delta| relative_target(next, *delta))
                .collect(),
            _ => Vec::new(),
        };
    }
}

fn relative_target(next: usize, delta: i32) -> Option<usize> {
    next.checked_add_signed(delta as isize)
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.opcode.mnemonic)?;

        match &self.operand {
            Operand::None => {}
            Operand::Immediate(value) => write!(f, " {value}")?,
            Operand::Variable(index) => write!(f, " {index}")?,
            Operand::BranchTarget(delta) => match self.branch_targets.first() {
                Some(target) => write!(f, " IL_{target:04x}")?,
                None => write!(f, " {delta:+}")?,
            },
            Operand::Switch(deltas) => {
                f.write_str(" (")?;
                if self.branch_targets.len() == deltas.len() {
                    for (index, target) in self.branch_targets.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "IL_{target:04x}")?;
                    }
                } else {
                    for (index, delta) in deltas.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{delta:+}")?;
                    }
                }
                f.write_str(")")?;
            }
            Operand::Token(token) => write!(f, " {token}")?,
        }

        if let Resolution::Resolved(symbol) = &self.resolution {
            write!(f, " // {symbol}")?;
        }

        Ok(())
    }
}
