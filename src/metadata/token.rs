//! Metadata tokens embedded in CIL instruction operands.

use std::fmt;

use strum::{EnumCount, EnumIter};

/// A metadata token representing a reference to a metadata table entry or heap.
///
/// Tokens in .NET metadata consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// For `ldstr`, the high byte is `0x70` and the low bits are an offset into the `#US` heap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Classifies the token by the table it points into.
    ///
    /// Returns `None` for table bytes that never appear as instruction operands.
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_table(self.table())
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// The metadata tables (and the user-string heap) a CIL operand token can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum TokenKind {
    /// `TypeRef` table (0x01)
    TypeRef,
    /// `TypeDef` table (0x02)
    TypeDef,
    /// `Field` table (0x04)
    Field,
    /// `MethodDef` table (0x06)
    MethodDef,
    /// `MemberRef` table (0x0A)
    MemberRef,
    /// `StandAloneSig` table (0x11)
    StandAloneSig,
    /// `TypeSpec` table (0x1B)
    TypeSpec,
    /// `MethodSpec` table (0x2B)
    MethodSpec,
    /// `#US` user-string heap (0x70)
    UserString,
}

impl TokenKind {
    /// Maps a token's table byte to its kind.
    #[must_use]
    pub fn from_table(table: u8) -> Option<Self> {
        match table {
            0x01 => Some(TokenKind::TypeRef),
            0x02 => Some(TokenKind::TypeDef),
            0x04 => Some(TokenKind::Field),
            0x06 => Some(TokenKind::MethodDef),
            0x0A => Some(TokenKind::MemberRef),
            0x11 => Some(TokenKind::StandAloneSig),
            0x1B => Some(TokenKind::TypeSpec),
            0x2B => Some(TokenKind::MethodSpec),
            0x70 => Some(TokenKind::UserString),
            _ => None,
        }
    }

    /// The table byte used in the high byte of tokens of this kind.
    #[must_use]
    pub fn table(self) -> u8 {
        match self {
            TokenKind::TypeRef => 0x01,
            TokenKind::TypeDef => 0x02,
            TokenKind::Field => 0x04,
            TokenKind::MethodDef => 0x06,
            TokenKind::MemberRef => 0x0A,
            TokenKind::StandAloneSig => 0x11,
            TokenKind::TypeSpec => 0x1B,
            TokenKind::MethodSpec => 0x2B,
            TokenKind::UserString => 0x70,
        }
    }
}
