//! # cilstream Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cilstream library. Import this module to get quick access to the essential
//! types for decoding CIL method bodies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilstream operations
pub use crate::Error;

/// The result type used throughout cilstream
pub use crate::Result;

/// Bounds-checked byte cursor
pub use crate::Parser;

// ================================================================================================
// Decoding
// ================================================================================================

/// Entry points for decoding instruction streams
pub use crate::disassembler::{
    decode_instruction, decode_methods, decode_stream, DecoderConfig, DecoderState,
    InstructionDecoder,
};

/// Decoded instruction model
pub use crate::disassembler::{
    FlowType, Immediate, Instruction, OpCode, Operand, OperandKind, Resolution,
};

/// Opcode table access
pub use crate::disassembler::{lookup, lookup_escaped, opcode_by_mnemonic, Lookup};

/// Encoding back to bytes
pub use crate::disassembler::{encode_instruction, InstructionEncoder};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata tokens
pub use crate::metadata::{Token, TokenKind};

/// Token resolution
pub use crate::metadata::{
    CachingResolver, GenericContext, MethodContext, ResolveError, Symbol, SymbolKind,
    TokenResolver,
};
