//! CIL instruction stream decoding.
//!
//! This module turns the raw code bytes of a method body into [`Instruction`]s, one at a time
//! ([`decode_instruction`]), lazily ([`InstructionDecoder`]), eagerly ([`decode_stream`]) or
//! for many bodies at once ([`decode_methods`]).
//!
//! Decoding is linear: instructions are produced in stream order, each starting where the
//! previous one ended. No control flow is followed, so data embedded after an unconditional
//! branch is decoded as if it were code.
//!
//! # Example: Decoding a Single Instruction
//!
//! ```rust
//! use cilstream::{Parser, disassembler::decode_instruction};
//! let code = [0x2A]; // ret
//! let mut parser = Parser::new(&code);
//! let instr = decode_instruction(&mut parser)?;
//! assert_eq!(instr.mnemonic(), "ret");
//! # Ok::<(), cilstream::Error>(())
//! ```
//!
//! # Example: Decoding a Stream of Instructions
//!
//! ```rust
//! use cilstream::disassembler::decode_stream;
//! let code = [0x00, 0x2A]; // nop, ret
//! let instrs = decode_stream(&code, None)?;
//! assert_eq!(instrs.len(), 2);
//! assert_eq!(instrs[1].offset, 1);
//! # Ok::<(), cilstream::Error>(())
//! ```

use std::iter::FusedIterator;

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::{
    disassembler::{
        decode_operand, lookup, lookup_escaped, DecoderConfig, Instruction, Lookup, OperandKind,
        Resolution,
    },
    file::parser::Parser,
    metadata::{MethodContext, TokenResolver},
    Error, Result,
};

/// A resolver together with the method whose body is being decoded.
pub type ResolverScope<'a> = (&'a dyn TokenResolver, &'a MethodContext);

/// Where an [`InstructionDecoder`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// On an instruction boundary, ready to decode
    Positioned,
    /// All bytes have been consumed
    Exhausted,
    /// The instruction starting at `offset` could not be decoded
    Failed {
        /// Offset of the failing instruction
        offset: usize,
        /// Whether [`InstructionDecoder::resync`] may skip past the failure
        recoverable: bool,
    },
}

/// Lazy decoder over one method body.
///
/// Yields one `Result<Instruction>` per instruction in stream order. After the first error the
/// decoder yields `None`; whether to skip the damaged byte and carry on is the caller's decision
/// (see [`InstructionDecoder::resync`]). Dropping the iterator early is the only form of
/// cancellation needed.
///
/// # Examples
///
/// ```rust
/// use cilstream::disassembler::InstructionDecoder;
///
/// // ldc.i4.s 42, <undefined 0x24>, ret
/// let body = [0x1F, 0x2A, 0x24, 0x2A];
/// let mut decoder = InstructionDecoder::new(&body);
///
/// let mut mnemonics = Vec::new();
/// loop {
///     match decoder.next() {
///         Some(Ok(instruction)) => mnemonics.push(instruction.mnemonic()),
///         Some(Err(_)) if decoder.resync() => mnemonics.push("??"),
///         Some(Err(error)) => return Err(error),
///         None => break,
///     }
/// }
/// assert_eq!(mnemonics, ["ldc.i4.s", "??", "ret"]);
/// # Ok::<(), cilstream::Error>(())
/// ```
pub struct InstructionDecoder<'a> {
    parser: Parser<'a>,
    resolver: Option<ResolverScope<'a>>,
    config: DecoderConfig,
    state: DecoderState,
}

impl<'a> InstructionDecoder<'a> {
    /// Creates a decoder positioned at the start of `data`, without a resolver.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        InstructionDecoder {
            parser: Parser::new(data),
            resolver: None,
            config: DecoderConfig::default(),
            state: DecoderState::Positioned,
        }
    }

    /// Resolves token operands through `resolver`, in the scope of `context`.
    #[must_use]
    pub fn with_resolver(
        mut self,
        resolver: &'a dyn TokenResolver,
        context: &'a MethodContext,
    ) -> Self {
        self.resolver = Some((resolver, context));
        self
    }

    /// Replaces the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    /// Offset of the next instruction to decode.
    #[must_use]
    pub fn position(&self) -> usize {
        self.parser.pos()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Skips the first byte of a failed instruction and resumes decoding after it.
    ///
    /// Only possible after a recoverable error ([`crate::Error::is_recoverable`]). Returns
    /// `false`, leaving the decoder failed, after truncation or when nothing failed. Note that
    /// instructions produced after a resync may be misaligned garbage.
    pub fn resync(&mut self) -> bool {
        let DecoderState::Failed {
            offset,
            recoverable: true,
        } = self.state
        else {
            return false;
        };

        let mut parser = Parser::new(self.parser.data());
        if parser.advance_by(offset + 1).is_err() {
            return false;
        }

        warn!("resynchronising instruction stream at offset 0x{:X}", offset + 1);
        self.parser = parser;
        self.state = DecoderState::Positioned;
        true
    }
}

impl Iterator for InstructionDecoder<'_> {
    type Item = Result<Instruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != DecoderState::Positioned {
            return None;
        }

        if !self.parser.has_more_data() {
            self.state = DecoderState::Exhausted;
            return None;
        }

        let start = self.parser.pos();
        match decode_with(&mut self.parser, &self.config, self.resolver) {
            Ok(instruction) => {
                trace!("{instruction}");
                Some(Ok(instruction))
            }
            Err(error) => {
                debug!("decoding failed at offset 0x{start:X}: {error}");
                self.state = DecoderState::Failed {
                    offset: start,
                    recoverable: error.is_recoverable(),
                };
                Some(Err(error))
            }
        }
    }
}

impl FusedIterator for InstructionDecoder<'_> {}

/// Decodes a complete method body.
///
/// Stops at the first error. Use [`InstructionDecoder`] directly to inspect partial results
/// or to resynchronise after errors.
///
/// # Arguments
///
/// * `data` - The code bytes of the method body (without header)
/// * `resolver` - Optional resolver and the context of the method being decoded
///
/// # Errors
///
/// Returns the first decoding error, with the offset of the failing instruction.
///
/// # Examples
///
/// ```rust
/// use cilstream::{
///     disassembler::{decode_stream, OperandKind, Resolution},
///     metadata::{MethodContext, ResolveError, Symbol, Token},
/// };
///
/// // ldstr 0x70000001, ret
/// let body = [0x72, 0x01, 0x00, 0x00, 0x70, 0x2A];
/// let resolver = |token: Token, _: OperandKind, _: &MethodContext| {
///     Err::<Symbol, _>(ResolveError::NotFound(token))
/// };
/// let context = MethodContext::new(Token::new(0x0600_0001));
///
/// let instructions = decode_stream(&body, Some((&resolver, &context)))?;
/// assert_eq!(instructions.len(), 2);
/// assert_eq!(instructions[0].resolution, Resolution::Unresolved);
/// # Ok::<(), cilstream::Error>(())
/// ```
pub fn decode_stream(data: &[u8], resolver: Option<ResolverScope<'_>>) -> Result<Vec<Instruction>> {
    let mut decoder = InstructionDecoder::new(data);
    if let Some((resolver, context)) = resolver {
        decoder = decoder.with_resolver(resolver, context);
    }

    decoder.collect()
}

/// Decodes several method bodies in parallel.
///
/// Each body is decoded independently with its own context; all of them share `resolver`,
/// which therefore has to cope with concurrent calls. The result holds one entry per body,
/// in input order.
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::decode_methods, metadata::{MethodContext, Token}};
///
/// let bodies = [
///     (&[0x00, 0x2A][..], MethodContext::new(Token::new(0x0600_0001))),
///     (&[0x24][..], MethodContext::new(Token::new(0x0600_0002))),
/// ];
/// let results = decode_methods(&bodies, None);
/// assert_eq!(results[0].as_ref().map(Vec::len), Ok(2));
/// assert!(results[1].is_err());
/// ```
pub fn decode_methods(
    bodies: &[(&[u8], MethodContext)],
    resolver: Option<&dyn TokenResolver>,
) -> Vec<Result<Vec<Instruction>>> {
    bodies
        .par_iter()
        .map(|(data, context)| decode_stream(data, resolver.map(|resolver| (resolver, context))))
        .collect()
}

/// Decodes a single CIL instruction at the current parser position.
///
/// Uses the default configuration, so branch targets are computed, and no resolver, so every
/// instruction has [`Resolution::NotAttempted`].
///
/// On success the parser has advanced by exactly [`Instruction::size`] bytes.
///
/// # Errors
///
/// Returns an error carrying the offset of the instruction's first byte if:
/// - the opcode is undefined ([`crate::Error::UnknownOpcode`])
/// - the opcode or operand runs past the end of the data ([`crate::Error::TruncatedStream`])
/// - the operand kind is not decodable ([`crate::Error::UnsupportedOperandKind`])
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::{decode_instruction, Operand}, metadata::Token, Parser};
///
/// // ldstr 0x70000001
/// let bytecode = [0x72, 0x01, 0x00, 0x00, 0x70];
/// let mut parser = Parser::new(&bytecode);
///
/// let instruction = decode_instruction(&mut parser)?;
/// assert_eq!(instruction.mnemonic(), "ldstr");
/// assert_eq!(instruction.size, 5);
/// assert_eq!(instruction.operand, Operand::Token(Token::new(0x7000_0001)));
/// # Ok::<(), cilstream::Error>(())
/// ```
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    decode_with(parser, &DecoderConfig::default(), None)
}

fn decode_with(
    parser: &mut Parser,
    config: &DecoderConfig,
    resolver: Option<ResolverScope<'_>>,
) -> Result<Instruction> {
    let start = parser.pos();
    decode_at(parser, start, config, resolver).map_err(|error| error.at_instruction(start))
}

fn decode_at(
    parser: &mut Parser,
    start: usize,
    config: &DecoderConfig,
    resolver: Option<ResolverScope<'_>>,
) -> Result<Instruction> {
    let opcode = match lookup(parser.read_le::<u8>()?)? {
        Lookup::OpCode(opcode) => opcode,
        Lookup::Escape => lookup_escaped(parser.read_le::<u8>()?)?,
    };

    if opcode.operand_kind == OperandKind::InlineSwitch {
        if let Some(max) = config.max_switch_targets {
            let count = parser.clone().read_le::<u32>()? as usize;
            if count > max {
                return Err(Error::SwitchTooLarge {
                    offset: start,
                    count,
                    limit: max,
                });
            }
        }
    }

    let operand = decode_operand(opcode.operand_kind, parser)?;

    let resolution = match (operand.token(), resolver) {
        (Some(token), Some((resolver, context))) if config.resolve_tokens => {
            match resolver.resolve(token, opcode.operand_kind, context) {
                Ok(symbol) => Resolution::Resolved(symbol),
                Err(error) => {
                    debug!(
                        "IL_{start:04x}: {} {token} left unresolved - {error}",
                        opcode.mnemonic
                    );
                    Resolution::Unresolved
                }
            }
        }
        _ => Resolution::NotAttempted,
    };

    let mut instruction = Instruction {
        offset: start,
        size: parser.pos() - start,
        opcode,
        operand,
        resolution,
        branch_targets: Vec::new(),
    };

    if config.compute_branch_targets {
        instruction.compute_branch_targets();
    }

    Ok(instruction)
}
