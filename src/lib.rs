// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilstream
//!
//! A decoder for CIL (Common Intermediate Language) instruction streams, the bytecode found in
//! the method bodies of .NET assemblies.
//!
//! Given the raw code bytes of a method and, optionally, a way to resolve metadata tokens,
//! `cilstream` produces the ordered sequence of instructions: offset, opcode, typed operand and
//! the resolved symbol for token operands. It is a building block for disassemblers, static
//! analyzers and instrumentation tools; it does not parse PE files or metadata tables itself.
//!
//! ## Features
//!
//! - **Complete opcode coverage** - Every single-byte and `0xFE`-escaped opcode of ECMA-335 Partition III
//! - **Bounds-checked decoding** - Every read is checked; hostile `switch` counts cannot trigger huge allocations
//! - **Precise diagnostics** - Every error carries the offset of the instruction that caused it
//! - **Pluggable resolution** - Token operands are resolved through a caller-supplied [`metadata::TokenResolver`]
//! - **Lazy or parallel** - Iterate one body lazily or decode many bodies at once with `rayon`
//! - **Round-trip** - Decoded instructions re-encode to the original bytes
//!
//! ## Quick Start
//!
//! ```rust
//! use cilstream::prelude::*;
//!
//! // ldarg.0, ldfld 0x04000001, ret
//! let body = [0x02, 0x7B, 0x01, 0x00, 0x00, 0x04, 0x2A];
//!
//! for instruction in decode_stream(&body, None)? {
//!     println!("{instruction}");
//! }
//! # Ok::<(), cilstream::Error>(())
//! ```
//!
//! ### Resolving Tokens
//!
//! ```rust
//! use cilstream::prelude::*;
//!
//! let resolver = |token: Token, _kind: OperandKind, _context: &MethodContext| {
//!     match token.value() {
//!         0x0A00_0001 => Ok(Symbol::new(token, SymbolKind::Method, "System.Console::WriteLine")),
//!         _ => Err(ResolveError::NotFound(token)),
//!     }
//! };
//! let context = MethodContext::new(Token::new(0x0600_0001));
//!
//! // ldstr 0x70000001, call 0x0A000001, ret
//! let body = [0x72, 0x01, 0x00, 0x00, 0x70, 0x28, 0x01, 0x00, 0x00, 0x0A, 0x2A];
//! let instructions = decode_stream(&body, Some((&resolver, &context)))?;
//!
//! assert_eq!(instructions[0].resolution, Resolution::Unresolved);
//! assert_eq!(
//!     instructions[1].to_string(),
//!     "IL_0005: call 0x0A000001 // System.Console::WriteLine"
//! );
//! # Ok::<(), cilstream::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`disassembler`] - Opcode tables, operand and instruction decoding, encoding
//! - [`metadata`] - Tokens and the resolver interface
//! - [`file`] - The bounds-checked byte cursor
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate reports through the [`log`](https://docs.rs/log) facade and never installs a
//! logger: decoded instructions at `trace`, failed decodes and unresolved tokens at `debug`,
//! stream resynchronisation at `warn`.
//!
//! ## Standards Compliance
//!
//! `cilstream` implements the instruction set of the **ECMA-335 specification** (6th edition).
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run decoder --release
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cilstream::prelude::*;
///
/// let instructions = decode_stream(&[0x00, 0x2A], None)?;
/// assert_eq!(instructions[1].flow(), FlowType::Return);
/// # Ok::<(), cilstream::Error>(())
/// ```
pub mod prelude;

/// Instructions, decoder and encoder based on ECMA-335
///
/// # Key Types
///
/// - [`disassembler::Instruction`] - Represents a decoded CIL instruction
/// - [`disassembler::InstructionDecoder`] - Lazy decoder over one method body
/// - [`disassembler::Operand`] - Instruction operands (immediates, tokens, targets)
/// - [`disassembler::OpCode`] - Entries of the static opcode tables
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::decode_instruction, Parser};
///
/// let bytecode = &[0x00, 0x2A]; // nop, ret
/// let mut parser = Parser::new(bytecode);
/// let instruction = decode_instruction(&mut parser)?;
///
/// println!("Mnemonic: {}", instruction.mnemonic());
/// println!("Flow type: {:?}", instruction.flow());
/// # Ok::<(), cilstream::Error>(())
/// ```
pub mod disassembler;

pub mod file;

pub mod metadata;

/// `cilstream` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilstream` Error type
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::decode_stream, Error};
///
/// match decode_stream(&[0x00, 0x24], None) {
///     Ok(_) => println!("Decoded successfully"),
///     Err(Error::UnknownOpcode { offset, .. }) => assert_eq!(offset, 1),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// The bounds-checked cursor used by the decoder.
///
/// # Example
///
/// ```rust
/// use cilstream::{Parser, disassembler::decode_instruction};
/// let code = [0x2A]; // ret
/// let mut parser = Parser::new(&code);
/// let instr = decode_instruction(&mut parser)?;
/// assert_eq!(instr.mnemonic(), "ret");
/// # Ok::<(), cilstream::Error>(())
/// ```
pub use file::parser::Parser;
