use thiserror::Error;

use crate::disassembler::OperandKind;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every decoding error identifies the byte offset at which it occurred, so malformed or
/// truncated method bodies can be diagnosed without re-running the decoder.
///
/// # Error Categories
///
/// ## Stream Errors
/// - [`Error::TruncatedStream`] - Fewer bytes remain than an opcode or operand requires. Always
///   fatal for the stream, as the cursor can no longer be trusted to sit on an instruction boundary.
/// - [`Error::UnknownOpcode`] - The opcode byte (or escaped byte) has no table entry. Fatal for
///   the current step only; callers may resynchronise.
/// - [`Error::UnsupportedOperandKind`] - The operand kind is known but intentionally not decoded.
/// - [`Error::SwitchTooLarge`] - A `switch` table exceeds the configured target limit.
///
/// ## Encoding Errors
/// - [`Error::Malformed`] - Inconsistent input to the encoder
/// - [`Error::InvalidMnemonic`] - Mnemonic not present in the opcode tables
///
/// Failing to resolve a metadata token is **not** an error; it degrades to
/// [`crate::disassembler::Resolution::Unresolved`].
///
/// # Examples
///
/// ```rust
/// use cilstream::{disassembler::InstructionDecoder, Error};
///
/// // call, followed by only two of its four token bytes
/// let body = [0x00, 0x28, 0x01, 0x00];
/// let mut decoder = InstructionDecoder::new(&body);
///
/// assert!(decoder.next().unwrap().is_ok());
/// match decoder.next().unwrap() {
///     Err(Error::TruncatedStream { offset, .. }) => assert_eq!(offset, 1),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Fewer bytes remain in the stream than the current opcode or operand requires.
    ///
    /// When produced by the instruction decoder, `offset` is the offset of the opcode that
    /// started the failing instruction. When produced by the raw [`crate::Parser`], it is
    /// the position of the attempted read.
    #[error("Truncated stream at offset 0x{offset:X} - needed {needed} bytes, {available} available")]
    TruncatedStream {
        /// Offset at which the failing instruction (or read) began
        offset: usize,
        /// Number of bytes the failing read required
        needed: usize,
        /// Number of bytes that were actually left
        available: usize,
    },

    /// The opcode has no entry in the opcode tables.
    ///
    /// `prefix` is `0xFE` for the escaped opcode space and `0` otherwise.
    #[error("Unknown opcode {prefix:02X}:{value:02X} at offset 0x{offset:X}")]
    UnknownOpcode {
        /// Offset of the first opcode byte
        offset: usize,
        /// Escape prefix (0xFE) or 0
        prefix: u8,
        /// The undefined opcode byte
        value: u8,
    },

    /// The opcode uses an operand kind that this decoder does not implement.
    #[error("Unsupported operand kind {kind:?} at offset 0x{offset:X}")]
    UnsupportedOperandKind {
        /// Offset of the first opcode byte
        offset: usize,
        /// The operand kind that could not be decoded
        kind: OperandKind,
    },

    /// A `switch` declares more targets than the decoder is configured to accept.
    ///
    /// Only produced when [`crate::disassembler::DecoderConfig::max_switch_targets`] is set.
    #[error("Switch at offset 0x{offset:X} has {count} targets, limit is {limit}")]
    SwitchTooLarge {
        /// Offset of the `switch` opcode
        offset: usize,
        /// Target count declared by the table
        count: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The input is damaged or inconsistent.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The mnemonic is not part of the opcode tables.
    #[error("Invalid mnemonic - {0}")]
    InvalidMnemonic(String),
}

impl Error {
    /// Returns the stream offset this error refers to, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::TruncatedStream { offset, .. }
            | Error::UnknownOpcode { offset, .. }
            | Error::UnsupportedOperandKind { offset, .. }
            | Error::SwitchTooLarge { offset, .. } => Some(*offset),
            Error::Malformed { .. } | Error::InvalidMnemonic(_) => None,
        }
    }

    /// Returns `true` if decoding may continue after skipping past this error.
    ///
    /// Truncation is never recoverable because the cursor position can no longer be
    /// trusted to lie on an instruction boundary.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnknownOpcode { .. } | Error::UnsupportedOperandKind { .. }
        )
    }

    /// Re-anchors a positional error to the start of the instruction that produced it.
    pub(crate) fn at_instruction(self, start: usize) -> Self {
        match self {
            Error::TruncatedStream {
                needed, available, ..
            } => Error::TruncatedStream {
                offset: start,
                needed,
                available,
            },
            Error::UnknownOpcode { prefix, value, .. } => Error::UnknownOpcode {
                offset: start,
                prefix,
                value,
            },
            Error::UnsupportedOperandKind { kind, .. } => {
                Error::UnsupportedOperandKind { offset: start, kind }
            }
            Error::SwitchTooLarge { count, limit, .. } => Error::SwitchTooLarge {
                offset: start,
                count,
                limit,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        let err = Error::TruncatedStream {
            offset: 4,
            needed: 4,
            available: 2,
        };
        assert_eq!(err.offset(), Some(4));
        assert!(!err.is_recoverable());

        let err = Error::UnknownOpcode {
            offset: 7,
            prefix: 0xFE,
            value: 0x08,
        };
        assert_eq!(err.offset(), Some(7));
        assert!(err.is_recoverable());

        let err = Error::SwitchTooLarge {
            offset: 3,
            count: 70_000,
            limit: 65_536,
        };
        assert_eq!(err.offset(), Some(3));
        assert!(!err.is_recoverable());

        assert_eq!(malformed_error!("bad").offset(), None);
        assert_eq!(Error::InvalidMnemonic("foo".into()).offset(), None);
    }

    #[test]
    fn at_instruction_reanchors() {
        let err = Error::TruncatedStream {
            offset: 9,
            needed: 4,
            available: 1,
        }
        .at_instruction(5);
        assert_eq!(
            err,
            Error::TruncatedStream {
                offset: 5,
                needed: 4,
                available: 1
            }
        );

        let err = Error::SwitchTooLarge {
            offset: 0,
            count: 3,
            limit: 2,
        }
        .at_instruction(8);
        assert_eq!(err.offset(), Some(8));

        let err = malformed_error!("value {}", 1).at_instruction(3);
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn display() {
        let err = Error::UnknownOpcode {
            offset: 0x10,
            prefix: 0,
            value: 0xA6,
        };
        assert_eq!(err.to_string(), "Unknown opcode 00:A6 at offset 0x10");

        let err = Error::UnsupportedOperandKind {
            offset: 2,
            kind: OperandKind::InlinePhi,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported operand kind InlinePhi at offset 0x2"
        );
    }
}
