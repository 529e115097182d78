//! Forward-only byte cursor for CIL instruction streams.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor over a borrowed
//! method body. Every read is bounds-checked before it happens; the buffer length is under the
//! control of whoever produced the method body and must never be trusted.
//!
//! # Usage Examples
//!
//! ```rust
//! use cilstream::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//! assert_eq!(parser.pos(), 2);
//! assert_eq!(parser.remaining(), 3);
//! # Ok::<(), cilstream::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Error, Result,
};

/// A forward-only cursor over a borrowed byte buffer.
///
/// The position only ever moves forward and never exceeds the buffer length after a
/// successful operation. A failed read leaves the position where it was.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] positioned at the start of `data`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilstream::Parser;
    /// let parser = Parser::new(&[0x01, 0x02, 0x03]);
    /// assert_eq!(parser.len(), 3);
    /// assert_eq!(parser.pos(), 0);
    /// ```
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of bytes left between the current position and the end of the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if advancing by `step` would pass the end
    /// of the data.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilstream::Parser;
    /// let mut parser = Parser::new(&[0x01, 0x02, 0x03]);
    /// parser.advance_by(2)?;
    /// assert_eq!(parser.pos(), 2);
    /// assert!(parser.advance_by(2).is_err());
    /// assert_eq!(parser.pos(), 2);
    /// # Ok::<(), cilstream::Error>(())
    /// ```
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        self.ensure(step)?;
        self.position += step;
        Ok(())
    }

    /// Fails unless at least `needed` bytes remain.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] describing the shortfall.
    pub fn ensure(&self, needed: usize) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(Error::TruncatedStream {
                offset: self.position,
                needed,
                available,
            });
        }

        Ok(())
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if position is at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.data[self.position])
    }

    /// Read a value of type `T` in little-endian format and advance past it.
    ///
    /// Supported types are `u8`, `i8`, `u16`, `i16`, `u32`, `i32`, `u64`, `i64`, `f32` and
    /// `f64`.
    ///
    /// # Errors
    /// Returns [`crate::Error::TruncatedStream`] if reading `T` would exceed the data length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilstream::Parser;
    /// let mut parser = Parser::new(&[0xFF, 0x2A, 0x00, 0x00, 0x00]);
    /// assert_eq!(parser.read_le::<i8>()?, -1);
    /// assert_eq!(parser.read_le::<u32>()?, 42);
    /// assert!(!parser.has_more_data());
    /// # Ok::<(), cilstream::Error>(())
    /// ```
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }
}
