//! Low-level byte access for instruction streams.
//!
//! - [`crate::file::io`] - Little-endian primitive reads and writes via [`crate::file::io::CilIO`]
//! - [`crate::file::parser`] - The forward-only [`crate::file::parser::Parser`] cursor

pub mod io;
pub mod parser;
