//! Metadata references carried by instruction operands.
//!
//! The decoder only ever copies tokens out of the instruction stream. Turning them into
//! symbols is delegated to a [`TokenResolver`] supplied by the caller.

pub mod resolver;
pub mod token;

pub use resolver::{
    CachingResolver, GenericContext, MethodContext, ResolveError, Symbol, SymbolKind,
    TokenResolver,
};
pub use token::{Token, TokenKind};
