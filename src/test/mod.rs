//! Shared helpers for unit tests.

use std::collections::HashMap;

use crate::{
    disassembler::OperandKind,
    metadata::{MethodContext, ResolveError, Symbol, Token, TokenResolver},
};

/// Resolver that knows nothing.
pub struct NotFoundResolver;

impl TokenResolver for NotFoundResolver {
    fn resolve(
        &self,
        token: Token,
        _kind: OperandKind,
        _context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        Err(ResolveError::NotFound(token))
    }
}

/// Resolver backed by a fixed token-to-symbol table.
pub struct FixedResolver {
    symbols: HashMap<Token, Symbol>,
}

impl FixedResolver {
    pub fn new(symbols: impl IntoIterator<Item = (Token, Symbol)>) -> Self {
        FixedResolver {
            symbols: symbols.into_iter().collect(),
        }
    }
}

impl TokenResolver for FixedResolver {
    fn resolve(
        &self,
        token: Token,
        _kind: OperandKind,
        _context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        self.symbols
            .get(&token)
            .cloned()
            .ok_or(ResolveError::NotFound(token))
    }
}
