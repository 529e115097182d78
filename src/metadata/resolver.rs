//! Best-effort resolution of operand tokens into symbols.
//!
//! The decoder never owns metadata. Whoever drives it may inject a [`TokenResolver`] that knows
//! how to turn a [`Token`] into a [`Symbol`] in the scope of the method being decoded. Resolution
//! is strictly optional: a missing resolver, a [`ResolveError::NotFound`] or any other resolver
//! failure only marks the operand as unresolved and never interrupts decoding.
//!
//! Generic tokens (e.g. a `MemberRef` on `List<!0>` or a `MethodSpec` instantiated with `!!0`)
//! can only be resolved against the generic arguments of the enclosing method and its declaring
//! type, which is why every call receives the [`MethodContext`].
//!
//! # Examples
//!
//! ```rust
//! use cilstream::{
//!     disassembler::OperandKind,
//!     metadata::{MethodContext, ResolveError, Symbol, SymbolKind, Token},
//!     metadata::TokenResolver,
//! };
//!
//! let resolver = |token: Token, _kind: OperandKind, _ctx: &MethodContext| {
//!     if token == Token::new(0x0A00_0001) {
//!         Ok(Symbol::new(token, SymbolKind::Method, "System.Console::WriteLine"))
//!     } else {
//!         Err(ResolveError::NotFound(token))
//!     }
//! };
//!
//! let context = MethodContext::new(Token::new(0x0600_0001));
//! let symbol = resolver.resolve(Token::new(0x0A00_0001), OperandKind::InlineMethod, &context)?;
//! assert_eq!(symbol.name, "System.Console::WriteLine");
//! # Ok::<(), ResolveError>(())
//! ```

use std::fmt;

use dashmap::DashMap;

use crate::{disassembler::OperandKind, metadata::token::Token};

/// What kind of entity a [`Symbol`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A method definition, reference or instantiation
    Method,
    /// A field definition or reference
    Field,
    /// A type definition, reference or specification
    Type,
    /// A user-string literal
    String,
    /// A stand-alone signature (`calli`)
    Signature,
    /// A member whose kind is only known at runtime (`ldtoken`)
    Member,
}

impl SymbolKind {
    /// The symbol kind an operand of `kind` is expected to resolve to.
    #[must_use]
    pub fn expected_for(kind: OperandKind) -> Option<Self> {
        match kind {
            OperandKind::InlineMethod => Some(SymbolKind::Method),
            OperandKind::InlineField => Some(SymbolKind::Field),
            OperandKind::InlineType => Some(SymbolKind::Type),
            OperandKind::InlineString => Some(SymbolKind::String),
            OperandKind::InlineSig => Some(SymbolKind::Signature),
            OperandKind::InlineTok => Some(SymbolKind::Member),
            _ => None,
        }
    }
}

/// A resolved metadata entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    /// Token the symbol was resolved from
    pub token: Token,
    /// What the symbol names
    pub kind: SymbolKind,
    /// Display name, as produced by the resolver
    pub name: String,
}

impl Symbol {
    /// Creates a new symbol.
    pub fn new(token: Token, kind: SymbolKind, name: impl Into<String>) -> Self {
        Symbol {
            token,
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == SymbolKind::String {
            write!(f, "{:?}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Why a resolver could not produce a [`Symbol`].
///
/// The decoder treats every variant the same way: the operand stays in the instruction, the
/// symbol is marked as unresolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The token does not name anything known to the resolver
    #[error("Token {0} not found")]
    NotFound(Token),
    /// The resolver failed for another reason
    #[error("Resolution failed - {0}")]
    Failed(String),
}

/// Generic arguments visible to a method body.
///
/// `method_arguments` is `None` for constructors, which cannot declare generic parameters of
/// their own; only the declaring type's arguments apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct GenericContext {
    /// Generic arguments of the declaring type (`!0`, `!1`, ...)
    pub type_arguments: Vec<Token>,
    /// Generic arguments of the method itself (`!!0`, `!!1`, ...)
    pub method_arguments: Option<Vec<Token>>,
}

/// The method whose body is being decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContext {
    /// `MethodDef` token of the method
    pub method: Token,
    /// Declaring type, if the method is not a global function
    pub declaring_type: Option<Token>,
    /// `true` for `.ctor` / `.cctor`
    pub is_constructor: bool,
    /// Generic arguments of the declaring type
    pub type_arguments: Vec<Token>,
    /// Generic arguments of the method
    pub method_arguments: Vec<Token>,
}

impl MethodContext {
    /// A non-generic, non-constructor method without a declaring type.
    #[must_use]
    pub fn new(method: Token) -> Self {
        MethodContext {
            method,
            declaring_type: None,
            is_constructor: false,
            type_arguments: Vec::new(),
            method_arguments: Vec::new(),
        }
    }

    /// Sets the declaring type and its generic arguments.
    #[must_use]
    pub fn with_declaring_type(mut self, declaring_type: Token, type_arguments: Vec<Token>) -> Self {
        self.declaring_type = Some(declaring_type);
        self.type_arguments = type_arguments;
        self
    }

    /// Sets the method's own generic arguments.
    #[must_use]
    pub fn with_method_arguments(mut self, method_arguments: Vec<Token>) -> Self {
        self.method_arguments = method_arguments;
        self
    }

    /// Marks the method as an instance or type constructor.
    #[must_use]
    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    /// The generic arguments tokens in this body must be resolved against.
    ///
    /// Method arguments are omitted for constructors.
    #[must_use]
    pub fn generic_context(&self) -> GenericContext {
        GenericContext {
            type_arguments: if self.declaring_type.is_some() {
                self.type_arguments.clone()
            } else {
                Vec::new()
            },
            method_arguments: if self.is_constructor {
                None
            } else {
                Some(self.method_arguments.clone())
            },
        }
    }
}

/// Resolves operand tokens to symbols.
///
/// Implementations must tolerate concurrent calls: the same resolver may be shared by several
/// decoders running on different threads (see [`crate::disassembler::decode_methods`]). Any
/// internal caching or locking is the implementation's own business.
///
/// Closures with the matching signature implement this trait.
pub trait TokenResolver: Send + Sync {
    /// Resolve `token`, which appeared as an operand of kind `kind`, in `context`.
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] when the token is unknown, or
    /// [`ResolveError::Failed`] for any other problem.
    fn resolve(
        &self,
        token: Token,
        kind: OperandKind,
        context: &MethodContext,
    ) -> Result<Symbol, ResolveError>;
}

impl<F> TokenResolver for F
where
    F: Fn(Token, OperandKind, &MethodContext) -> Result<Symbol, ResolveError> + Send + Sync,
{
    fn resolve(
        &self,
        token: Token,
        kind: OperandKind,
        context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        self(token, kind, context)
    }
}

/// Memoising wrapper around another [`TokenResolver`].
///
/// Results (including failures) are cached per token, operand kind and generic context, so the
/// same `call` target referenced from many methods is only resolved once. The cache is a
/// concurrent map and can be shared freely between threads.
///
/// The cache is unbounded and never evicts: hosts that decode many assemblies over a long
/// lifetime should call [`CachingResolver::clear`] between them.
pub struct CachingResolver<R> {
    inner: R,
    cache: DashMap<(Token, OperandKind, GenericContext), Result<Symbol, ResolveError>>,
}

impl<R: TokenResolver> CachingResolver<R> {
    /// Wraps `inner` with an empty cache.
    pub fn new(inner: R) -> Self {
        CachingResolver {
            inner,
            cache: DashMap::new(),
        }
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Returns the wrapped resolver.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: TokenResolver> TokenResolver for CachingResolver<R> {
    fn resolve(
        &self,
        token: Token,
        kind: OperandKind,
        context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        let key = (token, kind, context.generic_context());
        if let Some(hit) = self.cache.get(&key) {
            log::trace!("resolver cache hit for {token}");
            return hit.value().clone();
        }

        let result = self.inner.resolve(token, kind, context);
        self.cache.insert(key, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl TokenResolver for CountingResolver {
        fn resolve(
            &self,
            token: Token,
            _kind: OperandKind,
            context: &MethodContext,
        ) -> Result<Symbol, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match context.generic_context().type_arguments.first() {
                Some(arg) => Ok(Symbol::new(token, SymbolKind::Method, format!("M<{arg}>"))),
                None => Err(ResolveError::NotFound(token)),
            }
        }
    }

    #[test]
    fn generic_context_for_methods() {
        let context = MethodContext::new(Token(0x0600_0002))
            .with_declaring_type(Token(0x0200_0003), vec![Token(0x0100_0001)])
            .with_method_arguments(vec![Token(0x0100_0002)]);

        let generic = context.generic_context();
        assert_eq!(generic.type_arguments, vec![Token(0x0100_0001)]);
        assert_eq!(generic.method_arguments, Some(vec![Token(0x0100_0002)]));
    }

    #[test]
    fn generic_context_for_constructors() {
        let context = MethodContext::new(Token(0x0600_0001))
            .with_declaring_type(Token(0x0200_0003), vec![Token(0x0100_0001)])
            .with_method_arguments(vec![Token(0x0100_0002)])
            .constructor();

        let generic = context.generic_context();
        assert_eq!(generic.type_arguments, vec![Token(0x0100_0001)]);
        assert_eq!(generic.method_arguments, None);
    }

    #[test]
    fn generic_context_without_declaring_type() {
        let mut context = MethodContext::new(Token(0x0600_0001));
        context.type_arguments = vec![Token(0x0100_0001)];

        assert!(context.generic_context().type_arguments.is_empty());
    }

    #[test]
    fn symbol_kind_for_operands() {
        assert_eq!(
            SymbolKind::expected_for(OperandKind::InlineField),
            Some(SymbolKind::Field)
        );
        assert_eq!(
            SymbolKind::expected_for(OperandKind::InlineTok),
            Some(SymbolKind::Member)
        );
        assert_eq!(SymbolKind::expected_for(OperandKind::InlineI), None);
    }

    #[test]
    fn symbol_display() {
        let method = Symbol::new(Token(0x0A00_0001), SymbolKind::Method, "Foo::Bar");
        assert_eq!(method.to_string(), "Foo::Bar");

        let string = Symbol::new(Token(0x7000_0001), SymbolKind::String, "hi \"there\"");
        assert_eq!(string.to_string(), "\"hi \\\"there\\\"\"");
    }

    #[test]
    fn closure_resolver() {
        let resolver = |token: Token, _kind: OperandKind, _ctx: &MethodContext| {
            Err::<Symbol, _>(ResolveError::Failed(format!("no metadata for {token}")))
        };
        let context = MethodContext::new(Token(0x0600_0001));

        let result = resolver.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &context);
        assert_eq!(
            result,
            Err(ResolveError::Failed("no metadata for 0x0A000001".into()))
        );
    }

    #[test]
    fn caching_resolver_memoises_per_context() {
        let cache = CachingResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let generic = MethodContext::new(Token(0x0600_0001))
            .with_declaring_type(Token(0x0200_0001), vec![Token(0x0100_0005)]);
        let plain = MethodContext::new(Token(0x0600_0002));

        let first = cache.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &generic);
        let second = cache.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &generic);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().name, "M<0x01000005>");

        let missing = cache.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &plain);
        assert!(matches!(missing, Err(ResolveError::NotFound(_))));
        let missing_again = cache.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &plain);
        assert!(missing_again.is_err());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.into_inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn caching_resolver_clear() {
        let cache = CachingResolver::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let context = MethodContext::new(Token(0x0600_0001));

        let _ = cache.resolve(Token(0x0A00_0001), OperandKind::InlineMethod, &context);
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
