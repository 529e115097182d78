//! Token resolution integration tests.
//!
//! Resolution is best-effort: these tests verify that failing resolvers never disturb
//! decoding, that the enclosing method's generic context reaches the resolver, and that a
//! caching resolver can be shared by parallel decoders.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use cilstream::{
    disassembler::{decode_methods, decode_stream, InstructionDecoder, OperandKind, Resolution},
    metadata::{
        CachingResolver, GenericContext, MethodContext, ResolveError, Symbol, SymbolKind, Token,
        TokenResolver,
    },
};

/// ldstr, call, ldfld, newobj, castclass, ldtoken, ret
const BODY: [u8; 31] = [
    0x72, 0x01, 0x00, 0x00, 0x70, // ldstr 0x70000001
    0x28, 0x01, 0x00, 0x00, 0x0A, // call 0x0A000001
    0x7B, 0x01, 0x00, 0x00, 0x04, // ldfld 0x04000001
    0x73, 0x02, 0x00, 0x00, 0x06, // newobj 0x06000002
    0x74, 0x01, 0x00, 0x00, 0x1B, // castclass 0x1B000001
    0xD0, 0x01, 0x00, 0x00, 0x02, // ldtoken 0x02000001
    0x2A, // ret
];

struct NotFound;

impl TokenResolver for NotFound {
    fn resolve(
        &self,
        token: Token,
        _kind: OperandKind,
        _context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        Err(ResolveError::NotFound(token))
    }
}

/// Records every request and answers with a name built from it.
#[derive(Default)]
struct Recording {
    calls: AtomicUsize,
    seen: Mutex<Vec<(Token, OperandKind, GenericContext)>>,
}

impl TokenResolver for Recording {
    fn resolve(
        &self,
        token: Token,
        kind: OperandKind,
        context: &MethodContext,
    ) -> Result<Symbol, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .map_err(|_| ResolveError::Failed("poisoned".into()))?
            .push((token, kind, context.generic_context()));

        let kind = SymbolKind::expected_for(kind)
            .ok_or_else(|| ResolveError::Failed(format!("{kind:?} is not a token kind")))?;
        Ok(Symbol::new(token, kind, format!("sym_{:x}", token.row())))
    }
}

#[test]
fn not_found_resolver_keeps_tokens_and_continues() {
    let context = MethodContext::new(Token::new(0x0600_0001));
    let instructions = decode_stream(&BODY, Some((&NotFound, &context))).unwrap();

    assert_eq!(instructions.len(), 7);
    for instruction in &instructions[..6] {
        assert!(instruction.operand.token().is_some());
        assert_eq!(instruction.resolution, Resolution::Unresolved);
    }
    assert_eq!(instructions[6].mnemonic(), "ret");
    assert_eq!(instructions[6].resolution, Resolution::NotAttempted);
}

#[test]
fn unresolved_decode_matches_plain_decode() {
    let context = MethodContext::new(Token::new(0x0600_0001));
    let plain = decode_stream(&BODY, None).unwrap();
    let unresolved = decode_stream(&BODY, Some((&NotFound, &context))).unwrap();

    assert_eq!(plain.len(), unresolved.len());
    for (a, b) in plain.iter().zip(&unresolved) {
        assert_eq!(a.offset, b.offset);
        assert_eq!(a.operand, b.operand);
    }
}

#[test]
fn every_token_kind_is_resolved() {
    let resolver = Recording::default();
    let context = MethodContext::new(Token::new(0x0600_0001));
    let instructions = decode_stream(&BODY, Some((&resolver, &context))).unwrap();

    let kinds: Vec<_> = instructions
        .iter()
        .filter_map(|i| i.resolution.symbol().map(|s| s.kind))
        .collect();
    assert_eq!(
        kinds,
        [
            SymbolKind::String,
            SymbolKind::Method,
            SymbolKind::Field,
            SymbolKind::Method,
            SymbolKind::Type,
            SymbolKind::Member,
        ]
    );
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 6);
}

#[test]
fn constructor_context_omits_method_arguments() {
    let resolver = Recording::default();
    let declaring = Token::new(0x0200_0004);
    let type_args = vec![Token::new(0x0100_0001)];
    let method_args = vec![Token::new(0x0100_0002)];

    let ctor = MethodContext::new(Token::new(0x0600_0001))
        .with_declaring_type(declaring, type_args.clone())
        .with_method_arguments(method_args.clone())
        .constructor();
    let method = MethodContext::new(Token::new(0x0600_0002))
        .with_declaring_type(declaring, type_args.clone())
        .with_method_arguments(method_args.clone());

    let call = [0x28, 0x01, 0x00, 0x00, 0x2B];
    decode_stream(&call, Some((&resolver, &ctor))).unwrap();
    decode_stream(&call, Some((&resolver, &method))).unwrap();

    let seen = resolver.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].1, OperandKind::InlineMethod);
    assert_eq!(seen[0].2.type_arguments, type_args);
    assert_eq!(seen[0].2.method_arguments, None);
    assert_eq!(seen[1].2.method_arguments, Some(method_args));
}

#[test]
fn failing_resolver_never_aborts() {
    let flaky = |token: Token, _kind: OperandKind, _context: &MethodContext| {
        if token.row() % 2 == 0 {
            Err(ResolveError::Failed("backing store unavailable".into()))
        } else {
            Ok(Symbol::new(token, SymbolKind::Member, "ok"))
        }
    };
    let context = MethodContext::new(Token::new(0x0600_0001));
    let instructions: Vec<_> = InstructionDecoder::new(&BODY)
        .with_resolver(&flaky, &context)
        .collect::<cilstream::Result<_>>()
        .unwrap();

    // newobj 0x06000002 is the only even row
    assert_eq!(instructions[3].resolution, Resolution::Unresolved);
    assert_eq!(
        instructions
            .iter()
            .filter(|i| i.resolution.is_resolved())
            .count(),
        5
    );
}

#[test]
fn caching_resolver_shared_across_parallel_decoders() {
    let resolver = CachingResolver::new(Recording::default());
    let bodies: Vec<(&[u8], MethodContext)> = (0..200u32)
        .map(|i| (&BODY[..], MethodContext::new(Token::new(0x0600_0001 + i))))
        .collect();

    let first = decode_methods(&bodies, Some(&resolver));
    let second = decode_methods(&bodies, Some(&resolver));

    assert_eq!(first, second);
    assert!(first.iter().all(|r| r.as_ref().map(Vec::len) == Ok(7)));
    // every non-generic context shares one cache entry per token
    assert_eq!(resolver.len(), 6);

    let inner = resolver.into_inner();
    let calls = inner.calls.load(Ordering::SeqCst);
    assert!(calls >= 6);
    assert!(calls <= 6 * 200);
}

#[test]
fn caching_resolver_keys_on_operand_kind() {
    // ldtoken 0x0A000001, call 0x0A000001
    let body = [0xD0, 0x01, 0x00, 0x00, 0x0A, 0x28, 0x01, 0x00, 0x00, 0x0A];
    let context = MethodContext::new(Token::new(0x0600_0001));

    let direct = Recording::default();
    let expected = decode_stream(&body, Some((&direct, &context))).unwrap();

    let cached = CachingResolver::new(Recording::default());
    let first = decode_stream(&body, Some((&cached, &context))).unwrap();
    let second = decode_stream(&body, Some((&cached, &context))).unwrap();

    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(
        first[0].resolution.symbol().map(|s| s.kind),
        Some(SymbolKind::Member)
    );
    assert_eq!(
        first[1].resolution.symbol().map(|s| s.kind),
        Some(SymbolKind::Method)
    );
    assert_eq!(cached.len(), 2);
    assert_eq!(cached.into_inner().calls.load(Ordering::SeqCst), 2);
}

#[test]
fn resolved_symbols_are_listed() {
    let names: HashMap<u32, &str> = [
        (0x7000_0001, "Hello"),
        (0x0A00_0001, "System.Console::WriteLine"),
    ]
    .into_iter()
    .collect();
    let resolver = move |token: Token,
                         kind: OperandKind,
                         _context: &MethodContext|
          -> Result<Symbol, ResolveError> {
        let name = names
            .get(&token.value())
            .ok_or(ResolveError::NotFound(token))?;
        let kind = SymbolKind::expected_for(kind).ok_or(ResolveError::NotFound(token))?;
        Ok(Symbol::new(token, kind, *name))
    };
    let context = MethodContext::new(Token::new(0x0600_0001));

    let listing: Vec<String> = decode_stream(&BODY[..10], Some((&resolver, &context)))
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();

    assert_eq!(
        listing,
        [
            "IL_0000: ldstr 0x70000001 // \"Hello\"",
            "IL_0005: call 0x0A000001 // System.Console::WriteLine",
        ]
    );
}
