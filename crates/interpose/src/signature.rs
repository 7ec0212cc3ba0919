//! Signature registry
//!
//! An interceptor declares the operations it wants to see as [`Signature`]s.
//! [`SignatureMap::build`] resolves those declarations against the surfaces'
//! operation tables once, at wrap time, producing the set of concrete
//! [`OperationSignature`]s a proxy consults on every call.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::error::{InterposeError, InterposeResult};
use crate::interceptor::Interceptor;
use crate::surface::{OperationDescriptor, Surface, SurfaceDescriptor, SurfaceId};

/// Declaration of one intercepted operation: surface, operation name and
/// parameter shape.
///
/// Parameter types are written the way they appear in the trait
/// (`"Vec<u8>"`, `"std::time::Duration"`); whitespace differences do not
/// matter but paths do, so `"Duration"` and `"std::time::Duration"` are
/// distinct shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    surface: SurfaceDescriptor,
    operation: Cow<'static, str>,
    params: Vec<String>,
}

impl Signature {
    /// Declare operation `operation` of surface `S` with the given
    /// parameter types
    ///
    /// ```ignore
    /// Signature::new::<dyn AccountService, _, _>("withdraw", ["Account", "i64"])
    /// ```
    pub fn new<S, I, P>(operation: impl Into<Cow<'static, str>>, params: I) -> Self
    where
        S: Surface + ?Sized,
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        Self::from_descriptor(
            SurfaceDescriptor::of::<S>(),
            operation,
            params
                .into_iter()
                .map(|p| normalize_type_name(p.as_ref()))
                .collect(),
        )
    }

    pub(crate) fn from_descriptor(
        surface: SurfaceDescriptor,
        operation: impl Into<Cow<'static, str>>,
        params: Vec<String>,
    ) -> Self {
        Self {
            surface,
            operation: operation.into(),
            params,
        }
    }

    /// Surface the declaration targets
    pub fn surface(&self) -> SurfaceId {
        self.surface.id()
    }

    /// Declared operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Declared parameter shape (normalized)
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Find the operation this declaration names
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::Resolution`] if no operation on the surface
    /// has both the declared name and the declared parameter shape.
    pub fn resolve(&self) -> InterposeResult<OperationSignature> {
        self.surface
            .operations()
            .iter()
            .enumerate()
            .find(|(_, op)| op.name() == self.operation && shape_matches(op, &self.params))
            .map(|(ordinal, op)| OperationSignature::new(self.surface.id(), ordinal, op))
            .ok_or_else(|| {
                InterposeError::resolution(
                    self.surface.name(),
                    self.operation.as_ref(),
                    self.params.iter().cloned(),
                )
            })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.surface.name(),
            self.operation,
            self.params.join(", ")
        )
    }
}

fn shape_matches(op: &OperationDescriptor, params: &[String]) -> bool {
    op.params().len() == params.len() && op.params().iter().zip(params).all(|(a, b)| *a == b)
}

/// A concrete operation of a surface, identified by its ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationSignature {
    surface: SurfaceId,
    ordinal: usize,
    name: &'static str,
    params: &'static [&'static str],
}

impl OperationSignature {
    fn new(surface: SurfaceId, ordinal: usize, descriptor: &OperationDescriptor) -> Self {
        Self {
            surface,
            ordinal,
            name: descriptor.name(),
            params: descriptor.params(),
        }
    }

    /// All operations of `descriptor`, in ordinal order
    pub(crate) fn all_of(descriptor: &SurfaceDescriptor) -> Vec<Self> {
        descriptor
            .operations()
            .iter()
            .enumerate()
            .map(|(ordinal, op)| Self::new(descriptor.id(), ordinal, op))
            .collect()
    }

    /// Surface declaring the operation
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Position of the operation in its surface
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Operation name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parameter types
    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.surface.name(),
            self.name,
            self.params.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
struct SurfaceEntry {
    descriptor: SurfaceDescriptor,
    ordinals: BTreeSet<usize>,
}

/// Resolved declarations of one interceptor, grouped by surface.
///
/// Duplicate declarations collapse; iteration order is canonical (surfaces
/// by name, operations by ordinal) and independent of declaration order.
#[derive(Debug, Clone, Default)]
pub struct SignatureMap {
    entries: BTreeMap<SurfaceId, SurfaceEntry>,
}

impl SignatureMap {
    /// Resolve every signature the interceptor declares
    ///
    /// # Errors
    ///
    /// - [`InterposeError::NoSignatures`] if the interceptor declares nothing
    /// - [`InterposeError::Resolution`] for the first declaration that does
    ///   not name a real operation
    pub fn build(interceptor: &dyn Interceptor) -> InterposeResult<Self> {
        Self::from_signatures(interceptor.name(), interceptor.signatures())
    }

    /// Resolve an explicit list of declarations on behalf of `interceptor`
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn from_signatures(
        interceptor: &str,
        signatures: impl IntoIterator<Item = Signature>,
    ) -> InterposeResult<Self> {
        let mut map = Self::default();
        let mut declared = 0usize;
        for signature in signatures {
            declared += 1;
            let operation = signature.resolve()?;
            map.entries
                .entry(operation.surface())
                .or_insert_with(|| SurfaceEntry {
                    descriptor: signature.surface,
                    ordinals: BTreeSet::new(),
                })
                .ordinals
                .insert(operation.ordinal());
        }

        if declared == 0 {
            return Err(InterposeError::no_signatures(interceptor));
        }

        debug!(
            interceptor,
            declared,
            operations = map.len(),
            surfaces = map.entries.len(),
            "Resolved interceptor signatures"
        );
        Ok(map)
    }

    /// Surfaces with at least one intercepted operation, in canonical order
    pub fn surfaces(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.entries.keys().copied()
    }

    /// Whether any operation of `surface` is intercepted
    pub fn contains_surface(&self, surface: SurfaceId) -> bool {
        self.entries.contains_key(&surface)
    }

    /// Intercepted operations of `surface`, in ordinal order
    pub fn operations(&self, surface: SurfaceId) -> impl Iterator<Item = OperationSignature> + '_ {
        self.entries.get(&surface).into_iter().flat_map(|entry| {
            entry.ordinals.iter().map(move |&ordinal| {
                OperationSignature::new(
                    entry.descriptor.id(),
                    ordinal,
                    &entry.descriptor.operations()[ordinal],
                )
            })
        })
    }

    /// Whether `operation` is intercepted
    pub fn covers(&self, operation: &OperationSignature) -> bool {
        self.entries
            .get(&operation.surface())
            .is_some_and(|entry| entry.ordinals.contains(&operation.ordinal()))
    }

    pub(crate) fn intercepted_ordinals(&self, surface: SurfaceId) -> Option<&BTreeSet<usize>> {
        self.entries.get(&surface).map(|entry| &entry.ordinals)
    }

    pub(crate) fn descriptor(&self, surface: SurfaceId) -> Option<SurfaceDescriptor> {
        self.entries.get(&surface).map(|entry| entry.descriptor)
    }

    /// Total number of distinct intercepted operations
    pub fn len(&self) -> usize {
        self.entries.values().map(|entry| entry.ordinals.len()).sum()
    }

    /// Whether nothing is intercepted
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drop whitespace except where two identifier characters meet, so that
/// `"Vec < String >"` and `"Vec<String>"` describe the same shape.
///
/// Must agree with the normalization `#[surface]` applies to operation
/// tables.
pub(crate) fn normalize_type_name(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let ident_char = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(chars.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_whitespace() {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if let (Some(prev), Some(&next)) = (out.chars().last(), next)
                && ident_char(prev)
                && ident_char(next)
                && !out.ends_with(' ')
            {
                out.push(' ');
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{Invocation, Outcome};
    use pretty_assertions::assert_eq;

    #[interpose::surface]
    trait Ledger {
        fn post(&self, account: String, amount: i64) -> i64;
        fn balance(&self, account: String) -> i64;
        fn accounts(&self) -> Vec<String>;
    }

    #[interpose::surface]
    trait Audit {
        fn record(&self, line: String);
    }

    #[derive(Debug)]
    struct Declaring(Vec<Signature>);

    impl Interceptor for Declaring {
        fn name(&self) -> &str {
            "declaring"
        }

        fn signatures(&self) -> Vec<Signature> {
            self.0.clone()
        }

        fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
            invocation.proceed()
        }
    }

    /// Same list as the `#[surface]` macro's tests; the two normalizers must
    /// agree on every entry
    const TYPE_NAME_CASES: &[(&str, &str)] = &[
        ("Vec < String >", "Vec<String>"),
        (
            "std :: collections :: HashMap < u8 , Vec < u8 > >",
            "std::collections::HashMap<u8,Vec<u8>>",
        ),
        ("fn (u8) -> u8", "fn(u8)->u8"),
        ("Box < dyn Fn (u8) -> u8 + Send >", "Box<dyn Fn(u8)->u8+Send>"),
        (
            "Box < dyn std :: any :: Any + Send + 'static >",
            "Box<dyn std::any::Any+Send+'static>",
        ),
        ("std :: borrow :: Cow < 'static , str >", "std::borrow::Cow<'static,str>"),
        ("[u8 ; 4]", "[u8;4]"),
        ("( u8 , String )", "(u8,String)"),
    ];

    #[test]
    fn test_normalize_type_name() {
        assert_eq!(normalize_type_name(" Vec < u8 > "), "Vec<u8>");
        assert_eq!(normalize_type_name("Box<dyn   Fn() + Send>"), "Box<dyn Fn()+Send>");
        assert_eq!(normalize_type_name("( u8 , i64 )"), "(u8,i64)");
        for (raw, expected) in TYPE_NAME_CASES {
            assert_eq!(normalize_type_name(raw), *expected, "{raw}");
            assert_eq!(normalize_type_name(expected), *expected, "{expected}");
        }
    }

    #[test]
    fn test_resolves_ordinals() {
        let op = Signature::new::<dyn Ledger, _, _>("balance", ["String"])
            .resolve()
            .unwrap();
        assert_eq!(op.ordinal(), 1);
        assert_eq!(op.name(), "balance");
        assert_eq!(op.surface(), SurfaceId::of::<dyn Ledger>());
        assert_eq!(op.to_string(), "Ledger.balance(String)");

        let op = Signature::new::<dyn Ledger, _, &str>("accounts", [])
            .resolve()
            .unwrap();
        assert_eq!(op.ordinal(), 2);
    }

    #[test]
    fn test_parameter_shape_must_match() {
        let err = Signature::new::<dyn Ledger, _, _>("post", ["String", "i32"])
            .resolve()
            .unwrap_err();
        assert!(err.is_resolution());
        let msg = err.to_string();
        assert!(msg.contains("Ledger"));
        assert!(msg.contains("post"));
        assert!(msg.contains("(String, i32)"));

        assert!(
            Signature::new::<dyn Ledger, _, _>("post", ["String"])
                .resolve()
                .is_err()
        );
        assert!(
            Signature::new::<dyn Ledger, _, _>("missing", ["String"])
                .resolve()
                .is_err()
        );
    }

    #[test]
    fn test_map_groups_and_deduplicates() {
        let interceptor = Declaring(vec![
            Signature::new::<dyn Ledger, _, _>("post", ["String", "i64"]),
            Signature::new::<dyn Audit, _, _>("record", ["String"]),
            Signature::new::<dyn Ledger, _, _>("post", ["String", "i64"]),
            Signature::new::<dyn Ledger, _, &str>("accounts", []),
        ]);
        let map = SignatureMap::build(&interceptor).unwrap();

        assert_eq!(map.len(), 3);
        let surfaces: Vec<_> = map.surfaces().map(|s| s.name()).collect();
        assert_eq!(surfaces, vec!["Audit", "Ledger"]);

        let ledger: Vec<_> = map
            .operations(SurfaceId::of::<dyn Ledger>())
            .map(|op| op.name())
            .collect();
        assert_eq!(ledger, vec!["post", "accounts"]);

        let balance = Signature::new::<dyn Ledger, _, _>("balance", ["String"])
            .resolve()
            .unwrap();
        assert!(!map.covers(&balance));
    }

    #[test]
    fn test_declaration_order_is_irrelevant() {
        let a = Declaring(vec![
            Signature::new::<dyn Audit, _, _>("record", ["String"]),
            Signature::new::<dyn Ledger, _, _>("balance", ["String"]),
        ]);
        let b = Declaring(vec![
            Signature::new::<dyn Ledger, _, _>("balance", ["String"]),
            Signature::new::<dyn Audit, _, _>("record", ["String"]),
        ]);
        let a: Vec<_> = SignatureMap::build(&a).unwrap().surfaces().collect();
        let b: Vec<_> = SignatureMap::build(&b).unwrap().surfaces().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_signatures() {
        let err = SignatureMap::build(&Declaring(Vec::new())).unwrap_err();
        assert!(matches!(err, InterposeError::NoSignatures { .. }));
        assert!(err.to_string().contains("declaring"));
    }

    #[test]
    fn test_one_bad_declaration_fails_the_map() {
        let interceptor = Declaring(vec![
            Signature::new::<dyn Ledger, _, _>("post", ["String", "i64"]),
            Signature::new::<dyn Ledger, _, _>("post", ["i64"]),
        ]);
        assert!(SignatureMap::build(&interceptor).unwrap_err().is_resolution());
    }
}
