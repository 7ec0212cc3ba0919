//! Capability surfaces
//!
//! A surface is a trait annotated with [`#[surface]`](crate::surface). The
//! attribute implements [`Surface`] for `dyn Trait`, which gives the runtime
//! three things: a name, the table of operations in declaration order, and
//! a constructor for the generated forwarding proxy.

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{InterposeError, InterposeResult};
use crate::plugin::Dispatch;
use crate::signature::{Signature, normalize_type_name};

/// A capability surface, implemented by `#[surface]` for `dyn Trait`.
///
/// Not meant to be implemented by hand: the operation table and the proxy
/// produced by [`intercept_with`](Surface::intercept_with) must agree on
/// operation ordinals.
pub trait Surface: Send + Sync + 'static {
    /// Surface name used for diagnostics and textual signatures
    const NAME: &'static str;

    /// Operations in declaration order; the index is the operation ordinal
    const OPERATIONS: &'static [OperationDescriptor];

    /// Build the generated proxy around `target`
    #[doc(hidden)]
    fn intercept_with(target: Arc<Self>, dispatch: Dispatch) -> Arc<Self>;
}

/// Identity of a capability surface.
///
/// Equality and hashing use the `TypeId` of `dyn Trait`; the name is
/// carried for display and ordering.
#[derive(Clone, Copy)]
pub struct SurfaceId {
    type_id: TypeId,
    name: &'static str,
}

impl SurfaceId {
    /// Identity of surface `S`
    pub fn of<S: Surface + ?Sized>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: S::NAME,
        }
    }

    /// Declared surface name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for SurfaceId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for SurfaceId {}

impl Hash for SurfaceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for SurfaceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Canonical order by name; ties (two surfaces declared with the same name)
// fall back to type identity so the order stays total
impl Ord for SurfaceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id.cmp(&other.type_id))
    }
}

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.name)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One operation of a surface: name and parameter shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationDescriptor {
    name: &'static str,
    params: &'static [&'static str],
}

impl OperationDescriptor {
    /// Create a descriptor (used by generated code)
    pub const fn new(name: &'static str, params: &'static [&'static str]) -> Self {
        Self { name, params }
    }

    /// Operation name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Parameter type descriptors, normalized
    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// Runtime view of a surface: identity plus operation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceDescriptor {
    id: SurfaceId,
    operations: &'static [OperationDescriptor],
}

impl SurfaceDescriptor {
    /// Descriptor of surface `S`
    pub fn of<S: Surface + ?Sized>() -> Self {
        Self {
            id: SurfaceId::of::<S>(),
            operations: S::OPERATIONS,
        }
    }

    /// Surface identity
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Surface name
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Operations in ordinal order
    pub fn operations(&self) -> &'static [OperationDescriptor] {
        self.operations
    }
}

/// Name-indexed set of known surfaces.
///
/// Textual signatures (`"OrderService.charge(Order)"`, as found in
/// configuration files) only carry a surface *name*; the catalog turns that
/// name back into a typed [`SurfaceDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct SurfaceCatalog {
    surfaces: BTreeMap<&'static str, SurfaceDescriptor>,
}

impl SurfaceCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register surface `S` under its declared name
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a *different* surface is already
    /// registered under the same name. Registering the same surface twice is
    /// a no-op.
    pub fn register<S: Surface + ?Sized>(&mut self) -> InterposeResult<&mut Self> {
        let descriptor = SurfaceDescriptor::of::<S>();
        match self.surfaces.get(S::NAME) {
            Some(existing) if existing.id() != descriptor.id() => {
                return Err(InterposeError::configuration(format!(
                    "surface name '{}' is already registered by another trait",
                    S::NAME
                )));
            }
            Some(_) => {}
            None => {
                self.surfaces.insert(S::NAME, descriptor);
            }
        }
        Ok(self)
    }

    /// Builder-style [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn with<S: Surface + ?Sized>(mut self) -> InterposeResult<Self> {
        self.register::<S>()?;
        Ok(self)
    }

    /// Look up a surface by name
    pub fn get(&self, name: &str) -> Option<&SurfaceDescriptor> {
        self.surfaces.get(name)
    }

    /// Registered surface names in canonical order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.surfaces.keys().copied()
    }

    /// Number of registered surfaces
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Parse and resolve a textual signature of the form
    /// `Surface.operation(Type1, Type2)`.
    ///
    /// Only the surface name is checked here; operation and parameter shape
    /// are checked when the signature map is built, like any other
    /// declaration.
    ///
    /// # Errors
    ///
    /// - [`InterposeError::InvalidSignature`] when the text is malformed
    /// - [`InterposeError::UnknownSurface`] when the surface is not registered
    pub fn resolve(&self, text: &str) -> InterposeResult<Signature> {
        let parsed = ParsedSignature::parse(text)?;
        let surface = self
            .get(parsed.surface)
            .ok_or_else(|| InterposeError::unknown_surface(parsed.surface))?;
        Ok(Signature::from_descriptor(
            *surface,
            parsed.operation.to_string(),
            parsed.params,
        ))
    }
}

/// `Surface.operation(T1, T2)` split into its parts
#[derive(Debug, PartialEq, Eq)]
struct ParsedSignature<'a> {
    surface: &'a str,
    operation: &'a str,
    params: Vec<String>,
}

impl<'a> ParsedSignature<'a> {
    fn parse(text: &'a str) -> InterposeResult<Self> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| InterposeError::invalid_signature(text, "missing parameter list"))?;
        if !text.ends_with(')') {
            return Err(InterposeError::invalid_signature(
                text,
                "parameter list is not closed",
            ));
        }

        let head = &text[..open];
        let (surface, operation) = head.rsplit_once('.').ok_or_else(|| {
            InterposeError::invalid_signature(text, "expected 'Surface.operation(...)'")
        })?;
        let (surface, operation) = (surface.trim(), operation.trim());
        if surface.is_empty() || operation.is_empty() {
            return Err(InterposeError::invalid_signature(
                text,
                "surface and operation names must not be empty",
            ));
        }

        let params = split_params(&text[open + 1..text.len() - 1])
            .map_err(|reason| InterposeError::invalid_signature(text, reason))?;

        Ok(Self {
            surface,
            operation,
            params,
        })
    }
}

/// Split a parameter list on top-level commas (commas inside `<>`, `()` or
/// `[]` belong to the parameter type). The `>` of a `->` return arrow is not
/// a bracket.
fn split_params(list: &str) -> Result<Vec<String>, &'static str> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut prev = None;
    for (i, c) in list.char_indices() {
        match c {
            '>' if prev == Some('-') => {}
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced brackets")?;
            }
            ',' if depth == 0 => {
                params.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        prev = Some(c);
    }
    if depth != 0 {
        return Err("unbalanced brackets");
    }
    params.push(&list[start..]);

    params
        .into_iter()
        .map(|p| {
            let p = normalize_type_name(p);
            if p.is_empty() {
                Err("empty parameter type")
            } else {
                Ok(p)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[interpose::surface(name = "accounts")]
    trait AccountService {
        fn withdraw(&self, account: String, amount: i64) -> Result<i64, String>;
    }

    mod other {
        #[interpose::surface(name = "accounts")]
        pub trait Impostor {
            fn withdraw(&self, amount: i64);
        }
    }

    #[interpose::surface]
    trait Hooks {
        fn apply(&self, f: fn(u8) -> u8, x: u8) -> u8;
        fn compose(&self, f: Box<dyn Fn(u8) -> u8 + Send>, g: Box<dyn Fn(u8) -> u8 + Send>) -> u8;
    }

    #[test]
    fn test_surface_identity() {
        let id = SurfaceId::of::<dyn AccountService>();
        assert_eq!(id.name(), "accounts");
        assert_eq!(id, SurfaceId::of::<dyn AccountService>());
        assert_ne!(id, SurfaceId::of::<dyn other::Impostor>());

        let descriptor = SurfaceDescriptor::of::<dyn AccountService>();
        assert_eq!(descriptor.operations().len(), 1);
        assert_eq!(
            descriptor.operations()[0].to_string(),
            "withdraw(String, i64)"
        );
    }

    #[test]
    fn test_catalog() {
        let mut catalog = SurfaceCatalog::new();
        catalog.register::<dyn AccountService>().unwrap();
        catalog.register::<dyn AccountService>().unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["accounts"]);

        let err = catalog.register::<dyn other::Impostor>().unwrap_err();
        assert!(err.is_configuration());

        let signature = catalog.resolve("accounts.withdraw(String, i64)").unwrap();
        assert_eq!(signature.surface(), SurfaceId::of::<dyn AccountService>());
        assert_eq!(signature.resolve().unwrap().ordinal(), 0);

        let err = catalog.resolve("ledger.post(i64)").unwrap_err();
        assert!(matches!(err, InterposeError::UnknownSurface { ref name } if name == "ledger"));
    }

    #[test]
    fn test_parse_signature() {
        let parsed = ParsedSignature::parse("OrderService.charge(Order)").unwrap();
        assert_eq!(
            parsed,
            ParsedSignature {
                surface: "OrderService",
                operation: "charge",
                params: vec!["Order".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_nested_generics() {
        let parsed =
            ParsedSignature::parse(" Store.put( HashMap<String, Vec<u8>>, Option<(u8, u8)> ) ")
                .unwrap();
        assert_eq!(parsed.surface, "Store");
        assert_eq!(parsed.operation, "put");
        assert_eq!(
            parsed.params,
            vec![
                "HashMap<String,Vec<u8>>".to_string(),
                "Option<(u8,u8)>".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_return_arrows() {
        let parsed =
            ParsedSignature::parse("Hooks.apply(fn(u8) -> u8, Box<dyn Fn(u8) -> u8 + Send>, u8)")
                .unwrap();
        assert_eq!(
            parsed.params,
            vec![
                "fn(u8)->u8".to_string(),
                "Box<dyn Fn(u8)->u8+Send>".to_string(),
                "u8".to_string()
            ]
        );
    }

    #[test]
    fn test_resolve_function_parameters() {
        let catalog = SurfaceCatalog::new().with::<dyn Hooks>().unwrap();

        let text = catalog.resolve("Hooks.apply(fn(u8) -> u8, u8)").unwrap();
        let typed = Signature::new::<dyn Hooks, _, _>("apply", ["fn(u8) -> u8", "u8"]);
        assert_eq!(text.resolve().unwrap(), typed.resolve().unwrap());

        let compose = catalog
            .resolve("Hooks.compose(Box<dyn Fn(u8) -> u8 + Send>, Box<dyn Fn(u8) -> u8 + Send>)")
            .unwrap()
            .resolve()
            .unwrap();
        assert_eq!(compose.ordinal(), 1);
    }

    #[test]
    fn test_parse_no_params() {
        let parsed = ParsedSignature::parse("Clock.now()").unwrap();
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in [
            "OrderService.charge",
            "OrderService.charge(Order",
            "charge(Order)",
            ".charge(Order)",
            "OrderService.(Order)",
            "OrderService.charge(Order,)",
            "OrderService.charge(Vec<u8)",
        ] {
            let err = ParsedSignature::parse(text).unwrap_err();
            assert!(
                matches!(err, InterposeError::InvalidSignature { .. }),
                "{text}: {err}"
            );
        }
    }
}
