//! Invocation context
//!
//! When a proxy routes a call to its interceptor it packs the call into an
//! [`Invocation`]: the resolved operation, the wrapped target, the
//! arguments (type-erased, one slot per parameter) and a continuation that
//! performs the real call. The interceptor answers with an [`Outcome`]
//! holding the operation's return value.

use std::any::{Any, type_name};
use std::fmt;

use crate::signature::OperationSignature;
use crate::surface::SurfaceId;

struct Slot {
    value: Option<Box<dyn Any + Send>>,
    type_name: &'static str,
}

/// Arguments of an intercepted call, in parameter order.
///
/// Each slot keeps its concrete type; interceptors read them with
/// [`get`](Self::get) and may replace values in place with
/// [`get_mut`](Self::get_mut) before proceeding.
#[derive(Default)]
pub struct Arguments {
    slots: Vec<Slot>,
}

impl Arguments {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty argument list for `capacity` parameters
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Append the next argument
    pub fn push<T: Send + 'static>(&mut self, value: T) {
        self.slots.push(Slot {
            value: Some(Box::new(value)),
            type_name: type_name::<T>(),
        });
    }

    /// Builder-style [`push`](Self::push)
    pub fn with<T: Send + 'static>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Borrow argument `index` as `T`
    ///
    /// Returns `None` if the index is out of range or the argument has a
    /// different type.
    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        self.slots
            .get(index)?
            .value
            .as_deref()?
            .downcast_ref::<T>()
    }

    /// Mutably borrow argument `index` as `T`
    pub fn get_mut<T: 'static>(&mut self, index: usize) -> Option<&mut T> {
        self.slots
            .get_mut(index)?
            .value
            .as_deref_mut()?
            .downcast_mut::<T>()
    }

    /// Type name of argument `index`
    pub fn type_name(&self, index: usize) -> Option<&'static str> {
        self.slots.get(index).map(|slot| slot.type_name)
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the operation takes no arguments
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move argument `index` out as `T` (used by generated proxies)
    ///
    /// # Panics
    ///
    /// Panics if the slot is missing, already taken or holds another type.
    /// Generated proxies pack and unpack the same slots, so this only fires
    /// if an interceptor assembled its own argument list with the wrong
    /// types before proceeding.
    #[doc(hidden)]
    pub fn take<T: 'static>(&mut self, index: usize) -> T {
        let slot = self
            .slots
            .get_mut(index)
            .unwrap_or_else(|| panic!("argument {index} is missing"));
        let found = slot.type_name;
        let value = slot
            .value
            .take()
            .unwrap_or_else(|| panic!("argument {index} was already taken"));
        match value.downcast::<T>() {
            Ok(value) => *value,
            Err(_) => panic!(
                "argument {index} has type {found}, expected {}",
                type_name::<T>()
            ),
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| slot.type_name))
            .finish()
    }
}

/// Result of an intercepted call: the operation's return value, boxed.
///
/// For fallible operations the value is the operation's own `Result`, so
/// errors raised by the target reach the caller untouched.
pub struct Outcome {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
}

impl Outcome {
    /// Wrap a return value
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Borrow the value as `T`
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Mutably borrow the value as `T`
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.value.downcast_mut::<T>()
    }

    /// Whether the value is a `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Unwrap the value as `T`, handing the outcome back on a type mismatch
    ///
    /// # Errors
    ///
    /// Returns the untouched outcome if the value is not a `T`.
    pub fn into_inner<T: 'static>(self) -> Result<T, Self> {
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self {
                value,
                type_name: self.type_name,
            }),
        }
    }

    /// Type name of the carried value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// An intercepted call.
///
/// Consumed by [`proceed`](Self::proceed), so the wrapped operation runs at
/// most once per invocation. An interceptor that returns without proceeding
/// short-circuits the call and must produce an [`Outcome`] of the
/// operation's return type itself.
pub struct Invocation<'a> {
    operation: &'a OperationSignature,
    target: &'a (dyn Any + Send + Sync),
    arguments: Arguments,
    forward: &'a dyn Fn(Arguments) -> Outcome,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        operation: &'a OperationSignature,
        target: &'a (dyn Any + Send + Sync),
        arguments: Arguments,
        forward: &'a dyn Fn(Arguments) -> Outcome,
    ) -> Self {
        Self {
            operation,
            target,
            arguments,
            forward,
        }
    }

    /// The operation being invoked
    pub fn operation(&self) -> &OperationSignature {
        self.operation
    }

    /// Surface declaring the operation
    pub fn surface(&self) -> SurfaceId {
        self.operation.surface()
    }

    /// The wrapped object, viewed through surface `S`
    ///
    /// ```ignore
    /// if let Some(service) = invocation.target::<dyn OrderService>() {
    ///     // call other operations on the unwrapped target
    /// }
    /// ```
    ///
    /// Returns `None` if `S` is not the surface being invoked.
    pub fn target<S: ?Sized + 'static>(&self) -> Option<&S> {
        self.target
            .downcast_ref::<std::sync::Arc<S>>()
            .map(|target| &**target)
    }

    /// Call arguments
    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Call arguments, for in-place modification before proceeding
    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    /// Run the wrapped operation (or the next interceptor in the chain)
    /// with the current arguments
    pub fn proceed(self) -> Outcome {
        (self.forward)(self.arguments)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("operation", &self.operation.to_string())
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arguments_access() {
        let mut args = Arguments::new().with(String::from("acct-1")).with(250i64);

        assert_eq!(args.len(), 2);
        assert_eq!(args.get::<String>(0).map(String::as_str), Some("acct-1"));
        assert_eq!(args.get::<i64>(1), Some(&250));
        assert_eq!(args.get::<i32>(1), None);
        assert_eq!(args.get::<i64>(2), None);
        assert_eq!(args.type_name(1), Some("i64"));

        *args.get_mut::<i64>(1).unwrap() = 300;
        assert_eq!(args.take::<i64>(1), 300);
        assert_eq!(args.get::<i64>(1), None);
        assert_eq!(format!("{args:?}"), r#"["alloc::string::String", "i64"]"#);
    }

    #[test]
    #[should_panic(expected = "expected i32")]
    fn test_take_wrong_type_panics() {
        let mut args = Arguments::new().with(1i64);
        let _ = args.take::<i32>(0);
    }

    #[test]
    #[should_panic(expected = "already taken")]
    fn test_take_twice_panics() {
        let mut args = Arguments::new().with(1i64);
        let _ = args.take::<i64>(0);
        let _ = args.take::<i64>(0);
    }

    #[test]
    fn test_outcome_carries_result_verbatim() {
        let outcome = Outcome::new::<Result<u32, String>>(Err("declined".into()));
        assert!(outcome.is::<Result<u32, String>>());
        assert_eq!(
            outcome.downcast_ref::<Result<u32, String>>(),
            Some(&Err("declined".to_string()))
        );

        let outcome = outcome.into_inner::<u32>().unwrap_err();
        assert!(outcome.type_name().contains("Result"));
        assert_eq!(
            outcome.into_inner::<Result<u32, String>>().unwrap(),
            Err("declined".to_string())
        );
    }
}
