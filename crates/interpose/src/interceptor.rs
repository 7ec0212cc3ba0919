//! Interceptor contract

use std::fmt::Debug;
use std::sync::Arc;

use crate::component::Component;
use crate::error::{InterposeError, InterposeResult};
use crate::invocation::{Invocation, Outcome};
use crate::plugin::Plugin;
use crate::properties::Properties;
use crate::signature::Signature;

/// Conversion of a concrete interceptor into a trait object.
///
/// Implemented for every sized [`Interceptor`]; it lets the default
/// [`Interceptor::plugin`] hand `self` to [`Plugin::wrap`].
pub trait IntoInterceptorObject {
    /// Erase the concrete type
    fn into_interceptor_object(self: Arc<Self>) -> Arc<dyn Interceptor>;
}

impl<T: Interceptor> IntoInterceptorObject for T {
    fn into_interceptor_object(self: Arc<Self>) -> Arc<dyn Interceptor> {
        self
    }
}

/// Cross-cutting behavior applied to selected operations of a target.
///
/// An interceptor declares the operations it observes through
/// [`signatures`](Self::signatures). Once a target is wrapped, every call to
/// one of those operations reaches [`intercept`](Self::intercept); other
/// calls go straight to the target.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Default)]
/// struct Audit {
///     lines: Mutex<Vec<String>>,
/// }
///
/// impl Interceptor for Audit {
///     fn signatures(&self) -> Vec<Signature> {
///         vec![Signature::new::<dyn OrderService, _, _>("charge", ["Order"])]
///     }
///
///     fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
///         self.lines.lock().unwrap().push(invocation.operation().to_string());
///         invocation.proceed()
///     }
/// }
/// ```
pub trait Interceptor: IntoInterceptorObject + Send + Sync + Debug + 'static {
    /// Name used in logs and error messages
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Operations this interceptor observes
    fn signatures(&self) -> Vec<Signature>;

    /// Handle an intercepted call.
    ///
    /// Either call [`Invocation::proceed`] (possibly after modifying the
    /// arguments, possibly transforming the result) or return a substitute
    /// [`Outcome`] holding a value of the operation's return type.
    fn intercept(&self, invocation: Invocation<'_>) -> Outcome;

    /// Wrap `target` with this interceptor.
    ///
    /// The default is [`Plugin::wrap`]; returning `Ok(target)` opts out.
    ///
    /// # Errors
    ///
    /// Fails if this interceptor's signatures cannot be resolved.
    fn plugin(self: Arc<Self>, target: Arc<Component>) -> InterposeResult<Arc<Component>> {
        Plugin::wrap(target, self.into_interceptor_object())
    }

    /// Apply configuration properties before the interceptor is used.
    ///
    /// The default accepts and ignores everything.
    ///
    /// # Errors
    ///
    /// Implementations return [`InvalidProperty`](crate::InterposeError::InvalidProperty)
    /// for values they cannot accept.
    fn set_properties(&mut self, properties: &Properties) -> InterposeResult<()> {
        let _ = properties;
        Ok(())
    }

    /// Replace the declared signatures with ones taken from configuration.
    ///
    /// [`ChainConfig::build_chain`](crate::ChainConfig::build_chain) calls
    /// this after `set_properties` for entries with an `intercepts` list.
    /// The interceptor's own [`plugin`](Self::plugin) hook still decides
    /// whether a target gets wrapped. The default rejects the override.
    ///
    /// # Errors
    ///
    /// The default returns a configuration error naming the interceptor.
    fn set_signatures(&mut self, signatures: Vec<Signature>) -> InterposeResult<()> {
        let _ = signatures;
        Err(InterposeError::configuration(format!(
            "Interceptor '{}' does not accept configured signatures",
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[interpose::surface]
    trait Clock {
        fn now(&self) -> u64;
    }

    struct Frozen(u64);

    impl Clock for Frozen {
        fn now(&self) -> u64 {
            self.0
        }
    }

    #[derive(Debug)]
    struct Skew(u64);

    impl Interceptor for Skew {
        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new::<dyn Clock, _, &str>("now", [])]
        }

        fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
            let now = invocation
                .proceed()
                .into_inner::<u64>()
                .expect("now returns u64");
            Outcome::new(now + self.0)
        }
    }

    #[derive(Debug)]
    struct OptOut;

    impl Interceptor for OptOut {
        fn name(&self) -> &str {
            "opt-out"
        }

        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new::<dyn Clock, _, &str>("now", [])]
        }

        fn intercept(&self, _invocation: Invocation<'_>) -> Outcome {
            Outcome::new(0u64)
        }

        fn plugin(self: Arc<Self>, target: Arc<Component>) -> InterposeResult<Arc<Component>> {
            Ok(target)
        }
    }

    #[derive(Debug, Default)]
    struct Configurable {
        seen: Mutex<Option<String>>,
    }

    impl Interceptor for Configurable {
        fn signatures(&self) -> Vec<Signature> {
            Vec::new()
        }

        fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
            invocation.proceed()
        }

        fn set_properties(&mut self, properties: &Properties) -> InterposeResult<()> {
            *self.seen.get_mut().unwrap() = properties.get_str("mode").map(str::to_string);
            Ok(())
        }
    }

    #[test]
    fn test_default_name_is_type_name() {
        assert!(Skew(1).name().ends_with("Skew"));
        assert_eq!(OptOut.name(), "opt-out");
    }

    #[test]
    fn test_default_plugin_wraps() {
        let component = Component::from_surface::<dyn Clock>(Arc::new(Frozen(100)));
        let wrapped = Arc::new(Skew(5)).plugin(component).unwrap();
        assert_eq!(wrapped.surface::<dyn Clock>().unwrap().now(), 105);
    }

    #[test]
    fn test_plugin_through_trait_object() {
        let interceptor: Arc<dyn Interceptor> = Arc::new(Skew(1));
        let component = Component::from_surface::<dyn Clock>(Arc::new(Frozen(1)));
        let wrapped = interceptor.plugin(component).unwrap();
        assert_eq!(wrapped.surface::<dyn Clock>().unwrap().now(), 2);
    }

    #[test]
    fn test_plugin_opt_out() {
        let component = Component::from_surface::<dyn Clock>(Arc::new(Frozen(7)));
        let same = Arc::new(OptOut).plugin(component.clone()).unwrap();
        assert!(Arc::ptr_eq(&component, &same));
    }

    #[test]
    fn test_set_properties() {
        let mut interceptor = Configurable::default();
        let properties = Properties::new().with("mode", "strict");
        interceptor.set_properties(&properties).unwrap();
        assert_eq!(interceptor.seen.lock().unwrap().as_deref(), Some("strict"));

        let mut skew = Skew(0);
        assert!(skew.set_properties(&properties).is_ok());
    }

    #[test]
    fn test_set_signatures_rejected_by_default() {
        let mut skew = Skew(0);
        let err = skew
            .set_signatures(vec![Signature::new::<dyn Clock, _, &str>("now", [])])
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Skew"));
    }
}
