//! Chain composition
//!
//! An [`InterceptorChain`] applies its interceptors to a target in
//! registration order, each one wrapping the result of the previous. The
//! last interceptor registered is therefore the outermost proxy and sees a
//! call first.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::component::Component;
use crate::error::{InterposeError, InterposeResult};
use crate::interceptor::Interceptor;
use crate::surface::Surface;

/// Ordered list of interceptors
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor after all existing ones
    pub fn add(&mut self, interceptor: impl Interceptor) -> &mut Self {
        self.add_shared(Arc::new(interceptor))
    }

    /// Register an already shared interceptor (for example one whose state
    /// the caller keeps reading, like a metrics collector)
    pub fn add_shared(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        info!(
            interceptor = interceptor.name(),
            position = self.interceptors.len(),
            "Registered interceptor"
        );
        self.interceptors.push(interceptor);
        self
    }

    /// Builder-style [`add`](Self::add)
    pub fn with(mut self, interceptor: impl Interceptor) -> Self {
        self.add(interceptor);
        self
    }

    /// Interceptors in registration order
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    /// Interceptor names in registration order
    pub fn names(&self) -> Vec<String> {
        self.interceptors
            .iter()
            .map(|interceptor| interceptor.name().to_string())
            .collect()
    }

    /// Number of interceptors
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Apply every interceptor's [`plugin`](Interceptor::plugin) hook in
    /// registration order.
    ///
    /// An empty chain, or one where no interceptor applies, returns the
    /// same `Arc`.
    ///
    /// # Errors
    ///
    /// Stops at the first interceptor that fails to wrap the target.
    pub fn plugin_all(&self, target: Arc<Component>) -> InterposeResult<Arc<Component>> {
        let mut current = target;
        for interceptor in &self.interceptors {
            current = Arc::clone(interceptor)
                .plugin(current)
                .inspect_err(|e| {
                    error!(interceptor = interceptor.name(), "Failed to wrap target: {}", e);
                })?;
        }
        debug!(
            interceptors = self.interceptors.len(),
            "Applied interceptor chain"
        );
        Ok(current)
    }

    /// Apply the chain to a single surface object.
    ///
    /// # Errors
    ///
    /// Fails like [`plugin_all`](Self::plugin_all), or if an interceptor's
    /// `plugin` hook returned a component that no longer presents `S`.
    pub fn plugin_surface<S: Surface + ?Sized>(&self, target: Arc<S>) -> InterposeResult<Arc<S>> {
        self.plugin_all(Component::from_surface::<S>(target))?
            .surface::<S>()
            .ok_or_else(|| {
                InterposeError::configuration(format!(
                    "interceptor chain dropped surface '{}'",
                    S::NAME
                ))
            })
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("interceptors", &self.names())
            .finish()
    }
}
