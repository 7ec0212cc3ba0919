//! Proxy builder
//!
//! [`Plugin::wrap`] puts an interceptor in front of a component. Surfaces
//! the interceptor declared signatures for are replaced by their generated
//! proxy; everything else is carried over as is. Each proxy holds a
//! [`Dispatch`]: the interceptor plus a table, indexed by operation
//! ordinal, of which calls route into it.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::component::Component;
use crate::error::InterposeResult;
use crate::interceptor::Interceptor;
use crate::invocation::{Arguments, Invocation, Outcome};
use crate::lineage::discover;
use crate::signature::{OperationSignature, SignatureMap};
use crate::surface::{Surface, SurfaceDescriptor, SurfaceId};

/// Which operations of one surface route into the interceptor
#[derive(Debug)]
pub(crate) struct DispatchTable {
    operations: Box<[OperationSignature]>,
    intercepted: Box<[bool]>,
}

impl DispatchTable {
    fn new(descriptor: &SurfaceDescriptor, map: &SignatureMap) -> Self {
        let operations: Box<[OperationSignature]> =
            OperationSignature::all_of(descriptor).into_boxed_slice();
        let ordinals = map.intercepted_ordinals(descriptor.id());
        let intercepted = operations
            .iter()
            .map(|op| ordinals.is_some_and(|set| set.contains(&op.ordinal())))
            .collect();
        Self {
            operations,
            intercepted,
        }
    }
}

/// Per-proxy routing state: one interceptor and the dispatch table of the
/// proxied surface
#[derive(Clone)]
pub struct Dispatch {
    interceptor: Arc<dyn Interceptor>,
    table: Arc<DispatchTable>,
}

impl Dispatch {
    fn new(interceptor: Arc<dyn Interceptor>, table: Arc<DispatchTable>) -> Self {
        Self { interceptor, table }
    }

    /// Interceptor the proxy routes into
    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }

    /// Whether operation `ordinal` routes into the interceptor
    #[doc(hidden)]
    #[inline]
    pub fn intercepts(&self, ordinal: usize) -> bool {
        self.table.intercepted.get(ordinal).copied().unwrap_or(false)
    }

    /// Route one call through the interceptor (used by generated proxies)
    ///
    /// # Panics
    ///
    /// Panics if `ordinal` is not an operation of the surface, or if the
    /// interceptor returns an [`Outcome`] that does not hold an `R`. The
    /// message names the interceptor, the operation and both types.
    #[doc(hidden)]
    pub fn invoke<S, R, F>(
        &self,
        ordinal: usize,
        target: &Arc<S>,
        arguments: Arguments,
        forward: F,
    ) -> R
    where
        S: ?Sized + Send + Sync + 'static,
        R: 'static,
        F: Fn(Arguments) -> Outcome,
    {
        let operation = &self.table.operations[ordinal];
        let invocation = Invocation::new(operation, target, arguments, &forward);
        match self.interceptor.intercept(invocation).into_inner::<R>() {
            Ok(value) => value,
            Err(outcome) => panic!(
                "interceptor '{}' returned {} from {}, expected {}",
                self.interceptor.name(),
                outcome.type_name(),
                operation,
                type_name::<R>()
            ),
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("interceptor", &self.interceptor.name())
            .field("table", &self.table)
            .finish()
    }
}

/// Proxy builder entry points
#[derive(Debug, Clone, Copy, Default)]
pub struct Plugin;

impl Plugin {
    /// Wrap `target` so calls to the operations `interceptor` declares are
    /// routed through it.
    ///
    /// When none of the target's surfaces are intercepted the same `Arc`
    /// is returned. Otherwise the result presents every surface the target
    /// presents; only the discovered ones are proxied.
    ///
    /// # Errors
    ///
    /// Fails if the interceptor's signatures cannot be resolved (see
    /// [`SignatureMap::build`]).
    pub fn wrap(
        target: Arc<Component>,
        interceptor: Arc<dyn Interceptor>,
    ) -> InterposeResult<Arc<Component>> {
        let map = SignatureMap::build(interceptor.as_ref())?;
        let surfaces = discover(target.lineage(), &map);
        if surfaces.is_empty() {
            debug!(
                interceptor = interceptor.name(),
                target = target.type_name(),
                "No intercepted surfaces; target left unwrapped"
            );
            return Ok(target);
        }

        let mut views = HashMap::with_capacity(target.views().len());
        for (id, view) in target.views() {
            let view = match map.descriptor(*id) {
                Some(descriptor) if surfaces.contains(id) => {
                    let table = Arc::new(DispatchTable::new(&descriptor, &map));
                    view.intercept(Dispatch::new(Arc::clone(&interceptor), table))
                }
                _ => Arc::clone(view),
            };
            views.insert(*id, view);
        }

        debug!(
            interceptor = interceptor.name(),
            target = target.type_name(),
            surfaces = ?surfaces.iter().map(SurfaceId::name).collect::<Vec<_>>(),
            "Built proxy"
        );
        Ok(Arc::new(Component::from_parts(
            Arc::clone(target.lineage()),
            views,
        )))
    }

    /// Wrap a single surface object.
    ///
    /// Returns the same `Arc` when the interceptor declares nothing on `S`.
    ///
    /// # Errors
    ///
    /// Fails if the interceptor's signatures cannot be resolved.
    pub fn wrap_surface<S: Surface + ?Sized>(
        target: Arc<S>,
        interceptor: Arc<dyn Interceptor>,
    ) -> InterposeResult<Arc<S>> {
        let map = SignatureMap::build(interceptor.as_ref())?;
        let Some(descriptor) = map.descriptor(SurfaceId::of::<S>()) else {
            debug!(
                interceptor = interceptor.name(),
                surface = S::NAME,
                "Surface not intercepted; target left unwrapped"
            );
            return Ok(target);
        };

        let table = Arc::new(DispatchTable::new(&descriptor, &map));
        debug!(
            interceptor = interceptor.name(),
            surface = S::NAME,
            operations = map.operations(descriptor.id()).count(),
            "Built proxy"
        );
        Ok(S::intercept_with(target, Dispatch::new(interceptor, table)))
    }
}
