//! Components: objects presented through one or more surfaces
//!
//! Rust has no runtime reflection over which traits a value implements, so
//! a [`Component`] states it explicitly: a lineage describing which type
//! declares which surface, plus one shared view per surface.
//!
//! ```ignore
//! let orders = Arc::new(OrderServiceImpl::default());
//! let component = Component::builder("OrderServiceImpl")
//!     .expose::<dyn OrderService>(orders.clone())
//!     .extends("AuditedService")
//!     .expose::<dyn Auditable>(orders)
//!     .build();
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::lineage::{Level, Lineage};
use crate::plugin::Dispatch;
use crate::surface::{Surface, SurfaceDescriptor, SurfaceId};

/// A surface view with its concrete trait object type erased
pub(crate) trait ErasedView: Send + Sync {
    /// The view as `Arc<S>`
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Wrap the view in its surface's proxy
    fn intercept(&self, dispatch: Dispatch) -> Arc<dyn ErasedView>;
}

struct View<S: Surface + ?Sized>(Arc<S>);

impl<S: Surface + ?Sized> ErasedView for View<S> {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &self.0
    }

    fn intercept(&self, dispatch: Dispatch) -> Arc<dyn ErasedView> {
        Arc::new(View(S::intercept_with(Arc::clone(&self.0), dispatch)))
    }
}

/// An object together with the surfaces it presents
#[derive(Clone)]
pub struct Component {
    lineage: Arc<Lineage>,
    views: HashMap<SurfaceId, Arc<dyn ErasedView>>,
}

impl Component {
    /// Start describing a component whose concrete type is `type_name`
    pub fn builder(type_name: &'static str) -> ComponentBuilder {
        ComponentBuilder::new(type_name)
    }

    /// Component presenting a single surface
    pub fn from_surface<S: Surface + ?Sized>(target: Arc<S>) -> Arc<Self> {
        Self::builder(S::NAME).expose::<S>(target).build()
    }

    pub(crate) fn from_parts(
        lineage: Arc<Lineage>,
        views: HashMap<SurfaceId, Arc<dyn ErasedView>>,
    ) -> Self {
        Self { lineage, views }
    }

    pub(crate) fn views(&self) -> &HashMap<SurfaceId, Arc<dyn ErasedView>> {
        &self.views
    }

    /// Type lineage
    pub fn lineage(&self) -> &Arc<Lineage> {
        &self.lineage
    }

    /// Name of the concrete type
    pub fn type_name(&self) -> &'static str {
        self.lineage.type_name()
    }

    /// The component viewed through surface `S`, if it presents it
    pub fn surface<S: Surface + ?Sized>(&self) -> Option<Arc<S>> {
        self.views
            .get(&SurfaceId::of::<S>())?
            .as_any()
            .downcast_ref::<Arc<S>>()
            .cloned()
    }

    /// Whether the component presents surface `S`
    pub fn presents<S: Surface + ?Sized>(&self) -> bool {
        self.views.contains_key(&SurfaceId::of::<S>())
    }

    /// Presented surfaces in canonical order
    pub fn surfaces(&self) -> Vec<SurfaceId> {
        let mut surfaces: Vec<_> = self.views.keys().copied().collect();
        surfaces.sort();
        surfaces
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("type_name", &self.type_name())
            .field("surfaces", &self.surfaces())
            .finish()
    }
}

/// Builder for [`Component`]
pub struct ComponentBuilder {
    levels: Vec<Level>,
    views: HashMap<SurfaceId, Arc<dyn ErasedView>>,
}

impl ComponentBuilder {
    fn new(type_name: &'static str) -> Self {
        Self {
            levels: vec![Level::new(type_name)],
            views: HashMap::new(),
        }
    }

    /// Present `view` as surface `S`, declared at the current level
    ///
    /// If a more derived level already exposed `S`, that view is kept and
    /// this one is ignored.
    pub fn expose<S: Surface + ?Sized>(mut self, view: Arc<S>) -> Self {
        let id = SurfaceId::of::<S>();
        if let Some(level) = self.levels.last_mut() {
            level.declare(SurfaceDescriptor::of::<S>());
        }
        if self.views.contains_key(&id) {
            warn!(
                surface = S::NAME,
                "Surface exposed more than once; keeping the most derived view"
            );
        } else {
            self.views.insert(id, Arc::new(View(view)));
        }
        self
    }

    /// Start the next ancestor level; subsequent surfaces are declared by
    /// `type_name`
    pub fn extends(mut self, type_name: &'static str) -> Self {
        self.levels.push(Level::new(type_name));
        self
    }

    /// Finish the component
    pub fn build(self) -> Arc<Component> {
        Arc::new(Component {
            lineage: Arc::new(Lineage::new(self.levels)),
            views: self.views,
        })
    }
}
