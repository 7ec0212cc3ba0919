//! Capability discovery
//!
//! A component records which surfaces it presents at each level of its type
//! lineage (the concrete type first, then the types it builds on). Discovery
//! walks the whole lineage and keeps the surfaces an interceptor declared
//! signatures for.

use std::collections::BTreeSet;

use crate::signature::SignatureMap;
use crate::surface::{SurfaceDescriptor, SurfaceId};

/// Surfaces declared by one type in a lineage
#[derive(Debug, Clone)]
pub struct Level {
    type_name: &'static str,
    surfaces: Vec<SurfaceDescriptor>,
}

impl Level {
    pub(crate) fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            surfaces: Vec::new(),
        }
    }

    pub(crate) fn declare(&mut self, surface: SurfaceDescriptor) {
        if !self.surfaces.contains(&surface) {
            self.surfaces.push(surface);
        }
    }

    /// Name of the type at this level
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Surfaces declared at this level, in declaration order
    pub fn surfaces(&self) -> &[SurfaceDescriptor] {
        &self.surfaces
    }
}

/// Type lineage of a component, most derived level first
#[derive(Debug, Clone)]
pub struct Lineage {
    levels: Vec<Level>,
}

impl Lineage {
    pub(crate) fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// Name of the concrete type
    pub fn type_name(&self) -> &'static str {
        self.levels.first().map_or("<unknown>", Level::type_name)
    }

    /// All levels, most derived first
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Every surface declared anywhere in the lineage, deduplicated
    pub fn surfaces(&self) -> BTreeSet<SurfaceId> {
        self.levels
            .iter()
            .flat_map(|level| level.surfaces.iter().map(SurfaceDescriptor::id))
            .collect()
    }
}

/// Surfaces of `lineage` that `map` intercepts.
///
/// Ancestor levels count the same as the concrete type, duplicates collapse,
/// and the result is in canonical surface order. An empty set means the
/// interceptor has nothing to do with the component.
pub fn discover(lineage: &Lineage, map: &SignatureMap) -> BTreeSet<SurfaceId> {
    lineage
        .surfaces()
        .into_iter()
        .filter(|surface| map.contains_surface(*surface))
        .collect()
}
