//! # interpose
//!
//! Interceptor chains over typed capability surfaces.
//!
//! Independently written interceptors declare which operations they want to
//! observe; the crate builds transparent stand-ins for target components
//! that route exactly those calls through the interceptor and forward
//! everything else untouched. Interceptors compose into chains, and a
//! caller cannot tell a wrapped component from the raw one.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use interpose::prelude::*;
//!
//! #[surface]
//! pub trait OrderService {
//!     fn charge(&self, order: Order) -> Result<Receipt, PaymentError>;
//!     fn status(&self, order_id: u64) -> OrderStatus;
//! }
//!
//! #[derive(Debug)]
//! struct Audit;
//!
//! impl Interceptor for Audit {
//!     fn signatures(&self) -> Vec<Signature> {
//!         vec![Signature::new::<dyn OrderService, _, _>("charge", ["Order"])]
//!     }
//!
//!     fn intercept(&self, invocation: Invocation<'_>) -> Outcome {
//!         tracing::info!(operation = %invocation.operation(), "audited");
//!         invocation.proceed()
//!     }
//! }
//!
//! let orders: Arc<dyn OrderService> = Arc::new(Orders::default());
//! let chain = InterceptorChain::new().with(Audit);
//! let orders = chain.plugin_surface(orders)?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller ──► proxy (last registered) ──► proxy ──► … ──► target
//!              │ intercepted?
//!              ├─ yes: Interceptor::intercept(Invocation) ─► proceed()
//!              └─ no:  forward with identical arguments
//! ```
//!
//! - [`signature`]: resolve declared signatures into a [`SignatureMap`]
//! - [`lineage`]: find which of a target's surfaces an interceptor covers
//! - [`invocation`]: the context handed to an interceptor
//! - [`interceptor`]: the interceptor contract
//! - [`plugin`]: the proxy builder
//! - [`chain`]: ordered composition
//! - [`config`]: chains declared in TOML/YAML/JSON

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Generated code refers to `::interpose`, including inside this crate's tests
extern crate self as interpose;

pub mod builtin;
pub mod chain;
pub mod component;
pub mod config;
pub mod error;
pub mod interceptor;
pub mod invocation;
pub mod lineage;
pub mod plugin;
pub mod properties;
pub mod signature;
pub mod surface;

pub use builtin::{MetricsInterceptor, OperationStats, TracingInterceptor};
pub use chain::InterceptorChain;
pub use component::{Component, ComponentBuilder};
pub use config::{ChainConfig, InterceptorRegistry, PluginConfig};
pub use error::{ErrorKind, InterposeError, InterposeResult};
pub use interceptor::{Interceptor, IntoInterceptorObject};
pub use invocation::{Arguments, Invocation, Outcome};
pub use lineage::{Level, Lineage, discover};
pub use plugin::{Dispatch, Plugin};
pub use properties::Properties;
pub use signature::{OperationSignature, Signature, SignatureMap};
pub use surface::{OperationDescriptor, Surface, SurfaceCatalog, SurfaceDescriptor, SurfaceId};

/// Declares a trait as an interceptable capability surface
pub use interpose_macros::surface;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Component, Interceptor, InterceptorChain, InterposeError, InterposeResult, Invocation,
        Outcome, Plugin, Signature, surface,
    };
}
