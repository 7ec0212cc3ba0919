//! Declarative chain configuration
//!
//! A chain can be described in a TOML, YAML or JSON file instead of code:
//!
//! ```toml
//! [[plugins]]
//! interceptor = "metrics"
//! intercepts = ["OrderService.charge(Order)"]
//!
//! [plugins.properties]
//! label = "orders"
//! ```
//!
//! Interceptor names are looked up in an [`InterceptorRegistry`]; textual
//! signatures are resolved through a [`SurfaceCatalog`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::builtin::{MetricsInterceptor, TracingInterceptor};
use crate::chain::InterceptorChain;
use crate::error::{InterposeError, InterposeResult};
use crate::interceptor::Interceptor;
use crate::properties::Properties;
use crate::signature::SignatureMap;
use crate::surface::SurfaceCatalog;

/// Environment variable prefix used by [`ChainConfig::from_file`]
pub const ENV_PREFIX: &str = "INTERPOSE";

/// Ordered list of configured interceptors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Interceptors in registration order (the last one is outermost)
    pub plugins: Vec<PluginConfig>,
}

/// One configured interceptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Registered interceptor name
    pub interceptor: String,

    /// Textual signatures (`Surface.operation(T1, T2)`) replacing the ones
    /// the interceptor declares itself; empty keeps the interceptor's own
    #[serde(default)]
    pub intercepts: Vec<String>,

    /// Passed to [`Interceptor::set_properties`]
    #[serde(default)]
    pub properties: Properties,
}

impl PluginConfig {
    /// Configure interceptor `interceptor` with no overrides
    pub fn new(interceptor: impl Into<String>) -> Self {
        Self {
            interceptor: interceptor.into(),
            intercepts: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Add a textual signature
    pub fn intercept(mut self, signature: impl Into<String>) -> Self {
        self.intercepts.push(signature.into());
        self
    }

    /// Set a property
    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key, value);
        self
    }
}

impl ChainConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The file format is auto-detected from the file extension:
    /// - `.toml` → TOML format
    /// - `.yaml` or `.yml` → YAML format
    /// - `.json` → JSON format
    ///
    /// Environment variables with the `INTERPOSE_` prefix override file
    /// settings, using `__` between nested keys.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file doesn't exist
    /// - The file format is unsupported
    /// - The file contains invalid configuration
    pub fn from_file(path: impl AsRef<Path>) -> InterposeResult<Self> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file).
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> InterposeResult<Self> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(InterposeError::ConfigFileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(InterposeError::UnsupportedFormat),
        };

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(InterposeError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        debug!(
            path = %path.display(),
            plugins = loaded.plugins.len(),
            "Loaded chain configuration"
        );
        Ok(loaded)
    }

    /// Append an interceptor
    pub fn with_plugin(mut self, plugin: PluginConfig) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Instantiate, configure and validate every interceptor, in file order.
    ///
    /// Signatures are resolved eagerly, so a chain returned from here will
    /// not fail to resolve later when it is applied.
    ///
    /// # Errors
    ///
    /// - [`InterposeError::UnknownInterceptor`] for unregistered names
    /// - [`InterposeError::InvalidProperty`] from `set_properties`
    /// - [`InterposeError::Configuration`] when an interceptor that does not
    ///   implement [`Interceptor::set_signatures`] is given `intercepts`
    /// - [`InterposeError::InvalidSignature`], [`InterposeError::UnknownSurface`]
    ///   or [`InterposeError::Resolution`] for bad `intercepts` entries
    /// - [`InterposeError::NoSignatures`] when neither the interceptor nor
    ///   the configuration declares anything
    pub fn build_chain(
        &self,
        registry: &InterceptorRegistry,
        catalog: &SurfaceCatalog,
    ) -> InterposeResult<InterceptorChain> {
        let mut chain = InterceptorChain::new();
        for (position, plugin) in self.plugins.iter().enumerate() {
            let interceptor = build_interceptor(plugin, registry, catalog).inspect_err(|e| {
                error!(
                    interceptor = %plugin.interceptor,
                    position,
                    "Invalid interceptor configuration: {}",
                    e
                );
            })?;
            chain.add_shared(interceptor);
        }
        info!(interceptors = chain.len(), "Built interceptor chain from configuration");
        Ok(chain)
    }
}

fn build_interceptor(
    plugin: &PluginConfig,
    registry: &InterceptorRegistry,
    catalog: &SurfaceCatalog,
) -> InterposeResult<Arc<dyn Interceptor>> {
    let mut interceptor = registry.create(&plugin.interceptor)?;
    interceptor.set_properties(&plugin.properties)?;

    if !plugin.intercepts.is_empty() {
        let signatures = plugin
            .intercepts
            .iter()
            .map(|text| catalog.resolve(text))
            .collect::<InterposeResult<Vec<_>>>()?;
        interceptor.set_signatures(signatures)?;
    }

    SignatureMap::build(interceptor.as_ref())?;
    Ok(Arc::from(interceptor))
}

/// Creates a fresh, unconfigured interceptor
pub type InterceptorFactory = Arc<dyn Fn() -> Box<dyn Interceptor> + Send + Sync>;

/// Name → factory map used to instantiate configured interceptors
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    factories: BTreeMap<String, InterceptorFactory>,
}

impl InterceptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in interceptors (`metrics`,
    /// `tracing`)
    pub fn with_builtins() -> Self {
        Self::new()
            .with("metrics", || Box::new(MetricsInterceptor::new()))
            .with("tracing", || Box::new(TracingInterceptor::new()))
    }

    /// Register (or replace) a factory
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Interceptor> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(interceptor = %name, "Registered interceptor factory");
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Interceptor> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Instantiate interceptor `name`
    ///
    /// # Errors
    ///
    /// Returns [`InterposeError::UnknownInterceptor`] if no factory is
    /// registered under `name`.
    pub fn create(&self, name: &str) -> InterposeResult<Box<dyn Interceptor>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| InterposeError::unknown_interceptor(name))
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
