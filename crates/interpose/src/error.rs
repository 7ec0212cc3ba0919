//! Error types for interpose
//!
//! Every error here is raised while a chain is being *built*: resolving
//! declared signatures, assembling components, loading configuration.
//! Failures of the wrapped operations themselves never become an
//! [`InterposeError`]; they travel inside the operation's own return value
//! (see [`Outcome`](crate::Outcome)) so callers observe exactly what the
//! target produced.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for interpose operations
pub type InterposeResult<T> = std::result::Result<T, InterposeError>;

/// Coarse classification of [`InterposeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The chain or an interceptor is misconfigured
    Configuration,
    /// A declared signature does not name a real operation
    Resolution,
}

/// Main error type for interpose
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum InterposeError {
    /// An interceptor declares nothing to intercept
    #[error("Interceptor '{interceptor}' declares no intercepted operations")]
    NoSignatures { interceptor: String },

    /// A declared signature does not match any operation on its surface
    #[error(
        "Could not find operation on surface '{surface}' named '{operation}' with parameters ({})",
        .params.join(", ")
    )]
    Resolution {
        surface: String,
        operation: String,
        params: Vec<String>,
    },

    /// A textual signature names a surface that is not in the catalog
    #[error("Unknown surface '{name}'")]
    UnknownSurface { name: String },

    /// A textual signature could not be parsed
    #[error("Invalid signature '{input}': {reason}")]
    InvalidSignature { input: String, reason: String },

    /// Configuration refers to an interceptor name with no registered factory
    #[error("Unknown interceptor '{name}'")]
    UnknownInterceptor { name: String },

    /// An interceptor rejected one of its properties
    #[error("Invalid property '{key}': {message}")]
    InvalidProperty { key: String, message: String },

    /// Any other configuration problem
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileNotFound(PathBuf),

    /// Unsupported configuration file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl InterposeError {
    /// Create a no-signatures error
    pub fn no_signatures(interceptor: impl Into<String>) -> Self {
        Self::NoSignatures {
            interceptor: interceptor.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution<I, S>(
        surface: impl Into<String>,
        operation: impl Into<String>,
        params: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Resolution {
            surface: surface.into(),
            operation: operation.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an unknown surface error
    pub fn unknown_surface(name: impl Into<String>) -> Self {
        Self::UnknownSurface { name: name.into() }
    }

    /// Create an invalid signature error
    pub fn invalid_signature(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSignature {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown interceptor error
    pub fn unknown_interceptor(name: impl Into<String>) -> Self {
        Self::UnknownInterceptor { name: name.into() }
    }

    /// Create an invalid property error
    pub fn invalid_property(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a generic configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolution { .. } | Self::UnknownSurface { .. } => ErrorKind::Resolution,
            _ => ErrorKind::Configuration,
        }
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Check if this is a resolution error
    pub fn is_resolution(&self) -> bool {
        self.kind() == ErrorKind::Resolution
    }
}
