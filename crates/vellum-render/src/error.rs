//! Error types for catalog loading, template lookup and rendering.
//!
//! Each layer has its own error enum:
//!
//! - [`CatalogError`]: the compiled catalog could not be read or failed validation.
//! - [`PayloadError`]: a single payload could not be decoded, encoded or built.
//! - [`LookupError`]: a payload could not be materialized into a template.
//! - [`RenderError`]: a render cycle was aborted.
//! - [`ConfigError`]: a render configuration file could not be loaded.
//!
//! Conditions that only degrade a result (an ignored query item, a dropped
//! extension) are not errors. They are reported as [`Diagnostic`]s, logged at
//! warning level and collected on the object that observed them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::render::HookError;

/// Error raised while loading or validating a compiled catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog document is not valid JSON.
    #[error("malformed catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// The catalog document is not valid YAML.
    #[error("malformed catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The file extension does not name a supported catalog format.
    #[error("unsupported catalog format: {0}")]
    UnsupportedFormat(String),

    /// An index lists a position that has no catalog entry.
    #[error("{index} index `{key}` refers to position {position}, which has no catalog entry")]
    DanglingPosition {
        index: &'static str,
        key: String,
        position: usize,
    },

    /// Two entries share the same reference.
    #[error("reference `{0}` appears more than once in the catalog")]
    DuplicateReference(String),

    /// A key of the `data` section is not a position.
    #[error("payload key `{0}` is not a catalog position")]
    InvalidPayloadKey(String),

    /// A payload handed to the builder could not be encoded.
    #[error("payload for `{reference}` could not be encoded")]
    Payload {
        reference: String,
        #[source]
        source: PayloadError,
    },
}

/// Error raised for one template payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not a valid payload object.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload declares a format this crate does not read.
    #[error("unsupported payload format {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    /// No renderable is registered for the payload's kind.
    #[error("unknown template kind `{0}`")]
    UnknownKind(String),

    /// The payload body does not compile.
    #[error("invalid template body: {0}")]
    Body(#[from] minijinja::Error),

    /// A registered kind rejected the payload.
    #[error("{0}")]
    Rejected(String),
}

impl PayloadError {
    /// Creates an error for a kind that rejects a payload on its own terms.
    pub fn rejected(message: impl Into<String>) -> Self {
        PayloadError::Rejected(message.into())
    }
}

/// Error raised when a catalog payload cannot be turned into a template.
///
/// Only the lookup that touched the bad position fails; other positions stay
/// usable.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("template `{reference}` at position {position} is corrupt: {source}")]
    Corrupt {
        position: usize,
        reference: String,
        #[source]
        source: PayloadError,
    },
}

impl LookupError {
    /// Returns the position of the offending payload.
    pub fn position(&self) -> usize {
        match self {
            LookupError::Corrupt { position, .. } => *position,
        }
    }
}

/// Error type for render cycles.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template that had to exist (the main template) was not found.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A required extension did not resolve.
    #[error("template `{template}` requires extension `{identifier}`, which was not found")]
    ExtensionNotFound { template: String, identifier: String },

    /// A sub-template reference did not resolve.
    #[error("sub-template not found: {0}")]
    SubTemplateNotFound(String),

    /// `render` was called on a render info that is already inside a cycle.
    #[error("a render cycle is already in progress for this render info")]
    CycleInProgress,

    /// Sub-template rendering nested beyond the configured limit.
    #[error("sub-template nesting exceeded {0} levels")]
    NestingTooDeep(usize),

    /// A payload failed to materialize during the cycle.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A render hook aborted the cycle.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A template body failed to compile or evaluate.
    #[error("template error: {0}")]
    Template(String),

    /// A renderable reported a failure of its own.
    #[error("{0}")]
    Failed(String),
}

impl RenderError {
    /// Creates an error for a renderable that failed on its own terms.
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }
}

impl From<minijinja::Error> for RenderError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        match err.kind() {
            ErrorKind::TemplateNotFound => RenderError::SubTemplateNotFound(err.to_string()),
            _ => RenderError::Template(err.to_string()),
        }
    }
}

/// Error raised while loading a [`RenderConfig`](crate::RenderConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration does not name a catalog to load.
    #[error("config does not name a catalog")]
    MissingCatalog,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A non-fatal condition observed during lookup or rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A query item was not understood and has been ignored.
    UnsupportedQueryItem(String),
    /// An extension declared a position outside the known set and was dropped.
    UnknownExtensionPosition { extension: String, position: String },
    /// A template listed as an extension does not declare a position.
    NotAnExtension { template: String, identifier: String },
    /// An extension was reached again while walking its own extensions.
    ExtensionCycle { extension: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnsupportedQueryItem(item) => {
                write!(f, "unsupported query item `{}` ignored", item)
            }
            Diagnostic::UnknownExtensionPosition {
                extension,
                position,
            } => write!(
                f,
                "extension `{}` has unknown position `{}` and was dropped",
                extension, position
            ),
            Diagnostic::NotAnExtension {
                template,
                identifier,
            } => write!(
                f,
                "`{}` resolved for `{}` is not an extension and was skipped",
                identifier, template
            ),
            Diagnostic::ExtensionCycle { extension } => {
                write!(f, "extension `{}` extends itself and was skipped", extension)
            }
        }
    }
}
