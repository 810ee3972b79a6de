//! Mapping from payload kinds to renderable constructors.
//!
//! The kind named by a payload decides which renderable is built for it. Kinds
//! are registered by name; a payload naming an unregistered kind cannot be
//! materialized.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::engine::{JinjaEngine, JinjaTemplate};
use super::marker::MarkerTemplate;
use super::renderable::{EmptyTemplate, Renderable, TextTemplate};
use super::Template;
use crate::catalog::Payload;
use crate::error::PayloadError;

/// Builds the renderable for a decoded payload, or explains why it cannot.
pub type KindFactory =
    Arc<dyn Fn(&str, &Payload) -> Result<Arc<dyn Renderable>, PayloadError> + Send + Sync>;

/// Registry of payload kinds.
///
/// [`KindRegistry::new`] registers `text`, `marker`, `jinja` and `empty`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vellum_render::{KindRegistry, Payload, TextTemplate};
///
/// let mut kinds = KindRegistry::new();
/// kinds.register("shout", |_reference: &str, payload: &Payload| {
///     let body = payload.body.clone().unwrap_or_default().to_uppercase();
///     Ok(Arc::new(TextTemplate::new(body)) as _)
/// });
///
/// let template = kinds
///     .build("a.tmp", Payload::new("shout").with_body("hi"))
///     .unwrap();
/// assert_eq!(template.kind(), "shout");
/// ```
pub struct KindRegistry {
    kinds: HashMap<String, KindFactory>,
    engine: Arc<JinjaEngine>,
}

impl KindRegistry {
    /// Creates a registry with the built-in kinds.
    pub fn new() -> Self {
        Self::with_engine(Arc::new(JinjaEngine::new()))
    }

    /// Creates a registry with the built-in kinds, evaluating `jinja` bodies with `engine`.
    pub fn with_engine(engine: Arc<JinjaEngine>) -> Self {
        let mut registry = Self::empty_with(engine.clone());

        registry.register("text", |_: &str, payload: &Payload| {
            Ok(Arc::new(TextTemplate::new(payload.body.clone().unwrap_or_default())) as _)
        });
        registry.register("marker", |_: &str, payload: &Payload| {
            Ok(Arc::new(MarkerTemplate::new(payload.body.clone().unwrap_or_default())) as _)
        });
        registry.register("empty", |_: &str, _: &Payload| Ok(Arc::new(EmptyTemplate) as _));
        registry.register("jinja", move |reference: &str, payload: &Payload| {
            let source = payload.body.clone().unwrap_or_default();
            let template = JinjaTemplate::compile(engine.clone(), reference, source)?;
            Ok(Arc::new(template) as Arc<dyn Renderable>)
        });

        registry
    }

    /// Creates a registry without any kinds.
    pub fn empty() -> Self {
        Self::empty_with(Arc::new(JinjaEngine::new()))
    }

    fn empty_with(engine: Arc<JinjaEngine>) -> Self {
        Self {
            kinds: HashMap::new(),
            engine,
        }
    }

    /// Registers or replaces a kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str, &Payload) -> Result<Arc<dyn Renderable>, PayloadError> + Send + Sync + 'static,
    {
        self.kinds.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The engine used for `jinja` bodies.
    pub fn engine(&self) -> &Arc<JinjaEngine> {
        &self.engine
    }

    /// Builds the template for `payload` at `reference`.
    pub fn build(&self, reference: &str, payload: Payload) -> Result<Template, PayloadError> {
        let factory = self
            .kinds
            .get(&payload.kind)
            .ok_or_else(|| PayloadError::UnknownKind(payload.kind.clone()))?;
        let renderable = factory(reference, &payload)?;
        Ok(Template::from_payload(reference, payload, renderable))
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
