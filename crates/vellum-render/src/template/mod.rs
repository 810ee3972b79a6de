//! Materialized templates and their renderables.
//!
//! A [`Template`] is the live form of one catalog payload: identity fields
//! (reference, id, name, catalog group, tags), an attribute map, the
//! [`Renderable`] that produces its output, and the extension relationships the
//! dispatcher walks during the header phase.
//!
//! Templates are immutable. Identity fields have getters only, so nothing that
//! holds a `&Template` (or an `Arc<Template>` from the materializer cache) can
//! rename or retag it.
//!
//! # Renderable Kinds
//!
//! | kind     | renderable          | body                                  |
//! |----------|---------------------|---------------------------------------|
//! | `text`   | [`TextTemplate`]    | emitted as-is                         |
//! | `marker` | [`MarkerTemplate`]  | `$(key)` markers replaced from values |
//! | `jinja`  | [`JinjaTemplate`]   | MiniJinja source                      |
//! | `empty`  | [`EmptyTemplate`]   | ignored, renders nothing              |
//!
//! Programmatic templates are built with [`TemplateBuilder`] around any
//! renderable, typically a [`CallbackTemplate`].

mod engine;
mod filters;
mod iterator;
mod kinds;
mod marker;
mod renderable;

pub use engine::{JinjaEngine, JinjaTemplate};
pub use filters::register_filters;
pub use iterator::IteratorTemplate;
pub use kinds::{KindFactory, KindRegistry};
pub use marker::MarkerTemplate;
pub use renderable::{
    Call, CallbackTemplate, ContentRenderable, EmptyTemplate, Renderable, TextTemplate,
};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::catalog::{ExtensionRef, Payload, RawPosition};

/// Where an extension renders relative to the main template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtensionPosition {
    /// Rendered immediately while extensions are collected.
    Header,
    BeforeBody,
    AfterBody,
    Footer,
    /// A position outside the known set. Such extensions are dropped.
    Unknown(String),
}

impl ExtensionPosition {
    /// Interprets a payload position: `-2`, `-1`, `1`, `2` or their names.
    pub fn from_raw(raw: &RawPosition) -> Self {
        match raw {
            RawPosition::Code(-2) => ExtensionPosition::Header,
            RawPosition::Code(-1) => ExtensionPosition::BeforeBody,
            RawPosition::Code(1) => ExtensionPosition::AfterBody,
            RawPosition::Code(2) => ExtensionPosition::Footer,
            RawPosition::Code(other) => ExtensionPosition::Unknown(other.to_string()),
            RawPosition::Name(name) => match name.to_ascii_lowercase().replace('-', "_").as_str() {
                "header" => ExtensionPosition::Header,
                "before_body" => ExtensionPosition::BeforeBody,
                "after_body" => ExtensionPosition::AfterBody,
                "footer" => ExtensionPosition::Footer,
                _ => ExtensionPosition::Unknown(name.clone()),
            },
        }
    }
}

impl fmt::Display for ExtensionPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionPosition::Header => write!(f, "header"),
            ExtensionPosition::BeforeBody => write!(f, "before_body"),
            ExtensionPosition::AfterBody => write!(f, "after_body"),
            ExtensionPosition::Footer => write!(f, "footer"),
            ExtensionPosition::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// A live template.
pub struct Template {
    reference: String,
    id: String,
    name: String,
    catalog: Option<String>,
    tags: Vec<String>,
    attributes: IndexMap<String, Value>,
    kind: String,
    renderable: Arc<dyn Renderable>,
    extension: Option<ExtensionPosition>,
    extensions: IndexMap<String, Arc<Template>>,
    requires: Vec<ExtensionRef>,
    optional: Vec<ExtensionRef>,
    bind_context: bool,
}

impl Template {
    /// Builds a template from a decoded payload and the renderable its kind produced.
    pub(crate) fn from_payload(
        reference: &str,
        payload: Payload,
        renderable: Arc<dyn Renderable>,
    ) -> Self {
        let Payload {
            kind,
            id,
            name,
            catalog,
            tags,
            attributes,
            extension,
            requires,
            optional,
            bind_context,
            ..
        } = payload;

        Self {
            reference: reference.to_string(),
            id: id.unwrap_or_else(|| reference.to_string()),
            name,
            catalog,
            tags: dedup(tags),
            attributes,
            kind,
            renderable,
            extension: extension.as_ref().map(ExtensionPosition::from_raw),
            extensions: IndexMap::new(),
            requires,
            optional,
            bind_context,
        }
    }

    /// The catalog reference, used as the key of lookup results.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The template name. May be empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// The payload kind this template was built from.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn renderable(&self) -> &Arc<dyn Renderable> {
        &self.renderable
    }

    /// The position of this template when used as an extension.
    pub fn extension_position(&self) -> Option<&ExtensionPosition> {
        self.extension.as_ref()
    }

    pub fn is_extension(&self) -> bool {
        self.extension.is_some()
    }

    /// Extensions declared directly on the template, keyed by reuse id.
    pub fn extensions(&self) -> &IndexMap<String, Arc<Template>> {
        &self.extensions
    }

    pub fn required_extensions(&self) -> &[ExtensionRef] {
        &self.requires
    }

    pub fn optional_extensions(&self) -> &[ExtensionRef] {
        &self.optional
    }

    /// True when the template resolves extensions by identifier.
    pub fn is_extension_aware(&self) -> bool {
        !self.requires.is_empty() || !self.optional.is_empty()
    }

    /// True when the template has any extension relationship to walk.
    pub fn is_extendable(&self) -> bool {
        !self.extensions.is_empty() || self.is_extension_aware()
    }

    /// Whether the renderable should receive the render context.
    ///
    /// Both the template and its renderable must consent.
    pub fn binds_to_context(&self) -> bool {
        self.bind_context && self.renderable.binds_to_context()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("reference", &self.reference)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("catalog", &self.catalog)
            .field("tags", &self.tags)
            .field("kind", &self.kind)
            .field("extension", &self.extension)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn dedup(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Builds templates that do not come from a catalog.
///
/// # Example
///
/// ```rust
/// use vellum_render::{CallbackTemplate, ExtensionPosition, TemplateBuilder};
///
/// let banner = TemplateBuilder::new("banner", CallbackTemplate::new(|_| Ok("<banner>".into())))
///     .as_extension(ExtensionPosition::BeforeBody)
///     .build();
///
/// let page = TemplateBuilder::new("page", CallbackTemplate::new(|_| Ok("<page>".into())))
///     .with_name("Page")
///     .with_extension("banner", banner)
///     .build();
///
/// assert!(page.is_extendable());
/// assert_eq!(page.name(), "Page");
/// ```
pub struct TemplateBuilder {
    template: Template,
}

impl TemplateBuilder {
    pub fn new(reference: impl Into<String>, renderable: impl Renderable + 'static) -> Self {
        Self::from_renderable(reference, Arc::new(renderable))
    }

    pub fn from_renderable(reference: impl Into<String>, renderable: Arc<dyn Renderable>) -> Self {
        let reference = reference.into();
        Self {
            template: Template {
                id: reference.clone(),
                reference,
                name: String::new(),
                catalog: None,
                tags: Vec::new(),
                attributes: IndexMap::new(),
                kind: "callback".to_string(),
                renderable,
                extension: None,
                extensions: IndexMap::new(),
                requires: Vec::new(),
                optional: Vec::new(),
                bind_context: true,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.template.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.template.name = name.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.template.catalog = Some(catalog.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.template.tags.contains(&tag) {
            self.template.tags.push(tag);
        }
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.template.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.template.kind = kind.into();
        self
    }

    /// Marks the template as an extension rendered at `position`.
    pub fn as_extension(mut self, position: ExtensionPosition) -> Self {
        self.template.extension = Some(position);
        self
    }

    /// Declares an extension under a reuse id. A later extension with the same
    /// reuse id replaces the earlier one.
    pub fn with_extension(mut self, reuse: impl Into<String>, extension: Arc<Template>) -> Self {
        self.template.extensions.insert(reuse.into(), extension);
        self
    }

    pub fn requiring(mut self, extension: impl Into<ExtensionRef>) -> Self {
        self.template.requires.push(extension.into());
        self
    }

    pub fn optionally(mut self, extension: impl Into<ExtensionRef>) -> Self {
        self.template.optional.push(extension.into());
        self
    }

    pub fn bind_context(mut self, bind: bool) -> Self {
        self.template.bind_context = bind;
        self
    }

    pub fn build(self) -> Arc<Template> {
        Arc::new(self.template)
    }
}
