//! Vellum Render - compiled template catalogs and phased render dispatch.
//!
//! A build step compiles templates into a catalog: an ordered list of template
//! references with name, catalog-group and tag indexes and one serialized
//! payload per template. This crate consumes such catalogs:
//!
//! - [`CatalogStore`] loads and validates a compiled catalog.
//! - [`TemplateLookup`] answers name, group and tag queries, materializing
//!   templates lazily and caching them per position.
//! - [`Render`] runs the header, body and footer phases for a [`RenderInfo`],
//!   placing extension templates around the main template.
//! - [`RenderContext`] gives bound templates value lookup, catalog queries and
//!   nested sub-template rendering.
//!
//! # Quick Start
//!
//! ```rust
//! use vellum_render::{CatalogBuilder, Payload, Render, RenderInfo, TemplateLookup};
//! use serde_json::json;
//!
//! let mut builder = CatalogBuilder::new();
//! builder.add(
//!     "greeting.tmp",
//!     &Payload::new("marker")
//!         .with_name("Greeting")
//!         .with_body("Hello $(user)!")
//!         .requiring("Footer"),
//! );
//! builder.add(
//!     "footer.tmp",
//!     &Payload::new("text").with_name("Footer").with_body(" Bye.").with_extension("footer"),
//! );
//!
//! let render = Render::new(TemplateLookup::new(builder.build().unwrap()));
//! let mut info = RenderInfo::new("Greeting").with_info(json!({"user": "ada"}));
//! render.render(&mut info).unwrap();
//! assert_eq!(info.output(), "Hello ada! Bye.");
//! ```
//!
//! # Queries
//!
//! Results are ordered maps from reference to template:
//!
//! | query                   | order                                      |
//! |-------------------------|--------------------------------------------|
//! | name, catalog group     | index order                                |
//! | tags, match-any         | first-seen union across the given tags     |
//! | tags, match-all         | first tag's order, restricted to all tags  |
//! | [`QuerySpec`]           | progressive filter, literal templates last |
//!
//! # Errors
//!
//! Missing things a lookup merely reports (unknown names, empty results) are
//! `Option`s and empty maps. Conditions that only degrade a render are
//! [`Diagnostic`]s. Everything that aborts a cycle is a [`RenderError`].

pub mod catalog;
pub mod config;
mod error;
pub mod lookup;
pub mod render;
pub mod template;

pub use catalog::{
    CatalogBuilder, CatalogStore, CompiledCatalog, ExtensionRef, Payload, RawPosition,
    FORMAT_VERSION,
};
pub use config::{RenderConfig, DEFAULT_MAX_DEPTH};
pub use error::{CatalogError, ConfigError, Diagnostic, LookupError, PayloadError, RenderError};
pub use lookup::{Materializer, Query, QuerySpec, SpecItem, TagSelection, TemplateLookup, Templates};
pub use render::{
    capture_output, Encoding, HookError, HookPoint, Phase, PhaseFn, Render, RenderContext,
    RenderHooks, RenderInfo, RenderInfoFn, RenderState, Response, SubTemplate, SubTemplateRef,
    ValueDepth,
};
pub use template::{
    register_filters, Call, CallbackTemplate, ContentRenderable, EmptyTemplate,
    ExtensionPosition, IteratorTemplate, JinjaEngine, JinjaTemplate, KindFactory, KindRegistry,
    MarkerTemplate, Renderable, Template, TemplateBuilder, TextTemplate,
};
