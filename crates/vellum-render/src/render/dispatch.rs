//! The phased render dispatcher.
//!
//! [`Render::render`] drives one [`RenderInfo`] through a full cycle:
//!
//! ```text
//! Idle
//!   → resolve main template (TemplateNotFound if missing, nothing runs)
//!   → pre-render hooks
//!   → Header: walk extensions, render header extensions, fill buckets
//!   → Body:   before-body bucket, main template, after-body bucket
//!   → Footer: footer bucket
//!   → post-render hooks
//! Idle
//! ```
//!
//! Phase hooks run after the dispatcher handled each phase. The state returns
//! to `Idle` whether the cycle succeeded or not, so the same info can be
//! inspected (partial output, diagnostics) and rendered again.
//!
//! # Extension walk
//!
//! The walk is depth-first pre-order from the main template. Every template
//! contributes its declared extensions, then the extensions it resolves by
//! identifier, keyed by reuse id (later entries overwrite earlier ones with the
//! same id). Each extension is walked before it is classified, so the
//! extensions of an extension land in the buckets first. Buckets are
//! request-local and overwrite by reuse id as well.
//!
//! # Example
//!
//! ```rust
//! use vellum_render::{CatalogBuilder, Payload, Render, RenderInfo, TemplateLookup};
//!
//! let mut builder = CatalogBuilder::new();
//! builder.add("banner.tmp", &Payload::new("text").with_name("Banner")
//!     .with_body("[banner]").with_extension("before_body"));
//! builder.add("page.tmp", &Payload::new("text").with_name("Page")
//!     .with_body("page").requiring("Banner"));
//!
//! let render = Render::new(TemplateLookup::new(builder.build().unwrap()));
//! let mut info = RenderInfo::new("Page");
//! render.render(&mut info).unwrap();
//! assert_eq!(info.output(), "[banner]page");
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::RenderContext;
use super::hooks::RenderHooks;
use super::info::{Phase, RenderInfo, RenderState};
use crate::config::RenderConfig;
use crate::error::{Diagnostic, RenderError};
use crate::lookup::{Query, TemplateLookup};
use crate::template::{Call, ExtensionPosition, Template};

/// Extensions collected during the header phase, keyed by reuse id.
#[derive(Default)]
struct Buckets {
    before_body: IndexMap<String, Arc<Template>>,
    after_body: IndexMap<String, Arc<Template>>,
    footer: IndexMap<String, Arc<Template>>,
}

/// Renders templates from a lookup.
///
/// A `Render` holds no per-request state and can be shared across threads;
/// everything a cycle produces lives on the [`RenderInfo`] passed to
/// [`render`](Self::render).
pub struct Render {
    lookup: Arc<TemplateLookup>,
    hooks: RenderHooks,
    config: RenderConfig,
}

impl Render {
    pub fn new(lookup: TemplateLookup) -> Self {
        Self::from_shared(Arc::new(lookup))
    }

    /// Creates a render over a lookup shared with other renders.
    pub fn from_shared(lookup: Arc<TemplateLookup>) -> Self {
        Self {
            lookup,
            hooks: RenderHooks::new(),
            config: RenderConfig::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: RenderHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lookup(&self) -> &TemplateLookup {
        &self.lookup
    }

    pub fn hooks(&self) -> &RenderHooks {
        &self.hooks
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Runs one full render cycle for `info`.
    pub fn render(&self, info: &mut RenderInfo) -> Result<(), RenderError> {
        if info.state() != RenderState::Idle {
            return Err(RenderError::CycleInProgress);
        }
        if let Some(stale) = info.finish_capture() {
            tracing::debug!(bytes = stale.len(), "discarding capture of an aborted cycle");
        }

        let template = self
            .lookup
            .find_first(info.root())?
            .ok_or_else(|| RenderError::TemplateNotFound(info.root().to_string()))?;
        tracing::debug!(root = %info.root(), template = template.reference(), "render cycle");
        info.set_template(template.clone());

        self.hooks.run_pre_render(info)?;
        let result = self.run_cycle(info, template);
        info.set_state(RenderState::Idle);
        result?;
        self.hooks.run_post_render(info)?;
        Ok(())
    }

    /// Renders one template and returns its output.
    ///
    /// The renderable gets the context only when the template consents and is
    /// not an extension. It receives the current additional info.
    pub fn render_template(
        &self,
        ctx: &mut RenderContext<'_>,
        template: &Template,
    ) -> Result<String, RenderError> {
        let info = ctx.additional_info().cloned();
        let renderable = template.renderable().clone();
        tracing::trace!(template = template.reference(), "rendering template");
        if template.binds_to_context() && !template.is_extension() {
            renderable.render(&mut Call::bound(ctx, info))
        } else {
            renderable.render(&mut Call::detached(info))
        }
    }

    fn run_cycle(&self, info: &mut RenderInfo, template: Arc<Template>) -> Result<(), RenderError> {
        let mut ctx = RenderContext::new(self, info, template.clone());
        let mut buckets = Buckets::default();

        self.enter(&mut ctx, Phase::Header);
        let mut path = vec![template.clone()];
        self.walk(&mut ctx, &template, &mut path, &mut buckets)?;
        self.hooks.run_phase(Phase::Header, &mut ctx)?;

        self.enter(&mut ctx, Phase::Body);
        self.emit_all(&mut ctx, &buckets.before_body)?;
        self.emit(&mut ctx, &template)?;
        self.emit_all(&mut ctx, &buckets.after_body)?;
        self.hooks.run_phase(Phase::Body, &mut ctx)?;

        self.enter(&mut ctx, Phase::Footer);
        self.emit_all(&mut ctx, &buckets.footer)?;
        self.hooks.run_phase(Phase::Footer, &mut ctx)?;
        Ok(())
    }

    fn enter(&self, ctx: &mut RenderContext<'_>, phase: Phase) {
        tracing::debug!(%phase, "entering phase");
        ctx.info_mut().set_state(phase.into());
    }

    fn emit(&self, ctx: &mut RenderContext<'_>, template: &Template) -> Result<(), RenderError> {
        let text = self.render_template(ctx, template)?;
        ctx.info_mut().write(&text);
        Ok(())
    }

    fn emit_all(
        &self,
        ctx: &mut RenderContext<'_>,
        bucket: &IndexMap<String, Arc<Template>>,
    ) -> Result<(), RenderError> {
        for extension in bucket.values() {
            self.emit(ctx, extension)?;
        }
        Ok(())
    }

    fn walk(
        &self,
        ctx: &mut RenderContext<'_>,
        template: &Arc<Template>,
        path: &mut Vec<Arc<Template>>,
        buckets: &mut Buckets,
    ) -> Result<(), RenderError> {
        for (reuse, extension) in self.extension_set(ctx, template)? {
            if path.iter().any(|seen| Arc::ptr_eq(seen, &extension)) {
                ctx.info_mut().warn(Diagnostic::ExtensionCycle {
                    extension: extension.reference().to_string(),
                });
                continue;
            }

            if extension.is_extendable() {
                path.push(extension.clone());
                let walked = self.walk(ctx, &extension, path, buckets);
                path.pop();
                walked?;
            }

            let bucket = match extension.extension_position() {
                Some(ExtensionPosition::Header) => {
                    self.emit(ctx, &extension)?;
                    continue;
                }
                Some(ExtensionPosition::BeforeBody) => &mut buckets.before_body,
                Some(ExtensionPosition::AfterBody) => &mut buckets.after_body,
                Some(ExtensionPosition::Footer) => &mut buckets.footer,
                Some(ExtensionPosition::Unknown(position)) => {
                    ctx.info_mut().warn(Diagnostic::UnknownExtensionPosition {
                        extension: extension.reference().to_string(),
                        position: position.clone(),
                    });
                    continue;
                }
                None => continue,
            };
            bucket.insert(reuse, extension);
        }
        Ok(())
    }

    /// The extensions of `template` for this walk: declared ones first, then
    /// required and optional identifiers resolved through the lookup.
    fn extension_set(
        &self,
        ctx: &mut RenderContext<'_>,
        template: &Template,
    ) -> Result<IndexMap<String, Arc<Template>>, RenderError> {
        let mut set = template.extensions().clone();
        if !template.is_extension_aware() {
            return Ok(set);
        }

        let wanted = template
            .required_extensions()
            .iter()
            .map(|r| (r, true))
            .chain(template.optional_extensions().iter().map(|r| (r, false)));

        for (reference, required) in wanted {
            let identifier = reference.identifier.as_str();
            let found = self.lookup.find_first(&Query::Name(identifier.to_string()))?;
            let Some(extension) = found else {
                if required {
                    return Err(RenderError::ExtensionNotFound {
                        template: template.reference().to_string(),
                        identifier: identifier.to_string(),
                    });
                }
                tracing::debug!(
                    template = template.reference(),
                    identifier,
                    "optional extension not found"
                );
                continue;
            };

            if !extension.is_extension() {
                ctx.info_mut().warn(Diagnostic::NotAnExtension {
                    template: template.reference().to_string(),
                    identifier: identifier.to_string(),
                });
                continue;
            }
            set.insert(reference.reuse_key().to_string(), extension);
        }
        Ok(set)
    }
}

impl fmt::Debug for Render {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Render")
            .field("templates", &self.lookup.store().len())
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .finish()
    }
}
