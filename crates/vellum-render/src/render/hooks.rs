//! Hooks around the render cycle.
//!
//! Hooks run custom code at fixed points of a render without touching the
//! templates themselves.
//!
//! ```text
//! resolve main template
//!   → PRE-RENDER HOOKS ← (open capture buffers, seed parameters)
//!   → header phase → PHASE HOOKS(Header)
//!   → body phase   → PHASE HOOKS(Body)
//!   → footer phase → PHASE HOOKS(Footer)
//!   → POST-RENDER HOOKS ← (move captured output into the response)
//! ```
//!
//! Any hook may abort the cycle by returning a [`HookError`]. Post-render hooks
//! only run when every phase succeeded.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::context::RenderContext;
use super::info::{Phase, RenderInfo};

/// The hook point at which a hook error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    PreRender,
    Phase(Phase),
    PostRender,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPoint::PreRender => write!(f, "pre-render"),
            HookPoint::Phase(phase) => write!(f, "{} phase", phase),
            HookPoint::PostRender => write!(f, "post-render"),
        }
    }
}

/// Error returned by a hook.
#[derive(Debug, Error)]
#[error("hook error ({point}): {message}")]
pub struct HookError {
    /// Human-readable error message
    pub message: String,
    /// The hook point where the error occurred
    pub point: HookPoint,
    /// The underlying error source, if any
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HookError {
    pub fn pre_render(message: impl Into<String>) -> Self {
        Self::at(HookPoint::PreRender, message)
    }

    pub fn phase(phase: Phase, message: impl Into<String>) -> Self {
        Self::at(HookPoint::Phase(phase), message)
    }

    pub fn post_render(message: impl Into<String>) -> Self {
        Self::at(HookPoint::PostRender, message)
    }

    fn at(point: HookPoint, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            point,
            source: None,
        }
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.source = Some(source.into());
        self
    }
}

/// Hook run before the header phase or after the footer phase.
pub type RenderInfoFn = Arc<dyn Fn(&mut RenderInfo) -> Result<(), HookError> + Send + Sync>;

/// Hook run after the dispatcher finished a phase.
pub type PhaseFn =
    Arc<dyn Fn(Phase, &mut RenderContext<'_>) -> Result<(), HookError> + Send + Sync>;

/// Hooks of a [`Render`](crate::Render), executed in registration order.
#[derive(Clone, Default)]
pub struct RenderHooks {
    pre_render: Vec<RenderInfoFn>,
    phase: Vec<PhaseFn>,
    post_render: Vec<RenderInfoFn>,
}

impl RenderHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no hooks are registered.
    pub fn is_empty(&self) -> bool {
        self.pre_render.is_empty() && self.phase.is_empty() && self.post_render.is_empty()
    }

    /// Adds a pre-render hook.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vellum_render::{HookError, RenderHooks};
    ///
    /// let hooks = RenderHooks::new().pre_render(|info| {
    ///     if info.has_sub_template("layout") {
    ///         Ok(())
    ///     } else {
    ///         Err(HookError::pre_render("no layout selected"))
    ///     }
    /// });
    /// assert!(!hooks.is_empty());
    /// ```
    pub fn pre_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RenderInfo) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.pre_render.push(Arc::new(f));
        self
    }

    /// Adds a hook that runs after each phase.
    pub fn on_phase<F>(mut self, f: F) -> Self
    where
        F: Fn(Phase, &mut RenderContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.phase.push(Arc::new(f));
        self
    }

    /// Adds a post-render hook.
    pub fn post_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RenderInfo) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.post_render.push(Arc::new(f));
        self
    }

    /// Appends all hooks of `other` after ours.
    pub fn extend(mut self, other: RenderHooks) -> Self {
        self.pre_render.extend(other.pre_render);
        self.phase.extend(other.phase);
        self.post_render.extend(other.post_render);
        self
    }

    pub fn run_pre_render(&self, info: &mut RenderInfo) -> Result<(), HookError> {
        for hook in &self.pre_render {
            hook(info)?;
        }
        Ok(())
    }

    pub fn run_phase(&self, phase: Phase, ctx: &mut RenderContext<'_>) -> Result<(), HookError> {
        for hook in &self.phase {
            hook(phase, ctx)?;
        }
        Ok(())
    }

    pub fn run_post_render(&self, info: &mut RenderInfo) -> Result<(), HookError> {
        for hook in &self.post_render {
            hook(info)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHooks")
            .field("pre_render_count", &self.pre_render.len())
            .field("phase_count", &self.phase.len())
            .field("post_render_count", &self.post_render.len())
            .finish()
    }
}
