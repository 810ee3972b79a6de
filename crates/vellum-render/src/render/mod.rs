//! Render cycles.
//!
//! - [`Render`] runs the phased cycle for a [`RenderInfo`].
//! - [`RenderContext`] is what bound renderables see during the cycle:
//!   value lookup, catalog queries, sub-template rendering and encoding.
//! - [`RenderHooks`] and [`capture_output`] attach behaviour around the cycle.

mod capture;
mod context;
mod dispatch;
mod encode;
mod hooks;
mod info;

pub use capture::capture_output;
pub use context::{RenderContext, SubTemplateRef, ValueDepth};
pub use dispatch::Render;
pub use encode::Encoding;
pub use hooks::{HookError, HookPoint, PhaseFn, RenderHooks, RenderInfoFn};
pub use info::{Phase, RenderInfo, RenderState, Response, SubTemplate};
