//! The renderable contract.
//!
//! A [`Renderable`] receives everything it may use through a [`Call`]: an
//! optional handle to the [`RenderContext`] (present only when the template
//! consented to binding), the element being iterated when driven by an
//! [`IteratorTemplate`](super::IteratorTemplate), and the additional info passed
//! by whoever requested the render. There is no ambient "current render".

use serde_json::Value;

use crate::error::RenderError;
use crate::render::RenderContext;

/// Executable rendering logic of a template.
pub trait Renderable: Send + Sync {
    /// Produces the output text for one invocation.
    fn render(&self, call: &mut Call<'_, '_>) -> Result<String, RenderError>;

    /// Whether this renderable wants the render context. Defaults to `true`.
    fn binds_to_context(&self) -> bool {
        true
    }
}

/// Arguments of one renderable invocation.
pub struct Call<'c, 'r> {
    context: Option<&'c mut RenderContext<'r>>,
    value: Option<Value>,
    info: Option<Value>,
}

impl<'c, 'r> Call<'c, 'r> {
    /// A call bound to a render context.
    pub fn bound(context: &'c mut RenderContext<'r>, info: Option<Value>) -> Self {
        Self {
            context: Some(context),
            value: None,
            info,
        }
    }

    /// A call without a render context.
    pub fn detached(info: Option<Value>) -> Self {
        Self {
            context: None,
            value: None,
            info,
        }
    }

    /// A call for one element of an iteration, sharing this call's context and info.
    pub fn with_value(&mut self, value: Value) -> Call<'_, 'r> {
        Call {
            context: self.context.as_deref_mut(),
            value: Some(value),
            info: self.info.clone(),
        }
    }

    pub fn context(&mut self) -> Option<&mut RenderContext<'r>> {
        self.context.as_deref_mut()
    }

    pub fn context_ref(&self) -> Option<&RenderContext<'r>> {
        self.context.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.context.is_some()
    }

    /// The element being iterated, if any.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// The additional info of this render.
    pub fn info(&self) -> Option<&Value> {
        self.info.as_ref()
    }
}

/// A unit that produces its own content when used as a sub-template.
///
/// Sub-template resolution hands these the context directly instead of going
/// through the template path, so they decide binding themselves.
///
/// Implemented for closures:
///
/// ```rust
/// use vellum_render::{ContentRenderable, RenderContext, RenderError};
/// use serde_json::Value;
///
/// let greeting = |_ctx: &mut RenderContext<'_>, info: Option<Value>| -> Result<String, RenderError> {
///     Ok(format!("hello {}", info.unwrap_or(Value::Null)))
/// };
/// fn assert_content<C: ContentRenderable>(_: &C) {}
/// assert_content(&greeting);
/// ```
pub trait ContentRenderable: Send + Sync {
    fn render_contents(
        &self,
        context: &mut RenderContext<'_>,
        info: Option<Value>,
    ) -> Result<String, RenderError>;
}

impl<F> ContentRenderable for F
where
    F: Fn(&mut RenderContext<'_>, Option<Value>) -> Result<String, RenderError> + Send + Sync,
{
    fn render_contents(
        &self,
        context: &mut RenderContext<'_>,
        info: Option<Value>,
    ) -> Result<String, RenderError> {
        self(context, info)
    }
}

/// A renderable backed by a closure.
pub struct CallbackTemplate {
    callback: Box<dyn Fn(&mut Call<'_, '_>) -> Result<String, RenderError> + Send + Sync>,
    bind: bool,
}

impl CallbackTemplate {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut Call<'_, '_>) -> Result<String, RenderError> + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
            bind: true,
        }
    }

    /// Opts out of context binding.
    pub fn unbound(mut self) -> Self {
        self.bind = false;
        self
    }
}

impl Renderable for CallbackTemplate {
    fn render(&self, call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        (self.callback)(call)
    }

    fn binds_to_context(&self) -> bool {
        self.bind
    }
}

/// Static text.
#[derive(Debug, Clone)]
pub struct TextTemplate {
    body: String,
}

impl TextTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

impl Renderable for TextTemplate {
    fn render(&self, _call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        Ok(self.body.clone())
    }

    fn binds_to_context(&self) -> bool {
        false
    }
}

/// Renders nothing. Used for containers that only host extensions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyTemplate;

impl Renderable for EmptyTemplate {
    fn render(&self, _call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        Ok(String::new())
    }

    fn binds_to_context(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_callback_sees_info() {
        let template = CallbackTemplate::new(|call| Ok(format!("info={}", call.info().unwrap())));
        let out = template.render(&mut Call::detached(Some(json!(5)))).unwrap();
        assert_eq!(out, "info=5");
    }

    #[test]
    fn test_with_value_keeps_info() {
        let mut call = Call::detached(Some(json!("x")));
        let child = call.with_value(json!(1));
        assert_eq!(child.value(), Some(&json!(1)));
        assert_eq!(child.info(), Some(&json!("x")));
        assert!(!child.is_bound());
    }

    #[test]
    fn test_text_and_empty() {
        let mut call = Call::detached(None);
        assert_eq!(TextTemplate::new("hi").render(&mut call).unwrap(), "hi");
        assert_eq!(EmptyTemplate.render(&mut call).unwrap(), "");
        assert!(!TextTemplate::new("hi").binds_to_context());
    }

    #[test]
    fn test_callback_errors_propagate() {
        let template = CallbackTemplate::new(|_| Err(RenderError::failed("boom")));
        let err = template.render(&mut Call::detached(None)).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
