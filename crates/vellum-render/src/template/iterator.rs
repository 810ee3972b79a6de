use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::renderable::{Call, ContentRenderable, Renderable};
use super::Template;
use crate::error::RenderError;
use crate::render::RenderContext;

type ValueSource = Box<dyn Iterator<Item = Value> + Send>;

/// Renders an inner renderable once per element of a value source.
///
/// Every element is rendered with the same additional info, in source order,
/// and the outputs are concatenated. The source is consumed by the first
/// render; later renders produce nothing.
///
/// # Example
///
/// ```rust
/// use vellum_render::{Call, CallbackTemplate, IteratorTemplate, Renderable};
/// use serde_json::json;
///
/// let row = CallbackTemplate::new(|call| {
///     Ok(format!("{} <=> {}\n", call.value().unwrap(), call.info().unwrap()))
/// });
/// let rows = IteratorTemplate::new(row, vec![json!(1), json!(2)]);
///
/// let out = rows.render(&mut Call::detached(Some(json!(67)))).unwrap();
/// assert_eq!(out, "1 <=> 67\n2 <=> 67\n");
/// ```
pub struct IteratorTemplate {
    inner: Arc<dyn Renderable>,
    source: Mutex<Option<ValueSource>>,
}

impl IteratorTemplate {
    pub fn new<R, I>(inner: R, source: I) -> Self
    where
        R: Renderable + 'static,
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::from_renderable(Arc::new(inner), source)
    }

    /// Iterates the renderable of an existing template.
    pub fn for_template<I>(template: &Template, source: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self::from_renderable(template.renderable().clone(), source)
    }

    pub fn from_renderable<I>(inner: Arc<dyn Renderable>, source: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner,
            source: Mutex::new(Some(Box::new(source.into_iter()))),
        }
    }

    /// True once the source has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.source
            .lock()
            .map(|source| source.is_none())
            .unwrap_or(true)
    }

    fn take_source(&self) -> Option<ValueSource> {
        match self.source.lock() {
            Ok(mut source) => source.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Renderable for IteratorTemplate {
    fn render(&self, call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        let Some(source) = self.take_source() else {
            return Ok(String::new());
        };

        let mut out = String::new();
        for value in source {
            out.push_str(&self.inner.render(&mut call.with_value(value))?);
        }
        Ok(out)
    }

    fn binds_to_context(&self) -> bool {
        self.inner.binds_to_context()
    }
}

impl ContentRenderable for IteratorTemplate {
    fn render_contents(
        &self,
        context: &mut RenderContext<'_>,
        info: Option<Value>,
    ) -> Result<String, RenderError> {
        if self.binds_to_context() {
            self.render(&mut Call::bound(context, info))
        } else {
            self.render(&mut Call::detached(info))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{CallbackTemplate, TextTemplate};
    use serde_json::json;

    fn arrow() -> CallbackTemplate {
        CallbackTemplate::new(|call| {
            Ok(format!(
                "{} <=> {}\n",
                call.value().cloned().unwrap_or(Value::Null),
                call.info().cloned().unwrap_or(Value::Null)
            ))
        })
    }

    #[test]
    fn test_renders_each_value_with_shared_info() {
        let values = (1..=3).map(|n| json!(n));
        let template = IteratorTemplate::new(arrow(), values);

        let out = template.render(&mut Call::detached(Some(json!(67)))).unwrap();
        assert_eq!(out, "1 <=> 67\n2 <=> 67\n3 <=> 67\n");
    }

    #[test]
    fn test_source_is_consumed_once() {
        let template = IteratorTemplate::new(arrow(), vec![json!("a")]);
        assert!(!template.is_exhausted());

        let first = template.render(&mut Call::detached(None)).unwrap();
        assert_eq!(first, "\"a\" <=> null\n");
        assert!(template.is_exhausted());

        let second = template.render(&mut Call::detached(None)).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_binding_follows_inner() {
        let bound = IteratorTemplate::new(arrow(), Vec::new());
        assert!(bound.binds_to_context());

        let unbound = IteratorTemplate::new(TextTemplate::new("x"), Vec::new());
        assert!(!unbound.binds_to_context());
    }

    #[test]
    fn test_inner_error_stops_iteration() {
        let failing = CallbackTemplate::new(|call| match call.value() {
            Some(v) if v == &json!(2) => Err(RenderError::failed("two")),
            _ => Ok("ok;".into()),
        });
        let template = IteratorTemplate::new(failing, vec![json!(1), json!(2), json!(3)]);
        assert!(template.render(&mut Call::detached(None)).is_err());
    }
}
