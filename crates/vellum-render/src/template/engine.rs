//! MiniJinja-backed template bodies.
//!
//! Payloads of kind `jinja` carry MiniJinja source. The source is compiled once
//! into the engine's environment when the payload is materialized (a syntax
//! error makes the payload corrupt) and evaluated on every render with this
//! data:
//!
//! | name         | content                                                  |
//! |--------------|----------------------------------------------------------|
//! | `value`      | the element being iterated, if any                       |
//! | `info`       | the additional info of the render                        |
//! | `attributes` | attributes of the main template (bound renders only)     |
//! | `parameters` | render parameters (bound renders only)                   |

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use minijinja::{Environment, Value};

use super::filters::register_filters;
use super::renderable::{Call, Renderable};
use crate::error::{PayloadError, RenderError};

/// A shared MiniJinja environment holding every compiled `jinja` body.
pub struct JinjaEngine {
    env: RwLock<Environment<'static>>,
    next_id: AtomicUsize,
}

impl JinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        register_filters(&mut env);
        Self {
            env: RwLock::new(env),
            next_id: AtomicUsize::new(0),
        }
    }

    /// Returns the underlying environment for registering filters or functions.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        self.env.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compiles `source` under a fresh name derived from `reference` and
    /// returns that name.
    pub fn add_template(&self, reference: &str, source: String) -> Result<String, minijinja::Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}#{}", reference, id);
        self.write().add_template_owned(name.clone(), source)?;
        Ok(name)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.read().get_template(name).is_ok()
    }

    /// Renders a compiled template against serialized data.
    pub fn render_named(&self, name: &str, data: &serde_json::Value) -> Result<String, RenderError> {
        let env = self.read();
        let tmpl = env.get_template(name)?;
        Ok(tmpl.render(Value::from_serialize(data))?)
    }

    fn read(&self) -> RwLockReadGuard<'_, Environment<'static>> {
        self.env.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Environment<'static>> {
        self.env.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A template body compiled into a [`JinjaEngine`].
pub struct JinjaTemplate {
    engine: Arc<JinjaEngine>,
    name: String,
    source: String,
}

impl JinjaTemplate {
    /// Compiles `source` for the template at `reference`.
    pub fn compile(
        engine: Arc<JinjaEngine>,
        reference: &str,
        source: impl Into<String>,
    ) -> Result<Self, PayloadError> {
        let source = source.into();
        let name = engine.add_template(reference, source.clone())?;
        Ok(Self {
            engine,
            name,
            source,
        })
    }

    /// The name the body is compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Renderable for JinjaTemplate {
    fn render(&self, call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        let mut data = serde_json::Map::new();
        if let Some(value) = call.value() {
            data.insert("value".into(), value.clone());
        }
        if let Some(info) = call.info() {
            data.insert("info".into(), info.clone());
        }
        if let Some(ctx) = call.context_ref() {
            data.insert(
                "attributes".into(),
                serde_json::to_value(ctx.template().attributes()).unwrap_or_default(),
            );
            data.insert(
                "parameters".into(),
                serde_json::to_value(ctx.parameters()).unwrap_or_default(),
            );
        }
        self.engine
            .render_named(&self.name, &serde_json::Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> Arc<JinjaEngine> {
        Arc::new(JinjaEngine::new())
    }

    #[test]
    fn test_render_with_value_and_info() {
        let template =
            JinjaTemplate::compile(engine(), "a.tmp", "{{ value }}-{{ info.suffix }}").unwrap();
        let mut call = Call::detached(Some(json!({"suffix": "z"})));
        let out = template.render(&mut call.with_value(json!("a"))).unwrap();
        assert_eq!(out, "a-z");
    }

    #[test]
    fn test_loop_over_info() {
        let template =
            JinjaTemplate::compile(engine(), "b.tmp", "{% for item in info %}{{ item }},{% endfor %}")
                .unwrap();
        let out = template
            .render(&mut Call::detached(Some(json!(["a", "b", "c"]))))
            .unwrap();
        assert_eq!(out, "a,b,c,");
    }

    #[test]
    fn test_syntax_error_rejected_at_compile() {
        let result = JinjaTemplate::compile(engine(), "c.tmp", "{% for x in %}");
        assert!(matches!(result, Err(PayloadError::Body(_))));
    }

    #[test]
    fn test_missing_values_render_empty() {
        let template = JinjaTemplate::compile(engine(), "d.tmp", "[{{ attributes }}]").unwrap();
        let out = template.render(&mut Call::detached(None)).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_body_is_compiled_once_per_template() {
        let engine = engine();
        let first = JinjaTemplate::compile(engine.clone(), "e.tmp", "{{ info }}").unwrap();
        let second = JinjaTemplate::compile(engine.clone(), "e.tmp", "<{{ info }}>").unwrap();

        assert_ne!(first.name(), second.name());
        assert!(engine.has_template(first.name()));
        assert!(engine.has_template(second.name()));

        for _ in 0..2 {
            let out = first.render(&mut Call::detached(Some(json!("x")))).unwrap();
            assert_eq!(out, "x");
        }
        let out = second.render(&mut Call::detached(Some(json!("x")))).unwrap();
        assert_eq!(out, "<x>");
    }
}
