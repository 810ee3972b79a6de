use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::renderable::{Call, Renderable};
use crate::error::RenderError;
use crate::render::ValueDepth;

static MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\(([a-z0-9_]+)\)").expect("marker pattern compiles"));

/// Text with `$(key)` markers.
///
/// A marker is replaced by the first value found for its key in the iterated
/// value, then the additional info (both when they are objects), then the
/// render context's value lookup. Markers without a value are left as written.
#[derive(Debug, Clone)]
pub struct MarkerTemplate {
    body: String,
}

impl MarkerTemplate {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Keys of all markers in the body, in order of appearance.
    pub fn markers(&self) -> Vec<&str> {
        MARKER
            .captures_iter(&self.body)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }
}

impl Renderable for MarkerTemplate {
    fn render(&self, call: &mut Call<'_, '_>) -> Result<String, RenderError> {
        let call = &*call;
        let rendered = MARKER.replace_all(&self.body, |caps: &Captures<'_>| {
            let key = &caps[1];
            lookup(call, key)
                .map(|value| display(&value))
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(rendered.into_owned())
    }
}

fn lookup(call: &Call<'_, '_>, key: &str) -> Option<Value> {
    let from_object = |value: Option<&Value>| {
        value
            .and_then(Value::as_object)
            .and_then(|map| map.get(key))
            .cloned()
    };

    from_object(call.value())
        .or_else(|| from_object(call.info()))
        .or_else(|| {
            call.context_ref()
                .and_then(|ctx| ctx.get_value(key, ValueDepth::all()).cloned())
        })
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
