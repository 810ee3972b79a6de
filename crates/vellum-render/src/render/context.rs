//! The render context handed to bound renderables.
//!
//! A [`RenderContext`] is the explicit capability a renderable receives while a
//! render cycle runs. Through it a template can:
//!
//! - look up values across sub-template attributes, the main template's
//!   attributes and the render parameters ([`RenderContext::get_value`]),
//! - query the catalog ([`RenderContext::find_templates`]),
//! - render further sub-templates ([`RenderContext::render_sub_template`]),
//! - encode strings for output ([`RenderContext::encode`]).
//!
//! The context lives only for one cycle and borrows that cycle's
//! [`RenderInfo`]; nothing about it is global.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use serde_json::Value;

use super::dispatch::Render;
use super::encode::Encoding;
use super::info::{RenderInfo, SubTemplate};
use crate::error::RenderError;
use crate::lookup::{Query, QuerySpec, TemplateLookup, Templates};
use crate::template::{ContentRenderable, Template};

bitflags! {
    /// Which sources [`RenderContext::get_value`] searches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ValueDepth: u8 {
        /// Attributes of the main template.
        const TEMPLATE = 1;
        /// Attributes of templates in the sub-template map.
        const SUB_TEMPLATES = 2;
        /// Render parameters.
        const PARAMETERS = 4;
    }
}

impl Default for ValueDepth {
    fn default() -> Self {
        ValueDepth::all()
    }
}

/// A sub-template reference as passed by a renderable.
#[derive(Clone)]
pub enum SubTemplateRef {
    /// A key of the sub-template map, or else a template name.
    Name(String),
    /// The first template carrying any of the tags.
    Tags(Vec<String>),
    Template(Arc<Template>),
    Content(Arc<dyn ContentRenderable>),
}

impl From<&str> for SubTemplateRef {
    fn from(name: &str) -> Self {
        SubTemplateRef::Name(name.to_string())
    }
}

impl From<String> for SubTemplateRef {
    fn from(name: String) -> Self {
        SubTemplateRef::Name(name)
    }
}

impl From<Vec<String>> for SubTemplateRef {
    fn from(tags: Vec<String>) -> Self {
        SubTemplateRef::Tags(tags)
    }
}

impl From<&[&str]> for SubTemplateRef {
    fn from(tags: &[&str]) -> Self {
        SubTemplateRef::Tags(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Arc<Template>> for SubTemplateRef {
    fn from(template: Arc<Template>) -> Self {
        SubTemplateRef::Template(template)
    }
}

impl fmt::Display for SubTemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubTemplateRef::Name(name) => write!(f, "{}", name),
            SubTemplateRef::Tags(tags) => write!(f, "[{}]", tags.join(", ")),
            SubTemplateRef::Template(t) => write!(f, "{}", t.reference()),
            SubTemplateRef::Content(_) => write!(f, "<content>"),
        }
    }
}

enum Resolved {
    Template(Arc<Template>),
    Content(Arc<dyn ContentRenderable>),
}

/// Capabilities of a renderable during one render cycle.
pub struct RenderContext<'r> {
    render: &'r Render,
    info: &'r mut RenderInfo,
    template: Arc<Template>,
}

impl<'r> RenderContext<'r> {
    pub(crate) fn new(render: &'r Render, info: &'r mut RenderInfo, template: Arc<Template>) -> Self {
        Self {
            render,
            info,
            template,
        }
    }

    pub fn render(&self) -> &Render {
        self.render
    }

    pub fn lookup(&self) -> &TemplateLookup {
        self.render.lookup()
    }

    pub fn info(&self) -> &RenderInfo {
        self.info
    }

    pub fn info_mut(&mut self) -> &mut RenderInfo {
        self.info
    }

    /// The main template of the cycle.
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Render parameters: configured parameters overridden by the info's own.
    pub fn parameters(&self) -> IndexMap<String, Value> {
        let mut merged = self.render.config().parameters.clone();
        for (key, value) in self.info.parameters() {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// The additional info of the innermost render.
    pub fn additional_info(&self) -> Option<&Value> {
        self.info.additional_info()
    }

    pub fn has_sub_template(&self, name: &str) -> bool {
        self.info.has_sub_template(name)
    }

    /// Looks up `key`, searching sub-template attributes, then the main
    /// template's attributes, then parameters, restricted to `depth`.
    ///
    /// Empty values (`null`, `false`, `0`, `""`, empty arrays and objects)
    /// count as absent and the search continues.
    pub fn get_value(&self, key: &str, depth: ValueDepth) -> Option<&Value> {
        if depth.contains(ValueDepth::SUB_TEMPLATES) {
            for entry in self.info.sub_templates().values() {
                if let SubTemplate::Template(template) = entry {
                    if let Some(value) = template.attribute(key).filter(|v| is_present(v)) {
                        return Some(value);
                    }
                }
            }
        }

        if depth.contains(ValueDepth::TEMPLATE) {
            if let Some(value) = self.template.attribute(key).filter(|v| is_present(v)) {
                return Some(value);
            }
        }

        if depth.contains(ValueDepth::PARAMETERS) {
            let value = self
                .info
                .parameters()
                .get(key)
                .filter(|v| is_present(v))
                .or_else(|| {
                    self.render
                        .config()
                        .parameters
                        .get(key)
                        .filter(|v| is_present(v))
                });
            if value.is_some() {
                return value;
            }
        }

        None
    }

    /// [`get_value`](Self::get_value) with a fallback.
    pub fn get_value_or(&self, key: &str, default: Value, depth: ValueDepth) -> Value {
        self.get_value(key, depth).cloned().unwrap_or(default)
    }

    /// Runs a query spec against the catalog.
    pub fn find_templates(&self, spec: &QuerySpec) -> Result<Templates, RenderError> {
        Ok(self.lookup().find_spec(spec)?)
    }

    pub fn encode(&self, text: &str, encoding: Encoding) -> String {
        encoding.apply(text)
    }

    /// Resolves and renders a sub-template, returning its output.
    ///
    /// A name is first looked up in the sub-template map; an entry that is
    /// itself a name or tag set is resolved one level further through the
    /// catalog. Names not in the map resolve through the catalog by name.
    /// Tag sets resolve to the first template carrying any of the tags.
    ///
    /// `info` becomes the additional info for the duration of the sub-render
    /// and the caller's value is restored afterwards, also on error.
    pub fn render_sub_template(
        &mut self,
        reference: impl Into<SubTemplateRef>,
        info: Option<Value>,
    ) -> Result<String, RenderError> {
        let reference = reference.into();
        let resolved = self
            .resolve(&reference)?
            .ok_or_else(|| RenderError::SubTemplateNotFound(reference.to_string()))?;

        let max_depth = self.render.config().max_depth;
        if self.info.info_depth() >= max_depth {
            return Err(RenderError::NestingTooDeep(max_depth));
        }

        tracing::trace!(reference = %reference, "rendering sub-template");
        let render = self.render;
        self.info.push_info(info.clone());
        let result = match resolved {
            Resolved::Template(template) => render.render_template(self, &template),
            Resolved::Content(content) => content.render_contents(self, info),
        };
        self.info.pop_info();
        result
    }

    fn resolve(&self, reference: &SubTemplateRef) -> Result<Option<Resolved>, RenderError> {
        let lookup = self.lookup();
        let found = match reference {
            SubTemplateRef::Template(template) => Some(Resolved::Template(template.clone())),
            SubTemplateRef::Content(content) => Some(Resolved::Content(content.clone())),
            SubTemplateRef::Tags(tags) => lookup
                .find_first_by_tags(tags.as_slice())?
                .map(Resolved::Template),
            SubTemplateRef::Name(name) => match self.info.sub_template(name) {
                Some(entry) => self.resolve_entry(entry)?,
                None => lookup
                    .find_first(&Query::Name(name.clone()))?
                    .map(Resolved::Template),
            },
        };
        Ok(found)
    }

    fn resolve_entry(&self, entry: &SubTemplate) -> Result<Option<Resolved>, RenderError> {
        let produced;
        let entry = match entry {
            SubTemplate::Lazy(producer) => {
                produced = producer();
                &produced
            }
            other => other,
        };

        let lookup = self.lookup();
        let found = match entry {
            SubTemplate::Template(template) => Some(Resolved::Template(template.clone())),
            SubTemplate::Content(content) => Some(Resolved::Content(content.clone())),
            SubTemplate::Name(name) => lookup
                .find_first(&Query::Name(name.clone()))?
                .map(Resolved::Template),
            SubTemplate::Tags(tags) => lookup
                .find_first_by_tags(tags.as_slice())?
                .map(Resolved::Template),
            SubTemplate::Lazy(_) => None,
        };
        Ok(found)
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
