use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::Diagnostic;
use crate::lookup::Query;
use crate::template::{ContentRenderable, Template};

/// A render phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Header,
    Body,
    Footer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Header => write!(f, "header"),
            Phase::Body => write!(f, "body"),
            Phase::Footer => write!(f, "footer"),
        }
    }
}

/// Where a [`RenderInfo`] is in its render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Header,
    Body,
    Footer,
}

impl From<Phase> for RenderState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Header => RenderState::Header,
            Phase::Body => RenderState::Body,
            Phase::Footer => RenderState::Footer,
        }
    }
}

/// An entry of the named sub-template map.
#[derive(Clone)]
pub enum SubTemplate {
    /// Resolved by name through the catalog.
    Name(String),
    /// Resolved as the first template carrying any of the tags.
    Tags(Vec<String>),
    Template(Arc<Template>),
    /// A unit that renders its own content.
    Content(Arc<dyn ContentRenderable>),
    /// Produces the entry when it is looked up.
    Lazy(Arc<dyn Fn() -> SubTemplate + Send + Sync>),
}

impl SubTemplate {
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> SubTemplate + Send + Sync + 'static,
    {
        SubTemplate::Lazy(Arc::new(producer))
    }

    pub fn content<C: ContentRenderable + 'static>(content: C) -> Self {
        SubTemplate::Content(Arc::new(content))
    }
}

impl fmt::Debug for SubTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubTemplate::Name(name) => f.debug_tuple("Name").field(name).finish(),
            SubTemplate::Tags(tags) => f.debug_tuple("Tags").field(tags).finish(),
            SubTemplate::Template(t) => f.debug_tuple("Template").field(&t.reference()).finish(),
            SubTemplate::Content(_) => f.write_str("Content(..)"),
            SubTemplate::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// The response a render produces when output is captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    body: String,
}

impl Response {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Per-request state of one render.
///
/// Holds what to render (a [`Query`] for the main template), the named
/// sub-templates and parameters available to it, the additional-info stack,
/// and everything the render produced: output, captured response and
/// diagnostics. After [`Render::render`](crate::Render::render) returns, the
/// info stays available for inspection, including the partial output of a
/// failed cycle.
///
/// # Example
///
/// ```rust
/// use vellum_render::{RenderInfo, SubTemplate};
/// use serde_json::json;
///
/// let info = RenderInfo::new("Index")
///     .with_info(json!({"user": "ada"}))
///     .with_sub_template("nav", SubTemplate::Name("Navigation".into()))
///     .with_parameter("site", "example.org");
///
/// assert!(info.has_sub_template("nav"));
/// assert_eq!(info.additional_info(), Some(&json!({"user": "ada"})));
/// ```
#[derive(Debug)]
pub struct RenderInfo {
    root: Query,
    template: Option<Arc<Template>>,
    sub_templates: IndexMap<String, SubTemplate>,
    parameters: IndexMap<String, Value>,
    info_stack: Vec<Option<Value>>,
    state: RenderState,
    output: String,
    capture: Option<String>,
    response: Response,
    diagnostics: Vec<Diagnostic>,
}

impl RenderInfo {
    /// Creates an info rendering the main template found by `root`.
    pub fn new(root: impl Into<Query>) -> Self {
        Self {
            root: root.into(),
            template: None,
            sub_templates: IndexMap::new(),
            parameters: IndexMap::new(),
            info_stack: vec![None],
            state: RenderState::Idle,
            output: String::new(),
            capture: None,
            response: Response::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Sets the additional info passed to the main template.
    pub fn with_info(mut self, info: Value) -> Self {
        self.info_stack = vec![Some(info)];
        self
    }

    pub fn with_sub_template(mut self, name: impl Into<String>, entry: SubTemplate) -> Self {
        self.sub_templates.insert(name.into(), entry);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn root(&self) -> &Query {
        &self.root
    }

    /// The resolved main template, once a cycle has started.
    pub fn template(&self) -> Option<&Arc<Template>> {
        self.template.as_ref()
    }

    pub(crate) fn set_template(&mut self, template: Arc<Template>) {
        self.template = Some(template);
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RenderState) {
        self.state = state;
    }

    // =========================================================================
    // Sub-templates and parameters
    // =========================================================================

    pub fn sub_templates(&self) -> &IndexMap<String, SubTemplate> {
        &self.sub_templates
    }

    pub fn sub_template(&self, name: &str) -> Option<&SubTemplate> {
        self.sub_templates.get(name)
    }

    pub fn has_sub_template(&self, name: &str) -> bool {
        self.sub_templates.contains_key(name)
    }

    pub fn set_sub_template(&mut self, name: impl Into<String>, entry: SubTemplate) {
        self.sub_templates.insert(name.into(), entry);
    }

    pub fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    // =========================================================================
    // Additional info
    // =========================================================================

    /// The additional info of the innermost render.
    pub fn additional_info(&self) -> Option<&Value> {
        self.info_stack.last().and_then(Option::as_ref)
    }

    pub(crate) fn push_info(&mut self, info: Option<Value>) {
        self.info_stack.push(info);
    }

    pub(crate) fn pop_info(&mut self) {
        if self.info_stack.len() > 1 {
            self.info_stack.pop();
        }
    }

    pub(crate) fn info_depth(&self) -> usize {
        self.info_stack.len() - 1
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Appends rendered text to the capture buffer when capturing, otherwise
    /// to the output stream.
    pub fn write(&mut self, text: &str) {
        match &mut self.capture {
            Some(buffer) => buffer.push_str(text),
            None => self.output.push_str(text),
        }
    }

    /// Text written while not capturing.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Starts capturing output into a fresh buffer, discarding any unfinished capture.
    pub fn start_capture(&mut self) {
        self.capture = Some(String::new());
    }

    /// Stops capturing and returns the captured text.
    pub fn finish_capture(&mut self) -> Option<String> {
        self.capture.take()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Text captured so far by an unfinished capture.
    pub fn captured(&self) -> Option<&str> {
        self.capture.as_deref()
    }

    /// Everything rendered so far: the output stream followed by any pending capture.
    pub fn rendered(&self) -> String {
        let mut all = self.output.clone();
        if let Some(captured) = &self.capture {
            all.push_str(captured);
        }
        all
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Logs a non-fatal condition and records it.
    pub fn warn(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(%diagnostic, "render diagnostic");
        self.diagnostics.push(diagnostic);
    }
}
