//! Query descriptors for template lookup.
//!
//! A [`Query`] names one way of finding templates. A [`QuerySpec`] combines
//! several criteria into a progressive filter: the catalog group selects a
//! starting set, tags narrow it, and an exact name narrows it further. An id is
//! only used when none of those three criteria is present.
//!
//! Specs can be assembled from typed [`SpecItem`]s or parsed from text items:
//!
//! ```rust
//! use vellum_render::QuerySpec;
//!
//! let spec = QuerySpec::parse(["catalog:Shop", "tag:tag3", "+any", "size:big"]);
//! assert_eq!(spec.catalog(), Some("Shop"));
//! assert_eq!(spec.tags(), &["tag3".to_string()]);
//! assert!(!spec.is_match_all());
//! assert_eq!(spec.diagnostics().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::Diagnostic;
use crate::template::Template;

/// One way of finding templates.
#[derive(Debug, Clone)]
pub enum Query {
    /// By catalog reference.
    Id(String),
    /// By name, falling back to a reference when no template has that name.
    Name(String),
    /// By catalog group.
    Catalog(String),
    /// By tags, intersected when `match_all` is set and united otherwise.
    Tags { tags: Vec<String>, match_all: bool },
    /// An already resolved template.
    Template(Arc<Template>),
    /// A combination of criteria.
    Spec(QuerySpec),
}

impl Query {
    pub fn tags<S: Into<String>>(tags: impl IntoIterator<Item = S>, match_all: bool) -> Self {
        Query::Tags {
            tags: tags.into_iter().map(Into::into).collect(),
            match_all,
        }
    }
}

impl From<&str> for Query {
    fn from(name: &str) -> Self {
        Query::Name(name.to_string())
    }
}

impl From<String> for Query {
    fn from(name: String) -> Self {
        Query::Name(name)
    }
}

impl From<Arc<Template>> for Query {
    fn from(template: Arc<Template>) -> Self {
        Query::Template(template)
    }
}

impl From<QuerySpec> for Query {
    fn from(spec: QuerySpec) -> Self {
        Query::Spec(spec)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Id(id) => write!(f, "id `{}`", id),
            Query::Name(name) => write!(f, "name `{}`", name),
            Query::Catalog(group) => write!(f, "catalog `{}`", group),
            Query::Tags { tags, match_all } => write!(
                f,
                "{} of tags [{}]",
                if *match_all { "all" } else { "any" },
                tags.join(", ")
            ),
            Query::Template(template) => write!(f, "template `{}`", template.reference()),
            Query::Spec(spec) => write!(f, "{}", spec),
        }
    }
}

/// A typed query item.
#[derive(Debug, Clone)]
pub enum SpecItem {
    Id(String),
    Name(String),
    Catalog(String),
    Tag(String),
    /// Templates must carry every tag.
    MatchAll,
    /// Templates must carry at least one tag.
    MatchAny,
    /// A template added to the result as-is.
    Template(Arc<Template>),
    /// Another spec merged into this one.
    Spec(QuerySpec),
}

/// A combination of lookup criteria.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    id: Option<String>,
    name: Option<String>,
    catalog: Option<String>,
    tags: Vec<String>,
    match_all: bool,
    templates: Vec<Arc<Template>>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            catalog: None,
            tags: Vec::new(),
            match_all: true,
            templates: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

impl QuerySpec {
    /// An empty spec. Tags match all by default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a spec from text items.
    ///
    /// Recognized items are `id:<ref>`, `name:<name>`, `catalog:<group>`,
    /// `tag:<tag>` (or `tags:<a>,<b>`), `+all` and `+any`. Anything else is
    /// ignored and recorded as a diagnostic.
    pub fn parse<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = Self::new();
        for item in items {
            spec.push_text(item.as_ref());
        }
        spec
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.add_tag(tag.into());
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        for tag in tags {
            self.add_tag(tag.into());
        }
        self
    }

    pub fn match_all(mut self, match_all: bool) -> Self {
        self.match_all = match_all;
        self
    }

    pub fn with_template(mut self, template: Arc<Template>) -> Self {
        self.add_template(template);
        self
    }

    /// Applies a typed item.
    pub fn push(&mut self, item: SpecItem) -> &mut Self {
        match item {
            SpecItem::Id(id) => self.id = Some(id),
            SpecItem::Name(name) => self.name = Some(name),
            SpecItem::Catalog(catalog) => self.catalog = Some(catalog),
            SpecItem::Tag(tag) => self.add_tag(tag),
            SpecItem::MatchAll => self.match_all = true,
            SpecItem::MatchAny => self.match_all = false,
            SpecItem::Template(template) => self.add_template(template),
            SpecItem::Spec(other) => self.merge(other),
        }
        self
    }

    /// Applies a text item, recording a diagnostic when it is not understood.
    pub fn push_text(&mut self, item: &str) -> &mut Self {
        let item = item.trim();
        let parsed = match item.split_once(':') {
            Some(("id", value)) if !value.is_empty() => Some(SpecItem::Id(value.to_string())),
            Some(("name", value)) if !value.is_empty() => Some(SpecItem::Name(value.to_string())),
            Some(("catalog", value)) if !value.is_empty() => {
                Some(SpecItem::Catalog(value.to_string()))
            }
            Some(("tag", value)) if !value.is_empty() => Some(SpecItem::Tag(value.to_string())),
            Some(("tags", value)) => {
                for tag in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    self.add_tag(tag.to_string());
                }
                return self;
            }
            None if item == "+all" => Some(SpecItem::MatchAll),
            None if item == "+any" => Some(SpecItem::MatchAny),
            _ => None,
        };

        match parsed {
            Some(item) => self.push(item),
            None => {
                tracing::warn!(item, "unsupported query item ignored");
                self.diagnostics
                    .push(Diagnostic::UnsupportedQueryItem(item.to_string()));
                self
            }
        }
    }

    /// Merges another spec: set criteria of `other` replace ours, tags and
    /// templates are added without duplicates.
    pub fn merge(&mut self, other: QuerySpec) {
        let QuerySpec {
            id,
            name,
            catalog,
            tags,
            match_all,
            templates,
            diagnostics,
        } = other;

        if id.is_some() {
            self.id = id;
        }
        if name.is_some() {
            self.name = name;
        }
        if catalog.is_some() {
            self.catalog = catalog;
        }
        if !tags.is_empty() {
            self.match_all = match_all;
        }
        for tag in tags {
            self.add_tag(tag);
        }
        for template in templates {
            self.add_template(template);
        }
        self.diagnostics.extend(diagnostics);
    }

    fn add_tag(&mut self, tag: String) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    fn add_template(&mut self, template: Arc<Template>) {
        if !self.templates.iter().any(|t| Arc::ptr_eq(t, &template)) {
            self.templates.push(template);
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn is_match_all(&self) -> bool {
        self.match_all
    }

    pub fn templates(&self) -> &[Arc<Template>] {
        &self.templates
    }

    /// Items that were ignored while building this spec.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True when a catalog, tag or name criterion is set. An id alone is not a filter.
    pub fn has_filters(&self) -> bool {
        self.catalog.is_some() || !self.tags.is_empty() || self.name.is_some()
    }

    /// Whether `template` satisfies the tag criterion.
    pub(crate) fn matches_tags(&self, template: &Template) -> bool {
        if self.match_all {
            self.tags.iter().all(|tag| template.has_tag(tag))
        } else {
            self.tags.iter().any(|tag| template.has_tag(tag))
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(catalog) = &self.catalog {
            parts.push(format!("catalog:{}", catalog));
        }
        if !self.tags.is_empty() {
            parts.push(format!("tags:{}", self.tags.join(",")));
            parts.push(if self.match_all { "+all" } else { "+any" }.to_string());
        }
        if let Some(name) = &self.name {
            parts.push(format!("name:{}", name));
        }
        if let Some(id) = &self.id {
            parts.push(format!("id:{}", id));
        }
        for template in &self.templates {
            parts.push(format!("template:{}", template.reference()));
        }
        write!(f, "[{}]", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{TemplateBuilder, TextTemplate};

    #[test]
    fn test_parse_items() {
        let spec = QuerySpec::parse(["id:a.tmp", "name:Test", "catalog:Web", "tags:x, y", "tag:x"]);
        assert_eq!(spec.id(), Some("a.tmp"));
        assert_eq!(spec.name(), Some("Test"));
        assert_eq!(spec.catalog(), Some("Web"));
        assert_eq!(spec.tags(), &["x".to_string(), "y".to_string()]);
        assert!(spec.is_match_all());
        assert!(spec.diagnostics().is_empty());
    }

    #[test]
    fn test_has_filters_ignores_id() {
        assert!(!QuerySpec::new().has_filters());
        assert!(!QuerySpec::new().with_id("a.tmp").has_filters());
        assert!(QuerySpec::new().with_catalog("Web").has_filters());
        assert!(QuerySpec::new().with_tag("x").has_filters());
        assert!(QuerySpec::new().with_name("Test").has_filters());
    }

    #[test]
    fn test_unsupported_items_are_recorded() {
        let spec = QuerySpec::parse(["name:", "color:red", "+some", "tag:ok"]);
        assert_eq!(spec.tags(), &["ok".to_string()]);
        assert_eq!(
            spec.diagnostics(),
            &[
                Diagnostic::UnsupportedQueryItem("name:".into()),
                Diagnostic::UnsupportedQueryItem("color:red".into()),
                Diagnostic::UnsupportedQueryItem("+some".into()),
            ]
        );
    }

    #[test]
    fn test_templates_are_not_duplicated() {
        let template = TemplateBuilder::new("a", TextTemplate::new("a")).build();
        let mut spec = QuerySpec::new().with_template(template.clone());
        spec.push(SpecItem::Template(template));
        assert_eq!(spec.templates().len(), 1);
    }

    #[test]
    fn test_merge_combines_criteria() {
        let mut spec = QuerySpec::new().with_catalog("Web").with_tag("a");
        spec.merge(QuerySpec::new().with_tag("b").with_tag("a").match_all(false));
        assert_eq!(spec.catalog(), Some("Web"));
        assert_eq!(spec.tags(), &["a".to_string(), "b".to_string()]);
        assert!(!spec.is_match_all());
    }

    #[test]
    fn test_display() {
        let spec = QuerySpec::parse(["tag:a", "+any", "name:N"]);
        assert_eq!(spec.to_string(), "[tags:a +any name:N]");
        assert_eq!(Query::tags(["a", "b"], true).to_string(), "all of tags [a, b]");
    }
}
