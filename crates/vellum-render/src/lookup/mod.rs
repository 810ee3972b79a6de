//! Organized template lookup.
//!
//! [`TemplateLookup`] answers name, catalog group and tag queries against a
//! [`CatalogStore`], materializing only the templates that end up in a result.
//! Results are [`Templates`]: ordered maps from catalog reference to template.
//!
//! # Ordering
//!
//! - By name or catalog group: index order.
//! - By tags, match-any: first-seen union across the tags, in the given order.
//! - By tags, match-all: the first tag's index order, restricted to positions
//!   carrying every tag. An empty tag list matches every template.
//!
//! Unknown names, groups and tags yield empty results. The only error a lookup
//! returns is a corrupt payload at a position it had to materialize.
//!
//! # Example
//!
//! ```rust
//! use vellum_render::{CatalogBuilder, Payload, TemplateLookup};
//!
//! let mut builder = CatalogBuilder::new();
//! builder.add("a.tmp", &Payload::new("text").with_tag("x"));
//! builder.add("b.tmp", &Payload::new("text").with_tag("x").with_tag("y"));
//! let lookup = TemplateLookup::new(builder.build().unwrap());
//!
//! let found = lookup.find_by_tags(&["x", "y"], true).unwrap();
//! assert_eq!(found.keys().collect::<Vec<_>>(), vec!["b.tmp"]);
//! ```

mod materializer;
mod query;
mod selection;

pub use materializer::Materializer;
pub use query::{Query, QuerySpec, SpecItem};
pub use selection::TagSelection;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::CatalogStore;
use crate::error::LookupError;
use crate::template::{KindRegistry, Template};

/// Lookup results keyed by catalog reference.
pub type Templates = IndexMap<String, Arc<Template>>;

/// Query engine over a catalog.
pub struct TemplateLookup {
    materializer: Materializer,
}

impl TemplateLookup {
    /// Creates a lookup with the built-in payload kinds.
    pub fn new(store: CatalogStore) -> Self {
        Self::with_kinds(store, KindRegistry::new())
    }

    pub fn with_kinds(store: CatalogStore, kinds: KindRegistry) -> Self {
        Self {
            materializer: Materializer::new(Arc::new(store), Arc::new(kinds)),
        }
    }

    pub fn store(&self) -> &CatalogStore {
        self.materializer.store()
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    // =========================================================================
    // By id
    // =========================================================================

    /// The template at a catalog reference.
    pub fn template(&self, reference: &str) -> Result<Option<Arc<Template>>, LookupError> {
        match self.store().position_of(reference) {
            Some(position) => self.materializer.materialize(position),
            None => Ok(None),
        }
    }

    /// The template at a position.
    pub fn template_at(&self, position: usize) -> Result<Option<Arc<Template>>, LookupError> {
        self.materializer.materialize(position)
    }

    // =========================================================================
    // Multi-result queries
    // =========================================================================

    pub fn find_by_name(&self, name: &str) -> Result<Templates, LookupError> {
        self.collect(self.store().positions_for_name(name).iter().copied())
    }

    pub fn find_in_catalog(&self, group: &str) -> Result<Templates, LookupError> {
        self.collect(self.store().positions_for_catalog(group).iter().copied())
    }

    pub fn find_by_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
        match_all: bool,
    ) -> Result<Templates, LookupError> {
        self.collect(TagSelection::new(self.store(), tags, match_all))
    }

    // =========================================================================
    // Single-result queries
    // =========================================================================

    pub fn find_first_by_name(&self, name: &str) -> Result<Option<Arc<Template>>, LookupError> {
        self.first(self.store().positions_for_name(name).iter().copied())
    }

    pub fn find_first_in_catalog(&self, group: &str) -> Result<Option<Arc<Template>>, LookupError> {
        self.first(self.store().positions_for_catalog(group).iter().copied())
    }

    /// The first template carrying any of `tags`.
    pub fn find_first_by_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
    ) -> Result<Option<Arc<Template>>, LookupError> {
        self.first(TagSelection::any(self.store(), tags))
    }

    // =========================================================================
    // Generic dispatch
    // =========================================================================

    /// Runs any query.
    pub fn find(&self, query: &Query) -> Result<Templates, LookupError> {
        match query {
            Query::Id(reference) => Ok(single(self.template(reference)?)),
            Query::Name(name) => {
                let found = self.find_by_name(name)?;
                if found.is_empty() {
                    Ok(single(self.template(name)?))
                } else {
                    Ok(found)
                }
            }
            Query::Catalog(group) => self.find_in_catalog(group),
            Query::Tags { tags, match_all } => self.find_by_tags(tags.as_slice(), *match_all),
            Query::Template(template) => Ok(single(Some(template.clone()))),
            Query::Spec(spec) => self.find_spec(spec),
        }
    }

    /// Runs a query and returns its first result.
    pub fn find_first(&self, query: &Query) -> Result<Option<Arc<Template>>, LookupError> {
        match query {
            Query::Id(reference) => self.template(reference),
            Query::Name(name) => match self.find_first_by_name(name)? {
                Some(found) => Ok(Some(found)),
                None => self.template(name),
            },
            Query::Catalog(group) => self.find_first_in_catalog(group),
            Query::Tags { tags, match_all } => {
                self.first(TagSelection::new(self.store(), tags.as_slice(), *match_all))
            }
            Query::Template(template) => Ok(Some(template.clone())),
            Query::Spec(spec) => Ok(self.find_spec(spec)?.into_values().next()),
        }
    }

    /// Evaluates a spec as a progressive filter.
    pub fn find_spec(&self, spec: &QuerySpec) -> Result<Templates, LookupError> {
        let mut running: Option<Templates> = None;

        if let Some(group) = spec.catalog() {
            running = Some(self.find_in_catalog(group)?);
        }

        if !spec.tags().is_empty() {
            running = Some(match running {
                Some(mut set) => {
                    set.retain(|_, template| spec.matches_tags(template));
                    set
                }
                None => self.find_by_tags(spec.tags(), spec.is_match_all())?,
            });
        }

        if let Some(name) = spec.name() {
            running = Some(match running {
                Some(mut set) => {
                    set.retain(|_, template| template.name() == name);
                    set
                }
                None => self.find_by_name(name)?,
            });
        }

        let mut result = match (running, spec.id()) {
            (Some(set), _) => set,
            (None, Some(reference)) => single(self.template(reference)?),
            (None, None) => Templates::new(),
        };

        for template in spec.templates() {
            result
                .entry(template.reference().to_string())
                .or_insert_with(|| template.clone());
        }

        Ok(result)
    }

    fn collect(&self, positions: impl Iterator<Item = usize>) -> Result<Templates, LookupError> {
        let mut out = Templates::new();
        for position in positions {
            if let Some(template) = self.materializer.materialize(position)? {
                out.insert(template.reference().to_string(), template);
            }
        }
        Ok(out)
    }

    fn first(
        &self,
        positions: impl Iterator<Item = usize>,
    ) -> Result<Option<Arc<Template>>, LookupError> {
        for position in positions {
            if let Some(template) = self.materializer.materialize(position)? {
                return Ok(Some(template));
            }
        }
        Ok(None)
    }
}

fn single(template: Option<Arc<Template>>) -> Templates {
    template
        .map(|t| (t.reference().to_string(), t))
        .into_iter()
        .collect()
}
