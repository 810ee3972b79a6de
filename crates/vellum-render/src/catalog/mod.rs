//! The compiled template catalog.
//!
//! A catalog is produced by an external build step and consumed here read-only.
//! It holds an ordered list of template references (the index in that list is
//! the template's *position*), three secondary indexes mapping a name, a catalog
//! group or a tag to an ordered list of positions, and one serialized
//! [`Payload`] per position.
//!
//! # Document Format
//!
//! ```json
//! {
//!   "files": ["test.tmp", "other.tmp"],
//!   "names": { "Test": [0] },
//!   "catalog": { "Web": [0, 1] },
//!   "tags": { "tag1": [0, 1] },
//!   "data": { "0": "{\"format\":1,\"kind\":\"text\"}", "1": { "format": 1, "kind": "text" } }
//! }
//! ```
//!
//! A catalog group may also map names to positions (`{"Web": {"Test": [0]}}`);
//! only the positions matter, so nested groups are flattened in document order.
//! Payloads may be given encoded as a string or inline as an object. Inline
//! objects are stored re-encoded and are not decoded until a lookup
//! materializes their position, so a bad payload only fails that lookup.
//!
//! # Example
//!
//! ```rust
//! use vellum_render::{CatalogBuilder, Payload};
//!
//! let mut builder = CatalogBuilder::new();
//! builder.add("index.html", &Payload::new("text").with_name("Index").with_tag("page"));
//! let store = builder.build().unwrap();
//!
//! assert_eq!(store.position_of("index.html"), Some(0));
//! assert_eq!(store.positions_for_tag("page"), &[0]);
//! assert!(store.positions_for_tag("missing").is_empty());
//! ```

mod payload;

pub use payload::{ExtensionRef, Payload, RawPosition, FORMAT_VERSION};

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, PayloadError};

/// The on-disk shape of a compiled catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompiledCatalog {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub names: IndexMap<String, Vec<usize>>,
    #[serde(default)]
    pub catalog: IndexMap<String, GroupIndex>,
    #[serde(default)]
    pub tags: IndexMap<String, Vec<usize>>,
    #[serde(default)]
    pub data: IndexMap<String, RawPayload>,
}

/// Positions of one catalog group, flat or keyed by template name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupIndex {
    Flat(Vec<usize>),
    Named(IndexMap<String, Vec<usize>>),
}

impl GroupIndex {
    fn flatten(self) -> Vec<usize> {
        match self {
            GroupIndex::Flat(positions) => positions,
            GroupIndex::Named(by_name) => {
                let mut out = Vec::new();
                for position in by_name.into_values().flatten() {
                    if !out.contains(&position) {
                        out.push(position);
                    }
                }
                out
            }
        }
    }
}

/// A payload slot in the document: already encoded, or an inline value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPayload {
    Encoded(String),
    Inline(Value),
}

impl RawPayload {
    fn into_encoded(self) -> String {
        match self {
            RawPayload::Encoded(raw) => raw,
            RawPayload::Inline(value) => value.to_string(),
        }
    }
}

/// Read-only store over a validated compiled catalog.
///
/// Missing keys are never errors: unknown references yield `None` and unknown
/// index keys yield an empty slice.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    files: Vec<String>,
    positions: HashMap<String, usize>,
    names: IndexMap<String, Vec<usize>>,
    groups: IndexMap<String, Vec<usize>>,
    tags: IndexMap<String, Vec<usize>>,
    payloads: Vec<Option<String>>,
}

impl CatalogStore {
    /// Builds a store from a parsed document, validating every index.
    pub fn from_compiled(compiled: CompiledCatalog) -> Result<Self, CatalogError> {
        let CompiledCatalog {
            files,
            names,
            catalog,
            tags,
            data,
        } = compiled;

        let mut positions = HashMap::with_capacity(files.len());
        for (position, reference) in files.iter().enumerate() {
            if positions.insert(reference.clone(), position).is_some() {
                return Err(CatalogError::DuplicateReference(reference.clone()));
            }
        }

        let groups: IndexMap<String, Vec<usize>> = catalog
            .into_iter()
            .map(|(group, index)| (group, index.flatten()))
            .collect();

        let len = files.len();
        check_index("name", &names, len)?;
        check_index("catalog", &groups, len)?;
        check_index("tag", &tags, len)?;

        let mut payloads = vec![None; len];
        for (key, raw) in data {
            let position: usize = key
                .trim()
                .parse()
                .map_err(|_| CatalogError::InvalidPayloadKey(key.clone()))?;
            let slot = payloads
                .get_mut(position)
                .ok_or_else(|| CatalogError::DanglingPosition {
                    index: "data",
                    key: key.clone(),
                    position,
                })?;
            *slot = Some(raw.into_encoded());
        }

        tracing::debug!(
            templates = len,
            names = names.len(),
            groups = groups.len(),
            tags = tags.len(),
            "loaded template catalog"
        );

        Ok(Self {
            files,
            positions,
            names,
            groups,
            tags,
            payloads,
        })
    }

    /// Parses and validates a JSON catalog document.
    pub fn from_json(source: &str) -> Result<Self, CatalogError> {
        Self::from_compiled(serde_json::from_str(source)?)
    }

    /// Parses and validates a YAML catalog document.
    pub fn from_yaml(source: &str) -> Result<Self, CatalogError> {
        Self::from_compiled(serde_yaml::from_str(source)?)
    }

    /// Reads a catalog file, choosing the format from its extension
    /// (`.json`, `.yaml` or `.yml`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&source),
            Some("yaml") | Some("yml") => Self::from_yaml(&source),
            other => Err(CatalogError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Converts the store back into its document form.
    pub fn to_compiled(&self) -> CompiledCatalog {
        CompiledCatalog {
            files: self.files.clone(),
            names: self.names.clone(),
            catalog: self
                .groups
                .iter()
                .map(|(group, positions)| (group.clone(), GroupIndex::Flat(positions.clone())))
                .collect(),
            tags: self.tags.clone(),
            data: self
                .payloads
                .iter()
                .enumerate()
                .filter_map(|(position, payload)| {
                    payload
                        .as_ref()
                        .map(|raw| (position.to_string(), RawPayload::Encoded(raw.clone())))
                })
                .collect(),
        }
    }

    /// Returns the position of a reference.
    pub fn position_of(&self, reference: &str) -> Option<usize> {
        self.positions.get(reference).copied()
    }

    /// Returns the reference stored at a position.
    pub fn reference_at(&self, position: usize) -> Option<&str> {
        self.files.get(position).map(String::as_str)
    }

    pub fn positions_for_name(&self, name: &str) -> &[usize] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn positions_for_catalog(&self, group: &str) -> &[usize] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn positions_for_tag(&self, tag: &str) -> &[usize] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the serialized payload at a position.
    pub fn payload_at(&self, position: usize) -> Option<&str> {
        self.payloads.get(position)?.as_deref()
    }

    /// Every known position, in catalog order.
    pub fn positions(&self) -> Range<usize> {
        0..self.files.len()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns all references in position order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn catalogs(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }
}

fn check_index(
    index: &'static str,
    entries: &IndexMap<String, Vec<usize>>,
    len: usize,
) -> Result<(), CatalogError> {
    for (key, positions) in entries {
        if let Some(&position) = positions.iter().find(|&&p| p >= len) {
            return Err(CatalogError::DanglingPosition {
                index,
                key: key.clone(),
                position,
            });
        }
    }
    Ok(())
}

/// Assembles a catalog in discovery order.
///
/// Each added payload is indexed under its own name, catalog group and tags.
/// The `index_*` methods add index entries that do not follow from a payload.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    compiled: CompiledCatalog,
    failed: Option<(String, PayloadError)>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a template and returns its position.
    ///
    /// A payload that cannot be encoded leaves the position without payload
    /// and makes [`build`](Self::build) fail.
    pub fn add(&mut self, reference: impl Into<String>, payload: &Payload) -> usize {
        let reference = reference.into();
        let position = match payload.encode() {
            Ok(raw) => self.add_raw(reference, raw),
            Err(err) => {
                self.failed.get_or_insert((reference.clone(), err));
                self.add_empty(reference)
            }
        };
        if !payload.name.is_empty() {
            self.index_name(payload.name.clone(), position);
        }
        if let Some(group) = &payload.catalog {
            self.index_catalog(group.clone(), position);
        }
        for tag in &payload.tags {
            self.index_tag(tag.clone(), position);
        }
        position
    }

    /// Appends a reference with an already-encoded payload and no index entries.
    pub fn add_raw(&mut self, reference: impl Into<String>, raw: impl Into<String>) -> usize {
        let position = self.compiled.files.len();
        self.compiled.files.push(reference.into());
        self.compiled
            .data
            .insert(position.to_string(), RawPayload::Encoded(raw.into()));
        position
    }

    /// Appends a reference that has no payload.
    pub fn add_empty(&mut self, reference: impl Into<String>) -> usize {
        self.compiled.files.push(reference.into());
        self.compiled.files.len() - 1
    }

    pub fn index_name(&mut self, name: impl Into<String>, position: usize) -> &mut Self {
        push_unique(self.compiled.names.entry(name.into()).or_default(), position);
        self
    }

    pub fn index_catalog(&mut self, group: impl Into<String>, position: usize) -> &mut Self {
        let entry = self
            .compiled
            .catalog
            .entry(group.into())
            .or_insert_with(|| GroupIndex::Flat(Vec::new()));
        if let GroupIndex::Flat(positions) = entry {
            push_unique(positions, position);
        }
        self
    }

    pub fn index_tag(&mut self, tag: impl Into<String>, position: usize) -> &mut Self {
        push_unique(self.compiled.tags.entry(tag.into()).or_default(), position);
        self
    }

    pub fn build(self) -> Result<CatalogStore, CatalogError> {
        if let Some((reference, source)) = self.failed {
            return Err(CatalogError::Payload { reference, source });
        }
        CatalogStore::from_compiled(self.compiled)
    }
}

fn push_unique(positions: &mut Vec<usize>, position: usize) {
    if !positions.contains(&position) {
        positions.push(position);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The reference catalog used across lookup tests.
    pub(crate) const FIXTURE: &str = r#"{
        "files": ["test.tmp", "other.tmp", "3rd.php", "4th.php"],
        "names": { "Test": [0, 2], "Hehe": [0, 1, 3] },
        "catalog": { "Shop": [1, 2, 3], "Web": [0, 1, 2] },
        "tags": {
            "tag1": [0, 1], "tag2": [0, 1, 2], "tag3": [2, 3, 1], "tag4": [2],
            "tag5": [1], "tag6": [3, 0], "tag7": [0, 2]
        },
        "data": {
            "0": "{\"format\":1,\"kind\":\"text\",\"name\":\"Test\",\"tags\":[\"tag1\",\"tag2\",\"tag6\",\"tag7\"],\"body\":\"zero\"}",
            "1": {"format": 1, "kind": "text", "name": "Hehe", "catalog": "Shop", "tags": ["tag1", "tag2", "tag3", "tag5"], "body": "one"},
            "2": {"format": 1, "kind": "text", "name": "Test", "catalog": "Shop", "tags": ["tag2", "tag3", "tag4", "tag7"], "body": "two"},
            "3": {"format": 1, "kind": "text", "name": "Hehe", "catalog": "Shop", "tags": ["tag3", "tag6"], "body": "three"}
        }
    }"#;

    pub(crate) fn fixture() -> CatalogStore {
        CatalogStore::from_json(FIXTURE).unwrap()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn test_position_of_every_reference() {
        let store = fixture();
        for (expected, reference) in ["test.tmp", "other.tmp", "3rd.php", "4th.php"]
            .iter()
            .enumerate()
        {
            assert_eq!(store.position_of(reference), Some(expected));
            assert_eq!(store.reference_at(expected), Some(*reference));
        }
        assert_eq!(store.position_of("nope.tmp"), None);
    }

    #[test]
    fn test_payload_is_stable() {
        let store = fixture();
        let first = store.payload_at(1).map(str::to_string);
        assert!(first.is_some());
        assert_eq!(store.payload_at(1).map(str::to_string), first);
        assert_eq!(store.payload_at(9), None);
    }

    #[test]
    fn test_inline_payload_is_encoded() {
        let store = fixture();
        let decoded = Payload::decode(store.payload_at(1).unwrap()).unwrap();
        assert_eq!(decoded.name, "Hehe");
        assert_eq!(decoded.catalog.as_deref(), Some("Shop"));
    }

    #[test]
    fn test_corrupt_inline_payload_still_loads() {
        let store = CatalogStore::from_json(
            r#"{
                "files": ["good.tmp", "bad.tmp", "odd.tmp"],
                "names": { "Good": [0], "Bad": [1] },
                "data": {
                    "0": {"format": 1, "kind": "text", "name": "Good", "body": "ok"},
                    "1": {"format": 1, "kind": "text", "class": "Admin"},
                    "2": [1, 2, 3]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(store.len(), 3);
        assert!(Payload::decode(store.payload_at(0).unwrap()).is_ok());
        assert!(matches!(
            Payload::decode(store.payload_at(1).unwrap()),
            Err(PayloadError::Malformed(_))
        ));
        assert_eq!(store.payload_at(2), Some("[1,2,3]"));
    }

    #[test]
    fn test_index_order_is_preserved() {
        let store = fixture();
        assert_eq!(store.positions_for_name("Hehe"), &[0, 1, 3]);
        assert_eq!(store.positions_for_catalog("Shop"), &[1, 2, 3]);
        assert_eq!(store.positions_for_tag("tag3"), &[2, 3, 1]);
    }

    #[test]
    fn test_unknown_keys_are_empty() {
        let store = fixture();
        assert!(store.positions_for_name("Nobody").is_empty());
        assert!(store.positions_for_catalog("Nowhere").is_empty());
        assert!(store.positions_for_tag("tag99").is_empty());
    }

    #[test]
    fn test_nested_catalog_group_is_flattened() {
        let store = CatalogStore::from_json(
            r#"{
                "files": ["a", "b", "c"],
                "catalog": { "Web": { "Index": [2, 0], "About": [0, 1] } }
            }"#,
        )
        .unwrap();
        assert_eq!(store.positions_for_catalog("Web"), &[2, 0, 1]);
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let store = CatalogStore::from_json(r#"{"files": ["a"]}"#).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.payload_at(0), None);
        assert_eq!(store.names().count(), 0);
    }

    #[test]
    fn test_yaml_catalog() {
        let store = CatalogStore::from_yaml(
            r#"
files: [a.tmp, b.tmp]
tags:
  layout: [1, 0]
data:
  "0": { format: 1, kind: text, body: A }
"#,
        )
        .unwrap();
        assert_eq!(store.positions_for_tag("layout"), &[1, 0]);
        assert!(store.payload_at(0).is_some());
        assert!(store.payload_at(1).is_none());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_dangling_index_position_rejected() {
        let err = CatalogStore::from_json(r#"{"files": ["a"], "tags": {"t": [0, 4]}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DanglingPosition {
                index: "tag",
                position: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_payload_rejected() {
        let err = CatalogStore::from_json(r#"{"files": ["a"], "data": {"3": "x"}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::DanglingPosition { index: "data", .. }));
    }

    #[test]
    fn test_bad_payload_key_rejected() {
        let err =
            CatalogStore::from_json(r#"{"files": ["a"], "data": {"first": "x"}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPayloadKey(_)));
    }

    #[test]
    fn test_duplicate_reference_rejected() {
        let err = CatalogStore::from_json(r#"{"files": ["a", "a"]}"#).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateReference(r) if r == "a"));
    }

    #[test]
    fn test_from_path_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("catalog.json");
        std::fs::write(&json, FIXTURE).unwrap();
        assert_eq!(CatalogStore::from_path(&json).unwrap().len(), 4);

        let toml = dir.path().join("catalog.toml");
        std::fs::write(&toml, "files = []").unwrap();
        assert!(matches!(
            CatalogStore::from_path(&toml),
            Err(CatalogError::UnsupportedFormat(ext)) if ext == "toml"
        ));

        assert!(matches!(
            CatalogStore::from_path(dir.path().join("missing.json")),
            Err(CatalogError::Io { .. })
        ));
    }

    // =========================================================================
    // Builder
    // =========================================================================

    #[test]
    fn test_builder_indexes_in_discovery_order() {
        let mut builder = CatalogBuilder::new();
        builder.add("a", &Payload::new("text").with_tag("x").with_catalog("Web"));
        builder.add("b", &Payload::new("text").with_name("B").with_tag("x"));
        builder.add_empty("c");
        builder.index_tag("x", 2);
        let store = builder.build().unwrap();

        assert_eq!(store.positions_for_tag("x"), &[0, 1, 2]);
        assert_eq!(store.positions_for_name("B"), &[1]);
        assert_eq!(store.positions_for_catalog("Web"), &[0]);
        assert_eq!(store.payload_at(2), None);
    }

    #[test]
    fn test_to_compiled_reloads() {
        let store = fixture();
        let json = serde_json::to_string(&store.to_compiled()).unwrap();
        let reloaded = CatalogStore::from_json(&json).unwrap();
        assert_eq!(reloaded.positions_for_tag("tag6"), &[3, 0]);
        assert_eq!(reloaded.payload_at(2), store.payload_at(2));
    }
}
