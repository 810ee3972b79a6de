//! Serialized template payloads.
//!
//! Every catalog position carries one payload: a versioned JSON object that
//! describes the template at that position and names the renderable kind that
//! reconstructs it.
//!
//! ```json
//! {
//!   "format": 1,
//!   "kind": "marker",
//!   "name": "Test",
//!   "catalog": "Web",
//!   "tags": ["tag1", "tag2"],
//!   "attributes": { "title": "Welcome" },
//!   "body": "<h1>$(title)</h1>"
//! }
//! ```
//!
//! Decoding is strict. Unknown fields are rejected and so is any field that
//! appears twice, so a payload cannot smuggle in a second identity.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PayloadError;

/// The payload format this crate reads and writes.
pub const FORMAT_VERSION: u32 = 1;

/// A decoded template payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    /// Payload format version, must equal [`FORMAT_VERSION`].
    pub format: u32,

    /// Renderable kind, looked up in the [`KindRegistry`](crate::KindRegistry).
    pub kind: String,

    /// Template id. Defaults to the catalog reference when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,

    /// Kind-specific source text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Position of this template when it is used as an extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<RawPosition>,

    /// Extensions that must resolve for this template to render.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<ExtensionRef>,

    /// Extensions that are used when they resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional: Vec<ExtensionRef>,

    /// Whether the renderable receives the render context.
    #[serde(default = "default_bind_context")]
    pub bind_context: bool,
}

fn default_bind_context() -> bool {
    true
}

impl Payload {
    /// Creates a payload of the given kind with every other field empty.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            format: FORMAT_VERSION,
            kind: kind.into(),
            id: None,
            name: String::new(),
            catalog: None,
            tags: Vec::new(),
            attributes: IndexMap::new(),
            body: None,
            extension: None,
            requires: Vec::new(),
            optional: Vec::new(),
            bind_context: true,
        }
    }

    /// Decodes a payload and checks its format version.
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let payload: Payload = serde_json::from_str(raw)?;
        if payload.format != FORMAT_VERSION {
            return Err(PayloadError::UnsupportedFormat {
                found: payload.format,
                expected: FORMAT_VERSION,
            });
        }
        Ok(payload)
    }

    /// Encodes the payload to its compact string form.
    pub fn encode(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_extension(mut self, position: impl Into<RawPosition>) -> Self {
        self.extension = Some(position.into());
        self
    }

    pub fn requiring(mut self, extension: impl Into<ExtensionRef>) -> Self {
        self.requires.push(extension.into());
        self
    }

    pub fn optionally(mut self, extension: impl Into<ExtensionRef>) -> Self {
        self.optional.push(extension.into());
        self
    }
}

/// An extension position as written in a payload: a numeric code or a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPosition {
    Code(i64),
    Name(String),
}

impl From<i64> for RawPosition {
    fn from(code: i64) -> Self {
        RawPosition::Code(code)
    }
}

impl From<&str> for RawPosition {
    fn from(name: &str) -> Self {
        RawPosition::Name(name.to_string())
    }
}

/// A reference to an extension by identifier, optionally under a reuse id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionRef {
    /// Template name or catalog reference to resolve.
    pub identifier: String,

    /// Key under which the resolved extension is registered.
    /// Defaults to the identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse: Option<String>,
}

impl ExtensionRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            reuse: None,
        }
    }

    pub fn with_reuse(mut self, reuse: impl Into<String>) -> Self {
        self.reuse = Some(reuse.into());
        self
    }

    /// Returns the key this extension is bucketed under.
    pub fn reuse_key(&self) -> &str {
        self.reuse.as_deref().unwrap_or(&self.identifier)
    }
}

impl From<&str> for ExtensionRef {
    fn from(identifier: &str) -> Self {
        ExtensionRef::new(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal() {
        let payload = Payload::decode(r#"{"format": 1, "kind": "text"}"#).unwrap();
        assert_eq!(payload.kind, "text");
        assert!(payload.name.is_empty());
        assert!(payload.bind_context);
    }

    #[test]
    fn test_decode_rejects_duplicate_identity() {
        let raw = r#"{"format": 1, "kind": "text", "name": "Test", "name": "Other"}"#;
        let err = Payload::decode(raw).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed(_)));
        assert!(err.to_string().contains("duplicate field"), "{}", err);
    }

    #[test]
    fn test_decode_rejects_unknown_field() {
        let raw = r#"{"format": 1, "kind": "text", "class": "Admin"}"#;
        assert!(matches!(Payload::decode(raw), Err(PayloadError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_other_version() {
        let err = Payload::decode(r#"{"format": 2, "kind": "text"}"#).unwrap_err();
        assert!(matches!(
            err,
            PayloadError::UnsupportedFormat {
                found: 2,
                expected: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn test_extension_position_forms() {
        let by_code = Payload::decode(r#"{"format":1,"kind":"text","extension":-1}"#).unwrap();
        assert_eq!(by_code.extension, Some(RawPosition::Code(-1)));

        let by_name =
            Payload::decode(r#"{"format":1,"kind":"text","extension":"footer"}"#).unwrap();
        assert_eq!(by_name.extension, Some(RawPosition::Name("footer".into())));
    }

    #[test]
    fn test_encode_keeps_attribute_order() {
        let payload = Payload::new("marker")
            .with_name("Test")
            .with_attribute("zeta", 1)
            .with_attribute("alpha", 2);
        let encoded = payload.encode().unwrap();
        assert!(encoded.find("zeta").unwrap() < encoded.find("alpha").unwrap());
        assert_eq!(Payload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_reuse_key_defaults_to_identifier() {
        assert_eq!(ExtensionRef::new("nav").reuse_key(), "nav");
        assert_eq!(ExtensionRef::new("nav").with_reuse("menu").reuse_key(), "menu");
    }
}
