// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! [Record] is the structured, named, nested form that deltas, revisions,
//! resources, and settings take on disk and over the wire.

use serde::{Deserialize, Serialize};

/// A named node with string attributes and child nodes.
///
/// Attribute order is preserved so that a serialized [Record] is stable
/// byte-for-byte across round trips.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Record {
    tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    attributes: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Record>,
}
impl Record {
    /// Creates an empty [Record] with the given tag.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    /// The record's tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this record's tag is `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Sets (or replaces) an attribute.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value;
        } else {
            self.attributes.push((name.to_string(), value));
        }
    }

    /// Builder-style variant of [Record::set_attribute()].
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Returns the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the named attribute, or `default` if it's missing.
    pub fn attribute_or(&self, name: &str, default: &str) -> String {
        self.attribute(name).unwrap_or(default).to_string()
    }

    /// Appends a child record.
    pub fn add_child(&mut self, child: Record) {
        self.children.push(child);
    }

    /// Builder-style variant of [Record::add_child()].
    pub fn with_child(mut self, child: Record) -> Self {
        self.add_child(child);
        self
    }

    /// All children, in insertion order.
    pub fn children(&self) -> &[Record] {
        &self.children
    }

    /// The first child with the given tag.
    pub fn child_named(&self, tag: &str) -> Option<&Record> {
        self.children.iter().find(|c| c.has_tag(tag))
    }

    /// Every child with the given tag, in order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.children.iter().filter(move |c| c.has_tag(tag))
    }

    /// Returns `self` if it has the given tag, otherwise its first child with
    /// that tag. Readers use this to accept either a node or its parent.
    pub fn self_or_child(&self, tag: &str) -> Option<&Record> {
        if self.has_tag(tag) {
            Some(self)
        } else {
            self.child_named(tag)
        }
    }

    /// Encodes as pretty-printed JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::format_err!("Unable to serialize <{}> record: {}", self.tag, e))
    }

    /// Decodes from JSON.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow::format_err!("Couldn't parse record: {}", e))
    }
}

/// Something that can be written to and read from a [Record].
///
/// [RecordSerializable::deserialize()] is total: a missing or malformed field
/// falls back to a documented default rather than failing.
pub trait RecordSerializable {
    /// Produces the record form.
    fn serialize(&self) -> Record;

    /// Replaces the current state with what's in `record`.
    fn deserialize(&mut self, record: &Record);

    /// Returns to an empty baseline state.
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_replace_in_place() {
        let mut r = Record::new("thing")
            .with_attribute("a", "1")
            .with_attribute("b", "2");
        r.set_attribute("a", "3");
        assert_eq!(r.attribute("a"), Some("3"));
        assert_eq!(r.attribute_or("missing", "x"), "x");
        let json = r.to_json().unwrap();
        assert!(
            json.find("\"a\"").unwrap() < json.find("\"b\"").unwrap(),
            "attribute order should be preserved"
        );
    }

    #[test]
    fn self_or_child() {
        let child = Record::new("delta").with_attribute("type", "x");
        let parent = Record::new("revision").with_child(child.clone());
        assert_eq!(child.self_or_child("delta"), Some(&child));
        assert_eq!(parent.self_or_child("delta"), Some(&child));
        assert!(Record::new("other").self_or_child("delta").is_none());
    }

    #[test]
    fn json() {
        let r = Record::new("app-info")
            .with_child(Record::new("resource").with_attribute("hash", "abc"))
            .with_child(Record::new("resource").with_attribute("hash", "def"));
        let decoded = Record::from_json(&r.to_json().unwrap()).unwrap();
        assert_eq!(decoded, r);
        assert_eq!(decoded.children_named("resource").count(), 2);
        assert!(Record::from_json("not json").is_err());
    }
}
