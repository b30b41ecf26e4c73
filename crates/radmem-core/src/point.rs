//! Vector-store primitives: points, named vector slots, payload filters.
//!
//! A point carries up to two named vectors (`image_vector`, `text_vector`)
//! and a schemaless JSON payload. Filters are conjunctions of exact-match
//! conditions on top-level payload keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Schemaless point payload.
pub type Payload = Map<String, Value>;

/// Named vector slot on a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSlot {
    Image,
    Text,
}

impl VectorSlot {
    /// Storage name of the slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSlot::Image => "image_vector",
            VectorSlot::Text => "text_vector",
        }
    }
}

impl std::fmt::Display for VectorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The vectors stored on one point, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedVectors {
    pub image: Option<Vec<f32>>,
    pub text: Option<Vec<f32>>,
}

impl NamedVectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: VectorSlot, vector: Vec<f32>) -> Self {
        self.set(slot, vector);
        self
    }

    pub fn get(&self, slot: VectorSlot) -> Option<&[f32]> {
        match slot {
            VectorSlot::Image => self.image.as_deref(),
            VectorSlot::Text => self.text.as_deref(),
        }
    }

    pub fn set(&mut self, slot: VectorSlot, vector: Vec<f32>) {
        match slot {
            VectorSlot::Image => self.image = Some(vector),
            VectorSlot::Text => self.text = Some(vector),
        }
    }

    pub fn has(&self, slot: VectorSlot) -> bool {
        self.get(slot).is_some()
    }
}

/// A stored point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: Uuid,
    pub vectors: NamedVectors,
    pub payload: Payload,
}

/// A similarity search hit. `score` is cosine similarity, higher is closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: Uuid,
    pub score: f32,
    pub payload: Payload,
}

/// One exact-match condition on a top-level payload key.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub value: Value,
}

impl Condition {
    fn matches(&self, payload: &Payload) -> bool {
        payload.get(&self.key) == Some(&self.value)
    }
}

/// Conjunction of match conditions: all of `must` hold and none of `must_not`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub must: Vec<Condition>,
    pub must_not: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `payload[key] == value`.
    pub fn must_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(Condition {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Require `payload[key] != value` (absent keys pass).
    pub fn must_not_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must_not.push(Condition {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }

    /// Evaluate the filter against a payload.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| c.matches(payload))
            && !self.must_not.iter().any(|c| c.matches(payload))
    }

    /// Reject keys that are not plain identifiers.
    ///
    /// SQL-backed stores splice keys into JSON path expressions.
    pub fn validate(&self) -> Result<()> {
        for c in self.must.iter().chain(self.must_not.iter()) {
            validate_payload_key(&c.key)?;
        }
        Ok(())
    }
}

/// Payload keys must be non-empty `[A-Za-z0-9_]`.
pub fn validate_payload_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidInput(format!(
            "Invalid payload key: {:?}",
            key
        )));
    }
    Ok(())
}

/// Shape of a collection: which slots exist, their dimension, and which
/// payload keys are filtered on.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub slots: &'static [VectorSlot],
    pub dimension: usize,
    pub indexed_fields: &'static [&'static str],
}

impl CollectionSpec {
    pub fn has_slot(&self, slot: VectorSlot) -> bool {
        self.slots.contains(&slot)
    }
}
