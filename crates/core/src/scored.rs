//! Feature-augmented and scored forms of a canonical event.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::event::{CanonicalEvent, CANONICAL_FIELDS, PRESENCE_FLAGS};
use crate::record::FieldValue;

/// A canonical event plus derived feature columns and its message embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub event: CanonicalEvent,
    /// Derived columns in insertion order.
    pub features: IndexMap<String, FieldValue>,
    pub embedding: Vec<f32>,
}

impl FeatureRow {
    pub fn new(event: CanonicalEvent, embedding: Vec<f32>) -> Self {
        Self {
            event,
            features: IndexMap::new(),
            embedding,
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.features.insert(name.to_string(), value.into());
    }

    pub fn feature(&self, name: &str) -> Option<&FieldValue> {
        self.features.get(name)
    }

    /// Look up a column across the canonical schema and derived features.
    /// `None` means the column does not exist on this row.
    pub fn column(&self, name: &str) -> Option<FieldValue> {
        self.event
            .column(name)
            .or_else(|| self.features.get(name).cloned())
    }
}

/// Terminal form of an event: features plus model scores and the drift flag.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvent {
    pub row: FeatureRow,
    pub iforest_score: f64,
    pub lstm_score: f64,
    /// Ensemble score in `[0, 1]`.
    pub anomaly_score: f64,
    pub concept_drift: bool,
}

impl ScoredEvent {
    /// Flatten into a single JSON object: canonical fields, presence flags,
    /// derived features, then scores. The embedding is not included.
    pub fn to_record(&self) -> Map<String, Value> {
        let event = &self.row.event;
        let mut out = Map::new();

        for name in CANONICAL_FIELDS.iter().chain(PRESENCE_FLAGS) {
            let value = match *name {
                "raw" => event.raw.clone(),
                other => event
                    .column(other)
                    .map(|v| v.to_json())
                    .unwrap_or(Value::Null),
            };
            out.insert(name.to_string(), value);
        }

        for (name, value) in &self.row.features {
            out.insert(name.clone(), value.to_json());
        }

        out.insert("iforest_score".into(), FieldValue::Float(self.iforest_score).to_json());
        out.insert("lstm_score".into(), FieldValue::Float(self.lstm_score).to_json());
        out.insert("anomaly_score".into(), FieldValue::Float(self.anomaly_score).to_json());
        out.insert("concept_drift".into(), Value::Bool(self.concept_drift));
        out
    }
}
