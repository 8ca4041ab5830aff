use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed table of class ids a feature detector may emit.
///
/// Serialized as a JSON object keyed by class id, e.g. `{"1": "tongue"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    labels: BTreeMap<i64, String>,
}

impl LabelMap {
    pub fn new<I, L>(entries: I) -> Self
    where
        I: IntoIterator<Item = (i64, L)>,
        L: Into<String>,
    {
        Self {
            labels: entries
                .into_iter()
                .map(|(id, label)| (id, label.into()))
                .collect(),
        }
    }

    /// Single-class table of the bundled tongue model.
    pub fn tongue() -> Self {
        Self::new([(1, "tongue")])
    }

    pub fn get(&self, class_id: i64) -> Option<&str> {
        self.labels.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::tongue()
    }
}
