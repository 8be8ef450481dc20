//! Document items placed into page slots

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field keys answered by item built-ins rather than the free-form map
pub const BUILTIN_FIELDS: [&str; 3] = ["Name", "Designators", "Quantity"];

/// One row of data occupying one slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    pub name: String,

    #[serde(default)]
    pub designators: Option<String>,

    #[serde(default)]
    pub quantity: Option<u32>,

    /// Free-form fields keyed by schema field key
    #[serde(default)]
    pub fields: BTreeMap<String, Option<String>>,
}

impl DocumentItem {
    /// Create an item with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_designators(mut self, designators: impl Into<String>) -> Self {
        self.designators = Some(designators.into());
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.fields.insert(key.into(), value.map(str::to_string));
        self
    }

    /// Value written for `key`
    ///
    /// `Name`, `Designators` and `Quantity` read the built-ins; any other
    /// key reads the free-form map and is `None` when absent.
    pub fn field_value(&self, key: &str) -> Option<String> {
        match key {
            "Name" => Some(self.name.clone()),
            "Designators" => self.designators.clone(),
            "Quantity" => self.quantity.map(|q| q.to_string()),
            other => self.fields.get(other).cloned().flatten(),
        }
    }

    /// Whether `key` is a built-in or present in the free-form map
    pub fn has_field(&self, key: &str) -> bool {
        BUILTIN_FIELDS.contains(&key) || self.fields.contains_key(key)
    }
}
