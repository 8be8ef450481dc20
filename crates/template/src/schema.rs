//! Layout schema types
//!
//! A layout schema is the JSON contract of one form: how many items fit on
//! a page and which content control tag each item field is written to.
//!
//! ```json
//! {
//!   "formCode": "2",
//!   "itemsPerPage": 3,
//!   "itemFieldTemplates": { "Name": "Name_{index}", "Quantity": "Qty_{index}" },
//!   "metaFieldTags": { "DocumentNumber": "DocNumber" }
//! }
//! ```

use crate::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slot index placeholder inside tag templates
pub const INDEX_TOKEN: &str = "{index}";

/// Replace every index token in a tag template with the 1-based slot index
///
/// The result is plain text; the substituted value is never re-scanned.
pub fn resolve_tag(template: &str, index: usize) -> String {
    template.replace(INDEX_TOKEN, &index.to_string())
}

/// Largest accepted `itemsPerPage`; every slot is written on every page
pub const MAX_ITEMS_PER_PAGE: usize = 1000;

/// Page layout of one form
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSchema {
    /// Form code this schema belongs to
    pub form_code: String,

    /// Slots per page table (always > 0)
    pub items_per_page: usize,

    /// Item field key -> tag template containing [`INDEX_TOKEN`]
    #[serde(rename = "itemFieldTemplates")]
    pub item_field_templates: BTreeMap<String, String>,

    /// Document-level field key -> tag
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta_field_tags: BTreeMap<String, String>,

    /// Caption expected on the prototype table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_table_tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Schema file as written on disk, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLayoutSchema {
    form_code: String,
    items_per_page: i64,
    #[serde(rename = "itemFieldTemplates")]
    item_field_templates: BTreeMap<String, String>,
    #[serde(default)]
    meta_field_tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    template_table_tag: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl LayoutSchema {
    /// Parse and validate a schema requested for `form_code`
    ///
    /// Fails with `SchemaInvalid` when the JSON does not parse, the page
    /// size is not positive, a tag template lacks the index token, or the
    /// embedded form code differs from `form_code` (ignoring ASCII case).
    pub fn from_json(json: &str, form_code: &str) -> Result<Self> {
        let invalid = |reason: String| TemplateError::SchemaInvalid {
            form_code: form_code.to_string(),
            reason,
        };

        let raw: RawLayoutSchema = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;

        if raw.items_per_page <= 0 || raw.items_per_page > MAX_ITEMS_PER_PAGE as i64 {
            return Err(invalid(format!(
                "itemsPerPage must be between 1 and {}, got {}",
                MAX_ITEMS_PER_PAGE, raw.items_per_page
            )));
        }
        if !raw.form_code.eq_ignore_ascii_case(form_code) {
            return Err(invalid(format!(
                "schema declares form code '{}'",
                raw.form_code
            )));
        }
        if let Some((field, template)) = raw
            .item_field_templates
            .iter()
            .find(|(_, template)| !template.contains(INDEX_TOKEN))
        {
            return Err(invalid(format!(
                "tag template '{}' for field '{}' has no {} token",
                template, field, INDEX_TOKEN
            )));
        }

        Ok(Self {
            form_code: raw.form_code,
            items_per_page: raw.items_per_page as usize,
            item_field_templates: raw.item_field_templates,
            meta_field_tags: raw.meta_field_tags.unwrap_or_default(),
            template_table_tag: raw.template_table_tag,
            description: raw.description,
            version: raw.version,
        })
    }

    /// Every (field, tag) pair of slot `index`, in field order
    pub fn slot_tags(&self, index: usize) -> impl Iterator<Item = (&str, String)> + '_ {
        self.item_field_templates
            .iter()
            .map(move |(field, template)| (field.as_str(), resolve_tag(template, index)))
    }
}
