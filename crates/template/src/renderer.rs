//! Generic form rendering

use crate::schema::LayoutSchema;
use crate::{DocumentItem, Result, TemplateError};
use docx_core::{Element, ScopedWriter};

/// Fills the per-slot placeholders of one page table
///
/// Every slot of the page is written, including slots without an item:
/// a cloned table still carries the prototype's example text, and only an
/// explicit blank write clears it.
pub struct FormRenderer<'a> {
    /// Layout of the form being rendered
    schema: &'a LayoutSchema,
}

impl<'a> FormRenderer<'a> {
    /// Create a renderer for a schema
    pub fn new(schema: &'a LayoutSchema) -> Self {
        Self { schema }
    }

    /// Render one page
    ///
    /// # Arguments
    /// * `scope` - The page's table; tag lookups never leave it
    /// * `items` - Items on this page, at most `items_per_page`
    ///
    /// # Returns
    /// The slot capacity of the page (`items_per_page`), regardless of how
    /// many slots held an item or how many tags were present.
    pub fn render_form(&self, scope: &mut Element, items: &[DocumentItem]) -> Result<usize> {
        let capacity = self.schema.items_per_page;
        if items.len() > capacity {
            return Err(TemplateError::RenderError(format!(
                "{} items do not fit a page of {} slots",
                items.len(),
                capacity
            )));
        }

        let mut writer = ScopedWriter::new(scope);
        for slot in 1..=capacity {
            let item = items.get(slot - 1);
            for (field, tag) in self.schema.slot_tags(slot) {
                let value = item.and_then(|item| item.field_value(field));
                writer.try_write(&tag, value.as_deref())?;
            }
        }

        Ok(capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_core::content_control::read_text;
    use docx_core::XmlDocument;
    use pretty_assertions::assert_eq;

    fn schema(items_per_page: usize) -> LayoutSchema {
        let json = format!(
            r#"{{
                "formCode": "T",
                "itemsPerPage": {},
                "itemFieldTemplates": {{
                    "Name": "Name_{{index}}",
                    "Quantity": "Qty_{{index}}",
                    "Note": "Note_{{index}}"
                }}
            }}"#,
            items_per_page
        );
        LayoutSchema::from_json(&json, "T").unwrap()
    }

    fn control(tag: &str, text: &str) -> String {
        format!(
            r#"<w:sdt><w:sdtPr><w:tag w:val="{}"/></w:sdtPr><w:sdtContent><w:r><w:t>{}</w:t></w:r></w:sdtContent></w:sdt>"#,
            tag, text
        )
    }

    /// Page table with Name/Qty/Note controls per slot, pre-filled with examples
    fn page_table(slots: usize) -> Element {
        let mut rows = String::new();
        for i in 1..=slots {
            rows.push_str(&format!(
                "<w:tr><w:tc><w:p>{}{}{}</w:p></w:tc></w:tr>",
                control(&format!("Name_{}", i), "Example"),
                control(&format!("Qty_{}", i), "99"),
                control(&format!("Note_{}", i), "sample"),
            ));
        }
        let xml = format!(r#"<w:tbl xmlns:w="urn:w">{}</w:tbl>"#, rows);
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    #[test]
    fn test_fills_slots_in_order() {
        let schema = schema(3);
        let mut table = page_table(3);
        let items = vec![
            DocumentItem::new("R1").with_quantity(5),
            DocumentItem::new("R2").with_field("Note", Some("DNP")),
        ];

        let slots = FormRenderer::new(&schema)
            .render_form(&mut table, &items)
            .unwrap();
        assert_eq!(slots, 3);

        assert_eq!(read_text(&table, "Name_1"), Some("R1".to_string()));
        assert_eq!(read_text(&table, "Qty_1"), Some("5".to_string()));
        assert_eq!(read_text(&table, "Name_2"), Some("R2".to_string()));
        assert_eq!(read_text(&table, "Qty_2"), Some(String::new()));
        assert_eq!(read_text(&table, "Note_2"), Some("DNP".to_string()));
        assert_eq!(read_text(&table, "Note_1"), Some(String::new()));
    }

    #[test]
    fn test_empty_slots_are_blanked() {
        let schema = schema(3);
        let mut table = page_table(3);
        let items = vec![DocumentItem::new("R1")];

        FormRenderer::new(&schema)
            .render_form(&mut table, &items)
            .unwrap();

        for slot in 2..=3 {
            for prefix in ["Name", "Qty", "Note"] {
                let tag = format!("{}_{}", prefix, slot);
                assert_eq!(read_text(&table, &tag), Some(String::new()), "{}", tag);
            }
        }
    }

    #[test]
    fn test_returns_capacity_for_empty_page() {
        let schema = schema(4);
        let mut table = page_table(4);
        let slots = FormRenderer::new(&schema)
            .render_form(&mut table, &[])
            .unwrap();
        assert_eq!(slots, 4);
        assert_eq!(table.text_of("t"), "");
    }

    #[test]
    fn test_absent_tags_are_tolerated() {
        let schema = schema(3);
        // Only two slots authored in the table
        let mut table = page_table(2);
        let items = vec![
            DocumentItem::new("A"),
            DocumentItem::new("B"),
            DocumentItem::new("C"),
        ];

        FormRenderer::new(&schema)
            .render_form(&mut table, &items)
            .unwrap();
        assert_eq!(read_text(&table, "Name_2"), Some("B".to_string()));
    }

    #[test]
    fn test_rejects_overfull_page() {
        let schema = schema(1);
        let mut table = page_table(1);
        let items = vec![DocumentItem::new("A"), DocumentItem::new("B")];
        let result = FormRenderer::new(&schema).render_form(&mut table, &items);
        assert!(matches!(result, Err(TemplateError::RenderError(_))));
    }
}
