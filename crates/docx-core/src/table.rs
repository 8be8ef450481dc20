//! Body-level table access and prototype cloning

use crate::xml::{Element, Node};
use crate::{DocxDocument, DocxError, Result};

/// Handle to a body-level table
///
/// Handles stay valid while body children ahead of the table are neither
/// inserted nor removed; cloning only appends, so handles taken before a
/// clone remain usable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle {
    /// Position among the body's child nodes
    position: usize,
    /// Zero-based ordinal among body-level tables
    ordinal: usize,
}

impl TableHandle {
    /// Zero-based ordinal among body-level tables
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl DocxDocument {
    /// Handles to every body-level table, in document order
    pub fn tables(&self) -> Result<Vec<TableHandle>> {
        let body = self.body()?;
        Ok(body
            .children
            .iter()
            .enumerate()
            .filter_map(|(position, node)| match node {
                Node::Element(element) if element.is("tbl") => Some(position),
                _ => None,
            })
            .enumerate()
            .map(|(ordinal, position)| TableHandle { position, ordinal })
            .collect())
    }

    /// Number of body-level tables
    pub fn table_count(&self) -> Result<usize> {
        Ok(self.tables()?.len())
    }

    /// The table behind a handle
    pub fn table(&self, handle: TableHandle) -> Result<&Element> {
        self.body()?
            .element_at(handle.position)
            .filter(|e| e.is("tbl"))
            .ok_or(DocxError::InvalidTable(handle.ordinal))
    }

    /// The mutable table behind a handle
    pub fn table_mut(&mut self, handle: TableHandle) -> Result<&mut Element> {
        match self.body_mut()?.children.get_mut(handle.position) {
            Some(Node::Element(element)) if element.is("tbl") => Ok(element),
            _ => Err(DocxError::InvalidTable(handle.ordinal)),
        }
    }

    /// Make sure the document holds at least `total_tables_needed` tables
    ///
    /// The first body-level table is the prototype. Missing tables are deep
    /// copies of it, appended after the existing content (ahead of the final
    /// section properties). Existing tables are never removed, and a request
    /// for zero tables counts as one.
    ///
    /// With `insert_page_breaks`, each appended copy is preceded by a
    /// paragraph holding a page break. Otherwise an empty paragraph separates
    /// the copies so adjacent tables are not merged when the document opens.
    ///
    /// # Returns
    /// Handles to all body-level tables in document order
    ///
    /// # Example
    /// ```ignore
    /// let tables = doc.clone_tables(3, true)?;
    /// assert_eq!(tables.len(), 3);
    /// ```
    pub fn clone_tables(
        &mut self,
        total_tables_needed: usize,
        insert_page_breaks: bool,
    ) -> Result<Vec<TableHandle>> {
        let wanted = total_tables_needed.max(1);
        let existing = self.tables()?;
        let prototype = *existing.first().ok_or(DocxError::NoPrototypeTable)?;
        if wanted <= existing.len() {
            return Ok(existing);
        }

        let mut next_id = max_control_id(self.root()).map(|id| id + 1).unwrap_or(1);
        let template = self.table(prototype)?.clone();
        let body = self.body_mut()?;

        let mut insert_at = body
            .children
            .iter()
            .rposition(|node| matches!(node, Node::Element(e) if e.is("sectPr")))
            .unwrap_or(body.children.len());

        for _ in existing.len()..wanted {
            let separator = if insert_page_breaks {
                page_break_paragraph(&template)
            } else {
                Element::new(template.qualify("p"))
            };
            body.children.insert(insert_at, Node::Element(separator));
            insert_at += 1;

            let mut copy = template.clone();
            renumber_controls(&mut copy, &mut next_id);
            body.children.insert(insert_at, Node::Element(copy));
            insert_at += 1;
        }

        self.tables()
    }
}

/// Paragraph holding a single forced page break
fn page_break_paragraph(like: &Element) -> Element {
    Element::new(like.qualify("p")).with_child(
        Element::new(like.qualify("r"))
            .with_child(Element::new(like.qualify("br")).with_attr(like.qualify("type"), "page")),
    )
}

/// Largest numeric content control id (`w:sdtPr/w:id`) in the tree
fn max_control_id(root: &Element) -> Option<i64> {
    let mut max = None;
    root.walk(&mut |element| {
        if element.is("sdt") {
            let id = element
                .child("sdtPr")
                .and_then(|p| p.child("id"))
                .and_then(|id| id.attribute("val"))
                .and_then(|v| v.parse::<i64>().ok());
            if let Some(id) = id {
                max = Some(max.map_or(id, |m: i64| m.max(id)));
            }
        }
    });
    max
}

/// Give every content control in a copied subtree a fresh id
fn renumber_controls(root: &mut Element, next_id: &mut i64) {
    root.walk_mut(&mut |element| {
        if !element.is("sdt") {
            return;
        }
        if let Some(id) = element.child_mut("sdtPr").and_then(|p| p.child_mut("id")) {
            let qualified = id.qualify("val");
            id.set_attribute("val", &qualified, &next_id.to_string());
            *next_id += 1;
        }
    });
}
