//! Content control (structured document tag) lookup and text replacement
//!
//! A content control is a `w:sdt` element whose `w:sdtPr/w:tag/@w:val`
//! names it. Two shapes can be written:
//!
//! - **inline**: a run-level control inside a paragraph; its content holds runs
//! - **block**: a control between paragraphs (body, cell); its content holds
//!   one paragraph
//!
//! Writing replaces the existing text with a single run carrying the value.

use crate::xml::{Element, Node};
use crate::{DocxError, Result};
use std::collections::HashMap;

/// Shape of a content control, decided by its content and position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlShape {
    Inline,
    Block,
}

/// Location of one tagged content control relative to a scope element
#[derive(Debug, Clone, PartialEq, Eq)]
struct ControlLocation {
    /// Child-index path from the scope root to the `w:sdt`
    path: Vec<usize>,
    /// Whether the control sits inside a paragraph (run level)
    in_paragraph: bool,
}

/// Elements whose children are paragraphs again, even when nested in a run
/// (text boxes) or a table cell
const BLOCK_CONTAINERS: [&str; 9] = [
    "body",
    "tc",
    "txbxContent",
    "footnote",
    "endnote",
    "comment",
    "hdr",
    "ftr",
    "docPartBody",
];

fn is_block_container(element: &Element) -> bool {
    BLOCK_CONTAINERS.iter().any(|name| element.is(name))
}

/// Tag string of a content control, if it has one
pub fn control_tag(sdt: &Element) -> Option<&str> {
    sdt.child("sdtPr")?.child("tag")?.attribute("val")
}

/// Index of every tagged content control under a scope element
///
/// Built with one traversal; lookups afterwards do not rescan the tree.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    controls: HashMap<String, Vec<ControlLocation>>,
}

impl TagIndex {
    /// Index all tagged content controls within `scope` (inclusive)
    pub fn build(scope: &Element) -> Self {
        let mut index = Self::default();
        let mut path = Vec::new();
        index.collect(scope, &mut path, false);
        index
    }

    fn collect(&mut self, element: &Element, path: &mut Vec<usize>, in_paragraph: bool) {
        if element.is("sdt") {
            if let Some(tag) = control_tag(element) {
                self.controls
                    .entry(tag.to_string())
                    .or_default()
                    .push(ControlLocation {
                        path: path.clone(),
                        in_paragraph,
                    });
            }
        }

        let in_paragraph = if is_block_container(element) {
            false
        } else {
            in_paragraph || element.is("p")
        };
        for (i, child) in element.children.iter().enumerate() {
            if let Node::Element(child) = child {
                path.push(i);
                self.collect(child, path, in_paragraph);
                path.pop();
            }
        }
    }

    /// Whether at least one control carries `tag`
    pub fn contains(&self, tag: &str) -> bool {
        self.controls.get(tag).map(|v| !v.is_empty()).unwrap_or(false)
    }

    /// Drop every location nested strictly below `path` (its content was replaced)
    fn forget_below(&mut self, path: &[usize]) {
        for locations in self.controls.values_mut() {
            locations.retain(|loc| !(loc.path.len() > path.len() && loc.path.starts_with(path)));
        }
    }

    fn still_indexed(&self, tag: &str, location: &ControlLocation) -> bool {
        self.controls
            .get(tag)
            .map(|locations| locations.contains(location))
            .unwrap_or(false)
    }
}

/// Writer bound to one scope, reusing a single tag index for every write
pub struct ScopedWriter<'a> {
    scope: &'a mut Element,
    index: TagIndex,
}

impl<'a> ScopedWriter<'a> {
    /// Index `scope` once and prepare for writes
    pub fn new(scope: &'a mut Element) -> Self {
        let index = TagIndex::build(scope);
        Self { scope, index }
    }

    /// The tag index of this scope
    pub fn index(&self) -> &TagIndex {
        &self.index
    }

    /// Overwrite the text of every control tagged `tag`
    ///
    /// Returns `Ok(false)` without touching the tree when the tag is absent.
    /// `None` writes an empty string.
    pub fn try_write(&mut self, tag: &str, value: Option<&str>) -> Result<bool> {
        let Some(locations) = self.index.controls.get(tag).cloned() else {
            return Ok(false);
        };

        let mut written = false;
        for location in &locations {
            if !self.index.still_indexed(tag, location) {
                continue;
            }
            let Some(sdt) = self.scope.at_path_mut(&location.path) else {
                continue;
            };
            if !sdt.is("sdt") || control_tag(sdt) != Some(tag) {
                continue;
            }
            write_control(sdt, tag, location.in_paragraph, value.unwrap_or(""))?;
            self.index.forget_below(&location.path);
            written = true;
        }

        Ok(written)
    }

    /// Text of the first control tagged `tag`
    pub fn read_text(&self, tag: &str) -> Option<String> {
        let location = self.index.controls.get(tag)?.first()?;
        let sdt = self.scope.at_path(&location.path)?;
        Some(control_text(sdt))
    }
}

/// Overwrite every control tagged `tag` within `scope`
///
/// One-shot form of [`ScopedWriter::try_write`]; prefer the scoped writer
/// when writing many tags into the same scope.
pub fn try_write(scope: &mut Element, tag: &str, value: Option<&str>) -> Result<bool> {
    ScopedWriter::new(scope).try_write(tag, value)
}

/// Text of the first control tagged `tag` within `scope`
pub fn read_text(scope: &Element, tag: &str) -> Option<String> {
    let mut found = None;
    scope.walk(&mut |element| {
        if found.is_none() && element.is("sdt") && control_tag(element) == Some(tag) {
            found = Some(control_text(element));
        }
    });
    found
}

/// Text of a control's runs; breaks read back as `\n` and tabs as `\t`
fn control_text(sdt: &Element) -> String {
    let mut text = String::new();
    let Some(content) = sdt.child("sdtContent") else {
        return text;
    };
    content.walk(&mut |element| {
        if !element.is("r") {
            return;
        }
        for child in element.elements() {
            match child.local_name() {
                "t" => {
                    for node in &child.children {
                        if let Node::Text(value) = node {
                            text.push_str(value);
                        }
                    }
                }
                "br" | "cr" => text.push('\n'),
                "tab" => text.push('\t'),
                _ => {}
            }
        }
    });
    text
}

/// Decide how a control's content should be written
fn detect_shape(content: &Element, tag: &str, in_paragraph: bool) -> Result<ControlShape> {
    let unsupported = |reason: &str| DocxError::UnsupportedControl {
        tag: tag.to_string(),
        reason: reason.to_string(),
    };

    if content.elements().any(|e| e.is("tbl") || e.is("tr") || e.is("tc")) {
        return Err(unsupported("content holds table structure"));
    }

    let has_paragraph = content.elements().any(|e| e.is("p"));
    let has_run = content.elements().any(|e| e.is("r"));

    match (in_paragraph, has_paragraph, has_run) {
        (true, true, _) => Err(unsupported("paragraph inside a run-level control")),
        (true, false, _) => Ok(ControlShape::Inline),
        (false, true, _) => Ok(ControlShape::Block),
        (false, false, true) => Err(unsupported("runs outside a paragraph")),
        (false, false, false) => Ok(ControlShape::Block),
    }
}

fn write_control(sdt: &mut Element, tag: &str, in_paragraph: bool, value: &str) -> Result<()> {
    if let Some(properties) = sdt.child_mut("sdtPr") {
        properties.remove_children("showingPlcHdr");
    }

    if sdt.child("sdtContent").is_none() {
        let name = sdt.qualify("sdtContent");
        sdt.children.push(Node::Element(Element::new(name)));
    }
    let names = RunNames::like(sdt);
    let paragraph_name = sdt.qualify("p");

    let content = sdt
        .child_mut("sdtContent")
        .ok_or_else(|| DocxError::Malformed("content control lost its content".to_string()))?;

    match detect_shape(content, tag, in_paragraph)? {
        ControlShape::Inline => {
            let run_properties = first_run_properties(content);
            content.children = vec![Node::Element(text_run(&names, run_properties, value))];
        }
        ControlShape::Block => {
            let mut paragraph = content
                .elements()
                .find(|e| e.is("p"))
                .cloned()
                .unwrap_or_else(|| Element::new(paragraph_name));
            let run_properties = first_run_properties(&paragraph);

            paragraph.children.retain(|node| match node {
                Node::Element(element) => element.is("pPr"),
                _ => false,
            });
            paragraph
                .children
                .push(Node::Element(text_run(&names, run_properties, value)));
            content.children = vec![Node::Element(paragraph)];
        }
    }

    Ok(())
}

fn first_run_properties(element: &Element) -> Option<Element> {
    let mut found = None;
    element.walk(&mut |e| {
        if found.is_none() && e.is("r") {
            found = e.child("rPr").cloned();
        }
    });
    found
}

/// Qualified names of the run-level elements a write produces
struct RunNames {
    run: String,
    text: String,
    br: String,
    tab: String,
}

impl RunNames {
    fn like(element: &Element) -> Self {
        Self {
            run: element.qualify("r"),
            text: element.qualify("t"),
            br: element.qualify("br"),
            tab: element.qualify("tab"),
        }
    }
}

fn push_text(run: &mut Element, names: &RunNames, pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    run.children.push(Node::Element(
        Element::new(names.text.as_str())
            .with_attr("xml:space", "preserve")
            .with_text(pending.as_str()),
    ));
    pending.clear();
}

/// Whether `c` may appear in XML 1.0 character data
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}

/// A run holding `value`
///
/// Line breaks (`\n`, `\r\n`, `\r`, and the vertical tab Word uses for a
/// manual break) become `w:br`, tabs become `w:tab`, and characters XML 1.0
/// does not allow are dropped. An empty value still yields one empty `w:t`.
fn text_run(names: &RunNames, properties: Option<Element>, value: &str) -> Element {
    let mut run = Element::new(names.run.as_str());
    if let Some(properties) = properties {
        run.children.push(Node::Element(properties));
    }

    let mut pending = String::new();
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        let markup = match c {
            '\t' => &names.tab,
            '\n' | '\u{b}' => &names.br,
            '\r' => {
                chars.next_if_eq(&'\n');
                &names.br
            }
            c if is_xml_char(c) => {
                pending.push(c);
                continue;
            }
            _ => continue,
        };
        push_text(&mut run, names, &mut pending);
        run.children.push(Node::Element(Element::new(markup.as_str())));
    }
    push_text(&mut run, names, &mut pending);

    if run.elements().all(|e| e.is("rPr")) {
        run.children.push(Node::Element(
            Element::new(names.text.as_str()).with_attr("xml:space", "preserve"),
        ));
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlDocument;
    use pretty_assertions::assert_eq;

    fn parse(xml: &str) -> Element {
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    const INLINE: &str = r#"<w:p xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="Name_1"/><w:showingPlcHdr/></w:sdtPr><w:sdtContent><w:r><w:rPr><w:b/></w:rPr><w:t>Example</w:t></w:r><w:r><w:t> text</w:t></w:r></w:sdtContent></w:sdt></w:p>"#;

    const BLOCK: &str = r#"<w:tc xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="Note_1"/></w:sdtPr><w:sdtContent><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>Old</w:t></w:r></w:p><w:p><w:r><w:t>More</w:t></w:r></w:p></w:sdtContent></w:sdt></w:tc>"#;

    #[test]
    fn test_inline_write_replaces_runs() {
        let mut scope = parse(INLINE);
        assert!(try_write(&mut scope, "Name_1", Some("R1")).unwrap());

        assert_eq!(read_text(&scope, "Name_1"), Some("R1".to_string()));
        let content = scope.child("sdt").unwrap().child("sdtContent").unwrap();
        assert_eq!(content.elements().count(), 1);
        let run = content.child("r").unwrap();
        assert!(run.child("rPr").unwrap().child("b").is_some());
    }

    #[test]
    fn test_write_clears_placeholder_flag() {
        let mut scope = parse(INLINE);
        try_write(&mut scope, "Name_1", Some("x")).unwrap();
        let properties = scope.child("sdt").unwrap().child("sdtPr").unwrap();
        assert!(properties.child("showingPlcHdr").is_none());
    }

    #[test]
    fn test_block_write_keeps_one_paragraph() {
        let mut scope = parse(BLOCK);
        assert!(try_write(&mut scope, "Note_1", Some("  padded  ")).unwrap());

        assert_eq!(read_text(&scope, "Note_1"), Some("  padded  ".to_string()));
        let content = scope.child("sdt").unwrap().child("sdtContent").unwrap();
        assert_eq!(content.elements().count(), 1);
        let paragraph = content.child("p").unwrap();
        assert!(paragraph.child("pPr").is_some());
    }

    #[test]
    fn test_none_writes_empty_text() {
        let mut scope = parse(INLINE);
        assert!(try_write(&mut scope, "Name_1", None).unwrap());
        assert_eq!(read_text(&scope, "Name_1"), Some(String::new()));
    }

    #[test]
    fn test_absent_tag_is_not_an_error() {
        let mut scope = parse(INLINE);
        let before = scope.clone();
        assert!(!try_write(&mut scope, "Missing_1", Some("x")).unwrap());
        assert_eq!(scope, before);
    }

    #[test]
    fn test_tag_match_is_case_sensitive() {
        let mut scope = parse(INLINE);
        assert!(!try_write(&mut scope, "name_1", Some("x")).unwrap());
    }

    #[test]
    fn test_repeated_tags_are_all_written() {
        let xml = r#"<w:body xmlns:w="urn:w"><w:p><w:sdt><w:sdtPr><w:tag w:val="Qty_1"/></w:sdtPr><w:sdtContent><w:r><w:t>9</w:t></w:r></w:sdtContent></w:sdt></w:p><w:p><w:sdt><w:sdtPr><w:tag w:val="Qty_1"/></w:sdtPr><w:sdtContent><w:r><w:t>9</w:t></w:r></w:sdtContent></w:sdt></w:p></w:body>"#;
        let mut scope = parse(xml);
        assert!(try_write(&mut scope, "Qty_1", Some("5")).unwrap());
        assert_eq!(scope.text_of("t"), "55");
    }

    #[test]
    fn test_empty_controls_get_synthesized_content() {
        let inline = r#"<w:p xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="A"/></w:sdtPr><w:sdtContent/></w:sdt></w:p>"#;
        let mut scope = parse(inline);
        assert!(try_write(&mut scope, "A", Some("a")).unwrap());
        let content = scope.child("sdt").unwrap().child("sdtContent").unwrap();
        assert!(content.child("r").is_some());

        let block = r#"<w:tc xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="B"/></w:sdtPr></w:sdt></w:tc>"#;
        let mut scope = parse(block);
        assert!(try_write(&mut scope, "B", Some("b")).unwrap());
        let content = scope.child("sdt").unwrap().child("sdtContent").unwrap();
        assert_eq!(content.child("p").unwrap().text_of("t"), "b");
    }

    #[test]
    fn test_row_content_is_unsupported() {
        let xml = r#"<w:tbl xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="Row"/></w:sdtPr><w:sdtContent><w:tr/></w:sdtContent></w:sdt></w:tbl>"#;
        let mut scope = parse(xml);
        let result = try_write(&mut scope, "Row", Some("x"));
        assert!(matches!(result, Err(DocxError::UnsupportedControl { .. })));
    }

    #[test]
    fn test_nested_controls_are_dropped_with_outer_content() {
        let xml = r#"<w:body xmlns:w="urn:w"><w:sdt><w:sdtPr><w:tag w:val="Outer"/></w:sdtPr><w:sdtContent><w:p><w:sdt><w:sdtPr><w:tag w:val="Inner"/></w:sdtPr><w:sdtContent><w:r><w:t>i</w:t></w:r></w:sdtContent></w:sdt></w:p></w:sdtContent></w:sdt></w:body>"#;
        let mut scope = parse(xml);
        let mut writer = ScopedWriter::new(&mut scope);
        assert!(writer.index().contains("Inner"));

        assert!(writer.try_write("Outer", Some("o")).unwrap());
        assert!(!writer.try_write("Inner", Some("i2")).unwrap());
        assert_eq!(writer.read_text("Outer"), Some("o".to_string()));
    }

    #[test]
    fn test_value_text_is_never_interpreted() {
        let mut scope = parse(INLINE);
        try_write(&mut scope, "Name_1", Some("<w:t>{index}</w:t> & more")).unwrap();
        assert_eq!(
            read_text(&scope, "Name_1"),
            Some("<w:t>{index}</w:t> & more".to_string())
        );
    }

    #[test]
    fn test_control_characters_never_reach_the_part() {
        let mut scope = parse(INLINE);
        try_write(&mut scope, "Name_1", Some("line1\u{b}line2\u{1}\tend\r\nlast")).unwrap();

        let xml = XmlDocument {
            declaration: false,
            prolog: Vec::new(),
            root: scope.clone(),
        }
        .to_xml();
        let forbidden: Vec<u32> = xml
            .chars()
            .filter(|c| !is_xml_char(*c))
            .map(|c| c as u32)
            .collect();
        assert_eq!(forbidden, Vec::<u32>::new());

        let run = scope
            .child("sdt")
            .and_then(|sdt| sdt.child("sdtContent"))
            .and_then(|content| content.child("r"))
            .unwrap();
        let names: Vec<&str> = run.elements().map(|e| e.local_name()).collect();
        assert_eq!(names, vec!["rPr", "t", "br", "t", "tab", "t", "br", "t"]);
        assert_eq!(
            read_text(&scope, "Name_1"),
            Some("line1\nline2\tend\nlast".to_string())
        );
    }

    #[test]
    fn test_only_dropped_characters_leave_empty_text() {
        let mut scope = parse(INLINE);
        try_write(&mut scope, "Name_1", Some("\u{0}\u{1f}")).unwrap();
        assert_eq!(read_text(&scope, "Name_1"), Some(String::new()));
        assert!(scope.at_path(&[0, 1, 0, 1]).map(|t| t.is("t")).unwrap_or(false));
    }

    #[test]
    fn test_block_control_in_text_box_is_writable() {
        let xml = r#"<w:tc xmlns:w="urn:w" xmlns:wps="urn:wps"><w:p><w:r><w:drawing><wps:txbx><w:txbxContent><w:sdt><w:sdtPr><w:tag w:val="Note_1"/></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Old</w:t></w:r></w:p></w:sdtContent></w:sdt></w:txbxContent></wps:txbx></w:drawing></w:r></w:p></w:tc>"#;
        let mut scope = parse(xml);
        assert!(try_write(&mut scope, "Note_1", Some("boxed")).unwrap());
        assert_eq!(read_text(&scope, "Note_1"), Some("boxed".to_string()));
    }

    #[test]
    fn test_inline_control_in_text_box_paragraph_stays_inline() {
        let xml = r#"<w:p xmlns:w="urn:w" xmlns:wps="urn:wps"><w:r><w:drawing><wps:txbx><w:txbxContent><w:p><w:sdt><w:sdtPr><w:tag w:val="Name_1"/></w:sdtPr><w:sdtContent><w:r><w:t>Old</w:t></w:r></w:sdtContent></w:sdt></w:p></w:txbxContent></wps:txbx></w:drawing></w:r></w:p>"#;
        let mut scope = parse(xml);
        assert!(try_write(&mut scope, "Name_1", Some("R9")).unwrap());
        assert_eq!(read_text(&scope, "Name_1"), Some("R9".to_string()));
    }
}
