//! DOCX package wrapper

use crate::xml::{Element, XmlDocument};
use crate::{DocxError, Result};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Fallback location of the main document part
const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// Relationship type suffix that marks the main document part
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

const MINIMAL_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const MINIMAL_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// One entry of the zip package, kept as raw bytes
#[derive(Debug, Clone)]
struct PackagePart {
    name: String,
    data: Vec<u8>,
    is_dir: bool,
}

/// DOCX document wrapper providing structural operations on the main part
///
/// Every package part other than the main document is carried through
/// untouched; the main part is parsed into an owned element tree and
/// re-serialized on save.
pub struct DocxDocument {
    /// Package entries in archive order
    parts: Vec<PackagePart>,
    /// Name of the main document part inside the package
    main_part: String,
    /// Parsed main document part
    document: XmlDocument,
}

impl DocxDocument {
    /// Open a DOCX document from a file path
    ///
    /// # Example
    /// ```ignore
    /// let doc = DocxDocument::open("template.docx")?;
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            DocxError::OpenError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::open_from_bytes(&data)
    }

    /// Open a DOCX document from any reader, buffering it fully
    pub fn open_from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::open_from_bytes(&data)
    }

    /// Open a DOCX document from bytes
    pub fn open_from_bytes(data: &[u8]) -> Result<Self> {
        let mut archive =
            ZipArchive::new(Cursor::new(data)).map_err(|e| DocxError::OpenError(e.to_string()))?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push(PackagePart {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                data,
            });
        }

        let main_part = resolve_main_part(&parts)?;
        let part = parts
            .iter()
            .find(|p| p.name == main_part)
            .ok_or_else(|| DocxError::MissingPart(main_part.clone()))?;
        let document = XmlDocument::parse(&part.data)?;

        if !document.root.is("document") || document.root.child("body").is_none() {
            return Err(DocxError::Malformed(format!(
                "{} is not a WordprocessingML document",
                main_part
            )));
        }

        Ok(Self {
            parts,
            main_part,
            document,
        })
    }

    /// Build a minimal package around a main document part
    ///
    /// Useful for authoring templates programmatically; the package holds
    /// only the content types, the root relationships and `word/document.xml`.
    pub fn new_with_document(document_xml: &str) -> Result<Self> {
        let parts = vec![
            PackagePart {
                name: "[Content_Types].xml".to_string(),
                data: MINIMAL_CONTENT_TYPES.as_bytes().to_vec(),
                is_dir: false,
            },
            PackagePart {
                name: "_rels/.rels".to_string(),
                data: MINIMAL_RELS.as_bytes().to_vec(),
                is_dir: false,
            },
            PackagePart {
                name: DEFAULT_MAIN_PART.to_string(),
                data: document_xml.as_bytes().to_vec(),
                is_dir: false,
            },
        ];
        let bytes = write_package(&parts, DEFAULT_MAIN_PART, None)?;
        Self::open_from_bytes(&bytes)
    }

    /// Name of the main document part (usually `word/document.xml`)
    pub fn main_part_name(&self) -> &str {
        &self.main_part
    }

    /// Raw bytes of a package part as loaded
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Root element of the main document part (`w:document`)
    pub fn root(&self) -> &Element {
        &self.document.root
    }

    /// The document body (`w:body`)
    pub fn body(&self) -> Result<&Element> {
        self.document
            .root
            .child("body")
            .ok_or_else(|| DocxError::Malformed("document has no body".to_string()))
    }

    /// The mutable document body (`w:body`)
    pub fn body_mut(&mut self) -> Result<&mut Element> {
        self.document
            .root
            .child_mut("body")
            .ok_or_else(|| DocxError::Malformed("document has no body".to_string()))
    }

    /// Serialized main document part
    pub fn document_xml(&self) -> String {
        self.document.to_xml()
    }

    /// Save the document to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| DocxError::SaveError(e.to_string()))
    }

    /// Serialize the whole package to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let main_xml = self.document.to_xml();
        write_package(&self.parts, &self.main_part, Some(main_xml.as_bytes()))
    }
}

/// Write package parts into a new zip archive, substituting the main part
fn write_package(parts: &[PackagePart], main_part: &str, main_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for part in parts {
        if part.is_dir {
            writer.add_directory(part.name.clone(), options)?;
            continue;
        }
        writer.start_file(part.name.clone(), options)?;
        match main_data {
            Some(data) if part.name == main_part => writer.write_all(data)?,
            _ => writer.write_all(&part.data)?,
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| DocxError::SaveError(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Find the main document part through the package relationships
fn resolve_main_part(parts: &[PackagePart]) -> Result<String> {
    let Some(rels) = parts.iter().find(|p| p.name == "_rels/.rels") else {
        return Ok(DEFAULT_MAIN_PART.to_string());
    };

    let rels = XmlDocument::parse(&rels.data)?;
    let target = rels
        .root
        .elements()
        .filter(|e| e.is("Relationship"))
        .find(|e| {
            e.attribute("Type")
                .map(|t| t.ends_with(OFFICE_DOCUMENT_REL))
                .unwrap_or(false)
        })
        .and_then(|e| e.attribute("Target"));

    Ok(target
        .map(|t| t.trim_start_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string()))
}
