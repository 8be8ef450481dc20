//! DOCX Core - Low-level DOCX manipulation
//!
//! This crate provides functionality for:
//! - Opening and saving DOCX packages
//! - An owned XML element tree for the main document part
//! - Writing text into tagged content controls
//! - Cloning a prototype table into per-page copies
//!
//! # Example
//!
//! ```ignore
//! use docx_core::{content_control, DocxDocument};
//!
//! let mut doc = DocxDocument::open("template.docx")?;
//! let tables = doc.clone_tables(3, true)?;
//! let table = doc.table_mut(tables[1])?;
//! content_control::try_write(table, "Name_1", Some("R12"))?;
//! doc.save("output.docx")?;
//! ```

pub mod content_control;
mod document;
mod table;
pub mod xml;

pub use content_control::{ControlShape, ScopedWriter, TagIndex};
pub use document::DocxDocument;
pub use table::TableHandle;
pub use xml::{Element, Node, XmlDocument};

use thiserror::Error;

/// Errors that can occur during DOCX operations
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("Failed to open DOCX: {0}")]
    OpenError(String),

    #[error("Failed to save DOCX: {0}")]
    SaveError(String),

    #[error("Package part not found: {0}")]
    MissingPart(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document contains no table to use as prototype")]
    NoPrototypeTable,

    #[error("Invalid table handle: table {0} no longer exists")]
    InvalidTable(usize),

    #[error("Unsupported content control '{tag}': {reason}")]
    UnsupportedControl { tag: String, reason: String },

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for DOCX operations
pub type Result<T> = std::result::Result<T, DocxError>;
