//! Template Engine - paged form generation from tagged DOCX templates
//!
//! This crate provides:
//! - Layout schema types and the caching schema store
//! - Template identities and the template store
//! - The generic form renderer (one page table at a time)
//! - The build orchestrator tying template, schema and items together
//!
//! # Example
//!
//! ```ignore
//! use template::{DocumentBuilder, DocumentItem, EngineOptions, RenderRequest, TemplateIdentity};
//!
//! let builder = DocumentBuilder::new(EngineOptions::from_file("engine.json")?)?;
//! let request = RenderRequest::new(
//!     TemplateIdentity::new("2"),
//!     vec![DocumentItem::new("R1").with_quantity(2)],
//! );
//! let result = builder.build(&request)?;
//! builder.save_output(&result, "bom.docx")?;
//! ```

mod builder;
mod item;
mod options;
pub mod pagination;
mod renderer;
mod schema;
mod schema_store;
mod template_store;

pub use builder::{
    BuildError, BuildStage, CancelFlag, DocumentBuilder, Issue, RenderOptions, RenderRequest,
    RenderResult, Severity,
};
pub use item::{DocumentItem, BUILTIN_FIELDS};
pub use options::{EngineOptions, MissingFieldPolicy};
pub use renderer::FormRenderer;
pub use schema::{resolve_tag, LayoutSchema, INDEX_TOKEN, MAX_ITEMS_PER_PAGE};
pub use schema_store::SchemaStore;
pub use template_store::{
    TemplateIdentity, TemplateStore, DEFAULT_TEMPLATE_VERSION, TEMPLATE_EXTENSION,
};

use docx_core::DocxError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during template processing
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Schema not found for form '{form_code}': {}", .path.display())]
    SchemaNotFound { form_code: String, path: PathBuf },

    #[error("Invalid schema for form '{form_code}': {reason}")]
    SchemaInvalid { form_code: String, reason: String },

    #[error("Template not found for {identity}: {}", .path.display())]
    TemplateNotFound {
        identity: TemplateIdentity,
        path: PathBuf,
    },

    #[error("Malformed template: {0}")]
    TemplateMalformed(String),

    #[error("Unsupported placeholder: {0}")]
    RenderUnsupported(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Render cancelled")]
    Cancelled,

    #[error("DOCX error: {0}")]
    DocxError(DocxError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TemplateError {
    /// Stable code used when the error is reported as an issue
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::SchemaNotFound { .. } => "SchemaNotFound",
            TemplateError::SchemaInvalid { .. } => "SchemaInvalid",
            TemplateError::TemplateNotFound { .. } => "TemplateNotFound",
            TemplateError::TemplateMalformed(_) => "TemplateMalformed",
            TemplateError::RenderUnsupported(_) => "RenderUnsupported",
            TemplateError::RenderError(_) => "RenderError",
            TemplateError::ConfigError(_) => "ConfigError",
            TemplateError::Cancelled => "Cancelled",
            TemplateError::DocxError(_) => "DocxError",
            TemplateError::JsonError(_) => "JsonError",
            TemplateError::IoError(_) => "IoError",
        }
    }
}

impl From<DocxError> for TemplateError {
    fn from(err: DocxError) -> Self {
        match err {
            DocxError::OpenError(_)
            | DocxError::MissingPart(_)
            | DocxError::Malformed(_)
            | DocxError::NoPrototypeTable
            | DocxError::XmlError(_) => TemplateError::TemplateMalformed(err.to_string()),
            DocxError::UnsupportedControl { .. } => {
                TemplateError::RenderUnsupported(err.to_string())
            }
            other => TemplateError::DocxError(other),
        }
    }
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;
