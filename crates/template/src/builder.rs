//! Build orchestration
//!
//! A build walks a fixed sequence of stages:
//!
//! ```text
//! Start -> TemplateOpened -> SchemaResolved -> TablesCloned
//!       -> PagesRendered(1..=n) -> Saved -> Done
//! ```
//!
//! Pages are processed strictly in order against one in-memory document.
//! Any failure stops the build; no bytes are returned and the failure
//! carries the issues gathered so far plus an error issue for the cause.

use crate::pagination::{page_count, paginate};
use crate::renderer::FormRenderer;
use crate::{
    DocumentItem, EngineOptions, LayoutSchema, MissingFieldPolicy, Result, SchemaStore,
    TemplateError, TemplateIdentity, TemplateStore,
};
use docx_core::{DocxDocument, ScopedWriter, TagIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Severity of a build issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A structured note produced while building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl Issue {
    pub fn info(code: &str, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, code, message)
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    fn with_severity(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Templates root overriding the engine's `templates_directory`
    pub template_root: Option<PathBuf>,
    /// Report schema tags missing from the prototype table as warnings
    pub validate_template: bool,
}

/// What to render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub template: TemplateIdentity,
    pub items: Vec<DocumentItem>,
    /// Document-level values keyed by the schema's meta field keys
    pub meta: BTreeMap<String, Option<String>>,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(template: TemplateIdentity, items: Vec<DocumentItem>) -> Self {
        Self {
            template,
            items,
            meta: BTreeMap::new(),
            options: RenderOptions::default(),
        }
    }

    /// Builder: set a document-level value
    pub fn with_meta(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.meta.insert(key.into(), value.map(str::to_string));
        self
    }

    /// Builder: set per-request options
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

/// A finished document
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub document_bytes: Vec<u8>,
    pub issues: Vec<Issue>,
    /// Number of page tables rendered
    pub page_count: usize,
}

/// Stage of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Start,
    TemplateOpened,
    SchemaResolved,
    TablesCloned,
    /// Number of pages rendered so far
    PagesRendered(usize),
    Saved,
    Done,
}

/// A failed build
#[derive(Debug, Error)]
#[error("Failed to build {identity}: {source}")]
pub struct BuildError {
    /// Template the request named
    pub identity: TemplateIdentity,
    /// Last stage reached before the failure
    pub stage: BuildStage,
    /// Issues gathered up to the failure, ending with the error itself
    pub issues: Vec<Issue>,
    pub source: TemplateError,
}

impl BuildError {
    /// Whether the build stopped because it was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, TemplateError::Cancelled)
    }
}

/// Cooperative cancellation shared between a caller and a build
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every build observing this flag to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TemplateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Mutable state of one build
struct BuildRun<'r> {
    identity: &'r TemplateIdentity,
    stage: BuildStage,
    issues: Vec<Issue>,
}

impl BuildRun<'_> {
    fn advance(&mut self, stage: BuildStage) {
        log::debug!("{}: {:?} -> {:?}", self.identity, self.stage, stage);
        self.stage = stage;
    }

    fn warn(&mut self, issue: Issue) {
        log::warn!("{}: {}", self.identity, issue.message);
        self.issues.push(issue);
    }
}

/// Produces documents from templates, schemas and items
///
/// The builder is shareable across threads; each request works on its own
/// copy of the template while the schema cache is shared.
pub struct DocumentBuilder {
    options: EngineOptions,
    schemas: SchemaStore,
    templates: TemplateStore,
}

impl DocumentBuilder {
    /// Validate options and create a builder
    pub fn new(options: EngineOptions) -> Result<Self> {
        options.validate()?;
        let schemas = SchemaStore::new(
            options.schemas_directory.clone(),
            options.enable_schemas_caching,
        );
        let templates = TemplateStore::new(options.templates_directory.clone());
        Ok(Self {
            options,
            schemas,
            templates,
        })
    }

    /// The shared schema registry
    pub fn schemas(&self) -> &SchemaStore {
        &self.schemas
    }

    /// Build a document
    pub fn build(&self, request: &RenderRequest) -> std::result::Result<RenderResult, BuildError> {
        self.build_with_cancel(request, &CancelFlag::new())
    }

    /// Build a document, stopping early once `cancel` is raised
    ///
    /// Cancellation is observed after the template is opened and before
    /// each page; a cancelled build returns no bytes.
    pub fn build_with_cancel(
        &self,
        request: &RenderRequest,
        cancel: &CancelFlag,
    ) -> std::result::Result<RenderResult, BuildError> {
        let mut run = BuildRun {
            identity: &request.template,
            stage: BuildStage::Start,
            issues: Vec::new(),
        };

        match self.run(request, cancel, &mut run) {
            Ok((document_bytes, page_count)) => {
                run.advance(BuildStage::Done);
                log::info!(
                    "{}: rendered {} items on {} pages",
                    request.template,
                    request.items.len(),
                    page_count
                );
                Ok(RenderResult {
                    document_bytes,
                    issues: run.issues,
                    page_count,
                })
            }
            Err(source) => {
                if matches!(source, TemplateError::Cancelled) {
                    log::info!("{}: cancelled at {:?}", request.template, run.stage);
                } else {
                    log::error!("{}: {}", request.template, source);
                    run.issues.push(Issue::error(
                        source.code(),
                        format!("{}: {}", request.template, source),
                    ));
                }
                Err(BuildError {
                    identity: request.template.clone(),
                    stage: run.stage,
                    issues: run.issues,
                    source,
                })
            }
        }
    }

    fn run(
        &self,
        request: &RenderRequest,
        cancel: &CancelFlag,
        run: &mut BuildRun<'_>,
    ) -> Result<(Vec<u8>, usize)> {
        let stream = match &request.options.template_root {
            Some(root) => TemplateStore::open_in(root, &request.template)?,
            None => self.templates.open(&request.template)?,
        };
        let mut document = DocxDocument::open_from_reader(stream)?;
        run.advance(BuildStage::TemplateOpened);
        cancel.check()?;

        let schema = self.schemas.get(&request.template.form_code)?;
        run.advance(BuildStage::SchemaResolved);

        let pages = paginate(&request.items, schema.items_per_page);
        let total_pages = page_count(request.items.len(), schema.items_per_page);
        self.report_missing_fields(&schema, &request.items, run);

        let tables = document.clone_tables(total_pages, self.options.insert_page_breaks)?;
        run.advance(BuildStage::TablesCloned);

        if request.options.validate_template {
            validate_prototype(&document, &tables, &schema, run)?;
        }

        let renderer = FormRenderer::new(&schema);
        for (k, page) in pages.iter().enumerate() {
            cancel.check()?;
            let table = document.table_mut(tables[k])?;
            renderer.render_form(table, page)?;
            run.advance(BuildStage::PagesRendered(k + 1));
        }

        write_meta_fields(&mut document, &schema, &request.meta, run)?;

        let bytes = document.to_bytes()?;
        run.advance(BuildStage::Saved);
        Ok((bytes, total_pages))
    }

    fn report_missing_fields(
        &self,
        schema: &LayoutSchema,
        items: &[DocumentItem],
        run: &mut BuildRun<'_>,
    ) {
        if items.is_empty() || self.options.missing_field_policy == MissingFieldPolicy::Ignore {
            return;
        }
        for field in schema.item_field_templates.keys() {
            if !items.iter().any(|item| item.has_field(field)) {
                run.warn(Issue::warning(
                    "FieldNotFound",
                    format!("field '{}' is not set on any item; its slots stay blank", field),
                ));
            }
        }
    }

    /// Save a finished document into the output directory
    pub fn save_output(&self, result: &RenderResult, file_name: &str) -> Result<PathBuf> {
        if file_name.trim().is_empty() {
            return Err(TemplateError::ConfigError(
                "output file name must not be blank".to_string(),
            ));
        }
        let path = self.options.output_directory.join(file_name);
        std::fs::write(&path, &result.document_bytes)?;
        Ok(path)
    }
}

/// Warn about schema tags the prototype table does not carry
fn validate_prototype(
    document: &DocxDocument,
    tables: &[docx_core::TableHandle],
    schema: &LayoutSchema,
    run: &mut BuildRun<'_>,
) -> Result<()> {
    let prototype = document.table(tables[0])?;
    let index = TagIndex::build(prototype);

    for slot in 1..=schema.items_per_page {
        for (field, tag) in schema.slot_tags(slot) {
            if !index.contains(&tag) {
                run.warn(Issue::warning(
                    "PlaceholderAbsent",
                    format!("tag '{}' for field '{}' is not in the template table", tag, field),
                ));
            }
        }
    }

    if let Some(expected) = &schema.template_table_tag {
        let caption = prototype
            .child("tblPr")
            .and_then(|p| p.child("tblCaption"))
            .and_then(|c| c.attribute("val"));
        if caption != Some(expected.as_str()) {
            run.warn(Issue::warning(
                "TemplateTableTagMismatch",
                format!(
                    "template table caption is {:?}, schema expects '{}'",
                    caption, expected
                ),
            ));
        }
    }

    Ok(())
}

/// Write document-level values across the whole body
///
/// Every meta tag the schema names is written; keys the request leaves out
/// are blanked so the template's example text never reaches the output.
fn write_meta_fields(
    document: &mut DocxDocument,
    schema: &LayoutSchema,
    meta: &BTreeMap<String, Option<String>>,
    run: &mut BuildRun<'_>,
) -> Result<()> {
    for key in meta.keys() {
        if !schema.meta_field_tags.contains_key(key) {
            run.warn(Issue::warning(
                "UnknownMetaField",
                format!("schema has no meta field '{}'", key),
            ));
        }
    }
    if schema.meta_field_tags.is_empty() {
        return Ok(());
    }

    let mut writer = ScopedWriter::new(document.body_mut()?);
    for (key, tag) in &schema.meta_field_tags {
        let value = meta.get(key).and_then(|value| value.as_deref());
        writer.try_write(tag, value)?;
    }
    Ok(())
}
