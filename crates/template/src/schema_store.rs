//! Layout schema registry
//!
//! Schemas live at `{root}/Schemas/Form{formCode}.schema.json`. The store
//! owns its cache: each form code maps to a get-or-create cell, so
//! concurrent lookups of one uncached code load the file once while other
//! codes proceed independently. The map lock is only held to fetch the
//! cell, never while reading from disk. Failed loads leave the cell empty,
//! so a corrected file is picked up by the next lookup.

use crate::{LayoutSchema, Result, TemplateError};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SchemaCell = Arc<OnceCell<Arc<LayoutSchema>>>;

/// Loads, validates and caches layout schemas
pub struct SchemaStore {
    root: PathBuf,
    caching: bool,
    cells: Mutex<HashMap<String, SchemaCell>>,
    /// Number of schema files read from disk
    loads: AtomicUsize,
}

impl SchemaStore {
    /// Create a store rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P, caching: bool) -> Self {
        Self {
            root: root.into(),
            caching,
            cells: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Schemas root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the schema file for `form_code`
    pub fn schema_path(&self, form_code: &str) -> PathBuf {
        self.root
            .join("Schemas")
            .join(format!("Form{}.schema.json", form_code))
    }

    /// Get the validated schema for `form_code`
    pub fn get(&self, form_code: &str) -> Result<Arc<LayoutSchema>> {
        if !self.caching {
            return self.load(form_code);
        }

        let cell = self
            .lock_cells()
            .entry(form_code.to_string())
            .or_default()
            .clone();
        cell.get_or_try_init(|| self.load(form_code)).map(Arc::clone)
    }

    /// Drop the cached schema of `form_code`
    pub fn invalidate(&self, form_code: &str) {
        self.lock_cells().remove(form_code);
    }

    /// Drop every cached schema
    pub fn clear(&self) {
        self.lock_cells().clear();
    }

    /// Number of successfully cached schemas
    pub fn cached_count(&self) -> usize {
        self.lock_cells()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Number of schema files read since the store was created
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn lock_cells(&self) -> MutexGuard<'_, HashMap<String, SchemaCell>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, form_code: &str) -> Result<Arc<LayoutSchema>> {
        let path = self.schema_path(form_code);
        if !path.is_file() {
            return Err(TemplateError::SchemaNotFound {
                form_code: form_code.to_string(),
                path,
            });
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        let json = std::fs::read_to_string(&path)?;
        LayoutSchema::from_json(&json, form_code).map(Arc::new)
    }
}
