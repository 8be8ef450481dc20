//! Template identities and on-disk template lookup

use crate::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Version used when a template identity does not name one
pub const DEFAULT_TEMPLATE_VERSION: &str = "v1";

/// File extension of template packages
pub const TEMPLATE_EXTENSION: &str = "docx";

/// Names the prototype document of a form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateIdentity {
    pub form_code: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl TemplateIdentity {
    /// Identity of the default version of a form
    pub fn new(form_code: impl Into<String>) -> Self {
        Self {
            form_code: form_code.into(),
            version: None,
        }
    }

    /// Builder: pin a version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The version to load (`v1` when none or blank)
    pub fn resolved_version(&self) -> &str {
        match self.version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => version,
            _ => DEFAULT_TEMPLATE_VERSION,
        }
    }
}

impl fmt::Display for TemplateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.form_code, self.resolved_version())
    }
}

/// Resolves template identities to files under `{root}/Word`
///
/// Every call opens a fresh, exclusively owned stream; the file handle is
/// released when the caller drops it. Template bytes are never cached.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    /// Create a store rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Templates root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the template package for `identity`
    pub fn template_path(&self, identity: &TemplateIdentity) -> PathBuf {
        template_path_in(&self.root, identity)
    }

    /// Open the template package for `identity`
    pub fn open(&self, identity: &TemplateIdentity) -> Result<File> {
        Self::open_in(&self.root, identity)
    }

    /// Open the template package for `identity` under another root
    pub fn open_in(root: &Path, identity: &TemplateIdentity) -> Result<File> {
        let path = template_path_in(root, identity);
        if !path.is_file() {
            return Err(TemplateError::TemplateNotFound {
                identity: identity.clone(),
                path,
            });
        }
        Ok(File::open(path)?)
    }
}

fn template_path_in(root: &Path, identity: &TemplateIdentity) -> PathBuf {
    root.join("Word")
        .join(&identity.form_code)
        .join(format!("{}.{}", identity.resolved_version(), TEMPLATE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    #[test]
    fn test_missing_version_defaults_to_v1() {
        let store = TemplateStore::new("Templates");
        assert_eq!(
            store.template_path(&TemplateIdentity::new("2")),
            PathBuf::from("Templates/Word/2/v1.docx")
        );
        assert_eq!(
            store.template_path(&TemplateIdentity::new("2").with_version(" ")),
            PathBuf::from("Templates/Word/2/v1.docx")
        );
        assert_eq!(
            store.template_path(&TemplateIdentity::new("2").with_version("v3")),
            PathBuf::from("Templates/Word/2/v3.docx")
        );
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(TemplateIdentity::new("7").to_string(), "7/v1");
        assert_eq!(
            TemplateIdentity::new("7").with_version("v2").to_string(),
            "7/v2"
        );
    }

    #[test]
    fn test_open_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());
        let result = store.open(&TemplateIdentity::new("2"));
        assert!(matches!(result, Err(TemplateError::TemplateNotFound { .. })));
    }

    #[test]
    fn test_open_returns_fresh_streams() {
        let dir = tempfile::tempdir().unwrap();
        let form_dir = dir.path().join("Word").join("2");
        std::fs::create_dir_all(&form_dir).unwrap();
        std::fs::write(form_dir.join("v1.docx"), b"package").unwrap();

        let store = TemplateStore::new(dir.path());
        let identity = TemplateIdentity::new("2");
        for _ in 0..2 {
            let mut contents = Vec::new();
            store
                .open(&identity)
                .unwrap()
                .read_to_end(&mut contents)
                .unwrap();
            assert_eq!(contents, b"package");
        }
    }
}
