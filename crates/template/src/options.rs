//! Engine configuration

use crate::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do when a schema field is present on none of the items
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Leave the slots blank without reporting
    Ignore,
    /// Leave the slots blank and add a warning issue
    #[default]
    Warn,
}

/// Engine options, usually loaded from JSON
///
/// ```json
/// {
///   "templatesDirectory": "Templates",
///   "schemasDirectory": "Templates",
///   "outputDirectory": "Output",
///   "createOutputDirectoryIfNotExists": true,
///   "insertPageBreaks": true,
///   "enableSchemasCaching": true,
///   "missingFieldPolicy": "warn"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    /// Root holding `Word/{formCode}/{version}.docx`
    pub templates_directory: PathBuf,

    /// Root holding `Schemas/Form{formCode}.schema.json`
    pub schemas_directory: PathBuf,

    /// Where rendered documents are saved
    pub output_directory: PathBuf,

    pub create_output_directory_if_not_exists: bool,

    /// Separate page tables with forced page breaks
    pub insert_page_breaks: bool,

    pub enable_schemas_caching: bool,

    pub missing_field_policy: MissingFieldPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            templates_directory: PathBuf::from("Templates"),
            schemas_directory: PathBuf::from("Templates"),
            output_directory: PathBuf::from("Output"),
            create_output_directory_if_not_exists: true,
            insert_page_breaks: true,
            enable_schemas_caching: true,
            missing_field_policy: MissingFieldPolicy::default(),
        }
    }
}

impl EngineOptions {
    /// Options with every directory under one root
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            templates_directory: root.join("Templates"),
            schemas_directory: root.join("Templates"),
            output_directory: root.join("Output"),
            ..Self::default()
        }
    }

    /// Parse and validate options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Read, parse and validate options from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TemplateError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check the options, creating the output directory when allowed
    ///
    /// Blank paths are rejected. A missing output directory is an error
    /// unless `create_output_directory_if_not_exists` is set.
    pub fn validate(&self) -> Result<()> {
        let directories = [
            ("templatesDirectory", &self.templates_directory),
            ("schemasDirectory", &self.schemas_directory),
            ("outputDirectory", &self.output_directory),
        ];
        for (name, path) in directories {
            if path.to_string_lossy().trim().is_empty() {
                return Err(TemplateError::ConfigError(format!("{} must not be blank", name)));
            }
        }

        if !self.output_directory.is_dir() {
            if !self.create_output_directory_if_not_exists {
                return Err(TemplateError::ConfigError(format!(
                    "output directory {} does not exist",
                    self.output_directory.display()
                )));
            }
            std::fs::create_dir_all(&self.output_directory)?;
        }

        Ok(())
    }
}
