//! # Options File Parser
//!
//! Reads and validates `dbmd.toml`, the optional options file that supplies
//! defaults for `dbmd fetch` without requiring CLI flags. Supports:
//!
//! - `[database]`: default connection URL and schema
//! - `[fetch]`: date mapping, exclusion pattern, what to include
//!
//! Example `dbmd.toml`:
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/app"
//! schema = "public"
//!
//! [fetch]
//! date_mapping = "dates-as-timestamps"
//! exclude = "^public\\.flyway_.*"
//! views = false
//! ```
//!
//! Every problem with the file (unreadable, bad TOML, invalid regex, unknown
//! date mapping) is reported as [`DbmdError::Config`] when the file is read,
//! before any connection is opened.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DbmdError, Result};
use crate::fetch::{compile_exclude, DateMapping, FetchOptions};

/// Default options file name.
pub const OPTIONS_FILE_NAME: &str = "dbmd.toml";

/// Schema argument meaning "relations of every schema".
pub const ANY_SCHEMA_TOKEN: &str = "*any-owners*";

/// Top-level dbmd.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DbmdOptions {
    pub database: DatabaseOptions,
    pub fetch: FetchSection,

    /// Path the options were read from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// Database URL (e.g., "postgres://localhost/app").
    pub url: Option<String>,
    /// Schema to fetch. `<none>` selects the empty-string schema and
    /// `*any-owners*` every schema.
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    /// One of `dates-as-driver-reported`, `dates-as-timestamps`, `dates-as-dates`.
    pub date_mapping: Option<String>,
    /// Regex matched against canonical relation id strings.
    pub exclude: Option<String>,
    pub tables: Option<bool>,
    pub views: Option<bool>,
    pub fields: Option<bool>,
    pub foreign_keys: Option<bool>,
}

/// Read, parse and validate an options file.
pub fn read_options(path: &Path) -> Result<DbmdOptions> {
    let content = std::fs::read_to_string(path).map_err(|e| DbmdError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let mut options: DbmdOptions = toml::from_str(&content).map_err(|e| DbmdError::Config {
        message: format!("Failed to parse {}: {}", path.display(), e),
    })?;
    options.source_path = Some(path.to_path_buf());

    options.validate()?;
    tracing::debug!("Read options from {}", path.display());

    Ok(options)
}

/// Read `dbmd.toml` from `dir` if it exists.
///
/// Returns `None` if the file doesn't exist (options are optional).
pub fn find_options(dir: &Path) -> Result<Option<DbmdOptions>> {
    let path = dir.join(OPTIONS_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    read_options(&path).map(Some)
}

/// Map the schema argument onto a fetch filter: the any-schema token means
/// no filter.
pub fn schema_filter(schema: Option<&str>) -> Option<&str> {
    schema.filter(|s| *s != ANY_SCHEMA_TOKEN)
}

impl DbmdOptions {
    /// Check what serde cannot: the exclusion regex compiles and the date
    /// mapping names a known mode.
    pub fn validate(&self) -> Result<()> {
        self.date_mapping()?;
        if let Some(pattern) = &self.fetch.exclude {
            compile_exclude(pattern)?;
        }
        Ok(())
    }

    pub fn date_mapping(&self) -> Result<DateMapping> {
        match &self.fetch.date_mapping {
            Some(raw) => raw.parse(),
            None => Ok(DateMapping::default()),
        }
    }

    /// Fetch options described by this file, with everything unset left at
    /// the defaults.
    pub fn fetch_options(&self) -> Result<FetchOptions> {
        let defaults = FetchOptions::default();
        Ok(FetchOptions {
            date_mapping: self.date_mapping()?,
            include_tables: self.fetch.tables.unwrap_or(defaults.include_tables),
            include_views: self.fetch.views.unwrap_or(defaults.include_views),
            include_fields: self.fetch.fields.unwrap_or(defaults.include_fields),
            include_foreign_keys: self.fetch.foreign_keys.unwrap_or(defaults.include_foreign_keys),
            exclude: self.fetch.exclude.as_deref().map(compile_exclude).transpose()?,
        })
    }
}
