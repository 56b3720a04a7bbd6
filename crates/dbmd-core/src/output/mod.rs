//! # Metadata Documents
//!
//! Writes a [`SchemaModel`] to, and reads it back from, an XML or JSON
//! document. Only base data is stored; the model's lookup indexes are rebuilt
//! on read.

pub mod json;
pub mod xml;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DbmdError, Result};
use crate::model::schema::SchemaModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Xml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON; everything else is XML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Xml,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Xml => write!(f, "xml"),
            DocumentFormat::Json => write!(f, "json"),
        }
    }
}

pub fn write_model<W: Write>(writer: &mut W, model: &SchemaModel, format: DocumentFormat) -> Result<()> {
    match format {
        DocumentFormat::Xml => xml::write_xml(writer, model),
        DocumentFormat::Json => json::write_json(writer, model),
    }
}

pub fn read_model<R: Read>(reader: R, format: DocumentFormat) -> Result<SchemaModel> {
    match format {
        DocumentFormat::Xml => xml::read_xml(reader),
        DocumentFormat::Json => json::read_json(reader),
    }
}

/// Write the model to `path`. Without an explicit format it is chosen from
/// the file extension. Returns the format written.
pub fn write_document(path: &Path, model: &SchemaModel, format: Option<DocumentFormat>) -> Result<DocumentFormat> {
    let format = format.unwrap_or_else(|| DocumentFormat::from_path(path));

    let file = File::create(path).map_err(|e| DbmdError::Output {
        message: format!("creating {}", path.display()),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    write_model(&mut writer, model, format)?;
    writer.flush().map_err(|e| DbmdError::Output {
        message: format!("flushing {}", path.display()),
        source: e,
    })?;

    tracing::debug!("Wrote {} document to {}", format, path.display());
    Ok(format)
}

/// Read a model from `path`, choosing the format from the extension unless
/// one is given.
pub fn read_document(path: &Path, format: Option<DocumentFormat>) -> Result<SchemaModel> {
    let format = format.unwrap_or_else(|| DocumentFormat::from_path(path));

    let file = File::open(path).map_err(|e| DbmdError::Output {
        message: format!("opening {}", path.display()),
        source: e,
    })?;
    read_model(BufReader::new(file), format)
}

/// Helper to write a string slice and map IO errors.
fn write_str<W: Write>(writer: &mut W, s: &str, what: &str) -> Result<()> {
    writer.write_all(s.as_bytes()).map_err(|e| DbmdError::Output {
        message: format!("writing {}", what),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("md.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("md.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("md.xml")), DocumentFormat::Xml);
        assert_eq!(DocumentFormat::from_path(&PathBuf::from("metadata")), DocumentFormat::Xml);
    }
}
