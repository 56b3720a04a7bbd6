//! # Error Types
//!
//! Defines `DbmdError`, the unified error enum for every failure mode in the
//! fetch → model → document pipeline. Variants carry the relation ids, query
//! labels or file paths needed to act on the error without digging through
//! logs.

use thiserror::Error;

/// All errors that can occur in dbmd operations.
#[derive(Error, Debug)]
pub enum DbmdError {
    #[error("Database connection failed: {message}\n  Connection string: {connection_hint}\n  Cause: {source}")]
    Connection {
        message: String,
        connection_hint: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Metadata introspection failed on query '{query}': {source}")]
    Introspection {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Introspection returned malformed rows: {message}")]
    MalformedRows { message: String },

    #[error("No database URL provided. dbmd looks for a connection in this order:\n  1. --db flag\n  2. DATABASE_URL environment variable\n  3. .env file with DATABASE_URL\n  4. [database] url in the options file\n\nExample: dbmd fetch --db postgres://localhost/myapp metadata.xml")]
    NoDatabaseUrl,

    #[error("Unsupported database scheme '{scheme}'. Supported: postgres://, mysql://, sqlite://")]
    UnsupportedDatabase { scheme: String },

    #[error("Relation {relation} not found.")]
    RelationNotFound { relation: String },

    #[error("Child table {child} has multiple foreign keys to parent table {parent}{}", ambiguity_detail(.field_names))]
    AmbiguousForeignKey {
        child: String,
        parent: String,
        field_names: Option<String>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Output error: {message}: {source}")]
    Output {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata document error: {message}")]
    Document { message: String },
}

fn ambiguity_detail(field_names: &Option<String>) -> String {
    match field_names {
        Some(fields) => format!(" with the same specified source field set ({}).", fields),
        None => " and no foreign key field names were specified to disambiguate.".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, DbmdError>;
