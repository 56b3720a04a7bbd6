//! # Metadata Sources
//!
//! A [`MetadataSource`] is the row-level view of a database catalog that the
//! fetcher consumes: relations, columns, primary keys and imported foreign
//! keys, each as a flat stream of rows. Backends answer with whatever the
//! engine's catalog reports; all grouping, filtering and normalization
//! happens in [`crate::fetch`].
//!
//! Ordering contract every backend honours:
//!
//! - `list_columns` yields all rows of one relation contiguously, in column
//!   order.
//! - `list_imported_keys` yields the components of one key contiguously,
//!   starting at component sequence 1.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{DbmdError, Result};
use crate::model::schema::DbmsInfo;

/// Column cannot hold nulls.
pub const COLUMN_NO_NULLS: i32 = 0;
/// Column may hold nulls.
pub const COLUMN_NULLABLE: i32 = 1;
/// Nullability not reported.
pub const COLUMN_NULLABLE_UNKNOWN: i32 = 2;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// Kinds of relation a listing can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Table,
    View,
}

impl RelationKind {
    /// The kind string sources report for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Table => "TABLE",
            RelationKind::View => "VIEW",
        }
    }
}

/// How the engine stores unquoted identifiers. At most one flag is expected
/// to be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentifierCaseFlags {
    pub stores_lower: bool,
    pub stores_upper: bool,
    pub stores_mixed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
    /// Engine kind string, e.g. `TABLE`, `VIEW`, `MATERIALIZED VIEW`.
    pub kind: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub relation_name: String,
    pub column_name: String,
    /// Portable type code as the driver reports it.
    pub type_code: i32,
    /// Native type name.
    pub type_name: String,
    pub column_size: Option<i32>,
    pub decimal_digits: Option<i32>,
    pub radix: Option<i32>,
    /// One of [`COLUMN_NO_NULLS`], [`COLUMN_NULLABLE`], [`COLUMN_NULLABLE_UNKNOWN`].
    pub nullable_code: i32,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyRow {
    pub column_name: String,
    /// 1-based position within the key.
    pub sequence_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKeyRow {
    pub fk_catalog: Option<String>,
    pub fk_schema: Option<String>,
    pub fk_relation: String,
    pub fk_column: String,
    pub pk_catalog: Option<String>,
    pub pk_schema: Option<String>,
    pub pk_relation: String,
    pub pk_column: String,
    /// 1-based; 1 marks the first component of a new key.
    pub component_sequence: i32,
}

/// Row-level access to a database catalog.
pub trait MetadataSource: Send + Sync {
    fn case_sensitivity_flags(&self) -> impl Future<Output = Result<IdentifierCaseFlags>> + Send;

    fn list_relations(
        &self,
        schema: Option<&str>,
        kinds: &[RelationKind],
    ) -> impl Future<Output = Result<Vec<RelationRow>>> + Send;

    fn list_columns(&self, schema: Option<&str>) -> impl Future<Output = Result<Vec<ColumnRow>>> + Send;

    fn list_primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        relation: &str,
    ) -> impl Future<Output = Result<Vec<PrimaryKeyRow>>> + Send;

    fn list_imported_keys(&self, schema: Option<&str>) -> impl Future<Output = Result<Vec<ImportedKeyRow>>> + Send;

    fn dbms_info(&self) -> impl Future<Output = Result<DbmsInfo>> + Send;
}

/// Determine the database type from a connection URL.
pub fn database_type_from_url(url: &str) -> Result<DatabaseType> {
    let scheme = url.split("://").next().unwrap_or("");
    let scheme = scheme.split(':').next().unwrap_or(scheme);
    match scheme {
        "postgres" | "postgresql" => Ok(DatabaseType::PostgreSQL),
        "mysql" | "mariadb" => Ok(DatabaseType::MySQL),
        "sqlite" | "file" => Ok(DatabaseType::SQLite),
        other => Err(DbmdError::UnsupportedDatabase {
            scheme: other.to_string(),
        }),
    }
}

/// A connected source for any supported engine.
pub enum AnySource {
    Postgres(postgres::PostgresSource),
    MySql(mysql::MySqlSource),
    Sqlite(sqlite::SqliteSource),
}

impl AnySource {
    pub fn database_type(&self) -> DatabaseType {
        match self {
            AnySource::Postgres(_) => DatabaseType::PostgreSQL,
            AnySource::MySql(_) => DatabaseType::MySQL,
            AnySource::Sqlite(_) => DatabaseType::SQLite,
        }
    }
}

/// Open a single-connection pool for `url` and wrap it in the matching backend.
pub async fn connect_source(url: &str) -> Result<AnySource> {
    let db_type = database_type_from_url(url)?;
    tracing::debug!("Connecting to {} at {}", db_type, sanitize_url(url));

    let connection_error = |e: sqlx::Error| DbmdError::Connection {
        message: format!("could not connect to {}", db_type),
        connection_hint: sanitize_url(url),
        source: e,
    };

    let source = match db_type {
        DatabaseType::PostgreSQL => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .map_err(connection_error)?;
            AnySource::Postgres(postgres::PostgresSource::new(pool))
        }
        DatabaseType::MySQL => {
            let pool = sqlx::mysql::MySqlPoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .map_err(connection_error)?;
            AnySource::MySql(mysql::MySqlSource::new(pool))
        }
        DatabaseType::SQLite => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(url)
                .await
                .map_err(connection_error)?;
            AnySource::Sqlite(sqlite::SqliteSource::new(pool))
        }
    };

    Ok(source)
}

impl MetadataSource for AnySource {
    async fn case_sensitivity_flags(&self) -> Result<IdentifierCaseFlags> {
        match self {
            AnySource::Postgres(s) => s.case_sensitivity_flags().await,
            AnySource::MySql(s) => s.case_sensitivity_flags().await,
            AnySource::Sqlite(s) => s.case_sensitivity_flags().await,
        }
    }

    async fn list_relations(&self, schema: Option<&str>, kinds: &[RelationKind]) -> Result<Vec<RelationRow>> {
        match self {
            AnySource::Postgres(s) => s.list_relations(schema, kinds).await,
            AnySource::MySql(s) => s.list_relations(schema, kinds).await,
            AnySource::Sqlite(s) => s.list_relations(schema, kinds).await,
        }
    }

    async fn list_columns(&self, schema: Option<&str>) -> Result<Vec<ColumnRow>> {
        match self {
            AnySource::Postgres(s) => s.list_columns(schema).await,
            AnySource::MySql(s) => s.list_columns(schema).await,
            AnySource::Sqlite(s) => s.list_columns(schema).await,
        }
    }

    async fn list_primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        relation: &str,
    ) -> Result<Vec<PrimaryKeyRow>> {
        match self {
            AnySource::Postgres(s) => s.list_primary_keys(catalog, schema, relation).await,
            AnySource::MySql(s) => s.list_primary_keys(catalog, schema, relation).await,
            AnySource::Sqlite(s) => s.list_primary_keys(catalog, schema, relation).await,
        }
    }

    async fn list_imported_keys(&self, schema: Option<&str>) -> Result<Vec<ImportedKeyRow>> {
        match self {
            AnySource::Postgres(s) => s.list_imported_keys(schema).await,
            AnySource::MySql(s) => s.list_imported_keys(schema).await,
            AnySource::Sqlite(s) => s.list_imported_keys(schema).await,
        }
    }

    async fn dbms_info(&self) -> Result<DbmsInfo> {
        match self {
            AnySource::Postgres(s) => s.dbms_info().await,
            AnySource::MySql(s) => s.dbms_info().await,
            AnySource::Sqlite(s) => s.dbms_info().await,
        }
    }
}

/// Sanitize a database URL for error messages (hide password).
pub fn sanitize_url(db_url: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(db_url) {
        if parsed.password().is_some() {
            let _ = parsed.set_password(Some("****"));
        }
        return parsed.to_string();
    }
    // SQLite file paths and the like are not URLs
    db_url.to_string()
}

/// Split a product version string such as `16.2 (Debian 16.2-1)` or
/// `8.0.36-0ubuntu0` into major and minor numbers.
pub fn parse_version(version: &str) -> (Option<i32>, Option<i32>) {
    let numeric: String = version
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = numeric.split('.').map(|p| p.parse::<i32>().ok());
    let major = parts.next().flatten();
    let minor = parts.next().flatten();
    (major, minor)
}

/// Treat an empty catalog or schema string as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Build an introspection error for the labelled query.
pub(crate) fn query_error(query: impl Into<String>) -> impl FnOnce(sqlx::Error) -> DbmdError {
    let query = query.into();
    move |source| DbmdError::Introspection { query, source }
}
