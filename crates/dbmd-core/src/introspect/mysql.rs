use sqlx::mysql::MySqlPool;
use sqlx::Row;

use crate::error::Result;
use crate::introspect::{
    non_empty, parse_version, query_error, ColumnRow, IdentifierCaseFlags, ImportedKeyRow, MetadataSource,
    PrimaryKeyRow, RelationKind, RelationRow, COLUMN_NO_NULLS, COLUMN_NULLABLE,
};
use crate::model::schema::DbmsInfo;
use crate::model::types::SqlType;

/// Schemas MySQL uses for itself; skipped when no schema filter is given.
const SYSTEM_SCHEMAS: &str = "('mysql', 'information_schema', 'performance_schema', 'sys')";

/// MySQL source. A MySQL "database" is reported as the schema component of
/// relation ids; the catalog is always absent.
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn to_i32(value: Option<i64>) -> Option<i32> {
    value.and_then(|v| i32::try_from(v).ok())
}

/// `lower_case_table_names` 1 stores names lower-cased; 0 and 2 keep them as
/// created.
fn case_flags(lower_case_table_names: i64) -> IdentifierCaseFlags {
    if lower_case_table_names == 1 {
        IdentifierCaseFlags {
            stores_lower: true,
            ..Default::default()
        }
    } else {
        IdentifierCaseFlags {
            stores_mixed: true,
            ..Default::default()
        }
    }
}

fn remark(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl MetadataSource for MySqlSource {
    async fn case_sensitivity_flags(&self) -> Result<IdentifierCaseFlags> {
        let lctn: i64 = sqlx::query_scalar("SELECT CAST(@@lower_case_table_names AS SIGNED)")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("lower_case_table_names"))?;
        Ok(case_flags(lctn))
    }

    async fn list_relations(&self, schema: Option<&str>, kinds: &[RelationKind]) -> Result<Vec<RelationRow>> {
        let query = format!(
            r#"
            SELECT
                CAST(table_schema AS CHAR) AS table_schema,
                CAST(table_name AS CHAR) AS table_name,
                CAST(CASE table_type WHEN 'BASE TABLE' THEN 'TABLE' ELSE table_type END AS CHAR) AS kind,
                CAST(table_comment AS CHAR) AS comment
            FROM information_schema.tables
            WHERE (? IS NULL OR table_schema = ?)
                AND table_schema NOT IN {}
                AND ((table_type = 'BASE TABLE' AND ?) OR (table_type IN ('VIEW', 'SYSTEM VIEW') AND ?))
            ORDER BY table_schema, table_name
            "#,
            SYSTEM_SCHEMAS
        );

        let rows = sqlx::query(&query)
            .bind(schema)
            .bind(schema)
            .bind(kinds.contains(&RelationKind::Table))
            .bind(kinds.contains(&RelationKind::View))
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list relations"))?;

        Ok(rows
            .into_iter()
            .map(|row| RelationRow {
                catalog: None,
                schema: non_empty(row.get("table_schema")),
                name: row.get("table_name"),
                kind: row.get("kind"),
                comment: remark(row.get("comment")),
            })
            .collect())
    }

    async fn list_columns(&self, schema: Option<&str>) -> Result<Vec<ColumnRow>> {
        let query = format!(
            r#"
            SELECT
                CAST(table_schema AS CHAR) AS table_schema,
                CAST(table_name AS CHAR) AS table_name,
                CAST(column_name AS CHAR) AS column_name,
                CAST(data_type AS CHAR) AS data_type,
                CAST(column_type AS CHAR) AS column_type,
                CAST(COALESCE(character_maximum_length, numeric_precision) AS SIGNED) AS column_size,
                CAST(numeric_scale AS SIGNED) AS decimal_digits,
                CAST(is_nullable AS CHAR) AS is_nullable,
                CAST(column_comment AS CHAR) AS remarks
            FROM information_schema.columns
            WHERE (? IS NULL OR table_schema = ?)
                AND table_schema NOT IN {}
            ORDER BY table_schema, table_name, ordinal_position
            "#,
            SYSTEM_SCHEMAS
        );

        let rows = sqlx::query(&query)
            .bind(schema)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list columns"))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let data_type: String = row.get("data_type");
                let column_type: String = row.get("column_type");
                let is_nullable: String = row.get("is_nullable");
                let sql_type = SqlType::from_native(&column_type);
                ColumnRow {
                    catalog: None,
                    schema: non_empty(row.get("table_schema")),
                    relation_name: row.get("table_name"),
                    column_name: row.get("column_name"),
                    type_code: sql_type.code(),
                    type_name: data_type.to_uppercase(),
                    column_size: to_i32(row.get("column_size")),
                    decimal_digits: to_i32(row.get("decimal_digits")),
                    radix: sql_type.is_numeric().then_some(10),
                    nullable_code: if is_nullable == "YES" {
                        COLUMN_NULLABLE
                    } else {
                        COLUMN_NO_NULLS
                    },
                    remarks: remark(row.get("remarks")),
                }
            })
            .collect())
    }

    async fn list_primary_keys(
        &self,
        _catalog: Option<&str>,
        schema: Option<&str>,
        relation: &str,
    ) -> Result<Vec<PrimaryKeyRow>> {
        let query = r#"
            SELECT
                CAST(column_name AS CHAR) AS column_name,
                CAST(ordinal_position AS SIGNED) AS ordinal_position
            FROM information_schema.key_column_usage
            WHERE (? IS NULL OR table_schema = ?)
                AND table_name = ?
                AND constraint_name = 'PRIMARY'
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .bind(schema)
            .bind(relation)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error(format!("list primary keys of {}", relation)))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let position: i64 = row.get("ordinal_position");
                Some(PrimaryKeyRow {
                    column_name: row.get("column_name"),
                    sequence_number: i32::try_from(position).ok()?,
                })
            })
            .collect())
    }

    async fn list_imported_keys(&self, schema: Option<&str>) -> Result<Vec<ImportedKeyRow>> {
        let query = r#"
            SELECT
                CAST(table_schema AS CHAR) AS fk_schema,
                CAST(table_name AS CHAR) AS fk_relation,
                CAST(column_name AS CHAR) AS fk_column,
                CAST(referenced_table_schema AS CHAR) AS pk_schema,
                CAST(referenced_table_name AS CHAR) AS pk_relation,
                CAST(referenced_column_name AS CHAR) AS pk_column,
                CAST(ordinal_position AS SIGNED) AS component_sequence
            FROM information_schema.key_column_usage
            WHERE referenced_table_name IS NOT NULL
                AND (? IS NULL OR table_schema = ?)
            ORDER BY table_schema, table_name, constraint_name, ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list imported keys"))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let seq: i64 = row.get("component_sequence");
                Some(ImportedKeyRow {
                    fk_catalog: None,
                    fk_schema: non_empty(row.get("fk_schema")),
                    fk_relation: row.get("fk_relation"),
                    fk_column: row.get("fk_column"),
                    pk_catalog: None,
                    pk_schema: non_empty(row.get("pk_schema")),
                    pk_relation: row.get("pk_relation"),
                    pk_column: row.get("pk_column"),
                    component_sequence: i32::try_from(seq).ok()?,
                })
            })
            .collect())
    }

    async fn dbms_info(&self) -> Result<DbmsInfo> {
        let version: String = sqlx::query_scalar("SELECT CAST(VERSION() AS CHAR)")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("server version"))?;

        let name = if version.to_lowercase().contains("mariadb") {
            "MariaDB"
        } else {
            "MySQL"
        };
        let (major_version, minor_version) = parse_version(&version);
        Ok(DbmsInfo {
            name: Some(name.to_string()),
            version: Some(version),
            major_version,
            minor_version,
        })
    }
}
