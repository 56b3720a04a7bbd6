use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::error::Result;
use crate::introspect::{
    non_empty, parse_version, query_error, ColumnRow, IdentifierCaseFlags, ImportedKeyRow, MetadataSource,
    PrimaryKeyRow, RelationKind, RelationRow, COLUMN_NO_NULLS, COLUMN_NULLABLE,
};
use crate::model::schema::DbmsInfo;
use crate::model::types::SqlType;

pub struct PostgresSource {
    pool: PgPool,
}

impl PostgresSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Portable code for a column, from `information_schema.columns`. User-defined
/// and array columns only say so in `data_type`; the real name is in `udt_name`.
fn column_type_code(data_type: &str, udt_name: &str) -> i32 {
    match data_type {
        "USER-DEFINED" => SqlType::from_native(udt_name).code(),
        "ARRAY" => SqlType::Array.code(),
        other => SqlType::from_native(other).code(),
    }
}

impl MetadataSource for PostgresSource {
    async fn case_sensitivity_flags(&self) -> Result<IdentifierCaseFlags> {
        Ok(IdentifierCaseFlags {
            stores_lower: true,
            ..Default::default()
        })
    }

    async fn list_relations(&self, schema: Option<&str>, kinds: &[RelationKind]) -> Result<Vec<RelationRow>> {
        let query = r#"
            SELECT
                t.table_schema::text AS table_schema,
                t.table_name::text AS table_name,
                CASE t.table_type WHEN 'BASE TABLE' THEN 'TABLE' ELSE t.table_type::text END AS kind,
                obj_description(
                    (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass,
                    'pg_class'
                ) AS comment
            FROM information_schema.tables t
            WHERE ($1::text IS NULL OR t.table_schema = $1)
                AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
                AND ((t.table_type = 'BASE TABLE' AND $2) OR (t.table_type = 'VIEW' AND $3))
            ORDER BY t.table_schema, t.table_name
        "#;

        let rows = sqlx::query(query)
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
                comment: row.get("comment"),
            })
            .collect())
    }

    async fn list_columns(&self, schema: Option<&str>) -> Result<Vec<ColumnRow>> {
        let query = r#"
            SELECT
                c.table_schema::text AS table_schema,
                c.table_name::text AS table_name,
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                c.udt_name::text AS udt_name,
                COALESCE(c.character_maximum_length, c.numeric_precision)::int4 AS column_size,
                c.numeric_scale::int4 AS decimal_digits,
                c.numeric_precision_radix::int4 AS radix,
                c.is_nullable::text AS is_nullable,
                col_description(
                    (quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass,
                    c.ordinal_position::int4
                ) AS remarks
            FROM information_schema.columns c
            WHERE ($1::text IS NULL OR c.table_schema = $1)
                AND c.table_schema NOT IN ('pg_catalog', 'information_schema')
            ORDER BY c.table_schema, c.table_name, c.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list columns"))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let data_type: String = row.get("data_type");
                let udt_name: String = row.get("udt_name");
                let is_nullable: String = row.get("is_nullable");
                ColumnRow {
                    catalog: None,
                    schema: non_empty(row.get("table_schema")),
                    relation_name: row.get("table_name"),
                    column_name: row.get("column_name"),
                    type_code: column_type_code(&data_type, &udt_name),
                    type_name: udt_name,
                    column_size: row.get("column_size"),
                    decimal_digits: row.get("decimal_digits"),
                    radix: row.get("radix"),
                    nullable_code: if is_nullable == "YES" {
                        COLUMN_NULLABLE
                    } else {
                        COLUMN_NO_NULLS
                    },
                    remarks: row.get("remarks"),
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
                kcu.column_name::text AS column_name,
                kcu.ordinal_position::int4 AS ordinal_position
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE ($1::text IS NULL OR tc.table_schema = $1)
                AND tc.table_name = $2
                AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY kcu.ordinal_position
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .bind(relation)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error(format!("list primary keys of {}", relation)))?;

        Ok(rows
            .into_iter()
            .map(|row| PrimaryKeyRow {
                column_name: row.get("column_name"),
                sequence_number: row.get("ordinal_position"),
            })
            .collect())
    }

    async fn list_imported_keys(&self, schema: Option<&str>) -> Result<Vec<ImportedKeyRow>> {
        // pg_constraint keeps the column pairing of composite keys; the
        // information_schema views do not.
        let query = r#"
            SELECT
                fn.nspname::text AS fk_schema,
                fc.relname::text AS fk_relation,
                fa.attname::text AS fk_column,
                pn.nspname::text AS pk_schema,
                pc.relname::text AS pk_relation,
                pa.attname::text AS pk_column,
                k.n::int4 AS component_sequence
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class fc ON fc.oid = con.conrelid
            JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace
            JOIN pg_catalog.pg_class pc ON pc.oid = con.confrelid
            JOIN pg_catalog.pg_namespace pn ON pn.oid = pc.relnamespace
            CROSS JOIN LATERAL generate_subscripts(con.conkey, 1) AS k(n)
            JOIN pg_catalog.pg_attribute fa
                ON fa.attrelid = con.conrelid AND fa.attnum = con.conkey[k.n]
            JOIN pg_catalog.pg_attribute pa
                ON pa.attrelid = con.confrelid AND pa.attnum = con.confkey[k.n]
            WHERE con.contype = 'f'
                AND ($1::text IS NULL OR fn.nspname = $1)
            ORDER BY fn.nspname, fc.relname, con.conname, k.n
        "#;

        let rows = sqlx::query(query)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list imported keys"))?;

        Ok(rows
            .into_iter()
            .map(|row| ImportedKeyRow {
                fk_catalog: None,
                fk_schema: non_empty(row.get("fk_schema")),
                fk_relation: row.get("fk_relation"),
                fk_column: row.get("fk_column"),
                pk_catalog: None,
                pk_schema: non_empty(row.get("pk_schema")),
                pk_relation: row.get("pk_relation"),
                pk_column: row.get("pk_column"),
                component_sequence: row.get("component_sequence"),
            })
            .collect())
    }

    async fn dbms_info(&self) -> Result<DbmsInfo> {
        let version: String = sqlx::query_scalar("SELECT current_setting('server_version')")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("server version"))?;

        let (major_version, minor_version) = parse_version(&version);
        Ok(DbmsInfo {
            name: Some("PostgreSQL".to_string()),
            version: Some(version),
            major_version,
            minor_version,
        })
    }
}
