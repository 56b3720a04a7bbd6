use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::error::Result;
use crate::introspect::{
    parse_version, query_error, ColumnRow, IdentifierCaseFlags, ImportedKeyRow, MetadataSource, PrimaryKeyRow,
    RelationKind, RelationRow, COLUMN_NO_NULLS, COLUMN_NULLABLE,
};
use crate::model::schema::DbmsInfo;
use crate::model::types::SqlType;

/// SQLite source. Only the `main` database is read and relation ids carry
/// neither catalog nor schema; any schema filter is ignored.
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn relation_names(&self) -> Result<Vec<(String, String)>> {
        let query = "SELECT name, type FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name";
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error("list relations"))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("name"), row.get("type")))
            .collect())
    }

    /// Columns of the relation's primary key, in key order.
    async fn primary_key_columns(&self, relation: &str) -> Result<Vec<PrimaryKeyRow>> {
        let query = format!("PRAGMA table_info(\"{}\")", escape(relation));
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error(format!("PRAGMA table_info({})", relation)))?;

        let mut pks: Vec<PrimaryKeyRow> = rows
            .into_iter()
            .filter_map(|row| {
                let pk: i64 = row.get("pk");
                (pk > 0).then(|| PrimaryKeyRow {
                    column_name: row.get("name"),
                    sequence_number: pk as i32,
                })
            })
            .collect();
        pks.sort_by_key(|pk| pk.sequence_number);
        Ok(pks)
    }
}

fn escape(identifier: &str) -> String {
    identifier.replace('"', "\"\"")
}

/// Pull `(size, scale)` out of a declared type such as `DECIMAL(10,2)` or
/// `VARCHAR(40)`.
fn declared_size(declared: &str) -> (Option<i32>, Option<i32>) {
    let inner = match (declared.find('('), declared.rfind(')')) {
        (Some(open), Some(close)) if close > open => &declared[open + 1..close],
        _ => return (None, None),
    };
    let mut parts = inner.split(',').map(|p| p.trim().parse::<i32>().ok());
    let size = parts.next().flatten();
    let scale = parts.next().flatten();
    (size, scale)
}

/// Declared type name without any size suffix, upper-cased.
/// The relation name as stored in `sqlite_master` for a name written in DDL,
/// which SQLite matches ignoring ASCII case.
fn registered_name(relations: &[(String, String)], written: &str) -> String {
    relations
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(written))
        .map_or_else(|| written.to_string(), |(name, _)| name.clone())
}

fn declared_base(declared: &str) -> String {
    declared
        .split('(')
        .next()
        .unwrap_or(declared)
        .trim()
        .to_uppercase()
}

impl MetadataSource for SqliteSource {
    async fn case_sensitivity_flags(&self) -> Result<IdentifierCaseFlags> {
        Ok(IdentifierCaseFlags {
            stores_mixed: true,
            ..Default::default()
        })
    }

    async fn list_relations(&self, _schema: Option<&str>, kinds: &[RelationKind]) -> Result<Vec<RelationRow>> {
        let relations = self.relation_names().await?;
        Ok(relations
            .into_iter()
            .filter(|(_, kind)| {
                let kind = if kind == "table" {
                    RelationKind::Table
                } else {
                    RelationKind::View
                };
                kinds.contains(&kind)
            })
            .map(|(name, kind)| RelationRow {
                catalog: None,
                schema: None,
                name,
                kind: kind.to_uppercase(),
                comment: None,
            })
            .collect())
    }

    async fn list_columns(&self, _schema: Option<&str>) -> Result<Vec<ColumnRow>> {
        let mut columns = Vec::new();
        for (relation, _) in self.relation_names().await? {
            let query = format!("PRAGMA table_info(\"{}\")", escape(&relation));
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(query_error(format!("PRAGMA table_info({})", relation)))?;

            for row in rows {
                let declared: String = row.get("type");
                let notnull: i64 = row.get("notnull");
                let sql_type = SqlType::from_native(&declared);
                let (size, scale) = declared_size(&declared);

                columns.push(ColumnRow {
                    catalog: None,
                    schema: None,
                    relation_name: relation.clone(),
                    column_name: row.get("name"),
                    type_code: sql_type.code(),
                    type_name: declared_base(&declared),
                    column_size: size,
                    decimal_digits: scale,
                    radix: sql_type.is_numeric().then_some(10),
                    nullable_code: if notnull == 0 {
                        COLUMN_NULLABLE
                    } else {
                        COLUMN_NO_NULLS
                    },
                    remarks: None,
                });
            }
        }
        Ok(columns)
    }

    async fn list_primary_keys(
        &self,
        _catalog: Option<&str>,
        _schema: Option<&str>,
        relation: &str,
    ) -> Result<Vec<PrimaryKeyRow>> {
        self.primary_key_columns(relation).await
    }

    async fn list_imported_keys(&self, _schema: Option<&str>) -> Result<Vec<ImportedKeyRow>> {
        let mut keys = Vec::new();
        let relations = self.relation_names().await?;
        for (relation, kind) in &relations {
            if kind != "table" {
                continue;
            }
            let query = format!("PRAGMA foreign_key_list(\"{}\")", escape(relation));
            let rows = sqlx::query(&query)
                .fetch_all(&self.pool)
                .await
                .map_err(query_error(format!("PRAGMA foreign_key_list({})", relation)))?;

            // Rows come back grouped by key id; seq is 0-based within a key
            let mut parsed: Vec<(i64, i64, String, String, Option<String>)> = rows
                .into_iter()
                .map(|row| (row.get("id"), row.get("seq"), row.get("table"), row.get("from"), row.get("to")))
                .collect();
            parsed.sort_by_key(|(id, seq, ..)| (*id, *seq));

            for (_, seq, written_parent, from, to) in parsed {
                let parent = registered_name(&relations, &written_parent);
                // A key declared without a column list references the parent's primary key
                let pk_column = match to {
                    Some(to) => to,
                    None => self
                        .primary_key_columns(&parent)
                        .await?
                        .into_iter()
                        .nth(seq as usize)
                        .map(|pk| pk.column_name)
                        .unwrap_or_default(),
                };
                keys.push(ImportedKeyRow {
                    fk_catalog: None,
                    fk_schema: None,
                    fk_relation: relation.clone(),
                    fk_column: from,
                    pk_catalog: None,
                    pk_schema: None,
                    pk_relation: parent,
                    pk_column,
                    component_sequence: seq as i32 + 1,
                });
            }
        }
        Ok(keys)
    }

    async fn dbms_info(&self) -> Result<DbmsInfo> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error("sqlite version"))?;

        let (major_version, minor_version) = parse_version(&version);
        Ok(DbmsInfo {
            name: Some("SQLite".to_string()),
            version: Some(version),
            major_version,
            minor_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_size() {
        assert_eq!(declared_size("DECIMAL(10,2)"), (Some(10), Some(2)));
        assert_eq!(declared_size("VARCHAR(40)"), (Some(40), None));
        assert_eq!(declared_size("INTEGER"), (None, None));
        assert_eq!(declared_size(""), (None, None));
    }

    #[test]
    fn test_declared_base() {
        assert_eq!(declared_base("varchar(40)"), "VARCHAR");
        assert_eq!(declared_base("integer"), "INTEGER");
        assert_eq!(declared_base(""), "");
    }

    #[test]
    fn test_registered_name_ignores_case() {
        let relations = vec![
            ("customers".to_string(), "table".to_string()),
            ("Orders".to_string(), "table".to_string()),
        ];
        assert_eq!(registered_name(&relations, "Customers"), "customers");
        assert_eq!(registered_name(&relations, "ORDERS"), "Orders");
        assert_eq!(registered_name(&relations, "missing"), "missing");
    }

    #[test]
    fn test_escape_doubles_quotes() {
        assert_eq!(escape("odd\"name"), "odd\"\"name");
    }
}
