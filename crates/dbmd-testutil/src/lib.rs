use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;

use dbmd_core::ident::CaseSensitivity;
use dbmd_core::introspect::{
    ColumnRow, IdentifierCaseFlags, ImportedKeyRow, MetadataSource, PrimaryKeyRow, RelationKind, RelationRow,
    COLUMN_NO_NULLS, COLUMN_NULLABLE,
};
use dbmd_core::model::{
    DbmsInfo, Field, ForeignKey, ForeignKeyComponent, RelationId, RelationMetadata, RelationType, SchemaModel, SqlType,
};
use dbmd_core::error::DbmdError;
use dbmd_core::Result;

type RelationKey = (Option<String>, Option<String>, String);

/// One call of the [`MetadataSource`] interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStage {
    CaseFlags,
    Relations,
    Columns,
    PrimaryKeys,
    ImportedKeys,
    DbmsInfo,
}

/// A [`MetadataSource`] answering from rows held in memory.
///
/// Rows come back in the order they were added, so tests control exactly what
/// the fetcher sees, including out-of-contract orderings.
#[derive(Debug, Default)]
pub struct MemorySource {
    flags: IdentifierCaseFlags,
    relations: Vec<RelationRow>,
    columns: Vec<ColumnRow>,
    primary_keys: IndexMap<RelationKey, Vec<PrimaryKeyRow>>,
    imported_keys: Vec<ImportedKeyRow>,
    dbms: DbmsInfo,
    pk_lookups: AtomicUsize,
    failing_stage: Option<SourceStage>,
}

impl MemorySource {
    pub fn new(flags: IdentifierCaseFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    /// Source for an engine storing unquoted identifiers lower case.
    pub fn lower_case() -> Self {
        Self::new(IdentifierCaseFlags {
            stores_lower: true,
            ..Default::default()
        })
    }

    /// Source for an engine storing unquoted identifiers upper case.
    pub fn upper_case() -> Self {
        Self::new(IdentifierCaseFlags {
            stores_upper: true,
            ..Default::default()
        })
    }

    /// Make every call of `stage` fail with [`DbmdError::MalformedRows`].
    pub fn with_failing_stage(mut self, stage: SourceStage) -> Self {
        self.failing_stage = Some(stage);
        self
    }

    fn check(&self, stage: SourceStage) -> Result<()> {
        if self.failing_stage == Some(stage) {
            return Err(DbmdError::MalformedRows {
                message: format!("{:?} unavailable", stage),
            });
        }
        Ok(())
    }

    pub fn with_dbms(mut self, name: &str, version: &str) -> Self {
        let (major, minor) = dbmd_core::introspect::parse_version(version);
        self.dbms = DbmsInfo {
            name: Some(name.to_string()),
            version: Some(version.to_string()),
            major_version: major,
            minor_version: minor,
        };
        self
    }

    pub fn with_relation(mut self, schema: &str, name: &str, kind: &str) -> Self {
        self.relations.push(RelationRow {
            catalog: None,
            schema: Some(schema.to_string()),
            name: name.to_string(),
            kind: kind.to_string(),
            comment: None,
        });
        self
    }

    pub fn with_relation_row(mut self, row: RelationRow) -> Self {
        self.relations.push(row);
        self
    }

    /// Add a nullable column. Character columns get a size of 100, numeric
    /// ones a precision of 10.
    pub fn with_column(mut self, schema: &str, relation: &str, column: &str, sql_type: SqlType, native: &str) -> Self {
        let row = column_row(schema, relation, column, sql_type, native);
        self.columns.push(row);
        self
    }

    pub fn with_column_row(mut self, row: ColumnRow) -> Self {
        self.columns.push(row);
        self
    }

    /// Declare the primary key of a relation; columns are numbered from 1 and
    /// marked not null.
    pub fn with_primary_key(mut self, schema: &str, relation: &str, columns: &[&str]) -> Self {
        for col in self
            .columns
            .iter_mut()
            .filter(|c| c.schema.as_deref() == Some(schema) && c.relation_name == relation)
            .filter(|c| columns.contains(&c.column_name.as_str()))
        {
            col.nullable_code = COLUMN_NO_NULLS;
        }

        let rows = columns
            .iter()
            .enumerate()
            .map(|(i, c)| PrimaryKeyRow {
                column_name: c.to_string(),
                sequence_number: i as i32 + 1,
            })
            .collect();
        self.primary_keys
            .insert((None, Some(schema.to_string()), relation.to_string()), rows);
        self
    }

    /// Declare a foreign key as `(fk column, pk column)` pairs, emitted as
    /// contiguous imported-key rows with sequences from 1.
    pub fn with_foreign_key(
        mut self,
        schema: &str,
        child: &str,
        parent_schema: &str,
        parent: &str,
        pairs: &[(&str, &str)],
    ) -> Self {
        for (i, (fk_col, pk_col)) in pairs.iter().enumerate() {
            self.imported_keys.push(ImportedKeyRow {
                fk_catalog: None,
                fk_schema: Some(schema.to_string()),
                fk_relation: child.to_string(),
                fk_column: fk_col.to_string(),
                pk_catalog: None,
                pk_schema: Some(parent_schema.to_string()),
                pk_relation: parent.to_string(),
                pk_column: pk_col.to_string(),
                component_sequence: i as i32 + 1,
            });
        }
        self
    }

    pub fn with_imported_key_row(mut self, row: ImportedKeyRow) -> Self {
        self.imported_keys.push(row);
        self
    }

    /// How many primary key listings the fetcher asked for.
    pub fn primary_key_lookups(&self) -> usize {
        self.pk_lookups.load(Ordering::SeqCst)
    }
}

fn schema_matches(filter: Option<&str>, schema: &Option<String>) -> bool {
    match filter {
        None => true,
        Some(f) => schema.as_deref().unwrap_or("") == f,
    }
}

fn kind_matches(kinds: &[RelationKind], kind: &str) -> bool {
    let kind = kind.to_uppercase();
    kinds.iter().any(|k| match k {
        RelationKind::Table => kind == "TABLE",
        RelationKind::View => kind.ends_with("VIEW"),
    })
}

impl MetadataSource for MemorySource {
    async fn case_sensitivity_flags(&self) -> Result<IdentifierCaseFlags> {
        self.check(SourceStage::CaseFlags)?;
        Ok(self.flags)
    }

    async fn list_relations(&self, schema: Option<&str>, kinds: &[RelationKind]) -> Result<Vec<RelationRow>> {
        self.check(SourceStage::Relations)?;
        Ok(self
            .relations
            .iter()
            .filter(|r| schema_matches(schema, &r.schema) && kind_matches(kinds, &r.kind))
            .cloned()
            .collect())
    }

    async fn list_columns(&self, schema: Option<&str>) -> Result<Vec<ColumnRow>> {
        self.check(SourceStage::Columns)?;
        Ok(self
            .columns
            .iter()
            .filter(|c| schema_matches(schema, &c.schema))
            .cloned()
            .collect())
    }

    async fn list_primary_keys(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        relation: &str,
    ) -> Result<Vec<PrimaryKeyRow>> {
        self.pk_lookups.fetch_add(1, Ordering::SeqCst);
        self.check(SourceStage::PrimaryKeys)?;
        let key = (
            catalog.map(str::to_string),
            schema.map(str::to_string),
            relation.to_string(),
        );
        Ok(self.primary_keys.get(&key).cloned().unwrap_or_default())
    }

    async fn list_imported_keys(&self, schema: Option<&str>) -> Result<Vec<ImportedKeyRow>> {
        self.check(SourceStage::ImportedKeys)?;
        Ok(self
            .imported_keys
            .iter()
            .filter(|k| schema_matches(schema, &k.fk_schema))
            .cloned()
            .collect())
    }

    async fn dbms_info(&self) -> Result<DbmsInfo> {
        self.check(SourceStage::DbmsInfo)?;
        Ok(self.dbms.clone())
    }
}

/// A nullable column row with sizes filled in the way engines report them.
pub fn column_row(schema: &str, relation: &str, column: &str, sql_type: SqlType, native: &str) -> ColumnRow {
    let (column_size, decimal_digits, radix) = if sql_type.is_character() {
        (Some(100), None, None)
    } else if sql_type.is_numeric() {
        (Some(10), Some(0), Some(10))
    } else {
        (None, None, None)
    };
    ColumnRow {
        catalog: None,
        schema: Some(schema.to_string()),
        relation_name: relation.to_string(),
        column_name: column.to_string(),
        type_code: sql_type.code(),
        type_name: native.to_string(),
        column_size,
        decimal_digits,
        radix,
        nullable_code: COLUMN_NULLABLE,
        remarks: None,
    }
}

/// An order-entry schema under `public`:
///
/// - `customers(id)`
/// - `addresses(id, customer_id -> customers)`
/// - `orders(id, customer_id -> customers, billing_address_id -> addresses,
///   shipping_address_id -> addresses, placed_on DATE)`
/// - `order_lines(order_id, line_no, product_code, quantity)` with the
///   composite key `(order_id, line_no)` and `order_id -> orders`
/// - `line_notes(order_id, line_no, note) -> order_lines` (composite)
/// - `flyway_schema_history(installed_rank)`
/// - view `order_totals(order_id, total)`
pub fn order_entry_source() -> MemorySource {
    use SqlType::*;

    MemorySource::lower_case()
        .with_dbms("PostgreSQL", "16.2")
        .with_relation("public", "customers", "TABLE")
        .with_relation("public", "addresses", "TABLE")
        .with_relation("public", "orders", "TABLE")
        .with_relation("public", "order_lines", "TABLE")
        .with_relation("public", "line_notes", "TABLE")
        .with_relation("public", "flyway_schema_history", "TABLE")
        .with_relation("public", "order_totals", "VIEW")
        .with_column("public", "customers", "id", Integer, "int4")
        .with_column("public", "customers", "name", VarChar, "varchar")
        .with_column("public", "addresses", "id", Integer, "int4")
        .with_column("public", "addresses", "customer_id", Integer, "int4")
        .with_column("public", "addresses", "street", VarChar, "varchar")
        .with_column("public", "orders", "id", Integer, "int4")
        .with_column("public", "orders", "customer_id", Integer, "int4")
        .with_column("public", "orders", "billing_address_id", Integer, "int4")
        .with_column("public", "orders", "shipping_address_id", Integer, "int4")
        .with_column("public", "orders", "placed_on", Date, "date")
        .with_column("public", "order_lines", "order_id", Integer, "int4")
        .with_column("public", "order_lines", "line_no", Integer, "int4")
        .with_column("public", "order_lines", "product_code", Char, "bpchar")
        .with_column("public", "order_lines", "quantity", Numeric, "numeric")
        .with_column("public", "line_notes", "order_id", Integer, "int4")
        .with_column("public", "line_notes", "line_no", Integer, "int4")
        .with_column("public", "line_notes", "note", VarChar, "text")
        .with_column("public", "flyway_schema_history", "installed_rank", Integer, "int4")
        .with_column("public", "order_totals", "order_id", Integer, "int4")
        .with_column("public", "order_totals", "total", Numeric, "numeric")
        .with_primary_key("public", "customers", &["id"])
        .with_primary_key("public", "addresses", &["id"])
        .with_primary_key("public", "orders", &["id"])
        .with_primary_key("public", "order_lines", &["order_id", "line_no"])
        .with_primary_key("public", "flyway_schema_history", &["installed_rank"])
        .with_foreign_key("public", "addresses", "public", "customers", &[("customer_id", "id")])
        .with_foreign_key("public", "orders", "public", "customers", &[("customer_id", "id")])
        .with_foreign_key("public", "orders", "public", "addresses", &[("billing_address_id", "id")])
        .with_foreign_key("public", "orders", "public", "addresses", &[("shipping_address_id", "id")])
        .with_foreign_key("public", "order_lines", "public", "orders", &[("order_id", "id")])
        .with_foreign_key(
            "public",
            "line_notes",
            "public",
            "order_lines",
            &[("order_id", "order_id"), ("line_no", "line_no")],
        )
        .with_foreign_key(
            "public",
            "flyway_schema_history",
            "public",
            "orders",
            &[("installed_rank", "id")],
        )
}

pub fn public_id(name: &str) -> RelationId {
    RelationId::new(None, Some("public".to_string()), name)
}

fn pk_field(name: &str, position: u32) -> Field {
    let mut f = Field::new(name, SqlType::Integer.code(), "int4");
    f.nullable = Some(false);
    f.primary_key_part_number = Some(position);
    f
}

fn int_field(name: &str) -> Field {
    let mut f = Field::new(name, SqlType::Integer.code(), "int4");
    f.nullable = Some(true);
    f
}

/// `orders(id, customer_id, alt_customer_id)` and `customers(id)`, with one
/// key from `orders.customer_id` and, when `second_key` is set, another
/// from `orders.alt_customer_id`.
pub fn orders_customers_model(second_key: bool) -> SchemaModel {
    let customers = RelationMetadata::new(public_id("customers"), RelationType::Table, None, vec![pk_field("id", 1)]);
    let orders = RelationMetadata::new(
        public_id("orders"),
        RelationType::Table,
        Some("Customer orders".to_string()),
        vec![pk_field("id", 1), int_field("customer_id"), int_field("alt_customer_id")],
    );

    let mut fks = vec![ForeignKey::new(
        public_id("orders"),
        public_id("customers"),
        vec![ForeignKeyComponent::new("customer_id", "id")],
    )];
    if second_key {
        fks.push(ForeignKey::new(
            public_id("orders"),
            public_id("customers"),
            vec![ForeignKeyComponent::new("alt_customer_id", "id")],
        ));
    }

    SchemaModel::new(
        Some("public".to_string()),
        vec![orders, customers],
        fks,
        CaseSensitivity::InsensitiveStoredLower,
        DbmsInfo {
            name: Some("PostgreSQL".to_string()),
            version: Some("16.2".to_string()),
            major_version: Some(16),
            minor_version: Some(2),
        },
    )
}

/// A model of `n` relations `t0000..`, each with `fields` integer columns and
/// a key to its predecessor.
pub fn chain_model(n: usize, fields: usize) -> SchemaModel {
    let relations = (0..n)
        .map(|i| {
            let mut cols = vec![pk_field("id", 1)];
            cols.extend((0..fields).map(|f| int_field(&format!("c{}", f))));
            if i > 0 {
                cols.push(int_field("prev_id"));
            }
            RelationMetadata::new(public_id(&format!("t{:04}", i)), RelationType::Table, None, cols)
        })
        .collect();
    let fks = (1..n)
        .map(|i| {
            ForeignKey::new(
                public_id(&format!("t{:04}", i)),
                public_id(&format!("t{:04}", i - 1)),
                vec![ForeignKeyComponent::new("prev_id", "id")],
            )
        })
        .collect();

    SchemaModel::new(
        Some("public".to_string()),
        relations,
        fks,
        CaseSensitivity::InsensitiveStoredLower,
        DbmsInfo::default(),
    )
}
