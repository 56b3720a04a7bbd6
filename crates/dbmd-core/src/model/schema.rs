//! # Schema Model
//!
//! `SchemaModel` is the immutable, queryable snapshot assembled from one
//! metadata fetch. Relations and foreign keys are sorted once, at
//! construction, so every document written from the same database state is
//! byte-for-byte reproducible. Lookup indexes are built in the same step and
//! never change afterwards, which makes the model safe to share between
//! threads without any locking.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{DbmdError, Result};
use crate::ident::{normalize_identifier, normalize_name, normalize_names, CaseSensitivity};
use crate::model::foreign_key::{qualify, ForeignKey};
use crate::model::relation::RelationMetadata;
use crate::model::relation_id::RelationId;

/// Which foreign keys a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForeignKeyScope {
    /// Only keys whose source and target relations are both in the model.
    #[default]
    RegisteredTablesOnly,
    /// Every fetched key, including those pointing at relations left out of
    /// the fetch.
    AllForeignKeys,
}

/// DBMS product information reported by the introspection source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbmsInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minor_version: Option<i32>,
}

/// The serialized shape of a schema model: base data only, no indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_owning_schema_name: Option<String>,
    pub case_sensitivity: CaseSensitivity,
    #[serde(default)]
    pub dbms: DbmsInfo,
    #[serde(default)]
    pub relation_metadatas: Vec<RelationMetadata>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Immutable snapshot of a database's relations and foreign keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SchemaParts", into = "SchemaParts")]
pub struct SchemaModel {
    requested_schema: Option<String>,
    case_sensitivity: CaseSensitivity,
    dbms: DbmsInfo,
    relations: Vec<RelationMetadata>,
    foreign_keys: Vec<ForeignKey>,

    relations_by_id: HashMap<RelationId, usize>,
    fks_by_source: HashMap<RelationId, Vec<usize>>,
    fks_by_target: HashMap<RelationId, Vec<usize>>,
}

impl SchemaModel {
    /// Build the model: sort relations and foreign keys into their canonical
    /// order and index them.
    pub fn new(
        requested_schema: Option<String>,
        relations: Vec<RelationMetadata>,
        foreign_keys: Vec<ForeignKey>,
        case_sensitivity: CaseSensitivity,
        dbms: DbmsInfo,
    ) -> Self {
        let relations = sorted_relations(relations);
        let foreign_keys = sorted_foreign_keys(foreign_keys);

        let mut relations_by_id = HashMap::with_capacity(relations.len());
        for (idx, rel) in relations.iter().enumerate() {
            // First entry wins if the source reported a relation twice
            relations_by_id.entry(rel.relation_id.clone()).or_insert(idx);
        }

        let mut fks_by_source: HashMap<RelationId, Vec<usize>> = HashMap::new();
        let mut fks_by_target: HashMap<RelationId, Vec<usize>> = HashMap::new();
        for (idx, fk) in foreign_keys.iter().enumerate() {
            fks_by_source
                .entry(fk.source_relation_id.clone())
                .or_default()
                .push(idx);
            fks_by_target
                .entry(fk.target_relation_id.clone())
                .or_default()
                .push(idx);
        }

        Self {
            requested_schema,
            case_sensitivity,
            dbms,
            relations,
            foreign_keys,
            relations_by_id,
            fks_by_source,
            fks_by_target,
        }
    }

    pub fn requested_schema(&self) -> Option<&str> {
        self.requested_schema.as_deref()
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    pub fn dbms(&self) -> &DbmsInfo {
        &self.dbms
    }

    /// All relations, sorted by canonical id string.
    pub fn relation_metadatas(&self) -> &[RelationMetadata] {
        &self.relations
    }

    pub fn relation_ids(&self) -> Vec<&RelationId> {
        self.relations.iter().map(|r| &r.relation_id).collect()
    }

    /// All foreign keys, sorted by source id, target id, source field names,
    /// target field names.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn foreign_key_count(&self) -> usize {
        self.foreign_keys.len()
    }

    pub fn field_count(&self) -> usize {
        self.relations.iter().map(|r| r.fields.len()).sum()
    }

    pub fn relation_metadata(&self, id: &RelationId) -> Option<&RelationMetadata> {
        self.relations_by_id.get(id).map(|&idx| &self.relations[idx])
    }

    fn require_relation(&self, id: &RelationId) -> Result<&RelationMetadata> {
        self.relation_metadata(id)
            .ok_or_else(|| DbmdError::RelationNotFound {
                relation: id.id_string(),
            })
    }

    /// Field names of the relation in column order, optionally prefixed with
    /// `alias.`.
    pub fn field_names(&self, id: &RelationId, alias: Option<&str>) -> Result<Vec<String>> {
        Ok(self.require_relation(id)?.field_names(alias))
    }

    /// Primary key field names in key order, optionally prefixed with `alias.`.
    pub fn primary_key_field_names(&self, id: &RelationId, alias: Option<&str>) -> Result<Vec<String>> {
        Ok(self.require_relation(id)?.primary_key_field_names(alias))
    }

    /// Foreign keys from `child` to `parent`.
    ///
    /// With neither given, every key; with both, the keys from the child that
    /// also point at the parent (all of them, when several link the pair);
    /// with one, every key on that side.
    pub fn foreign_keys_from_to(
        &self,
        child: Option<&RelationId>,
        parent: Option<&RelationId>,
        scope: ForeignKeyScope,
    ) -> Vec<&ForeignKey> {
        let indexes: Vec<usize> = match (child, parent) {
            (None, None) => (0..self.foreign_keys.len()).collect(),
            (Some(child), Some(parent)) => {
                let to_parent = self.target_indexes(parent);
                self.source_indexes(child)
                    .iter()
                    .copied()
                    .filter(|idx| to_parent.contains(idx))
                    .collect()
            }
            (Some(child), None) => self.source_indexes(child).to_vec(),
            (None, Some(parent)) => self.target_indexes(parent).to_vec(),
        };

        indexes
            .into_iter()
            .map(|idx| &self.foreign_keys[idx])
            .filter(|fk| match scope {
                ForeignKeyScope::AllForeignKeys => true,
                ForeignKeyScope::RegisteredTablesOnly => {
                    self.relations_by_id.contains_key(&fk.source_relation_id)
                        && self.relations_by_id.contains_key(&fk.target_relation_id)
                }
            })
            .collect()
    }

    pub fn foreign_keys_to_parents_from(&self, child: &RelationId) -> Vec<&ForeignKey> {
        self.foreign_keys_from_to(Some(child), None, ForeignKeyScope::RegisteredTablesOnly)
    }

    pub fn foreign_keys_from_children_to(&self, parent: &RelationId) -> Vec<&ForeignKey> {
        self.foreign_keys_from_to(None, Some(parent), ForeignKeyScope::RegisteredTablesOnly)
    }

    /// The single foreign key from `from` to `to`, optionally the one whose
    /// source fields are exactly `field_names`.
    ///
    /// Returns `Ok(None)` when nothing matches. Returns `AmbiguousForeignKey`
    /// when more than one key qualifies: always scans every candidate rather
    /// than stopping at the first match.
    pub fn foreign_key_from_to(
        &self,
        from: &RelationId,
        to: &RelationId,
        field_names: Option<&[&str]>,
        scope: ForeignKeyScope,
    ) -> Result<Option<&ForeignKey>> {
        let normalized = field_names.map(|names| normalize_names(names.iter().copied(), self.case_sensitivity));

        let mut found: Option<&ForeignKey> = None;
        for fk in self.foreign_keys_from_to(Some(from), Some(to), scope) {
            let qualifies = match &normalized {
                Some(names) => fk.source_field_names_set_equals(names),
                None => true,
            };
            if !qualifies {
                continue;
            }
            if found.is_some() {
                return Err(DbmdError::AmbiguousForeignKey {
                    child: from.id_string(),
                    parent: to.id_string(),
                    field_names: normalized
                        .as_ref()
                        .map(|names| names.iter().cloned().collect::<Vec<_>>().join(", ")),
                });
            }
            found = Some(fk);
        }

        Ok(found)
    }

    /// Distinct source field names of the keys from `child` to its parents,
    /// in key order, optionally prefixed with `alias.`.
    pub fn foreign_key_field_names(&self, child: &RelationId, alias: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for fk in self.foreign_keys_to_parents_from(child) {
            for comp in &fk.components {
                let name = qualify(alias, &comp.foreign_key_field_name);
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Child relations that reference `parent` through more than one foreign key.
    pub fn multiply_referencing_child_tables_for_parent(&self, parent: &RelationId) -> BTreeSet<RelationId> {
        repeated(
            self.foreign_keys_from_children_to(parent)
                .into_iter()
                .map(|fk| &fk.source_relation_id),
        )
    }

    /// Parent relations that `child` references through more than one foreign key.
    pub fn multiply_referenced_parent_tables_for_child(&self, child: &RelationId) -> BTreeSet<RelationId> {
        repeated(
            self.foreign_keys_to_parents_from(child)
                .into_iter()
                .map(|fk| &fk.target_relation_id),
        )
    }

    /// First key among `fks` whose source fields are exactly `field_names`.
    pub fn foreign_key_having_field_set_among<'a, I>(
        &self,
        field_names: &[&str],
        fks: I,
    ) -> Option<&'a ForeignKey>
    where
        I: IntoIterator<Item = &'a ForeignKey>,
    {
        let normalized = normalize_names(field_names.iter().copied(), self.case_sensitivity);
        fks.into_iter()
            .find(|fk| fk.source_field_names_set_equals(&normalized))
    }

    /// Normalize an identifier under this model's case-sensitivity policy.
    pub fn normalize_id(&self, id: Option<&str>) -> Option<String> {
        normalize_identifier(id, self.case_sensitivity)
    }

    /// Build a normalized relation id from raw identifiers.
    pub fn relation_id(&self, catalog: Option<&str>, schema: Option<&str>, name: &str) -> RelationId {
        RelationId::normalized(catalog, schema, name, self.case_sensitivity)
    }

    /// Build a relation id from `"schema.name"` or a bare `"name"`. A bare
    /// name is placed in the schema the model was fetched for, if any.
    pub fn relation_id_from_qualified(&self, possibly_qualified: &str) -> RelationId {
        let (schema, name) = match possibly_qualified.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (self.requested_schema.as_deref(), possibly_qualified),
        };
        RelationId::new(
            None,
            normalize_identifier(schema, self.case_sensitivity),
            normalize_name(name, self.case_sensitivity),
        )
    }

    fn source_indexes(&self, id: &RelationId) -> &[usize] {
        self.fks_by_source.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn target_indexes(&self, id: &RelationId) -> &[usize] {
        self.fks_by_target.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl From<SchemaParts> for SchemaModel {
    fn from(parts: SchemaParts) -> Self {
        SchemaModel::new(
            parts.requested_owning_schema_name,
            parts.relation_metadatas,
            parts.foreign_keys,
            parts.case_sensitivity,
            parts.dbms,
        )
    }
}

impl From<SchemaModel> for SchemaParts {
    fn from(model: SchemaModel) -> Self {
        SchemaParts {
            requested_owning_schema_name: model.requested_schema,
            case_sensitivity: model.case_sensitivity,
            dbms: model.dbms,
            relation_metadatas: model.relations,
            foreign_keys: model.foreign_keys,
        }
    }
}

/// Ids that occur more than once.
fn repeated<'a, I>(ids: I) -> BTreeSet<RelationId>
where
    I: IntoIterator<Item = &'a RelationId>,
{
    let mut seen = BTreeSet::new();
    let mut repeats = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            repeats.insert(id.clone());
        }
    }
    repeats
}

fn sorted_relations(mut relations: Vec<RelationMetadata>) -> Vec<RelationMetadata> {
    relations.sort_by_cached_key(|r| r.relation_id.id_string());
    relations
}

fn sorted_foreign_keys(mut fks: Vec<ForeignKey>) -> Vec<ForeignKey> {
    fks.sort_by(compare_foreign_keys);
    fks
}

/// Canonical foreign key order: source id string, target id string, then
/// source and target field name lists compared lexicographically.
pub fn compare_foreign_keys(a: &ForeignKey, b: &ForeignKey) -> Ordering {
    a.source_relation_id
        .id_string()
        .cmp(&b.source_relation_id.id_string())
        .then_with(|| {
            a.target_relation_id
                .id_string()
                .cmp(&b.target_relation_id.id_string())
        })
        .then_with(|| a.source_field_names().cmp(&b.source_field_names()))
        .then_with(|| a.target_field_names().cmp(&b.target_field_names()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::Field;
    use crate::model::foreign_key::ForeignKeyComponent;
    use crate::model::relation::RelationType;
    use crate::model::types::SqlType;

    fn rid(name: &str) -> RelationId {
        RelationId::new(None, Some("public".to_string()), name)
    }

    fn table(name: &str, fields: &[(&str, Option<u32>)]) -> RelationMetadata {
        RelationMetadata::new(
            rid(name),
            RelationType::Table,
            None,
            fields
                .iter()
                .map(|(n, pk)| {
                    let mut f = Field::new(*n, SqlType::Integer.code(), "int4");
                    f.primary_key_part_number = *pk;
                    f
                })
                .collect(),
        )
    }

    fn fk(src: &str, tgt: &str, comps: &[(&str, &str)]) -> ForeignKey {
        ForeignKey::new(
            rid(src),
            rid(tgt),
            comps
                .iter()
                .map(|(s, t)| ForeignKeyComponent::new(*s, *t))
                .collect(),
        )
    }

    fn orders_customers(extra_fk: bool) -> SchemaModel {
        let mut fks = vec![fk("orders", "customers", &[("customer_id", "id")])];
        if extra_fk {
            fks.push(fk("orders", "customers", &[("alt_customer_id", "id")]));
        }
        SchemaModel::new(
            Some("public".to_string()),
            vec![
                table("orders", &[("id", Some(1)), ("customer_id", None), ("alt_customer_id", None)]),
                table("customers", &[("id", Some(1))]),
            ],
            fks,
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo::default(),
        )
    }

    #[test]
    fn test_relations_sorted_at_construction() {
        let model = orders_customers(false);
        let ids: Vec<String> = model.relation_ids().iter().map(|id| id.id_string()).collect();
        assert_eq!(ids, vec!["public.customers", "public.orders"]);
    }

    #[test]
    fn test_unknown_relation_is_an_error() {
        let model = orders_customers(false);
        let err = model.field_names(&rid("nope"), None).unwrap_err();
        assert!(matches!(err, DbmdError::RelationNotFound { ref relation } if relation == "public.nope"));
        assert!(model.primary_key_field_names(&rid("nope"), None).is_err());
    }

    #[test]
    fn test_single_foreign_key_lookup() {
        let model = orders_customers(false);
        let orders = rid("orders");
        let customers = rid("customers");

        let fks = model.foreign_keys_from_to(Some(&orders), Some(&customers), ForeignKeyScope::RegisteredTablesOnly);
        assert_eq!(fks.len(), 1);

        let found = model
            .foreign_key_from_to(&orders, &customers, Some(["customer_id"].as_slice()), ForeignKeyScope::RegisteredTablesOnly)
            .unwrap();
        assert!(found.is_some());

        let none = model
            .foreign_key_from_to(&orders, &customers, Some(["bogus_field"].as_slice()), ForeignKeyScope::RegisteredTablesOnly)
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_field_names_normalized_before_matching() {
        let model = orders_customers(false);
        let found = model
            .foreign_key_from_to(
                &rid("orders"),
                &rid("customers"),
                Some(["CUSTOMER_ID"].as_slice()),
                ForeignKeyScope::RegisteredTablesOnly,
            )
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_ambiguous_without_field_names() {
        let model = orders_customers(true);
        let err = model
            .foreign_key_from_to(&rid("orders"), &rid("customers"), None, ForeignKeyScope::RegisteredTablesOnly)
            .unwrap_err();
        assert!(matches!(err, DbmdError::AmbiguousForeignKey { field_names: None, .. }));

        // A field set picks exactly one of them
        let found = model
            .foreign_key_from_to(
                &rid("orders"),
                &rid("customers"),
                Some(["alt_customer_id"].as_slice()),
                ForeignKeyScope::RegisteredTablesOnly,
            )
            .unwrap()
            .unwrap();
        assert_eq!(found.source_field_names(), vec!["alt_customer_id"]);
    }

    #[test]
    fn test_ambiguous_with_same_field_set() {
        let model = SchemaModel::new(
            None,
            vec![table("a", &[("x", None)]), table("b", &[("y", Some(1)), ("z", None)])],
            vec![fk("a", "b", &[("x", "y")]), fk("a", "b", &[("x", "z")])],
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo::default(),
        );
        let a = RelationId::new(None, Some("public".into()), "a");
        let b = RelationId::new(None, Some("public".into()), "b");
        let err = model
            .foreign_key_from_to(&a, &b, Some(["x"].as_slice()), ForeignKeyScope::AllForeignKeys)
            .unwrap_err();
        match err {
            DbmdError::AmbiguousForeignKey { child, parent, field_names } => {
                assert_eq!(child, "public.a");
                assert_eq!(parent, "public.b");
                assert_eq!(field_names.as_deref(), Some("x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multiply_referenced_and_referencing() {
        let model = orders_customers(true);
        let parents = model.multiply_referenced_parent_tables_for_child(&rid("orders"));
        assert!(parents.contains(&rid("customers")));
        assert_eq!(parents.len(), 1);

        let children = model.multiply_referencing_child_tables_for_parent(&rid("customers"));
        assert!(children.contains(&rid("orders")));

        let single = orders_customers(false);
        assert!(single.multiply_referenced_parent_tables_for_child(&rid("orders")).is_empty());
    }

    #[test]
    fn test_scope_filters_unregistered_endpoints() {
        let model = SchemaModel::new(
            None,
            vec![table("orders", &[("id", Some(1)), ("audit_id", None)])],
            vec![fk("orders", "audit_log", &[("audit_id", "id")])],
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo::default(),
        );
        let orders = rid("orders");
        assert!(model
            .foreign_keys_from_to(Some(&orders), None, ForeignKeyScope::RegisteredTablesOnly)
            .is_empty());
        assert_eq!(
            model
                .foreign_keys_from_to(Some(&orders), None, ForeignKeyScope::AllForeignKeys)
                .len(),
            1
        );
        assert_eq!(model.foreign_keys_from_to(None, None, ForeignKeyScope::AllForeignKeys).len(), 1);
    }

    #[test]
    fn test_foreign_key_field_names_distinct() {
        let model = SchemaModel::new(
            None,
            vec![
                table("a", &[("p", None), ("q", None)]),
                table("b", &[("id", Some(1))]),
                table("c", &[("id", Some(1)), ("k", Some(2))]),
            ],
            vec![fk("a", "b", &[("p", "id")]), fk("a", "c", &[("p", "id"), ("q", "k")])],
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo::default(),
        );
        assert_eq!(model.foreign_key_field_names(&rid("a"), None), vec!["p", "q"]);
        assert_eq!(model.foreign_key_field_names(&rid("a"), Some("t")), vec!["t.p", "t.q"]);
    }

    #[test]
    fn test_relation_id_from_qualified_uses_requested_schema() {
        let model = orders_customers(false);
        assert_eq!(model.relation_id_from_qualified("Orders"), rid("orders"));
        assert_eq!(
            model.relation_id_from_qualified("Sales.Orders"),
            RelationId::new(None, Some("sales".into()), "orders")
        );
    }

    #[test]
    fn test_foreign_key_sort_order() {
        let model = SchemaModel::new(
            None,
            vec![],
            vec![
                fk("b", "a", &[("x", "id")]),
                fk("a", "c", &[("y", "id")]),
                fk("a", "b", &[("z", "id")]),
                fk("a", "b", &[("m", "id"), ("n", "k")]),
                fk("a", "b", &[("m", "id")]),
            ],
            CaseSensitivity::Sensitive,
            DbmsInfo::default(),
        );
        let rendered: Vec<String> = model
            .foreign_keys()
            .iter()
            .map(|fk| format!("{}>{}:{}", fk.source_relation_id.name(), fk.target_relation_id.name(), fk.source_field_names().join(",")))
            .collect();
        assert_eq!(rendered, vec!["a>b:m", "a>b:m,n", "a>b:z", "a>c:y", "b>a:x"]);
    }
}
