//! Grouping state machines for the column and imported-key row streams.

use std::collections::HashSet;
use std::mem;

use crate::error::{DbmdError, Result};
use crate::model::field::Field;
use crate::model::foreign_key::{ForeignKey, ForeignKeyComponent};
use crate::model::relation::{RelationDescriptor, RelationMetadata};
use crate::model::relation_id::RelationId;

enum RelationState {
    Idle,
    Accumulating(RelationMetadata),
}

/// Groups column rows into one [`RelationMetadata`] per run of rows for the
/// same relation.
///
/// Rows of a relation are expected to be contiguous. A relation that shows up
/// again after its group was emitted produces a second entry, and a warning.
pub(crate) struct RelationAccumulator {
    state: RelationState,
    completed: Vec<RelationMetadata>,
    emitted: HashSet<RelationId>,
}

impl RelationAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            state: RelationState::Idle,
            completed: Vec::new(),
            emitted: HashSet::new(),
        }
    }

    pub(crate) fn push(&mut self, descriptor: &RelationDescriptor, field: Field) {
        if let RelationState::Accumulating(current) = &mut self.state {
            if current.relation_id == descriptor.relation_id {
                current.fields.push(field);
                return;
            }
        }

        self.emit();
        if self.emitted.contains(&descriptor.relation_id) {
            tracing::warn!(
                "Column rows for {} are not contiguous; the relation will be listed more than once",
                descriptor.relation_id
            );
        }
        let mut relation = RelationMetadata::from_descriptor(descriptor);
        relation.fields.push(field);
        self.state = RelationState::Accumulating(relation);
    }

    fn emit(&mut self) {
        if let RelationState::Accumulating(relation) = mem::replace(&mut self.state, RelationState::Idle) {
            self.emitted.insert(relation.relation_id.clone());
            self.completed.push(relation);
        }
    }

    pub(crate) fn finish(mut self) -> Vec<RelationMetadata> {
        self.emit();
        self.completed
    }
}

enum KeyState {
    Idle,
    Accumulating(ForeignKey),
}

/// Groups imported-key rows into foreign keys. A row with component sequence
/// 1 starts a new key; any other row extends the key in progress.
pub(crate) struct ForeignKeyAccumulator {
    state: KeyState,
    completed: Vec<ForeignKey>,
}

impl ForeignKeyAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            state: KeyState::Idle,
            completed: Vec::new(),
        }
    }

    pub(crate) fn push(
        &mut self,
        source: RelationId,
        target: RelationId,
        component_sequence: i32,
        component: ForeignKeyComponent,
    ) -> Result<()> {
        if component_sequence == 1 {
            self.emit();
            self.state = KeyState::Accumulating(ForeignKey::new(source, target, vec![component]));
            return Ok(());
        }

        match &mut self.state {
            KeyState::Accumulating(fk) => {
                if fk.source_relation_id != source || fk.target_relation_id != target {
                    tracing::warn!(
                        "Foreign key component {} of {} -> {} continues a key from {} -> {}",
                        component_sequence,
                        source,
                        target,
                        fk.source_relation_id,
                        fk.target_relation_id
                    );
                }
                fk.components.push(component);
                Ok(())
            }
            KeyState::Idle => Err(DbmdError::MalformedRows {
                message: format!(
                    "foreign key component {} ({} -> {}) arrived with no key in progress",
                    component_sequence, source, target
                ),
            }),
        }
    }

    fn emit(&mut self) {
        if let KeyState::Accumulating(fk) = mem::replace(&mut self.state, KeyState::Idle) {
            self.completed.push(fk);
        }
    }

    pub(crate) fn finish(mut self) -> Vec<ForeignKey> {
        self.emit();
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::relation::RelationType;
    use crate::model::types::SqlType;

    fn descriptor(name: &str) -> RelationDescriptor {
        RelationDescriptor {
            relation_id: RelationId::new(None, None, name),
            relation_type: RelationType::Table,
            comment: None,
        }
    }

    fn field(name: &str) -> Field {
        Field::new(name, SqlType::Integer.code(), "int4")
    }

    fn rid(name: &str) -> RelationId {
        RelationId::new(None, None, name)
    }

    #[test]
    fn test_relation_groups_on_boundaries() {
        let mut acc = RelationAccumulator::new();
        acc.push(&descriptor("a"), field("x"));
        acc.push(&descriptor("a"), field("y"));
        acc.push(&descriptor("b"), field("z"));
        let rels = acc.finish();

        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].field_names(None), vec!["x", "y"]);
        assert_eq!(rels[1].relation_id, rid("b"));
        assert_eq!(rels[1].field_names(None), vec!["z"]);
    }

    #[test]
    fn test_relation_non_contiguous_rows_split() {
        let mut acc = RelationAccumulator::new();
        acc.push(&descriptor("a"), field("x"));
        acc.push(&descriptor("b"), field("z"));
        acc.push(&descriptor("a"), field("y"));
        let rels = acc.finish();

        let ids: Vec<&str> = rels.iter().map(|r| r.relation_id.name()).collect();
        assert_eq!(ids, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_relation_empty_stream() {
        assert!(RelationAccumulator::new().finish().is_empty());
    }

    #[test]
    fn test_keys_split_on_component_one() {
        let mut acc = ForeignKeyAccumulator::new();
        acc.push(rid("lines"), rid("orders"), 1, ForeignKeyComponent::new("order_region", "region"))
            .unwrap();
        acc.push(rid("lines"), rid("orders"), 2, ForeignKeyComponent::new("order_no", "no"))
            .unwrap();
        acc.push(rid("lines"), rid("products"), 1, ForeignKeyComponent::new("product_id", "id"))
            .unwrap();
        let fks = acc.finish();

        assert_eq!(fks.len(), 2);
        assert_eq!(fks[0].source_field_names(), vec!["order_region", "order_no"]);
        assert_eq!(fks[1].target_relation_id, rid("products"));
    }

    #[test]
    fn test_keys_between_same_pair_stay_distinct() {
        let mut acc = ForeignKeyAccumulator::new();
        acc.push(rid("orders"), rid("customers"), 1, ForeignKeyComponent::new("customer_id", "id"))
            .unwrap();
        acc.push(rid("orders"), rid("customers"), 1, ForeignKeyComponent::new("alt_customer_id", "id"))
            .unwrap();
        assert_eq!(acc.finish().len(), 2);
    }

    #[test]
    fn test_orphan_continuation_is_malformed() {
        let mut acc = ForeignKeyAccumulator::new();
        let err = acc
            .push(rid("lines"), rid("orders"), 2, ForeignKeyComponent::new("order_no", "no"))
            .unwrap_err();
        assert!(matches!(err, DbmdError::MalformedRows { .. }));
    }
}
