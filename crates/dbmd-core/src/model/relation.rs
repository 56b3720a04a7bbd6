use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbmdError;

use crate::model::field::Field;
use crate::model::foreign_key::qualify;
use crate::model::relation_id::RelationId;

/// Kind of relation. Every non-table kind the database reports (views,
/// materialized views, synonyms, foreign tables) is classified as `View`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    Table,
    View,
    Unknown,
}

impl RelationType {
    /// Classify an introspection-reported kind string.
    pub fn from_kind(kind: &str) -> Self {
        if kind.eq_ignore_ascii_case("table") {
            RelationType::Table
        } else {
            RelationType::View
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationType::Table => write!(f, "Table"),
            RelationType::View => write!(f, "View"),
            RelationType::Unknown => write!(f, "Unknown"),
        }
    }
}

impl FromStr for RelationType {
    type Err = DbmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Table" => Ok(RelationType::Table),
            "View" => Ok(RelationType::View),
            "Unknown" => Ok(RelationType::Unknown),
            other => Err(DbmdError::Document {
                message: format!("unknown relation type '{}'", other),
            }),
        }
    }
}

/// A relation as listed by the first fetch stage, before its columns are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    pub relation_id: RelationId,
    pub relation_type: RelationType,
    pub comment: Option<String>,
}

/// A table or view with its fields in database column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    pub relation_id: RelationId,
    pub relation_type: RelationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl RelationMetadata {
    pub fn new(
        relation_id: RelationId,
        relation_type: RelationType,
        comment: Option<String>,
        fields: Vec<Field>,
    ) -> Self {
        Self {
            relation_id,
            relation_type,
            comment,
            fields,
        }
    }

    pub fn from_descriptor(descriptor: &RelationDescriptor) -> Self {
        Self::new(
            descriptor.relation_id.clone(),
            descriptor.relation_type,
            descriptor.comment.clone(),
            Vec::new(),
        )
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Primary key fields in ascending part-number order.
    pub fn primary_key_fields(&self) -> Vec<&Field> {
        let mut pks: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| f.primary_key_part_number.is_some())
            .collect();
        // Stable, so fields sharing a part number keep column order
        pks.sort_by_key(|f| f.primary_key_part_number);
        pks
    }

    pub fn primary_key_field_names(&self, alias: Option<&str>) -> Vec<String> {
        self.primary_key_fields()
            .into_iter()
            .map(|f| qualify(alias, &f.name))
            .collect()
    }

    pub fn field_names(&self, alias: Option<&str>) -> Vec<String> {
        self.fields.iter().map(|f| qualify(alias, &f.name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::SqlType;

    fn pk_field(name: &str, part: Option<u32>) -> Field {
        let mut f = Field::new(name, SqlType::Integer.code(), "int4");
        f.primary_key_part_number = part;
        f
    }

    #[test]
    fn test_relation_type_from_kind() {
        assert_eq!(RelationType::from_kind("TABLE"), RelationType::Table);
        assert_eq!(RelationType::from_kind("table"), RelationType::Table);
        assert_eq!(RelationType::from_kind("VIEW"), RelationType::View);
        assert_eq!(RelationType::from_kind("SYNONYM"), RelationType::View);
        assert_eq!(RelationType::from_kind("MATERIALIZED VIEW"), RelationType::View);
    }

    #[test]
    fn test_primary_key_fields_sorted_by_part_number() {
        let rel = RelationMetadata::new(
            RelationId::new(None, None, "order_lines"),
            RelationType::Table,
            None,
            vec![
                pk_field("line_no", Some(2)),
                pk_field("note", None),
                pk_field("order_id", Some(1)),
                pk_field("sub_line", Some(3)),
            ],
        );
        assert_eq!(
            rel.primary_key_field_names(None),
            vec!["order_id", "line_no", "sub_line"]
        );
        assert_eq!(
            rel.primary_key_field_names(Some("ol")),
            vec!["ol.order_id", "ol.line_no", "ol.sub_line"]
        );
    }

    #[test]
    fn test_field_names_keep_column_order() {
        let rel = RelationMetadata::new(
            RelationId::new(None, None, "t"),
            RelationType::View,
            None,
            vec![pk_field("b", None), pk_field("a", None)],
        );
        assert_eq!(rel.field_names(None), vec!["b", "a"]);
        assert!(rel.field("a").is_some());
        assert!(rel.field("c").is_none());
    }
}
