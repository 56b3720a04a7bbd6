use std::io::{Read, Write};

use crate::error::{DbmdError, Result};
use crate::model::schema::SchemaModel;
use crate::output::write_str;

/// Write the model as pretty-printed JSON with camel-cased keys. Absent
/// optional values are left out rather than written as `null`.
pub fn write_json<W: Write>(writer: &mut W, model: &SchemaModel) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, model).map_err(|e| DbmdError::Document {
        message: format!("JSON serialization failed: {}", e),
    })?;
    write_str(writer, "\n", "JSON")
}

pub fn read_json<R: Read>(reader: R) -> Result<SchemaModel> {
    serde_json::from_reader(reader).map_err(|e| DbmdError::Document {
        message: format!("invalid JSON metadata document: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::CaseSensitivity;
    use crate::model::field::Field;
    use crate::model::relation::{RelationMetadata, RelationType};
    use crate::model::relation_id::RelationId;
    use crate::model::schema::DbmsInfo;
    use crate::model::types::SqlType;

    fn model() -> SchemaModel {
        let mut id = Field::new("id", SqlType::Integer.code(), "int4");
        id.primary_key_part_number = Some(1);
        id.nullable = Some(false);
        SchemaModel::new(
            Some("public".into()),
            vec![RelationMetadata::new(
                RelationId::new(None, Some("public".into()), "customers"),
                RelationType::Table,
                None,
                vec![id],
            )],
            vec![],
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo {
                name: Some("PostgreSQL".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_json_shape() {
        let mut buf = Vec::new();
        write_json(&mut buf, &model()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["requestedOwningSchemaName"], "public");
        assert_eq!(value["caseSensitivity"], "INSENSITIVE_STORED_LOWER");
        assert_eq!(value["dbms"]["name"], "PostgreSQL");
        let rel = &value["relationMetadatas"][0];
        assert_eq!(rel["relationId"]["schema"], "public");
        assert_eq!(rel["relationType"], "Table");
        assert_eq!(rel["fields"][0]["primaryKeyPartNumber"], 1);
        // Absent optionals are omitted
        assert!(rel.get("comment").is_none());
        assert!(rel["relationId"].get("catalog").is_none());
        assert!(rel["fields"][0].get("length").is_none());
    }

    #[test]
    fn test_json_round_trip_rebuilds_indexes() {
        let original = model();
        let mut buf = Vec::new();
        write_json(&mut buf, &original).unwrap();
        let restored = read_json(buf.as_slice()).unwrap();

        assert_eq!(restored.relation_metadatas(), original.relation_metadatas());
        assert_eq!(restored.case_sensitivity(), original.case_sensitivity());
        let id = RelationId::new(None, Some("public".into()), "customers");
        assert_eq!(restored.primary_key_field_names(&id, None).unwrap(), vec!["id"]);
    }

    #[test]
    fn test_read_json_rejects_garbage() {
        assert!(matches!(
            read_json("{\"caseSensitivity\": 3}".as_bytes()),
            Err(DbmdError::Document { .. })
        ));
    }
}
