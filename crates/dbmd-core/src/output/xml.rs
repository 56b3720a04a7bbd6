//! XML rendering of a schema model.
//!
//! ```xml
//! <database-metadata xmlns="http://nctr.fda.gov/dbmd" requested-owning-schema-name="public" case-sensitivity="INSENSITIVE_STORED_LOWER" dbms-name="PostgreSQL">
//!   <relation-metadatas>
//!     <rel-md rel-type="Table" rel-comment="Customer orders">
//!       <rel-id schema="public" name="orders"/>
//!       <fields>
//!         <field name="id" type-code="4" database-type="int4" nullable="false" pk-part-num="1" comment="Order number"/>
//!       </fields>
//!     </rel-md>
//!   </relation-metadatas>
//!   <foreign-keys>
//!     <foreign-key>
//!       <src-rel schema="public" name="orders"/>
//!       <tgt-rel schema="public" name="customers"/>
//!       <component fk-field-name="customer_id" pk-field-name="id"/>
//!     </foreign-key>
//!   </foreign-keys>
//! </database-metadata>
//! ```
//!
//! Comments are attributes: the reader trims element text, attribute values
//! come back exactly as written.

use std::io::{Read, Write};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DbmdError, Result};
use crate::model::field::Field;
use crate::model::foreign_key::{ForeignKey, ForeignKeyComponent};
use crate::model::relation::RelationMetadata;
use crate::model::relation_id::RelationId;
use crate::model::schema::{DbmsInfo, SchemaModel};
use crate::output::write_str;

const ROOT_ELEMENT: &str = "database-metadata";
const NAMESPACE: &str = "http://nctr.fda.gov/dbmd";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, Serialize, Deserialize)]
struct XmlDocument {
    #[serde(rename = "@xmlns", default, skip_serializing_if = "Option::is_none")]
    xmlns: Option<String>,
    #[serde(
        rename = "@requested-owning-schema-name",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    requested_owning_schema_name: Option<String>,
    #[serde(rename = "@case-sensitivity")]
    case_sensitivity: String,
    #[serde(rename = "@dbms-name", default, skip_serializing_if = "Option::is_none")]
    dbms_name: Option<String>,
    #[serde(rename = "@dbms-version", default, skip_serializing_if = "Option::is_none")]
    dbms_version: Option<String>,
    #[serde(rename = "@dbms-major-version", default, skip_serializing_if = "Option::is_none")]
    dbms_major_version: Option<i32>,
    #[serde(rename = "@dbms-minor-version", default, skip_serializing_if = "Option::is_none")]
    dbms_minor_version: Option<i32>,
    #[serde(rename = "relation-metadatas", default)]
    relation_metadatas: XmlRelations,
    #[serde(rename = "foreign-keys", default)]
    foreign_keys: XmlForeignKeys,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct XmlRelations {
    #[serde(rename = "rel-md", default)]
    items: Vec<XmlRelation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlRelation {
    #[serde(rename = "@rel-type")]
    rel_type: String,
    #[serde(rename = "rel-id")]
    rel_id: XmlRelId,
    #[serde(
        rename = "@rel-comment",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    comment: Option<String>,
    #[serde(default)]
    fields: XmlFields,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlRelId {
    #[serde(
        rename = "@catalog",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    catalog: Option<String>,
    #[serde(
        rename = "@schema",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    schema: Option<String>,
    #[serde(rename = "@name")]
    name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct XmlFields {
    #[serde(rename = "field", default)]
    items: Vec<XmlField>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlField {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type-code")]
    type_code: i32,
    #[serde(rename = "@database-type")]
    database_type: String,
    #[serde(rename = "@length", default, skip_serializing_if = "Option::is_none")]
    length: Option<u32>,
    #[serde(rename = "@precision", default, skip_serializing_if = "Option::is_none")]
    precision: Option<u32>,
    #[serde(rename = "@fractional-digits", default, skip_serializing_if = "Option::is_none")]
    fractional_digits: Option<i32>,
    #[serde(rename = "@radix", default, skip_serializing_if = "Option::is_none")]
    radix: Option<u32>,
    #[serde(rename = "@nullable", default, skip_serializing_if = "Option::is_none")]
    nullable: Option<bool>,
    #[serde(rename = "@pk-part-num", default, skip_serializing_if = "Option::is_none")]
    pk_part_num: Option<u32>,
    #[serde(
        rename = "@comment",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    comment: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct XmlForeignKeys {
    #[serde(rename = "foreign-key", default)]
    items: Vec<XmlForeignKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlForeignKey {
    #[serde(rename = "src-rel")]
    src_rel: XmlRelId,
    #[serde(rename = "tgt-rel")]
    tgt_rel: XmlRelId,
    #[serde(rename = "component", default)]
    components: Vec<XmlComponent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct XmlComponent {
    #[serde(rename = "@fk-field-name")]
    fk_field_name: String,
    #[serde(rename = "@pk-field-name")]
    pk_field_name: String,
}

/// A present attribute is `Some`, even when empty: an empty schema is not an
/// absent one.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    String::deserialize(deserializer).map(Some)
}

impl From<&RelationId> for XmlRelId {
    fn from(id: &RelationId) -> Self {
        XmlRelId {
            catalog: id.catalog().map(str::to_string),
            schema: id.schema().map(str::to_string),
            name: id.name().to_string(),
        }
    }
}

impl From<XmlRelId> for RelationId {
    fn from(id: XmlRelId) -> Self {
        RelationId::new(id.catalog, id.schema, id.name)
    }
}

impl From<&Field> for XmlField {
    fn from(f: &Field) -> Self {
        XmlField {
            name: f.name.clone(),
            type_code: f.type_code,
            database_type: f.database_type.clone(),
            length: f.length,
            precision: f.precision,
            fractional_digits: f.fractional_digits,
            radix: f.radix,
            nullable: f.nullable,
            pk_part_num: f.primary_key_part_number,
            comment: f.comment.clone(),
        }
    }
}

impl From<XmlField> for Field {
    fn from(x: XmlField) -> Self {
        let mut f = Field::new(x.name, x.type_code, x.database_type);
        f.length = x.length;
        f.precision = x.precision;
        f.fractional_digits = x.fractional_digits;
        f.radix = x.radix;
        f.nullable = x.nullable;
        f.primary_key_part_number = x.pk_part_num;
        f.comment = x.comment;
        f
    }
}

impl From<&SchemaModel> for XmlDocument {
    fn from(model: &SchemaModel) -> Self {
        let dbms = model.dbms();
        XmlDocument {
            xmlns: Some(NAMESPACE.to_string()),
            requested_owning_schema_name: model.requested_schema().map(str::to_string),
            case_sensitivity: model.case_sensitivity().to_string(),
            dbms_name: dbms.name.clone(),
            dbms_version: dbms.version.clone(),
            dbms_major_version: dbms.major_version,
            dbms_minor_version: dbms.minor_version,
            relation_metadatas: XmlRelations {
                items: model
                    .relation_metadatas()
                    .iter()
                    .map(|rel| XmlRelation {
                        rel_type: rel.relation_type.to_string(),
                        rel_id: XmlRelId::from(&rel.relation_id),
                        comment: rel.comment.clone(),
                        fields: XmlFields {
                            items: rel.fields.iter().map(XmlField::from).collect(),
                        },
                    })
                    .collect(),
            },
            foreign_keys: XmlForeignKeys {
                items: model
                    .foreign_keys()
                    .iter()
                    .map(|fk| XmlForeignKey {
                        src_rel: XmlRelId::from(&fk.source_relation_id),
                        tgt_rel: XmlRelId::from(&fk.target_relation_id),
                        components: fk
                            .components
                            .iter()
                            .map(|c| XmlComponent {
                                fk_field_name: c.foreign_key_field_name.clone(),
                                pk_field_name: c.primary_key_field_name.clone(),
                            })
                            .collect(),
                    })
                    .collect(),
            },
        }
    }
}

impl TryFrom<XmlDocument> for SchemaModel {
    type Error = DbmdError;

    fn try_from(doc: XmlDocument) -> Result<Self> {
        let relations = doc
            .relation_metadatas
            .items
            .into_iter()
            .map(|rel| {
                Ok(RelationMetadata::new(
                    rel.rel_id.into(),
                    rel.rel_type.parse()?,
                    rel.comment,
                    rel.fields.items.into_iter().map(Field::from).collect(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let foreign_keys = doc
            .foreign_keys
            .items
            .into_iter()
            .map(|fk| {
                ForeignKey::new(
                    fk.src_rel.into(),
                    fk.tgt_rel.into(),
                    fk.components
                        .into_iter()
                        .map(|c| ForeignKeyComponent::new(c.fk_field_name, c.pk_field_name))
                        .collect(),
                )
            })
            .collect();

        Ok(SchemaModel::new(
            doc.requested_owning_schema_name,
            relations,
            foreign_keys,
            doc.case_sensitivity.parse()?,
            DbmsInfo {
                name: doc.dbms_name,
                version: doc.dbms_version,
                major_version: doc.dbms_major_version,
                minor_version: doc.dbms_minor_version,
            },
        ))
    }
}

/// Write the model as an indented XML document.
pub fn write_xml<W: Write>(writer: &mut W, model: &SchemaModel) -> Result<()> {
    let doc = XmlDocument::from(model);

    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::with_root(&mut body, Some(ROOT_ELEMENT)).map_err(|e| {
        DbmdError::Document {
            message: format!("XML serialization failed: {}", e),
        }
    })?;
    ser.indent(' ', 2);
    doc.serialize(ser).map_err(|e| DbmdError::Document {
        message: format!("XML serialization failed: {}", e),
    })?;

    write_str(writer, XML_DECLARATION, "XML")?;
    write_str(writer, &body, "XML")?;
    write_str(writer, "\n", "XML")
}

pub fn read_xml<R: Read>(mut reader: R) -> Result<SchemaModel> {
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .map_err(|e| DbmdError::Output {
            message: "reading XML".to_string(),
            source: e,
        })?;

    let doc: XmlDocument = quick_xml::de::from_str(&content).map_err(|e| DbmdError::Document {
        message: format!("invalid XML metadata document: {}", e),
    })?;
    SchemaModel::try_from(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::CaseSensitivity;
    use crate::model::relation::RelationType;
    use crate::model::types::SqlType;

    fn model() -> SchemaModel {
        let mut id = Field::new("id", SqlType::Integer.code(), "int4");
        id.primary_key_part_number = Some(1);
        id.nullable = Some(false);
        let mut note = Field::new("note", SqlType::VarChar.code(), "varchar");
        note.length = Some(200);
        note.comment = Some("free text & <markup>".into());

        SchemaModel::new(
            Some(String::new()),
            vec![RelationMetadata::new(
                RelationId::new(None, Some(String::new()), "orders"),
                RelationType::View,
                Some("Order summary".into()),
                vec![id, note],
            )],
            vec![ForeignKey::new(
                RelationId::new(None, Some(String::new()), "orders"),
                RelationId::new(Some("erp".into()), None, "customers"),
                vec![ForeignKeyComponent::new("customer_id", "id")],
            )],
            CaseSensitivity::InsensitiveStoredUpper,
            DbmsInfo {
                name: Some("PostgreSQL".into()),
                version: Some("16.2".into()),
                major_version: Some(16),
                minor_version: Some(2),
            },
        )
    }

    fn render(model: &SchemaModel) -> String {
        let mut buf = Vec::new();
        write_xml(&mut buf, model).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_xml_element_names() {
        let xml = render(&model());
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<database-metadata xmlns=\"http://nctr.fda.gov/dbmd\""));
        assert!(xml.contains("case-sensitivity=\"INSENSITIVE_STORED_UPPER\""));
        assert!(xml.contains("dbms-major-version=\"16\""));
        assert!(xml.contains("<relation-metadatas>"));
        assert!(xml.contains("<rel-md rel-type=\"View\">"));
        assert!(xml.contains("<foreign-key>"));
        assert!(xml.contains("fk-field-name=\"customer_id\""));
        assert!(xml.contains("&amp;"));
    }

    #[test]
    fn test_xml_round_trip() {
        let original = model();
        let restored = read_xml(render(&original).as_bytes()).unwrap();

        assert_eq!(restored.relation_metadatas(), original.relation_metadatas());
        assert_eq!(restored.foreign_keys(), original.foreign_keys());
        assert_eq!(restored.case_sensitivity(), original.case_sensitivity());
        assert_eq!(restored.dbms(), original.dbms());
        // Empty-string schema survives, distinct from absent
        assert_eq!(restored.requested_schema(), Some(""));
    }

    #[test]
    fn test_xml_round_trip_keeps_comment_whitespace() {
        let mut code = Field::new("code", SqlType::Char.code(), "bpchar");
        code.comment = Some(" lead".into());
        let mut memo = Field::new("memo", SqlType::VarChar.code(), "varchar");
        memo.comment = Some("first line\n\tsecond line\n".into());
        let mut blank = Field::new("blank", SqlType::VarChar.code(), "varchar");
        blank.comment = Some(String::new());

        let original = SchemaModel::new(
            Some("public".into()),
            vec![RelationMetadata::new(
                RelationId::new(None, Some("public".into()), "notes"),
                RelationType::Table,
                Some("  padded  ".into()),
                vec![code, memo, blank],
            )],
            vec![],
            CaseSensitivity::InsensitiveStoredLower,
            DbmsInfo::default(),
        );
        let restored = read_xml(render(&original).as_bytes()).unwrap();

        let rel = &restored.relation_metadatas()[0];
        assert_eq!(rel.comment.as_deref(), Some("  padded  "));
        assert_eq!(rel.field("code").unwrap().comment.as_deref(), Some(" lead"));
        assert_eq!(
            rel.field("memo").unwrap().comment.as_deref(),
            Some("first line\n\tsecond line\n")
        );
        assert_eq!(rel.field("blank").unwrap().comment.as_deref(), Some(""));
        assert_eq!(restored.relation_metadatas(), original.relation_metadatas());
    }

    #[test]
    fn test_xml_round_trip_empty_model() {
        let empty = SchemaModel::new(
            None,
            vec![],
            vec![],
            CaseSensitivity::Sensitive,
            DbmsInfo::default(),
        );
        let restored = read_xml(render(&empty).as_bytes()).unwrap();
        assert_eq!(restored.relation_count(), 0);
        assert_eq!(restored.foreign_key_count(), 0);
        assert_eq!(restored.requested_schema(), None);
    }

    #[test]
    fn test_read_xml_rejects_unknown_policy() {
        let xml = r#"<database-metadata case-sensitivity="LOUD"><relation-metadatas/><foreign-keys/></database-metadata>"#;
        assert!(matches!(read_xml(xml.as_bytes()), Err(DbmdError::Document { .. })));
    }
}
