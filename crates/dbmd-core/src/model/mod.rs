pub mod field;
pub mod foreign_key;
pub mod relation;
pub mod relation_id;
pub mod schema;
pub mod types;

pub use field::Field;
pub use foreign_key::{EquationStyle, ForeignKey, ForeignKeyComponent};
pub use relation::{RelationDescriptor, RelationMetadata, RelationType};
pub use relation_id::RelationId;
pub use schema::{DbmsInfo, ForeignKeyScope, SchemaModel, SchemaParts};
pub use types::SqlType;
