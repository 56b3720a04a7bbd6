pub mod config;
pub mod error;
pub mod fetch;
pub mod ident;
pub mod introspect;
pub mod model;
pub mod output;

// Re-export key types for convenience
pub use error::{DbmdError, Result};
pub use fetch::{DateMapping, FetchOptions, MetadataFetcher};
pub use ident::CaseSensitivity;
pub use introspect::{DatabaseType, MetadataSource};
pub use model::{ForeignKey, RelationId, RelationMetadata, SchemaModel};
