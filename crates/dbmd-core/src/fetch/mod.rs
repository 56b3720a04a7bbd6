//! # Metadata Fetcher
//!
//! Walks a [`MetadataSource`] and assembles its row streams into model values:
//!
//! 1. relation descriptors, filtered by kind and an optional exclusion regex
//! 2. relation metadata, grouping column rows per relation and attaching
//!    primary key positions and resolved type codes
//! 3. foreign keys, grouping imported-key rows on component sequence 1
//!
//! [`MetadataFetcher::fetch_metadata`] runs all three and builds the
//! [`SchemaModel`]. Stages run one after another on the same source; the
//! first error aborts the fetch and no partial model is returned.

mod accumulate;
pub mod resolve;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DbmdError, Result};
use crate::ident::{normalize_identifier, CaseSensitivity};
use crate::introspect::{non_empty, MetadataSource, RelationKind};
use crate::model::foreign_key::{ForeignKey, ForeignKeyComponent};
use crate::model::relation::{RelationDescriptor, RelationMetadata, RelationType};
use crate::model::relation_id::RelationId;
use crate::model::schema::SchemaModel;

use accumulate::{ForeignKeyAccumulator, RelationAccumulator};
use resolve::make_field;

/// How columns whose native type is `DATE` are reported when the driver calls
/// them DATE or TIMESTAMP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateMapping {
    #[default]
    DatesAsDriverReported,
    DatesAsTimestamps,
    DatesAsDates,
}

impl fmt::Display for DateMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateMapping::DatesAsDriverReported => write!(f, "dates-as-driver-reported"),
            DateMapping::DatesAsTimestamps => write!(f, "dates-as-timestamps"),
            DateMapping::DatesAsDates => write!(f, "dates-as-dates"),
        }
    }
}

impl FromStr for DateMapping {
    type Err = DbmdError;

    /// Accepts `dates-as-timestamps` as well as `DATES_AS_TIMESTAMPS`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "dates-as-driver-reported" => Ok(DateMapping::DatesAsDriverReported),
            "dates-as-timestamps" => Ok(DateMapping::DatesAsTimestamps),
            "dates-as-dates" => Ok(DateMapping::DatesAsDates),
            _ => Err(DbmdError::Config {
                message: format!(
                    "Unknown date mapping '{}'. Expected one of: dates-as-driver-reported, \
                     dates-as-timestamps, dates-as-dates",
                    s
                ),
            }),
        }
    }
}

/// What to fetch. Defaults fetch everything with no exclusions.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub date_mapping: DateMapping,
    pub include_tables: bool,
    pub include_views: bool,
    pub include_fields: bool,
    pub include_foreign_keys: bool,
    /// Relations whose canonical id string matches are left out, along with
    /// every foreign key touching them.
    pub exclude: Option<Regex>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            date_mapping: DateMapping::default(),
            include_tables: true,
            include_views: true,
            include_fields: true,
            include_foreign_keys: true,
            exclude: None,
        }
    }
}

/// Compile an exclusion pattern, reporting a bad pattern as a configuration error.
pub fn compile_exclude(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| DbmdError::Config {
        message: format!("Invalid exclude pattern '{}': {}", pattern, e),
    })
}

fn excluded(exclude: Option<&Regex>, id: &RelationId) -> bool {
    exclude.is_some_and(|re| re.is_match(&id.id_string()))
}

fn reported_id(catalog: &Option<String>, schema: &Option<String>, name: &str) -> RelationId {
    RelationId::new(non_empty(catalog.clone()), non_empty(schema.clone()), name)
}

pub struct MetadataFetcher<'a, S: MetadataSource> {
    source: &'a S,
    date_mapping: DateMapping,
}

impl<'a, S: MetadataSource> MetadataFetcher<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self::with_date_mapping(source, DateMapping::default())
    }

    pub fn with_date_mapping(source: &'a S, date_mapping: DateMapping) -> Self {
        Self { source, date_mapping }
    }

    pub fn date_mapping(&self) -> DateMapping {
        self.date_mapping
    }

    pub async fn fetch_case_sensitivity(&self) -> Result<CaseSensitivity> {
        let flags = self.source.case_sensitivity_flags().await?;
        Ok(CaseSensitivity::from_flags(
            flags.stores_lower,
            flags.stores_upper,
            flags.stores_mixed,
        ))
    }

    /// List the relations under `schema`, classified as table or view.
    pub async fn fetch_relation_descriptions(
        &self,
        schema: Option<&str>,
        include_tables: bool,
        include_views: bool,
        exclude: Option<&Regex>,
    ) -> Result<Vec<RelationDescriptor>> {
        let mut kinds = Vec::with_capacity(2);
        if include_tables {
            kinds.push(RelationKind::Table);
        }
        if include_views {
            kinds.push(RelationKind::View);
        }
        if kinds.is_empty() {
            tracing::debug!("Neither tables nor views requested; skipping relation listing");
            return Ok(Vec::new());
        }

        let rows = self.source.list_relations(schema, &kinds).await?;
        let total = rows.len();

        let descriptors: Vec<RelationDescriptor> = rows
            .into_iter()
            .map(|row| RelationDescriptor {
                relation_id: reported_id(&row.catalog, &row.schema, &row.name),
                relation_type: RelationType::from_kind(&row.kind),
                comment: row.comment,
            })
            .filter(|d| !excluded(exclude, &d.relation_id))
            .collect();

        tracing::debug!(
            "Fetched {} relation descriptions ({} excluded)",
            descriptors.len(),
            total - descriptors.len()
        );
        Ok(descriptors)
    }

    /// Fetch the fields of the given relations. Columns of relations not in
    /// `descriptors` are skipped.
    pub async fn fetch_relation_metadatas(
        &self,
        descriptors: &[RelationDescriptor],
        schema: Option<&str>,
    ) -> Result<Vec<RelationMetadata>> {
        let by_id: HashMap<&RelationId, &RelationDescriptor> =
            descriptors.iter().map(|d| (&d.relation_id, d)).collect();

        let rows = self.source.list_columns(schema).await?;
        let mut pk_cache: HashMap<RelationId, HashMap<String, u32>> = HashMap::new();
        let mut acc = RelationAccumulator::new();
        let mut skipped = 0usize;

        for row in &rows {
            let id = reported_id(&row.catalog, &row.schema, &row.relation_name);
            let Some(descriptor) = by_id.get(&id) else {
                skipped += 1;
                continue;
            };

            if !pk_cache.contains_key(&id) {
                let pk_rows = self
                    .source
                    .list_primary_keys(id.catalog(), id.schema(), id.name())
                    .await?;
                let parts: HashMap<String, u32> = pk_rows
                    .into_iter()
                    .filter_map(|pk| Some((pk.column_name, u32::try_from(pk.sequence_number).ok()?)))
                    .collect();
                pk_cache.insert(id.clone(), parts);
            }
            let field = make_field(row, &pk_cache[&id], self.date_mapping);
            acc.push(descriptor, field);
        }

        let relations = acc.finish();
        tracing::debug!(
            "Fetched fields for {} relations from {} column rows ({} rows skipped)",
            relations.len(),
            rows.len(),
            skipped
        );
        Ok(relations)
    }

    /// Fetch the foreign keys imported by relations under `schema`.
    pub async fn fetch_foreign_keys(&self, schema: Option<&str>, exclude: Option<&Regex>) -> Result<Vec<ForeignKey>> {
        let rows = self.source.list_imported_keys(schema).await?;
        let mut acc = ForeignKeyAccumulator::new();

        for row in &rows {
            acc.push(
                reported_id(&row.fk_catalog, &row.fk_schema, &row.fk_relation),
                reported_id(&row.pk_catalog, &row.pk_schema, &row.pk_relation),
                row.component_sequence,
                ForeignKeyComponent::new(row.fk_column.clone(), row.pk_column.clone()),
            )?;
        }

        let all = acc.finish();
        let total = all.len();
        let fks: Vec<ForeignKey> = all
            .into_iter()
            .filter(|fk| !excluded(exclude, &fk.source_relation_id) && !excluded(exclude, &fk.target_relation_id))
            .collect();

        tracing::debug!(
            "Fetched {} foreign keys from {} rows ({} excluded)",
            fks.len(),
            rows.len(),
            total - fks.len()
        );
        Ok(fks)
    }

    /// Run the full fetch and build the schema model.
    ///
    /// `schema` is normalized under the engine's policy first; `<none>` asks
    /// for the empty-string schema and `None` for every schema.
    pub async fn fetch_metadata(&self, schema: Option<&str>, options: &FetchOptions) -> Result<SchemaModel> {
        let case_sensitivity = self.fetch_case_sensitivity().await?;
        let schema = normalize_identifier(schema, case_sensitivity);
        tracing::debug!(
            "Fetching metadata for schema {} ({})",
            schema.as_deref().unwrap_or("<any>"),
            case_sensitivity
        );

        let exclude = options.exclude.as_ref();
        let descriptors = self
            .fetch_relation_descriptions(
                schema.as_deref(),
                options.include_tables,
                options.include_views,
                exclude,
            )
            .await?;

        let relations = if options.include_fields {
            self.fetch_relation_metadatas(&descriptors, schema.as_deref())
                .await?
        } else {
            descriptors
                .iter()
                .map(RelationMetadata::from_descriptor)
                .collect()
        };

        let foreign_keys = if options.include_foreign_keys {
            self.fetch_foreign_keys(schema.as_deref(), exclude).await?
        } else {
            Vec::new()
        };

        let dbms = self.source.dbms_info().await?;

        Ok(SchemaModel::new(
            schema,
            relations,
            foreign_keys,
            case_sensitivity,
            dbms,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_mapping_parse() {
        assert_eq!(
            "dates-as-timestamps".parse::<DateMapping>().unwrap(),
            DateMapping::DatesAsTimestamps
        );
        assert_eq!(
            "DATES_AS_DATES".parse::<DateMapping>().unwrap(),
            DateMapping::DatesAsDates
        );
        assert!(matches!(
            "dates-as-strings".parse::<DateMapping>(),
            Err(DbmdError::Config { .. })
        ));
    }

    #[test]
    fn test_date_mapping_display_round_trips() {
        for m in [
            DateMapping::DatesAsDriverReported,
            DateMapping::DatesAsTimestamps,
            DateMapping::DatesAsDates,
        ] {
            assert_eq!(m.to_string().parse::<DateMapping>().unwrap(), m);
        }
    }

    #[test]
    fn test_compile_exclude_rejects_bad_pattern() {
        assert!(compile_exclude("^public\\.flyway_.*").is_ok());
        assert!(matches!(compile_exclude("(unclosed"), Err(DbmdError::Config { .. })));
    }

    #[test]
    fn test_excluded_matches_id_string() {
        let re = compile_exclude("^audit\\.").unwrap();
        assert!(excluded(Some(&re), &RelationId::new(None, Some("audit".into()), "log")));
        assert!(!excluded(Some(&re), &RelationId::new(None, Some("public".into()), "audit")));
        assert!(!excluded(None, &RelationId::new(None, None, "x")));
    }
}
