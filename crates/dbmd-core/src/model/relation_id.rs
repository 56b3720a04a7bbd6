use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ident::{normalize_identifier, normalize_name, CaseSensitivity};

/// Identity of a table or view: optional catalog, optional schema, name.
///
/// Components are stored already normalized, so equality and hashing on the
/// triple are the identity used by every index in the schema model. Ordering
/// follows the canonical id string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationId {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    catalog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema: Option<String>,
    name: String,
}

impl RelationId {
    /// Build an id from components that are already in normalized form.
    pub fn new(catalog: Option<String>, schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            catalog,
            schema,
            name: name.into(),
        }
    }

    /// Build an id from raw identifiers, normalizing each component under
    /// `policy`. Empty catalog or schema strings become absent.
    pub fn normalized(
        catalog: Option<&str>,
        schema: Option<&str>,
        name: &str,
        policy: CaseSensitivity,
    ) -> Self {
        Self {
            catalog: normalize_identifier(catalog, policy),
            schema: normalize_identifier(schema, policy),
            name: normalize_name(name, policy),
        }
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical string form: `[catalog]schema.name`, with the bracketed
    /// catalog and the `schema.` prefix present only when set.
    pub fn id_string(&self) -> String {
        let mut s = String::with_capacity(self.name.len() + 16);
        if let Some(catalog) = &self.catalog {
            s.push('[');
            s.push_str(catalog);
            s.push(']');
        }
        if let Some(schema) = &self.schema {
            s.push_str(schema);
            s.push('.');
        }
        s.push_str(&self.name);
        s
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id_string())
    }
}

impl Ord for RelationId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Distinct triples can share an id string ("a.b" + "c" vs "a" + "b.c"),
        // so fall back to the components to stay consistent with Eq.
        self.id_string()
            .cmp(&other.id_string())
            .then_with(|| self.catalog.cmp(&other.catalog))
            .then_with(|| self.schema.cmp(&other.schema))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for RelationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
