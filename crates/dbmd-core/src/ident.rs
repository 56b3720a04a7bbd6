//! # Identifier Normalization
//!
//! Database engines fold unquoted identifiers differently: PostgreSQL stores
//! them lower case, Oracle and DB2 upper case, MySQL and SQLite keep whatever
//! was written. Every identifier that is compared or used as a lookup key goes
//! through [`normalize_identifier`] with the policy the engine reported, so
//! `Orders`, `ORDERS` and `orders` land on the same key where the engine would
//! treat them as the same object.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DbmdError;

/// The quote character wrapped around identifiers that must keep their case.
pub const QUOTE: char = '"';

/// Token requesting the empty-string schema explicitly, as opposed to "no
/// schema given".
pub const EMPTY_SCHEMA_TOKEN: &str = "<none>";

/// How the engine stores unquoted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseSensitivity {
    InsensitiveStoredLower,
    InsensitiveStoredUpper,
    InsensitiveStoredMixed,
    Sensitive,
}

impl CaseSensitivity {
    /// Derive the policy from the three mutually exclusive "stores" flags an
    /// introspection source reports. Checked lower, upper, mixed; none set
    /// means the engine is case sensitive.
    pub fn from_flags(stores_lower: bool, stores_upper: bool, stores_mixed: bool) -> Self {
        if stores_lower {
            CaseSensitivity::InsensitiveStoredLower
        } else if stores_upper {
            CaseSensitivity::InsensitiveStoredUpper
        } else if stores_mixed {
            CaseSensitivity::InsensitiveStoredMixed
        } else {
            CaseSensitivity::Sensitive
        }
    }

    /// Fold an unquoted identifier the way the engine stores it.
    pub fn fold(&self, id: &str) -> String {
        match self {
            CaseSensitivity::InsensitiveStoredLower => id.to_lowercase(),
            CaseSensitivity::InsensitiveStoredUpper => id.to_uppercase(),
            CaseSensitivity::InsensitiveStoredMixed | CaseSensitivity::Sensitive => id.to_string(),
        }
    }
}

impl fmt::Display for CaseSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseSensitivity::InsensitiveStoredLower => write!(f, "INSENSITIVE_STORED_LOWER"),
            CaseSensitivity::InsensitiveStoredUpper => write!(f, "INSENSITIVE_STORED_UPPER"),
            CaseSensitivity::InsensitiveStoredMixed => write!(f, "INSENSITIVE_STORED_MIXED"),
            CaseSensitivity::Sensitive => write!(f, "SENSITIVE"),
        }
    }
}

impl FromStr for CaseSensitivity {
    type Err = DbmdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSENSITIVE_STORED_LOWER" => Ok(CaseSensitivity::InsensitiveStoredLower),
            "INSENSITIVE_STORED_UPPER" => Ok(CaseSensitivity::InsensitiveStoredUpper),
            "INSENSITIVE_STORED_MIXED" => Ok(CaseSensitivity::InsensitiveStoredMixed),
            "SENSITIVE" => Ok(CaseSensitivity::Sensitive),
            other => Err(DbmdError::Document {
                message: format!("unknown case sensitivity '{}'", other),
            }),
        }
    }
}

/// Returns true if `id` is wrapped in the engine quote character.
pub fn is_quoted(id: &str) -> bool {
    id.len() >= 2 && id.starts_with(QUOTE) && id.ends_with(QUOTE)
}

/// Normalize a database identifier under the given case-sensitivity policy.
///
/// - `None` and `""` normalize to `None`: no schema or catalog was given.
/// - `<none>` normalizes to `Some("")`: the empty-string schema, explicitly.
/// - Quoted identifiers keep their exact case. The quotes are dropped only
///   when they are redundant, i.e. the interior is already what folding would
///   produce (all lower under `InsensitiveStoredLower`, all upper under
///   `InsensitiveStoredUpper`).
/// - Anything else is folded per the policy.
pub fn normalize_identifier(id: Option<&str>, policy: CaseSensitivity) -> Option<String> {
    let id = match id {
        None | Some("") => return None,
        Some(id) => id,
    };

    if id == EMPTY_SCHEMA_TOKEN {
        return Some(String::new());
    }

    if is_quoted(id) {
        let interior = &id[1..id.len() - 1];
        return Some(match unquote_if_redundant(interior, policy) {
            Some(bare) => bare.to_string(),
            None => id.to_string(),
        });
    }

    Some(policy.fold(id))
}

/// Normalize an identifier that must be present (relation, field names).
pub fn normalize_name(id: &str, policy: CaseSensitivity) -> String {
    normalize_identifier(Some(id), policy).unwrap_or_default()
}

/// Normalize every name in a set, dropping nothing but collapsing names that
/// normalize to the same value.
pub fn normalize_names<'a, I>(names: I, policy: CaseSensitivity) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| normalize_name(name, policy))
        .collect()
}

fn unquote_if_redundant(interior: &str, policy: CaseSensitivity) -> Option<&str> {
    if interior.is_empty() || interior.contains(QUOTE) {
        return None;
    }
    let redundant = match policy {
        CaseSensitivity::InsensitiveStoredLower => interior == interior.to_lowercase(),
        CaseSensitivity::InsensitiveStoredUpper => interior == interior.to_uppercase(),
        CaseSensitivity::InsensitiveStoredMixed | CaseSensitivity::Sensitive => false,
    };
    redundant.then_some(interior)
}
