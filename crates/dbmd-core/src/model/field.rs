use serde::{Deserialize, Serialize};

use crate::model::types::{is_character_code, is_numeric_code, type_code_name};

/// A column of a table or view.
///
/// `length` is only set for character types; `precision`,
/// `fractional_digits` and `radix` only for numeric types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    /// Portable type code (see [`crate::model::types::SqlType`]).
    pub type_code: i32,
    /// Type name as the database reports it.
    pub database_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fractional_digits: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radix: Option<u32>,
    /// `None` when the database could not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// 1-based position within the primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key_part_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_code: i32, database_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_code,
            database_type: database_type.into(),
            length: None,
            precision: None,
            fractional_digits: None,
            radix: None,
            nullable: None,
            primary_key_part_number: None,
            comment: None,
        }
    }

    pub fn is_numeric_type(&self) -> bool {
        is_numeric_code(self.type_code)
    }

    pub fn is_character_type(&self) -> bool {
        is_character_code(self.type_code)
    }

    pub fn is_primary_key_part(&self) -> bool {
        self.primary_key_part_number.is_some()
    }

    pub fn type_name(&self) -> String {
        type_code_name(self.type_code)
    }
}
