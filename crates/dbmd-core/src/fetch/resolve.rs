use std::collections::HashMap;

use crate::fetch::DateMapping;
use crate::introspect::{ColumnRow, COLUMN_NO_NULLS, COLUMN_NULLABLE};
use crate::model::field::Field;
use crate::model::types::{is_character_code, is_numeric_code, SqlType};

/// Native type names of XML columns on engines that report them as a
/// proprietary or OTHER type code.
const XML_TYPE_NAMES: &[&str] = &["XML", "XMLTYPE", "SYS.XMLTYPE"];

/// Resolve the portable type code for a column from what the driver reported.
pub fn resolve_type_code(driver_code: i32, native_type_name: &str, mapping: DateMapping) -> i32 {
    let native_uc = native_type_name.trim().to_uppercase();

    if driver_code == SqlType::Date.code() || driver_code == SqlType::Timestamp.code() {
        if native_uc == "DATE" {
            return match mapping {
                DateMapping::DatesAsDriverReported => driver_code,
                DateMapping::DatesAsTimestamps => SqlType::Timestamp.code(),
                DateMapping::DatesAsDates => SqlType::Date.code(),
            };
        }
        return driver_code;
    }

    let vendor_or_other = driver_code == SqlType::Other.code() || SqlType::from_code(driver_code).is_none();
    if vendor_or_other && XML_TYPE_NAMES.contains(&native_uc.as_str()) {
        return SqlType::SqlXml.code();
    }

    driver_code
}

/// Tri-state nullability from the source's nullability code.
pub fn nullable_from_code(code: i32) -> Option<bool> {
    match code {
        COLUMN_NO_NULLS => Some(false),
        COLUMN_NULLABLE => Some(true),
        _ => None,
    }
}

fn to_u32(value: Option<i32>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

/// Build a field from a column row. `pk_parts` maps column names of the
/// row's relation to their 1-based primary key positions.
pub(crate) fn make_field(row: &ColumnRow, pk_parts: &HashMap<String, u32>, mapping: DateMapping) -> Field {
    let type_code = resolve_type_code(row.type_code, &row.type_name, mapping);
    let numeric = is_numeric_code(type_code);

    let mut field = Field::new(row.column_name.clone(), type_code, row.type_name.clone());
    field.length = if is_character_code(type_code) {
        to_u32(row.column_size)
    } else {
        None
    };
    if numeric {
        field.precision = to_u32(row.column_size);
        field.fractional_digits = row.decimal_digits;
        field.radix = to_u32(row.radix);
    }
    field.nullable = nullable_from_code(row.nullable_code);
    field.primary_key_part_number = pk_parts.get(&row.column_name).copied();
    field.comment = row.remarks.clone();
    field
}
