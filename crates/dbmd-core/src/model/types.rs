use std::fmt;

/// Portable SQL type codes, numerically identical to the `java.sql.Types`
/// constants that most metadata consumers already understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    NChar,
    NVarChar,
    LongNVarChar,
    Date,
    Time,
    Timestamp,
    TimeWithTimezone,
    TimestampWithTimezone,
    Binary,
    VarBinary,
    LongVarBinary,
    Null,
    Other,
    JavaObject,
    Distinct,
    Struct,
    Array,
    Blob,
    Clob,
    NClob,
    Ref,
    DataLink,
    Boolean,
    RowId,
    SqlXml,
}

const ALL_TYPES: &[SqlType] = &[
    SqlType::Bit,
    SqlType::TinyInt,
    SqlType::SmallInt,
    SqlType::Integer,
    SqlType::BigInt,
    SqlType::Float,
    SqlType::Real,
    SqlType::Double,
    SqlType::Numeric,
    SqlType::Decimal,
    SqlType::Char,
    SqlType::VarChar,
    SqlType::LongVarChar,
    SqlType::NChar,
    SqlType::NVarChar,
    SqlType::LongNVarChar,
    SqlType::Date,
    SqlType::Time,
    SqlType::Timestamp,
    SqlType::TimeWithTimezone,
    SqlType::TimestampWithTimezone,
    SqlType::Binary,
    SqlType::VarBinary,
    SqlType::LongVarBinary,
    SqlType::Null,
    SqlType::Other,
    SqlType::JavaObject,
    SqlType::Distinct,
    SqlType::Struct,
    SqlType::Array,
    SqlType::Blob,
    SqlType::Clob,
    SqlType::NClob,
    SqlType::Ref,
    SqlType::DataLink,
    SqlType::Boolean,
    SqlType::RowId,
    SqlType::SqlXml,
];

impl SqlType {
    pub fn code(&self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::VarChar => 12,
            SqlType::LongVarChar => -1,
            SqlType::NChar => -15,
            SqlType::NVarChar => -9,
            SqlType::LongNVarChar => -16,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::TimeWithTimezone => 2013,
            SqlType::TimestampWithTimezone => 2014,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::Null => 0,
            SqlType::Other => 1111,
            SqlType::JavaObject => 2000,
            SqlType::Distinct => 2001,
            SqlType::Struct => 2002,
            SqlType::Array => 2003,
            SqlType::Blob => 2004,
            SqlType::Clob => 2005,
            SqlType::NClob => 2011,
            SqlType::Ref => 2006,
            SqlType::DataLink => 70,
            SqlType::Boolean => 16,
            SqlType::RowId => -8,
            SqlType::SqlXml => 2009,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        ALL_TYPES.iter().copied().find(|t| t.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Bit => "BIT",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::LongVarChar => "LONGVARCHAR",
            SqlType::NChar => "NCHAR",
            SqlType::NVarChar => "NVARCHAR",
            SqlType::LongNVarChar => "LONGNVARCHAR",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimeWithTimezone => "TIME_WITH_TIMEZONE",
            SqlType::TimestampWithTimezone => "TIMESTAMP_WITH_TIMEZONE",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::LongVarBinary => "LONGVARBINARY",
            SqlType::Null => "NULL",
            SqlType::Other => "OTHER",
            SqlType::JavaObject => "JAVA_OBJECT",
            SqlType::Distinct => "DISTINCT",
            SqlType::Struct => "STRUCT",
            SqlType::Array => "ARRAY",
            SqlType::Blob => "BLOB",
            SqlType::Clob => "CLOB",
            SqlType::NClob => "NCLOB",
            SqlType::Ref => "REF",
            SqlType::DataLink => "DATALINK",
            SqlType::Boolean => "BOOLEAN",
            SqlType::RowId => "ROWID",
            SqlType::SqlXml => "SQLXML",
        }
    }

    /// Returns true for types whose size is a precision with scale and radix.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Float
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal
                | SqlType::Numeric
        )
    }

    /// Returns true for types whose size is a maximum character length.
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::LongVarChar
                | SqlType::NChar
                | SqlType::NVarChar
                | SqlType::LongNVarChar
        )
    }

    /// Map a native database type name onto a portable type code.
    ///
    /// Covers the type spellings reported by PostgreSQL, MySQL and SQLite.
    /// Unrecognized names map to `Other`.
    pub fn from_native(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        let normalized = normalized.as_str();

        // PostgreSQL reports arrays as "ARRAY" or with a leading underscore / trailing []
        if normalized == "array" || normalized.ends_with("[]") {
            return SqlType::Array;
        }
        if normalized.len() > 1 && normalized.starts_with('_') {
            return SqlType::Array;
        }

        // Strip any "(n)" / "(p,s)" suffix and MySQL's "unsigned" modifier.
        let base = normalized
            .split('(')
            .next()
            .unwrap_or(normalized)
            .trim_end_matches(" unsigned")
            .trim();

        match base {
            "bit" => SqlType::Bit,
            "tinyint" => SqlType::TinyInt,
            "smallint" | "int2" | "smallserial" | "serial2" | "year" => SqlType::SmallInt,
            "integer" | "int" | "int4" | "mediumint" | "serial" | "serial4" => SqlType::Integer,
            "bigint" | "int8" | "bigserial" | "serial8" => SqlType::BigInt,
            "float" => SqlType::Float,
            "real" | "float4" => SqlType::Real,
            "double precision" | "float8" | "double" => SqlType::Double,
            "numeric" | "money" => SqlType::Numeric,
            "decimal" => SqlType::Decimal,
            "character varying" | "varchar" | "varchar2" | "nvarchar2" => SqlType::VarChar,
            "character" | "char" | "bpchar" => SqlType::Char,
            "nchar" | "national character" => SqlType::NChar,
            "nvarchar" | "national character varying" => SqlType::NVarChar,
            "text" | "tinytext" | "mediumtext" | "longtext" | "citext" | "name" => {
                SqlType::LongVarChar
            }
            "clob" => SqlType::Clob,
            "boolean" | "bool" => SqlType::Boolean,
            "date" => SqlType::Date,
            "time" | "time without time zone" => SqlType::Time,
            "time with time zone" | "timetz" => SqlType::TimeWithTimezone,
            "timestamp" | "timestamp without time zone" | "datetime" => SqlType::Timestamp,
            "timestamp with time zone" | "timestamptz" => SqlType::TimestampWithTimezone,
            "bytea" | "varbinary" => SqlType::VarBinary,
            "binary" => SqlType::Binary,
            "blob" | "tinyblob" | "mediumblob" | "longblob" => SqlType::Blob,
            "xml" | "xmltype" | "sys.xmltype" => SqlType::SqlXml,
            _ => SqlType::Other,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a raw type code, including codes outside the known set.
pub fn type_code_name(code: i32) -> String {
    match SqlType::from_code(code) {
        Some(t) => t.name().to_string(),
        None => format!("unknown[{}]", code),
    }
}

pub fn is_numeric_code(code: i32) -> bool {
    SqlType::from_code(code).is_some_and(|t| t.is_numeric())
}

pub fn is_character_code(code: i32) -> bool {
    SqlType::from_code(code).is_some_and(|t| t.is_character())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in ALL_TYPES.iter().enumerate() {
            for b in &ALL_TYPES[i + 1..] {
                assert_ne!(a.code(), b.code(), "{} and {} share a code", a, b);
            }
        }
    }

    #[test]
    fn test_code_round_trip() {
        for t in ALL_TYPES {
            assert_eq!(SqlType::from_code(t.code()), Some(*t));
        }
        assert_eq!(SqlType::from_code(424242), None);
    }

    #[test]
    fn test_type_code_name_unknown() {
        assert_eq!(type_code_name(12), "VARCHAR");
        assert_eq!(type_code_name(-100), "unknown[-100]");
    }

    #[test]
    fn test_classification_is_exclusive() {
        for t in ALL_TYPES {
            assert!(!(t.is_numeric() && t.is_character()), "{}", t);
        }
        assert!(is_numeric_code(SqlType::Decimal.code()));
        assert!(is_character_code(SqlType::VarChar.code()));
        assert!(!is_numeric_code(SqlType::Date.code()));
        assert!(!is_character_code(9999));
    }

    #[test]
    fn test_from_native() {
        assert_eq!(SqlType::from_native("character varying"), SqlType::VarChar);
        assert_eq!(SqlType::from_native("VARCHAR(255)"), SqlType::VarChar);
        assert_eq!(SqlType::from_native("numeric(10,2)"), SqlType::Numeric);
        assert_eq!(SqlType::from_native("int unsigned"), SqlType::Integer);
        assert_eq!(SqlType::from_native("timestamp with time zone"), SqlType::TimestampWithTimezone);
        assert_eq!(SqlType::from_native("_int4"), SqlType::Array);
        assert_eq!(SqlType::from_native("XMLTYPE"), SqlType::SqlXml);
        assert_eq!(SqlType::from_native("geometry"), SqlType::Other);
    }
}
