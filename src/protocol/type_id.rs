use crate::{RelayError, RelayResult};
use serde::{Deserialize, Serialize};

/// Representation tag of a wire value.
///
/// The tag is explicit in both serializations so that integer widths and NULL
/// remain distinguishable from each other and from any type's zero value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rep {
    /// The NULL value; carries no payload.
    Null,
    /// TRUE or FALSE.
    Boolean,
    /// 8-bit signed integer.
    Byte,
    /// 16-bit signed integer.
    Short,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Arbitrary-precision decimal, transmitted as unscaled integer + scale.
    Decimal,
    /// UTF-8 string.
    String,
    /// Raw byte sequence.
    Bytes,
    /// Days since 1970-01-01.
    Date,
    /// Milliseconds past midnight.
    Time,
    /// Milliseconds since the epoch, UTC assumed.
    Timestamp,
    /// Ordered sequence of values of one component representation.
    Array,
}

impl Rep {
    pub(crate) fn type_code(self) -> u8 {
        match self {
            Rep::Null => 0,
            Rep::Boolean => 1,
            Rep::Byte => 2,
            Rep::Short => 3,
            Rep::Int => 4,
            Rep::Long => 5,
            Rep::Float => 6,
            Rep::Double => 7,
            Rep::Decimal => 8,
            Rep::String => 9,
            Rep::Bytes => 10,
            Rep::Date => 11,
            Rep::Time => 12,
            Rep::Timestamp => 13,
            Rep::Array => 14,
        }
    }

    pub(crate) fn try_new(code: u8) -> RelayResult<Rep> {
        Ok(match code {
            0 => Rep::Null,
            1 => Rep::Boolean,
            2 => Rep::Byte,
            3 => Rep::Short,
            4 => Rep::Int,
            5 => Rep::Long,
            6 => Rep::Float,
            7 => Rep::Double,
            8 => Rep::Decimal,
            9 => Rep::String,
            10 => Rep::Bytes,
            11 => Rep::Date,
            12 => Rep::Time,
            13 => Rep::Timestamp,
            14 => Rep::Array,
            _ => {
                return Err(RelayError::Protocol(format!(
                    "value carried an invalid tag: {code}"
                )))
            }
        })
    }

    /// The nominal SQL type code usually associated with this representation.
    pub fn default_sql_type(self) -> i32 {
        use super::column_meta::sql_types;
        match self {
            Rep::Null => sql_types::NULL,
            Rep::Boolean => sql_types::BOOLEAN,
            Rep::Byte => sql_types::TINYINT,
            Rep::Short => sql_types::SMALLINT,
            Rep::Int => sql_types::INTEGER,
            Rep::Long => sql_types::BIGINT,
            Rep::Float => sql_types::REAL,
            Rep::Double => sql_types::DOUBLE,
            Rep::Decimal => sql_types::DECIMAL,
            Rep::String => sql_types::VARCHAR,
            Rep::Bytes => sql_types::VARBINARY,
            Rep::Date => sql_types::DATE,
            Rep::Time => sql_types::TIME,
            Rep::Timestamp => sql_types::TIMESTAMP,
            Rep::Array => sql_types::ARRAY,
        }
    }
}
