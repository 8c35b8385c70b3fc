use crate::{
    protocol::{wire, Rep},
    RelayError, RelayResult,
};
use bigdecimal::{BigDecimal, FromPrimitive};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

// i64 values beyond this lose precision in a binary-float JSON number.
const MAX_SAFE_JSON_INT: i64 = (1_i64 << 53) - 1;

const SECONDS_PER_DAY: i64 = 86_400;

/// Enum for all wire value types.
///
/// The representation tag ([`Rep`]) is explicit in both serializations, so a
/// NULL and the various integer widths never collapse into each other.
#[derive(Clone, Debug, PartialEq)]
pub enum DbValue {
    /// Representation of a database NULL value.
    Null,
    /// TRUE or FALSE.
    Boolean(bool),
    /// Stores an 8-bit signed integer.
    Byte(i8),
    /// Stores a 16-bit signed integer.
    Short(i16),
    /// Stores a 32-bit signed integer.
    Int(i32),
    /// Stores a 64-bit signed integer.
    Long(i64),
    /// Stores a single-precision 32-bit floating-point number.
    Float(f32),
    /// Stores a double-precision 64-bit floating-point number.
    Double(f64),
    /// Representation for fixed-point decimal values.
    ///
    /// Transmitted as (unscaled integer as decimal string, scale), never as a
    /// binary float; the canonical string form preserves the trailing zeros
    /// demanded by the scale.
    Decimal(BigDecimal),
    /// Stores a UTF-8 string.
    String(String),
    /// Stores binary data.
    Bytes(Vec<u8>),
    /// SQL DATE as days since 1970-01-01.
    Date(i32),
    /// SQL TIME as milliseconds past midnight.
    Time(i32),
    /// SQL TIMESTAMP as milliseconds since the epoch, UTC assumed.
    Timestamp(i64),
    /// Ordered sequence of element values with a common component
    /// representation; elements may be NULL, arrays may nest.
    Array(Rep, Vec<DbValue>),
}

impl DbValue {
    /// Returns the representation tag of this value.
    pub fn rep(&self) -> Rep {
        match self {
            DbValue::Null => Rep::Null,
            DbValue::Boolean(_) => Rep::Boolean,
            DbValue::Byte(_) => Rep::Byte,
            DbValue::Short(_) => Rep::Short,
            DbValue::Int(_) => Rep::Int,
            DbValue::Long(_) => Rep::Long,
            DbValue::Float(_) => Rep::Float,
            DbValue::Double(_) => Rep::Double,
            DbValue::Decimal(_) => Rep::Decimal,
            DbValue::String(_) => Rep::String,
            DbValue::Bytes(_) => Rep::Bytes,
            DbValue::Date(_) => Rep::Date,
            DbValue::Time(_) => Rep::Time,
            DbValue::Timestamp(_) => Rep::Timestamp,
            DbValue::Array(..) => Rep::Array,
        }
    }

    /// Returns true if the value is a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(*self, DbValue::Null)
    }

    /// Builds a decimal value from a binary float.
    ///
    /// NaN and infinities have no decimal representation and are rejected.
    pub fn decimal_from_f64(f: f64) -> RelayResult<DbValue> {
        if !f.is_finite() {
            return Err(RelayError::UsageDetailed(format!(
                "{f} cannot be represented as a decimal"
            )));
        }
        BigDecimal::from_f64(f)
            .map(DbValue::Decimal)
            .ok_or(RelayError::Usage("float is not convertible to a decimal"))
    }

    /// Returns the value as a string slice.
    ///
    /// A byte sequence is decoded as UTF-8 on request; the same column may be
    /// read either as bytes or as its string rendering.
    pub fn try_as_str(&self) -> RelayResult<&str> {
        match self {
            DbValue::String(s) => Ok(s),
            DbValue::Bytes(b) => std::str::from_utf8(b).map_err(|e| {
                RelayError::UsageDetailed(format!("byte value is not valid UTF-8: {e}"))
            }),
            other => Err(RelayError::UsageDetailed(format!(
                "cannot read {:?} as string",
                other.rep()
            ))),
        }
    }

    /// Returns a DATE value as a calendar date.
    pub fn try_as_date(&self) -> RelayResult<time::Date> {
        if let DbValue::Date(days) = self {
            let odt =
                time::OffsetDateTime::from_unix_timestamp(i64::from(*days) * SECONDS_PER_DAY)
                    .map_err(|e| RelayError::UsageDetailed(format!("DATE out of range: {e}")))?;
            Ok(odt.date())
        } else {
            Err(RelayError::Usage("not a DATE value"))
        }
    }

    /// Returns a TIME value as a time of day.
    #[allow(clippy::cast_possible_truncation)]
    pub fn try_as_time(&self) -> RelayResult<time::Time> {
        if let DbValue::Time(millis) = self {
            if *millis < 0 {
                return Err(RelayError::Usage("TIME value is negative"));
            }
            let millis = u32::try_from(*millis).unwrap(/* checked above */);
            time::Time::from_hms_milli(
                (millis / 3_600_000) as u8,
                (millis / 60_000 % 60) as u8,
                (millis / 1_000 % 60) as u8,
                (millis % 1_000) as u16,
            )
            .map_err(|e| RelayError::UsageDetailed(format!("TIME out of range: {e}")))
        } else {
            Err(RelayError::Usage("not a TIME value"))
        }
    }

    /// Returns a TIMESTAMP value as a UTC datetime.
    pub fn try_as_timestamp(&self) -> RelayResult<time::OffsetDateTime> {
        if let DbValue::Timestamp(millis) = self {
            time::OffsetDateTime::from_unix_timestamp_nanos(i128::from(*millis) * 1_000_000)
                .map_err(|e| RelayError::UsageDetailed(format!("TIMESTAMP out of range: {e}")))
        } else {
            Err(RelayError::Usage("not a TIMESTAMP value"))
        }
    }

    pub(crate) fn emit(&self, w: &mut dyn std::io::Write) -> RelayResult<()> {
        w.write_u8(self.rep().type_code())?;
        match self {
            DbValue::Null => {}
            DbValue::Boolean(b) => wire::emit_bool(*b, w)?,
            DbValue::Byte(i) => w.write_i8(*i)?,
            DbValue::Short(i) => w.write_i16::<LittleEndian>(*i)?,
            DbValue::Int(i) => w.write_i32::<LittleEndian>(*i)?,
            DbValue::Long(i) => w.write_i64::<LittleEndian>(*i)?,
            DbValue::Float(f) => w.write_f32::<LittleEndian>(*f)?,
            DbValue::Double(f) => w.write_f64::<LittleEndian>(*f)?,
            DbValue::Decimal(bd) => {
                let (unscaled, scale) = decimal_parts(bd)?;
                wire::emit_str(&unscaled, w)?;
                wire::emit_i32(scale, w)?;
            }
            DbValue::String(s) => wire::emit_str(s, w)?,
            DbValue::Bytes(b) => wire::emit_bytes(b, w)?,
            DbValue::Date(days) => w.write_i32::<LittleEndian>(*days)?,
            DbValue::Time(millis) => w.write_i32::<LittleEndian>(*millis)?,
            DbValue::Timestamp(millis) => w.write_i64::<LittleEndian>(*millis)?,
            DbValue::Array(component, elements) => {
                w.write_u8(component.type_code())?;
                wire::emit_len(elements.len(), w)?;
                for element in elements {
                    check_component(*component, element)?;
                    element.emit(w)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn parse(rdr: &mut dyn std::io::Read) -> RelayResult<DbValue> {
        let rep = Rep::try_new(rdr.read_u8()?)?;
        Ok(match rep {
            Rep::Null => DbValue::Null,
            Rep::Boolean => DbValue::Boolean(wire::parse_bool(rdr)?),
            Rep::Byte => DbValue::Byte(rdr.read_i8()?),
            Rep::Short => DbValue::Short(rdr.read_i16::<LittleEndian>()?),
            Rep::Int => DbValue::Int(rdr.read_i32::<LittleEndian>()?),
            Rep::Long => DbValue::Long(rdr.read_i64::<LittleEndian>()?),
            Rep::Float => DbValue::Float(rdr.read_f32::<LittleEndian>()?),
            Rep::Double => DbValue::Double(rdr.read_f64::<LittleEndian>()?),
            Rep::Decimal => {
                let unscaled = wire::parse_str(rdr)?;
                let scale = wire::parse_i32(rdr)?;
                decimal_from_parts(&unscaled, scale)?
            }
            Rep::String => DbValue::String(wire::parse_str(rdr)?),
            Rep::Bytes => DbValue::Bytes(wire::parse_bytes(rdr)?),
            Rep::Date => DbValue::Date(rdr.read_i32::<LittleEndian>()?),
            Rep::Time => DbValue::Time(rdr.read_i32::<LittleEndian>()?),
            Rep::Timestamp => DbValue::Timestamp(rdr.read_i64::<LittleEndian>()?),
            Rep::Array => {
                let component = Rep::try_new(rdr.read_u8()?)?;
                let len = wire::parse_len(rdr)?;
                let mut elements = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    let element = DbValue::parse(rdr)?;
                    check_component(component, &element)?;
                    elements.push(element);
                }
                DbValue::Array(component, elements)
            }
        })
    }
}

impl std::fmt::Display for DbValue {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DbValue::Null => write!(fmt, "NULL"),
            DbValue::Boolean(b) => write!(fmt, "{b}"),
            DbValue::Byte(i) => write!(fmt, "{i}"),
            DbValue::Short(i) => write!(fmt, "{i}"),
            DbValue::Int(i) => write!(fmt, "{i}"),
            DbValue::Long(i) => write!(fmt, "{i}"),
            DbValue::Float(f) => write!(fmt, "{f}"),
            DbValue::Double(f) => write!(fmt, "{f}"),
            DbValue::Decimal(bd) => write!(fmt, "{bd}"),
            DbValue::String(s) => write!(fmt, "{s}"),
            DbValue::Bytes(b) => write!(fmt, "<{} bytes>", b.len()),
            DbValue::Date(days) => write!(fmt, "{days}"),
            DbValue::Time(millis) => write!(fmt, "{millis}"),
            DbValue::Timestamp(millis) => write!(fmt, "{millis}"),
            DbValue::Array(_, elements) => {
                write!(fmt, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, ", ")?;
                    }
                    write!(fmt, "{element}")?;
                }
                write!(fmt, "]")
            }
        }
    }
}

fn check_component(component: Rep, element: &DbValue) -> RelayResult<()> {
    let rep = element.rep();
    if rep == component || rep == Rep::Null {
        Ok(())
    } else {
        Err(RelayError::Protocol(format!(
            "array with component {component:?} contained an invalid tag: {rep:?}"
        )))
    }
}

// Splits into (unscaled decimal string, scale), normalizing negative scales
// away so the wire never carries them.
fn decimal_parts(bd: &BigDecimal) -> RelayResult<(String, i32)> {
    let (unscaled, scale) = if bd.as_bigint_and_exponent().1 < 0 {
        bd.with_scale(0).as_bigint_and_exponent()
    } else {
        bd.as_bigint_and_exponent()
    };
    let scale = i32::try_from(scale)
        .map_err(|_| RelayError::UsageDetailed(format!("decimal scale out of range: {scale}")))?;
    Ok((unscaled.to_str_radix(10), scale))
}

fn decimal_from_parts(unscaled: &str, scale: i32) -> RelayResult<DbValue> {
    if scale < 0 {
        return Err(RelayError::Protocol(format!(
            "decimal value with negative scale: {scale}"
        )));
    }
    let unscaled = unscaled.parse::<BigInt>().map_err(|e| {
        RelayError::Protocol(format!("decimal value with invalid unscaled part: {e}"))
    })?;
    Ok(DbValue::Decimal(BigDecimal::new(unscaled, i64::from(scale))))
}

// The JSON rendering: an object with the explicit `rep` discriminator.
// Decimals travel as (unscaled string, scale); 64-bit integers outside the
// double-safe range and non-finite floats fall back to strings.
#[derive(Serialize, Deserialize)]
struct JsonDbValue {
    rep: Rep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unscaled: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    component: Option<Rep>,
}

fn f64_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f).map_or_else(
        || serde_json::Value::String(f.to_string()),
        serde_json::Value::Number,
    )
}

fn json_to_f64(value: &serde_json::Value) -> Result<f64, String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("not a float: {n}")),
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| format!("not a float: {s}: {e}")),
        other => Err(format!("not a float: {other}")),
    }
}

fn json_to_i64(value: &serde_json::Value) -> Result<i64, String> {
    match value {
        serde_json::Value::Number(n) => {
            n.as_i64().ok_or_else(|| format!("not an integer: {n}"))
        }
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| format!("not an integer: {s}: {e}")),
        other => Err(format!("not an integer: {other}")),
    }
}

impl DbValue {
    fn to_json_repr(&self) -> Result<JsonDbValue, String> {
        let mut repr = JsonDbValue {
            rep: self.rep(),
            value: None,
            unscaled: None,
            scale: None,
            component: None,
        };
        match self {
            DbValue::Null => {}
            DbValue::Boolean(b) => repr.value = Some(serde_json::Value::Bool(*b)),
            DbValue::Byte(i) => repr.value = Some(serde_json::Value::from(*i)),
            DbValue::Short(i) => repr.value = Some(serde_json::Value::from(*i)),
            DbValue::Int(i) => repr.value = Some(serde_json::Value::from(*i)),
            DbValue::Long(i) | DbValue::Timestamp(i) => {
                repr.value = Some(if i.abs() > MAX_SAFE_JSON_INT {
                    serde_json::Value::String(i.to_string())
                } else {
                    serde_json::Value::from(*i)
                });
            }
            DbValue::Float(f) => repr.value = Some(f64_to_json(f64::from(*f))),
            DbValue::Double(f) => repr.value = Some(f64_to_json(*f)),
            DbValue::Decimal(bd) => {
                let (unscaled, scale) = decimal_parts(bd).map_err(|e| e.to_string())?;
                repr.unscaled = Some(unscaled);
                repr.scale = Some(scale);
            }
            DbValue::String(s) => repr.value = Some(serde_json::Value::String(s.clone())),
            DbValue::Bytes(b) => repr.value = Some(serde_json::Value::String(hex::encode(b))),
            DbValue::Date(i) | DbValue::Time(i) => repr.value = Some(serde_json::Value::from(*i)),
            DbValue::Array(component, elements) => {
                repr.component = Some(*component);
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    check_component(*component, element).map_err(|e| e.to_string())?;
                    values.push(serde_json::to_value(element).map_err(|e| e.to_string())?);
                }
                repr.value = Some(serde_json::Value::Array(values));
            }
        }
        Ok(repr)
    }

    fn from_json_repr(repr: &JsonDbValue) -> Result<DbValue, String> {
        let value = || {
            repr.value
                .as_ref()
                .ok_or_else(|| format!("{:?} value without payload", repr.rep))
        };
        Ok(match repr.rep {
            Rep::Null => DbValue::Null,
            Rep::Boolean => DbValue::Boolean(
                value()?
                    .as_bool()
                    .ok_or_else(|| "not a boolean".to_string())?,
            ),
            Rep::Byte => DbValue::Byte(
                i8::try_from(json_to_i64(value()?)?).map_err(|e| format!("not a byte: {e}"))?,
            ),
            Rep::Short => DbValue::Short(
                i16::try_from(json_to_i64(value()?)?).map_err(|e| format!("not a short: {e}"))?,
            ),
            Rep::Int => DbValue::Int(
                i32::try_from(json_to_i64(value()?)?).map_err(|e| format!("not an int: {e}"))?,
            ),
            Rep::Long => DbValue::Long(json_to_i64(value()?)?),
            #[allow(clippy::cast_possible_truncation)]
            Rep::Float => DbValue::Float(json_to_f64(value()?)? as f32),
            Rep::Double => DbValue::Double(json_to_f64(value()?)?),
            Rep::Decimal => {
                let unscaled = repr
                    .unscaled
                    .as_ref()
                    .ok_or_else(|| "decimal value without unscaled part".to_string())?;
                let scale = repr
                    .scale
                    .ok_or_else(|| "decimal value without scale".to_string())?;
                decimal_from_parts(unscaled, scale).map_err(|e| e.to_string())?
            }
            Rep::String => DbValue::String(
                value()?
                    .as_str()
                    .ok_or_else(|| "not a string".to_string())?
                    .to_string(),
            ),
            Rep::Bytes => DbValue::Bytes(
                hex::decode(value()?.as_str().ok_or_else(|| "not a string".to_string())?)
                    .map_err(|e| format!("not a hex-encoded byte sequence: {e}"))?,
            ),
            Rep::Date => DbValue::Date(
                i32::try_from(json_to_i64(value()?)?).map_err(|e| format!("not a date: {e}"))?,
            ),
            Rep::Time => DbValue::Time(
                i32::try_from(json_to_i64(value()?)?).map_err(|e| format!("not a time: {e}"))?,
            ),
            Rep::Timestamp => DbValue::Timestamp(json_to_i64(value()?)?),
            Rep::Array => {
                let component = repr
                    .component
                    .ok_or_else(|| "array value without component".to_string())?;
                let values = value()?
                    .as_array()
                    .ok_or_else(|| "not an array".to_string())?;
                let mut elements = Vec::with_capacity(values.len());
                for v in values {
                    let element: DbValue =
                        serde_json::from_value(v.clone()).map_err(|e| e.to_string())?;
                    check_component(component, &element).map_err(|e| e.to_string())?;
                    elements.push(element);
                }
                DbValue::Array(component, elements)
            }
        })
    }
}

impl Serialize for DbValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_repr()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DbValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = JsonDbValue::deserialize(deserializer)?;
        DbValue::from_json_repr(&repr).map_err(serde::de::Error::custom)
    }
}
