use chrono::DateTime;
use serde::{Serialize, Deserialize};
use crate::codec::value::{bpchar_trim, Value};
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::types::{EngineType, EngineValue, TIME_FORMAT};

/// Header bytes the host adds to a declared character length modifier
const VARHDRSZ: i32 = 4;
/// Worst-case bytes per character in the server encoding
const MAX_CHAR_BYTES: usize = 4;

/// Scalar kinds an index attribute may have. Each kind knows its engine
/// storage type, how to encode a datum for storage and how to spell it in a
/// query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    Text,
    BpChar,
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Timestamp,
    TimestampTz,
}

impl AttributeKind {
    /// Resolves a host type name (`text`, `varchar`, `int4`, ...).
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "text" | "varchar" | "character varying" => AttributeKind::Text,
            "bpchar" | "char" | "character" => AttributeKind::BpChar,
            "bool" | "boolean" => AttributeKind::Bool,
            "int2" | "smallint" => AttributeKind::Int2,
            "int4" | "integer" | "int" => AttributeKind::Int4,
            "int8" | "bigint" => AttributeKind::Int8,
            "float4" | "real" => AttributeKind::Float4,
            "float8" | "double precision" => AttributeKind::Float8,
            "timestamp" => AttributeKind::Timestamp,
            "timestamptz" => AttributeKind::TimestampTz,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the default operator class carries a containment operator.
    pub fn supports_contains(&self) -> bool {
        matches!(self, AttributeKind::Text | AttributeKind::BpChar)
    }

    /// Engine storage type; text kinds pick the narrowest type that fits the
    /// declared length.
    pub fn engine_type(&self, type_modifier: i32) -> EngineType {
        match self {
            AttributeKind::Text | AttributeKind::BpChar => {
                if type_modifier > VARHDRSZ {
                    let max_bytes = (type_modifier - VARHDRSZ) as usize * MAX_CHAR_BYTES;
                    if max_bytes <= EngineType::SHORT_TEXT_MAX {
                        return EngineType::ShortText;
                    }
                    if max_bytes <= EngineType::TEXT_MAX {
                        return EngineType::Text;
                    }
                }
                EngineType::LongText
            }
            AttributeKind::Bool => EngineType::Bool,
            AttributeKind::Int2 => EngineType::Int16,
            AttributeKind::Int4 => EngineType::Int32,
            AttributeKind::Int8 => EngineType::Int64,
            AttributeKind::Float4 | AttributeKind::Float8 => EngineType::Float,
            AttributeKind::Timestamp | AttributeKind::TimestampTz => EngineType::Time,
        }
    }

    /// Converts a datum into the value written to the backing column.
    pub fn encode(&self, value: &Value) -> Result<EngineValue> {
        let encoded = match (self, value) {
            (AttributeKind::Text, Value::Text(s)) => EngineValue::Text(s.clone()),
            (AttributeKind::BpChar, Value::BpChar(s) | Value::Text(s)) => EngineValue::Text(bpchar_trim(s).to_string()),
            (AttributeKind::Bool, Value::Bool(v)) => EngineValue::Bool(*v),
            (AttributeKind::Int2, Value::Int2(v)) => EngineValue::Int(*v as i64),
            (AttributeKind::Int4, Value::Int4(v)) => EngineValue::Int(*v as i64),
            (AttributeKind::Int8, Value::Int8(v)) => EngineValue::Int(*v),
            (AttributeKind::Float4, Value::Float4(v)) => EngineValue::Float(*v as f64),
            (AttributeKind::Float8, Value::Float8(v)) => EngineValue::Float(*v),
            (AttributeKind::Timestamp, Value::Timestamp(ts)) => EngineValue::Time(ts.and_utc().timestamp_micros()),
            (AttributeKind::TimestampTz, Value::TimestampTz(ts)) => EngineValue::Time(ts.timestamp_micros()),
            _ => return Err(self.mismatch(value)),
        };
        Ok(encoded)
    }

    /// Converts a stored engine value back into a datum.
    pub fn decode(&self, value: &EngineValue) -> Result<Value> {
        let decoded = match (self, value) {
            (AttributeKind::Text, EngineValue::Text(s)) => Value::Text(s.clone()),
            (AttributeKind::BpChar, EngineValue::Text(s)) => Value::BpChar(s.clone()),
            (AttributeKind::Bool, EngineValue::Bool(v)) => Value::Bool(*v),
            (AttributeKind::Int2, EngineValue::Int(v)) => Value::Int2(i16::try_from(*v).map_err(|_| self.out_of_range(*v))?),
            (AttributeKind::Int4, EngineValue::Int(v)) => Value::Int4(i32::try_from(*v).map_err(|_| self.out_of_range(*v))?),
            (AttributeKind::Int8, EngineValue::Int(v)) => Value::Int8(*v),
            (AttributeKind::Float4, EngineValue::Float(v)) => Value::Float4(*v as f32),
            (AttributeKind::Float8, EngineValue::Float(v)) => Value::Float8(*v),
            (AttributeKind::Timestamp, EngineValue::Time(us)) => Value::Timestamp(from_micros(*us)?.naive_utc()),
            (AttributeKind::TimestampTz, EngineValue::Time(us)) => Value::TimestampTz(from_micros(*us)?),
            _ => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("cannot decode {:?} as {:?}", value, self),
                ))
            }
        };
        Ok(decoded)
    }

    /// Spells a datum as a query literal, before escaping.
    pub fn query_literal(&self, value: &Value) -> Result<String> {
        let literal = match (self, value) {
            (AttributeKind::Text, Value::Text(s)) => s.clone(),
            (AttributeKind::BpChar, Value::BpChar(s) | Value::Text(s)) => bpchar_trim(s).to_string(),
            (AttributeKind::Bool, Value::Bool(v)) => v.to_string(),
            (AttributeKind::Int2, Value::Int2(v)) => v.to_string(),
            (AttributeKind::Int4, Value::Int4(v)) => v.to_string(),
            (AttributeKind::Int8, Value::Int8(v)) => v.to_string(),
            (AttributeKind::Float4, Value::Float4(v)) => v.to_string(),
            (AttributeKind::Float8, Value::Float8(v)) => v.to_string(),
            (AttributeKind::Timestamp, Value::Timestamp(ts)) => ts.format(TIME_FORMAT).to_string(),
            (AttributeKind::TimestampTz, Value::TimestampTz(ts)) => ts.naive_utc().format(TIME_FORMAT).to_string(),
            _ => return Err(self.mismatch(value)),
        };
        Ok(literal)
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::new(
            ErrorKind::InvalidArgument,
            format!("datum {:?} does not belong to attribute kind {:?}", value, self),
        )
    }

    fn out_of_range(&self, v: i64) -> Error {
        Error::new(ErrorKind::InvalidArgument, format!("{} out of range for {:?}", v, self))
    }
}

fn from_micros(us: i64) -> Result<DateTime<chrono::Utc>> {
    DateTime::from_timestamp_micros(us)
        .ok_or_else(|| Error::new(ErrorKind::InvalidArgument, format!("timestamp out of range: {}", us)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn text_storage_types_follow_declared_length() {
        assert_eq!(AttributeKind::Text.engine_type(-1), EngineType::LongText);
        assert_eq!(AttributeKind::Text.engine_type(100 + VARHDRSZ), EngineType::ShortText);
        assert_eq!(AttributeKind::BpChar.engine_type(2000 + VARHDRSZ), EngineType::Text);
        assert_eq!(AttributeKind::Int2.engine_type(-1), EngineType::Int16);
        assert_eq!(AttributeKind::TimestampTz.engine_type(-1), EngineType::Time);
    }

    #[test]
    fn bpchar_drops_trailing_blanks() {
        let value = Value::BpChar("abc   ".to_string());
        assert_eq!(AttributeKind::BpChar.encode(&value).unwrap(), EngineValue::Text("abc".to_string()));
        assert_eq!(AttributeKind::BpChar.query_literal(&value).unwrap(), "abc");
    }

    #[test]
    fn timestamp_literal_parses_back() {
        let ts = NaiveDate::from_ymd_opt(2010, 3, 4).unwrap().and_hms_opt(5, 6, 7).unwrap();
        let value = Value::Timestamp(ts);
        let literal = AttributeKind::Timestamp.query_literal(&value).unwrap();
        assert_eq!(literal, "2010/03/04 05:06:07.000000");
        let stored = AttributeKind::Timestamp.encode(&value).unwrap();
        assert_eq!(EngineType::Time.parse_literal(&literal).unwrap(), stored);
        assert_eq!(AttributeKind::Timestamp.decode(&stored).unwrap(), value);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        assert!(AttributeKind::Int4.encode(&Value::text("1")).is_err());
        assert!(AttributeKind::Int2.decode(&EngineValue::Int(1 << 20)).is_err());
    }
}
