use std::cmp::Ordering;
use std::fmt;
use chrono::{DateTime, NaiveDateTime};
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, ErrorKind, Result};

/// Builtin engine column and key types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float,
    Time,
    ShortText,
    Text,
    LongText,
}

impl EngineType {
    pub const SHORT_TEXT_MAX: usize = 4095;
    pub const TEXT_MAX: usize = 65535;

    pub fn name(&self) -> &'static str {
        match self {
            EngineType::Bool => "Bool",
            EngineType::Int16 => "Int16",
            EngineType::Int32 => "Int32",
            EngineType::Int64 => "Int64",
            EngineType::Float => "Float",
            EngineType::Time => "Time",
            EngineType::ShortText => "ShortText",
            EngineType::Text => "Text",
            EngineType::LongText => "LongText",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, EngineType::ShortText | EngineType::Text | EngineType::LongText)
    }

    /// Parses a query or filter literal into a value of this type.
    pub fn parse_literal(&self, literal: &str) -> Result<EngineValue> {
        let invalid = || Error::new(
            ErrorKind::InvalidArgument,
            format!("invalid {} literal: {}", self.name(), literal),
        );

        match self {
            EngineType::Bool => match literal {
                "true" | "1" => Ok(EngineValue::Bool(true)),
                "false" | "0" => Ok(EngineValue::Bool(false)),
                _ => Err(invalid()),
            },
            EngineType::Int16 | EngineType::Int32 | EngineType::Int64 => {
                let v: i64 = literal.trim().parse().map_err(|_| invalid())?;
                self.check_int(v)?;
                Ok(EngineValue::Int(v))
            }
            EngineType::Float => literal.trim().parse::<f64>()
                .map(EngineValue::Float)
                .map_err(|_| invalid()),
            EngineType::Time => parse_time(literal).map(EngineValue::Time).ok_or_else(invalid),
            EngineType::ShortText | EngineType::Text | EngineType::LongText => {
                Ok(EngineValue::Text(literal.to_string()))
            }
        }
    }

    /// Verifies that a value can be stored in a column of this type.
    pub fn check(&self, value: &EngineValue) -> Result<()> {
        let mismatch = || Error::new(
            ErrorKind::InvalidArgument,
            format!("cannot store {:?} in {} column", value, self.name()),
        );

        match (self, value) {
            (EngineType::Bool, EngineValue::Bool(_)) => Ok(()),
            (EngineType::Int16 | EngineType::Int32 | EngineType::Int64, EngineValue::Int(v)) => self.check_int(*v),
            (EngineType::Float, EngineValue::Float(_)) => Ok(()),
            (EngineType::Time, EngineValue::Time(_)) => Ok(()),
            (EngineType::ShortText, EngineValue::Text(s)) if s.len() > Self::SHORT_TEXT_MAX => Err(too_long(self, s)),
            (EngineType::Text, EngineValue::Text(s)) if s.len() > Self::TEXT_MAX => Err(too_long(self, s)),
            (EngineType::ShortText | EngineType::Text | EngineType::LongText, EngineValue::Text(_)) => Ok(()),
            _ => Err(mismatch()),
        }
    }

    fn check_int(&self, v: i64) -> Result<()> {
        let in_range = match self {
            EngineType::Int16 => i16::try_from(v).is_ok(),
            EngineType::Int32 => i32::try_from(v).is_ok(),
            _ => true,
        };
        if in_range {
            Ok(())
        } else {
            Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} out of range for {}", v, self.name()),
            ))
        }
    }
}

fn too_long(ty: &EngineType, s: &str) -> Error {
    Error::new(
        ErrorKind::InvalidArgument,
        format!("value of {} bytes is too long for {}", s.len(), ty.name()),
    )
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value as the engine stores it. Time is microseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Time(i64),
    Text(String),
}

impl EngineValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EngineValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Orders two values of compatible kinds; ints and floats compare numerically.
    pub fn compare(&self, other: &EngineValue) -> Option<Ordering> {
        match (self, other) {
            (EngineValue::Bool(a), EngineValue::Bool(b)) => Some(a.cmp(b)),
            (EngineValue::Int(a), EngineValue::Int(b)) => Some(a.cmp(b)),
            (EngineValue::Float(a), EngineValue::Float(b)) => a.partial_cmp(b),
            (EngineValue::Int(a), EngineValue::Float(b)) => (*a as f64).partial_cmp(b),
            (EngineValue::Float(a), EngineValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (EngineValue::Time(a), EngineValue::Time(b)) => Some(a.cmp(b)),
            (EngineValue::Text(a), EngineValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Formats microseconds since the epoch the way time literals are written.
pub fn format_time(micros: i64) -> String {
    match DateTime::from_timestamp_micros(micros) {
        Some(dt) => dt.naive_utc().format(TIME_FORMAT).to_string(),
        None => micros.to_string(),
    }
}

pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

/// Accepts epoch seconds (fractional allowed) or `YYYY/MM/DD HH:MM:SS[.ffffff]`.
pub fn parse_time(literal: &str) -> Option<i64> {
    let literal = literal.trim();
    if let Ok(secs) = literal.parse::<f64>() {
        return Some((secs * 1_000_000.0).round() as i64);
    }
    for format in [TIME_FORMAT, "%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(literal, format) {
            return Some(naive.and_utc().timestamp_micros());
        }
    }
    None
}

/// Catalog id of a table or column
pub type ObjectId = u32;

/// Record id inside one table; zero is the nil record.
pub type RecordId = u32;

pub const NIL_RECORD: RecordId = 0;

/// Table key organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyOrganization {
    Hash,
    PatriciaTrie,
}

/// A table key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableKey {
    Int(i64),
    Text(String),
}

impl TableKey {
    pub fn to_value(&self) -> EngineValue {
        match self {
            TableKey::Int(v) => EngineValue::Int(*v),
            TableKey::Text(s) => EngineValue::Text(s.clone()),
        }
    }

    /// Size in bytes of the key as stored.
    pub fn size(&self) -> usize {
        match self {
            TableKey::Int(_) => std::mem::size_of::<i64>(),
            TableKey::Text(s) => s.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(EngineType::Int32.parse_literal("42").unwrap(), EngineValue::Int(42));
        assert!(EngineType::Int16.parse_literal("70000").is_err());
        assert_eq!(EngineType::Bool.parse_literal("true").unwrap(), EngineValue::Bool(true));
        assert_eq!(EngineType::Time.parse_literal("1.5").unwrap(), EngineValue::Time(1_500_000));
        assert_eq!(
            EngineType::Time.parse_literal("1970/01/01 00:00:02.000000").unwrap(),
            EngineValue::Time(2_000_000)
        );
    }

    #[test]
    fn time_format_round_trip() {
        let micros = 1_234_567_890_123_456;
        assert_eq!(parse_time(&format_time(micros)), Some(micros));
    }

    #[test]
    fn short_text_limit() {
        let long = EngineValue::Text("x".repeat(EngineType::SHORT_TEXT_MAX + 1));
        assert!(EngineType::ShortText.check(&long).is_err());
        assert!(EngineType::LongText.check(&long).is_ok());
    }
}
