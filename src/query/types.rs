use std::fmt;
use serde::{Serialize, Deserialize};
use crate::codec::value::Value;
use crate::core::error::{Error, Result};

/// Operator strategy numbers of the index's operator classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Less = 1,
    LessEqual = 2,
    Equal = 3,
    GreaterEqual = 4,
    Greater = 5,
    NotEqual = 6,
    Contains = 7,
    /// The argument is a prepared engine query, passed through as is.
    Query = 8,
}

impl Strategy {
    pub fn number(&self) -> u16 {
        *self as u16
    }

    /// Query-language operator between column name and value. The free
    /// query strategy has none.
    pub fn operator(&self) -> Option<&'static str> {
        let op = match self {
            Strategy::Less => ":<",
            Strategy::LessEqual => ":<=",
            Strategy::Equal => ":",
            Strategy::GreaterEqual => ":>=",
            Strategy::Greater => ":>",
            Strategy::NotEqual => ":!",
            Strategy::Contains => ":@",
            Strategy::Query => return None,
        };
        Some(op)
    }
}

impl TryFrom<u16> for Strategy {
    type Error = Error;

    fn try_from(number: u16) -> Result<Self> {
        let strategy = match number {
            1 => Strategy::Less,
            2 => Strategy::LessEqual,
            3 => Strategy::Equal,
            4 => Strategy::GreaterEqual,
            5 => Strategy::Greater,
            6 => Strategy::NotEqual,
            7 => Strategy::Contains,
            8 => Strategy::Query,
            other => return Err(Error::unsupported(format!("unexpected strategy number {}", other))),
        };
        Ok(strategy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self, self.number())
    }
}

/// One predicate the host pushes into a scan: `attribute <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanKey {
    /// 1-based attribute number within the index
    pub attno: i16,
    /// Raw strategy number; validated when the scan is compiled
    pub strategy: u16,
    /// `None` when the comparison value is null
    pub value: Option<Value>,
}

impl ScanKey {
    pub fn new(attno: i16, strategy: Strategy, value: Value) -> Self {
        ScanKey {
            attno,
            strategy: strategy.number(),
            value: Some(value),
        }
    }

    /// Free-form engine query, usually built by `query_in` or `query`.
    pub fn query(attno: i16, query: &str) -> Self {
        ScanKey::new(attno, Strategy::Query, Value::text(query))
    }

    pub fn null(attno: i16, strategy: Strategy) -> Self {
        ScanKey {
            attno,
            strategy: strategy.number(),
            value: None,
        }
    }

    pub fn is_query(&self) -> bool {
        self.strategy == Strategy::Query.number()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn strategy_numbers() {
        for number in 1..=8u16 {
            assert_eq!(Strategy::try_from(number).unwrap().number(), number);
        }
        assert_eq!(Strategy::try_from(9).unwrap_err().kind, ErrorKind::UnsupportedOperation);
        assert_eq!(Strategy::try_from(0).unwrap_err().kind, ErrorKind::UnsupportedOperation);
        assert_eq!(Strategy::Contains.operator(), Some(":@"));
        assert_eq!(Strategy::Query.operator(), None);
    }
}
