use std::cmp::Ordering;

/// Comparison operators shared by the query and filter grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::Less => ordering == Ordering::Less,
            CompareOp::LessEqual => ordering != Ordering::Greater,
            CompareOp::Greater => ordering == Ordering::Greater,
            CompareOp::GreaterEqual => ordering != Ordering::Less,
        }
    }

    /// The operator with its operands swapped (`5 < x` is `x > 5`).
    pub fn flip(&self) -> Self {
        match self {
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessEqual => CompareOp::GreaterEqual,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterEqual => CompareOp::LessEqual,
            op => *op,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Column name, or one of the pseudo columns `_key` and `_id`
    Column(String),
    /// Untyped literal; it takes the type of the column it is compared with.
    Literal(String),
}

/// Column searched by a keyword, with its score weight
#[derive(Debug, Clone, PartialEq)]
pub struct MatchColumn {
    pub name: String,
    pub weight: i64,
}

impl MatchColumn {
    pub fn new(name: &str) -> Self {
        MatchColumn { name: name.to_string(), weight: 1 }
    }
}

/// Condition tree produced by `--query` and `--filter`
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    All,
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// Full-text containment; `None` searches the `--match_columns` list.
    Match {
        columns: Option<Vec<MatchColumn>>,
        key: String,
    },
    Prefix {
        column: String,
        value: String,
    },
    Suffix {
        column: String,
        value: String,
    },
    Truthy(Operand),
}

impl Expr {
    pub fn compare(column: &str, op: CompareOp, literal: &str) -> Self {
        Expr::Compare {
            left: Operand::Column(column.to_string()),
            op,
            right: Operand::Literal(literal.to_string()),
        }
    }

    pub fn contains(column: &str, key: &str) -> Self {
        Expr::Match {
            columns: Some(vec![MatchColumn::new(column)]),
            key: key.to_string(),
        }
    }

    pub fn keyword(key: &str) -> Self {
        Expr::Match { columns: None, key: key.to_string() }
    }
}

/// `--scorer` program: `_score = <expr>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scorer {
    Constant(f64),
    Adjust(ScoreOp, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOp {
    Add,
    Subtract,
    Multiply,
}

impl Scorer {
    pub fn apply(&self, score: i64) -> i64 {
        match self {
            Scorer::Constant(v) => *v as i64,
            Scorer::Adjust(ScoreOp::Add, v) => (score as f64 + v) as i64,
            Scorer::Adjust(ScoreOp::Subtract, v) => (score as f64 - v) as i64,
            Scorer::Adjust(ScoreOp::Multiply, v) => (score as f64 * v) as i64,
        }
    }
}
