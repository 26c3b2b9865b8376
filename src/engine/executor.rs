use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use serde_json::{json, Value as JsonValue};
use crate::analysis::normalizer::Normalizer;
use crate::analysis::tokenizer::Tokenizer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::catalog::{Catalog, ObjectKind};
use crate::engine::command::Command;
use crate::engine::expr::{CompareOp, Expr, MatchColumn, Operand, Scorer};
use crate::engine::filter::{parse_filter, parse_match_columns, parse_scorer};
use crate::engine::query::parse_query;
use crate::engine::store::{ColumnData, Database, TableData};
use crate::engine::types::{EngineType, EngineValue, KeyOrganization, ObjectId, RecordId, TableKey};

pub const SELECT_OPTIONS: &[&str] = &[
    "table", "query", "match_columns", "filter", "scorer",
    "sortby", "output_columns", "limit", "offset",
];

const DEFAULT_LIMIT: i64 = 10;
const DEFAULT_OUTPUT_COLUMNS: &str = "_id,_key,*";

/// Runs a `select` and renders its result set:
/// `[[[hits],[[name,type],...],[v,...],...]]`.
pub fn select(db: &Database, command: &Command) -> Result<JsonValue> {
    command.check_options(SELECT_OPTIONS)?;

    let table_name = command.get("table").ok_or_else(|| Error::new(
        ErrorKind::InvalidArgument,
        "select: --table is required".to_string(),
    ))?;
    let table_id = db.catalog.lookup(table_name)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("table not found: {}", table_name)))?;
    let ObjectKind::Table { organization, key_type, .. } = db.catalog.get(table_id)?.kind else {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("not a table: {}", table_name),
        ));
    };

    let match_columns = command.get_unescaped("match_columns").map(|s| parse_match_columns(&s)).transpose()?;
    let planner = Planner {
        db,
        table_id,
        table_name,
        table: db.table(table_id)?,
        match_columns: match_columns.as_deref(),
    };

    let mut conditions = Vec::new();
    if let Some(query) = command.get("query") {
        conditions.push(planner.plan(&parse_query(query)?)?);
    }
    if let Some(filter) = command.get_unescaped("filter") {
        conditions.push(planner.plan(&parse_filter(&filter)?)?);
    }
    let condition = match conditions.len() {
        0 => Node::All,
        1 => conditions.remove(0),
        _ => Node::And(conditions),
    };
    let scorer = command.get_unescaped("scorer").map(|s| parse_scorer(&s)).transpose()?;

    let mut rows: Vec<Row> = planner.table.records.iter()
        .filter_map(|(&record, key)| condition.eval(record).map(|score| Row { record, key, score }))
        .collect();

    if let Some(scorer) = scorer {
        apply_scorer(&mut rows, &scorer);
    }

    if organization == KeyOrganization::PatriciaTrie {
        rows.sort_by(|a, b| a.key.cmp(b.key));
    }
    if let Some(sortby) = command.get("sortby") {
        let keys = planner.sort_keys(sortby)?;
        rows.sort_by(|a, b| compare_rows(&keys, a, b));
    }

    let total = rows.len();
    let offset = parse_int(command, "offset", 0)?;
    let limit = parse_int(command, "limit", DEFAULT_LIMIT)?;
    let (start, end) = window(total, offset, limit);

    let columns = planner.output_columns(command.get("output_columns").unwrap_or(DEFAULT_OUTPUT_COLUMNS))?;

    let mut result = vec![
        json!([total]),
        JsonValue::Array(columns.iter().map(|c| json!([c.name, c.type_name(key_type)])).collect()),
    ];
    for row in &rows[start..end] {
        result.push(JsonValue::Array(columns.iter().map(|c| c.render(row)).collect()));
    }

    Ok(JsonValue::Array(vec![JsonValue::Array(result)]))
}

fn apply_scorer(rows: &mut [Row], scorer: &Scorer) {
    for row in rows {
        row.score = scorer.apply(row.score);
    }
}

fn parse_int(command: &Command, option: &str, default: i64) -> Result<i64> {
    match command.get(option) {
        None => Ok(default),
        Some(text) => text.trim().parse().map_err(|_| Error::new(
            ErrorKind::InvalidArgument,
            format!("select: invalid --{}: {}", option, text),
        )),
    }
}

/// Resolves offset and limit against the hit count; negative offsets count
/// from the end, a negative limit takes everything after the offset.
fn window(total: usize, offset: i64, limit: i64) -> (usize, usize) {
    let total_i = total as i64;
    let start = if offset < 0 { (total_i + offset).max(0) } else { offset.min(total_i) };
    let end = if limit < 0 { total_i } else { (start + limit).min(total_i) };
    (start as usize, end.max(start) as usize)
}

struct Row<'a> {
    record: RecordId,
    key: &'a TableKey,
    score: i64,
}

/// Where a compared value comes from
enum Source<'a> {
    Column(&'a ColumnData),
    Key(&'a TableData),
    Id,
    Const(EngineValue),
}

impl<'a> Source<'a> {
    fn fetch(&self, record: RecordId) -> Option<Cow<'_, EngineValue>> {
        match self {
            Source::Column(column) => column.values.get(&record).map(Cow::Borrowed),
            Source::Key(table) => table.key(record).map(|k| Cow::Owned(k.to_value())),
            Source::Id => Some(Cow::Owned(EngineValue::Int(record as i64))),
            Source::Const(value) => Some(Cow::Borrowed(value)),
        }
    }
}

/// Condition tree with every name and literal resolved
enum Node<'a> {
    All,
    And(Vec<Node<'a>>),
    Or(Vec<Node<'a>>),
    Not(Box<Node<'a>>),
    Compare(Source<'a>, CompareOp, Source<'a>),
    Hits(BTreeMap<RecordId, i64>),
    Prefix(&'a ColumnData, String),
    Suffix(&'a ColumnData, String),
    Truthy(Source<'a>),
}

impl<'a> Node<'a> {
    /// Score of `record` when it matches.
    fn eval(&self, record: RecordId) -> Option<i64> {
        match self {
            Node::All => Some(0),
            Node::And(nodes) => nodes.iter().try_fold(0, |sum, n| n.eval(record).map(|s| sum + s)),
            Node::Or(nodes) => nodes.iter()
                .filter_map(|n| n.eval(record))
                .fold(None, |acc, s| Some(acc.unwrap_or(0) + s)),
            Node::Not(node) => match node.eval(record) {
                Some(_) => None,
                None => Some(0),
            },
            Node::Compare(left, op, right) => {
                let left = left.fetch(record)?;
                let right = right.fetch(record)?;
                let ordering = left.compare(&right)?;
                op.holds(ordering).then_some(1)
            }
            Node::Hits(hits) => hits.get(&record).copied(),
            Node::Prefix(column, prefix) => match column.values.get(&record) {
                Some(EngineValue::Text(s)) if s.starts_with(prefix.as_str()) => Some(1),
                _ => None,
            },
            Node::Suffix(column, suffix) => match column.values.get(&record) {
                Some(EngineValue::Text(s)) if s.ends_with(suffix.as_str()) => Some(1),
                _ => None,
            },
            Node::Truthy(source) => truthy(&*source.fetch(record)?).then_some(0),
        }
    }
}

fn truthy(value: &EngineValue) -> bool {
    match value {
        EngineValue::Bool(b) => *b,
        EngineValue::Int(v) | EngineValue::Time(v) => *v != 0,
        EngineValue::Float(v) => *v != 0.0,
        EngineValue::Text(s) => !s.is_empty(),
    }
}

struct Planner<'a> {
    db: &'a Database,
    table_id: ObjectId,
    table_name: &'a str,
    table: &'a TableData,
    match_columns: Option<&'a [MatchColumn]>,
}

/// Resolved scalar column
struct ColumnRef<'a> {
    id: ObjectId,
    value_type: EngineType,
    data: &'a ColumnData,
}

impl<'a> Planner<'a> {
    fn plan(&self, expr: &Expr) -> Result<Node<'a>> {
        let node = match expr {
            Expr::All => Node::All,
            Expr::And(exprs) => Node::And(exprs.iter().map(|e| self.plan(e)).collect::<Result<_>>()?),
            Expr::Or(exprs) => Node::Or(exprs.iter().map(|e| self.plan(e)).collect::<Result<_>>()?),
            Expr::Not(inner) => Node::Not(Box::new(self.plan(inner)?)),
            Expr::Compare { left, op, right } => self.plan_compare(left, *op, right)?,
            Expr::Match { columns, key } => {
                let columns = match (columns, self.match_columns) {
                    (Some(columns), _) => Cow::Borrowed(columns.as_slice()),
                    (None, Some(columns)) => Cow::Borrowed(columns),
                    (None, None) => Cow::Owned(self.text_columns()),
                };
                if columns.is_empty() {
                    return Err(Error::new(
                        ErrorKind::InvalidArgument,
                        format!("no column to match <{}> against in {}", key, self.table_name),
                    ));
                }
                Node::Hits(self.match_hits(&columns, key)?)
            }
            Expr::Prefix { column, value } => Node::Prefix(self.text_column(column)?.data, value.clone()),
            Expr::Suffix { column, value } => Node::Suffix(self.text_column(column)?.data, value.clone()),
            Expr::Truthy(Operand::Column(name)) => Node::Truthy(self.source(name)?.0),
            Expr::Truthy(Operand::Literal(literal)) => {
                Node::Truthy(Source::Const(guess_literal(literal)))
            }
        };
        Ok(node)
    }

    fn plan_compare(&self, left: &Operand, op: CompareOp, right: &Operand) -> Result<Node<'a>> {
        let node = match (left, right) {
            (Operand::Column(name), Operand::Literal(literal)) => {
                let (source, value_type) = self.source(name)?;
                Node::Compare(source, op, Source::Const(value_type.parse_literal(literal)?))
            }
            (Operand::Literal(_), Operand::Column(_)) => self.plan_compare(right, op.flip(), left)?,
            (Operand::Column(a), Operand::Column(b)) => {
                Node::Compare(self.source(a)?.0, op, self.source(b)?.0)
            }
            (Operand::Literal(a), Operand::Literal(b)) => {
                Node::Compare(Source::Const(guess_literal(a)), op, Source::Const(guess_literal(b)))
            }
        };
        Ok(node)
    }

    fn source(&self, name: &str) -> Result<(Source<'a>, EngineType)> {
        match name {
            "_key" => match self.db.catalog.get(self.table_id)?.kind {
                ObjectKind::Table { key_type, .. } => Ok((Source::Key(self.table), key_type)),
                _ => Err(Error::new(ErrorKind::Internal, "table without key".to_string())),
            },
            "_id" => Ok((Source::Id, EngineType::Int64)),
            _ => {
                let column = self.column(name)?;
                Ok((Source::Column(column.data), column.value_type))
            }
        }
    }

    fn column(&self, name: &str) -> Result<ColumnRef<'a>> {
        let full_name = Catalog::column_name(self.table_name, name);
        let id = self.db.catalog.lookup(&full_name)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("column not found: {}", full_name)))?;

        match self.db.catalog.get(id)?.kind {
            ObjectKind::ScalarColumn { value_type, .. } => Ok(ColumnRef {
                id,
                value_type,
                data: self.db.column(id)?,
            }),
            _ => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("not a scalar column: {}", full_name),
            )),
        }
    }

    fn text_column(&self, name: &str) -> Result<ColumnRef<'a>> {
        let column = self.column(name)?;
        if !column.value_type.is_text() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} is not a text column", name),
            ));
        }
        Ok(column)
    }

    fn text_columns(&self) -> Vec<MatchColumn> {
        self.db.catalog.columns_of(self.table_id).into_iter()
            .filter_map(|id| self.db.catalog.get(id).ok())
            .filter(|def| matches!(def.kind, ObjectKind::ScalarColumn { value_type, .. } if value_type.is_text()))
            .map(|def| MatchColumn::new(Catalog::short_name(&def.name)))
            .collect()
    }

    /// Occurrence counts of `key` summed over the weighted columns. Columns
    /// that feed an index column are searched through it; the others are
    /// scanned.
    fn match_hits(&self, columns: &[MatchColumn], key: &str) -> Result<BTreeMap<RecordId, i64>> {
        let normalizer = Normalizer;
        let mut hits = BTreeMap::new();

        for match_column in columns {
            let column = self.text_column(&match_column.name)?;

            let counts: BTreeMap<RecordId, u32> = match self.db.catalog.indexes_on(column.id).first() {
                Some(&(index_id, section)) => {
                    let tokens = self.db.catalog.tokenizer_of(index_id).build().tokenize(key);
                    self.db.index(index_id)?.search_phrase(&tokens, Some(std::slice::from_ref(&section)))
                }
                None => column.data.values.iter()
                    .filter_map(|(&record, value)| {
                        let count = normalizer.occurrences(value.as_text()?, key);
                        (count > 0).then_some((record, count))
                    })
                    .collect(),
            };

            for (record, count) in counts {
                *hits.entry(record).or_insert(0) += count as i64 * match_column.weight;
            }
        }

        Ok(hits)
    }

    fn sort_keys(&self, sortby: &str) -> Result<Vec<SortKey<'a>>> {
        split_list(sortby)
            .map(|item| {
                let (descending, name) = match item.strip_prefix('-') {
                    Some(name) => (true, name),
                    None => (false, item),
                };
                let field = match name {
                    "_key" => Field::Key,
                    "_score" => Field::Score,
                    "_id" => Field::Id,
                    _ => Field::Column(self.column(name)?.data),
                };
                Ok(SortKey { field, descending })
            })
            .collect()
    }

    fn output_columns(&self, spec: &str) -> Result<Vec<OutputColumn<'a>>> {
        let mut columns = Vec::new();
        for name in split_list(spec) {
            match name {
                "_id" => columns.push(OutputColumn::pseudo(name, Field::Id)),
                "_key" => columns.push(OutputColumn::pseudo(name, Field::Key)),
                "_score" => columns.push(OutputColumn::pseudo(name, Field::Score)),
                "*" => {
                    for id in self.db.catalog.columns_of(self.table_id) {
                        let def = self.db.catalog.get(id)?;
                        if let ObjectKind::ScalarColumn { value_type, .. } = def.kind {
                            columns.push(OutputColumn {
                                name: Catalog::short_name(&def.name).to_string(),
                                field: Field::Column(self.db.column(id)?),
                                value_type: Some(value_type),
                            });
                        }
                    }
                }
                _ => {
                    let column = self.column(name)?;
                    columns.push(OutputColumn {
                        name: name.to_string(),
                        field: Field::Column(column.data),
                        value_type: Some(column.value_type),
                    });
                }
            }
        }
        Ok(columns)
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Literal compared with another literal: number when it looks like one.
fn guess_literal(literal: &str) -> EngineValue {
    if let Ok(v) = literal.parse::<i64>() {
        EngineValue::Int(v)
    } else if let Ok(v) = literal.parse::<f64>() {
        EngineValue::Float(v)
    } else {
        match literal {
            "true" => EngineValue::Bool(true),
            "false" => EngineValue::Bool(false),
            _ => EngineValue::Text(literal.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
enum Field<'a> {
    Id,
    Key,
    Score,
    Column(&'a ColumnData),
}

struct SortKey<'a> {
    field: Field<'a>,
    descending: bool,
}

fn compare_rows(keys: &[SortKey], a: &Row, b: &Row) -> Ordering {
    for key in keys {
        let ordering = match key.field {
            Field::Id => a.record.cmp(&b.record),
            Field::Key => a.key.cmp(b.key),
            Field::Score => a.score.cmp(&b.score),
            Field::Column(column) => {
                match (column.values.get(&a.record), column.values.get(&b.record)) {
                    (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
        };
        let ordering = if key.descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

struct OutputColumn<'a> {
    name: String,
    field: Field<'a>,
    value_type: Option<EngineType>,
}

impl<'a> OutputColumn<'a> {
    fn pseudo(name: &str, field: Field<'a>) -> Self {
        OutputColumn { name: name.to_string(), field, value_type: None }
    }

    fn type_name(&self, key_type: EngineType) -> &'static str {
        match (self.field, self.value_type) {
            (Field::Id, _) => "UInt32",
            (Field::Key, _) => key_type.name(),
            (Field::Score, _) => "Int32",
            (Field::Column(_), Some(value_type)) => value_type.name(),
            (Field::Column(_), None) => "ShortText",
        }
    }

    fn render(&self, row: &Row) -> JsonValue {
        match self.field {
            Field::Id => json!(row.record),
            Field::Key => value_to_json(&row.key.to_value()),
            Field::Score => json!(row.score.clamp(i32::MIN as i64, i32::MAX as i64)),
            Field::Column(column) => match column.values.get(&row.record) {
                Some(value) => value_to_json(value),
                None => self.value_type.map_or(JsonValue::Null, default_json),
            },
        }
    }
}

fn value_to_json(value: &EngineValue) -> JsonValue {
    match value {
        EngineValue::Bool(b) => json!(b),
        EngineValue::Int(v) => json!(v),
        EngineValue::Float(v) => json!(v),
        EngineValue::Time(us) => json!(*us as f64 / 1_000_000.0),
        EngineValue::Text(s) => json!(s),
    }
}

/// What an unset column reads as
fn default_json(value_type: EngineType) -> JsonValue {
    match value_type {
        EngineType::Bool => json!(false),
        EngineType::Int16 | EngineType::Int32 | EngineType::Int64 => json!(0),
        EngineType::Float | EngineType::Time => json!(0.0),
        EngineType::ShortText | EngineType::Text | EngineType::LongText => json!(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds() {
        assert_eq!(window(5, 0, -1), (0, 5));
        assert_eq!(window(5, 1, 2), (1, 3));
        assert_eq!(window(5, -2, 10), (3, 5));
        assert_eq!(window(5, 9, 3), (5, 5));
        assert_eq!(window(0, 0, 10), (0, 0));
    }

    #[test]
    fn literal_guessing() {
        assert_eq!(guess_literal("12"), EngineValue::Int(12));
        assert_eq!(guess_literal("1.5"), EngineValue::Float(1.5));
        assert_eq!(guess_literal("true"), EngineValue::Bool(true));
        assert_eq!(guess_literal("x"), EngineValue::Text("x".into()));
    }
}
