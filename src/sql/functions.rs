use std::collections::HashSet;
use tracing::{info, warn};
use crate::analysis::normalizer::Normalizer;
use crate::codec::value::bpchar_trim;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{IndexIdentity, ItemPointer, TableId};
use crate::engine::EngineConnection;
use crate::engine::expr::Expr;
use crate::engine::query::parse_query;
use crate::query::compiler::escape_into;
use crate::search::registry::UnitOfWork;

/// Wraps a query string into the `--query` option of a scan key.
pub fn query_in(query: &str) -> String {
    let mut buf = String::from("--query \"");
    escape_into(&mut buf, query);
    buf.push('"');
    buf
}

/// Builds scan key options from the parts given; absent parts are skipped.
pub fn query(query: Option<&str>, match_columns: Option<&str>, scorer: Option<&str>, filter: Option<&str>) -> String {
    let parts = [
        ("query", query),
        ("match_columns", match_columns),
        ("scorer", scorer),
        ("filter", filter),
    ];

    let mut buf = String::new();
    for (name, value) in parts {
        let Some(value) = value else {
            continue;
        };
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str("--");
        buf.push_str(name);
        buf.push_str(" \"");
        escape_into(&mut buf, value);
        buf.push('"');
    }
    buf
}

/// Raw engine output of `command`, `None` when the engine printed nothing.
pub fn command(conn: &ConnectionManager, command: &str) -> Result<Option<String>> {
    conn.try_command(command)
}

/// Whether `doc` matches the query `key` with a positive score. Keywords
/// are searched in the normalized document.
pub fn contains(doc: &str, key: &str) -> Result<bool> {
    let expr = parse_query(key)?;
    Ok(matches!(scan_document(&expr, doc)?, Some(score) if score > 0))
}

/// [`contains`] for blank-padded strings; trailing blanks do not count.
pub fn contains_bpchar(doc: &str, key: &str) -> Result<bool> {
    contains(bpchar_trim(doc), bpchar_trim(key))
}

/// The match operator has no meaning outside an index scan.
pub fn match_(_doc: &str, _query: &str) -> Result<bool> {
    Err(Error::unsupported("operator @@ (doc, query) is available only in index scans"))
}

/// Score the open scans of `table` gave the row.
pub fn score(uow: &UnitOfWork, table: TableId, ctid: ItemPointer) -> i32 {
    uow.lookup_score(table, ctid)
}

/// Drops the backing tables of every index not in `live`. Returns the names
/// of the dropped tables.
pub fn purge(conn: &ConnectionManager, live: &HashSet<IndexIdentity>) -> Result<Vec<String>> {
    let scope = conn.begin_write()?;
    let dropped = conn.with_engine(|engine| {
        let mut orphans: Vec<String> = engine.table_names().into_iter()
            .filter(|name| {
                IndexIdentity::from_object_name(name).is_some_and(|id| !live.contains(&id))
            })
            .collect();
        // inverted tables read from key table columns, so they go first
        orphans.sort_by_key(|name| (!name.starts_with('i'), name.clone()));

        let mut dropped = Vec::with_capacity(orphans.len());
        for name in orphans {
            let Some(id) = engine.get(&name) else {
                continue;
            };
            match engine.remove(id) {
                Ok(()) => dropped.push(name),
                Err(e) => warn!(object = %name, error = %e, "failed to purge"),
            }
        }

        Ok(dropped)
    })?;
    scope.commit()?;

    if !dropped.is_empty() {
        info!(tables = ?dropped, "orphan tables purged");
    }
    Ok(dropped)
}

/// Score of a query over one document, `None` when it does not match.
fn scan_document(expr: &Expr, doc: &str) -> Result<Option<i64>> {
    let score = match expr {
        Expr::All => Some(0),
        Expr::And(exprs) => {
            let mut sum = 0;
            for expr in exprs {
                match scan_document(expr, doc)? {
                    Some(score) => sum += score,
                    None => return Ok(None),
                }
            }
            Some(sum)
        }
        Expr::Or(exprs) => {
            let mut best = None;
            for expr in exprs {
                if let Some(score) = scan_document(expr, doc)? {
                    best = Some(best.unwrap_or(0) + score);
                }
            }
            best
        }
        Expr::Not(inner) => match scan_document(inner, doc)? {
            Some(_) => None,
            None => Some(0),
        },
        Expr::Match { key, .. } => {
            let count = Normalizer.occurrences(doc, key);
            (count > 0).then_some(count as i64)
        }
        other => {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("column predicate {:?} cannot be applied to a single document", other),
            ))
        }
    };
    Ok(score)
}
