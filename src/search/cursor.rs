use std::sync::Arc;
use tracing::debug;
use crate::core::connection::ConnectionManager;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{ItemPointer, RowKey, TableId};

const HEADER: [&str; 4] = ["\"_key\"", "\"Int64\"", "\"_score\"", "\"Int32\""];

/// Direction the host asks a scan to move in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    NoMovement,
    Forward,
}

/// Rows one scan command matched, ascending by row key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub table: TableId,
    keys: Vec<RowKey>,
    scores: Vec<i32>,
}

impl ScanResult {
    pub fn new(table: TableId, mut rows: Vec<(RowKey, i32)>) -> Self {
        if !rows.is_sorted_by_key(|(key, _)| *key) {
            rows.sort_by_key(|(key, _)| *key);
        }
        let (keys, scores) = rows.into_iter().unzip();
        ScanResult { table, keys, scores }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, n: usize) -> Option<RowKey> {
        self.keys.get(n).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (RowKey, i32)> + '_ {
        self.keys.iter().copied().zip(self.scores.iter().copied())
    }

    /// Score of `ctid`, or 0 when the scan did not match it.
    pub fn score_of(&self, ctid: ItemPointer) -> i32 {
        match self.keys.binary_search(&RowKey::encode(ctid)) {
            Ok(pos) => self.scores[pos],
            Err(_) => 0,
        }
    }
}

/// Decodes a `select` response whose output columns are `_key,_score`.
///
/// The response is read as tokens separated by `[`, `]` and `,`: the hit
/// count, the four header tokens, then one key and one score per hit. Hits
/// with the sentinel key are skipped.
pub fn parse_select_response(response: &str, command: &str) -> Result<Vec<(RowKey, i32)>> {
    let mut tokens = response
        .split(['[', ']', ','])
        .filter(|token| !token.is_empty());

    let unexpected = |token: Option<&str>| {
        Error::new(
            ErrorKind::UnexpectedResult,
            format!("unexpected result: {}\nresponse: {}", token.unwrap_or("NULL"), response),
        ).with_query(command)
    };

    let count_token = tokens.next();
    let count: usize = count_token
        .and_then(|token| token.trim().parse().ok())
        .ok_or_else(|| unexpected(count_token))?;

    for expected in HEADER {
        let token = tokens.next();
        if token != Some(expected) {
            return Err(unexpected(token));
        }
    }

    let mut rows = Vec::with_capacity(count);
    for _ in 0..count {
        let key_token = tokens.next();
        let key: i64 = key_token
            .and_then(|token| token.trim().parse().ok())
            .ok_or_else(|| unexpected(key_token))?;
        let score_token = tokens.next();
        let score: i32 = score_token
            .and_then(|token| token.trim().parse().ok())
            .ok_or_else(|| unexpected(score_token))?;

        let key = RowKey(key);
        if key.is_sentinel() {
            // Rows deleted while the engine built the response come back
            // with an empty key
            continue;
        }
        rows.push((key, score));
    }

    Ok(rows)
}

/// Forward-only position over one scan's result.
#[derive(Debug)]
pub struct ResultCursor {
    result: Arc<ScanResult>,
    position: usize,
}

impl ResultCursor {
    /// Sends `command` and reads its rows.
    pub fn open(conn: &ConnectionManager, command: &str, table: TableId) -> Result<Self> {
        let response = conn.command(command)?;
        let rows = parse_select_response(&response, command)?;
        debug!(table = table.0, hits = rows.len(), "scan result loaded");
        Ok(ResultCursor::from_result(Arc::new(ScanResult::new(table, rows))))
    }

    pub fn from_result(result: Arc<ScanResult>) -> Self {
        ResultCursor { result, position: 0 }
    }

    pub fn result(&self) -> &Arc<ScanResult> {
        &self.result
    }

    /// Next matching row, or `None` once the result is exhausted.
    pub fn fetch_next(&mut self, direction: Direction) -> Result<Option<ItemPointer>> {
        if direction != Direction::Forward {
            return Err(Error::unsupported("only forward scans are supported"));
        }

        let Some(key) = self.result.key(self.position) else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(key.decode()))
    }

    /// Row returned by the previous `fetch_next`.
    pub fn last_returned(&self) -> Option<ItemPointer> {
        self.position
            .checked_sub(1)
            .and_then(|n| self.result.key(n))
            .map(RowKey::decode)
    }

    /// Every row not fetched yet; leaves the cursor exhausted.
    pub fn fetch_remaining(&mut self) -> Vec<ItemPointer> {
        let rows: Vec<ItemPointer> = (self.position..self.result.len())
            .filter_map(|n| self.result.key(n))
            .map(RowKey::decode)
            .collect();
        self.position = self.result.len();
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMAND: &str = "select --table t1";

    #[test]
    fn parses_keys_and_scores() {
        let response = r#"[[[2],[["_key","Int64"],["_score","Int32"]],[65537,3],[131074,1]]]"#;
        let rows = parse_select_response(response, COMMAND).unwrap();
        assert_eq!(rows, vec![(RowKey(65537), 3), (RowKey(131074), 1)]);
        assert_eq!(rows[0].0.decode(), ItemPointer::new(1, 1));
    }

    #[test]
    fn sentinel_rows_are_skipped() {
        let response = r#"[[[3],[["_key","Int64"],["_score","Int32"]],[0,9],[65537,3],[0,0]]]"#;
        let rows = parse_select_response(response, COMMAND).unwrap();
        assert_eq!(rows, vec![(RowKey(65537), 3)]);
    }

    #[test]
    fn header_mismatch_carries_response_and_command() {
        let response = r#"[[[1],[["_id","UInt32"],["_score","Int32"]],[1,1]]]"#;
        let err = parse_select_response(response, COMMAND).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedResult);
        assert!(err.context.contains("\"_id\""));
        assert!(err.context.contains(response));
        assert!(err.context.contains("query: select --table t1"));
    }

    #[test]
    fn truncated_or_garbled_responses_fail() {
        let truncated = r#"[[[2],[["_key","Int64"],["_score","Int32"]],[65537,3]]]"#;
        assert_eq!(parse_select_response(truncated, COMMAND).unwrap_err().kind, ErrorKind::UnexpectedResult);
        assert_eq!(parse_select_response("", COMMAND).unwrap_err().kind, ErrorKind::UnexpectedResult);
        assert_eq!(parse_select_response("[[[x]]]", COMMAND).unwrap_err().kind, ErrorKind::UnexpectedResult);
    }

    #[test]
    fn cursor_is_forward_only() {
        let result = Arc::new(ScanResult::new(TableId(1), vec![(RowKey(131074), 1), (RowKey(65537), 2)]));
        let mut cursor = ResultCursor::from_result(result);

        assert_eq!(cursor.fetch_next(Direction::Backward).unwrap_err().kind, ErrorKind::UnsupportedOperation);
        assert_eq!(cursor.last_returned(), None);
        assert_eq!(cursor.fetch_next(Direction::Forward).unwrap(), Some(ItemPointer::new(1, 1)));
        assert_eq!(cursor.last_returned(), Some(ItemPointer::new(1, 1)));
        assert_eq!(cursor.fetch_remaining(), vec![ItemPointer::new(2, 2)]);
        assert_eq!(cursor.fetch_next(Direction::Forward).unwrap(), None);
    }

    #[test]
    fn score_lookup_uses_sorted_keys() {
        let result = ScanResult::new(TableId(1), vec![(RowKey(5), 3), (RowKey(2), 8)]);
        assert_eq!(result.score_of(RowKey(5).decode()), 3);
        assert_eq!(result.score_of(RowKey(2).decode()), 8);
        assert_eq!(result.score_of(RowKey(4).decode()), 0);
    }
}
