use std::collections::{BTreeSet, VecDeque};
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};
use crate::analysis::normalizer::Normalizer;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::Tokenizer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::engine::{Chunk, EngineConnection};
use crate::engine::catalog::{Catalog, ColumnSpec, IndexColumnSpec, ObjectDef, ObjectKind, TableSpec};
use crate::engine::command::{parse_command, split_batch};
use crate::engine::executor;
use crate::engine::store::{Database, ObjectData};
use crate::engine::types::{EngineType, EngineValue, ObjectId, RecordId, TableKey};
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{read_segment, remove_segment, write_segment};

/// In-process engine database. Objects live in memory and are written to
/// their segments on [`sync`](EngineConnection::sync).
pub struct LocalEngine {
    layout: StorageLayout,
    db: Database,
    dirty: BTreeSet<ObjectId>,
    catalog_dirty: bool,

    // Command outputs waiting for recv
    pending: VecDeque<Vec<u8>>,
    streaming: Option<(Vec<u8>, usize)>,
    chunk_size: usize,

    started_at: DateTime<Utc>,
    n_queries: u64,
    closed: bool,
}

impl LocalEngine {
    /// Opens the database at the configured path, creating it when absent.
    pub fn open(config: &Config) -> Result<Self> {
        let layout = StorageLayout::new(config)?;
        let db_path = layout.resolve(&layout.database_path);

        let (db, created) = if db_path.exists() {
            (Self::load(&layout)?, false)
        } else {
            (Database::new(), true)
        };

        let mut engine = LocalEngine {
            layout,
            db,
            dirty: BTreeSet::new(),
            catalog_dirty: created,
            pending: VecDeque::new(),
            streaming: None,
            chunk_size: config.response_chunk_size.max(1),
            started_at: Utc::now(),
            n_queries: 0,
            closed: false,
        };

        if created {
            engine.sync()?;
            info!(path = %db_path.display(), "engine database created");
        } else {
            info!(path = %db_path.display(), objects = engine.db.catalog.objects.len(), "engine database opened");
        }

        Ok(engine)
    }

    fn load(layout: &StorageLayout) -> Result<Database> {
        let catalog: Catalog = read_segment(&layout.resolve(&layout.database_path))?;
        Self::load_objects(layout, catalog)
    }

    fn load_objects(layout: &StorageLayout, mut catalog: Catalog) -> Result<Database> {
        catalog.reindex();

        let mut db = Database { catalog, objects: Default::default() };
        for def in db.catalog.objects.values() {
            let data = match &def.path {
                Some(path) => {
                    let full = layout.resolve(path);
                    if full.exists() {
                        read_segment(&full)?
                    } else {
                        warn!(object = %def.name, path = %full.display(), "segment missing, starting empty");
                        ObjectData::empty(&def.kind)
                    }
                }
                None => ObjectData::empty(&def.kind),
            };
            db.objects.insert(def.id, data);
        }

        Ok(db)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::new(ErrorKind::InvalidState, "engine connection is closed".to_string()));
        }
        Ok(())
    }

    fn execute(&mut self, line: &str) -> Result<Vec<u8>> {
        let command = parse_command(line)?;
        self.n_queries += 1;

        let output = match command.name.as_str() {
            "select" => executor::select(&self.db, &command)?,
            "table_list" => {
                command.check_options(&[])?;
                self.table_list()
            }
            "status" => {
                command.check_options(&[])?;
                self.status()
            }
            other => {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("unknown command: {}", other),
                ))
            }
        };

        Ok(serde_json::to_vec(&output)?)
    }

    fn table_list(&self) -> JsonValue {
        let mut rows = vec![json!([
            ["id", "UInt32"],
            ["name", "ShortText"],
            ["path", "ShortText"],
            ["flags", "ShortText"],
            ["domain", "ShortText"],
            ["default_tokenizer", "ShortText"],
        ])];

        for def in self.db.catalog.tables() {
            if let ObjectKind::Table { key_type, default_tokenizer, .. } = &def.kind {
                rows.push(json!([
                    def.id,
                    def.name,
                    def.path.as_ref().map(|p| p.display().to_string()),
                    def.flags(),
                    key_type.name(),
                    default_tokenizer.map(|t| t.name()),
                ]));
            }
        }

        JsonValue::Array(rows)
    }

    fn status(&self) -> JsonValue {
        let now = Utc::now();
        json!({
            "alloc_count": self.db.catalog.objects.len(),
            "starttime": self.started_at.timestamp(),
            "uptime": (now - self.started_at).num_seconds(),
            "version": env!("CARGO_PKG_VERSION"),
            "n_queries": self.n_queries,
        })
    }

    /// Owning table and value type of a scalar column.
    fn scalar_column(&self, column: ObjectId) -> Result<(ObjectId, EngineType)> {
        let def = self.db.catalog.get(column)?;
        match def.kind {
            ObjectKind::ScalarColumn { table, value_type } => Ok((table, value_type)),
            _ => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} is not a scalar column", def.name),
            )),
        }
    }

    fn table_def(&self, table: ObjectId) -> Result<(&ObjectDef, EngineType, bool)> {
        let def = self.db.catalog.get(table)?;
        match def.kind {
            ObjectKind::Table { key_type, normalize, .. } => Ok((def, key_type, normalize)),
            _ => Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} is not a table", def.name),
            )),
        }
    }

    /// Moves a column value change into every index built on the column.
    fn reindex_value(
        &mut self,
        column: ObjectId,
        record: RecordId,
        old: Option<&EngineValue>,
        new: Option<&EngineValue>,
    ) -> Result<()> {
        for (index_id, section) in self.db.catalog.indexes_on(column) {
            let lexicon = self.db.catalog.get(index_id)?.owner();
            let tokenizer = self.db.catalog.tokenizer_of(index_id).build();
            let tokens_of = |value: Option<&EngineValue>| -> Vec<Token> {
                value.and_then(EngineValue::as_text)
                    .map(|text| tokenizer.tokenize(text))
                    .unwrap_or_default()
            };
            let old_tokens = tokens_of(old);
            let new_tokens = tokens_of(new);

            let index = self.db.index_mut(index_id)?;
            index.remove_document(record, section, &old_tokens);
            if !new_tokens.is_empty() {
                index.add_document(record, section, &new_tokens);
            }

            let lexicon_table = self.db.table_mut(lexicon)?;
            for token in new_tokens {
                lexicon_table.add(TableKey::Text(token.text))?;
            }

            self.dirty.insert(index_id);
            self.dirty.insert(lexicon);
        }
        Ok(())
    }

    fn rebuild_index(&mut self, index_id: ObjectId) -> Result<()> {
        let def = self.db.catalog.get(index_id)?;
        let ObjectKind::IndexColumn { sources, .. } = &def.kind else {
            return Err(Error::new(ErrorKind::InvalidArgument, format!("{} is not an index column", def.name)));
        };
        let sources = sources.clone();
        let lexicon = def.owner();

        self.db.index_mut(index_id)?.postings.clear();

        for (pos, source) in sources.iter().enumerate() {
            let values: Vec<(RecordId, EngineValue)> = self.db.column(*source)?.values.iter()
                .map(|(record, value)| (*record, value.clone()))
                .collect();
            let section = pos as u32 + 1;
            for (record, value) in values {
                self.reindex_one(index_id, lexicon, record, section, &value)?;
            }
        }

        self.dirty.insert(index_id);
        self.dirty.insert(lexicon);
        debug!(index = index_id, sources = sources.len(), "index column rebuilt");
        Ok(())
    }

    fn reindex_one(&mut self, index_id: ObjectId, lexicon: ObjectId, record: RecordId, section: u32, value: &EngineValue) -> Result<()> {
        let Some(text) = value.as_text() else {
            return Ok(());
        };
        let tokens = self.db.catalog.tokenizer_of(index_id).build().tokenize(text);
        self.db.index_mut(index_id)?.add_document(record, section, &tokens);
        let lexicon_table = self.db.table_mut(lexicon)?;
        for token in tokens {
            lexicon_table.add(TableKey::Text(token.text))?;
        }
        Ok(())
    }

    /// Fails when an index column still reads from `column`.
    fn check_unreferenced(&self, column: ObjectId) -> Result<()> {
        if let Some((index_id, _)) = self.db.catalog.indexes_on(column).first() {
            let column_name = &self.db.catalog.get(column)?.name;
            let index_name = &self.db.catalog.get(*index_id)?.name;
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("{} is a source of {}", column_name, index_name),
            ));
        }
        Ok(())
    }

    fn drop_object(&mut self, id: ObjectId) -> Result<()> {
        let Some(def) = self.db.catalog.remove(id) else {
            return Ok(());
        };
        self.db.objects.remove(&id);
        self.dirty.remove(&id);
        self.catalog_dirty = true;

        if let Some(path) = &def.path {
            remove_segment(&self.layout.resolve(path))?;
        }
        debug!(object = %def.name, "object removed");
        Ok(())
    }

    fn create_object(&mut self, name: String, path: Option<std::path::PathBuf>, kind: ObjectKind) -> Result<ObjectId> {
        let data = ObjectData::empty(&kind);
        let id = self.db.catalog.insert(name, path, kind)?;
        self.db.objects.insert(id, data);
        self.dirty.insert(id);
        self.catalog_dirty = true;
        Ok(id)
    }
}

fn check_key(key_type: EngineType, key: &TableKey) -> Result<()> {
    match (key_type, key) {
        (EngineType::Int16 | EngineType::Int32 | EngineType::Int64, TableKey::Int(v)) => {
            key_type.check(&EngineValue::Int(*v))
        }
        (t, TableKey::Text(s)) if t.is_text() => {
            if s.len() > EngineType::SHORT_TEXT_MAX {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("key of {} bytes is too long", s.len()),
                ));
            }
            Ok(())
        }
        _ => Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("key {:?} does not match key type {}", key, key_type),
        )),
    }
}

impl EngineConnection for LocalEngine {
    fn send(&mut self, batch: &str) -> Result<()> {
        self.ensure_open()?;

        let mut outputs = Vec::new();
        for line in split_batch(batch) {
            debug!(command = line, "executing command");
            outputs.push(self.execute(line)?);
        }
        if outputs.is_empty() {
            return Err(Error::new(ErrorKind::Parse, "empty command".to_string()));
        }

        self.pending.extend(outputs);
        Ok(())
    }

    fn recv(&mut self) -> Result<Chunk> {
        self.ensure_open()?;

        if self.streaming.is_none() {
            self.streaming = self.pending.pop_front().map(|output| (output, 0));
        }

        let Some((output, offset)) = self.streaming.as_mut() else {
            return Ok(Chunk { data: Vec::new(), more: false, output_end: true });
        };

        let end = (*offset + self.chunk_size).min(output.len());
        let data = output[*offset..end].to_vec();
        *offset = end;

        let output_end = end == output.len();
        if output_end {
            self.streaming = None;
        }

        Ok(Chunk {
            data,
            more: !output_end || !self.pending.is_empty(),
            output_end,
        })
    }

    fn get(&self, name: &str) -> Option<ObjectId> {
        self.db.catalog.lookup(name)
    }

    fn object(&self, id: ObjectId) -> Result<ObjectDef> {
        self.db.catalog.get(id).cloned()
    }

    fn table_create(&mut self, spec: TableSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        if !matches!(spec.key_type, EngineType::Int16 | EngineType::Int32 | EngineType::Int64) && !spec.key_type.is_text() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("{} cannot be a key type", spec.key_type),
            ));
        }

        let kind = ObjectKind::Table {
            organization: spec.organization,
            key_type: spec.key_type,
            normalize: spec.normalize,
            default_tokenizer: spec.default_tokenizer,
        };
        let id = self.create_object(spec.name, spec.path, kind)?;
        debug!(table = id, "table created");
        Ok(id)
    }

    fn column_create(&mut self, spec: ColumnSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        let table_name = self.table_def(spec.table)?.0.name.clone();

        let kind = ObjectKind::ScalarColumn { table: spec.table, value_type: spec.value_type };
        self.create_object(Catalog::column_name(&table_name, &spec.name), spec.path, kind)
    }

    fn index_column_create(&mut self, spec: IndexColumnSpec) -> Result<ObjectId> {
        self.ensure_open()?;
        let (lexicon, key_type, _) = self.table_def(spec.lexicon)?;
        if !key_type.is_text() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("lexicon {} must have a text key", lexicon.name),
            ));
        }
        let lexicon_name = lexicon.name.clone();
        self.table_def(spec.source_table)?;

        let kind = ObjectKind::IndexColumn {
            lexicon: spec.lexicon,
            source_table: spec.source_table,
            sources: Vec::new(),
            with_position: spec.with_position,
            with_section: spec.with_section,
        };
        self.create_object(Catalog::column_name(&lexicon_name, &spec.name), spec.path, kind)
    }

    fn set_sources(&mut self, index_column: ObjectId, sources: &[ObjectId]) -> Result<()> {
        self.ensure_open()?;
        let ObjectKind::IndexColumn { source_table, .. } = self.db.catalog.get(index_column)?.kind else {
            return Err(Error::new(ErrorKind::InvalidArgument, "not an index column".to_string()));
        };

        for source in sources {
            let (table, value_type) = self.scalar_column(*source)?;
            if table != source_table || !value_type.is_text() {
                return Err(Error::new(
                    ErrorKind::InvalidArgument,
                    format!("column {} cannot feed index column {}", source, index_column),
                ));
            }
        }

        if let ObjectKind::IndexColumn { sources: current, .. } = &mut self.db.catalog.get_mut(index_column)?.kind {
            *current = sources.to_vec();
        }
        self.catalog_dirty = true;

        self.rebuild_index(index_column)
    }

    fn remove(&mut self, id: ObjectId) -> Result<()> {
        self.ensure_open()?;
        let def = self.db.catalog.get(id)?.clone();

        match def.kind {
            ObjectKind::Table { .. } => {
                let columns = self.db.catalog.columns_of(id);
                for column in &columns {
                    if matches!(self.db.catalog.get(*column)?.kind, ObjectKind::ScalarColumn { .. }) {
                        self.check_unreferenced(*column)?;
                    }
                }
                for column in columns {
                    self.drop_object(column)?;
                }
                self.drop_object(id)
            }
            ObjectKind::ScalarColumn { .. } => {
                self.check_unreferenced(id)?;
                self.drop_object(id)
            }
            ObjectKind::IndexColumn { .. } => self.drop_object(id),
        }
    }

    fn table_add(&mut self, table: ObjectId, key: TableKey) -> Result<(RecordId, bool)> {
        self.ensure_open()?;
        let (_, key_type, normalize) = self.table_def(table)?;
        check_key(key_type, &key)?;

        let key = match key {
            TableKey::Text(s) if normalize => TableKey::Text(Normalizer.normalize(&s)),
            key => key,
        };

        let added = self.db.table_mut(table)?.add(key)?;
        if added.1 {
            self.dirty.insert(table);
        }
        Ok(added)
    }

    fn table_delete(&mut self, table: ObjectId, key: &TableKey) -> Result<()> {
        self.ensure_open()?;
        self.table_def(table)?;

        let record = self.db.table_mut(table)?.delete(key).ok_or_else(|| Error::new(
            ErrorKind::NotFound,
            format!("key {:?} not found", key),
        ))?;
        self.dirty.insert(table);

        for column in self.db.catalog.columns_of(table) {
            if !matches!(self.db.catalog.get(column)?.kind, ObjectKind::ScalarColumn { .. }) {
                continue;
            }
            if let Some(old) = self.db.column_mut(column)?.values.remove(&record) {
                self.reindex_value(column, record, Some(&old), None)?;
                self.dirty.insert(column);
            }
        }
        Ok(())
    }

    fn set_value(&mut self, column: ObjectId, record: RecordId, value: EngineValue) -> Result<()> {
        self.ensure_open()?;
        let (table, value_type) = self.scalar_column(column)?;
        value_type.check(&value)?;

        if self.db.table(table)?.key(record).is_none() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("record {} does not exist", record),
            ));
        }

        let old = self.db.column_mut(column)?.values.insert(record, value.clone());
        self.reindex_value(column, record, old.as_ref(), Some(&value))?;
        self.dirty.insert(column);
        Ok(())
    }

    fn get_value(&self, column: ObjectId, record: RecordId) -> Result<Option<EngineValue>> {
        self.scalar_column(column)?;
        Ok(self.db.column(column)?.values.get(&record).cloned())
    }

    fn table_size(&self, table: ObjectId) -> Result<usize> {
        Ok(self.db.table(table)?.len())
    }

    fn table_keys(&self, table: ObjectId) -> Result<Vec<TableKey>> {
        Ok(self.db.table(table)?.records.values().cloned().collect())
    }

    fn table_names(&self) -> Vec<String> {
        self.db.catalog.tables().map(|def| def.name.clone()).collect()
    }

    fn sync(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.dirty.is_empty() && !self.catalog_dirty {
            return Ok(());
        }

        let dirty: Vec<ObjectId> = self.dirty.iter().copied().collect();
        for id in dirty {
            if let (Some(def), Some(data)) = (self.db.catalog.objects.get(&id), self.db.objects.get(&id)) {
                if let Some(path) = &def.path {
                    write_segment(&self.layout.resolve(path), data)?;
                }
            }
            self.dirty.remove(&id);
        }

        // the catalog goes last so a session that sees the new generation
        // also sees every segment written before it
        self.db.catalog.generation += 1;
        write_segment(&self.layout.resolve(&self.layout.database_path), &self.db.catalog)?;
        self.catalog_dirty = false;
        Ok(())
    }

    fn refresh(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let path = self.layout.resolve(&self.layout.database_path);
        if !path.exists() {
            return Ok(false);
        }

        let catalog: Catalog = read_segment(&path)?;
        if catalog.generation == self.db.catalog.generation {
            return Ok(false);
        }
        if !self.dirty.is_empty() || self.catalog_dirty {
            warn!(objects = self.dirty.len(), "discarding unsynced changes of a stale session");
        }

        let generation = catalog.generation;
        self.db = Self::load_objects(&self.layout, catalog)?;
        self.dirty.clear();
        self.catalog_dirty = false;
        debug!(generation, "engine database reloaded");
        Ok(true)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sync()?;
        self.pending.clear();
        self.streaming = None;
        self.closed = true;
        info!("engine database closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tokenizer::TokenizerKind;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: Config,
        engine: LocalEngine,
        table: ObjectId,
        title: ObjectId,
        year: ObjectId,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        let mut engine = LocalEngine::open(&config).unwrap();

        let table = engine.table_create(TableSpec::hash("t1", EngineType::Int64).persistent("base/1/1.grn")).unwrap();
        let title = engine.column_create(ColumnSpec::new(table, "title", EngineType::ShortText).persistent("base/1/1.grn.1")).unwrap();
        let year = engine.column_create(ColumnSpec::new(table, "year", EngineType::Int32).persistent("base/1/1.grn.2")).unwrap();

        let rows = [(1, "Hello world", 2001), (2, "hello hello", 2005), (3, "goodbye", 2010)];
        for (key, text, y) in rows {
            let (record, _) = engine.table_add(table, TableKey::Int(key)).unwrap();
            engine.set_value(title, record, EngineValue::Text(text.into())).unwrap();
            engine.set_value(year, record, EngineValue::Int(y)).unwrap();
        }

        Fixture { _dir: dir, config, engine, table, title, year }
    }

    fn add_index(f: &mut Fixture) -> ObjectId {
        let lexicon = f.engine.table_create(
            TableSpec::patricia("i1", EngineType::ShortText)
                .persistent("base/1/1.grn.i")
                .normalized()
                .with_tokenizer(TokenizerKind::Bigram),
        ).unwrap();
        let index = f.engine.index_column_create(
            IndexColumnSpec::new(lexicon, "ref", f.table).persistent("base/1/1.grn.r"),
        ).unwrap();
        f.engine.set_sources(index, &[f.title]).unwrap();
        lexicon
    }

    fn run(engine: &mut LocalEngine, command: &str) -> JsonValue {
        engine.send(command).unwrap();
        let mut out = Vec::new();
        loop {
            let chunk = engine.recv().unwrap();
            out.extend(chunk.data);
            if !chunk.more {
                break;
            }
        }
        serde_json::from_slice(&out).unwrap()
    }

    fn keys_and_scores(result: &JsonValue) -> Vec<(i64, i64)> {
        result[0].as_array().unwrap()[2..].iter()
            .map(|row| (row[0].as_i64().unwrap(), row[1].as_i64().unwrap()))
            .collect()
    }

    const SELECT: &str = "select --table t1 --sortby _key --output_columns _key,_score --limit -1";

    #[test]
    fn select_with_and_without_index_agree() {
        let mut f = fixture();
        let query = format!("{} --query \"title:@hello\"", SELECT);

        let scanned = run(&mut f.engine, &query);
        assert_eq!(scanned[0][0], json!([2]));
        assert_eq!(scanned[0][1], json!([["_key", "Int64"], ["_score", "Int32"]]));
        assert_eq!(keys_and_scores(&scanned), vec![(1, 1), (2, 2)]);

        add_index(&mut f);
        let indexed = run(&mut f.engine, &query);
        assert_eq!(keys_and_scores(&indexed), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn ranges_and_negation() {
        let mut f = fixture();
        let result = run(&mut f.engine, &format!("{} --query \"(year:>=2005)+(year:<2010)\"", SELECT));
        assert_eq!(keys_and_scores(&result), vec![(2, 2)]);

        let result = run(&mut f.engine, &format!("{} --query \"title:@hello -year:2005\"", SELECT));
        assert_eq!(keys_and_scores(&result), vec![(1, 1)]);

        let result = run(&mut f.engine, &format!("{} --filter \"year > 2001 && !(title @ \\\"bye\\\")\"", SELECT));
        assert_eq!(keys_and_scores(&result), vec![(2, 1)]);
    }

    #[test]
    fn default_output_and_limit() {
        let mut f = fixture();
        let result = run(&mut f.engine, "select --table t1 --sortby -year --limit 1");
        assert_eq!(result[0][0], json!([3]));
        assert_eq!(result[0][1], json!([["_id", "UInt32"], ["_key", "Int64"], ["title", "ShortText"], ["year", "Int32"]]));
        assert_eq!(result[0][2][1], json!(3));
        assert_eq!(result[0][2][2], json!("goodbye"));
    }

    #[test]
    fn keywords_use_match_columns_and_scorer() {
        let mut f = fixture();
        let result = run(
            &mut f.engine,
            &format!("{} --query hello --match_columns \"title * 3\" --scorer \"_score = _score + 1\"", SELECT),
        );
        assert_eq!(keys_and_scores(&result), vec![(1, 4), (2, 7)]);
    }

    #[test]
    fn batch_outputs_stream_in_chunks() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.response_chunk_size = 4;
        let mut engine = LocalEngine::open(&config).unwrap();

        engine.send("status\ntable_list").unwrap();
        let mut ends = 0;
        loop {
            let chunk = engine.recv().unwrap();
            assert!(chunk.data.len() <= 4);
            if chunk.output_end {
                ends += 1;
            }
            if !chunk.more {
                break;
            }
        }
        assert_eq!(ends, 2);

        let idle = engine.recv().unwrap();
        assert!(idle.data.is_empty() && !idle.more);
    }

    #[test]
    fn bad_commands_fail() {
        let mut f = fixture();
        assert_eq!(f.engine.send("drop_everything").unwrap_err().kind, ErrorKind::InvalidArgument);
        assert_eq!(f.engine.send("select --table nope").unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(f.engine.send("select --table t1 --query \"(\"").unwrap_err().kind, ErrorKind::Parse);
        assert!(f.engine.send("select --table t1 --query year:abc").is_err());
        assert!(f.engine.send("\n").is_err());
    }

    #[test]
    fn delete_removes_values_and_postings() {
        let mut f = fixture();
        add_index(&mut f);

        f.engine.table_delete(f.table, &TableKey::Int(2)).unwrap();
        assert_eq!(f.engine.table_delete(f.table, &TableKey::Int(2)).unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(f.engine.table_size(f.table).unwrap(), 2);

        let result = run(&mut f.engine, &format!("{} --query \"title:@hello\"", SELECT));
        assert_eq!(keys_and_scores(&result), vec![(1, 1)]);
    }

    #[test]
    fn indexed_sources_block_removal() {
        let mut f = fixture();
        let lexicon = add_index(&mut f);
        f.engine.sync().unwrap();
        assert!(f.config.data_dir.join("base/1/1.grn.1").exists());

        assert_eq!(f.engine.remove(f.table).unwrap_err().kind, ErrorKind::InvalidState);
        f.engine.remove(lexicon).unwrap();
        assert_eq!(f.engine.get("i1.ref"), None);
        f.engine.remove(f.table).unwrap();
        assert!(f.engine.table_names().is_empty());
        assert!(!f.config.data_dir.join("base/1/1.grn.1").exists());
    }

    #[test]
    fn values_persist_across_reopen() {
        let mut f = fixture();
        add_index(&mut f);
        f.engine.close().unwrap();
        assert_eq!(f.engine.send("status").unwrap_err().kind, ErrorKind::InvalidState);

        let mut reopened = LocalEngine::open(&f.config).unwrap();
        let table = reopened.get("t1").unwrap();
        assert_eq!(reopened.table_size(table).unwrap(), 3);
        let year = reopened.get("t1.year").unwrap();
        assert_eq!(year, f.year);
        assert_eq!(reopened.get_value(year, 1).unwrap(), Some(EngineValue::Int(2001)));

        let result = run(&mut reopened, &format!("{} --query \"title:@goodbye\"", SELECT));
        assert_eq!(keys_and_scores(&result), vec![(3, 1)]);
    }

    #[test]
    fn refresh_picks_up_changes_of_another_session() {
        let mut f = fixture();
        f.engine.sync().unwrap();
        let mut other = LocalEngine::open(&f.config).unwrap();
        assert!(!other.refresh().unwrap());

        let (record, _) = f.engine.table_add(f.table, TableKey::Int(4)).unwrap();
        f.engine.set_value(f.year, record, EngineValue::Int(2020)).unwrap();
        assert!(!other.refresh().unwrap());
        f.engine.sync().unwrap();

        assert!(other.refresh().unwrap());
        let table = other.get("t1").unwrap();
        assert_eq!(other.table_size(table).unwrap(), 4);
        assert_eq!(other.get_value(f.year, record).unwrap(), Some(EngineValue::Int(2020)));

        // nothing to write, so the generation stays
        other.sync().unwrap();
        assert!(!f.engine.refresh().unwrap());
    }

    #[test]
    fn type_checks_on_write() {
        let mut f = fixture();
        assert!(f.engine.set_value(f.year, 1, EngineValue::Text("x".into())).is_err());
        assert_eq!(f.engine.set_value(f.year, 99, EngineValue::Int(1)).unwrap_err().kind, ErrorKind::NotFound);
        assert!(f.engine.table_add(f.table, TableKey::Text("k".into())).is_err());
    }
}
