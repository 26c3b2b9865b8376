pub mod core;
pub mod storage;
pub mod analysis;
pub mod codec;
pub mod index;
pub mod engine;
pub mod schema;
pub mod writer;
pub mod query;
pub mod search;
pub mod am;
pub mod sql;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                        TEXTSEARCH STRUCT ARCHITECTURE                        │
└──────────────────────────────────────────────────────────────────────────────┘

 host index access method calls                       SQL functions
 (insert, scans, build, vacuum, cost)                 (query_in, query, command,
              │                                        contains, score, purge)
              ▼                                                │
┌─────────────────────────── am ───────────────────────────┐   │
│ IndexScan ── begin / get_next_tuple / rescan / end_scan   │   │
│ build / bulk_delete / vacuum_cleanup / cost_estimate      │   │
└──────┬──────────────┬───────────────┬────────────────────┘   │
       │              │               │                        │
       ▼              ▼               ▼                        ▼
 schema::mapper  writer::mutation  query::compiler ──▶ search::cursor
 SchemaMapper    MutationBridge    ScanKey → select      ResultCursor, ScanResult
 SchemaGuard     insert / delete   command               search::registry
       │              │               │                  UnitOfWork (scores)
       └──────────────┴───────┬───────┴────────────────────────┘
                              ▼
                 core::connection::ConnectionManager
                 one engine session per process, IndexLock per index
                              │  EngineConnection
                              ▼
┌────────────────────────── engine ────────────────────────────┐
│ LocalEngine: catalog + tables + columns + index columns       │
│ command channel: select / table_list / status, chunked output │
│ query, filter and scorer grammars (nom)                       │
└──────────────┬───────────────────────────────┬───────────────┘
               ▼                               ▼
   index::inverted (bigram postings)   storage::segment (bincode + lz4 + crc32)
   analysis (normalizer, tokenizer)    storage::layout  <base>.grn[.n|.i|.r]
*/
