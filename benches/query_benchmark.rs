use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use tempfile::TempDir;
use textsearch::am::{self, IndexScan};
use textsearch::codec::attribute::AttributeKind;
use textsearch::codec::value::Value;
use textsearch::core::config::Config;
use textsearch::core::connection::ConnectionManager;
use textsearch::core::interrupt::Interrupt;
use textsearch::core::types::{AttributeDef, IndexDescriptor, IndexIdentity, ItemPointer, RowKey, TableId};
use textsearch::query::compiler::compile;
use textsearch::query::types::{ScanKey, Strategy};
use textsearch::search::cursor::parse_select_response;
use textsearch::search::registry::UnitOfWork;

const WORDS: [&str; 8] = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];

fn random_text(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
        .collect::<Vec<_>>()
        .join(" ")
}

fn descriptor(identity: u32) -> IndexDescriptor {
    IndexDescriptor::new(IndexIdentity(identity), "bench_idx", TableId(1), format!("base/1/{}", identity))
        .add_attribute(AttributeDef::new("title", AttributeKind::Text))
        .add_attribute(AttributeDef::new("body", AttributeKind::Text))
}

/// Scan key compilation, escaping included
fn bench_compile(c: &mut Criterion) {
    let index = descriptor(1);
    let keys = vec![
        ScanKey::new(1, Strategy::Equal, Value::text("a title (with parens)")),
        ScanKey::new(2, Strategy::Contains, Value::text(r#"say "hi" to c:\tmp"#)),
    ];

    c.bench_function("compile_scan_keys", |b| {
        b.iter(|| compile(black_box(&index), black_box(&keys)).unwrap());
    });
}

/// Decoding of select responses of growing size
fn bench_parse_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_select_response");
    let command = "select --table t1 --sortby _key --output_columns _key,_score --limit -1 ";

    for rows in [10usize, 1_000, 100_000].iter() {
        let mut rng = rand::thread_rng();
        let body = (1..=*rows)
            .map(|n| format!("[{},{}]", n, rng.gen_range(1..100)))
            .collect::<Vec<_>>()
            .join(",");
        let response = format!(r#"[[[{}],[["_key","Int64"],["_score","Int32"]],{}]]"#, rows, body);

        group.bench_with_input(BenchmarkId::from_parameter(rows), &response, |b, response| {
            b.iter(|| parse_select_response(black_box(response), command).unwrap());
        });
    }
    group.finish();
}

/// Full text scans against a built index
fn bench_contains_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("contains_scan");
    group.sample_size(20);

    for rows in [100i64, 1_000].iter() {
        let dir = TempDir::new().unwrap();
        let conn = ConnectionManager::open_or_create(Config::with_data_dir(dir.path())).unwrap();
        let index = descriptor(*rows as u32);
        let heap = (1..=*rows).map(|n| {
            let ctid: ItemPointer = RowKey(n).decode();
            (ctid, vec![Some(Value::text(&format!("Document {}", n))), Some(Value::text(&random_text(50)))])
        });
        am::build(&conn, &index, heap.collect::<Vec<_>>(), &Interrupt::new()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(rows), &index, |b, index| {
            let mut uow = UnitOfWork::new();
            b.iter(|| {
                let keys = vec![ScanKey::new(2, Strategy::Contains, Value::text("quick fox"))];
                let mut scan = IndexScan::begin(&conn, index, keys);
                let rows = scan.get_all_matches(&mut uow).unwrap();
                scan.end_scan(&mut uow);
                black_box(rows)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_parse_response, bench_contains_scan);
criterion_main!(benches);
