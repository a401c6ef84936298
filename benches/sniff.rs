use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use csv_ingest::config::NamingRules;
use csv_ingest::discovery::sniff;
use csv_ingest::source::{CsvOptions, CsvSource, MemorySource};
use tempfile::TempDir;

const ROWS: usize = 50_000;

fn order_row(i: usize) -> Vec<String> {
    let status = match i % 3 {
        0 => "shipped",
        1 => "pending",
        _ => "processing",
    };
    let day = (i % 28) + 1;
    let hour = i % 24;
    vec![
        i.to_string(),
        format!("2024-01-{day:02}"),
        format!("2024-01-{day:02} {hour:02}:30:00"),
        format!("{}.{:02}", i % 9_973, i % 100),
        status.to_string(),
    ]
}

const HEADERS: [&str; 5] = ["Order Id", "Ordered On", "Shipped At", "Amount", "Status"];

fn generate_orders(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("orders.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "{}", HEADERS.join(",")).expect("header");
    for i in 0..rows {
        writeln!(file, "{}", order_row(i).join(",")).expect("row");
    }
    (temp_dir, csv_path)
}

fn bench_sniff(c: &mut Criterion) {
    let (temp_dir, csv_path) = generate_orders(ROWS);
    let rules = NamingRules::default();
    let memory = MemorySource::new("orders", HEADERS, (0..ROWS).map(order_row).collect());

    let mut group = c.benchmark_group("sniff");

    group.bench_function("csv_file", |b| {
        b.iter_batched(
            || CsvSource::open(&csv_path, CsvOptions::default()).expect("open csv"),
            |source| {
                sniff(&source, "orders", "ops", &rules).expect("sniff csv");
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("in_memory", |b| {
        b.iter(|| sniff(&memory, "orders", "ops", &rules).expect("sniff memory"));
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_sniff);
criterion_main!(benches);
