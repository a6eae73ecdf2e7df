//! Throughput Benchmark for contactd
//!
//! Measures the per-request hot paths that do not depend on a live store:
//! query construction, body assembly, framed body reading and pool
//! checkout/checkin.

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use contactd::body::{read_body, RequestBodyAssembler, DEFAULT_MAX_BODY_BYTES};
use contactd::pool::{ConnectionPool, Connector, PoolConfig};
use contactd::query::{QueryBuilder, QuerySpec};
use contactd::store::{Dialect, StoreError};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Benchmark SELECT construction
fn bench_query_builder(c: &mut Criterion) {
    let builder = QueryBuilder::new(Dialect::Postgres);

    let mut group = c.benchmark_group("query_builder");
    group.throughput(Throughput::Elements(1));

    group.bench_function("select_empty", |b| {
        let spec = QuerySpec::new();
        b.iter(|| black_box(builder.select(black_box(&spec))));
    });

    group.bench_function("select_all_filters", |b| {
        let spec = QuerySpec::new()
            .external_id(101)
            .phone_number("555-0101")
            .limit(5)
            .offset(1);
        b.iter(|| black_box(builder.select(black_box(&spec))));
    });

    group.bench_function("from_params", |b| {
        let params = [
            ("external_id", "101"),
            ("phone_number", "555-0101"),
            ("limit", "5"),
            ("offset", "1"),
        ];
        b.iter(|| black_box(QuerySpec::from_params(black_box(params))));
    });

    group.finish();
}

/// Benchmark body assembly from many small pieces
fn bench_body(c: &mut Criterion) {
    let mut group = c.benchmark_group("body");

    for (name, size, piece) in [("1kb_in_64b", 1024, 64), ("64kb_in_1kb", 64 * 1024, 1024)] {
        let payload = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut body = RequestBodyAssembler::with_declared_len(size);
                for chunk in payload.chunks(piece) {
                    body.append(chunk).unwrap();
                }
                body.finish().unwrap();
                black_box(body.take().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark reading a framed request body under the size cap
fn bench_read_body(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("read_body");
    group.throughput(Throughput::Bytes(1024));

    group.bench_function("1kb_in_16_frames", |b| {
        b.iter(|| {
            let frames: Vec<Result<Bytes, std::io::Error>> = (0..16)
                .map(|_| Ok(Bytes::from_static(&[b'y'; 64])))
                .collect();
            let body = Body::from_stream(futures::stream::iter(frames));
            black_box(
                rt.block_on(read_body(body, None, DEFAULT_MAX_BODY_BYTES))
                    .unwrap(),
            );
        });
    });

    group.finish();
}

/// Connector producing plain counters, so only pool overhead is measured.
struct CountingConnector(AtomicUsize);

#[async_trait]
impl Connector for CountingConnector {
    type Connection = usize;

    async fn connect(&self) -> Result<usize, StoreError> {
        Ok(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Benchmark pool checkout/checkin
fn bench_pool(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    let pool = rt
        .block_on(ConnectionPool::new(
            CountingConnector(AtomicUsize::new(0)),
            PoolConfig::new(4).acquire_timeout(Some(Duration::from_secs(5))),
        ))
        .unwrap();

    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let conn = pool.acquire().await.unwrap();
                black_box(*conn);
                pool.release(conn);
            })
        });
    });

    group.measurement_time(Duration::from_secs(10));
    group.bench_function("16_tasks_4_slots", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut handles = Vec::with_capacity(16);
                for _ in 0..16 {
                    let pool = pool.clone();
                    handles.push(tokio::spawn(async move {
                        for _ in 0..10 {
                            let conn = pool.acquire().await.unwrap();
                            tokio::task::yield_now().await;
                            pool.release(conn);
                        }
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_query_builder,
    bench_body,
    bench_read_body,
    bench_pool,
);

criterion_main!(benches);
