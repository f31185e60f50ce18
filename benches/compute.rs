use chrono::{DateTime, Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use seriesviz::{calculate_colors, compute_query_results, get_splits, QueryResult};

fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2021-03-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn group_row(host: usize, interval: usize) -> Value {
    let count = (host * 7 + interval * 3) % 500;
    let avg = 20.0 + (interval as f64 / 10.0).sin().abs() * 200.0 + host as f64;
    let histogram: Vec<Value> = (0..20)
        .map(|b| json!({"from": b * 25, "to": (b + 1) * 25, "count": (b * host + interval) % 40}))
        .collect();
    let topk: Vec<Value> = (0..10)
        .map(|k| json!({"key": format!("/path/{}", k), "count": 100 + (k * host) % 50, "error": k % 3}))
        .collect();

    json!({
        "group": {"host": format!("web-{:02}", host)},
        "aggregations": [
            {"op": "count", "value": count},
            {"op": "avg", "value": avg},
            {"op": "percentiles", "value": [avg * 0.8, avg * 1.5, avg * 2.2]},
            {"op": "histogram", "value": histogram},
            {"op": "topk", "value": topk}
        ]
    })
}

fn synthetic_result(groups: usize, intervals: usize) -> QueryResult {
    let start = base_time();
    let series: Vec<Value> = (0..intervals)
        .map(|i| {
            let interval_start = start + Duration::minutes(i as i64);
            json!({
                "startTime": interval_start.to_rfc3339(),
                "endTime": (interval_start + Duration::minutes(1)).to_rfc3339(),
                "groups": (0..groups).map(|host| group_row(host, i)).collect::<Vec<_>>()
            })
        })
        .collect();
    let totals: Vec<Value> = (0..groups).map(|host| group_row(host, 0)).collect();

    QueryResult::from_value(json!({
        "query": {
            "aggregations": [
                {"op": "count", "field": ""},
                {"op": "avg", "field": "duration"},
                {"op": "percentiles", "field": "duration", "argument": [50, 95, 99]},
                {"op": "histogram", "field": "duration", "argument": 20},
                {"op": "topk", "field": "path", "argument": 10}
            ],
            "groupBy": ["host"],
            "resolution": "1m",
            "startTime": start.to_rfc3339(),
            "endTime": (start + Duration::minutes(intervals as i64)).to_rfc3339()
        },
        "buckets": {"series": series, "totals": totals},
        "fieldsMeta": [{"name": "duration", "type": "float", "unit": "ms"}]
    }))
    .unwrap()
}

fn benchmark_compute_results(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_query_results");

    for groups in [1, 10, 25] {
        let results = vec![synthetic_result(groups, 120)];
        group.bench_with_input(BenchmarkId::new("groups", groups), &results, |b, results| {
            b.iter(|| black_box(compute_query_results(results, base_time(), "bench", None, None)));
        });
    }

    group.finish();
}

fn benchmark_compute_against(c: &mut Criterion) {
    let results = vec![synthetic_result(10, 120), synthetic_result(10, 120)];

    c.bench_function("compute_against_10_groups", |b| {
        b.iter(|| black_box(compute_query_results(&results, base_time(), "bench", None, Some(42))));
    });
}

fn benchmark_colors(c: &mut Criterion) {
    let keys: Vec<String> = (0..50).map(|i| format!("service-{}", i)).collect();

    c.bench_function("calculate_colors_50_keys", |b| {
        b.iter(|| black_box(calculate_colors(&keys, None)));
    });
}

fn benchmark_splits(c: &mut Criterion) {
    c.bench_function("get_splits", |b| {
        b.iter(|| black_box(get_splits(black_box(-1234.5), black_box(98765.4), 600.0, 30.0)));
    });
}

criterion_group!(
    benches,
    benchmark_compute_results,
    benchmark_compute_against,
    benchmark_colors,
    benchmark_splits
);
criterion_main!(benches);
