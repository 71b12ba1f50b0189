use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use results_search::config::SqlConfig;
use results_search::memory::{MemoryStore, RunResults};
use results_search::sql_compiler::SqlBinder;
use results_search::{Binder, Plan, QueryParser, TestRun, TestStatus};
use std::hint::black_box;

const CASES: [(&str, &str); 3] = [
    ("simple", r#"{"run_ids":[1],"query":{"pattern":"/dom/"}}"#),
    (
        "flaky",
        r#"{"run_ids":[1,2],"query":{"and":[{"browser_name":"chrome","status":"PASS"},{"browser_name":"chrome","status":"FAIL"}]}}"#,
    ),
    (
        "complex",
        r#"{"run_ids":[1,2,3,4],"query":[{"not":{"or":[{"browser_name":"firefox","status":"PASS"},{"browser_name":"safari","status":{"not":"OK"}}]}},{"and":[{"pattern":"css"},{"browser_name":"chrome","status":"TIMEOUT"}]}]}"#,
    ),
];

fn runs() -> Vec<TestRun> {
    let start = Utc.with_ymd_and_hms(2018, 6, 1, 0, 0, 0).unwrap();
    vec![
        TestRun::new(1, "chrome", start),
        TestRun::new(2, "chrome", start),
        TestRun::new(3, "firefox", start),
        TestRun::new(4, "safari", start),
    ]
}

// 每个运行 5000 个测试
fn create_store() -> MemoryStore {
    let store = MemoryStore::new(1000);
    for run in runs() {
        let results: RunResults = (0..5000)
            .map(|i| {
                let dir = if i % 3 == 0 { "css" } else { "dom" };
                let status = TestStatus::ALL[(i + run.id as usize) % TestStatus::ALL.len()];
                (format!("/{}/test-{}.html", dir, i), status)
            })
            .collect();
        store.load_run(run.id, results).unwrap();
    }
    store
}

// 基准测试：解析性能
fn benchmark_parser(c: &mut Criterion) {
    let parser = QueryParser::default();
    let mut group = c.benchmark_group("parser_performance");
    for (name, payload) in CASES {
        group.bench_with_input(BenchmarkId::new("parse", name), &payload, |b, &payload| {
            b.iter(|| black_box(parser.parse_str(black_box(payload)).expect("解析应该成功")))
        });
    }
    group.finish();
}

// 基准测试：绑定性能
fn benchmark_bind(c: &mut Criterion) {
    let parser = QueryParser::default();
    let runs = runs();
    let mut group = c.benchmark_group("bind_performance");
    for (name, payload) in CASES {
        let query = parser.parse_str(payload).expect("解析应该成功");
        group.bench_with_input(BenchmarkId::new("bind_to_runs", name), &query, |b, query| {
            b.iter(|| black_box(query.bind_to_runs(black_box(&runs)).expect("绑定应该成功")))
        });
    }
    group.finish();
}

// 基准测试：内存后端执行
fn benchmark_memory_execute(c: &mut Criterion) {
    let parser = QueryParser::default();
    let runs = runs();
    let store = create_store();
    let mut group = c.benchmark_group("memory_execute");
    for (name, payload) in CASES {
        let bound = parser
            .parse_str(payload)
            .expect("解析应该成功")
            .bind_to_runs(&runs)
            .expect("绑定应该成功");
        let plan = store.bind(&runs, &bound).expect("内存后端绑定应该成功");
        group.bench_with_input(BenchmarkId::new("execute", name), &plan, |b, plan| {
            b.iter(|| black_box(plan.execute(black_box(&runs))))
        });
    }
    group.finish();
}

// 基准测试：SQL编译性能
fn benchmark_sql_compile(c: &mut Criterion) {
    let parser = QueryParser::default();
    let runs = runs();
    let binder = SqlBinder::new(SqlConfig::default(), 1000);
    let mut group = c.benchmark_group("sql_compile");
    for (name, payload) in CASES {
        let bound = parser
            .parse_str(payload)
            .expect("解析应该成功")
            .bind_to_runs(&runs)
            .expect("绑定应该成功");
        group.bench_with_input(BenchmarkId::new("compile", name), &bound, |b, bound| {
            b.iter(|| {
                let plan = binder.bind(&runs, black_box(bound)).expect("编译应该成功");
                black_box(plan.execute(&runs))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_parser,
    benchmark_bind,
    benchmark_memory_execute,
    benchmark_sql_compile
);
criterion_main!(benches);
