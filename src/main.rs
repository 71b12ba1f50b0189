use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use results_search::config::SearchConfig;
use results_search::memory::{MemoryStore, RunResults};
use results_search::sql_compiler::SqlBinder;
use results_search::{Binder, Plan, QueryParser, RunQuery, Size, TestRun, TestStatus};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "search_config.json";

/// 加载配置，失败时使用默认配置
fn load_config() -> SearchConfig {
    match SearchConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            info!(path = CONFIG_FILE, browsers = config.browser_names.len(), "loaded configuration");
            config
        }
        Err(e) => {
            warn!("{}, using defaults", e);
            SearchConfig::default()
        }
    }
}

/// 演示用的测试运行
fn demo_runs() -> Vec<TestRun> {
    let day = |d| Utc.with_ymd_and_hms(2018, 6, d, 0, 0, 0).single().unwrap_or_default();
    vec![
        TestRun::new(1, "chrome", day(1)).with_label("stable"),
        TestRun::new(2, "chrome", day(2)).with_label("experimental"),
        TestRun::new(3, "firefox", day(1)).with_label("stable"),
        TestRun::new(4, "safari", day(1)).with_label("stable"),
    ]
}

/// 演示用的测试结果
fn demo_store(max_query_size: usize) -> Result<MemoryStore> {
    use TestStatus::{Crash, Fail, Pass, Timeout};
    let store = MemoryStore::new(max_query_size);
    let data: [(i64, &[(&str, TestStatus)]); 4] = [
        (1, &[("/dom/events/click.html", Pass), ("/dom/nodes/append.html", Pass), ("/css/grid/align.html", Fail)]),
        (2, &[("/dom/events/click.html", Fail), ("/dom/nodes/append.html", Pass), ("/css/grid/align.html", Timeout)]),
        (3, &[("/dom/events/click.html", Pass), ("/dom/nodes/append.html", TestStatus::Error), ("/css/grid/align.html", Pass)]),
        (4, &[("/dom/events/click.html", TestStatus::Ok), ("/css/grid/align.html", Crash)]),
    ];
    for (run, results) in data {
        store.load_run(run, results.iter().copied().collect::<RunResults>())?;
    }
    Ok(store)
}

/// 按请求中的 run_ids 选出运行，缺失的运行视为错误
fn resolve_runs(query: &RunQuery, known: &[TestRun]) -> Result<Vec<TestRun>> {
    query
        .run_ids
        .iter()
        .map(|id| match known.iter().find(|run| run.id == *id) {
            Some(run) => Ok(run.clone()),
            None => bail!("unknown run id: {}", id),
        })
        .collect()
}

fn run_query(
    line: &str,
    parser: &QueryParser,
    runs: &[TestRun],
    store: &MemoryStore,
    sql: &SqlBinder,
) -> Result<()> {
    let query = parser.parse_str(line).context("failed to parse query")?;
    let runs = resolve_runs(&query, runs)?;
    let bound = query.bind_to_runs(&runs)?;
    println!("size: {}", bound.size());

    let plan = store.bind(&runs, &bound).context("memory backend rejected query")?;
    let results = plan.execute(&runs);
    println!("{}", serde_json::to_string_pretty(&results)?);

    let compiled = sql.bind(&runs, &bound).context("SQL backend rejected query")?.execute(&runs);
    println!("sql: {}", compiled.sql);
    for opt in &compiled.optimizations {
        println!("  • {:?}", opt);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config();
    let parser = QueryParser::from_config(&config);
    let runs = demo_runs();
    let store = demo_store(config.max_query_size)?;
    let sql = SqlBinder::new(config.sql.clone(), config.max_query_size);

    println!("--- Results Search: 查询 shell ---");
    println!("已知浏览器: {}", parser.browser_names().collect::<Vec<_>>().join(", "));
    println!("运行:");
    for run in &runs {
        println!("  {} {} {:?}", run.id, run.browser_name, run.labels);
    }
    println!(r#"示例: {{"run_ids":[1,2],"query":{{"and":[{{"browser_name":"chrome","status":"PASS"}},{{"browser_name":"chrome","status":"FAIL"}}]}}}}"#);

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                if let Err(e) = run_query(line, &parser, &runs, &store, &sql) {
                    println!("✗ {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
