use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::{json, Value};
use seriesviz::format::{format_number, hash_query};
use seriesviz::query::QueryResult;
use seriesviz::{calculate_colors, ChartEngine, ComputedQueryResults, DisplayNull, QueryOptions, SeriesVizConfig};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "seriesviz-cli", version, about = "Turn query results into chart models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute chart models for a query result file
    Compute {
        primary: PathBuf,
        /// Comparison result drawn dashed over the primary one
        #[arg(long)]
        against: Option<PathBuf>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        display_null: Option<DisplayNull>,
        #[arg(long, conflicts_with = "seed_from_query")]
        seed: Option<u64>,
        /// Seed the empty-group color from the query itself
        #[arg(long)]
        seed_from_query: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Print axis ticks for a value range
    #[command(allow_negative_numbers = true)]
    Splits {
        min: f64,
        max: f64,
        /// Axis length in pixels
        dim: f64,
        #[arg(long)]
        min_space: Option<f64>,
    },
    /// Print the colors assigned to group keys
    Colors {
        keys: Vec<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the engine over a randomly generated result
    Demo {
        #[arg(long, default_value_t = 4)]
        groups: usize,
        #[arg(long, default_value_t = 12)]
        intervals: usize,
        #[arg(long)]
        against: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SeriesVizConfig::from_env();
    config.validate()?;

    match cli.command {
        Commands::Compute {
            primary,
            against,
            id,
            display_null,
            seed,
            seed_from_query,
            pretty,
        } => {
            let engine = ChartEngine::new(config)?;
            let (primary, against) = load_results(&primary, against.as_deref()).await?;

            let mut extra = QueryOptions::new();
            if let Some(display_null) = display_null {
                extra.insert(
                    DisplayNull::OPTION_KEY.to_string(),
                    Value::String(display_null.to_string()),
                );
            }

            let seed = if seed_from_query {
                Some(hash_query(&primary.query, primary.dataset_id.as_deref()))
            } else {
                seed
            };

            let computed = engine.compute_with_options(&primary, against.as_ref(), id.as_deref(), &extra, seed);
            let output = match (&computed, pretty) {
                (Some(computed), true) => serde_json::to_string_pretty(computed)?,
                (Some(computed), false) => serde_json::to_string(computed)?,
                (None, _) => "null".to_string(),
            };
            println!("{}", output);
        }
        Commands::Splits {
            min,
            max,
            dim,
            min_space,
        } => {
            let min_space = min_space.unwrap_or(config.tick_min_space);
            match seriesviz::get_splits(min, max, dim, min_space) {
                Some(splits) => {
                    let labels: Vec<String> = splits.iter().map(|v| format_number(Some(*v), None)).collect();
                    println!("{}", labels.join("  "));
                }
                None => println!("no splits"),
            }
        }
        Commands::Colors { keys, seed } => {
            let colors = calculate_colors(&keys, seed);
            for (key, group_colors) in &colors {
                let label = if key.is_empty() { "(empty)" } else { key.as_str() };
                println!("{:<24} {}  {}", label, group_colors.dark, group_colors.light);
            }
        }
        Commands::Demo {
            groups,
            intervals,
            against,
        } => {
            let engine = ChartEngine::new(config)?;
            println!("seriesviz - chart model demo");
            println!("============================");

            let primary = generate_result(groups, intervals, 0)?;
            let comparison = if against {
                Some(generate_result(groups, intervals, 1)?)
            } else {
                None
            };

            let started = std::time::Instant::now();
            let computed = engine.compute(&primary, comparison.as_ref(), Some("demo"), None);
            info!("Computed demo result in {:?}", started.elapsed());

            match computed {
                Some(computed) => print_summary(&computed),
                None => println!("Nothing to render"),
            }
        }
    }

    Ok(())
}

async fn load_results(
    primary: &Path,
    against: Option<&Path>,
) -> Result<(QueryResult, Option<QueryResult>), Box<dyn std::error::Error>> {
    info!("Loading {}", primary.display());

    let (primary_json, against_json) = tokio::try_join!(tokio::fs::read_to_string(primary), async {
        match against {
            Some(path) => tokio::fs::read_to_string(path).await.map(Some),
            None => Ok(None),
        }
    })?;

    let primary = QueryResult::from_json_str(&primary_json)?;
    let against = against_json.as_deref().map(QueryResult::from_json_str).transpose()?;
    Ok((primary, against))
}

/// A random grouped result, `days_back` days before now.
fn generate_result(groups: usize, intervals: usize, days_back: i64) -> Result<QueryResult, Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    let end = Utc::now() - Duration::days(days_back);
    let start = end - Duration::minutes(intervals as i64);
    let hosts: Vec<String> = (0..groups).map(|i| format!("web-{:02}", i + 1)).collect();
    let paths = ["/", "/login", "/api/users", "/api/orders", "/health"];

    let group_row = |rng: &mut rand::rngs::ThreadRng, host: &str| {
        let count = rng.gen_range(50..500);
        let avg = rng.gen_range(20.0..250.0);
        let p50 = avg * 0.8;
        let histogram: Vec<Value> = (0..10)
            .map(|b| json!({"from": b * 50, "to": (b + 1) * 50, "count": rng.gen_range(0..40)}))
            .collect();
        let topk: Vec<Value> = paths
            .iter()
            .map(|path| json!({"key": path, "count": rng.gen_range(5..200), "error": rng.gen_range(0..5)}))
            .collect();
        json!({
            "group": {"host": host},
            "aggregations": [
                {"op": "count", "value": count},
                {"op": "avg", "value": avg},
                {"op": "percentiles", "value": [p50, avg * 1.6, avg * 2.4]},
                {"op": "histogram", "value": histogram},
                {"op": "topk", "value": topk}
            ]
        })
    };

    let series: Vec<Value> = (0..intervals)
        .map(|i| {
            let interval_start = start + Duration::minutes(i as i64);
            let rows: Vec<Value> = hosts.iter().map(|host| group_row(&mut rng, host)).collect();
            json!({
                "startTime": interval_start.to_rfc3339(),
                "endTime": (interval_start + Duration::minutes(1)).to_rfc3339(),
                "groups": rows
            })
        })
        .collect();
    let totals: Vec<Value> = hosts.iter().map(|host| group_row(&mut rng, host)).collect();

    let result = QueryResult::from_value(json!({
        "datasetId": "demo-http-logs",
        "query": {
            "aggregations": [
                {"op": "count", "field": ""},
                {"op": "avg", "field": "duration"},
                {"op": "percentiles", "field": "duration", "argument": [50, 95, 99]},
                {"op": "histogram", "field": "duration", "argument": 10},
                {"op": "topk", "field": "path", "argument": 5}
            ],
            "groupBy": ["host"],
            "resolution": "1m",
            "startTime": start.to_rfc3339(),
            "endTime": end.to_rfc3339()
        },
        "buckets": {"series": series, "totals": totals},
        "fieldsMeta": [{"name": "duration", "type": "float", "unit": "ms"}]
    }))?;

    Ok(result)
}

fn print_summary(computed: &ComputedQueryResults) {
    println!("\n📊 Charts:");
    for chart in &computed.aggregation_charts {
        let state = if chart.empty { "empty" } else { "ok" };
        println!("   {:<12} {:<32} {}", chart.kind(), chart.title, state);
        if let Some(alerts) = &chart.alerts {
            for alert in alerts {
                println!("     ⚠️  {}", alert);
            }
        }
    }

    println!("\n🎨 Colors:");
    for (key, colors) in &computed.colors {
        let label = if key.is_empty() { "(empty)" } else { key.as_str() };
        println!("   {:<12} {}", label, colors.dark);
    }

    println!("\n🧮 Totals:");
    let formatter = computed.field_value_formatters.get("duration");
    for row in &computed.totals {
        let count = first_value(row, 0);
        let avg = first_value(row, 1);
        println!(
            "   {:<12} count {:>8}  avg {}",
            row.id,
            format_number(count, None),
            format_number(avg, formatter)
        );
    }

    println!("\n✓ has results: {}", computed.has_results);
}

fn first_value(row: &seriesviz::compute::TotalInfo, agg_index: usize) -> Option<f64> {
    row.aggs
        .get(agg_index)?
        .as_ref()?
        .first()?
        .as_ref()?
        .value
        .as_f64()
}
