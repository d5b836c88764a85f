use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use factstore_core::axioms;
use factstore_core::{archive, QuerySpec, SystemClock, Value, World, WorldConfig};

const CI_CONFIG: &[(u64, u64)] = &[(100, 5), (1_000, 1)];

const LOCAL_CONFIG: &[(u64, u64)] = &[(10, 1), (100, 1), (1_000, 1)];

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    implementation: &'static str,
    workload: String,
    timestamp: String,
    total_ops: u64,
    duration_ms: f64,
    ops_per_sec: f64,
    extra: Extra,
    source_file: Option<String>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct Extra {
    count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    iterations: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_duration_ms: Option<f64>,
}

#[derive(Clone, Copy)]
enum Workload {
    /// Create items filed under one category while a match query stays live.
    CreateWithQuery,
    /// Reorder every new item into the same shrinking gap.
    ReorderGap,
    /// Serialize and reload the whole log.
    ArchiveRoundTrip,
}

impl Workload {
    fn name(self) -> &'static str {
        match self {
            Workload::CreateWithQuery => "create-with-query",
            Workload::ReorderGap => "reorder-gap",
            Workload::ArchiveRoundTrip => "archive-roundtrip",
        }
    }
}

fn fresh_world() -> World<SystemClock> {
    let config = WorldConfig {
        seed: Some(7),
        ..WorldConfig::default()
    };
    let mut world = World::new(config, SystemClock).unwrap();
    world.new_user("bench", None).unwrap();
    world
}

fn populate(world: &mut World<SystemClock>, count: u64) {
    let category = world.new_item(Some("category")).unwrap();
    for i in 0..count {
        let item = world.new_item(Some(&format!("item-{i}"))).unwrap();
        world
            .add_entry(item, axioms::CATEGORY.id(), Value::Item(category))
            .unwrap();
    }
}

fn run_benchmark(workload: Workload, count: u64) -> f64 {
    let mut world = fresh_world();
    match workload {
        Workload::CreateWithQuery => {
            let start = Instant::now();
            let category = world.new_item(Some("category")).unwrap();
            let query = world
                .new_query_runner(QuerySpec::Match {
                    attribute: axioms::CATEGORY.id(),
                    values: vec![Value::Item(category)],
                })
                .unwrap();
            for i in 0..count {
                let item = world.new_item(Some(&format!("item-{i}"))).unwrap();
                world
                    .add_entry(item, axioms::CATEGORY.id(), Value::Item(category))
                    .unwrap();
            }
            assert_eq!(world.get_result_items(query).unwrap().len() as u64, count);
            start.elapsed().as_secs_f64() * 1000.0
        }
        Workload::ReorderGap => {
            let left = world.new_item(Some("left")).unwrap();
            let right = world.new_item(Some("right")).unwrap();
            let start = Instant::now();
            let mut upper = right;
            for _ in 0..count {
                let item = world.new_item(None).unwrap();
                world.reorder_between(item, Some(left), Some(upper)).unwrap();
                upper = item;
            }
            start.elapsed().as_secs_f64() * 1000.0
        }
        Workload::ArchiveRoundTrip => {
            populate(&mut world, count);
            let start = Instant::now();
            let json = archive::to_json(&world).unwrap();
            let copy = archive::from_json(&json).unwrap();
            assert_eq!(copy.transactions().len(), world.transactions().len());
            start.elapsed().as_secs_f64() * 1000.0
        }
    }
}

fn is_ci() -> bool {
    env::var("CI").map(|v| v == "true").unwrap_or(false)
}

fn main() {
    let config: &[(u64, u64)] = if is_ci() { CI_CONFIG } else { LOCAL_CONFIG };

    let mut out_dir: Option<PathBuf> = None;
    let mut custom_config: Option<Vec<(u64, u64)>> = None;
    for arg in env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--count=") {
            let count = val.parse().unwrap_or(500);
            custom_config = Some(vec![(count, 1)]);
        } else if let Some(val) = arg.strip_prefix("--out-dir=") {
            out_dir = Some(PathBuf::from(val));
        }
    }

    let config = custom_config.as_deref().unwrap_or(config);
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("benchmarks/core"));
    fs::create_dir_all(&out_dir).expect("mkdirs");

    let workloads = [
        Workload::CreateWithQuery,
        Workload::ReorderGap,
        Workload::ArchiveRoundTrip,
    ];
    for workload in workloads {
        for &(count, iterations) in config {
            let (duration_ms, iterations_opt, avg_duration_ms) = if iterations > 1 {
                let durations: Vec<f64> = (0..iterations)
                    .map(|_| run_benchmark(workload, count))
                    .collect();
                let avg = durations.iter().sum::<f64>() / durations.len() as f64;
                (avg, Some(iterations), Some(avg))
            } else {
                (run_benchmark(workload, count), None, None)
            };

            let workload_name = format!("{}-{}", workload.name(), count);
            let out_path = out_dir.join(format!("memory-{workload_name}.json"));
            let output = Output {
                implementation: "factstore-core",
                workload: workload_name,
                timestamp: chrono::Utc::now().to_rfc3339(),
                total_ops: count,
                duration_ms,
                ops_per_sec: if duration_ms > 0.0 {
                    count as f64 / duration_ms * 1000.0
                } else {
                    f64::INFINITY
                },
                extra: Extra {
                    count,
                    iterations: iterations_opt,
                    avg_duration_ms,
                },
                source_file: Some(out_path.display().to_string()),
            };

            let json = serde_json::to_string_pretty(&output).expect("serialize");
            fs::write(&out_path, &json).expect("write output");
            println!("{json}");
        }
    }
}
