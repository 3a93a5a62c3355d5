//! Benchmark runner for shared reader fan-out
//!
//! Usage: `ml-feed-bench [config.json]`. Set `RUST_LOG` to see reader logs.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use ml_feed_bench::{bench_fanout, BenchConfig, BenchResult};

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Throughput:   {:.2} records/sec", result.throughput);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read benchmark config {path}"))?;
            serde_json::from_str(&json).with_context(|| format!("invalid benchmark config {path}"))?
        }
        None => BenchConfig::default(),
    };

    println!("=== Shared Reader Benchmarks ===");
    print_result(&bench_fanout(&config)?);

    // Scale the number of consumers sharing one reader
    println!("\n=== Consumer Scaling ===");
    for consumers in [1, 2, 4, 8] {
        let config = BenchConfig {
            consumers,
            iterations: 3,
            warmup_iterations: 1,
            ..config.clone()
        };
        print_result(&bench_fanout(&config)?);
    }

    // Scale the per-consumer queue capacity
    println!("\n=== Queue Capacity ===");
    for queue_capacity in [1, 2, 4, 16] {
        let config = BenchConfig {
            queue_capacity,
            iterations: 3,
            warmup_iterations: 1,
            ..config.clone()
        };
        print_result(&bench_fanout(&config)?);
    }

    Ok(())
}
