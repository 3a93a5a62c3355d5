//! Benchmarks for shared reader fan-out

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use ml_feed_core::{MemorySource, RawRecord, ReaderConfig, ReaderHandle, Registry, SourceIdentity};

/// Benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Number of iterations
    pub iterations: usize,

    /// Warmup iterations
    pub warmup_iterations: usize,

    /// Number of consumers sharing the source
    pub consumers: usize,

    /// Record buffers per consumer
    pub queue_capacity: usize,

    /// Number of records in the source
    pub source_records: usize,

    /// Size of each record value in bytes
    pub record_size: usize,

    /// Records each consumer reads per iteration
    pub records_per_consumer: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 3,
            consumers: 4,
            queue_capacity: 3,
            source_records: 1000,
            record_size: 4096,
            records_per_consumer: 10_000,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Throughput (records/second across all consumers)
    pub throughput: f64,
}

/// Run a benchmark
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, func: F) -> Result<BenchResult>
where
    F: Fn() -> Result<()>,
{
    if config.iterations == 0 {
        return Err(anyhow!("benchmark needs at least one iteration"));
    }

    // Warmup
    for _ in 0..config.warmup_iterations {
        func()?;
    }

    // Actual benchmark
    let mut times = Vec::with_capacity(config.iterations);
    let start_total = Instant::now();

    for _ in 0..config.iterations {
        let start = Instant::now();
        func()?;
        times.push(start.elapsed());
    }

    let total_time = start_total.elapsed();

    // Calculate statistics
    let avg_time = total_time / u32::try_from(times.len())?;
    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let total_records = (config.iterations * config.consumers * config.records_per_consumer) as f64;
    let throughput = total_records / total_time.as_secs_f64();

    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        throughput,
    })
}

/// Benchmark one source fanned out to `config.consumers` consumers
///
/// Every iteration uses a fresh registry, so reader start-up and shutdown
/// are part of the measured time.
pub fn bench_fanout(config: &BenchConfig) -> Result<BenchResult> {
    let source = MemorySource::from_values(
        (0..config.source_records).map(|i| vec![u8::try_from(i % 256).unwrap_or(0); config.record_size]),
    );
    let reader_config = ReaderConfig::new(SourceIdentity::new("bench", "memory"))
        .with_queue_capacity(config.queue_capacity)
        .with_expected_consumers(config.consumers);

    let name = format!(
        "Fan-out {} consumers x capacity {}",
        config.consumers, config.queue_capacity
    );

    run_benchmark(&name, config, || {
        let registry = Registry::new();
        let handles: Vec<ReaderHandle<RawRecord>> = (0..config.consumers)
            .map(|_| registry.open(&reader_config, &source))
            .collect::<ml_feed_core::Result<_>>()
            .context("failed to attach consumers")?;

        thread::scope(|scope| {
            let readers: Vec<_> = handles
                .iter()
                .map(|handle| scope.spawn(move || drain(handle, config.records_per_consumer)))
                .collect();
            readers
                .into_iter()
                .map(|reader| reader.join().map_err(|_| anyhow!("consumer thread panicked"))?)
                .collect::<Result<Vec<_>>>()
        })?;

        Ok(())
    })
}

/// Pop and return `count` records, touching each value
fn drain(handle: &ReaderHandle<RawRecord>, count: usize) -> Result<usize> {
    let mut bytes = 0;
    for _ in 0..count {
        let record = handle.full().pop()?;
        bytes += record.value.len();
        handle.free().push(record)?;
    }
    Ok(bytes)
}
