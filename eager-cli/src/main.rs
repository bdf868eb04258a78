//! eagercache CLI
//!
//! Drives a cache with a simulated slow loader so refreshes and evictions can
//! be watched from a terminal, and measures read throughput.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use eager_cache::{CacheBuilder, CacheConfig, CacheStats, EagerCache, Registry, RegistryConfig};

/// eagercache - lazily refreshed TTL cache
#[derive(Parser)]
#[command(name = "eagercache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch entries get refreshed and evicted over several sweep rounds
    Demo(DemoArgs),

    /// Measure read throughput from several threads
    Bench {
        /// Reader threads
        #[arg(short, long, default_value = "4")]
        threads: usize,
        /// Distinct keys to read
        #[arg(short, long, default_value = "1000")]
        keys: usize,
        /// Reads per thread
        #[arg(short, long, default_value = "100000")]
        reads: u64,
    },
}

#[derive(Args)]
struct DemoArgs {
    /// Entry TTL in milliseconds (falls back to EAGERCACHE_TTL_MS)
    #[arg(long)]
    ttl_ms: Option<u64>,
    /// Sweep interval in milliseconds (falls back to EAGERCACHE_SWEEP_MS)
    #[arg(long)]
    sweep_ms: Option<u64>,
    /// Keys loaded up front
    #[arg(short, long, default_value = "20")]
    keys: usize,
    /// Keys read again every round
    #[arg(long, default_value = "5")]
    hot: usize,
    /// Sweep rounds to observe
    #[arg(short, long, default_value = "5")]
    rounds: usize,
    /// Simulated loader latency in milliseconds
    #[arg(long, default_value = "25")]
    latency_ms: u64,
    /// Print per-round stats as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "eager=debug,info"
    } else {
        "eager=info,warn"
    };

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()));
    if cli.json_logs {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }

    match cli.command {
        Commands::Demo(args) => cmd_demo(args),
        Commands::Bench { threads, keys, reads } => cmd_bench(threads, keys, reads),
    }
}

/// Run the refresh/evict demo on the global registry
fn cmd_demo(args: DemoArgs) -> Result<()> {
    let cache_config = match args.ttl_ms {
        Some(ms) => CacheConfig::new().ttl(Duration::from_millis(ms)),
        None => CacheConfig::from_env().context("Invalid cache configuration")?,
    }
    .name("demo");
    let registry_config = match args.sweep_ms {
        Some(ms) => RegistryConfig::default().sweep_interval(Duration::from_millis(ms)),
        None => RegistryConfig::from_env().context("Invalid registry configuration")?,
    };

    let ttl = cache_config.ttl_duration();
    let interval = registry_config.sweep_interval_duration();
    let hot = args.hot.min(args.keys);

    println!("{}", "🧊 eagercache demo".cyan().bold());
    println!("   {} {:?}", "TTL:".dimmed(), ttl);
    println!("   {} {:?}", "Sweep interval:".dimmed(), interval);
    println!("   {} {} ({} hot)", "Keys:".dimmed(), args.keys, hot);

    let registry = Registry::global();
    registry
        .start_sweeper(interval)
        .context("Failed to start sweeper")?;

    let loads = Arc::new(AtomicU64::new(0));
    let counter = loads.clone();
    let latency = Duration::from_millis(args.latency_ms);
    let cache: EagerCache<String> = CacheBuilder::new()
        .config(cache_config)
        .loader(move |key: &str| {
            thread::sleep(latency);
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(format!("{key}@{n}"))
        })
        .build_in(registry)
        .context("Failed to create cache")?;

    let keys: Vec<String> = (0..args.keys).map(|i| format!("key-{i}")).collect();
    for key in &keys {
        cache.get(key)?;
    }
    info!(keys = keys.len(), "Cache warmed");

    for round in 1..=args.rounds {
        for key in keys.iter().take(hot) {
            cache.get(key)?;
        }
        // Long enough for entries to expire and a sweep to pass over them
        thread::sleep(ttl + interval);
        print_stats(round, &cache.stats(), args.json)?;
    }

    println!(
        "\n{} {} loader calls in total",
        "✅".green(),
        loads.load(Ordering::Relaxed)
    );
    cache.close()?;
    Ok(())
}

fn print_stats(round: usize, stats: &CacheStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }

    println!("\n{} {}", "Round".yellow().bold(), round);
    println!("   {} {}", "Entries:".dimmed(), stats.total_entries);
    println!("   {} {}", "Hits:".dimmed(), stats.hits);
    println!("   {} {}", "Loads:".dimmed(), stats.loads);
    println!("   {} {}", "Refreshes:".green(), stats.refreshes);
    println!("   {} {}", "Evictions:".red(), stats.evictions);
    if stats.load_failures > 0 {
        println!("   {} {}", "Failures:".red().bold(), stats.load_failures);
    }
    Ok(())
}

/// Measure fast-path read throughput
fn cmd_bench(threads: usize, keys: usize, reads: u64) -> Result<()> {
    println!(
        "{} {} threads × {} reads",
        "📊 Benchmarking with".cyan().bold(),
        threads,
        reads
    );

    let registry = Registry::new();
    let cache = registry
        .create_cache(Duration::from_secs(3600), |key: &str| Ok(key.len()))
        .context("Failed to create cache")?;

    let keys: Vec<String> = (0..keys.max(1)).map(|i| format!("key-{i}")).collect();
    for key in &keys {
        cache.get(key)?;
        cache.get(key)?;
    }

    let pb = ProgressBar::new(threads as u64 * reads);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..threads)
            .map(|t| {
                let (cache, keys, pb) = (&cache, &keys, &pb);
                scope.spawn(move || -> Result<()> {
                    for i in 0..reads {
                        let key = &keys[(i as usize + t) % keys.len()];
                        cache.get(key)?;
                        if i % 1000 == 999 {
                            pb.inc(1000);
                        }
                    }
                    Ok(())
                })
            })
            .collect();
        for worker in workers {
            worker
                .join()
                .map_err(|_| anyhow::anyhow!("reader thread panicked"))??;
        }
        Ok(())
    })?;
    pb.finish();
    let elapsed = start.elapsed();

    let total = threads as u64 * reads;
    let stats = cache.stats();
    println!("\n{}", "📈 Results:".green().bold());
    println!("   Reads: {} in {:?}", total, elapsed);
    println!("   Rate: {:.0} reads/sec", total as f64 / elapsed.as_secs_f64());
    println!("   Loader calls: {}", stats.loads);

    cache.close()?;
    Ok(())
}
