//! Times single- and multi-threaded insertion into one shared list.

use anyhow::Result;
use clap::Parser;
use synclist::{bench, options::BenchOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Worker threads in the contended phase
    #[arg(short, long, default_value_t = 4)]
    threads: usize,

    /// Keys inserted by each worker thread
    #[arg(short, long, default_value_t = 250_000)]
    ops_per_thread: usize,

    /// Keys inserted in the single-threaded phase
    #[arg(short, long, default_value_t = 1_000_000)]
    single_thread_ops: usize,
}

fn env_filter() -> EnvFilter {
    EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    let args = Args::parse();
    let mut options = BenchOptions::new();
    options
        .threads(args.threads)
        .ops_per_thread(args.ops_per_thread)
        .single_thread_ops(args.single_thread_ops);

    let summary = bench::run(&options)?;

    println!("{}", summary.single);
    println!("{}", summary.multi);
    info!(
        "final count {}, {} nodes allocated, {} released",
        summary.final_count, summary.arena.allocated, summary.arena.released
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn test_filter_lets_info_through() {
        assert!(env_filter().max_level_hint() >= Some(LevelFilter::INFO));
    }
}
