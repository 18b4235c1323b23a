//! # pggtyper: Pangenome Genotyping and Phasing
//!
//! Genotypes and phases known variants of a sample from its read k-mer
//! counts and the haplotype paths of a pangenome.
//!
//! ## Usage
//! ```bash
//! # Genotyping and phasing
//! pggtyper --variants variants.tsv --reads reads.kmers --out sample
//!
//! # Genotypes only, with precomputed genomic counts
//! pggtyper --variants variants.tsv --reads reads.kmers --genome genome.kmers --out sample --only-genotyping
//!
//! # With profiling output
//! pggtyper --variants variants.tsv --reads reads.kmers --out sample --profile
//! ```

use std::time::Instant;

use pggtyper::config::Config;
use pggtyper::pipelines::GenotypingPipeline;
use pggtyper::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber; `--profile` adds span timings
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if config.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let span_events = if config.profile {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_span_events(span_events)
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();

    // Parse and validate configuration
    let config = Config::parse_and_validate()?;

    init_tracing(&config);
    if config.profile {
        eprintln!("=== Profiling enabled ===\n");
    }

    eprintln!("pggtyper v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Threads: {}", config.nthreads());
    eprintln!("Variants: {:?}", config.variants);
    eprintln!("Reads: {:?}", config.reads);

    let mut pipeline = GenotypingPipeline::new(config);
    let summary = pipeline.run()?;

    let elapsed = start.elapsed();
    eprintln!("\nCompleted in {:.2}s", elapsed.as_secs_f64());

    summary.into_result().map(|_| ())
}

