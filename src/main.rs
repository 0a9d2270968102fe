use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use yuback::{Config, FetchReason, SyncEngine, SyncOutcome};

#[derive(Parser)]
#[command(name = "yuback")]
#[command(about = "Incremental Yuque knowledge-base backup tool")]
#[command(version)]
struct Cli {
    /// Destination directory for the backup (defaults to the current directory)
    destination: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// One cooperative worker: network and filesystem calls suspend on a single
// thread, nothing runs in parallel
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting yuback v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)?;
    let destination = cli.destination.unwrap_or_else(|| PathBuf::from("."));

    let engine = SyncEngine::new(config, destination)?;
    let summary = engine.run().await?;

    println!("\n🎉 Backup complete!");
    println!("   📚 Repositories: {}", summary.repositories);
    println!("   📄 Documents seen: {}", summary.documents);
    println!("   📥 Downloaded: {}", summary.downloaded);
    println!("   ⏭️  Skipped (unchanged): {}", summary.skipped);
    println!("   🖼️  Assets fetched: {}", summary.assets);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    let updated: Vec<_> = summary
        .results
        .iter()
        .filter_map(|result| match result {
            SyncOutcome::Downloaded {
                repo,
                title,
                reason: FetchReason::Updated,
                ..
            } => Some((repo, title)),
            _ => None,
        })
        .collect();

    if !updated.is_empty() {
        println!("\n🔄 Updated documents:");
        for (repo, title) in updated {
            println!("   {} / {}", repo, title);
        }
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}
