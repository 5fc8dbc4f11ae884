//! Trellis CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Render-ready views of large code dependency graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Preferences file (defaults to ./trellis.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the view and print a summary
    View {
        /// Raw graph JSON file
        graph: PathBuf,

        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// List module dependency cycles
    Cycles {
        graph: PathBuf,
    },
    /// Build and lay out the view
    Layout {
        graph: PathBuf,

        #[arg(long, default_value = "1600")]
        width: f64,

        #[arg(long, default_value = "900")]
        height: f64,

        /// Print the laid-out nodes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lay out the view and report which edges a viewport would render
    Visible {
        graph: PathBuf,

        #[arg(long, default_value = "1600")]
        width: f64,

        #[arg(long, default_value = "900")]
        height: f64,

        /// Pan and zoom as `x,y,zoom`; defaults to fit-to-view
        #[arg(long, value_parser = commands::parse_viewport)]
        viewport: Option<trellis_core::Viewport>,
    },
    /// Fuzzy search nodes and show their neighbourhood
    Search {
        graph: PathBuf,

        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Also list nodes reachable from the best hit
        #[arg(long)]
        depth: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "trellis={log_level},trellis_core={log_level},trellis_layout={log_level},trellis_viewport={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Trellis v{}", env!("CARGO_PKG_VERSION"));
    let prefs = commands::load_preferences(cli.config.as_deref())?;

    match cli.command {
        Commands::View { graph, json } => commands::view(&graph, &prefs, json),
        Commands::Cycles { graph } => commands::cycles(&graph, &prefs),
        Commands::Layout {
            graph,
            width,
            height,
            json,
        } => commands::layout(&graph, &prefs, width, height, json).await,
        Commands::Visible {
            graph,
            width,
            height,
            viewport,
        } => commands::visible(&graph, &prefs, width, height, viewport).await,
        Commands::Search {
            graph,
            query,
            limit,
            depth,
        } => commands::search(&graph, &prefs, &query, limit, depth),
    }
}
