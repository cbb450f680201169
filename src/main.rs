use anyhow::{Context, Result};
use clap::Parser;
use lineylink::graph::load_graph;
use lineylink::ingest::load_entities;
use lineylink::pipeline::{build_graph, select_pairs, write_graph_outputs, write_schedule};
use lineylink::scoring::{rng_from_seed, SelectionStatus};
use lineylink::{Config, PathEngine};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "lineylink")]
#[command(about = "Build the linemate graph, select puzzle pairs and write a dated puzzle schedule")]
struct Args {
    /// Reuse the linkage files on disk instead of re-aggregating shift charts
    #[arg(long)]
    reuse_graph: bool,

    /// Seed for pair sampling and puzzle shuffling (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of daily slots to fill (overrides config)
    #[arg(long)]
    days: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.data.log_level.as_str()),
    )
    .init();

    if let Some(days) = args.days {
        config.puzzles.days = days;
    }
    let seed = args.seed.or(config.selection.seed);
    log::info!("Starting Liney Link puzzle generation (seed: {:?})", seed);
    let start = Instant::now();

    let (directory, graph) = if args.reuse_graph {
        let directory = load_entities(&config.data.entities_dir, &config.aggregation);
        let graph = load_graph(&config.data.linkages_dir)
            .with_context(|| format!("Failed to load graph from {}", config.data.linkages_dir.display()))?;
        (directory, graph)
    } else {
        let (directory, output) = build_graph(&config)?;
        write_graph_outputs(&config, &directory, &output)?;
        (directory, output.graph)
    };

    if graph.is_empty() {
        anyhow::bail!("Relationship graph is empty; nothing to build puzzles from");
    }

    let engine = PathEngine::new(&graph, &config.search);
    let mut rng = rng_from_seed(seed);
    let selections = select_pairs(&config, &engine, &directory, &mut rng)?;
    for selection in &selections {
        if selection.status == SelectionStatus::BudgetExhausted {
            log::warn!(
                "Tier {} ran out of attempts with {} candidates",
                selection.tier,
                selection.candidates
            );
        }
    }

    let out_dir = config.data.output_dir.clone();
    let written = write_schedule(&config, &selections, &out_dir, &mut rng)?;

    log::info!(
        "Done: {} puzzles written to {} in {:.2?}",
        written,
        out_dir.display(),
        start.elapsed()
    );
    Ok(())
}
