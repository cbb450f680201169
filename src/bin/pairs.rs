use anyhow::{Context, Result};
use clap::Parser;
use lineylink::graph::load_graph;
use lineylink::ingest::load_entities;
use lineylink::puzzle::write_valid_pairs;
use lineylink::scoring::{rng_from_seed, PairSelector};
use lineylink::{Config, PathEngine};

#[derive(Parser, Debug)]
#[command(name = "pairs")]
#[command(about = "Sample, score and rank puzzle pairs from the stored linemate graph")]
struct Args {
    /// Only run this tier
    #[arg(short, long)]
    tier: Option<String>,

    /// Seed for pair sampling (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Rows shown per tier
    #[arg(long, default_value_t = 10)]
    show: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.data.log_level.as_str()),
    )
    .init();

    let directory = load_entities(&config.data.entities_dir, &config.aggregation);
    let graph = load_graph(&config.data.linkages_dir)
        .with_context(|| format!("Failed to load graph from {}", config.data.linkages_dir.display()))?;
    let engine = PathEngine::new(&graph, &config.search);
    let selector = PairSelector::new(&engine, &directory, &config.scoring, &config.selection);
    let mut rng = rng_from_seed(args.seed.or(config.selection.seed));

    let selections = match &args.tier {
        Some(name) => {
            let tier = config
                .selection
                .tiers
                .iter()
                .find(|t| &t.name == name)
                .with_context(|| format!("Unknown tier: {}", name))?;
            vec![selector.select(tier, &mut rng)?]
        }
        None => selector.select_all(&mut rng)?,
    };

    let path = config.data.output_dir.join("valid_pairs.json");
    let exported = write_valid_pairs(&selections, &path)?;

    for selection in &selections {
        println!(
            "\n=== Tier {} ({} pairs from {} candidates, {} attempts, {:?}) ===\n",
            selection.tier,
            selection.pairs.len(),
            selection.candidates,
            selection.attempts,
            selection.status
        );
        for pair in selection.pairs.iter().take(args.show) {
            println!(
                "{:>4}  {} -> {}  shortest {}  paths {}{}",
                pair.score,
                directory.display_name(pair.source),
                directory.display_name(pair.target),
                pair.shortest_length,
                pair.path_lengths.len(),
                if pair.truncated { " (capped)" } else { "" }
            );
        }
        if !selection.rejections.is_empty() {
            println!("\nRejections: {:?}", selection.rejections);
        }
    }

    println!("\nExported {} pairs to {}", exported, path.display());
    Ok(())
}
