use anyhow::{Context, Result};
use clap::Parser;
use lineylink::graph::load_graph;
use lineylink::ingest::load_entities;
use lineylink::scoring::{score_lengths, solutions};
use lineylink::{Config, EntityId, PathEngine};

#[derive(Parser, Debug)]
#[command(name = "solve")]
#[command(about = "List every linemate chain between two players")]
struct Args {
    /// Starting player id
    source: u64,

    /// Target player id
    target: u64,

    /// Print solutions as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.data.log_level.as_str()),
    )
    .init();

    let graph = load_graph(&config.data.linkages_dir)
        .with_context(|| format!("Failed to load graph from {}", config.data.linkages_dir.display()))?;
    let directory = load_entities(&config.data.entities_dir, &config.aggregation);
    let (source, target) = (EntityId(args.source), EntityId(args.target));
    for id in [source, target] {
        directory.require(id)?;
        if !graph.contains(id) {
            log::warn!("Player {} has no linemates in the graph", id);
        }
    }

    let engine = PathEngine::new(&graph, &config.search);
    let set = engine.paths(source, target);
    let found = solutions(&set, &config.scoring);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    let shortest = engine.shortest(source, target);
    println!(
        "\n=== {} -> {} ===\n",
        directory.display_name(source),
        directory.display_name(target)
    );
    match &shortest {
        Some(path) => println!("Shortest chain: {} players", path.len()),
        None => {
            println!("No chain connects these players.");
            return Ok(());
        }
    }

    let score = score_lengths(&set.lengths(), &config.scoring);
    println!("Solutions: {}  (pair score {})", found.len(), score.total);
    if set.is_truncated() {
        println!("Capped at {} paths for lengths {:?}", engine.limits().per_length_cap, set.truncated_lengths);
    }
    println!();

    for solution in &found {
        let names: Vec<String> = solution.nodes.iter().map(|id| directory.display_name(*id)).collect();
        let uniqueness = solution
            .uniqueness
            .map_or_else(|| "-".to_string(), |u| format!("{:.1}", u));
        println!("[{}] {:>5}  {}", solution.length, uniqueness, names.join(" -> "));
    }

    Ok(())
}
