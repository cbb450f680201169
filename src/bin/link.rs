use anyhow::Result;
use clap::Parser;
use lineylink::pipeline::{build_graph, write_graph_outputs};
use lineylink::Config;

#[derive(Parser, Debug)]
#[command(name = "link")]
#[command(about = "Aggregate shift charts into the linemate graph and write linkage files")]
struct Args {
    /// Minimum overlap minutes for an edge (overrides config)
    #[arg(long)]
    min_minutes: Option<f64>,

    /// Print the N most connected players
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.data.log_level.as_str()),
    )
    .init();

    if let Some(min_minutes) = args.min_minutes {
        config.aggregation.min_overlap_minutes = min_minutes;
        config.validate()?;
    }

    let (directory, output) = build_graph(&config)?;
    write_graph_outputs(&config, &directory, &output)?;

    println!("\n=== Linemate Graph ===\n");
    println!("Players:      {}", output.graph.len());
    println!("Connections:  {}", output.graph.edge_count());
    println!("Games:        {}", output.stats.batches);
    println!("Seasons:      {}", output.periods.join(", "));

    if args.top > 0 {
        println!("\nMost connected:");
        for (rank, row) in output.graph.top_connected(args.top).iter().enumerate() {
            println!(
                "{:>3}. {:<28} {:>4} linemates {:>10.1} min",
                rank + 1,
                directory.display_name(row.entity_id),
                row.connectivity_score,
                row.total_minutes
            );
        }
    }

    Ok(())
}
