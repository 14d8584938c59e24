//! Pipelines command - List configured pipelines.

use anyhow::Result;
use chrono::Local;
use clap::Args;

use super::{build_stores, GlobalArgs};

#[derive(Args)]
pub struct PipelinesArgs {
    /// Print pipelines as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: PipelinesArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.load_config()?;
    let (_, store) = build_stores(&config)?;
    let pipelines = store.list();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&pipelines)?);
        return Ok(());
    }

    let active = store.active_id();
    for pipeline in &pipelines {
        let marker = if active.as_deref() == Some(pipeline.id.as_str()) { "*" } else { " " };
        let chain: Vec<&str> = pipeline.agents.iter().map(|a| a.name.as_str()).collect();

        println!("{} {} ({})", marker, pipeline.name, pipeline.id);
        if chain.is_empty() {
            println!("    (no agents)");
        } else {
            println!("    {}", chain.join(" → "));
        }
        if !global.quiet {
            println!(
                "    created {}",
                pipeline.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
