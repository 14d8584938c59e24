//! Agents command - List the agent catalogue.

use anyhow::{Context, Result};
use clap::Args;

use relay_core::Agent;

use super::GlobalArgs;

#[derive(Args)]
pub struct AgentsArgs {
    /// Print the catalogue as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: AgentsArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.load_config()?;
    let registry = config
        .build_registry()
        .context("Invalid agent configuration")?;

    if args.json {
        let json = serde_json::to_string_pretty(&registry.list())?;
        println!("{}", json);
        return Ok(());
    }

    println!("Preset agents:");
    print_agents(registry.list_presets());

    if !registry.list_custom().is_empty() {
        println!();
        println!("Custom agents:");
        print_agents(registry.list_custom());
    }

    Ok(())
}

fn print_agents(agents: &[Agent]) {
    for agent in agents {
        println!("  {:<14} {:<12} {:<10} {}", agent.id, agent.name, agent.model_id, agent.description);
    }
}
