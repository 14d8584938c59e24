//! Run command - Run a pipeline and stream its output.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use relay_core::{
    CoreError, Pipeline, PipelineExecutor, PipelineStore, Run, RunEvent, RunHistory,
    SimulatedProvider,
};

use super::{build_stores, GlobalArgs};

#[derive(Args)]
pub struct RunArgs {
    /// Input handed to the first agent
    pub input: String,

    /// Pipeline id or name (defaults to the active pipeline)
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Stop the run after this many milliseconds
    #[arg(long)]
    pub stop_after_ms: Option<u64>,

    /// Request whole completions instead of streamed increments
    #[arg(long)]
    pub atomic: bool,

    /// Override the simulator delay between increments
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Print the finished run as JSON instead of streaming
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = global.load_config()?;
    if let Some(ms) = args.delay_ms {
        config.simulator.delay_ms = ms;
    }
    if args.atomic {
        config.executor.streaming = false;
    }

    let (_, store) = build_stores(&config)?;
    let pipeline = select_pipeline(&store, args.pipeline.as_deref())?;

    let executor = Arc::new(
        PipelineExecutor::new(
            Arc::new(store),
            Arc::new(RunHistory::new()),
            Arc::new(SimulatedProvider::new(config.simulator.clone())),
        )
        .with_config(config.executor.clone()),
    );

    let mut events = executor.events();
    let handle = executor
        .start(&pipeline.id, &args.input)
        .with_context(|| format!("Cannot run pipeline '{}'", pipeline.name))?;
    let run_id = handle.id().to_string();

    if let Some(ms) = args.stop_after_ms {
        let executor = executor.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            executor.stop(&run_id);
        });
    }
    {
        let executor = executor.clone();
        let run_id = run_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping run {}", run_id);
                executor.stop(&run_id);
            }
        });
    }

    let render = !args.json && !global.quiet;
    if render {
        println!("🚀 {} → \"{}\"", pipeline.name, args.input);
    }

    loop {
        match events.recv().await {
            Ok(event) if event.run_id() != run_id => continue,
            Ok(event) => {
                if render {
                    print_event(&event, &pipeline)?;
                }
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Output lagged, skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }

    let run = handle.wait().await?;
    info!("Run {} finished with status {:?}", run.id, run.status);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else if global.quiet {
        if let Some(output) = run.final_output() {
            println!("{}", output);
        }
    } else {
        print_summary(&run);
    }

    match run.failure {
        Some(failure) => Err(anyhow::Error::msg(failure)),
        None => Ok(()),
    }
}

/// Resolve `key` as an id or name, or fall back to the active pipeline.
fn select_pipeline(store: &PipelineStore, key: Option<&str>) -> Result<Pipeline> {
    let pipeline = match key {
        Some(key) => store.find(key).ok_or_else(|| CoreError::PipelineNotFound(key.to_string()))?,
        None => store
            .active()
            .ok_or_else(|| CoreError::PipelineNotFound("<none selected>".to_string()))?,
    };
    Ok(pipeline)
}

fn print_event(event: &RunEvent, pipeline: &Pipeline) -> Result<()> {
    let total = pipeline.agents.len();
    let mut stdout = std::io::stdout();
    match event {
        RunEvent::StepStarted { step, .. } => {
            let name = pipeline
                .agents
                .get(*step)
                .map(|a| a.name.as_str())
                .unwrap_or("agent");
            println!();
            println!("▶ [{}/{}] {}", step + 1, total, name);
        }
        RunEvent::StepOutput { delta, .. } => {
            write!(stdout, "{}", delta)?;
            stdout.flush()?;
        }
        RunEvent::StepCompleted { .. } => println!(),
        RunEvent::StepFailed { step, error, .. } => {
            println!();
            eprintln!("   ❌ Step {} failed: {}", step + 1, error);
        }
        RunEvent::RunCancelled { step, .. } => {
            println!();
            println!("⏹  Stopped before step {} finished", step + 1);
        }
        RunEvent::RunStarted { .. } | RunEvent::RunCompleted { .. } | RunEvent::RunFailed { .. } => {}
    }
    Ok(())
}

fn print_summary(run: &Run) {
    let seconds = run
        .duration()
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();

    println!();
    match &run.failure {
        None => println!(
            "✅ Run {} completed: {} steps in {:.1}s",
            run.id,
            run.steps.len(),
            seconds
        ),
        Some(failure) => println!(
            "❌ Run {} ended after {}/{} steps in {:.1}s: {}",
            run.id,
            run.completed_steps(),
            run.steps.len(),
            seconds,
            failure
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::preset_agents;

    #[test]
    fn test_select_pipeline_by_id_name_or_active() {
        let store = PipelineStore::with_default();
        let review = store.create("Review", preset_agents().into_iter().skip(3).collect());

        assert_eq!(select_pipeline(&store, None).unwrap().id, review);
        assert_eq!(select_pipeline(&store, Some("default")).unwrap().agents.len(), 3);
        assert_eq!(select_pipeline(&store, Some("Review")).unwrap().id, review);

        let err = select_pipeline(&store, Some("missing")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::PipelineNotFound(_))
        ));
    }
}
