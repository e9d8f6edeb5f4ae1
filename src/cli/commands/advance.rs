//! `stagegate advance` command - Move a project to its next stage

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::check::print_decision;
use crate::cli::helpers::{print_structured, Engine};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::Stage;
use crate::gates::GateError;

#[derive(clap::Args, Debug)]
pub struct AdvanceArgs {
    /// Project id (file stem under projects/) or path to a project file
    #[arg(value_name = "PROJECT")]
    pub project_id: String,

    /// Stage the project is expected to be leaving (default: its current stage)
    #[arg(long)]
    pub from: Option<Stage>,
}

pub fn run(args: AdvanceArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let project = engine.load_project(&args.project_id)?;
    let from = engine.stage_or_current(args.from, &project.id)?;
    let format = engine.format(global);

    match engine.orchestrator().advance(&project, from) {
        Ok(transition) => {
            if format != OutputFormat::Auto {
                return print_structured(&transition, format);
            }
            if !global.quiet {
                print_decision(&transition.decision, global.quiet);
                println!();
            }
            println!(
                "{} Advanced {} from {} to {}",
                style("✓").green(),
                style(&transition.project_id).cyan(),
                style(transition.from).yellow(),
                style(transition.to).green()
            );
            Ok(())
        }
        Err(GateError::Blocked(decision)) => {
            if format != OutputFormat::Auto {
                print_structured(&decision, format)?;
            } else {
                print_decision(&decision, global.quiet);
            }
            Err(miette::miette!(
                "Cannot advance {} from '{}': blocked by {}",
                decision.project_id,
                decision.stage,
                decision.blocking_gate_keys().join(", ")
            ))
        }
        Err(e) => Err(e).into_diagnostic(),
    }
}
