//! `stagegate check` command - Evaluate a project's gates for a stage

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{print_structured, Engine};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::Stage;
use crate::gates::{AdvanceDecision, FirstPass, GateEvaluationResult, ResultTag};

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Project id (file stem under projects/) or path to a project file
    #[arg(value_name = "PROJECT")]
    pub project_id: String,

    /// Stage to evaluate (default: the project's current stage)
    #[arg(long, short = 's')]
    pub stage: Option<Stage>,

    /// Evaluate only; do not record first passes, locks or tasks
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: CheckArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let project = engine.load_project(&args.project_id)?;
    let stage = engine.stage_or_current(args.stage, &project.id)?;
    let format = engine.format(global);
    let orchestrator = engine.orchestrator();

    if args.dry_run {
        let results = orchestrator.evaluate_stage(&project, stage).into_diagnostic()?;
        let allowed = results.iter().all(|r| !r.is_blocker());
        if format != OutputFormat::Auto {
            print_structured(&results, format)?;
        } else {
            print_header(&project.id, stage);
            for result in &results {
                print_gate_result(result);
            }
            print_verdict(allowed, results.is_empty());
        }
        return blocked_error(allowed, stage);
    }

    let decision = orchestrator.can_advance(&project, stage).into_diagnostic()?;
    if format != OutputFormat::Auto {
        print_structured(&decision, format)?;
    } else {
        print_decision(&decision, global.quiet);
    }
    blocked_error(decision.allowed, stage)
}

fn blocked_error(allowed: bool, stage: Stage) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(miette::miette!("Stage '{}' is blocked", stage))
    }
}

/// Human rendering of a full decision, shared with `advance`
pub(crate) fn print_decision(decision: &AdvanceDecision, quiet: bool) {
    print_header(&decision.project_id, decision.stage);
    for result in &decision.results {
        print_gate_result(result);
    }
    if !quiet {
        for effect in &decision.effects {
            print_effect(effect);
        }
    }
    print_verdict(decision.allowed, decision.results.is_empty());
}

fn print_header(project_id: &str, stage: Stage) {
    println!(
        "{} {}  {} {}",
        style("Project").bold(),
        style(project_id).cyan(),
        style("stage").bold(),
        style(stage).cyan()
    );
    println!("{}", "─".repeat(60));
}

pub(crate) fn print_gate_result(result: &GateEvaluationResult) {
    let marker = if result.passed {
        style("✓").green()
    } else if result.is_blocking {
        style("✗").red()
    } else {
        style("!").yellow()
    };
    let advisory = if result.is_blocking { "" } else { " (advisory)" };

    println!(
        "{} {} {}{}  {}/{} ({}%)",
        marker,
        style(&result.gate_key).bold(),
        result.gate_name,
        style(advisory).dim(),
        result.passed_count(),
        result.total_count(),
        result.progress_percentage()
    );
    if result.has_errors() {
        println!(
            "    {} gate has misconfigured requirements or broken checks",
            style("!").yellow()
        );
    }

    for failure in result.failures() {
        let tag = match failure.tag {
            ResultTag::ConfigurationError | ResultTag::EvaluationError => {
                format!(" [{}]", failure.tag)
            }
            _ => String::new(),
        };
        println!("    {} {}{}", style("✗").red(), failure.message(), style(tag).yellow());
        if let Some(detail) = &failure.detail {
            println!("      {}", style(detail).dim());
        }
        if let Some(help) = &failure.requirement.help_text {
            println!("      {}", style(help).dim());
        }
        if let Some(action) = failure.requirement.action() {
            println!(
                "      {} {} ({})",
                style("→").cyan(),
                action.label,
                style(action.route).dim()
            );
        }
    }
}

fn print_effect(effect: &FirstPass) {
    for kind in &effect.locks {
        println!(
            "{} {} lock applied by {}",
            style("🔒").yellow(),
            style(kind).yellow(),
            effect.gate_key
        );
    }
    for task in &effect.tasks {
        println!(
            "{} Created task {} ({})",
            style("✓").green(),
            style(&task.title).cyan(),
            effect.gate_key
        );
    }
}

fn print_verdict(allowed: bool, no_gates: bool) {
    println!();
    if no_gates {
        println!("{} No active gates for this stage", style("✓").green());
    } else if allowed {
        println!("{} All blocking gates passed", style("✓").green().bold());
    } else {
        println!("{} Blocked", style("✗").red().bold());
    }
}
