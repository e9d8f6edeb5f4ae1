//! `stagegate gate` command - Inspect configured gates

use clap::Subcommand;
use console::style;
use miette::Result;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{print_structured, truncate_str, Engine};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::{Gate, GateRequirement, RequirementKind, Stage};

#[derive(Subcommand, Debug)]
pub enum GateCommands {
    /// List gates in pipeline order
    List(ListArgs),

    /// Show a gate with its requirements and task templates
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only gates of this stage
    #[arg(long, short = 's')]
    pub stage: Option<Stage>,

    /// Include inactive gates
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Gate key (e.g. design_lock)
    pub key: String,
}

pub fn run(cmd: GateCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        GateCommands::List(args) => run_list(args, global),
        GateCommands::Show(args) => run_show(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;

    let gates: Vec<&Gate> = engine
        .catalog
        .gates()
        .iter()
        .filter(|g| args.all || g.is_active)
        .filter(|g| args.stage.map_or(true, |s| g.stage == s))
        .collect();

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(&gates, format);
    }

    if gates.is_empty() {
        if !global.quiet {
            println!("No gates found.");
        }
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["KEY", "STAGE", "SEQ", "NAME", "BLOCKING", "LOCKS", "REQS", "TASKS"]);
    for gate in &gates {
        let locks: Vec<String> = gate.lock_kinds().iter().map(|k| k.to_string()).collect();
        builder.push_record([
            gate.key.clone(),
            gate.stage.to_string(),
            gate.sequence.to_string(),
            truncate_str(&gate.name, 28),
            if gate.is_blocking { "yes" } else { "no" }.to_string(),
            if locks.is_empty() { "-".to_string() } else { locks.join(",") },
            gate.active_requirements().len().to_string(),
            if gate.creates_tasks_on_pass {
                gate.task_templates.len().to_string()
            } else {
                "-".to_string()
            },
        ]);
    }
    println!("{}", builder.build().with(Style::markdown()));

    if !global.quiet {
        println!();
        println!("{} gate(s) found", style(gates.len()).cyan());
    }
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let gate = engine
        .catalog
        .get(&args.key)
        .ok_or_else(|| miette::miette!("Gate not found: {}", args.key))?;

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(gate, format);
    }

    println!("{}", style(&gate.name).bold());
    println!("{}", "─".repeat(60));
    println!("{}: {}", style("Key").bold(), style(&gate.key).cyan());
    println!("{}: {}", style("Stage").bold(), gate.stage);
    println!("{}: {}", style("Sequence").bold(), gate.sequence);
    println!(
        "{}: {}",
        style("Blocking").bold(),
        if gate.is_blocking { "yes" } else { "no (advisory)" }
    );
    if !gate.is_active {
        println!("{}: {}", style("Active").bold(), style("no").red());
    }
    let locks = gate.lock_kinds();
    if !locks.is_empty() {
        let names: Vec<String> = locks.iter().map(|k| k.to_string()).collect();
        println!("{}: {}", style("Applies locks").bold(), style(names.join(", ")).yellow());
    }
    if !gate.description.is_empty() {
        println!();
        println!("{}", gate.description);
    }

    println!();
    println!("{}", style("Requirements").bold());
    for req in gate.active_requirements() {
        println!(
            "  {}. {}  {}",
            req.sequence,
            style(describe(req)).cyan(),
            req.error_message
        );
        if let Some(help) = &req.help_text {
            println!("     {}", style(help).dim());
        }
    }

    if gate.creates_tasks_on_pass && !gate.task_templates.is_empty() {
        println!();
        println!("{}", style("Tasks created on first pass").bold());
        for template in &gate.task_templates {
            if template.description.is_empty() {
                println!("  - {}", template.title);
            } else {
                println!("  - {}: {}", template.title, style(&template.description).dim());
            }
        }
    }

    Ok(())
}

/// One-line summary of what a requirement tests
fn describe(req: &GateRequirement) -> String {
    let model = req.target_model.as_deref().unwrap_or("Project");
    let field = req.target_field.as_deref().unwrap_or("?");
    let relation = req.target_relation.as_deref().unwrap_or("?");
    let value = req
        .target_value
        .as_ref()
        .map(crate::gates::value::display)
        .unwrap_or_else(|| "?".to_string());

    match req.kind {
        RequirementKind::FieldNotNull => format!("{}.{} is set", model, field),
        RequirementKind::FieldEquals => format!("{}.{} = {}", model, field, value),
        RequirementKind::FieldGreaterThan => format!("{}.{} > {}", model, field, value),
        RequirementKind::RelationExists => format!("has {}", relation),
        RequirementKind::RelationCount => format!(
            "count({}) {} {}",
            relation,
            req.comparison_operator.as_deref().unwrap_or("?"),
            value
        ),
        RequirementKind::AllChildrenPass => {
            format!("every {}.{} = {}", relation, field, value)
        }
        RequirementKind::CustomCheck => format!(
            "check {}",
            req.custom_check_identifier.as_deref().unwrap_or("?")
        ),
        RequirementKind::DocumentUploaded => format!("document '{}' uploaded", value),
        RequirementKind::PaymentReceived => format!("{} payment received", value),
        RequirementKind::TaskCompleted => format!("task '{}' done", value),
        RequirementKind::AllCncComplete => "all CNC programs complete".to_string(),
    }
}
