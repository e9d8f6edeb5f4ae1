//! `stagegate tasks` command - Tasks generated by passed gates

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_short_id, print_structured, truncate_str, Engine};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::gates::TaskTemplateExpander;

#[derive(clap::Args, Debug)]
pub struct TasksArgs {
    /// Project id
    #[arg(value_name = "PROJECT")]
    pub project_id: String,

    /// Only tasks created by this gate
    #[arg(long, short = 'g')]
    pub gate: Option<String>,
}

pub fn run(args: TasksArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let mut tasks = TaskTemplateExpander::new(&engine.store)
        .tasks_for(&args.project_id)
        .into_diagnostic()?;
    if let Some(gate) = &args.gate {
        tasks.retain(|t| &t.gate_key == gate);
    }

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(&tasks, format);
    }

    if tasks.is_empty() {
        if !global.quiet {
            println!("No tasks found.");
        }
        return Ok(());
    }

    let mut builder = Builder::default();
    builder.push_record(["ID", "GATE", "TITLE", "CREATED"]);
    for task in &tasks {
        builder.push_record([
            format_short_id(&task.id),
            task.gate_key.clone(),
            truncate_str(&task.title, 40),
            task.created.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", builder.build().with(Style::markdown()));

    if !global.quiet {
        println!();
        println!("{} task(s) found", style(tasks.len()).cyan());
    }
    Ok(())
}
