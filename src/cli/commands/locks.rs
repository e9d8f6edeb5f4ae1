//! `stagegate locks`, `unlock` and `relock` commands - Lock flags and overrides

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{print_structured, Engine};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{LockAuditRecord, LockRecord};
use crate::entities::LockKind;
use crate::gates::{LockFlags, LockOverride, LockRegistry};

#[derive(clap::Args, Debug)]
pub struct LocksArgs {
    /// Project id
    #[arg(value_name = "PROJECT")]
    pub project_id: String,
}

#[derive(clap::Args, Debug)]
pub struct UnlockArgs {
    /// Project id
    #[arg(value_name = "PROJECT")]
    pub project_id: String,

    /// Lock to release (design, procurement, production)
    pub kind: LockKind,

    /// Why the lock is being lifted
    #[arg(long, short = 'r')]
    pub reason: String,

    /// Change order reference
    #[arg(long)]
    pub change_order: Option<String>,

    /// Who is releasing the lock (default: config actor)
    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct RelockArgs {
    /// Project id
    #[arg(value_name = "PROJECT")]
    pub project_id: String,

    /// Lock to re-apply (design, procurement, production)
    pub kind: LockKind,

    /// Who is re-applying the lock (default: config actor)
    #[arg(long)]
    pub actor: Option<String>,
}

#[derive(Serialize)]
struct LockReport {
    project_id: String,
    flags: LockFlags,
    locks: Vec<LockRecord>,
    audit: Vec<LockAuditRecord>,
}

pub fn run(args: LocksArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let registry = LockRegistry::new(&engine.store);

    let report = LockReport {
        flags: registry.flags(&args.project_id).into_diagnostic()?,
        locks: registry.locks(&args.project_id).into_diagnostic()?,
        audit: registry.audit_trail(&args.project_id).into_diagnostic()?,
        project_id: args.project_id,
    };

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(&report, format);
    }

    println!(
        "{} {}",
        style("Locks for").bold(),
        style(&report.project_id).cyan()
    );
    for kind in LockKind::all() {
        let held = report.locks.iter().find(|l| l.kind == *kind);
        match held {
            Some(lock) => println!(
                "  {} {:<12} by {} at {}",
                style("🔒").yellow(),
                style(kind).yellow(),
                lock.gate_key,
                lock.locked_at.format("%Y-%m-%d %H:%M")
            ),
            None => println!("  {} {:<12}", style("·").dim(), style(kind).dim()),
        }
    }

    if !report.audit.is_empty() {
        println!();
        println!("{}", style("Audit trail").bold());
        let mut builder = Builder::default();
        builder.push_record(["WHEN", "ACTION", "LOCK", "ACTOR", "CHANGE ORDER", "REASON"]);
        for entry in &report.audit {
            builder.push_record([
                entry.at.format("%Y-%m-%d %H:%M").to_string(),
                entry.action.as_str().to_string(),
                entry.kind.to_string(),
                entry.actor.clone(),
                entry.change_order.clone().unwrap_or_default(),
                entry.reason.clone().unwrap_or_default(),
            ]);
        }
        println!("{}", builder.build().with(Style::markdown()));
    }

    Ok(())
}

pub fn run_unlock(args: UnlockArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let registry = LockRegistry::new(&engine.store);

    let by = LockOverride {
        actor: args.actor.unwrap_or_else(|| engine.config.actor()),
        reason: args.reason,
        change_order: args.change_order,
    };
    let audit = registry
        .release(&args.project_id, args.kind, by)
        .into_diagnostic()?;

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(&audit, format);
    }
    println!(
        "{} Released {} lock on {} ({})",
        style("✓").green(),
        style(audit.kind).yellow(),
        style(&audit.project_id).cyan(),
        style(&audit.id).dim()
    );
    Ok(())
}

pub fn run_relock(args: RelockArgs, global: &GlobalOpts) -> Result<()> {
    let engine = Engine::open(global)?;
    let registry = LockRegistry::new(&engine.store);

    let actor = args.actor.unwrap_or_else(|| engine.config.actor());
    let audit = registry
        .relock(&args.project_id, args.kind, &actor)
        .into_diagnostic()?;

    let format = engine.format(global);
    if format != OutputFormat::Auto {
        return print_structured(&audit, format);
    }
    println!(
        "{} Re-applied {} lock on {}",
        style("✓").green(),
        style(audit.kind).yellow(),
        style(&audit.project_id).cyan()
    );
    Ok(())
}
