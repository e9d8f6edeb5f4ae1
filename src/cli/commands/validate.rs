//! `stagegate validate` command - Validate gate files and project files

use console::style;
use miette::Result;
use std::fs;
use std::path::Path;

use crate::cli::helpers::open_workspace;
use crate::cli::GlobalOpts;
use crate::core::loader::yaml_files;
use crate::entities::{Gate, ProjectAggregate};
use crate::gates::{CustomCheckRegistry, GateCatalog};

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Only validate gate files
    #[arg(long, conflicts_with = "projects_only")]
    pub gates_only: bool,

    /// Only validate project files
    #[arg(long)]
    pub projects_only: bool,

    /// Show summary only, don't show individual results
    #[arg(long)]
    pub summary: bool,
}

/// Validation statistics
#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_warnings: usize,
}

impl ValidationStats {
    fn pass(&mut self) {
        self.files_checked += 1;
        self.files_passed += 1;
    }

    fn fail(&mut self) {
        self.files_checked += 1;
        self.files_failed += 1;
    }
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let workspace = open_workspace(global)?;
    let checks = CustomCheckRegistry::with_builtin_checks();
    let show = !args.summary && !global.quiet;

    let mut stats = ValidationStats::default();
    let mut catalog_error = None;

    if !args.projects_only {
        let gates = validate_gate_files(&workspace.gates_dir(), &checks, &mut stats, show);
        // Cross-file rules (unique keys, unique sequence per stage)
        if stats.files_failed == 0 && !gates.is_empty() {
            if let Err(e) = GateCatalog::from_gates(gates, &checks) {
                catalog_error = Some(e.to_string());
            }
        }
    }

    if !args.gates_only {
        validate_project_files(&workspace.projects_dir(), &mut stats, show);
    }

    if let Some(err) = &catalog_error {
        println!("{} gate catalog - {}", style("✗").red(), err);
    }

    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    if stats.total_warnings > 0 {
        println!("  Total warnings: {}", style(stats.total_warnings).yellow());
    }
    println!();

    if let Some(err) = catalog_error {
        return Err(miette::miette!("Validation failed: {}", err));
    }
    match stats.files_failed {
        0 => {
            println!("{} All files passed validation!", style("✓").green().bold());
            Ok(())
        }
        1 => Err(miette::miette!("Validation failed: 1 file has errors")),
        n => Err(miette::miette!("Validation failed: {} files have errors", n)),
    }
}

/// Parse and check each gate file on its own; returns the gates that parsed
fn validate_gate_files(
    dir: &Path,
    checks: &CustomCheckRegistry,
    stats: &mut ValidationStats,
    show: bool,
) -> Vec<Gate> {
    let mut gates = Vec::new();

    for path in yaml_files(dir) {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_yml::from_str::<Gate>(&content).map_err(|e| e.to_string()));

        let gate = match parsed {
            Ok(gate) => gate,
            Err(e) => {
                stats.fail();
                println!("{} {} - {}", style("✗").red(), path.display(), e);
                continue;
            }
        };

        match GateCatalog::from_gates(vec![gate.clone()], checks) {
            Ok(_) => {
                stats.pass();
                if show {
                    println!("{} {}", style("✓").green(), path.display());
                }
                gates.push(gate);
            }
            Err(e) => {
                stats.fail();
                println!("{} {} - {}", style("✗").red(), path.display(), e);
            }
        }
    }

    gates
}

fn validate_project_files(dir: &Path, stats: &mut ValidationStats, show: bool) {
    for path in yaml_files(dir) {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_yml::from_str::<ProjectAggregate>(&content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(project) if !project.is_addressable() => {
                stats.fail();
                println!("{} {} - project has no id", style("✗").red(), path.display());
            }
            Ok(project) => {
                stats.pass();
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
                if stem != project.id {
                    stats.total_warnings += 1;
                    if show {
                        println!(
                            "{} {} - file name does not match project id '{}'",
                            style("!").yellow(),
                            path.display(),
                            project.id
                        );
                    }
                } else if show {
                    println!("{} {}", style("✓").green(), path.display());
                }
            }
            Err(e) => {
                stats.fail();
                println!("{} {} - {}", style("✗").red(), path.display(), e);
            }
        }
    }
}
