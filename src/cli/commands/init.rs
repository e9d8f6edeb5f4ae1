//! `stagegate init` command - Initialize a new workspace

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::core::workspace::{Workspace, WorkspaceError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Reinitialize even if .stagegate/ already exists (rewrites default gate files)
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let workspace = if args.force {
        Workspace::init_force(&path)
    } else {
        Workspace::init(&path)
    };

    match workspace {
        Ok(workspace) => {
            println!(
                "{} Initialized stagegate workspace at {}",
                style("✓").green(),
                style(workspace.root().display()).cyan()
            );
            println!();
            println!("Created workspace structure:");
            print_structure(workspace.root());
            println!();
            println!("Next steps:");
            println!(
                "  {} Add a project aggregate",
                style("projects/<id>.yaml").yellow()
            );
            println!(
                "  {} Review the gate set",
                style("stagegate gate list").yellow()
            );
            println!(
                "  {} Evaluate a project",
                style("stagegate check <id>").yellow()
            );
            Ok(())
        }
        Err(WorkspaceError::AlreadyExists(path)) => {
            println!(
                "{} stagegate workspace already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("stagegate init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        ".stagegate/",
        ".stagegate/config.yaml",
        "gates/",
        "projects/",
    ];

    for entry in entries {
        if root.join(entry).exists() {
            println!("  {}", style(entry).dim());
        }
    }

    let gates = crate::core::loader::yaml_files(&root.join("gates"));
    for gate in gates {
        if let Some(name) = gate.file_name().and_then(|n| n.to_str()) {
            println!("    {}", style(name).dim());
        }
    }
}
