use clap::Parser;
use miette::Result;
use stagegate::cli::{commands, Cli, Commands, GlobalOpts};
use stagegate::core::{Config, Workspace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    let global = cli.global;
    init_tracing(&global);

    match cli.command {
        Commands::Init(args) => commands::init::run(args),
        Commands::Gate(cmd) => commands::gate::run(cmd, &global),
        Commands::Check(args) => commands::check::run(args, &global),
        Commands::Advance(args) => commands::advance::run(args, &global),
        Commands::Locks(args) => commands::locks::run(args, &global),
        Commands::Unlock(args) => commands::locks::run_unlock(args, &global),
        Commands::Relock(args) => commands::locks::run_relock(args, &global),
        Commands::Tasks(args) => commands::tasks::run(args, &global),
        Commands::Validate(args) => commands::validate::run(args, &global),
    }
}

/// Log events go to stderr so structured output on stdout stays parseable
fn init_tracing(global: &GlobalOpts) {
    let filter = if global.verbose {
        "debug".to_string()
    } else {
        let workspace = Workspace::open(global.project.as_deref()).ok();
        Config::load(workspace.as_ref()).log_filter()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}
