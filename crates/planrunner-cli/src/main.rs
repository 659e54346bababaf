mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, locks::LocksSubcommand, plans::PlansSubcommand,
    status::StatusSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "planrunner",
    about = "Inspect planrunner locks, pull status and pending plans",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .planrunner/ or .git/)
    #[arg(long, global = true, env = "PLANRUNNER_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default config and create the data directory
    Init,

    /// Show or validate the config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// List and release project locks
    Locks {
        #[command(subcommand)]
        subcommand: LocksSubcommand,
    },

    /// Show the recorded status of a pull request
    Status {
        #[command(subcommand)]
        subcommand: StatusSubcommand,
    },

    /// List and delete pending plan files of a pull request
    Plans {
        #[command(subcommand)]
        subcommand: PlansSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Locks { subcommand } => cmd::locks::run(&root, subcommand, cli.json),
        Commands::Status { subcommand } => cmd::status::run(&root, subcommand, cli.json),
        Commands::Plans { subcommand } => cmd::plans::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
