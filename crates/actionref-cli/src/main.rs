mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "actionref",
    about = "Inspect and lint action references in CI workflows",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .github/ or .git/)
    #[arg(long, global = true, env = "ACTIONREF_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log downloads and status lookups
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a `uses:` value and show what it refers to
    Parse { uses: String },

    /// Look up the status of one or more action references
    Status {
        #[arg(required = true)]
        uses: Vec<String>,
    },

    /// List the inputs declared by an action
    Inputs { uses: String },

    /// Lint the action references in workflow files
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show or validate .github/actionref.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Parse { uses } => cmd::parse::run(&root, &uses, cli.json),
        Commands::Status { uses } => cmd::status::run(&root, &uses, cli.json),
        Commands::Inputs { uses } => cmd::inputs::run(&root, &uses, cli.json),
        Commands::Check { files } => cmd::check::run(&root, &files, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
