mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, project::ProjectSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "backlog",
    about = "Manage backlog projects stored locally or in a cloud document store",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .backlog/)
    #[arg(long, global = true, env = "BACKLOG_ROOT")]
    root: Option<PathBuf>,

    /// Signed-in user; selects the cloud store when one is configured
    #[arg(long, global = true, env = "BACKLOG_USER")]
    user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .backlog/ and a default config
    Init {
        /// Local backend: file, redb, or memory
        #[arg(long, default_value = "file")]
        backend: String,
        /// Enable the cloud store for this Firestore project id
        #[arg(long)]
        cloud_project: Option<String>,
    },

    /// Create, inspect, and modify projects
    Project {
        #[command(subcommand)]
        subcommand: ProjectSubcommand,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
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
    let user = backlog_core::UserId::parse(cli.user.as_deref());

    let result = match cli.command {
        Commands::Init {
            backend,
            cloud_project,
        } => cmd::init::run(&root, &backend, cloud_project.as_deref()),
        Commands::Project { subcommand } => {
            cmd::project::run(&root, subcommand, user.as_ref(), cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
