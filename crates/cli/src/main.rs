mod commands;

use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vite-ssg")]
#[command(version, about = "Pre-render Vite applications into static bundles", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Serve the generation API (POST /api/ssg)
    Serve {
        /// Path to vite-ssg.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a static bundle for one repository
    Run {
        /// Git URL of the Vite project
        repo_url: String,

        /// Route to pre-render; repeatable (default: /)
        #[arg(short, long = "route")]
        routes: Vec<String>,

        /// Path to vite-ssg.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve { config, port } => commands::serve::run(config, port).await,
        Command::Run {
            repo_url,
            routes,
            config,
        } => commands::run::run(repo_url, routes, config).await,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "vite-ssg", &mut io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}
