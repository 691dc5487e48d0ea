//! invkit - command-line tools for the cloud asset Inventory API

use clap::{CommandFactory, Parser};

mod cli;
mod client;
mod codify;
mod config;
mod error;
mod governance;
mod output;
mod snapshot;
mod workspace;

use cli::{Cli, Commands, GlobalOptions, WorkspacesCommands};
use error::{Error, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    let outcome = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    };

    if let Err(err) = outcome {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match &cli.command {
        Commands::Snapshots(args) => cli::snapshots::run(&opts, args).await,
        Commands::List(args) => cli::list::run(&opts, args).await,
        Commands::Codify(args) => cli::codify::run(&opts, args).await,
        Commands::Workspaces(cmd) => match cmd {
            WorkspacesCommands::Map(args) => cli::workspaces::map(&opts, args).await,
            WorkspacesCommands::Create(args) => cli::workspaces::create(&opts, args).await,
        },
        Commands::Prices {
            pricing_file,
            format,
        } => cli::prices::run(pricing_file.as_deref(), *format),
        Commands::Completion { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "invkit",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
