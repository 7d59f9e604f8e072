use crate::commands::{run_export, run_forms_import, run_forms_list, ExportArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use leadflow::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "leadflow",
    about = "Capture loan leads, manage them from the admin API and export them",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write the stored leads to a CSV or XLSX file
    Export(ExportArgs),
    /// Inspect or seed the form catalog
    Forms {
        #[command(subcommand)]
        command: FormsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum FormsCommand {
    /// Print every form with its slug, state and field count
    List,
    /// Upsert form definitions from a JSON file, matched by slug
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Export(args) => run_export(args),
        Command::Forms {
            command: FormsCommand::List,
        } => run_forms_list(),
        Command::Forms {
            command: FormsCommand::Import(args),
        } => run_forms_import(args),
    }
}
