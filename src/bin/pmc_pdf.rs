use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pmc_pdf_fetcher::app::{App, LogSink, ProgressSink, SilentSink};
use pmc_pdf_fetcher::config::{ConfigLoader, Overrides};
use pmc_pdf_fetcher::error::PmcError;
use pmc_pdf_fetcher::fetcher::{FetchOutcome, HttpFetcher};
use pmc_pdf_fetcher::file_list::PathTable;
use pmc_pdf_fetcher::output::{JsonOutput, OutputMode, print_run_summary};

#[derive(Parser)]
#[command(name = "pmc-pdf")]
#[command(about = "Download the PDFs of PubMed Central open-access articles matching a search")]
#[command(version, author)]
struct Cli {
    /// Print machine-readable JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    options: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Search, download and unpack (default)")]
    Run,
    #[command(about = "Run the search only and print the ids")]
    Search,
    #[command(about = "Download the OA file list used to resolve package paths")]
    FileList,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// JSON config file (defaults to ./pmc-pdf.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    term: Option<String>,

    #[arg(long, global = true)]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    max_results: Option<u32>,

    /// Name of the saved search response inside the output directory
    #[arg(long, global = true)]
    result_file: Option<String>,

    /// OA file list CSV with `Accession ID` and `File` columns
    #[arg(long, global = true)]
    file_list: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<PmcError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PmcError) -> u8 {
    match error {
        PmcError::InvalidQuery(_)
        | PmcError::ConfigRead(_)
        | PmcError::ConfigParse(_)
        | PmcError::MissingColumn(_)
        | PmcError::Csv(_) => 2,
        PmcError::Http(_) | PmcError::HttpStatus { .. } | PmcError::SearchResultMissing(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &SilentSink,
        OutputMode::Human => &LogSink,
    };

    let config = ConfigLoader::resolve(cli.options.config.as_deref(), overrides(&cli.options))?;
    let fetcher = HttpFetcher::from_config(&config)?;
    let app = App::new(config, fetcher);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let table = PathTable::load(app.config().file_list.as_std_path())?;
            tracing::info!(
                rows = table.len(),
                "loaded file list {}",
                app.config().file_list
            );
            let report = app.run(&table, sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&report).into_diagnostic()?,
                OutputMode::Human => print_run_summary(&report),
            }
            Ok(())
        }
        Commands::Search => {
            let ids = app.search(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_ids(&ids).into_diagnostic()?,
                OutputMode::Human => ids.iter().for_each(|id| println!("{id}")),
            }
            Ok(())
        }
        Commands::FileList => {
            let outcome = app.download_file_list(sink)?;
            if let OutputMode::Json = output_mode {
                JsonOutput::print_fetch(&outcome).into_diagnostic()?;
            }
            match outcome {
                FetchOutcome::Saved { .. } => Ok(()),
                FetchOutcome::Rejected { status } => Err(PmcError::HttpStatus {
                    status,
                    message: format!("file list download from {}", app.config().file_list_url()),
                }
                .into()),
            }
        }
    }
}

fn overrides(args: &RunArgs) -> Overrides {
    Overrides {
        search_term: args.term.clone(),
        output_dir: args.output_dir.clone(),
        result_cap: args.max_results,
        result_file_name: args.result_file.clone(),
        file_list: args.file_list.clone(),
    }
}
