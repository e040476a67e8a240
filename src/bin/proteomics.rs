use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use proteomics_pipeline::config::{ClientConfig, ConfigLoader};
use proteomics_pipeline::domain::DatasetAccession;
use proteomics_pipeline::downloader::DatasetDownloader;
use proteomics_pipeline::error::PipelineError;
use proteomics_pipeline::output::{JsonOutput, TerminalProgress};
use proteomics_pipeline::parser::{self, MetadataMap, ParsedTable};
use proteomics_pipeline::pride::PrideClient;

#[derive(Parser)]
#[command(name = "proteomics")]
#[command(about = "Fetch and parse proteomics datasets from the PRIDE Archive")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    no_cache: bool,

    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Show dataset metadata")]
    Metadata { accession: String },
    #[command(about = "Search datasets by keyword")]
    Search(SearchArgs),
    #[command(about = "List the files published for a dataset")]
    Files { accession: String },
    #[command(about = "Download a single file over HTTP(S) or FTP")]
    Download(DownloadArgs),
    #[command(about = "Download the files of a dataset")]
    Fetch(FetchArgs),
    #[command(about = "Parse an mzTab, CSV or TSV file")]
    Parse(ParseArgs),
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    #[arg(long, default_value_t = 10)]
    page_size: usize,
}

#[derive(Args)]
struct DownloadArgs {
    url: String,
    destination: PathBuf,

    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Args)]
struct FetchArgs {
    accession: String,

    #[arg(long, num_args = 1..)]
    file_types: Vec<String>,

    #[arg(long)]
    output_dir: Option<String>,
}

#[derive(Args)]
struct ParseArgs {
    path: PathBuf,

    #[arg(long)]
    metadata: bool,
}

#[derive(Serialize)]
struct ParseOutput {
    path: String,
    rows: usize,
    table: ParsedTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<MetadataMap>,
}

#[derive(Serialize)]
struct DownloadOutput {
    url: String,
    destination: String,
    bytes: u64,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PipelineError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PipelineError) -> u8 {
    match error {
        PipelineError::NotFound(_) => 2,
        PipelineError::RequestFailed { .. }
        | PipelineError::Status { .. }
        | PipelineError::Ftp(_)
        | PipelineError::ResponseShape(_) => 3,
        PipelineError::UnsupportedFormat(_)
        | PipelineError::NotImplemented(_)
        | PipelineError::Parse { .. }
        | PipelineError::InvalidTable(_)
        | PipelineError::InvalidAccession(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.log_level {
        Some(level) => EnvFilter::new(level.directive()),
        None => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if cli.no_cache {
        config.cache_enabled = false;
    }

    match cli.command {
        Command::Metadata { accession } => {
            let accession: DatasetAccession = accession.parse()?;
            let client = build_client(&config)?;
            let metadata = client.get_dataset_metadata(&accession)?;
            JsonOutput::print(&metadata).into_diagnostic()
        }
        Command::Search(args) => {
            let client = build_client(&config)?;
            let results = client.search_datasets(&args.query, args.page_size)?;
            JsonOutput::print(&results).into_diagnostic()
        }
        Command::Files { accession } => {
            let accession: DatasetAccession = accession.parse()?;
            let client = build_client(&config)?;
            let files = client.get_dataset_files(&accession)?;
            JsonOutput::print(&files).into_diagnostic()
        }
        Command::Download(args) => {
            let client = build_client(&config)?;
            let chunk_size = args.chunk_size.unwrap_or(config.chunk_size).max(1);
            let progress = TerminalProgress::new();
            let bytes = client.download_file(&args.url, &args.destination, chunk_size, &progress)?;
            JsonOutput::print(&DownloadOutput {
                url: args.url,
                destination: args.destination.display().to_string(),
                bytes,
            })
            .into_diagnostic()
        }
        Command::Fetch(args) => {
            let accession: DatasetAccession = args.accession.parse()?;
            if let Some(output_dir) = args.output_dir {
                config.output_dir = output_dir.into();
            }
            let client = build_client(&config)?;
            let downloader =
                DatasetDownloader::new(&client, config.output_dir.clone(), config.chunk_size);
            let progress = TerminalProgress::new();
            let summary = downloader.download_dataset(&accession, &args.file_types, &progress)?;
            JsonOutput::print(&summary).into_diagnostic()
        }
        Command::Parse(args) => {
            let table = parser::parse(&args.path)?;
            let metadata = if args.metadata {
                Some(parser::mztab_metadata(&args.path)?)
            } else {
                None
            };
            JsonOutput::print(&ParseOutput {
                path: args.path.display().to_string(),
                rows: table.len(),
                table,
                metadata,
            })
            .into_diagnostic()
        }
    }
}

fn build_client(config: &ClientConfig) -> Result<PrideClient, PipelineError> {
    let span = tracing::info_span!("pride", base_url = %config.base_url);
    Ok(PrideClient::from_config(config)?.with_span(span))
}
