use ballot_insights::config::{self, AppConfig};
use ballot_insights::error::AppError;
use ballot_insights::telemetry;
use ballot_insights::workflows::ballots::{
    BallotPipeline, CsvExportSource, HttpPageSource, DEFAULT_PREVIEW_ROWS,
};
use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "ballot-insights",
    about = "Fetch mail-in ballot applications and print age, party, district and latency statistics",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the dataset and print the full report (default command)
    Report(ReportArgs),
}

#[derive(Args, Debug, Default)]
struct ReportArgs {
    /// Override the configured CSV resource URL
    #[arg(long)]
    source_url: Option<String>,
    /// Override the configured number of rows requested per page
    #[arg(long, value_parser = parse_page_size)]
    page_size: Option<NonZeroUsize>,
    /// Per-request timeout in seconds
    #[arg(long, value_parser = parse_timeout)]
    timeout_secs: Option<Duration>,
    /// Analyze a local CSV export instead of the remote resource
    #[arg(long)]
    from_csv: Option<PathBuf>,
    /// Number of rows shown in the table preview
    #[arg(long, default_value_t = DEFAULT_PREVIEW_ROWS)]
    preview_rows: usize,
}

fn main() {
    if let Err(err) = run_cli() {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| {
        Command::Report(ReportArgs {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            ..ReportArgs::default()
        })
    });

    match command {
        Command::Report(args) => run_report(args),
    }
}

fn parse_page_size(raw: &str) -> Result<NonZeroUsize, String> {
    config::parse_page_size(raw).map_err(|err| err.to_string())
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    config::parse_timeout(raw).map_err(|err| err.to_string())
}

fn run_report(mut args: ReportArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(url) = args.source_url.take() {
        config.source.base_url = url;
    }
    if let Some(page_size) = args.page_size {
        config.source.page_size = page_size;
    }
    if let Some(timeout) = args.timeout_secs {
        config.source.timeout = Some(timeout);
    }

    telemetry::init(&config.telemetry)?;

    let pipeline =
        BallotPipeline::new(config.source.page_size).with_preview_rows(args.preview_rows);

    let analysis = match args.from_csv {
        Some(path) => {
            info!(?config.environment, path = %path.display(), "analyzing local CSV export");
            let source = CsvExportSource::from_path(&path)?;
            pipeline.run(&source)?
        }
        None => {
            info!(
                ?config.environment,
                url = %config.source.base_url,
                page_size = config.source.page_size.get(),
                "retrieving ballot applications"
            );
            let source = HttpPageSource::new(&config.source)?;
            pipeline.run(&source)?
        }
    };

    print!("{analysis}");
    Ok(())
}
