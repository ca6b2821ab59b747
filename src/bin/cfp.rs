use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use campaign_finance_puller::app::{App, LogSink, ProgressSink, PullSettings};
use campaign_finance_puller::client::{AttributedRows, FinanceClient, OpenSecretsHttpClient};
use campaign_finance_puller::config::{ConfigLoader, ResolvedConfig};
use campaign_finance_puller::domain::{Cid, Cycle, DatasetKind, ResourceKind, StateCode};
use campaign_finance_puller::error::PullError;
use campaign_finance_puller::output::{HumanOutput, JsonOutput, OutputMode};
use campaign_finance_puller::store::DataLayout;
use campaign_finance_puller::table::Record;

#[derive(Parser)]
#[command(name = "cfp")]
#[command(about = "Resumable OpenSecrets campaign-finance puller")]
#[command(version)]
struct Cli {
    /// Path to campaign-finance.json
    #[arg(long, global = true)]
    config: Option<String>,

    /// Overrides the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<Utf8PathBuf>,

    /// Overrides the configured election cycle
    #[arg(long, global = true)]
    cycle: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Capture legislator rosters for every state")]
    Rosters {
        /// Re-capture states whose roster file already exists
        #[arg(long)]
        force: bool,
    },
    #[command(about = "Pull one resource type for every rostered candidate")]
    Pull { resource: ResourceKind },
    #[command(about = "Merge per-candidate files into ALL_CANDIDATES.csv")]
    Consolidate { dataset: DatasetKind },
    #[command(about = "Build the candidate to state map from consolidated summaries")]
    StateMap,
    #[command(about = "Sum consolidated sector totals per state")]
    Rollup,
    #[command(about = "Show per-dataset file counts")]
    Status,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PullError>() {
            if let PullError::RunAborted { failures, .. } = err {
                if !failures.is_empty() {
                    eprintln!("Soft failures before the abort: {}", failures.join(", "));
                }
            }
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PullError) -> u8 {
    match error {
        PullError::MissingDirectory(_)
        | PullError::MissingApiKey
        | PullError::ConfigRead(_)
        | PullError::NothingToConsolidate(_) => 2,
        PullError::RateLimit(_)
        | PullError::Http(_)
        | PullError::ClientStatus { .. } => 3,
        PullError::RunAborted { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(cycle) = cli.cycle.as_deref() {
        config.cycle = cycle.parse::<Cycle>()?;
    }
    let layout = DataLayout::new(config.data_dir.clone());
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogSink,
    };

    match cli.command {
        Commands::Rosters { force } => {
            let app = online_app(&config, layout)?;
            let report = app.capture_rosters(force, sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_capture(&report),
            }
        }
        Commands::Pull { resource } => {
            let app = online_app(&config, layout)?;
            let report = app.pull(resource, sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&report).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_pull(&report),
            }
        }
        Commands::Consolidate { dataset } => {
            let app = offline_app(&config, layout);
            let result = app.consolidate(dataset, sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_consolidate(&result),
            }
        }
        Commands::StateMap => {
            let app = offline_app(&config, layout);
            let result = app.state_map(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_state_map(&result),
            }
        }
        Commands::Rollup => {
            let app = offline_app(&config, layout);
            let result = app.rollup(sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&result).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_rollup(&result),
            }
        }
        Commands::Status => {
            let app = offline_app(&config, layout);
            let entries = app.status()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&entries).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_status(&entries),
            }
        }
    }
    Ok(())
}

fn online_app(
    config: &ResolvedConfig,
    layout: DataLayout,
) -> miette::Result<App<OpenSecretsHttpClient>> {
    let api_key = config.require_api_key()?;
    let client = OpenSecretsHttpClient::new(&config.base_url, api_key)?;
    Ok(App::new(layout, client, PullSettings::from(config)))
}

fn offline_app(config: &ResolvedConfig, layout: DataLayout) -> App<NopClient> {
    App::new(layout, NopClient, PullSettings::from(config))
}

struct NopClient;

impl FinanceClient for NopClient {
    fn legislators_for_state(&self, _state: &StateCode) -> Result<Vec<Record>, PullError> {
        Err(PullError::Http("OpenSecrets client not configured".to_string()))
    }

    fn summary(&self, _cid: &Cid, _cycle: Option<Cycle>) -> Result<Record, PullError> {
        Err(PullError::Http("OpenSecrets client not configured".to_string()))
    }

    fn contributors(
        &self,
        _cid: &Cid,
        _cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        Err(PullError::Http("OpenSecrets client not configured".to_string()))
    }

    fn top_industries(
        &self,
        _cid: &Cid,
        _cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        Err(PullError::Http("OpenSecrets client not configured".to_string()))
    }

    fn sector_totals(
        &self,
        _cid: &Cid,
        _cycle: Option<Cycle>,
    ) -> Result<AttributedRows, PullError> {
        Err(PullError::Http("OpenSecrets client not configured".to_string()))
    }
}
