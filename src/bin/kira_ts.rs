use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_target_structures::app::{App, RunOptions};
use kira_target_structures::config::{ConfigLoader, ConfigOverrides, LogPolicy, PipelineConfig};
use kira_target_structures::convert::{StructconvertConverter, StructureConverter};
use kira_target_structures::domain::ConvertFormat;
use kira_target_structures::error::KiraError;
use kira_target_structures::http::RetryPolicy;
use kira_target_structures::output::{self, JsonOutput, OutputMode};
use kira_target_structures::progress::{BarProgress, LogProgress};
use kira_target_structures::rcsb::RcsbHttpClient;
use kira_target_structures::sifts::SiftsFlatFileClient;
use kira_target_structures::ttd::{TargetListSource, TtdFileSource, TtdHttpClient};
use kira_target_structures::uniprot::UniprotHttpClient;

#[derive(Parser)]
#[command(name = "kira-ts")]
#[command(
    about = "Best experimental structures for TTD druggable targets, converted to PDB and MAE"
)]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the full pipeline (default)")]
    Run(RunArgs),
    #[command(about = "Print the resolved configuration as JSON")]
    Config(ConfigArgs),
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Read the TTD target list from a local file")]
    source_file: Option<String>,

    #[arg(long)]
    max_resolution: Option<f64>,

    #[arg(long = "method", help = "Allowed experimental method (repeatable)")]
    methods: Vec<String>,

    #[arg(long)]
    raw_dir: Option<String>,

    #[arg(long)]
    pdb_dir: Option<String>,

    #[arg(long)]
    mae_dir: Option<String>,

    #[arg(long, help = "Append to existing CSV logs instead of recreating them")]
    append_logs: bool,

    #[arg(long, help = "Stop after structure selection")]
    dry_run: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InvalidConfig(_)
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_)
        | KiraError::MissingConverterRoot
        | KiraError::MissingTool(_) => 2,
        KiraError::TtdHttp(_) | KiraError::TtdStatus { .. } | KiraError::TtdFile { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    // progress bars own the terminal in interactive mode, so only warnings go through
    let default_level = match output_mode {
        OutputMode::Interactive => "warn",
        OutputMode::NonInteractive => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Run(args)) => run_pipeline(args, output_mode),
        Some(Commands::Config(args)) => {
            let config = ConfigLoader::resolve(args.config.as_deref(), ConfigOverrides::default())?;
            JsonOutput::print_config(&config).into_diagnostic()?;
            Ok(())
        }
        None => run_pipeline(RunArgs::default(), output_mode),
    }
}

fn run_pipeline(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let overrides = ConfigOverrides {
        max_resolution: args.max_resolution,
        experimental_methods: (!args.methods.is_empty()).then(|| args.methods.clone()),
        raw_download_dir: args.raw_dir.map(Utf8PathBuf::from),
        converted_pdb_dir: args.pdb_dir.map(Utf8PathBuf::from),
        converted_mae_dir: args.mae_dir.map(Utf8PathBuf::from),
        target_list_file: args.source_file.map(Utf8PathBuf::from),
        log_policy: args.append_logs.then_some(LogPolicy::Append),
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), overrides)?;
    let options = RunOptions {
        dry_run: args.dry_run,
    };

    if options.dry_run {
        return execute(config, NopConverter, options, output_mode);
    }

    let converter = StructconvertConverter::locate(
        config.schrodinger_root.as_deref(),
        Duration::from_secs(config.converter_timeout_secs),
    )?;
    info!(path = %converter.executable().display(), "using structconvert");
    execute(config, converter, options, output_mode)
}

fn execute<C: StructureConverter>(
    config: PipelineConfig,
    converter: C,
    options: RunOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let retry = RetryPolicy::from_config(&config);
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let targets = match &config.target_list_file {
        Some(path) => TargetListSource::File(TtdFileSource::new(path.clone())),
        None => TargetListSource::Http(TtdHttpClient::new(config.ttd_url.clone(), timeout, retry)?),
    };
    let uniprot = UniprotHttpClient::new(config.uniprot_url.clone(), timeout, retry)?;
    // the SIFTS table is a single large download
    let sifts = SiftsFlatFileClient::new(
        config.sifts_url.clone(),
        timeout.max(Duration::from_secs(600)),
        retry,
    )?;
    let rcsb = RcsbHttpClient::new(
        config.rcsb_graphql_url.clone(),
        config.rcsb_download_url.clone(),
        timeout,
        retry,
    )?;

    let app = App::new(config, targets, uniprot, sifts, rcsb, converter);
    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(options, &LogProgress)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let progress = BarProgress::new();
            let summary = app.run(options, &progress)?;
            output::print_summary(&summary, app.config());
        }
    }
    Ok(())
}

struct NopConverter;

impl StructureConverter for NopConverter {
    fn convert(
        &self,
        _input: &Path,
        _format: ConvertFormat,
        _output: &Path,
    ) -> Result<(), KiraError> {
        Err(KiraError::MissingTool(
            "structconvert not configured".to_string(),
        ))
    }
}
