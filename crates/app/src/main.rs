use std::fmt;
use std::path::PathBuf;

use experiment_core::Clock;
use experiment_core::model::{Condition, ProgressInfo, ProgressStyle, ViewDescriptor};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use services::{
    AssetCache, Experiment, ExperimentConfig, ExperimentSession, ParticipantContext, Preloader,
    SequencerState, SessionOptions, client_for,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCondition { raw: String },
    InvalidUrl { raw: String },
    MissingCondition,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCondition { raw } => write!(f, "invalid --condition value: {raw}"),
            ArgsError::InvalidUrl { raw } => write!(f, "invalid --participant-url value: {raw}"),
            ArgsError::MissingCondition => write!(f, "plan requires --condition"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run   [--config <path>] [--condition <GroupA|GroupB>]");
    eprintln!("                            [--participant-url <url>] [--auto]");
    eprintln!("  cargo run -p app -- plan  [--config <path>] --condition <GroupA|GroupB>");
    eprintln!("  cargo run -p app -- check [--config <path>]");
    eprintln!();
    eprintln!("Without --config the built-in visual search study is used.");
    eprintln!("--condition is honoured by `run` only for debug deployments.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXP_CONFIG, EXP_DEPLOY_METHOD, EXP_SERVER_URL, EXP_EXPERIMENT_ID,");
    eprintln!("  EXP_CONTACT_EMAIL, EXP_PROLIFIC_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Plan,
    Check,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "plan" => Some(Self::Plan),
            "check" => Some(Self::Check),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    condition: Option<Condition>,
    participant_url: Option<Url>,
    auto: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            config: std::env::var("EXP_CONFIG").ok().map(PathBuf::from),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    parsed.config = Some(PathBuf::from(require_value(args, "--config")?));
                }
                "--condition" => {
                    let value = require_value(args, "--condition")?;
                    let condition = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCondition { raw: value.clone() })?;
                    parsed.condition = Some(condition);
                }
                "--participant-url" => {
                    let value = require_value(args, "--participant-url")?;
                    let url =
                        Url::parse(&value).map_err(|_| ArgsError::InvalidUrl { raw: value.clone() })?;
                    parsed.participant_url = Some(url);
                }
                "--auto" => parsed.auto = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn load_experiment(args: &Args) -> Result<Experiment, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::visual_search(),
    };
    let config = config.apply_env_overrides()?;
    Ok(Experiment::from_config(&config)?)
}

fn render_progress(info: &ProgressInfo) -> String {
    match info.style {
        ProgressStyle::Chunks => {
            let cells = usize::try_from(info.chunk_width() / 10).unwrap_or(1).max(1);
            (1..=info.total)
                .map(|chunk| {
                    let fill = if chunk < info.position { "#" } else { " " };
                    format!("[{}]", fill.repeat(cells))
                })
                .collect()
        }
        ProgressStyle::Separate => format!("block {}", info.label()),
        ProgressStyle::Default => {
            let cells = usize::try_from(info.width / 5).unwrap_or(20).max(1);
            let filled = cells * info.completed_before() / info.total.max(1);
            format!("[{}{}]", "#".repeat(filled), "-".repeat(cells - filled))
        }
    }
}

fn render_view(index: usize, total: usize, view: &ViewDescriptor, progress: Option<ProgressInfo>) {
    println!();
    println!("({}/{total}) {} [{}]", index + 1, view.id, view.role);
    if let Some(info) = progress {
        println!("  progress: {}", render_progress(&info));
    }
}

async fn run_session(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let experiment = load_experiment(&args)?;
    let deployment = experiment.deployment().clone();

    let preloader = Preloader::new(AssetCache::new());
    let _preload = preloader.spawn(experiment.preload_urls().to_vec());

    let participant = args
        .participant_url
        .as_ref()
        .map(|url| ParticipantContext::from_url(url, deployment.deploy_method()))
        .unwrap_or_default();
    let clock = Clock::default_clock();
    let mut session = ExperimentSession::init(
        &experiment,
        SessionOptions::new()
            .with_clock(clock)
            .with_forced_condition(args.condition)
            .with_participant(participant),
    )?;
    if let Some(snapshot) = session.monitor() {
        debug!(?snapshot, "debug monitor attached");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let total = session.sequencer().len();
    let mut view = session.start()?.clone();
    loop {
        render_view(session.sequencer().cursor(), total, &view, session.progress_info()?);
        let shown_at = clock.now();
        if !args.auto {
            println!("  press Enter to continue");
            stdin.next_line().await?;
        }
        if view.role.is_trial_block() {
            let mut data = Map::new();
            data.insert(
                "response_time_ms".into(),
                Value::from(clock.millis_since(shown_at)),
            );
            session.record(&view.id, data)?;
        }
        if session.advance()? == SequencerState::Finished {
            break;
        }
        view = session.current()?.clone();
    }

    let client = client_for(deployment.deploy_method());
    match session.submit(client.as_ref()).await {
        Ok(receipt) => {
            info!(trials = receipt.trials, "session complete");
            if deployment.deploy_method().is_debug() {
                println!("{}", serde_json::to_string_pretty(&session.results_payload()?)?);
            }
            println!("Thank you for taking part.");
            if let Some(url) = deployment.completion_redirect() {
                println!("Please continue at: {url}");
            }
            Ok(())
        }
        Err(err) => {
            eprintln!("Submitting your results failed: {err}");
            eprintln!(
                "Please send the results below to {}:",
                deployment.contact_email()
            );
            println!("{}", serde_json::to_string_pretty(&session.results_payload()?)?);
            Err(err.into())
        }
    }
}

fn print_plan(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let condition = args.condition.ok_or(ArgsError::MissingCondition)?;
    let experiment = load_experiment(args)?;
    let sequencer = experiment.sequencer(condition)?;
    let table = sequencer.progress_table();

    println!("{condition}: {} views", sequencer.len());
    for (index, view) in sequencer.sequence().views().iter().enumerate() {
        let marker = table
            .info(&view.id)
            .map(|info| format!("  <- progress {}", info.label()))
            .unwrap_or_default();
        println!(
            "{:>3}  {:<28} {:<13}{marker}",
            index + 1,
            view.id.as_str(),
            view.role.as_str()
        );
    }
    Ok(())
}

fn check_config(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let experiment = load_experiment(args)?;
    for condition in Condition::ALL {
        let sequencer = experiment.sequencer(condition)?;
        println!(
            "{condition}: {} views, {} with progress",
            sequencer.len(),
            sequencer.progress_table().tracked_count()
        );
    }
    let deployment = experiment.deployment();
    println!(
        "deploy: {} -> {} (experiment {})",
        deployment.deploy_method(),
        deployment.server_app_url(),
        deployment.experiment_id()
    );
    println!("preload: {} assets", experiment.preload_urls().len());
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: run a session when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::Run => run_session(parsed).await,
        Command::Plan => print_plan(&parsed),
        Command::Check => check_config(&parsed),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = raw.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn parses_condition_and_flags() {
        let args = parse(&["--condition", "GroupB", "--auto", "--config", "x.toml"]).unwrap();
        assert_eq!(args.condition, Some(Condition::GroupB));
        assert!(args.auto);
        assert_eq!(args.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn rejects_unknown_condition() {
        let err = parse(&["--condition", "GroupZ"]).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidCondition { .. }));
    }

    #[test]
    fn missing_value_names_flag() {
        let err = parse(&["--participant-url"]).unwrap_err();
        assert_eq!(err.to_string(), "--participant-url requires a value");
    }

    #[test]
    fn chunk_progress_marks_completed_views() {
        let info = ProgressInfo {
            position: 3,
            total: 4,
            style: ProgressStyle::Chunks,
            width: 100,
        };
        assert_eq!(render_progress(&info), "[##][##][  ][  ]");
    }

    #[test]
    fn narrow_chunks_keep_one_cell() {
        let info = ProgressInfo {
            position: 2,
            total: 8,
            style: ProgressStyle::Chunks,
            width: 40,
        };
        assert_eq!(render_progress(&info), "[#][ ][ ][ ][ ][ ][ ][ ]");
    }

    #[test]
    fn default_progress_scales_to_width() {
        let info = ProgressInfo {
            position: 2,
            total: 2,
            style: ProgressStyle::Default,
            width: 40,
        };
        assert_eq!(render_progress(&info), "[####----]");
    }
}
