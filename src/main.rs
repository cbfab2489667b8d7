// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use screentrans::app_config::{Config, LogLevel, SharedSettings};
use screentrans::engine::{EngineIdentifier, SelectionMode, TranslationScene};
use screentrans::models::{EngineResult, TranslationResultBundle};
use screentrans::registry::ProviderRegistry;
use screentrans::secrets::{EnvSecretStore, KeyringSecretStore, Secret, SecretStore};
use screentrans::translation::{OrchestrationRequest, OrchestrationService};
use screentrans::ImageData;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// Where API keys are read from
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum CliSecretSource {
    /// System keychain
    #[default]
    Keyring,
    /// SCREENTRANS_<ENGINE>_API_KEY variables
    Env,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config_path: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Source of API keys
    #[arg(long, value_enum, default_value = "keyring", global = true)]
    secrets: CliSecretSource,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Texts to translate
    #[arg(value_name = "TEXT", required = true)]
    texts: Vec<String>,

    /// Target language code (e.g., 'en', 'zh-Hans', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Source language code, or 'auto'
    #[arg(short, long)]
    source_language: Option<String>,

    /// Engine to use (e.g., 'openai', 'deepl', 'compatible:0')
    #[arg(short, long)]
    engine: Option<EngineIdentifier>,

    /// Engine to use when the first one fails
    #[arg(long)]
    fallback: Option<EngineIdentifier>,

    /// Selection mode (primaryWithFallback, parallel, quickSwitch, sceneBinding)
    #[arg(short, long)]
    mode: Option<SelectionMode>,

    /// Engines to run in parallel mode (repeatable)
    #[arg(long = "parallel", value_name = "ENGINE")]
    parallel_engines: Vec<EngineIdentifier>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Image file to extract text from
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Also translate the extracted text
    #[arg(long)]
    translate: bool,

    /// Target language code for --translate
    #[arg(short, long)]
    target_language: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate one or more texts
    Translate(TranslateArgs),

    /// Extract text from an image, optionally translating it
    Analyze(AnalyzeArgs),

    /// List engines and whether they are configured
    Engines,

    /// Store an API key for an engine
    SetKey {
        /// Engine the key belongs to
        engine: EngineIdentifier,
        /// API key; an empty value deletes the stored key
        key: String,
    },

    /// Generate shell completions for screentrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// screentrans - screen translation engine harness
///
/// Drives the translation and text extraction engines from the command line.
#[derive(Parser, Debug)]
#[command(name = "screentrans")]
#[command(version)]
#[command(about = "Screen translation engine harness")]
#[command(long_about = "screentrans runs the translation and text extraction engines used for screen translation.

EXAMPLES:
    screentrans translate -t fr \"Hello world\"                  # Translate with the preferred engine
    screentrans translate -e deepl --fallback apple -t de Hi   # Explicit engine with fallback
    screentrans translate -m parallel --parallel openai --parallel google -t ja Hi
    screentrans analyze capture.png --translate -t en         # Extract text, then translate it
    screentrans set-key openai sk-...                          # Store a key in the keychain
    screentrans completions zsh > _screentrans                 # Generate zsh completions

CONFIGURATION:
    Configuration is read from config.json in the user config directory unless
    --config-path is given. Missing files mean default settings.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    common: CommonArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the max level does the filtering
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "screentrans", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.common)?;
    let secrets: Arc<dyn SecretStore> = match cli.common.secrets {
        CliSecretSource::Keyring => Arc::new(KeyringSecretStore),
        CliSecretSource::Env => Arc::new(EnvSecretStore),
    };
    let registry = Arc::new(ProviderRegistry::new(
        Arc::new(SharedSettings::new(config)),
        Arc::clone(&secrets),
    ));

    match cli.command {
        Commands::Translate(args) => run_translate(registry, args).await,
        Commands::Analyze(args) => run_analyze(registry, args).await,
        Commands::Engines => run_engines(&registry).await,
        Commands::SetKey { engine, key } => run_set_key(secrets.as_ref(), engine, &key),
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(common: &CommonArgs) -> Result<Config> {
    let path = match &common.config_path {
        Some(path) => path.clone(),
        None => Config::default_path().ok_or_else(|| anyhow!("No user config directory on this system"))?,
    };
    let mut config = Config::load_or_default(&path)?;
    if !path.exists() {
        warn!("Config file not found at {:?}, using defaults", path);
    }

    // Command line log level wins over the config file
    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

async fn run_translate(registry: Arc<ProviderRegistry>, args: TranslateArgs) -> Result<()> {
    let mut request = OrchestrationRequest::from_texts(args.texts);
    if let Some(target) = args.target_language {
        request = request.target(target);
    }
    if let Some(source) = args.source_language {
        request = request.source(source);
    }
    if let Some(engine) = args.engine {
        request = request.primary(engine);
    }
    if let Some(fallback) = args.fallback {
        request = request.fallback(fallback);
    }
    if let Some(mode) = args.mode {
        request = request.mode(mode);
    }
    if !args.parallel_engines.is_empty() {
        request = request.parallel(args.parallel_engines);
    }

    let service = OrchestrationService::new(registry);
    let bar = spinner("Translating");
    let outcome = service.translate(request).await;
    bar.finish_and_clear();

    print_bundle(&outcome?);
    Ok(())
}

async fn run_analyze(registry: Arc<ProviderRegistry>, args: AnalyzeArgs) -> Result<()> {
    let image = ImageData::open(&args.image)?;
    let service = OrchestrationService::new(registry);
    let bar = spinner("Extracting text");

    if args.translate {
        let mut request = OrchestrationRequest::default().scene(TranslationScene::Screenshot);
        if let Some(target) = args.target_language {
            request = request.target(target);
        }
        let outcome = service.analyze_and_translate(&image, request).await;
        bar.finish_and_clear();
        print_bundle(&outcome?);
        return Ok(());
    }

    let outcome = service.analyze(&image, TranslationScene::Screenshot).await;
    bar.finish_and_clear();
    let outcome = outcome?;

    if let Some(from) = outcome.fallback_from {
        warn!("{} failed; text extracted by {}", from, outcome.engine);
    }
    info!(
        "{} segments from {} in {:?}",
        outcome.analysis.segments.len(),
        outcome.engine,
        outcome.latency
    );
    for segment in &outcome.analysis.segments {
        let b = segment.bounding_box;
        println!(
            "[{:.3} {:.3} {:.3} {:.3}] ({:.2}) {}",
            b.x, b.y, b.width, b.height, segment.confidence, segment.text
        );
    }
    Ok(())
}

async fn run_engines(registry: &ProviderRegistry) -> Result<()> {
    for engine in registry.registered_engines() {
        let configured = registry.is_engine_configured(engine).await;
        println!("{:<24} {}", engine.to_string(), if configured { "ready" } else { "not configured" });
    }
    Ok(())
}

fn run_set_key(secrets: &dyn SecretStore, engine: EngineIdentifier, key: &str) -> Result<()> {
    let name = engine.secret_key();
    if key.trim().is_empty() {
        secrets.delete_secret(&name)?;
        info!("Deleted API key for {}", engine);
    } else {
        secrets.set_secret(&name, &Secret::api_key(key.trim()))?;
        info!("Stored API key for {}", engine);
    }
    Ok(())
}

fn print_bundle(bundle: &TranslationResultBundle) {
    if let Some(from) = bundle.fallback_from {
        warn!("{} failed; answered by {}", from, bundle.primary_engine);
    }
    for result in &bundle.results {
        match result {
            EngineResult::Success {
                engine,
                segments,
                latency,
            } => {
                println!("== {} ({:?})", engine, latency);
                for segment in segments {
                    println!("{}\n  -> {}", segment.original.text, segment.translated_text());
                }
            }
            EngineResult::Failure { engine, error } => {
                error!("{}: {}", engine, error);
            }
        }
    }
}
