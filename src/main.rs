// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use subtide::app_config::{self, Config, SpeedMode, TranslationProvider};
use subtide::app_controller::Controller;
use subtide::translation::cancellation;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Gemini,
    #[value(name = "openrouter")]
    OpenRouter,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Gemini => TranslationProvider::Gemini,
            CliTranslationProvider::OpenRouter => TranslationProvider::OpenRouter,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

/// CLI Wrapper for SpeedMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSpeedMode {
    Fast,
    Normal,
}

impl From<CliSpeedMode> for SpeedMode {
    fn from(mode: CliSpeedMode) -> Self {
        match mode {
            CliSpeedMode::Fast => SpeedMode::Fast,
            CliSpeedMode::Normal => SpeedMode::Normal,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitle files (default command)
    Translate(TranslateArgs),

    /// Generate shell completions for subtide
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input .srt file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    #[command(flatten)]
    options: TranslateOptions,
}

#[derive(clap::Args, Debug, Clone)]
struct TranslateOptions {
    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Translation backend to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Target language (ISO code or English name, e.g. 'es', 'fr', 'German')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Speed mode selecting the backend model
    #[arg(short, long, value_enum)]
    speed_mode: Option<CliSpeedMode>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// API key for the selected backend (overrides config and environment)
    #[arg(long)]
    api_key: Option<String>,

    /// Print run statistics as JSON when done
    #[arg(long)]
    stats: bool,
}

/// subtide - chunked, concurrent subtitle translation
#[derive(Parser, Debug)]
#[command(name = "subtide")]
#[command(version)]
#[command(about = "Translate SRT subtitles with AI backends")]
#[command(long_about = "subtide splits SRT subtitles into chunks and translates them concurrently
through Gemini or OpenRouter, retrying failed chunks and keeping the original timing.

EXAMPLES:
    subtide movie.srt                         # Translate using default config
    subtide -f movie.srt                      # Force overwrite existing output
    subtide -p openrouter -t fr movie.srt     # Use OpenRouter, translate to French
    subtide -s normal movie.srt               # Use the higher quality model
    subtide --stats /subtitles/               # Translate a whole directory, print stats
    subtide completions bash > subtide.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys are read from GEMINI_API_KEY or
    OPENROUTER_API_KEY when not configured.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input .srt file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    #[command(flatten)]
    options: TranslateOptions,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "❌ "),
            Level::Warn => ("1;33", "🚧 "),
            Level::Info => ("1;32", ""),
            Level::Debug => ("1;36", "🔍 "),
            Level::Trace => ("1;35", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let (color, emoji) = Self::style_for_level(record.level());
        let _ = writeln!(
            std::io::stderr(),
            "\x1B[{}m{} {}{}\x1B[0m",
            color,
            now,
            emoji,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subtide", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Translate(args)) => run_translate(args.input_path, args.options).await,
        None => {
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;
            run_translate(input_path, cli.options).await
        }
    }
}

/// Load the configuration file, creating a default one when missing
fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .with_context(|| format!("Failed to open config file: {}", config_path))?;
        let config: Config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        return Ok(config);
    }

    warn!("Config file not found at '{}', creating default config.", config_path);
    let config = Config::default();
    let config_json = serde_json::to_string_pretty(&config)
        .context("Failed to serialize default config to JSON")?;
    std::fs::write(config_path, config_json)
        .with_context(|| format!("Failed to write default config to file: {}", config_path))?;

    Ok(config)
}

fn apply_overrides(config: &mut Config, options: &TranslateOptions) {
    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(target_language) = &options.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(speed_mode) = &options.speed_mode {
        config.speed_mode = speed_mode.clone().into();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.apply_env_api_key();
    if let Some(api_key) = &options.api_key {
        config.translation.set_api_key(api_key);
    }
}

async fn run_translate(input_path: PathBuf, options: TranslateOptions) -> Result<()> {
    if let Some(cmd_log_level) = &options.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let mut config = load_config(&options.config_path)?;
    apply_overrides(&mut config, &options);
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(level_filter(&config.log_level));

    let (cancel_handle, cancel_signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight translations");
            cancel_handle.cancel();
        }
    });

    let controller = Controller::with_config(config)?.with_cancel_signal(cancel_signal);

    let success = if input_path.is_file() {
        let output_dir = input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        match controller.run(input_path.clone(), output_dir, options.force_overwrite).await {
            Ok(Some(report)) => report.is_success(),
            Ok(None) => true,
            Err(e) => {
                error!("{:#}", e);
                false
            }
        }
    } else if input_path.is_dir() {
        controller
            .run_folder(input_path.clone(), options.force_overwrite)
            .await?
            .is_success()
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", input_path));
    };

    if options.stats {
        let snapshot = controller.service().stats().snapshot();
        let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize statistics")?;
        println!("{}", json);
    }

    if success {
        info!("Done");
        Ok(())
    } else {
        Err(anyhow!("One or more translation runs failed"))
    }
}
