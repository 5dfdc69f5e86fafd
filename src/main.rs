#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use minasbate::app_config::{self, Config};
use minasbate::database::models::{Category, QuizQuestion, Word, WordInput};
use minasbate::{AppError, Controller, StoreError};

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

/// CLI Wrapper for Category to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCategory {
    Actions,
    Animals,
    Values,
    Greetings,
    Phrases,
    Food,
}

impl From<CliCategory> for Category {
    fn from(cli_category: CliCategory) -> Self {
        match cli_category {
            CliCategory::Actions => Category::Actions,
            CliCategory::Animals => Category::Animals,
            CliCategory::Values => Category::Values,
            CliCategory::Greetings => Category::Greetings,
            CliCategory::Phrases => Category::Phrases,
            CliCategory::Food => Category::Food,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the store, seeding it on first run, and print a summary
    Init,

    /// List active words, or archived words with --archived
    Words {
        /// Only words of this category
        #[arg(short, long, value_enum)]
        category: Option<CliCategory>,

        /// Case-insensitive search over word and meaning
        #[arg(short, long)]
        search: Option<String>,

        /// List the archive instead
        #[arg(short, long)]
        archived: bool,
    },

    /// Add a word to the dictionary
    AddWord {
        word: String,
        meaning: String,
        #[arg(value_enum)]
        category: CliCategory,

        /// Pronunciation audio URI
        #[arg(long, default_value = "")]
        audio_path: String,

        /// Illustration URI
        #[arg(long, default_value = "")]
        image_path: String,
    },

    /// Move words into the archive
    Archive {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Move words back out of the archive
    Unarchive {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Permanently delete active words
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// List quiz questions
    Questions {
        #[arg(short, long, value_enum)]
        category: Option<CliCategory>,
    },

    /// Write a backup file
    Backup {
        /// Output directory (defaults to the configured backup directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Replace all data with a backup file
    Restore {
        file: PathBuf,

        /// Confirm overwriting all current data
        #[arg(long)]
        yes: bool,
    },

    /// Remove every record and all progress
    Clear {
        /// Confirm removing all data
        #[arg(long)]
        yes: bool,
    },

    /// Show activity progress
    Progress,

    /// Reset progress of the given activities
    ResetProgress {
        #[arg(value_enum, required = true)]
        categories: Vec<CliCategory>,

        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Show record counts and store size
    Stats,

    /// Generate shell completions for minasbate
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Minasbate - local-first vocabulary and quiz store
#[derive(Parser, Debug)]
#[command(name = "minasbate")]
#[command(version)]
#[command(about = "Manage the Minasbate vocabulary, quiz and progress store")]
#[command(long_about = "Manage the Minasbate vocabulary, quiz and progress store.

EXAMPLES:
    minasbate init                              # Create the store, seeding it on first run
    minasbate add-word Maayo Good greetings     # Add a word
    minasbate words --search maayo              # Search the dictionary
    minasbate archive 1712345678901             # Archive a word
    minasbate backup --out ~/backups            # Write minasbate-backup-YYYY-MM-DD.json
    minasbate restore backup.json --yes         # Replace all data with a backup
    minasbate completions bash > minasbate.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
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
async fn main() {
    // The logger accepts everything; the effective level is set once the config is known
    if let Err(e) = CustomLogger::init(LevelFilter::Trace) {
        eprintln!("Failed to initialize logger: {}", e);
    }
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Err(e) = run(cli).await {
        let app_error = match e.downcast::<AppError>() {
            Ok(app_error) => app_error,
            Err(other) => AppError::from(other),
        };
        error!("{}", app_error);
        std::process::exit(exit_code(&app_error));
    }
}

fn exit_code(error: &AppError) -> i32 {
    match error {
        AppError::Store(StoreError::StoreUnavailable(_)) => 3,
        AppError::Store(StoreError::CorruptBackup(_)) => 4,
        AppError::Store(StoreError::PartialClearFailure(_)) => 5,
        AppError::Store(_) => 2,
        AppError::Config(_) => 6,
        AppError::File(_) | AppError::Unknown(_) => 1,
    }
}

async fn run(cli: CommandLineOptions) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "minasbate", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let config = load_or_create_config(&cli.config_path, cli.log_level.clone())?;
    if cli.log_level.is_none() {
        log::set_max_level(config.log_level.to_level_filter());
    }

    let mut controller = Controller::with_config(config).await?;
    let result = execute(&mut controller, cli.command).await;
    controller.shutdown()?;
    result
}

fn load_or_create_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if Path::new(config_path).exists() {
        Config::from_file(config_path).map_err(|e| AppError::Config(format!("{:#}", e)))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        config
            .save(config_path)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(level) = log_level {
        config.log_level = level.into();
    }
    config
        .validate()
        .map_err(|e| AppError::Config(format!("{:#}", e)))?;
    Ok(config)
}

fn require_confirmation(yes: bool, action: &str) -> Result<()> {
    if yes {
        Ok(())
    } else {
        Err(anyhow!("Refusing to {} without --yes", action))
    }
}

async fn execute(controller: &mut Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            let report = controller.seed_report();
            if report.performed {
                info!(
                    "First-time setup added {} words and {} quiz questions",
                    report.words_added, report.questions_added
                );
            }
            println!("{}", controller.stats()?);
        }
        Commands::Words {
            category,
            search,
            archived,
        } => {
            let state = controller.synchronizer().state();
            let source = if archived {
                &state.archived_words
            } else {
                &state.words
            };
            let category = category.map(Category::from);
            source
                .iter()
                .filter(|w| category.is_none_or(|c| w.category == c))
                .filter(|w| search.as_deref().is_none_or(|s| w.matches(s)))
                .for_each(print_word);
        }
        Commands::AddWord {
            word,
            meaning,
            category,
            audio_path,
            image_path,
        } => {
            let mut input = WordInput::new(&word, &meaning, category.into());
            input.audio_path = audio_path;
            input.image_path = image_path;
            let added = controller.synchronizer_mut().add_word(input).await?;
            print_word(&added);
        }
        Commands::Archive { ids } => {
            let moved = controller.synchronizer_mut().archive_words(&ids).await?;
            info!("Archived {} of {} words", moved.len(), ids.len());
            moved.iter().for_each(print_word);
        }
        Commands::Unarchive { ids } => {
            let moved = controller.synchronizer_mut().unarchive_words(&ids).await?;
            info!("Unarchived {} of {} words", moved.len(), ids.len());
            moved.iter().for_each(print_word);
        }
        Commands::Delete { ids, yes } => {
            require_confirmation(yes, "permanently delete words")?;
            controller.synchronizer_mut().delete_words(&ids).await?;
            info!("Deleted words {:?}", ids);
        }
        Commands::Questions { category } => {
            let state = controller.synchronizer().state();
            match category {
                Some(category) => state
                    .questions_in(category.into())
                    .iter()
                    .for_each(print_question),
                None => state
                    .quiz_questions
                    .values()
                    .flatten()
                    .for_each(print_question),
            }
        }
        Commands::Backup { out } => {
            let path = controller.backup(out.as_deref()).await?;
            println!("{}", path.display());
        }
        Commands::Restore { file, yes } => {
            require_confirmation(yes, "overwrite all data from a backup")?;
            controller.restore_file(&file).await?;
            println!("{}", controller.stats()?);
        }
        Commands::Clear { yes } => {
            require_confirmation(yes, "clear all data")?;
            controller.synchronizer_mut().clear_all_data().await?;
        }
        Commands::Progress => {
            for activity in &controller.synchronizer().state().activities {
                println!(
                    "{} {:<10} {:>3}%  {}",
                    activity.icon, activity.title, activity.progress, activity.description
                );
            }
        }
        Commands::ResetProgress { categories, yes } => {
            require_confirmation(yes, "reset progress")?;
            let categories: Vec<Category> = categories.into_iter().map(Category::from).collect();
            controller.synchronizer_mut().reset_progress(&categories)?;
        }
        Commands::Stats => {
            println!("{}", controller.stats()?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn print_word(word: &Word) {
    println!("{:>14}  {} = {} [{}]", word.id, word.word, word.meaning, word.category);
}

fn print_question(question: &QuizQuestion) {
    println!(
        "{:>14}  [{}] {} ({}) options: {} answer: {}",
        question.id,
        question.category,
        question.question,
        question.question_english,
        question.options.join(" | "),
        question.correct_answer
    );
}
