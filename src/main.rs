//! vocab - vocabulary spaced repetition in the terminal
//!
//! Manage a course of study sets and review due words with FSRS scheduling.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use vocaboost::cli;
use vocaboost::config::Config;
use vocaboost::storage::{self, default_backup_path, export_backup, import_backup, CourseStore};
use vocaboost::{OfflineGenerator, UserKey, Workspace};

// ══════════════════════════════════════════════════════════════════════════
// CLI Arguments
// ══════════════════════════════════════════════════════════════════════════

#[derive(Parser, Debug)]
#[command(name = "vocab")]
#[command(author, version, about = "Vocabulary spaced repetition in the terminal", long_about = None)]
struct Args {
    /// Learner identity, usually an email address
    #[arg(short, long, env = "VOCAB_USER", global = true)]
    user: Option<String>,

    /// Config file (default: <config dir>/vocaboost/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding course data
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export or restore a course backup
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    #[command(flatten)]
    Study(StudyCommand),
}

/// Commands that run inside an open workspace.
#[derive(Subcommand, Debug)]
enum StudyCommand {
    /// Create or inspect the course
    Course {
        #[command(subcommand)]
        action: CourseAction,
    },

    /// Manage study sets
    Set {
        #[command(subcommand)]
        action: SetAction,
    },

    /// Manage words in a study set
    Word {
        #[command(subcommand)]
        action: WordAction,
    },

    /// Import words from a CSV file (learning,native[,sentence,translation])
    Import {
        file: PathBuf,

        /// Target study set (default: named after the file)
        #[arg(short, long)]
        set: Option<String>,
    },

    /// List the words due for review in a study set
    Due { set: String },

    /// Review the due words of a study set
    Review {
        set: String,

        /// Seed for exercise selection and interval fuzz
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Practise every exercise of one word
    Practice {
        set: String,
        word: String,

        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum CourseAction {
    /// Start a course for a language (code or name, e.g. "es" or "Spanish")
    Init { language: String },
    /// Show languages, sets and due counts
    Show,
}

#[derive(Subcommand, Debug)]
enum SetAction {
    Add { name: String },
    Remove { set: String },
    List,
}

#[derive(Subcommand, Debug)]
enum WordAction {
    Add {
        set: String,
        word: String,
        translation: String,

        /// Example sentence using the word
        #[arg(long)]
        sentence: Option<String>,

        /// Translation of the example sentence
        #[arg(long)]
        sentence_translation: Option<String>,
    },
    Remove { set: String, word: String },
    List { set: String },
}

#[derive(Subcommand, Debug)]
enum BackupAction {
    Export { output: Option<PathBuf> },
    Import {
        file: PathBuf,

        /// Replace an existing course
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Path,
    Show,
    /// Write the default config file
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ══════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ══════════════════════════════════════════════════════════════════════════

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }
    debug!(config = ?config_path, data_dir = ?config.data_dir(), "Loaded configuration");

    match args.command {
        Command::Config { action } => run_config(action, &config, &config_path),
        Command::Backup { action } => {
            let user = user_key(&args.user)?;
            let store = open_store(&config)?;
            run_backup(action, store.as_ref(), &user)
        }
        Command::Study(command) => {
            let user = user_key(&args.user)?;
            let store = open_store(&config)?;
            let scheduler = config.scheduler.build()?;
            let mut ws = Workspace::open(user, store, scheduler)?
                .with_max_reviews(config.session.max_reviews);
            run_command(command, &mut ws)?;
            ws.close()?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn user_key(user: &Option<String>) -> Result<UserKey> {
    let Some(raw) = user else {
        bail!("No user given; pass --user or set VOCAB_USER");
    };
    Ok(UserKey::parse(raw)?)
}

fn open_store(config: &Config) -> Result<Arc<dyn CourseStore>> {
    let dir = config.data_dir();
    let store = storage::open_store(config.storage.backend, &dir).with_context(|| {
        format!(
            "Failed to open {} store in {:?}",
            config.storage.backend.as_str(),
            dir
        )
    })?;
    Ok(Arc::from(store))
}

fn seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

fn run_command(command: StudyCommand, ws: &mut Workspace) -> Result<()> {
    let now = Utc::now();
    let generator = OfflineGenerator::default();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    match command {
        StudyCommand::Course { action } => match action {
            CourseAction::Init { language } => cli::course_init(ws, &language, &mut out),
            CourseAction::Show => cli::course_show(ws, now, &mut out),
        },
        StudyCommand::Set { action } => match action {
            SetAction::Add { name } => cli::set_add(ws, &name, &mut out),
            SetAction::Remove { set } => cli::set_remove(ws, &set, &mut out),
            SetAction::List => cli::set_list(ws, now, &mut out),
        },
        StudyCommand::Word { action } => match action {
            WordAction::Add {
                set,
                word,
                translation,
                sentence,
                sentence_translation,
            } => {
                let examples = cli::example_from_args(sentence, sentence_translation)?;
                cli::word_add(ws, &set, &word, &translation, examples, &generator, &mut out)
            }
            WordAction::Remove { set, word } => cli::word_remove(ws, &set, &word, &mut out),
            WordAction::List { set } => cli::word_list(ws, &set, now, &mut out),
        },
        StudyCommand::Import { file, set } => {
            cli::import_csv(ws, &file, set.as_deref(), &generator, &mut out).map(|_| ())
        }
        StudyCommand::Due { set } => cli::due(ws, &set, now, &mut out),
        StudyCommand::Review { set, seed: s } => {
            cli::run_review(ws, &set, seed(s), &mut input, &mut out)
        }
        StudyCommand::Practice { set, word, seed: s } => {
            cli::run_practice(ws, &set, &word, seed(s), &mut input, &mut out)
        }
    }
}

fn run_backup(action: BackupAction, store: &dyn CourseStore, user: &UserKey) -> Result<()> {
    match action {
        BackupAction::Export { output } => {
            let path = output.unwrap_or_else(default_backup_path);
            match export_backup(store, user, &path)? {
                Some(words) => println!("✓ Exported {} words to {:?}", words, path),
                None => println!("No course to export for {}", user),
            }
        }
        BackupAction::Import { file, force } => {
            let words = import_backup(store, user, &file, force)
                .with_context(|| format!("Failed to import backup {:?}", file))?;
            println!("✓ Restored course with {} words", words);
        }
    }
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Show => {
            let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
            print!("{}", text);
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", path);
            }
            Config::default().save(path)?;
            println!("✓ Wrote default config to {:?}", path);
        }
    }
    Ok(())
}
