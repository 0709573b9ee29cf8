//! CLI command definitions and handlers

mod extract;
mod init;
mod rate;
mod train;

use anyhow::Result;
use clap::{Parser, Subcommand};
use readscore::config::{load_config_file, load_project_config, OutputFormat, ProjectConfig};
use std::path::{Path, PathBuf};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a strictly positive, finite learning rate
fn parse_learning_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err("learning rate must be a positive number".to_string())
    }
}

/// readscore - readability scores for Go snippets
#[derive(Parser, Debug)]
#[command(name = "readscore")]
#[command(
    version,
    about = "Score the readability of Go snippets from lexical features",
    long_about = "readscore extracts lexical statistics from Go source (line lengths, \
identifiers, keywords, literals, comments, punctuation) and feeds them to a logistic \
model fitted on human readability ratings.\n\n\
The built-in model is used unless --model or [model] path names another one.",
    after_help = "\
Examples:
  readscore rate main.go                          Score one file
  readscore rate *.go --format json               JSON output for scripting
  readscore rate main.go --explain                Per-feature breakdown
  readscore extract snippets/ --ratings ratings.csv -o features.csv
  readscore train features.csv -o model.json      Fit and evaluate a model"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Config file (default: readscore.toml or .readscorerc.json in the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of parallel workers (1-64)
    #[arg(long, global = true, default_value = "8", value_parser = parse_workers)]
    pub workers: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score the readability of one or more snippets
    #[command(after_help = "\
Examples:
  readscore rate main.go
  readscore rate a.go b.go --format json
  readscore rate main.go --model model.json --explain")]
    Rate {
        /// Snippet files to score
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Model JSON (default: [model] path from config, else the built-in model)
        #[arg(long, short = 'm')]
        model: Option<PathBuf>,

        /// Output format (default: [output] format from config, else text)
        #[arg(long, short = 'f', value_enum)]
        format: Option<OutputFormat>,

        /// Show each feature's contribution to the score
        #[arg(long)]
        explain: bool,
    },

    /// Build a feature table from rated snippets
    #[command(after_help = "\
Examples:
  readscore extract snippets/ --ratings ratings.csv
  readscore extract snippets/ --ratings ratings.csv -o features.csv")]
    Extract {
        /// Directory of snippet files (not recursive)
        dir: PathBuf,

        /// Ratings CSV: header row, then `filename,rating` rows
        #[arg(long, short = 'r')]
        ratings: PathBuf,

        /// Output CSV (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Fit a model on a feature table and report leave-one-out performance
    Train {
        /// Feature table written by `extract`
        table: PathBuf,

        /// Where to write the fitted model JSON
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Gradient descent iterations per fit
        #[arg(long)]
        max_iter: Option<usize>,

        /// Gradient descent step size
        #[arg(long, value_parser = parse_learning_rate)]
        learning_rate: Option<f64>,
    },

    /// Create a readscore.toml with the default settings
    Init,
}

fn load_config(explicit: Option<&Path>) -> Result<ProjectConfig> {
    match explicit {
        Some(path) => load_config_file(path),
        None => Ok(load_project_config(Path::new("."))),
    }
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Rate {
            files,
            model,
            format,
            explain,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let format = format.or(config.output.format).unwrap_or_default();
            rate::run(&files, model.as_deref(), format, explain, &config)
        }

        Commands::Extract {
            dir,
            ratings,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            extract::run(&dir, &ratings, output.as_deref(), cli.workers, &config)
        }

        Commands::Train {
            table,
            output,
            max_iter,
            learning_rate,
        } => {
            let config = load_config(cli.config.as_deref())?;
            train::run(&table, output.as_deref(), max_iter, learning_rate, &config)
        }

        Commands::Init => init::run(Path::new(".")),
    }
}
