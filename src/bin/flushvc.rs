//! # flushvc CLI
//!
//! Command-line front end for the flushvc repository engine.
//!
//! ## Usage
//! ```bash
//! # Create a repository in the current directory
//! flushvc init
//!
//! # Stage everything and flush it
//! flushvc add -A
//! flushvc flush -m "Initial state"
//!
//! # Walk history and go back
//! flushvc log
//! flushvc plunge <hash>
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use flushvc::{CompressionStrategy, Repository, RepositoryBuilder, Result};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// flushvc - a minimal content-addressed version control tool
#[derive(Parser)]
#[command(name = "flushvc")]
#[command(version)]
#[command(about = "Snapshot a directory into content-addressed flushes and plunge back to any of them")]
#[command(long_about = None)]
struct Cli {
    /// Working directory (defaults to current)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository in the working directory
    Init {
        /// Compression level for stored objects
        #[arg(long, value_enum, default_value = "default")]
        compression: CompressionMode,

        /// Ignore patterns (gitignore-style globs)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Persist add/edit/delete markers in the bowl
        #[arg(long)]
        track_changes: bool,
    },

    /// Stage files into the bowl
    Add {
        /// Stage every working file and every staged path
        #[arg(short = 'A', long)]
        all: bool,

        /// Files or directories to stage
        #[arg(required_unless_present = "all")]
        paths: Vec<PathBuf>,
    },

    /// Commit the bowl and move the current ref
    Flush {
        /// Flush message
        #[arg(short, long)]
        message: String,
    },

    /// Replace tracked files with a flush's snapshot
    #[command(alias = "checkout")]
    Plunge {
        /// Ref name, hash or unique hash prefix
        target: String,
    },

    /// Show history from HEAD
    Log {
        /// Print one line per flush
        #[arg(long)]
        oneline: bool,
    },

    /// Print an object's framed bytes
    CatObject {
        /// Hash or unique hash prefix
        hash: String,
    },

    /// Store the bowl as a tree without flushing
    WriteTree,

    /// Compare the bowl against HEAD
    Status,

    /// Re-hash a stored object
    Verify {
        /// Hash or unique hash prefix
        hash: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CompressionMode {
    /// Fastest, largest objects
    Fast,
    /// zlib default level
    Default,
    /// Smallest objects
    Best,
}

impl From<CompressionMode> for CompressionStrategy {
    fn from(mode: CompressionMode) -> Self {
        match mode {
            CompressionMode::Fast => CompressionStrategy::Fast,
            CompressionMode::Default => CompressionStrategy::Default,
            CompressionMode::Best => CompressionStrategy::Best,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "flushvc=debug" } else { "flushvc=warn" };
    let filter = EnvFilter::try_from_env("FLUSHVC_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let workdir = cli.path.unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init {
            compression,
            ignore,
            track_changes,
        } => cmd_init(workdir, compression, ignore, track_changes),
        Commands::Add { all, paths } => cmd_add(workdir, all, paths),
        Commands::Flush { message } => cmd_flush(workdir, &message),
        Commands::Plunge { target } => cmd_plunge(workdir, &target),
        Commands::Log { oneline } => cmd_log(workdir, oneline),
        Commands::CatObject { hash } => cmd_cat_object(workdir, &hash),
        Commands::WriteTree => cmd_write_tree(workdir),
        Commands::Status => cmd_status(workdir),
        Commands::Verify { hash } => cmd_verify(workdir, &hash),
    }
}

fn cmd_init(workdir: PathBuf, compression: CompressionMode, ignore: Vec<String>, track_changes: bool) -> Result<()> {
    let repo = RepositoryBuilder::new()
        .compression_strategy(compression.into())
        .ignore_patterns(ignore)
        .track_changes(track_changes)
        .init(workdir)?;

    println!(
        "{} Initialized empty repository in {}",
        "✓".green().bold(),
        repo.control_dir().display().to_string().cyan()
    );
    Ok(())
}

fn cmd_add(workdir: PathBuf, all: bool, paths: Vec<PathBuf>) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let report = repo.stage_paths(&paths, all)?;

    for path in &report.added {
        println!("  {} {}", "added:".green(), path);
    }
    for path in &report.edited {
        println!("  {} {}", "edited:".yellow(), path);
    }
    for path in &report.removed {
        println!("  {} {}", "removed:".red(), path);
    }
    if report.is_noop() {
        println!("{}", "Nothing changed".dimmed());
    }
    Ok(())
}

fn cmd_flush(workdir: PathBuf, message: &str) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let result = repo.commit_staged(message)?;

    println!("Created flush {}", result.commit);
    println!(
        "  {} {} ({} files)",
        "on".dimmed(),
        result.ref_name.cyan(),
        result.files
    );
    Ok(())
}

fn cmd_plunge(workdir: PathBuf, target: &str) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let result = repo.checkout_commit(target)?;

    if let Some(commit) = result.commit {
        println!("{} Plunged to {}", "✓".green().bold(), commit.short().yellow());
    }
    println!("  Files removed: {}", result.files_deleted);
    println!("  Files written: {}", result.files_written);
    for warning in &result.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
    Ok(())
}

fn cmd_log(workdir: PathBuf, oneline: bool) -> Result<()> {
    let repo = Repository::open(workdir)?;

    for entry in repo.log()? {
        let entry = entry?;
        if oneline {
            println!("{} {}", entry.hash.short().yellow(), entry.commit.summary());
            continue;
        }

        println!("{} {}", "flush".yellow(), entry.hash.to_string().yellow());
        if let Some(parent) = entry.commit.parent {
            println!("Parent: {}", parent);
        }
        println!("Date:   {}", entry.commit.time.format("%Y-%m-%d %H:%M:%S UTC"));
        println!();
        for line in entry.commit.message.lines() {
            println!("    {}", line);
        }
        println!();
    }
    Ok(())
}

fn cmd_cat_object(workdir: PathBuf, hash: &str) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let bytes = repo.show_object_bytes(hash)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

fn cmd_write_tree(workdir: PathBuf) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let tree = repo.write_tree()?;
    println!("Created tree {}", tree);
    Ok(())
}

fn cmd_status(workdir: PathBuf) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let summary = repo.show_staging_summary()?;

    match summary.head {
        Some(head) => println!("On {} at {}", summary.ref_name.cyan(), head.short().yellow()),
        None => println!("On {} {}", summary.ref_name.cyan(), "(no flushes yet)".dimmed()),
    }

    if summary.is_clean() {
        println!("{}", "Bowl matches HEAD".green());
    } else {
        println!("\n{}", "Staged changes:".bold());
        for path in &summary.added {
            println!("  {} {}", "added:".green(), path);
        }
        for path in &summary.edited {
            println!("  {} {}", "edited:".yellow(), path);
        }
        for path in &summary.deleted {
            println!("  {} {}", "deleted:".red(), path);
        }
    }

    if !summary.untracked.is_empty() {
        println!("\n{}", "Untracked files:".bold());
        for path in &summary.untracked {
            println!("  {}", path.dimmed());
        }
    }
    Ok(())
}

fn cmd_verify(workdir: PathBuf, hash: &str) -> Result<()> {
    let repo = Repository::open(workdir)?;
    let object = repo.verify_object(hash)?;
    println!(
        "{} {} {} ({} bytes)",
        "✓".green().bold(),
        object.kind.tag(),
        object.hash,
        object.payload().len()
    );
    Ok(())
}
