use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flocate::utils::progress;
use flocate::utils::AppConfig;
use flocate::{Indexer, MatchOptions, PathStore, SearchOptions, UpdatePolicy};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flocate")]
#[command(about = "Find files by name from a prebuilt path index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (default: from config, else the app data directory)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Log progress details to stderr (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl paths and rebuild the database
    #[command(visible_alias = "updatedb")]
    Index {
        /// Paths to index (default: home and system paths)
        paths: Vec<PathBuf>,

        /// Keep entries outside the given paths instead of replacing everything
        #[arg(short, long)]
        merge: bool,

        /// Descend into symlinked directories
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Crawl threads (0 = automatic)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Don't show a spinner
        #[arg(short, long)]
        quiet: bool,
    },
    /// Search the database for a glob pattern
    Search {
        /// Pattern; `*` matches any run, `?` one character
        pattern: String,

        /// Maximum number of results (0 = unlimited)
        #[arg(short, long, default_value_t = 1000)]
        limit: usize,

        /// Ignore case distinctions
        #[arg(short, long)]
        ignore_case: bool,

        /// Match only the final path component
        #[arg(short, long)]
        basename: bool,

        /// Print the number of matches instead of the paths
        #[arg(short, long)]
        count: bool,

        /// Treat the pattern as a regular expression
        #[arg(short, long, conflicts_with = "exact")]
        regex: bool,

        /// A pattern without wildcards must equal the whole path
        #[arg(short, long)]
        exact: bool,

        /// Update the database from the default roots first
        #[arg(short, long)]
        update: bool,
    },
    /// Show database statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load()?;
    let db_path = match cli.database {
        Some(path) => path,
        None => config.database_path()?,
    };

    match cli.command {
        Commands::Index {
            paths,
            merge,
            follow_symlinks,
            threads,
            quiet,
        } => {
            let mut config = config;
            if merge {
                config.update_policy = UpdatePolicy::Merge;
            }
            if follow_symlinks {
                config.follow_symlinks = true;
            }
            if let Some(threads) = threads {
                config.crawl_threads = threads;
            }
            run_index(&config, &db_path, paths, quiet)?;
        }
        Commands::Search {
            pattern,
            limit,
            ignore_case,
            basename,
            count,
            regex,
            exact,
            update,
        } => {
            if update {
                run_index(&config, &db_path, Vec::new(), true)?;
            }
            ensure_database(&db_path)?;

            let matching = MatchOptions {
                ignore_case,
                basename,
                regex,
                literal_substring: !exact,
            };
            if count {
                let n = flocate::query::count(&db_path, &pattern, &matching)?;
                println!("{}", n);
            } else {
                let options = SearchOptions {
                    matching,
                    limit: Some(limit),
                };
                for path in flocate::query::search(&db_path, &pattern, &options)? {
                    println!("{}", path);
                }
            }
        }
        Commands::Stats { json } => {
            ensure_database(&db_path)?;
            let stats = PathStore::new(&db_path).stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Database: {}", db_path.display());
                println!("Files: {}", stats.entry_count);
                println!("Size: {}", format_size(stats.byte_size));
                println!("Generation: {}", stats.generation);
                if !stats.roots.is_empty() {
                    println!("Roots:");
                    for root in &stats.roots {
                        println!("  {}", root);
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "flocate=info",
        2 => "flocate=debug",
        _ => "flocate=trace",
    };
    let filter = EnvFilter::try_from_env("FLOCATE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_index(config: &AppConfig, db_path: &Path, paths: Vec<PathBuf>, quiet: bool) -> Result<()> {
    let roots = if paths.is_empty() { config.roots() } else { paths };
    if roots.is_empty() {
        bail!("No paths to index");
    }

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let mut options = config.crawl_options();
    options.cancel = Some(cancel);
    let indexer = Indexer::new(options, config.update_policy)?;

    let spinner = (!quiet).then(|| progress::spinner("Crawling..."));

    let result = indexer.update_with_progress(db_path, &roots, spinner.as_ref());
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let summary = result.with_context(|| format!("Failed to update {}", db_path.display()))?;

    for err in &summary.report.root_errors {
        eprintln!("warning: {}", err);
    }
    if summary.report.entry_errors > 0 {
        eprintln!(
            "warning: skipped {} unreadable entries",
            summary.report.entry_errors
        );
    }

    let stats = PathStore::new(db_path).stats()?;
    eprintln!(
        "Indexed {} paths in {:.2}s",
        summary.indexed,
        summary.elapsed.as_secs_f64()
    );
    eprintln!("Database: {}", db_path.display());
    eprintln!("Size: {}", format_size(stats.byte_size));
    Ok(())
}

fn ensure_database(db_path: &Path) -> Result<()> {
    if !PathStore::new(db_path).exists() {
        bail!(
            "Database {} does not exist. Run 'flocate index' first.",
            db_path.display()
        );
    }
    Ok(())
}

/// Human-readable byte count
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
