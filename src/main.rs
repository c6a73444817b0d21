/*!
 * MergeVault CLI - Command Line Interface
 *
 * Runs one backup job described by a profile file. A missing profile is
 * replaced by a dry-run starter profile the user can edit.
 */

use clap::{Parser, ValueEnum};
use mergevault::{
    cli_progress::{format_bytes, CliProgressRenderer},
    config::{BackupProfile, LogLevel},
    error::{BackupError, Result, EXIT_CANCELLED, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging, run as run_backup, ProgressObserver, ProgressPublisher,
};
use std::path::{Path, PathBuf};

/// Buffered snapshots before the renderer starts dropping them
const PROGRESS_BUFFER: usize = 1024;

#[derive(Parser)]
#[command(name = "mergevault")]
#[command(version, about = "Merge many source drives into one verified backup tree", long_about = None)]
struct Cli {
    /// Backup profile (TOML, or JSON when the name ends in .json)
    #[arg(value_name = "PROFILE", default_value = "backup-profile.toml")]
    profile: PathBuf,

    /// Resolve and count everything without writing
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of copy operations in flight
    #[arg(long, value_name = "N")]
    parallel: Option<usize>,

    /// Log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Verbose output (debug logging, one line per finished file)
    #[arg(short, long)]
    verbose: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    println!("MergeVault {} - multi-source merge backup", mergevault::VERSION);

    if !cli.profile.exists() {
        return create_starter_profile(&cli.profile);
    }

    let mut profile = BackupProfile::from_file(&cli.profile)?;
    apply_overrides(&mut profile, &cli);

    if let Err(e) = logging::init_logging(&profile) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let renderer = if cli.no_progress {
        None
    } else {
        let (publisher, subscriber) = ProgressPublisher::new(PROGRESS_BUFFER);
        let handle = CliProgressRenderer::new(subscriber, profile.verbose).spawn();
        Some((publisher, handle))
    };

    let observer = renderer
        .as_ref()
        .map(|(publisher, _)| publisher as &dyn ProgressObserver);
    let outcome = run_backup(&profile, observer, None);

    // Dropping the publisher ends the renderer loop
    if let Some((publisher, handle)) = renderer {
        drop(publisher);
        let _ = handle.join();
    }

    let report = outcome?;

    println!("Job: {}", profile.job_name);
    println!("{}", report);
    println!(
        "Copied {} in {:.2}s{}",
        format_bytes(report.bytes_copied),
        report.duration.as_secs_f64(),
        if profile.dry_run { " (dry run)" } else { "" }
    );

    if !report.errors.is_empty() {
        println!("Errors:");
        for error in &report.errors {
            println!(" - {}", error);
        }
    }

    let code = if report.cancelled {
        EXIT_CANCELLED
    } else if report.has_failures() {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    };
    println!("Done.");
    Ok(code)
}

fn apply_overrides(profile: &mut BackupProfile, cli: &Cli) {
    if cli.dry_run {
        profile.dry_run = true;
    }
    if let Some(parallel) = cli.parallel {
        profile.max_parallel_copies = parallel;
    }
    if let Some(level) = cli.log_level {
        profile.log_level = level.into();
    }
    if cli.log_file.is_some() {
        profile.log_file = cli.log_file.clone();
    }
    if cli.verbose {
        profile.verbose = true;
    }
}

fn create_starter_profile(path: &Path) -> Result<i32> {
    if looks_like_placeholder(path) {
        eprintln!("The profile path looks like a placeholder. Pass the path of a real profile.");
        eprintln!("Example: mergevault /etc/mergevault/backup-profile.toml");
        return Ok(EXIT_FATAL);
    }

    BackupProfile::starter().to_file(path).map_err(|e| {
        BackupError::Config(format!(
            "Unable to create starter profile at '{}': {}",
            path.display(),
            e
        ))
    })?;

    println!(
        "Created starter profile at {}. Edit values and run again.",
        path.display()
    );
    Ok(EXIT_SUCCESS)
}

/// Paths copied verbatim from documentation rather than chosen by the user
fn looks_like_placeholder(path: &Path) -> bool {
    let normalized = path.to_string_lossy().replace('\\', "/").to_lowercase();
    normalized.contains("path/to/") || normalized.contains("your-backup-profile")
}
