//! `ralphnote` command-line entry point.
//!
//! # Responsibility
//! - Expose register/audit/init/sample over one corpus root.
//! - Map outcomes to exit codes: 0 on success or all clear, 1 otherwise.

use clap::{Parser, Subcommand};
use log::debug;
use ralphnote_core::{
    default_log_level, init_corpus, init_logging, sample_notes, AuditReport, Auditor, BackLink,
    BatchSummary, CorpusConfig, Finding, IndexUpdate, LogSink, Registrar, Registration,
    DEFAULT_BATCH_SIZE, DEFAULT_DOCS_PREFIX,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ralphnote", version, about = "Register and audit the research-note corpus")]
struct Cli {
    /// Corpus root holding `notes/` and `_index.md`.
    #[arg(long, global = true, env = "RALPHNOTE_ROOT", default_value = ".")]
    root: PathBuf,
    /// Prefix every note `source` must start with.
    #[arg(long, global = true, default_value = DEFAULT_DOCS_PREFIX)]
    docs_prefix: String,
    /// Log level; `warn` on stderr, the build-mode default with `--log-dir`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Write rotating log files here instead of stderr (absolute path).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register one draft, or every draft in the corpus when no path is given.
    Register {
        /// Draft file, relative to the corpus root or absolute.
        path: Option<PathBuf>,
    },
    /// Check frontmatter, file names, wikilinks and index rows.
    Audit {
        /// Delete dangling wikilinks from documents.
        #[arg(long)]
        fix: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Create the corpus directories and an empty index.
    Init,
    /// Print a random batch of registered note paths.
    Sample {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        size: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let sink = cli
        .log_dir
        .clone()
        .map(LogSink::Directory)
        .unwrap_or(LogSink::Stderr);
    let level = cli.log_level.clone().unwrap_or_else(|| match &sink {
        LogSink::Stderr => "warn".to_string(),
        LogSink::Directory(_) => default_log_level().to_string(),
    });
    if let Err(err) = init_logging(&level, sink) {
        eprintln!("Error: {err}");
        return ExitCode::FAILURE;
    }
    debug!(
        "event=cli_start module=cli status=ok core_version={}",
        ralphnote_core::core_version()
    );

    let config = CorpusConfig::new(cli.root).with_docs_prefix(cli.docs_prefix);
    match cli.command {
        Commands::Register { path: Some(path) } => register_one(config, path),
        Commands::Register { path: None } => register_all(config),
        Commands::Audit { fix, json } => audit(config, fix, json),
        Commands::Init => init(config),
        Commands::Sample { size } => sample(config, size),
    }
}

fn register_one(config: CorpusConfig, path: PathBuf) -> ExitCode {
    let index_present = config.index_path().is_file();
    let registrar = Registrar::new(config);
    match registrar.register(&path) {
        Ok(registration) => {
            print_registration(&registration);
            exit_code(index_present)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn register_all(config: CorpusConfig) -> ExitCode {
    let index_present = config.index_path().is_file();
    let registrar = Registrar::new(config);
    let summary = match registrar.scan_and_register_all() {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    print_batch(registrar.config(), &summary);
    exit_code(index_present && summary.error_count() == 0)
}

fn print_registration(registration: &Registration) {
    match &registration.index {
        IndexUpdate::Appended { back_link } => {
            println!("Registered {} in _index.md", registration.id);
            match back_link {
                Some(BackLink::Linked) => println!("Marked question as answered"),
                Some(BackLink::AlreadyAnswered(_)) => {
                    eprintln!("Warning: answered question was already marked answered")
                }
                Some(BackLink::QuestionNotIndexed) => {
                    eprintln!("Warning: answered question has no index row")
                }
                None => {}
            }
        }
        IndexUpdate::SkippedMissingIndex => {
            eprintln!("Warning: _index.md not found, skipping index update")
        }
    }
    println!("ID: {}", registration.id);
    println!("Created: {}", registration.created);
    println!("Path: {}", registration.path.display());
}

fn print_batch(config: &CorpusConfig, summary: &BatchSummary) {
    if summary.registered.is_empty() && summary.failures.is_empty() {
        println!("No unregistered files found.");
        return;
    }
    for registration in &summary.registered {
        println!(
            "registered: {} -> {}",
            config.relative(&registration.source_path).display(),
            config.relative(&registration.path).display()
        );
    }
    for failure in &summary.failures {
        eprintln!(
            "error: {}: {}",
            config.relative(&failure.path).display(),
            failure.error
        );
    }
    println!(
        "\nDone: {} registered, {} errors, {} warnings",
        summary.success_count(),
        summary.error_count(),
        summary.warning_count()
    );
}

fn audit(config: CorpusConfig, fix: bool, json: bool) -> ExitCode {
    let report = match Auditor::new(config).audit(fix) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("Error: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }
    exit_code(report.is_all_clear())
}

fn print_report(report: &AuditReport) {
    print_section("Frontmatter errors", &report.frontmatter_errors);
    print_section("Filename errors", &report.filename_errors);
    if report.fix_applied && !report.reference_errors.is_empty() {
        println!("Fixed {} broken reference(s).\n", report.fixed_references);
    } else {
        print_section("Broken references", &report.reference_errors);
    }
    print_section("Index errors", &report.index_errors);

    if report.is_all_clear() {
        println!(
            "All clear: {} files validated, all filenames match IDs, all references resolve.",
            report.ids.len()
        );
    } else {
        println!("Total issues: {}", report.issue_count());
    }
}

fn print_section(title: &str, findings: &[Finding]) {
    if findings.is_empty() {
        return;
    }
    println!("{title} ({}):", findings.len());
    for finding in findings {
        println!("  {finding}");
    }
    println!();
}

fn init(config: CorpusConfig) -> ExitCode {
    match init_corpus(&config) {
        Ok(outcome) => {
            if outcome.index_created {
                println!("Created {}", config.index_path().display());
            } else {
                println!("Index already exists: {}", config.index_path().display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn sample(config: CorpusConfig, size: usize) -> ExitCode {
    let batch = match sample_notes(&config, size, &mut rand::thread_rng()) {
        Ok(batch) => batch,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    if batch.is_empty() {
        eprintln!("No registered notes found.");
        return ExitCode::FAILURE;
    }
    for path in batch {
        println!("{}", path.display());
    }
    ExitCode::SUCCESS
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
