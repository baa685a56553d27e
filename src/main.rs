//! CLI entry point for `mboxcontacts`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxcontacts::config::Config;
use mboxcontacts::contacts::denylist::DEFAULT_DENY_PATTERNS;
use mboxcontacts::contacts::signature::PatternTable;
use mboxcontacts::extract::{self, CountSummary, ExtractOptions, ExtractionOutcome};
use mboxcontacts::i18n;
use mboxcontacts::model::contact::SortKey;
use mboxcontacts::parser::mbox::ReaderLimits;
use mboxcontacts::parser::record::RecordOptions;

#[derive(Parser)]
#[command(name = "mboxcontacts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Language (en, es). Defaults to system locale.
    #[arg(long, value_name = "LANG", global = true)]
    lang: Option<String>,

    /// Configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract contacts from an MBOX file
    Extract {
        path: PathBuf,
        /// Report file (JSON)
        #[arg(short, long)]
        output: PathBuf,
        /// Owner address (repeatable)
        #[arg(long = "owner", value_name = "ADDR")]
        owners: Vec<String>,
        /// Sort key
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
        /// Write a checkpoint every N messages (0 disables)
        #[arg(long, value_name = "N")]
        checkpoint_every: Option<u64>,
        /// Extra deny-list file
        #[arg(long, value_name = "FILE")]
        deny_file: Option<PathBuf>,
        /// Signature pattern table (TOML)
        #[arg(long, value_name = "FILE")]
        patterns: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Count messages without aggregating
    Count {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the built-in deny-list and pattern table
    Defaults {
        #[arg(long, conflicts_with = "patterns")]
        deny: bool,
        #[arg(long)]
        patterns: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Detect language early from --lang arg or system env, before clap processes --help.
fn detect_lang_early() -> i18n::Lang {
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        let code = if arg == "--lang" {
            args.get(i + 1).map(String::as_str)
        } else {
            arg.strip_prefix("--lang=")
        };
        if let Some(lang) = code.and_then(i18n::Lang::from_code) {
            return lang;
        }
    }
    i18n::detect_system_lang()
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command() -> clap::Command {
    let mut cmd = Cli::command()
        .about(i18n::app_about())
        .long_about(i18n::app_long_about());

    let names: Vec<String> = cmd
        .get_subcommands()
        .map(|s| s.get_name().to_string())
        .collect();
    for name in names {
        let about = match name.as_str() {
            "extract" => i18n::help_cmd_extract(),
            "count" => i18n::help_cmd_count(),
            "defaults" => i18n::help_cmd_defaults(),
            "completions" => i18n::help_cmd_completions(),
            "manpage" => i18n::help_cmd_manpage(),
            _ => continue,
        };
        cmd = cmd.mut_subcommand(name, |s| s.about(about));
    }
    cmd
}

fn main() -> anyhow::Result<()> {
    // Language must be known before clap renders --help
    i18n::set_lang(detect_lang_early());

    let matches = build_localized_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let config = match cli.config {
        Some(ref path) => mboxcontacts::config::load_config_from(path)?,
        None => mboxcontacts::config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Extract {
            path,
            output,
            owners,
            sort,
            checkpoint_every,
            deny_file,
            patterns,
            json,
        } => {
            let mut config = config;
            config.owner.addresses.extend(owners);
            if let Some(sort) = sort {
                config.output.sort = sort.as_str().to_string();
            }
            if let Some(n) = checkpoint_every {
                config.output.checkpoint_every = n;
            }
            if deny_file.is_some() {
                config.filters.deny_file = deny_file;
            }
            if patterns.is_some() {
                config.filters.patterns_file = patterns;
            }
            cmd_extract(&path, &output, &config, json)
        }
        Commands::Count { path, json } => cmd_count(&path, &config, json),
        Commands::Defaults { deny, patterns } => cmd_defaults(deny, patterns),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mboxcontacts::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxcontacts.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn progress_bar(file_size: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(file_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {label} [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{eta}})"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Run a full extraction and print the summary.
fn cmd_extract(path: &Path, output: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("{}: {}", i18n::err_file_not_found(), path.display());
    }

    let options = ExtractOptions::from_config(config)?;
    if options.owners.is_empty() {
        tracing::warn!("No owner addresses configured; sent counts will stay at zero");
    }

    let pb = progress_bar(std::fs::metadata(path)?.len(), i18n::msg_extracting());
    let start = Instant::now();
    let result = extract::run_extraction(
        path,
        output,
        &options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    );
    pb.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) if e.is_output_error() => {
            anyhow::bail!("{} {}: {e}", i18n::err_report_write(), output.display())
        }
        Err(e) => return Err(e.into()),
    };
    let elapsed = start.elapsed();

    if json {
        print_extract_json(output, &outcome, elapsed)
    } else {
        print_extract_table(path, output, &outcome, elapsed);
        Ok(())
    }
}

/// Count messages and report how many would be usable.
fn cmd_count(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("{}: {}", i18n::err_file_not_found(), path.display());
    }

    let limits = ReaderLimits {
        max_lines_per_message: config.limits.max_lines_per_message,
        max_line_bytes: config.limits.max_line_bytes,
    };
    let record = RecordOptions {
        min_lines: config.limits.min_message_lines,
        body_excerpt_chars: config.limits.body_excerpt_chars,
    };

    let pb = progress_bar(std::fs::metadata(path)?.len(), i18n::msg_counting());
    let summary = extract::count_messages(
        path,
        limits,
        &record,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_count_table(path, &summary);
    }
    Ok(())
}

/// Print the embedded deny-list and/or signature pattern table.
fn cmd_defaults(deny: bool, patterns: bool) -> anyhow::Result<()> {
    if !patterns {
        println!("# {}", i18n::msg_default_deny_list());
        for p in DEFAULT_DENY_PATTERNS {
            println!("{p}");
        }
    }
    if !deny {
        if !patterns {
            println!();
        }
        println!("# {}", i18n::msg_default_patterns());
        print!("{}", PatternTable::default().to_toml());
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxcontacts", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let man = clap_mangen::Man::new(Cli::command());
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn print_extract_table(
    path: &Path,
    output: &Path,
    outcome: &ExtractionOutcome,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    let report = &outcome.report;
    let s = &report.summary;
    let n = s.unique_contacts;

    println!();
    println!("  {:<22} {}", i18n::msg_file(), path.display());
    println!(
        "  {:<22} {}",
        i18n::msg_file_size(),
        format_size(report.source.file_size, BINARY)
    );
    println!("  {:<22} {}", i18n::msg_output(), output.display());
    println!("  {:<22} {}", i18n::msg_message_count(), s.messages_processed);
    println!("  {:<22} {}", i18n::msg_records(), s.records_ingested);
    println!(
        "  {:<22} {} ({} {}, {} {}, {} {})",
        i18n::msg_skipped(),
        s.skipped.total(),
        s.skipped.too_short,
        i18n::msg_too_short(),
        s.skipped.missing_from,
        i18n::msg_missing_from(),
        s.skipped.unparseable_from,
        i18n::msg_bad_from(),
    );
    println!("  {:<22} {}", i18n::msg_denied(), s.denied_addresses);
    println!("  {:<22} {}", i18n::msg_truncated(), s.truncated_messages);
    println!("  {:<22} {}", i18n::msg_unique_contacts(), n);
    println!("  {:<22} {:.2?}", i18n::msg_elapsed(), elapsed);

    println!();
    println!("  {}:", i18n::msg_coverage());
    for (label, count) in [
        (i18n::msg_with_name(), s.coverage.with_name),
        (i18n::msg_with_phone(), s.coverage.with_phone),
        (i18n::msg_with_address(), s.coverage.with_address),
        (i18n::msg_with_title(), s.coverage.with_title),
        (i18n::msg_with_company(), s.coverage.with_company),
    ] {
        println!("    {label:<20} {count:>6} ({:.1}%)", percent(count, n));
    }

    if !report.contacts.is_empty() {
        println!();
        println!("  {}:", i18n::msg_top_contacts());
        for c in report.contacts.iter().take(10) {
            println!(
                "    {:>6} {:>6}  {}  {}",
                c.occurrences, c.sent_to_count, c.email, c.full_name
            );
        }
    }
    println!();
}

fn print_extract_json(
    output: &Path,
    outcome: &ExtractionOutcome,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let value = serde_json::json!({
        "output": output.display().to_string(),
        "source": outcome.report.source,
        "elapsed_ms": elapsed.as_millis() as u64,
        "checkpoints_written": outcome.checkpoints_written,
        "summary": outcome.report.summary,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_count_table(path: &Path, summary: &CountSummary) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<22} {}", i18n::msg_file(), path.display());
    println!(
        "  {:<22} {}",
        i18n::msg_file_size(),
        format_size(summary.file_size, BINARY)
    );
    println!("  {:<22} {}", i18n::msg_message_count(), summary.messages);
    println!(
        "  {:<22} {} ({:.1}%)",
        i18n::msg_records(),
        summary.records,
        percent(summary.records, summary.messages)
    );
    println!("  {:<22} {}", i18n::msg_skipped(), summary.skipped.total());
    println!("  {:<22} {}", i18n::msg_truncated(), summary.truncated_messages);
    if summary.preamble_lines > 0 {
        println!("  {:<22} {}", i18n::msg_preamble(), summary.preamble_lines);
    }
    println!();
}
