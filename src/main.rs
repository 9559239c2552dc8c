use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use donor_merge::discovery::discover;
use donor_merge::{
    check_required, clean_export, load_households, run_ack, AppConfig, CleanOutcome, Discovered,
    InputKind, Journal, MailMerge, MembershipSource, Table, TitleGenderValidator, ViolationPolicy,
};

/// Exit status when records need manual review before continuing
const NEEDS_REVIEW: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "donor-merge")]
#[command(about = "Household salutations, gift acknowledgments and letter merge for CRM exports")]
#[command(version)]
struct Cli {
    /// TOML config (title lists, column names, ack and merge settings)
    #[arg(long, env = "DONOR_MERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the exports
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report which required input files are present
    Check,
    /// Check titles against genders in a household export
    Validate {
        /// Household export (default: *_export.csv in --dir)
        export: Option<PathBuf>,
    },
    /// Derive addressees/salutations and write the `_clean` export
    Clean {
        export: Option<PathBuf>,
        /// Classify even when title/gender violations were found
        #[arg(long)]
        proceed_with_violations: bool,
    },
    /// Build the dated gift acknowledgment summary
    Ack(AckArgs),
    /// Merge the gift summary into one letter per row
    Merge {
        /// Gift summary (default: latest *_complete.csv in --dir)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Plain-text letter template with «Column» placeholders
        #[arg(long)]
        template: Option<PathBuf>,
        /// Journal database (default: from config, in --dir)
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Keep the per-letter files after combining
        #[arg(long)]
        keep_parts: bool,
    },
}

#[derive(Args, Debug)]
struct AckArgs {
    #[arg(long)]
    gifts: Option<PathBuf>,
    #[arg(long)]
    clean: Option<PathBuf>,
    #[arg(long, conflicts_with = "skip_membership")]
    membership: Option<PathBuf>,
    /// Continue without the membership list
    #[arg(long)]
    skip_membership: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::Check => run_check(&cli.dir, &config),
        Command::Validate { export } => run_validate(&cli.dir, &config, export),
        Command::Clean {
            export,
            proceed_with_violations,
        } => {
            let policy = if proceed_with_violations {
                ViolationPolicy::Proceed
            } else {
                ViolationPolicy::Halt
            };
            run_clean(&cli.dir, &config, export, policy)
        }
        Command::Ack(args) => run_ack_step(&cli.dir, &config, args),
        Command::Merge {
            data,
            template,
            journal,
            keep_parts,
        } => run_merge(&cli.dir, &config, data, template, journal, keep_parts),
    }
}

/// Explicit path, else the discovered one for `kind`
fn resolve(explicit: Option<PathBuf>, found: &Discovered, kind: InputKind) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(found.require(kind)?.to_path_buf()),
    }
}

fn open_journal(dir: &Path, config: &AppConfig) -> Result<Journal> {
    let path = dir.join(&config.merge.journal_name);
    Journal::open(&path).with_context(|| format!("opening journal {}", path.display()))
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run_check(dir: &Path, config: &AppConfig) -> Result<ExitCode> {
    let found = check_required(dir, &config.merge)?;
    println!("✓ All required inputs present in {}", dir.display());
    for kind in [
        InputKind::HouseholdExport,
        InputKind::CleanHouseholds,
        InputKind::GiftExport,
        InputKind::Membership,
        InputKind::Template,
        InputKind::GiftSummary,
    ] {
        match found.path(kind) {
            Some(path) => println!("  {:<16} {}", kind.label(), path.display()),
            None => println!("  {:<16} (none)", kind.label()),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(dir: &Path, config: &AppConfig, export: Option<PathBuf>) -> Result<ExitCode> {
    let found = discover(dir, &config.merge)?;
    let path = resolve(export, &found, InputKind::HouseholdExport)?;

    let table = Table::read(&path)?;
    let records = load_households(&table)?;
    let report = TitleGenderValidator::new(&config.titles).validate(&records);
    open_journal(dir, config)?.log_validation(&source_name(&path), &report)?;

    if report.is_clean() {
        println!("✅ {}", report.summary());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}", report.render_grid());
        println!("❌ {}", report.summary());
        Ok(ExitCode::from(NEEDS_REVIEW))
    }
}

fn run_clean(
    dir: &Path,
    config: &AppConfig,
    export: Option<PathBuf>,
    policy: ViolationPolicy,
) -> Result<ExitCode> {
    let found = discover(dir, &config.merge)?;
    let path = resolve(export, &found, InputKind::HouseholdExport)?;

    let run = clean_export(&path, config, policy)?;
    let journal = open_journal(dir, config)?;
    let source = source_name(&path);
    journal.log_validation(&source, run.outcome.validation())?;

    if let Some(listing) = &run.violations_file {
        println!("⚠️  Violations listed in {}", listing.display());
    }

    match &run.outcome {
        CleanOutcome::Halted(report) => {
            println!("{}", report.render_grid());
            println!("❌ {}", report.summary());
            println!("   Fix the records or rerun with --proceed-with-violations");
            Ok(ExitCode::from(NEEDS_REVIEW))
        }
        CleanOutcome::Cleaned(report) => {
            journal.log_clean(&source, report)?;
            if let Some(clean) = &run.clean_file {
                println!("✅ Wrote {}", clean.display());
            }
            println!("   {}", report.summary());
            if !report.fallthrough_ids.is_empty() {
                println!(
                    "⚠️  Blank addressee/salutation for: {}",
                    report.fallthrough_ids.join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_ack_step(dir: &Path, config: &AppConfig, args: AckArgs) -> Result<ExitCode> {
    let found = discover(dir, &config.merge)?;
    let gifts = resolve(args.gifts, &found, InputKind::GiftExport)?;
    let clean = resolve(args.clean, &found, InputKind::CleanHouseholds)?;

    let membership = match (args.membership, args.skip_membership) {
        (Some(path), _) => MembershipSource::File(path),
        (None, true) => MembershipSource::Skip,
        (None, false) => match found.membership.clone() {
            Some(path) => MembershipSource::File(path),
            None => MembershipSource::Missing,
        },
    };

    let today = chrono::Local::now().date_naive();
    let run = run_ack(&gifts, &clean, &membership, dir, &config.ack, today).context(
        "building the acknowledgment summary (use --skip-membership to continue without one)",
    )?;
    open_journal(dir, config)?.log_reconciliation(&source_name(&gifts), &run.reconciliation)?;

    for m in &run.reconciliation.missing_from_gifts {
        println!("  in households, no gift: {:<10} {}", m.id, m.addressee);
    }
    for m in &run.reconciliation.missing_from_households {
        println!("  gift, no household:     {:<10} {}", m.id, m.addressee);
    }
    println!(
        "✅ Wrote {} rows to {}",
        run.summaries.len(),
        run.output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_merge(
    dir: &Path,
    config: &AppConfig,
    data: Option<PathBuf>,
    template: Option<PathBuf>,
    journal: Option<PathBuf>,
    keep_parts: bool,
) -> Result<ExitCode> {
    let found = discover(dir, &config.merge)?;
    let data = resolve(data, &found, InputKind::GiftSummary)?;
    let template = resolve(template, &found, InputKind::Template)?;

    let journal_path = journal.unwrap_or_else(|| dir.join(&config.merge.journal_name));
    let journal = Journal::open(&journal_path)
        .with_context(|| format!("opening journal {}", journal_path.display()))?;

    let mut merge_config = config.merge.clone();
    if keep_parts {
        merge_config.remove_parts = false;
    }

    info!("Merging {} into {}", data.display(), template.display());
    let outcome = MailMerge::new(dir, &merge_config)
        .with_journal(&journal)
        .run_files(&data, &template)?;

    println!(
        "✅ {} letters combined into {} ({} reused from an earlier run)",
        outcome.documents,
        outcome.combined.display(),
        outcome.reused
    );
    Ok(ExitCode::SUCCESS)
}
