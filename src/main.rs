use anyhow::Result;
use bulk_replace::config::{load_from_path, JobConfig};
use bulk_replace::{Action, CancelFlag, Engine, Outcome, Plan, Report, ReplaceRequest};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bulk-replace")]
#[command(about = "Search and replace across file names and file contents", long_about = None)]
#[command(version)]
struct Cli {
    /// Log planner and executor decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what would be renamed and rewritten without touching anything
    Preview {
        #[command(flatten)]
        job: JobArgs,

        /// Show unified diff of content rewrites
        #[arg(short, long)]
        diff: bool,
    },

    /// Apply the replacement to a file or directory tree
    Apply {
        #[command(flatten)]
        job: JobArgs,

        /// Dry run - show the plan and stop
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of content rewrites
        #[arg(short, long)]
        diff: bool,
    },
}

#[derive(Args)]
struct JobArgs {
    /// File or directory to process (overrides `root` in the job file)
    root: Option<PathBuf>,

    /// Text to search for
    #[arg(short, long)]
    find: Option<String>,

    /// Replacement text (may be empty)
    #[arg(long)]
    replace: Option<String>,

    /// TOML job file with search text, options and filters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Match case exactly
    #[arg(short = 'c', long)]
    case_sensitive: bool,

    /// Only match whole words
    #[arg(short = 'w', long)]
    whole_word: bool,

    /// Only process the immediate children of the root
    #[arg(long)]
    no_recursive: bool,

    /// Do not rename files or directories
    #[arg(long)]
    no_names: bool,

    /// Do not rewrite file contents
    #[arg(long)]
    no_contents: bool,

    /// Skip entries whose path, name or content contains this word
    #[arg(long = "ignore-word", value_name = "WORD")]
    ignore_words: Vec<String>,

    /// Skip this path and everything below it (relative to the current directory)
    #[arg(long = "ignore-path", value_name = "PATH")]
    ignore_paths: Vec<PathBuf>,

    /// Skip files with this extension
    #[arg(long = "ignore-ext", value_name = "EXT")]
    ignore_extensions: Vec<String>,

    /// Also read files with well-known binary extensions
    #[arg(long)]
    scan_binary_extensions: bool,

    /// Print the plan/report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Preview { job, diff } => cmd_preview(job, diff),
        Commands::Apply { job, dry_run, diff } => cmd_apply(job, dry_run, diff),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "bulk_replace=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Merge the job file (if any) with command-line flags. Flags win.
fn build_request(args: &JobArgs) -> Result<ReplaceRequest> {
    let mut job = match &args.config {
        Some(path) => load_from_path(path)?,
        None => JobConfig::default(),
    };

    if let Some(find) = &args.find {
        job.find = find.clone();
    }
    if let Some(replace) = &args.replace {
        job.replace = replace.clone();
    }
    if args.case_sensitive {
        job.options.case_sensitive = true;
    }
    if args.whole_word {
        job.options.whole_word = true;
    }
    if args.no_recursive {
        job.options.recursive = false;
    }
    if args.no_names {
        job.options.include_names = false;
    }
    if args.no_contents {
        job.options.include_contents = false;
    }
    if args.scan_binary_extensions {
        job.filters.skip_binary_extensions = false;
    }
    job.filters
        .ignored_words
        .extend(args.ignore_words.iter().cloned());
    // Job-file paths are relative to the root, flag paths to the shell's cwd.
    let cwd = std::env::current_dir()?;
    job.filters
        .ignored_paths
        .extend(args.ignore_paths.iter().map(|p| cwd.join(p)));
    job.filters
        .ignored_extensions
        .extend(args.ignore_extensions.iter().cloned());

    job.validate()?;
    Ok(job.to_request(args.root.clone())?)
}

/// Cancel the running preview/apply between actions on Ctrl-C.
fn install_cancel_handler() -> CancelFlag {
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_flag.cancel()) {
        warn!(error = %err, "could not install Ctrl-C handler");
    }
    cancel
}

fn cmd_preview(args: JobArgs, show_diff: bool) -> Result<()> {
    let request = build_request(&args)?;
    let cancel = install_cancel_handler();
    let plan = Engine::new().preview_with_cancel(&request, &cancel)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_plan(&plan, show_diff);
    Ok(())
}

fn cmd_apply(args: JobArgs, dry_run: bool, show_diff: bool) -> Result<()> {
    let request = build_request(&args)?;
    let cancel = install_cancel_handler();
    let engine = Engine::new();
    let plan = engine.preview_with_cancel(&request, &cancel)?;

    if plan.is_cancelled() {
        anyhow::bail!("scan cancelled, nothing was changed");
    }

    if dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            println!("{}", "[DRY RUN - showing what would be changed]".cyan());
            print_plan(&plan, show_diff);
        }
        return Ok(());
    }

    if show_diff && !args.json {
        print_diffs(&plan);
    }

    let report = engine.apply_with_cancel(&plan, &cancel);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.committed {
        std::process::exit(1);
    }

    Ok(())
}

fn print_plan(plan: &Plan, show_diff: bool) {
    let summary = plan.summary();

    println!("Root: {}", plan.root().display());
    println!(
        "Replace: {:?} -> {:?}",
        plan.request().search,
        plan.request().replace
    );
    if plan.is_cancelled() {
        println!("{}", "Scan cancelled - plan is partial".yellow());
    }
    println!();

    if !summary.renames.is_empty() {
        println!("{}", "Renames:".bold());
        for rename in &summary.renames {
            let line = format!(
                "{} -> {}",
                rename.from.display(),
                rename.to.file_name().unwrap_or_default().to_string_lossy()
            );
            match &rename.skip {
                None => println!("  {} {}", "✓".green(), line),
                Some(reason) => println!("  {} {} ({})", "⊘".cyan(), line, reason),
            }
        }
        println!();
    }

    let rewrites: Vec<&Action> = plan
        .actions()
        .iter()
        .map(|p| &p.action)
        .filter(|a| !a.is_rename())
        .collect();
    if !rewrites.is_empty() {
        println!("{}", "Content:".bold());
        for action in rewrites {
            if let Action::RewriteContent {
                path,
                match_count,
                lines,
                ..
            } = action
            {
                println!(
                    "  {} {} ({} match{})",
                    "✓".green(),
                    path.display(),
                    match_count,
                    if *match_count == 1 { "" } else { "es" }
                );
                for line in lines {
                    println!("    {:>5}: {}", line.line_number, line.before.red());
                    println!("    {:>5}  {}", "", line.after.green());
                }
            }
        }
        println!();
    }

    if !plan.notes().is_empty() {
        println!("{}", "Notes:".bold());
        for note in plan.notes() {
            println!(
                "  {} {}: {}",
                "⊘".cyan(),
                note.path.display(),
                note.reason.to_string().dimmed()
            );
        }
        println!();
    }

    if show_diff {
        print_diffs(plan);
    }

    println!("{}", "Summary:".bold());
    println!("  {} renames", format!("{}", summary.renames.len()).green());
    println!(
        "  {} matches in {} files",
        format!("{}", summary.content_matches).green(),
        summary.content_files
    );
    println!("  {} skipped", format!("{}", summary.skipped).cyan());
}

fn print_diffs(plan: &Plan) {
    for planned in plan.actions() {
        if let Action::RewriteContent {
            path,
            new_content,
            original_content,
            ..
        } = &planned.action
        {
            display_diff(path, original_content, new_content);
        }
    }
}

/// Helper: Show unified diff between original and rewritten content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (replaced)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
    }
    println!();
}

fn print_report(report: &Report) {
    for entry in &report.entries {
        match &entry.outcome {
            Outcome::Applied => println!("{} {}", "✓".green(), entry.action),
            Outcome::Skipped { reason } => {
                println!("{} {}: Skipped ({})", "⊘".cyan(), entry.action, reason)
            }
            Outcome::Failed { error, .. } => {
                eprintln!("{} {}: Failed - {}", "✗".red(), entry.action, error)
            }
            Outcome::RolledBack => {
                println!("{} {}: Rolled back", "↺".yellow(), entry.action)
            }
        }
    }

    for note in &report.notes {
        println!(
            "{} {}: Skipped ({})",
            "⊘".cyan(),
            note.path.display(),
            note.reason
        );
    }

    for failure in &report.rollback_failures {
        eprintln!(
            "{} {}: Rollback failed - {}",
            "✗".red(),
            failure.path.display(),
            failure.error
        );
    }

    let counts = report.counts();
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", counts.applied).green());
    println!("  {} skipped", format!("{}", counts.skipped).cyan());
    println!("  {} failed", format!("{}", counts.failed).red());
    println!("  {} rolled back", format!("{}", counts.rolled_back).yellow());
    if report.committed {
        println!("{}", "Committed".green().bold());
    } else if report.cancelled {
        println!("{}", "Cancelled - applied changes were kept".yellow().bold());
    } else {
        println!("{}", "Not committed - changes were rolled back".red().bold());
    }
}
