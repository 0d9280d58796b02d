//! CLI for replace rules.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use lsp_types::CodeActionKind;
use replace_rules::prelude::*;
use replace_rules::resolver::rule_ids;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "replace-rules")]
#[command(author, version, about = "Apply configured search-and-replace rules", long_about = None)]
struct Cli {
    /// Workspace root; relative rule files resolve against it
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Settings file (defaults to .replace-rules.json/.yaml in the workspace)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log loading and apply details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Targets {
    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// File extension to filter directories by (e.g., "py", "ts")
    #[arg(short, long)]
    extension: Vec<String>,

    /// Glob pattern to exclude when walking directories
    #[arg(long)]
    exclude: Vec<String>,

    /// Language id to use instead of detecting it from the extension
    #[arg(short, long)]
    language: Option<String>,

    /// Preview changes without writing them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all applicable rules
    Apply {
        #[command(flatten)]
        targets: Targets,
    },

    /// Apply one rule by id (prompts when no id is given)
    ApplyRule {
        /// Rule id
        #[arg(short, long)]
        id: Option<String>,

        /// Behave like a save-time code action (honors language scoping)
        #[arg(long)]
        on_save: bool,

        #[command(flatten)]
        targets: Targets,
    },

    /// Run save-time code actions
    Save {
        /// Code action kinds to run
        #[arg(long, default_value = BROADCAST_KIND)]
        only: Vec<String>,

        #[command(flatten)]
        targets: Targets,
    },

    /// Show the merged rule set and rule file status
    List,

    /// Show the code actions offered
    Actions {
        /// Code action kinds to filter by
        #[arg(long)]
        only: Vec<String>,
    },

    /// Watch rule files and report reloads
    Watch,

    /// Print a path with variables expanded
    Expand {
        path: String,
    },
}

/// Prompts on the terminal.
struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn pick_rule(&self, ids: &[&str]) -> Option<String> {
        eprintln!("Select a rule:");
        for (idx, id) in ids.iter().enumerate() {
            eprintln!("  {}) {}", idx + 1, id);
        }
        eprint!("> ");
        io::stderr().flush().ok()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let choice = line.trim();

        match choice.parse::<usize>() {
            Ok(n) if (1..=ids.len()).contains(&n) => Some(ids[n - 1].to_string()),
            _ => ids.iter().find(|id| **id == choice).map(|id| id.to_string()),
        }
    }

    fn show_info(&self, message: &str) {
        eprintln!("{message}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(&cli)?;
    let loader = RuleLoader::new().workspace_root(&cli.workspace);

    match cli.command {
        Commands::Apply { targets } => {
            let rules = ReplaceRules::new(loader, settings);
            cmd_apply(&targets, |doc| rules.apply_all(doc).map(|o| vec![o]))
        }
        Commands::ApplyRule {
            id,
            on_save,
            targets,
        } => {
            let rules = ReplaceRules::new(loader, settings);
            let trigger = if on_save {
                Trigger::CodeAction
            } else {
                Trigger::Direct
            };

            // Pick once up front so the prompt is not repeated per file.
            let id = match id {
                Some(id) => Some(id),
                None => {
                    let snapshot = rules.rules();
                    let ids = rule_ids(&snapshot);
                    if ids.is_empty() {
                        TerminalPrompt.show_info("No replace rules with an id are configured.");
                        return Ok(());
                    }
                    match TerminalPrompt.pick_rule(&ids) {
                        Some(id) => Some(id),
                        None => return Ok(()),
                    }
                }
            };

            cmd_apply(&targets, |doc| {
                rules
                    .apply_rule(doc, id.as_deref(), trigger, &TerminalPrompt)
                    .map(|o| vec![o])
            })
        }
        Commands::Save { only, targets } => {
            let rules = ReplaceRules::new(loader, settings);
            let kinds: Vec<CodeActionKind> = only.into_iter().map(CodeActionKind::from).collect();
            cmd_apply(&targets, |doc| rules.on_save(doc, &kinds))
        }
        Commands::List => cmd_list(loader, settings),
        Commands::Actions { only } => {
            let rules = ReplaceRules::new(loader, settings);
            let kinds: Vec<CodeActionKind> = only.into_iter().map(CodeActionKind::from).collect();
            let filter = if kinds.is_empty() {
                None
            } else {
                Some(kinds.as_slice())
            };
            for action in rules.code_actions(filter) {
                println!("{}\t{}", action.kind.as_str(), action.title);
            }
            Ok(())
        }
        Commands::Watch => cmd_watch(loader, settings),
        Commands::Expand { path } => {
            println!("{}", loader.resolve_path(&path).display());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Settings::discover(&cli.workspace).context("Failed to load workspace settings"),
    }
}

fn cmd_apply<F>(targets: &Targets, mut run: F) -> Result<()>
where
    F: FnMut(&mut dyn Document) -> replace_rules::Result<Vec<ApplyOutcome>>,
{
    let mut collector = FileCollector::new();
    for ext in &targets.extension {
        collector = collector.extension(ext);
    }
    for pattern in &targets.exclude {
        collector = collector.exclude(pattern);
    }

    let files = collector
        .collect(&targets.paths)
        .context("Failed to collect files")?;
    if files.is_empty() {
        bail!("No files matched");
    }

    let mut summary = replace_rules::diff::DiffSummary::default();
    let mut modified = 0;

    for path in files {
        let mut doc = FileDocument::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        if let Some(language) = &targets.language {
            doc = doc.with_language(language);
        }

        let outcomes = run(&mut doc).with_context(|| format!("Failed to apply rules to {}", path.display()))?;
        for outcome in &outcomes {
            for skipped in &outcome.skipped {
                eprintln!("Skipped rule '{}': {}", skipped.label, skipped.error);
            }
        }

        if !doc.is_modified() {
            continue;
        }
        modified += 1;
        summary.merge(&doc.summary());

        if targets.dry_run {
            println!("{}", doc.colorized_diff());
        } else {
            doc.save()
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    if targets.dry_run {
        println!("\n{summary}");
    } else {
        println!("Modified {modified} file(s)");
    }
    Ok(())
}

fn cmd_list(loader: RuleLoader, settings: Settings) -> Result<()> {
    let mut rules = ReplaceRules::new(loader, settings);
    let report = rules.reload_with_report();

    println!("Rules ({}):", report.rules.len());
    for rule in &report.rules {
        let languages = rule
            .languages
            .as_ref()
            .map(|l| format!(" [{}]", l.join(", ")))
            .unwrap_or_default();
        println!(
            "  {}: /{}/ -> {:?}{}",
            rule.id.as_deref().unwrap_or("-"),
            rule.search,
            rule.replace,
            languages
        );
    }

    if report.inline_dropped > 0 {
        println!("Inline rules dropped: {}", report.inline_dropped);
    }

    if !report.files.is_empty() {
        println!("Rule files:");
        for file in &report.files {
            let status = match &file.status {
                FileStatus::Loaded { rules, dropped } => {
                    format!("{rules} rule(s), {dropped} dropped")
                }
                FileStatus::Missing => "missing".to_string(),
                FileStatus::Failed { error } => format!("failed: {error}"),
            };
            println!("  {} ({}): {}", file.declared, file.path.display(), status);
        }
    }

    Ok(())
}

fn cmd_watch(loader: RuleLoader, settings: Settings) -> Result<()> {
    let mut rules = ReplaceRules::new(loader, settings);
    if rules.rule_file_paths().is_empty() {
        bail!("No rule files are configured");
    }

    rules.watch().context("Failed to watch rule files")?;
    println!("Loaded {} rule(s); watching for changes", rules.rules().len());

    loop {
        if rules.wait_for_file_event(Duration::from_secs(1)) {
            println!("Reloaded {} rule(s)", rules.rules().len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_rule_takes_id_flag() {
        let cli = Cli::try_parse_from(["replace-rules", "apply-rule", "--id", "a", "src", "lib"]).unwrap();
        let Commands::ApplyRule { id, on_save, targets } = cli.command else {
            panic!("expected apply-rule");
        };
        assert_eq!(id.as_deref(), Some("a"));
        assert!(!on_save);
        assert_eq!(targets.paths, vec![PathBuf::from("src"), PathBuf::from("lib")]);
    }

    #[test]
    fn test_apply_rule_id_is_optional() {
        let cli = Cli::try_parse_from(["replace-rules", "apply-rule", "app.py"]).unwrap();
        let Commands::ApplyRule { id, targets, .. } = cli.command else {
            panic!("expected apply-rule");
        };
        assert!(id.is_none());
        assert_eq!(targets.paths, vec![PathBuf::from("app.py")]);
    }
}
