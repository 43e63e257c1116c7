// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! marksort: rule-first, AI-assisted bookmark organizer
//!
//! Works on a bookmark tree snapshot (JSON) and writes the result back.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use marksort::analysis::{AnalysisPipeline, Phase, RunOutcome, StartRequest};
use marksort::catalog::{count_tree, extract_folders, flatten_entries, is_unclassified};
use marksort::classify::AutoClassifier;
use marksort::config::{AppConfig, ConfigFile, ProviderKind, StaticConfig};
use marksort::oracle::{HttpOracleFactory, OracleFactory};
use marksort::organize;
use marksort::rules::{find_matching_rule, MatchType, Rule};
use marksort::suggestion::{ChangeType, Suggestion, SuggestionStatus};
use marksort::tree::{CreateDetails, MemoryTree, TreeStore, OTHER_ID};
use marksort::{MarksortError, Result};

/// marksort CLI - organize bookmarks with rules and AI
#[derive(Parser, Debug)]
#[command(name = "marksort")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Rule-first, AI-assisted bookmark organizer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Bookmark tree snapshot (overrides config)
    #[arg(short, long, global = true)]
    tree: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask for a folder for every entry
    Analyze {
        /// Entries per Oracle request (default from config)
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Only entries sitting directly in a root folder
        #[arg(long)]
        unclassified: bool,

        /// Restrict suggestions to these folder paths (comma separated)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Write the suggestions to a file for review
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Accept every suggestion and organize right away
        #[arg(long)]
        apply: bool,
    },

    /// Propose a folder layout for the whole tree
    Plan,

    /// Apply reviewed suggestions from a file
    Organize {
        /// Suggestions file written by `analyze --output`
        suggestions: PathBuf,

        /// Treat pending suggestions as accepted
        #[arg(long)]
        accept_pending: bool,
    },

    /// Merge duplicate sibling folders
    Dedupe,

    /// Remove empty folders
    Cleanup,

    /// Add an entry and auto-classify it
    Classify {
        /// Entry url
        url: String,

        /// Entry title (defaults to the url)
        #[arg(long)]
        title: Option<String>,

        /// Parent folder id
        #[arg(long, default_value = OTHER_ID)]
        parent: String,
    },

    /// Rule management
    Rules {
        #[command(subcommand)]
        action: RuleCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show provider and tree status
    Status,

    /// Initialize config and an empty tree snapshot
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RuleCommands {
    /// List rules in priority order
    List,

    /// Append a rule
    Add {
        name: String,

        #[arg(long, default_value = "domain", value_parser = ["domain", "wildcard", "regex"])]
        match_type: String,

        pattern: String,

        /// Target folder path, e.g. "Dev/GitHub"
        target: String,
    },

    /// Delete a rule
    Remove { id: String },

    Enable { id: String },

    Disable { id: String },

    /// Set the priority order (rules not listed keep their order at the end)
    Reorder { ids: Vec<String> },

    /// Show which rule a url matches
    Test { url: String },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,

    /// Switch the active provider
    Use {
        #[arg(value_parser = ["openai", "claude", "ollama", "custom"])]
        provider: String,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        base_url: Option<String>,

        #[arg(long)]
        model: Option<String>,
    },

    /// Edit configuration in $EDITOR
    Edit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let tree_path = cli
        .tree
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.tree.path));

    match cli.command {
        Commands::Analyze {
            batch_size,
            unclassified,
            categories,
            output,
            apply,
        } => {
            let options = AnalyzeOptions {
                batch_size,
                unclassified,
                categories,
                output,
                apply,
            };
            run_analyze(&cli.config, &tree_path, options, &cli.format, cli.quiet).await
        }
        Commands::Plan => run_plan(&cli.config, &tree_path, &cli.format).await,
        Commands::Organize {
            suggestions,
            accept_pending,
        } => run_organize(&tree_path, &suggestions, accept_pending, &cli.format).await,
        Commands::Dedupe => run_dedupe(&tree_path, &cli.format).await,
        Commands::Cleanup => run_cleanup(&tree_path, &cli.format).await,
        Commands::Classify { url, title, parent } => run_classify(config, &tree_path, url, title, parent).await,
        Commands::Rules { action } => run_rules_command(config, action, &cli.config),
        Commands::Config { action } => run_config_command(config, action, &cli.config),
        Commands::Status => run_status(config, &tree_path).await,
        Commands::Init { dir, force } => run_init(dir, force),
    }
}

fn print_json<T: serde::Serialize>(value: &T, format: &str) -> Result<()> {
    match format {
        "jsonl" => println!("{}", serde_json::to_string(value)?),
        _ => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

struct AnalyzeOptions {
    batch_size: Option<usize>,
    unclassified: bool,
    categories: Vec<String>,
    output: Option<PathBuf>,
    apply: bool,
}

/// Run a full analysis over the tree snapshot
async fn run_analyze(
    config_path: &Path,
    tree_path: &Path,
    options: AnalyzeOptions,
    format: &str,
    quiet: bool,
) -> Result<()> {
    let store = MemoryTree::load(tree_path)?;
    let tree = store.get_tree().await?;
    let mut entries = flatten_entries(&tree);
    if options.unclassified {
        entries.retain(is_unclassified);
    }
    if entries.is_empty() {
        println!("Nothing to analyze");
        return Ok(());
    }

    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(ConfigFile::new(config_path)),
        Arc::new(HttpOracleFactory),
    ));

    // Stop between batches on Ctrl+C
    let stopper = Arc::clone(&pipeline);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current batch...");
            stopper.stop();
        }
    });

    if !quiet && format == "text" {
        let mut progress = pipeline.attach();
        tokio::spawn(async move {
            while let Some(state) = progress.recv().await {
                let p = state.progress;
                if p.phase == Phase::Analyzing {
                    eprintln!(
                        "Batch {}/{} ({} of {} entries done)",
                        p.current_batch, p.total_batches, p.processed, p.total
                    );
                }
            }
        });
    }

    let request = StartRequest {
        entries,
        folders: extract_folders(&tree),
        batch_size: options.batch_size,
        confirmed_categories: (!options.categories.is_empty()).then_some(options.categories),
    };
    match pipeline.start(request).await {
        RunOutcome::Completed => {}
        RunOutcome::Aborted | RunOutcome::Superseded => {
            warn!("Analysis stopped before completion");
            return Ok(());
        }
        RunOutcome::Failed(message) => return Err(MarksortError::Oracle(message)),
    }

    if options.apply {
        let accepted = pipeline.set_all_pending(SuggestionStatus::Accepted);
        info!("Accepted {} suggestions", accepted);
    }
    let suggestions = pipeline.snapshot().suggestions;

    if let Some(output) = &options.output {
        std::fs::write(output, serde_json::to_string_pretty(&suggestions)?)?;
        info!("Wrote {} suggestions to {:?}", suggestions.len(), output);
    }

    match format {
        "json" => print_json(&suggestions, format)?,
        "jsonl" => {
            for s in &suggestions {
                print_json(s, format)?;
            }
        }
        _ => print_suggestions(&suggestions),
    }

    if options.apply {
        let report = organize::execute_organize(&store, &suggestions).await?;
        store.save(tree_path)?;
        print_organize_report(&report, format)?;
    }

    Ok(())
}

fn print_suggestions(suggestions: &[Suggestion]) {
    let changes: Vec<_> = suggestions
        .iter()
        .filter(|s| s.change_type != ChangeType::NoChange)
        .collect();
    for s in &changes {
        let marker = if s.change_type == ChangeType::NewFolder { "+" } else { "→" };
        println!(
            "{} {}: {} {} {}",
            s.entry_id, s.title, s.current_folder_path, marker, s.suggested_folder_path
        );
        if let Some(reason) = &s.reason {
            println!("    {}", reason);
        }
    }
    println!(
        "\n{} suggestions, {} would change something",
        suggestions.len(),
        changes.len()
    );
}

async fn run_plan(config_path: &Path, tree_path: &Path, format: &str) -> Result<()> {
    let store = MemoryTree::load(tree_path)?;
    let tree = store.get_tree().await?;
    let pipeline = AnalysisPipeline::new(Arc::new(ConfigFile::new(config_path)), Arc::new(HttpOracleFactory));
    let plan = pipeline
        .plan_categories(&flatten_entries(&tree), &extract_folders(&tree))
        .await?;

    if format == "text" {
        for item in &plan {
            match item.estimated_count {
                Some(n) => println!("{} (~{}): {}", item.path, n, item.description),
                None => println!("{}: {}", item.path, item.description),
            }
        }
    } else {
        print_json(&plan, format)?;
    }
    Ok(())
}

async fn run_organize(tree_path: &Path, suggestions_path: &Path, accept_pending: bool, format: &str) -> Result<()> {
    let content = std::fs::read_to_string(suggestions_path)?;
    let mut suggestions: Vec<Suggestion> = serde_json::from_str(&content)?;
    if accept_pending {
        for s in suggestions.iter_mut().filter(|s| s.status == SuggestionStatus::Pending) {
            s.status = SuggestionStatus::Accepted;
        }
    }
    // Edited files may carry stale change types
    for s in suggestions.iter_mut() {
        s.refresh_change_type();
    }

    let store = MemoryTree::load(tree_path)?;
    let report = organize::execute_organize(&store, &suggestions).await?;
    store.save(tree_path)?;
    print_organize_report(&report, format)
}

fn print_organize_report(report: &organize::OrganizeReport, format: &str) -> Result<()> {
    if format != "text" {
        return print_json(report, format);
    }
    println!(
        "Moved {}, failed {}, merged {} duplicate folders, removed {} empty folders",
        report.succeeded, report.failed, report.merged, report.cleaned
    );
    for error in &report.errors {
        eprintln!("  {}", error);
    }
    Ok(())
}

async fn run_dedupe(tree_path: &Path, format: &str) -> Result<()> {
    let store = MemoryTree::load(tree_path)?;
    let report = organize::deduplicate_folders(&store).await?;
    store.save(tree_path)?;
    if format == "text" {
        println!("Merged {} duplicate folders", report.merged);
        for error in &report.errors {
            eprintln!("  {}", error);
        }
        Ok(())
    } else {
        print_json(&report, format)
    }
}

async fn run_cleanup(tree_path: &Path, format: &str) -> Result<()> {
    let store = MemoryTree::load(tree_path)?;
    let report = organize::cleanup_empty_folders(&store).await?;
    store.save(tree_path)?;
    if format == "text" {
        println!("Removed {} empty folders", report.removed);
        Ok(())
    } else {
        print_json(&report, format)
    }
}

/// Create an entry and run it through the auto-classifier
async fn run_classify(config: AppConfig, tree_path: &Path, url: String, title: Option<String>, parent: String) -> Result<()> {
    let store = Arc::new(MemoryTree::load(tree_path)?);
    let silent = config.auto_classify.silent_mode;
    let classifier = AutoClassifier::new(
        store.clone(),
        Arc::new(StaticConfig::new(Some(config))),
        Arc::new(HttpOracleFactory),
    );
    let mut events = classifier.attach();

    let node = store
        .create(CreateDetails {
            parent_id: parent,
            title: title.unwrap_or_default(),
            url: Some(url),
        })
        .await?;
    let reaction = classifier.handle_created(&node.id, &node).await;
    info!("Entry {}: {:?}", node.id, reaction);

    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    if !silent {
        println!("Run `marksort organize` or the control server to accept the suggestion.");
    }
    store.save(tree_path)?;
    Ok(())
}

fn parse_match_type(raw: &str) -> MatchType {
    match raw {
        "wildcard" => MatchType::Wildcard,
        "regex" => MatchType::Regex,
        _ => MatchType::Domain,
    }
}

fn set_rule_enabled(config: &mut AppConfig, id: &str, enabled: bool) -> Result<()> {
    if config.update_rule(id, |r| r.enabled = enabled) {
        Ok(())
    } else {
        Err(MarksortError::Config(format!("No rule with id {}", id)))
    }
}

/// Run rule commands
fn run_rules_command(mut config: AppConfig, action: RuleCommands, config_path: &Path) -> Result<()> {
    match action {
        RuleCommands::List => {
            if config.rules.is_empty() {
                println!("No rules");
            }
            for (i, rule) in config.rules.iter().enumerate() {
                let state = if rule.enabled { "" } else { " [disabled]" };
                println!(
                    "{:>2}. {} ({:?} {}) -> {}{}  id={}",
                    i + 1,
                    rule.name,
                    rule.match_type,
                    rule.pattern,
                    rule.target_folder_path,
                    state,
                    rule.id
                );
            }
            return Ok(());
        }
        RuleCommands::Add {
            name,
            match_type,
            pattern,
            target,
        } => {
            let rule = Rule::new(name, parse_match_type(&match_type), pattern, target);
            println!("Added rule {}", rule.id);
            config.add_rule(rule);
        }
        RuleCommands::Remove { id } => {
            if !config.delete_rule(&id) {
                return Err(MarksortError::Config(format!("No rule with id {}", id)));
            }
        }
        RuleCommands::Enable { id } => set_rule_enabled(&mut config, &id, true)?,
        RuleCommands::Disable { id } => set_rule_enabled(&mut config, &id, false)?,
        RuleCommands::Reorder { ids } => config.reorder_rules(&ids),
        RuleCommands::Test { url } => {
            match find_matching_rule(&url, &config.rules) {
                Some(rule) => println!("{} -> {} (rule '{}')", url, rule.target_folder_path, rule.name),
                None => println!("{} matches no rule", url),
            }
            return Ok(());
        }
    }
    config.save(config_path)
}

/// Run config commands
fn run_config_command(mut config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Active provider: {}", config.ai_provider.active_provider);
            match config.active_provider() {
                Ok(provider) => println!("  Model: {} @ {}", provider.model, provider.effective_base_url()),
                Err(e) => println!("  Provider not usable: {}", e),
            }
            println!("  Rules: {}", config.rules.len());
            println!("  Tree: {}", config.tree.path);
        }
        ConfigCommands::Use {
            provider,
            api_key,
            base_url,
            model,
        } => {
            let kind = match provider.as_str() {
                "claude" => ProviderKind::Claude,
                "ollama" => ProviderKind::Ollama,
                "custom" => ProviderKind::Custom,
                _ => ProviderKind::OpenAi,
            };
            config.ai_provider.active_provider = kind;
            let mut entry = config.ai_provider.active();
            if let Some(key) = api_key {
                entry.api_key = key;
            }
            if let Some(url) = base_url {
                entry.base_url = url;
            }
            if let Some(model) = model {
                entry.model = model;
            }
            config.ai_provider.configs.insert(kind, entry);
            config.save(config_path)?;
            println!("Active provider set to {}", kind);
        }
        ConfigCommands::Edit => {
            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
            std::process::Command::new(editor)
                .arg(config_path)
                .status()?;
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig, tree_path: &Path) -> Result<()> {
    println!("marksort v{} Status", env!("CARGO_PKG_VERSION"));
    println!("====================");

    println!("Provider: {}", config.ai_provider.active_provider);
    match HttpOracleFactory.build(&config) {
        Ok(oracle) => {
            let status = oracle.test_connection().await;
            let marker = if status.ok { "ok" } else { "error" };
            println!("  Connection: {} - {}", marker, status.message);
        }
        Err(e) => println!("  Not configured: {}", e),
    }

    let store = MemoryTree::load(tree_path)?;
    let tree = store.get_tree().await?;
    let counts = count_tree(&tree);
    let unclassified = flatten_entries(&tree).iter().filter(|e| is_unclassified(e)).count();
    println!("\nTree ({}):", tree_path.display());
    println!("  Entries: {} ({} unclassified)", counts.entries, unclassified);
    println!("  Folders: {}", counts.folders);

    println!("\nConfiguration:");
    println!("  Rules: {}", config.rules.len());
    println!("  Batch size: {}", config.batch_size());
    println!(
        "  Auto-classify: {}{}",
        if config.auto_classify.enabled { "on" } else { "off" },
        if config.auto_classify.silent_mode { " (silent)" } else { "" }
    );

    Ok(())
}

/// Initialize config and tree files
fn run_init(dir: Option<PathBuf>, force: bool) -> Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(MarksortError::Config(
            "config.json already exists. Use --force to overwrite".to_string(),
        ));
    }

    std::fs::create_dir_all(&target)?;
    let config = AppConfig::default();
    config.save(&config_path)?;

    let tree_path = target.join(&config.tree.path);
    if !tree_path.exists() {
        MemoryTree::new().save(&tree_path)?;
    }

    println!("marksort initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - {}", config.tree.path);
    println!("\nNext steps:");
    println!("  1. Pick a provider: marksort config use openai --api-key <key>");
    println!("  2. Analyze: marksort analyze --output suggestions.json");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_analyze_command() {
        let cli = Cli::try_parse_from([
            "marksort", "analyze", "--batch-size", "10", "--categories", "Dev,News", "--apply",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze {
                batch_size,
                categories,
                apply,
                ..
            } => {
                assert_eq!(batch_size, Some(10));
                assert_eq!(categories, vec!["Dev".to_string(), "News".to_string()]);
                assert!(apply);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_rules_add_command() {
        let cli = Cli::try_parse_from([
            "marksort", "rules", "add", "gh", "github.com", "Dev/GitHub", "--match-type", "domain",
        ])
        .unwrap();

        match cli.command {
            Commands::Rules {
                action: RuleCommands::Add { name, pattern, target, .. },
            } => {
                assert_eq!(name, "gh");
                assert_eq!(pattern, "github.com");
                assert_eq!(target, "Dev/GitHub");
            }
            _ => panic!("Expected rules add"),
        }
    }

    #[test]
    fn test_global_tree_override() {
        let cli = Cli::try_parse_from(["marksort", "dedupe", "--tree", "/tmp/t.json"]).unwrap();
        assert_eq!(cli.tree, Some(PathBuf::from("/tmp/t.json")));
    }

    #[test]
    fn test_rules_commands_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        run_rules_command(
            AppConfig::default(),
            RuleCommands::Add {
                name: "gh".to_string(),
                match_type: "wildcard".to_string(),
                pattern: "*.github.com".to_string(),
                target: "Dev".to_string(),
            },
            &path,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].match_type, MatchType::Wildcard);

        let id = config.rules[0].id.clone();
        run_rules_command(config, RuleCommands::Disable { id: id.clone() }, &path).unwrap();
        assert!(!AppConfig::load(&path).unwrap().rules[0].enabled);

        let missing = run_rules_command(
            AppConfig::load(&path).unwrap(),
            RuleCommands::Remove { id: "nope".to_string() },
            &path,
        );
        assert!(missing.is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_init(Some(dir.path().to_path_buf()), false).unwrap();
        assert!(dir.path().join("bookmarks.json").exists());
        assert!(run_init(Some(dir.path().to_path_buf()), false).is_err());
    }
}
