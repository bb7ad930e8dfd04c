use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use vellum::config::{load_config, AppConfig, LoggingConfig};
use vellum::manager::BufferManager;
use vellum::model::buffer::{BufferId, MAIN_BRANCH};
use vellum::model::diff::Diff;
use vellum::model::item::Item;
use vellum::model::merge::{MergeOptions, MergeResult, MergeStrategy};
use vellum::model::version::CommitOptions;
use vellum::persist::{InMemorySnapshotStore, JsonFileSnapshotStore, SerializedBuffer, SnapshotStore};

/// Vellum: versioned content buffers with branching and three-way merge
#[derive(Parser)]
#[command(name = "vellum")]
#[command(about = "Versioned content buffers with branching, structural diffs and three-way merge.")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "VELLUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through a fast-forward merge and a conflicting merge
    Demo,
    /// Start an interactive REPL session
    Interactive {
        /// Directory for buffer snapshots; overrides the configured one
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Restore a serialized buffer file and print its branches and history
    Inspect {
        /// Path to a snapshot JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Demo => run_demo(&config),
        Commands::Interactive { snapshot_dir } => run_interactive(&config, snapshot_dir).await,
        Commands::Inspect { file } => run_inspect(&config, &file).await,
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

fn run_demo(config: &AppConfig) -> anyhow::Result<()> {
    let mut manager = BufferManager::new(config.engine.clone());

    println!("=== Fast-forward merge ===\n");
    let doc = manager.create_buffer("doc", vec![json!({"id": "a", "text": "hello"})])?;
    manager.branch(doc, "feature")?;
    manager.switch_branch(doc, "feature", false)?;
    manager.set_content(doc, vec![json!({"id": "a", "text": "hello world"})])?;
    print_diff("working changes", &manager.diff_working(doc)?);
    manager.commit(doc, "edit")?;
    manager.switch_branch(doc, MAIN_BRANCH, false)?;
    let result = manager.merge(doc, "feature", MergeOptions::default())?;
    print_merge(&result);
    print_log(&manager, doc, 10)?;

    println!("\n=== Conflicting merge ===\n");
    let doc = manager.create_buffer("settings", vec![json!({"id": "a", "v": 1})])?;
    manager.branch(doc, "left")?;
    manager.branch(doc, "right")?;

    manager.switch_branch(doc, "right", false)?;
    manager.set_content(doc, vec![json!({"id": "a", "v": 3})])?;
    manager.commit(doc, "set v to 3")?;

    manager.switch_branch(doc, "left", false)?;
    manager.set_content(doc, vec![json!({"id": "a", "v": 2})])?;
    manager.commit(doc, "set v to 2")?;

    let result = manager.merge(doc, "right", MergeOptions::strategy(MergeStrategy::Auto))?;
    print_merge(&result);

    println!("\nRetrying with strategy 'theirs':");
    let result = manager.merge(doc, "right", MergeOptions::strategy(MergeStrategy::Theirs))?;
    print_merge(&result);
    print_log(&manager, doc, 10)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect
// ---------------------------------------------------------------------------

async fn run_inspect(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let snapshot = SerializedBuffer::from_json(&json)?;
    let mut manager = BufferManager::new(config.engine.clone());
    let id = manager.restore(snapshot)?;
    let buffer = manager.buffer(id)?;

    println!("Buffer {} ({})", buffer.name(), buffer.id());
    println!("  versions: {}", buffer.versions().len());
    println!("  dirty:    {}", buffer.is_dirty());
    println!("\nBranches:");
    for branch in buffer.branches() {
        let marker = if branch.name == buffer.current_branch() { "*" } else { " " };
        println!("  {} {:<20} {}", marker, branch.name, branch.head);
    }
    println!();
    print_log(&manager, id, config.engine.history_limit)
}

// ---------------------------------------------------------------------------
// Interactive REPL
// ---------------------------------------------------------------------------

/// State of one REPL session.
struct Session {
    manager: BufferManager,
    current: Option<BufferId>,
    store: Box<dyn SnapshotStore>,
}

impl Session {
    fn current(&self) -> anyhow::Result<BufferId> {
        self.current
            .ok_or_else(|| anyhow!("no buffer selected; use 'new <name>' or 'load <id>'"))
    }
}

async fn run_interactive(config: &AppConfig, snapshot_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let store: Box<dyn SnapshotStore> =
        match snapshot_dir.or_else(|| config.persistence.snapshot_dir.clone()) {
            Some(dir) => {
                println!("Snapshots are stored in {}", dir.display());
                Box::new(JsonFileSnapshotStore::open(dir).await?)
            }
            None => {
                println!("No snapshot directory configured; 'save' keeps snapshots in memory.");
                Box::new(InMemorySnapshotStore::new())
            }
        };
    let mut session = Session {
        manager: BufferManager::new(config.engine.clone()),
        current: None,
        store,
    };

    println!("=== Vellum Interactive REPL ===\n");
    print_help();

    let stdin = io::stdin();
    loop {
        print!("\nvellum> ");
        io::stdout().flush().ok();

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let (cmd, args) = match input.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_lowercase(), args.trim()),
            None => (input.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "help" | "h" | "?" => print_help(),
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            _ => {
                if let Err(e) = dispatch(&mut session, &cmd, args).await {
                    eprintln!("  Error: {}", e);
                }
            }
        }
    }

    session.manager.dispose();
    Ok(())
}

async fn dispatch(session: &mut Session, cmd: &str, args: &str) -> anyhow::Result<()> {
    match cmd {
        "new" => {
            let (name, content) = match args.split_once(char::is_whitespace) {
                Some((name, json)) => (name, parse_items(json)?),
                None if !args.is_empty() => (args, Vec::new()),
                None => bail!("usage: new <name> [json array]"),
            };
            let id = session.manager.create_buffer(name, content)?;
            session.current = Some(id);
            println!("  Created buffer '{}' ({})", name, id);
        }
        "buffers" | "ls" => {
            for buffer in session.manager.list_buffers() {
                let marker = if Some(buffer.id()) == session.current { "*" } else { " " };
                println!("  {} {} {}", marker, buffer.id(), buffer.name());
            }
        }
        "use" => {
            let id: BufferId = args.parse().context("usage: use <buffer id>")?;
            session.manager.buffer(id)?;
            session.current = Some(id);
        }
        "show" => {
            let buffer = session.manager.buffer(session.current()?)?;
            println!(
                "  {} on '{}'{}",
                buffer.name(),
                buffer.current_branch(),
                if buffer.is_dirty() { " (modified)" } else { "" }
            );
            println!("{}", serde_json::to_string_pretty(buffer.working_content())?);
        }
        "set" => {
            let id = session.current()?;
            session.manager.set_content(id, parse_items(args)?)?;
        }
        "append" => {
            let id = session.current()?;
            session.manager.append_content(id, parse_items(args)?)?;
        }
        "commit" => {
            if args.is_empty() {
                bail!("usage: commit <message>");
            }
            let id = session.current()?;
            let version = session.manager.commit_with(id, args, CommitOptions::default())?;
            println!("  Committed {}", version);
        }
        "branch" => {
            let id = session.current()?;
            if args.is_empty() {
                let buffer = session.manager.buffer(id)?;
                for branch in buffer.branches() {
                    let marker = if branch.name == buffer.current_branch() { "*" } else { " " };
                    println!("  {} {}", marker, branch.name);
                }
            } else {
                let branch = session.manager.branch(id, args)?;
                println!("  Created branch '{}' at {}", branch.name, branch.head);
            }
        }
        "switch" => {
            let (name, force) = split_force(args);
            if name.is_empty() {
                bail!("usage: switch <branch> [--force]");
            }
            let id = session.current()?;
            session.manager.switch_branch(id, name, force)?;
            println!("  Switched to '{}'", name);
        }
        "merge" => {
            let mut parts = args.split_whitespace();
            let source = parts
                .next()
                .ok_or_else(|| anyhow!("usage: merge <branch> [auto|ours|theirs|union]"))?;
            let strategy = match parts.next() {
                Some(s) => s.parse::<MergeStrategy>()?,
                None => MergeStrategy::Auto,
            };
            let id = session.current()?;
            let result = session.manager.merge(id, source, MergeOptions::strategy(strategy))?;
            print_merge(&result);
        }
        "diff" => {
            let id = session.current()?;
            let parts: Vec<&str> = args.split_whitespace().collect();
            let diff = match parts.as_slice() {
                [] => session.manager.diff_working(id)?,
                [from, to] => session.manager.diff(id, from, to)?,
                _ => bail!("usage: diff [<from version> <to version>]"),
            };
            print_diff("diff", &diff);
        }
        "log" => {
            let id = session.current()?;
            let limit = if args.is_empty() {
                session.manager.config().history_limit
            } else {
                args.parse().context("usage: log [count]")?
            };
            print_log(&session.manager, id, limit)?;
        }
        "rollback" => {
            let (steps, force) = split_force(args);
            let steps = if steps.is_empty() {
                1
            } else {
                steps.parse().context("usage: rollback [steps] [--force]")?
            };
            let id = session.current()?;
            let version = session.manager.rollback(id, steps, force)?;
            println!("  Head is now {}", version);
        }
        "save" => {
            let id = session.current()?;
            let snapshot = session.manager.serialize(id)?;
            session.store.save(&snapshot).await?;
            println!("  Saved {}", id);
        }
        "load" => {
            if args.is_empty() {
                let ids = session.store.list().await?;
                if ids.is_empty() {
                    println!("  No snapshots stored.");
                }
                for id in ids {
                    println!("  {}", id);
                }
                return Ok(());
            }
            let id: BufferId = args.parse().context("usage: load [buffer id]")?;
            let snapshot = session
                .store
                .load(&id)
                .await?
                .ok_or_else(|| anyhow!("no snapshot for {}", id))?;
            let id = session.manager.restore(snapshot)?;
            session.current = Some(id);
            println!("  Loaded {}", id);
        }
        "export" => {
            if args.is_empty() {
                bail!("usage: export <file>");
            }
            let snapshot = session.manager.serialize(session.current()?)?;
            tokio::fs::write(args, snapshot.to_json()?).await?;
            println!("  Wrote {}", args);
        }
        other => {
            println!(
                "  Unknown command: '{}'. Type 'help' for available commands.",
                other
            );
        }
    }
    Ok(())
}

fn print_help() {
    println!("  Commands:");
    println!("    new <name> [json]       Create a buffer and select it");
    println!("    buffers                 List buffers");
    println!("    use <id>                Select a buffer");
    println!("    show                    Print working content");
    println!("    set <json array>        Replace working content");
    println!("    append <json array>     Append items to working content");
    println!("    commit <message>        Commit working content");
    println!("    branch [name]           List branches or create one at the head");
    println!("    switch <name> [--force] Check out a branch");
    println!("    merge <name> [strategy] Merge a branch into the current one");
    println!("    diff [from to]          Diff working content, or two versions");
    println!("    log [n]                 Show history of the current branch");
    println!("    rollback [n] [--force]  Move the current branch back n versions");
    println!("    save                    Snapshot the buffer into the snapshot store");
    println!("    load [id]               List snapshots, or restore one");
    println!("    export <file>           Write the buffer snapshot to a file");
    println!("    help                    Show this message");
    println!("    quit                    Exit");
}

fn parse_items(json: &str) -> anyhow::Result<Vec<Item>> {
    serde_json::from_str(json).context("content must be a JSON array")
}

fn split_force(args: &str) -> (&str, bool) {
    match args.strip_suffix("--force") {
        Some(rest) => (rest.trim(), true),
        None => (args.trim(), false),
    }
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_diff(label: &str, diff: &Diff) {
    println!("  {} ({})", label, diff.summary);
    for item in &diff.added {
        println!("    + {}", item);
    }
    for item in &diff.removed {
        println!("    - {}", item);
    }
    for m in &diff.modified {
        println!("    ~ {} -> {}", m.old, m.new);
    }
}

fn print_merge(result: &MergeResult) {
    let details = &result.details;
    if details.up_to_date {
        println!("  Already up to date.");
        return;
    }
    if result.success {
        println!(
            "  Merged '{}' into '{}' ({}{})",
            details.source_branch,
            details.target_branch,
            result.strategy,
            if details.fast_forward { ", fast-forward" } else { "" }
        );
        if let Some(id) = &result.new_version_id {
            println!("  New version {}", id);
        }
        for conflict in &details.resolved_conflicts {
            println!("  Resolved conflict on '{}'", conflict.identity);
        }
        return;
    }
    println!("  Merge stopped with {} conflict(s):", result.conflicts.len());
    for conflict in &result.conflicts {
        println!("    {}", conflict.identity);
        println!("      base:   {}", render(&conflict.base));
        println!("      ours:   {}", render(&conflict.ours));
        println!("      theirs: {}", render(&conflict.theirs));
    }
}

fn render(item: &Option<Item>) -> String {
    item.as_ref()
        .map(|i| i.to_string())
        .unwrap_or_else(|| "<deleted>".to_string())
}

fn print_log(manager: &BufferManager, id: BufferId, limit: usize) -> anyhow::Result<()> {
    let buffer = manager.buffer(id)?;
    println!("  History of '{}' on '{}':", buffer.name(), buffer.current_branch());
    for version in manager.history(id, Some(limit))? {
        let tags = if version.tags.is_empty() {
            String::new()
        } else {
            format!(
                " [{}]",
                version.tags.iter().cloned().collect::<Vec<_>>().join(", ")
            )
        };
        println!(
            "    {} {} {}{}",
            version.id,
            version.timestamp.format("%Y-%m-%d %H:%M:%S"),
            version.message,
            tags
        );
    }
    Ok(())
}

