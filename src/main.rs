use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{info, warn};

use vinav::config::{self, Config};
use vinav::engine::{Command as Resolved, KeyEngine};
use vinav::key::{RawKey, canonicalize, join_sequence};
use vinav::keymap::action;
use vinav::session::{Event, Session};
use vinav::terminal::{self, ListFrame, RawGuard};
use vinav::tree::{NodeId, Tree};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VINAV_BUILD_GIT_HASH"),
    " ",
    env!("VINAV_BUILD_PROFILE"),
    ")"
);

#[derive(Parser)]
#[command(name = "vinav", version = VERSION, about = "vi-style key navigation for terminal lists")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Rows visible per list (overrides the config file)
    #[arg(long, global = true)]
    window_height: Option<usize>,

    /// Start from an empty binding table instead of the vi defaults
    #[arg(long, global = true)]
    no_default_keys: bool,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the active binding table
    Bindings,
    /// Echo each resolved command as keys are typed (Ctrl-C quits)
    Keys,
    /// Browse a directory tree; prints the selected path on exit
    Browse {
        /// Directory to browse
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// How many directory levels to load
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if matches!(cli.command, Command::Bindings) {
        env_logger::init();
    }
    // interactive modes + no --log → logger not initialized (no log output)

    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.window_height, cli.no_default_keys);
    let config = cfg.resolve();

    let result = match cli.command {
        Command::Bindings => cmd_bindings(&config),
        Command::Keys => cmd_keys(&config),
        Command::Browse { dir, depth } => cmd_browse(&dir, depth, &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_bindings(config: &Config) -> Result<()> {
    let table = config.binding_table()?;
    for (seq, desc) in table.iter() {
        let mut line = format!("{:<12} {}", join_sequence(seq), desc.name);
        if let Some(read) = desc.read {
            line.push_str(&format!(" (reads {})", read.token_count()));
        }
        if desc.resumable {
            line.push_str(" [resumable]");
        }
        for (key, value) in &desc.extra {
            line.push_str(&format!(" {key}={value}"));
        }
        println!("{line}");
    }
    Ok(())
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn describe(cmd: &Resolved) -> String {
    let mut out = format!("{} -> {}", join_sequence(&cmd.tokens), cmd.action);
    if cmd.count_given {
        out.push_str(&format!(" x{}", cmd.count));
    }
    if let Some(read) = &cmd.read {
        out.push_str(&format!(" read={}", join_sequence(read)));
    }
    for carried in &cmd.carried {
        out.push_str(&format!(" {}={}", carried.action, join_sequence(&carried.tokens)));
    }
    out
}

fn cmd_keys(config: &Config) -> Result<()> {
    let mut engine =
        KeyEngine::new(config.binding_table()?).with_max_count(config.navigation.max_count);
    let _guard = RawGuard::enter().context("failed to enter raw mode")?;
    terminal::println("type keys; Ctrl-C quits")?;

    loop {
        let TermEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        if is_ctrl_c(&key) {
            break;
        }
        let token = canonicalize(&RawKey::from(key));
        match engine.handle_token(token.clone()) {
            Some(cmd) => terminal::println(&format!("{token:<10} {}", describe(&cmd)))?,
            None => terminal::println(&format!("{token:<10} ... {}", engine.pending_display()))?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// browse
// ---------------------------------------------------------------------------

/// Load `dir` into a tree of entry names, `depth` levels deep.
fn load_tree(dir: &Path, depth: usize) -> Result<Tree<String>> {
    let mut tree = Tree::new(dir.display().to_string());
    let root = tree.root();
    load_dir(&mut tree, root, dir, depth)?;
    info!("browse: loaded {} entries from {}", tree.node_count() - 1, dir.display());
    Ok(tree)
}

fn load_dir(tree: &mut Tree<String>, parent: NodeId, dir: &Path, depth: usize) -> Result<()> {
    if depth == 0 {
        return Ok(());
    }
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .flatten()
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let id = tree.create(entry.file_name().to_string_lossy().into_owned());
        tree.add_child(parent, id, None)?;
        if entry.file_type().is_ok_and(|t| t.is_dir())
            && let Err(e) = load_dir(tree, id, &entry.path(), depth - 1)
        {
            warn!("browse: skipping {}: {e:#}", entry.path().display());
        }
    }
    Ok(())
}

struct Browser {
    session: Session<String>,
    status: String,
    selected: Option<PathBuf>,
    quit: bool,
}

impl Browser {
    fn path_of(&self, id: NodeId) -> PathBuf {
        let tree = self.session.tree();
        let parts: Vec<&str> = std::iter::once(id)
            .chain(tree.ancestors(id))
            .filter_map(|n| tree.get(n).map(String::as_str))
            .collect();
        parts.into_iter().rev().collect()
    }

    fn draw(&self) -> Result<()> {
        let tree = self.session.tree();
        let current = self.session.current();
        let (start, end) = self.session.window();
        let rows: Vec<String> = tree
            .visible_children(current, (start, end))
            .iter()
            .map(|&id| {
                let name = tree.get(id).map_or("", String::as_str);
                if tree.has_children(id) {
                    format!("{name}/")
                } else {
                    name.to_string()
                }
            })
            .collect();
        let active = tree
            .active_index(current)
            .and_then(|i| i.checked_sub(start));
        let title = self.path_of(current).display().to_string();
        let pending = self.session.pending_display();
        let status = if pending.is_empty() {
            self.status.as_str()
        } else {
            pending.as_str()
        };
        terminal::draw_list(&ListFrame {
            title: &title,
            rows: &rows,
            active,
            status,
        })?;
        Ok(())
    }

    fn handle(&mut self, events: Vec<Event>) -> Result<()> {
        for ev in events {
            match ev {
                Event::Keybinding(cmd) => self.status = describe(&cmd),
                Event::Select(id) => {
                    self.selected = Some(self.path_of(id));
                    self.quit = true;
                }
                Event::Search { index: None } => self.status = "pattern not found".into(),
                Event::EnterCommandMode { alias } => self.prompt(alias.as_deref())?,
                Event::Highlight(_) | Event::Cd(_) | Event::Search { .. } => {}
            }
        }
        Ok(())
    }

    fn prompt(&mut self, alias: Option<&str>) -> Result<()> {
        let (prefix, dir) = match alias {
            Some(action::SEARCH_NEXT) => ("/", 1),
            Some(action::SEARCH_PREVIOUS) => ("?", -1),
            _ => (":", 0),
        };
        let Some(input) = terminal::read_prompt(prefix)? else {
            return Ok(());
        };
        if dir != 0 {
            if input.is_empty() {
                // empty pattern repeats the last search
                let Some(last) = self.session.last_query().map(str::to_string) else {
                    return Ok(());
                };
                let events = self.session.search(&last, dir);
                return self.handle(events);
            }
            let events = self.session.search(&input, dir);
            return self.handle(events);
        }
        match input.trim() {
            "q" | "quit" => self.quit = true,
            "" => {}
            other => self.status = format!("not a command: {other}"),
        }
        Ok(())
    }
}

fn cmd_browse(dir: &Path, depth: usize, config: &Config) -> Result<()> {
    let table = config.binding_table()?;
    let tree = load_tree(dir, depth)?;
    let mut browser = Browser {
        session: Session::new(tree, table, config.session_options()),
        status: String::new(),
        selected: None,
        quit: false,
    };

    let mut guard = RawGuard::enter().context("failed to enter raw mode")?;
    while !browser.quit {
        let height = terminal::list_height()?.min(config.navigation.window_height);
        browser.session.set_window_height(height);
        browser.draw()?;
        // resize events fall through to the next redraw
        let TermEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        let engine = browser.session.engine();
        let unbound_q = key.code == KeyCode::Char('q')
            && !engine.has_pending_input()
            && engine.table().get_keys("q").is_none();
        if is_ctrl_c(&key) || unbound_q {
            break;
        }
        let events = browser.session.handle_key(key);
        browser.handle(events)?;
    }
    guard.cleanup();

    if let Some(path) = browser.selected {
        println!("{}", path.display());
    }
    Ok(())
}
