//! One navigation session: key engine, searcher and tree wired together.
//!
//! Keystrokes go in, typed events come out. The session applies the
//! default behavior for every resolved binding (list motions, descending
//! into and out of tree levels, repeated search) and reports what changed;
//! drawing is left to the caller.

use std::fmt::Display;

use crossterm::event::{KeyEvent, KeyEventKind};
use log::{debug, warn};

use crate::engine::{Command, KeyEngine, MAX_COUNT};
use crate::key::{RawKey, Token, canonicalize};
use crate::keymap::{BindingTable, COMMAND_ALIAS, action};
use crate::search::{SearchOptions, Searchable, Searcher, smartcase_regex};
use crate::tree::{ChildRef, NodeId, Tree};
use crate::viewport::{ListViewport, Motion, scroll_position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Rows visible per tree level.
    pub window_height: usize,
    pub max_count: u32,
    pub search_cache: bool,
    /// All-lowercase queries ignore case. Queries are always matched as
    /// literal substrings of the item label.
    pub smartcase: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window_height: 20,
            max_count: MAX_COUNT,
            search_cache: true,
            smartcase: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Every resolved binding, before its default behavior ran.
    Keybinding(Command),
    /// The active child of the current node changed.
    Highlight(NodeId),
    /// The current node changed.
    Cd(NodeId),
    /// A leaf was chosen.
    Select(NodeId),
    Search { index: Option<usize> },
    /// A prompt key was pressed; `alias` names the command the prompt
    /// input should be run as.
    EnterCommandMode { alias: Option<String> },
}

pub struct Session<T> {
    engine: KeyEngine,
    searcher: Searcher,
    tree: Tree<T>,
    current: NodeId,
    options: SessionOptions,
    last_query: Option<String>,
    last_dir: i64,
}

impl<T: Searchable + Display> Session<T> {
    pub fn new(tree: Tree<T>, table: BindingTable, options: SessionOptions) -> Self {
        let current = tree.root();
        Self {
            engine: KeyEngine::new(table).with_max_count(options.max_count),
            searcher: Searcher::new(),
            tree,
            current,
            options,
            last_query: None,
            last_dir: 1,
        }
    }

    pub fn tree(&self) -> &Tree<T> {
        &self.tree
    }

    pub fn engine(&self) -> &KeyEngine {
        &self.engine
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Resize the visible window (e.g. on terminal resize), scrolling the
    /// current level so the highlighted row stays visible.
    pub fn set_window_height(&mut self, height: usize) {
        let height = height.max(1);
        if height == self.options.window_height {
            return;
        }
        debug!("session: window height {} -> {height}", self.options.window_height);
        self.options.window_height = height;
        self.reveal();
    }

    /// Scroll the current level so the window is filled where the list
    /// allows it and its active row is visible.
    fn reveal(&mut self) {
        let page = self.tree.children(self.current).len().saturating_sub(1);
        let full = page.saturating_sub(self.options.window_height.max(1) - 1);
        if self.tree.scroll_pos_y(self.current) > full {
            self.set_scroll(full);
        }
        let view = self.list_viewport();
        if let Some(scroll) = scroll_position(view.cursor_row, view.page_height, view.window, None) {
            self.set_scroll(scroll);
        }
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.tree.active_child(self.current)
    }

    /// Inclusive range of rows visible in the current level.
    pub fn window(&self) -> (usize, usize) {
        let page = self.tree.children(self.current).len().saturating_sub(1);
        let start = self.tree.scroll_pos_y(self.current).min(page);
        let end = (start + self.options.window_height.max(1) - 1).min(page);
        (start, end)
    }

    fn list_viewport(&self) -> ListViewport {
        ListViewport {
            cursor_row: self.tree.active_index(self.current).unwrap_or(0),
            page_height: self.tree.children(self.current).len().saturating_sub(1),
            window: self.window(),
        }
    }

    /// Mutate the tree. Cached search results are dropped and the current
    /// node is re-clamped (or reset to the root if it was detached).
    pub fn modify_tree<R>(&mut self, f: impl FnOnce(&mut Tree<T>) -> R) -> R {
        let out = f(&mut self.tree);
        self.searcher.clear_cache(None);
        let root = self.tree.root();
        let attached = self.current == root || self.tree.ancestors(self.current).any(|a| a == root);
        if !self.tree.contains(self.current) || !attached {
            debug!("session: current node {} gone, back to root", self.current);
            self.current = root;
        }
        self.tree.update(self.current);
        out
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Event> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        self.handle_token(canonicalize(&RawKey::from(key)))
    }

    pub fn handle_token(&mut self, token: Token) -> Vec<Event> {
        let Some(cmd) = self.engine.handle_token(token) else {
            return Vec::new();
        };
        let mut events = vec![Event::Keybinding(cmd.clone())];
        self.apply(&cmd, &mut events);
        events
    }

    fn apply(&mut self, cmd: &Command, events: &mut Vec<Event>) {
        match cmd.action.as_str() {
            action::CURSOR_LEFT => {
                if let Some(parent) = self.tree.parent(self.current) {
                    self.enter(parent, events);
                }
            }
            action::CURSOR_RIGHT | action::ENTER => {
                if let Some(child) = self.highlighted() {
                    if self.tree.has_children(child) {
                        self.enter(child, events);
                    } else {
                        events.push(Event::Select(child));
                    }
                }
            }
            action::SEARCH_NEXT | action::SEARCH_PREVIOUS => {
                if let Some(query) = self.last_query.clone() {
                    let dir = if cmd.action == action::SEARCH_NEXT { 1 } else { -1 };
                    self.run_search(&query, cmd.signed_count() * dir * self.last_dir, events);
                }
            }
            action::FIND => {
                if let Some(c) = cmd.read_char() {
                    self.find(c, cmd.signed_count(), events);
                }
            }
            action::ENTER_COMMAND_MODE => events.push(Event::EnterCommandMode {
                alias: cmd.extra_str(COMMAND_ALIAS).map(str::to_string),
            }),
            name => {
                if let Ok(motion) = name.parse::<Motion>() {
                    self.apply_motion(motion, cmd.count_given.then_some(cmd.count), events);
                }
            }
        }
    }

    /// Make `node` the current node. Leaves cannot be entered.
    pub fn cd(&mut self, node: NodeId) -> Vec<Event> {
        let mut events = Vec::new();
        self.enter(node, &mut events);
        events
    }

    fn enter(&mut self, node: NodeId, events: &mut Vec<Event>) {
        if !self.tree.has_children(node) {
            return;
        }
        debug!("session: cd {} -> {node}", self.current);
        self.current = node;
        self.tree.update(node);
        self.reveal();
        events.push(Event::Cd(node));
        if let Some(child) = self.highlighted() {
            events.push(Event::Highlight(child));
        }
    }

    fn apply_motion(&mut self, motion: Motion, count: Option<u32>, events: &mut Vec<Event>) {
        if !self.tree.has_children(self.current) {
            return;
        }
        let nav = self.list_viewport().navigate(motion, count);
        if let Some(scroll) = nav.scroll {
            self.set_scroll(scroll);
        }
        self.highlight(nav.cursor_row, events);
    }

    fn set_scroll(&mut self, scroll: usize) {
        if self.tree.set_scroll_pos_y(self.current, scroll).is_err() {
            warn!("session: current node {} is stale", self.current);
        }
    }

    fn highlight(&mut self, row: usize, events: &mut Vec<Event>) {
        let moved = self
            .tree
            .set_active_child(self.current, ChildRef::from(row))
            .unwrap_or(false);
        if moved && let Some(child) = self.highlighted() {
            events.push(Event::Highlight(child));
        }
    }

    /// Move the cursor to a search hit, scrolling it into view.
    fn jump(&mut self, row: usize, events: &mut Vec<Event>) {
        let view = self.list_viewport();
        if let Some(scroll) = scroll_position(row, view.page_height, view.window, Some(view.cursor_row)) {
            self.set_scroll(scroll);
        }
        self.highlight(row, events);
    }

    /// Search the current level for `query`. A negative `count` searches
    /// backward and makes `n` continue backward.
    pub fn search(&mut self, query: &str, count: i64) -> Vec<Event> {
        self.last_dir = if count < 0 { -1 } else { 1 };
        let mut events = Vec::new();
        self.run_search(query, count, &mut events);
        events
    }

    fn run_search(&mut self, query: &str, count: i64, events: &mut Vec<Event>) {
        let opts = SearchOptions {
            start: self.tree.active_index(self.current).unwrap_or(0),
            count,
            use_cache: self.options.search_cache,
        };
        let tree = &self.tree;
        let children = tree.children(self.current);

        let index = if self.options.smartcase {
            match smartcase_regex(&regex::escape(query)) {
                Ok(re) => self.searcher.search_by(children, query, opts, |&id, _, _| {
                    tree.get(id).is_some_and(|item| re.is_match(&item.to_string()))
                }),
                Err(e) => {
                    warn!("session: invalid search pattern {query:?}: {e}");
                    None
                }
            }
        } else {
            self.searcher.search_by(children, query, opts, |&id, q, _| {
                tree.get(id).is_some_and(|item| item.matches(q))
            })
        };
        debug!("session: search {query:?} count={count} -> {index:?}");

        self.last_query = Some(query.to_string());
        events.push(Event::Search { index });
        if let Some(row) = index {
            self.jump(row, events);
        }
    }

    /// Jump to the `count`-th next item whose label starts with `prefix`.
    fn find(&mut self, prefix: &str, count: i64, events: &mut Vec<Event>) {
        let opts = SearchOptions {
            start: self.tree.active_index(self.current).unwrap_or(0),
            count,
            use_cache: false,
        };
        let tree = &self.tree;
        let found = self.searcher.search_by(
            tree.children(self.current),
            prefix,
            opts,
            |&id, q, _| tree.get(id).is_some_and(|item| item.to_string().starts_with(q)),
        );
        if let Some(row) = found {
            self.jump(row, events);
        }
    }

    pub fn pending_display(&self) -> String {
        self.engine.pending_display()
    }
}
