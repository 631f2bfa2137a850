//! Binding table: token sequences mapped to action descriptors, plus the
//! prefix tree consulted while a multi-key sequence is still being typed.
//!
//! Tables are validated when installed. Anything that could only fail
//! during interactive use (an unknown read routine, a binding shadowed by a
//! longer sequence) is rejected here instead.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::key::{Token, join_sequence, parse_sequence};

/// Action names used by the default table and understood by the session.
pub mod action {
    pub const ESCAPE: &str = "escape";
    pub const ENTER: &str = "enter";
    pub const CURSOR_UP: &str = "cursor-up";
    pub const CURSOR_DOWN: &str = "cursor-down";
    pub const CURSOR_LEFT: &str = "cursor-left";
    pub const CURSOR_RIGHT: &str = "cursor-right";
    pub const CURSOR_TO_DOCUMENT_LEFT: &str = "cursor-to-document-left";
    pub const CURSOR_TO_DOCUMENT_RIGHT: &str = "cursor-to-document-right";
    pub const CURSOR_TO_DOCUMENT_TOP: &str = "cursor-to-document-top";
    pub const CURSOR_TO_DOCUMENT_BOTTOM: &str = "cursor-to-document-bottom";
    pub const CURSOR_TO_WINDOW_TOP: &str = "cursor-to-window-top";
    pub const CURSOR_TO_WINDOW_MIDDLE: &str = "cursor-to-window-middle";
    pub const CURSOR_TO_WINDOW_BOTTOM: &str = "cursor-to-window-bottom";
    pub const SCROLL_FULL_WINDOW_DOWN: &str = "scroll-full-window-down";
    pub const SCROLL_FULL_WINDOW_UP: &str = "scroll-full-window-up";
    pub const SCROLL_HALF_WINDOW_DOWN: &str = "scroll-half-window-down";
    pub const SCROLL_HALF_WINDOW_UP: &str = "scroll-half-window-up";
    pub const SCROLL_CURSOR_TO_WINDOW_TOP: &str = "scroll-cursor-to-window-top";
    pub const SCROLL_CURSOR_TO_WINDOW_MIDDLE: &str = "scroll-cursor-to-window-middle";
    pub const SCROLL_CURSOR_TO_WINDOW_BOTTOM: &str = "scroll-cursor-to-window-bottom";
    pub const SEARCH_NEXT: &str = "search-next";
    pub const SEARCH_PREVIOUS: &str = "search-previous";
    pub const FIND: &str = "find";
    pub const ENTER_COMMAND_MODE: &str = "enter-command-mode";
    pub const REGISTER: &str = "register";
}

/// Extra key naming the search direction a prompt key stands for.
pub const COMMAND_ALIAS: &str = "command-alias";

/// Action name that removes a binding when used in a configuration file.
pub const UNBIND: &str = "none";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("empty key sequence")]
    EmptySequence,

    #[error("unknown read function \"{read}\" for \"{keys}\"")]
    UnknownReadFunction { keys: String, read: String },

    #[error("\"{keys}\" starts with a count digit and can never be reached")]
    UnreachableSequence { keys: String },

    #[error("\"{prefix}\" is bound and is also a prefix of \"{keys}\"")]
    PrefixConflict { prefix: String, keys: String },

    #[error("\"{keys}\" is resumable but reads nothing")]
    ResumableWithoutRead { keys: String },

    #[error("\"{keys}\" reads zero characters")]
    EmptyRead { keys: String },
}

/// How many extra tokens a binding consumes after it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSpec {
    /// Exactly one token, as in vi `f<char>`.
    OneChar,
    /// Exactly `n` tokens.
    Chars(usize),
}

impl ReadSpec {
    /// Number of tokens to collect before the read completes.
    pub fn token_count(self) -> usize {
        match self {
            ReadSpec::OneChar => 1,
            ReadSpec::Chars(n) => n,
        }
    }

    /// Resolve a read-routine name from a configuration file.
    pub fn from_name(keys: &str, name: &str) -> Result<Self, BindingError> {
        match name {
            "one-char" | "read-one-char" | "readOneChar" => Ok(ReadSpec::OneChar),
            _ => match name.strip_prefix("chars:").map(str::parse::<usize>) {
                Some(Ok(n)) => Ok(ReadSpec::Chars(n)),
                _ => Err(BindingError::UnknownReadFunction {
                    keys: keys.to_string(),
                    read: name.to_string(),
                }),
            },
        }
    }
}

/// What a bound sequence resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub name: String,
    pub read: Option<ReadSpec>,
    /// After the read completes, return to pending input and carry the read
    /// into the next command (vi registers).
    pub resumable: bool,
    pub extra: BTreeMap<String, toml::Value>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read: None,
            resumable: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_read(mut self, read: ReadSpec) -> Self {
        self.read = Some(read);
        self
    }

    pub fn resumable(mut self) -> Self {
        self.resumable = true;
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

impl From<&str> for ActionDescriptor {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Read routine as written in a configuration file: a name, or `{ chars = n }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReadValue {
    Name(String),
    Chars { chars: usize },
}

/// One `[keys]` entry of a configuration file.
///
/// ```toml
/// [keys]
/// "g h" = "cursor-to-document-top"
/// "m" = { action = "mark", read = "one-char" }
/// "'" = { action = "jump-mark", read = { chars = 1 }, label = "jump" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BindingSpec {
    Action(String),
    Full {
        action: String,
        #[serde(default)]
        read: Option<ReadValue>,
        #[serde(default)]
        resumable: bool,
        #[serde(flatten)]
        extra: BTreeMap<String, toml::Value>,
    },
}

impl BindingSpec {
    pub fn action(&self) -> &str {
        match self {
            BindingSpec::Action(a) => a,
            BindingSpec::Full { action, .. } => action,
        }
    }

    /// Convert to a descriptor, resolving the read routine by name.
    pub fn to_descriptor(&self, keys: &str) -> Result<ActionDescriptor, BindingError> {
        match self {
            BindingSpec::Action(a) => Ok(ActionDescriptor::new(a.as_str())),
            BindingSpec::Full {
                action,
                read,
                resumable,
                extra,
            } => {
                let read = match read {
                    None => None,
                    Some(ReadValue::Name(name)) => Some(ReadSpec::from_name(keys, name)?),
                    Some(ReadValue::Chars { chars }) => Some(ReadSpec::Chars(*chars)),
                };
                Ok(ActionDescriptor {
                    name: action.clone(),
                    read,
                    resumable: *resumable,
                    extra: extra.clone(),
                })
            }
        }
    }
}

/// Index of every proper prefix of the bound sequences.
///
/// A node exists for a token path exactly when some longer binding
/// continues it, which is what decides "keep waiting" during input.
#[derive(Debug, Clone, Default)]
pub struct PrefixTree {
    children: HashMap<Token, PrefixTree>,
}

impl PrefixTree {
    fn build<'a>(sequences: impl Iterator<Item = &'a [Token]>) -> Self {
        let mut root = PrefixTree::default();
        for seq in sequences {
            let Some((_, prefix)) = seq.split_last() else {
                continue;
            };
            let mut node = &mut root;
            for token in prefix {
                node = node.children.entry(token.clone()).or_default();
            }
        }
        root
    }

    pub fn child(&self, token: &Token) -> Option<&PrefixTree> {
        self.children.get(token)
    }

    /// Walk `path` from this node.
    pub fn descend(&self, path: &[Token]) -> Option<&PrefixTree> {
        path.iter().try_fold(self, |node, t| node.child(t))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Tokens that can follow this node.
    pub fn continuations(&self) -> impl Iterator<Item = &Token> {
        self.children.keys()
    }
}

/// Ordered mapping from token sequences to actions.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: Vec<(Vec<Token>, ActionDescriptor)>,
    index: HashMap<Vec<Token>, usize>,
    tree: PrefixTree,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate a table. Later entries with the same sequence
    /// replace earlier ones in place.
    pub fn install<I, K, A>(entries: I) -> Result<Self, BindingError>
    where
        I: IntoIterator<Item = (K, A)>,
        K: AsRef<str>,
        A: Into<ActionDescriptor>,
    {
        let mut seqs = Vec::new();
        for (keys, desc) in entries {
            let seq = parse_sequence(keys.as_ref());
            if seq.is_empty() {
                return Err(BindingError::EmptySequence);
            }
            seqs.push((seq, desc.into()));
        }
        let table = Self::assemble(seqs);
        table.validate()?;
        debug!("keymap: installed {} bindings", table.len());
        Ok(table)
    }

    /// Build without validation; callers guarantee a well-formed table.
    fn assemble(entries: Vec<(Vec<Token>, ActionDescriptor)>) -> Self {
        let mut table = Self::default();
        for (seq, desc) in entries {
            match table.index.get(&seq) {
                Some(&i) => table.entries[i].1 = desc,
                None => {
                    table.index.insert(seq.clone(), table.entries.len());
                    table.entries.push((seq, desc));
                }
            }
        }
        table.tree = PrefixTree::build(table.entries.iter().map(|(s, _)| s.as_slice()));
        table
    }

    fn validate(&self) -> Result<(), BindingError> {
        for (seq, desc) in &self.entries {
            let keys = || join_sequence(seq);
            if seq[0].digit().is_some_and(|d| d != 0) {
                return Err(BindingError::UnreachableSequence { keys: keys() });
            }
            match desc.read {
                Some(read) if read.token_count() == 0 => {
                    return Err(BindingError::EmptyRead { keys: keys() });
                }
                None if desc.resumable => {
                    return Err(BindingError::ResumableWithoutRead { keys: keys() });
                }
                _ => {}
            }
            for end in 1..seq.len() {
                if self.index.contains_key(&seq[..end]) {
                    return Err(BindingError::PrefixConflict {
                        prefix: join_sequence(&seq[..end]),
                        keys: keys(),
                    });
                }
            }
        }
        Ok(())
    }

    fn owned_entries(&self) -> Vec<(Vec<Token>, ActionDescriptor)> {
        self.entries.clone()
    }

    fn replace_with(&mut self, entries: Vec<(Vec<Token>, ActionDescriptor)>) -> Result<(), BindingError> {
        let table = Self::assemble(entries);
        table.validate()?;
        *self = table;
        Ok(())
    }

    pub fn get(&self, seq: &[Token]) -> Option<&ActionDescriptor> {
        self.index.get(seq).map(|&i| &self.entries[i].1)
    }

    pub fn get_keys(&self, keys: &str) -> Option<&ActionDescriptor> {
        self.get(&parse_sequence(keys))
    }

    pub fn prefix_tree(&self) -> &PrefixTree {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bindings in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&[Token], &ActionDescriptor)> {
        self.entries.iter().map(|(s, d)| (s.as_slice(), d))
    }

    /// Bind `keys`, re-validating the whole table. On error the table is
    /// left unchanged.
    pub fn set(
        &mut self,
        keys: &str,
        desc: impl Into<ActionDescriptor>,
    ) -> Result<Option<ActionDescriptor>, BindingError> {
        let seq = parse_sequence(keys);
        if seq.is_empty() {
            return Err(BindingError::EmptySequence);
        }
        let previous = self.get(&seq).cloned();
        let mut entries = self.owned_entries();
        entries.push((seq, desc.into()));
        self.replace_with(entries)?;
        Ok(previous)
    }

    pub fn remove(&mut self, keys: &str) -> Option<ActionDescriptor> {
        let seq = parse_sequence(keys);
        let i = *self.index.get(&seq)?;
        let mut entries = self.owned_entries();
        let (_, removed) = entries.remove(i);
        // Removing a binding cannot introduce a conflict.
        *self = Self::assemble(entries);
        Some(removed)
    }

    /// Merge `other` on top of this table.
    pub fn merge(&mut self, other: &BindingTable) -> Result<(), BindingError> {
        let mut entries = self.owned_entries();
        entries.extend(other.entries.iter().cloned());
        self.replace_with(entries)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The vi-flavoured default bindings.
pub fn default_entries() -> Vec<(&'static str, ActionDescriptor)> {
    use action::*;

    let plain = |keys: &'static str, name: &str| (keys, ActionDescriptor::new(name));
    vec![
        plain("escape", ESCAPE),
        plain("enter", ENTER),
        plain("up", CURSOR_UP),
        plain("left", CURSOR_LEFT),
        plain("right", CURSOR_RIGHT),
        plain("down", CURSOR_DOWN),
        plain("k", CURSOR_UP),
        plain("h", CURSOR_LEFT),
        plain("l", CURSOR_RIGHT),
        plain("j", CURSOR_DOWN),
        plain("^", CURSOR_TO_DOCUMENT_LEFT),
        plain("0", CURSOR_TO_DOCUMENT_LEFT),
        plain("$", CURSOR_TO_DOCUMENT_RIGHT),
        plain("g g", CURSOR_TO_DOCUMENT_TOP),
        plain("G", CURSOR_TO_DOCUMENT_BOTTOM),
        plain("H", CURSOR_TO_WINDOW_TOP),
        plain("M", CURSOR_TO_WINDOW_MIDDLE),
        plain("L", CURSOR_TO_WINDOW_BOTTOM),
        plain("ctrl+f", SCROLL_FULL_WINDOW_DOWN),
        plain("ctrl+b", SCROLL_FULL_WINDOW_UP),
        plain("ctrl+d", SCROLL_HALF_WINDOW_DOWN),
        plain("ctrl+u", SCROLL_HALF_WINDOW_UP),
        plain("z t", SCROLL_CURSOR_TO_WINDOW_TOP),
        plain("z z", SCROLL_CURSOR_TO_WINDOW_MIDDLE),
        plain("z b", SCROLL_CURSOR_TO_WINDOW_BOTTOM),
        plain("n", SEARCH_NEXT),
        plain("N", SEARCH_PREVIOUS),
        ("f", ActionDescriptor::new(FIND).with_read(ReadSpec::OneChar)),
        (":", ActionDescriptor::new(ENTER_COMMAND_MODE)),
        (
            "/",
            ActionDescriptor::new(ENTER_COMMAND_MODE).with_extra(COMMAND_ALIAS, SEARCH_NEXT),
        ),
        (
            "?",
            ActionDescriptor::new(ENTER_COMMAND_MODE).with_extra(COMMAND_ALIAS, SEARCH_PREVIOUS),
        ),
        (
            "\"",
            ActionDescriptor::new(REGISTER)
                .with_read(ReadSpec::OneChar)
                .resumable(),
        ),
    ]
}

/// The default table. Its validity is covered by tests.
pub fn default_bindings() -> BindingTable {
    BindingTable::assemble(
        default_entries()
            .into_iter()
            .map(|(keys, desc)| (parse_sequence(keys), desc))
            .collect(),
    )
}
