//! Keybinding engine: turns a stream of canonical tokens into commands.
//!
//! Pure state machine, no I/O. One engine belongs to one session; the
//! caller feeds it a token per keystroke and acts on the commands it emits.

use std::collections::BTreeMap;
use std::mem;

use log::{debug, trace};

use crate::key::{RawKey, Token, canonicalize, join_sequence};
use crate::keymap::{ActionDescriptor, BindingTable};

pub const MAX_COUNT: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Accumulating a count and a token sequence.
    #[default]
    Pending,
    /// A matched binding is collecting its extra tokens.
    Reading,
}

/// Read payload of a resumable binding, handed to the next command.
#[derive(Debug, Clone, PartialEq)]
pub struct CarriedRead {
    pub action: String,
    pub tokens: Vec<Token>,
}

/// A resolved binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// The bound sequence, without count digits or read tokens.
    pub tokens: Vec<Token>,
    pub action: String,
    /// Always at least 1.
    pub count: u32,
    /// Whether a count was typed (`G` vs `5G`).
    pub count_given: bool,
    pub read: Option<Vec<Token>>,
    /// Reads of resumable bindings typed before this command (`"a`).
    pub carried: Vec<CarriedRead>,
    pub extra: BTreeMap<String, toml::Value>,
}

impl Command {
    /// First read token, as used by one-character reads.
    pub fn read_char(&self) -> Option<&str> {
        self.read.as_ref()?.first().map(Token::as_str)
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key)?.as_str()
    }

    /// Count as a signed step, for motions that take a direction.
    pub fn signed_count(&self) -> i64 {
        i64::from(self.count)
    }
}

struct Reading {
    desc: ActionDescriptor,
    want: usize,
    got: Vec<Token>,
}

/// Per-session input state: count prefix, partial sequence, read progress.
#[derive(Default)]
struct InputAccumulator {
    count: Option<u32>,
    tokens: Vec<Token>,
    reading: Option<Reading>,
    carried: Vec<CarriedRead>,
}

impl InputAccumulator {
    /// Feed a digit. Returns false once the cap is reached; the digit is dropped.
    fn push_digit(&mut self, d: u32, max: u32) -> bool {
        let current = self.count.unwrap_or(0);
        let new = current.saturating_mul(10).saturating_add(d);
        if new > max {
            return false;
        }
        self.count = Some(new);
        true
    }

    fn is_active(&self) -> bool {
        self.count.is_some()
            || !self.tokens.is_empty()
            || self.reading.is_some()
            || !self.carried.is_empty()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct KeyEngine {
    table: BindingTable,
    acc: InputAccumulator,
    max_count: u32,
}

impl KeyEngine {
    pub fn new(table: BindingTable) -> Self {
        Self {
            table,
            acc: InputAccumulator::default(),
            max_count: MAX_COUNT,
        }
    }

    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count.max(1);
        self
    }

    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Swap the binding table. Pending input is discarded.
    pub fn set_table(&mut self, table: BindingTable) {
        self.table = table;
        self.acc.reset();
    }

    pub fn mode(&self) -> Mode {
        if self.acc.reading.is_some() {
            Mode::Reading
        } else {
            Mode::Pending
        }
    }

    pub fn is_reading(&self) -> bool {
        self.mode() == Mode::Reading
    }

    pub fn has_pending_input(&self) -> bool {
        self.acc.is_active()
    }

    pub fn peek_count(&self) -> Option<u32> {
        self.acc.count
    }

    /// Typed-so-far input for a status line, e.g. `12g` or `f`.
    pub fn pending_display(&self) -> String {
        let mut out = self.acc.count.map(|c| c.to_string()).unwrap_or_default();
        let read = self.acc.reading.iter().flat_map(|r| r.got.iter());
        for token in self.acc.tokens.iter().chain(read) {
            out.push_str(token.as_str());
        }
        out
    }

    /// Drop all pending input, including carried reads.
    pub fn reset(&mut self) {
        self.acc.reset();
    }

    pub fn handle_key(&mut self, key: &RawKey) -> Option<Command> {
        self.handle_token(canonicalize(key))
    }

    pub fn handle_token(&mut self, token: Token) -> Option<Command> {
        trace!("engine: token {token:?} mode={:?}", self.mode());
        if token.is_empty() {
            return None;
        }

        if self.acc.is_active() {
            if token.is_escape() {
                self.cancel("escape");
                return None;
            }
            if token.is_backspace() {
                if let Some(r) = self.acc.reading.as_mut().filter(|r| !r.got.is_empty()) {
                    r.got.pop();
                } else {
                    self.cancel("backspace");
                }
                return None;
            }
        }

        if let Some(reading) = self.acc.reading.as_mut() {
            reading.got.push(token);
            if reading.got.len() < reading.want {
                return None;
            }
            let Reading { desc, got, .. } = self.acc.reading.take()?;
            return Some(self.finish(desc, Some(got)));
        }

        if self.acc.tokens.is_empty()
            && let Some(d) = token.digit()
            && (d != 0 || self.acc.count.is_some())
        {
            if !self.acc.push_digit(d, self.max_count) {
                trace!("engine: count capped at {:?}", self.acc.count);
            }
            return None;
        }

        self.acc.tokens.push(token);
        if self
            .table
            .prefix_tree()
            .descend(&self.acc.tokens)
            .is_some()
        {
            return None;
        }

        let Some(desc) = self.table.get(&self.acc.tokens).cloned() else {
            debug!(
                "engine: abandoned unbound sequence \"{}\"",
                join_sequence(&self.acc.tokens)
            );
            self.acc.reset();
            return None;
        };

        if let Some(read) = desc.read {
            debug!("engine: {} reads {read:?}", desc.name);
            self.acc.reading = Some(Reading {
                want: read.token_count(),
                got: Vec::new(),
                desc,
            });
            return None;
        }

        Some(self.finish(desc, None))
    }

    fn cancel(&mut self, why: &str) {
        debug!("engine: {why} cancelled \"{}\"", self.pending_display());
        self.acc.reset();
    }

    fn finish(&mut self, desc: ActionDescriptor, read: Option<Vec<Token>>) -> Command {
        let tokens = mem::take(&mut self.acc.tokens);
        let count_given = self.acc.count.is_some();
        let count = self.acc.count.take().unwrap_or(1).max(1);

        let carried = if desc.resumable {
            if let Some(tokens) = &read {
                self.acc.carried.push(CarriedRead {
                    action: desc.name.clone(),
                    tokens: tokens.clone(),
                });
            }
            Vec::new()
        } else {
            mem::take(&mut self.acc.carried)
        };

        debug!(
            "engine: resolved {} count={count} read={:?}",
            desc.name,
            read.as_deref().map(join_sequence)
        );
        Command {
            tokens,
            action: desc.name,
            count,
            count_given,
            read,
            carried,
            extra: desc.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{Modifiers, parse_sequence};
    use crate::keymap::{ReadSpec, action, default_bindings};

    fn engine() -> KeyEngine {
        KeyEngine::new(default_bindings())
    }

    /// Feed a space-joined sequence, returning every emitted command.
    fn feed(engine: &mut KeyEngine, keys: &str) -> Vec<Command> {
        parse_sequence(keys)
            .into_iter()
            .filter_map(|t| engine.handle_token(t))
            .collect()
    }

    fn feed_one(engine: &mut KeyEngine, keys: &str) -> Command {
        let mut cmds = feed(engine, keys);
        assert_eq!(cmds.len(), 1, "expected one command for {keys:?}");
        cmds.remove(0)
    }

    #[test]
    fn single_token() {
        let mut e = engine();
        let c = feed_one(&mut e, "j");
        assert_eq!(c.action, action::CURSOR_DOWN);
        assert_eq!(c.count, 1);
        assert!(!c.count_given);
        assert_eq!(c.tokens, parse_sequence("j"));
    }

    #[test]
    fn count_prefix() {
        let mut e = engine();
        let c = feed_one(&mut e, "5 j");
        assert_eq!(c.count, 5);
        assert!(c.count_given);

        let c = feed_one(&mut e, "1 0 j");
        assert_eq!(c.count, 10);
    }

    #[test]
    fn lone_zero_is_a_binding() {
        let mut e = engine();
        let c = feed_one(&mut e, "0");
        assert_eq!(c.action, action::CURSOR_TO_DOCUMENT_LEFT);
        assert_eq!(c.count, 1);
    }

    #[test]
    fn count_is_capped() {
        let mut e = engine();
        let c = feed_one(&mut e, "9 9 9 9 9 9 9 9 j");
        assert_eq!(c.count, MAX_COUNT);

        let mut e = engine().with_max_count(50);
        let c = feed_one(&mut e, "4 2 7 j");
        assert_eq!(c.count, 42);
    }

    #[test]
    fn multi_token_emits_once_at_end() {
        let mut e = engine();
        assert!(e.handle_token(Token::from("g")).is_none());
        assert!(e.has_pending_input());
        let c = e.handle_token(Token::from("g")).unwrap();
        assert_eq!(c.action, action::CURSOR_TO_DOCUMENT_TOP);
        assert_eq!(c.tokens, parse_sequence("g g"));
        assert!(!e.has_pending_input());
    }

    #[test]
    fn every_default_binding_resolves_once() {
        let table = default_bindings();
        for (seq, desc) in table.iter() {
            let mut e = engine();
            let (last, init) = seq.split_last().unwrap();
            for t in init {
                assert!(e.handle_token(t.clone()).is_none());
            }
            let mut out = e.handle_token(last.clone());
            if let Some(read) = desc.read {
                assert!(out.is_none());
                for _ in 0..read.token_count() {
                    out = e.handle_token(Token::from("x"));
                }
            }
            let c = out.unwrap_or_else(|| panic!("{} did not resolve", join_sequence(seq)));
            assert_eq!(c.action, desc.name);
        }
    }

    #[test]
    fn unmatched_sequence_is_abandoned() {
        let mut e = engine();
        assert!(feed(&mut e, "3 g x").is_empty());
        assert!(!e.has_pending_input());
        let c = feed_one(&mut e, "j");
        assert_eq!(c.count, 1);
        assert!(feed(&mut e, "q").is_empty());
    }

    #[test]
    fn find_reads_one_char() {
        let mut e = engine();
        assert!(feed(&mut e, "3 f").is_empty());
        assert!(e.is_reading());
        assert_eq!(e.pending_display(), "3f");
        let c = feed_one(&mut e, "a");
        assert_eq!(c.action, action::FIND);
        assert_eq!(c.count, 3);
        assert_eq!(c.read_char(), Some("a"));
        assert_eq!(e.mode(), Mode::Pending);
    }

    #[test]
    fn escape_mid_read_cancels() {
        let mut e = engine();
        assert!(feed(&mut e, "f escape").is_empty());
        assert!(!e.is_reading());
        assert!(!e.has_pending_input());
        let c = feed_one(&mut e, "g g");
        assert_eq!(c.action, action::CURSOR_TO_DOCUMENT_TOP);
    }

    #[test]
    fn escape_on_empty_input_is_a_binding() {
        let mut e = engine();
        let c = feed_one(&mut e, "escape");
        assert_eq!(c.action, action::ESCAPE);
        assert!(feed(&mut e, "5 escape").is_empty());
        assert_eq!(e.peek_count(), None);
    }

    #[test]
    fn backspace_edits_read_then_cancels() {
        let table = BindingTable::install([(
            "m",
            ActionDescriptor::new("mark").with_read(ReadSpec::Chars(2)),
        )])
        .unwrap();
        let mut e = KeyEngine::new(table);
        let c = feed_one(&mut e, "m a backspace b c");
        assert_eq!(c.read, Some(parse_sequence("b c")));

        assert!(feed(&mut e, "m backspace").is_empty());
        assert!(!e.has_pending_input());
    }

    #[test]
    fn backspace_drops_count() {
        let mut e = engine();
        let c = feed_one(&mut e, "5 backspace j");
        assert_eq!(c.count, 1);
        assert!(!c.count_given);
    }

    #[test]
    fn register_is_carried_into_next_command() {
        let mut e = engine();
        let reg = feed_one(&mut e, "\" a");
        assert_eq!(reg.action, action::REGISTER);
        assert!(reg.carried.is_empty());
        assert!(e.has_pending_input());
        assert!(!e.is_reading());

        let c = feed_one(&mut e, "2 j");
        assert_eq!(c.count, 2);
        assert_eq!(
            c.carried,
            vec![CarriedRead {
                action: action::REGISTER.into(),
                tokens: parse_sequence("a"),
            }]
        );
        let c = feed_one(&mut e, "j");
        assert!(c.carried.is_empty());
    }

    #[test]
    fn escape_drops_carried_reads() {
        let mut e = engine();
        feed_one(&mut e, "\" a");
        assert!(feed(&mut e, "escape").is_empty());
        let c = feed_one(&mut e, "j");
        assert!(c.carried.is_empty());
    }

    #[test]
    fn pending_display_tracks_input() {
        let mut e = engine();
        feed(&mut e, "1 2 g");
        assert_eq!(e.pending_display(), "12g");
        assert_eq!(e.peek_count(), Some(12));
        let c = feed_one(&mut e, "g");
        assert_eq!(c.count, 12);
        assert_eq!(e.pending_display(), "");
    }

    #[test]
    fn command_mode_alias_extra() {
        let mut e = engine();
        let c = feed_one(&mut e, "/");
        assert_eq!(c.action, action::ENTER_COMMAND_MODE);
        assert_eq!(c.extra_str(crate::keymap::COMMAND_ALIAS), Some(action::SEARCH_NEXT));
        let c = feed_one(&mut e, ":");
        assert_eq!(c.extra_str(crate::keymap::COMMAND_ALIAS), None);
    }

    #[test]
    fn raw_keys_are_canonicalized() {
        let mut e = engine();
        let ctrl_d = RawKey::char('d').with_modifiers(Modifiers::CTRL);
        let c = e.handle_key(&ctrl_d).unwrap();
        assert_eq!(c.action, action::SCROLL_HALF_WINDOW_DOWN);
        let c = e.handle_key(&RawKey::char('G')).unwrap();
        assert_eq!(c.action, action::CURSOR_TO_DOCUMENT_BOTTOM);
    }

    #[test]
    fn set_table_discards_input() {
        let mut e = engine();
        feed(&mut e, "5 g");
        e.set_table(BindingTable::install([("x", "cut")]).unwrap());
        assert!(!e.has_pending_input());
        assert_eq!(feed_one(&mut e, "x").action, "cut");
    }
}
