//! Keystroke canonicalization: raw key events to binding tokens.
//!
//! Pure logic, no I/O. A token names one physical keystroke the way binding
//! tables spell it: `j`, `G`, `$`, `ctrl+f`, `shift+up`, `enter`.

use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Named keys that may carry a `shift+` prefix.
///
/// Printable characters already encode shift in the character itself (`N`,
/// not `shift+n`), so only these keys ever get the prefix.
const SHIFTABLE_KEYS: &[&str] = &[
    "escape",
    "enter",
    "tab",
    "backspace",
    "up",
    "down",
    "left",
    "right",
];

/// Named-key aliases, so bindings need not spell out synonyms.
const KEY_CONVERSION: &[(&str, &str)] = &[
    ("return", "enter"),
    ("esc", "escape"),
    ("backtab", "tab"),
];

pub const ESCAPE: &str = "escape";
pub const BACKSPACE: &str = "backspace";

/// Modifier flags of a raw keystroke.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub option: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        option: false,
        meta: false,
        shift: false,
    };

    pub const CTRL: Self = Self {
        ctrl: true,
        ..Self::NONE
    };

    pub const META: Self = Self {
        meta: true,
        ..Self::NONE
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ..Self::NONE
    };
}

impl From<KeyModifiers> for Modifiers {
    fn from(m: KeyModifiers) -> Self {
        Self {
            ctrl: m.contains(KeyModifiers::CONTROL),
            option: m.intersects(KeyModifiers::META | KeyModifiers::SUPER),
            meta: m.contains(KeyModifiers::ALT),
            shift: m.contains(KeyModifiers::SHIFT),
        }
    }
}

/// Canonical string for one keystroke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The decimal value if this token is a single ASCII digit.
    pub fn digit(&self) -> Option<u32> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_digit(10),
            _ => None,
        }
    }

    pub fn is_escape(&self) -> bool {
        self.0 == ESCAPE
    }

    pub fn is_backspace(&self) -> bool {
        self.0 == BACKSPACE
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Split a space-joined sequence (`"g g"`, `"z t"`) into tokens.
pub fn parse_sequence(keys: &str) -> Vec<Token> {
    keys.split_whitespace().map(Token::from).collect()
}

/// Inverse of [`parse_sequence`].
pub fn join_sequence(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(Token::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A keystroke as the terminal reported it.
///
/// `ch` is the literal character (if any), `sequence` the raw bytes the
/// terminal sent, `name` the key identity (`"a"`, `"up"`, `"return"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKey {
    pub ch: Option<char>,
    pub sequence: String,
    pub name: Option<String>,
    pub modifiers: Modifiers,
}

impl RawKey {
    /// A printable character typed without modifiers.
    pub fn char(c: char) -> Self {
        Self {
            ch: Some(c),
            sequence: c.to_string(),
            name: Some(c.to_lowercase().collect()),
            modifiers: Modifiers::NONE,
        }
    }

    /// A non-printable key identified by name only.
    pub fn named(name: &str) -> Self {
        Self {
            ch: None,
            sequence: String::new(),
            name: Some(name.to_string()),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

impl From<KeyEvent> for RawKey {
    fn from(ev: KeyEvent) -> Self {
        let mut modifiers = Modifiers::from(ev.modifiers);
        let named = |name: &str| Some(name.to_string());
        let name = match ev.code {
            KeyCode::Char(' ') => named("space"),
            KeyCode::Char(c) => return RawKey::char(c).with_modifiers(modifiers),
            KeyCode::Enter => named("return"),
            KeyCode::Esc => named("escape"),
            KeyCode::Tab => named("tab"),
            KeyCode::BackTab => {
                modifiers.shift = true;
                named("backtab")
            }
            KeyCode::Backspace => named("backspace"),
            KeyCode::Up => named("up"),
            KeyCode::Down => named("down"),
            KeyCode::Left => named("left"),
            KeyCode::Right => named("right"),
            KeyCode::Home => named("home"),
            KeyCode::End => named("end"),
            KeyCode::PageUp => named("pageup"),
            KeyCode::PageDown => named("pagedown"),
            KeyCode::Delete => named("delete"),
            KeyCode::Insert => named("insert"),
            KeyCode::F(n) => Some(format!("f{n}")),
            _ => None,
        };
        Self {
            ch: None,
            sequence: String::new(),
            name,
            modifiers,
        }
    }
}

fn alias(name: &str) -> Option<&'static str> {
    KEY_CONVERSION
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
}

/// Build the canonical token for a keystroke.
///
/// With ctrl or meta held the key name is the base (those combinations do
/// not produce a usable literal). Otherwise the literal character is used
/// when it is exactly what the terminal sent, falling back to the name.
/// Aliased names (`return`) always win over the literal.
/// Modifier prefixes are laid out as `ctrl+option+meta+shift+base`.
pub fn canonicalize(key: &RawKey) -> Token {
    let m = key.modifiers;
    let name = key.name.as_deref();
    let literal = key
        .ch
        .filter(|&c| !key.sequence.is_empty() && key.sequence.chars().eq(std::iter::once(c)));

    let base = if let Some(a) = name.and_then(alias) {
        Some(a.to_string())
    } else if m.ctrl || m.meta {
        name.map(str::to_string)
            .or_else(|| key.ch.map(|c| c.to_lowercase().collect()))
    } else if let Some(c) = literal {
        Some(c.to_string())
    } else {
        name.map(str::to_string).or_else(|| key.ch.map(String::from))
    };
    let base = base.unwrap_or_default();
    if base.is_empty() {
        return Token::default();
    }

    let mut token = String::new();
    if m.ctrl {
        token.push_str("ctrl+");
    }
    if m.option {
        token.push_str("option+");
    }
    // Terminals report a lone escape as meta-modified.
    if m.meta && base != ESCAPE {
        token.push_str("meta+");
    }
    if m.shift && SHIFTABLE_KEYS.contains(&base.as_str()) {
        token.push_str("shift+");
    }
    token.push_str(&base);
    Token(token)
}
