//! vi-style modal key handling for terminal navigators.
//!
//! Keystrokes are canonicalized into [`key::Token`]s, resolved against a
//! [`keymap::BindingTable`] by the [`engine::KeyEngine`] (counts, multi-key
//! sequences, argument reads), and turned into cursor and scroll updates by
//! [`viewport`]. [`session::Session`] wires the engine to a [`tree::Tree`]
//! of items and a [`search::Searcher`].

pub mod config;
pub mod engine;
pub mod key;
pub mod keymap;
pub mod search;
pub mod session;
pub mod terminal;
pub mod tree;
pub mod viewport;
