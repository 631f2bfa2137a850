use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

use vinav::config::ConfigFile;
use vinav::engine::KeyEngine;
use vinav::key::RawKey;
use vinav::keymap::{action, default_bindings};
use vinav::session::{Event, Session, SessionOptions};
use vinav::tree::{NodeId, Tree};

fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
    KeyEvent {
        code,
        modifiers,
        kind: KeyEventKind::Press,
        state: KeyEventState::NONE,
    }
}

fn chars(s: &str) -> Vec<KeyEvent> {
    s.chars()
        .map(|c| {
            let mods = if c.is_ascii_uppercase() {
                KeyModifiers::SHIFT
            } else {
                KeyModifiers::NONE
            };
            key(KeyCode::Char(c), mods)
        })
        .collect()
}

/// root: item0..item{n-1}; item3 has children sub0..sub2.
fn tree(n: usize) -> (Tree<String>, Vec<NodeId>) {
    let mut tree = Tree::new("root".to_string());
    let root = tree.root();
    let ids: Vec<NodeId> = (0..n)
        .map(|i| {
            let id = tree.create(format!("item{i}"));
            tree.add_child(root, id, None).unwrap();
            id
        })
        .collect();
    for i in 0..3 {
        let id = tree.create(format!("sub{i}"));
        tree.add_child(ids[3], id, None).unwrap();
    }
    (tree, ids)
}

fn session(n: usize, window_height: usize) -> (Session<String>, Vec<NodeId>) {
    let (tree, ids) = tree(n);
    let options = SessionOptions {
        window_height,
        ..SessionOptions::default()
    };
    (Session::new(tree, default_bindings(), options), ids)
}

fn send(s: &mut Session<String>, keys: Vec<KeyEvent>) -> Vec<Event> {
    keys.into_iter().flat_map(|k| s.handle_key(k)).collect()
}

fn active(s: &Session<String>) -> Option<usize> {
    s.tree().active_index(s.current())
}

#[test]
fn test_count_and_motions() {
    let (mut s, _) = session(30, 10);
    send(&mut s, chars("5j"));
    assert_eq!(active(&s), Some(5));
    send(&mut s, chars("2k"));
    assert_eq!(active(&s), Some(3));
    send(&mut s, chars("G"));
    assert_eq!(active(&s), Some(29));
    assert_eq!(s.window(), (20, 29));
    send(&mut s, chars("gg"));
    assert_eq!(active(&s), Some(0));
    assert_eq!(s.window(), (0, 9));
}

#[test]
fn test_ctrl_scrolling() {
    let (mut s, _) = session(30, 10);
    send(&mut s, vec![key(KeyCode::Char('d'), KeyModifiers::CONTROL)]);
    // steps are measured as end - start of the (0, 9) window
    assert_eq!(active(&s), Some(4));
    send(&mut s, vec![key(KeyCode::Char('f'), KeyModifiers::CONTROL)]);
    assert_eq!(active(&s), Some(13));
    let (start, end) = s.window();
    assert!((start..=end).contains(&13));
}

#[test]
fn test_escape_cancels_count() {
    let (mut s, _) = session(30, 10);
    let events = send(&mut s, chars("3"));
    assert!(events.is_empty());
    assert_eq!(s.pending_display(), "3");
    send(&mut s, vec![key(KeyCode::Esc, KeyModifiers::NONE)]);
    assert_eq!(s.pending_display(), "");
    send(&mut s, chars("j"));
    assert_eq!(active(&s), Some(1));
}

#[test]
fn test_descend_select_and_return() {
    let (mut s, ids) = session(10, 5);
    send(&mut s, chars("3j"));
    let events = send(&mut s, vec![key(KeyCode::Enter, KeyModifiers::NONE)]);
    assert!(events.contains(&Event::Cd(ids[3])));
    assert_eq!(s.current(), ids[3]);

    let events = send(&mut s, chars("jl"));
    let sub1 = s.tree().children(ids[3])[1];
    assert!(events.contains(&Event::Select(sub1)));

    send(&mut s, vec![key(KeyCode::Left, KeyModifiers::NONE)]);
    assert_eq!(s.current(), s.tree().root());
    // the highlight on each level is remembered
    assert_eq!(s.highlighted(), Some(ids[3]));
}

#[test]
fn test_search_prompt_flow() {
    let (mut s, _) = session(30, 10);
    let events = send(&mut s, chars("/"));
    assert!(events.contains(&Event::EnterCommandMode {
        alias: Some(action::SEARCH_NEXT.to_string())
    }));

    let events = s.search("item2", 1);
    assert_eq!(events[0], Event::Search { index: Some(2) });
    send(&mut s, chars("n"));
    assert_eq!(active(&s), Some(20));
    send(&mut s, chars("3n"));
    assert_eq!(active(&s), Some(23));
    send(&mut s, chars("N"));
    assert_eq!(active(&s), Some(22));
}

#[test]
fn test_find_with_register() {
    let mut engine = KeyEngine::new(default_bindings());
    let mut resolved = Vec::new();
    for k in chars("\"af") {
        if let Some(cmd) = engine.handle_key(&RawKey::from(k)) {
            resolved.push(cmd);
        }
    }
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].action, action::REGISTER);
    assert!(engine.is_reading());

    let cmd = engine
        .handle_key(&RawKey::from(key(KeyCode::Char('x'), KeyModifiers::NONE)))
        .unwrap();
    assert_eq!(cmd.action, action::FIND);
    assert_eq!(cmd.read_char(), Some("x"));
    assert_eq!(cmd.carried.len(), 1);
    assert_eq!(cmd.carried[0].action, action::REGISTER);
    assert_eq!(cmd.carried[0].tokens[0].as_str(), "a");
}

#[test]
fn test_config_rebinds_session_keys() {
    let text = r#"
        [navigation]
        window_height = 4

        [keys]
        "j" = "none"
        "space" = "cursor-down"
        "g n" = "cursor-to-document-bottom"
    "#;
    let cfg: ConfigFile = toml::from_str(text).unwrap();
    let config = cfg.resolve();
    let (tree, _) = tree(12);
    let mut s = Session::new(tree, config.binding_table().unwrap(), config.session_options());

    send(&mut s, chars("j"));
    assert_eq!(active(&s), Some(0));
    send(&mut s, vec![key(KeyCode::Char(' '), KeyModifiers::NONE)]);
    assert_eq!(active(&s), Some(1));
    send(&mut s, chars("gn"));
    assert_eq!(active(&s), Some(11));
    assert_eq!(s.window(), (8, 11));
    // "g g" still works alongside the new "g n"
    send(&mut s, chars("gg"));
    assert_eq!(active(&s), Some(0));
}

#[test]
fn test_keybinding_event_comes_first() {
    let (mut s, _) = session(5, 5);
    let events = send(&mut s, chars("2j"));
    match &events[0] {
        Event::Keybinding(cmd) => {
            assert_eq!(cmd.action, action::CURSOR_DOWN);
            assert_eq!(cmd.count, 2);
            assert!(cmd.count_given);
        }
        other => panic!("expected a keybinding event, got {other:?}"),
    }
    assert!(matches!(events[1], Event::Highlight(_)));
}
