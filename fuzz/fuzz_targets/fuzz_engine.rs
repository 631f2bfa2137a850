#![no_main]

use libfuzzer_sys::fuzz_target;
use vinav::key::{RawKey, canonicalize, parse_sequence};
use vinav::keymap::default_bindings;
use vinav::session::{Event, Session, SessionOptions};
use vinav::tree::Tree;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    let mut tree = Tree::new("root".to_string());
    let root = tree.root();
    for i in 0..50 {
        let id = tree.create(format!("item{i}"));
        tree.add_child(root, id, None).unwrap();
        if i % 7 == 0 {
            let sub = tree.create(format!("sub{i}"));
            tree.add_child(id, sub, None).unwrap();
        }
    }
    let mut session = Session::new(tree, default_bindings(), SessionOptions::default());

    // Half the input as literal characters, half as named tokens.
    let mid = (0..=input.len() / 2)
        .rev()
        .find(|&i| input.is_char_boundary(i))
        .unwrap_or(0);
    let (chars, names) = input.split_at(mid);
    let tokens = chars
        .chars()
        .map(|c| canonicalize(&RawKey::char(c)))
        .chain(parse_sequence(names));

    for token in tokens {
        for event in session.handle_token(token) {
            if let Event::Keybinding(cmd) = event {
                assert!(cmd.count >= 1);
            }
        }
        let current = session.current();
        let len = session.tree().children(current).len();
        if let Some(idx) = session.tree().active_index(current) {
            assert!(idx < len, "active index {idx} out of {len}");
        }
        let (start, end) = session.window();
        assert!(start <= end);
    }
});
