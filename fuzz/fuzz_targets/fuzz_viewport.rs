#![no_main]

use libfuzzer_sys::fuzz_target;
use vinav::viewport::{DocumentViewport, ListViewport, Motion};

fn word(data: &[u8], i: usize) -> usize {
    data.get(i).copied().unwrap_or(0) as usize
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let page = word(data, 0) * 4;
    let height = word(data, 1) % 64;
    let start = word(data, 2).min(page);
    let end = (start + height).min(page);
    let mut list = ListViewport {
        cursor_row: word(data, 3).min(page),
        page_height: page,
        window: (start, end),
    };

    let mut doc = DocumentViewport {
        cursor_x: 0,
        cursor_y: 0,
        scroll_x: 0,
        scroll_y: 0,
        window_width: word(data, 4),
        window_height: word(data, 5),
        document_width: word(data, 6) * 3,
        document_height: word(data, 7) * 3,
    };

    for pair in data[8..].chunks(2) {
        let motion = Motion::ALL[pair[0] as usize % Motion::ALL.len()];
        let count = pair.get(1).filter(|&&c| c > 0).map(|&c| u32::from(c));

        let nav = list.navigate(motion, count);
        assert!(nav.cursor_row <= page, "{motion:?} left the page");
        let scroll = nav.scroll.unwrap_or(list.window.0).min(page);
        list.cursor_row = nav.cursor_row;
        list.window = (scroll, (scroll + height).min(page));

        doc.navigate(motion, count);
        assert!(doc.cursor_x <= doc.document_width);
        assert!(doc.cursor_y <= doc.document_height);
        assert!(doc.is_cursor_visible(), "{motion:?} hid the cursor: {doc:?}");
    }
});
