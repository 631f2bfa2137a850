//! Viewport arithmetic for vi motions.
//!
//! Pure functions over value snapshots. The list variant works on a single
//! axis (rows of a tree level); the document variant tracks a 2-D cursor
//! inside a scrollable window. Window heights are measured as `end - start`,
//! so a window `[start, end]` shows `height + 1` rows.

use std::str::FromStr;

use thiserror::Error;

use crate::keymap::action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    DocumentLeft,
    DocumentRight,
    DocumentTop,
    DocumentBottom,
    WindowTop,
    WindowMiddle,
    WindowBottom,
    FullWindowDown,
    FullWindowUp,
    HalfWindowDown,
    HalfWindowUp,
    AlignTop,
    AlignMiddle,
    AlignBottom,
}

const MOTIONS: [(&str, Motion); 18] = [
    (action::CURSOR_UP, Motion::CursorUp),
    (action::CURSOR_DOWN, Motion::CursorDown),
    (action::CURSOR_LEFT, Motion::CursorLeft),
    (action::CURSOR_RIGHT, Motion::CursorRight),
    (action::CURSOR_TO_DOCUMENT_LEFT, Motion::DocumentLeft),
    (action::CURSOR_TO_DOCUMENT_RIGHT, Motion::DocumentRight),
    (action::CURSOR_TO_DOCUMENT_TOP, Motion::DocumentTop),
    (action::CURSOR_TO_DOCUMENT_BOTTOM, Motion::DocumentBottom),
    (action::CURSOR_TO_WINDOW_TOP, Motion::WindowTop),
    (action::CURSOR_TO_WINDOW_MIDDLE, Motion::WindowMiddle),
    (action::CURSOR_TO_WINDOW_BOTTOM, Motion::WindowBottom),
    (action::SCROLL_FULL_WINDOW_DOWN, Motion::FullWindowDown),
    (action::SCROLL_FULL_WINDOW_UP, Motion::FullWindowUp),
    (action::SCROLL_HALF_WINDOW_DOWN, Motion::HalfWindowDown),
    (action::SCROLL_HALF_WINDOW_UP, Motion::HalfWindowUp),
    (action::SCROLL_CURSOR_TO_WINDOW_TOP, Motion::AlignTop),
    (action::SCROLL_CURSOR_TO_WINDOW_MIDDLE, Motion::AlignMiddle),
    (action::SCROLL_CURSOR_TO_WINDOW_BOTTOM, Motion::AlignBottom),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("\"{0}\" is not a motion")]
pub struct UnknownMotion(pub String);

impl FromStr for Motion {
    type Err = UnknownMotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MOTIONS
            .iter()
            .find(|(name, _)| *name == s)
            .map(|&(_, m)| m)
            .ok_or_else(|| UnknownMotion(s.to_string()))
    }
}

impl Motion {
    pub const ALL: [Motion; 18] = {
        let mut all = [Motion::CursorUp; 18];
        let mut i = 0;
        while i < MOTIONS.len() {
            all[i] = MOTIONS[i].1;
            i += 1;
        }
        all
    };

    /// The action name bound to this motion.
    pub fn action_name(self) -> &'static str {
        MOTIONS
            .iter()
            .find(|(_, m)| *m == self)
            .map_or("", |&(name, _)| name)
    }

    /// Align motions keep the cursor and move the window instead.
    pub fn is_align(self) -> bool {
        matches!(
            self,
            Motion::AlignTop | Motion::AlignMiddle | Motion::AlignBottom
        )
    }
}

/// Scroll offset that brings `cursor` back inside a window of `window`
/// rows starting at `scroll`.
///
/// Small moves snap the window to the near edge; a jump of more than half
/// the window from `previous` centers it instead. The result never exceeds
/// `bound - window`.
fn correct_axis(
    cursor: usize,
    scroll: usize,
    window: usize,
    bound: usize,
    previous: Option<usize>,
) -> usize {
    if scroll <= cursor && cursor <= scroll + window {
        return scroll;
    }
    let center = previous.is_some_and(|p| p.abs_diff(cursor) * 2 > window);
    let pos = match (cursor < scroll, center) {
        (true, false) => cursor,
        (true, true) => cursor.saturating_sub(window / 2),
        (false, false) => cursor - window,
        // odd windows leave the extra row below the cursor
        (false, true) => cursor - window + window / 2,
    };
    pos.min(bound.saturating_sub(window))
}

/// New scroll offset for a cursor moved to `row`, or `None` when the row is
/// already visible in `[start, end]`.
pub fn scroll_position(
    row: usize,
    page_height: usize,
    (start, end): (usize, usize),
    previous: Option<usize>,
) -> Option<usize> {
    if (start..=end).contains(&row) {
        return None;
    }
    Some(correct_axis(
        row,
        start,
        end.saturating_sub(start),
        page_height,
        previous,
    ))
}

/// One level of a list: `page_height` is the last valid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListViewport {
    pub cursor_row: usize,
    pub page_height: usize,
    pub window: (usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub cursor_row: usize,
    /// `None` leaves the scroll offset unchanged.
    pub scroll: Option<usize>,
}

impl ListViewport {
    pub fn window_height(&self) -> usize {
        self.window.1.saturating_sub(self.window.0)
    }

    /// Apply `motion` repeated `count` times (`None` when no count was typed).
    pub fn navigate(&self, motion: Motion, count: Option<u32>) -> Navigation {
        let row = self.cursor_row;
        let page = self.page_height;
        let (start, end) = self.window;
        let h = self.window_height();
        let n = count.unwrap_or(1).max(1) as usize;
        let jump_to = |line: u32| (line.max(1) as usize - 1).min(page);

        let new_row = match motion {
            Motion::CursorUp => row.saturating_sub(n),
            Motion::CursorDown => row.saturating_add(n).min(page),
            Motion::CursorLeft
            | Motion::CursorRight
            | Motion::DocumentLeft
            | Motion::DocumentRight => row,
            Motion::DocumentTop => count.map_or(0, jump_to),
            Motion::DocumentBottom => count.map_or(page, jump_to),
            Motion::WindowTop => (start + n - 1).min(end),
            Motion::WindowMiddle => start + end.saturating_sub(start) / 2,
            Motion::WindowBottom => end.saturating_sub(n - 1).max(start),
            Motion::FullWindowDown => row.saturating_add(h.max(1) * n).min(page),
            Motion::FullWindowUp => row.saturating_sub(h.max(1) * n),
            Motion::HalfWindowDown => row.saturating_add((h / 2).max(1) * n).min(page),
            Motion::HalfWindowUp => row.saturating_sub((h / 2).max(1) * n),
            Motion::AlignTop | Motion::AlignMiddle | Motion::AlignBottom => {
                return Navigation {
                    cursor_row: row,
                    scroll: self.align(motion),
                };
            }
        };

        Navigation {
            cursor_row: new_row,
            scroll: scroll_position(new_row, page, self.window, Some(row)),
        }
    }

    fn align(&self, motion: Motion) -> Option<usize> {
        let row = self.cursor_row;
        let h = self.window_height();
        let scroll = match motion {
            Motion::AlignTop => row.min(self.page_height.saturating_sub(h)),
            Motion::AlignMiddle => row
                .saturating_sub(h / 2)
                .min(self.page_height.saturating_sub(h)),
            _ => row.saturating_sub(h),
        };
        (scroll != self.window.0).then_some(scroll)
    }
}

/// A 2-D cursor in a scrollable document. Widths and heights are last
/// valid indices, as are the window sizes relative to the scroll offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocumentViewport {
    pub cursor_x: usize,
    pub cursor_y: usize,
    pub scroll_x: usize,
    pub scroll_y: usize,
    pub document_width: usize,
    pub document_height: usize,
    pub window_width: usize,
    pub window_height: usize,
}

/// Requested state; unset fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    pub cursor_x: Option<i64>,
    pub cursor_y: Option<i64>,
    pub scroll_x: Option<i64>,
    pub scroll_y: Option<i64>,
}

fn clamp_to(v: i64, max: usize) -> usize {
    usize::try_from(v.max(0)).unwrap_or(usize::MAX).min(max)
}

fn signed(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl DocumentViewport {
    /// Target state for `motion`, before clamping.
    pub fn target(&self, motion: Motion, count: Option<u32>) -> Target {
        let n = i64::from(count.unwrap_or(1).max(1));
        let cx = signed(self.cursor_x);
        let cy = signed(self.cursor_y);
        let sy = signed(self.scroll_y);
        let wh = signed(self.window_height);
        let dh = signed(self.document_height);
        let y = |v: i64| Target {
            cursor_y: Some(v),
            ..Target::default()
        };
        let x = |v: i64| Target {
            cursor_x: Some(v),
            ..Target::default()
        };
        let scroll = |v: i64| Target {
            scroll_y: Some(v),
            ..Target::default()
        };

        match motion {
            Motion::CursorUp => y(cy - n),
            Motion::CursorDown => y(cy + n),
            Motion::CursorLeft => x(cx - n),
            Motion::CursorRight => x(cx + n),
            Motion::DocumentLeft => x(0),
            Motion::DocumentRight => x(signed(self.document_width)),
            Motion::DocumentTop => y(count.map_or(0, |c| i64::from(c) - 1)),
            Motion::DocumentBottom => match count {
                Some(c) => y(i64::from(c) - 1),
                None => Target {
                    cursor_y: Some(dh),
                    scroll_y: Some(dh - wh),
                    ..Target::default()
                },
            },
            Motion::WindowTop => y(sy + n - 1),
            Motion::WindowMiddle => y(sy + dh.min(wh) / 2),
            Motion::WindowBottom => y(sy + wh - (n - 1)),
            Motion::FullWindowDown => y(cy + wh * n),
            Motion::FullWindowUp => y(cy - wh * n),
            Motion::HalfWindowDown => y(cy + wh / 2 * n),
            Motion::HalfWindowUp => y(cy - wh / 2 * n),
            Motion::AlignTop => scroll(cy),
            Motion::AlignMiddle => scroll((cy - wh / 2).min(dh - wh).max(0)),
            Motion::AlignBottom => scroll(cy - wh),
        }
    }

    /// Apply a target, then clamp and restore the cursor-in-window
    /// invariant. When a target moves only the window on an axis the cursor
    /// is pulled inside it; otherwise the window follows the cursor.
    /// Returns whether anything changed.
    pub fn apply(&mut self, target: Target) -> bool {
        let before = *self;

        self.cursor_x = clamp_to(
            target.cursor_x.unwrap_or(signed(self.cursor_x)),
            self.document_width,
        );
        self.cursor_y = clamp_to(
            target.cursor_y.unwrap_or(signed(self.cursor_y)),
            self.document_height,
        );
        self.scroll_x = clamp_to(
            target.scroll_x.unwrap_or(signed(self.scroll_x)),
            self.document_width.saturating_sub(self.window_width),
        );
        self.scroll_y = clamp_to(
            target.scroll_y.unwrap_or(signed(self.scroll_y)),
            self.document_height.saturating_sub(self.window_height),
        );

        if target.scroll_x.is_some() && target.cursor_x.is_none() {
            self.cursor_x = self.cursor_x.clamp(
                self.scroll_x,
                (self.scroll_x + self.window_width).min(self.document_width),
            );
        } else {
            self.scroll_x = correct_axis(
                self.cursor_x,
                self.scroll_x,
                self.window_width,
                self.document_width,
                Some(before.cursor_x),
            );
        }

        if target.scroll_y.is_some() && target.cursor_y.is_none() {
            self.cursor_y = self.cursor_y.clamp(
                self.scroll_y,
                (self.scroll_y + self.window_height).min(self.document_height),
            );
        } else {
            self.scroll_y = correct_axis(
                self.cursor_y,
                self.scroll_y,
                self.window_height,
                self.document_height,
                Some(before.cursor_y),
            );
        }

        *self != before
    }

    pub fn navigate(&mut self, motion: Motion, count: Option<u32>) -> bool {
        let target = self.target(motion, count);
        self.apply(target)
    }

    pub fn is_cursor_visible(&self) -> bool {
        (self.scroll_x..=self.scroll_x + self.window_width).contains(&self.cursor_x)
            && (self.scroll_y..=self.scroll_y + self.window_height).contains(&self.cursor_y)
    }
}
