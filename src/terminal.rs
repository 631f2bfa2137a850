//! Terminal I/O for the interactive subcommands: raw mode and a plain
//! list renderer.

use crossterm::{
    ExecutableCommand, QueueableCommand, cursor,
    style::{self, Stylize},
    terminal,
};
use std::io::{self, Write, stdout};

// ---------------------------------------------------------------------------
// RawGuard: restores raw mode / alternate screen on drop
// ---------------------------------------------------------------------------

pub struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(terminal::EnterAlternateScreen)?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let mut out = stdout();
        let _ = out.execute(cursor::Show);
        let _ = out.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Print one line in raw mode (`\r\n` terminated).
pub fn println(line: &str) -> io::Result<()> {
    let mut out = stdout();
    write!(out, "{line}\r\n")?;
    out.flush()
}

/// One frame of the list view.
pub struct ListFrame<'a> {
    pub title: &'a str,
    /// Labels of the visible rows, top to bottom.
    pub rows: &'a [String],
    /// Index into `rows` of the highlighted row.
    pub active: Option<usize>,
    pub status: &'a str,
}

/// Rows available to [`draw_list`] between the title and the status line.
pub fn list_height() -> io::Result<usize> {
    let (_, rows) = terminal::size()?;
    Ok(usize::from(rows).saturating_sub(2).max(1))
}

/// Clear the screen and draw `frame`: title, rows, then the status line.
pub fn draw_list(frame: &ListFrame) -> io::Result<()> {
    let mut out = stdout();
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    out.queue(cursor::MoveTo(0, 0))?;
    out.queue(style::PrintStyledContent(frame.title.bold()))?;

    for (i, label) in frame.rows.iter().enumerate() {
        out.queue(cursor::MoveTo(0, i as u16 + 1))?;
        if frame.active == Some(i) {
            out.queue(style::PrintStyledContent(format!("> {label}").reverse()))?;
        } else {
            out.queue(style::Print(format!("  {label}")))?;
        }
    }

    let (_, rows) = terminal::size()?;
    out.queue(cursor::MoveTo(0, rows.saturating_sub(1)))?;
    out.queue(style::PrintStyledContent(frame.status.dark_grey()))?;
    out.flush()
}

/// Read a line on the bottom row after `prompt`. `None` when cancelled
/// with Esc or Ctrl-C.
pub fn read_prompt(prompt: &str) -> io::Result<Option<String>> {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};

    let mut input = String::new();
    loop {
        let mut out = stdout();
        let (_, rows) = terminal::size()?;
        out.queue(cursor::MoveTo(0, rows.saturating_sub(1)))?;
        out.queue(terminal::Clear(terminal::ClearType::CurrentLine))?;
        out.queue(style::Print(format!("{prompt}{input}")))?;
        out.flush()?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(Some(input)),
            KeyCode::Esc => return Ok(None),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            KeyCode::Backspace => {
                if input.pop().is_none() {
                    return Ok(None);
                }
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
    }
}
