//! Thin wrapper around the embedded VT parser.
//!
//! Grounded on the `EmbeddedTerminal` pattern (`vt100::Parser::new` /
//! `.process` / `.screen()`), stripped of its background reader thread since
//! this crate's event loop feeds PTY bytes synchronously after a single
//! `poll()` call rather than through a channel.
//!
//! `vt100` does not report OSC 7 (shell-reported cwd) or DECSCUSR cursor
//! shape changes through its `Screen` API, so both are tracked here by
//! scanning the raw byte stream before handing it to the parser.

use vt100::{Parser, Screen};

const DEFAULT_SCROLLBACK_LEN: usize = 10_000;

/// DECSCUSR cursor shape code (0..6); 0 and 1 both render as a blinking
/// block, so this wrapper defaults to block (0) absent any escape.
pub type CursorShape = u8;

/// Owns one VT emulator instance for a single pane.
pub struct Vt {
    parser: Parser,
    cwd: Option<String>,
    cursor_shape: CursorShape,
    saw_full_clear: bool,
}

impl Vt {
    /// Create a VT sized to `cols`×`rows` with the default scrollback depth.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            parser: Parser::new(rows, cols, DEFAULT_SCROLLBACK_LEN),
            cwd: None,
            cursor_shape: 0,
            saw_full_clear: false,
        }
    }

    /// Feed PTY output into the emulator.
    pub fn feed(&mut self, bytes: &[u8]) {
        scan_cwd(bytes, &mut self.cwd);
        scan_cursor_shape(bytes, &mut self.cursor_shape);
        if contains_full_clear(bytes) {
            self.saw_full_clear = true;
        }
        self.parser.process(bytes);
    }

    /// Whether a full-screen clear sequence was observed since the last
    /// call to [`Vt::take_full_clear`]. The event loop uses this to force a
    /// full redraw.
    pub fn take_full_clear(&mut self) -> bool {
        std::mem::replace(&mut self.saw_full_clear, false)
    }

    /// Resize the emulator's screen. The caller is responsible for also
    /// resizing the underlying PTY.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.parser.set_size(rows, cols);
    }

    /// Read-only access to the current screen snapshot.
    pub fn screen(&self) -> &Screen {
        self.parser.screen()
    }

    /// Cursor position as (col, row).
    pub fn cursor_position(&self) -> (u16, u16) {
        let (row, col) = self.screen().cursor_position();
        (col, row)
    }

    /// Whether the cursor is hidden (DECTCEM reset).
    pub fn cursor_visible(&self) -> bool {
        !self.screen().hide_cursor()
    }

    /// Last-seen DECSCUSR cursor shape code, defaulting to block (0).
    pub fn cursor_shape(&self) -> CursorShape {
        self.cursor_shape
    }

    /// Shell-reported working directory from the most recent OSC 7, if any.
    pub fn cwd(&self) -> Option<&str> {
        self.cwd.as_deref()
    }

    /// Whether the viewport is scrolled away from the bottom (scrollback
    /// offset > 0). While scrolled, cell reads must draw from the
    /// scrollback view rather than live output.
    pub fn is_scrolled(&self) -> bool {
        self.screen().scrollback() > 0
    }

    /// Scroll the viewport up by `n` lines into scrollback.
    pub fn scroll_up(&mut self, n: usize) {
        let current = self.screen().scrollback();
        self.parser.set_scrollback(current + n);
    }

    /// Scroll the viewport down by `n` lines toward live output.
    pub fn scroll_down(&mut self, n: usize) {
        let current = self.screen().scrollback();
        self.parser.set_scrollback(current.saturating_sub(n));
    }

    /// Jump to the top of scrollback.
    pub fn scroll_to_top(&mut self) {
        self.parser.set_scrollback(DEFAULT_SCROLLBACK_LEN);
    }

    /// Return to live output. Only called explicitly (user scroll-to-bottom
    /// or keypress), never automatically on new PTY output.
    pub fn scroll_to_bottom(&mut self) {
        self.parser.set_scrollback(0);
    }
}

fn contains_full_clear(bytes: &[u8]) -> bool {
    // ED2 (`ESC[2J`) or ED3 (`ESC[3J`) clear the visible screen/scrollback.
    bytes.windows(3).any(|w| w == b"[2J" || w == b"[3J")
}

/// Scan for `OSC 7 ; <uri> BEL|ST` and update `cwd` with the path portion of
/// the most recent occurrence.
fn scan_cwd(bytes: &[u8], cwd: &mut Option<String>) {
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == 0x1b && bytes[i + 1] == b']' {
            if let Some((body, consumed)) = read_osc(&bytes[i + 2..]) {
                if let Some(rest) = body.strip_prefix("7;") {
                    *cwd = Some(strip_file_uri(rest));
                }
                i += 2 + consumed;
                continue;
            }
        }
        i += 1;
    }
}

/// Scan for `CSI Ps SP q` (DECSCUSR) and update `shape` with the most recent
/// code. `Ps` omitted defaults to 0.
fn scan_cursor_shape(bytes: &[u8], shape: &mut CursorShape) {
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == 0x1b && bytes[i + 1] == b'[' {
            let mut j = i + 2;
            let start = j;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b' ' && j + 1 < bytes.len() && bytes[j + 1] == b'q' {
                let code: CursorShape = std::str::from_utf8(&bytes[start..j])
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                *shape = code;
                i = j + 2;
                continue;
            }
        }
        i += 1;
    }
}

/// Read an OSC body terminated by BEL (`\x07`) or ST (`ESC \`), returning the
/// body text and the number of bytes consumed including the terminator.
fn read_osc(bytes: &[u8]) -> Option<(&str, usize)> {
    let mut end = None;
    let mut k = 0;
    while k < bytes.len() {
        if bytes[k] == 0x07 {
            end = Some((k, k + 1));
            break;
        }
        if bytes[k] == 0x1b && k + 1 < bytes.len() && bytes[k + 1] == b'\\' {
            end = Some((k, k + 2));
            break;
        }
        k += 1;
    }
    let (body_end, consumed) = end?;
    let body = std::str::from_utf8(&bytes[..body_end]).ok()?;
    Some((body, consumed))
}

fn strip_file_uri(value: &str) -> String {
    if let Some(rest) = value.strip_prefix("file://") {
        match rest.find('/') {
            Some(idx) => rest[idx..].to_string(),
            None => rest.to_string(),
        }
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_updates_screen() {
        let mut vt = Vt::new(10, 2);
        vt.feed(b"hi");
        let screen = vt.screen();
        let cell = screen.cell(0, 0).unwrap();
        assert_eq!(cell.contents(), "h");
    }

    #[test]
    fn osc7_updates_cwd() {
        let mut vt = Vt::new(10, 2);
        vt.feed(b"\x1b]7;file://host/home/user/proj\x07");
        assert_eq!(vt.cwd(), Some("/home/user/proj"));
    }

    #[test]
    fn decscusr_updates_cursor_shape() {
        let mut vt = Vt::new(10, 2);
        assert_eq!(vt.cursor_shape(), 0);
        vt.feed(b"\x1b[2 q");
        assert_eq!(vt.cursor_shape(), 2);
    }

    #[test]
    fn full_clear_is_detected_once() {
        let mut vt = Vt::new(10, 2);
        vt.feed(b"\x1b[2J");
        assert!(vt.take_full_clear());
        assert!(!vt.take_full_clear());
    }

}
