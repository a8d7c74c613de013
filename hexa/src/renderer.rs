//! The differential renderer: turns a composed [`CellBuffer`] frame into the
//! minimal byte stream that updates a real terminal from its last known
//! state.
//!
//! No direct teacher counterpart (see `cellbuffer.rs`); built from the
//! end-phase algorithm this system's spec mandates.

use std::io::{self, Write};

use crate::cellbuffer::{Cell, CellBuffer, ColorSpec};
use crate::vt::CursorShape;

const BEGIN_SYNC: &[u8] = b"\x1b[?2026h";
const END_SYNC: &[u8] = b"\x1b[?2026l";
const HIDE_CURSOR: &[u8] = b"\x1b[?25l";
const SHOW_CURSOR: &[u8] = b"\x1b[?25h";
const RESET_G0_G1: &[u8] = b"\x1b(B\x0f";

/// Renders [`CellBuffer`] frames to an output stream.
pub struct Renderer {
    startup_reset_emitted: bool,
}

impl Renderer {
    /// A fresh renderer; the G0/G1 charset reset is emitted once, the first
    /// time [`Renderer::render_frame`] is called.
    pub fn new() -> Self {
        Self { startup_reset_emitted: false }
    }

    /// Compose and write one frame. `cursor` is (col, row), 0-indexed.
    pub fn render_frame<W: Write>(
        &mut self,
        out: &mut W,
        buf: &mut CellBuffer,
        cursor: (u16, u16),
        cursor_shape: CursorShape,
        cursor_visible: bool,
    ) -> io::Result<()> {
        let frame = build_frame(buf, cursor, cursor_shape, cursor_visible, &mut self.startup_reset_emitted);
        write_atomic(out, &frame)?;
        buf.clear_force_full();
        Ok(())
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn build_frame(
    buf: &CellBuffer,
    cursor: (u16, u16),
    cursor_shape: CursorShape,
    cursor_visible: bool,
    startup_reset_emitted: &mut bool,
) -> Vec<u8> {
    let mut out = Vec::new();

    if !*startup_reset_emitted {
        out.extend_from_slice(RESET_G0_G1);
        *startup_reset_emitted = true;
    }

    out.extend_from_slice(BEGIN_SYNC);
    out.extend_from_slice(HIDE_CURSOR);

    let force_full = buf.force_full();
    for y in 0..buf.height() {
        emit_row_runs(&mut out, buf, y, force_full);
    }

    // Cursor position is 1-indexed in CUP.
    out.extend_from_slice(format!("\x1b[{};{}H", cursor.1 + 1, cursor.0 + 1).as_bytes());
    out.extend_from_slice(format!("\x1b[{cursor_shape} q").as_bytes());
    if cursor_visible {
        out.extend_from_slice(SHOW_CURSOR);
    } else {
        out.extend_from_slice(HIDE_CURSOR);
    }
    out.extend_from_slice(END_SYNC);

    out
}

fn emit_row_runs(out: &mut Vec<u8>, buf: &CellBuffer, y: usize, force_full: bool) {
    let width = buf.width();
    let mut x = 0;
    while x < width {
        if !force_full && !cell_differs(buf, x, y) {
            x += 1;
            continue;
        }

        let run_start = x;
        let mut run_end = x + 1;
        while run_end < width && (force_full || cell_differs(buf, run_end, y)) {
            run_end += 1;
        }

        emit_run(out, buf, y, run_start, run_end);
        x = run_end;
    }
}

fn cell_differs(buf: &CellBuffer, x: usize, y: usize) -> bool {
    buf.get(x, y) != buf.get_previous(x, y)
}

fn emit_run(out: &mut Vec<u8>, buf: &CellBuffer, y: usize, start: usize, end: usize) {
    out.extend_from_slice(format!("\x1b[{};{}H", y + 1, start + 1).as_bytes());

    let mut last_style: Option<&Cell> = None;
    for x in start..end {
        let cell = buf.get(x, y).expect("in-bounds run cell");
        let needs_sgr = match last_style {
            None => true,
            Some(prev) => !prev.style_eq(cell),
        };
        if needs_sgr {
            out.extend_from_slice(sgr_sequence(cell).as_bytes());
        }
        let mut encode_buf = [0u8; 4];
        out.extend_from_slice(cell.ch.encode_utf8(&mut encode_buf).as_bytes());
        last_style = Some(cell);
    }
}

/// Build a full SGR reset-and-redeclare sequence for `cell`. Never relies on
/// previously emitted SGR state.
fn sgr_sequence(cell: &Cell) -> String {
    let mut params = vec!["0".to_string()];
    if cell.bold {
        params.push("1".to_string());
    }
    if cell.faint {
        params.push("2".to_string());
    }
    if cell.italic {
        params.push("3".to_string());
    }
    if cell.underline {
        params.push("4".to_string());
    }
    if cell.blink {
        params.push("5".to_string());
    }
    if cell.inverse {
        params.push("7".to_string());
    }
    if cell.invisible {
        params.push("8".to_string());
    }
    if cell.strikethrough {
        params.push("9".to_string());
    }
    if let Some(fg) = sgr_color_param(cell.fg, false) {
        params.push(fg);
    }
    if let Some(bg) = sgr_color_param(cell.bg, true) {
        params.push(bg);
    }
    format!("\x1b[{}m", params.join(";"))
}

fn sgr_color_param(color: ColorSpec, background: bool) -> Option<String> {
    match color {
        ColorSpec::None => None,
        ColorSpec::Indexed(n) if n < 8 => {
            Some(if background { format!("4{n}") } else { format!("3{n}") })
        },
        ColorSpec::Indexed(n) if n < 16 => {
            let base = n - 8;
            Some(if background { format!("10{base}") } else { format!("9{base}") })
        },
        ColorSpec::Indexed(n) => {
            Some(if background { format!("48;5;{n}") } else { format!("38;5;{n}") })
        },
        ColorSpec::Rgb(r, g, b) => {
            Some(if background { format!("48;2;{r};{g};{b}") } else { format!("38;2;{r};{g};{b}") })
        },
    }
}

/// Write the whole frame in one call, retrying on partial writes without
/// ever re-splitting at anything but the byte offset the kernel already
/// accepted.
fn write_atomic<W: Write>(out: &mut W, frame: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < frame.len() {
        written += out.write(&frame[written..])?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(ch: char) -> Cell {
        Cell { ch, ..Cell::default() }
    }

    #[test]
    fn first_frame_is_full_redraw() {
        let mut buf = CellBuffer::new(4, 2);
        buf.set_cell(0, 0, cell('a'));
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render_frame(&mut out, &mut buf, (0, 0), 0, true).unwrap();

        assert!(!buf.force_full());
        assert!(out.starts_with(RESET_G0_G1));
        assert!(out.windows(BEGIN_SYNC.len()).any(|w| w == BEGIN_SYNC));
        assert!(out.windows(END_SYNC.len()).any(|w| w == END_SYNC));
    }

    #[test]
    fn startup_reset_emitted_once() {
        let mut buf = CellBuffer::new(4, 2);
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render_frame(&mut out, &mut buf, (0, 0), 0, true).unwrap();
        out.clear();
        buf.begin_frame();
        renderer.render_frame(&mut out, &mut buf, (0, 0), 0, true).unwrap();
        assert!(!out.starts_with(RESET_G0_G1));
    }

    #[test]
    fn unchanged_cells_produce_no_run() {
        let mut buf = CellBuffer::new(4, 2);
        buf.set_cell(0, 0, cell('a'));
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render_frame(&mut out, &mut buf, (0, 0), 0, true).unwrap();

        buf.begin_frame();
        buf.set_cell(0, 0, cell('a'));
        out.clear();
        renderer.render_frame(&mut out, &mut buf, (0, 0), 0, true).unwrap();
        // No cursor-positioning escape for row 1 (0-indexed col/row 0,0 CUP
        // still appears for the trailing cursor move, but no run CUP+glyph).
        let run_cup = b"\x1b[1;1H";
        let count = out.windows(run_cup.len()).filter(|w| *w == run_cup).count();
        assert_eq!(count, 1); // only the trailing cursor-position sequence
    }

    #[test]
    fn sgr_redeclares_fully_at_run_start() {
        let cell_bold = Cell { ch: 'x', bold: true, ..Cell::default() };
        let seq = sgr_sequence(&cell_bold);
        assert!(seq.starts_with("\x1b[0;1"));
    }

    #[test]
    fn colors_encode_per_spec_ranges() {
        assert_eq!(sgr_color_param(ColorSpec::Indexed(1), false), Some("31".into()));
        assert_eq!(sgr_color_param(ColorSpec::Indexed(9), false), Some("91".into()));
        assert_eq!(sgr_color_param(ColorSpec::Indexed(200), true), Some("48;5;200".into()));
        assert_eq!(sgr_color_param(ColorSpec::Rgb(1, 2, 3), true), Some("48;2;1;2;3".into()));
    }
}
