//! The double-buffered cell grid at the heart of the differential renderer.
//!
//! No direct teacher counterpart — the teacher's `alacritty` draws through a
//! GPU glyph atlas, not a text-mode differential renderer — so this and
//! `renderer.rs` are built straight from the spec's invariants, in the
//! teacher's plain-struct-plus-methods style.

use serde::{Deserialize, Serialize};

/// A cell's foreground or background colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColorSpec {
    /// No explicit colour; the terminal's default applies.
    #[default]
    None,
    /// One of the 256 indexed palette colours.
    Indexed(u8),
    /// A 24-bit truecolor value.
    Rgb(u8, u8, u8),
}

/// One grid position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The glyph occupying this cell.
    pub ch: char,
    /// Foreground colour.
    pub fg: ColorSpec,
    /// Background colour.
    pub bg: ColorSpec,
    /// Bold.
    pub bold: bool,
    /// Faint/dim.
    pub faint: bool,
    /// Italic.
    pub italic: bool,
    /// Underline.
    pub underline: bool,
    /// Blink.
    pub blink: bool,
    /// Inverse video.
    pub inverse: bool,
    /// Invisible (concealed).
    pub invisible: bool,
    /// Strikethrough.
    pub strikethrough: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: ColorSpec::None,
            bg: ColorSpec::None,
            bold: false,
            faint: false,
            italic: false,
            underline: false,
            blink: false,
            inverse: false,
            invisible: false,
            strikethrough: false,
        }
    }
}

impl Cell {
    /// Whether this cell's style attributes differ from `other`'s (ignoring
    /// the glyph itself). Used to decide whether a run needs a fresh SGR
    /// sequence mid-run.
    pub fn style_eq(&self, other: &Cell) -> bool {
        self.fg == other.fg
            && self.bg == other.bg
            && self.bold == other.bold
            && self.faint == other.faint
            && self.italic == other.italic
            && self.underline == other.underline
            && self.blink == other.blink
            && self.inverse == other.inverse
            && self.invisible == other.invisible
            && self.strikethrough == other.strikethrough
    }
}

/// Two equal-size rectangular grids of cells: the frame being composed and
/// the last frame actually emitted.
pub struct CellBuffer {
    current: Vec<Cell>,
    previous: Vec<Cell>,
    width: usize,
    height: usize,
    force_full: bool,
}

impl CellBuffer {
    /// Allocate a buffer of the given size, forcing a full redraw on the
    /// first frame.
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            current: vec![Cell::default(); size],
            previous: vec![Cell::default(); size],
            width,
            height,
            force_full: true,
        }
    }

    /// Current width in columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Current height in rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Begin composing a new frame: the last composed frame becomes
    /// `previous`, and `current` is reset to default cells.
    pub fn begin_frame(&mut self) {
        std::mem::swap(&mut self.current, &mut self.previous);
        for cell in &mut self.current {
            *cell = Cell::default();
        }
    }

    /// Write a cell into the frame being composed. Writes outside bounds are
    /// silently discarded.
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.current[y * self.width + x] = cell;
    }

    /// Read a cell from the frame being composed.
    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.current[y * self.width + x])
    }

    /// Read a cell from the previously emitted frame.
    pub fn get_previous(&self, x: usize, y: usize) -> Option<&Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(&self.previous[y * self.width + x])
    }

    /// Whether the next `end_frame` must redraw every cell, regardless of
    /// whether it differs from `previous`.
    pub fn force_full(&self) -> bool {
        self.force_full
    }

    /// Request a full redraw on the next frame (e.g. after a resize or a
    /// VT-observed full-screen clear).
    pub fn mark_force_full(&mut self) {
        self.force_full = true;
    }

    /// Clear the force-full flag; called once the renderer has emitted a
    /// frame honoring it.
    pub fn clear_force_full(&mut self) {
        self.force_full = false;
    }

    /// Reallocate both grids to a new size and force a full redraw.
    pub fn resize(&mut self, width: usize, height: usize) {
        let size = width * height;
        self.current = vec![Cell::default(); size];
        self.previous = vec![Cell::default(); size];
        self.width = width;
        self.height = height;
        self.force_full = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_forces_full_redraw() {
        let buf = CellBuffer::new(10, 5);
        assert!(buf.force_full());
    }

    #[test]
    fn set_cell_outside_bounds_is_discarded() {
        let mut buf = CellBuffer::new(10, 5);
        buf.set_cell(100, 100, Cell { ch: 'x', ..Cell::default() });
        assert_eq!(buf.get(100, 100), None);
    }

    #[test]
    fn begin_frame_swaps_and_resets_current() {
        let mut buf = CellBuffer::new(4, 2);
        buf.set_cell(0, 0, Cell { ch: 'a', ..Cell::default() });
        buf.clear_force_full();
        buf.begin_frame();

        assert_eq!(buf.get_previous(0, 0).unwrap().ch, 'a');
        assert_eq!(buf.get(0, 0).unwrap().ch, ' ');
    }

    #[test]
    fn resize_reallocates_and_forces_full() {
        let mut buf = CellBuffer::new(4, 2);
        buf.clear_force_full();
        buf.resize(8, 3);
        assert_eq!(buf.width(), 8);
        assert_eq!(buf.height(), 3);
        assert!(buf.force_full());
    }
}
