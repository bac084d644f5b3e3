use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::sys::geometry::Rect;

#[derive(Debug, Clone, Copy, Default)]
pub struct GridLayout;

impl GridLayout {
    /// Columns and rows for `n` windows.
    pub fn dimensions(n: usize) -> (usize, usize) {
        if n == 0 {
            return (0, 0);
        }
        let mut cols = n.isqrt();
        if cols * cols < n {
            cols += 1;
        }
        (cols, n.div_ceil(cols))
    }
}

impl LayoutSystem for GridLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Grid }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        let (cols, rows) = Self::dimensions(windows.len());
        if cols == 0 {
            return Vec::new();
        }
        let area = frame.area;
        let (Ok(c), Ok(r)) = (i32::try_from(cols), i32::try_from(rows)) else {
            return Vec::new();
        };
        let cell_w = area.width / c;
        let cell_h = area.height / r;

        windows
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let (col, row) = ((i % cols) as i32, (i / cols) as i32);
                let x = area.x + col * cell_w;
                let y = area.y + row * cell_h;
                let width = if col == c - 1 { area.right() - x } else { cell_w };
                let height = if row == r - 1 { area.bottom() - y } else { cell_h };
                Assignment::shown(w.id, Rect::new(x, y, width, height))
            })
            .collect()
    }
}
