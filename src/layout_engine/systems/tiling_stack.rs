use crate::layout_engine::systems::{LayoutKind, LayoutSystem, split_first_heavy};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::sys::geometry::Rect;

/// Full-width rows stacked top to bottom.
#[derive(Debug, Clone, Copy, Default)]
pub struct TilingStackLayout;

impl LayoutSystem for TilingStackLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::TilingStack }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        let area = frame.area;
        let mut y = area.y;
        windows
            .iter()
            .zip(split_first_heavy(area.height, windows.len()))
            .map(|(w, height)| {
                let rect = Rect::new(area.x, y, area.width, height);
                y += height;
                Assignment::shown(w.id, rect)
            })
            .collect()
    }
}
