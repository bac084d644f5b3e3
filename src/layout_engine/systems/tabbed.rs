use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};

/// One window at a time, chosen by a tab index that wraps around.
#[derive(Debug, Clone, Copy)]
pub struct TabbedLayout {
    kind: LayoutKind,
    index: usize,
}

impl TabbedLayout {
    pub fn tabbed() -> Self { TabbedLayout { kind: LayoutKind::Tabbed, index: 0 } }

    pub fn stacking() -> Self { TabbedLayout { kind: LayoutKind::Stacking, index: 0 } }

    pub fn index(&self) -> usize { self.index }
}

impl LayoutSystem for TabbedLayout {
    fn kind(&self) -> LayoutKind { self.kind }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        if windows.is_empty() {
            return Vec::new();
        }
        let current = self.index % windows.len();
        windows
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if i == current { Assignment::shown(w.id, frame.area) } else { Assignment::hidden(w) }
            })
            .collect()
    }

    fn next(&mut self, count: usize) {
        if count > 0 {
            self.index = (self.index % count + 1) % count;
        }
    }

    fn prev(&mut self, count: usize) {
        if count > 0 {
            self.index = (self.index % count + count - 1) % count;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout_engine::systems::tests::{frame, windows};
    use crate::sys::geometry::Rect;

    fn visible(layout: &TabbedLayout, ws: &[LayoutWindow]) -> usize {
        let out = layout.calculate(ws, &frame(Rect::new(0, 0, 800, 600)));
        assert_eq!(out.iter().filter(|a| a.visible).count(), 1);
        out.iter().position(|a| a.visible).unwrap()
    }

    #[test]
    fn next_and_prev_wrap() {
        let ws = windows(3);
        let mut layout = TabbedLayout::tabbed();
        assert_eq!(visible(&layout, &ws), 0);
        layout.next(3);
        layout.next(3);
        assert_eq!(visible(&layout, &ws), 2);
        layout.next(3);
        assert_eq!(visible(&layout, &ws), 0);
        layout.prev(3);
        assert_eq!(visible(&layout, &ws), 2);
    }

    #[test]
    fn index_survives_shrinking_window_list() {
        let mut layout = TabbedLayout::stacking();
        layout.prev(5);
        assert_eq!(layout.index(), 4);
        assert_eq!(visible(&layout, &windows(2)), 0);
        layout.next(0);
        assert_eq!(layout.index(), 4);
    }
}
