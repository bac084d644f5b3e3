use crate::common::collections::HashMap;
use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::model::WindowId;
use crate::sys::geometry::Rect;

/// Floating windows never shrink below this in either dimension.
pub const MIN_FLOATING_SIZE: i32 = 50;

/// Pass-through layout: each window keeps its remembered rectangle, subject
/// only to edge snapping against the monitor.
#[derive(Debug, Clone, Default)]
pub struct FloatingLayout {
    positions: HashMap<WindowId, Rect>,
}

impl FloatingLayout {
    pub fn remember(&mut self, window: WindowId, frame: Rect) {
        self.positions.insert(window, clamp_size(frame));
    }

    pub fn remembered(&self, window: WindowId) -> Option<Rect> { self.positions.get(&window).copied() }

    pub fn forget(&mut self, window: WindowId) -> Option<Rect> { self.positions.remove(&window) }

    fn default_frame(area: Rect) -> Rect {
        let width = (area.width / 2).max(MIN_FLOATING_SIZE);
        let height = (area.height / 2).max(MIN_FLOATING_SIZE);
        Rect::new(area.x + (area.width - width) / 2, area.y + (area.height - height) / 2, width, height)
    }
}

impl LayoutSystem for FloatingLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Floating }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        windows
            .iter()
            .map(|w| {
                let base = self
                    .remembered(w.id)
                    .or_else(|| (!w.frame.is_empty()).then_some(w.frame))
                    .unwrap_or_else(|| Self::default_frame(frame.area));
                let rect = snap_to_edges(clamp_size(base), frame.screen, frame.snap_threshold);
                Assignment::shown(w.id, rect)
            })
            .collect()
    }

    fn on_window_added(&mut self, window: &LayoutWindow) {
        if !self.positions.contains_key(&window.id) && !window.frame.is_empty() {
            self.remember(window.id, window.frame);
        }
    }

    fn on_window_removed(&mut self, window: WindowId) { self.positions.remove(&window); }

    fn uses_gaps(&self) -> bool { false }
}

pub fn clamp_size(rect: Rect) -> Rect {
    Rect {
        width: rect.width.max(MIN_FLOATING_SIZE),
        height: rect.height.max(MIN_FLOATING_SIZE),
        ..rect
    }
}

/// Aligns edges that are within `threshold` pixels of the monitor's edges.
///
/// Each axis is handled on its own. A near start edge moves the window onto
/// the monitor's start edge, otherwise a near end edge moves it onto the
/// monitor's end edge. If both are near, the window takes the full extent of
/// the monitor on that axis.
pub fn snap_to_edges(rect: Rect, monitor: Rect, threshold: i32) -> Rect {
    let (x, width) = snap_axis(rect.x, rect.width, monitor.x, monitor.width, threshold);
    let (y, height) = snap_axis(rect.y, rect.height, monitor.y, monitor.height, threshold);
    Rect { x, y, width, height }
}

fn snap_axis(start: i32, len: i32, m_start: i32, m_len: i32, threshold: i32) -> (i32, i32) {
    let m_end = m_start + m_len;
    let near_start = (start - m_start).abs() <= threshold;
    let near_end = (start + len - m_end).abs() <= threshold;
    match (near_start, near_end) {
        (true, true) => (m_start, m_len),
        (true, false) => (m_start, len),
        (false, true) => (m_end - len, len),
        (false, false) => (start, len),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout_engine::systems::tests::{frame, windows};

    const MONITOR: Rect = Rect::new(0, 0, 1920, 1080);

    #[test]
    fn snaps_a_near_left_edge_exactly() {
        let r = snap_to_edges(Rect::new(10, 300, 400, 300), MONITOR, 16);
        assert_eq!(r, Rect::new(0, 300, 400, 300));
    }

    #[test]
    fn snaps_a_near_right_and_bottom_edge() {
        let r = snap_to_edges(Rect::new(1510, 770, 400, 300), MONITOR, 16);
        assert_eq!(r, Rect::new(1520, 780, 400, 300));
    }

    #[test]
    fn stretches_when_both_edges_are_near() {
        let r = snap_to_edges(Rect::new(5, 100, 1905, 300), MONITOR, 16);
        assert_eq!(r, Rect::new(0, 100, 1920, 300));
    }

    #[test]
    fn leaves_distant_windows_alone() {
        let r = Rect::new(100, 100, 400, 300);
        assert_eq!(snap_to_edges(r, MONITOR, 16), r);
        assert_eq!(snap_to_edges(Rect::new(10, 100, 400, 300), MONITOR, 0).x, 10);
    }

    #[test]
    fn snaps_against_a_secondary_monitor() {
        let right = Rect::new(1920, 0, 1280, 1024);
        assert_eq!(snap_to_edges(Rect::new(1930, 40, 300, 200), right, 16).x, 1920);
    }

    #[test]
    fn clamp_enforces_the_floor() {
        assert_eq!(clamp_size(Rect::new(1, 2, 10, -5)), Rect::new(1, 2, 50, 50));
    }

    #[test]
    fn remembered_frames_win_over_current() {
        let ws = windows(2);
        let mut layout = FloatingLayout::default();
        for w in &ws {
            layout.on_window_added(w);
        }
        layout.remember(ws[1].id, Rect::new(700, 500, 300, 200));
        let out = layout.calculate(&ws, &frame(MONITOR));
        assert_eq!(out[0].frame, Rect::new(0, 0, 400, 300));
        assert_eq!(out[1].frame, Rect::new(700, 500, 300, 200));

        layout.on_window_removed(ws[1].id);
        assert_eq!(layout.remembered(ws[1].id), None);
    }
}
