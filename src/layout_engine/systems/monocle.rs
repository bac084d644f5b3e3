use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};

/// Shows only the first window. The fullscreen flavour ignores gaps and
/// covers the whole monitor.
#[derive(Debug, Clone, Copy)]
pub struct MonocleLayout {
    fullscreen: bool,
}

impl MonocleLayout {
    pub fn monocle() -> Self { MonocleLayout { fullscreen: false } }

    pub fn fullscreen() -> Self { MonocleLayout { fullscreen: true } }
}

impl LayoutSystem for MonocleLayout {
    fn kind(&self) -> LayoutKind {
        if self.fullscreen { LayoutKind::Fullscreen } else { LayoutKind::Monocle }
    }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        let rect = if self.fullscreen { frame.screen } else { frame.area };
        windows
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { Assignment::shown(w.id, rect) } else { Assignment::hidden(w) })
            .collect()
    }

    fn uses_gaps(&self) -> bool { !self.fullscreen }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout_engine::systems::tests::windows;
    use crate::sys::geometry::Rect;

    #[test]
    fn only_the_first_window_is_shown() {
        let ws = windows(3);
        let frame = LayoutFrame {
            screen: Rect::new(0, 0, 1920, 1080),
            area: Rect::new(10, 10, 1900, 1060),
            snap_threshold: 0,
        };
        let out = MonocleLayout::monocle().calculate(&ws, &frame);
        assert_eq!(out[0], Assignment::shown(ws[0].id, frame.area));
        assert_eq!(out[1], Assignment::hidden(&ws[1]));
        assert_eq!(out[2].frame, ws[2].frame);

        let out = MonocleLayout::fullscreen().calculate(&ws, &frame);
        assert_eq!(out[0].frame, frame.screen);
        assert!(!out[2].visible);
    }
}
