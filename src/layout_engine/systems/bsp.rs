use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::sys::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    fn flip(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Binary space partitioning: the window list is halved at each level and
/// the split axis alternates, starting with a left | right split.
#[derive(Debug, Clone, Copy, Default)]
pub struct BspLayout;

impl BspLayout {
    fn split(
        windows: &[LayoutWindow],
        rect: Rect,
        orientation: Orientation,
        out: &mut Vec<Assignment>,
    ) {
        match windows {
            [] => {}
            [only] => out.push(Assignment::shown(only.id, rect)),
            _ => {
                let (first, second) = windows.split_at(windows.len() / 2);
                let (r1, r2) = match orientation {
                    Orientation::Horizontal => {
                        let w2 = rect.width / 2;
                        let w1 = rect.width - w2;
                        (
                            Rect::new(rect.x, rect.y, w1, rect.height),
                            Rect::new(rect.x + w1, rect.y, w2, rect.height),
                        )
                    }
                    Orientation::Vertical => {
                        let h2 = rect.height / 2;
                        let h1 = rect.height - h2;
                        (
                            Rect::new(rect.x, rect.y, rect.width, h1),
                            Rect::new(rect.x, rect.y + h1, rect.width, h2),
                        )
                    }
                };
                Self::split(first, r1, orientation.flip(), out);
                Self::split(second, r2, orientation.flip(), out);
            }
        }
    }
}

impl LayoutSystem for BspLayout {
    fn kind(&self) -> LayoutKind { LayoutKind::Bsp }

    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment> {
        let mut out = Vec::with_capacity(windows.len());
        Self::split(windows, frame.area, Orientation::Horizontal, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout_engine::systems::tests::{frame, windows};

    #[test]
    fn leaves_tile_the_area() {
        let area = Rect::new(5, 7, 1279, 719);
        for n in 1..=16 {
            let ws = windows(n);
            let out = BspLayout.calculate(&ws, &frame(area));
            assert_eq!(out.len(), n);
            assert_eq!(out.iter().map(|a| a.frame.area()).sum::<i64>(), area.area(), "n = {n}");
            for (i, a) in out.iter().enumerate() {
                assert!(area.contains_rect(&a.frame), "n = {n}: {} escapes", a.frame);
                for b in &out[i + 1..] {
                    assert_eq!(a.frame.intersection(&b.frame), None, "n = {n}");
                }
            }
            let mut ids: Vec<_> = out.iter().map(|a| a.window).collect();
            ids.sort();
            let mut expected: Vec<_> = ws.iter().map(|w| w.id).collect();
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn two_windows_split_side_by_side() {
        let out = BspLayout.calculate(&windows(2), &frame(Rect::new(0, 0, 1001, 500)));
        assert_eq!(out[0].frame, Rect::new(0, 0, 501, 500));
        assert_eq!(out[1].frame, Rect::new(501, 0, 500, 500));
    }

    #[test]
    fn three_windows_alternate_axes() {
        let out = BspLayout.calculate(&windows(3), &frame(Rect::new(0, 0, 1000, 800)));
        assert_eq!(out[0].frame, Rect::new(0, 0, 500, 800));
        assert_eq!(out[1].frame, Rect::new(500, 0, 500, 400));
        assert_eq!(out[2].frame, Rect::new(500, 400, 500, 400));
    }
}
