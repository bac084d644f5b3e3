use tracing::trace;

use crate::common::config::{GapSettings, Settings};
use crate::layout_engine::systems::{LayoutKind, LayoutSystem};
use crate::layout_engine::utils::{apply_inner_gaps, compute_tiling_area};
use crate::layout_engine::workspaces::WorkspaceLayouts;
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::sys::geometry::Rect;

/// Runs a workspace's active strategy over its windows for one monitor and
/// applies the gap policy.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    gaps: GapSettings,
    snap_threshold: i32,
    default_layout: LayoutKind,
}

impl LayoutEngine {
    pub fn new(settings: &Settings) -> Self {
        LayoutEngine {
            gaps: settings.gaps.clone(),
            snap_threshold: settings.snap_threshold,
            default_layout: settings.default_layout,
        }
    }

    pub fn default_layout(&self) -> LayoutKind { self.default_layout }

    pub fn snap_threshold(&self) -> i32 { self.snap_threshold }

    pub fn tiling_area(&self, screen: Rect, tiled_count: usize) -> Rect {
        compute_tiling_area(screen, &self.gaps, tiled_count)
    }

    pub fn frame_for(&self, screen: Rect, tiled_count: usize) -> LayoutFrame {
        LayoutFrame {
            screen,
            area: self.tiling_area(screen, tiled_count),
            snap_threshold: self.snap_threshold,
        }
    }

    /// Computes frames for the tiled windows with the active strategy and for
    /// the floating windows with the workspace's floating layout.
    pub fn apply(
        &self,
        layouts: &WorkspaceLayouts,
        tiled: &[LayoutWindow],
        floating: &[LayoutWindow],
        screen: Rect,
    ) -> Vec<Assignment> {
        let frame = self.frame_for(screen, tiled.len());
        let active = layouts.active();

        let mut out = active.calculate(tiled, &frame);
        if active.uses_gaps() {
            apply_inner_gaps(&mut out, frame.area, &self.gaps, tiled.len());
        }
        if let Some(floating_layout) = layouts.floating() {
            out.extend(floating_layout.calculate(floating, &frame));
        }
        trace!(layout = %active.kind(), tiled = tiled.len(), floating = floating.len(), "applied layout");
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::common::config::SmartGaps;
    use crate::layout_engine::systems::tests::windows;

    fn engine(inner: i32, outer: i32) -> LayoutEngine {
        let mut settings = Settings::default();
        settings.gaps = GapSettings { inner, outer, smart: SmartGaps::Off };
        LayoutEngine::new(&settings)
    }

    #[test]
    fn tiled_frames_stay_inside_the_gapped_monitor() {
        let screen = Rect::new(1920, 0, 1280, 1024);
        let engine = engine(6, 12);
        let ws = windows(5);
        for kind in [LayoutKind::TilingStack, LayoutKind::Bsp, LayoutKind::Grid, LayoutKind::Monocle]
        {
            let layouts = WorkspaceLayouts::new(kind);
            let out = engine.apply(&layouts, &ws, &[], screen);
            let area = screen.inset(12);
            assert!(
                out.iter().filter(|a| a.visible).all(|a| area.contains_rect(&a.frame)),
                "{kind}: {out:?}"
            );
        }
    }

    #[test]
    fn floating_windows_pass_through() {
        let ws = windows(3);
        let mut layouts = WorkspaceLayouts::new(LayoutKind::TilingStack);
        for w in &ws {
            layouts.window_added(w);
        }
        let out = engine(0, 0).apply(&layouts, &ws[..2], &ws[2..], Rect::new(0, 0, 1200, 900));
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].frame, Rect::new(0, 0, 1200, 450));
        assert_eq!(out[1].frame, Rect::new(0, 450, 1200, 450));
        assert_eq!(out[2].frame, ws[2].frame);
    }

    #[test]
    fn apply_is_idempotent() {
        let ws = windows(4);
        let layouts = WorkspaceLayouts::new(LayoutKind::Bsp);
        let engine = engine(4, 4);
        let screen = Rect::new(0, 0, 1600, 900);
        assert_eq!(engine.apply(&layouts, &ws, &[], screen), engine.apply(&layouts, &ws, &[], screen));
    }
}
