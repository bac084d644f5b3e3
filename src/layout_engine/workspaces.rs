use strum::IntoEnumIterator;
use tracing::trace;

use crate::layout_engine::floating::FloatingLayout;
use crate::layout_engine::systems::{LayoutKind, LayoutSystem, LayoutSystemKind};
use crate::layout_engine::LayoutWindow;
use crate::model::WindowId;

/// One instance of every layout strategy for a single workspace, plus the
/// cursor selecting the active one. Keeping every instance alive means
/// per-window state (floating rectangles, tab index) survives switching
/// layouts back and forth.
#[derive(Debug, Clone)]
pub struct WorkspaceLayouts {
    systems: Vec<LayoutSystemKind>,
    current: usize,
}

impl WorkspaceLayouts {
    pub fn new(initial: LayoutKind) -> Self {
        let systems: Vec<LayoutSystemKind> = LayoutKind::iter().map(LayoutKind::new_system).collect();
        let current = systems.iter().position(|s| s.kind() == initial).unwrap_or(0);
        WorkspaceLayouts { systems, current }
    }

    pub fn active(&self) -> &LayoutSystemKind { &self.systems[self.current] }

    pub fn active_kind(&self) -> LayoutKind { self.active().kind() }

    pub fn set_layout(&mut self, kind: LayoutKind) -> bool {
        match self.systems.iter().position(|s| s.kind() == kind) {
            Some(index) if index != self.current => {
                trace!(from = %self.active_kind(), to = %kind, "switching layout");
                self.current = index;
                true
            }
            _ => false,
        }
    }

    pub fn next_layout(&mut self) -> LayoutKind {
        self.current = (self.current + 1) % self.systems.len();
        self.active_kind()
    }

    pub fn prev_layout(&mut self) -> LayoutKind {
        self.current = (self.current + self.systems.len() - 1) % self.systems.len();
        self.active_kind()
    }

    pub fn next_tab(&mut self, count: usize) { self.systems[self.current].next(count) }

    pub fn prev_tab(&mut self, count: usize) { self.systems[self.current].prev(count) }

    pub fn window_added(&mut self, window: &LayoutWindow) {
        for system in &mut self.systems {
            system.on_window_added(window);
        }
    }

    pub fn window_removed(&mut self, window: WindowId) {
        for system in &mut self.systems {
            system.on_window_removed(window);
        }
    }

    pub fn floating(&self) -> Option<&FloatingLayout> {
        self.systems.iter().find_map(|s| match s {
            LayoutSystemKind::Floating(f) => Some(f),
            _ => None,
        })
    }

    pub fn floating_mut(&mut self) -> Option<&mut FloatingLayout> {
        self.systems.iter_mut().find_map(|s| match s {
            LayoutSystemKind::Floating(f) => Some(f),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::layout_engine::systems::tests::windows;
    use crate::sys::geometry::Rect;

    #[test]
    fn cursor_cycles_through_every_layout() {
        let mut layouts = WorkspaceLayouts::new(LayoutKind::TilingStack);
        let count = LayoutKind::iter().count();
        for _ in 0..count {
            layouts.next_layout();
        }
        assert_eq!(layouts.active_kind(), LayoutKind::TilingStack);
        assert_eq!(layouts.prev_layout(), LayoutKind::Floating);
    }

    #[test]
    fn set_layout_reports_changes() {
        let mut layouts = WorkspaceLayouts::new(LayoutKind::Grid);
        assert!(!layouts.set_layout(LayoutKind::Grid));
        assert!(layouts.set_layout(LayoutKind::Bsp));
        assert_eq!(layouts.active_kind(), LayoutKind::Bsp);
    }

    #[test]
    fn hooks_reach_the_floating_layout() {
        let ws = windows(1);
        let mut layouts = WorkspaceLayouts::new(LayoutKind::TilingStack);
        layouts.window_added(&ws[0]);
        assert_eq!(layouts.floating().and_then(|f| f.remembered(ws[0].id)), Some(ws[0].frame));

        if let Some(f) = layouts.floating_mut() {
            f.remember(ws[0].id, Rect::new(1, 2, 300, 300));
        }
        assert_eq!(
            layouts.floating().and_then(|f| f.remembered(ws[0].id)),
            Some(Rect::new(1, 2, 300, 300))
        );
        layouts.window_removed(ws[0].id);
        assert_eq!(layouts.floating().and_then(|f| f.remembered(ws[0].id)), None);
    }
}
