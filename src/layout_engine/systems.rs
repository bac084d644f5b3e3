use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::layout_engine::floating::FloatingLayout;
use crate::layout_engine::{Assignment, LayoutFrame, LayoutWindow};
use crate::model::WindowId;

mod bsp;
mod grid;
mod monocle;
mod tabbed;
mod tiling_stack;

pub use bsp::BspLayout;
pub use grid::GridLayout;
pub use monocle::MonocleLayout;
pub use tabbed::TabbedLayout;
pub use tiling_stack::TilingStackLayout;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    #[serde(alias = "tile")]
    #[strum(to_string = "tiling_stack", serialize = "tile")]
    TilingStack,
    Monocle,
    Fullscreen,
    Bsp,
    Grid,
    Tabbed,
    Stacking,
    Floating,
}

impl LayoutKind {
    pub fn new_system(self) -> LayoutSystemKind {
        match self {
            LayoutKind::TilingStack => TilingStackLayout.into(),
            LayoutKind::Monocle => MonocleLayout::monocle().into(),
            LayoutKind::Fullscreen => MonocleLayout::fullscreen().into(),
            LayoutKind::Bsp => BspLayout.into(),
            LayoutKind::Grid => GridLayout.into(),
            LayoutKind::Tabbed => TabbedLayout::tabbed().into(),
            LayoutKind::Stacking => TabbedLayout::stacking().into(),
            LayoutKind::Floating => FloatingLayout::default().into(),
        }
    }
}

/// A layout strategy. Hooks default to no-ops; only stateful strategies
/// override them.
#[enum_dispatch]
pub trait LayoutSystem {
    fn kind(&self) -> LayoutKind;

    /// Maps the ordered window list onto the frame. Must be a pure function of
    /// its inputs and the strategy's own state.
    fn calculate(&self, windows: &[LayoutWindow], frame: &LayoutFrame) -> Vec<Assignment>;

    fn on_window_added(&mut self, _window: &LayoutWindow) {}

    fn on_window_removed(&mut self, _window: WindowId) {}

    fn next(&mut self, _count: usize) {}

    fn prev(&mut self, _count: usize) {}

    /// Whether inner gaps are carved out of the computed frames.
    fn uses_gaps(&self) -> bool { true }
}

#[derive(Debug, Clone)]
#[enum_dispatch(LayoutSystem)]
pub enum LayoutSystemKind {
    TilingStack(TilingStackLayout),
    Monocle(MonocleLayout),
    Bsp(BspLayout),
    Grid(GridLayout),
    Tabbed(TabbedLayout),
    Floating(FloatingLayout),
}

/// Splits `total` into `parts` integer lengths that sum to `total`, giving the
/// remainder to the first part.
pub(crate) fn split_first_heavy(total: i32, parts: usize) -> Vec<i32> {
    let Ok(n) = i32::try_from(parts) else {
        return Vec::new();
    };
    if n == 0 {
        return Vec::new();
    }
    let base = total / n;
    let mut lengths = vec![base; parts];
    lengths[0] += total - base * n;
    lengths
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use slotmap::SlotMap;
    use strum::IntoEnumIterator;
    use test_log::test;

    use super::*;
    use crate::sys::geometry::Rect;

    pub fn windows(n: usize) -> Vec<LayoutWindow> {
        let mut ids: SlotMap<WindowId, ()> = SlotMap::with_key();
        (0..n)
            .map(|i| {
                let offset = i32::try_from(i).unwrap() * 10;
                LayoutWindow { id: ids.insert(()), frame: Rect::new(offset, offset, 400, 300) }
            })
            .collect()
    }

    pub fn frame(area: Rect) -> LayoutFrame { LayoutFrame { screen: area, area, snap_threshold: 16 } }

    #[test]
    fn layout_names_round_trip() {
        for kind in LayoutKind::iter() {
            let name: &'static str = kind.into();
            assert_eq!(name.parse::<LayoutKind>().unwrap(), kind);
            assert_eq!(kind.new_system().kind(), kind);
        }
        assert_eq!("tile".parse::<LayoutKind>().unwrap(), LayoutKind::TilingStack);
    }

    #[test]
    fn every_layout_is_idempotent() {
        let area = Rect::new(0, 0, 1366, 768);
        for n in 0..8 {
            let ws = windows(n);
            for kind in LayoutKind::iter() {
                let mut system = kind.new_system();
                for w in &ws {
                    system.on_window_added(w);
                }
                let first = system.calculate(&ws, &frame(area));
                let second = system.calculate(&ws, &frame(area));
                assert_eq!(first, second, "{kind} with {n} windows");
                assert_eq!(first.len(), n, "{kind} must assign every window");
            }
        }
    }

    #[test]
    fn split_gives_remainder_to_first() {
        assert_eq!(split_first_heavy(1000, 3), vec![334, 333, 333]);
        assert_eq!(split_first_heavy(900, 3), vec![300, 300, 300]);
        assert_eq!(split_first_heavy(5, 0), Vec::<i32>::new());
    }
}
