mod engine;
mod floating;
pub mod systems;
pub mod utils;
mod workspaces;

pub use engine::LayoutEngine;
pub use floating::{FloatingLayout, MIN_FLOATING_SIZE, clamp_size, snap_to_edges};
pub use systems::{
    BspLayout, GridLayout, LayoutKind, LayoutSystem, LayoutSystemKind, MonocleLayout,
    TabbedLayout, TilingStackLayout,
};
pub use workspaces::WorkspaceLayouts;

use crate::model::WindowId;
use crate::sys::geometry::Rect;

/// Inputs shared by every strategy for one monitor's layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutFrame {
    /// The whole monitor.
    pub screen: Rect,
    /// The monitor minus outer gaps; tiled windows go here.
    pub area: Rect,
    pub snap_threshold: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutWindow {
    pub id: WindowId,
    /// Last known frame; strategies that hide a window keep it unchanged.
    pub frame: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub window: WindowId,
    pub frame: Rect,
    pub visible: bool,
}

impl Assignment {
    pub fn shown(window: WindowId, frame: Rect) -> Assignment {
        Assignment { window, frame, visible: true }
    }

    pub fn hidden(window: &LayoutWindow) -> Assignment {
        Assignment { window: window.id, frame: window.frame, visible: false }
    }
}
