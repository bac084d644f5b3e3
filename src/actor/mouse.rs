//! Mouse-driven move and resize of floating windows.
//!
//! A press of the configured modifier plus the move or resize button starts a
//! [`DragSession`]. Motion events then translate or resize the window relative
//! to where the drag started, and the release ends the session.

use tracing::{debug, trace};

use crate::common::config::Settings;
use crate::layout_engine::{clamp_size, snap_to_edges};
use crate::model::WindowId;
use crate::model::monitor::MonitorRegistry;
use crate::sys::geometry::Rect;
use crate::sys::keys::ModMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSettings {
    pub modifier: ModMask,
    pub move_button: u8,
    pub resize_button: u8,
    pub snap_threshold: i32,
}

impl DragSettings {
    pub fn new(settings: &Settings) -> Self {
        DragSettings {
            modifier: settings.drag_modifier_mask().unwrap_or(ModMask::MOD4),
            move_button: settings.move_button,
            resize_button: settings.resize_button,
            snap_threshold: settings.snap_threshold,
        }
    }

    /// Button grabs needed on every managed window.
    pub fn bindings(&self) -> [(u8, ModMask); 2] {
        [(self.move_button, self.modifier), (self.resize_button, self.modifier)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    pub window: WindowId,
    pub mode: DragMode,
    pub pointer_start: (i32, i32),
    pub window_start: Rect,
    /// Frame after the last motion event.
    pub current: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
}

#[derive(Debug)]
pub struct Mouse {
    settings: DragSettings,
    state: DragState,
}

impl Mouse {
    pub fn new(settings: DragSettings) -> Self { Mouse { settings, state: DragState::Idle } }

    pub fn settings(&self) -> &DragSettings { &self.settings }

    pub fn state(&self) -> &DragState { &self.state }

    pub fn is_dragging(&self) -> bool { matches!(self.state, DragState::Dragging(_)) }

    /// The gesture a press starts, if it has the drag modifier held.
    pub fn mode_for(&self, button: u8, state: ModMask) -> Option<DragMode> {
        if !state.clean().contains(self.settings.modifier) {
            return None;
        }
        match button {
            b if b == self.settings.move_button => Some(DragMode::Move),
            b if b == self.settings.resize_button => Some(DragMode::Resize),
            _ => None,
        }
    }

    /// Idle -> Dragging. Ignored while a drag is already running.
    pub fn begin(&mut self, window: WindowId, mode: DragMode, pointer: (i32, i32), frame: Rect) -> bool {
        if self.is_dragging() {
            return false;
        }
        debug!(?window, ?mode, ?pointer, %frame, "drag started");
        self.state = DragState::Dragging(DragSession {
            window,
            mode,
            pointer_start: pointer,
            window_start: frame,
            current: frame,
        });
        true
    }

    /// Applies a pointer position to the running drag and returns the new
    /// frame for the dragged window.
    pub fn motion(&mut self, x: i32, y: i32, monitors: &MonitorRegistry) -> Option<(WindowId, Rect)> {
        let DragState::Dragging(session) = &mut self.state else {
            return None;
        };
        let (dx, dy) = (x - session.pointer_start.0, y - session.pointer_start.1);
        let frame = match session.mode {
            DragMode::Move => {
                let moved = session.window_start.translate(dx, dy);
                let monitor = monitors.get(monitors.for_rect(&moved)).map(|m| m.rect);
                match monitor {
                    Some(monitor) => snap_to_edges(moved, monitor, self.settings.snap_threshold),
                    None => moved,
                }
            }
            DragMode::Resize => resize_by(session.window_start, dx, dy),
        };
        trace!(dx, dy, %frame, "drag motion");
        session.current = frame;
        Some((session.window, frame))
    }

    /// Dragging -> Idle, returning the final frame.
    pub fn end(&mut self) -> Option<(WindowId, Rect)> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging(session) => {
                debug!(window = ?session.window, frame = %session.current, "drag finished");
                Some((session.window, session.current))
            }
            DragState::Idle => None,
        }
    }

    /// Drops the session if it targets `window`.
    pub fn cancel_for(&mut self, window: WindowId) -> bool {
        match self.state {
            DragState::Dragging(session) if session.window == window => {
                self.state = DragState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Grows or shrinks a frame from its top-left corner, never below the
/// floating size floor.
pub fn resize_by(frame: Rect, dw: i32, dh: i32) -> Rect {
    clamp_size(Rect {
        width: frame.width.saturating_add(dw),
        height: frame.height.saturating_add(dh),
        ..frame
    })
}
