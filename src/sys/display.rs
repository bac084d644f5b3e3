//! The seam between the window manager and the display server.
//!
//! Everything above this module talks to a [`DisplayServer`]; the real
//! implementation lives in [`crate::sys::x11`], and tests drive the reactor
//! through an in-memory fake.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::reactor::WmError;
use crate::sys::event::ServerEvent;
use crate::sys::geometry::Rect;
use crate::sys::keys::{KeyChord, Keysym, ModMask};

pub type Atom = u32;

/// A display-server window id. Owned by the server; we only ever copy it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct WindowHandle(pub u32);

impl WindowHandle {
    pub const NONE: WindowHandle = WindowHandle(0);

    pub fn get(self) -> u32 { self.0 }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:#x}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Atoms(Vec<Atom>),
    Windows(Vec<WindowHandle>),
    Cardinals(Vec<u32>),
    /// UTF8_STRING list, NUL separated on the wire.
    Utf8(Vec<String>),
    /// Latin-1 STRING list, NUL separated on the wire.
    Strings(Vec<String>),
    /// 32-bit data of a property-specific type (WM_STATE for example).
    Typed32 { kind: Atom, values: Vec<u32> },
}

impl PropertyValue {
    pub fn first_string(&self) -> Option<&str> {
        match self {
            PropertyValue::Utf8(v) | PropertyValue::Strings(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn atoms(&self) -> &[Atom] {
        match self {
            PropertyValue::Atoms(v) | PropertyValue::Cardinals(v) => v,
            PropertyValue::Typed32 { values, .. } => values,
            _ => &[],
        }
    }

    pub fn first_window(&self) -> Option<WindowHandle> {
        match self {
            PropertyValue::Windows(v) => v.first().copied(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Atom,
    Window,
    Cardinal,
    Utf8,
    Strings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above,
    Below,
}

/// A configure request. Unset fields are left untouched by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Configure {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub stack_mode: Option<StackMode>,
}

impl Configure {
    /// Places a window so that its outer edge, border included, fills `frame`.
    pub fn frame(frame: Rect, border_width: u32) -> Configure {
        let border = i32::try_from(border_width).unwrap_or(0);
        Configure {
            x: Some(frame.x),
            y: Some(frame.y),
            width: Some(inner_extent(frame.width, border)),
            height: Some(inner_extent(frame.height, border)),
            border_width: Some(border_width),
            stack_mode: None,
        }
    }

    pub fn raise() -> Configure {
        Configure { stack_mode: Some(StackMode::Above), ..Default::default() }
    }
}

pub fn inner_extent(outer: i32, border: i32) -> u32 {
    u32::try_from((outer - 2 * border).max(1)).unwrap_or(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessage {
    pub window: WindowHandle,
    pub message_type: Atom,
    pub format: u8,
    pub data: [u32; 5],
}

/// A physical output as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub name: String,
    pub rect: Rect,
    pub primary: bool,
}

/// Everything the window manager needs from the display server.
///
/// Requests are fire-and-forget unless they return data. Errors for
/// fire-and-forget requests arrive later as [`ServerEvent::RequestFailed`].
pub trait DisplayServer {
    fn root(&self) -> WindowHandle;

    fn screen_rect(&self) -> Rect;

    /// Blocks for at most `timeout` (forever if `None`) waiting for an event.
    fn wait_for_event(&mut self, timeout: Option<Duration>) -> Result<Option<ServerEvent>, WmError>;

    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>, WmError>;

    fn query_outputs(&mut self) -> Result<Vec<OutputInfo>, WmError>;

    /// Top-level windows that were already mapped when we started.
    fn existing_windows(&mut self) -> Result<Vec<WindowHandle>, WmError>;

    /// Outer geometry, border included.
    fn get_geometry(&mut self, window: WindowHandle) -> Result<Rect, WmError>;

    fn configure(&mut self, window: WindowHandle, request: &Configure) -> Result<(), WmError>;

    fn send_configure_notify(
        &mut self,
        window: WindowHandle,
        frame: Rect,
        border_width: u32,
    ) -> Result<(), WmError>;

    fn map(&mut self, window: WindowHandle) -> Result<(), WmError>;

    fn unmap(&mut self, window: WindowHandle) -> Result<(), WmError>;

    fn set_input_focus(&mut self, window: WindowHandle) -> Result<(), WmError>;

    fn select_client_events(&mut self, window: WindowHandle) -> Result<(), WmError>;

    fn change_property(
        &mut self,
        window: WindowHandle,
        property: Atom,
        value: &PropertyValue,
    ) -> Result<(), WmError>;

    fn delete_property(&mut self, window: WindowHandle, property: Atom) -> Result<(), WmError>;

    fn get_property(
        &mut self,
        window: WindowHandle,
        property: Atom,
        kind: PropertyKind,
    ) -> Result<Option<PropertyValue>, WmError>;

    fn send_client_message(
        &mut self,
        target: WindowHandle,
        message: &ClientMessage,
    ) -> Result<(), WmError>;

    fn kill_client(&mut self, window: WindowHandle) -> Result<(), WmError>;

    /// Creates the invisible window used for `_NET_SUPPORTING_WM_CHECK`.
    fn create_check_window(&mut self) -> Result<WindowHandle, WmError>;

    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), WmError>;

    fn grab_key(&mut self, chord: KeyChord) -> Result<(), WmError>;

    fn ungrab_keys(&mut self) -> Result<(), WmError>;

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError>;

    fn keycode_to_keysym(&self, keycode: u8) -> Option<Keysym>;

    /// Replaces the button grabs on a client window. `bindings` are the
    /// modifier gestures; with `click_to_focus` any other press is grabbed
    /// synchronously and must be released with [`replay_pointer`].
    ///
    /// [`replay_pointer`]: DisplayServer::replay_pointer
    fn grab_buttons(
        &mut self,
        window: WindowHandle,
        bindings: &[(u8, ModMask)],
        click_to_focus: bool,
    ) -> Result<(), WmError>;

    /// Lets a synchronously grabbed press through to the client.
    fn replay_pointer(&mut self) -> Result<(), WmError>;

    fn grab_pointer(&mut self) -> Result<(), WmError>;

    fn ungrab_pointer(&mut self) -> Result<(), WmError>;

    fn flush(&mut self) -> Result<(), WmError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::event::ConfigureRequest;

    #[test]
    fn frame_subtracts_the_border() {
        let request = Configure::frame(Rect::new(10, 20, 300, 200), 2);
        assert_eq!(request.x, Some(10));
        assert_eq!(request.width, Some(296));
        assert_eq!(request.height, Some(196));
        assert_eq!(request.border_width, Some(2));
    }

    #[test]
    fn default_handle_is_none() {
        assert_eq!(WindowHandle::default(), WindowHandle::NONE);
        assert_eq!(ConfigureRequest::default().window, WindowHandle::NONE);
    }

    #[test]
    fn frame_never_requests_a_zero_size() {
        let request = Configure::frame(Rect::new(0, 0, 2, 2), 4);
        assert_eq!(request.width, Some(1));
    }
}
