use crate::sys::display::{Atom, ClientMessage, WindowHandle};
use crate::sys::keys::ModMask;

/// Events from the display server, already stripped of wire details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    MapRequest { window: WindowHandle },
    Destroy { window: WindowHandle },
    Unmap { window: WindowHandle },
    ConfigureRequest(ConfigureRequest),
    KeyPress { keycode: u8, state: ModMask },
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    Motion { root_x: i32, root_y: i32 },
    PropertyChange { window: WindowHandle, atom: Atom },
    ClientMessage(ClientMessage),
    /// The output layout changed.
    ScreenChange,
    /// The keyboard mapping changed and key grabs must be redone.
    MappingChange,
    /// An asynchronous request failed. `stale` is set when the failure means
    /// the window no longer exists.
    RequestFailed { window: Option<WindowHandle>, stale: bool, error: String },
    Unhandled(&'static str),
}

impl ServerEvent {
    pub fn is_noisy(&self) -> bool {
        matches!(
            self,
            ServerEvent::Motion { .. } | ServerEvent::PropertyChange { .. } | ServerEvent::Unhandled(_)
        )
    }
}

/// Fields of a client's configure request; unset fields were not requested.
/// Sizes exclude the border.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: WindowHandle,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub border_width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub window: WindowHandle,
    pub button: u8,
    pub state: ModMask,
    pub root_x: i32,
    pub root_y: i32,
}
