use bitflags::bitflags;
use num_enum::TryFromPrimitive;

use crate::actor::reactor::WmError;
use crate::protocol::atoms::Atoms;
use crate::sys::display::{Atom, WindowHandle};

bitflags! {
    /// The `_NET_WM_STATE` flags we track per window.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct WindowStates: u16 {
        const FULLSCREEN     = 1 << 0;
        const MAXIMIZED_HORZ = 1 << 1;
        const MAXIMIZED_VERT = 1 << 2;
        const SKIP_TASKBAR   = 1 << 3;
        const ABOVE          = 1 << 4;
        const HIDDEN         = 1 << 5;
        const STICKY         = 1 << 6;

        const MAXIMIZED = Self::MAXIMIZED_HORZ.bits() | Self::MAXIMIZED_VERT.bits();
    }
}

/// `_NET_WM_STATE` client message action, data[0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum StateAction {
    Remove = 0,
    Add = 1,
    Toggle = 2,
}

impl Atoms {
    pub fn state_flag(&self, atom: Atom) -> Option<WindowStates> {
        let flag = match atom {
            a if a == self.net_wm_state_fullscreen => WindowStates::FULLSCREEN,
            a if a == self.net_wm_state_maximized_horz => WindowStates::MAXIMIZED_HORZ,
            a if a == self.net_wm_state_maximized_vert => WindowStates::MAXIMIZED_VERT,
            a if a == self.net_wm_state_skip_taskbar => WindowStates::SKIP_TASKBAR,
            a if a == self.net_wm_state_above => WindowStates::ABOVE,
            a if a == self.net_wm_state_hidden => WindowStates::HIDDEN,
            a if a == self.net_wm_state_sticky => WindowStates::STICKY,
            _ => return None,
        };
        Some(flag)
    }

    /// The value written to a window's `_NET_WM_STATE` property.
    pub fn state_atoms(&self, states: WindowStates) -> Vec<Atom> {
        [
            (WindowStates::FULLSCREEN, self.net_wm_state_fullscreen),
            (WindowStates::MAXIMIZED_HORZ, self.net_wm_state_maximized_horz),
            (WindowStates::MAXIMIZED_VERT, self.net_wm_state_maximized_vert),
            (WindowStates::SKIP_TASKBAR, self.net_wm_state_skip_taskbar),
            (WindowStates::ABOVE, self.net_wm_state_above),
            (WindowStates::HIDDEN, self.net_wm_state_hidden),
            (WindowStates::STICKY, self.net_wm_state_sticky),
        ]
        .into_iter()
        .filter(|(flag, _)| states.contains(*flag))
        .map(|(_, atom)| atom)
        .collect()
    }

    pub fn states_from_atoms(&self, atoms: &[Atom]) -> WindowStates {
        atoms.iter().filter_map(|&a| self.state_flag(a)).collect()
    }
}

/// A decoded `_NET_WM_STATE` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub action: StateAction,
    pub flags: WindowStates,
}

impl StateChange {
    /// Decodes the message payload: `[action, first, second, source, 0]`.
    ///
    /// An unknown action or a message naming no state at all is malformed.
    /// Named states we do not track are a protocol mismatch when nothing
    /// else in the message is usable.
    pub fn decode(window: WindowHandle, data: &[u32; 5], atoms: &Atoms) -> Result<StateChange, WmError> {
        let action = StateAction::try_from(data[0])
            .map_err(|_| WmError::MalformedMessage(format!("unknown _NET_WM_STATE action {}", data[0])))?;
        let named: Vec<Atom> = data[1..3].iter().copied().filter(|&a| a != 0).collect();
        if named.is_empty() {
            return Err(WmError::MalformedMessage("_NET_WM_STATE without states".into()));
        }
        let flags = atoms.states_from_atoms(&named);
        if flags.is_empty() {
            let what = named
                .iter()
                .map(|&a| atoms.name_of(a).map_or_else(|| a.to_string(), str::to_string))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(WmError::ProtocolMismatch { window, what: format!("unsupported state {what}") });
        }
        Ok(StateChange { action, flags })
    }

    pub fn apply(&self, current: WindowStates) -> WindowStates {
        match self.action {
            StateAction::Remove => current.difference(self.flags),
            StateAction::Add => current.union(self.flags),
            StateAction::Toggle => current.symmetric_difference(self.flags),
        }
    }
}
