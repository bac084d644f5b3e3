use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::actor::reactor::WmError;
use crate::common::collections::HashMap;
use crate::model::rules::WindowRules;
use crate::protocol::WindowStates;
use crate::sys::display::{DisplayServer, WindowHandle};
use crate::sys::geometry::Rect;

slotmap::new_key_type! {
    /// Arena key for a managed window. Unlike a [`WindowHandle`] it is never
    /// reused by the server.
    pub struct WindowId;
}

/// Identifying properties read from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowProps {
    pub instance: String,
    pub class: String,
    pub role: Option<String>,
    pub title: String,
}

impl WindowProps {
    /// Stable-ish identity used to match a window against a saved session.
    pub fn identity(&self) -> String {
        match &self.role {
            Some(role) => format!("{}.{}/{}", self.instance, self.class, role),
            None => format!("{}.{}/{}", self.instance, self.class, self.title),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManagedWindow {
    pub handle: WindowHandle,
    /// Last frame we configured or the server reported, border included.
    pub frame: Rect,
    pub floating: bool,
    pub focused: bool,
    pub sticky: bool,
    pub states: WindowStates,
    pub workspace: usize,
    pub props: WindowProps,
    pub(crate) mapped: bool,
    /// Unmap notifications caused by our own unmap requests, still to arrive.
    pub(crate) pending_unmaps: u32,
}

impl ManagedWindow {
    pub fn is_fullscreen(&self) -> bool { self.states.contains(WindowStates::FULLSCREEN) }

    pub fn is_minimized(&self) -> bool { self.states.contains(WindowStates::HIDDEN) }

    pub fn is_mapped(&self) -> bool { self.mapped }
}

/// Owns every managed window. Everything else refers to windows by
/// [`WindowId`].
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: SlotMap<WindowId, ManagedWindow>,
    by_handle: HashMap<WindowHandle, WindowId>,
    /// Registration order, which is also the published client list order.
    order: Vec<WindowId>,
}

impl WindowRegistry {
    pub fn new() -> Self { Self::default() }

    /// Starts tracking `handle`. Registering a known handle returns the
    /// existing id and leaves its state alone.
    pub fn register(&mut self, handle: WindowHandle, rules: &WindowRules, props: WindowProps) -> WindowId {
        if let Some(&id) = self.by_handle.get(&handle) {
            trace!(%handle, "window already registered");
            return id;
        }
        let id = self.windows.insert(ManagedWindow {
            handle,
            frame: Rect::default(),
            floating: rules.floating,
            focused: false,
            sticky: rules.sticky,
            states: if rules.sticky { WindowStates::STICKY } else { WindowStates::empty() },
            workspace: rules.workspace,
            props,
            mapped: false,
            pending_unmaps: 0,
        });
        self.by_handle.insert(handle, id);
        self.order.push(id);
        debug!(%handle, ?id, workspace = rules.workspace, floating = rules.floating, "registered window");
        id
    }

    pub fn unregister(&mut self, id: WindowId) -> Option<ManagedWindow> {
        let window = self.windows.remove(id)?;
        self.by_handle.remove(&window.handle);
        self.order.retain(|&other| other != id);
        debug!(handle = %window.handle, ?id, "unregistered window");
        Some(window)
    }

    pub fn lookup(&self, handle: WindowHandle) -> Option<WindowId> { self.by_handle.get(&handle).copied() }

    pub fn get(&self, id: WindowId) -> Option<&ManagedWindow> { self.windows.get(id) }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut ManagedWindow> { self.windows.get_mut(id) }

    pub fn handle(&self, id: WindowId) -> Option<WindowHandle> { self.windows.get(id).map(|w| w.handle) }

    pub fn contains(&self, id: WindowId) -> bool { self.windows.contains_key(id) }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    /// Windows in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (WindowId, &ManagedWindow)> + '_ {
        self.order.iter().filter_map(|&id| self.windows.get(id).map(|w| (id, w)))
    }

    pub fn ids(&self) -> Vec<WindowId> { self.order.clone() }

    pub fn handles(&self) -> Vec<WindowHandle> { self.iter().map(|(_, w)| w.handle).collect() }

    /// Re-reads the window's geometry from the server. If the window is gone
    /// its entry is dropped and [`WmError::StaleHandle`] is returned.
    pub fn refresh_geometry(
        &mut self,
        display: &mut dyn DisplayServer,
        id: WindowId,
    ) -> Result<Rect, WmError> {
        let Some(handle) = self.handle(id) else {
            return Err(WmError::StaleHandle(WindowHandle::NONE));
        };
        match display.get_geometry(handle) {
            Ok(frame) => {
                if let Some(window) = self.windows.get_mut(id) {
                    window.frame = frame;
                }
                Ok(frame)
            }
            Err(err @ WmError::StaleHandle(_)) => {
                self.unregister(id);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
