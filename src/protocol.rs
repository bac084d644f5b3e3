//! EWMH / ICCCM state synchronization.
//!
//! [`ProtocolSync`] mirrors the window manager's state into root and
//! per-window properties, and turns inbound client messages into
//! [`ProtocolIntent`]s for the reactor. It never computes geometry.

pub mod atoms;
pub mod state;

use tracing::{debug, trace, warn};

pub use self::atoms::Atoms;
pub use self::state::{StateAction, StateChange, WindowStates};
use crate::actor::reactor::WmError;
use crate::common::collections::HashMap;
use crate::model::window::{WindowId, WindowProps, WindowRegistry};
use crate::model::workspace::WorkspaceManager;
use crate::sys::display::{
    Atom, ClientMessage, DisplayServer, PropertyKind, PropertyValue, WindowHandle,
};

pub const WM_NAME: &str = "strata";

/// `_NET_WM_DESKTOP` value meaning "all desktops".
pub const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

const WM_STATE_NORMAL: u32 = 1;
const WM_STATE_ICONIC: u32 = 3;

/// What the reactor should do about a client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolIntent {
    None,
    /// The window's flag set was updated; geometry may need to follow.
    StateChanged {
        window: WindowId,
        previous: WindowStates,
        current: WindowStates,
    },
    Activate(WindowId),
    SwitchDesktop(usize),
    /// `None` means all desktops, i.e. sticky.
    MoveToDesktop { window: WindowId, desktop: Option<usize> },
}

/// Last values written, so unchanged properties are not rewritten.
#[derive(Debug, Default)]
struct Published {
    client_list: Option<Vec<WindowHandle>>,
    active: Option<WindowHandle>,
    desktop_count: Option<u32>,
    desktop_names: Option<Vec<String>>,
    current_desktop: Option<u32>,
    states: HashMap<WindowHandle, WindowStates>,
    desktops: HashMap<WindowHandle, u32>,
}

pub struct ProtocolSync {
    atoms: Atoms,
    root: WindowHandle,
    check_window: Option<WindowHandle>,
    published: Published,
}

impl ProtocolSync {
    pub fn new(display: &mut dyn DisplayServer) -> Result<Self, WmError> {
        Ok(ProtocolSync {
            atoms: Atoms::intern(display)?,
            root: display.root(),
            check_window: None,
            published: Published::default(),
        })
    }

    pub fn atoms(&self) -> &Atoms { &self.atoms }

    pub fn check_window(&self) -> Option<WindowHandle> { self.check_window }

    /// Advertises EWMH support. Without a check window everything else still
    /// works, so that failure is only logged.
    pub fn init(&mut self, display: &mut dyn DisplayServer) -> Result<(), WmError> {
        let a = self.atoms;
        display.change_property(self.root, a.net_supported, &PropertyValue::Atoms(a.supported()))?;

        match display.create_check_window() {
            Ok(check) => {
                let value = PropertyValue::Windows(vec![check]);
                display.change_property(self.root, a.net_supporting_wm_check, &value)?;
                display.change_property(check, a.net_supporting_wm_check, &value)?;
                display.change_property(check, a.net_wm_name, &PropertyValue::Utf8(vec![WM_NAME.into()]))?;
                self.check_window = Some(check);
            }
            Err(err @ WmError::ResourceExhausted(_)) => {
                warn!(%err, "no supporting wm check window");
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Writes every root and per-window property whose value changed since
    /// the last call.
    pub fn publish(
        &mut self,
        display: &mut dyn DisplayServer,
        windows: &WindowRegistry,
        workspaces: &WorkspaceManager,
        current_desktop: usize,
        active: Option<WindowId>,
    ) -> Result<(), WmError> {
        self.publish_client_list(display, windows)?;
        self.publish_desktops(display, workspaces, current_desktop)?;

        let active = active.and_then(|id| windows.handle(id)).unwrap_or(WindowHandle::NONE);
        if self.published.active != Some(active) {
            let value = PropertyValue::Windows(vec![active]);
            display.change_property(self.root, self.atoms.net_active_window, &value)?;
            self.published.active = Some(active);
        }

        for (_, window) in windows.iter() {
            self.publish_window_state(display, window.handle, window.states)?;
            let desktop = if window.sticky {
                ALL_DESKTOPS
            } else {
                u32::try_from(window.workspace).unwrap_or(0)
            };
            self.publish_window_desktop(display, window.handle, desktop)?;
        }
        Ok(())
    }

    /// `_NET_CLIENT_LIST` in registration order.
    pub fn publish_client_list(
        &mut self,
        display: &mut dyn DisplayServer,
        windows: &WindowRegistry,
    ) -> Result<(), WmError> {
        let handles = windows.handles();
        if self.published.client_list.as_ref() == Some(&handles) {
            return Ok(());
        }
        trace!(count = handles.len(), "publishing client list");
        display.change_property(
            self.root,
            self.atoms.net_client_list,
            &PropertyValue::Windows(handles.clone()),
        )?;
        self.published.states.retain(|h, _| handles.contains(h));
        self.published.desktops.retain(|h, _| handles.contains(h));
        self.published.client_list = Some(handles);
        Ok(())
    }

    fn publish_desktops(
        &mut self,
        display: &mut dyn DisplayServer,
        workspaces: &WorkspaceManager,
        current: usize,
    ) -> Result<(), WmError> {
        let a = self.atoms;
        let count = u32::try_from(workspaces.len()).unwrap_or(u32::MAX);
        if self.published.desktop_count != Some(count) {
            display.change_property(self.root, a.net_number_of_desktops, &PropertyValue::Cardinals(vec![count]))?;
            let viewport = PropertyValue::Cardinals(vec![0; workspaces.len() * 2]);
            display.change_property(self.root, a.net_desktop_viewport, &viewport)?;
            self.published.desktop_count = Some(count);
        }

        let names = workspaces.names();
        if self.published.desktop_names.as_ref() != Some(&names) {
            display.change_property(self.root, a.net_desktop_names, &PropertyValue::Utf8(names.clone()))?;
            self.published.desktop_names = Some(names);
        }

        let current = u32::try_from(current).unwrap_or(0);
        if self.published.current_desktop != Some(current) {
            display.change_property(self.root, a.net_current_desktop, &PropertyValue::Cardinals(vec![current]))?;
            self.published.current_desktop = Some(current);
        }
        Ok(())
    }

    pub fn publish_window_state(
        &mut self,
        display: &mut dyn DisplayServer,
        window: WindowHandle,
        states: WindowStates,
    ) -> Result<(), WmError> {
        if self.published.states.get(&window) == Some(&states) {
            return Ok(());
        }
        let value = PropertyValue::Atoms(self.atoms.state_atoms(states));
        display.change_property(window, self.atoms.net_wm_state, &value)?;
        self.published.states.insert(window, states);
        Ok(())
    }

    pub fn publish_window_desktop(
        &mut self,
        display: &mut dyn DisplayServer,
        window: WindowHandle,
        desktop: u32,
    ) -> Result<(), WmError> {
        if self.published.desktops.get(&window) == Some(&desktop) {
            return Ok(());
        }
        display.change_property(window, self.atoms.net_wm_desktop, &PropertyValue::Cardinals(vec![desktop]))?;
        self.published.desktops.insert(window, desktop);
        Ok(())
    }

    /// ICCCM `WM_STATE`: Normal while we show the window, Iconic while hidden.
    pub fn set_wm_state(
        &mut self,
        display: &mut dyn DisplayServer,
        window: WindowHandle,
        normal: bool,
    ) -> Result<(), WmError> {
        let state = if normal { WM_STATE_NORMAL } else { WM_STATE_ICONIC };
        let value = PropertyValue::Typed32 {
            kind: self.atoms.wm_state,
            values: vec![state, 0],
        };
        display.change_property(window, self.atoms.wm_state, &value)
    }

    /// Forgets the cached per-window values of a window that is gone.
    pub fn forget_window(&mut self, window: WindowHandle) {
        self.published.states.remove(&window);
        self.published.desktops.remove(&window);
    }

    pub fn handle_client_message(
        &mut self,
        display: &mut dyn DisplayServer,
        windows: &mut WindowRegistry,
        message: &ClientMessage,
    ) -> Result<ProtocolIntent, WmError> {
        let a = self.atoms;
        let kind = message.message_type;
        let data = &message.data;

        if kind == a.wm_protocols && data[0] == a.net_wm_ping {
            let target = WindowHandle(data[2]);
            // An echo to the root window would come straight back to us.
            if windows.lookup(target).is_none() {
                return Err(WmError::MalformedMessage(format!("ping for unmanaged window {target}")));
            }
            trace!(%target, timestamp = data[1], "answering ping");
            let reply = ClientMessage { window: target, ..*message };
            display.send_client_message(target, &reply)?;
            return Ok(ProtocolIntent::None);
        }
        if kind == a.net_current_desktop {
            return Ok(ProtocolIntent::SwitchDesktop(data[0] as usize));
        }

        let Some(id) = windows.lookup(message.window) else {
            debug!(window = %message.window, message = a.name_of(kind), "client message for unmanaged window");
            return Ok(ProtocolIntent::None);
        };

        let intent = match kind {
            k if k == a.net_wm_state => {
                let change = StateChange::decode(message.window, data, &a)?;
                let Some(window) = windows.get_mut(id) else {
                    return Ok(ProtocolIntent::None);
                };
                let previous = window.states;
                window.states = change.apply(previous);
                debug!(window = %message.window, ?previous, current = ?window.states, "state change");
                ProtocolIntent::StateChanged { window: id, previous, current: window.states }
            }
            k if k == a.net_active_window => ProtocolIntent::Activate(id),
            k if k == a.net_close_window => {
                self.close_window(display, message.window)?;
                ProtocolIntent::None
            }
            k if k == a.net_wm_desktop => ProtocolIntent::MoveToDesktop {
                window: id,
                desktop: (data[0] != ALL_DESKTOPS).then_some(data[0] as usize),
            },
            other => {
                trace!(message = a.name_of(other), "ignoring client message");
                ProtocolIntent::None
            }
        };
        Ok(intent)
    }

    /// Asks the client to close with `WM_DELETE_WINDOW`. Clients that do not
    /// speak it are killed. Returns whether the polite path was taken.
    pub fn close_window(&mut self, display: &mut dyn DisplayServer, window: WindowHandle) -> Result<bool, WmError> {
        let a = self.atoms;
        let protocols = display.get_property(window, a.wm_protocols, PropertyKind::Atom)?;
        if protocols.is_some_and(|p| p.atoms().contains(&a.wm_delete_window)) {
            let message = ClientMessage {
                window,
                message_type: a.wm_protocols,
                format: 32,
                data: [a.wm_delete_window, 0, 0, 0, 0],
            };
            display.send_client_message(window, &message)?;
            debug!(%window, "sent WM_DELETE_WINDOW");
            return Ok(true);
        }
        let err = WmError::ProtocolMismatch { window, what: "WM_DELETE_WINDOW not supported".into() };
        warn!(%err, "killing client");
        display.kill_client(window)?;
        Ok(false)
    }

    /// Class, instance, role and title of a client.
    pub fn read_props(&self, display: &mut dyn DisplayServer, window: WindowHandle) -> Result<WindowProps, WmError> {
        let a = self.atoms;
        let class = display.get_property(window, a.wm_class, PropertyKind::Strings)?;
        let (instance, class) = match class {
            Some(PropertyValue::Strings(mut parts)) if parts.len() >= 2 => {
                let class = parts.swap_remove(1);
                (parts.swap_remove(0), class)
            }
            Some(value) => (value.first_string().unwrap_or_default().to_string(), String::new()),
            None => Default::default(),
        };
        let role = display
            .get_property(window, a.wm_window_role, PropertyKind::Strings)?
            .and_then(|v| v.first_string().map(str::to_string))
            .filter(|r| !r.is_empty());
        Ok(WindowProps { instance, class, role, title: self.read_title(display, window)? })
    }

    /// `_NET_WM_NAME`, falling back to `WM_NAME`.
    pub fn read_title(&self, display: &mut dyn DisplayServer, window: WindowHandle) -> Result<String, WmError> {
        let a = self.atoms;
        for (atom, kind) in [(a.net_wm_name, PropertyKind::Utf8), (a.wm_name, PropertyKind::Strings)] {
            if let Some(title) = display.get_property(window, atom, kind)?
                && let Some(title) = title.first_string()
                && !title.is_empty()
            {
                return Ok(title.to_string());
            }
        }
        Ok(String::new())
    }

    pub fn read_states(&self, display: &mut dyn DisplayServer, window: WindowHandle) -> Result<WindowStates, WmError> {
        let value = display.get_property(window, self.atoms.net_wm_state, PropertyKind::Atom)?;
        Ok(value.map(|v| self.atoms.states_from_atoms(v.atoms())).unwrap_or_default())
    }

    pub fn window_types(&self, display: &mut dyn DisplayServer, window: WindowHandle) -> Result<Vec<Atom>, WmError> {
        let value = display.get_property(window, self.atoms.net_wm_window_type, PropertyKind::Atom)?;
        Ok(value.map(|v| v.atoms().to_vec()).unwrap_or_default())
    }

    pub fn is_dock(&self, types: &[Atom]) -> bool { types.contains(&self.atoms.net_wm_window_type_dock) }

    pub fn floats_by_type(&self, types: &[Atom]) -> bool {
        self.atoms.floating_types().iter().any(|t| types.contains(t))
    }

    pub fn transient_for(
        &self,
        display: &mut dyn DisplayServer,
        window: WindowHandle,
    ) -> Result<Option<WindowHandle>, WmError> {
        let value = display.get_property(window, self.atoms.wm_transient_for, PropertyKind::Window)?;
        Ok(value.and_then(|v| v.first_window()).filter(|&w| w != WindowHandle::NONE))
    }

    pub fn is_name_property(&self, atom: Atom) -> bool {
        let a = &self.atoms;
        atom == a.net_wm_name || atom == a.wm_name || atom == a.wm_class || atom == a.wm_window_role
    }

    pub fn teardown(&mut self, display: &mut dyn DisplayServer) -> Result<(), WmError> {
        display.delete_property(self.root, self.atoms.net_active_window)?;
        display.delete_property(self.root, self.atoms.net_supporting_wm_check)?;
        if let Some(check) = self.check_window.take() {
            display.destroy_window(check)?;
        }
        self.published = Published::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::actor::reactor::testing::{FakeDisplay, Request};
    use crate::layout_engine::{LayoutKind, WorkspaceLayouts};
    use crate::model::rules::WindowRules;
    use crate::model::workspace::Workspace;
    use crate::sys::geometry::Rect;

    struct Fixture {
        display: FakeDisplay,
        sync: ProtocolSync,
        windows: WindowRegistry,
        workspaces: WorkspaceManager,
    }

    fn fixture() -> Fixture {
        let mut display = FakeDisplay::new(Rect::new(0, 0, 1000, 800));
        let mut sync = ProtocolSync::new(&mut display).unwrap();
        sync.init(&mut display).unwrap();
        let workspaces = WorkspaceManager::new(
            ["a", "b", "c"]
                .into_iter()
                .map(|n| Workspace::new(n, WorkspaceLayouts::new(LayoutKind::TilingStack), vec![]))
                .collect(),
        );
        Fixture { display, sync, windows: WindowRegistry::new(), workspaces }
    }

    impl Fixture {
        fn message(&self, window: WindowHandle, kind: &str, data: [u32; 5]) -> ClientMessage {
            ClientMessage { window, message_type: self.display.atom(kind), format: 32, data }
        }

        fn handle(&mut self, message: ClientMessage) -> Result<ProtocolIntent, WmError> {
            self.sync.handle_client_message(&mut self.display, &mut self.windows, &message)
        }
    }

    #[test]
    fn init_advertises_support() {
        let f = fixture();
        let root = f.display.root();
        let check = f.sync.check_window().unwrap();
        assert_eq!(
            f.display.property(root, "_NET_SUPPORTING_WM_CHECK"),
            Some(PropertyValue::Windows(vec![check]))
        );
        assert_eq!(f.display.property(check, "_NET_WM_NAME"), Some(PropertyValue::Utf8(vec![WM_NAME.into()])));
        let supported = f.display.property(root, "_NET_SUPPORTED").unwrap();
        assert!(supported.atoms().contains(&f.display.atom("_NET_WM_STATE_FULLSCREEN")));
    }

    #[test]
    fn init_survives_check_window_failure() {
        let mut display = FakeDisplay::new(Rect::new(0, 0, 1000, 800));
        display.fail_check_window();
        let mut sync = ProtocolSync::new(&mut display).unwrap();
        sync.init(&mut display).unwrap();
        assert_eq!(sync.check_window(), None);
        assert!(display.property(display.root(), "_NET_SUPPORTED").is_some());
        assert_eq!(display.property(display.root(), "_NET_SUPPORTING_WM_CHECK"), None);
    }

    #[test]
    fn publish_mirrors_registry_and_desktops() {
        let mut f = fixture();
        let root = f.display.root();
        let w1 = f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        let rules = WindowRules { workspace: 2, sticky: true, ..Default::default() };
        f.windows.register(WindowHandle(0x11), &rules, Default::default());

        f.sync.publish(&mut f.display, &f.windows, &f.workspaces, 1, Some(w1)).unwrap();

        assert_eq!(
            f.display.property(root, "_NET_CLIENT_LIST"),
            Some(PropertyValue::Windows(vec![WindowHandle(0x10), WindowHandle(0x11)]))
        );
        assert_eq!(f.display.property(root, "_NET_ACTIVE_WINDOW"), Some(PropertyValue::Windows(vec![WindowHandle(0x10)])));
        assert_eq!(f.display.property(root, "_NET_NUMBER_OF_DESKTOPS"), Some(PropertyValue::Cardinals(vec![3])));
        assert_eq!(f.display.property(root, "_NET_CURRENT_DESKTOP"), Some(PropertyValue::Cardinals(vec![1])));
        assert_eq!(
            f.display.property(root, "_NET_DESKTOP_NAMES"),
            Some(PropertyValue::Utf8(vec!["a".into(), "b".into(), "c".into()]))
        );
        assert_eq!(
            f.display.property(WindowHandle(0x11), "_NET_WM_DESKTOP"),
            Some(PropertyValue::Cardinals(vec![ALL_DESKTOPS]))
        );
        assert_eq!(
            f.display.property(WindowHandle(0x11), "_NET_WM_STATE"),
            Some(PropertyValue::Atoms(vec![f.display.atom("_NET_WM_STATE_STICKY")]))
        );
    }

    #[test]
    fn publish_skips_unchanged_values() {
        let mut f = fixture();
        f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        f.sync.publish(&mut f.display, &f.windows, &f.workspaces, 0, None).unwrap();
        f.display.clear_requests();
        f.sync.publish(&mut f.display, &f.windows, &f.workspaces, 0, None).unwrap();
        assert_eq!(f.display.requests(), vec![]);
    }

    #[test]
    fn state_message_updates_flags() {
        let mut f = fixture();
        let id = f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        let fullscreen = f.display.atom("_NET_WM_STATE_FULLSCREEN");

        let intent = f.handle(f.message(WindowHandle(0x10), "_NET_WM_STATE", [1, fullscreen, 0, 1, 0])).unwrap();
        assert_eq!(
            intent,
            ProtocolIntent::StateChanged {
                window: id,
                previous: WindowStates::empty(),
                current: WindowStates::FULLSCREEN,
            }
        );
        assert!(f.windows.get(id).unwrap().is_fullscreen());

        let err = f.handle(f.message(WindowHandle(0x10), "_NET_WM_STATE", [7, fullscreen, 0, 1, 0])).unwrap_err();
        assert!(matches!(err, WmError::MalformedMessage(_)));
        assert!(f.windows.get(id).unwrap().is_fullscreen());
    }

    #[test]
    fn ping_is_echoed_with_the_same_timestamp() {
        let mut f = fixture();
        f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        let ping = f.display.atom("_NET_WM_PING");
        let message = f.message(f.display.root(), "WM_PROTOCOLS", [ping, 12345, 0x10, 0, 0]);
        f.display.clear_requests();
        assert_eq!(f.handle(message).unwrap(), ProtocolIntent::None);

        let expected = ClientMessage { window: WindowHandle(0x10), ..message };
        assert_eq!(f.display.requests(), vec![Request::ClientMessage(WindowHandle(0x10), expected)]);
    }

    #[test]
    fn ping_naming_the_root_or_no_window_is_not_echoed() {
        let mut f = fixture();
        let ping = f.display.atom("_NET_WM_PING");
        let root = f.display.root().get();
        f.display.clear_requests();

        for target in [root, 0, 0x99] {
            let message = f.message(f.display.root(), "WM_PROTOCOLS", [ping, 42, target, 0, 0]);
            assert!(matches!(f.handle(message), Err(WmError::MalformedMessage(_))), "target {target:#x}");
        }
        assert_eq!(f.display.requests(), Vec::<Request>::new());
    }

    #[test]
    fn close_prefers_delete_window() {
        let mut f = fixture();
        f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        f.windows.register(WindowHandle(0x11), &WindowRules::default(), Default::default());
        let delete = f.display.atom("WM_DELETE_WINDOW");
        let protocols = f.display.atom("WM_PROTOCOLS");
        f.display.set_property(WindowHandle(0x10), "WM_PROTOCOLS", PropertyValue::Atoms(vec![delete]));
        f.display.clear_requests();

        f.handle(f.message(WindowHandle(0x10), "_NET_CLOSE_WINDOW", [0; 5])).unwrap();
        f.handle(f.message(WindowHandle(0x11), "_NET_CLOSE_WINDOW", [0; 5])).unwrap();

        assert_eq!(
            f.display.requests(),
            vec![
                Request::ClientMessage(
                    WindowHandle(0x10),
                    ClientMessage {
                        window: WindowHandle(0x10),
                        message_type: protocols,
                        format: 32,
                        data: [delete, 0, 0, 0, 0],
                    }
                ),
                Request::Kill(WindowHandle(0x11)),
            ]
        );
    }

    #[test]
    fn desktop_messages_become_intents() {
        let mut f = fixture();
        let id = f.windows.register(WindowHandle(0x10), &WindowRules::default(), Default::default());
        let root = f.display.root();

        assert_eq!(
            f.handle(f.message(root, "_NET_CURRENT_DESKTOP", [2, 0, 0, 0, 0])).unwrap(),
            ProtocolIntent::SwitchDesktop(2)
        );
        assert_eq!(
            f.handle(f.message(WindowHandle(0x10), "_NET_WM_DESKTOP", [ALL_DESKTOPS, 0, 0, 0, 0])).unwrap(),
            ProtocolIntent::MoveToDesktop { window: id, desktop: None }
        );
        assert_eq!(
            f.handle(f.message(WindowHandle(0x10), "_NET_ACTIVE_WINDOW", [2, 0, 0, 0, 0])).unwrap(),
            ProtocolIntent::Activate(id)
        );
        assert_eq!(
            f.handle(f.message(WindowHandle(0x99), "_NET_ACTIVE_WINDOW", [2, 0, 0, 0, 0])).unwrap(),
            ProtocolIntent::None
        );
    }

    #[test]
    fn props_fall_back_to_legacy_names() {
        let mut f = fixture();
        let w = WindowHandle(0x10);
        f.display.set_property(w, "WM_CLASS", PropertyValue::Strings(vec!["navigator".into(), "Firefox".into()]));
        f.display.set_property(w, "WM_NAME", PropertyValue::Strings(vec!["legacy".into()]));
        let props = f.sync.read_props(&mut f.display, w).unwrap();
        assert_eq!(
            props,
            WindowProps {
                instance: "navigator".into(),
                class: "Firefox".into(),
                role: None,
                title: "legacy".into(),
            }
        );

        f.display.set_property(w, "_NET_WM_NAME", PropertyValue::Utf8(vec!["modern".into()]));
        assert_eq!(f.sync.read_title(&mut f.display, w).unwrap(), "modern");
    }
}
