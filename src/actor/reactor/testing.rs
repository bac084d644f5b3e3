//! An in-memory display server for driving the reactor in tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::actor::reactor::WmError;
use crate::common::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use crate::sys::display::{
    Atom, ClientMessage, Configure, DisplayServer, OutputInfo, PropertyKind, PropertyValue,
    WindowHandle,
};
use crate::sys::event::ServerEvent;
use crate::sys::geometry::Rect;
use crate::sys::keys::{KeyChord, Keysym, ModMask};
use crate::sys::process::Launcher;

pub const ROOT: WindowHandle = WindowHandle(1);

/// An outbound request as the fake saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Configure(WindowHandle, Configure),
    ConfigureNotify(WindowHandle, Rect),
    Map(WindowHandle),
    Unmap(WindowHandle),
    Focus(WindowHandle),
    SelectEvents(WindowHandle),
    ChangeProperty(WindowHandle, Atom),
    DeleteProperty(WindowHandle, Atom),
    ClientMessage(WindowHandle, ClientMessage),
    Kill(WindowHandle),
    Destroy(WindowHandle),
    GrabKey(KeyChord),
    UngrabKeys,
    GrabButtons(WindowHandle, bool),
    ReplayPointer,
    GrabPointer,
    UngrabPointer,
}

#[derive(Default)]
struct State {
    screen: Rect,
    outputs: Vec<OutputInfo>,
    atoms: BTreeMap<String, Atom>,
    intern_calls: usize,
    properties: HashMap<(WindowHandle, Atom), PropertyValue>,
    geometries: HashMap<WindowHandle, Rect>,
    borders: HashMap<WindowHandle, u32>,
    destroyed: HashSet<WindowHandle>,
    mapped: HashSet<WindowHandle>,
    existing: Vec<WindowHandle>,
    focus: Option<WindowHandle>,
    events: VecDeque<ServerEvent>,
    requests: Vec<Request>,
    keymap: HashMap<u8, Keysym>,
    fail_check_window: bool,
    next_window: u32,
}

impl State {
    fn atom(&mut self, name: &str) -> Atom {
        let next = self.atoms.len() as Atom + 100;
        *self.atoms.entry(name.to_string()).or_insert(next)
    }

    fn alive(&self, window: WindowHandle) -> Result<(), WmError> {
        if self.destroyed.contains(&window) {
            return Err(WmError::StaleHandle(window));
        }
        Ok(())
    }
}

/// Cloning shares state, so a test can keep a handle after giving the
/// display to the reactor.
#[derive(Clone)]
pub struct FakeDisplay {
    state: Rc<RefCell<State>>,
}

impl FakeDisplay {
    pub fn new(screen: Rect) -> Self {
        let state = State {
            screen,
            next_window: 0x0100_0000,
            ..Default::default()
        };
        FakeDisplay { state: Rc::new(RefCell::new(state)) }
    }

    pub fn set_outputs(&self, outputs: Vec<OutputInfo>) { self.state.borrow_mut().outputs = outputs; }

    /// A client window that exists on the server but is not yet mapped.
    pub fn create_window(&self, window: WindowHandle, frame: Rect) {
        let mut s = self.state.borrow_mut();
        s.geometries.insert(window, frame);
        s.destroyed.remove(&window);
    }

    /// A client window that was already mapped before the manager started.
    pub fn create_existing_window(&self, window: WindowHandle, frame: Rect) {
        self.create_window(window, frame);
        let mut s = self.state.borrow_mut();
        s.mapped.insert(window);
        s.existing.push(window);
    }

    /// The client goes away. Later requests naming it fail.
    pub fn destroy_client(&self, window: WindowHandle) {
        let mut s = self.state.borrow_mut();
        s.geometries.remove(&window);
        s.mapped.remove(&window);
        s.destroyed.insert(window);
    }

    pub fn push_event(&self, event: ServerEvent) { self.state.borrow_mut().events.push_back(event); }

    pub fn pending_events(&self) -> usize { self.state.borrow().events.len() }

    pub fn atom(&self, name: &str) -> Atom { self.state.borrow_mut().atom(name) }

    pub fn intern_calls(&self) -> usize { self.state.borrow().intern_calls }

    pub fn property(&self, window: WindowHandle, name: &str) -> Option<PropertyValue> {
        let mut s = self.state.borrow_mut();
        let atom = s.atom(name);
        s.properties.get(&(window, atom)).cloned()
    }

    pub fn set_property(&self, window: WindowHandle, name: &str, value: PropertyValue) {
        let mut s = self.state.borrow_mut();
        let atom = s.atom(name);
        s.properties.insert((window, atom), value);
    }

    pub fn geometry(&self, window: WindowHandle) -> Option<Rect> { self.state.borrow().geometries.get(&window).copied() }

    pub fn is_mapped(&self, window: WindowHandle) -> bool { self.state.borrow().mapped.contains(&window) }

    pub fn focused(&self) -> Option<WindowHandle> { self.state.borrow().focus }

    pub fn set_keysym(&self, keycode: u8, keysym: Keysym) { self.state.borrow_mut().keymap.insert(keycode, keysym); }

    pub fn fail_check_window(&self) { self.state.borrow_mut().fail_check_window = true; }

    pub fn requests(&self) -> Vec<Request> { self.state.borrow().requests.clone() }

    pub fn clear_requests(&self) { self.state.borrow_mut().requests.clear(); }

    fn record(&self, request: Request) { self.state.borrow_mut().requests.push(request); }
}

impl DisplayServer for FakeDisplay {
    fn root(&self) -> WindowHandle { ROOT }

    fn screen_rect(&self) -> Rect { self.state.borrow().screen }

    fn wait_for_event(&mut self, _timeout: Option<Duration>) -> Result<Option<ServerEvent>, WmError> {
        Ok(self.state.borrow_mut().events.pop_front())
    }

    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>, WmError> {
        let mut s = self.state.borrow_mut();
        s.intern_calls += 1;
        Ok(names.iter().map(|n| s.atom(n)).collect())
    }

    fn query_outputs(&mut self) -> Result<Vec<OutputInfo>, WmError> { Ok(self.state.borrow().outputs.clone()) }

    fn existing_windows(&mut self) -> Result<Vec<WindowHandle>, WmError> { Ok(self.state.borrow().existing.clone()) }

    fn get_geometry(&mut self, window: WindowHandle) -> Result<Rect, WmError> {
        self.state.borrow().geometries.get(&window).copied().ok_or(WmError::StaleHandle(window))
    }

    fn configure(&mut self, window: WindowHandle, request: &Configure) -> Result<(), WmError> {
        self.record(Request::Configure(window, *request));
        let mut s = self.state.borrow_mut();
        if let Some(bw) = request.border_width {
            s.borders.insert(window, bw);
        }
        let border = s.borders.get(&window).copied().unwrap_or(0) as i32;
        if let Some(frame) = s.geometries.get_mut(&window) {
            frame.x = request.x.unwrap_or(frame.x);
            frame.y = request.y.unwrap_or(frame.y);
            if let Some(w) = request.width {
                frame.width = w as i32 + 2 * border;
            }
            if let Some(h) = request.height {
                frame.height = h as i32 + 2 * border;
            }
        }
        Ok(())
    }

    fn send_configure_notify(&mut self, window: WindowHandle, frame: Rect, _border_width: u32) -> Result<(), WmError> {
        self.record(Request::ConfigureNotify(window, frame));
        Ok(())
    }

    fn map(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::Map(window));
        self.state.borrow_mut().mapped.insert(window);
        Ok(())
    }

    fn unmap(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::Unmap(window));
        let mut s = self.state.borrow_mut();
        if s.mapped.remove(&window) {
            s.events.push_back(ServerEvent::Unmap { window });
        }
        Ok(())
    }

    fn set_input_focus(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::Focus(window));
        self.state.borrow_mut().focus = Some(window);
        Ok(())
    }

    fn select_client_events(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::SelectEvents(window));
        Ok(())
    }

    fn change_property(&mut self, window: WindowHandle, property: Atom, value: &PropertyValue) -> Result<(), WmError> {
        self.record(Request::ChangeProperty(window, property));
        self.state.borrow_mut().properties.insert((window, property), value.clone());
        Ok(())
    }

    fn delete_property(&mut self, window: WindowHandle, property: Atom) -> Result<(), WmError> {
        self.record(Request::DeleteProperty(window, property));
        self.state.borrow_mut().properties.remove(&(window, property));
        Ok(())
    }

    fn get_property(
        &mut self,
        window: WindowHandle,
        property: Atom,
        _kind: PropertyKind,
    ) -> Result<Option<PropertyValue>, WmError> {
        let s = self.state.borrow();
        s.alive(window)?;
        Ok(s.properties.get(&(window, property)).cloned())
    }

    fn send_client_message(&mut self, target: WindowHandle, message: &ClientMessage) -> Result<(), WmError> {
        self.record(Request::ClientMessage(target, *message));
        Ok(())
    }

    fn kill_client(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::Kill(window));
        Ok(())
    }

    fn create_check_window(&mut self) -> Result<WindowHandle, WmError> {
        let mut s = self.state.borrow_mut();
        if s.fail_check_window {
            return Err(WmError::ResourceExhausted("x11 resource ids".into()));
        }
        s.next_window += 1;
        Ok(WindowHandle(s.next_window))
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.record(Request::Destroy(window));
        Ok(())
    }

    fn grab_key(&mut self, chord: KeyChord) -> Result<(), WmError> {
        self.record(Request::GrabKey(chord));
        Ok(())
    }

    fn ungrab_keys(&mut self) -> Result<(), WmError> {
        self.record(Request::UngrabKeys);
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError> { Ok(()) }

    fn keycode_to_keysym(&self, keycode: u8) -> Option<Keysym> { self.state.borrow().keymap.get(&keycode).copied() }

    fn grab_buttons(
        &mut self,
        window: WindowHandle,
        _bindings: &[(u8, ModMask)],
        click_to_focus: bool,
    ) -> Result<(), WmError> {
        self.record(Request::GrabButtons(window, click_to_focus));
        Ok(())
    }

    fn replay_pointer(&mut self) -> Result<(), WmError> {
        self.record(Request::ReplayPointer);
        Ok(())
    }

    fn grab_pointer(&mut self) -> Result<(), WmError> {
        self.record(Request::GrabPointer);
        Ok(())
    }

    fn ungrab_pointer(&mut self) -> Result<(), WmError> {
        self.record(Request::UngrabPointer);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WmError> { Ok(()) }
}

/// Remembers launched commands instead of running them.
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    launched: Rc<RefCell<Vec<String>>>,
}

impl RecordingLauncher {
    pub fn launched(&self) -> Vec<String> { self.launched.borrow().clone() }
}

impl Launcher for RecordingLauncher {
    fn launch(&mut self, command: &str) { self.launched.borrow_mut().push(command.to_string()); }
}
