//! [`DisplayServer`] on top of an x11rb connection.

use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info, trace, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::{ConnectionError, ConnectError, ReplyError, ReplyOrIdError};
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    self, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ConfigWindow, ConfigureNotifyEvent,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, GrabMode, InputFocus,
    MapState, PropMode, UnmapNotifyEvent, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::x11_utils::X11Error;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use crate::actor::reactor::WmError;
use crate::sys::display::{
    Atom, ClientMessage, Configure, DisplayServer, OutputInfo, PropertyKind, PropertyValue,
    StackMode, WindowHandle,
};
use crate::sys::event::{ButtonEvent, ConfigureRequest, ServerEvent};
use crate::sys::geometry::Rect;
use crate::sys::keys::{KeyChord, Keysym, ModMask};

const PROPERTY_READ_LENGTH: u32 = 4096;

impl From<ConnectionError> for WmError {
    fn from(err: ConnectionError) -> Self { WmError::Connection(err.to_string()) }
}

impl From<ConnectError> for WmError {
    fn from(err: ConnectError) -> Self { WmError::Connection(err.to_string()) }
}

impl From<ReplyError> for WmError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(err) => err.into(),
            ReplyError::X11Error(err) => x11_error(&err),
        }
    }
}

impl From<ReplyOrIdError> for WmError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::IdsExhausted => WmError::ResourceExhausted("x11 resource ids".into()),
            ReplyOrIdError::ConnectionError(err) => err.into(),
            ReplyOrIdError::X11Error(err) => x11_error(&err),
        }
    }
}

fn is_stale(err: &X11Error) -> bool {
    matches!(err.error_kind, x11rb::protocol::ErrorKind::Window | x11rb::protocol::ErrorKind::Drawable)
}

fn x11_error(err: &X11Error) -> WmError {
    if is_stale(err) {
        WmError::StaleHandle(WindowHandle(err.bad_value))
    } else {
        WmError::ProtocolMismatch {
            window: WindowHandle(err.bad_value),
            what: format!("{:?} request (error {:?})", err.major_opcode, err.error_kind),
        }
    }
}

#[derive(Debug, Default)]
struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    fn keysym(&self, keycode: u8) -> Option<Keysym> {
        let per = usize::from(self.keysyms_per_keycode);
        let index = usize::from(keycode.checked_sub(self.min_keycode)?) * per;
        self.keysyms.get(index).copied().filter(|&sym| sym != 0)
    }

    fn keycodes(&self, keysym: Keysym) -> Vec<u8> {
        let per = usize::from(self.keysyms_per_keycode).max(1);
        self.keysyms
            .chunks(per)
            .enumerate()
            .filter(|(_, syms)| syms.first() == Some(&keysym))
            .filter_map(|(i, _)| u8::try_from(i + usize::from(self.min_keycode)).ok())
            .collect()
    }
}

pub struct X11Display {
    conn: RustConnection,
    root: xproto::Window,
    screen_rect: Rect,
    utf8_string: Atom,
    has_randr: bool,
    keymap: Keymap,
}

impl X11Display {
    /// Connects and claims substructure redirection on the root window.
    /// Fails if another window manager already owns it.
    pub fn connect(display_name: Option<&str>) -> Result<X11Display, WmError> {
        let (conn, screen_num) = x11rb::connect(display_name)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_rect =
            Rect::new(0, 0, i32::from(screen.width_in_pixels), i32::from(screen.height_in_pixels));

        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::PROPERTY_CHANGE
            | EventMask::BUTTON_PRESS;
        let claimed = conn
            .change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(mask))?
            .check();
        if let Err(err) = claimed {
            debug!(?err, "substructure redirect refused");
            return Err(WmError::Connection("another window manager is already running".into()));
        }

        let has_randr = conn.extension_information(randr::X11_EXTENSION_NAME)?.is_some();
        if has_randr {
            conn.randr_select_input(root, randr::NotifyMask::SCREEN_CHANGE)?;
        } else {
            info!("randr is not available, treating the screen as a single monitor");
        }

        let utf8_string = conn.intern_atom(false, b"UTF8_STRING")?.reply()?.atom;

        let mut display = X11Display {
            conn,
            root,
            screen_rect,
            utf8_string,
            has_randr,
            keymap: Keymap::default(),
        };
        display.refresh_keyboard_mapping()?;
        Ok(display)
    }

    fn translate(&self, event: Event) -> ServerEvent {
        match event {
            Event::MapRequest(e) => ServerEvent::MapRequest { window: WindowHandle(e.window) },
            Event::DestroyNotify(e) => {
                if e.event == self.root {
                    ServerEvent::Destroy { window: WindowHandle(e.window) }
                } else {
                    ServerEvent::Unhandled("client_destroy_notify")
                }
            }
            Event::UnmapNotify(e) => translate_unmap(self.root, &e),
            Event::ConfigureRequest(e) => {
                let mask = u16::from(e.value_mask);
                let has = |flag: ConfigWindow| mask & u16::from(flag) != 0;
                ServerEvent::ConfigureRequest(ConfigureRequest {
                    window: WindowHandle(e.window),
                    x: has(ConfigWindow::X).then_some(i32::from(e.x)),
                    y: has(ConfigWindow::Y).then_some(i32::from(e.y)),
                    width: has(ConfigWindow::WIDTH).then_some(i32::from(e.width)),
                    height: has(ConfigWindow::HEIGHT).then_some(i32::from(e.height)),
                    border_width: has(ConfigWindow::BORDER_WIDTH)
                        .then_some(u32::from(e.border_width)),
                })
            }
            Event::KeyPress(e) => ServerEvent::KeyPress {
                keycode: e.detail,
                state: ModMask::from_event_state(u16::from(e.state)),
            },
            Event::ButtonPress(e) => ServerEvent::ButtonPress(self.button_event(
                e.event, e.child, e.detail, u16::from(e.state), e.root_x, e.root_y,
            )),
            Event::ButtonRelease(e) => ServerEvent::ButtonRelease(self.button_event(
                e.event, e.child, e.detail, u16::from(e.state), e.root_x, e.root_y,
            )),
            Event::MotionNotify(e) => ServerEvent::Motion {
                root_x: i32::from(e.root_x),
                root_y: i32::from(e.root_y),
            },
            Event::PropertyNotify(e) => {
                ServerEvent::PropertyChange { window: WindowHandle(e.window), atom: e.atom }
            }
            Event::ClientMessage(e) => ServerEvent::ClientMessage(ClientMessage {
                window: WindowHandle(e.window),
                message_type: e.type_,
                format: e.format,
                data: e.data.as_data32(),
            }),
            Event::RandrScreenChangeNotify(_) => ServerEvent::ScreenChange,
            Event::MappingNotify(_) => ServerEvent::MappingChange,
            Event::Error(err) => {
                let stale = is_stale(&err);
                ServerEvent::RequestFailed {
                    window: stale.then_some(WindowHandle(err.bad_value)),
                    stale,
                    error: format!("{:?} for major opcode {}", err.error_kind, err.major_opcode),
                }
            }
            Event::ConfigureNotify(_) => ServerEvent::Unhandled("configure_notify"),
            Event::MapNotify(_) => ServerEvent::Unhandled("map_notify"),
            Event::CreateNotify(_) => ServerEvent::Unhandled("create_notify"),
            Event::EnterNotify(_) => ServerEvent::Unhandled("enter_notify"),
            Event::KeyRelease(_) => ServerEvent::Unhandled("key_release"),
            _ => ServerEvent::Unhandled("other"),
        }
    }

    fn button_event(
        &self,
        event: xproto::Window,
        child: xproto::Window,
        button: u8,
        state: u16,
        root_x: i16,
        root_y: i16,
    ) -> ButtonEvent {
        let window = if event == self.root && child != NONE { child } else { event };
        ButtonEvent {
            window: WindowHandle(window),
            button,
            state: ModMask::from_event_state(state),
            root_x: i32::from(root_x),
            root_y: i32::from(root_y),
        }
    }
}

/// Clients select structure events of their own, so each unmap is reported
/// twice: once on the root and once on the window itself. Only the root copy
/// counts, otherwise an unmap we caused would look like a withdrawal.
fn translate_unmap(root: xproto::Window, e: &UnmapNotifyEvent) -> ServerEvent {
    if e.event == root {
        ServerEvent::Unmap { window: WindowHandle(e.window) }
    } else {
        ServerEvent::Unhandled("client_unmap_notify")
    }
}

fn clamp_i16(v: i32) -> i16 { v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16 }

fn clamp_u16(v: i32) -> u16 { v.clamp(1, i32::from(u16::MAX)) as u16 }

fn split_strings(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

fn join_strings(strings: &[String]) -> Vec<u8> {
    let mut bytes = strings.join("\0").into_bytes();
    if strings.len() > 1 {
        bytes.push(0);
    }
    bytes
}

impl DisplayServer for X11Display {
    fn root(&self) -> WindowHandle { WindowHandle(self.root) }

    fn screen_rect(&self) -> Rect { self.screen_rect }

    fn wait_for_event(&mut self, timeout: Option<Duration>) -> Result<Option<ServerEvent>, WmError> {
        self.conn.flush()?;
        loop {
            if let Some(event) = self.conn.poll_for_event()? {
                return Ok(Some(self.translate(event)));
            }
            let timeout = match timeout {
                None => PollTimeout::NONE,
                Some(d) => PollTimeout::from(u16::try_from(d.as_millis()).unwrap_or(u16::MAX)),
            };
            let mut fds = [PollFd::new(self.conn.stream().as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(0) => return Ok(None),
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(err) => return Err(WmError::Connection(err.to_string())),
            }
        }
    }

    fn intern_atoms(&mut self, names: &[&str]) -> Result<Vec<Atom>, WmError> {
        let cookies = names
            .iter()
            .map(|name| self.conn.intern_atom(false, name.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        cookies.into_iter().map(|c| Ok(c.reply()?.atom)).collect()
    }

    fn query_outputs(&mut self) -> Result<Vec<OutputInfo>, WmError> {
        if !self.has_randr {
            return Ok(Vec::new());
        }
        let reply = self.conn.randr_get_monitors(self.root, true)?.reply()?;
        let mut outputs = Vec::with_capacity(reply.monitors.len());
        for monitor in reply.monitors {
            let name = match self.conn.get_atom_name(monitor.name)?.reply() {
                Ok(r) => String::from_utf8_lossy(&r.name).into_owned(),
                Err(err) => {
                    debug!(?err, "monitor has no name");
                    String::new()
                }
            };
            outputs.push(OutputInfo {
                name,
                rect: Rect::new(
                    i32::from(monitor.x),
                    i32::from(monitor.y),
                    i32::from(monitor.width),
                    i32::from(monitor.height),
                ),
                primary: monitor.primary,
            });
        }
        Ok(outputs)
    }

    fn existing_windows(&mut self) -> Result<Vec<WindowHandle>, WmError> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        let mut windows = Vec::new();
        for child in tree.children {
            match self.conn.get_window_attributes(child)?.reply() {
                Ok(attrs) if attrs.map_state == MapState::VIEWABLE && !attrs.override_redirect => {
                    windows.push(WindowHandle(child));
                }
                Ok(_) => {}
                Err(err) => trace!(window = child, ?err, "skipping window during adoption"),
            }
        }
        Ok(windows)
    }

    fn get_geometry(&mut self, window: WindowHandle) -> Result<Rect, WmError> {
        let g = self.conn.get_geometry(window.0)?.reply()?;
        let border = i32::from(g.border_width);
        Ok(Rect::new(
            i32::from(g.x),
            i32::from(g.y),
            i32::from(g.width) + 2 * border,
            i32::from(g.height) + 2 * border,
        ))
    }

    fn configure(&mut self, window: WindowHandle, request: &Configure) -> Result<(), WmError> {
        let aux = ConfigureWindowAux::new()
            .x(request.x)
            .y(request.y)
            .width(request.width)
            .height(request.height)
            .border_width(request.border_width)
            .stack_mode(request.stack_mode.map(|mode| match mode {
                StackMode::Above => xproto::StackMode::ABOVE,
                StackMode::Below => xproto::StackMode::BELOW,
            }));
        self.conn.configure_window(window.0, &aux)?;
        Ok(())
    }

    fn send_configure_notify(
        &mut self,
        window: WindowHandle,
        frame: Rect,
        border_width: u32,
    ) -> Result<(), WmError> {
        let border = i32::try_from(border_width).unwrap_or(0);
        let event = ConfigureNotifyEvent {
            response_type: xproto::CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window.0,
            window: window.0,
            above_sibling: NONE,
            x: clamp_i16(frame.x),
            y: clamp_i16(frame.y),
            width: clamp_u16(frame.width - 2 * border),
            height: clamp_u16(frame.height - 2 * border),
            border_width: u16::try_from(border_width).unwrap_or(0),
            override_redirect: false,
        };
        self.conn.send_event(false, window.0, EventMask::STRUCTURE_NOTIFY, event)?;
        Ok(())
    }

    fn map(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.conn.map_window(window.0)?;
        Ok(())
    }

    fn unmap(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.conn.unmap_window(window.0)?;
        Ok(())
    }

    fn set_input_focus(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.conn.set_input_focus(InputFocus::POINTER_ROOT, window.0, CURRENT_TIME)?;
        Ok(())
    }

    fn select_client_events(&mut self, window: WindowHandle) -> Result<(), WmError> {
        let mask = EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY;
        self.conn
            .change_window_attributes(window.0, &ChangeWindowAttributesAux::new().event_mask(mask))?;
        Ok(())
    }

    fn change_property(
        &mut self,
        window: WindowHandle,
        property: Atom,
        value: &PropertyValue,
    ) -> Result<(), WmError> {
        let w = window.0;
        let mode = PropMode::REPLACE;
        match value {
            PropertyValue::Atoms(atoms) => {
                self.conn.change_property32(mode, w, property, AtomEnum::ATOM, atoms)?
            }
            PropertyValue::Windows(windows) => {
                let ids: Vec<u32> = windows.iter().map(|h| h.0).collect();
                self.conn.change_property32(mode, w, property, AtomEnum::WINDOW, &ids)?
            }
            PropertyValue::Cardinals(values) => {
                self.conn.change_property32(mode, w, property, AtomEnum::CARDINAL, values)?
            }
            PropertyValue::Utf8(strings) => {
                let bytes = join_strings(strings);
                self.conn.change_property8(mode, w, property, self.utf8_string, &bytes)?
            }
            PropertyValue::Strings(strings) => {
                let bytes = join_strings(strings);
                self.conn.change_property8(mode, w, property, AtomEnum::STRING, &bytes)?
            }
            PropertyValue::Typed32 { kind, values } => {
                self.conn.change_property32(mode, w, property, *kind, values)?
            }
        };
        Ok(())
    }

    fn delete_property(&mut self, window: WindowHandle, property: Atom) -> Result<(), WmError> {
        self.conn.delete_property(window.0, property)?;
        Ok(())
    }

    fn get_property(
        &mut self,
        window: WindowHandle,
        property: Atom,
        kind: PropertyKind,
    ) -> Result<Option<PropertyValue>, WmError> {
        let requested: Atom = match kind {
            PropertyKind::Atom => AtomEnum::ATOM.into(),
            PropertyKind::Window => AtomEnum::WINDOW.into(),
            PropertyKind::Cardinal => AtomEnum::CARDINAL.into(),
            PropertyKind::Utf8 => self.utf8_string,
            PropertyKind::Strings => AtomEnum::ANY.into(),
        };
        let reply = self
            .conn
            .get_property(false, window.0, property, requested, 0, PROPERTY_READ_LENGTH)?
            .reply()?;
        if reply.type_ == u32::from(AtomEnum::NONE) || reply.value.is_empty() {
            return Ok(None);
        }

        let value = match kind {
            PropertyKind::Utf8 => PropertyValue::Utf8(split_strings(&reply.value)),
            PropertyKind::Strings => PropertyValue::Strings(split_strings(&reply.value)),
            PropertyKind::Atom | PropertyKind::Window | PropertyKind::Cardinal => {
                let Some(values) = reply.value32() else {
                    return Err(WmError::ProtocolMismatch {
                        window,
                        what: format!("32-bit data in property {property}"),
                    });
                };
                let values: Vec<u32> = values.collect();
                match kind {
                    PropertyKind::Atom => PropertyValue::Atoms(values),
                    PropertyKind::Window => {
                        PropertyValue::Windows(values.into_iter().map(WindowHandle).collect())
                    }
                    _ => PropertyValue::Cardinals(values),
                }
            }
        };
        Ok(Some(value))
    }

    fn send_client_message(
        &mut self,
        target: WindowHandle,
        message: &ClientMessage,
    ) -> Result<(), WmError> {
        let event = xproto::ClientMessageEvent::new(
            message.format,
            message.window.0,
            message.message_type,
            message.data,
        );
        let mask = if target.0 == self.root {
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT
        } else {
            EventMask::NO_EVENT
        };
        self.conn.send_event(false, target.0, mask, event)?;
        Ok(())
    }

    fn kill_client(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.conn.kill_client(window.0)?;
        Ok(())
    }

    fn create_check_window(&mut self) -> Result<WindowHandle, WmError> {
        let id = self.conn.generate_id()?;
        self.conn
            .create_window(
                COPY_DEPTH_FROM_PARENT,
                id,
                self.root,
                -1,
                -1,
                1,
                1,
                0,
                WindowClass::INPUT_ONLY,
                COPY_FROM_PARENT,
                &CreateWindowAux::new(),
            )?
            .check()?;
        Ok(WindowHandle(id))
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<(), WmError> {
        self.conn.destroy_window(window.0)?;
        Ok(())
    }

    fn grab_key(&mut self, chord: KeyChord) -> Result<(), WmError> {
        let keycodes = self.keymap.keycodes(chord.keysym);
        if keycodes.is_empty() {
            warn!(%chord, "no keycode produces this key, binding is inactive");
        }
        for keycode in keycodes {
            for extra in ModMask::IGNORED_COMBINATIONS {
                let modifiers = xproto::ModMask::from((chord.modifiers | extra).bits());
                self.conn.grab_key(
                    true,
                    self.root,
                    modifiers,
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
        }
        Ok(())
    }

    fn ungrab_keys(&mut self) -> Result<(), WmError> {
        self.conn.ungrab_key(xproto::Grab::ANY, self.root, xproto::ModMask::ANY)?;
        Ok(())
    }

    fn refresh_keyboard_mapping(&mut self) -> Result<(), WmError> {
        let setup = self.conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = self.conn.get_keyboard_mapping(min, max - min + 1)?.reply()?;
        self.keymap = Keymap {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        };
        Ok(())
    }

    fn keycode_to_keysym(&self, keycode: u8) -> Option<Keysym> { self.keymap.keysym(keycode) }

    fn grab_buttons(
        &mut self,
        window: WindowHandle,
        bindings: &[(u8, ModMask)],
        click_to_focus: bool,
    ) -> Result<(), WmError> {
        self.conn.ungrab_button(ButtonIndex::ANY, window.0, xproto::ModMask::ANY)?;
        if click_to_focus {
            self.conn.grab_button(
                false,
                window.0,
                EventMask::BUTTON_PRESS,
                GrabMode::SYNC,
                GrabMode::SYNC,
                NONE,
                NONE,
                ButtonIndex::ANY,
                xproto::ModMask::ANY,
            )?;
        }
        for &(button, modifiers) in bindings {
            for extra in ModMask::IGNORED_COMBINATIONS {
                self.conn.grab_button(
                    false,
                    window.0,
                    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                    NONE,
                    NONE,
                    ButtonIndex::from(button),
                    xproto::ModMask::from((modifiers | extra).bits()),
                )?;
            }
        }
        Ok(())
    }

    fn replay_pointer(&mut self) -> Result<(), WmError> {
        self.conn.allow_events(xproto::Allow::REPLAY_POINTER, CURRENT_TIME)?;
        Ok(())
    }

    fn grab_pointer(&mut self) -> Result<(), WmError> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                self.root,
                EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                CURRENT_TIME,
            )?
            .reply()?;
        if reply.status != xproto::GrabStatus::SUCCESS {
            return Err(WmError::ProtocolMismatch {
                window: WindowHandle(self.root),
                what: format!("pointer grab ({:?})", reply.status),
            });
        }
        Ok(())
    }

    fn ungrab_pointer(&mut self) -> Result<(), WmError> {
        self.conn.ungrab_pointer(CURRENT_TIME)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), WmError> {
        self.conn.flush()?;
        Ok(())
    }
}
