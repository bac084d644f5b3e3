//! The Reactor's job is to maintain coherence between the display server and
//! the window manager's model.
//!
//! It takes events from the display server and from other threads, routes
//! each one to exactly one handler, and afterwards re-publishes whatever
//! protocol state changed. Events are handled one at a time on the reactor's
//! thread; other threads only ever talk to it through [`Sender`].

mod command;
mod error;
mod events;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

pub use command::{KeyBindings, KeyHandler, WmCommand};
pub use error::WmError;
use events::command::CommandEventHandler;
use events::drag::DragEventHandler;
use events::protocol::ProtocolEventHandler;
use events::window::WindowEventHandler;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::actor::monitor_poller::MonitorPoller;
use crate::actor::mouse::{DragSettings, Mouse};
use crate::actor;
use crate::common::collections::{HashMap, HashSet};
use crate::common::config::{Config, ConfigError};
use crate::layout_engine::{LayoutEngine, LayoutWindow, WorkspaceLayouts};
use crate::model::{
    MonitorRegistry, RuleSet, Session, SwitchPlan, WindowId, WindowRegistry, WindowRules, Workspace,
    WorkspaceManager,
};
use crate::protocol::{ProtocolSync, WindowStates};
use crate::sys::display::{Configure, DisplayServer, WindowHandle};
use crate::sys::event::ServerEvent;
use crate::sys::geometry::Rect;
use crate::sys::process::Launcher;

pub type Sender = actor::Sender<Event>;
type Receiver = actor::Receiver<Event>;

#[derive(Debug)]
pub enum Event {
    /// Something the display server reported.
    Server(ServerEvent),
    /// Re-probe outputs. Sent by the monitor poller.
    RefreshMonitors,
    Command(WmCommand),
    Shutdown,
}

/// Stacking layers, lowest first. Tiled windows are never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layer {
    Floating,
    Above,
    Fullscreen,
}

pub struct Reactor {
    config: Config,
    display: Box<dyn DisplayServer>,
    launcher: Box<dyn Launcher>,
    keys: Box<dyn KeyHandler>,
    protocol: ProtocolSync,
    windows: WindowRegistry,
    monitors: MonitorRegistry,
    workspaces: WorkspaceManager,
    layout_engine: LayoutEngine,
    mouse: Mouse,
    rules: RuleSet,
    /// Placements restored for windows as they appear.
    session: Option<Session>,
    events_tx: Sender,
    events_rx: Receiver,
    focused_monitor: usize,
    active: Option<WindowId>,
    stacking_dirty: bool,
    shutdown: bool,
}

impl Reactor {
    /// Builds the reactor. Configuration problems are reported here, before
    /// any event is handled.
    pub fn new(
        config: Config,
        mut display: Box<dyn DisplayServer>,
        launcher: Box<dyn Launcher>,
        session: Option<Session>,
    ) -> Result<Reactor, WmError> {
        config.check()?;
        let rules = RuleSet::compile(&config.floating_rules)
            .map_err(|err| ConfigError::Invalid(vec![format!("floating rule: {err}")]))?;
        let protocol = ProtocolSync::new(display.as_mut())?;

        let outputs = display.query_outputs().unwrap_or_else(|err| {
            warn!(%err, "could not query outputs");
            Vec::new()
        });
        let monitors = MonitorRegistry::from_outputs(outputs, display.screen_rect());
        let layout_engine = LayoutEngine::new(&config.settings);

        let mut workspaces: Vec<Workspace> = config
            .workspaces
            .names
            .iter()
            .map(|name| {
                let layout = config.workspaces.layout_for(name, layout_engine.default_layout());
                Workspace::new(name.clone(), WorkspaceLayouts::new(layout), config.workspaces.autostart_for(name))
            })
            .collect();
        // Every monitor needs a workspace of its own.
        while workspaces.len() < monitors.len() {
            let name = (workspaces.len() + 1).to_string();
            warn!(%name, "more monitors than workspaces, adding one");
            workspaces.push(Workspace::new(name, WorkspaceLayouts::new(layout_engine.default_layout()), Vec::new()));
        }

        let (events_tx, events_rx) = actor::channel();
        Ok(Reactor {
            keys: Box::new(KeyBindings::new(&config.keys)),
            mouse: Mouse::new(DragSettings::new(&config.settings)),
            focused_monitor: monitors.primary_index(),
            workspaces: WorkspaceManager::new(workspaces),
            config,
            display,
            launcher,
            protocol,
            windows: WindowRegistry::new(),
            monitors,
            layout_engine,
            rules,
            session,
            events_tx,
            events_rx,
            active: None,
            stacking_dirty: false,
            shutdown: false,
        })
    }

    /// Replaces the configured key bindings with another handler.
    pub fn with_key_handler(mut self, keys: Box<dyn KeyHandler>) -> Self {
        self.keys = keys;
        self
    }

    pub fn sender(&self) -> Sender { self.events_tx.clone() }

    pub fn windows(&self) -> &WindowRegistry { &self.windows }

    pub fn workspaces(&self) -> &WorkspaceManager { &self.workspaces }

    pub fn monitors(&self) -> &MonitorRegistry { &self.monitors }

    pub fn active_window(&self) -> Option<WindowId> { self.active }

    pub fn focused_monitor(&self) -> usize { self.focused_monitor }

    pub fn is_shutting_down(&self) -> bool { self.shutdown }

    /// Advertises the manager, grabs keys and adopts windows that were
    /// already mapped.
    pub fn start(&mut self) -> Result<(), WmError> {
        self.protocol.init(self.display.as_mut())?;
        self.regrab_keys()?;

        let existing = self.display.existing_windows()?;
        info!(count = existing.len(), "adopting existing windows");
        for handle in existing {
            if let Err(err) = self.manage(handle, true) {
                self.report(err)?;
            }
        }
        for monitor in 0..self.monitors.len() {
            self.run_autostart(monitor);
        }
        self.relayout()?;
        self.refocus()?;
        self.sync_protocol()?;
        self.display.flush()
    }

    /// Runs the event loop until a [`WmCommand::Quit`], an [`Event::Shutdown`]
    /// or a lost connection.
    pub fn run(mut self) -> Result<(), WmError> {
        self.start()?;

        let interval = self.config.settings.monitor_poll_interval_ms;
        if interval > 0
            && let Err(err) = MonitorPoller::new(self.sender(), Duration::from_millis(interval)).spawn()
        {
            warn!(%err, "could not start the monitor poller");
        }

        let result = loop {
            if self.shutdown {
                break Ok(());
            }
            if let Err(err) = self.step() {
                break Err(err);
            }
        };
        self.teardown();
        result
    }

    /// Handles every queued message and then at most one server event.
    pub fn step(&mut self) -> Result<(), WmError> {
        while let Ok((span, event)) = self.events_rx.try_recv() {
            let _guard = span.enter();
            self.handle_event(event)?;
        }
        if self.shutdown {
            return Ok(());
        }
        match self.display.wait_for_event(self.poll_timeout()) {
            Ok(Some(event)) => self.handle_event(Event::Server(event)),
            Ok(None) => Ok(()),
            Err(err) => self.report(err),
        }
    }

    fn poll_timeout(&self) -> Option<Duration> {
        match self.config.settings.monitor_poll_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    fn log_event(&self, event: &Event) {
        match event {
            Event::Server(server) if server.is_noisy() => trace!(?event, "Event"),
            _ => debug!(?event, "Event"),
        }
    }

    /// Handles one event. Only a lost connection is returned as an error;
    /// everything else is logged and confined to this event.
    #[instrument(name = "reactor::handle_event", level = "debug", skip(self), fields(event = ?event))]
    pub fn handle_event(&mut self, event: Event) -> Result<(), WmError> {
        self.log_event(&event);
        let result = match event {
            Event::Server(event) => self.dispatch(event),
            Event::RefreshMonitors => self.refresh_monitors(),
            Event::Command(command) => CommandEventHandler::handle_command(self, command),
            Event::Shutdown => {
                info!("shutdown requested");
                self.shutdown = true;
                Ok(())
            }
        };
        if let Err(err) = result {
            self.report(err)?;
        }
        if let Err(err) = self.sync_protocol() {
            self.report(err)?;
        }
        self.display.flush()
    }

    fn dispatch(&mut self, event: ServerEvent) -> Result<(), WmError> {
        match event {
            ServerEvent::MapRequest { window } => WindowEventHandler::handle_map_request(self, window),
            ServerEvent::Destroy { window } => WindowEventHandler::handle_destroy(self, window),
            ServerEvent::Unmap { window } => WindowEventHandler::handle_unmap(self, window),
            ServerEvent::ConfigureRequest(request) => {
                WindowEventHandler::handle_configure_request(self, request)
            }
            ServerEvent::KeyPress { keycode, state } => {
                CommandEventHandler::handle_key_press(self, keycode, state)
            }
            ServerEvent::ButtonPress(button) => DragEventHandler::handle_button_press(self, button),
            ServerEvent::ButtonRelease(_) => DragEventHandler::handle_button_release(self),
            ServerEvent::Motion { root_x, root_y } => DragEventHandler::handle_motion(self, root_x, root_y),
            ServerEvent::PropertyChange { window, atom } => {
                ProtocolEventHandler::handle_property_change(self, window, atom)
            }
            ServerEvent::ClientMessage(message) => {
                ProtocolEventHandler::handle_client_message(self, message)
            }
            ServerEvent::ScreenChange => self.refresh_monitors(),
            ServerEvent::MappingChange => {
                self.display.refresh_keyboard_mapping()?;
                self.regrab_keys()
            }
            ServerEvent::RequestFailed { window, stale, error } => match window {
                Some(window) if stale => Err(WmError::StaleHandle(window)),
                _ => {
                    debug!(?window, error, "request failed");
                    Ok(())
                }
            },
            ServerEvent::Unhandled(kind) => {
                trace!(kind, "ignoring event");
                Ok(())
            }
        }
    }

    /// Logs a per-event failure. Stale windows are dropped from the model.
    /// Returns the error only if the loop cannot continue.
    fn report(&mut self, err: WmError) -> Result<(), WmError> {
        match &err {
            WmError::Connection(_) => {
                error!(%err, "display connection lost");
                return Err(err);
            }
            WmError::StaleHandle(handle) => {
                debug!(%err, "dropping stale window");
                if let Some(id) = self.windows.lookup(*handle)
                    && let Err(err) = self.unmanage(id)
                    && !err.is_recoverable()
                {
                    return Err(err);
                }
            }
            WmError::ProtocolMismatch { .. } => debug!(%err, "protocol mismatch"),
            WmError::MalformedMessage(_) => warn!(%err, "ignoring message"),
            WmError::ResourceExhausted(_) => warn!(%err, "continuing without resource"),
            WmError::Config(_) => error!(%err, "configuration error"),
        }
        Ok(())
    }

    fn regrab_keys(&mut self) -> Result<(), WmError> {
        self.display.ungrab_keys()?;
        let chords = self.keys.chords();
        debug!(count = chords.len(), "grabbing keys");
        for chord in chords {
            self.display.grab_key(chord)?;
        }
        Ok(())
    }

    /// The workspace shown on the focused monitor.
    pub(crate) fn current_workspace(&self) -> usize {
        self.monitors.active_workspace(self.focused_monitor).unwrap_or(0)
    }

    fn sync_protocol(&mut self) -> Result<(), WmError> {
        let current = self.current_workspace();
        self.protocol
            .publish(self.display.as_mut(), &self.windows, &self.workspaces, current, self.active)
    }

    /// Starts managing a client that asked to be mapped, or that was mapped
    /// before we started (`viewable`). Docks are mapped but never managed.
    pub(crate) fn manage(&mut self, handle: WindowHandle, viewable: bool) -> Result<Option<WindowId>, WmError> {
        if let Some(id) = self.windows.lookup(handle) {
            trace!(%handle, "map request for a managed window");
            return Ok(Some(id));
        }
        if handle == self.display.root() || Some(handle) == self.protocol.check_window() {
            return Ok(None);
        }

        let display = self.display.as_mut();
        let types = self.protocol.window_types(display, handle)?;
        if self.protocol.is_dock(&types) {
            debug!(%handle, "mapping dock without managing it");
            display.map(handle)?;
            return Ok(None);
        }
        let props = self.protocol.read_props(display, handle)?;
        let transient = self.protocol.transient_for(display, handle)?;
        let initial_states = self.protocol.read_states(display, handle)?.difference(WindowStates::HIDDEN);
        let frame = display.get_geometry(handle)?;

        let parent_workspace = transient
            .and_then(|parent| self.windows.lookup(parent))
            .and_then(|parent| self.windows.get(parent))
            .map(|parent| parent.workspace);
        let base = WindowRules {
            floating: transient.is_some() || self.protocol.floats_by_type(&types),
            sticky: initial_states.contains(WindowStates::STICKY),
            workspace: parent_workspace.unwrap_or_else(|| self.current_workspace()),
        };
        let workspaces = &self.workspaces;
        let mut rules = self.rules.apply(&props, base, |name| workspaces.index_of(name));

        let identity = props.identity();
        let saved = self.session.as_mut().and_then(|s| s.take(&identity));
        if let Some(saved) = saved {
            debug!(%handle, identity, "restoring saved placement");
            if saved.workspace < self.workspaces.len() {
                rules.workspace = saved.workspace;
            }
            rules.floating |= saved.floating;
        }

        let id = self.windows.register(handle, &rules, props);
        if let Some(window) = self.windows.get_mut(id) {
            window.frame = saved.filter(|s| s.floating).map_or(frame, |s| s.frame());
            window.states |= initial_states;
            window.mapped = viewable;
        }
        if viewable {
            self.protocol.set_wm_state(self.display.as_mut(), handle, true)?;
        }
        self.display.select_client_events(handle)?;
        self.display.grab_buttons(handle, &self.mouse.settings().bindings(), true)?;
        self.workspaces.attach(&mut self.windows, id, rules.workspace);
        self.stacking_dirty = true;
        info!(%handle, ?id, workspace = rules.workspace, floating = rules.floating, "managing window");
        Ok(Some(id))
    }

    /// Forgets a window that was destroyed or withdrawn.
    pub(crate) fn unmanage(&mut self, id: WindowId) -> Result<(), WmError> {
        if self.mouse.cancel_for(id) {
            self.display.ungrab_pointer()?;
        }
        self.workspaces.detach(id);
        let Some(window) = self.windows.unregister(id) else {
            return Ok(());
        };
        self.protocol.forget_window(window.handle);
        if self.active == Some(id) {
            self.active = None;
        }
        info!(handle = %window.handle, "stopped managing window");
        self.relayout()?;
        self.refocus()
    }

    /// Recomputes and applies geometry and visibility for every monitor.
    ///
    /// Only frames that changed are sent to the server. Windows that should
    /// not be on screen are unmapped, the rest are mapped.
    pub(crate) fn relayout(&mut self) -> Result<(), WmError> {
        let visible: HashSet<WindowId> =
            self.workspaces.visible_windows(&self.monitors, &self.windows).into_iter().collect();
        let mut targets: HashMap<WindowId, (Rect, bool)> = HashMap::default();

        for monitor in self.monitors.iter() {
            let Some(workspace) = self.workspaces.get(monitor.active_workspace) else {
                continue;
            };
            let screen = monitor.rect;
            let mut tiled = Vec::new();
            let mut floating = Vec::new();
            for &id in workspace.windows() {
                let Some(window) = self.windows.get(id) else { continue };
                if window.is_minimized() {
                    continue;
                }
                if window.is_fullscreen() {
                    targets.insert(id, (screen, true));
                    continue;
                }
                let entry = LayoutWindow { id, frame: window.frame };
                if window.floating { floating.push(entry) } else { tiled.push(entry) }
            }

            let area = self.layout_engine.tiling_area(screen, tiled.len());
            for assignment in self.layout_engine.apply(&workspace.layouts, &tiled, &floating, screen) {
                let mut frame = assignment.frame;
                if let Some(window) = self.windows.get(assignment.window) {
                    if window.states.contains(WindowStates::MAXIMIZED_HORZ) {
                        frame.x = area.x;
                        frame.width = area.width;
                    }
                    if window.states.contains(WindowStates::MAXIMIZED_VERT) {
                        frame.y = area.y;
                        frame.height = area.height;
                    }
                }
                targets.insert(assignment.window, (frame, assignment.visible));
            }
        }

        let border = self.config.settings.border_width;
        for id in self.windows.ids() {
            let target = targets.get(&id).copied();
            let show = visible.contains(&id) && target.is_none_or(|(_, shown)| shown);
            let Some(window) = self.windows.get_mut(id) else { continue };
            let handle = window.handle;

            if show
                && let Some((frame, _)) = target
                && (window.frame != frame || !window.mapped)
            {
                let border = if window.is_fullscreen() { 0 } else { border };
                trace!(%handle, %frame, "configuring");
                self.display.configure(handle, &Configure::frame(frame, border))?;
                window.frame = frame;
            }
            if show {
                self.show_window(id)?;
            } else {
                self.hide_window(id)?;
            }
        }

        self.restack()?;
        if self.active.is_some_and(|id| self.windows.get(id).is_none_or(|w| !w.mapped)) {
            self.refocus()?;
        }
        Ok(())
    }

    fn show_window(&mut self, id: WindowId) -> Result<(), WmError> {
        let Some(window) = self.windows.get_mut(id) else {
            return Ok(());
        };
        if window.mapped {
            return Ok(());
        }
        window.mapped = true;
        let handle = window.handle;
        self.display.map(handle)?;
        self.protocol.set_wm_state(self.display.as_mut(), handle, true)
    }

    fn hide_window(&mut self, id: WindowId) -> Result<(), WmError> {
        let Some(window) = self.windows.get_mut(id) else {
            return Ok(());
        };
        if !window.mapped {
            return Ok(());
        }
        window.mapped = false;
        window.pending_unmaps += 1;
        let handle = window.handle;
        self.display.unmap(handle)?;
        self.protocol.set_wm_state(self.display.as_mut(), handle, false)
    }

    /// Raises floating, above and fullscreen windows in that order, with the
    /// focused window last within its layer.
    fn restack(&mut self) -> Result<(), WmError> {
        if !std::mem::take(&mut self.stacking_dirty) {
            return Ok(());
        }
        let mut raised: Vec<(Layer, bool, WindowHandle)> = self
            .windows
            .iter()
            .filter(|(_, w)| w.mapped)
            .filter_map(|(id, w)| {
                let layer = if w.is_fullscreen() {
                    Layer::Fullscreen
                } else if w.states.contains(WindowStates::ABOVE) {
                    Layer::Above
                } else if w.floating {
                    Layer::Floating
                } else {
                    return None;
                };
                Some((layer, self.active == Some(id), w.handle))
            })
            .collect();
        raised.sort_by_key(|&(layer, focused, _)| (layer, focused));
        for (_, _, handle) in raised {
            self.display.configure(handle, &Configure::raise())?;
        }
        Ok(())
    }

    /// Gives `id` the input focus and makes it its workspace's focused
    /// window.
    pub(crate) fn focus_window(&mut self, id: WindowId) -> Result<(), WmError> {
        let Some(window) = self.windows.get(id) else {
            return Ok(());
        };
        let (handle, workspace) = (window.handle, window.workspace);
        let bindings = self.mouse.settings().bindings();

        if let Some(previous) = self.active.filter(|&p| p != id)
            && let Some(previous) = self.windows.get_mut(previous)
        {
            previous.focused = false;
            let previous = previous.handle;
            self.display.grab_buttons(previous, &bindings, true)?;
        }
        if let Some(ws) = self.workspaces.get_mut(workspace) {
            ws.set_focus(id);
        }
        if let Some(window) = self.windows.get_mut(id) {
            window.focused = true;
        }
        if let Some(monitor) = self.monitors.showing(workspace) {
            self.focused_monitor = monitor;
        }
        self.active = Some(id);
        self.display.grab_buttons(handle, &bindings, false)?;
        self.display.set_input_focus(handle)?;
        debug!(%handle, "focused");

        self.stacking_dirty = true;
        self.restack()
    }

    /// Focuses the best window on the focused monitor: its workspace's
    /// focused window if it is on screen, else the first one that is.
    pub(crate) fn refocus(&mut self) -> Result<(), WmError> {
        let mapped = |id: &WindowId| self.windows.get(*id).is_some_and(|w| w.mapped);
        let candidate = self.workspaces.get(self.current_workspace()).and_then(|ws| {
            ws.focused().filter(mapped).or_else(|| ws.windows().iter().copied().find(mapped))
        });
        match candidate {
            Some(id) => self.focus_window(id),
            None => {
                if let Some(previous) = self.active.take()
                    && let Some(window) = self.windows.get_mut(previous)
                {
                    window.focused = false;
                    let handle = window.handle;
                    self.display.grab_buttons(handle, &self.mouse.settings().bindings(), true)?;
                }
                let root = self.display.root();
                self.display.set_input_focus(root)
            }
        }
    }

    /// Puts a floating window at `frame` and remembers it there.
    pub(crate) fn set_floating_frame(&mut self, id: WindowId, frame: Rect) -> Result<(), WmError> {
        let Some(window) = self.windows.get_mut(id) else {
            return Ok(());
        };
        window.frame = frame;
        let (handle, workspace) = (window.handle, window.workspace);
        if let Some(floating) = self.workspaces.get_mut(workspace).and_then(|ws| ws.layouts.floating_mut()) {
            floating.remember(id, frame);
        }
        let border = self.config.settings.border_width;
        self.display.configure(handle, &Configure::frame(frame, border))
    }

    /// Floating windows keep the rectangle they last had while floating, or
    /// float in place the first time.
    pub(crate) fn set_floating(&mut self, id: WindowId, floating: bool) -> Result<(), WmError> {
        let Some(window) = self.windows.get_mut(id) else {
            return Ok(());
        };
        if window.floating == floating {
            return Ok(());
        }
        window.floating = floating;
        let (frame, workspace) = (window.frame, window.workspace);
        if floating
            && let Some(layout) = self.workspaces.get_mut(workspace).and_then(|ws| ws.layouts.floating_mut())
            && layout.remembered(id).is_none()
        {
            layout.remember(id, frame);
        }
        debug!(?id, floating, "floating toggled");
        self.stacking_dirty = true;
        self.relayout()
    }

    /// Applies the side effects of a window's state flags changing.
    pub(crate) fn apply_state_change(
        &mut self,
        id: WindowId,
        previous: WindowStates,
        current: WindowStates,
    ) -> Result<(), WmError> {
        let changed = previous.symmetric_difference(current);
        if changed.is_empty() {
            return Ok(());
        }
        if let Some(window) = self.windows.get_mut(id) {
            window.states = current;
        }
        if changed.contains(WindowStates::STICKY) {
            self.workspaces.set_sticky(&mut self.windows, id, current.contains(WindowStates::STICKY));
        }
        if changed.intersects(WindowStates::FULLSCREEN | WindowStates::ABOVE) {
            self.stacking_dirty = true;
        }
        debug!(?id, ?changed, "window states changed");
        self.relayout()?;
        if changed.contains(WindowStates::HIDDEN) && self.active.is_none() {
            self.refocus()?;
        }
        Ok(())
    }

    /// Brings a window on screen and focuses it.
    pub(crate) fn activate(&mut self, id: WindowId) -> Result<(), WmError> {
        let Some(window) = self.windows.get_mut(id) else {
            return Ok(());
        };
        window.states.remove(WindowStates::HIDDEN);
        let (workspace, sticky) = (window.workspace, window.sticky);
        match self.monitors.showing(workspace) {
            Some(monitor) => self.focused_monitor = monitor,
            None if !sticky => {
                if let Some(plan) = self.workspaces.switch(
                    &mut self.monitors,
                    &self.windows,
                    self.focused_monitor,
                    workspace,
                ) {
                    self.finish_switch(plan)?;
                }
            }
            None => {}
        }
        self.relayout()?;
        self.focus_window(id)
    }

    pub(crate) fn switch_workspace(&mut self, monitor: usize, target: usize) -> Result<(), WmError> {
        if target >= self.workspaces.len() {
            return Err(WmError::MalformedMessage(format!("no workspace {target}")));
        }
        match self.workspaces.switch(&mut self.monitors, &self.windows, monitor, target) {
            Some(plan) => self.finish_switch(plan),
            None => Ok(()),
        }
    }

    /// Hides what the switch took off screen, then lays out and focuses the
    /// new workspace.
    pub(crate) fn finish_switch(&mut self, plan: SwitchPlan) -> Result<(), WmError> {
        debug!(hide = plan.hide.len(), show = plan.show.len(), swapped_with = ?plan.swapped_with, "applying switch");
        self.focused_monitor = plan.monitor;
        for &id in &plan.hide {
            self.hide_window(id)?;
        }
        for command in &plan.autostart {
            info!(command, "autostart");
            self.launcher.launch(command);
        }
        self.relayout()?;
        self.refocus()
    }

    pub(crate) fn move_window(&mut self, id: WindowId, target: usize, follow: bool) -> Result<(), WmError> {
        let plan = self.workspaces.move_window(
            &mut self.monitors,
            &mut self.windows,
            id,
            target,
            follow,
            self.focused_monitor,
        );
        let Some(plan) = plan else {
            return Ok(());
        };
        match plan.switch {
            Some(switch) => {
                self.finish_switch(switch)?;
                self.focus_window(id)
            }
            None => {
                self.relayout()?;
                self.refocus()
            }
        }
    }

    fn run_autostart(&mut self, monitor: usize) {
        for command in self.workspaces.pending_autostart(&self.monitors, monitor) {
            info!(command, monitor, "autostart");
            self.launcher.launch(&command);
        }
    }

    /// Re-probes outputs and reassigns workspaces if anything changed.
    pub(crate) fn refresh_monitors(&mut self) -> Result<(), WmError> {
        let outputs = match self.display.query_outputs() {
            Ok(outputs) => outputs,
            Err(err) if err.is_recoverable() => {
                warn!(%err, "could not query outputs");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        while self.workspaces.len() < outputs.len() {
            let name = (self.workspaces.len() + 1).to_string();
            let layouts = WorkspaceLayouts::new(self.layout_engine.default_layout());
            self.workspaces.add_workspace(Workspace::new(name, layouts, Vec::new()));
        }
        let fallback = self.display.screen_rect();
        if !self.monitors.update(outputs, fallback, self.workspaces.len()) {
            trace!("monitors unchanged");
            return Ok(());
        }
        self.focused_monitor = self.focused_monitor.min(self.monitors.len().saturating_sub(1));
        for monitor in 0..self.monitors.len() {
            self.run_autostart(monitor);
        }
        self.relayout()?;
        self.refocus()
    }

    pub(crate) fn save_session(&self) {
        let path = self.config.settings.session_path();
        match Session::capture(&self.windows).save(&path) {
            Ok(()) => info!(path = %path.display(), "session saved"),
            Err(err) => warn!(path = %path.display(), "could not save session: {err:#}"),
        }
    }

    /// Hands every window back in a usable state. Failures are logged since
    /// there is nothing left to recover.
    fn teardown(&mut self) {
        info!("shutting down");
        if self.mouse.end().is_some()
            && let Err(err) = self.display.ungrab_pointer()
        {
            debug!(%err, "ungrab failed");
        }
        self.save_session();

        let hidden: Vec<WindowHandle> =
            self.windows.iter().filter(|(_, w)| !w.mapped).map(|(_, w)| w.handle).collect();
        for handle in hidden {
            if let Err(err) = self.display.map(handle) {
                debug!(%handle, %err, "could not remap window");
            }
        }
        let result = self
            .display
            .ungrab_keys()
            .and_then(|()| self.protocol.teardown(self.display.as_mut()))
            .and_then(|()| self.display.flush());
        if let Err(err) = result {
            warn!(%err, "teardown incomplete");
        }
    }
}
