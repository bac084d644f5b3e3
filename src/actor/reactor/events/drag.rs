use tracing::{debug, trace};

use crate::actor::reactor::{Reactor, WmError};
use crate::sys::event::ButtonEvent;

pub struct DragEventHandler;

impl DragEventHandler {
    /// A modified press starts a move or resize, a plain press focuses the
    /// window and is passed on to the client.
    pub fn handle_button_press(reactor: &mut Reactor, event: ButtonEvent) -> Result<(), WmError> {
        if let Some(monitor) = reactor.monitors.at_point(event.root_x, event.root_y) {
            reactor.focused_monitor = monitor;
        }
        let Some(id) = reactor.windows.lookup(event.window) else {
            return Ok(());
        };

        let Some(mode) = reactor.mouse.mode_for(event.button, event.state) else {
            reactor.focus_window(id)?;
            return reactor.display.replay_pointer();
        };
        let Some(window) = reactor.windows.get(id) else {
            return Ok(());
        };
        if window.is_fullscreen() {
            trace!(window = %event.window, "not dragging a fullscreen window");
            return Ok(());
        }
        // A tiled window starts floating where it is.
        if !window.floating {
            let (frame, workspace) = (window.frame, window.workspace);
            if let Some(floating) = reactor.workspaces.get_mut(workspace).and_then(|ws| ws.layouts.floating_mut()) {
                floating.remember(id, frame);
            }
            reactor.set_floating(id, true)?;
        }
        reactor.focus_window(id)?;
        let Some(frame) = reactor.windows.get(id).map(|w| w.frame) else {
            return Ok(());
        };
        reactor.display.grab_pointer()?;
        if !reactor.mouse.begin(id, mode, (event.root_x, event.root_y), frame) {
            debug!("drag already running");
        }
        Ok(())
    }

    pub fn handle_motion(reactor: &mut Reactor, root_x: i32, root_y: i32) -> Result<(), WmError> {
        match reactor.mouse.motion(root_x, root_y, &reactor.monitors) {
            Some((id, frame)) => reactor.set_floating_frame(id, frame),
            None => Ok(()),
        }
    }

    /// The final frame is remembered so later layout passes keep it.
    pub fn handle_button_release(reactor: &mut Reactor) -> Result<(), WmError> {
        let Some((id, frame)) = reactor.mouse.end() else {
            return Ok(());
        };
        reactor.display.ungrab_pointer()?;
        reactor.set_floating_frame(id, frame)
    }
}
