use tracing::{debug, trace};

use crate::actor::reactor::{Reactor, WmError};
use crate::layout_engine::clamp_size;
use crate::sys::display::{Configure, WindowHandle};
use crate::sys::event::ConfigureRequest;
use crate::sys::geometry::Rect;

pub struct WindowEventHandler;

impl WindowEventHandler {
    pub fn handle_map_request(reactor: &mut Reactor, window: WindowHandle) -> Result<(), WmError> {
        let Some(id) = reactor.manage(window, false)? else {
            return Ok(());
        };
        reactor.relayout()?;
        let mapped = reactor.windows.get(id).is_some_and(|w| w.mapped);
        if reactor.config.settings.focus_new_windows && mapped {
            reactor.focus_window(id)?;
        }
        Ok(())
    }

    pub fn handle_destroy(reactor: &mut Reactor, window: WindowHandle) -> Result<(), WmError> {
        match reactor.windows.lookup(window) {
            Some(id) => reactor.unmanage(id),
            None => Ok(()),
        }
    }

    /// Unmaps we caused are expected and ignored. Any other unmap means the
    /// client withdrew the window.
    pub fn handle_unmap(reactor: &mut Reactor, window: WindowHandle) -> Result<(), WmError> {
        let Some(id) = reactor.windows.lookup(window) else {
            return Ok(());
        };
        if let Some(managed) = reactor.windows.get_mut(id)
            && managed.pending_unmaps > 0
        {
            managed.pending_unmaps -= 1;
            trace!(%window, "expected unmap");
            return Ok(());
        }
        debug!(%window, "client withdrew window");
        reactor.unmanage(id)
    }

    /// Unmanaged and floating windows get what they ask for. Tiled windows
    /// are told their current frame instead.
    pub fn handle_configure_request(reactor: &mut Reactor, request: ConfigureRequest) -> Result<(), WmError> {
        let border = reactor.config.settings.border_width;
        let Some(id) = reactor.windows.lookup(request.window) else {
            let configure = Configure {
                x: request.x,
                y: request.y,
                width: request.width.and_then(|w| u32::try_from(w).ok()),
                height: request.height.and_then(|h| u32::try_from(h).ok()),
                border_width: request.border_width,
                stack_mode: None,
            };
            return reactor.display.configure(request.window, &configure);
        };
        let Some(window) = reactor.windows.get(id) else {
            return Ok(());
        };

        if window.floating && !window.is_fullscreen() {
            let edges = 2 * i32::try_from(border).unwrap_or(0);
            let current = window.frame;
            let frame = Rect {
                x: request.x.unwrap_or(current.x),
                y: request.y.unwrap_or(current.y),
                width: request.width.map_or(current.width, |w| w + edges),
                height: request.height.map_or(current.height, |h| h + edges),
            };
            let frame = clamp_size(frame);
            debug!(window = %request.window, %frame, "honouring configure request");
            return reactor.set_floating_frame(id, frame);
        }

        let (handle, frame) = (window.handle, window.frame);
        let border = if window.is_fullscreen() { 0 } else { border };
        trace!(%handle, %frame, "denying configure request for a laid out window");
        reactor.display.send_configure_notify(handle, frame, border)
    }
}
