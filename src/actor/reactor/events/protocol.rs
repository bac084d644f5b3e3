use tracing::trace;

use crate::actor::reactor::{Reactor, WmError};
use crate::protocol::ProtocolIntent;
use crate::sys::display::{Atom, ClientMessage, WindowHandle};

pub struct ProtocolEventHandler;

impl ProtocolEventHandler {
    /// Keeps class, role and title current for rules and session matching.
    pub fn handle_property_change(reactor: &mut Reactor, window: WindowHandle, atom: Atom) -> Result<(), WmError> {
        if !reactor.protocol.is_name_property(atom) {
            return Ok(());
        }
        let Some(id) = reactor.windows.lookup(window) else {
            return Ok(());
        };
        let props = reactor.protocol.read_props(reactor.display.as_mut(), window)?;
        trace!(%window, title = props.title, "properties changed");
        if let Some(managed) = reactor.windows.get_mut(id) {
            managed.props = props;
        }
        Ok(())
    }

    pub fn handle_client_message(reactor: &mut Reactor, message: ClientMessage) -> Result<(), WmError> {
        let intent = reactor.protocol.handle_client_message(
            reactor.display.as_mut(),
            &mut reactor.windows,
            &message,
        )?;
        match intent {
            ProtocolIntent::None => Ok(()),
            ProtocolIntent::StateChanged { window, previous, current } => {
                reactor.apply_state_change(window, previous, current)
            }
            ProtocolIntent::Activate(window) => reactor.activate(window),
            ProtocolIntent::SwitchDesktop(desktop) => {
                let monitor = reactor.focused_monitor;
                reactor.switch_workspace(monitor, desktop)
            }
            ProtocolIntent::MoveToDesktop { window, desktop: None } => {
                if reactor.workspaces.set_sticky(&mut reactor.windows, window, true) {
                    reactor.relayout()?;
                }
                Ok(())
            }
            ProtocolIntent::MoveToDesktop { window, desktop: Some(desktop) } => {
                if desktop >= reactor.workspaces.len() {
                    return Err(WmError::MalformedMessage(format!("no desktop {desktop}")));
                }
                let unstuck = reactor.workspaces.set_sticky(&mut reactor.windows, window, false);
                reactor.move_window(window, desktop, false)?;
                if unstuck {
                    reactor.relayout()?;
                }
                Ok(())
            }
        }
    }
}
