use tracing::{debug, info, trace};

use crate::actor::mouse::resize_by;
use crate::actor::reactor::{Reactor, WmCommand, WmError};
use crate::layout_engine::{WorkspaceLayouts, snap_to_edges};
use crate::model::{WindowId, Workspace};
use crate::protocol::WindowStates;
use crate::sys::geometry::Rect;
use crate::sys::keys::{KeyChord, ModMask};

pub struct CommandEventHandler;

impl CommandEventHandler {
    pub fn handle_key_press(reactor: &mut Reactor, keycode: u8, state: ModMask) -> Result<(), WmError> {
        let Some(keysym) = reactor.display.keycode_to_keysym(keycode) else {
            trace!(keycode, "no keysym for keycode");
            return Ok(());
        };
        let chord = KeyChord::new(state, keysym);
        match reactor.keys.command_for(&chord) {
            Some(command) => Self::handle_command(reactor, command),
            None => {
                trace!(%chord, "unbound chord");
                Ok(())
            }
        }
    }

    pub fn handle_command(reactor: &mut Reactor, command: WmCommand) -> Result<(), WmError> {
        debug!(?command, "command");
        match command {
            WmCommand::FocusNext => Self::cycle_focus(reactor, true),
            WmCommand::FocusPrev => Self::cycle_focus(reactor, false),
            WmCommand::SwitchWorkspace(index) => {
                let monitor = reactor.focused_monitor;
                reactor.switch_workspace(monitor, index)
            }
            WmCommand::SwitchLastWorkspace => {
                let monitor = reactor.focused_monitor;
                match reactor.workspaces.switch_last(&mut reactor.monitors, &reactor.windows, monitor) {
                    Some(plan) => reactor.finish_switch(plan),
                    None => Ok(()),
                }
            }
            WmCommand::MoveToWorkspace { workspace, follow } => match reactor.active {
                Some(id) => reactor.move_window(id, workspace, follow),
                None => Ok(()),
            },
            WmCommand::NextLayout => Self::change_layout(reactor, |layouts| {
                layouts.next_layout();
            }),
            WmCommand::PrevLayout => Self::change_layout(reactor, |layouts| {
                layouts.prev_layout();
            }),
            WmCommand::SetLayout(kind) => Self::change_layout(reactor, |layouts| {
                layouts.set_layout(kind);
            }),
            WmCommand::NextTab => {
                let count = Self::tiled_count(reactor);
                Self::change_layout(reactor, |layouts| layouts.next_tab(count))
            }
            WmCommand::PrevTab => {
                let count = Self::tiled_count(reactor);
                Self::change_layout(reactor, |layouts| layouts.prev_tab(count))
            }
            WmCommand::ToggleFloating => match Self::active(reactor) {
                Some((id, floating, _)) => reactor.set_floating(id, !floating),
                None => Ok(()),
            },
            WmCommand::ToggleSticky => {
                let Some(id) = reactor.active else { return Ok(()) };
                let sticky = reactor.windows.get(id).is_some_and(|w| w.sticky);
                reactor.workspaces.set_sticky(&mut reactor.windows, id, !sticky);
                reactor.relayout()
            }
            WmCommand::ToggleFullscreen => match Self::active(reactor) {
                Some((id, _, states)) => {
                    reactor.apply_state_change(id, states, states.symmetric_difference(WindowStates::FULLSCREEN))
                }
                None => Ok(()),
            },
            WmCommand::ToggleMaximize => match Self::active(reactor) {
                Some((id, _, states)) => {
                    let current = if states.intersects(WindowStates::MAXIMIZED) {
                        states.difference(WindowStates::MAXIMIZED)
                    } else {
                        states.union(WindowStates::MAXIMIZED)
                    };
                    reactor.apply_state_change(id, states, current)
                }
                None => Ok(()),
            },
            WmCommand::CloseWindow => {
                let Some(handle) = reactor.active.and_then(|id| reactor.windows.handle(id)) else {
                    return Ok(());
                };
                reactor.protocol.close_window(reactor.display.as_mut(), handle).map(|_| ())
            }
            WmCommand::MoveFloating { dx, dy } => {
                let Some((id, frame)) = Self::floating_target(reactor) else { return Ok(()) };
                let moved = frame.translate(dx, dy);
                let snapped = match reactor.monitors.get(reactor.monitors.for_rect(&moved)) {
                    Some(monitor) => snap_to_edges(moved, monitor.rect, reactor.layout_engine.snap_threshold()),
                    None => moved,
                };
                reactor.set_floating_frame(id, snapped)
            }
            WmCommand::ResizeFloating { dw, dh } => {
                let Some((id, frame)) = Self::floating_target(reactor) else { return Ok(()) };
                reactor.set_floating_frame(id, resize_by(frame, dw, dh))
            }
            WmCommand::AddWorkspace(name) => {
                if name.trim().is_empty() || reactor.workspaces.index_of(&name).is_some() {
                    return Err(WmError::MalformedMessage(format!("cannot add workspace '{name}'")));
                }
                let settings = &reactor.config.workspaces;
                let layout = settings.layout_for(&name, reactor.layout_engine.default_layout());
                let workspace = Workspace::new(name.clone(), WorkspaceLayouts::new(layout), settings.autostart_for(&name));
                reactor.workspaces.add_workspace(workspace);
                Ok(())
            }
            WmCommand::RemoveWorkspace(index) => {
                match reactor.workspaces.remove_workspace(&mut reactor.monitors, &mut reactor.windows, index) {
                    Some(_) => {
                        reactor.relayout()?;
                        reactor.refocus()
                    }
                    None => Err(WmError::MalformedMessage(format!("cannot remove workspace {index}"))),
                }
            }
            WmCommand::RenameWorkspace { index, name } => {
                if reactor.workspaces.rename_workspace(index, name.clone()) {
                    Ok(())
                } else {
                    Err(WmError::MalformedMessage(format!("cannot rename workspace {index} to '{name}'")))
                }
            }
            WmCommand::FocusMonitorNext => {
                reactor.focused_monitor = (reactor.focused_monitor + 1) % reactor.monitors.len().max(1);
                reactor.refocus()
            }
            WmCommand::Spawn(command) => {
                reactor.launcher.launch(&command);
                Ok(())
            }
            WmCommand::SaveSession => {
                reactor.save_session();
                Ok(())
            }
            WmCommand::Quit => {
                info!("quit requested");
                reactor.shutdown = true;
                Ok(())
            }
        }
    }

    /// Moves focus through the current workspace, skipping windows that are
    /// not on screen.
    fn cycle_focus(reactor: &mut Reactor, forward: bool) -> Result<(), WmError> {
        let workspace = reactor.current_workspace();
        let len = reactor.workspaces.get(workspace).map_or(0, Workspace::len);
        for _ in 0..len {
            let next = if forward {
                reactor.workspaces.focus_next(workspace)
            } else {
                reactor.workspaces.focus_prev(workspace)
            };
            let Some(id) = next else { break };
            if reactor.windows.get(id).is_some_and(|w| w.mapped) {
                return reactor.focus_window(id);
            }
        }
        Ok(())
    }

    fn change_layout(reactor: &mut Reactor, change: impl FnOnce(&mut WorkspaceLayouts)) -> Result<(), WmError> {
        let workspace = reactor.current_workspace();
        let Some(ws) = reactor.workspaces.get_mut(workspace) else {
            return Ok(());
        };
        change(&mut ws.layouts);
        debug!(workspace, layout = %ws.layouts.active_kind(), "layout changed");
        reactor.relayout()
    }

    fn tiled_count(reactor: &Reactor) -> usize {
        let Some(ws) = reactor.workspaces.get(reactor.current_workspace()) else {
            return 0;
        };
        ws.windows()
            .iter()
            .filter_map(|&id| reactor.windows.get(id))
            .filter(|w| !w.floating && !w.is_minimized() && !w.is_fullscreen())
            .count()
    }

    fn active(reactor: &Reactor) -> Option<(WindowId, bool, WindowStates)> {
        let id = reactor.active?;
        reactor.windows.get(id).map(|w| (id, w.floating, w.states))
    }

    fn floating_target(reactor: &Reactor) -> Option<(WindowId, Rect)> {
        let id = reactor.active?;
        let window = reactor.windows.get(id)?;
        (window.floating && !window.is_fullscreen()).then_some((id, window.frame))
    }
}
