use tracing::{debug, info};

use crate::common::collections::{HashMap, HashSet};
use crate::layout_engine::{LayoutWindow, WorkspaceLayouts};
use crate::model::monitor::MonitorRegistry;
use crate::model::window::{WindowId, WindowRegistry};
use crate::protocol::WindowStates;

/// A named group of windows. The window order drives focus cycling and
/// layout order.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub layouts: WorkspaceLayouts,
    windows: Vec<WindowId>,
    focus: Option<usize>,
    autostart: Vec<String>,
    /// `(monitor, command)` pairs that already ran.
    autostart_done: HashSet<(usize, String)>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, layouts: WorkspaceLayouts, autostart: Vec<String>) -> Self {
        Workspace {
            name: name.into(),
            layouts,
            windows: Vec::new(),
            focus: None,
            autostart,
            autostart_done: HashSet::default(),
        }
    }

    pub fn windows(&self) -> &[WindowId] { &self.windows }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn contains(&self, id: WindowId) -> bool { self.windows.contains(&id) }

    pub fn focused(&self) -> Option<WindowId> { self.focus.and_then(|i| self.windows.get(i).copied()) }

    pub fn set_focus(&mut self, id: WindowId) -> bool {
        match self.windows.iter().position(|&w| w == id) {
            Some(index) => {
                self.focus = Some(index);
                true
            }
            None => false,
        }
    }

    pub fn focus_next(&mut self) -> Option<WindowId> {
        let n = self.windows.len();
        self.focus = (n > 0).then(|| self.focus.map_or(0, |i| (i + 1) % n));
        self.focused()
    }

    pub fn focus_prev(&mut self) -> Option<WindowId> {
        let n = self.windows.len();
        self.focus = (n > 0).then(|| self.focus.map_or(n - 1, |i| (i + n - 1) % n));
        self.focused()
    }

    fn push(&mut self, id: WindowId) {
        if !self.windows.contains(&id) {
            self.windows.push(id);
        }
        if self.focus.is_none() {
            self.focus = Some(self.windows.len() - 1);
        }
    }

    /// Removes `id`. Focus stays on the same window if another one was
    /// focused; if the focused window goes, its previous neighbour takes over.
    fn remove(&mut self, id: WindowId) -> bool {
        let Some(index) = self.windows.iter().position(|&w| w == id) else {
            return false;
        };
        self.windows.remove(index);
        self.focus = match self.focus {
            _ if self.windows.is_empty() => None,
            Some(f) if index < f => Some(f - 1),
            Some(f) if index == f => Some(f.saturating_sub(1)),
            Some(f) => Some(f.min(self.windows.len() - 1)),
            None => None,
        };
        true
    }

    /// Autostart commands that have not yet run on `monitor`. Marks them as run.
    fn take_autostart(&mut self, monitor: usize) -> Vec<String> {
        let mut pending = Vec::new();
        for command in &self.autostart {
            if self.autostart_done.insert((monitor, command.clone())) {
                pending.push(command.clone());
            }
        }
        pending
    }
}

/// Visibility changes produced by switching a monitor's workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchPlan {
    pub monitor: usize,
    pub from: usize,
    pub to: usize,
    /// The other monitor that was showing `to` and now shows `from`.
    pub swapped_with: Option<usize>,
    pub hide: Vec<WindowId>,
    pub show: Vec<WindowId>,
    pub autostart: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovePlan {
    pub source: usize,
    pub target: usize,
    pub switch: Option<SwitchPlan>,
}

#[derive(Debug, Default)]
pub struct WorkspaceManager {
    workspaces: Vec<Workspace>,
    /// Per monitor, the workspace shown before the current one.
    previous: HashMap<usize, usize>,
}

impl WorkspaceManager {
    pub fn new(workspaces: Vec<Workspace>) -> Self {
        WorkspaceManager { workspaces, previous: HashMap::default() }
    }

    pub fn len(&self) -> usize { self.workspaces.len() }

    pub fn is_empty(&self) -> bool { self.workspaces.is_empty() }

    pub fn get(&self, index: usize) -> Option<&Workspace> { self.workspaces.get(index) }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Workspace> { self.workspaces.get_mut(index) }

    pub fn iter(&self) -> impl Iterator<Item = &Workspace> + '_ { self.workspaces.iter() }

    pub fn names(&self) -> Vec<String> { self.workspaces.iter().map(|w| w.name.clone()).collect() }

    pub fn index_of(&self, name: &str) -> Option<usize> { self.workspaces.iter().position(|w| w.name == name) }

    pub fn focused(&self, workspace: usize) -> Option<WindowId> {
        self.workspaces.get(workspace).and_then(Workspace::focused)
    }

    pub fn focus_next(&mut self, workspace: usize) -> Option<WindowId> {
        self.workspaces.get_mut(workspace).and_then(Workspace::focus_next)
    }

    pub fn focus_prev(&mut self, workspace: usize) -> Option<WindowId> {
        self.workspaces.get_mut(workspace).and_then(Workspace::focus_prev)
    }

    /// Appends `id` to `workspace` and records the assignment on the window.
    pub fn attach(&mut self, registry: &mut WindowRegistry, id: WindowId, workspace: usize) -> bool {
        let (Some(ws), Some(window)) = (self.workspaces.get_mut(workspace), registry.get_mut(id)) else {
            return false;
        };
        window.workspace = workspace;
        ws.push(id);
        ws.layouts.window_added(&LayoutWindow { id, frame: window.frame });
        true
    }

    /// Removes `id` from whichever workspace holds it. Returns that workspace.
    pub fn detach(&mut self, id: WindowId) -> Option<usize> {
        let index = self.workspaces.iter().position(|w| w.contains(id))?;
        let ws = &mut self.workspaces[index];
        ws.remove(id);
        ws.layouts.window_removed(id);
        Some(index)
    }

    /// Windows that should currently be on screen: those of every monitor's
    /// active workspace plus every sticky window. Minimized windows are left
    /// out.
    pub fn visible_windows(&self, monitors: &MonitorRegistry, registry: &WindowRegistry) -> Vec<WindowId> {
        let mut seen = HashSet::default();
        let active = monitors.iter().filter_map(|m| self.workspaces.get(m.active_workspace));
        let sticky = registry.iter().filter(|(_, w)| w.sticky).map(|(id, _)| id);
        active
            .flat_map(|ws| ws.windows.iter().copied())
            .chain(sticky)
            .filter(|&id| registry.get(id).is_some_and(|w| !w.is_minimized()))
            .filter(|&id| seen.insert(id))
            .collect()
    }

    /// Shows `target` on `monitor`. Does nothing if it is already shown there.
    /// A workspace shown on another monitor is swapped with this monitor's.
    pub fn switch(
        &mut self,
        monitors: &mut MonitorRegistry,
        registry: &WindowRegistry,
        monitor: usize,
        target: usize,
    ) -> Option<SwitchPlan> {
        if target >= self.workspaces.len() {
            return None;
        }
        let from = monitors.active_workspace(monitor)?;
        if from == target {
            return None;
        }

        let before = self.visible_windows(monitors, registry);
        let swapped_with = monitors.showing(target).filter(|&other| other != monitor);
        if let Some(other) = swapped_with
            && let Some(m) = monitors.get_mut(other)
        {
            m.active_workspace = from;
        }
        if let Some(m) = monitors.get_mut(monitor) {
            m.active_workspace = target;
        }
        self.previous.insert(monitor, from);
        let after = self.visible_windows(monitors, registry);

        let before_set: HashSet<WindowId> = before.iter().copied().collect();
        let after_set: HashSet<WindowId> = after.iter().copied().collect();
        let mut autostart = self.workspaces[target].take_autostart(monitor);
        if let Some(other) = swapped_with {
            autostart.extend(self.workspaces[from].take_autostart(other));
        }

        info!(monitor, from, to = target, ?swapped_with, "switched workspace");
        Some(SwitchPlan {
            monitor,
            from,
            to: target,
            swapped_with,
            hide: before.into_iter().filter(|id| !after_set.contains(id)).collect(),
            show: after.into_iter().filter(|id| !before_set.contains(id)).collect(),
            autostart,
        })
    }

    /// Switches `monitor` back to the workspace it showed before.
    pub fn switch_last(
        &mut self,
        monitors: &mut MonitorRegistry,
        registry: &WindowRegistry,
        monitor: usize,
    ) -> Option<SwitchPlan> {
        let previous = *self.previous.get(&monitor)?;
        self.switch(monitors, registry, monitor, previous)
    }

    /// Runs any autostart commands of the workspace `monitor` is showing that
    /// have not run there yet.
    pub fn pending_autostart(&mut self, monitors: &MonitorRegistry, monitor: usize) -> Vec<String> {
        monitors
            .active_workspace(monitor)
            .and_then(|ws| self.workspaces.get_mut(ws))
            .map(|ws| ws.take_autostart(monitor))
            .unwrap_or_default()
    }

    /// Moves a window to `target`. With `follow`, `monitor` then switches to
    /// `target` too.
    pub fn move_window(
        &mut self,
        monitors: &mut MonitorRegistry,
        registry: &mut WindowRegistry,
        id: WindowId,
        target: usize,
        follow: bool,
        monitor: usize,
    ) -> Option<MovePlan> {
        if target >= self.workspaces.len() {
            return None;
        }
        let source = registry.get(id)?.workspace;
        if source == target {
            return None;
        }
        let floating_rect = self
            .workspaces
            .get(source)
            .and_then(|ws| ws.layouts.floating())
            .and_then(|f| f.remembered(id));

        self.detach(id);
        self.attach(registry, id, target);
        if let Some(rect) = floating_rect
            && let Some(floating) = self.workspaces[target].layouts.floating_mut()
        {
            floating.remember(id, rect);
        }
        debug!(?id, source, target, follow, "moved window");

        let switch = if follow { self.switch(monitors, registry, monitor, target) } else { None };
        if follow {
            self.workspaces[target].set_focus(id);
        }
        Some(MovePlan { source, target, switch })
    }

    /// Returns whether the window's stickiness changed.
    pub fn set_sticky(&mut self, registry: &mut WindowRegistry, id: WindowId, sticky: bool) -> bool {
        let Some(window) = registry.get_mut(id) else {
            return false;
        };
        if window.sticky == sticky {
            return false;
        }
        window.sticky = sticky;
        window.states.set(WindowStates::STICKY, sticky);
        true
    }

    pub fn add_workspace(&mut self, workspace: Workspace) -> usize {
        info!(name = workspace.name, "added workspace");
        self.workspaces.push(workspace);
        self.workspaces.len() - 1
    }

    pub fn rename_workspace(&mut self, index: usize, name: String) -> bool {
        if name.trim().is_empty() || self.index_of(&name).is_some() {
            return false;
        }
        match self.workspaces.get_mut(index) {
            Some(ws) => {
                ws.name = name;
                true
            }
            None => false,
        }
    }

    /// Deletes a workspace, handing its windows to the previous workspace (or
    /// the next one when removing the first). Every monitor must keep a
    /// workspace of its own, so there always stays at least one per monitor.
    /// Returns the index, after removal, of the workspace that took the windows.
    pub fn remove_workspace(
        &mut self,
        monitors: &mut MonitorRegistry,
        registry: &mut WindowRegistry,
        index: usize,
    ) -> Option<usize> {
        if index >= self.workspaces.len() || self.workspaces.len() <= monitors.len().max(1) {
            return None;
        }
        let heir = if index == 0 { 1 } else { index - 1 };
        let removed = self.workspaces.remove(index);
        let heir = if heir > index { heir - 1 } else { heir };
        let shift = |ws: usize| if ws > index { ws - 1 } else { ws };

        for id in registry.ids() {
            if let Some(w) = registry.get_mut(id)
                && w.workspace != index
            {
                w.workspace = shift(w.workspace);
            }
        }
        for id in removed.windows.iter().copied() {
            self.attach(registry, id, heir);
            if let (Some(rect), Some(floating)) = (
                removed.layouts.floating().and_then(|f| f.remembered(id)),
                self.workspaces[heir].layouts.floating_mut(),
            ) {
                floating.remember(id, rect);
            }
        }

        let shown: Vec<usize> = monitors
            .iter()
            .map(|m| m.active_workspace)
            .filter(|&ws| ws != index)
            .map(shift)
            .collect();
        for i in 0..monitors.len() {
            let Some(m) = monitors.get_mut(i) else { continue };
            if m.active_workspace == index {
                m.active_workspace = if shown.contains(&heir) {
                    (0..self.workspaces.len()).find(|ws| !shown.contains(ws)).unwrap_or(heir)
                } else {
                    heir
                };
            } else {
                m.active_workspace = shift(m.active_workspace);
            }
        }
        self.previous = self
            .previous
            .iter()
            .filter(|&(_, &ws)| ws != index)
            .map(|(&m, &ws)| (m, shift(ws)))
            .collect();

        info!(name = removed.name, heir, "removed workspace");
        Some(heir)
    }
}
