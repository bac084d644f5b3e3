use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::sys::display::OutputInfo;
use crate::sys::geometry::Rect;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub name: String,
    pub rect: Rect,
    pub primary: bool,
    pub active_workspace: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorRegistry {
    monitors: Vec<Monitor>,
}

impl MonitorRegistry {
    /// Builds monitors from probed outputs. No outputs means a single monitor
    /// covering `fallback`. Monitor `i` starts on workspace `i`.
    pub fn from_outputs(outputs: Vec<OutputInfo>, fallback: Rect) -> Self {
        let monitors = Self::normalize(outputs, fallback)
            .into_iter()
            .enumerate()
            .map(|(i, o)| Monitor { name: o.name, rect: o.rect, primary: o.primary, active_workspace: i })
            .collect();
        MonitorRegistry { monitors }
    }

    fn normalize(outputs: Vec<OutputInfo>, fallback: Rect) -> Vec<OutputInfo> {
        let mut outputs: Vec<OutputInfo> = outputs.into_iter().filter(|o| !o.rect.is_empty()).collect();
        if outputs.is_empty() {
            warn!(%fallback, "no usable outputs, using the whole screen as one monitor");
            return vec![OutputInfo { name: "default".into(), rect: fallback, primary: true }];
        }
        if !outputs.iter().any(|o| o.primary) {
            outputs[0].primary = true;
        }
        outputs
    }

    /// Replaces the monitor set after a hotplug. Monitors keep their active
    /// workspace by index; new monitors get the first workspace that is not
    /// shown anywhere, if any. Returns whether anything changed.
    pub fn update(&mut self, outputs: Vec<OutputInfo>, fallback: Rect, workspace_count: usize) -> bool {
        let outputs = Self::normalize(outputs, fallback);
        let unchanged = outputs.len() == self.monitors.len()
            && outputs
                .iter()
                .zip(&self.monitors)
                .all(|(o, m)| o.rect == m.rect && o.name == m.name && o.primary == m.primary);
        if unchanged {
            return false;
        }

        let mut monitors: Vec<Monitor> = Vec::with_capacity(outputs.len());
        for (i, o) in outputs.into_iter().enumerate() {
            let active = match self.monitors.get(i) {
                Some(previous) => previous.active_workspace,
                None => (0..workspace_count)
                    .find(|ws| {
                        !monitors.iter().any(|m| m.active_workspace == *ws)
                            && !self.monitors.iter().any(|m| m.active_workspace == *ws)
                    })
                    .unwrap_or(0),
            };
            monitors.push(Monitor { name: o.name, rect: o.rect, primary: o.primary, active_workspace: active });
        }
        info!(count = monitors.len(), "monitor configuration changed");
        self.monitors = monitors;
        true
    }

    pub fn len(&self) -> usize { self.monitors.len() }

    pub fn is_empty(&self) -> bool { self.monitors.is_empty() }

    pub fn get(&self, index: usize) -> Option<&Monitor> { self.monitors.get(index) }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Monitor> { self.monitors.get_mut(index) }

    pub fn iter(&self) -> impl Iterator<Item = &Monitor> + '_ { self.monitors.iter() }

    pub fn primary_index(&self) -> usize { self.monitors.iter().position(|m| m.primary).unwrap_or(0) }

    pub fn active_workspace(&self, index: usize) -> Option<usize> {
        self.monitors.get(index).map(|m| m.active_workspace)
    }

    /// The monitor showing `workspace`, if any.
    pub fn showing(&self, workspace: usize) -> Option<usize> {
        self.monitors.iter().position(|m| m.active_workspace == workspace)
    }

    pub fn at_point(&self, x: i32, y: i32) -> Option<usize> {
        self.monitors.iter().position(|m| m.rect.contains_point(x, y))
    }

    /// The monitor sharing the most area with `rect`, or the primary one.
    pub fn for_rect(&self, rect: &Rect) -> usize {
        self.monitors
            .iter()
            .enumerate()
            .map(|(i, m)| (i, m.rect.intersection_area(rect)))
            .filter(|&(_, area)| area > 0)
            .max_by_key(|&(i, area)| (area, std::cmp::Reverse(i)))
            .map_or_else(|| self.primary_index(), |(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn output(name: &str, rect: Rect, primary: bool) -> OutputInfo {
        OutputInfo { name: name.into(), rect, primary }
    }

    const LEFT: Rect = Rect::new(0, 0, 1920, 1080);
    const RIGHT: Rect = Rect::new(1920, 0, 1280, 1024);

    #[test]
    fn falls_back_to_the_whole_screen() {
        let monitors = MonitorRegistry::from_outputs(Vec::new(), LEFT);
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors.get(0).unwrap().rect, LEFT);
        assert!(monitors.get(0).unwrap().primary);
    }

    #[test]
    fn monitors_start_on_distinct_workspaces() {
        let monitors = MonitorRegistry::from_outputs(
            vec![output("DP-1", LEFT, false), output("HDMI-1", RIGHT, true)],
            LEFT,
        );
        assert_eq!(monitors.active_workspace(0), Some(0));
        assert_eq!(monitors.active_workspace(1), Some(1));
        assert_eq!(monitors.primary_index(), 1);
        assert_eq!(monitors.showing(1), Some(1));
    }

    #[test]
    fn finds_monitors_by_point_and_overlap() {
        let monitors =
            MonitorRegistry::from_outputs(vec![output("a", LEFT, true), output("b", RIGHT, false)], LEFT);
        assert_eq!(monitors.at_point(1919, 10), Some(0));
        assert_eq!(monitors.at_point(1920, 10), Some(1));
        assert_eq!(monitors.at_point(-1, 10), None);
        assert_eq!(monitors.for_rect(&Rect::new(1800, 0, 400, 300)), 1);
        assert_eq!(monitors.for_rect(&Rect::new(-900, 0, 100, 100)), 0);
    }

    #[test]
    fn hotplug_preserves_active_workspaces() {
        let mut monitors = MonitorRegistry::from_outputs(vec![output("a", LEFT, true)], LEFT);
        monitors.get_mut(0).unwrap().active_workspace = 3;
        assert!(!monitors.update(vec![output("a", LEFT, true)], LEFT, 9));

        assert!(monitors.update(vec![output("a", LEFT, true), output("b", RIGHT, false)], LEFT, 9));
        assert_eq!(monitors.active_workspace(0), Some(3));
        assert_eq!(monitors.active_workspace(1), Some(0));

        assert!(monitors.update(Vec::new(), LEFT, 9));
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors.active_workspace(0), Some(3));
    }
}
