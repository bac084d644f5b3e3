use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actor::reactor::WmCommand;
use crate::common::collections::BTreeMap;
use crate::layout_engine::LayoutKind;
use crate::sys::keys::{KeyChord, ModMask};

const MAX_WORKSPACES: usize = 32;
const MAX_BUTTON: u8 = 5;

pub fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config")).join("strata")
}
pub fn config_file() -> PathBuf { config_dir().join("strata.toml") }
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".local/share")).join("strata")
}
pub fn session_file() -> PathBuf { data_dir().join("session.ron") }

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmartGaps {
    #[default]
    Off,
    /// No gaps at all while a workspace shows a single tiled window.
    SingleWindow,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct GapSettings {
    #[serde(default)]
    pub inner: i32,
    #[serde(default)]
    pub outer: i32,
    #[serde(default)]
    pub smart: SmartGaps,
}

impl GapSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.inner < 0 {
            issues.push(format!("gaps.inner must be non-negative, got {}", self.inner));
        }
        if self.outer < 0 {
            issues.push(format!("gaps.outer must be non-negative, got {}", self.outer));
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;
        if self.inner < 0 {
            self.inner = 0;
            fixes += 1;
        }
        if self.outer < 0 {
            self.outer = 0;
            fixes += 1;
        }
        fixes
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_snap_threshold")]
    pub snap_threshold: i32,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default)]
    pub default_layout: LayoutKind,
    #[serde(default = "yes")]
    pub focus_new_windows: bool,
    #[serde(default)]
    pub gaps: GapSettings,
    #[serde(default = "default_drag_modifier")]
    pub drag_modifier: String,
    #[serde(default = "default_move_button")]
    pub move_button: u8,
    #[serde(default = "default_resize_button")]
    pub resize_button: u8,
    /// Zero disables the poller; randr notifications still apply.
    #[serde(default)]
    pub monitor_poll_interval_ms: u64,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            snap_threshold: default_snap_threshold(),
            border_width: default_border_width(),
            default_layout: LayoutKind::default(),
            focus_new_windows: true,
            gaps: GapSettings::default(),
            drag_modifier: default_drag_modifier(),
            move_button: default_move_button(),
            resize_button: default_resize_button(),
            monitor_poll_interval_ms: 0,
            session_file: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.gaps.validate();
        if self.snap_threshold < 0 {
            issues.push(format!("snap_threshold must be non-negative, got {}", self.snap_threshold));
        }
        if self.drag_modifier_mask().is_none() {
            issues.push(format!("unknown drag_modifier '{}'", self.drag_modifier));
        }
        for (name, button) in [("move_button", self.move_button), ("resize_button", self.resize_button)]
        {
            if !(1..=MAX_BUTTON).contains(&button) {
                issues.push(format!("{name} must be between 1 and {MAX_BUTTON}, got {button}"));
            }
        }
        if self.move_button == self.resize_button {
            issues.push("move_button and resize_button must differ".to_string());
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = self.gaps.auto_fix_values();
        if self.snap_threshold < 0 {
            self.snap_threshold = 0;
            fixes += 1;
        }
        fixes
    }

    pub fn drag_modifier_mask(&self) -> Option<ModMask> {
        let mut mask = ModMask::empty();
        for part in self.drag_modifier.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            mask |= ModMask::from_modifier_name(part)?;
        }
        Some(mask)
    }

    pub fn session_path(&self) -> PathBuf { self.session_file.clone().unwrap_or_else(session_file) }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    #[serde(default = "default_workspace_names")]
    pub names: Vec<String>,
    /// Initial layout per workspace name.
    #[serde(default)]
    pub layouts: BTreeMap<String, LayoutKind>,
    /// Commands launched the first time a workspace becomes visible on a
    /// monitor.
    #[serde(default)]
    pub autostart: BTreeMap<String, Vec<String>>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        WorkspaceSettings {
            names: default_workspace_names(),
            layouts: BTreeMap::new(),
            autostart: BTreeMap::new(),
        }
    }
}

impl WorkspaceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.names.is_empty() {
            issues.push("at least one workspace name is required".to_string());
        }
        if self.names.len() > MAX_WORKSPACES {
            issues.push(format!("no more than {MAX_WORKSPACES} workspaces are supported"));
        }
        let mut seen = crate::common::collections::HashSet::default();
        for name in &self.names {
            if name.trim().is_empty() {
                issues.push("workspace names must not be blank".to_string());
            } else if !seen.insert(name.as_str()) {
                issues.push(format!("duplicate workspace name '{name}'"));
            }
        }
        for name in self.layouts.keys().chain(self.autostart.keys()) {
            if !self.names.contains(name) {
                issues.push(format!("settings given for unknown workspace '{name}'"));
            }
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        if self.names.is_empty() {
            self.names = default_workspace_names();
            return 1;
        }
        0
    }

    pub fn layout_for(&self, name: &str, fallback: LayoutKind) -> LayoutKind {
        self.layouts.get(name).copied().unwrap_or(fallback)
    }

    pub fn autostart_for(&self, name: &str) -> Vec<String> {
        self.autostart.get(name).cloned().unwrap_or_default()
    }
}

/// Matches windows by regex on their properties. A rule with no matchers
/// never matches.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct WindowRule {
    pub class: Option<String>,
    pub instance: Option<String>,
    pub role: Option<String>,
    pub title: Option<String>,
    #[serde(default = "yes")]
    pub floating: bool,
    #[serde(default)]
    pub sticky: bool,
    /// Name of the workspace the window is sent to.
    pub workspace: Option<String>,
}

impl WindowRule {
    pub fn validate(&self, index: usize, workspaces: &WorkspaceSettings) -> Vec<String> {
        let mut issues = Vec::new();
        let patterns = [&self.class, &self.instance, &self.role, &self.title];
        if patterns.iter().all(|p| p.is_none()) {
            issues.push(format!("floating rule {index} has no class, instance, role or title"));
        }
        for pattern in patterns.into_iter().flatten() {
            if let Err(err) = regex::Regex::new(pattern) {
                issues.push(format!("floating rule {index}: bad pattern '{pattern}': {err}"));
            }
        }
        if let Some(ws) = &self.workspace
            && !workspaces.names.contains(ws)
        {
            issues.push(format!("floating rule {index} references unknown workspace '{ws}'"));
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    workspaces: WorkspaceSettings,
    #[serde(default)]
    floating_rules: Vec<WindowRule>,
    #[serde(default)]
    modifier_combinations: BTreeMap<String, String>,
    #[serde(default)]
    keys: BTreeMap<String, WmCommand>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub workspaces: WorkspaceSettings,
    pub floating_rules: Vec<WindowRule>,
    pub keys: Vec<(KeyChord, WmCommand)>,
}

fn yes() -> bool { true }

fn default_snap_threshold() -> i32 { 16 }

fn default_border_width() -> u32 { 1 }

fn default_drag_modifier() -> String { "Mod4".to_string() }

fn default_move_button() -> u8 { 1 }

fn default_resize_button() -> u8 { 3 }

fn default_workspace_names() -> Vec<String> { (1..=9).map(|i| i.to_string()).collect() }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    /// Reads and validates a config file. Any validation issue is fatal.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config = Self::read(path).map_err(|err| ConfigError::Load {
            path: path.to_path_buf(),
            message: format!("{err:#}"),
        })?;
        config.check()?;
        Ok(config)
    }

    pub fn default() -> Config {
        Self::parse(include_str!("../../strata.default.toml")).expect("strata.default.toml is a valid configuration")
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        let issues = self.validate();
        if issues.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(issues)) }
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.settings.validate();
        issues.extend(self.workspaces.validate());
        for (index, rule) in self.floating_rules.iter().enumerate() {
            issues.extend(rule.validate(index, &self.workspaces));
        }
        for (chord, command) in &self.keys {
            if let Some(index) = command.workspace_index()
                && index >= self.workspaces.names.len()
            {
                issues.push(format!("binding {chord} targets missing workspace {index}"));
            }
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        self.settings.auto_fix_values() + self.workspaces.auto_fix_values()
    }

    fn expand_modifier_combinations(key: &str, combinations: &BTreeMap<String, String>) -> String {
        match key.split_once('+') {
            Some((head, rest)) => match combinations.get(head.trim()) {
                Some(expanded) => format!("{expanded}+{rest}"),
                None => key.to_string(),
            },
            None => key.to_string(),
        }
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let c: ConfigFile = toml::from_str(buf)?;
        let mut keys = Vec::with_capacity(c.keys.len());
        for (key, cmd) in c.keys {
            let expanded = Self::expand_modifier_combinations(&key, &c.modifier_combinations);
            let Ok(chord) = KeyChord::from_str(&expanded) else {
                bail!("Could not parse key binding: {key}");
            };
            keys.push((chord, cmd));
        }
        Ok(Config {
            settings: c.settings,
            workspaces: c.workspaces,
            floating_rules: c.floating_rules,
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn default_config_parses_and_validates() {
        let config = Config::default();
        assert_eq!(config.validate(), Vec::<String>::new());
        assert_eq!(config.workspaces.names.len(), 9);
        assert_eq!(config.settings.drag_modifier_mask(), Some(ModMask::MOD4));
        assert_eq!(config.workspaces.layout_for("9", LayoutKind::Bsp), LayoutKind::Floating);
        assert_eq!(config.workspaces.layout_for("1", LayoutKind::Bsp), LayoutKind::Bsp);
    }

    #[test]
    fn expands_modifier_combinations() {
        let mut combinations = BTreeMap::new();
        combinations.insert("mod".to_string(), "Mod4+Shift".to_string());
        assert_eq!(Config::expand_modifier_combinations("mod+j", &combinations), "Mod4+Shift+j");
        assert_eq!(Config::expand_modifier_combinations("Mod1+j", &combinations), "Mod1+j");
    }

    #[test]
    fn parses_key_bindings_with_arguments() {
        let config = Config::parse(
            r#"
            [keys]
            "Mod4+Return" = { spawn = "xterm -e htop" }
            "Mod4+Shift+2" = { move_to_workspace = { workspace = 1, follow = true } }
            "Mod4+j" = "focus_next"
            "#,
        )
        .unwrap();
        let commands: Vec<_> = config.keys.iter().map(|(_, c)| c.clone()).collect();
        assert!(commands.contains(&WmCommand::Spawn("xterm -e htop".into())));
        assert!(commands.contains(&WmCommand::MoveToWorkspace { workspace: 1, follow: true }));
        assert!(commands.contains(&WmCommand::FocusNext));
    }

    #[test]
    fn rejects_unknown_fields_and_bad_keys() {
        assert!(Config::parse("[settings]\nnot_a_setting = 1\n").is_err());
        assert!(Config::parse("[keys]\n\"Hyper+j\" = \"focus_next\"\n").is_err());
    }

    #[test]
    fn validation_reports_every_issue() {
        let config = Config::parse(
            r#"
            [settings]
            snap_threshold = -1
            drag_modifier = "Hyper"
            move_button = 3
            resize_button = 3

            [workspaces]
            names = ["a", "a"]

            [[floating_rules]]
            workspace = "nowhere"

            [keys]
            "Mod4+9" = { switch_workspace = 8 }
            "#,
        )
        .unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 7, "{issues:#?}");
        assert!(matches!(config.check(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn auto_fix_clamps_negative_values() {
        let mut config = Config::default();
        config.settings.gaps.inner = -4;
        config.settings.snap_threshold = -2;
        assert_eq!(config.auto_fix_values(), 2);
        assert_eq!(config.settings.gaps.inner, 0);
        assert_eq!(config.settings.snap_threshold, 0);
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        match Config::load(&path) {
            Err(err @ ConfigError::Load { .. }) => {
                assert!(err.to_string().starts_with(&format!("could not load {}: ", path.display())), "{err}");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let good = dir.path().join("strata.toml");
        std::fs::write(&good, "[settings]\nborder_width = 3\n").unwrap();
        assert_eq!(Config::load(&good).unwrap().settings.border_width, 3);
    }
}
