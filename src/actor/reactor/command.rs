use serde::{Deserialize, Serialize};

use crate::common::collections::HashMap;
use crate::layout_engine::LayoutKind;
use crate::sys::keys::KeyChord;

/// Operations the keybinding layer can invoke on the reactor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WmCommand {
    FocusNext,
    FocusPrev,
    SwitchWorkspace(usize),
    SwitchLastWorkspace,
    MoveToWorkspace {
        workspace: usize,
        #[serde(default)]
        follow: bool,
    },
    NextLayout,
    PrevLayout,
    SetLayout(LayoutKind),
    NextTab,
    PrevTab,
    ToggleFloating,
    ToggleSticky,
    ToggleFullscreen,
    ToggleMaximize,
    CloseWindow,
    MoveFloating { dx: i32, dy: i32 },
    ResizeFloating { dw: i32, dh: i32 },
    AddWorkspace(String),
    RemoveWorkspace(usize),
    RenameWorkspace { index: usize, name: String },
    FocusMonitorNext,
    Spawn(String),
    SaveSession,
    Quit,
}

impl WmCommand {
    /// The workspace index the command refers to, if any.
    pub fn workspace_index(&self) -> Option<usize> {
        match self {
            WmCommand::SwitchWorkspace(index)
            | WmCommand::MoveToWorkspace { workspace: index, .. }
            | WmCommand::RemoveWorkspace(index)
            | WmCommand::RenameWorkspace { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Maps key chords to commands.
pub trait KeyHandler {
    fn command_for(&self, chord: &KeyChord) -> Option<WmCommand>;

    /// Every chord that has to be grabbed.
    fn chords(&self) -> Vec<KeyChord>;
}

#[derive(Debug, Default)]
pub struct KeyBindings {
    bindings: HashMap<KeyChord, WmCommand>,
}

impl KeyBindings {
    pub fn new(keys: &[(KeyChord, WmCommand)]) -> Self {
        KeyBindings {
            bindings: keys.iter().cloned().collect(),
        }
    }
}

impl KeyHandler for KeyBindings {
    fn command_for(&self, chord: &KeyChord) -> Option<WmCommand> { self.bindings.get(chord).cloned() }

    fn chords(&self) -> Vec<KeyChord> {
        let mut chords: Vec<_> = self.bindings.keys().copied().collect();
        chords.sort_by_key(|c| (c.keysym, c.modifiers.bits()));
        chords
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::keys::ModMask;

    #[test]
    fn parses_every_argument_shape() {
        #[derive(Deserialize)]
        struct Table {
            commands: Vec<WmCommand>,
        }
        let table: Table = toml::from_str(
            r#"
            commands = [
                "quit",
                { switch_workspace = 3 },
                { move_to_workspace = { workspace = 2 } },
                { set_layout = "bsp" },
                { resize_floating = { dw = -10, dh = 5 } },
                { rename_workspace = { index = 0, name = "web" } },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(
            table.commands,
            vec![
                WmCommand::Quit,
                WmCommand::SwitchWorkspace(3),
                WmCommand::MoveToWorkspace { workspace: 2, follow: false },
                WmCommand::SetLayout(LayoutKind::Bsp),
                WmCommand::ResizeFloating { dw: -10, dh: 5 },
                WmCommand::RenameWorkspace { index: 0, name: "web".into() },
            ]
        );
    }

    #[test]
    fn workspace_index_covers_indexed_commands() {
        assert_eq!(WmCommand::SwitchWorkspace(4).workspace_index(), Some(4));
        assert_eq!(WmCommand::RemoveWorkspace(1).workspace_index(), Some(1));
        assert_eq!(WmCommand::FocusNext.workspace_index(), None);
    }

    #[test]
    fn bindings_look_up_commands() {
        let chord = KeyChord::new(ModMask::MOD4, 0x6a);
        let bindings = KeyBindings::new(&[(chord, WmCommand::FocusNext)]);
        assert_eq!(bindings.command_for(&chord), Some(WmCommand::FocusNext));
        assert_eq!(bindings.command_for(&KeyChord::new(ModMask::MOD1, 0x6a)), None);
        assert_eq!(bindings.chords(), vec![chord]);
    }
}
