use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::collections::BTreeMap;
use crate::model::window::WindowRegistry;
use crate::sys::geometry::Rect;

/// Where a window was when the session was saved.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedWindow {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub workspace: usize,
    pub floating: bool,
}

impl SavedWindow {
    pub fn frame(&self) -> Rect { Rect::new(self.x, self.y, self.width, self.height) }
}

/// Window placements keyed by [`WindowProps::identity`].
///
/// [`WindowProps::identity`]: crate::model::WindowProps::identity
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Session {
    windows: BTreeMap<String, SavedWindow>,
}

impl Session {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(ron::from_str(&buf)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        File::create(path)?.write_all(text.as_bytes())?;
        debug!(path = %path.display(), windows = self.windows.len(), "saved session");
        Ok(())
    }

    /// Snapshot of every managed window. Windows sharing an identity keep
    /// the first one registered.
    pub fn capture(registry: &WindowRegistry) -> Self {
        let mut windows = BTreeMap::new();
        for (_, window) in registry.iter() {
            let f = window.frame;
            windows.entry(window.props.identity()).or_insert(SavedWindow {
                x: f.x,
                y: f.y,
                width: f.width,
                height: f.height,
                workspace: window.workspace,
                floating: window.floating,
            });
        }
        Session { windows }
    }

    pub fn get(&self, identity: &str) -> Option<&SavedWindow> { self.windows.get(identity) }

    /// Removes and returns the entry, so that a second window with the same
    /// identity is placed normally.
    pub fn take(&mut self, identity: &str) -> Option<SavedWindow> { self.windows.remove(identity) }

    pub fn insert(&mut self, identity: String, saved: SavedWindow) { self.windows.insert(identity, saved); }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }
}
