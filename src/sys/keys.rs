use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use bitflags::bitflags;

pub type Keysym = u32;

bitflags! {
    /// X11 modifier bits, as found in key and button event state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

impl ModMask {
    /// Caps lock and num lock never distinguish one binding from another.
    pub const IGNORED: ModMask = ModMask::LOCK.union(ModMask::MOD2);

    /// Every combination of ignored modifiers a grab has to cover.
    pub const IGNORED_COMBINATIONS: [ModMask; 4] =
        [ModMask::empty(), ModMask::LOCK, ModMask::MOD2, ModMask::IGNORED];

    pub fn from_event_state(state: u16) -> ModMask { ModMask::from_bits_truncate(state) }

    pub fn clean(self) -> ModMask { self.difference(ModMask::IGNORED) }

    pub fn from_modifier_name(name: &str) -> Option<ModMask> {
        Some(match name.to_lowercase().as_str() {
            "shift" => ModMask::SHIFT,
            "lock" => ModMask::LOCK,
            "ctrl" | "control" => ModMask::CONTROL,
            "alt" | "mod1" => ModMask::MOD1,
            "mod2" => ModMask::MOD2,
            "mod3" => ModMask::MOD3,
            "super" | "win" | "mod4" => ModMask::MOD4,
            "mod5" => ModMask::MOD5,
            _ => return None,
        })
    }
}

/// A modifier set plus a keysym, e.g. `Mod4+Shift+Return`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub modifiers: ModMask,
    pub keysym: Keysym,
}

impl KeyChord {
    pub fn new(modifiers: ModMask, keysym: Keysym) -> KeyChord {
        KeyChord { modifiers: modifiers.clean(), keysym }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, _) in self.modifiers.iter_names() {
            write!(f, "{}+", name.to_lowercase())?;
        }
        write!(f, "{:#x}", self.keysym)
    }
}

impl FromStr for KeyChord {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
        let Some((key, mods)) = parts.split_last() else {
            bail!("empty key binding");
        };

        let mut modifiers = ModMask::empty();
        for part in mods {
            match ModMask::from_modifier_name(part) {
                Some(m) => modifiers |= m,
                None => bail!("unknown modifier '{part}' in key binding '{s}'"),
            }
        }
        let Some(keysym) = keysym_from_name(key) else {
            bail!("unknown key '{key}' in key binding '{s}'");
        };
        Ok(KeyChord::new(modifiers, keysym))
    }
}

/// Resolves an X keysym name. Letters resolve to their lowercase keysym,
/// which is what the first column of the keyboard mapping reports.
pub fn keysym_from_name(name: &str) -> Option<Keysym> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        if c.is_ascii_alphabetic() {
            return Some(c.to_ascii_lowercase() as Keysym);
        }
        if c.is_ascii_digit() {
            return Some(c as Keysym);
        }
    }

    if let Some(n) = name.strip_prefix(['F', 'f']).and_then(|n| n.parse::<u32>().ok()) {
        return (1..=24).contains(&n).then(|| 0xffbd + n);
    }

    Some(match name.to_lowercase().as_str() {
        "return" | "enter" => 0xff0d,
        "tab" => 0xff09,
        "escape" | "esc" => 0xff1b,
        "space" => 0x0020,
        "backspace" => 0xff08,
        "delete" => 0xffff,
        "insert" => 0xff63,
        "home" => 0xff50,
        "end" => 0xff57,
        "left" => 0xff51,
        "up" => 0xff52,
        "right" => 0xff53,
        "down" => 0xff54,
        "prior" | "page_up" => 0xff55,
        "next" | "page_down" => 0xff56,
        "print" => 0xff61,
        "comma" => 0x002c,
        "period" => 0x002e,
        "minus" => 0x002d,
        "equal" => 0x003d,
        "slash" => 0x002f,
        "backslash" => 0x005c,
        "semicolon" => 0x003b,
        "apostrophe" => 0x0027,
        "grave" => 0x0060,
        "bracketleft" => 0x005b,
        "bracketright" => 0x005d,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn parses_modifiers_and_letters() {
        let chord: KeyChord = "Mod4+Shift+J".parse().unwrap();
        assert_eq!(chord.modifiers, ModMask::MOD4 | ModMask::SHIFT);
        assert_eq!(chord.keysym, 'j' as u32);
    }

    #[test]
    fn parses_named_keys() {
        assert_eq!("super+Return".parse::<KeyChord>().unwrap().keysym, 0xff0d);
        assert_eq!("Mod1+F1".parse::<KeyChord>().unwrap().keysym, 0xffbe);
        assert_eq!("Mod1+F12".parse::<KeyChord>().unwrap().keysym, 0xffc9);
        assert_eq!("Mod4+1".parse::<KeyChord>().unwrap().keysym, '1' as u32);
    }

    #[test]
    fn rejects_unknown_parts() {
        assert!("Hyper+j".parse::<KeyChord>().is_err());
        assert!("Mod4+nosuchkey".parse::<KeyChord>().is_err());
        assert!("".parse::<KeyChord>().is_err());
    }

    #[test]
    fn modifier_names_are_case_insensitive() {
        assert_eq!(ModMask::from_modifier_name("Super"), Some(ModMask::MOD4));
        assert_eq!(ModMask::from_modifier_name("ctrl"), Some(ModMask::CONTROL));
        assert_eq!(ModMask::from_modifier_name("hyper"), None);
    }

    #[test]
    fn lock_modifiers_are_ignored() {
        let state = ModMask::MOD4 | ModMask::LOCK | ModMask::MOD2;
        assert_eq!(state.clean(), ModMask::MOD4);
        assert_eq!(ModMask::from_event_state(0x140), ModMask::MOD4);
    }
}
