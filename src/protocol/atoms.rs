use crate::actor::reactor::WmError;
use crate::sys::display::{Atom, DisplayServer};

macro_rules! atoms {
    ($($field:ident => $name:literal,)*) => {
        /// Every atom the window manager uses, interned once at startup.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct Atoms {
            $(pub $field: Atom,)*
        }

        impl Atoms {
            pub const NAMES: &'static [&'static str] = &[$($name,)*];

            /// Interns all atoms in a single round trip.
            pub fn intern(display: &mut dyn DisplayServer) -> Result<Atoms, WmError> {
                let ids = display.intern_atoms(Self::NAMES)?;
                if ids.len() != Self::NAMES.len() {
                    return Err(WmError::MalformedMessage(format!(
                        "interned {} atoms, expected {}",
                        ids.len(),
                        Self::NAMES.len()
                    )));
                }
                let mut ids = ids.into_iter();
                Ok(Atoms { $($field: ids.next().unwrap_or_default(),)* })
            }

            pub fn name_of(&self, atom: Atom) -> Option<&'static str> {
                $(if atom == self.$field { return Some($name); })*
                None
            }
        }
    };
}

atoms! {
    wm_protocols => "WM_PROTOCOLS",
    wm_delete_window => "WM_DELETE_WINDOW",
    wm_state => "WM_STATE",
    wm_name => "WM_NAME",
    wm_class => "WM_CLASS",
    wm_window_role => "WM_WINDOW_ROLE",
    wm_transient_for => "WM_TRANSIENT_FOR",
    utf8_string => "UTF8_STRING",
    net_supported => "_NET_SUPPORTED",
    net_supporting_wm_check => "_NET_SUPPORTING_WM_CHECK",
    net_wm_name => "_NET_WM_NAME",
    net_client_list => "_NET_CLIENT_LIST",
    net_active_window => "_NET_ACTIVE_WINDOW",
    net_number_of_desktops => "_NET_NUMBER_OF_DESKTOPS",
    net_current_desktop => "_NET_CURRENT_DESKTOP",
    net_desktop_names => "_NET_DESKTOP_NAMES",
    net_desktop_viewport => "_NET_DESKTOP_VIEWPORT",
    net_wm_desktop => "_NET_WM_DESKTOP",
    net_close_window => "_NET_CLOSE_WINDOW",
    net_wm_ping => "_NET_WM_PING",
    net_wm_state => "_NET_WM_STATE",
    net_wm_state_fullscreen => "_NET_WM_STATE_FULLSCREEN",
    net_wm_state_maximized_horz => "_NET_WM_STATE_MAXIMIZED_HORZ",
    net_wm_state_maximized_vert => "_NET_WM_STATE_MAXIMIZED_VERT",
    net_wm_state_skip_taskbar => "_NET_WM_STATE_SKIP_TASKBAR",
    net_wm_state_above => "_NET_WM_STATE_ABOVE",
    net_wm_state_hidden => "_NET_WM_STATE_HIDDEN",
    net_wm_state_sticky => "_NET_WM_STATE_STICKY",
    net_wm_window_type => "_NET_WM_WINDOW_TYPE",
    net_wm_window_type_dock => "_NET_WM_WINDOW_TYPE_DOCK",
    net_wm_window_type_dialog => "_NET_WM_WINDOW_TYPE_DIALOG",
    net_wm_window_type_utility => "_NET_WM_WINDOW_TYPE_UTILITY",
    net_wm_window_type_splash => "_NET_WM_WINDOW_TYPE_SPLASH",
    net_wm_window_type_toolbar => "_NET_WM_WINDOW_TYPE_TOOLBAR",
    net_wm_window_type_menu => "_NET_WM_WINDOW_TYPE_MENU",
}

impl Atoms {
    /// Atoms advertised in `_NET_SUPPORTED`.
    pub fn supported(&self) -> Vec<Atom> {
        vec![
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_wm_name,
            self.net_client_list,
            self.net_active_window,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_desktop_names,
            self.net_desktop_viewport,
            self.net_wm_desktop,
            self.net_close_window,
            self.net_wm_ping,
            self.net_wm_state,
            self.net_wm_state_fullscreen,
            self.net_wm_state_maximized_horz,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_skip_taskbar,
            self.net_wm_state_above,
            self.net_wm_state_hidden,
            self.net_wm_state_sticky,
            self.net_wm_window_type,
            self.net_wm_window_type_dock,
            self.net_wm_window_type_dialog,
            self.net_wm_window_type_utility,
            self.net_wm_window_type_splash,
            self.net_wm_window_type_toolbar,
            self.net_wm_window_type_menu,
        ]
    }

    /// Window types that float by default.
    pub fn floating_types(&self) -> [Atom; 5] {
        [
            self.net_wm_window_type_dialog,
            self.net_wm_window_type_utility,
            self.net_wm_window_type_splash,
            self.net_wm_window_type_toolbar,
            self.net_wm_window_type_menu,
        ]
    }
}
