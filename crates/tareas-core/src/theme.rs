use tracing::info;

use crate::bridge::{PersistenceBridge, THEME_KEY};
use crate::datastore::KeyValueStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn is_dark(&self) -> bool {
        matches!(self, Self::Dark)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

pub fn load_theme<K: KeyValueStore>(bridge: &PersistenceBridge<K>) -> ThemeMode {
    if bridge.read_flag(THEME_KEY) {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

pub fn toggle_theme<K: KeyValueStore>(bridge: &mut PersistenceBridge<K>) -> anyhow::Result<ThemeMode> {
    let next = load_theme(bridge).toggled();
    bridge.write_flag(THEME_KEY, next.is_dark())?;
    info!(theme = next.label(), "theme toggled");
    Ok(next)
}
