use thiserror::Error;

use crate::hotkeys::GlobalSlot;
use crate::keys::HotkeyCombo;
use crate::registry::Pid;



# [ derive (Error, Debug, Clone, PartialEq, Eq) ]
pub enum HotkeyError {

    #[error("hotkey {combo} could not be registered for {slot} (already claimed by another application?)")]
    Conflict { slot: SlotLabel, combo: HotkeyCombo },

    #[error("no tracked window belongs to process {0}")]
    UnknownWindow (Pid),
}


/// Which logical binding a registration failure belongs to
# [ derive (Debug, Clone, Copy, PartialEq, Eq) ]
pub enum SlotLabel {
    Global (GlobalSlot),
    Window (Pid),
}

impl std::fmt::Display for SlotLabel {
    fn fmt (&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotLabel::Global (slot) => write! (f, "the {} hotkey", slot.as_ref()),
            SlotLabel::Window (pid)  => write! (f, "window of process {}", pid),
        }
    }
}



# [ derive (Error, Debug, Clone, PartialEq, Eq) ]
pub enum ComboParseError {

    #[error("empty hotkey string")]
    Empty,

    #[error("unknown modifier: {0:?}")]
    UnknownModifier (String),

    #[error("unknown key: {0:?}")]
    UnknownKey (String),

    #[error("hotkey needs a non-modifier key")]
    ModifierOnly,
}



# [ derive (Error, Debug) ]
pub enum SettingsError {

    #[error("settings io failure: {0}")]
    Io (#[from] std::io::Error),

    #[error("settings json failure: {0}")]
    Json (#[from] serde_json::Error),
}
