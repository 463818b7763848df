//! Persisted user settings (`settings.json` beside the config file) : global combos and remembered per-window prefs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SettingsError;
use crate::hotkeys::{GlobalSlot, HotkeyManager, HotkeyOs};
use crate::keys::HotkeyCombo;
use crate::registry::{Pid, WindowActivator, WindowPrefs, WindowRegistry, WindowSource};



# [ derive (Debug, PartialEq, Eq, Clone, Serialize, Deserialize) ]
# [ serde (default) ]
pub struct WindowSettings {
    pub title             : String,
    pub process_id        : Pid,
    pub is_enabled        : bool,
    pub individual_hotkey : String,
    pub display_order     : i32,
}

impl Default for WindowSettings {
    fn default () -> Self {
        WindowSettings { title: String::new(), process_id: 0, is_enabled: true, individual_hotkey: String::new(), display_order: 0 }
    }
}

# [ derive (Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize) ]
# [ serde (default) ]
pub struct AppSettings {
    /// empty means 'use the configured default'
    pub next_window_hotkey     : String,
    pub previous_window_hotkey : String,
    pub windows                : Vec <WindowSettings>,
}


impl AppSettings {

    /// Persisted combo for a global slot, if there's a usable one
    pub fn global_combo (&self, slot:GlobalSlot) -> Option<HotkeyCombo> {
        let s = match slot { GlobalSlot::Next => &self.next_window_hotkey, GlobalSlot::Previous => &self.previous_window_hotkey };
        HotkeyCombo::parse_optional (s) .unwrap_or_else (|e| {
            warn! ("ignoring persisted {} hotkey {:?}: {}", slot.as_ref(), s, e);
            None
        } )
    }

    /// Per-window prefs to seed the registry with .. hotkey strings are normalized, unparseable ones dropped
    pub fn remembered_prefs (&self) -> Vec <(Pid, WindowPrefs)> {
        self.windows .iter() .map (|w| {
            let combo = HotkeyCombo::parse_optional (&w.individual_hotkey) .unwrap_or_else (|e| {
                warn! ("dropping persisted hotkey {:?} of pid {}: {}", w.individual_hotkey, w.process_id, e);
                None
            } );
            ( w.process_id, WindowPrefs {
                display_order : w.display_order,
                is_enabled    : w.is_enabled,
                individual_hotkey_display : HotkeyCombo::display_or_empty (combo.as_ref()),
            } )
        } ) .collect()
    }

    /// Snapshot of the current state for saving. Entries from `previous` whose windows havent shown up yet this run are kept.
    pub fn capture <D, H> (registry:&WindowRegistry<D>, hotkeys:&HotkeyManager<H>, previous:&AppSettings) -> AppSettings
        where D: WindowSource + WindowActivator, H: HotkeyOs
    {
        let mut windows = registry.windows() .iter() .map (|w| WindowSettings {
            title             : w.title.clone(),
            process_id        : w.process_id,
            is_enabled        : w.is_enabled,
            individual_hotkey : w.individual_hotkey_display.clone(),
            display_order     : w.display_order,
        } ) .collect::<Vec<_>>();

        windows.extend ( previous.windows .iter()
            .filter (|w| registry.find(w.process_id).is_none() && registry.is_remembered(w.process_id))
            .cloned() );

        AppSettings {
            next_window_hotkey     : HotkeyCombo::display_or_empty (hotkeys.global_combo(GlobalSlot::Next).as_ref()),
            previous_window_hotkey : HotkeyCombo::display_or_empty (hotkeys.global_combo(GlobalSlot::Previous).as_ref()),
            windows,
        }
    }
}




# [ derive (Debug, Default, Clone) ]
/// Debounced writes : every request pushes the deadline out and replaces the pending snapshot,
/// and whichever waiter wakes past the deadline writes the latest snapshot (once)
struct PendingSave ( Arc <Mutex <Option <(Instant, AppSettings)>>> );

impl PendingSave {

    fn request (&self, path:PathBuf, settings:AppSettings, delay:Duration) {
        *self.0.lock().unwrap() = Some ((Instant::now() + delay, settings));
        let pending = self.clone();
        thread::spawn ( move || {
            thread::sleep (delay);
            pending.flush_if_due (&path);
        } );
    }

    fn flush_if_due (&self, path:&Path) {
        let mut pending = self.0.lock().unwrap();
        if pending.as_ref() .is_some_and (|(deadline,_)| *deadline <= Instant::now()) {
            if let Some((_, settings)) = pending.take() {
                if let Err(e) = write_json (path, &settings) {
                    warn! ("failed to save settings to {:?}: {}", path, e);
                }
            }
        }
    }

    fn cancel (&self) -> bool {
        self.0.lock().unwrap().take().is_some()
    }
}



# [ derive (Debug, Clone) ]
pub struct SettingsStore {
    path    : Option <PathBuf>,
    pending : PendingSave,
}

impl SettingsStore {

    pub const FILE_NAME : &'static str = "settings.json";
    const SAVE_DELAY : Duration = Duration::from_millis (500);

    pub fn new (path: Option<PathBuf>) -> SettingsStore {
        SettingsStore { path, pending: PendingSave::default() }
    }
    /// Store at `settings.json` in the given directory (no directory means nothing is ever persisted)
    pub fn in_dir (dir: Option<&Path>) -> SettingsStore {
        Self::new (dir .map (|d| d.join (Self::FILE_NAME)))
    }

    pub fn path (&self) -> Option<&Path> { self.path.as_deref() }


    pub fn try_load (&self) -> Result <AppSettings, SettingsError> {
        let Some(path) = self.path.as_ref() else { return Ok (AppSettings::default()) };
        let json = fs::read_to_string (path)?;
        Ok (serde_json::from_str (&json)?)
    }

    /// Loads settings, falling back to defaults (with a warning, unless the file just doesnt exist yet)
    pub fn load (&self) -> AppSettings {
        match self.try_load() {
            Ok(s) => { info! ("loaded settings for {} windows from {:?}", s.windows.len(), self.path); s }
            Err (SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug! ("no settings file at {:?} yet", self.path);
                AppSettings::default()
            }
            Err(e) => {
                warn! ("failed to load settings from {:?}, using defaults: {}", self.path, e);
                AppSettings::default()
            }
        }
    }

    pub fn save (&self, settings:&AppSettings) -> Result <(), SettingsError> {
        let Some(path) = self.path.as_ref() else { return Ok(()) };
        write_json (path, settings)
    }

    /// Saves after a short quiet period .. bursts of changes (e.g. a drag-reorder) collapse into one write
    pub fn save_deferred (&self, settings:AppSettings) {
        let Some(path) = self.path.clone() else { return };
        self.pending.request (path, settings, Self::SAVE_DELAY);
    }

    /// Drops any pending deferred save (a synchronous save is about to supersede it), returns whether there was one
    pub fn cancel_pending (&self) -> bool {
        self.pending.cancel()
    }
}

fn write_json (path:&Path, settings:&AppSettings) -> Result <(), SettingsError> {
    let json = serde_json::to_string_pretty (settings)?;
    fs::write (path, json)?;
    debug! ("saved settings to {:?}", path);
    Ok(())
}
