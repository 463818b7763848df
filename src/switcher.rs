//! The switch controller : glues hotkey events to registry navigation, keeps hotkeys in step with the windows list,
//! and persists what the user changed. Everything here runs on the thread that owns the os message loop.

use std::sync::mpsc::Sender;

use strum_macros::AsRefStr;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::HotkeyError;
use crate::hotkeys::{Assignment, GlobalSlot, HotkeyEvent, HotkeyManager, HotkeyOs, ReregisterReport, SlotId};
use crate::keys::{HotkeyCombo, Modifiers, VKey};
use crate::registry::{Pid, SwitchOutcome, WindowActivator, WindowRegistry, WindowSource};
use crate::settings::{AppSettings, SettingsStore};



# [ derive (Debug, Clone, PartialEq, Eq, AsRefStr) ]
/// Things the ui/overlay/status-bar may want to react to
pub enum Notice {
    SwitchedNext (Pid),
    SwitchedPrevious (Pid),
    IndividualHotkeyFired (Pid),
    ActivationFailed (Pid),
    NoEligibleWindow,
    HotkeyConflict (HotkeyCombo),
    HotkeyRevoked (Pid),
}



pub struct Switcher <D, H: HotkeyOs> {
    registry : WindowRegistry <D>,
    hotkeys  : HotkeyManager <H>,
    store    : SettingsStore,
    /// last loaded or saved settings
    settings : AppSettings,
    default_next     : Option <HotkeyCombo>,
    default_previous : Option <HotkeyCombo>,
    notices  : Sender <Notice>,
}


fn parse_conf_combo (s:&str, key:&str) -> Option<HotkeyCombo> {
    HotkeyCombo::parse_optional (s) .unwrap_or_else (|e| {
        warn! ("ignoring configured {}: {:?} ({})", key, s, e);
        None
    } )
}


impl <D, H> Switcher <D, H> where D: WindowSource + WindowActivator, H: HotkeyOs {

    pub fn new (desktop:D, hotkey_os:H, conf:&Config, notices:Sender<Notice>) -> Switcher<D,H> {
        Switcher {
            registry : WindowRegistry::new (desktop, &conf.get_target_process_name()),
            hotkeys  : HotkeyManager::new (hotkey_os),
            store    : SettingsStore::in_dir (conf.get_data_dir().as_deref()),
            settings : AppSettings::default(),
            default_next     : parse_conf_combo (&conf.get_next_window_hotkey(), "next_window_hotkey"),
            default_previous : parse_conf_combo (&conf.get_previous_window_hotkey(), "previous_window_hotkey"),
            notices,
        }
    }

    pub fn registry (&self) -> &WindowRegistry<D> { &self.registry }
    pub fn hotkeys  (&self) -> &HotkeyManager<H>  { &self.hotkeys }
    pub fn settings (&self) -> &AppSettings { &self.settings }

    fn notify (&self, notice:Notice) {
        debug! ("notice: {:?}", notice);
        if self.notices.send (notice).is_err() {
            debug! ("notice receiver is gone");
        }
    }



    /*****  lifecycle  ******/

    /// Loads persisted settings, registers the global hotkeys, and does the first windows refresh
    pub fn startup (&mut self) {
        self.settings = self.store.load();
        self.registry.remember (self.settings.remembered_prefs());

        for slot in [GlobalSlot::Next, GlobalSlot::Previous] {
            let default = match slot { GlobalSlot::Next => self.default_next, GlobalSlot::Previous => self.default_previous };
            let Some(combo) = self.settings.global_combo(slot) .or (default) else {
                info! ("no {} hotkey configured", slot.as_ref());
                continue
            };
            if self.hotkeys.register_global (slot, combo).is_err() {
                self.notify (Notice::HotkeyConflict (combo));
            }
        }
        self.refresh_windows();
        info! ("started with {} target windows", self.registry.windows().len());
    }

    /// Re-registers every hotkey after the owning os window was replaced
    pub fn rebind_hotkeys (&mut self) -> ReregisterReport {
        let report = self.hotkeys.reregister_all();
        for slot in &report.failed_globals {
            if let Some(combo) = self.hotkeys.global_combo (*slot) {
                self.notify (Notice::HotkeyConflict (combo));
            }
        }
        for pid in &report.dropped_windows {
            self.registry.set_hotkey_display (*pid, "");
            self.notify (Notice::HotkeyRevoked (*pid));
        }
        self.persist();
        report
    }

    /// Saves synchronously and releases every os hotkey
    pub fn shutdown (&mut self) {
        self.store.cancel_pending();
        let snap = AppSettings::capture (&self.registry, &self.hotkeys, &self.settings);
        match self.store.save (&snap) {
            Ok(_)  => self.settings = snap,
            Err(e) => warn! ("failed to save settings on shutdown: {}", e),
        }
        self.hotkeys.dispose_all();
        info! ("shut down, all hotkeys released");
    }



    /*****  windows list upkeep  ******/

    /// Refreshes the registry, releases hotkeys of vanished windows, and binds remembered hotkeys that arent bound yet
    pub fn refresh_windows (&mut self) {
        self.registry.refresh();
        self.prune_hotkeys();
        self.restore_hotkeys();
        self.persist();
    }

    fn prune_hotkeys (&mut self) {
        let gone = self.hotkeys.per_window_bindings()
            .filter (|b| self.registry.find (b.process_id).is_none())
            .map (|b| b.process_id) .collect::<Vec<Pid>>();
        for pid in gone {
            debug! ("releasing hotkey of vanished pid {}", pid);
            self.hotkeys.unregister_per_window (pid);
        }
    }

    fn restore_hotkeys (&mut self) {
        let pending = self.registry.windows() .iter()
            .filter (|w| !w.individual_hotkey_display.is_empty() && self.hotkeys.window_binding (w.process_id).is_none())
            .map (|w| (w.process_id, w.individual_hotkey_display.clone()))
            .collect::<Vec<_>>();

        for (pid, shown) in pending {
            match HotkeyCombo::parse_optional (&shown) {
                Ok (Some(combo)) => { let _ = self.bind_window (pid, combo); }
                Ok (None) => { self.registry.set_hotkey_display (pid, ""); }
                Err(e) => {
                    warn! ("clearing unparseable hotkey {:?} of pid {}: {}", shown, pid, e);
                    self.registry.set_hotkey_display (pid, "");
                }
            }
        }
    }

    /// Registers a window's combo and keeps the display strings of every affected window in step
    fn bind_window (&mut self, pid:Pid, combo:HotkeyCombo) -> Result <SlotId, HotkeyError> {
        let Assignment { revoked, outcome } = self.hotkeys.register_per_window (pid, combo);
        for other in revoked {
            self.registry.set_hotkey_display (other, "");
            self.notify (Notice::HotkeyRevoked (other));
        }
        match &outcome {
            Ok(_)  => { self.registry.set_hotkey_display (pid, &combo.to_string()); }
            Err(_) => {
                self.registry.set_hotkey_display (pid, "");
                self.notify (Notice::HotkeyConflict (combo));
            }
        }
        outcome
    }

    fn persist (&mut self) {
        let snap = AppSettings::capture (&self.registry, &self.hotkeys, &self.settings);
        if snap != self.settings {
            self.store.save_deferred (snap.clone());
            self.settings = snap;
        }
    }



    /*****  hotkey events  ******/

    pub fn on_hotkey (&mut self, slot:SlotId) {
        let Some(event) = self.hotkeys.dispatch (slot) else { return };
        // the list may be up to a refresh-period stale, so we always look again before acting
        self.refresh_windows();

        match event {
            HotkeyEvent::Next => {
                let outcome = self.registry.switch_next();
                self.report_switch (outcome, Notice::SwitchedNext);
            }
            HotkeyEvent::Previous => {
                let outcome = self.registry.switch_previous();
                self.report_switch (outcome, Notice::SwitchedPrevious);
            }
            HotkeyEvent::Individual (pid) => {
                match self.registry.find (pid) .map (|w| w.is_enabled) {
                    Some(true) => {
                        let outcome = self.registry.activate_pid (pid);
                        self.report_switch (outcome, Notice::IndividualHotkeyFired);
                    }
                    Some(false) => debug! ("ignoring hotkey of disabled window pid {}", pid),
                    None        => debug! ("hotkey fired for pid {} which is no longer around", pid),
                }
            }
        }
    }

    fn report_switch (&self, outcome:SwitchOutcome, on_success: fn(Pid) -> Notice) {
        self.notify ( match outcome {
            SwitchOutcome::Switched (pid)         => on_success (pid),
            SwitchOutcome::NoEligibleWindow       => Notice::NoEligibleWindow,
            SwitchOutcome::ActivationFailed (pid) => Notice::ActivationFailed (pid),
        } );
    }



    /*****  management list operations  ******/

    pub fn assign_window_hotkey (&mut self, pid:Pid, combo:HotkeyCombo) -> Result <SlotId, HotkeyError> {
        if self.registry.find (pid).is_none() {
            return Err (HotkeyError::UnknownWindow (pid))
        }
        let outcome = self.bind_window (pid, combo);
        self.persist();
        outcome
    }

    pub fn clear_window_hotkey (&mut self, pid:Pid) -> bool {
        let released = self.hotkeys.unregister_per_window (pid);
        self.registry.set_hotkey_display (pid, "");
        self.persist();
        released
    }

    pub fn set_global_hotkey (&mut self, slot:GlobalSlot, combo:HotkeyCombo) -> Result <(), HotkeyError> {
        let res = self.hotkeys.register_global (slot, combo);
        if res.is_err() {
            self.notify (Notice::HotkeyConflict (combo));
        }
        self.persist();
        res
    }

    /// Removes a global hotkey .. the next start falls back to the configured default for it
    pub fn clear_global_hotkey (&mut self, slot:GlobalSlot) {
        self.hotkeys.clear_global (slot);
        self.persist();
    }

    pub fn set_window_enabled (&mut self, pid:Pid, enabled:bool) -> bool {
        let found = self.registry.set_enabled (pid, enabled);
        if found { self.persist() }
        found
    }

    pub fn move_window (&mut self, from:usize, to:usize) -> bool {
        let moved = self.registry.move_window (from, to);
        if moved { self.persist() }
        moved
    }

    /// While capturing a new combo, the currently registered hotkeys must not switch windows
    pub fn begin_capture (&self) { self.hotkeys.suspend() }
    pub fn end_capture   (&self) { self.hotkeys.resume() }

    /// Finishes a capture for a window with the keys the user pressed. Tab, Enter and Escape cancel (returns None).
    pub fn capture_window_hotkey (&mut self, pid:Pid, modifiers:Modifiers, key:VKey) -> Option <Result <SlotId, HotkeyError>> {
        self.end_capture();
        if key.cancels_capture() {
            debug! ("hotkey capture for pid {} cancelled", pid);
            return None
        }
        Some (self.assign_window_hotkey (pid, HotkeyCombo::new (modifiers, key)))
    }

}
