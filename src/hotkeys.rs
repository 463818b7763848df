//! Global hotkey slots : the two fixed next/previous bindings plus a growing pool of per-window bindings
//!
//! The os side is behind the [`HotkeyOs`] trait so the slot bookkeeping can be exercised without a message loop.
//! Every binding goes `Unregistered -> Registered -> Unregistered`, and updates are always unregister-then-register.

use std::cell::Cell;
use std::collections::BTreeMap;

use strum_macros::AsRefStr;
use tracing::{debug, info, warn};

use crate::error::{HotkeyError, SlotLabel};
use crate::keys::HotkeyCombo;
use crate::registry::Pid;



pub type SlotId = i32;

pub const SLOT_NEXT         : SlotId = 1;
pub const SLOT_PREVIOUS     : SlotId = 2;
/// Per-window slot ids start here and only ever grow
pub const FIRST_WINDOW_SLOT : SlotId = 100;



# [ derive (Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr) ]
pub enum GlobalSlot { Next, Previous }

impl GlobalSlot {
    pub fn slot_id (&self) -> SlotId {
        match self { GlobalSlot::Next => SLOT_NEXT, GlobalSlot::Previous => SLOT_PREVIOUS }
    }
    pub fn from_slot_id (slot:SlotId) -> Option<GlobalSlot> {
        match slot { SLOT_NEXT => Some(GlobalSlot::Next), SLOT_PREVIOUS => Some(GlobalSlot::Previous), _ => None }
    }
}


/// The os global-hotkey table. Both calls report plain success, there is nothing more useful to say about a refusal.
pub trait HotkeyOs {
    fn register_hotkey   (&self, slot:SlotId, combo:&HotkeyCombo) -> bool;
    fn unregister_hotkey (&self, slot:SlotId) -> bool;
}



# [ derive (Debug, Default, Clone, PartialEq, Eq) ]
pub struct GlobalBinding {
    pub combo  : Option <HotkeyCombo>,
    /// whether the combo currently holds a live os registration
    pub active : bool,
}

# [ derive (Debug, Clone, PartialEq, Eq) ]
pub struct WindowBinding {
    pub slot       : SlotId,
    pub process_id : Pid,
    pub combo      : HotkeyCombo,
}

# [ derive (Debug, Clone, Copy, PartialEq, Eq) ]
/// What a fired hotkey means to the rest of the app
pub enum HotkeyEvent {
    Next,
    Previous,
    Individual (Pid),
}

# [ derive (Debug, Clone, PartialEq, Eq) ]
/// Result of a per-window assignment : bindings of other windows revoked along the way, and the new slot (or why there isnt one)
pub struct Assignment {
    pub revoked : Vec <Pid>,
    pub outcome : Result <SlotId, HotkeyError>,
}

# [ derive (Debug, Default, Clone, PartialEq, Eq) ]
pub struct ReregisterReport {
    pub failed_globals  : Vec <GlobalSlot>,
    pub dropped_windows : Vec <Pid>,
}

impl ReregisterReport {
    pub fn is_clean (&self) -> bool { self.failed_globals.is_empty() && self.dropped_windows.is_empty() }
}




pub struct HotkeyManager <H: HotkeyOs> {
    os               : H,
    next             : GlobalBinding,
    previous         : GlobalBinding,
    windows          : BTreeMap <SlotId, WindowBinding>,
    next_window_slot : SlotId,
    /// capture gate .. while set, fired slots are dropped
    suspended        : Cell <bool>,
}

impl <H: HotkeyOs> HotkeyManager <H> {

    pub fn new (os:H) -> HotkeyManager<H> {
        HotkeyManager {
            os,
            next             : GlobalBinding::default(),
            previous         : GlobalBinding::default(),
            windows          : BTreeMap::new(),
            next_window_slot : FIRST_WINDOW_SLOT,
            suspended        : Cell::new (false),
        }
    }

    pub fn os (&self) -> &H { &self.os }

    fn global (&self, slot:GlobalSlot) -> &GlobalBinding {
        match slot { GlobalSlot::Next => &self.next, GlobalSlot::Previous => &self.previous }
    }
    fn global_mut (&mut self, slot:GlobalSlot) -> &mut GlobalBinding {
        match slot { GlobalSlot::Next => &mut self.next, GlobalSlot::Previous => &mut self.previous }
    }



    /*****  global next/previous slots  ******/

    /// Replaces the combo on a global slot. On os refusal the combo is kept but the slot stays inactive.
    pub fn register_global (&mut self, slot:GlobalSlot, combo:HotkeyCombo) -> Result <(), HotkeyError> {
        let id = slot.slot_id();
        if self.global(slot).active {
            self.os.unregister_hotkey (id);
        }
        let active = self.os.register_hotkey (id, &combo);
        *self.global_mut(slot) = GlobalBinding { combo: Some(combo), active };

        if !active {
            warn! ("failed to register {} hotkey {}", slot.as_ref(), combo);
            return Err (HotkeyError::Conflict { slot: SlotLabel::Global(slot), combo })
        }
        info! ("registered {} hotkey {} (slot {})", slot.as_ref(), combo, id);
        Ok(())
    }

    pub fn clear_global (&mut self, slot:GlobalSlot) {
        if self.global(slot).active {
            self.os.unregister_hotkey (slot.slot_id());
        }
        *self.global_mut(slot) = GlobalBinding::default();
        debug! ("cleared {} hotkey", slot.as_ref());
    }

    pub fn global_combo     (&self, slot:GlobalSlot) -> Option<HotkeyCombo> { self.global(slot).combo }
    pub fn is_global_active (&self, slot:GlobalSlot) -> bool { self.global(slot).active }



    /*****  per-window slots  ******/

    fn slot_for_pid (&self, pid:Pid) -> Option<SlotId> {
        self.windows .values() .find (|b| b.process_id == pid) .map (|b| b.slot)
    }

    fn release (&mut self, slot:SlotId) -> Option<WindowBinding> {
        let binding = self.windows.remove (&slot)?;
        if !self.os.unregister_hotkey (slot) {
            debug! ("os had no live registration for slot {}", slot);
        }
        Some (binding)
    }

    /// Binds a combo to a window. Any previous binding of that window is released first, and any other window
    /// holding the same combo loses it (last writer wins). A failed registration leaves the window unbound.
    pub fn register_per_window (&mut self, pid:Pid, combo:HotkeyCombo) -> Assignment {
        if let Some(old) = self.slot_for_pid (pid) {
            self.release (old);
        }
        let conflicting = self.windows .values() .filter (|b| b.combo == combo && b.process_id != pid) .map (|b| b.slot) .collect::<Vec<_>>();
        let revoked = conflicting .into_iter() .filter_map (|slot| self.release(slot)) .map (|b| {
            info! ("revoked hotkey {} from pid {} in favor of pid {}", combo, b.process_id, pid);
            b.process_id
        } ) .collect::<Vec<Pid>>();

        let failed = || Err (HotkeyError::Conflict { slot: SlotLabel::Window(pid), combo });

        // our own globals would be refused by the os anyway, but no point burning a slot id on it
        if [&self.next, &self.previous] .iter() .any (|g| g.active && g.combo == Some(combo)) {
            warn! ("hotkey {} for pid {} is taken by a global binding", combo, pid);
            return Assignment { revoked, outcome: failed() }
        }

        let slot = self.next_window_slot;
        self.next_window_slot += 1;

        if !self.os.register_hotkey (slot, &combo) {
            warn! ("failed to register hotkey {} for pid {}", combo, pid);
            return Assignment { revoked, outcome: failed() }
        }
        debug! ("registered hotkey {} for pid {} on slot {}", combo, pid, slot);
        self.windows.insert (slot, WindowBinding { slot, process_id: pid, combo });
        Assignment { revoked, outcome: Ok(slot) }
    }

    /// Releases a window's binding, returns false if it had none
    pub fn unregister_per_window (&mut self, pid:Pid) -> bool {
        match self.slot_for_pid (pid) {
            Some(slot) => { self.release (slot); true }
            None => false
        }
    }

    pub fn window_binding (&self, pid:Pid) -> Option<&WindowBinding> {
        self.windows .values() .find (|b| b.process_id == pid)
    }
    pub fn per_window_bindings (&self) -> impl Iterator <Item = &WindowBinding> {
        self.windows.values()
    }



    /*****  lifecycle  ******/

    /// Re-registers every held binding in slot order, e.g. after the owning os window was recreated.
    /// Globals that fail stay known but inactive, per-window bindings that fail are dropped.
    pub fn reregister_all (&mut self) -> ReregisterReport {
        let mut report = ReregisterReport::default();

        for slot in [GlobalSlot::Next, GlobalSlot::Previous] {
            let Some(combo) = self.global(slot).combo else { continue };
            self.os.unregister_hotkey (slot.slot_id());
            let active = self.os.register_hotkey (slot.slot_id(), &combo);
            self.global_mut(slot).active = active;
            if !active { report.failed_globals.push (slot) }
        }

        let slots = self.windows.keys().copied().collect::<Vec<SlotId>>();
        for slot in slots {
            self.os.unregister_hotkey (slot);
            let ok = self.windows.get (&slot) .is_some_and (|b| self.os.register_hotkey (slot, &b.combo));
            if !ok {
                if let Some(b) = self.windows.remove (&slot) { report.dropped_windows.push (b.process_id) }
            }
        }

        if report.is_clean() { info! ("re-registered all hotkeys") }
        else { warn! ("hotkey re-registration incomplete: {:?}", report) }
        report
    }

    /// Unregisters everything we hold. Global combos are remembered (inactive), per-window bindings are forgotten.
    pub fn dispose_all (&mut self) {
        for slot in [GlobalSlot::Next, GlobalSlot::Previous] {
            if self.global(slot).active {
                let _ = self.os.unregister_hotkey (slot.slot_id());
                self.global_mut(slot).active = false;
            }
        }
        let slots = std::mem::take (&mut self.windows);
        for slot in slots.keys() {
            let _ = self.os.unregister_hotkey (*slot);
        }
        debug! ("disposed all hotkeys");
    }



    /*****  dispatch  ******/

    pub fn suspend (&self) { self.suspended.set (true) }
    pub fn resume  (&self) { self.suspended.set (false) }
    pub fn is_suspended (&self) -> bool { self.suspended.get() }

    /// Maps a fired os slot id to its meaning .. nothing fires while suspended, unknown ids are ignored
    pub fn dispatch (&self, slot:SlotId) -> Option<HotkeyEvent> {
        if self.suspended.get() {
            debug! ("dropping hotkey slot {} while suspended", slot);
            return None
        }
        match GlobalSlot::from_slot_id (slot) {
            Some(GlobalSlot::Next)     => Some (HotkeyEvent::Next),
            Some(GlobalSlot::Previous) => Some (HotkeyEvent::Previous),
            None => {
                let event = self.windows.get (&slot) .map (|b| HotkeyEvent::Individual (b.process_id));
                if event.is_none() { debug! ("ignoring unknown hotkey slot {}", slot) }
                event
            }
        }
    }

}

impl <H: HotkeyOs> Drop for HotkeyManager <H> {
    fn drop (&mut self) { self.dispose_all() }
}
