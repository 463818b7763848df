//! In-memory stand-ins for the desktop and the OS hotkey table, used by the unit tests

use std::cell::{RefCell, RefMut};
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::hotkeys::{HotkeyOs, SlotId};
use crate::keys::HotkeyCombo;
use crate::registry::{process_name_matches, Hwnd, Pid, WindowActivator, WindowSnapshot, WindowSource};



# [ derive (Debug, Default) ]
pub struct DesktopState {
    pub windows     : Vec <WindowSnapshot>,
    pub foreground  : Hwnd,
    pub minimized   : HashSet <Hwnd>,
    pub stale       : HashSet <Hwnd>,
    pub restored    : Vec <Hwnd>,
    pub activations : Vec <Hwnd>,
}

# [ derive (Debug, Default, Clone) ]
pub struct FakeDesktop ( Rc <RefCell <DesktopState>> );

impl FakeDesktop {

    pub fn new () -> FakeDesktop { FakeDesktop::default() }

    pub fn state (&self) -> RefMut<'_, DesktopState> { self.0.borrow_mut() }

    pub fn add (&self, hwnd:Hwnd, pid:Pid, title:&str) -> &Self {
        self.add_for (hwnd, pid, title, "Dofus")
    }
    pub fn add_for (&self, hwnd:Hwnd, pid:Pid, title:&str, process_name:&str) -> &Self {
        self.state().windows.push ( WindowSnapshot {
            handle: hwnd, title: title.to_string(), process_id: pid, process_name: process_name.to_string()
        } );
        self
    }
    pub fn remove_pid (&self, pid:Pid) {
        self.state().windows.retain (|w| w.process_id != pid);
    }
    pub fn retitle (&self, pid:Pid, title:&str) {
        self.state().windows .iter_mut() .filter (|w| w.process_id == pid) .for_each (|w| w.title = title.to_string());
    }
    pub fn focus (&self, hwnd:Hwnd) { self.state().foreground = hwnd }
    pub fn foreground (&self) -> Hwnd { self.0.borrow().foreground }
}

impl WindowSource for FakeDesktop {
    fn enumerate (&self, target_process_name:&str) -> Vec<WindowSnapshot> {
        self.0.borrow().windows .iter()
            .filter (|w| process_name_matches (&w.process_name, target_process_name))
            .cloned() .collect()
    }
}

impl WindowActivator for FakeDesktop {
    fn is_minimized (&self, hwnd:Hwnd) -> bool { self.0.borrow().minimized.contains(&hwnd) }

    fn restore (&self, hwnd:Hwnd) {
        let mut st = self.state();
        st.minimized.remove(&hwnd);
        st.restored.push(hwnd);
    }

    fn set_foreground (&self, hwnd:Hwnd) -> bool {
        let mut st = self.state();
        if st.stale.contains(&hwnd) { return false }
        st.foreground = hwnd;
        st.activations.push(hwnd);
        true
    }

    fn foreground_window (&self) -> Hwnd { self.0.borrow().foreground }
}




# [ derive (Debug, Default) ]
pub struct HotkeyOsState {
    pub active     : BTreeMap <SlotId, HotkeyCombo>,
    /// combos some other application already holds
    pub foreign    : HashSet <HotkeyCombo>,
    pub registers  : usize,
    pub unregisters: usize,
    /// every call in arrival order .. 'r' for register, 'u' for unregister
    pub calls      : Vec <(char, SlotId)>,
}

# [ derive (Debug, Default, Clone) ]
pub struct FakeHotkeyOs ( Rc <RefCell <HotkeyOsState>> );

impl FakeHotkeyOs {

    pub fn new () -> FakeHotkeyOs { FakeHotkeyOs::default() }

    pub fn state (&self) -> RefMut<'_, HotkeyOsState> { self.0.borrow_mut() }

    pub fn claim_elsewhere (&self, combo:HotkeyCombo) { self.state().foreign.insert(combo); }

    pub fn active_count_for (&self, combo:&HotkeyCombo) -> usize {
        self.0.borrow().active.values() .filter (|c| *c == combo) .count()
    }
    pub fn slot_of (&self, combo:&HotkeyCombo) -> Option<SlotId> {
        self.0.borrow().active.iter() .find (|(_,c)| *c == combo) .map (|(s,_)| *s)
    }
    pub fn active_slots (&self) -> Vec<SlotId> {
        self.0.borrow().active.keys().copied().collect()
    }
    pub fn registered_in_order (&self) -> Vec<SlotId> {
        self.0.borrow().calls.iter() .filter (|(c,_)| *c == 'r') .map (|(_,s)| *s) .collect()
    }
}

impl HotkeyOs for FakeHotkeyOs {
    fn register_hotkey (&self, slot:SlotId, combo:&HotkeyCombo) -> bool {
        let mut st = self.state();
        st.registers += 1;
        st.calls.push (('r', slot));
        // the os refuses a combo held by anyone (incl us under another id), and we treat a live id as taken too
        if st.foreign.contains(combo) || st.active.values().any (|c| c == combo) || st.active.contains_key(&slot) {
            return false
        }
        st.active.insert (slot, *combo);
        true
    }

    fn unregister_hotkey (&self, slot:SlotId) -> bool {
        let mut st = self.state();
        st.unregisters += 1;
        st.calls.push (('u', slot));
        st.active.remove(&slot).is_some()
    }
}
