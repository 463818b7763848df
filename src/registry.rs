//! The registry of target-application windows : re-identification across refreshes, ordering, and cyclic switching

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};



pub type Hwnd = isize;
pub type Pid  = u32;

/// Separator between character name and class in the target application's window titles
pub const TITLE_SEPARATOR : &str = " - ";



# [ derive (Debug, Default, Eq, PartialEq, Hash, Clone, Serialize, Deserialize) ]
/// Raw result row from an os windows query
pub struct WindowSnapshot {
    pub handle       : Hwnd,
    pub title        : String,
    pub process_id   : Pid,
    pub process_name : String,
}

/// Whether an os process image name (with or without `.exe`) names the target application, ignoring case
pub fn process_name_matches (name:&str, target:&str) -> bool {
    fn stem (s:&str) -> &str {
        let s = s.trim();
        match s.len().checked_sub(4) .and_then (|i| s.get(i..).map(|ext| (i, ext))) {
            Some ((i, ext)) if ext.eq_ignore_ascii_case(".exe") => s.get(..i).unwrap_or(s),
            _ => s,
        }
    }
    !stem(target).is_empty() && stem(name).eq_ignore_ascii_case (stem(target))
}

/// Queries the os for visible top-level windows of processes matching the target image name.
/// Processes that cant be inspected are skipped silently.
pub trait WindowSource {
    fn enumerate (&self, target_process_name:&str) -> Vec<WindowSnapshot>;
}

/// The handful of os calls needed to bring a window to the foreground
pub trait WindowActivator {
    fn is_minimized      (&self, hwnd:Hwnd) -> bool;
    fn restore           (&self, hwnd:Hwnd);
    fn set_foreground    (&self, hwnd:Hwnd) -> bool;
    fn foreground_window (&self) -> Hwnd;
}



# [ derive (Debug, Default, Eq, PartialEq, Hash, Clone, Serialize, Deserialize) ]
pub struct WindowRecord {
    pub handle        : Hwnd,
    pub title         : String,
    pub process_id    : Pid,
    pub process_name  : String,
    pub display_order : i32,
    pub is_enabled    : bool,
    pub individual_hotkey_display : String,
}

# [ derive (Debug, Eq, PartialEq, Hash, Clone, Serialize, Deserialize) ]
/// The user controlled part of a window record, carried across refreshes (and persisted)
pub struct WindowPrefs {
    pub display_order : i32,
    pub is_enabled    : bool,
    pub individual_hotkey_display : String,
}

impl Default for WindowPrefs {
    fn default () -> Self { WindowPrefs { display_order: 0, is_enabled: true, individual_hotkey_display: String::new() } }
}

impl WindowRecord {

    fn from_snapshot (snap:WindowSnapshot, prefs:WindowPrefs) -> WindowRecord {
        WindowRecord {
            handle        : snap.handle,
            title         : snap.title,
            process_id    : snap.process_id,
            process_name  : snap.process_name,
            display_order : prefs.display_order,
            is_enabled    : prefs.is_enabled,
            individual_hotkey_display : prefs.individual_hotkey_display,
        }
    }

    pub fn prefs (&self) -> WindowPrefs {
        WindowPrefs {
            display_order : self.display_order,
            is_enabled    : self.is_enabled,
            individual_hotkey_display : self.individual_hotkey_display.clone(),
        }
    }

    fn title_parts (&self) -> Vec<&str> {
        self.title .split (TITLE_SEPARATOR) .filter (|s| !s.is_empty()) .collect()
    }

    /// First title segment, empty when the title carries no separator
    pub fn character_name (&self) -> String {
        let parts = self.title_parts();
        if parts.len() < 2 { return String::new() }
        parts[0].to_string()
    }
    /// Second title segment, empty when the title carries no separator
    pub fn character_class (&self) -> String {
        self.title_parts() .get(1) .map (|s| s.to_string()) .unwrap_or_default()
    }

    /// `"<class> - <name>"` when both are present, else the raw title
    pub fn display_title (&self) -> String {
        match self.title_parts().as_slice() {
            [name, class, ..] => format! ("{}{}{}", class, TITLE_SEPARATOR, name),
            _ => self.title.clone()
        }
    }
}



# [ derive (Debug, Clone, Copy, PartialEq, Eq) ]
pub enum SwitchOutcome {
    Switched (Pid),
    NoEligibleWindow,
    ActivationFailed (Pid),
}

impl SwitchOutcome {
    pub fn succeeded (&self) -> bool { matches! (self, SwitchOutcome::Switched(_)) }
}

# [ derive (Debug, Clone, Copy, PartialEq, Eq) ]
enum Direction { Next, Previous }



pub struct WindowRegistry <D> {
    desktop    : D,
    target     : String,
    windows    : Vec <WindowRecord>,
    nav_idx    : Option <usize>,
    remembered : HashMap <Pid, WindowPrefs>,
}

impl <D> WindowRegistry <D> where D: WindowSource + WindowActivator {

    pub fn new (desktop:D, target_process_name:&str) -> WindowRegistry<D> {
        WindowRegistry {
            desktop,
            target     : target_process_name.to_string(),
            windows    : Vec::new(),
            nav_idx    : None,
            remembered : HashMap::new(),
        }
    }

    pub fn desktop (&self) -> &D { &self.desktop }
    pub fn target_process_name (&self) -> &str { &self.target }

    /// Seeds preferences for windows not yet seen this run (e.g. loaded from persisted settings)
    pub fn remember (&mut self, prefs: impl IntoIterator <Item = (Pid, WindowPrefs)>) {
        self.remembered.extend (prefs);
    }



    /*****  refresh and merge  ******/

    /// Re-queries the os and reconciles the fresh windows against what we knew, sorted by (display-order, title)
    pub fn refresh (&mut self) -> &[WindowRecord] {
        let snaps = self.desktop.enumerate (&self.target);
        let prior = self.windows .iter() .map (|w| (w.process_id, w.prefs())) .collect::<HashMap<Pid,WindowPrefs>>();

        let merged = Self::merge (&prior, &mut self.remembered, snaps);

        if merged.len() != self.windows.len() {
            info! ("target windows: {} -> {}", self.windows.len(), merged.len());
        }
        self.windows = merged;
        &self.windows
    }

    fn merge (prior:&HashMap<Pid,WindowPrefs>, remembered:&mut HashMap<Pid,WindowPrefs>, snaps:Vec<WindowSnapshot>) -> Vec<WindowRecord> {
        let mut seen  = HashSet::new();
        let mut fresh = Vec::new();
        let mut merged = Vec::with_capacity (snaps.len());

        for snap in snaps {
            if !seen.insert (snap.process_id) {
                // only the first (topmost) window of a process is tracked
                debug! ("skipping extra window {:?} of pid {}", snap.handle, snap.process_id);
                continue
            }
            // in-memory state wins, then anything remembered from settings (which is consumed on first use)
            let prefs = prior.get (&snap.process_id) .cloned() .or_else (|| remembered.remove (&snap.process_id));
            match prefs {
                Some(p) => merged.push (WindowRecord::from_snapshot (snap, p)),
                None    => fresh.push (snap),
            }
        }
        // first-timers go to the end, in enumeration order .. numbered from the count, or past the highest kept order if that's larger
        let mut next = merged.iter() .map (|w| w.display_order + 1) .max() .unwrap_or(0) .max (merged.len() as i32);
        for snap in fresh {
            let prefs = WindowPrefs { display_order: next, ..WindowPrefs::default() };
            merged.push (WindowRecord::from_snapshot (snap, prefs));
            next += 1;
        }
        Self::sort (&mut merged);
        merged
    }

    fn sort (windows:&mut [WindowRecord]) {
        windows.sort_by (|a,b| a.display_order.cmp(&b.display_order) .then_with (|| a.title.cmp(&b.title)));
    }



    /*****  views  ******/

    pub fn windows (&self) -> &[WindowRecord] { &self.windows }

    pub fn enabled_windows (&self) -> impl Iterator <Item = &WindowRecord> {
        self.windows .iter() .filter (|w| w.is_enabled)
    }

    pub fn find (&self, pid:Pid) -> Option<&WindowRecord> {
        self.windows .iter() .find (|w| w.process_id == pid)
    }
    pub fn position_of (&self, pid:Pid) -> Option<usize> {
        self.windows .iter() .position (|w| w.process_id == pid)
    }

    pub fn nav_index (&self) -> Option<usize> { self.nav_idx }

    /// Whether prefs seeded via `remember` for this pid are still waiting for its window to show up
    pub fn is_remembered (&self, pid:Pid) -> bool { self.remembered.contains_key (&pid) }

    /// The tracked window currently in the os foreground, if any
    pub fn current_active_window (&self) -> Option<&WindowRecord> {
        let fgnd = self.desktop.foreground_window();
        if fgnd == 0 { return None }
        self.windows .iter() .find (|w| w.handle == fgnd)
    }



    /*****  editing (driven from the management list)  ******/

    pub fn set_enabled (&mut self, pid:Pid, enabled:bool) -> bool {
        match self.windows .iter_mut() .find (|w| w.process_id == pid) {
            Some(w) => { w.is_enabled = enabled; true }
            None => false
        }
    }

    pub fn set_hotkey_display (&mut self, pid:Pid, display:&str) -> bool {
        match self.windows .iter_mut() .find (|w| w.process_id == pid) {
            Some(w) => { w.individual_hotkey_display = display.to_string(); true }
            None => false
        }
    }

    /// Moves the window at sorted position `from` to position `to`, then renumbers display-orders 0..n
    pub fn move_window (&mut self, from:usize, to:usize) -> bool {
        if from >= self.windows.len() || to >= self.windows.len() { return false }
        let w = self.windows.remove (from);
        self.windows.insert (to, w);
        self.windows .iter_mut() .enumerate() .for_each (|(i,w)| w.display_order = i as i32);
        Self::sort (&mut self.windows);
        true
    }



    /*****  switching  ******/

    pub fn switch_next     (&mut self) -> SwitchOutcome { self.switch_step (Direction::Next) }
    pub fn switch_previous (&mut self) -> SwitchOutcome { self.switch_step (Direction::Previous) }

    /// Position (in the full list) we consider 'current' : the os foreground window if we track it,
    /// else whatever we last switched to
    fn current_full_index (&self) -> Option<usize> {
        let fgnd = self.desktop.foreground_window();
        if fgnd != 0 {
            if let Some(i) = self.windows .iter() .position (|w| w.handle == fgnd) {
                return Some(i)
        } }
        self.nav_idx .filter (|&i| i < self.windows.len())
    }

    fn switch_step (&mut self, dir:Direction) -> SwitchOutcome {
        let enabled = self.windows .iter() .enumerate() .filter (|(_,w)| w.is_enabled) .map (|(i,_)| i) .collect::<Vec<usize>>();
        if enabled.is_empty() {
            debug! ("switch {:?} requested with no enabled windows", dir);
            return SwitchOutcome::NoEligibleWindow
        }
        let n = enabled.len() as i64;
        // -1 stands for 'no current position' .. a disabled current window counts as none too
        let cur = self.current_full_index()
            .and_then (|i| enabled.iter().position (|&e| e == i))
            .map (|p| p as i64) .unwrap_or (-1);

        let target = match dir {
            Direction::Next     => (cur + 1).rem_euclid(n),
            Direction::Previous => (cur - 1 + n).rem_euclid(n),
        };
        let full_idx = enabled [target as usize];
        let pid = self.windows[full_idx].process_id;

        if self.activate (full_idx) { SwitchOutcome::Switched(pid) } else { SwitchOutcome::ActivationFailed(pid) }
    }

    /// Activates the window of the given process (if we track it)
    pub fn activate_pid (&mut self, pid:Pid) -> SwitchOutcome {
        match self.position_of (pid) {
            Some(idx) if self.activate (idx) => SwitchOutcome::Switched(pid),
            _ => SwitchOutcome::ActivationFailed(pid),
        }
    }

    /// Restores (if minimized) and foregrounds the window at `full_idx`, recording it as the navigation point on success
    pub fn activate (&mut self, full_idx:usize) -> bool {
        let Some(w) = self.windows.get (full_idx) else { return false };
        let hwnd = w.handle;
        if self.desktop.is_minimized (hwnd) {
            self.desktop.restore (hwnd);
        }
        if !self.desktop.set_foreground (hwnd) {
            warn! ("failed to foreground window {:?} ({:?})", hwnd, w.title);
            return false
        }
        debug! ("activated {:?} ({:?}) at idx {}", hwnd, w.title, full_idx);
        self.nav_idx = Some (full_idx);
        true
    }

}




#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeDesktop;

    fn setup () -> (FakeDesktop, WindowRegistry<FakeDesktop>) {
        let desk = FakeDesktop::new();
        let reg = WindowRegistry::new (desk.clone(), "Dofus");
        (desk, reg)
    }

    #[test]
    fn process_names_match_loosely() {
        assert!(process_name_matches ("Dofus", "Dofus"));
        assert!(process_name_matches ("dofus.EXE", "Dofus"));
        assert!(process_name_matches ("Dofus", "dofus.exe"));
        assert!(!process_name_matches ("Dofus Retro", "Dofus"));
        assert!(!process_name_matches ("exe", "Dofus"));
        assert!(!process_name_matches ("Dofus", " "));
        assert!(!process_name_matches ("çé", "Dofus"));
    }

    // A, B enabled, C disabled
    fn abc () -> (FakeDesktop, WindowRegistry<FakeDesktop>) {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "Hero - Feca") .add (2, 11, "Mage - Xelor") .add (3, 12, "Scout - Sram");
        reg.refresh();
        reg.set_enabled (12, false);
        (desk, reg)
    }

    fn pids (reg:&WindowRegistry<FakeDesktop>) -> Vec<Pid> {
        reg.windows().iter().map(|w| w.process_id).collect()
    }

    #[test]
    fn title_parts_split_on_separator() {
        let w = WindowRecord { title: "Hero - Feca - Dofus 3".into(), ..Default::default() };
        assert_eq!(w.character_name(), "Hero");
        assert_eq!(w.character_class(), "Feca");
        assert_eq!(w.display_title(), "Feca - Hero");

        let w = WindowRecord { title: "Dofus".into(), ..Default::default() };
        assert_eq!(w.character_name(), "");
        assert_eq!(w.character_class(), "");
        assert_eq!(w.display_title(), "Dofus");
    }

    #[test]
    fn refresh_only_picks_target_process() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "Hero - Feca") .add_for (2, 20, "Notepad", "notepad") .add_for (3, 30, "Alt - Iop", "dofus.exe");
        assert_eq!(reg.refresh().len(), 2);
        assert_eq!(pids(&reg), vec![10, 30]);
    }

    #[test]
    fn empty_os_result_gives_empty_list() {
        let (_desk, mut reg) = setup();
        assert!(reg.refresh().is_empty());
        assert_eq!(reg.switch_next(), SwitchOutcome::NoEligibleWindow);
    }

    #[test]
    fn new_windows_append_with_running_count_and_enabled() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "B") .add (2, 11, "A");
        reg.refresh();
        assert_eq!(reg.find(10).unwrap().display_order, 0);
        assert_eq!(reg.find(11).unwrap().display_order, 1);
        assert!(reg.windows().iter().all(|w| w.is_enabled));

        desk.add (3, 12, "C");
        reg.refresh();
        assert_eq!(reg.find(12).unwrap().display_order, 2);
        assert_eq!(pids(&reg), vec![10, 11, 12]);
    }

    #[test]
    fn newcomer_after_a_gap_still_lands_last() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "A") .add (2, 11, "Mid") .add (3, 12, "Zed");
        reg.refresh();
        desk.remove_pid (11);
        desk.add (4, 13, "Archer");
        reg.refresh();

        assert_eq!(pids(&reg), vec![10, 12, 13]);
        assert_eq!(reg.find(13).unwrap().display_order, 3);
    }

    #[test]
    fn persisting_pids_keep_user_fields() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "Hero - Feca") .add (2, 11, "Mage - Xelor");
        reg.refresh();
        reg.set_enabled (10, false);
        reg.set_hotkey_display (10, "Ctrl + F1");
        reg.move_window (1, 0);

        // handle and title change, pid stays
        desk.remove_pid (10);
        desk.add (7, 10, "Hero - Feca (lvl 200)");
        reg.refresh();

        let w = reg.find(10).unwrap();
        assert_eq!(w.handle, 7);
        assert_eq!(w.title, "Hero - Feca (lvl 200)");
        assert!(!w.is_enabled);
        assert_eq!(w.individual_hotkey_display, "Ctrl + F1");
        assert_eq!(w.display_order, 1);
        assert_eq!(pids(&reg), vec![11, 10]);
    }

    #[test]
    fn retitled_window_is_picked_up_on_refresh() {
        let (desk, mut reg) = abc();
        desk.retitle (12, "Rogue - Sram");
        reg.refresh();
        let w = reg.find(12).unwrap();
        assert_eq!(w.display_title(), "Sram - Rogue");
        assert!(!w.is_enabled);
        assert_eq!(reg.enabled_windows().map(|w| w.process_id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn vanished_pids_are_dropped() {
        let (desk, mut reg) = abc();
        desk.remove_pid (11);
        reg.refresh();
        assert_eq!(pids(&reg), vec![10, 12]);
        assert!(reg.find(11).is_none());
    }

    #[test]
    fn duplicate_pid_windows_keep_the_first() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "Hero - Feca") .add (2, 10, "Dofus popup");
        reg.refresh();
        assert_eq!(reg.windows().len(), 1);
        assert_eq!(reg.windows()[0].handle, 1);
    }

    #[test]
    fn ties_in_order_break_on_title() {
        let (desk, mut reg) = setup();
        reg.remember ( [
            (10, WindowPrefs { display_order: 5, ..Default::default() }),
            (11, WindowPrefs { display_order: 5, ..Default::default() }),
        ] );
        desk.add (1, 10, "Zed") .add (2, 11, "Amy");
        reg.refresh();
        assert_eq!(pids(&reg), vec![11, 10]);
    }

    #[test]
    fn remembered_prefs_apply_once() {
        let (desk, mut reg) = setup();
        reg.remember ( [ (10, WindowPrefs { display_order: 3, is_enabled: false, individual_hotkey_display: "Alt + F2".into() }) ] );
        desk.add (1, 10, "Hero - Feca");
        reg.refresh();
        assert!(!reg.find(10).unwrap().is_enabled);

        // once the window is gone and comes back, it is a first-timer again
        desk.remove_pid (10);
        reg.refresh();
        desk.add (1, 10, "Hero - Feca");
        reg.refresh();
        let w = reg.find(10).unwrap();
        assert!(w.is_enabled);
        assert_eq!(w.individual_hotkey_display, "");
        assert_eq!(w.display_order, 0);
    }

    #[test]
    fn move_window_renumbers_sequentially() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "A") .add (2, 11, "B") .add (3, 12, "C");
        reg.refresh();
        assert!(reg.move_window (2, 0));
        assert_eq!(pids(&reg), vec![12, 10, 11]);
        assert_eq!(reg.windows().iter().map(|w| w.display_order).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(!reg.move_window (3, 0));
    }

    #[test]
    fn next_cycles_enabled_windows_and_skips_disabled() {
        let (desk, mut reg) = abc();
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(10));
        assert_eq!(desk.foreground(), 1);
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(11));
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(10));
        assert_eq!(reg.nav_index(), Some(0));
    }

    #[test]
    fn next_then_previous_round_trips() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "A") .add (2, 11, "B") .add (3, 12, "C");
        reg.refresh();
        desk.focus (2);
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(12));
        assert_eq!(reg.switch_previous(), SwitchOutcome::Switched(11));
        assert_eq!(desk.foreground(), 2);
        // and wrapping backwards from the first
        desk.focus (1);
        assert_eq!(reg.switch_previous(), SwitchOutcome::Switched(12));
    }

    #[test]
    fn single_enabled_window_stays_put() {
        let (desk, mut reg) = abc();
        reg.set_enabled (11, false);
        desk.focus (1);
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(10));
        assert_eq!(reg.switch_previous(), SwitchOutcome::Switched(10));
        assert_eq!(desk.foreground(), 1);
    }

    #[test]
    fn no_enabled_windows_is_a_no_op() {
        let (desk, mut reg) = abc();
        reg.set_enabled (10, false);
        reg.set_enabled (11, false);
        desk.focus (1);
        assert_eq!(reg.switch_next(), SwitchOutcome::NoEligibleWindow);
        assert_eq!(reg.switch_previous(), SwitchOutcome::NoEligibleWindow);
        assert!(!reg.switch_next().succeeded());
        assert_eq!(reg.nav_index(), None);
        assert!(desk.state().activations.is_empty());
    }

    #[test]
    fn foreground_window_beats_stored_index() {
        let (desk, mut reg) = abc();
        reg.switch_next();      // -> A, nav idx 0
        desk.focus (2);         // user clicked B directly
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(10));
    }

    #[test]
    fn untracked_foreground_falls_back_to_stored_index() {
        let (desk, mut reg) = abc();
        reg.switch_next();      // -> A
        desk.focus (999);       // some other app
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(11));
    }

    #[test]
    fn previous_from_nowhere_follows_the_wrap_formula() {
        let (desk, mut reg) = setup();
        desk.add (1, 10, "A") .add (2, 11, "B") .add (3, 12, "C");
        reg.refresh();
        // current position -1 : (-1 - 1 + 3) mod 3 = 1
        assert_eq!(reg.switch_previous(), SwitchOutcome::Switched(11));
    }

    #[test]
    fn disabled_current_window_counts_as_none() {
        let (desk, mut reg) = abc();
        desk.focus (3);         // C is tracked but disabled
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(10));
    }

    #[test]
    fn stale_stored_index_is_ignored() {
        let (desk, mut reg) = abc();
        reg.switch_next();
        reg.switch_next();      // -> B, nav idx 1
        desk.focus (0);
        desk.remove_pid (10);
        desk.remove_pid (12);
        reg.refresh();          // list is now [B] .. idx 1 is out of range
        assert_eq!(reg.switch_next(), SwitchOutcome::Switched(11));
    }

    #[test]
    fn minimized_windows_are_restored_first() {
        let (desk, mut reg) = abc();
        desk.state().minimized.insert (1);
        assert!(reg.switch_next().succeeded());
        assert_eq!(desk.state().restored, vec![1]);
        assert!(!desk.state().minimized.contains(&1));
    }

    #[test]
    fn failed_activation_is_reported_and_keeps_index() {
        let (desk, mut reg) = abc();
        reg.switch_next();      // -> A
        desk.focus (999);
        desk.state().stale.insert (2);
        assert_eq!(reg.switch_next(), SwitchOutcome::ActivationFailed(11));
        assert_eq!(reg.nav_index(), Some(0));
    }

    #[test]
    fn current_active_window_looks_up_foreground_handle() {
        let (desk, reg) = abc();
        assert!(reg.current_active_window().is_none());
        desk.focus (2);
        assert_eq!(reg.current_active_window().map(|w| w.process_id), Some(11));
        desk.focus (42);
        assert!(reg.current_active_window().is_none());
    }

    #[test]
    fn activate_pid_targets_a_specific_window() {
        let (desk, mut reg) = abc();
        assert_eq!(reg.activate_pid (12), SwitchOutcome::Switched(12));
        assert_eq!(desk.foreground(), 3);
        assert_eq!(reg.nav_index(), Some(2));
        assert_eq!(reg.activate_pid (77), SwitchOutcome::ActivationFailed(77));
    }
}
