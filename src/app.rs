//! Win32 wiring : the real desktop and hotkey table behind the registry/hotkey traits, and the message loop that drives them

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{WM_CLOSE, WM_ENDSESSION, WM_HOTKEY, WM_QUERYENDSESSION, WM_TIMER};

use crate::config::Config;
use crate::hotkeys::{HotkeyOs, SlotId};
use crate::keys::HotkeyCombo;
use crate::registry::{process_name_matches, Hwnd, Pid, WindowActivator, WindowSnapshot, WindowSource};
use crate::switcher::{Notice, Switcher};
use crate::win_apis;



# [ derive (Debug, Default, Clone, Copy) ]
/// The live desktop, queried through win32
pub struct Win32Desktop;

impl WindowSource for Win32Desktop {
    fn enumerate (&self, target_process_name:&str) -> Vec<WindowSnapshot> {
        // a game client usually has a few hidden helper windows per process, so we only look up each pid's image once
        let mut names : HashMap <Pid, Option<String>> = HashMap::new();
        win_apis::get_top_level_windows() .into_iter()
            .filter (|h| win_apis::check_window_visible(*h))
            .filter_map (|h| {
                let pid = win_apis::get_window_pid (h);
                let name = names .entry (pid) .or_insert_with (|| win_apis::get_pid_exe_name (pid)) .clone()?;
                process_name_matches (&name, target_process_name) .then (|| WindowSnapshot {
                    handle       : h,
                    title        : win_apis::get_window_text (h),
                    process_id   : pid,
                    process_name : name,
                } )
            } ) .collect()
    }
}

impl WindowActivator for Win32Desktop {
    fn is_minimized      (&self, hwnd:Hwnd) -> bool { win_apis::check_window_minimized (hwnd) }
    fn restore           (&self, hwnd:Hwnd)         { win_apis::window_restore (hwnd) }
    fn set_foreground    (&self, hwnd:Hwnd) -> bool { win_apis::window_set_foreground (hwnd) }
    fn foreground_window (&self) -> Hwnd            { win_apis::get_fgnd_window() }
}



# [ derive (Debug, Clone) ]
/// The os hotkey table, with registrations owned by our hidden owner window.
/// The owner is shared with the message loop, which swaps it in if that window ever has to be re-created.
pub struct Win32Hotkeys {
    owner : Rc <Cell <Hwnd>>,
}

impl HotkeyOs for Win32Hotkeys {
    fn register_hotkey (&self, slot:SlotId, combo:&HotkeyCombo) -> bool {
        win_apis::register_hotkey (self.owner.get(), slot, combo.modifiers.bits(), combo.key.code())
    }
    fn unregister_hotkey (&self, slot:SlotId) -> bool {
        win_apis::unregister_hotkey (self.owner.get(), slot)
    }
}



# [ derive (Clone) ]
pub struct MessageLoop ( Arc <_MessageLoop> );

impl Deref for MessageLoop {
    type Target = _MessageLoop;
    fn deref (&self) -> &_MessageLoop { &self.0 }
}

# [ derive (Debug, Default) ]
pub struct _MessageLoop {
    loop_thread : AtomicU32,
    wound_down  : AtomicBool,
}

impl MessageLoop {

    pub fn instance () -> MessageLoop {
        static INSTANCE: OnceCell <MessageLoop> = OnceCell::new();
        INSTANCE .get_or_init ( || MessageLoop ( Arc::new (_MessageLoop::default()) ) ) .clone()
    }

    fn store_loop_thread (&self) {
        self.loop_thread.store (win_apis::get_cur_thread_id(), Ordering::SeqCst);
        self.wound_down.store (false, Ordering::SeqCst);
    }

    /// Asks the running loop to exit .. returns false if there's no loop running
    pub fn request_quit (&self) -> bool {
        let tid = self.loop_thread.load (Ordering::SeqCst);
        tid != 0 && win_apis::post_quit_to_thread (tid)
    }

    /// Waits (bounded) for the loop to finish its shutdown (settings saved, hotkeys released)
    pub fn await_wind_down (&self, timeout:Duration) -> bool {
        let start = Instant::now();
        while !self.wound_down.load (Ordering::SeqCst) {
            if start.elapsed() > timeout { return false }
            thread::sleep (Duration::from_millis(20));
        }
        true
    }

    fn mark_wound_down (&self) {
        self.loop_thread.store (0, Ordering::SeqCst);
        self.wound_down.store (true, Ordering::SeqCst);
    }
}

// console close/ctrl-c/logoff arrive on a separate os thread, and the process dies once this returns,
// so we have the loop wind down first
unsafe extern "system" fn console_ctrl_handler (ctrl_type:u32) -> BOOL {
    info! ("received console control event {}, shutting down", ctrl_type);
    let ml = MessageLoop::instance();
    if ml.request_quit() && !ml.await_wind_down (Duration::from_secs(5)) {
        warn! ("gave up waiting for the message loop to wind down");
    }
    BOOL::from (true)
}




# [ derive (Debug, Clone, Copy, PartialEq, Eq) ]
enum OwnerAction { Default, AllowEndSession, WindDownNow, Quit }

fn owner_message_action (msg:u32, wparam:usize) -> OwnerAction {
    match msg {
        WM_QUERYENDSESSION           => OwnerAction::AllowEndSession,
        WM_ENDSESSION if wparam != 0 => OwnerAction::WindDownNow,
        WM_CLOSE                     => OwnerAction::Quit,
        _                            => OwnerAction::Default,
    }
}

thread_local! {
    // set while the loop runs .. the process can be killed as soon as WM_ENDSESSION returns, so cleanup happens right there
    static SESSION_END_HOOK : RefCell <Option <Box <dyn FnOnce()>>> = RefCell::new (None);
}

unsafe extern "system" fn owner_window_proc (hwnd:HWND, msg:u32, wparam:WPARAM, lparam:LPARAM) -> LRESULT {
    match owner_message_action (msg, wparam.0) {
        OwnerAction::AllowEndSession => LRESULT(1),
        OwnerAction::WindDownNow => {
            info! ("session is ending, shutting down");
            // taken out first, so a re-entrant end-session message finds nothing left to run
            if let Some(wind_down) = SESSION_END_HOOK.with (|hook| hook.borrow_mut().take()) { wind_down() }
            win_apis::post_quit_message();
            LRESULT(0)
        }
        OwnerAction::Quit => {
            info! ("owner window asked to close, shutting down");
            win_apis::post_quit_message();
            LRESULT(0)
        }
        OwnerAction::Default => win_apis::def_window_proc (hwnd, msg, wparam, lparam),
    }
}



fn log_notices <D, H> (rx:&Receiver<Notice>, sw:&Switcher<D,H>)
    where D: WindowSource + WindowActivator, H: HotkeyOs
{
    let title = |pid:Pid| sw.registry().find(pid) .map (|w| w.display_title()) .unwrap_or_else (|| format!("pid {}", pid));
    for notice in rx.try_iter() {
        match &notice {
            Notice::SwitchedNext(pid) | Notice::SwitchedPrevious(pid) | Notice::IndividualHotkeyFired(pid) =>
                info! ("{} : {}", notice.as_ref(), title(*pid)),
            Notice::ActivationFailed(pid) | Notice::HotkeyRevoked(pid) =>
                warn! ("{} : {}", notice.as_ref(), title(*pid)),
            Notice::HotkeyConflict(combo) =>
                warn! ("{} : {} is taken by another application", notice.as_ref(), combo),
            Notice::NoEligibleWindow =>
                debug! ("{}", notice.as_ref()),
        }
    }
}


/// Runs the switcher on the calling thread until the loop is asked to quit
/// (owner window closed, session end, console close or ctrl-c)
pub fn run_tabhop (conf:&Config) -> windows::core::Result<()> {

    let owner = Rc::new ( Cell::new ( win_apis::create_owner_window (Some(owner_window_proc))? ) );
    let ml = MessageLoop::instance();
    ml.store_loop_thread();
    if !win_apis::set_console_ctrl_handler (Some(console_ctrl_handler)) {
        debug! ("no console ctrl handler installed");
    }

    let (tx, rx) = mpsc::channel();
    let sw = Rc::new ( RefCell::new ( Switcher::new (Win32Desktop, Win32Hotkeys { owner: owner.clone() }, conf, tx) ) );
    sw.borrow_mut().startup();
    log_notices (&rx, &*sw.borrow());

    let hook_sw = sw.clone();
    SESSION_END_HOOK.with (|hook| *hook.borrow_mut() = Some ( Box::new ( move || {
        match hook_sw.try_borrow_mut() {
            Ok(mut sw) => sw.shutdown(),
            Err(_) => warn! ("switcher was busy when the session ended, settings may not be saved"),
        };
    } ) ) );

    let period = conf.get_refresh_interval();
    let timer = win_apis::set_thread_timer (period.as_millis() as u32);
    info! ("watching {:?} windows, refreshing every {:?}", sw.borrow().registry().target_process_name(), period);

    while let Some(msg) = win_apis::get_next_message() {
        match msg.message {
            WM_HOTKEY => sw.borrow_mut().on_hotkey (msg.wParam.0 as SlotId),
            WM_TIMER if msg.wParam.0 == timer => {
                if !win_apis::check_window_exists (owner.get()) {
                    warn! ("hotkey owner window went away, re-creating it");
                    match win_apis::create_owner_window (Some(owner_window_proc)) {
                        Ok(h) => { owner.set(h); sw.borrow_mut().rebind_hotkeys(); }
                        Err(e) => error! ("failed to re-create the hotkey owner window: {}", e),
                    }
                }
                conf.reload_if_changed();
                sw.borrow_mut().refresh_windows();
            }
            _ => win_apis::dispatch_message (&msg),
        }
        log_notices (&rx, &*sw.borrow());
    }

    info! ("message loop exited, shutting down ...");
    SESSION_END_HOOK.with (|hook| hook.borrow_mut().take());
    win_apis::kill_thread_timer (timer);
    sw.borrow_mut().shutdown();
    drop (sw);
    win_apis::destroy_window (owner.get());
    ml.mark_wound_down();
    Ok(())
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_window_turns_close_and_session_end_into_shutdown() {
        assert_eq!(owner_message_action (WM_QUERYENDSESSION, 0), OwnerAction::AllowEndSession);
        assert_eq!(owner_message_action (WM_ENDSESSION, 1), OwnerAction::WindDownNow);
        assert_eq!(owner_message_action (WM_CLOSE, 0), OwnerAction::Quit);
        // a cancelled session end keeps us running
        assert_eq!(owner_message_action (WM_ENDSESSION, 0), OwnerAction::Default);
        assert_eq!(owner_message_action (WM_TIMER, 0), OwnerAction::Default);
    }
}
